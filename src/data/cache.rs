//! Optional in-memory table cache keyed by file modification time.
//!
//! A cached table is served only while the backing file's mtime is unchanged;
//! any change reloads it, and a vanished file drops the entry and yields an
//! empty table, exactly as an uncached load would.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;
use tracing::debug;

use super::models::{GamePrediction, LiveOdds, PitcherStat, PlayerHrStat, TeamStat};
use super::Table;

/// Thread-safe cache shared by all dashboard requests.
#[derive(Clone, Default)]
pub struct TableCache {
    inner: Arc<Mutex<CacheInner>>,
}

#[derive(Default)]
struct CacheInner {
    predictions: Option<Entry<GamePrediction>>,
    player_stats: Option<Entry<PlayerHrStat>>,
    pitcher_stats: Option<Entry<PitcherStat>>,
    team_stats: Option<Entry<TeamStat>>,
    live_odds: Option<Entry<LiveOdds>>,
}

struct Entry<T> {
    path: PathBuf,
    modified: SystemTime,
    table: Table<T>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predictions(&self, path: &Path) -> Table<GamePrediction> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        get_or_load(&mut inner.predictions, path, super::load_predictions)
    }

    pub fn player_stats(&self, path: &Path) -> Table<PlayerHrStat> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        get_or_load(&mut inner.player_stats, path, super::load_player_stats)
    }

    pub fn pitcher_stats(&self, path: &Path) -> Table<PitcherStat> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        get_or_load(&mut inner.pitcher_stats, path, super::load_pitcher_stats)
    }

    pub fn team_stats(&self, path: &Path) -> Table<TeamStat> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        get_or_load(&mut inner.team_stats, path, super::load_team_stats)
    }

    pub fn live_odds(&self, path: &Path) -> Table<LiveOdds> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        get_or_load(&mut inner.live_odds, path, super::load_live_odds)
    }
}

fn get_or_load<T: Clone>(
    slot: &mut Option<Entry<T>>,
    path: &Path,
    load: fn(&Path) -> Table<T>,
) -> Table<T> {
    let modified = match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(m) => m,
        Err(_) => {
            *slot = None;
            return Table::empty();
        }
    };

    if let Some(entry) = slot.as_ref() {
        if entry.path == path && entry.modified == modified {
            return entry.table.clone();
        }
    }

    debug!("Cache miss for {}, reloading", path.display());
    let table = load(path);
    *slot = Some(Entry {
        path: path.to_path_buf(),
        modified,
        table: table.clone(),
    });
    table
}
