use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub mod cache;
pub mod lineup;
pub mod models;

use cache::TableCache;
use models::*;

/// Failure reading a data file that exists.
///
/// Load sites never surface these to the dashboard: they are logged and the
/// table is treated as empty.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to read CSV header in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// An ordered set of typed rows plus the column names the file actually had.
///
/// Column presence matters for join decisions (e.g. whether both sides carry
/// `gamePk`), so it is kept separately from the per-row `Option`s.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<T> {
    columns: Vec<String>,
    rows: Vec<T>,
}

impl<T> Table<T> {
    pub fn new(columns: Vec<String>, rows: Vec<T>) -> Self {
        Table { columns, rows }
    }

    /// The "no data" table returned for absent files.
    pub fn empty() -> Self {
        Table {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Table::empty()
    }
}

/// Locations of the five backing files.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub predictions: PathBuf,
    pub player_stats: PathBuf,
    pub pitcher_stats: PathBuf,
    pub team_stats: PathBuf,
    pub live_odds: PathBuf,
}

/// Every table a detail request needs, loaded together.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub predictions: Table<GamePrediction>,
    pub player_stats: Table<PlayerHrStat>,
    pub pitcher_stats: Table<PitcherStat>,
    pub team_stats: Table<TeamStat>,
    pub live_odds: Table<LiveOdds>,
}

/// Request-scoped access to the data files.
///
/// Without a cache every call re-reads its file, so a producer rewriting a
/// file is picked up by the next request.
#[derive(Clone)]
pub struct DataStore {
    paths: DataPaths,
    cache: Option<TableCache>,
}

impl DataStore {
    pub fn new(paths: DataPaths, cache_enabled: bool) -> Self {
        DataStore {
            paths,
            cache: cache_enabled.then(TableCache::new),
        }
    }

    pub fn load_predictions(&self) -> Table<GamePrediction> {
        match &self.cache {
            Some(cache) => cache.predictions(&self.paths.predictions),
            None => load_predictions(&self.paths.predictions),
        }
    }

    pub fn load_player_stats(&self) -> Table<PlayerHrStat> {
        match &self.cache {
            Some(cache) => cache.player_stats(&self.paths.player_stats),
            None => load_player_stats(&self.paths.player_stats),
        }
    }

    pub fn load_pitcher_stats(&self) -> Table<PitcherStat> {
        match &self.cache {
            Some(cache) => cache.pitcher_stats(&self.paths.pitcher_stats),
            None => load_pitcher_stats(&self.paths.pitcher_stats),
        }
    }

    pub fn load_team_stats(&self) -> Table<TeamStat> {
        match &self.cache {
            Some(cache) => cache.team_stats(&self.paths.team_stats),
            None => load_team_stats(&self.paths.team_stats),
        }
    }

    pub fn load_live_odds(&self) -> Table<LiveOdds> {
        match &self.cache {
            Some(cache) => cache.live_odds(&self.paths.live_odds),
            None => load_live_odds(&self.paths.live_odds),
        }
    }

    pub fn load_all(&self) -> Tables {
        Tables {
            predictions: self.load_predictions(),
            player_stats: self.load_player_stats(),
            pitcher_stats: self.load_pitcher_stats(),
            team_stats: self.load_team_stats(),
            live_odds: self.load_live_odds(),
        }
    }
}

// ── Path-based loaders ───────────────────────────────────────────────────────

pub fn load_predictions(path: &Path) -> Table<GamePrediction> {
    load_or_empty(path, "predictions", predictions_from_reader)
}

pub fn load_player_stats(path: &Path) -> Table<PlayerHrStat> {
    load_or_empty(path, "player stats", player_stats_from_reader)
}

pub fn load_pitcher_stats(path: &Path) -> Table<PitcherStat> {
    load_or_empty(path, "pitcher stats", pitcher_stats_from_reader)
}

pub fn load_team_stats(path: &Path) -> Table<TeamStat> {
    load_or_empty(path, "team stats", team_stats_from_reader)
}

pub fn load_live_odds(path: &Path) -> Table<LiveOdds> {
    load_or_empty(path, "live odds", live_odds_from_reader)
}

/// Open `path` and parse it, or `Ok(None)` when the file does not exist.
pub fn read_table<T>(
    path: &Path,
    parse: impl FnOnce(File) -> Result<Table<T>, csv::Error>,
) -> Result<Option<Table<T>>, LoadError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(LoadError::Io {
                path: path.display().to_string(),
                source: e,
            })
        }
    };
    parse(file).map(Some).map_err(|e| LoadError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

fn load_or_empty<T>(
    path: &Path,
    label: &str,
    parse: impl FnOnce(File) -> Result<Table<T>, csv::Error>,
) -> Table<T> {
    match read_table(path, parse) {
        Ok(Some(table)) => {
            debug!("Loaded {} {} rows from {}", table.len(), label, path.display());
            table
        }
        Ok(None) => {
            debug!("No {} file at {}", label, path.display());
            Table::empty()
        }
        Err(e) => {
            warn!("Treating {} as empty: {}", label, e);
            Table::empty()
        }
    }
}

// ── Reader-based loaders (testable without files) ────────────────────────────

pub fn predictions_from_reader<R: Read>(rdr: R) -> Result<Table<GamePrediction>, csv::Error> {
    deserialize_rows(rdr, "prediction", |raw: RawPrediction| {
        let Some(game_date) = parse_datetime(&raw.game_date) else {
            warn!(
                "skipping prediction {} @ {}: unparseable gameDate {:?}",
                raw.away_team, raw.home_team, raw.game_date
            );
            return None;
        };
        Some(GamePrediction {
            game_date,
            home_team: raw.home_team,
            away_team: raw.away_team,
            pick: raw.pick,
            home_win_prob: raw.home_win_prob.map(probability_to_percent),
            away_win_prob: raw.away_win_prob.map(probability_to_percent),
            venue: raw.venue,
            temperature: raw.temperature,
            humidity: raw.humidity,
            windspeed: raw.windspeed,
            weather: raw.weather,
            weather_summary: raw.weather_summary,
            pitchers: raw.pitchers,
            home_pitcher: raw.home_pitcher,
            away_pitcher: raw.away_pitcher,
            home_lineup_ids: raw.home_lineup_ids,
            away_lineup_ids: raw.away_lineup_ids,
            game_pk: raw.game_pk,
        })
    })
}

pub fn player_stats_from_reader<R: Read>(rdr: R) -> Result<Table<PlayerHrStat>, csv::Error> {
    deserialize_rows(rdr, "player", |raw: RawPlayerHrStat| {
        Some(PlayerHrStat {
            player_id: normalize_player_id(&raw.player_id),
            player_name: raw.player_name,
            team: raw.team,
            hr_rate: raw.hr_rate,
            hr: raw.hr.and_then(|v| u32::try_from(v).ok()),
            pa: raw.pa.and_then(|v| u32::try_from(v).ok()),
        })
    })
}

pub fn pitcher_stats_from_reader<R: Read>(rdr: R) -> Result<Table<PitcherStat>, csv::Error> {
    deserialize_rows(rdr, "pitcher", |raw: RawPitcherStat| {
        Some(PitcherStat {
            player_id: normalize_player_id(&raw.player_id),
            player_name: raw.player_name,
            team: raw.team,
            era: raw.era,
            k9: raw.k9,
            bb9: raw.bb9,
            whip: raw.whip,
        })
    })
}

pub fn team_stats_from_reader<R: Read>(rdr: R) -> Result<Table<TeamStat>, csv::Error> {
    deserialize_rows(rdr, "team", |raw: RawTeamStat| {
        Some(TeamStat {
            team: raw.team,
            win_pct: raw.win_pct,
            era: raw.era,
            hr_rate: raw.hr_rate,
        })
    })
}

pub fn live_odds_from_reader<R: Read>(rdr: R) -> Result<Table<LiveOdds>, csv::Error> {
    deserialize_rows(rdr, "odds", |raw: RawLiveOdds| {
        Some(LiveOdds {
            game_pk: raw.game_pk,
            game_date: raw.game_date.as_deref().and_then(parse_datetime),
            home_team: raw.home_team,
            away_team: raw.away_team,
            home_odds: raw.home_odds,
            away_odds: raw.away_odds,
            draw_odds: raw.draw_odds,
            source: raw.source,
            last_updated: raw.last_updated.as_deref().and_then(parse_timestamp),
        })
    })
}

/// Deserialize every row by header name, skipping rows that fail outright.
fn deserialize_rows<R, Raw, T>(
    rdr: R,
    label: &str,
    convert: impl Fn(Raw) -> Option<T>,
) -> Result<Table<T>, csv::Error>
where
    R: Read,
    Raw: DeserializeOwned,
{
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(rdr);
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for (idx, result) in reader.deserialize::<Raw>().enumerate() {
        match result {
            Ok(raw) => rows.extend(convert(raw)),
            Err(e) => warn!("skipping malformed {} row {}: {}", label, idx + 1, e),
        }
    }
    Ok(Table::new(columns, rows))
}
