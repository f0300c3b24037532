use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::debug;

pub mod detail;
pub mod filter;

use crate::data::models::parse_date;
use crate::data::{DataStore, Tables};
use detail::{find_selected_row, resolve_game_detail, GameDetail, GameSelection, SelectedDate};
use filter::{filter_predictions, PredictionFilter, PredictionView};

#[derive(Clone)]
pub struct AppState {
    pub store: DataStore,
}

/// Build the Axum router for the dashboard.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/health", get(health_handler))
        .route("/api/predictions", get(predictions_handler))
        .route("/api/games/detail", get(detail_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Query string of `/api/predictions`.
#[derive(Debug, Default, Deserialize)]
pub struct PredictionsQuery {
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    /// Comma-separated team codes
    pub teams: Option<String>,
}

impl PredictionsQuery {
    pub fn into_filter(self) -> Result<PredictionFilter, String> {
        let date = match self.date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(parse_date(raw).ok_or_else(|| format!("invalid date: {}", raw))?),
            None => None,
        };
        let teams = self
            .teams
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Ok(PredictionFilter { date, teams })
    }
}

/// Query string of `/api/games/detail`.
#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    pub home_team: String,
    pub away_team: String,
    /// Game day (`YYYY-MM-DD`) or exact start time
    pub date: String,
}

impl DetailQuery {
    pub fn into_selection(self) -> Result<GameSelection, String> {
        let when = SelectedDate::parse(&self.date)
            .ok_or_else(|| format!("invalid date: {}", self.date))?;
        Ok(GameSelection {
            home_team: self.home_team,
            away_team: self.away_team,
            when,
        })
    }
}

/// The detail for a selection, recomputed from freshly loaded tables.
///
/// The row is located in the same filtered view the table shows, so the
/// detail always describes a row the user could have clicked.
pub fn game_detail(selection: &GameSelection, tables: &Tables) -> Option<GameDetail> {
    let filter = PredictionFilter {
        date: Some(selection.when.day()),
        teams: vec![selection.home_team.clone()],
    };
    let view = filter_predictions(&filter, &tables.predictions, &tables.live_odds);
    find_selected_row(&view.rows, selection).map(|row| resolve_game_detail(row, tables))
}

/// Serve the dashboard HTML page.
async fn index_handler() -> impl IntoResponse {
    Html(DASHBOARD_HTML)
}

/// GET /api/health
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/predictions?date=2024-06-01&teams=NYY,BOS
async fn predictions_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PredictionsQuery>,
) -> Result<Json<PredictionView>, (StatusCode, String)> {
    let filter = query
        .into_filter()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let predictions = state.store.load_predictions();
    let odds = state.store.load_live_odds();
    let view = filter_predictions(&filter, &predictions, &odds);
    debug!("Predictions view: {} of {} rows", view.rows.len(), predictions.len());
    Ok(Json(view))
}

/// GET /api/games/detail?home_team=NYY&away_team=BOS&date=2024-06-01
async fn detail_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DetailQuery>,
) -> Result<Json<GameDetail>, (StatusCode, String)> {
    let selection = query
        .into_selection()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let tables = state.store.load_all();
    let detail = game_detail(&selection, &tables);
    if let Some(d) = &detail {
        debug!(
            "Detail {}: pitchers {}/{}, teams {}/{}, odds {}",
            d.title,
            d.away_pitcher.is_available(),
            d.home_pitcher.is_available(),
            d.away_team.is_available(),
            d.home_team.is_available(),
            d.odds.is_available()
        );
    }
    detail.map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!(
                "no game {} @ {} on {}",
                selection.away_team,
                selection.home_team,
                selection.when.day()
            ),
        )
    })
}

/// Embedded single-file dashboard (HTML + CSS + JS)
const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>MLB Betskies Predictions</title>
<style>
  :root {
    --bg: #0f1117;
    --card: #1a1d27;
    --border: #2a2d3a;
    --accent: #6c63ff;
    --green: #00c896;
    --text: #e0e0e0;
    --muted: #8888aa;
  }
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body { background: var(--bg); color: var(--text); font-family: 'Segoe UI', system-ui, sans-serif; }
  header { padding: 1.5rem 2rem; border-bottom: 1px solid var(--border); text-align: center; }
  header h1 { font-size: 1.8rem; font-weight: 700; }
  header p { color: var(--muted); margin-top: .3rem; }
  main { padding: 1.5rem 2rem; display: grid; gap: 1.5rem; }
  .filters { display: flex; gap: 1rem; align-items: center; justify-content: center; flex-wrap: wrap; }
  .filters label { color: var(--muted); font-size: .85rem; }
  input, select { background: var(--card); color: var(--text); border: 1px solid var(--border); border-radius: 6px; padding: .35rem .6rem; }
  select[multiple] { min-width: 160px; height: 5.5rem; }
  .panel { background: var(--card); border: 1px solid var(--border); border-radius: 10px; overflow: hidden; }
  .panel-header { padding: .9rem 1.2rem; border-bottom: 1px solid var(--border); font-weight: 600; }
  .panel-body { padding: 1rem 1.2rem; display: grid; gap: .8rem; }
  table { width: 100%; border-collapse: collapse; }
  th { padding: .7rem 1rem; text-align: center; font-size: .75rem; text-transform: uppercase; color: var(--muted); border-bottom: 1px solid var(--border); }
  td { padding: .65rem 1rem; font-size: .88rem; text-align: center; border-bottom: 1px solid #1e2130; }
  tbody tr { cursor: pointer; }
  tbody tr:hover, tbody tr.selected { background: rgba(108,99,255,.15); }
  .two-col { display: grid; grid-template-columns: 1fr 1fr; gap: 1.5rem; }
  @media (max-width: 768px) { .two-col { grid-template-columns: 1fr; } }
  .empty { color: var(--muted); text-align: center; padding: 1rem; font-size: .9rem; }
  h5 { color: var(--accent); margin-top: .6rem; }
  footer { color: var(--muted); text-align: center; padding: 1rem; font-size: .8rem; }
</style>
</head>
<body>
<header>
  <h1>MLB Betskies Dashboard</h1>
  <p>Daily MLB game predictions, advanced stats, and picks.</p>
</header>

<main>
  <div class="filters">
    <label for="date-picker">Filter by Date:</label>
    <input type="date" id="date-picker">
    <label for="team-filter">Teams:</label>
    <select id="team-filter" multiple></select>
  </div>

  <div class="panel">
    <div class="panel-header">Today's &amp; Upcoming Predictions</div>
    <table>
      <thead><tr><th>Date</th><th>Away</th><th>Home</th><th>Pick</th><th>Home Win %</th><th>Away Win %</th><th>Stadium</th><th>Weather</th><th>Pitchers</th><th>Home Odds</th><th>Away Odds</th></tr></thead>
      <tbody id="pred-tbody"><tr><td colspan="11" class="empty">Loading…</td></tr></tbody>
    </table>
  </div>

  <div class="panel" id="game-details" hidden></div>
</main>

<footer>Powered by MLB Betskies · Advanced ML &amp; Data Engineering</footer>

<script>
const esc = v => String(v ?? '').replace(/[&<>"']/g, c => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;',"'":'&#39;'}[c]));
const num = (v, d) => Number.isFinite(v) ? v.toFixed(d) : 'N/A';
let rows = [];
let bootstrapped = false;

function teamSelection() {
  return Array.from(document.getElementById('team-filter').selectedOptions).map(o => o.value);
}

async function loadPredictions() {
  const params = new URLSearchParams();
  const date = document.getElementById('date-picker').value;
  if (date) params.set('date', date);
  const teams = teamSelection();
  if (teams.length) params.set('teams', teams.join(','));
  const r = await fetch('/api/predictions?' + params);
  if (!r.ok) return;
  const view = await r.json();

  const picker = document.getElementById('date-picker');
  picker.min = view.min_date || '';
  picker.max = view.max_date || '';
  if (!bootstrapped && view.initial_date) {
    bootstrapped = true;
    picker.value = view.initial_date;
    fillTeams(view.teams);
    return loadPredictions();
  }
  bootstrapped = true;
  fillTeams(view.teams);
  renderRows(view.rows);
}

function fillTeams(teams) {
  const select = document.getElementById('team-filter');
  const chosen = new Set(teamSelection());
  select.innerHTML = teams.map(t => `<option value="${esc(t)}"${chosen.has(t) ? ' selected' : ''}>${esc(t)}</option>`).join('');
}

function renderRows(data) {
  rows = data;
  const tbody = document.getElementById('pred-tbody');
  if (!rows.length) { tbody.innerHTML = '<tr><td colspan="11" class="empty">No games match the filters</td></tr>'; return; }
  tbody.innerHTML = rows.map((p, i) => `<tr data-idx="${i}">
    <td>${esc(p.gameDate.replace('T', ' '))}</td>
    <td>${esc(p.away_team)}</td>
    <td>${esc(p.home_team)}</td>
    <td>${esc(p.pick)}</td>
    <td>${p.home_win_prob ?? ''}</td>
    <td>${p.away_win_prob ?? ''}</td>
    <td>${esc(p.venue)}</td>
    <td>${esc(p.weather_summary)}</td>
    <td>${esc(p.pitchers)}</td>
    <td>${esc(p.home_odds)}</td>
    <td>${esc(p.away_odds)}</td>
  </tr>`).join('');
  tbody.querySelectorAll('tr').forEach(tr => tr.addEventListener('click', () => selectRow(tr)));
}

async function selectRow(tr) {
  document.querySelectorAll('#pred-tbody tr').forEach(t => t.classList.remove('selected'));
  tr.classList.add('selected');
  const p = rows[Number(tr.dataset.idx)];
  const params = new URLSearchParams({ home_team: p.home_team, away_team: p.away_team, date: p.gameDate });
  const r = await fetch('/api/games/detail?' + params);
  const box = document.getElementById('game-details');
  box.hidden = false;
  if (!r.ok) { box.innerHTML = '<div class="empty">Game details unavailable.</div>'; return; }
  renderDetail(await r.json());
}

function pitcherTable(section, label) {
  if (section.status !== 'available') return `<p class="empty">${label} stats unavailable.</p>`;
  const s = section.data;
  return `<table><tr><th>${label}</th><th>ERA</th><th>K/9</th><th>BB/9</th><th>WHIP</th></tr>
    <tr><td>${esc(s.name)}</td><td>${num(s.era, 2)}</td><td>${num(s.k9, 2)}</td><td>${num(s.bb9, 2)}</td><td>${num(s.whip, 2)}</td></tr></table>`;
}

function teamTable(section, label) {
  if (section.status !== 'available') return `<p class="empty">${label} team stats unavailable.</p>`;
  const s = section.data;
  return `<table><tr><th>${label}</th><th>Win %</th><th>ERA</th><th>HR Rate</th></tr>
    <tr><td>${esc(s.team)}</td><td>${num(s.win_pct, 3)}</td><td>${num(s.era, 2)}</td><td>${num(s.hr_rate, 4)}</td></tr></table>`;
}

function hitterTable(hitters, label) {
  if (!hitters.length) return `<p class="empty">Top HR hitters for ${label} unavailable.</p>`;
  return `<table><tr><th>Player</th><th>HR Rate</th><th>HR</th><th>PA</th></tr>` +
    hitters.map(h => `<tr><td>${esc(h.name)}</td><td>${num(h.hr_rate, 4)}</td><td>${h.hr ?? 0}</td><td>${h.pa ?? 0}</td></tr>`).join('') +
    `</table>`;
}

function oddsTable(section) {
  if (section.status !== 'available') return '<p class="empty">No odds data available for this game.</p>';
  const o = section.data;
  const draw = o.draw_odds != null;
  return `<table><tr><th></th><th>Home</th><th>Away</th>${draw ? '<th>Draw</th>' : ''}<th>Source</th><th>Updated</th></tr>
    <tr><td>Odds</td><td>${esc(o.home_odds)}</td><td>${esc(o.away_odds)}</td>${draw ? `<td>${esc(o.draw_odds)}</td>` : ''}<td>${esc(o.source)}</td><td>${o.last_updated ? new Date(o.last_updated).toLocaleString() : ''}</td></tr></table>`;
}

function renderDetail(d) {
  const [away, home] = d.title.split(' @ ');
  document.getElementById('game-details').innerHTML = `
    <div class="panel-header">Game Details: ${esc(d.title)}</div>
    <div class="panel-body">
      <p>Venue: ${esc(d.venue)}</p>
      <p>Date: ${esc(d.game_date.replace('T', ' '))}</p>
      <p>Weather: ${esc(d.weather_summary)}</p>
      <p>Pitching Matchup: ${esc(d.pitching_matchup)}</p>
      <h5>Pitcher Advanced Stats</h5>
      <div class="two-col">${pitcherTable(d.away_pitcher, 'Away Pitcher')}${pitcherTable(d.home_pitcher, 'Home Pitcher')}</div>
      <h5>Team Advanced Stats</h5>
      <div class="two-col">${teamTable(d.away_team, 'Away Team')}${teamTable(d.home_team, 'Home Team')}</div>
      <h5>Top HR Hitters in Projected Lineup</h5>
      <div class="two-col">
        <div><h6>${esc(away)}</h6>${hitterTable(d.away_hitters, 'Away')}</div>
        <div><h6>${esc(home)}</h6>${hitterTable(d.home_hitters, 'Home')}</div>
      </div>
      <h5>Live Odds</h5>
      ${oddsTable(d.odds)}
    </div>`;
}

document.getElementById('date-picker').addEventListener('change', loadPredictions);
document.getElementById('team-filter').addEventListener('change', loadPredictions);
loadPredictions();
</script>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{pitcher_stats_from_reader, predictions_from_reader, DataPaths, Table};
    use chrono::NaiveDate;

    fn tables() -> Tables {
        let csv = "\
gameDate,home_team,away_team,home_pitcher,away_pitcher,home_win_prob,away_win_prob
2024-06-01 13:05:00,NYY,BOS,Gerrit Cole,Brayan Bello,0.6,0.4
2024-06-01 19:05:00,NYY,BOS,Luis Gil,Kutter Crawford,0.52,0.48
";
        let pitchers = "player_id,player_name,team,ERA\n1,Luis Gil,NYY,3.10\n";
        Tables {
            predictions: predictions_from_reader(csv.as_bytes()).unwrap(),
            pitcher_stats: pitcher_stats_from_reader(pitchers.as_bytes()).unwrap(),
            ..Tables::default()
        }
    }

    #[test]
    fn predictions_query_parses_date_and_teams() {
        let filter = PredictionsQuery {
            date: Some("2024-06-01".into()),
            teams: Some("NYY, BOS,,".into()),
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.date, NaiveDate::from_ymd_opt(2024, 6, 1));
        assert_eq!(filter.teams, vec!["NYY", "BOS"]);

        let empty = PredictionsQuery {
            date: Some("  ".into()),
            teams: None,
        }
        .into_filter()
        .unwrap();
        assert_eq!(empty, PredictionFilter::default());
    }

    #[test]
    fn predictions_query_rejects_bad_date() {
        let err = PredictionsQuery {
            date: Some("June 1st".into()),
            teams: None,
        }
        .into_filter()
        .unwrap_err();
        assert!(err.contains("June 1st"));
    }

    #[test]
    fn detail_by_day_takes_first_game_of_doubleheader() {
        let selection = DetailQuery {
            home_team: "NYY".into(),
            away_team: "BOS".into(),
            date: "2024-06-01".into(),
        }
        .into_selection()
        .unwrap();
        let detail = game_detail(&selection, &tables()).unwrap();
        assert_eq!(detail.pitching_matchup, "Brayan Bello vs Gerrit Cole");
        assert!(!detail.home_pitcher.is_available());
    }

    #[test]
    fn detail_by_exact_time_picks_nightcap() {
        let selection = DetailQuery {
            home_team: "NYY".into(),
            away_team: "BOS".into(),
            date: "2024-06-01T19:05:00".into(),
        }
        .into_selection()
        .unwrap();
        let detail = game_detail(&selection, &tables()).unwrap();
        assert!(detail.home_pitcher.is_available());
    }

    #[test]
    fn detail_for_unknown_game_is_none() {
        let selection = GameSelection {
            home_team: "LAD".into(),
            away_team: "SF".into(),
            when: SelectedDate::Day(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()),
        };
        assert!(game_detail(&selection, &tables()).is_none());
        let no_data = Tables {
            predictions: Table::empty(),
            ..tables()
        };
        assert!(game_detail(&selection, &no_data).is_none());
    }

    fn state_with_predictions(dir: &std::path::Path) -> State<Arc<AppState>> {
        let paths = DataPaths {
            predictions: dir.join("predictions.csv"),
            player_stats: dir.join("players.csv"),
            pitcher_stats: dir.join("pitchers.csv"),
            team_stats: dir.join("teams.csv"),
            live_odds: dir.join("odds.csv"),
        };
        std::fs::write(
            &paths.predictions,
            "gameDate,home_team,away_team\n2024-06-01 13:05:00,NYY,BOS\n",
        )
        .unwrap();
        State(Arc::new(AppState {
            store: DataStore::new(paths, false),
        }))
    }

    #[tokio::test]
    async fn predictions_handler_maps_bad_date_to_400() {
        let dir = tempfile::tempdir().unwrap();
        let query = PredictionsQuery {
            date: Some("2024-13-45".into()),
            teams: None,
        };
        let (status, _) = predictions_handler(state_with_predictions(dir.path()), Query(query))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let Json(view) = predictions_handler(
            state_with_predictions(dir.path()),
            Query(PredictionsQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(view.rows.len(), 1);
    }

    #[tokio::test]
    async fn detail_handler_status_codes() {
        let dir = tempfile::tempdir().unwrap();
        let query = |home: &str, date: &str| DetailQuery {
            home_team: home.into(),
            away_team: "BOS".into(),
            date: date.into(),
        };

        let (status, _) = detail_handler(state_with_predictions(dir.path()), Query(query("NYY", "someday")))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            detail_handler(state_with_predictions(dir.path()), Query(query("LAD", "2024-06-01")))
                .await
                .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("BOS @ LAD"));

        let Json(detail) =
            detail_handler(state_with_predictions(dir.path()), Query(query("NYY", "2024-06-01")))
                .await
                .unwrap();
        assert_eq!(detail.title, "BOS @ NYY");
        assert_eq!(detail.odds, detail::Section::Unavailable);
    }
}
