use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use super::filter::PredictionRow;
use crate::data::lineup::parse_lineup_ids;
use crate::data::models::{
    parse_date, parse_datetime, GamePrediction, LiveOdds, PitcherStat, PlayerHrStat, TeamStat,
};
use crate::data::{Table, Tables};

/// Number of hitters listed per side.
pub const TOP_HITTERS: usize = 3;

/// A detail sub-section that either resolved or degrades to a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Section<T> {
    Available(T),
    Unavailable,
}

impl<T> From<Option<T>> for Section<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Section::Available(v),
            None => Section::Unavailable,
        }
    }
}

impl<T> Section<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Section::Available(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PitcherLine {
    pub name: String,
    pub team: String,
    pub era: Option<f64>,
    pub k9: Option<f64>,
    pub bb9: Option<f64>,
    pub whip: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamLine {
    pub team: String,
    pub win_pct: Option<f64>,
    pub era: Option<f64>,
    pub hr_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitterLine {
    pub player_id: String,
    pub name: String,
    pub hr_rate: Option<f64>,
    pub hr: Option<u32>,
    pub pa: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OddsLine {
    pub home_odds: String,
    pub away_odds: String,
    /// Only present when the book prices a draw
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draw_odds: Option<String>,
    pub source: String,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Supplementary view for one selected game.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameDetail {
    /// `"<away> @ <home>"`
    pub title: String,
    pub venue: String,
    pub game_date: NaiveDateTime,
    pub weather_summary: String,
    pub pitching_matchup: String,
    pub away_pitcher: Section<PitcherLine>,
    pub home_pitcher: Section<PitcherLine>,
    pub away_team: Section<TeamLine>,
    pub home_team: Section<TeamLine>,
    /// Empty when the lineup is unknown or nobody matched
    pub away_hitters: Vec<HitterLine>,
    pub home_hitters: Vec<HitterLine>,
    pub odds: Section<OddsLine>,
}

/// Which game a detail request refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSelection {
    pub home_team: String,
    pub away_team: String,
    pub when: SelectedDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectedDate {
    /// First game of the matchup on this day
    Day(NaiveDate),
    /// A specific start time, for doubleheaders
    Exact(NaiveDateTime),
}

impl SelectedDate {
    /// Accepts `YYYY-MM-DD` for a day or any full timestamp for an exact game.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(day) = parse_date(raw) {
            return Some(SelectedDate::Day(day));
        }
        parse_datetime(raw).map(SelectedDate::Exact)
    }

    pub fn day(&self) -> NaiveDate {
        match self {
            SelectedDate::Day(d) => *d,
            SelectedDate::Exact(dt) => dt.date(),
        }
    }

    fn matches(&self, when: NaiveDateTime) -> bool {
        match self {
            SelectedDate::Day(d) => when.date() == *d,
            SelectedDate::Exact(dt) => when == *dt,
        }
    }
}

/// Pick the table row a selection refers to.
pub fn find_selected_row<'a>(
    rows: &'a [PredictionRow],
    selection: &GameSelection,
) -> Option<&'a PredictionRow> {
    rows.iter().find(|r| {
        r.home_team == selection.home_team
            && r.away_team == selection.away_team
            && selection.when.matches(r.game_date)
    })
}

/// Build the detail view for one projected row.
///
/// Each lookup degrades independently: a missing pitcher, team, odds or
/// lineup only blanks its own section.
pub fn resolve_game_detail(row: &PredictionRow, tables: &Tables) -> GameDetail {
    let source = find_source_game(&tables.predictions, row);
    if source.is_none() {
        debug!(
            "No source prediction for {} @ {} on {}",
            row.away_team, row.home_team, row.game_date
        );
    }

    // Files carrying only the combined matchup column leave the names blank
    let (matchup_away, matchup_home) = split_matchup(&row.pitchers);
    let (away_pitcher_name, home_pitcher_name) = match source {
        Some(game) => (
            non_empty_or(&game.away_pitcher, matchup_away),
            non_empty_or(&game.home_pitcher, matchup_home),
        ),
        None => (matchup_away, matchup_home),
    };

    GameDetail {
        title: format!("{} @ {}", row.away_team, row.home_team),
        venue: row.venue.clone(),
        game_date: row.game_date,
        weather_summary: row.weather_summary.clone(),
        pitching_matchup: row.pitchers.clone(),
        away_pitcher: lookup_pitcher(&tables.pitcher_stats, &away_pitcher_name).into(),
        home_pitcher: lookup_pitcher(&tables.pitcher_stats, &home_pitcher_name).into(),
        away_team: lookup_team(&tables.team_stats, &row.away_team).into(),
        home_team: lookup_team(&tables.team_stats, &row.home_team).into(),
        away_hitters: top_hitters(
            &tables.player_stats,
            source.and_then(|g| g.away_lineup_ids.as_deref()),
            &row.away_team,
        ),
        home_hitters: top_hitters(
            &tables.player_stats,
            source.and_then(|g| g.home_lineup_ids.as_deref()),
            &row.home_team,
        ),
        odds: lookup_odds(&tables.live_odds, row).into(),
    }
}

/// The unprojected prediction behind a table row.
fn find_source_game<'a>(
    predictions: &'a Table<GamePrediction>,
    row: &PredictionRow,
) -> Option<&'a GamePrediction> {
    predictions.rows().iter().find(|g| {
        g.home_team == row.home_team
            && g.away_team == row.away_team
            && g.game_date == row.game_date
    })
}

/// Recover `(away, home)` pitcher names from an `"<away> vs <home>"` string.
fn split_matchup(pitchers: &str) -> (String, String) {
    match pitchers.split_once(" vs ") {
        Some((away, home)) => (away.trim().to_string(), home.trim().to_string()),
        None => (String::new(), String::new()),
    }
}

fn non_empty_or(name: &str, fallback: String) -> String {
    if name.trim().is_empty() {
        fallback
    } else {
        name.to_string()
    }
}

pub fn lookup_pitcher(pitchers: &Table<PitcherStat>, name: &str) -> Option<PitcherLine> {
    if name.is_empty() {
        return None;
    }
    pitchers
        .rows()
        .iter()
        .find(|p| p.player_name == name)
        .map(|p| PitcherLine {
            name: p.player_name.clone(),
            team: p.team.clone(),
            era: p.era,
            k9: p.k9,
            bb9: p.bb9,
            whip: p.whip,
        })
}

pub fn lookup_team(teams: &Table<TeamStat>, team: &str) -> Option<TeamLine> {
    if team.is_empty() {
        return None;
    }
    teams.rows().iter().find(|t| t.team == team).map(|t| TeamLine {
        team: t.team.clone(),
        win_pct: t.win_pct,
        era: t.era,
        hr_rate: t.hr_rate,
    })
}

/// Odds for the row's matchup.
///
/// When the odds file carries game dates, a row dated on the game's day is
/// preferred, an undated or unparseable row is accepted as a fallback, and a
/// row dated on another day is never used.
pub fn lookup_odds(odds: &Table<LiveOdds>, row: &PredictionRow) -> Option<OddsLine> {
    let mut candidates = odds
        .rows()
        .iter()
        .filter(|o| o.home_team == row.home_team && o.away_team == row.away_team);

    let chosen = if odds.has_column("gameDate") {
        let day = row.game_date.date();
        let mut undated = None;
        let mut dated = None;
        for o in candidates {
            match o.game_date {
                Some(d) if d.date() == day => {
                    dated = Some(o);
                    break;
                }
                Some(_) => {}
                None => {
                    undated.get_or_insert(o);
                }
            }
        }
        dated.or(undated)
    } else {
        candidates.next()
    };

    chosen.filter(|o| o.is_priced()).map(|o| OddsLine {
        home_odds: o.home_odds.clone().unwrap_or_default(),
        away_odds: o.away_odds.clone().unwrap_or_default(),
        draw_odds: o.draw_odds.clone(),
        source: o.source.clone(),
        last_updated: o.last_updated,
    })
}

/// Highest-HR-rate batters from the lineup who play for `team`.
///
/// Ties keep file order; unknown or malformed lineups give an empty list.
pub fn top_hitters(
    players: &Table<PlayerHrStat>,
    lineup: Option<&str>,
    team: &str,
) -> Vec<HitterLine> {
    let Some(text) = lineup else {
        return Vec::new();
    };
    let ids: HashSet<String> = match parse_lineup_ids(text) {
        Ok(ids) => ids.into_iter().collect(),
        Err(e) => {
            debug!("Ignoring lineup for {}: {}", team, e);
            return Vec::new();
        }
    };

    let mut subset: Vec<&PlayerHrStat> = players
        .rows()
        .iter()
        .filter(|p| p.team == team && ids.contains(&p.player_id))
        .collect();
    // sort_by is stable; missing rates sink to the bottom
    subset.sort_by(|a, b| {
        let ra = a.hr_rate.unwrap_or(f64::NEG_INFINITY);
        let rb = b.hr_rate.unwrap_or(f64::NEG_INFINITY);
        rb.total_cmp(&ra)
    });

    subset
        .into_iter()
        .take(TOP_HITTERS)
        .map(|p| HitterLine {
            player_id: p.player_id.clone(),
            name: p.player_name.clone(),
            hr_rate: p.hr_rate,
            hr: p.hr,
            pa: p.pa,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::filter::tests::game;
    use crate::dashboard::filter::{filter_predictions, PredictionFilter};
    use crate::data::{live_odds_from_reader, pitcher_stats_from_reader, player_stats_from_reader, team_stats_from_reader};

    const PLAYERS_CSV: &str = "\
player_id,player_name,team,hr_rate,hr,pa
1,Alpha,NYY,0.10,50,500
2,Bravo,NYY,0.08,40,500
3,Charlie,NYY,0.08,40,500
4,Delta,NYY,0.05,25,500
5,Echo,NYY,0.20,100,500
6,Foxtrot,BOS,0.30,90,300
";

    const PITCHERS_CSV: &str = "\
player_id,player_name,team,ERA,K9,BB9,WHIP
543037,Gerrit Cole,NYY,3.41,9.9,2.1,1.13
";

    const TEAMS_CSV: &str = "\
team,win_pct,era,hr_rate
NYY,0.580,3.74,0.041
BOS,0.500,4.02,0.035
";

    const ODDS_CSV: &str = "\
gamePk,away_team,home_team,away_odds,home_odds,draw_odds,source,last_updated
100,BOS,NYY,+120,-140,,DraftKings,2024-06-01T12:00:00Z
";

    fn tables() -> Tables {
        let mut g = game("NYY", "BOS", "2024-06-01 19:05:00");
        g.home_pitcher = "Nestor Cortes".into();
        g.away_pitcher = "Brayan Bello".into();
        g.home_lineup_ids = Some("[1, 2, 3, 4, 5, 6]".into());
        g.away_lineup_ids = Some("['6']".into());

        let mut cole = game("NYY", "TB", "2024-06-02 13:05:00");
        cole.home_pitcher = "Gerrit Cole".into();

        Tables {
            predictions: Table::new(vec!["gameDate".into()], vec![g, cole]),
            player_stats: player_stats_from_reader(PLAYERS_CSV.as_bytes()).unwrap(),
            pitcher_stats: pitcher_stats_from_reader(PITCHERS_CSV.as_bytes()).unwrap(),
            team_stats: team_stats_from_reader(TEAMS_CSV.as_bytes()).unwrap(),
            live_odds: live_odds_from_reader(ODDS_CSV.as_bytes()).unwrap(),
        }
    }

    fn row_for(tables: &Tables, home: &str, away: &str) -> PredictionRow {
        let view = filter_predictions(&PredictionFilter::default(), &tables.predictions, &tables.live_odds);
        view.rows
            .into_iter()
            .find(|r| r.home_team == home && r.away_team == away)
            .unwrap()
    }

    #[test]
    fn top_three_hitters_by_rate_with_stable_ties() {
        let players = player_stats_from_reader(PLAYERS_CSV.as_bytes()).unwrap();
        let top = top_hitters(&players, Some("[1, 2, 3, 4, 5]"), "NYY");
        let names: Vec<&str> = top.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Echo", "Alpha", "Bravo"]);
    }

    #[test]
    fn hitters_must_be_in_lineup_and_on_team() {
        let players = player_stats_from_reader(PLAYERS_CSV.as_bytes()).unwrap();
        // Foxtrot is listed but plays for BOS; Echo is on NYY but not listed.
        let top = top_hitters(&players, Some("[2, 6]"), "NYY");
        let names: Vec<&str> = top.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Bravo"]);
    }

    #[test]
    fn missing_or_malformed_lineup_gives_no_hitters() {
        let players = player_stats_from_reader(PLAYERS_CSV.as_bytes()).unwrap();
        assert!(top_hitters(&players, None, "NYY").is_empty());
        assert!(top_hitters(&players, Some("print(1)"), "NYY").is_empty());
        assert!(top_hitters(&Table::empty(), Some("[1]"), "NYY").is_empty());
    }

    #[test]
    fn unmatched_home_pitcher_only_blanks_that_section() {
        let tables = tables();
        let row = row_for(&tables, "NYY", "BOS");
        let detail = resolve_game_detail(&row, &tables);

        assert_eq!(detail.home_pitcher, Section::Unavailable);
        assert_eq!(detail.away_pitcher, Section::Unavailable);
        assert!(detail.home_team.is_available());
        assert!(detail.away_team.is_available());
        assert!(detail.odds.is_available());
        assert_eq!(detail.home_hitters.len(), 3);
        assert_eq!(detail.away_hitters.len(), 1);
        assert_eq!(detail.away_hitters[0].name, "Foxtrot");
        assert_eq!(detail.title, "BOS @ NYY");
        assert_eq!(detail.pitching_matchup, "Brayan Bello vs Nestor Cortes");
    }

    #[test]
    fn matched_pitcher_carries_stat_line() {
        let tables = tables();
        let row = row_for(&tables, "NYY", "TB");
        let detail = resolve_game_detail(&row, &tables);
        match &detail.home_pitcher {
            Section::Available(line) => {
                assert_eq!(line.name, "Gerrit Cole");
                assert_eq!(line.era, Some(3.41));
            }
            Section::Unavailable => panic!("expected Cole's line"),
        }
        assert_eq!(detail.away_team, Section::Unavailable);
        assert_eq!(detail.odds, Section::Unavailable);
        assert!(detail.home_hitters.is_empty());
    }

    #[test]
    fn pitcher_names_recovered_from_matchup_without_source_row() {
        let mut tables = tables();
        let row = row_for(&tables, "NYY", "TB");
        tables.predictions = Table::empty();
        let detail = resolve_game_detail(&row, &tables);
        // "<away> vs <home>" where away pitcher is blank
        assert!(detail.home_pitcher.is_available());
        assert!(detail.home_hitters.is_empty());
    }

    #[test]
    fn blank_source_pitchers_fall_back_to_matchup_column() {
        let mut tables = tables();
        let mut g = game("NYY", "BOS", "2024-06-03 19:05:00");
        g.pitchers = Some("Brayan Bello vs Gerrit Cole".into());
        tables.predictions = Table::new(vec!["gameDate".into(), "pitchers".into()], vec![g]);

        let row = row_for(&tables, "NYY", "BOS");
        let detail = resolve_game_detail(&row, &tables);
        match &detail.home_pitcher {
            Section::Available(line) => assert_eq!(line.name, "Gerrit Cole"),
            Section::Unavailable => panic!("expected Cole's line from the matchup"),
        }
        assert_eq!(detail.away_pitcher, Section::Unavailable);
        assert_eq!(detail.pitching_matchup, "Brayan Bello vs Gerrit Cole");
    }

    #[test]
    fn everything_unavailable_with_no_auxiliary_data() {
        let full = tables();
        let row = row_for(&full, "NYY", "BOS");
        let tables = Tables {
            predictions: full.predictions,
            ..Tables::default()
        };
        let detail = resolve_game_detail(&row, &tables);
        assert_eq!(detail.home_team, Section::Unavailable);
        assert_eq!(detail.odds, Section::Unavailable);
        assert!(detail.home_hitters.is_empty());
        assert_eq!(detail.venue, "NYY Park");
    }

    #[test]
    fn odds_prefer_same_day_then_undated() {
        let csv = "\
gameDate,away_team,home_team,away_odds,home_odds,source,last_updated
2024-05-31,BOS,NYY,+300,-400,Old,
tbd,BOS,NYY,+110,-130,Undated,
2024-06-01 00:00:00,BOS,NYY,+120,-140,Today,
";
        let odds = live_odds_from_reader(csv.as_bytes()).unwrap();
        let tables = tables();
        let row = row_for(&tables, "NYY", "BOS");
        assert_eq!(lookup_odds(&odds, &row).unwrap().source, "Today");

        let without_today = Table::new(
            vec!["gameDate".to_string()],
            odds.rows()[..2].to_vec(),
        );
        assert_eq!(lookup_odds(&without_today, &row).unwrap().source, "Undated");

        let only_old = Table::new(vec!["gameDate".to_string()], odds.rows()[..1].to_vec());
        assert!(lookup_odds(&only_old, &row).is_none());
    }

    #[test]
    fn odds_line_omits_draw_when_unpriced() {
        let tables = tables();
        let row = row_for(&tables, "NYY", "BOS");
        let line = lookup_odds(&tables.live_odds, &row).unwrap();
        assert_eq!(line.home_odds, "-140");
        assert!(line.last_updated.is_some());
        let json = serde_json::to_value(&line).unwrap();
        assert!(json.get("draw_odds").is_none());
    }

    #[test]
    fn section_serializes_with_status_tag() {
        let unavailable: Section<TeamLine> = Section::Unavailable;
        assert_eq!(
            serde_json::to_value(&unavailable).unwrap(),
            serde_json::json!({"status": "unavailable"})
        );
    }

    #[test]
    fn selection_matches_day_or_exact_time() {
        let tables = tables();
        let rows = filter_predictions(&PredictionFilter::default(), &tables.predictions, &tables.live_odds).rows;

        let by_day = GameSelection {
            home_team: "NYY".into(),
            away_team: "BOS".into(),
            when: SelectedDate::parse("2024-06-01").unwrap(),
        };
        assert!(find_selected_row(&rows, &by_day).is_some());

        let wrong_time = GameSelection {
            when: SelectedDate::parse("2024-06-01T13:05:00").unwrap(),
            ..by_day.clone()
        };
        assert!(find_selected_row(&rows, &wrong_time).is_none());

        let exact = GameSelection {
            when: SelectedDate::parse("2024-06-01 19:05:00").unwrap(),
            ..by_day
        };
        assert!(find_selected_row(&rows, &exact).is_some());
        assert!(SelectedDate::parse("someday").is_none());
    }
}
