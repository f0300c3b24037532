use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::data::models::{GamePrediction, LiveOdds};
use crate::data::Table;

/// User-selected narrowing of the predictions table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionFilter {
    /// Calendar day; time of day is ignored
    pub date: Option<NaiveDate>,
    /// Keep games where either side is one of these teams; empty keeps all
    pub teams: Vec<String>,
}

/// One row of the predictions table.
///
/// Field order is the column order the dashboard relies on; do not reorder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRow {
    #[serde(rename = "gameDate")]
    pub game_date: NaiveDateTime,
    pub away_team: String,
    pub home_team: String,
    pub pick: String,
    pub home_win_prob: Option<f64>,
    pub away_win_prob: Option<f64>,
    pub venue: String,
    pub weather_summary: String,
    pub pitchers: String,
    pub home_odds: String,
    pub away_odds: String,
}

/// Everything the predictions table and its filter widgets need.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PredictionView {
    pub rows: Vec<PredictionRow>,
    /// Earliest game day in the unfiltered table
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    /// Day the date picker opens on
    pub initial_date: Option<NaiveDate>,
    /// Every team appearing on either side, sorted
    pub teams: Vec<String>,
}

/// How prediction rows find their odds row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OddsJoin {
    GamePk,
    Matchup,
    Unavailable,
}

fn odds_join(predictions: &Table<GamePrediction>, odds: &Table<LiveOdds>) -> OddsJoin {
    if odds.is_empty() {
        OddsJoin::Unavailable
    } else if predictions.has_column("gamePk") && odds.has_column("gamePk") {
        OddsJoin::GamePk
    } else if odds.has_column("home_team") && odds.has_column("away_team") {
        OddsJoin::Matchup
    } else {
        OddsJoin::Unavailable
    }
}

/// Odds rows indexed by both join keys; the first row for a key wins.
struct OddsIndex<'a> {
    join: OddsJoin,
    by_game_pk: HashMap<i64, &'a LiveOdds>,
    by_matchup: HashMap<(&'a str, &'a str), &'a LiveOdds>,
}

impl<'a> OddsIndex<'a> {
    fn build(join: OddsJoin, odds: &'a Table<LiveOdds>) -> Self {
        let mut by_game_pk = HashMap::new();
        let mut by_matchup = HashMap::new();
        if join != OddsJoin::Unavailable {
            for row in odds.rows() {
                if let Some(pk) = row.game_pk {
                    by_game_pk.entry(pk).or_insert(row);
                }
                by_matchup
                    .entry((row.home_team.as_str(), row.away_team.as_str()))
                    .or_insert(row);
            }
        }
        OddsIndex {
            join,
            by_game_pk,
            by_matchup,
        }
    }

    fn lookup(&self, game: &GamePrediction) -> Option<&'a LiveOdds> {
        let by_matchup = || {
            self.by_matchup
                .get(&(game.home_team.as_str(), game.away_team.as_str()))
                .copied()
        };
        match self.join {
            // A row without its own gamePk falls back to the matchup key
            OddsJoin::GamePk => match game.game_pk {
                Some(pk) => self.by_game_pk.get(&pk).copied(),
                None => by_matchup(),
            },
            OddsJoin::Matchup => by_matchup(),
            OddsJoin::Unavailable => None,
        }
    }
}

/// Narrow the predictions and project them onto the fixed table columns.
pub fn filter_predictions(
    filter: &PredictionFilter,
    predictions: &Table<GamePrediction>,
    odds: &Table<LiveOdds>,
) -> PredictionView {
    if predictions.is_empty() {
        return PredictionView::default();
    }

    let min_date = predictions.rows().iter().map(|p| p.game_date.date()).min();
    let max_date = predictions.rows().iter().map(|p| p.game_date.date()).max();
    let teams: BTreeSet<&str> = predictions
        .rows()
        .iter()
        .flat_map(|p| [p.home_team.as_str(), p.away_team.as_str()])
        .collect();

    let wanted: HashSet<&str> = filter.teams.iter().map(String::as_str).collect();
    let index = OddsIndex::build(odds_join(predictions, odds), odds);

    let rows = predictions
        .rows()
        .iter()
        .filter(|p| filter.date.map_or(true, |d| p.game_date.date() == d))
        .filter(|p| {
            wanted.is_empty()
                || wanted.contains(p.home_team.as_str())
                || wanted.contains(p.away_team.as_str())
        })
        .map(|p| project(p, index.lookup(p)))
        .collect();

    PredictionView {
        rows,
        min_date,
        max_date,
        initial_date: min_date,
        teams: teams.into_iter().map(str::to_string).collect(),
    }
}

fn project(game: &GamePrediction, odds: Option<&LiveOdds>) -> PredictionRow {
    PredictionRow {
        game_date: game.game_date,
        away_team: game.away_team.clone(),
        home_team: game.home_team.clone(),
        pick: game.pick.clone(),
        home_win_prob: game.home_win_prob,
        away_win_prob: game.away_win_prob,
        venue: game.venue.clone(),
        weather_summary: summarize_weather(game),
        pitchers: summarize_pitchers(game),
        home_odds: odds.and_then(|o| o.home_odds.clone()).unwrap_or_default(),
        away_odds: odds.and_then(|o| o.away_odds.clone()).unwrap_or_default(),
    }
}

/// `"72°F, 55% RH, 9 mph"` when a temperature is known, else the raw text.
pub fn summarize_weather(game: &GamePrediction) -> String {
    if let Some(summary) = game.weather_summary.as_deref().filter(|s| !s.is_empty()) {
        return summary.to_string();
    }
    match game.temperature {
        Some(temp) => format!(
            "{:.0}°F, {:.0}% RH, {:.0} mph",
            temp,
            game.humidity.unwrap_or(0.0),
            game.windspeed.unwrap_or(0.0)
        ),
        None => game.weather.clone().unwrap_or_default(),
    }
}

/// `"<away pitcher> vs <home pitcher>"`.
pub fn summarize_pitchers(game: &GamePrediction) -> String {
    if let Some(pitchers) = game.pitchers.as_deref().filter(|s| !s.is_empty()) {
        return pitchers.to_string();
    }
    format!("{} vs {}", game.away_pitcher, game.home_pitcher)
}
