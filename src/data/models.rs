use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Model prediction for one upcoming game, as loaded from the predictions file.
#[derive(Debug, Clone, PartialEq)]
pub struct GamePrediction {
    pub game_date: NaiveDateTime,
    pub home_team: String,
    pub away_team: String,
    /// Recommended winning side
    pub pick: String,
    /// Home win probability as a percentage (0–100, one decimal place)
    pub home_win_prob: Option<f64>,
    /// Away win probability as a percentage (0–100, one decimal place)
    pub away_win_prob: Option<f64>,
    pub venue: String,
    /// Degrees Fahrenheit
    pub temperature: Option<f64>,
    /// Relative humidity percent
    pub humidity: Option<f64>,
    /// Miles per hour
    pub windspeed: Option<f64>,
    /// Free-form weather description used when no temperature is known
    pub weather: Option<String>,
    /// Precomputed summary, used as-is when the producer already wrote one
    pub weather_summary: Option<String>,
    /// Precomputed "<away> vs <home>" matchup string
    pub pitchers: Option<String>,
    pub home_pitcher: String,
    pub away_pitcher: String,
    /// Serialized list of expected home batter ids, e.g. `[660271, 592450]`
    pub home_lineup_ids: Option<String>,
    pub away_lineup_ids: Option<String>,
    pub game_pk: Option<i64>,
}

/// Season home-run profile of one batter.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerHrStat {
    /// Canonical id, see [`normalize_player_id`]
    pub player_id: String,
    pub player_name: String,
    pub team: String,
    pub hr_rate: Option<f64>,
    pub hr: Option<u32>,
    pub pa: Option<u32>,
}

/// Season line of one pitcher.
#[derive(Debug, Clone, PartialEq)]
pub struct PitcherStat {
    pub player_id: String,
    pub player_name: String,
    pub team: String,
    pub era: Option<f64>,
    pub k9: Option<f64>,
    pub bb9: Option<f64>,
    pub whip: Option<f64>,
}

/// Season line of one team.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamStat {
    pub team: String,
    pub win_pct: Option<f64>,
    pub era: Option<f64>,
    pub hr_rate: Option<f64>,
}

/// Latest bookmaker line for one game.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveOdds {
    pub game_pk: Option<i64>,
    /// Only set when the odds file carries a `gameDate` column that parses
    pub game_date: Option<NaiveDateTime>,
    pub home_team: String,
    pub away_team: String,
    /// Odds are kept verbatim ("-150", "+120", "1.85") since books disagree on format
    pub home_odds: Option<String>,
    pub away_odds: Option<String>,
    pub draw_odds: Option<String>,
    pub source: String,
    pub last_updated: Option<DateTime<Utc>>,
}

impl LiveOdds {
    /// A row with neither side priced carries no usable line.
    pub fn is_priced(&self) -> bool {
        self.home_odds.is_some() || self.away_odds.is_some()
    }
}

// ── Raw CSV rows ─────────────────────────────────────────────────────────────
//
// Every column is optional at the serde level so that a file missing a column
// still loads; defaults are applied when converting into the public types.

#[derive(Debug, Deserialize)]
pub(super) struct RawPrediction {
    #[serde(rename = "gameDate", default)]
    pub game_date: String,
    #[serde(default)]
    pub home_team: String,
    #[serde(default)]
    pub away_team: String,
    #[serde(default)]
    pub pick: String,
    #[serde(default, deserialize_with = "finite_float")]
    pub home_win_prob: Option<f64>,
    #[serde(default, deserialize_with = "finite_float")]
    pub away_win_prob: Option<f64>,
    #[serde(default)]
    pub venue: String,
    #[serde(default, deserialize_with = "finite_float")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "finite_float")]
    pub humidity: Option<f64>,
    #[serde(default, deserialize_with = "finite_float")]
    pub windspeed: Option<f64>,
    #[serde(default)]
    pub weather: Option<String>,
    #[serde(default)]
    pub weather_summary: Option<String>,
    #[serde(default)]
    pub pitchers: Option<String>,
    #[serde(default)]
    pub home_pitcher: String,
    #[serde(default)]
    pub away_pitcher: String,
    #[serde(default)]
    pub home_lineup_ids: Option<String>,
    #[serde(default)]
    pub away_lineup_ids: Option<String>,
    #[serde(rename = "gamePk", default, deserialize_with = "whole_number")]
    pub game_pk: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawPlayerHrStat {
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub player_name: String,
    #[serde(default)]
    pub team: String,
    #[serde(default, deserialize_with = "finite_float")]
    pub hr_rate: Option<f64>,
    #[serde(default, deserialize_with = "whole_number")]
    pub hr: Option<i64>,
    #[serde(default, deserialize_with = "whole_number")]
    pub pa: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawPitcherStat {
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub player_name: String,
    #[serde(default)]
    pub team: String,
    #[serde(rename = "ERA", default, deserialize_with = "finite_float")]
    pub era: Option<f64>,
    #[serde(rename = "K9", default, deserialize_with = "finite_float")]
    pub k9: Option<f64>,
    #[serde(rename = "BB9", default, deserialize_with = "finite_float")]
    pub bb9: Option<f64>,
    #[serde(rename = "WHIP", default, deserialize_with = "finite_float")]
    pub whip: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawTeamStat {
    #[serde(default)]
    pub team: String,
    #[serde(default, deserialize_with = "finite_float")]
    pub win_pct: Option<f64>,
    #[serde(default, deserialize_with = "finite_float")]
    pub era: Option<f64>,
    #[serde(default, deserialize_with = "finite_float")]
    pub hr_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawLiveOdds {
    #[serde(rename = "gamePk", default, deserialize_with = "whole_number")]
    pub game_pk: Option<i64>,
    #[serde(rename = "gameDate", default)]
    pub game_date: Option<String>,
    #[serde(default)]
    pub home_team: String,
    #[serde(default)]
    pub away_team: String,
    #[serde(default)]
    pub home_odds: Option<String>,
    #[serde(default)]
    pub away_odds: Option<String>,
    #[serde(default)]
    pub draw_odds: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// Parse a float cell, treating blanks, garbage, NaN and infinities as missing.
fn finite_float<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite()))
}

/// Parse an integer cell that may have been written as a float ("745123.0").
fn whole_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| parse_whole_number(s.trim())))
}

fn parse_whole_number(s: &str) -> Option<i64> {
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

// ── Normalization helpers ────────────────────────────────────────────────────

/// Canonical string form of a player id.
///
/// Producers write ids as `660271`, `660271.0`, `"0660271"` or with stray
/// whitespace depending on how the column was typed. All of these map to
/// `660271` so that id joins against lineup lists are reliable.
pub fn normalize_player_id(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();

    if let Some((int, frac)) = trimmed.split_once('.') {
        if is_digits(int) && frac.bytes().all(|b| b == b'0') {
            return strip_leading_zeros(int);
        }
    }
    if is_digits(trimmed) {
        return strip_leading_zeros(trimmed);
    }
    trimmed.to_string()
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn strip_leading_zeros(digits: &str) -> String {
    let stripped = digits.trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// Convert a stored 0–1 probability into a percentage with one decimal place.
pub fn probability_to_percent(fraction: f64) -> f64 {
    (fraction * 100.0 * 10.0).round() / 10.0
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Parse the date and timestamp shapes seen in the data files.
///
/// An offset is dropped, keeping the wall-clock time the producer wrote so the
/// game stays on its local day. Bare dates land on midnight.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(dt) = parse_with_offset(s) {
        return Some(dt.naive_local());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
    {
        return Some(dt);
    }
    parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_with_offset(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z"))
        .ok()
}

/// Parse a calendar date without a time component.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
}

/// Parse a timestamp as UTC; unparseable values are missing, not errors.
///
/// Offsets are folded into UTC; naive values are taken as already UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match parse_with_offset(raw.trim()) {
        Some(dt) => Some(dt.with_timezone(&Utc)),
        None => parse_datetime(raw).map(|dt| dt.and_utc()),
    }
}
