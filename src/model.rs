//! Raw payload shapes embedded in the stats site's pages, and the canonical
//! records the rest of the crate works with.
//!
//! Every level of the raw payload is optional. Absent teams, events, rounds,
//! modes and maps resolve to the sentinels below instead of failing the
//! decode, and numbers are accepted as integers, floats or numeric strings.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const UNKNOWN: &str = "Unknown";
pub const TBD: &str = "TBD";
pub const DEFAULT_BEST_OF: u32 = 5;
pub const STATUS_COMPLETE: &str = "complete";

/// The three tracked game types, in display order.
pub const TRACKED_MODES: [&str; 3] = ["Hardpoint", "Search & Destroy", "Overload"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMatch {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub id: Option<u64>,
    #[serde(default)]
    pub datetime: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub team_1_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub team_2_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub team_1_score: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub team_2_score: Option<i64>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub best_of: Option<u32>,
    #[serde(default)]
    pub team1: Option<RawTeam>,
    #[serde(default)]
    pub team2: Option<RawTeam>,
    #[serde(default)]
    pub event: Option<RawEvent>,
    #[serde(default)]
    pub round: Option<RawNamed>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTeam {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub season_id: Option<i64>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNamed {
    #[serde(default)]
    pub name: Option<String>,
}

impl RawMatch {
    pub fn is_complete(&self) -> bool {
        self.status.as_deref() == Some(STATUS_COMPLETE)
    }

    pub fn event_name(&self) -> &str {
        self.event
            .as_ref()
            .and_then(|e| e.name.as_deref())
            .unwrap_or(UNKNOWN)
    }

    pub fn season_id(&self) -> Option<i64> {
        self.event.as_ref().and_then(|e| e.season_id)
    }

    /// Anything but an explicitly online event counts as LAN; no event at all
    /// counts as online.
    pub fn is_lan(&self) -> bool {
        self.event
            .as_ref()
            .map(|e| {
                !e.kind
                    .as_deref()
                    .unwrap_or_default()
                    .eq_ignore_ascii_case("online")
            })
            .unwrap_or(false)
    }

    pub fn best_of(&self) -> u32 {
        self.best_of.unwrap_or(DEFAULT_BEST_OF)
    }

    pub fn round_name(&self) -> &str {
        self.round
            .as_ref()
            .and_then(|r| r.name.as_deref())
            .unwrap_or_default()
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        self.datetime.as_deref().and_then(parse_match_datetime)
    }

    pub fn team_name(&self, side: Side, fallback: &str) -> String {
        let team = match side {
            Side::One => self.team1.as_ref(),
            Side::Two => self.team2.as_ref(),
        };
        team.and_then(|t| t.name.as_deref())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(fallback)
            .to_string()
    }

    pub fn team_id(&self, side: Side) -> Option<u64> {
        let (direct, nested) = match side {
            Side::One => (self.team_1_id, self.team1.as_ref()),
            Side::Two => (self.team_2_id, self.team2.as_ref()),
        };
        direct.or_else(|| nested.and_then(|t| t.id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    One,
    Two,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGame {
    #[serde(default, deserialize_with = "lenient_u32")]
    pub game_num: Option<u32>,
    #[serde(default)]
    pub modes: Option<RawNamed>,
    #[serde(default)]
    pub maps: Option<RawNamed>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub team_1_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub team_2_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub team_1_score: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub team_2_score: Option<i64>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub player_stats: Vec<RawPlayerStat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlayerStat {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub player_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub player_tag: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub team_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub kills: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub deaths: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub assists: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub damage: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub hill_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub plant_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub defuse_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bp_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRef {
    pub id: Option<u64>,
    pub name: String,
}

/// A completed, scored match of the tracked competition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSummary {
    pub id: u64,
    pub start: NaiveDateTime,
    pub event_name: String,
    pub season_id: i64,
    pub best_of: u32,
    pub is_lan: bool,
    pub team1: TeamRef,
    pub team2: TeamRef,
    pub team1_score: i64,
    pub team2_score: i64,
}

impl MatchSummary {
    /// Builds a summary when the raw entry has an id, a start time, both
    /// series scores and a season. Status and competition are the caller's
    /// filter.
    pub fn from_raw(raw: &RawMatch) -> Option<Self> {
        Some(Self {
            id: raw.id?,
            start: raw.start()?,
            event_name: raw.event_name().to_string(),
            season_id: raw.season_id()?,
            best_of: raw.best_of(),
            is_lan: raw.is_lan(),
            team1: TeamRef {
                id: raw.team_id(Side::One),
                name: raw.team_name(Side::One, UNKNOWN),
            },
            team2: TeamRef {
                id: raw.team_id(Side::Two),
                name: raw.team_name(Side::Two, UNKNOWN),
            },
            team1_score: raw.team_1_score?,
            team2_score: raw.team_2_score?,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn series_type(&self) -> String {
        format!("BO{}", self.best_of)
    }
}

/// One map within a match, with its winner derived from the map score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub game_num: u32,
    pub mode: String,
    pub map: String,
    pub team1_id: Option<u64>,
    pub team2_id: Option<u64>,
    pub team1_score: Option<i64>,
    pub team2_score: Option<i64>,
    pub winning_team_id: Option<u64>,
}

/// One player's line for one map of one match.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatRecord {
    pub match_id: u64,
    pub date: NaiveDate,
    pub event_name: String,
    pub season: i64,
    pub series_type: String,
    pub is_lan: bool,
    pub player_name: String,
    pub team_name: String,
    pub opponent_team_name: String,
    pub position: Option<String>,
    pub map_number: u32,
    pub map_name: String,
    pub mode: String,
    pub kills: i64,
    pub deaths: i64,
    pub assists: i64,
    pub damage: f64,
    pub hill_time: Option<i64>,
    pub plants: Option<i64>,
    pub defuses: Option<i64>,
    pub rating: f64,
    pub won_map: Option<bool>,
    pub team_score: Option<i64>,
    pub opponent_score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingMatch {
    pub id: u64,
    pub start: Option<NaiveDateTime>,
    pub team1: String,
    pub team2: String,
    pub event_name: String,
    pub status: String,
    pub best_of: u32,
    pub round_name: String,
}

/// Parses the source's match timestamps, keeping the wall-clock time of the
/// offset they were published in. A bare date resolves to midnight.
pub fn parse_match_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_local());
    }
    for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, layout) {
            return Some(dt);
        }
    }
    trimmed
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn as_i64_any(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    if let Some(f) = v.as_f64() {
        return f.is_finite().then(|| f.round() as i64);
    }
    let s = v.as_str()?.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))
}

fn as_f64_any(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.as_ref().and_then(as_i64_any))
}

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value
        .as_ref()
        .and_then(as_i64_any)
        .and_then(|n| u64::try_from(n).ok()))
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value
        .as_ref()
        .and_then(as_i64_any)
        .and_then(|n| u32::try_from(n).ok()))
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.as_ref().and_then(as_f64_any))
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn nullable_vec<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(d)?.unwrap_or_default())
}
