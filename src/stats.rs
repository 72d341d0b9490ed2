//! Aggregates over cached player records: the views the dashboard reads.
//!
//! Filters are passed per call; nothing here keeps selection state.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::model::{PlayerStatRecord, TRACKED_MODES};
use crate::normalize::round2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub team: Option<String>,
    pub opponent: Option<String>,
    pub mode: Option<String>,
    pub map_name: Option<String>,
    pub season: Option<i64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl RecordFilter {
    pub fn matches(&self, r: &PlayerStatRecord) -> bool {
        fn eq(want: Option<&str>, have: &str) -> bool {
            want.is_none_or(|w| w == have)
        }
        eq(self.team.as_deref(), &r.team_name)
            && eq(self.opponent.as_deref(), &r.opponent_team_name)
            && eq(self.mode.as_deref(), &r.mode)
            && eq(self.map_name.as_deref(), &r.map_name)
            && self.season.is_none_or(|s| s == r.season)
            && self.date_from.is_none_or(|d| r.date >= d)
            && self.date_to.is_none_or(|d| r.date <= d)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineSummary {
    pub maps_played: usize,
    pub avg_kills: f64,
    pub avg_deaths: f64,
    pub avg_assists: f64,
    pub avg_damage: f64,
    pub avg_rating: f64,
    pub kd_ratio: f64,
    pub total_kills: i64,
    pub total_deaths: i64,
    pub total_damage: f64,
    pub wins: usize,
    /// Over maps with a decided result; `None` when there were none.
    pub win_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModeSummary {
    pub mode: String,
    pub summary: LineSummary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeamRecord {
    pub map_wins: usize,
    pub map_losses: usize,
    pub series_wins: usize,
    pub series_losses: usize,
}

pub fn player_summary(
    records: &[PlayerStatRecord],
    player: &str,
    filter: &RecordFilter,
) -> Option<LineSummary> {
    summarize(player_lines(records, player, filter))
}

/// Per-mode summaries, tracked modes first in their usual order.
pub fn mode_breakdown(
    records: &[PlayerStatRecord],
    player: &str,
    filter: &RecordFilter,
) -> Vec<ModeSummary> {
    let mut by_mode: BTreeMap<&str, Vec<&PlayerStatRecord>> = BTreeMap::new();
    for r in player_lines(records, player, filter) {
        by_mode.entry(r.mode.as_str()).or_default().push(r);
    }

    let mut out = Vec::new();
    for mode in TRACKED_MODES {
        if let Some(lines) = by_mode.remove(mode)
            && let Some(summary) = summarize(lines)
        {
            out.push(ModeSummary {
                mode: mode.to_string(),
                summary,
            });
        }
    }
    for (mode, lines) in by_mode {
        if let Some(summary) = summarize(lines) {
            out.push(ModeSummary {
                mode: mode.to_string(),
                summary,
            });
        }
    }
    out
}

/// Map and series results for `team`. A series counts once it has more maps
/// won than lost (or the reverse); level series count as neither.
pub fn team_record(records: &[PlayerStatRecord], team: &str, filter: &RecordFilter) -> TeamRecord {
    let mut maps: HashMap<(u64, u32), bool> = HashMap::new();
    for r in records
        .iter()
        .filter(|r| r.team_name == team && filter.matches(r))
    {
        if let Some(won) = r.won_map {
            maps.entry((r.match_id, r.map_number)).or_insert(won);
        }
    }

    let mut record = TeamRecord::default();
    let mut per_series: HashMap<u64, (usize, usize)> = HashMap::new();
    for ((match_id, _), won) in &maps {
        let entry = per_series.entry(*match_id).or_default();
        if *won {
            record.map_wins += 1;
            entry.0 += 1;
        } else {
            record.map_losses += 1;
            entry.1 += 1;
        }
    }
    for (won, lost) in per_series.values() {
        if won > lost {
            record.series_wins += 1;
        } else if lost > won {
            record.series_losses += 1;
        }
    }
    record
}

fn player_lines<'a>(
    records: &'a [PlayerStatRecord],
    player: &'a str,
    filter: &'a RecordFilter,
) -> impl Iterator<Item = &'a PlayerStatRecord> {
    records
        .iter()
        .filter(move |r| r.player_name == player && filter.matches(r))
}

fn summarize<'a>(lines: impl IntoIterator<Item = &'a PlayerStatRecord>) -> Option<LineSummary> {
    let mut n = 0usize;
    let (mut kills, mut deaths, mut assists) = (0i64, 0i64, 0i64);
    let (mut damage, mut rating) = (0.0f64, 0.0f64);
    let (mut wins, mut decided) = (0usize, 0usize);
    for r in lines {
        n += 1;
        kills += r.kills;
        deaths += r.deaths;
        assists += r.assists;
        damage += r.damage;
        rating += r.rating;
        if let Some(won) = r.won_map {
            decided += 1;
            if won {
                wins += 1;
            }
        }
    }
    if n == 0 {
        return None;
    }

    let count = n as f64;
    Some(LineSummary {
        maps_played: n,
        avg_kills: round2(kills as f64 / count),
        avg_deaths: round2(deaths as f64 / count),
        avg_assists: round2(assists as f64 / count),
        avg_damage: round2(damage / count),
        avg_rating: round2(rating / count),
        kd_ratio: round2(kills as f64 / deaths.max(1) as f64),
        total_kills: kills,
        total_deaths: deaths,
        total_damage: damage,
        wins,
        win_rate: (decided > 0).then(|| round2(wins as f64 / decided as f64)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(
        match_id: u64,
        map_number: u32,
        player: &str,
        team: &str,
        mode: &str,
        kills: i64,
        deaths: i64,
        won: Option<bool>,
    ) -> PlayerStatRecord {
        PlayerStatRecord {
            match_id,
            date: NaiveDate::from_ymd_opt(2025, 1, 18).unwrap(),
            event_name: "CDL Major 1".to_string(),
            season: 2026,
            series_type: "BO5".to_string(),
            is_lan: false,
            player_name: player.to_string(),
            team_name: team.to_string(),
            opponent_team_name: "Other".to_string(),
            position: None,
            map_number,
            map_name: "Skyline".to_string(),
            mode: mode.to_string(),
            kills,
            deaths,
            assists: 0,
            damage: 100.0,
            hill_time: None,
            plants: None,
            defuses: None,
            rating: 1.0,
            won_map: won,
            team_score: None,
            opponent_score: None,
        }
    }

    fn records() -> Vec<PlayerStatRecord> {
        vec![
            line(1, 1, "Dashy", "OpTic", "Hardpoint", 30, 20, Some(true)),
            line(1, 1, "Shotzzy", "OpTic", "Hardpoint", 25, 22, Some(true)),
            line(1, 2, "Dashy", "OpTic", "Search & Destroy", 8, 6, Some(false)),
            line(1, 3, "Dashy", "OpTic", "Overload", 20, 20, Some(true)),
            line(2, 1, "Dashy", "OpTic", "Hardpoint", 22, 30, Some(false)),
            line(2, 2, "Dashy", "OpTic", "Control", 10, 10, None),
        ]
    }

    #[test]
    fn player_summary_averages_and_ratios() {
        let summary = player_summary(&records(), "Dashy", &RecordFilter::default()).unwrap();
        assert_eq!(summary.maps_played, 5);
        assert_eq!(summary.total_kills, 90);
        assert_eq!(summary.total_deaths, 86);
        assert_eq!(summary.avg_kills, 18.0);
        assert_eq!(summary.kd_ratio, 1.05);
        assert_eq!(summary.wins, 2);
        assert_eq!(summary.win_rate, Some(0.5));
        assert!(player_summary(&records(), "Nobody", &RecordFilter::default()).is_none());
    }

    #[test]
    fn mode_breakdown_orders_tracked_modes_first() {
        let modes = mode_breakdown(&records(), "Dashy", &RecordFilter::default())
            .into_iter()
            .map(|m| m.mode)
            .collect::<Vec<_>>();
        assert_eq!(modes, vec!["Hardpoint", "Search & Destroy", "Overload", "Control"]);
    }

    #[test]
    fn filter_narrows_lines() {
        let filter = RecordFilter {
            mode: Some("Hardpoint".to_string()),
            ..RecordFilter::default()
        };
        let summary = player_summary(&records(), "Dashy", &filter).unwrap();
        assert_eq!(summary.maps_played, 2);
        assert_eq!(summary.win_rate, Some(0.5));
    }

    #[test]
    fn team_record_counts_each_map_once() {
        let record = team_record(&records(), "OpTic", &RecordFilter::default());
        assert_eq!(record.map_wins, 2);
        assert_eq!(record.map_losses, 2);
        assert_eq!(record.series_wins, 1);
        assert_eq!(record.series_losses, 1);
    }
}
