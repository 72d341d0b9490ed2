use std::fmt;
use std::thread;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::config::{CompetitionFilter, ScrapeConfig};
use crate::error::FetchResult;
use crate::model::{MatchSummary, PlayerStatRecord, RawMatch, Side, TBD, UpcomingMatch};
use crate::normalize::normalize;
use crate::source::MatchSource;
use crate::watermark::WatermarkSource;

/// Everything one scrape produced. Nothing here has been persisted.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub records: Vec<PlayerStatRecord>,
    /// Matches that passed the filter and were requested.
    pub match_count: usize,
    /// Matches whose detail page yielded no records.
    pub failures: Vec<u64>,
    /// The effective lower bound used for this run.
    pub since: Option<DateTime<Utc>>,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.match_count.saturating_sub(self.failures.len())
    }
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} matches fetched successfully ({} player records)",
            self.succeeded(),
            self.match_count,
            self.records.len()
        )
    }
}

/// Scrapes every tracked, completed match dated on or after the watermark.
///
/// `since` wins over the recorded watermark, which wins over the configured
/// lookback. Match details are fetched one at a time with
/// `config.request_delay` between requests. A detail page that fails or
/// carries no player lines lands in `failures`; only a failed match-list
/// fetch returns `Err`.
#[instrument(skip_all)]
pub fn run<S: MatchSource + ?Sized>(
    source: &S,
    config: &ScrapeConfig,
    since: Option<DateTime<Utc>>,
    watermarks: &dyn WatermarkSource,
) -> FetchResult<BatchResult> {
    let since = resolve_watermark(since, watermarks, config.lookback_days, Utc::now());
    info!(since = %since.date_naive(), "scraping matches");

    let listed = source.fetch_match_list()?;
    let selected = select_matches(&listed, &config.competition, since.date_naive());
    info!(
        listed = listed.len(),
        selected = selected.len(),
        "filtered completed {} matches",
        config.competition.event_tag
    );

    let mut batch = BatchResult {
        match_count: selected.len(),
        since: Some(since),
        ..BatchResult::default()
    };

    for (idx, summary) in selected.iter().enumerate() {
        if idx > 0 && !config.request_delay.is_zero() {
            thread::sleep(config.request_delay);
        }
        info!(
            match_id = summary.id,
            "[{}/{}] {} vs {}",
            idx + 1,
            selected.len(),
            summary.team1.name,
            summary.team2.name
        );

        match source.fetch_match_detail(summary.id) {
            Ok(games) => {
                let records = normalize(summary, &games);
                if records.is_empty() {
                    warn!(match_id = summary.id, games = games.len(), "no player records");
                    batch.failures.push(summary.id);
                } else {
                    debug!(match_id = summary.id, records = records.len(), "normalized match");
                    batch.records.extend(records);
                }
            }
            Err(err) => {
                warn!(
                    match_id = summary.id,
                    not_found = err.is_not_found(),
                    error = %err,
                    "match detail unavailable"
                );
                batch.failures.push(summary.id);
            }
        }
    }

    info!("{batch}");
    Ok(batch)
}

/// Explicit `since`, then the last recorded watermark, then `now - lookback_days`.
pub fn resolve_watermark(
    since: Option<DateTime<Utc>>,
    watermarks: &dyn WatermarkSource,
    lookback_days: i64,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    since
        .or_else(|| watermarks.last_recorded())
        .unwrap_or_else(|| now - ChronoDuration::days(lookback_days))
}

/// Completed, scored matches of the tracked competition dated on or after `since`.
pub fn select_matches(
    listed: &[RawMatch],
    competition: &CompetitionFilter,
    since: NaiveDate,
) -> Vec<MatchSummary> {
    listed
        .iter()
        .filter(|raw| raw.is_complete() && raw.team1.is_some() && raw.team2.is_some())
        .filter(|raw| competition.matches(raw.event_name(), raw.season_id()))
        .filter_map(MatchSummary::from_raw)
        .filter(|summary| summary.date() >= since)
        .collect()
}

/// Scheduled or live matches of the tracked competition, soonest first.
/// Entries without a start time sort last.
pub fn upcoming_matches(listed: &[RawMatch], competition: &CompetitionFilter) -> Vec<UpcomingMatch> {
    let mut out = listed
        .iter()
        .filter(|raw| !raw.is_complete())
        .filter(|raw| competition.matches_event(raw.event_name()))
        .filter_map(|raw| {
            Some(UpcomingMatch {
                id: raw.id?,
                start: raw.start(),
                team1: raw.team_name(Side::One, TBD),
                team2: raw.team_name(Side::Two, TBD),
                event_name: raw.event_name().to_string(),
                status: raw.status.clone().unwrap_or_default(),
                best_of: raw.best_of(),
                round_name: raw.round_name().to_string(),
            })
        })
        .collect::<Vec<_>>();
    out.sort_by_key(|m| (m.start.is_none(), m.start));
    out
}
