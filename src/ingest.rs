use std::collections::HashSet;
use std::fmt;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::config::ScrapeConfig;
use crate::model::PlayerStatRecord;
use crate::scrape::{self, BatchResult};
use crate::source::MatchSource;
use crate::store;
use crate::watermark;

/// How a scraped batch lands in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Keep cached matches the batch does not cover; re-scraped matches are
    /// swapped wholesale.
    #[default]
    Merge,
    /// The batch becomes the whole cache.
    Replace,
}

#[derive(Debug, Clone)]
pub struct RefreshSummary {
    pub since: Option<DateTime<Utc>>,
    pub matches_total: usize,
    pub matches_succeeded: usize,
    pub failures: Vec<u64>,
    pub records_scraped: usize,
    pub records_cached: usize,
    pub matches_cached: usize,
    /// False when the run produced no records and the cache was left as is.
    pub persisted: bool,
    /// The watermark written by this run, if any.
    pub watermark: Option<DateTime<Utc>>,
}

impl fmt::Display for RefreshSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} matches fetched successfully",
            self.matches_succeeded, self.matches_total
        )?;
        if !self.persisted {
            write!(f, ", nothing cached")?;
        }
        Ok(())
    }
}

/// Scrape, persist, then advance the watermark.
///
/// The watermark is the time the run started and is written only after the
/// cache transaction commits, so a failed write leaves both untouched. A run
/// that produced no records writes nothing to the cache, and moves the
/// watermark only when there was nothing to fetch, so failed matches are
/// retried next time.
pub fn refresh<S: MatchSource + ?Sized>(
    conn: &mut Connection,
    source: &S,
    config: &ScrapeConfig,
    since: Option<DateTime<Utc>>,
    mode: CacheMode,
) -> Result<RefreshSummary> {
    let started_at = Utc::now();
    let batch = scrape::run(source, config, since, &*conn).context("match list fetch failed")?;

    if batch.records.is_empty() {
        let stats = store::cache_stats(conn)?;
        let counts = store::ReplaceCounts {
            matches: stats.matches,
            player_records: stats.player_records,
        };
        let recorded = if batch.match_count == 0 {
            watermark::record(conn, started_at)?;
            Some(started_at)
        } else {
            warn!(
                failures = batch.failures.len(),
                "no records scraped, cache and watermark left unchanged"
            );
            None
        };
        let summary = summarize(&batch, counts, false, recorded);
        info!("{summary}");
        return Ok(summary);
    }

    let desired = match mode {
        CacheMode::Merge => {
            let cached = store::read_all(conn).context("read cached records for merge")?;
            merge_records(cached, &batch.records)
        }
        CacheMode::Replace => batch.records.clone(),
    };
    let counts = store::replace_batch(conn, &desired)?;
    watermark::record(conn, started_at)?;

    let summary = summarize(&batch, counts, true, Some(started_at));
    info!(
        records_scraped = summary.records_scraped,
        records_cached = summary.records_cached,
        failures = summary.failures.len(),
        "{summary}"
    );
    Ok(summary)
}

/// Cached records minus every match the batch re-scraped, followed by the batch.
pub fn merge_records(
    cached: Vec<PlayerStatRecord>,
    batch: &[PlayerStatRecord],
) -> Vec<PlayerStatRecord> {
    let rescraped = batch.iter().map(|r| r.match_id).collect::<HashSet<_>>();
    let mut out = cached
        .into_iter()
        .filter(|r| !rescraped.contains(&r.match_id))
        .collect::<Vec<_>>();
    out.extend_from_slice(batch);
    out
}

fn summarize(
    batch: &BatchResult,
    counts: store::ReplaceCounts,
    persisted: bool,
    watermark: Option<DateTime<Utc>>,
) -> RefreshSummary {
    RefreshSummary {
        since: batch.since,
        matches_total: batch.match_count,
        matches_succeeded: batch.succeeded(),
        failures: batch.failures.clone(),
        records_scraped: batch.records.len(),
        records_cached: counts.player_records,
        matches_cached: counts.matches,
        persisted,
        watermark,
    }
}
