//! Append-only log of scrape watermarks in the `scrape_metadata` table.
//!
//! The latest entry is the last one written, not the largest watermark, so
//! an operator re-scraping an older window moves the watermark back.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkEntry {
    pub watermark: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

/// Read side of the watermark log, as seen by the scrape orchestrator.
pub trait WatermarkSource {
    fn last_recorded(&self) -> Option<DateTime<Utc>>;
}

impl WatermarkSource for Connection {
    fn last_recorded(&self) -> Option<DateTime<Utc>> {
        match latest(self) {
            Ok(entry) => entry.map(|e| e.watermark),
            Err(err) => {
                warn!(error = %err, "failed to read scrape watermark");
                None
            }
        }
    }
}

impl WatermarkSource for Option<DateTime<Utc>> {
    fn last_recorded(&self) -> Option<DateTime<Utc>> {
        *self
    }
}

/// The most recently written watermark, or `now - lookback_days`. Never fails.
pub fn get_last(conn: &Connection, lookback_days: i64) -> DateTime<Utc> {
    conn.last_recorded()
        .unwrap_or_else(|| Utc::now() - ChronoDuration::days(lookback_days))
}

pub fn latest(conn: &Connection) -> Result<Option<WatermarkEntry>> {
    let row = conn
        .query_row(
            "SELECT last_scrape_date, scrape_timestamp
             FROM scrape_metadata
             ORDER BY scrape_timestamp DESC, id DESC
             LIMIT 1",
            [],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()
        .context("query latest watermark")?;

    let Some((watermark, recorded_at)) = row else {
        return Ok(None);
    };
    Ok(Some(WatermarkEntry {
        watermark: parse_timestamp(&watermark)?,
        recorded_at: parse_timestamp(&recorded_at)?,
    }))
}

/// Appends a watermark stamped with the current time.
pub fn record(conn: &Connection, watermark: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT INTO scrape_metadata (last_scrape_date, scrape_timestamp) VALUES (?1, ?2)",
        params![format_timestamp(watermark), format_timestamp(Utc::now())],
    )
    .context("insert scrape watermark")?;
    info!(watermark = %format_timestamp(watermark), "recorded scrape watermark");
    Ok(())
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid watermark timestamp {raw}"))
}
