use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use cdl_stats::config::{self, ScrapeConfig};
use cdl_stats::ingest::{self, CacheMode};
use cdl_stats::logging;
use cdl_stats::source::HttpSource;
use cdl_stats::store;

/// Re-scrapes the whole season and replaces the cache with the result, so
/// every record carries map scores. A failed run keeps the previous cache.
fn main() -> Result<()> {
    config::load_dotenv();
    logging::init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let scrape_config = ScrapeConfig::from_env();
    let db_path = config::flag_value(&args, "--db")
        .map(PathBuf::from)
        .or_else(config::default_db_path)
        .context("unable to resolve sqlite path")?;
    let since = scrape_config
        .season_start
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| anyhow!("invalid season start {}", scrape_config.season_start))?;

    let mut conn = store::open_db(&db_path)?;
    println!("DB: {}", db_path.display());
    println!("Re-scraping since {}", scrape_config.season_start);

    let source = HttpSource::new(&scrape_config)?;
    let summary = ingest::refresh(
        &mut conn,
        &source,
        &scrape_config,
        Some(since),
        CacheMode::Replace,
    )?;

    let records = store::read_all(&conn)?;
    let with_scores = records
        .iter()
        .filter(|r| r.team_score.is_some() && r.opponent_score.is_some())
        .count();

    println!("Re-scrape complete");
    println!("{summary}");
    println!("Player records: {}", records.len());
    println!("Records with map scores: {with_scores}/{}", records.len());
    if !summary.failures.is_empty() {
        println!("  no data for matches: {:?}", summary.failures);
    }
    Ok(())
}
