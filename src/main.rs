use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};

use cdl_stats::config::{self, ScrapeConfig, flag_value};
use cdl_stats::ingest::{self, CacheMode};
use cdl_stats::logging;
use cdl_stats::scrape;
use cdl_stats::source::{HttpSource, MatchSource};
use cdl_stats::stats::{self, RecordFilter};
use cdl_stats::store;
use cdl_stats::watermark;

const USAGE: &str = "usage: cdl_stats [scrape|status|upcoming|summary <player>|clear] \
[--db PATH] [--since YYYY-MM-DD] [--replace] [--team NAME] [--mode NAME]";

fn main() -> Result<()> {
    config::load_dotenv();
    logging::init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let command = args
        .first()
        .filter(|a| !a.starts_with("--"))
        .map(String::as_str)
        .unwrap_or("scrape");
    let scrape_config = ScrapeConfig::from_env();

    match command {
        "scrape" => run_scrape(&args, &scrape_config),
        "status" => run_status(&args, &scrape_config),
        "upcoming" => run_upcoming(&scrape_config),
        "summary" => run_summary(&args),
        "clear" => {
            let mut conn = open_db(&args)?;
            store::clear_cache(&mut conn)?;
            println!("Cache cleared");
            Ok(())
        }
        "help" | "-h" | "--help" => {
            println!("{USAGE}");
            Ok(())
        }
        other => Err(anyhow!("unknown command {other:?}\n{USAGE}")),
    }
}

fn run_scrape(args: &[String], scrape_config: &ScrapeConfig) -> Result<()> {
    let since = match flag_value(args, "--since") {
        Some(raw) => Some(parse_since(&raw)?),
        None => None,
    };
    let mode = if has_flag(args, "--replace") {
        CacheMode::Replace
    } else {
        CacheMode::Merge
    };

    let mut conn = open_db(args)?;
    let source = HttpSource::new(scrape_config)?;
    let summary = ingest::refresh(&mut conn, &source, scrape_config, since, mode)?;

    println!("Scrape complete");
    if let Some(since) = summary.since {
        println!("Since: {}", since.date_naive());
    }
    println!("{summary}");
    println!("Player records scraped: {}", summary.records_scraped);
    println!(
        "Cache now holds {} matches / {} player records",
        summary.matches_cached, summary.records_cached
    );
    if !summary.failures.is_empty() {
        println!("  no data for matches: {:?}", summary.failures);
    }
    Ok(())
}

fn run_status(args: &[String], scrape_config: &ScrapeConfig) -> Result<()> {
    let conn = open_db(args)?;
    let stats = store::cache_stats(&conn)?;
    let last = watermark::latest(&conn)?;

    println!("Data available: {}", stats.is_cached());
    println!("Matches: {}", stats.matches);
    println!("Player records: {}", stats.player_records);
    println!(
        "Match dates: {} .. {}",
        stats
            .oldest_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "n/a".to_string()),
        stats
            .latest_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    );
    match last {
        Some(entry) => println!(
            "Last scrape: {} (recorded {})",
            entry.watermark.format("%Y-%m-%d %H:%M:%S"),
            entry.recorded_at.format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!(
            "Last scrape: never (next run looks back {} days to {})",
            scrape_config.lookback_days,
            watermark::get_last(&conn, scrape_config.lookback_days).date_naive()
        ),
    }
    Ok(())
}

fn run_upcoming(scrape_config: &ScrapeConfig) -> Result<()> {
    let source = HttpSource::new(scrape_config)?;
    let listed = source
        .fetch_match_list()
        .context("fetch match list failed")?;
    let upcoming = scrape::upcoming_matches(&listed, &scrape_config.competition);
    if upcoming.is_empty() {
        println!("No upcoming {} matches", scrape_config.competition.event_tag);
        return Ok(());
    }
    for m in upcoming {
        let start = m
            .start
            .map(|s| s.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "TBD".to_string());
        println!(
            "{start}  {} vs {}  BO{}  {} {}",
            m.team1, m.team2, m.best_of, m.event_name, m.round_name
        );
    }
    Ok(())
}

fn run_summary(args: &[String]) -> Result<()> {
    let player = args
        .get(1)
        .filter(|a| !a.starts_with("--"))
        .ok_or_else(|| anyhow!("summary needs a player tag\n{USAGE}"))?;
    let filter = RecordFilter {
        team: flag_value(args, "--team"),
        mode: flag_value(args, "--mode"),
        ..RecordFilter::default()
    };

    let conn = open_db(args)?;
    let records = store::read_all(&conn)?;
    let Some(overall) = stats::player_summary(&records, player, &filter) else {
        println!("No cached maps for {player}");
        return Ok(());
    };

    println!(
        "{player}: {} maps, {:.2} K / {:.2} D / {:.2} A, K/D {:.2}, rating {:.2}, win rate {}",
        overall.maps_played,
        overall.avg_kills,
        overall.avg_deaths,
        overall.avg_assists,
        overall.kd_ratio,
        overall.avg_rating,
        format_rate(overall.win_rate)
    );
    for mode in stats::mode_breakdown(&records, player, &filter) {
        println!(
            "  {:<18} {:>3} maps  {:>6.2} K  K/D {:.2}  win rate {}",
            mode.mode,
            mode.summary.maps_played,
            mode.summary.avg_kills,
            mode.summary.kd_ratio,
            format_rate(mode.summary.win_rate)
        );
    }
    Ok(())
}

fn open_db(args: &[String]) -> Result<rusqlite::Connection> {
    let db_path = flag_value(args, "--db")
        .map(PathBuf::from)
        .or_else(config::default_db_path)
        .context("unable to resolve sqlite path")?;
    store::open_db(&db_path)
}

fn parse_since(raw: &str) -> Result<DateTime<Utc>> {
    config::parse_date(raw)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| anyhow!("invalid --since date {raw:?}, expected YYYY-MM-DD"))
}

fn format_rate(rate: Option<f64>) -> String {
    rate.map(|r| format!("{:.0}%", r * 100.0))
        .unwrap_or_else(|| "n/a".to_string())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
