use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

pub const DEFAULT_BASE_URL: &str = "https://www.breakingpoint.gg";
pub const MIN_REQUEST_DELAY_MS: u64 = 500;
pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;

const CACHE_DIR: &str = "cdl_stats";
const DB_FILE: &str = "cdl_stats.sqlite";
const DEFAULT_EVENT_TAG: &str = "CDL";
const DEFAULT_SEASON_ID: i64 = 2026;
const DEFAULT_SEASON_START: &str = "2024-12-01";

/// Which competition a scrape keeps. Event names are matched by tag
/// ("CDL Major 2 Qualifiers" carries "CDL"), seasons by exact id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompetitionFilter {
    pub event_tag: String,
    pub season_id: i64,
}

impl CompetitionFilter {
    pub fn matches_event(&self, event_name: &str) -> bool {
        !self.event_tag.is_empty() && event_name.contains(&self.event_tag)
    }

    pub fn matches(&self, event_name: &str, season_id: Option<i64>) -> bool {
        self.matches_event(event_name) && season_id == Some(self.season_id)
    }
}

impl Default for CompetitionFilter {
    fn default() -> Self {
        Self {
            event_tag: DEFAULT_EVENT_TAG.to_string(),
            season_id: DEFAULT_SEASON_ID,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub base_url: String,
    /// Pause between consecutive match-detail requests.
    pub request_delay: Duration,
    pub request_timeout: Duration,
    pub competition: CompetitionFilter,
    pub lookback_days: i64,
    pub season_start: NaiveDate,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_delay: Duration::from_millis(MIN_REQUEST_DELAY_MS),
            request_timeout: Duration::from_secs(15),
            competition: CompetitionFilter::default(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            season_start: default_season_start(),
        }
    }
}

impl ScrapeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = opt_env("CDL_BASE_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);
        let request_delay = parse_request_delay(env::var("CDL_REQUEST_DELAY_MS").ok().as_deref());
        let request_timeout = Duration::from_secs(
            env::var("CDL_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|val| val.parse::<u64>().ok())
                .unwrap_or(15)
                .clamp(1, 120),
        );
        let event_tag = opt_env("CDL_EVENT_TAG")
            .map(|tag| tag.trim().to_string())
            .unwrap_or(defaults.competition.event_tag);
        let season_id = env::var("CDL_SEASON_ID")
            .ok()
            .and_then(|val| val.trim().parse::<i64>().ok())
            .unwrap_or(defaults.competition.season_id);
        let lookback_days = env::var("CDL_LOOKBACK_DAYS")
            .ok()
            .and_then(|val| val.parse::<i64>().ok())
            .unwrap_or(DEFAULT_LOOKBACK_DAYS)
            .clamp(1, 365);
        let season_start = opt_env("CDL_SEASON_START")
            .and_then(|val| parse_date(&val))
            .unwrap_or(defaults.season_start);

        Self {
            base_url,
            request_delay,
            request_timeout,
            competition: CompetitionFilter {
                event_tag,
                season_id,
            },
            lookback_days,
            season_start,
        }
    }
}

/// Loads `.env.local` then `.env`; missing files are not an error.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

pub fn default_db_path() -> Option<PathBuf> {
    if let Some(path) = opt_env("CDL_DB_PATH") {
        return Some(PathBuf::from(path.trim()));
    }
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

pub fn app_cache_dir() -> Option<PathBuf> {
    // Prefer XDG cache.
    if let Ok(base) = env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

/// Accepts `YYYY-MM-DD` or `YYYYMMDD`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y%m%d"))
        .ok()
}

/// Value of `--flag value` or `--flag=value` in `args`. Blank values are ignored.
pub fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

/// Milliseconds from `raw`, never below [`MIN_REQUEST_DELAY_MS`].
fn parse_request_delay(raw: Option<&str>) -> Duration {
    Duration::from_millis(
        raw.and_then(|val| val.trim().parse::<u64>().ok())
            .unwrap_or(MIN_REQUEST_DELAY_MS)
            .max(MIN_REQUEST_DELAY_MS),
    )
}

fn default_season_start() -> NaiveDate {
    parse_date(DEFAULT_SEASON_START).unwrap_or(NaiveDate::MIN)
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|val| {
        if val.trim().is_empty() {
            None
        } else {
            Some(val)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_both_layouts() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 31);
        assert_eq!(parse_date("2025-01-31"), expected);
        assert_eq!(parse_date(" 20250131 "), expected);
        assert_eq!(parse_date("31/01/2025"), None);
    }

    #[test]
    fn competition_filter_needs_tag_and_exact_season() {
        let filter = CompetitionFilter::default();
        assert!(filter.matches("CDL Major 1 Qualifiers", Some(2026)));
        assert!(!filter.matches("CDL Major 1 Qualifiers", Some(2025)));
        assert!(!filter.matches("Challengers Open", Some(2026)));
        assert!(!filter.matches("CDL Major 1", None));
    }

    #[test]
    fn flag_value_reads_both_forms() {
        let args = ["scrape", "--db=/tmp/a.sqlite", "--since", "2025-01-01", "--team", " "]
            .map(String::from);
        assert_eq!(flag_value(&args, "--db").as_deref(), Some("/tmp/a.sqlite"));
        assert_eq!(flag_value(&args, "--since").as_deref(), Some("2025-01-01"));
        assert_eq!(flag_value(&args, "--team"), None);
        assert_eq!(flag_value(&args, "--mode"), None);
    }

    #[test]
    fn request_delay_has_a_floor() {
        assert_eq!(parse_request_delay(Some("100")), Duration::from_millis(500));
        assert_eq!(parse_request_delay(Some("1200")), Duration::from_millis(1200));
        assert_eq!(parse_request_delay(Some("soon")), Duration::from_millis(500));
        assert_eq!(parse_request_delay(None), Duration::from_millis(500));
    }

    #[test]
    fn default_season_start_is_valid() {
        assert_eq!(
            ScrapeConfig::default().season_start,
            NaiveDate::from_ymd_opt(2024, 12, 1).unwrap()
        );
    }
}
