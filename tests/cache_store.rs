use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rusqlite::Connection;

use cdl_stats::config::DEFAULT_LOOKBACK_DAYS;
use cdl_stats::model::PlayerStatRecord;
use cdl_stats::{store, watermark};

fn memory_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    store::init_schema(&conn).unwrap();
    conn
}

fn record(match_id: u64, player: &str, team: &str, map_number: u32, won: Option<bool>) -> PlayerStatRecord {
    PlayerStatRecord {
        match_id,
        date: NaiveDate::from_ymd_opt(2025, 1, 18).unwrap() + Duration::days(match_id as i64),
        event_name: "CDL Major 1".to_string(),
        season: 2026,
        series_type: "BO5".to_string(),
        is_lan: true,
        player_name: player.to_string(),
        team_name: team.to_string(),
        opponent_team_name: "Toronto Ultra".to_string(),
        position: Some("SMG".to_string()),
        map_number,
        map_name: "Protocol".to_string(),
        mode: "Search & Destroy".to_string(),
        kills: 9,
        deaths: 7,
        assists: 2,
        damage: 1234.5,
        hill_time: None,
        plants: Some(1),
        defuses: Some(0),
        rating: 1.36,
        won_map: won,
        team_score: won.map(|w| if w { 6 } else { 3 }),
        opponent_score: won.map(|w| if w { 3 } else { 6 }),
    }
}

fn batch() -> Vec<PlayerStatRecord> {
    vec![
        record(1, "Shotzzy", "OpTic Texas", 1, Some(true)),
        record(1, "CleanX", "Toronto Ultra", 1, Some(false)),
        record(1, "Shotzzy", "OpTic Texas", 2, None),
        record(2, "Nastie", "Boston Breach", 1, Some(false)),
    ]
}

#[test]
fn replace_then_read_returns_the_batch() {
    let mut conn = memory_db();
    let counts = store::replace_batch(&mut conn, &batch()).unwrap();
    assert_eq!(counts.matches, 2);
    assert_eq!(counts.player_records, 4);
    assert_eq!(store::read_all(&conn).unwrap(), batch());

    store::replace_batch(&mut conn, &batch()).unwrap();
    assert_eq!(store::read_all(&conn).unwrap(), batch());
}

#[test]
fn failed_write_keeps_previous_contents() {
    let mut conn = memory_db();
    store::replace_batch(&mut conn, &batch()).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_player BEFORE INSERT ON player_stats
         WHEN NEW.player_name = 'boom'
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
    )
    .unwrap();

    let poisoned = vec![
        record(5, "Scrap", "Los Angeles Thieves", 1, Some(true)),
        record(5, "boom", "Los Angeles Thieves", 1, Some(true)),
    ];
    assert!(store::replace_batch(&mut conn, &poisoned).is_err());
    assert_eq!(store::read_all(&conn).unwrap(), batch());
}

#[test]
fn empty_batch_clears_the_cache() {
    let mut conn = memory_db();
    store::replace_batch(&mut conn, &batch()).unwrap();
    let counts = store::replace_batch(&mut conn, &[]).unwrap();
    assert_eq!(counts.matches, 0);
    assert!(store::read_all(&conn).unwrap().is_empty());
    assert!(!store::cache_stats(&conn).unwrap().is_cached());
}

#[test]
fn cache_stats_and_clear() {
    let mut conn = memory_db();
    store::replace_batch(&mut conn, &batch()).unwrap();
    watermark::record(&conn, Utc::now()).unwrap();

    let stats = store::cache_stats(&conn).unwrap();
    assert!(stats.is_cached());
    assert_eq!(stats.matches, 2);
    assert_eq!(stats.player_records, 4);
    assert_eq!(stats.oldest_date, NaiveDate::from_ymd_opt(2025, 1, 19));
    assert_eq!(stats.latest_date, NaiveDate::from_ymd_opt(2025, 1, 20));

    store::clear_cache(&mut conn).unwrap();
    assert_eq!(store::cache_stats(&conn).unwrap(), store::CacheStats::default());
    assert!(watermark::latest(&conn).unwrap().is_some());
}

#[test]
fn cache_survives_reopen() {
    let dir = std::env::temp_dir().join(format!("cdl_stats_test_{}", std::process::id()));
    let path = dir.join("cache.sqlite");
    let _ = std::fs::remove_file(&path);

    {
        let mut conn = store::open_db(&path).unwrap();
        store::replace_batch(&mut conn, &batch()).unwrap();
    }
    let conn = store::open_db(&path).unwrap();
    assert_eq!(store::read_all(&conn).unwrap(), batch());
    drop(conn);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn default_watermark_is_the_lookback_window() {
    let conn = memory_db();
    let expected = Utc::now() - Duration::days(DEFAULT_LOOKBACK_DAYS);
    let got = watermark::get_last(&conn, DEFAULT_LOOKBACK_DAYS);
    assert!((got - expected).num_milliseconds().abs() <= 1000);
}

#[test]
fn watermark_reads_back_what_was_written() {
    let conn = memory_db();
    let t1 = Utc.with_ymd_and_hms(2025, 1, 18, 12, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2025, 1, 25, 12, 0, 0).unwrap();

    watermark::record(&conn, t1).unwrap();
    assert_eq!(watermark::get_last(&conn, DEFAULT_LOOKBACK_DAYS), t1);
    watermark::record(&conn, t2).unwrap();
    assert_eq!(watermark::get_last(&conn, DEFAULT_LOOKBACK_DAYS), t2);
}

#[test]
fn latest_write_wins_over_larger_watermark() {
    let conn = memory_db();
    let t1 = Utc.with_ymd_and_hms(2025, 1, 18, 12, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2025, 1, 25, 12, 0, 0).unwrap();

    watermark::record(&conn, t2).unwrap();
    watermark::record(&conn, t1).unwrap();
    let entry = watermark::latest(&conn).unwrap().unwrap();
    assert_eq!(entry.watermark, t1);
    assert!(entry.recorded_at <= Utc::now());
}
