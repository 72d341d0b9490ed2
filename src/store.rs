use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use tracing::info;

use crate::model::{PlayerStatRecord, UNKNOWN};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceCounts {
    pub matches: usize,
    pub player_records: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub matches: usize,
    pub player_records: usize,
    pub oldest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
}

impl CacheStats {
    pub fn is_cached(&self) -> bool {
        self.matches > 0
    }
}

/// A `matches` row, rebuilt from the player records of one match.
#[derive(Debug, Clone, PartialEq)]
struct MatchRow {
    match_id: u64,
    date: NaiveDate,
    event_name: String,
    series_type: String,
    is_lan: bool,
    season: i64,
    team1_name: Option<String>,
    team2_name: Option<String>,
    team1_score: Option<i64>,
    team2_score: Option<i64>,
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS matches (
            match_id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            event_name TEXT NOT NULL,
            series_type TEXT NOT NULL,
            is_lan INTEGER NOT NULL,
            season INTEGER NOT NULL,
            team1_name TEXT NULL,
            team2_name TEXT NULL,
            team1_score INTEGER NULL,
            team2_score INTEGER NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(date);

        CREATE TABLE IF NOT EXISTS player_stats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_id TEXT NOT NULL REFERENCES matches(match_id) ON DELETE CASCADE,
            player_name TEXT NOT NULL,
            team_name TEXT NOT NULL,
            opponent_team_name TEXT NOT NULL,
            position TEXT NULL,
            map_number INTEGER NOT NULL,
            map_name TEXT NOT NULL,
            mode TEXT NOT NULL,
            kills INTEGER NOT NULL,
            deaths INTEGER NOT NULL,
            assists INTEGER NOT NULL,
            damage REAL NOT NULL,
            hill_time INTEGER NULL,
            plants INTEGER NULL,
            defuses INTEGER NULL,
            rating REAL NOT NULL,
            won_map INTEGER NULL,
            team_score INTEGER NULL,
            opponent_score INTEGER NULL
        );
        CREATE INDEX IF NOT EXISTS idx_player_stats_match ON player_stats(match_id);
        CREATE INDEX IF NOT EXISTS idx_player_stats_player ON player_stats(player_name);

        CREATE TABLE IF NOT EXISTS scrape_metadata (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            last_scrape_date TEXT NOT NULL,
            scrape_timestamp TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Truncates the match and player tables and loads `records` in their place,
/// in one transaction. Any failure rolls back to the previous contents.
pub fn replace_batch(conn: &mut Connection, records: &[PlayerStatRecord]) -> Result<ReplaceCounts> {
    let rows = match_rows(records);
    let updated_at = Utc::now().to_rfc3339();

    let tx = conn.transaction().context("begin replace transaction")?;
    tx.execute("DELETE FROM player_stats", [])
        .context("clear player stats")?;
    tx.execute("DELETE FROM matches", []).context("clear matches")?;

    {
        let mut insert_match = tx
            .prepare(
                r#"
                INSERT INTO matches (
                    match_id, date, event_name, series_type, is_lan, season,
                    team1_name, team2_name, team1_score, team2_score, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .context("prepare match insert")?;
        for row in &rows {
            insert_match
                .execute(params![
                    row.match_id.to_string(),
                    row.date.format(DATE_FORMAT).to_string(),
                    row.event_name,
                    row.series_type,
                    row.is_lan,
                    row.season,
                    row.team1_name,
                    row.team2_name,
                    row.team1_score,
                    row.team2_score,
                    updated_at,
                ])
                .with_context(|| format!("insert match {}", row.match_id))?;
        }

        let mut insert_stat = tx
            .prepare(
                r#"
                INSERT INTO player_stats (
                    match_id, player_name, team_name, opponent_team_name, position,
                    map_number, map_name, mode,
                    kills, deaths, assists, damage,
                    hill_time, plants, defuses,
                    rating, won_map, team_score, opponent_score
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5,
                    ?6, ?7, ?8,
                    ?9, ?10, ?11, ?12,
                    ?13, ?14, ?15,
                    ?16, ?17, ?18, ?19
                )
                "#,
            )
            .context("prepare player stat insert")?;
        for r in records {
            insert_stat
                .execute(params![
                    r.match_id.to_string(),
                    r.player_name,
                    r.team_name,
                    r.opponent_team_name,
                    r.position,
                    r.map_number,
                    r.map_name,
                    r.mode,
                    r.kills,
                    r.deaths,
                    r.assists,
                    r.damage,
                    r.hill_time,
                    r.plants,
                    r.defuses,
                    r.rating,
                    r.won_map,
                    r.team_score,
                    r.opponent_score,
                ])
                .with_context(|| {
                    format!(
                        "insert player stat {} map {} match {}",
                        r.player_name, r.map_number, r.match_id
                    )
                })?;
        }
    }

    tx.commit().context("commit replace transaction")?;

    let counts = ReplaceCounts {
        matches: rows.len(),
        player_records: records.len(),
    };
    info!(
        matches = counts.matches,
        player_records = counts.player_records,
        "cached match data"
    );
    Ok(counts)
}

/// Every cached player record, joined back to its match, in insertion order.
pub fn read_all(conn: &Connection) -> Result<Vec<PlayerStatRecord>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                ps.match_id, m.date, m.event_name, m.season, m.series_type, m.is_lan,
                ps.player_name, ps.team_name, ps.opponent_team_name, ps.position,
                ps.map_number, ps.map_name, ps.mode,
                ps.kills, ps.deaths, ps.assists, ps.damage,
                ps.hill_time, ps.plants, ps.defuses,
                ps.rating, ps.won_map, ps.team_score, ps.opponent_score
            FROM player_stats ps
            JOIN matches m ON m.match_id = ps.match_id
            ORDER BY ps.id ASC
            "#,
        )
        .context("prepare read all query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok(PlayerStatRecord {
                match_id: parse_column(row, 0)?,
                date: date_column(row, 1)?,
                event_name: row.get(2)?,
                season: row.get(3)?,
                series_type: row.get(4)?,
                is_lan: row.get(5)?,
                player_name: row.get(6)?,
                team_name: row.get(7)?,
                opponent_team_name: row.get(8)?,
                position: row.get(9)?,
                map_number: row.get(10)?,
                map_name: row.get(11)?,
                mode: row.get(12)?,
                kills: row.get(13)?,
                deaths: row.get(14)?,
                assists: row.get(15)?,
                damage: row.get(16)?,
                hill_time: row.get(17)?,
                plants: row.get(18)?,
                defuses: row.get(19)?,
                rating: row.get(20)?,
                won_map: row.get(21)?,
                team_score: row.get(22)?,
                opponent_score: row.get(23)?,
            })
        })
        .context("query read all")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode player stat row")?);
    }
    Ok(out)
}

/// Deletes every cached match and player record. The watermark log is kept.
pub fn clear_cache(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction().context("begin clear transaction")?;
    tx.execute("DELETE FROM player_stats", [])
        .context("clear player stats")?;
    tx.execute("DELETE FROM matches", []).context("clear matches")?;
    tx.commit().context("commit clear transaction")?;
    info!("cache cleared");
    Ok(())
}

pub fn cache_stats(conn: &Connection) -> Result<CacheStats> {
    let (matches, oldest, latest) = conn
        .query_row(
            "SELECT COUNT(*), MIN(date), MAX(date) FROM matches",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        )
        .context("query match stats")?;
    let player_records = conn
        .query_row("SELECT COUNT(*) FROM player_stats", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("query player stat count")?;

    Ok(CacheStats {
        matches: usize::try_from(matches).unwrap_or_default(),
        player_records: usize::try_from(player_records).unwrap_or_default(),
        oldest_date: oldest.and_then(|d| NaiveDate::parse_from_str(&d, DATE_FORMAT).ok()),
        latest_date: latest.and_then(|d| NaiveDate::parse_from_str(&d, DATE_FORMAT).ok()),
    })
}

/// One row per match in first-seen order. The two sides are the sorted
/// distinct known team names; each side's score is the number of distinct
/// maps it won.
fn match_rows(records: &[PlayerStatRecord]) -> Vec<MatchRow> {
    let mut order = Vec::new();
    let mut grouped: HashMap<u64, Vec<&PlayerStatRecord>> = HashMap::new();
    for r in records {
        let entry = grouped.entry(r.match_id).or_default();
        if entry.is_empty() {
            order.push(r.match_id);
        }
        entry.push(r);
    }

    let mut out = Vec::with_capacity(order.len());
    for match_id in order {
        let Some(group) = grouped.get(&match_id) else {
            continue;
        };
        let Some(first) = group.first() else {
            continue;
        };
        let teams = group
            .iter()
            .map(|r| r.team_name.as_str())
            .filter(|name| *name != UNKNOWN)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        let maps_won = |team: &str| -> i64 {
            group
                .iter()
                .filter(|r| r.team_name == team && r.won_map == Some(true))
                .map(|r| r.map_number)
                .collect::<BTreeSet<_>>()
                .len() as i64
        };
        let team1_name = teams.first().map(|t| t.to_string());
        let team2_name = teams.get(1).map(|t| t.to_string());

        out.push(MatchRow {
            match_id,
            date: first.date,
            event_name: first.event_name.clone(),
            series_type: first.series_type.clone(),
            is_lan: first.is_lan,
            season: first.season,
            team1_score: team1_name.as_deref().map(maps_won),
            team2_score: team2_name.as_deref().map(maps_won),
            team1_name,
            team2_name,
        });
    }
    out
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = row.get::<_, String>(idx)?;
    raw.trim()
        .parse::<T>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw = row.get::<_, String>(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}
