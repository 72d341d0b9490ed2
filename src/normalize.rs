use crate::model::{
    GameRecord, MatchSummary, PlayerStatRecord, RawGame, RawPlayerStat, UNKNOWN,
};
use crate::positions::player_position;

const ASSIST_WEIGHT: f64 = 0.25;

/// Flattens one match into a record per player per map.
///
/// Map winners come from each map's own score, never from the series score,
/// and a player's `won_map` is decided by team id against that winner. Maps
/// without player lines contribute nothing.
pub fn normalize(summary: &MatchSummary, games: &[RawGame]) -> Vec<PlayerStatRecord> {
    let mut ordered = games
        .iter()
        .map(|raw| (derive_game(summary, raw), raw))
        .collect::<Vec<_>>();
    ordered.sort_by_key(|(game, _)| game.game_num);

    let mut out = Vec::new();
    for (game, raw) in &ordered {
        for stat in &raw.player_stats {
            out.push(player_record(summary, game, stat));
        }
    }
    out
}

/// Resolves a raw map entry. Team ids missing on the map fall back to the
/// match's own ids.
pub fn derive_game(summary: &MatchSummary, raw: &RawGame) -> GameRecord {
    let team1_id = raw.team_1_id.or(summary.team1.id);
    let team2_id = raw.team_2_id.or(summary.team2.id);
    GameRecord {
        game_num: raw.game_num.unwrap_or(1),
        mode: named_or_unknown(raw.modes.as_ref().and_then(|m| m.name.as_deref())),
        map: named_or_unknown(raw.maps.as_ref().and_then(|m| m.name.as_deref())),
        team1_id,
        team2_id,
        team1_score: raw.team_1_score,
        team2_score: raw.team_2_score,
        winning_team_id: winning_team(team1_id, team2_id, raw.team_1_score, raw.team_2_score),
    }
}

/// Strictly higher score wins. Ties and missing scores have no winner.
pub fn winning_team(
    team1_id: Option<u64>,
    team2_id: Option<u64>,
    team1_score: Option<i64>,
    team2_score: Option<i64>,
) -> Option<u64> {
    let (Some(s1), Some(s2)) = (team1_score, team2_score) else {
        return None;
    };
    if s1 > s2 {
        team1_id
    } else if s2 > s1 {
        team2_id
    } else {
        None
    }
}

/// The source's rating when it published a non-zero one, otherwise
/// `(kills + 0.25 * assists) / max(deaths, 1)`. Both rounded to 2 decimals.
pub fn compute_rating(source: Option<f64>, kills: i64, deaths: i64, assists: i64) -> f64 {
    match source {
        Some(rating) if rating != 0.0 => round2(rating),
        _ => round2((kills as f64 + ASSIST_WEIGHT * assists as f64) / deaths.max(1) as f64),
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn player_record(
    summary: &MatchSummary,
    game: &GameRecord,
    stat: &RawPlayerStat,
) -> PlayerStatRecord {
    let team_id = stat.team_id;
    let (team_name, opponent_team_name) = if same_team(team_id, summary.team1.id) {
        (summary.team1.name.clone(), summary.team2.name.clone())
    } else if same_team(team_id, summary.team2.id) {
        (summary.team2.name.clone(), summary.team1.name.clone())
    } else {
        (UNKNOWN.to_string(), UNKNOWN.to_string())
    };

    let (team_score, opponent_score) = if same_team(team_id, game.team1_id) {
        (game.team1_score, game.team2_score)
    } else if same_team(team_id, game.team2_id) {
        (game.team2_score, game.team1_score)
    } else {
        (None, None)
    };

    let won_map = game
        .winning_team_id
        .map(|winner| same_team(team_id, Some(winner)));

    let player_name = stat.player_tag.clone().unwrap_or_else(|| match stat.player_id {
        Some(id) => format!("Player_{id}"),
        None => format!("Player_{UNKNOWN}"),
    });
    let kills = stat.kills.unwrap_or(0);
    let deaths = stat.deaths.unwrap_or(0);
    let assists = stat.assists.unwrap_or(0);

    PlayerStatRecord {
        match_id: summary.id,
        date: summary.date(),
        event_name: summary.event_name.clone(),
        season: summary.season_id,
        series_type: summary.series_type(),
        is_lan: summary.is_lan,
        position: player_position(&player_name).map(str::to_string),
        player_name,
        team_name,
        opponent_team_name,
        map_number: game.game_num,
        map_name: game.map.clone(),
        mode: game.mode.clone(),
        kills,
        deaths,
        assists,
        damage: stat.damage.unwrap_or(0.0),
        hill_time: stat.hill_time,
        plants: stat.plant_count,
        defuses: stat.defuse_count,
        rating: compute_rating(stat.bp_rating, kills, deaths, assists),
        won_map,
        team_score,
        opponent_score,
    }
}

fn same_team(a: Option<u64>, b: Option<u64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

fn named_or_unknown(name: Option<&str>) -> String {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RawNamed, TeamRef};
    use chrono::NaiveDate;

    fn summary() -> MatchSummary {
        MatchSummary {
            id: 4100,
            start: NaiveDate::from_ymd_opt(2025, 1, 18)
                .unwrap()
                .and_hms_opt(19, 0, 0)
                .unwrap(),
            event_name: "CDL Major 1 Qualifiers".to_string(),
            season_id: 2026,
            best_of: 5,
            is_lan: false,
            team1: TeamRef {
                id: Some(10),
                name: "OpTic Texas".to_string(),
            },
            team2: TeamRef {
                id: Some(20),
                name: "Boston Breach".to_string(),
            },
            team1_score: 3,
            team2_score: 1,
        }
    }

    fn stat(tag: &str, team_id: Option<u64>) -> RawPlayerStat {
        RawPlayerStat {
            player_tag: Some(tag.to_string()),
            team_id,
            kills: Some(25),
            deaths: Some(20),
            assists: Some(8),
            damage: Some(3500.0),
            ..RawPlayerStat::default()
        }
    }

    fn game(num: u32, s1: Option<i64>, s2: Option<i64>, stats: Vec<RawPlayerStat>) -> RawGame {
        RawGame {
            game_num: Some(num),
            modes: Some(RawNamed {
                name: Some("Hardpoint".to_string()),
            }),
            maps: Some(RawNamed {
                name: Some("Skyline".to_string()),
            }),
            team_1_id: Some(10),
            team_2_id: Some(20),
            team_1_score: s1,
            team_2_score: s2,
            player_stats: stats,
        }
    }

    #[test]
    fn rating_prefers_non_zero_source() {
        assert_eq!(compute_rating(Some(1.236), 10, 10, 0), 1.24);
        assert_eq!(compute_rating(Some(0.0), 30, 20, 8), 1.6);
        assert_eq!(compute_rating(None, 30, 20, 8), 1.6);
        assert_eq!(compute_rating(None, 7, 0, 2), 7.5);
    }

    #[test]
    fn winner_needs_strictly_higher_score() {
        assert_eq!(winning_team(Some(1), Some(2), Some(250), Some(190)), Some(1));
        assert_eq!(winning_team(Some(1), Some(2), Some(3), Some(6)), Some(2));
        assert_eq!(winning_team(Some(1), Some(2), Some(4), Some(4)), None);
        assert_eq!(winning_team(Some(1), Some(2), None, Some(4)), None);
    }

    #[test]
    fn won_map_follows_each_map_not_the_series() {
        let games = vec![
            game(2, Some(3), Some(6), vec![stat("Dashy", Some(10)), stat("Cammy", Some(20))]),
            game(1, Some(250), Some(201), vec![stat("Dashy", Some(10)), stat("Cammy", Some(20))]),
        ];
        let records = normalize(&summary(), &games);
        assert_eq!(records.len(), 4);

        assert_eq!(records[0].map_number, 1);
        assert_eq!(records[0].won_map, Some(true));
        assert_eq!(records[0].team_score, Some(250));
        assert_eq!(records[1].won_map, Some(false));
        assert_eq!(records[1].team_score, Some(201));
        assert_eq!(records[1].opponent_score, Some(250));

        assert_eq!(records[2].map_number, 2);
        assert_eq!(records[2].player_name, "Dashy");
        assert_eq!(records[2].won_map, Some(false));
        assert_eq!(records[3].won_map, Some(true));
        assert_eq!(records[3].team_name, "Boston Breach");
        assert_eq!(records[3].opponent_team_name, "OpTic Texas");
    }

    #[test]
    fn tied_map_has_no_result() {
        let games = vec![game(1, Some(5), Some(5), vec![stat("Dashy", Some(10)), stat("Cammy", Some(20))])];
        let records = normalize(&summary(), &games);
        assert!(records.iter().all(|r| r.won_map.is_none()));
        assert_eq!(records[0].team_score, Some(5));
        assert_eq!(records[0].opponent_score, Some(5));
    }

    #[test]
    fn unknown_team_id_nulls_names_and_scores() {
        let games = vec![game(1, Some(250), Some(100), vec![stat("Ringer", Some(99))])];
        let record = &normalize(&summary(), &games)[0];
        assert_eq!(record.team_name, UNKNOWN);
        assert_eq!(record.opponent_team_name, UNKNOWN);
        assert_eq!(record.team_score, None);
        assert_eq!(record.opponent_score, None);
        assert_eq!(record.won_map, Some(false));
        assert_eq!(record.position, None);
    }

    #[test]
    fn empty_map_contributes_nothing() {
        let games = vec![game(1, Some(6), Some(2), Vec::new())];
        assert!(normalize(&summary(), &games).is_empty());
    }

    #[test]
    fn defaults_fill_absent_fields() {
        let raw = RawGame {
            player_stats: vec![RawPlayerStat {
                player_id: Some(77),
                team_id: Some(10),
                ..RawPlayerStat::default()
            }],
            ..RawGame::default()
        };
        let record = &normalize(&summary(), &[raw])[0];
        assert_eq!(record.player_name, "Player_77");
        assert_eq!(record.map_number, 1);
        assert_eq!(record.mode, UNKNOWN);
        assert_eq!(record.map_name, UNKNOWN);
        assert_eq!(record.kills, 0);
        assert_eq!(record.rating, 0.0);
        assert_eq!(record.won_map, None);
        assert_eq!(record.team_name, "OpTic Texas");
        assert_eq!(record.series_type, "BO5");
    }

    #[test]
    fn score_sign_agrees_with_won_map() {
        let games = vec![
            game(1, Some(250), Some(230), vec![stat("Dashy", Some(10)), stat("Cammy", Some(20))]),
            game(2, Some(2), Some(6), vec![stat("Dashy", Some(10)), stat("Cammy", Some(20))]),
            game(3, Some(1), Some(1), vec![stat("Dashy", Some(10)), stat("Cammy", Some(20))]),
        ];
        for record in normalize(&summary(), &games) {
            let (Some(own), Some(opp)) = (record.team_score, record.opponent_score) else {
                panic!("scores should resolve for known teams");
            };
            let expected = if own > opp {
                Some(true)
            } else if own < opp {
                Some(false)
            } else {
                None
            };
            assert_eq!(record.won_map, expected);
        }
    }
}
