use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::models::{MatchRecord, Player, StandingsEntry, SwissPairing, SwissRound};

/// The slice of a player the pairing engine needs: id and current points.
#[derive(Debug, Clone)]
pub struct SwissPlayer {
    pub id: String,
    pub match_points: i32,
}

/// Match points and game counts accumulated from reported results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerPoints {
    pub match_points: i32,
    pub game_wins: i32,
    pub game_losses: i32,
}

/// The three Swiss tiebreaker percentages, each floored at 0.33.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tiebreakers {
    pub omw: f64,
    pub gw: f64,
    pub ogw: f64,
}

/// No score is measured below 33%, even for a player who has won nothing.
const TIEBREAKER_FLOOR: f64 = 0.33;

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Generates one round of Swiss pairings inside a pod.
///
/// Players are sorted by points (highest first) and paired top-down, skipping
/// opponents they already faced. With an odd count the lowest-standing player
/// without a previous bye receives the bye; if everyone had one already, the
/// lowest player gets another and a warning is emitted. An unavoidable repeat
/// pairing is produced anyway and flagged via warning.
pub fn generate_swiss_pairings(
    players: &[SwissPlayer],
    previous_matches: &[MatchRecord],
    previous_byes: &[String],
) -> SwissRound {
    let mut warnings = Vec::new();
    let mut pairings = Vec::new();

    if players.is_empty() {
        return SwissRound {
            pairings,
            warnings: vec!["Keine Spieler für Paarungen.".to_string()],
        };
    }

    let mut played_pairs: HashSet<(String, String)> = HashSet::new();
    for m in previous_matches {
        if let Some(p2) = &m.player2_id {
            played_pairs.insert(pair_key(&m.player1_id, p2));
        }
    }

    let mut sorted: Vec<SwissPlayer> = players.to_vec();
    sorted.sort_by(|a, b| b.match_points.cmp(&a.match_points));

    let mut to_match = sorted.clone();
    if sorted.len() % 2 != 0 {
        // Lowest-standing player without a previous bye.
        let bye_idx = (0..sorted.len())
            .rev()
            .find(|&i| !previous_byes.contains(&sorted[i].id));

        let bye_idx = match bye_idx {
            Some(i) => i,
            None => {
                let last = sorted.len() - 1;
                warnings.push(format!(
                    "Alle Spieler hatten bereits ein Bye. {} bekommt ein weiteres.",
                    sorted[last].id
                ));
                last
            }
        };

        let bye_player = to_match.remove(bye_idx);
        debug!(player = %bye_player.id, "awarding bye");
        pairings.push(SwissPairing {
            player1_id: bye_player.id,
            player2_id: None,
            is_bye: true,
        });
    }

    let mut paired: HashSet<String> = HashSet::new();
    for i in 0..to_match.len() {
        if paired.contains(&to_match[i].id) {
            continue;
        }

        // First unpaired player below with no prior head-to-head.
        let mut best: Option<usize> = None;
        for j in (i + 1)..to_match.len() {
            if paired.contains(&to_match[j].id) {
                continue;
            }
            if !played_pairs.contains(&pair_key(&to_match[i].id, &to_match[j].id)) {
                best = Some(j);
                break;
            }
        }

        // All remaining opponents were already played; take the next one anyway.
        if best.is_none() {
            for j in (i + 1)..to_match.len() {
                if !paired.contains(&to_match[j].id) {
                    warnings.push(format!(
                        "Wiederholungs-Paarung: {} vs {}",
                        to_match[i].id, to_match[j].id
                    ));
                    best = Some(j);
                    break;
                }
            }
        }

        if let Some(j) = best {
            paired.insert(to_match[i].id.clone());
            paired.insert(to_match[j].id.clone());
            pairings.push(SwissPairing {
                player1_id: to_match[i].id.clone(),
                player2_id: Some(to_match[j].id.clone()),
                is_bye: false,
            });
        }
    }

    SwissRound { pairings, warnings }
}

/// Folds reported results into match points and game counts per player.
///
/// Win = 3 points, draw = 1 each, loss = 0. A bye is worth 3 points and is
/// credited as a 2-0 in games.
pub fn calculate_points_from_results(results: &[MatchRecord]) -> HashMap<String, PlayerPoints> {
    let mut stats: HashMap<String, PlayerPoints> = HashMap::new();

    for result in results {
        if result.is_bye {
            let p1 = stats.entry(result.player1_id.clone()).or_default();
            p1.match_points += 3;
            p1.game_wins += 2;
            continue;
        }

        let Some(p2_id) = &result.player2_id else {
            continue;
        };

        {
            let p1 = stats.entry(result.player1_id.clone()).or_default();
            p1.game_wins += result.player1_wins;
            p1.game_losses += result.player2_wins;
        }
        {
            let p2 = stats.entry(p2_id.clone()).or_default();
            p2.game_wins += result.player2_wins;
            p2.game_losses += result.player1_wins;
        }

        if result.player1_wins > result.player2_wins {
            stats.entry(result.player1_id.clone()).or_default().match_points += 3;
        } else if result.player2_wins > result.player1_wins {
            stats.entry(p2_id.clone()).or_default().match_points += 3;
        } else {
            stats.entry(result.player1_id.clone()).or_default().match_points += 1;
            stats.entry(p2_id.clone()).or_default().match_points += 1;
        }
    }

    stats
}

fn match_win_percent(stats: &HashMap<String, PlayerPoints>, id: &str, rounds_played: usize) -> f64 {
    let Some(s) = stats.get(id) else {
        return TIEBREAKER_FLOOR;
    };
    if rounds_played == 0 {
        return TIEBREAKER_FLOOR;
    }
    (f64::from(s.match_points) / (rounds_played as f64 * 3.0)).max(TIEBREAKER_FLOOR)
}

fn game_win_percent(stats: &HashMap<String, PlayerPoints>, id: &str) -> f64 {
    let Some(s) = stats.get(id) else {
        return TIEBREAKER_FLOOR;
    };
    let total = s.game_wins + s.game_losses;
    if total == 0 {
        return TIEBREAKER_FLOOR;
    }
    (f64::from(s.game_wins) / f64::from(total)).max(TIEBREAKER_FLOOR)
}

/// Computes OMW%, GW% and OGW% for the given players over their full history.
///
/// Byes count as rounds played but contribute no opponent, so a bye-only
/// player sits at the 0.33 floor for both opponent averages.
pub fn calculate_tiebreakers(
    player_ids: &[String],
    all_results: &[MatchRecord],
) -> HashMap<String, Tiebreakers> {
    let stats = calculate_points_from_results(all_results);

    let mut opponents: HashMap<String, Vec<String>> = HashMap::new();
    let mut rounds_played: HashMap<String, usize> = HashMap::new();
    for result in all_results {
        *rounds_played.entry(result.player1_id.clone()).or_default() += 1;
        if let Some(p2) = &result.player2_id {
            *rounds_played.entry(p2.clone()).or_default() += 1;
        }
        if result.is_bye {
            continue;
        }
        if let Some(p2) = &result.player2_id {
            opponents
                .entry(result.player1_id.clone())
                .or_default()
                .push(p2.clone());
            opponents
                .entry(p2.clone())
                .or_default()
                .push(result.player1_id.clone());
        }
    }

    let mut tiebreakers = HashMap::new();
    for id in player_ids {
        let opps = opponents.get(id).map(Vec::as_slice).unwrap_or(&[]);

        let omw = if opps.is_empty() {
            TIEBREAKER_FLOOR
        } else {
            opps.iter()
                .map(|o| match_win_percent(&stats, o, rounds_played.get(o).copied().unwrap_or(0)))
                .sum::<f64>()
                / opps.len() as f64
        };

        let gw = game_win_percent(&stats, id);

        let ogw = if opps.is_empty() {
            TIEBREAKER_FLOOR
        } else {
            opps.iter().map(|o| game_win_percent(&stats, o)).sum::<f64>() / opps.len() as f64
        };

        tiebreakers.insert(id.clone(), Tiebreakers { omw, gw, ogw });
    }

    tiebreakers
}

/// Builds ranked standings from the full match history.
///
/// Match results are the single source of truth; nothing here is persisted.
/// Sort order: match points, then OMW%, then GW%, then OGW%, all descending.
/// Ties keep their relative input order and receive distinct consecutive ranks.
pub fn compute_standings(players: &[Player], all_results: &[MatchRecord]) -> Vec<StandingsEntry> {
    let ids: Vec<String> = players.iter().map(|p| p.id.clone()).collect();
    let stats = calculate_points_from_results(all_results);
    let tiebreakers = calculate_tiebreakers(&ids, all_results);

    // Match win/loss/draw tallies; a bye counts as a match win.
    let mut wins: HashMap<String, i32> = HashMap::new();
    let mut losses: HashMap<String, i32> = HashMap::new();
    let mut draws: HashMap<String, i32> = HashMap::new();
    for result in all_results {
        if result.is_bye {
            *wins.entry(result.player1_id.clone()).or_default() += 1;
            continue;
        }
        let Some(p2) = &result.player2_id else {
            continue;
        };
        if result.player1_wins > result.player2_wins {
            *wins.entry(result.player1_id.clone()).or_default() += 1;
            *losses.entry(p2.clone()).or_default() += 1;
        } else if result.player2_wins > result.player1_wins {
            *wins.entry(p2.clone()).or_default() += 1;
            *losses.entry(result.player1_id.clone()).or_default() += 1;
        } else {
            *draws.entry(result.player1_id.clone()).or_default() += 1;
            *draws.entry(p2.clone()).or_default() += 1;
        }
    }

    let mut entries: Vec<StandingsEntry> = players
        .iter()
        .map(|p| {
            let s = stats.get(&p.id).copied().unwrap_or_default();
            let t = tiebreakers.get(&p.id).copied().unwrap_or(Tiebreakers {
                omw: TIEBREAKER_FLOOR,
                gw: TIEBREAKER_FLOOR,
                ogw: TIEBREAKER_FLOOR,
            });
            StandingsEntry {
                rank: 0,
                player_id: p.id.clone(),
                match_points: s.match_points,
                match_wins: wins.get(&p.id).copied().unwrap_or(0),
                match_losses: losses.get(&p.id).copied().unwrap_or(0),
                match_draws: draws.get(&p.id).copied().unwrap_or(0),
                game_wins: s.game_wins,
                game_losses: s.game_losses,
                omw_percent: t.omw,
                gw_percent: t.gw,
                ogw_percent: t.ogw,
                dropped: p.dropped,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.match_points
            .cmp(&a.match_points)
            .then(b.omw_percent.total_cmp(&a.omw_percent))
            .then(b.gw_percent.total_cmp(&a.gw_percent))
            .then(b.ogw_percent.total_cmp(&a.ogw_percent))
    });
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swiss_players(points: &[i32]) -> Vec<SwissPlayer> {
        points
            .iter()
            .enumerate()
            .map(|(i, &p)| SwissPlayer {
                id: format!("p{i}"),
                match_points: p,
            })
            .collect()
    }

    fn record(p1: &str, p2: &str, w1: i32, w2: i32) -> MatchRecord {
        MatchRecord {
            player1_id: p1.to_string(),
            player2_id: Some(p2.to_string()),
            player1_wins: w1,
            player2_wins: w2,
            is_bye: false,
        }
    }

    #[test]
    fn eight_players_produce_four_pairings() {
        let round = generate_swiss_pairings(&swiss_players(&[0; 8]), &[], &[]);
        assert_eq!(round.pairings.len(), 4);
        assert!(round.pairings.iter().all(|p| !p.is_bye));
        assert!(round.warnings.is_empty());
    }

    #[test]
    fn odd_field_gets_exactly_one_bye() {
        let round = generate_swiss_pairings(&swiss_players(&[0; 7]), &[], &[]);
        let byes: Vec<_> = round.pairings.iter().filter(|p| p.is_bye).collect();
        assert_eq!(byes.len(), 1);
        assert_eq!(round.pairings.len(), 4);
    }

    #[test]
    fn bye_skips_players_who_already_had_one() {
        let players = swiss_players(&[3, 3, 3, 3, 3, 3, 0]);
        let round = generate_swiss_pairings(&players, &[], &["p6".to_string()]);
        let bye = round.pairings.iter().find(|p| p.is_bye).unwrap();
        assert_ne!(bye.player1_id, "p6");
    }

    #[test]
    fn bye_repeats_with_warning_once_everyone_had_one() {
        let players = swiss_players(&[3, 3, 0]);
        let previous: Vec<String> = players.iter().map(|p| p.id.clone()).collect();
        let round = generate_swiss_pairings(&players, &[], &previous);
        let bye = round.pairings.iter().find(|p| p.is_bye).unwrap();
        assert_eq!(bye.player1_id, "p2");
        assert!(round
            .warnings
            .iter()
            .any(|w| w.contains("bereits ein Bye")));
    }

    #[test]
    fn repeat_opponents_are_avoided_when_possible() {
        let players = vec![
            SwissPlayer { id: "p0".to_string(), match_points: 3 },
            SwissPlayer { id: "p1".to_string(), match_points: 3 },
            SwissPlayer { id: "p2".to_string(), match_points: 0 },
            SwissPlayer { id: "p3".to_string(), match_points: 0 },
        ];
        let previous = vec![record("p0", "p1", 2, 0)];
        let round = generate_swiss_pairings(&players, &previous, &[]);

        let p0_match = round
            .pairings
            .iter()
            .find(|p| p.player1_id == "p0" || p.player2_id.as_deref() == Some("p0"))
            .unwrap();
        assert_ne!(p0_match.player2_id.as_deref(), Some("p1"));
        assert!(round.warnings.is_empty());
    }

    #[test]
    fn unavoidable_repeat_is_paired_and_flagged() {
        let players = swiss_players(&[3, 0]);
        let previous = vec![record("p0", "p1", 2, 1)];
        let round = generate_swiss_pairings(&players, &previous, &[]);
        assert_eq!(round.pairings.len(), 1);
        assert!(round
            .warnings
            .iter()
            .any(|w| w.contains("Wiederholungs-Paarung")));
    }

    #[test]
    fn every_player_is_paired_exactly_once() {
        let players = swiss_players(&[0, 3, 6, 9, 12, 15]);
        let round = generate_swiss_pairings(&players, &[], &[]);
        let mut seen: Vec<String> = round
            .pairings
            .iter()
            .flat_map(|p| {
                let mut ids = vec![p.player1_id.clone()];
                if let Some(p2) = &p.player2_id {
                    ids.push(p2.clone());
                }
                ids
            })
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn a_two_zero_win_scores_three_points_and_two_game_wins() {
        let stats = calculate_points_from_results(&[record("p0", "p1", 2, 0)]);
        let winner = stats["p0"];
        let loser = stats["p1"];
        assert_eq!(winner.match_points, 3);
        assert_eq!(winner.game_wins, 2);
        assert_eq!(winner.game_losses, 0);
        assert_eq!(loser.match_points, 0);
        assert_eq!(loser.game_wins, 0);
        assert_eq!(loser.game_losses, 2);
    }

    #[test]
    fn a_bye_scores_three_points_and_a_clean_two_zero() {
        let stats = calculate_points_from_results(&[MatchRecord::bye("p0")]);
        let p0 = stats["p0"];
        assert_eq!(p0.match_points, 3);
        assert_eq!(p0.game_wins, 2);
        assert_eq!(p0.game_losses, 0);
    }

    #[test]
    fn a_draw_scores_one_point_each() {
        let stats = calculate_points_from_results(&[record("p0", "p1", 1, 1)]);
        assert_eq!(stats["p0"].match_points, 1);
        assert_eq!(stats["p1"].match_points, 1);
    }

    #[test]
    fn tiebreakers_never_drop_below_the_floor() {
        // p1 loses everything; p0's OMW/OGW are fed exclusively by p1.
        let results = vec![record("p0", "p1", 2, 0), record("p0", "p1", 2, 0)];
        let ids = vec!["p0".to_string(), "p1".to_string()];
        let t = calculate_tiebreakers(&ids, &results);
        assert!(t["p0"].omw >= 0.33);
        assert!(t["p0"].ogw >= 0.33);
        assert!(t["p1"].gw >= 0.33);
        assert!(t["p1"].omw >= 0.33);
    }

    #[test]
    fn bye_only_player_defaults_to_floor_tiebreakers() {
        let results = vec![MatchRecord::bye("p0")];
        let t = calculate_tiebreakers(&["p0".to_string()], &results);
        assert_eq!(t["p0"].omw, 0.33);
        assert_eq!(t["p0"].ogw, 0.33);
    }

    #[test]
    fn standings_rank_by_points_then_tiebreakers() {
        let players: Vec<Player> = (0..4)
            .map(|i| Player {
                id: format!("p{i}"),
                ..Player::default()
            })
            .collect();
        // p0 beats p1, p2 beats p3; p0 also beats p2 so p0 leads outright.
        let results = vec![
            record("p0", "p1", 2, 0),
            record("p2", "p3", 2, 1),
            record("p0", "p2", 2, 1),
        ];

        let standings = compute_standings(&players, &results);
        assert_eq!(standings[0].player_id, "p0");
        assert_eq!(standings[0].rank, 1);
        assert_eq!(standings[0].match_points, 6);
        assert_eq!(standings[0].match_wins, 2);
        // p2 has one win, p1 and p3 none.
        assert_eq!(standings[1].player_id, "p2");
        assert_eq!(standings.last().unwrap().rank, 4);
    }
}
