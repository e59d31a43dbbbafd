use tracing::debug;

use super::{count_votes, vote_rank, Candidate, RoundAssigner};
use crate::models::{AssignmentResult, Cube, Player, Pod, Vote};
use crate::pods::calculate_pod_sizes;
use crate::DraftError;

/// The sequential "Brunswikian" assignment strategy (v1).
///
/// Pods are built from the lowest standings upwards. Players strictly below
/// the pod's point boundary are fixed to it; players tied at the boundary are
/// flex candidates that may spill into the next pod. The cube is chosen so
/// that no fixed player avoids it, with a least-bad fallback (flagged via a
/// "Fallback" warning) when that is impossible.
#[derive(Debug, Clone, Copy, Default)]
pub struct Brunswikian;

impl RoundAssigner for Brunswikian {
    async fn assign_round(
        &self,
        players: &[Player],
        cubes: &[Cube],
        used_cube_ids: &[String],
        _round_number: u32,
    ) -> Result<AssignmentResult, DraftError> {
        Ok(run_brunswikian(players, cubes, used_cube_ids))
    }

    fn name(&self) -> &'static str {
        "brunswikian"
    }
}

struct CubeScore {
    cube_id: String,
    fixed_avoid_count: usize,
    desired_count: usize,
    desired_diff: usize,
    global_avoid_count: usize,
    max_player_avoid: usize,
}

/// Picks the cube for one pod.
///
/// 1. Prefer cubes no fixed player avoids; with no fixed players, prefer
///    cubes with at least `pod_size` DESIRED votes among the remaining field.
/// 2. Minimize |#DESIRED - pod_size|.
/// 3. Tie-break on higher global AVOID count (spend unpopular cubes first),
///    then on the most AVOID-heavy flex candidate avoiding the cube (place
///    the hardest player here rather than later).
/// 4. Fallback: no cube passes the fixed-player filter, take the one with the
///    fewest fixed-player AVOID votes.
fn select_cube_for_pod(
    available_cubes: &[Cube],
    fixed_players: &[Candidate],
    flex_candidates: &[Candidate],
    remaining: &[Candidate],
    pod_size: usize,
) -> (String, bool) {
    // Cubes whose declared capacity cannot hold this pod are out, unless
    // nothing else is left.
    let fitting: Vec<&Cube> = available_cubes
        .iter()
        .filter(|c| c.max_players.map_or(true, |m| m >= pod_size))
        .collect();
    let cubes: Vec<&Cube> = if fitting.is_empty() {
        available_cubes.iter().collect()
    } else {
        fitting
    };

    let scored: Vec<CubeScore> = cubes
        .iter()
        .map(|cube| {
            let desired_count = count_votes(remaining, &cube.id, Vote::Desired);
            let max_player_avoid = flex_candidates
                .iter()
                .filter(|p| p.vote_for(&cube.id) == Vote::Avoid)
                .map(Candidate::total_avoid_votes)
                .max()
                .unwrap_or(0);
            CubeScore {
                cube_id: cube.id.clone(),
                fixed_avoid_count: count_votes(fixed_players, &cube.id, Vote::Avoid),
                desired_count,
                desired_diff: desired_count.abs_diff(pod_size),
                global_avoid_count: count_votes(remaining, &cube.id, Vote::Avoid),
                max_player_avoid,
            }
        })
        .collect();

    let valid: Vec<&CubeScore> = scored.iter().filter(|s| s.fixed_avoid_count == 0).collect();
    let popular_when_no_fixed: Vec<&CubeScore> = if fixed_players.is_empty() {
        valid
            .iter()
            .copied()
            .filter(|s| s.desired_count >= pod_size)
            .collect()
    } else {
        Vec::new()
    };

    let used_fallback = valid.is_empty();
    let mut pool: Vec<&CubeScore> = if !popular_when_no_fixed.is_empty() {
        popular_when_no_fixed
    } else if !valid.is_empty() {
        valid
    } else {
        scored.iter().collect()
    };

    pool.sort_by(|a, b| {
        let fixed = if used_fallback {
            a.fixed_avoid_count.cmp(&b.fixed_avoid_count)
        } else {
            std::cmp::Ordering::Equal
        };
        fixed
            .then(a.desired_diff.cmp(&b.desired_diff))
            .then(b.global_avoid_count.cmp(&a.global_avoid_count))
            .then(b.max_player_avoid.cmp(&a.max_player_avoid))
    });

    (pool[0].cube_id.clone(), used_fallback)
}

/// Picks the flex players to fill the pod for the chosen cube.
///
/// DESIRED before NEUTRAL before AVOID; within a vote class, players with
/// more total AVOID votes go first (they are harder to place later).
fn select_flex_players(flex_candidates: &[Candidate], cube_id: &str, needed: usize) -> Vec<String> {
    let mut sorted: Vec<&Candidate> = flex_candidates.iter().collect();
    sorted.sort_by(|a, b| {
        vote_rank(a.vote_for(cube_id))
            .cmp(&vote_rank(b.vote_for(cube_id)))
            .then(b.total_avoid_votes().cmp(&a.total_avoid_votes()))
    });
    sorted.into_iter().take(needed).map(|p| p.id.clone()).collect()
}

/// Runs the sequential pod/cube assignment over all active players.
pub fn run_brunswikian(
    players: &[Player],
    cubes: &[Cube],
    used_cube_ids: &[String],
) -> AssignmentResult {
    let mut warnings = Vec::new();

    let active: Vec<&Player> = players.iter().filter(|p| !p.dropped).collect();
    if active.len() < 2 {
        return AssignmentResult {
            pods: Vec::new(),
            warnings: vec!["Zu wenige aktive Spieler.".to_string()],
        };
    }

    let pod_sizes = calculate_pod_sizes(active.len());
    let mut cubes_left: Vec<Cube> = cubes
        .iter()
        .filter(|c| !used_cube_ids.contains(&c.id))
        .cloned()
        .collect();

    if cubes_left.len() < pod_sizes.len() {
        warnings.push(format!(
            "Nur {} Cubes verfügbar für {} Pods.",
            cubes_left.len(),
            pod_sizes.len()
        ));
    }

    let mut remaining: Vec<Candidate> = active.iter().map(|p| Candidate::from_player(p)).collect();
    remaining.sort_by(|a, b| a.match_points.cmp(&b.match_points));

    let mut pods = Vec::new();

    for (i, &pod_size) in pod_sizes.iter().enumerate() {
        if remaining.is_empty() {
            break;
        }

        let actual_pod_size = pod_size.min(remaining.len());
        let selected = &remaining[..actual_pod_size];
        let pod_max_points = selected[actual_pod_size - 1].match_points;

        // Fixed: strictly below the boundary, must sit in this pod. Flex: tied
        // at the boundary, assignable to this pod or the next one.
        let fixed_players: Vec<Candidate> = selected
            .iter()
            .filter(|p| p.match_points < pod_max_points)
            .cloned()
            .collect();
        let flex_candidates: Vec<Candidate> = remaining
            .iter()
            .filter(|p| p.match_points == pod_max_points)
            .cloned()
            .collect();
        let needed_flex = actual_pod_size - fixed_players.len();

        if cubes_left.is_empty() {
            warnings.push(format!("Kein Cube mehr verfügbar für Pod {}.", i + 1));
            let selected_ids: Vec<String> = selected.iter().map(|p| p.id.clone()).collect();
            pods.push(Pod {
                pod_number: i + 1,
                pod_size: actual_pod_size,
                cube_id: String::new(),
                player_ids: selected_ids.clone(),
            });
            remaining.retain(|p| !selected_ids.contains(&p.id));
            continue;
        }

        let (cube_id, used_fallback) = select_cube_for_pod(
            &cubes_left,
            &fixed_players,
            &flex_candidates,
            &remaining,
            actual_pod_size,
        );

        if used_fallback {
            warnings.push(format!(
                "Pod {}: Kein Cube ohne Fix-Spieler-AVOID gefunden. Least-bad Fallback verwendet.",
                i + 1
            ));
        }

        let flex_ids = select_flex_players(&flex_candidates, &cube_id, needed_flex);
        let mut pod_player_ids: Vec<String> =
            fixed_players.iter().map(|p| p.id.clone()).collect();
        pod_player_ids.extend(flex_ids);

        debug!(
            pod = i + 1,
            size = actual_pod_size,
            cube = %cube_id,
            fixed = fixed_players.len(),
            flex = needed_flex,
            fallback = used_fallback,
            desired = count_votes(&remaining, &cube_id, Vote::Desired),
            avoid = count_votes(&remaining, &cube_id, Vote::Avoid),
            "pod assembled"
        );

        pods.push(Pod {
            pod_number: i + 1,
            pod_size: actual_pod_size,
            cube_id: cube_id.clone(),
            player_ids: pod_player_ids.clone(),
        });

        remaining.retain(|p| !pod_player_ids.contains(&p.id));
        // The cube is used up; for everyone left it is effectively AVOID.
        for p in &mut remaining {
            p.votes.insert(cube_id.clone(), Vote::Avoid);
        }
        cubes_left.retain(|c| c.id != cube_id);
    }

    AssignmentResult { pods, warnings }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::models::Vote;

    fn player(id: &str, match_points: i32, votes: &[(&str, Vote)]) -> Player {
        Player {
            id: id.to_string(),
            match_points,
            votes: votes
                .iter()
                .map(|(c, v)| (c.to_string(), *v))
                .collect::<HashMap<_, _>>(),
            ..Player::default()
        }
    }

    fn cube(id: &str) -> Cube {
        Cube {
            id: id.to_string(),
            name: format!("Cube {id}"),
            max_players: None,
        }
    }

    #[test]
    fn splits_all_players_into_disjoint_pods() {
        let cubes = vec![cube("c1"), cube("c2")];
        let players: Vec<Player> = (0..16)
            .map(|i| {
                player(
                    &format!("p{i}"),
                    0,
                    &[("c1", Vote::Desired), ("c2", Vote::Neutral)],
                )
            })
            .collect();

        let result = run_brunswikian(&players, &cubes, &[]);
        assert_eq!(result.pods.len(), 2);
        let mut all_ids: Vec<&String> =
            result.pods.iter().flat_map(|p| &p.player_ids).collect();
        assert_eq!(all_ids.len(), 16);
        all_ids.sort();
        all_ids.dedup();
        assert_eq!(all_ids.len(), 16);

        let mut cube_ids: Vec<&String> = result.pods.iter().map(|p| &p.cube_id).collect();
        cube_ids.sort();
        cube_ids.dedup();
        assert_eq!(cube_ids.len(), 2, "no cube may serve two pods");
    }

    #[test]
    fn prefers_the_desired_cube() {
        let cubes = vec![cube("liked"), cube("disliked")];
        let players: Vec<Player> = (0..8)
            .map(|i| {
                player(
                    &format!("p{i}"),
                    0,
                    &[("liked", Vote::Desired), ("disliked", Vote::Avoid)],
                )
            })
            .collect();

        let result = run_brunswikian(&players, &cubes, &[]);
        assert_eq!(result.pods[0].cube_id, "liked");
    }

    #[test]
    fn with_no_fixed_players_prefers_cubes_with_enough_upvotes() {
        let cubes = vec![cube("popular"), cube("low")];
        let players: Vec<Player> = (0..16)
            .map(|i| {
                player(
                    &format!("p{i}"),
                    0,
                    &[
                        ("popular", if i < 12 { Vote::Desired } else { Vote::Neutral }),
                        ("low", if i < 6 { Vote::Desired } else { Vote::Neutral }),
                    ],
                )
            })
            .collect();

        let result = run_brunswikian(&players, &cubes, &[]);
        assert_eq!(result.pods[0].cube_id, "popular");
    }

    #[test]
    fn all_avoid_equal_standing_assigns_without_fallback() {
        // No fixed players exist when everyone is tied, so the fixed-player
        // constraint is vacuously satisfied and no fallback fires.
        let cubes = vec![cube("c1"), cube("c2")];
        let players: Vec<Player> = (0..8)
            .map(|i| {
                player(
                    &format!("p{i}"),
                    0,
                    &[("c1", Vote::Avoid), ("c2", Vote::Avoid)],
                )
            })
            .collect();

        let result = run_brunswikian(&players, &cubes, &[]);
        assert_eq!(result.pods.len(), 1);
        assert!(!result.pods[0].cube_id.is_empty());
        assert!(!result.warnings.iter().any(|w| w.contains("Fallback")));
    }

    #[test]
    fn avoid_locked_fixed_players_force_the_fallback() {
        // Four low-standing players avoid every cube; the cube choice cannot
        // satisfy the fixed-player constraint and must take the least-bad one.
        let cubes = vec![cube("c1"), cube("c2")];
        let mut players: Vec<Player> = (0..4)
            .map(|i| {
                player(
                    &format!("low{i}"),
                    0,
                    &[("c1", Vote::Avoid), ("c2", Vote::Avoid)],
                )
            })
            .collect();
        players.extend((0..4).map(|i| {
            player(
                &format!("high{i}"),
                6,
                &[("c1", Vote::Desired), ("c2", Vote::Desired)],
            )
        }));

        let result = run_brunswikian(&players, &cubes, &[]);
        assert_eq!(result.pods.len(), 1);
        assert!(result.pods[0].player_ids.len() <= 8);
        assert!(result.warnings.iter().any(|w| w.contains("Fallback")));
    }

    #[test]
    fn too_few_players_degrade_to_a_warning() {
        let result = run_brunswikian(&[player("p0", 0, &[])], &[cube("c1")], &[]);
        assert!(result.pods.is_empty());
        assert_eq!(result.warnings, vec!["Zu wenige aktive Spieler.".to_string()]);
    }

    #[test]
    fn cube_shortfall_builds_pods_without_cubes() {
        let cubes = vec![cube("c1")];
        let players: Vec<Player> = (0..16)
            .map(|i| player(&format!("p{i}"), 0, &[("c1", Vote::Neutral)]))
            .collect();

        let result = run_brunswikian(&players, &cubes, &[]);
        assert_eq!(result.pods.len(), 2);
        assert!(result.pods.iter().any(|p| p.cube_id.is_empty()));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Cubes verfügbar")));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Kein Cube mehr verfügbar")));
    }

    #[test]
    fn used_cubes_are_not_reassigned() {
        let cubes = vec![cube("c1"), cube("c2")];
        let players: Vec<Player> = (0..8)
            .map(|i| {
                player(
                    &format!("p{i}"),
                    0,
                    &[("c1", Vote::Desired), ("c2", Vote::Neutral)],
                )
            })
            .collect();

        let result = run_brunswikian(&players, &cubes, &["c1".to_string()]);
        assert_eq!(result.pods[0].cube_id, "c2");
    }

    #[test]
    fn dropped_players_are_left_out() {
        let cubes = vec![cube("c1")];
        let mut players: Vec<Player> = (0..9)
            .map(|i| player(&format!("p{i}"), 0, &[("c1", Vote::Neutral)]))
            .collect();
        players[8].dropped = true;

        let result = run_brunswikian(&players, &cubes, &[]);
        let all_ids: Vec<&String> = result.pods.iter().flat_map(|p| &p.player_ids).collect();
        assert_eq!(all_ids.len(), 8);
        assert!(!all_ids.iter().any(|id| id.as_str() == "p8"));
    }

    #[test]
    fn undersized_cubes_are_skipped_when_possible() {
        let mut small = cube("small");
        small.max_players = Some(4);
        let cubes = vec![small, cube("big")];
        let players: Vec<Player> = (0..8)
            .map(|i| {
                player(
                    &format!("p{i}"),
                    0,
                    &[("small", Vote::Desired), ("big", Vote::Neutral)],
                )
            })
            .collect();

        let result = run_brunswikian(&players, &cubes, &[]);
        assert_eq!(result.pods[0].cube_id, "big");
    }
}
