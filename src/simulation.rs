use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::assign::RoundAssigner;
use crate::models::{Cube, MatchRecord, Player, Vote};
use crate::swiss::{calculate_points_from_results, generate_swiss_pairings, SwissPlayer};
use crate::DraftError;

/// Knobs of one synthetic tournament run.
#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub player_count: usize,
    pub cube_count: usize,
    pub draft_rounds: u32,
    pub swiss_rounds_per_draft: u32,
    /// Share of DESIRED votes in the generated vote matrix (0-1).
    pub desired_rate: f64,
    /// Share of AVOID votes in the generated vote matrix (0-1).
    pub avoid_rate: f64,
    /// Fixed seed for reproducible runs; random when absent.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            player_count: 64,
            cube_count: 24,
            draft_rounds: 3,
            swiss_rounds_per_draft: 3,
            desired_rate: 0.3,
            avoid_rate: 0.2,
            seed: None,
        }
    }
}

/// One pod as seen by the aggregate statistics.
#[derive(Debug, Clone)]
pub struct PodDetail {
    pub pod_number: usize,
    pub cube_id: String,
    pub cube_name: String,
    pub player_count: usize,
    pub desired_voters: usize,
    pub neutral_voters: usize,
    pub avoid_voters: usize,
}

#[derive(Debug, Clone)]
pub struct DraftDetail {
    pub draft_number: u32,
    pub pods: Vec<PodDetail>,
}

/// Which cube a player drafted in one round and how they had voted on it.
#[derive(Debug, Clone)]
pub struct AssignmentSummary {
    pub draft_number: u32,
    pub cube_id: String,
    pub cube_name: String,
    pub original_vote: Vote,
    pub pod_number: usize,
}

/// A player's final line of the simulation.
#[derive(Debug, Clone)]
pub struct PlayerSummary {
    pub player_id: String,
    pub match_points: i32,
    pub assignments: Vec<AssignmentSummary>,
}

/// Aggregate outcome of a simulation run.
#[derive(Debug, Clone, Default)]
pub struct SimulationStats {
    pub total_pods: usize,
    pub desired_assignments: usize,
    pub neutral_assignments: usize,
    pub avoid_assignments: usize,
    pub desired_rate: f64,
    pub avoid_rate: f64,
    /// Number of degraded ("Fallback") cube choices across all drafts.
    pub fallbacks_used: usize,
    pub warnings: Vec<String>,
    pub pod_sizes_per_draft: Vec<Vec<usize>>,
    pub draft_details: Vec<DraftDetail>,
    pub final_standings: Vec<PlayerSummary>,
}

fn generate_random_votes(
    player_count: usize,
    cube_ids: &[String],
    desired_rate: f64,
    avoid_rate: f64,
    rng: &mut StdRng,
) -> Vec<HashMap<String, Vote>> {
    (0..player_count)
        .map(|_| {
            cube_ids
                .iter()
                .map(|cube_id| {
                    let r: f64 = rng.gen();
                    let vote = if r < desired_rate {
                        Vote::Desired
                    } else if r < desired_rate + avoid_rate {
                        Vote::Avoid
                    } else {
                        Vote::Neutral
                    };
                    (cube_id.clone(), vote)
                })
                .collect()
        })
        .collect()
}

/// 2-0 or 2-1 either way; draws are left out of the simulation.
fn simulate_match_result(rng: &mut StdRng) -> (i32, i32) {
    let p1_skill: f64 = rng.gen();
    let p2_skill: f64 = rng.gen();
    let clean: bool = rng.gen::<f64>() > 0.4;
    if p1_skill > p2_skill {
        if clean { (2, 0) } else { (2, 1) }
    } else if clean {
        (0, 2)
    } else {
        (1, 2)
    }
}

/// Runs a full synthetic tournament against the given assignment strategy.
///
/// Every draft round asks the strategy for pods, plays the configured number
/// of Swiss rounds per pod with randomized results and folds the pod totals
/// back into the global standings. With a fixed seed the run is fully
/// deterministic for the in-process strategies.
pub async fn run_simulation<A: RoundAssigner>(
    assigner: &A,
    config: &SimulationConfig,
) -> Result<SimulationStats, DraftError> {
    let seed = config.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    info!(strategy = assigner.name(), seed, "starting simulation");

    let cubes: Vec<Cube> = (0..config.cube_count)
        .map(|i| Cube {
            id: format!("cube_{i}"),
            name: format!("Cube {}", i + 1),
            max_players: None,
        })
        .collect();
    let cube_ids: Vec<String> = cubes.iter().map(|c| c.id.clone()).collect();
    let cube_names: HashMap<String, String> =
        cubes.iter().map(|c| (c.id.clone(), c.name.clone())).collect();

    let all_votes = generate_random_votes(
        config.player_count,
        &cube_ids,
        config.desired_rate,
        config.avoid_rate,
        &mut rng,
    );

    let mut players: Vec<Player> = (0..config.player_count)
        .map(|i| Player {
            id: format!("player_{i}"),
            votes: all_votes[i].clone(),
            ..Player::default()
        })
        .collect();

    let mut assignments: HashMap<String, Vec<AssignmentSummary>> =
        players.iter().map(|p| (p.id.clone(), Vec::new())).collect();

    let mut stats = SimulationStats::default();
    let mut used_cube_ids: Vec<String> = Vec::new();

    for draft in 1..=config.draft_rounds {
        let result = assigner
            .assign_round(&players, &cubes, &used_cube_ids, draft)
            .await?;

        stats.fallbacks_used += result
            .warnings
            .iter()
            .filter(|w| w.contains("Fallback"))
            .count();
        stats.warnings.extend(result.warnings.clone());
        stats.total_pods += result.pods.len();
        stats
            .pod_sizes_per_draft
            .push(result.pods.iter().map(|p| p.pod_size).collect());

        let mut draft_detail = DraftDetail {
            draft_number: draft,
            pods: Vec::new(),
        };

        for pod in &result.pods {
            used_cube_ids.push(pod.cube_id.clone());

            let cube_name = cube_names
                .get(&pod.cube_id)
                .cloned()
                .unwrap_or_else(|| pod.cube_id.clone());

            let mut detail = PodDetail {
                pod_number: pod.pod_number,
                cube_id: pod.cube_id.clone(),
                cube_name: cube_name.clone(),
                player_count: pod.player_ids.len(),
                desired_voters: 0,
                neutral_voters: 0,
                avoid_voters: 0,
            };

            for player_id in &pod.player_ids {
                let original_vote = players
                    .iter()
                    .find(|p| &p.id == player_id)
                    .map(|p| p.vote_for(&pod.cube_id))
                    .unwrap_or_default();
                match original_vote {
                    Vote::Desired => {
                        stats.desired_assignments += 1;
                        detail.desired_voters += 1;
                    }
                    Vote::Avoid => {
                        stats.avoid_assignments += 1;
                        detail.avoid_voters += 1;
                    }
                    Vote::Neutral => {
                        stats.neutral_assignments += 1;
                        detail.neutral_voters += 1;
                    }
                }
                if let Some(list) = assignments.get_mut(player_id) {
                    list.push(AssignmentSummary {
                        draft_number: draft,
                        cube_id: pod.cube_id.clone(),
                        cube_name: cube_name.clone(),
                        original_vote,
                        pod_number: pod.pod_number,
                    });
                }
            }

            draft_detail.pods.push(detail);

            // Swiss rounds inside this pod. Pairing starts from the global
            // standings, then runs on the pod-local totals.
            let mut swiss_players: Vec<SwissPlayer> = pod
                .player_ids
                .iter()
                .map(|id| SwissPlayer {
                    id: id.clone(),
                    match_points: players
                        .iter()
                        .find(|p| &p.id == id)
                        .map(|p| p.match_points)
                        .unwrap_or(0),
                })
                .collect();
            let mut all_matches: Vec<MatchRecord> = Vec::new();
            let mut previous_byes: Vec<String> = Vec::new();

            for _ in 0..config.swiss_rounds_per_draft {
                let round = generate_swiss_pairings(&swiss_players, &all_matches, &previous_byes);
                stats.warnings.extend(round.warnings);

                for pairing in round.pairings {
                    if pairing.is_bye {
                        previous_byes.push(pairing.player1_id.clone());
                        all_matches.push(MatchRecord::bye(&pairing.player1_id));
                        continue;
                    }
                    let (p1_wins, p2_wins) = simulate_match_result(&mut rng);
                    all_matches.push(MatchRecord {
                        player1_id: pairing.player1_id,
                        player2_id: pairing.player2_id,
                        player1_wins: p1_wins,
                        player2_wins: p2_wins,
                        is_bye: false,
                    });
                }

                let points = calculate_points_from_results(&all_matches);
                for sp in &mut swiss_players {
                    if let Some(p) = points.get(&sp.id) {
                        sp.match_points = p.match_points;
                    }
                }
            }

            // Fold the pod totals into the global standings.
            let final_points = calculate_points_from_results(&all_matches);
            for player_id in &pod.player_ids {
                if let Some(player) = players.iter_mut().find(|p| &p.id == player_id) {
                    if let Some(points) = final_points.get(player_id) {
                        player.match_points += points.match_points;
                        player.game_wins += points.game_wins;
                        player.game_losses += points.game_losses;
                    }
                }
            }
        }

        stats.draft_details.push(draft_detail);
    }

    let total_assignments =
        stats.desired_assignments + stats.neutral_assignments + stats.avoid_assignments;
    if total_assignments > 0 {
        stats.desired_rate = stats.desired_assignments as f64 / total_assignments as f64;
        stats.avoid_rate = stats.avoid_assignments as f64 / total_assignments as f64;
    }

    let mut standings: Vec<PlayerSummary> = players
        .iter()
        .map(|p| PlayerSummary {
            player_id: p.id.clone(),
            match_points: p.match_points,
            assignments: assignments.remove(&p.id).unwrap_or_default(),
        })
        .collect();
    standings.sort_by(|a, b| b.match_points.cmp(&a.match_points));
    stats.final_standings = standings;

    info!(
        pods = stats.total_pods,
        desired = stats.desired_assignments,
        avoid = stats.avoid_assignments,
        fallbacks = stats.fallbacks_used,
        "simulation finished"
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assign::{Brunswikian, Brunswikian2};

    fn seeded_config() -> SimulationConfig {
        SimulationConfig {
            seed: Some(42),
            ..SimulationConfig::default()
        }
    }

    #[tokio::test]
    async fn full_tournament_produces_the_expected_shape() {
        let stats = run_simulation(&Brunswikian, &seeded_config()).await.unwrap();

        // 64 players -> 8 pods per draft, 3 drafts.
        assert_eq!(stats.total_pods, 24);
        for sizes in &stats.pod_sizes_per_draft {
            assert_eq!(sizes, &vec![8; 8]);
        }
        // Every player is classified once per draft.
        assert_eq!(
            stats.desired_assignments + stats.neutral_assignments + stats.avoid_assignments,
            192
        );
        assert_eq!(stats.final_standings.len(), 64);
        for summary in &stats.final_standings {
            assert_eq!(summary.assignments.len(), 3);
        }
        // 24 cubes for 24 pods: every cube is used exactly once.
        let mut used: Vec<&String> = stats
            .draft_details
            .iter()
            .flat_map(|d| d.pods.iter().map(|p| &p.cube_id))
            .collect();
        used.sort();
        used.dedup();
        assert_eq!(used.len(), 24);
    }

    #[tokio::test]
    async fn same_seed_gives_identical_assignment_counts() {
        let first = run_simulation(&Brunswikian, &seeded_config()).await.unwrap();
        let second = run_simulation(&Brunswikian, &seeded_config()).await.unwrap();

        assert_eq!(first.desired_assignments, second.desired_assignments);
        assert_eq!(first.neutral_assignments, second.neutral_assignments);
        assert_eq!(first.avoid_assignments, second.avoid_assignments);
        assert_eq!(first.fallbacks_used, second.fallbacks_used);

        let points_a: Vec<i32> = first.final_standings.iter().map(|s| s.match_points).collect();
        let points_b: Vec<i32> = second.final_standings.iter().map(|s| s.match_points).collect();
        assert_eq!(points_a, points_b);
    }

    #[tokio::test]
    async fn brunswikian2_runs_the_same_scenario() {
        let stats = run_simulation(&Brunswikian2, &seeded_config()).await.unwrap();
        assert_eq!(stats.total_pods, 24);
        assert_eq!(
            stats.desired_assignments + stats.neutral_assignments + stats.avoid_assignments,
            192
        );
    }

    #[tokio::test]
    async fn tiny_field_degrades_to_warnings() {
        let config = SimulationConfig {
            player_count: 1,
            cube_count: 2,
            draft_rounds: 1,
            ..seeded_config()
        };
        let stats = run_simulation(&Brunswikian, &config).await.unwrap();
        assert_eq!(stats.total_pods, 0);
        assert!(stats
            .warnings
            .iter()
            .any(|w| w.contains("Zu wenige aktive Spieler")));
    }
}
