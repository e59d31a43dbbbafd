use std::collections::HashSet;

use tracing::debug;

use super::{count_votes, vote_rank, Candidate, RoundAssigner};
use crate::models::{AssignmentResult, Cube, Player, Pod, Vote};
use crate::pods::calculate_pod_sizes;
use crate::DraftError;

const DESIRED_WEIGHT: i64 = 2;
const AVOID_PENALTY: i64 = 10;

/// The non-sequential "Brunswikian 2.0" strategy.
///
/// First draft (everyone tied): per pod, pick the most unpopular remaining
/// cube that still has enough non-AVOID voters, then take the best players
/// for it. Later drafts: hand the K least popular cubes to the K pods, cut
/// the field into standing blocks and match blocks to pods minimizing AVOID
/// votes, then maximizing a DESIRED/AVOID utility.
#[derive(Debug, Clone, Copy, Default)]
pub struct Brunswikian2;

impl RoundAssigner for Brunswikian2 {
    async fn assign_round(
        &self,
        players: &[Player],
        cubes: &[Cube],
        used_cube_ids: &[String],
        _round_number: u32,
    ) -> Result<AssignmentResult, DraftError> {
        Ok(run_brunswikian2(players, cubes, used_cube_ids))
    }

    fn name(&self) -> &'static str {
        "brunswikian2"
    }
}

/// Unpopular first: more AVOID votes, then fewer DESIRED votes.
fn sort_cubes_by_unpopularity(cubes: &[Cube], players: &[Candidate]) -> Vec<Cube> {
    let mut sorted: Vec<Cube> = cubes.to_vec();
    sorted.sort_by(|a, b| {
        let avoid_a = count_votes(players, &a.id, Vote::Avoid);
        let avoid_b = count_votes(players, &b.id, Vote::Avoid);
        avoid_b.cmp(&avoid_a).then_with(|| {
            let desired_a = count_votes(players, &a.id, Vote::Desired);
            let desired_b = count_votes(players, &b.id, Vote::Desired);
            desired_a.cmp(&desired_b)
        })
    });
    sorted
}

/// First draft: no standings yet, so pods are filled cube-by-cube.
///
/// Each pod takes the most unpopular remaining cube that still has at least
/// `pod_size` non-AVOID voters left (falling back to the most unpopular one
/// outright), then the best `pod_size` players for that cube.
fn assign_without_standings(
    available_cubes: &[Cube],
    players: &[Candidate],
    pod_sizes: &[usize],
) -> (Vec<String>, Vec<Vec<String>>) {
    let pod_count = pod_sizes.len();
    let mut cube_id_by_pod: Vec<String> = Vec::new();
    let mut pod_player_ids: Vec<Vec<String>> = vec![Vec::new(); pod_count];

    let mut remaining_players: Vec<Candidate> = players.to_vec();
    let mut remaining_cubes: Vec<Cube> = available_cubes.to_vec();

    for (p, &need) in pod_sizes.iter().enumerate() {
        if remaining_cubes.is_empty() || remaining_players.len() < need {
            break;
        }

        let by_unpopular = sort_cubes_by_unpopularity(&remaining_cubes, &remaining_players);
        let chosen = by_unpopular
            .iter()
            .find(|cube| {
                let fits = cube.max_players.map_or(true, |m| m >= need);
                let non_avoid = remaining_players
                    .iter()
                    .filter(|pl| pl.vote_for(&cube.id) != Vote::Avoid)
                    .count();
                fits && non_avoid >= need
            })
            .unwrap_or(&by_unpopular[0])
            .clone();

        let mut sorted_players = remaining_players.clone();
        sorted_players.sort_by_key(|pl| vote_rank(pl.vote_for(&chosen.id)));
        let taken: Vec<String> = sorted_players
            .into_iter()
            .take(need)
            .map(|pl| pl.id)
            .collect();

        debug!(pod = p + 1, cube = %chosen.id, players = taken.len(), "pod filled (first draft)");

        cube_id_by_pod.push(chosen.id.clone());
        pod_player_ids[p] = taken.clone();
        let taken_set: HashSet<String> = taken.into_iter().collect();
        remaining_players.retain(|pl| !taken_set.contains(&pl.id));
        remaining_cubes.retain(|c| c.id != chosen.id);
    }

    while cube_id_by_pod.len() < pod_count {
        cube_id_by_pod.push(String::new());
    }
    (cube_id_by_pod, pod_player_ids)
}

/// Later drafts, phase 1: the K least popular cubes go to pods 1..K.
fn assign_cubes_with_standings(
    available_cubes: &[Cube],
    players: &[Candidate],
    pod_count: usize,
) -> Vec<String> {
    let sorted = sort_cubes_by_unpopularity(available_cubes, players);
    (0..pod_count)
        .map(|i| sorted.get(i).map(|c| c.id.clone()).unwrap_or_default())
        .collect()
}

/// Later drafts, phase 2: standing blocks matched to pods.
///
/// Players are cut into contiguous blocks by descending points. Pods are then
/// served in cube order (most unpopular first), each taking the free block
/// with the fewest AVOID votes against its cube, tie-broken by utility
/// (DESIRED +2, AVOID -10 per vote). Best effort: a pod whose size matches no
/// free block stays empty.
fn assign_players_with_standings(
    players: &[Candidate],
    pod_sizes: &[usize],
    cube_id_by_pod: &[String],
) -> Vec<Vec<String>> {
    let mut by_strength: Vec<Candidate> = players.to_vec();
    by_strength.sort_by(|a, b| b.match_points.cmp(&a.match_points));

    let pod_count = pod_sizes.len();
    let mut blocks: Vec<Vec<&Candidate>> = Vec::new();
    let mut offset = 0usize;
    for &size in pod_sizes {
        let take = size.min(by_strength.len().saturating_sub(offset));
        if take == 0 {
            break;
        }
        blocks.push(by_strength[offset..offset + take].iter().collect());
        offset += take;
    }
    while blocks.len() < pod_count {
        blocks.push(Vec::new());
    }

    let block_cost = |block: &[&Candidate], cube_id: &str| -> (usize, i64) {
        let mut avoid_count = 0usize;
        let mut utility = 0i64;
        if cube_id.is_empty() {
            return (0, 0);
        }
        for pl in block {
            match pl.vote_for(cube_id) {
                Vote::Desired => utility += DESIRED_WEIGHT,
                Vote::Avoid => {
                    avoid_count += 1;
                    utility -= AVOID_PENALTY;
                }
                Vote::Neutral => {}
            }
        }
        (avoid_count, utility)
    };

    let mut pod_player_ids: Vec<Vec<String>> = vec![Vec::new(); pod_count];
    let mut used_block: HashSet<usize> = HashSet::new();
    for p in 0..pod_count {
        let mut best: Option<(usize, usize, i64)> = None; // (block, avoid, utility)
        for (b, block) in blocks.iter().enumerate() {
            if used_block.contains(&b) || block.len() != pod_sizes[p] {
                continue;
            }
            let (avoid, utility) = block_cost(block, &cube_id_by_pod[p]);
            let better = match best {
                None => true,
                Some((_, best_avoid, best_utility)) => {
                    avoid < best_avoid || (avoid == best_avoid && utility > best_utility)
                }
            };
            if better {
                best = Some((b, avoid, utility));
            }
        }
        if let Some((b, _, _)) = best {
            used_block.insert(b);
            pod_player_ids[p] = blocks[b].iter().map(|pl| pl.id.clone()).collect();
        }
    }

    pod_player_ids
}

/// Runs the non-sequential pod/cube assignment over all active players.
pub fn run_brunswikian2(
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
    let available_cubes: Vec<Cube> = cubes
        .iter()
        .filter(|c| !used_cube_ids.contains(&c.id))
        .cloned()
        .collect();

    if available_cubes.len() < pod_sizes.len() {
        warnings.push(format!(
            "Nur {} Cubes für {} Pods. Einige Pods ohne Cube.",
            available_cubes.len(),
            pod_sizes.len()
        ));
    }

    let internal: Vec<Candidate> = active.iter().map(|p| Candidate::from_player(p)).collect();
    let all_same_points = internal
        .iter()
        .all(|p| p.match_points == internal[0].match_points);

    let (cube_id_by_pod, pod_player_ids) = if all_same_points {
        assign_without_standings(&available_cubes, &internal, &pod_sizes)
    } else {
        let cube_id_by_pod =
            assign_cubes_with_standings(&available_cubes, &internal, pod_sizes.len());
        let pod_player_ids =
            assign_players_with_standings(&internal, &pod_sizes, &cube_id_by_pod);
        (cube_id_by_pod, pod_player_ids)
    };

    let mut pods = Vec::new();
    for (i, &size) in pod_sizes.iter().enumerate() {
        let player_ids = pod_player_ids.get(i).cloned().unwrap_or_default();
        if player_ids.is_empty() && size > 0 {
            warnings.push(format!("Pod {}: Keine Spieler zugewiesen.", i + 1));
        }
        pods.push(Pod {
            pod_number: i + 1,
            pod_size: size,
            cube_id: cube_id_by_pod.get(i).cloned().unwrap_or_default(),
            player_ids,
        });
    }

    AssignmentResult { pods, warnings }
}
