use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// A player's preference for a single cube.
///
/// Missing votes are treated as [`Vote::Neutral`] everywhere.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Vote {
    #[strum(to_string = "DESIRED")]
    Desired,
    #[strum(to_string = "NEUTRAL")]
    #[default]
    Neutral,
    #[strum(to_string = "AVOID")]
    Avoid,
}

/// A tournament participant as seen by the round assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    /// Cumulative match points across all drafts so far.
    pub match_points: i32,
    pub game_wins: i32,
    pub game_losses: i32,
    /// Dropped players are excluded from every future round.
    pub dropped: bool,
    /// Cube id -> vote. Absent entries count as NEUTRAL.
    pub votes: HashMap<String, Vote>,
    /// Optional skill score; falls back to match points if absent.
    pub skill: Option<i32>,
    /// How many prior rounds this player was stuck with an AVOID cube.
    pub prior_avoid_count: i32,
}

impl Player {
    /// The player's vote for a cube, defaulting to NEUTRAL.
    pub fn vote_for(&self, cube_id: &str) -> Vote {
        self.votes.get(cube_id).copied().unwrap_or_default()
    }

    /// Total number of AVOID votes this player cast across all cubes.
    pub fn total_avoid_votes(&self) -> usize {
        self.votes.values().filter(|v| **v == Vote::Avoid).count()
    }
}

/// A card-pool variant that can be assigned to at most one pod per round.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cube {
    pub id: String,
    pub name: String,
    /// Maximum number of players this cube supports (None = no limit).
    pub max_players: Option<usize>,
}

/// One pod of a draft round: a player set drafting one assigned cube.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pod {
    /// 1-based sequence within the round; pod 1 is the lowest-standing bracket.
    pub pod_number: usize,
    /// Target size the pod was built for.
    pub pod_size: usize,
    /// Assigned cube id; empty string means no cube was available.
    pub cube_id: String,
    pub player_ids: Vec<String>,
}

/// Pods plus the warnings accumulated while building them.
///
/// Warnings are product strings; callers decide whether to surface or drop
/// them. The substring "Fallback" marks a degraded cube choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub pods: Vec<Pod>,
    pub warnings: Vec<String>,
}

/// Result of one optimized draft round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResult {
    pub round_number: u32,
    pub pods: Vec<Pod>,
    /// Objective value reported by the solver.
    pub total_score: f64,
    /// Players assigned a cube they voted DESIRED for.
    pub want_count: usize,
    /// Players assigned a cube they voted AVOID on.
    pub avoid_count: usize,
}

/// Global vote counts for one cube across all active players.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CubeVoteSummary {
    pub cube_id: String,
    pub cube_name: String,
    pub desired: usize,
    pub neutral: usize,
    pub avoid: usize,
}

/// Tallies every cube's DESIRED/NEUTRAL/AVOID votes over the non-dropped players.
pub fn global_votes_by_cube(players: &[Player], cubes: &[Cube]) -> Vec<CubeVoteSummary> {
    let active: Vec<&Player> = players.iter().filter(|p| !p.dropped).collect();
    cubes
        .iter()
        .map(|cube| {
            let mut summary = CubeVoteSummary {
                cube_id: cube.id.clone(),
                cube_name: cube.name.clone(),
                desired: 0,
                neutral: 0,
                avoid: 0,
            };
            for p in &active {
                match p.vote_for(&cube.id) {
                    Vote::Desired => summary.desired += 1,
                    Vote::Neutral => summary.neutral += 1,
                    Vote::Avoid => summary.avoid += 1,
                }
            }
            summary
        })
        .collect()
}

/// A single Swiss pairing; `player2_id == None` marks a bye.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwissPairing {
    pub player1_id: String,
    pub player2_id: Option<String>,
    pub is_bye: bool,
}

/// One generated Swiss round with its warnings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwissRound {
    pub pairings: Vec<SwissPairing>,
    pub warnings: Vec<String>,
}

/// A reported match result inside a pod.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub player1_id: String,
    pub player2_id: Option<String>,
    pub player1_wins: i32,
    pub player2_wins: i32,
    pub is_bye: bool,
}

impl MatchRecord {
    pub fn bye(player_id: &str) -> Self {
        Self {
            player1_id: player_id.to_string(),
            player2_id: None,
            player1_wins: 2,
            player2_wins: 0,
            is_bye: true,
        }
    }
}

/// A player's line in the standings, recomputed on demand from match results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingsEntry {
    pub rank: usize,
    pub player_id: String,
    pub match_points: i32,
    pub match_wins: i32,
    pub match_losses: i32,
    pub match_draws: i32,
    pub game_wins: i32,
    pub game_losses: i32,
    /// Opponent Match Win %
    pub omw_percent: f64,
    /// Game Win %
    pub gw_percent: f64,
    /// Opponent Game Win %
    pub ogw_percent: f64,
    pub dropped: bool,
}
