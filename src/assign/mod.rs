use std::collections::HashMap;

use crate::models::{AssignmentResult, Cube, Player, Vote};
use crate::DraftError;

pub mod brunswikian;
pub mod brunswikian2;

pub use brunswikian::Brunswikian;
pub use brunswikian2::Brunswikian2;

/// A strategy that turns the active players, the cube pool and the already
/// used cube ids into one round's pod/cube assignment.
///
/// Implemented by the two in-process heuristics and by the ILP optimizer
/// client, so callers (round orchestration, the simulation driver) can swap
/// strategies freely.
#[allow(async_fn_in_trait)]
pub trait RoundAssigner {
    /// Builds the pods for one draft round.
    ///
    /// Input errors (too few players, no cubes) degrade to an empty result
    /// with a warning; only external failures (the solver) surface as errors.
    async fn assign_round(
        &self,
        players: &[Player],
        cubes: &[Cube],
        used_cube_ids: &[String],
        round_number: u32,
    ) -> Result<AssignmentResult, DraftError>;

    /// Human-readable strategy name for logs and simulation output.
    fn name(&self) -> &'static str;
}

/// Working copy of a player during assignment. Vote entries may be rewritten
/// while pods are built (a used cube becomes AVOID for everyone left).
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub id: String,
    pub match_points: i32,
    pub votes: HashMap<String, Vote>,
}

impl Candidate {
    pub fn from_player(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            match_points: p.match_points,
            votes: p.votes.clone(),
        }
    }

    pub fn vote_for(&self, cube_id: &str) -> Vote {
        self.votes.get(cube_id).copied().unwrap_or_default()
    }

    pub fn total_avoid_votes(&self) -> usize {
        self.votes.values().filter(|v| **v == Vote::Avoid).count()
    }
}

/// Number of players in `candidates` who cast `vote` for `cube_id`.
pub(crate) fn count_votes(candidates: &[Candidate], cube_id: &str, vote: Vote) -> usize {
    candidates.iter().filter(|c| c.vote_for(cube_id) == vote).count()
}

/// DESIRED sorts before NEUTRAL sorts before AVOID.
pub(crate) fn vote_rank(vote: Vote) -> u8 {
    match vote {
        Vote::Desired => 0,
        Vote::Neutral => 1,
        Vote::Avoid => 2,
    }
}
