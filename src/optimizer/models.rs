//! Wire types for the optimizer service. Field names follow the service's
//! JSON contract (camelCase), independent of the crate's own conventions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::Vote;

/// A player as submitted to the solver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePlayer {
    pub id: String,
    pub match_points: i32,
    pub votes: HashMap<String, Vote>,
    pub dropped: bool,
    pub prior_avoid_count: i32,
}

/// A cube as submitted to the solver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCube {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_players: Option<usize>,
}

/// Request body for the solve endpoint.
///
/// Carries the full scoring configuration so the solver needs no state of
/// its own; two identical requests must yield identical assignments.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest {
    pub players: Vec<WirePlayer>,
    pub cubes: Vec<WireCube>,
    pub pod_sizes: Vec<usize>,
    pub round_number: u32,
    pub early_round_bonus: i64,
    pub score_want: f64,
    pub score_avoid: f64,
    pub score_neutral: f64,
    pub match_point_penalty_weight: i64,
    pub lower_standing_bonus: f64,
    pub repeat_avoid_multiplier: f64,
}

/// Response of the solve endpoint: per-pod player ids, the chosen cube per
/// pod (None when a pod got no cube) and the objective value reached.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeResponse {
    pub pods: Vec<Vec<String>>,
    pub cube_ids: Vec<Option<String>>,
    pub objective: f64,
}
