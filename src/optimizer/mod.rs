use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::info;

use crate::assign::RoundAssigner;
use crate::models::{AssignmentResult, Cube, Player, Pod, RoundResult, Vote};
use crate::pods::calculate_pod_sizes;
use crate::DraftError;

pub mod models;

use models::{OptimizeRequest, OptimizeResponse, WireCube, WirePlayer};

/// The scoring configuration of the round optimizer.
///
/// Passed explicitly into every call; the defaults are the canonical tuning.
/// The AVOID penalty dominates everything except the match-point penalty, so
/// AVOID assignments only happen when nothing else is feasible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerWeights {
    /// Per-player bonus for landing on a DESIRED cube.
    pub score_want: f64,
    /// Per-player score for a NEUTRAL cube.
    pub score_neutral: f64,
    /// Per-player penalty for an AVOID cube.
    pub score_avoid: f64,
    /// Weight on the match-point spread within a pod; keeps Swiss brackets intact.
    pub match_point_penalty_weight: i64,
    /// Per-pod bonus of (global AVOID votes x this) for burning unpopular
    /// cubes while no points have accumulated yet.
    pub early_round_unpopular_bonus: i64,
    /// Extra per-player preference weight in lower-standing pods.
    pub lower_standing_bonus: f64,
    /// Scales the AVOID penalty by a player's prior AVOID assignments.
    pub repeat_avoid_multiplier: f64,
}

impl Default for OptimizerWeights {
    fn default() -> Self {
        Self {
            score_want: 5.0,
            score_neutral: 0.0,
            score_avoid: -200.0,
            match_point_penalty_weight: 10000,
            early_round_unpopular_bonus: 3,
            lower_standing_bonus: 0.3,
            repeat_avoid_multiplier: 4.0,
        }
    }
}

/// Errors of the solver boundary. A failed health probe is reported
/// separately from a failed solve so callers can tell "service down" from
/// "model rejected".
#[derive(Debug)]
pub enum SolverError {
    HealthCheck(String),
    Solve(String),
}

impl std::fmt::Display for SolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverError::HealthCheck(detail) => {
                write!(f, "Optimizer health check failed: {}", detail)
            }
            SolverError::Solve(detail) => write!(f, "Optimizer error: {}", detail),
        }
    }
}

impl std::error::Error for SolverError {}

/// Options for a single optimized round.
#[derive(Debug, Clone, Default)]
pub struct RoundOptions {
    pub round_number: u32,
    /// Cap on the number of pods; defaults to the calculated pod count.
    pub pod_count: Option<usize>,
    pub used_cube_ids: Vec<String>,
}

/// Client for the external optimization service (CP-SAT behind HTTP).
///
/// The service is probed via a short-timeout health endpoint before every
/// solve; there is no local fallback and no retry. A failed solve is fatal
/// for this round's generation attempt and left to the caller.
#[derive(Debug, Clone)]
pub struct OptimizerApi {
    base_url: String,
    client: Client,
    weights: OptimizerWeights,
}

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

impl OptimizerApi {
    pub fn new(base_url: &str) -> Self {
        Self::with_weights(base_url, OptimizerWeights::default())
    }

    pub fn with_weights(base_url: &str, weights: OptimizerWeights) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            weights,
        }
    }

    /// Reads the service location from `OPTIMIZER_URL`, defaulting to the
    /// local development address.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OPTIMIZER_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
        Self::new(&base_url)
    }

    pub fn weights(&self) -> &OptimizerWeights {
        &self.weights
    }

    /// Liveness probe; must succeed before a solve request is attempted.
    pub async fn health(&self) -> Result<(), SolverError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| SolverError::HealthCheck(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(SolverError::HealthCheck(response.status().to_string()));
        }
        Ok(())
    }

    /// Submits one solve request. Any non-OK response is fatal; the body text
    /// is carried along for diagnosis.
    pub async fn solve(&self, request: &OptimizeRequest) -> Result<OptimizeResponse, SolverError> {
        let response = self
            .client
            .post(format!("{}/optimize", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| SolverError::Solve(e.to_string()))?;

        if response.status() != StatusCode::OK {
            let detail = response.text().await.unwrap_or_default();
            return Err(SolverError::Solve(detail));
        }

        response
            .json()
            .await
            .map_err(|e| SolverError::Solve(e.to_string()))
    }
}

/// Runs one optimized draft round through the solver service.
///
/// Filters dropped players, derives the pod sizes, refills already used
/// cubes when fewer unused ones remain than pods are needed, probes the
/// service and maps the solution back onto the vote matrix.
pub async fn run_optimized_round(
    api: &OptimizerApi,
    players: &[Player],
    cubes: &[Cube],
    opts: &RoundOptions,
) -> Result<RoundResult, DraftError> {
    let active: Vec<&Player> = players.iter().filter(|p| !p.dropped).collect();

    let pod_sizes = calculate_pod_sizes(active.len());
    let pod_count = opts.pod_count.unwrap_or(pod_sizes.len()).min(pod_sizes.len());
    let sizes_to_send: Vec<usize> = pod_sizes[..pod_count].to_vec();

    let mut available: Vec<&Cube> = cubes
        .iter()
        .filter(|c| !opts.used_cube_ids.contains(&c.id))
        .collect();
    if available.len() < pod_count {
        // Not enough fresh cubes; allow reuse rather than leaving pods empty.
        available.extend(cubes.iter().filter(|c| opts.used_cube_ids.contains(&c.id)));
    }

    let weights = api.weights();
    let request = OptimizeRequest {
        players: active
            .iter()
            .map(|p| WirePlayer {
                id: p.id.clone(),
                match_points: p.match_points,
                votes: p.votes.clone(),
                dropped: p.dropped,
                prior_avoid_count: p.prior_avoid_count,
            })
            .collect(),
        cubes: available
            .iter()
            .map(|c| WireCube {
                id: c.id.clone(),
                max_players: c.max_players,
            })
            .collect(),
        pod_sizes: sizes_to_send.clone(),
        round_number: opts.round_number,
        early_round_bonus: weights.early_round_unpopular_bonus,
        score_want: weights.score_want,
        score_avoid: weights.score_avoid,
        score_neutral: weights.score_neutral,
        match_point_penalty_weight: weights.match_point_penalty_weight,
        lower_standing_bonus: weights.lower_standing_bonus,
        repeat_avoid_multiplier: weights.repeat_avoid_multiplier,
    };

    api.health().await?;
    info!(
        round = opts.round_number,
        players = active.len(),
        cubes = available.len(),
        pods = sizes_to_send.len(),
        "optimizer ping OK, submitting solve request"
    );

    let response = api.solve(&request).await?;
    info!(
        round = opts.round_number,
        objective = response.objective,
        "optimizer solve OK"
    );

    Ok(map_response_to_round_result(
        &response,
        &sizes_to_send,
        opts.round_number,
        &active,
    ))
}

fn map_response_to_round_result(
    response: &OptimizeResponse,
    pod_sizes: &[usize],
    round_number: u32,
    active_players: &[&Player],
) -> RoundResult {
    let player_by_id: HashMap<&str, &Player> = active_players
        .iter()
        .map(|p| (p.id.as_str(), *p))
        .collect();

    let mut want_count = 0;
    let mut avoid_count = 0;
    let pods: Vec<Pod> = response
        .pods
        .iter()
        .enumerate()
        .map(|(k, player_ids)| {
            let cube_id = response
                .cube_ids
                .get(k)
                .and_then(|c| c.clone())
                .unwrap_or_default();
            for pid in player_ids {
                if let Some(p) = player_by_id.get(pid.as_str()) {
                    match p.vote_for(&cube_id) {
                        Vote::Desired => want_count += 1,
                        Vote::Avoid => avoid_count += 1,
                        Vote::Neutral => {}
                    }
                }
            }
            Pod {
                pod_number: k + 1,
                pod_size: pod_sizes.get(k).copied().unwrap_or(player_ids.len()),
                cube_id,
                player_ids: player_ids.clone(),
            }
        })
        .collect();

    RoundResult {
        round_number,
        pods,
        total_score: response.objective,
        want_count,
        avoid_count,
    }
}

impl RoundAssigner for OptimizerApi {
    async fn assign_round(
        &self,
        players: &[Player],
        cubes: &[Cube],
        used_cube_ids: &[String],
        round_number: u32,
    ) -> Result<AssignmentResult, DraftError> {
        let opts = RoundOptions {
            round_number,
            pod_count: None,
            used_cube_ids: used_cube_ids.to_vec(),
        };
        let round = run_optimized_round(self, players, cubes, &opts).await?;
        Ok(AssignmentResult {
            pods: round.pods,
            warnings: Vec::new(),
        })
    }

    fn name(&self) -> &'static str {
        "optimizer"
    }
}
