//! Round-assignment and Swiss engine for multi-round cube-draft tournaments.
//!
//! Players vote DESIRED/NEUTRAL/AVOID on a pool of cubes. Each draft round the
//! engine splits the active players into pods, assigns one unused cube per pod
//! and runs Swiss pairings with OMW%/GW%/OGW% tiebreakers inside every pod.
//! Pod/cube assignment is pluggable: two in-process heuristics and a client
//! for the external ILP solver service implement the same [`assign::RoundAssigner`]
//! trait.

/// Pluggable pod/cube assignment strategies ("Brunswikian" v1 and v2).
pub mod assign;
/// Core data model shared by every component.
pub mod models;
/// Client for the external ILP optimizer service.
pub mod optimizer;
/// Pod-size calculation from the active player count.
pub mod pods;
/// Synthetic tournament driver producing aggregate assignment statistics.
pub mod simulation;
/// Swiss pairing generation, match points and tiebreaker calculation.
pub mod swiss;

/// A thread-safe error type shared across the crate.
pub type DraftError = anyhow::Error;
