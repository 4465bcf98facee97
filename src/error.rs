//! Error types for the dispatch planner.
//!
//! Only location problems and transport failures are represented here.
//! Malformed time windows are repaired in place and never become errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("invalid location for {entity}: {detail}")]
    InvalidLocation { entity: String, detail: String },
}

impl NormalizeError {
    pub fn invalid_location(entity: &str, detail: impl Into<String>) -> Self {
        NormalizeError::InvalidLocation {
            entity: entity.to_string(),
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    #[error("{kind} {id} has no usable location")]
    MissingLocation { kind: &'static str, id: String },
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("solver unavailable: {0}")]
    Unavailable(String),

    #[error("solver request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("solver found no feasible solution: {0}")]
    Infeasible(String),
}

#[derive(Debug, Error)]
pub enum EstimateError {
    #[error("no external travel-time estimator configured")]
    Unavailable,

    #[error("travel-time request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("travel-time estimate out of range: {0} minutes")]
    OutOfRange(f64),
}

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error(transparent)]
    Payload(#[from] PayloadError),
}
