//! Seams to external collaborators.
//!
//! The optimizer is generic over both so tests and callers can plug in
//! canned solvers or estimators without touching the network.

use crate::error::{EstimateError, SolverError};
use crate::model::Coordinate;
use crate::payload::SolverRequest;
use crate::vroom::SolverResponse;

/// The external vehicle-routing solver.
pub trait RouteSolver {
    fn solve(&self, request: &SolverRequest) -> Result<SolverResponse, SolverError>;
}

/// An optional per-leg travel-time source that may beat the tiered
/// heuristic. Any error sends the leg back to the heuristic.
pub trait TravelTimeEstimator: Sync {
    /// Minutes to drive from `from` to `to`. `distance_km` is the
    /// great-circle distance, already computed by the caller.
    fn estimate_minutes(
        &self,
        from: Coordinate,
        to: Coordinate,
        distance_km: f64,
    ) -> Result<f64, EstimateError>;
}

/// No solver configured: always unavailable, so every run uses the fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSolver;

impl RouteSolver for NoSolver {
    fn solve(&self, _request: &SolverRequest) -> Result<SolverResponse, SolverError> {
        Err(SolverError::Unavailable("no solver configured".to_string()))
    }
}

/// No external estimator: every leg uses the tiered heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEstimate;

impl TravelTimeEstimator for NoEstimate {
    fn estimate_minutes(
        &self,
        _from: Coordinate,
        _to: Coordinate,
        _distance_km: f64,
    ) -> Result<f64, EstimateError> {
        Err(EstimateError::Unavailable)
    }
}

impl<T: RouteSolver + ?Sized> RouteSolver for Box<T> {
    fn solve(&self, request: &SolverRequest) -> Result<SolverResponse, SolverError> {
        (**self).solve(request)
    }
}

impl<T: TravelTimeEstimator + ?Sized> TravelTimeEstimator for Box<T> {
    fn estimate_minutes(
        &self,
        from: Coordinate,
        to: Coordinate,
        distance_km: f64,
    ) -> Result<f64, EstimateError> {
        (**self).estimate_minutes(from, to, distance_km)
    }
}
