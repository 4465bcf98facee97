//! dispatch-planner
//!
//! Assigns pending delivery tasks to capacitated vehicles. An external
//! VROOM-compatible solver does the heavy lifting when it is reachable; a
//! deadline-first nearest-neighbor heuristic takes over when it is not.

pub mod error;
pub mod model;
pub mod location;
pub mod time_window;
pub mod deadline_heap;
pub mod normalize;
pub mod payload;
pub mod haversine;
pub mod travel_time;
pub mod traits;
pub mod vroom;
pub mod fallback;
pub mod reconcile;
pub mod optimizer;
pub mod rate_limit;

pub use error::{EstimateError, NormalizeError, OptimizeError, PayloadError, SolverError};
pub use model::{
    Coordinate, OptimizationResult, PlanSource, Route, Step, StepKind, Summary, Task, TaskRecord,
    TimeWindow, UnassignedEntry, UnassignedReason, Vehicle, VehicleRecord, WindowRecord,
};
pub use optimizer::{Optimizer, OptimizerConfig};
pub use traits::{NoEstimate, NoSolver, RouteSolver, TravelTimeEstimator};
