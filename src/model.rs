//! Domain types shared by every stage of the planner.
//!
//! Records (`TaskRecord`, `VehicleRecord`) are what callers hand in, straight
//! from whatever store produced them. `Task` and `Vehicle` are the
//! normalized forms the optimizer works on. `Route`, `Step`,
//! `UnassignedEntry` and `Summary` make up the result.

use serde::{Deserialize, Serialize};

use crate::location::LocationLike;
use crate::time_window::TimestampLike;

/// Default service time at a task, in seconds.
pub const DEFAULT_SERVICE_SECONDS: i64 = 300;

/// A validated WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Solver wire order.
    pub fn to_lon_lat(self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    pub fn from_lon_lat(pair: [f64; 2]) -> Self {
        Self::new(pair[1], pair[0])
    }
}

/// Canonical window in epoch seconds. Always `end > start` once normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }

    pub fn as_pair(&self) -> [i64; 2] {
        [self.start, self.end]
    }
}

/// Raw start/end pair as it arrives from a store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowRecord {
    #[serde(default)]
    pub start: TimestampLike,
    #[serde(default)]
    pub end: TimestampLike,
}

impl WindowRecord {
    pub fn new(start: impl Into<TimestampLike>, end: impl Into<TimestampLike>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// A delivery task as supplied by the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    #[serde(default)]
    pub location: LocationLike,
    #[serde(default)]
    pub demand_volume: serde_json::Value,
    #[serde(default)]
    pub deadline_window: WindowRecord,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub service_duration: Option<f64>,
}

impl TaskRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: LocationLike::Missing,
            demand_volume: serde_json::Value::Null,
            deadline_window: WindowRecord::default(),
            status: None,
            service_duration: None,
        }
    }
}

/// A vehicle as supplied by the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRecord {
    pub id: String,
    /// Live position reported by the vehicle.
    #[serde(default)]
    pub location: LocationLike,
    #[serde(default)]
    pub location_updated_at: TimestampLike,
    #[serde(default)]
    pub depot_location: LocationLike,
    #[serde(default)]
    pub capacity: serde_json::Value,
    #[serde(default)]
    pub shift_window: WindowRecord,
}

impl VehicleRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: LocationLike::Missing,
            location_updated_at: TimestampLike::Missing,
            depot_location: LocationLike::Missing,
            capacity: serde_json::Value::Null,
            shift_window: WindowRecord::default(),
        }
    }
}

/// Normalized task. `location` is `None` when no usable coordinates exist.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub location: Option<Coordinate>,
    pub demand: u32,
    pub deadline: TimeWindow,
    pub service_seconds: i64,
}

/// Normalized vehicle. `location` is `None` when neither the live nor the
/// depot position could be used.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: String,
    pub location: Option<Coordinate>,
    pub capacity: u32,
    pub shift: TimeWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Start,
    Job,
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub kind: StepKind,
    pub task_id: Option<String>,
    pub location: Option<Coordinate>,
    /// Estimated arrival, epoch seconds.
    pub arrival: i64,
    /// Cumulative demand served once this step completes.
    pub load: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub vehicle_id: String,
    pub steps: Vec<Step>,
    /// Meters.
    pub distance: f64,
    /// Seconds.
    pub duration: f64,
    pub cost: f64,
}

impl Route {
    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.steps
            .iter()
            .filter_map(|step| step.task_id.as_deref())
    }

    pub fn job_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.kind == StepKind::Job)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnassignedReason {
    Capacity,
    TimeWindow,
    Location,
    InfeasibleOther,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnassignedEntry {
    pub task_id: String,
    pub reason: UnassignedReason,
    /// Human-readable detail, usually the raw text from the solver.
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Solver,
    Fallback,
    /// Nothing to plan: no usable tasks or no usable vehicles.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub cost: f64,
    pub routes: usize,
    pub unassigned: Vec<UnassignedEntry>,
    pub assigned: usize,
    pub distance: f64,
    pub duration: f64,
    pub source: PlanSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub routes: Vec<Route>,
    pub summary: Summary,
}

impl OptimizationResult {
    pub fn route_for(&self, vehicle_id: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.vehicle_id == vehicle_id)
    }

    pub fn unassigned_reason(&self, task_id: &str) -> Option<UnassignedReason> {
        self.summary
            .unassigned
            .iter()
            .find(|entry| entry.task_id == task_id)
            .map(|entry| entry.reason)
    }
}
