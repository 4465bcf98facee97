//! Dispatch optimizer: records in, routes and diagnostics out.
//!
//! Normalizes the input, asks the external solver for a plan, falls back to
//! the greedy builder when the solver fails or returns no routes, and
//! reconciles whichever plan was produced. Data-quality problems never
//! surface as errors; they show up in `summary.unassigned` instead.

use jiff::Timestamp;
use jiff::tz::TimeZone;
use tracing::{info, instrument, warn};

use crate::error::OptimizeError;
use crate::fallback::build_fallback_routes;
use crate::model::{OptimizationResult, PlanSource, Task, TaskRecord, Vehicle, VehicleRecord};
use crate::normalize::{NormalizeContext, normalize_tasks, normalize_vehicles};
use crate::payload::{IdMaps, build_payload};
use crate::reconcile::Reconciler;
use crate::traits::{NoEstimate, RouteSolver, TravelTimeEstimator};
use crate::travel_time::{TravelTimes, env_parse};
use crate::vroom::{SolverResponse, SolverUnassigned};

const NO_VEHICLES: &str = "no vehicle available";

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Zone used for "today 08:00" style window defaults.
    pub time_zone: TimeZone,
    /// Live vehicle positions older than this fall back to the depot.
    pub max_location_age_secs: i64,
    pub default_demand: u32,
    pub default_capacity: u32,
    /// Send a travel-time matrix with each request so the solver needs no
    /// routing engine of its own.
    pub solver_matrix: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            time_zone: TimeZone::system(),
            max_location_age_secs: 30 * 60,
            default_demand: 1,
            default_capacity: 100,
            solver_matrix: false,
        }
    }
}

impl OptimizerConfig {
    /// `DISPATCH_TIME_ZONE` (IANA name), `DISPATCH_LOCATION_MAX_AGE_SECS`,
    /// `DISPATCH_DEFAULT_DEMAND`, `DISPATCH_DEFAULT_CAPACITY`,
    /// `DISPATCH_SOLVER_MATRIX`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let time_zone = std::env::var("DISPATCH_TIME_ZONE")
            .ok()
            .and_then(|name| match TimeZone::get(&name) {
                Ok(tz) => Some(tz),
                Err(err) => {
                    warn!(zone = %name, error = %err, "unknown time zone, using system zone");
                    None
                }
            })
            .unwrap_or(defaults.time_zone);

        Self {
            time_zone,
            max_location_age_secs: env_parse::<i64>("DISPATCH_LOCATION_MAX_AGE_SECS")
                .unwrap_or(defaults.max_location_age_secs),
            default_demand: env_parse::<u32>("DISPATCH_DEFAULT_DEMAND")
                .filter(|demand| *demand > 0)
                .unwrap_or(defaults.default_demand),
            default_capacity: env_parse::<u32>("DISPATCH_DEFAULT_CAPACITY")
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.default_capacity),
            solver_matrix: env_parse::<bool>("DISPATCH_SOLVER_MATRIX")
                .unwrap_or(defaults.solver_matrix),
        }
    }

    fn context(&self, now: Timestamp) -> NormalizeContext {
        NormalizeContext {
            now,
            time_zone: self.time_zone.clone(),
            max_location_age_secs: self.max_location_age_secs,
            default_demand: self.default_demand,
            default_capacity: self.default_capacity,
        }
    }
}

pub struct Optimizer<S, E = NoEstimate> {
    solver: S,
    travel: TravelTimes<E>,
    config: OptimizerConfig,
}

impl<S: RouteSolver> Optimizer<S, NoEstimate> {
    pub fn new(solver: S, config: OptimizerConfig) -> Self {
        Self {
            solver,
            travel: TravelTimes::new(NoEstimate),
            config,
        }
    }
}

impl<S: RouteSolver, E: TravelTimeEstimator> Optimizer<S, E> {
    pub fn with_estimator(solver: S, estimator: E, config: OptimizerConfig) -> Self {
        Self {
            solver,
            travel: TravelTimes::new(estimator),
            config,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn optimize(
        &self,
        tasks: &[TaskRecord],
        vehicles: &[VehicleRecord],
    ) -> Result<OptimizationResult, OptimizeError> {
        self.optimize_at(tasks, vehicles, Timestamp::now())
    }

    /// `optimize` with an explicit clock.
    #[instrument(skip_all, fields(tasks = tasks.len(), vehicles = vehicles.len()))]
    pub fn optimize_at(
        &self,
        tasks: &[TaskRecord],
        vehicles: &[VehicleRecord],
        now: Timestamp,
    ) -> Result<OptimizationResult, OptimizeError> {
        let ctx = self.config.context(now);
        let tasks = normalize_tasks(tasks, &ctx);
        let vehicles = normalize_vehicles(vehicles, &ctx);

        self.plan(&tasks, &vehicles, now.as_second())
    }

    /// Plan already-normalized tasks and vehicles.
    pub fn plan(
        &self,
        tasks: &[Task],
        vehicles: &[Vehicle],
        now: i64,
    ) -> Result<OptimizationResult, OptimizeError> {
        let routable_tasks: Vec<Task> = tasks
            .iter()
            .filter(|task| task.location.is_some())
            .cloned()
            .collect();
        let routable_vehicles: Vec<Vehicle> = vehicles
            .iter()
            .filter(|vehicle| vehicle.location.is_some())
            .cloned()
            .collect();

        if routable_tasks.is_empty() || routable_vehicles.is_empty() {
            info!(
                tasks = routable_tasks.len(),
                vehicles = routable_vehicles.len(),
                "nothing to route"
            );
            let maps = IdMaps::new(&routable_tasks, &routable_vehicles);
            let response = SolverResponse {
                unassigned: routable_tasks
                    .iter()
                    .filter_map(|task| maps.task_solver_id(&task.id))
                    .map(|id| SolverUnassigned {
                        id,
                        reason: Some(NO_VEHICLES.to_string()),
                    })
                    .collect(),
                ..Default::default()
            };
            let reconciler = Reconciler::new(&maps, tasks, vehicles, &self.travel, now);
            return Ok(reconciler.reconcile(response, PlanSource::Empty));
        }

        let (request, maps) = build_payload(&routable_tasks, &routable_vehicles)?;
        let request = if self.config.solver_matrix {
            request.with_duration_matrix(&self.travel)
        } else {
            request
        };

        let (response, source) = match self.solver.solve(&request) {
            Ok(response) if !response.routes.is_empty() => (response, PlanSource::Solver),
            Ok(_) => {
                warn!("solver returned no routes, using fallback");
                let response = self.fallback(&routable_tasks, &routable_vehicles, &maps, now);
                (response, PlanSource::Fallback)
            }
            Err(err) => {
                warn!(error = %err, "solver failed, using fallback");
                let response = self.fallback(&routable_tasks, &routable_vehicles, &maps, now);
                (response, PlanSource::Fallback)
            }
        };

        let reconciler = Reconciler::new(&maps, tasks, vehicles, &self.travel, now);
        let result = reconciler.reconcile(response, source);

        info!(
            source = ?result.summary.source,
            routes = result.summary.routes,
            assigned = result.summary.assigned,
            unassigned = result.summary.unassigned.len(),
            cost = result.summary.cost,
            "optimization finished"
        );

        Ok(result)
    }

    fn fallback(
        &self,
        tasks: &[Task],
        vehicles: &[Vehicle],
        maps: &IdMaps,
        now: i64,
    ) -> SolverResponse {
        build_fallback_routes(tasks, vehicles, maps, &self.travel, now)
    }
}
