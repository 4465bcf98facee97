//! Turn raw solver-shaped routes into the caller-facing result.
//!
//! Both the external solver and the fallback builder produce a
//! `SolverResponse` in the numeric id space. This module maps ids back,
//! repairs missing or zero metrics, enforces the per-route invariants
//! (each task once, capacity respected, arrivals non-decreasing) and
//! classifies why tasks were left out.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::deadline_heap::{DeadlineHeap, HasDeadline};
use crate::haversine::road_distance_meters;
use crate::model::{
    Coordinate, OptimizationResult, PlanSource, Route, Step, StepKind, Summary, Task,
    UnassignedEntry, UnassignedReason, Vehicle,
};
use crate::payload::IdMaps;
use crate::traits::TravelTimeEstimator;
use crate::travel_time::TravelTimes;
use crate::vroom::{SolverResponse, SolverRoute, SolverStep};

const SECONDS_PER_KM: f64 = 180.0;
const SERVICE_SECONDS_PER_JOB: f64 = 600.0;
const MIN_ROUTE_SECONDS: f64 = 900.0;
const COST_PER_KM: f64 = 8.5;
const COST_PER_HOUR: f64 = 25.0;

const TIME_WINDOW_PATTERNS: [&str; 7] = [
    "time window",
    "time_window",
    "time-window",
    "timewindow",
    "deadline",
    "shift",
    "late",
];
const CAPACITY_PATTERNS: [&str; 4] = ["capacity", "load", "amount", "overweight"];
const LOCATION_PATTERNS: [&str; 4] = ["location", "coordinate", "unreachable", "geocod"];

const MISSING_FROM_SOLVER: &str = "not returned by the solver";
const NO_COORDINATES: &str = "location: task has no usable coordinates";
const OVER_CAPACITY: &str = "capacity: route exceeded vehicle capacity";

/// Map free-text solver reasons onto the fixed taxonomy.
pub fn classify_reason(reason: Option<&str>) -> UnassignedReason {
    let Some(reason) = reason else {
        return UnassignedReason::InfeasibleOther;
    };
    let reason = reason.to_lowercase();
    let matches_any = |patterns: &[&str]| patterns.iter().any(|pattern| reason.contains(pattern));

    if matches_any(&TIME_WINDOW_PATTERNS) {
        UnassignedReason::TimeWindow
    } else if matches_any(&CAPACITY_PATTERNS) {
        UnassignedReason::Capacity
    } else if matches_any(&LOCATION_PATTERNS) {
        UnassignedReason::Location
    } else {
        UnassignedReason::InfeasibleOther
    }
}

struct Pending {
    entry: UnassignedEntry,
    deadline: i64,
}

impl HasDeadline for Pending {
    fn deadline(&self) -> i64 {
        self.deadline
    }
}

pub struct Reconciler<'a, E> {
    maps: &'a IdMaps,
    tasks: &'a [Task],
    task_index: HashMap<&'a str, &'a Task>,
    vehicle_index: HashMap<&'a str, &'a Vehicle>,
    travel: &'a TravelTimes<E>,
    now: i64,
}

impl<'a, E: TravelTimeEstimator> Reconciler<'a, E> {
    /// `tasks` may include tasks the solver never saw (for example ones
    /// without coordinates); they are reported as unassigned.
    pub fn new(
        maps: &'a IdMaps,
        tasks: &'a [Task],
        vehicles: &'a [Vehicle],
        travel: &'a TravelTimes<E>,
        now: i64,
    ) -> Self {
        Self {
            maps,
            tasks,
            task_index: tasks.iter().map(|task| (task.id.as_str(), task)).collect(),
            vehicle_index: vehicles
                .iter()
                .map(|vehicle| (vehicle.id.as_str(), vehicle))
                .collect(),
            travel,
            now,
        }
    }

    pub fn reconcile(&self, response: SolverResponse, source: PlanSource) -> OptimizationResult {
        let mut placed: HashSet<&str> = HashSet::new();
        let mut unassigned: Vec<UnassignedEntry> = Vec::new();
        let mut routes = Vec::new();

        for raw in &response.routes {
            if let Some(route) = self.reconcile_route(raw, &mut placed, &mut unassigned) {
                routes.push(route);
            }
        }
        // A task dropped from one route may still have been served by another.
        unassigned.retain(|entry| !placed.contains(entry.task_id.as_str()));

        for raw in &response.unassigned {
            let Some(task_id) = self.maps.task_id(raw.id) else {
                warn!(solver_id = raw.id, "unknown task id in unassigned list");
                continue;
            };
            if placed.contains(task_id) || unassigned.iter().any(|entry| entry.task_id == task_id) {
                continue;
            }
            unassigned.push(UnassignedEntry {
                task_id: task_id.to_string(),
                reason: classify_reason(raw.reason.as_deref()),
                detail: raw
                    .reason
                    .clone()
                    .unwrap_or_else(|| "no reason given".to_string()),
            });
        }

        for task in self.tasks {
            let reported = unassigned.iter().any(|entry| entry.task_id == task.id);
            if placed.contains(task.id.as_str()) || reported {
                continue;
            }
            let (reason, detail) = if task.location.is_none() {
                (UnassignedReason::Location, NO_COORDINATES)
            } else {
                (UnassignedReason::InfeasibleOther, MISSING_FROM_SOLVER)
            };
            unassigned.push(UnassignedEntry {
                task_id: task.id.clone(),
                reason,
                detail: detail.to_string(),
            });
        }

        let unassigned = self.by_deadline(unassigned);
        let summary = Summary {
            cost: routes.iter().map(|route| route.cost).sum(),
            routes: routes.len(),
            assigned: placed.len(),
            distance: routes.iter().map(|route| route.distance).sum(),
            duration: routes.iter().map(|route| route.duration).sum(),
            unassigned,
            source,
        };

        OptimizationResult { routes, summary }
    }

    fn by_deadline(&self, entries: Vec<UnassignedEntry>) -> Vec<UnassignedEntry> {
        let heap: DeadlineHeap<Pending> = entries
            .into_iter()
            .map(|entry| Pending {
                deadline: self
                    .task_index
                    .get(entry.task_id.as_str())
                    .map(|task| task.deadline.end)
                    .unwrap_or(i64::MAX),
                entry,
            })
            .collect();
        heap.map(|pending| pending.entry).collect()
    }

    fn reconcile_route(
        &self,
        raw: &SolverRoute,
        placed: &mut HashSet<&'a str>,
        unassigned: &mut Vec<UnassignedEntry>,
    ) -> Option<Route> {
        let Some(vehicle_id) = self.maps.vehicle_id(raw.vehicle) else {
            warn!(solver_id = raw.vehicle, "unknown vehicle id in solver route, dropped");
            return None;
        };
        let vehicle = self.vehicle_index.get(vehicle_id).copied();
        let capacity = vehicle.map(|vehicle| vehicle.capacity).unwrap_or(u32::MAX);

        let mut load: u32 = 0;
        let mut drafts: Vec<(Step, Option<i64>)> = Vec::with_capacity(raw.steps.len());

        for step in &raw.steps {
            let kind = match step.kind.as_str() {
                "start" => StepKind::Start,
                "end" => StepKind::End,
                "job" | "delivery" | "pickup" | "service" => StepKind::Job,
                other => {
                    debug!(kind = other, vehicle = vehicle_id, "ignoring solver step");
                    continue;
                }
            };

            let task = match kind {
                StepKind::Job => match self.job_task(step, vehicle_id, placed) {
                    Some(task) => Some(task),
                    None => continue,
                },
                _ => None,
            };

            if let Some(task) = task {
                if load.saturating_add(task.demand) > capacity {
                    warn!(
                        task = %task.id,
                        vehicle = vehicle_id,
                        "solver route over capacity, task dropped"
                    );
                    if !unassigned.iter().any(|entry| entry.task_id == task.id) {
                        unassigned.push(UnassignedEntry {
                            task_id: task.id.clone(),
                            reason: UnassignedReason::Capacity,
                            detail: OVER_CAPACITY.to_string(),
                        });
                    }
                    continue;
                }
                load += task.demand;
                placed.insert(task.id.as_str());
            }

            let location = step
                .location
                .map(Coordinate::from_lon_lat)
                .or_else(|| task.and_then(|task| task.location))
                .or_else(|| vehicle.and_then(|vehicle| vehicle.location));

            drafts.push((
                Step {
                    kind,
                    task_id: task.map(|task| task.id.clone()),
                    location,
                    arrival: 0,
                    load,
                },
                step.arrival,
            ));
        }

        let mut steps: Vec<Step> = Vec::with_capacity(drafts.len());
        for (mut step, arrival) in drafts {
            step.arrival = match steps.last() {
                None => arrival.unwrap_or_else(|| self.departure(vehicle)),
                Some(previous) => {
                    let earliest = previous.arrival;
                    let estimated = arrival.unwrap_or_else(|| {
                        earliest.saturating_add(self.leg_after(previous, &step))
                    });
                    estimated.max(earliest)
                }
            };
            steps.push(step);
        }

        let jobs = steps.iter().filter(|step| step.kind == StepKind::Job).count();
        if jobs == 0 {
            debug!(vehicle = vehicle_id, "route without jobs dropped");
            return None;
        }

        let path: Vec<Coordinate> = steps.iter().filter_map(|step| step.location).collect();
        let distance = positive(raw.distance).unwrap_or_else(|| road_distance_meters(&path));
        let km = distance / 1000.0;
        let duration = positive(raw.duration).unwrap_or_else(|| {
            (km * SECONDS_PER_KM + jobs as f64 * SERVICE_SECONDS_PER_JOB).max(MIN_ROUTE_SECONDS)
        });
        let cost = positive(raw.cost)
            .unwrap_or_else(|| km * COST_PER_KM + duration / 3600.0 * COST_PER_HOUR);

        Some(Route {
            vehicle_id: vehicle_id.to_string(),
            steps,
            distance,
            duration,
            cost,
        })
    }

    /// Resolve a job step to its task, rejecting unknown and repeated ids.
    fn job_task(
        &self,
        step: &SolverStep,
        vehicle_id: &str,
        placed: &HashSet<&'a str>,
    ) -> Option<&'a Task> {
        let Some(task_id) = step.id.and_then(|id| self.maps.task_id(id)) else {
            warn!(
                solver_id = ?step.id,
                vehicle = vehicle_id,
                "job step with unknown task id dropped"
            );
            return None;
        };
        let task = self.task_index.get(task_id).copied()?;
        if placed.contains(task.id.as_str()) {
            warn!(task = %task.id, vehicle = vehicle_id, "task already routed, duplicate dropped");
            return None;
        }
        Some(task)
    }

    fn departure(&self, vehicle: Option<&Vehicle>) -> i64 {
        vehicle
            .map(|vehicle| self.now.max(vehicle.shift.start))
            .unwrap_or(self.now)
    }

    /// Service at `previous` plus driving to `next`.
    fn leg_after(&self, previous: &Step, next: &Step) -> i64 {
        let service = previous
            .task_id
            .as_deref()
            .and_then(|id| self.task_index.get(id))
            .map(|task| task.service_seconds)
            .unwrap_or(0);
        let drive = match (previous.location, next.location) {
            (Some(from), Some(to)) => self.travel.leg_seconds(from, to).round() as i64,
            _ => 0,
        };
        service.saturating_add(drive)
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|value| value.is_finite() && *value > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeWindow;
    use crate::traits::NoEstimate;
    use crate::vroom::SolverUnassigned;

    const NOW: i64 = 1_792_310_400;

    fn tasks() -> Vec<Task> {
        vec![
            Task {
                id: "order-17".to_string(),
                location: Some(Coordinate::new(19.2429, 72.9825)),
                demand: 4,
                deadline: TimeWindow::new(NOW, NOW + 7200),
                service_seconds: 300,
            },
            Task {
                id: "order-18".to_string(),
                location: Some(Coordinate::new(19.2500, 72.9900)),
                demand: 5,
                deadline: TimeWindow::new(NOW, NOW + 3600),
                service_seconds: 300,
            },
            Task {
                id: "order-19".to_string(),
                location: Some(Coordinate::new(19.2600, 72.9950)),
                demand: 3,
                deadline: TimeWindow::new(NOW, NOW + 1800),
                service_seconds: 300,
            },
        ]
    }

    fn vehicles() -> Vec<Vehicle> {
        vec![Vehicle {
            id: "van-a".to_string(),
            location: Some(Coordinate::new(19.2400, 72.9800)),
            capacity: 10,
            shift: TimeWindow::new(NOW - 3600, NOW + 8 * 3600),
        }]
    }

    fn step(kind: &str, id: Option<u64>, arrival: Option<i64>) -> SolverStep {
        SolverStep {
            kind: kind.to_string(),
            id,
            location: None,
            arrival,
            load: None,
        }
    }

    fn reconcile(response: SolverResponse) -> OptimizationResult {
        let tasks = tasks();
        let vehicles = vehicles();
        let maps = IdMaps::new(&tasks, &vehicles);
        let travel = TravelTimes::new(NoEstimate);
        Reconciler::new(&maps, &tasks, &vehicles, &travel, NOW)
            .reconcile(response, PlanSource::Solver)
    }

    #[test]
    fn test_classify_reason() {
        assert_eq!(classify_reason(Some("Time window violated")), UnassignedReason::TimeWindow);
        assert_eq!(classify_reason(Some("outside vehicle shift")), UnassignedReason::TimeWindow);
        assert_eq!(classify_reason(Some("capacity")), UnassignedReason::Capacity);
        assert_eq!(classify_reason(Some("Max LOAD exceeded")), UnassignedReason::Capacity);
        assert_eq!(classify_reason(Some("Unreachable location")), UnassignedReason::Location);
        assert_eq!(classify_reason(Some("skills mismatch")), UnassignedReason::InfeasibleOther);
        assert_eq!(classify_reason(None), UnassignedReason::InfeasibleOther);
    }

    #[test]
    fn test_ids_mapped_back() {
        let result = reconcile(SolverResponse {
            routes: vec![SolverRoute {
                vehicle: 1,
                distance: Some(4200.0),
                duration: Some(1500.0),
                cost: Some(90.0),
                steps: vec![
                    step("start", None, Some(NOW)),
                    step("job", Some(1001), Some(NOW + 600)),
                    step("job", Some(1000), Some(NOW + 1500)),
                    step("end", None, Some(NOW + 2400)),
                ],
            }],
            unassigned: vec![SolverUnassigned {
                id: 1002,
                reason: Some("time window".to_string()),
            }],
            ..Default::default()
        });

        let route = result.route_for("van-a").unwrap();
        assert_eq!(route.task_ids().collect::<Vec<_>>(), vec!["order-18", "order-17"]);
        assert_eq!(route.distance, 4200.0);
        assert_eq!(route.cost, 90.0);
        assert_eq!(route.steps.last().unwrap().load, 9);
        assert_eq!(result.unassigned_reason("order-19"), Some(UnassignedReason::TimeWindow));
        assert_eq!(result.summary.assigned, 2);
        assert_eq!(result.summary.routes, 1);
    }

    #[test]
    fn test_missing_metrics_repaired() {
        let mut job = step("job", Some(1000), None);
        job.location = Some([72.9825, 19.2429]);
        let mut start = step("start", None, None);
        start.location = Some([72.9800, 19.2400]);

        let result = reconcile(SolverResponse {
            routes: vec![SolverRoute {
                vehicle: 1,
                distance: Some(f64::NAN),
                duration: Some(0.0),
                cost: None,
                steps: vec![start, job],
            }],
            ..Default::default()
        });

        let route = &result.routes[0];
        let expected_distance = road_distance_meters(&[
            Coordinate::new(19.2400, 72.9800),
            Coordinate::new(19.2429, 72.9825),
        ]);
        assert!((route.distance - expected_distance).abs() < 1e-6);
        // short route: floored
        assert_eq!(route.duration, 900.0);
        let expected_cost = expected_distance / 1000.0 * 8.5 + 0.25 * 25.0;
        assert!((route.cost - expected_cost).abs() < 1e-6);
    }

    #[test]
    fn test_arrivals_estimated_and_monotonic() {
        let result = reconcile(SolverResponse {
            routes: vec![SolverRoute {
                vehicle: 1,
                distance: Some(1.0),
                duration: Some(1.0),
                cost: Some(1.0),
                steps: vec![
                    step("start", None, None),
                    step("job", Some(1000), None),
                    step("job", Some(1001), Some(NOW - 500)),
                ],
            }],
            ..Default::default()
        });

        let arrivals: Vec<i64> = result.routes[0].steps.iter().map(|step| step.arrival).collect();
        assert_eq!(arrivals[0], NOW);
        assert!(arrivals[1] > arrivals[0]);
        assert_eq!(arrivals[2], arrivals[1]);
    }

    #[test]
    fn test_extreme_solver_arrivals_saturate() {
        let result = reconcile(SolverResponse {
            routes: vec![SolverRoute {
                vehicle: 1,
                distance: Some(1000.0),
                duration: Some(600.0),
                cost: Some(10.0),
                steps: vec![
                    step("start", None, Some(i64::MAX)),
                    step("job", Some(1000), None),
                    step("job", Some(1001), Some(i64::MIN)),
                    step("end", None, None),
                ],
            }],
            ..Default::default()
        });

        let arrivals: Vec<i64> = result.routes[0].steps.iter().map(|step| step.arrival).collect();
        assert_eq!(arrivals, vec![i64::MAX; 4]);
    }

    #[test]
    fn test_duplicates_and_overflow_removed() {
        let result = reconcile(SolverResponse {
            routes: vec![SolverRoute {
                vehicle: 1,
                distance: None,
                duration: None,
                cost: None,
                steps: vec![
                    step("job", Some(1000), None),
                    step("job", Some(1000), None),
                    step("job", Some(1001), None),
                    step("job", Some(1002), None),
                    step("break", None, None),
                ],
            }],
            ..Default::default()
        });

        let route = &result.routes[0];
        // 4 + 5 fits, 3 more would overflow 10
        assert_eq!(route.task_ids().collect::<Vec<_>>(), vec!["order-17", "order-18"]);
        assert_eq!(result.unassigned_reason("order-19"), Some(UnassignedReason::Capacity));
    }

    #[test]
    fn test_forgotten_tasks_and_deadline_order() {
        let result = reconcile(SolverResponse::default());

        let order: Vec<&str> = result
            .summary
            .unassigned
            .iter()
            .map(|entry| entry.task_id.as_str())
            .collect();
        assert_eq!(order, vec!["order-19", "order-18", "order-17"]);
        assert!(
            result
                .summary
                .unassigned
                .iter()
                .all(|entry| entry.reason == UnassignedReason::InfeasibleOther)
        );
        assert!(result.routes.is_empty());
    }

    #[test]
    fn test_unknown_ids_dropped() {
        let result = reconcile(SolverResponse {
            routes: vec![
                SolverRoute {
                    vehicle: 99,
                    distance: None,
                    duration: None,
                    cost: None,
                    steps: vec![step("job", Some(1000), None)],
                },
                SolverRoute {
                    vehicle: 1,
                    distance: None,
                    duration: None,
                    cost: None,
                    steps: vec![step("job", Some(4242), None), step("job", Some(1002), None)],
                },
            ],
            ..Default::default()
        });

        assert_eq!(result.routes.len(), 1);
        assert_eq!(result.routes[0].task_ids().collect::<Vec<_>>(), vec!["order-19"]);
        assert_eq!(result.unassigned_reason("order-17"), Some(UnassignedReason::InfeasibleOther));
    }
}
