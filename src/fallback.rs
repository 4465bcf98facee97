//! Deadline-aware nearest-neighbor routing, used when the solver produces
//! nothing.
//!
//! Tasks due within two hours go into an URGENT pool, the rest into NORMAL.
//! Each vehicle, in input order, repeatedly takes the nearest task that
//! still fits its remaining capacity, drawing from URGENT before NORMAL.
//! The output has the same shape as a solver response so that both paths
//! share the reconciler.
//!
//! The scan is O(n² · m); a spatial index would replace it if fleets grow
//! well beyond tens of tasks.

use tracing::{debug, info, warn};

use crate::haversine::{haversine_km, haversine_meters};
use crate::model::{Coordinate, Task, Vehicle};
use crate::payload::IdMaps;
use crate::traits::TravelTimeEstimator;
use crate::travel_time::TravelTimes;
use crate::vroom::{SolverResponse, SolverRoute, SolverStep, SolverUnassigned};

pub const URGENT_HORIZON_SECONDS: i64 = 2 * 3600;
pub const SERVICE_SECONDS: f64 = 600.0;
pub const COST_PER_KM: f64 = 8.5;

pub const CAPACITY_REASON: &str = "capacity: no vehicle had room for this task";
pub const LOCATION_REASON: &str = "location: task has no usable coordinates";

#[derive(Debug, Clone, Copy)]
struct Candidate {
    solver_id: u64,
    location: Coordinate,
    demand: u32,
}

/// Position in `pool` of the nearest candidate whose demand fits.
fn nearest_fitting(pool: &[Candidate], from: Coordinate, remaining: u32) -> Option<usize> {
    pool.iter()
        .enumerate()
        .filter(|(_, candidate)| candidate.demand <= remaining)
        .map(|(position, candidate)| (position, haversine_km(from, candidate.location)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(position, _)| position)
}

/// Build routes greedily. `maps` must have been built from the same tasks
/// and vehicles; anything missing from it is ignored.
pub fn build_fallback_routes<E: TravelTimeEstimator>(
    tasks: &[Task],
    vehicles: &[Vehicle],
    maps: &IdMaps,
    travel: &TravelTimes<E>,
    now: i64,
) -> SolverResponse {
    let urgent_cutoff = now + URGENT_HORIZON_SECONDS;
    let mut urgent = Vec::new();
    let mut normal = Vec::new();
    let mut unassigned = Vec::new();

    for task in tasks {
        let Some(solver_id) = maps.task_solver_id(&task.id) else {
            warn!(task = %task.id, "task missing from id maps, skipped");
            continue;
        };
        let Some(location) = task.location else {
            unassigned.push(SolverUnassigned {
                id: solver_id,
                reason: Some(LOCATION_REASON.to_string()),
            });
            continue;
        };

        let candidate = Candidate {
            solver_id,
            location,
            demand: task.demand,
        };
        if task.deadline.end <= urgent_cutoff {
            urgent.push(candidate);
        } else {
            normal.push(candidate);
        }
    }

    debug!(urgent = urgent.len(), normal = normal.len(), "fallback pools");

    let mut routes = Vec::new();
    for vehicle in vehicles {
        if urgent.is_empty() && normal.is_empty() {
            break;
        }
        let Some(start) = vehicle.location else {
            warn!(vehicle = %vehicle.id, "vehicle has no location, skipped by fallback");
            continue;
        };
        let Some(vehicle_solver_id) = maps.vehicle_solver_id(&vehicle.id) else {
            warn!(vehicle = %vehicle.id, "vehicle missing from id maps, skipped");
            continue;
        };

        let mut remaining = vehicle.capacity;
        let mut current = start;
        let mut sequence = Vec::new();

        loop {
            let next = match nearest_fitting(&urgent, current, remaining) {
                Some(position) => urgent.remove(position),
                None => match nearest_fitting(&normal, current, remaining) {
                    Some(position) => normal.remove(position),
                    None => break,
                },
            };
            remaining -= next.demand;
            current = next.location;
            sequence.push(next);
        }

        if sequence.is_empty() {
            continue;
        }

        routes.push(sequence_route(vehicle, vehicle_solver_id, start, &sequence, travel, now));
    }

    for leftover in urgent.iter().chain(normal.iter()) {
        unassigned.push(SolverUnassigned {
            id: leftover.solver_id,
            reason: Some(CAPACITY_REASON.to_string()),
        });
    }

    info!(
        routes = routes.len(),
        unassigned = unassigned.len(),
        "fallback plan built"
    );

    SolverResponse {
        code: 0,
        error: None,
        routes,
        unassigned,
    }
}

fn sequence_route<E: TravelTimeEstimator>(
    vehicle: &Vehicle,
    vehicle_solver_id: u64,
    start: Coordinate,
    sequence: &[Candidate],
    travel: &TravelTimes<E>,
    now: i64,
) -> SolverRoute {
    let path: Vec<Coordinate> = std::iter::once(start)
        .chain(sequence.iter().map(|candidate| candidate.location))
        .collect();
    let legs = travel.path_seconds(&path);

    let distance: f64 = path
        .windows(2)
        .map(|leg| haversine_meters(leg[0], leg[1]))
        .sum();
    let travel_seconds: f64 = legs.iter().sum();

    let departure = now.max(vehicle.shift.start);
    let mut clock = departure as f64;
    let mut load: i64 = 0;
    let mut steps = Vec::with_capacity(sequence.len() + 1);
    steps.push(SolverStep {
        kind: "start".to_string(),
        id: None,
        location: Some(start.to_lon_lat()),
        arrival: Some(departure),
        load: Some(vec![0]),
    });

    for (candidate, leg_seconds) in sequence.iter().zip(&legs) {
        clock += leg_seconds;
        load += i64::from(candidate.demand);
        steps.push(SolverStep {
            kind: "job".to_string(),
            id: Some(candidate.solver_id),
            location: Some(candidate.location.to_lon_lat()),
            arrival: Some(clock.round() as i64),
            load: Some(vec![load]),
        });
        clock += SERVICE_SECONDS;
    }

    SolverRoute {
        vehicle: vehicle_solver_id,
        distance: Some(distance),
        duration: Some(travel_seconds + SERVICE_SECONDS * sequence.len() as f64),
        cost: Some(distance / 1000.0 * COST_PER_KM),
        steps,
    }
}
