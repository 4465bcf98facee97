//! Solver request construction and the id maps that undo it.
//!
//! The solver wants one positive-integer id namespace. Tasks are numbered
//! from 1000 and vehicles from 1, both in input order, so a job id can never
//! be mistaken for a vehicle id inside a step list.

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::Serialize;

use crate::error::PayloadError;
use crate::model::{Coordinate, Task, Vehicle};
use crate::traits::TravelTimeEstimator;
use crate::travel_time::TravelTimes;

pub const FIRST_TASK_ID: u64 = 1000;
pub const FIRST_VEHICLE_ID: u64 = 1;

/// Routing profile the solver assumes when a vehicle names none.
pub const DEFAULT_PROFILE: &str = "car";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolverJob {
    pub id: u64,
    /// `[lon, lat]`
    pub location: [f64; 2],
    pub service: i64,
    pub amount: Vec<u32>,
    pub time_windows: Vec<[i64; 2]>,
    /// Row/column in `SolverRequest::matrices`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolverVehicle {
    pub id: u64,
    /// `[lon, lat]`
    pub start: [f64; 2],
    pub capacity: Vec<u32>,
    pub time_window: [i64; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolverOptions {
    /// Ask for route geometry.
    pub g: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self { g: false }
    }
}

/// Travel durations in whole seconds, `durations[from][to]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolverMatrix {
    pub durations: Vec<Vec<u64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolverRequest {
    pub jobs: Vec<SolverJob>,
    pub vehicles: Vec<SolverVehicle>,
    pub options: SolverOptions,
    /// Per-profile matrices. When present the solver skips its own routing
    /// engine and reads travel times from here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrices: Option<BTreeMap<String, SolverMatrix>>,
}

impl SolverRequest {
    /// Attach a duration matrix built from `travel`. Vehicle starts take the
    /// first rows, jobs follow in request order.
    pub fn with_duration_matrix<E: TravelTimeEstimator>(mut self, travel: &TravelTimes<E>) -> Self {
        let points: Vec<Coordinate> = self
            .vehicles
            .iter()
            .map(|vehicle| vehicle.start)
            .chain(self.jobs.iter().map(|job| job.location))
            .map(Coordinate::from_lon_lat)
            .collect();

        let durations: Vec<Vec<u64>> = points
            .par_iter()
            .map(|from| {
                points
                    .iter()
                    .map(|to| {
                        if from == to {
                            0
                        } else {
                            travel.leg_seconds(*from, *to).round() as u64
                        }
                    })
                    .collect()
            })
            .collect();

        for (index, vehicle) in self.vehicles.iter_mut().enumerate() {
            vehicle.start_index = Some(index);
        }
        let offset = self.vehicles.len();
        for (index, job) in self.jobs.iter_mut().enumerate() {
            job.location_index = Some(offset + index);
        }

        let matrix = SolverMatrix { durations };
        self.matrices = Some(BTreeMap::from([(DEFAULT_PROFILE.to_string(), matrix)]));
        self
    }
}

/// Bidirectional mapping between original ids and solver ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdMaps {
    task_to_solver: HashMap<String, u64>,
    solver_to_task: HashMap<u64, String>,
    vehicle_to_solver: HashMap<String, u64>,
    solver_to_vehicle: HashMap<u64, String>,
}

impl IdMaps {
    pub fn new(tasks: &[Task], vehicles: &[Vehicle]) -> Self {
        let mut maps = IdMaps::default();
        for (offset, task) in tasks.iter().enumerate() {
            let solver_id = FIRST_TASK_ID + offset as u64;
            maps.task_to_solver.insert(task.id.clone(), solver_id);
            maps.solver_to_task.insert(solver_id, task.id.clone());
        }
        for (offset, vehicle) in vehicles.iter().enumerate() {
            let solver_id = FIRST_VEHICLE_ID + offset as u64;
            maps.vehicle_to_solver.insert(vehicle.id.clone(), solver_id);
            maps.solver_to_vehicle.insert(solver_id, vehicle.id.clone());
        }
        maps
    }

    pub fn task_solver_id(&self, task_id: &str) -> Option<u64> {
        self.task_to_solver.get(task_id).copied()
    }

    pub fn task_id(&self, solver_id: u64) -> Option<&str> {
        self.solver_to_task.get(&solver_id).map(String::as_str)
    }

    pub fn vehicle_solver_id(&self, vehicle_id: &str) -> Option<u64> {
        self.vehicle_to_solver.get(vehicle_id).copied()
    }

    pub fn vehicle_id(&self, solver_id: u64) -> Option<&str> {
        self.solver_to_vehicle.get(&solver_id).map(String::as_str)
    }
}

/// Build the solver request. Every task and vehicle must carry a location.
pub fn build_payload(
    tasks: &[Task],
    vehicles: &[Vehicle],
) -> Result<(SolverRequest, IdMaps), PayloadError> {
    let maps = IdMaps::new(tasks, vehicles);

    let jobs = tasks
        .iter()
        .enumerate()
        .map(|(offset, task)| {
            let location = task.location.ok_or_else(|| PayloadError::MissingLocation {
                kind: "task",
                id: task.id.clone(),
            })?;
            Ok(SolverJob {
                id: FIRST_TASK_ID + offset as u64,
                location: location.to_lon_lat(),
                service: task.service_seconds,
                amount: vec![task.demand],
                time_windows: vec![task.deadline.as_pair()],
                location_index: None,
            })
        })
        .collect::<Result<Vec<_>, PayloadError>>()?;

    let vehicles = vehicles
        .iter()
        .enumerate()
        .map(|(offset, vehicle)| {
            let location = vehicle.location.ok_or_else(|| PayloadError::MissingLocation {
                kind: "vehicle",
                id: vehicle.id.clone(),
            })?;
            Ok(SolverVehicle {
                id: FIRST_VEHICLE_ID + offset as u64,
                start: location.to_lon_lat(),
                capacity: vec![vehicle.capacity],
                time_window: vehicle.shift.as_pair(),
                start_index: None,
            })
        })
        .collect::<Result<Vec<_>, PayloadError>>()?;

    Ok((
        SolverRequest {
            jobs,
            vehicles,
            options: SolverOptions::default(),
            matrices: None,
        },
        maps,
    ))
}
