//! Raw records to normalized tasks and vehicles.
//!
//! Each record is handled on its own: a bad location leaves that one entity
//! without coordinates, a bad window is repaired, a bad quantity takes the
//! default. Nothing here fails the batch.

use std::collections::HashSet;

use jiff::Timestamp;
use jiff::tz::TimeZone;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::NormalizeError;
use crate::location::normalize_location;
use crate::model::{Coordinate, DEFAULT_SERVICE_SECONDS, Task, TaskRecord, Vehicle, VehicleRecord};
use crate::time_window::{WindowKind, normalize_window};

const OPTIMIZABLE_STATUSES: [&str; 2] = ["pending", "unassigned"];

#[derive(Debug, Clone)]
pub struct NormalizeContext {
    pub now: Timestamp,
    pub time_zone: TimeZone,
    /// A live vehicle position older than this is stale.
    pub max_location_age_secs: i64,
    pub default_demand: u32,
    pub default_capacity: u32,
}

/// Round a JSON number or numeric string to a positive integer.
pub fn positive_quantity(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    let rounded = number.round();
    if rounded < 1.0 || rounded > f64::from(u32::MAX) {
        return None;
    }
    Some(rounded as u32)
}

pub fn is_optimizable(status: Option<&str>) -> bool {
    match status {
        None => true,
        Some(status) => OPTIMIZABLE_STATUSES
            .iter()
            .any(|candidate| status.trim().eq_ignore_ascii_case(candidate)),
    }
}

pub fn normalize_task(record: &TaskRecord, ctx: &NormalizeContext) -> Task {
    let location = match normalize_location(&record.id, &record.location) {
        Ok(location) => Some(location),
        Err(err) => {
            warn!(error = %err, "task excluded from routing");
            None
        }
    };

    let demand = positive_quantity(&record.demand_volume).unwrap_or_else(|| {
        warn!(task = %record.id, value = %record.demand_volume, "invalid demand, using default");
        ctx.default_demand
    });

    let service_seconds = record
        .service_duration
        .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
        .map(|seconds| seconds.round() as i64)
        .unwrap_or(DEFAULT_SERVICE_SECONDS);

    let deadline = normalize_window(
        &record.id,
        &record.deadline_window,
        WindowKind::Task,
        ctx.now,
        &ctx.time_zone,
    )
    .window;

    Task {
        id: record.id.clone(),
        location,
        demand,
        deadline,
        service_seconds,
    }
}

/// Live position if fresh, else depot, else a stale live position.
pub fn resolve_vehicle_location(
    record: &VehicleRecord,
    ctx: &NormalizeContext,
) -> Result<Coordinate, NormalizeError> {
    let live = normalize_location(&record.id, &record.location);
    let depot = normalize_location(&record.id, &record.depot_location);

    let fresh = record
        .location_updated_at
        .epoch_seconds(&ctx.time_zone)
        .filter(|seconds| seconds.is_finite())
        .map(|seconds| ctx.now.as_second() as f64 - seconds <= ctx.max_location_age_secs as f64)
        .unwrap_or(false);

    match (live, depot) {
        (Ok(live), _) if fresh => Ok(live),
        (_, Ok(depot)) => Ok(depot),
        (Ok(live), Err(_)) => {
            debug!(vehicle = %record.id, "using stale live location, no depot");
            Ok(live)
        }
        (Err(err), Err(_)) => Err(err),
    }
}

pub fn normalize_vehicle(record: &VehicleRecord, ctx: &NormalizeContext) -> Vehicle {
    let location = match resolve_vehicle_location(record, ctx) {
        Ok(location) => Some(location),
        Err(err) => {
            warn!(error = %err, "vehicle excluded from routing");
            None
        }
    };

    let capacity = positive_quantity(&record.capacity).unwrap_or_else(|| {
        warn!(vehicle = %record.id, value = %record.capacity, "invalid capacity, using default");
        ctx.default_capacity
    });

    let shift = normalize_window(
        &record.id,
        &record.shift_window,
        WindowKind::Shift,
        ctx.now,
        &ctx.time_zone,
    )
    .window;

    Vehicle {
        id: record.id.clone(),
        location,
        capacity,
        shift,
    }
}

/// Normalize every optimizable task, keeping the first of any duplicate ids.
pub fn normalize_tasks(records: &[TaskRecord], ctx: &NormalizeContext) -> Vec<Task> {
    let candidates: Vec<&TaskRecord> = records
        .iter()
        .filter(|record| {
            let keep = is_optimizable(record.status.as_deref());
            if !keep {
                debug!(task = %record.id, status = ?record.status, "task not pending, skipped");
            }
            keep
        })
        .collect();

    let tasks: Vec<Task> = candidates
        .par_iter()
        .map(|record| normalize_task(record, ctx))
        .collect();

    dedupe_by_id(tasks, |task| &task.id, "task")
}

pub fn normalize_vehicles(records: &[VehicleRecord], ctx: &NormalizeContext) -> Vec<Vehicle> {
    let vehicles: Vec<Vehicle> = records
        .par_iter()
        .map(|record| normalize_vehicle(record, ctx))
        .collect();

    dedupe_by_id(vehicles, |vehicle| &vehicle.id, "vehicle")
}

fn dedupe_by_id<T>(items: Vec<T>, key: impl Fn(&T) -> &String, kind: &str) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let first = seen.insert(key(item).clone());
            if !first {
                warn!(kind, id = %key(item), "duplicate id dropped");
            }
            first
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::location::LocationLike;
    use crate::model::WindowRecord;

    fn ctx() -> NormalizeContext {
        NormalizeContext {
            now: "2026-10-18T06:00:00Z".parse().unwrap(),
            time_zone: TimeZone::UTC,
            max_location_age_secs: 1800,
            default_demand: 1,
            default_capacity: 100,
        }
    }

    fn now_secs() -> i64 {
        ctx().now.as_second()
    }

    #[test]
    fn test_positive_quantity() {
        assert_eq!(positive_quantity(&json!(5)), Some(5));
        assert_eq!(positive_quantity(&json!(4.6)), Some(5));
        assert_eq!(positive_quantity(&json!(" 12 ")), Some(12));
        assert_eq!(positive_quantity(&json!(0)), None);
        assert_eq!(positive_quantity(&json!(-3)), None);
        assert_eq!(positive_quantity(&json!("lots")), None);
        assert_eq!(positive_quantity(&Value::Null), None);
    }

    #[test]
    fn test_status_filter() {
        assert!(is_optimizable(None));
        assert!(is_optimizable(Some("Pending")));
        assert!(is_optimizable(Some("unassigned")));
        assert!(!is_optimizable(Some("assigned")));
        assert!(!is_optimizable(Some("delivered")));
    }

    #[test]
    fn test_task_from_json_record() {
        let record: TaskRecord = serde_json::from_value(json!({
            "id": "order-1",
            "location": { "_lat": 19.2429, "_long": 72.9825 },
            "demandVolume": "5",
            "deadlineWindow": {
                "start": { "seconds": now_secs() },
                "end": { "seconds": now_secs() + 3600 }
            },
            "status": "pending"
        }))
        .unwrap();

        let task = normalize_task(&record, &ctx());
        assert_eq!(task.location, Some(Coordinate::new(19.2429, 72.9825)));
        assert_eq!(task.demand, 5);
        assert_eq!(task.deadline.end - task.deadline.start, 3600);
        assert_eq!(task.service_seconds, 300);
    }

    #[test]
    fn test_bad_task_fields_degrade() {
        let mut record = TaskRecord::new("broken");
        record.location = LocationLike::from_value(&json!("somewhere"));
        record.demand_volume = json!(-2);
        record.service_duration = Some(f64::NAN);

        let task = normalize_task(&record, &ctx());
        assert_eq!(task.location, None);
        assert_eq!(task.demand, 1);
        assert_eq!(task.service_seconds, 300);
        assert!(task.deadline.end > task.deadline.start);
    }

    #[test]
    fn test_vehicle_location_resolution() {
        let live = json!({ "latitude": 19.25, "longitude": 72.99 });
        let depot = json!({ "lat": 19.20, "lng": 72.95 });

        let mut record = VehicleRecord::new("van");
        record.location = LocationLike::from_value(&live);
        record.depot_location = LocationLike::from_value(&depot);

        record.location_updated_at = (now_secs() - 600).into();
        assert_eq!(resolve_vehicle_location(&record, &ctx()), Ok(Coordinate::new(19.25, 72.99)));

        record.location_updated_at = (now_secs() - 7200).into();
        assert_eq!(resolve_vehicle_location(&record, &ctx()), Ok(Coordinate::new(19.20, 72.95)));

        record.depot_location = LocationLike::Missing;
        assert_eq!(resolve_vehicle_location(&record, &ctx()), Ok(Coordinate::new(19.25, 72.99)));

        record.location = LocationLike::Missing;
        assert!(resolve_vehicle_location(&record, &ctx()).is_err());
    }

    #[test]
    fn test_vehicle_defaults() {
        let mut record = VehicleRecord::new("van");
        record.location = LocationLike::Pair([72.98, 19.24]);
        record.shift_window = WindowRecord::new(now_secs(), now_secs() + 3600);

        let vehicle = normalize_vehicle(&record, &ctx());
        assert_eq!(vehicle.capacity, 100);
        assert_eq!(vehicle.shift.duration(), 8 * 3600);
    }

    #[test]
    fn test_batch_filters_and_dedupes() {
        let mut delivered = TaskRecord::new("a");
        delivered.status = Some("delivered".to_string());
        let records = vec![
            delivered,
            TaskRecord::new("b"),
            TaskRecord::new("c"),
            TaskRecord::new("b"),
        ];

        let tasks = normalize_tasks(&records, &ctx());
        let ids: Vec<&str> = tasks.iter().map(|task| task.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }
}
