//! Test fixtures for dispatch-planner.
//!
//! Provides:
//! - Real Thane / Mumbai locations
//! - Builders for task and vehicle records with sensible defaults

#![allow(dead_code)]

pub mod http;
pub mod thane_locations;

use dispatch_planner::location::LocationLike;
use dispatch_planner::model::{TaskRecord, VehicleRecord, WindowRecord};
use jiff::Timestamp;
use serde_json::json;

pub use thane_locations::*;

/// 2026-10-18T06:00:00Z
pub const NOW: i64 = 1_792_303_200;

pub fn now() -> Timestamp {
    Timestamp::from_second(NOW).unwrap()
}

pub fn hours(h: i64) -> i64 {
    h * 3600
}

pub fn minutes(m: i64) -> i64 {
    m * 60
}

/// Builder for task records. Defaults: pending, demand 1, due in 6 hours.
#[derive(Clone, Debug)]
pub struct TestTask {
    record: TaskRecord,
}

impl TestTask {
    pub fn new(id: &str) -> Self {
        let mut record = TaskRecord::new(id);
        record.demand_volume = json!(1);
        record.deadline_window = WindowRecord::new(NOW, NOW + hours(6));
        record.status = Some("pending".to_string());
        Self { record }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.record.location = LocationLike::Named {
            latitude: location.lat,
            longitude: location.lng,
        };
        self
    }

    pub fn location(mut self, location: LocationLike) -> Self {
        self.record.location = location;
        self
    }

    pub fn demand(mut self, demand: u32) -> Self {
        self.record.demand_volume = json!(demand);
        self
    }

    pub fn due_in(mut self, seconds: i64) -> Self {
        self.record.deadline_window = WindowRecord::new(NOW, NOW + seconds);
        self
    }

    pub fn window(mut self, window: WindowRecord) -> Self {
        self.record.deadline_window = window;
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.record.status = Some(status.to_string());
        self
    }

    pub fn build(self) -> TaskRecord {
        self.record
    }
}

/// Builder for vehicle records. Defaults: capacity 10, shift 08:00–18:00 UTC
/// on the test day, no location.
#[derive(Clone, Debug)]
pub struct TestVehicle {
    record: VehicleRecord,
}

impl TestVehicle {
    pub fn new(id: &str) -> Self {
        let mut record = VehicleRecord::new(id);
        record.capacity = json!(10);
        record.shift_window = WindowRecord::new(NOW + hours(2), NOW + hours(12));
        Self { record }
    }

    /// Depot position; live position left empty.
    pub fn at(mut self, location: Location) -> Self {
        self.record.depot_location = LocationLike::Named {
            latitude: location.lat,
            longitude: location.lng,
        };
        self
    }

    /// Live position reported `age` seconds ago.
    pub fn live_at(mut self, location: Location, age: i64) -> Self {
        self.record.location = LocationLike::Short {
            lat: location.lat,
            lng: location.lng,
        };
        self.record.location_updated_at = (NOW - age).into();
        self
    }

    pub fn capacity(mut self, capacity: u32) -> Self {
        self.record.capacity = json!(capacity);
        self
    }

    pub fn shift(mut self, window: WindowRecord) -> Self {
        self.record.shift_window = window;
        self
    }

    pub fn build(self) -> VehicleRecord {
        self.record
    }
}
