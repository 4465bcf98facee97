//! Great-circle distance and the tiered travel-time heuristic.
//!
//! Both ignore the road network. The tiers stand in for urban congestion at
//! short range and highway speeds at long range, and are what every leg
//! falls back to when no better estimate is available.

use crate::model::Coordinate;

/// Mean earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Straight-line to road distance inflation.
pub const ROAD_FACTOR: f64 = 1.2;

/// No leg is estimated faster than this.
pub const MIN_LEG_MINUTES: f64 = 5.0;

/// (upper bound in km, minutes per km), checked in order.
const TIERS: [(f64, f64); 3] = [(2.0, 8.0), (10.0, 4.0), (50.0, 2.0)];
const HIGHWAY_MINUTES_PER_KM: f64 = 1.5;

/// Haversine distance between two points in kilometers.
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let lat1_rad = from.latitude.to_radians();
    let lat2_rad = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lng = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

pub fn haversine_meters(from: Coordinate, to: Coordinate) -> f64 {
    haversine_km(from, to) * 1000.0
}

/// Travel time for a leg of `km` kilometers, in minutes.
pub fn tiered_travel_minutes(km: f64) -> f64 {
    let rate = TIERS
        .iter()
        .find(|(limit, _)| km <= *limit)
        .map(|(_, rate)| *rate)
        .unwrap_or(HIGHWAY_MINUTES_PER_KM);

    (km * rate).max(MIN_LEG_MINUTES)
}

/// Sum of straight-line legs along a path, in meters, inflated to
/// approximate road distance.
pub fn road_distance_meters(path: &[Coordinate]) -> f64 {
    let straight: f64 = path
        .windows(2)
        .map(|leg| haversine_meters(leg[0], leg[1]))
        .sum();
    straight * ROAD_FACTOR
}
