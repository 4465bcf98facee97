//! Per-leg travel time: an optional external estimate with the tiered
//! heuristic underneath.

use std::time::Duration;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EstimateError;
use crate::haversine::{haversine_km, tiered_travel_minutes};
use crate::model::Coordinate;
use crate::rate_limit::RateLimiter;
use crate::traits::TravelTimeEstimator;

const MAX_LEG_MINUTES: f64 = 24.0 * 60.0;
const MIN_SPEED_KMH: f64 = 2.0;
const MAX_SPEED_KMH: f64 = 150.0;
/// Below this distance the implied-speed check is meaningless.
const SPEED_CHECK_MIN_KM: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct TravelTimeConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Minimum gap between two requests to the endpoint.
    pub min_interval_ms: u64,
}

impl Default for TravelTimeConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/travel-time".to_string(),
            timeout_secs: 5,
            min_interval_ms: 0,
        }
    }
}

impl TravelTimeConfig {
    /// `DISPATCH_TRAVEL_TIME_URL`, `DISPATCH_TRAVEL_TIME_TIMEOUT_SECS`,
    /// `DISPATCH_TRAVEL_TIME_INTERVAL_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("DISPATCH_TRAVEL_TIME_URL").unwrap_or(defaults.endpoint),
            timeout_secs: env_parse("DISPATCH_TRAVEL_TIME_TIMEOUT_SECS")
                .unwrap_or(defaults.timeout_secs),
            min_interval_ms: env_parse("DISPATCH_TRAVEL_TIME_INTERVAL_MS")
                .unwrap_or(defaults.min_interval_ms),
        }
    }
}

pub(crate) fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.trim().parse().ok())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EstimateRequest {
    origin: Coordinate,
    destination: Coordinate,
    distance_km: f64,
}

#[derive(Debug, Deserialize)]
struct EstimateResponse {
    minutes: f64,
}

/// Asks an HTTP model endpoint for a leg estimate.
#[derive(Debug)]
pub struct HttpTravelTimeEstimator {
    config: TravelTimeConfig,
    client: reqwest::blocking::Client,
    limiter: RateLimiter,
}

impl HttpTravelTimeEstimator {
    pub fn new(config: TravelTimeConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let limiter = RateLimiter::new(Duration::from_millis(config.min_interval_ms));

        Ok(Self {
            config,
            client,
            limiter,
        })
    }
}

impl TravelTimeEstimator for HttpTravelTimeEstimator {
    fn estimate_minutes(
        &self,
        from: Coordinate,
        to: Coordinate,
        distance_km: f64,
    ) -> Result<f64, EstimateError> {
        self.limiter.wait_until_permitted();

        let body = EstimateRequest {
            origin: from,
            destination: to,
            distance_km,
        };
        let response: EstimateResponse = self
            .client
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json())?;

        validate_estimate(response.minutes, distance_km)
    }
}

/// Reject estimates no vehicle could plausibly achieve.
pub fn validate_estimate(minutes: f64, distance_km: f64) -> Result<f64, EstimateError> {
    if !minutes.is_finite() || minutes <= 0.0 || minutes > MAX_LEG_MINUTES {
        return Err(EstimateError::OutOfRange(minutes));
    }
    if distance_km >= SPEED_CHECK_MIN_KM {
        let speed_kmh = distance_km / (minutes / 60.0);
        if !(MIN_SPEED_KMH..=MAX_SPEED_KMH).contains(&speed_kmh) {
            return Err(EstimateError::OutOfRange(minutes));
        }
    }
    Ok(minutes)
}

/// Leg travel times, external estimate first and tiers on any failure.
#[derive(Debug, Clone, Default)]
pub struct TravelTimes<E> {
    estimator: E,
}

impl<E: TravelTimeEstimator> TravelTimes<E> {
    pub fn new(estimator: E) -> Self {
        Self { estimator }
    }

    /// Seconds to drive one leg. Never fails.
    pub fn leg_seconds(&self, from: Coordinate, to: Coordinate) -> f64 {
        let km = haversine_km(from, to);
        let minutes = match self.estimator.estimate_minutes(from, to, km) {
            Ok(minutes) => minutes,
            Err(EstimateError::Unavailable) => tiered_travel_minutes(km),
            Err(err) => {
                debug!(error = %err, km, "travel-time estimate failed, using tiers");
                tiered_travel_minutes(km)
            }
        };
        minutes * 60.0
    }

    /// Seconds for each consecutive leg of `path`, estimated in parallel.
    pub fn path_seconds(&self, path: &[Coordinate]) -> Vec<f64> {
        path.par_windows(2)
            .map(|leg| self.leg_seconds(leg[0], leg[1]))
            .collect()
    }
}
