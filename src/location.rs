//! Coordinate normalization.
//!
//! Stores disagree on how a position is written down. `LocationLike` is the
//! closed set of shapes we accept, and `normalize_location` is the single
//! place that turns any of them into a validated `Coordinate`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::NormalizeError;
use crate::model::Coordinate;

/// Something that exposes its position through zero-argument accessors.
pub trait GeoAccessor: Send + Sync {
    fn latitude(&self) -> f64;
    fn longitude(&self) -> f64;
}

/// Every location shape the planner understands, in match priority order.
#[derive(Clone, Default)]
pub enum LocationLike {
    /// `{ latitude, longitude }`
    Named { latitude: f64, longitude: f64 },
    /// Geodetic point as serialized by document stores: `{ _lat, _long }`.
    GeoPoint { lat: f64, long: f64 },
    /// Live object with `latitude()` / `longitude()` accessors.
    Accessor(Arc<dyn GeoAccessor>),
    /// `[longitude, latitude]`
    Pair([f64; 2]),
    /// `{ lat, lng }`
    Short { lat: f64, lng: f64 },
    /// A value was present but matched none of the shapes above.
    Unrecognized(Value),
    #[default]
    Missing,
}

impl LocationLike {
    pub fn from_accessor(accessor: impl GeoAccessor + 'static) -> Self {
        LocationLike::Accessor(Arc::new(accessor))
    }

    /// Classify an arbitrary JSON value.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => LocationLike::Missing,
            Value::Object(map) => {
                let field = |name: &str| map.get(name).and_then(Value::as_f64);

                if let (Some(latitude), Some(longitude)) = (field("latitude"), field("longitude")) {
                    LocationLike::Named {
                        latitude,
                        longitude,
                    }
                } else if let (Some(lat), Some(long)) = (field("_lat"), field("_long")) {
                    LocationLike::GeoPoint { lat, long }
                } else if let (Some(lat), Some(lng)) = (field("lat"), field("lng")) {
                    LocationLike::Short { lat, lng }
                } else {
                    LocationLike::Unrecognized(value.clone())
                }
            }
            Value::Array(items) => match items.as_slice() {
                [lon, lat] => match (lon.as_f64(), lat.as_f64()) {
                    (Some(lon), Some(lat)) => LocationLike::Pair([lon, lat]),
                    _ => LocationLike::Unrecognized(value.clone()),
                },
                _ => LocationLike::Unrecognized(value.clone()),
            },
            other => LocationLike::Unrecognized(other.clone()),
        }
    }

    fn lat_lon(&self) -> Option<(f64, f64)> {
        match self {
            LocationLike::Named {
                latitude,
                longitude,
            } => Some((*latitude, *longitude)),
            LocationLike::GeoPoint { lat, long } => Some((*lat, *long)),
            LocationLike::Accessor(accessor) => Some((accessor.latitude(), accessor.longitude())),
            LocationLike::Pair([lon, lat]) => Some((*lat, *lon)),
            LocationLike::Short { lat, lng } => Some((*lat, *lng)),
            LocationLike::Unrecognized(_) | LocationLike::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, LocationLike::Missing)
    }
}

impl fmt::Debug for LocationLike {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationLike::Named {
                latitude,
                longitude,
            } => f
                .debug_struct("Named")
                .field("latitude", latitude)
                .field("longitude", longitude)
                .finish(),
            LocationLike::GeoPoint { lat, long } => f
                .debug_struct("GeoPoint")
                .field("lat", lat)
                .field("long", long)
                .finish(),
            LocationLike::Accessor(accessor) => f
                .debug_struct("Accessor")
                .field("latitude", &accessor.latitude())
                .field("longitude", &accessor.longitude())
                .finish(),
            LocationLike::Pair(pair) => f.debug_tuple("Pair").field(pair).finish(),
            LocationLike::Short { lat, lng } => f
                .debug_struct("Short")
                .field("lat", lat)
                .field("lng", lng)
                .finish(),
            LocationLike::Unrecognized(value) => {
                f.debug_tuple("Unrecognized").field(value).finish()
            }
            LocationLike::Missing => f.write_str("Missing"),
        }
    }
}

impl From<Coordinate> for LocationLike {
    fn from(coordinate: Coordinate) -> Self {
        LocationLike::Named {
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
        }
    }
}

impl<'de> Deserialize<'de> for LocationLike {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(LocationLike::from_value(&value))
    }
}

/// Extract and validate a coordinate. `entity` names the owning task or
/// vehicle in the error.
pub fn normalize_location(
    entity: &str,
    location: &LocationLike,
) -> Result<Coordinate, NormalizeError> {
    let (latitude, longitude) = match location.lat_lon() {
        Some(pair) => pair,
        None if location.is_missing() => {
            return Err(NormalizeError::invalid_location(entity, "no location given"));
        }
        None => {
            return Err(NormalizeError::invalid_location(
                entity,
                format!("unrecognized location shape {:?}", location),
            ));
        }
    };

    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(NormalizeError::invalid_location(
            entity,
            format!("non-finite coordinates ({}, {})", latitude, longitude),
        ));
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(NormalizeError::invalid_location(
            entity,
            format!("latitude {} out of range", latitude),
        ));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(NormalizeError::invalid_location(
            entity,
            format!("longitude {} out of range", longitude),
        ));
    }

    Ok(Coordinate::new(latitude, longitude))
}
