//! Time window extraction and repair.
//!
//! A window that cannot be read, or that makes no sense, is never an error.
//! It is replaced or widened by a fixed set of rules and the rules that
//! fired are reported back in `RepairedWindow::repairs`.

use jiff::Timestamp;
use jiff::civil::{Date, DateTime};
use jiff::tz::TimeZone;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::model::{TimeWindow, WindowRecord};

const HOUR: i64 = 3600;
const MINUTE: i64 = 60;
const DAY: i64 = 24 * HOUR;

/// Starts further than this from "now" are treated as corrupt.
const HORIZON_SECONDS: i64 = 365 * DAY;

/// Epoch numbers at or above this magnitude are milliseconds.
const MILLISECOND_THRESHOLD: f64 = 1e11;

const DEFAULT_START_HOUR: i8 = 8;
const DEFAULT_END_HOUR: i8 = 18;

/// A single timestamp in any shape a store may produce.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum TimestampLike {
    /// Store-native `{ seconds, nanoseconds }` (or `_seconds`).
    Seconds { seconds: i64 },
    /// Epoch seconds, or epoch milliseconds when large enough.
    Epoch(f64),
    /// ISO-8601: an offset timestamp, a local civil datetime or a bare date.
    Iso(String),
    Instant(Timestamp),
    Unrecognized(Value),
    #[default]
    Missing,
}

impl TimestampLike {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => TimestampLike::Missing,
            Value::Number(number) => number
                .as_f64()
                .map(TimestampLike::Epoch)
                .unwrap_or_else(|| TimestampLike::Unrecognized(value.clone())),
            Value::String(text) => TimestampLike::Iso(text.clone()),
            Value::Object(map) => map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(|seconds| {
                    seconds
                        .as_i64()
                        .or_else(|| seconds.as_f64().filter(|s| s.is_finite()).map(|s| s as i64))
                })
                .map(|seconds| TimestampLike::Seconds { seconds })
                .unwrap_or_else(|| TimestampLike::Unrecognized(value.clone())),
            other => TimestampLike::Unrecognized(other.clone()),
        }
    }

    /// Epoch seconds, or `None` when nothing could be read.
    ///
    /// A non-finite epoch number is passed through as-is so the caller can
    /// tell "unreadable" from "read but nonsensical".
    pub fn epoch_seconds(&self, tz: &TimeZone) -> Option<f64> {
        match self {
            TimestampLike::Seconds { seconds } => Some(*seconds as f64),
            TimestampLike::Epoch(value) if value.abs() >= MILLISECOND_THRESHOLD => {
                Some(value / 1000.0)
            }
            TimestampLike::Epoch(value) => Some(*value),
            TimestampLike::Iso(text) => parse_iso(text.trim(), tz).map(|seconds| seconds as f64),
            TimestampLike::Instant(timestamp) => Some(timestamp.as_second() as f64),
            TimestampLike::Unrecognized(_) | TimestampLike::Missing => None,
        }
    }
}

fn parse_iso(text: &str, tz: &TimeZone) -> Option<i64> {
    if let Ok(timestamp) = text.parse::<Timestamp>() {
        return Some(timestamp.as_second());
    }
    if let Ok(datetime) = text.parse::<DateTime>() {
        return datetime
            .to_zoned(tz.clone())
            .ok()
            .map(|zoned| zoned.timestamp().as_second());
    }
    if let Ok(date) = text.parse::<Date>() {
        return date
            .to_zoned(tz.clone())
            .ok()
            .map(|zoned| zoned.timestamp().as_second());
    }
    None
}

impl From<i64> for TimestampLike {
    fn from(seconds: i64) -> Self {
        TimestampLike::Epoch(seconds as f64)
    }
}

impl From<f64> for TimestampLike {
    fn from(value: f64) -> Self {
        TimestampLike::Epoch(value)
    }
}

impl From<&str> for TimestampLike {
    fn from(text: &str) -> Self {
        TimestampLike::Iso(text.to_string())
    }
}

impl From<Timestamp> for TimestampLike {
    fn from(timestamp: Timestamp) -> Self {
        TimestampLike::Instant(timestamp)
    }
}

impl<'de> Deserialize<'de> for TimestampLike {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(TimestampLike::from_value(&value))
    }
}

/// Which repair constants apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    /// A task deadline window.
    Task,
    /// A vehicle working shift.
    Shift,
}

impl WindowKind {
    fn inverted_extension(self) -> i64 {
        match self {
            WindowKind::Task => HOUR,
            WindowKind::Shift => 8 * HOUR,
        }
    }

    /// Minimum acceptable window length.
    pub fn floor(self) -> i64 {
        match self {
            WindowKind::Task => 30 * MINUTE,
            WindowKind::Shift => 4 * HOUR,
        }
    }

    fn widened_length(self) -> i64 {
        match self {
            WindowKind::Task => 30 * MINUTE,
            WindowKind::Shift => 8 * HOUR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowRepair {
    /// Unreadable or non-finite bound; replaced by today's working day.
    Defaulted,
    /// Start more than a year away from now; replaced by today's working day.
    OutOfHorizon,
    /// End at or before start.
    Inverted,
    /// Shorter than the floor for its kind.
    Widened,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepairedWindow {
    pub window: TimeWindow,
    pub repairs: Vec<WindowRepair>,
}

impl RepairedWindow {
    pub fn was_repaired(&self) -> bool {
        !self.repairs.is_empty()
    }
}

/// `[max(now, 08:00), max(start + 1h, 18:00)]` in local time.
pub fn default_window(now: Timestamp, tz: &TimeZone) -> TimeWindow {
    let now_seconds = now.as_second();
    let date = now.to_zoned(tz.clone()).date();
    let local = |hour: i8, fallback: i64| {
        date.at(hour, 0, 0, 0)
            .to_zoned(tz.clone())
            .map(|zoned| zoned.timestamp().as_second())
            .unwrap_or(fallback)
    };

    let start = now_seconds.max(local(DEFAULT_START_HOUR, now_seconds));
    let end = (start + HOUR).max(local(DEFAULT_END_HOUR, start + HOUR));
    TimeWindow::new(start, end)
}

/// Read a window and repair it until `end > start` and the floor holds.
pub fn normalize_window(
    entity: &str,
    record: &WindowRecord,
    kind: WindowKind,
    now: Timestamp,
    tz: &TimeZone,
) -> RepairedWindow {
    let mut repairs = Vec::new();
    let now_seconds = now.as_second();

    // Bounds stay in f64 until the horizon check so a corrupt value can't
    // saturate or overflow on the way in.
    let extracted = match (record.start.epoch_seconds(tz), record.end.epoch_seconds(tz)) {
        (Some(start), Some(end)) if start.is_finite() && end.is_finite() => Some((start, end)),
        _ => None,
    };

    let mut window = match extracted {
        Some((start, _)) if (start - now_seconds as f64).abs() > HORIZON_SECONDS as f64 => {
            repairs.push(WindowRepair::OutOfHorizon);
            default_window(now, tz)
        }
        Some((start, end)) => TimeWindow::new(start.round() as i64, end.round() as i64),
        None => {
            repairs.push(WindowRepair::Defaulted);
            default_window(now, tz)
        }
    };

    if window.end <= window.start {
        repairs.push(WindowRepair::Inverted);
        window.end = window.start.saturating_add(kind.inverted_extension());
    }

    if window.duration() < kind.floor() {
        repairs.push(WindowRepair::Widened);
        window.end = window.start.saturating_add(kind.widened_length());
    }

    if !repairs.is_empty() {
        debug!(
            entity,
            ?kind,
            ?repairs,
            start = window.start,
            end = window.end,
            "repaired time window"
        );
    }

    RepairedWindow { window, repairs }
}
