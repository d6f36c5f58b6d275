// EcoWatch Simulator - Wire payloads
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Structured readings handed to a [`crate::publisher::Publisher`].
//!
//! The JSON shape (camelCase, ISO-8601 timestamps with milliseconds) is what
//! the downstream ingestion bridge validates.

use crate::sensor::SensorType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device model reported in every payload.
pub const DEVICE_MODEL: &str = "EcoWatchSensor-v2";
/// Firmware version reported in every payload.
pub const DEVICE_FIRMWARE: &str = "2.0.0";

/// Physical quantity carried by a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Temperature,
    Humidity,
    AirQuality,
    WaterQuality,
    SoilMoisture,
}

impl Metric {
    /// All metrics, in emission order.
    pub const ALL: [Metric; 5] = [
        Metric::Temperature,
        Metric::Humidity,
        Metric::AirQuality,
        Metric::WaterQuality,
        Metric::SoilMoisture,
    ];

    /// Wire name, also used as reading id suffix.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::AirQuality => "airQuality",
            Metric::WaterQuality => "waterQuality",
            Metric::SoilMoisture => "soilMoisture",
        }
    }

    /// Unit of measurement.
    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Temperature => "°C",
            Metric::Humidity => "%",
            Metric::AirQuality => "CAQI",
            Metric::WaterQuality => "WQI",
            Metric::SoilMoisture => "%",
        }
    }

    /// Closed physical range `(min, max)`.
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            Metric::Temperature => (-10.0, 40.0),
            Metric::Humidity => (30.0, 95.0),
            Metric::AirQuality => (0.0, 100.0),
            Metric::WaterQuality => (60.0, 95.0),
            Metric::SoilMoisture => (5.0, 60.0),
        }
    }

    /// Indices are reported as integers, the rest with one decimal.
    pub fn is_integer(&self) -> bool {
        matches!(self, Metric::AirQuality | Metric::WaterQuality)
    }

    /// Round to the metric's reporting precision.
    pub fn round(&self, value: f64) -> f64 {
        if self.is_integer() {
            crate::generators::round0(value)
        } else {
            crate::generators::round1(value)
        }
    }

    /// Position in [`Metric::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Metric::Temperature => 0,
            Metric::Humidity => 1,
            Metric::AirQuality => 2,
            Metric::WaterQuality => 3,
            Metric::SoilMoisture => 4,
        }
    }

    /// Metric emitted by a sensor of this declared type in mono-metric mode.
    pub fn for_sensor_type(sensor_type: SensorType) -> Option<Metric> {
        match sensor_type {
            SensorType::Temperature => Some(Metric::Temperature),
            SensorType::Humidity => Some(Metric::Humidity),
            SensorType::AirQuality => Some(Metric::AirQuality),
            SensorType::WaterQuality => Some(Metric::WaterQuality),
            SensorType::SoilMoisture => Some(Metric::SoilMoisture),
            SensorType::Pressure | SensorType::NoiseLevel | SensorType::Unknown => None,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a reading was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingLocation {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Per-reading device metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingMetadata {
    /// Precision rating in percent.
    pub accuracy: u8,
    /// Configured tick interval in milliseconds.
    pub reading_interval: u64,
}

/// One measured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    /// `<sensorId>-<metric>`
    pub id: String,
    #[serde(rename = "type")]
    pub metric: Metric,
    pub value: f64,
    pub unit: String,
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    pub location: ReadingLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ReadingMetadata>,
}

/// Identity of the emitting device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub model: String,
    pub firmware: String,
}

impl DeviceInfo {
    /// Device info of the simulated device behind `sensor_id`.
    pub fn for_sensor(sensor_id: &str) -> Self {
        Self {
            id: format!("device-{}", sensor_id),
            model: DEVICE_MODEL.to_string(),
            firmware: DEVICE_FIRMWARE.to_string(),
        }
    }
}

/// Everything one sensor emits in one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorPayload {
    pub sensor_id: String,
    pub readings: Vec<SensorReading>,
    pub device_info: DeviceInfo,
}

impl SensorPayload {
    /// Reading for a metric, if it was emitted.
    pub fn reading(&self, metric: Metric) -> Option<&SensorReading> {
        self.readings.iter().find(|r| r.metric == metric)
    }

    /// Serialize to the wire JSON.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Result of generating one sensor's tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A payload was produced (its readings may still be empty).
    Generated(SensorPayload),
    /// The whole message was lost in transit.
    Dropped,
    /// Mono-metric mode and the declared type has no generator.
    Unsupported(SensorType),
}

impl TickOutcome {
    /// Borrow the payload, if any.
    pub fn payload(&self) -> Option<&SensorPayload> {
        match self {
            TickOutcome::Generated(payload) => Some(payload),
            _ => None,
        }
    }

    /// Take the payload, if any.
    pub fn into_payload(self) -> Option<SensorPayload> {
        match self {
            TickOutcome::Generated(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, TickOutcome::Dropped)
    }
}

/// `2024-06-01T12:00:00.000Z` timestamps.
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
