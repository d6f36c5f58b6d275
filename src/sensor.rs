// EcoWatch Simulator - Sensor directory types
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Sensor and organization descriptors.
//!
//! These are read-only snapshots of the external sensor directory. Field
//! names serialize in camelCase to match the directory's JSON shape.

use serde::{Deserialize, Serialize};

/// Declared sensor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorType {
    Temperature,
    Humidity,
    AirQuality,
    Pressure,
    NoiseLevel,
    WaterQuality,
    SoilMoisture,
    /// Any type this simulator does not know. Never generates readings.
    #[serde(other)]
    Unknown,
}

impl SensorType {
    /// Directory representation, e.g. `AIR_QUALITY`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Temperature => "TEMPERATURE",
            SensorType::Humidity => "HUMIDITY",
            SensorType::AirQuality => "AIR_QUALITY",
            SensorType::Pressure => "PRESSURE",
            SensorType::NoiseLevel => "NOISE_LEVEL",
            SensorType::WaterQuality => "WATER_QUALITY",
            SensorType::SoilMoisture => "SOIL_MOISTURE",
            SensorType::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sync state of an organization's time-series bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BucketSyncStatus {
    Pending,
    Creating,
    Active,
    Error,
    Deleting,
    #[serde(other)]
    Unknown,
}

impl BucketSyncStatus {
    /// Only `ACTIVE` buckets accept data.
    pub fn is_ready(&self) -> bool {
        matches!(self, BucketSyncStatus::Active)
    }
}

/// Organization owning a sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub influx_bucket_name: Option<String>,
    pub bucket_sync_status: BucketSyncStatus,
}

/// One sensor as listed by the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorDescriptor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub sensor_type: SensorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub organization_id: String,
    pub organization: Organization,
}

fn default_active() -> bool {
    true
}

/// Diagnostic summary of a sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub sensor_type: SensorType,
    pub organization: String,
    pub bucket_status: BucketSyncStatus,
}

impl From<&SensorDescriptor> for SensorInfo {
    fn from(sensor: &SensorDescriptor) -> Self {
        Self {
            id: sensor.id.clone(),
            name: sensor.name.clone(),
            sensor_type: sensor.sensor_type,
            organization: sensor.organization.name.clone(),
            bucket_status: sensor.organization.bucket_sync_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_from_directory_json() {
        let json = r#"{
            "id": "sensor-temp-001",
            "name": "Temperature Sensor Campus A",
            "type": "TEMPERATURE",
            "location": "Campus A - Building 1",
            "latitude": 48.8566,
            "longitude": 2.3522,
            "organizationId": "test-org-1",
            "organization": {
                "id": "test-org-1",
                "name": "Test Organization",
                "influxBucketName": "ecowatch_org_test-org-1",
                "bucketSyncStatus": "ACTIVE"
            }
        }"#;
        let sensor: SensorDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(sensor.sensor_type, SensorType::Temperature);
        assert!(sensor.is_active);
        assert_eq!(sensor.latitude, Some(48.8566));
        assert!(sensor.organization.bucket_sync_status.is_ready());
    }

    #[test]
    fn test_unknown_bucket_status_is_not_ready() {
        let status: BucketSyncStatus = serde_json::from_str("\"MIGRATING\"").unwrap();
        assert_eq!(status, BucketSyncStatus::Unknown);
        assert!(!status.is_ready());
        assert!(!BucketSyncStatus::Pending.is_ready());
    }

    #[test]
    fn test_sensor_type_names() {
        assert_eq!(SensorType::AirQuality.to_string(), "AIR_QUALITY");
        assert_eq!(
            serde_json::to_string(&SensorType::NoiseLevel).unwrap(),
            "\"NOISE_LEVEL\""
        );
    }

    #[test]
    fn test_unknown_sensor_type_still_loads() {
        let sensor_type: SensorType = serde_json::from_str("\"CO2\"").unwrap();
        assert_eq!(sensor_type, SensorType::Unknown);
        assert_eq!(sensor_type.as_str(), "UNKNOWN");
    }
}
