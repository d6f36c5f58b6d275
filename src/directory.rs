// EcoWatch Simulator - Sensor directory
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Source of the sensors to simulate.
//!
//! The simulator only needs two operations from the directory: an idempotent
//! seeding hook called once at startup, and the list of active sensors.
//! [`MemoryDirectory`] backs tests; [`JsonFileDirectory`] lets the runner
//! work from a plain JSON file.

use crate::error::{Result, SimError};
use crate::sensor::{BucketSyncStatus, Organization, SensorDescriptor, SensorType};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Organization that owns the seeded test fleet.
pub const TEST_ORG_ID: &str = "test-org-1";

/// Directory of sensors and their organizations.
pub trait SensorDirectory {
    /// Seed a minimal fleet when the directory is empty. Idempotent.
    fn ensure_test_data(&mut self) -> Result<()>;

    /// Sensors flagged active, with their organization.
    fn list_active_sensors(&self) -> Result<Vec<SensorDescriptor>>;
}

fn test_organization() -> Organization {
    Organization {
        id: TEST_ORG_ID.to_string(),
        name: "Test Organization".to_string(),
        influx_bucket_name: Some(format!("ecowatch_org_{}", TEST_ORG_ID)),
        bucket_sync_status: BucketSyncStatus::Active,
    }
}

/// Five Campus A sensors of a single active test organization.
pub fn test_fleet() -> Vec<SensorDescriptor> {
    let org = test_organization();
    [
        ("sensor-temp-001", "Temperature Sensor Campus A", SensorType::Temperature),
        ("sensor-humid-001", "Humidity Sensor Campus A", SensorType::Humidity),
        ("sensor-air-001", "Air Quality Sensor Campus A", SensorType::AirQuality),
        ("sensor-pressure-001", "Pressure Sensor Campus A", SensorType::Pressure),
        ("sensor-noise-001", "Noise Level Sensor Campus A", SensorType::NoiseLevel),
    ]
    .into_iter()
    .map(|(id, name, sensor_type)| SensorDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        sensor_type,
        location: Some("Campus A - Building 1".to_string()),
        latitude: Some(48.8566),
        longitude: Some(2.3522),
        is_active: true,
        organization_id: org.id.clone(),
        organization: org.clone(),
    })
    .collect()
}

/// In-memory directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    sensors: Vec<SensorDescriptor>,
    failure: Option<String>,
}

impl MemoryDirectory {
    /// Empty directory; `ensure_test_data` will seed it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding exactly these sensors.
    pub fn with_sensors(sensors: Vec<SensorDescriptor>) -> Self {
        Self {
            sensors,
            failure: None,
        }
    }

    /// Make every call fail with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            sensors: Vec::new(),
            failure: Some(reason.into()),
        }
    }

    pub fn insert(&mut self, sensor: SensorDescriptor) {
        self.sensors.push(sensor);
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    fn check(&self) -> Result<()> {
        match &self.failure {
            Some(reason) => Err(SimError::Directory(reason.clone())),
            None => Ok(()),
        }
    }
}

impl SensorDirectory for MemoryDirectory {
    fn ensure_test_data(&mut self) -> Result<()> {
        self.check()?;
        if self.sensors.is_empty() {
            self.sensors = test_fleet();
            info!("Seeded {} test sensors", self.sensors.len());
        }
        Ok(())
    }

    fn list_active_sensors(&self) -> Result<Vec<SensorDescriptor>> {
        self.check()?;
        Ok(self.sensors.iter().filter(|s| s.is_active).cloned().collect())
    }
}

/// Directory stored as a JSON array of sensor descriptors.
#[derive(Debug, Clone)]
pub struct JsonFileDirectory {
    path: PathBuf,
}

impl JsonFileDirectory {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<SensorDescriptor>> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            SimError::Directory(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl SensorDirectory for JsonFileDirectory {
    fn ensure_test_data(&mut self) -> Result<()> {
        if self.path.exists() && !self.read_all()?.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let fleet = test_fleet();
        fs::write(&self.path, serde_json::to_string_pretty(&fleet)?)?;
        info!(
            "Seeded {} test sensors into {}",
            fleet.len(),
            self.path.display()
        );
        Ok(())
    }

    fn list_active_sensors(&self) -> Result<Vec<SensorDescriptor>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|s| s.is_active)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fleet_shape() {
        let fleet = test_fleet();
        assert_eq!(fleet.len(), 5);
        assert!(fleet.iter().all(|s| s.organization_id == TEST_ORG_ID));
        assert!(fleet
            .iter()
            .all(|s| s.organization.bucket_sync_status.is_ready()));
        assert_eq!(
            fleet[0].organization.influx_bucket_name.as_deref(),
            Some("ecowatch_org_test-org-1")
        );
        assert_eq!(fleet[3].sensor_type, SensorType::Pressure);
    }

    #[test]
    fn test_memory_seeds_only_when_empty() {
        let mut dir = MemoryDirectory::new();
        dir.ensure_test_data().unwrap();
        assert_eq!(dir.len(), 5);
        dir.ensure_test_data().unwrap();
        assert_eq!(dir.len(), 5);

        let mut one = MemoryDirectory::with_sensors(vec![test_fleet().remove(0)]);
        one.ensure_test_data().unwrap();
        assert_eq!(one.list_active_sensors().unwrap().len(), 1);
    }

    #[test]
    fn test_memory_filters_inactive() {
        let mut fleet = test_fleet();
        fleet[1].is_active = false;
        let dir = MemoryDirectory::with_sensors(fleet);
        let active = dir.list_active_sensors().unwrap();
        assert_eq!(active.len(), 4);
        assert!(active.iter().all(|s| s.id != "sensor-humid-001"));
    }

    #[test]
    fn test_memory_failure_propagates() {
        let mut dir = MemoryDirectory::failing("connection refused");
        assert!(matches!(dir.ensure_test_data(), Err(SimError::Directory(_))));
        assert!(dir.list_active_sensors().is_err());
    }
}
