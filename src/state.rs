// EcoWatch Simulator - Per-sensor state
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Mutable simulation state, one entry per sensor.
//!
//! State is created the first time a sensor is seen and lives for the
//! lifetime of the simulator. Every initial draw comes from the sensor's
//! private generator, so a sensor's state depends only on the global seed
//! and its id.

use crate::config::{SimulatorConfig, HOUR_MS};
use crate::generators::{clamp, round0, MetricValues};
use crate::rng::SeededRng;
use crate::sensor::SensorDescriptor;
use serde::Serialize;
use std::collections::HashMap;

/// Interval between two maintenance checks.
pub const MAINTENANCE_PERIOD_MS: i64 = 6 * HOUR_MS;

const ZONES: [&str; 20] = [
    "1er", "2e", "3e", "4e", "5e", "6e", "7e", "8e", "9e", "10e", "11e", "12e", "13e", "14e",
    "15e", "16e", "17e", "18e", "19e", "20e",
];

/// Position and display name of a sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoLocation {
    pub lat: f64,
    pub lng: f64,
    pub name: String,
}

/// State of one simulated sensor.
#[derive(Debug, Clone)]
pub struct SensorSimState {
    /// Battery charge in `[0, 100]`.
    pub battery_level: f64,
    /// Per-sensor factor on battery decay, in `[0.5, 1.5]`.
    pub battery_decay_multiplier: f64,
    /// Timestamp of the last completed tick.
    pub last_tick_ms: Option<i64>,
    /// Temperature bias in °C.
    pub drift_celsius: f64,
    /// When the current drift started.
    pub drift_start_ms: i64,
    /// Next time the maintenance trial runs.
    pub next_maintenance_check_ms: i64,
    /// Soil moisture in `[5, 60]` %.
    pub soil_moisture_pct: f64,
    /// Water quality index in `[60, 95]`.
    pub water_quality_idx: f64,
    /// End of the current plateau window, if stuck.
    pub plateau_until_ms: Option<i64>,
    /// Values repeated while the plateau lasts.
    pub plateau_values: Option<MetricValues>,
    /// Private generator.
    pub rng: SeededRng,
    pub location: GeoLocation,
    /// Base precision rating in `[90, 99]`.
    pub accuracy: u8,
}

impl SensorSimState {
    /// Fresh state for a sensor. Missing coordinates are drawn inside the
    /// configured bounding box.
    pub fn new(
        config: &SimulatorConfig,
        sensor_id: &str,
        latitude: Option<f64>,
        longitude: Option<f64>,
        now_ms: i64,
    ) -> Self {
        let mut rng = SeededRng::for_sensor(config.seed, sensor_id);
        let bbox = config.bbox;

        let lat = latitude.unwrap_or_else(|| rng.range(bbox.lat_min, bbox.lat_max));
        let lng = longitude.unwrap_or_else(|| rng.range(bbox.lng_min, bbox.lng_max));
        let zone = ZONES[rng.int(0, ZONES.len() as i64 - 1) as usize];

        let battery_level = clamp(85.0 + rng.normal(10.0, 5.0), 50.0, 100.0);
        let battery_decay_multiplier = clamp(0.8 + rng.normal(0.2, 0.1), 0.5, 1.5);
        let drift_celsius = rng.normal(0.0, 0.05);
        let soil_moisture_pct = clamp(20.0 + rng.normal(0.0, 5.0), 5.0, 60.0);
        let water_quality_idx = clamp(80.0 + rng.normal(0.0, 5.0), 60.0, 95.0);
        let accuracy = clamp(round0(93.0 + rng.normal(0.0, 2.0)), 90.0, 99.0) as u8;

        Self {
            battery_level,
            battery_decay_multiplier,
            last_tick_ms: None,
            drift_celsius,
            drift_start_ms: now_ms,
            next_maintenance_check_ms: now_ms + MAINTENANCE_PERIOD_MS,
            soil_moisture_pct,
            water_quality_idx,
            plateau_until_ms: None,
            plateau_values: None,
            rng,
            location: GeoLocation {
                lat,
                lng,
                name: format!("EcoWatch Zone {}", zone),
            },
            accuracy,
        }
    }

    /// Whether the sensor is stuck at `now_ms`.
    pub fn in_plateau(&self, now_ms: i64) -> bool {
        matches!(self.plateau_until_ms, Some(until) if now_ms < until)
    }
}

/// All sensor states keyed by sensor id.
#[derive(Debug, Default)]
pub struct SensorStateStore {
    states: HashMap<String, SensorSimState>,
}

impl SensorStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `sensor`, created on first use.
    pub fn ensure(
        &mut self,
        config: &SimulatorConfig,
        sensor: &SensorDescriptor,
        now_ms: i64,
    ) -> &mut SensorSimState {
        self.states.entry(sensor.id.clone()).or_insert_with(|| {
            SensorSimState::new(config, &sensor.id, sensor.latitude, sensor.longitude, now_ms)
        })
    }

    pub fn get(&self, sensor_id: &str) -> Option<&SensorSimState> {
        self.states.get(sensor_id)
    }

    pub fn contains(&self, sensor_id: &str) -> bool {
        self.states.contains_key(sensor_id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Iterate over `(sensor_id, state)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &SensorSimState)> {
        self.states.iter()
    }
}
