// EcoWatch Simulator - Simulation driver
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! The simulation driver.
//!
//! [`DataSimulator`] owns everything that changes between ticks: the global
//! generator, the weather, and per-sensor state. It is synchronous and must
//! not be ticked concurrently; callers that share it across tasks wrap it in
//! a single lock.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use ecowatch_sim::{DataSimulator, MemoryDirectory, SimulatorConfig};
//!
//! let mut sim = DataSimulator::new(SimulatorConfig::default());
//! let mut directory = MemoryDirectory::new();
//! let count = sim.initialize(&mut directory, Utc::now()).unwrap();
//! assert_eq!(count, 5);
//!
//! let payloads = sim.generate_all_active_sensors(Utc::now());
//! assert!(payloads.len() <= 5);
//! ```

use crate::anomalies::{
    apply_outlier, frozen_values, maybe_maintenance, plateau_step, update_battery,
    OutlierOutcome, PlateauPhase,
};
use crate::config::SimulatorConfig;
use crate::directory::SensorDirectory;
use crate::error::Result;
use crate::generators::{clamp, generate_all, round0};
use crate::payload::{
    DeviceInfo, Metric, ReadingLocation, ReadingMetadata, SensorPayload, SensorReading,
    TickOutcome,
};
use crate::rng::SeededRng;
use crate::sensor::{SensorDescriptor, SensorInfo};
use crate::state::{SensorSimState, SensorStateStore};
use crate::weather::{WeatherOrchestrator, WeatherScenario};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

/// Timestamp jitter as a fraction of the tick interval.
const JITTER_FRACTION: f64 = 0.05;

/// Synthetic sensor data generator.
#[derive(Debug)]
pub struct DataSimulator {
    config: SimulatorConfig,
    global_rng: SeededRng,
    weather: WeatherOrchestrator,
    states: SensorStateStore,
    sensors: Vec<SensorDescriptor>,
}

impl DataSimulator {
    /// Create a simulator. No sensors are known until [`initialize`](Self::initialize).
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            global_rng: SeededRng::new(config.seed),
            config,
            weather: WeatherOrchestrator::new(),
            states: SensorStateStore::new(),
            sensors: Vec::new(),
        }
    }

    /// Load the active sensors from `directory` and create their state.
    ///
    /// Directory errors are returned unchanged; the caller should abort.
    pub fn initialize(
        &mut self,
        directory: &mut dyn SensorDirectory,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        directory.ensure_test_data()?;
        let sensors = directory.list_active_sensors()?;
        let now_ms = now.timestamp_millis();

        info!("Initialized with {} active sensors", sensors.len());
        for sensor in &sensors {
            info!(
                "  - {} ({}) - Org: {} - Bucket: {:?}",
                sensor.name,
                sensor.sensor_type,
                sensor.organization.name,
                sensor.organization.bucket_sync_status
            );
            self.states.ensure(&self.config, sensor, now_ms);
        }

        self.sensors = sensors;
        Ok(self.sensors.len())
    }

    /// Generate one tick for one sensor.
    ///
    /// Never fails: drops and unsupported types are reported through
    /// [`TickOutcome`], single failed readings are simply missing.
    pub fn generate_for_sensor(
        &mut self,
        sensor: &SensorDescriptor,
        now: DateTime<Utc>,
    ) -> TickOutcome {
        let now_ms = now.timestamp_millis();
        let config = &self.config;
        let interval_ms = config.interval_ms;

        self.weather.rotate(
            &mut self.global_rng,
            now_ms,
            interval_ms,
            config.scenario_start_per_day,
            config.scenario_end_per_day,
        );

        let state = self.states.ensure(config, sensor, now_ms);

        if state.rng.chance(config.drop_rate) {
            update_battery(
                state,
                interval_ms,
                config.battery_decay_per_hour,
                config.recharge_per_day,
                false,
            );
            debug!(sensor_id = %sensor.id, "Message dropped");
            return TickOutcome::Dropped;
        }

        let metrics: Vec<Metric> = if config.multi_metric {
            Metric::ALL.to_vec()
        } else {
            match Metric::for_sensor_type(sensor.sensor_type) {
                Some(metric) => vec![metric],
                None => {
                    debug!(
                        sensor_id = %sensor.id,
                        "Unsupported sensor type {} in mono-metric mode",
                        sensor.sensor_type
                    );
                    return TickOutcome::Unsupported(sensor.sensor_type);
                }
            }
        };

        let jitter_ms =
            round0(interval_ms as f64 * JITTER_FRACTION * state.rng.range(-1.0, 1.0)) as i64;
        let timestamp = now + Duration::milliseconds(jitter_ms);

        let influence = self.weather.influence(&mut self.global_rng, now_ms);
        maybe_maintenance(state, now_ms, interval_ms, config.maintenance_per_day);
        let generated = generate_all(state, &mut self.global_rng, &now, &influence, interval_ms);

        let (values, outliers_enabled) =
            match plateau_step(state, now_ms, interval_ms, config.plateau_rate) {
                PlateauPhase::Free => (generated, true),
                PlateauPhase::Entered => {
                    state.plateau_values = Some(generated);
                    (generated, false)
                }
                PlateauPhase::Frozen(frozen) => (frozen_values(&frozen, &mut state.rng), false),
            };

        let mut readings = Vec::with_capacity(metrics.len());
        for metric in metrics {
            let mut value = values.get(metric);
            if outliers_enabled {
                match apply_outlier(metric, value, &mut state.rng, config.anomaly_rate) {
                    OutlierOutcome::Value(v) => value = v,
                    OutlierOutcome::Omit => continue,
                }
            }
            readings.push(build_reading(
                state,
                &sensor.id,
                metric,
                value,
                timestamp,
                interval_ms,
            ));
        }

        update_battery(
            state,
            interval_ms,
            config.battery_decay_per_hour,
            config.recharge_per_day,
            true,
        );
        state.last_tick_ms = Some(now_ms);

        TickOutcome::Generated(SensorPayload {
            sensor_id: sensor.id.clone(),
            readings,
            device_info: DeviceInfo::for_sensor(&sensor.id),
        })
    }

    /// Generate one tick for every initialized sensor whose organization
    /// bucket is ready. Dropped, unsupported and empty payloads are skipped.
    pub fn generate_all_active_sensors(&mut self, now: DateTime<Utc>) -> Vec<SensorPayload> {
        if self.sensors.is_empty() {
            warn!("No sensors available. Did you call initialize()?");
            return Vec::new();
        }

        let sensors = std::mem::take(&mut self.sensors);
        let mut payloads = Vec::new();
        for sensor in &sensors {
            let status = sensor.organization.bucket_sync_status;
            if !status.is_ready() {
                debug!(
                    sensor_id = %sensor.id,
                    "Skipping sensor, organization bucket is {:?}",
                    status
                );
                continue;
            }
            if let Some(payload) = self.generate_for_sensor(sensor, now).into_payload() {
                if !payload.readings.is_empty() {
                    payloads.push(payload);
                }
            }
        }
        self.sensors = sensors;
        payloads
    }

    /// Summaries of the known sensors.
    pub fn sensors_info(&self) -> Vec<SensorInfo> {
        self.sensors.iter().map(SensorInfo::from).collect()
    }

    /// Sensors loaded by the last initialization.
    pub fn sensors(&self) -> &[SensorDescriptor] {
        &self.sensors
    }

    /// State of a sensor, once it has been seen.
    pub fn sensor_state(&self, sensor_id: &str) -> Option<&SensorSimState> {
        self.states.get(sensor_id)
    }

    /// Weather scenario running at `now`.
    ///
    /// A scenario past its end is not reported even if no tick has rotated
    /// it out yet.
    pub fn scenario_at(&self, now: DateTime<Utc>) -> Option<&WeatherScenario> {
        self.weather.active_at(now.timestamp_millis())
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }
}

fn build_reading(
    state: &mut SensorSimState,
    sensor_id: &str,
    metric: Metric,
    value: f64,
    timestamp: DateTime<Utc>,
    interval_ms: u64,
) -> SensorReading {
    let accuracy = clamp(
        round0(state.accuracy as f64 + state.rng.normal(0.0, 1.0)),
        90.0,
        99.0,
    ) as u8;

    SensorReading {
        id: format!("{}-{}", sensor_id, metric.name()),
        metric,
        value,
        unit: metric.unit().to_string(),
        timestamp,
        location: ReadingLocation {
            lat: state.location.lat,
            lng: state.location.lng,
            name: Some(state.location.name.clone()),
        },
        battery_level: Some(round0(state.battery_level) as u8),
        metadata: Some(ReadingMetadata {
            accuracy,
            reading_interval: interval_ms,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{test_fleet, MemoryDirectory};
    use crate::error::SimError;
    use crate::sensor::{BucketSyncStatus, SensorType};
    use crate::weather::ScenarioKind;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn quiet_config() -> SimulatorConfig {
        SimulatorConfig::default()
            .with_drop_rate(0.0)
            .with_anomaly_rate(0.0)
    }

    #[test]
    fn test_initialize_seeds_and_creates_state() {
        let mut sim = DataSimulator::new(quiet_config());
        let mut dir = MemoryDirectory::new();
        assert_eq!(sim.initialize(&mut dir, t0()).unwrap(), 5);
        for sensor in test_fleet() {
            assert!(sim.sensor_state(&sensor.id).is_some());
        }
        let info = sim.sensors_info();
        assert_eq!(info.len(), 5);
        assert_eq!(info[0].organization, "Test Organization");
    }

    #[test]
    fn test_initialize_propagates_directory_error() {
        let mut sim = DataSimulator::new(quiet_config());
        let mut dir = MemoryDirectory::failing("db down");
        let err = sim.initialize(&mut dir, t0()).unwrap_err();
        assert!(matches!(err, SimError::Directory(_)));
        assert!(sim.sensors().is_empty());
    }

    #[test]
    fn test_generate_without_sensors_is_empty() {
        let mut sim = DataSimulator::new(quiet_config());
        assert!(sim.generate_all_active_sensors(t0()).is_empty());
    }

    #[test]
    fn test_reading_fields() {
        let mut sim = DataSimulator::new(quiet_config());
        let sensor = test_fleet().remove(0);
        let payload = sim
            .generate_for_sensor(&sensor, t0())
            .into_payload()
            .unwrap();

        assert_eq!(payload.readings.len(), 5);
        let temp = payload.reading(Metric::Temperature).unwrap();
        assert_eq!(temp.id, "sensor-temp-001-temperature");
        assert_eq!(temp.unit, "°C");
        assert_eq!(temp.location.lat, 48.8566);
        let jitter = (temp.timestamp - t0()).num_milliseconds().abs();
        assert!(jitter <= 250);
        let meta = temp.metadata.as_ref().unwrap();
        assert!((90..=99).contains(&meta.accuracy));
        assert_eq!(meta.reading_interval, 5000);
        assert!(temp.battery_level.unwrap() <= 100);
        // Every reading of a tick shares one timestamp
        assert!(payload.readings.iter().all(|r| r.timestamp == temp.timestamp));
    }

    #[test]
    fn test_mono_metric_follows_declared_type() {
        let mut sim = DataSimulator::new(quiet_config().with_multi_metric(false));
        let fleet = test_fleet();

        let humid = sim.generate_for_sensor(&fleet[1], t0());
        let payload = humid.payload().unwrap();
        assert_eq!(payload.readings.len(), 1);
        assert_eq!(payload.readings[0].metric, Metric::Humidity);

        let noise = sim.generate_for_sensor(&fleet[4], t0());
        assert_eq!(noise, TickOutcome::Unsupported(SensorType::NoiseLevel));
    }

    #[test]
    fn test_mono_metric_water_and_soil_sensors() {
        let mut sim = DataSimulator::new(quiet_config().with_multi_metric(false));
        let mut water = test_fleet().remove(0);
        water.id = "sensor-water-001".to_string();
        water.sensor_type = SensorType::WaterQuality;
        let mut soil = test_fleet().remove(0);
        soil.id = "sensor-soil-001".to_string();
        soil.sensor_type = SensorType::SoilMoisture;

        let payload = sim.generate_for_sensor(&water, t0()).into_payload().unwrap();
        assert_eq!(payload.readings.len(), 1);
        assert_eq!(payload.readings[0].metric, Metric::WaterQuality);
        assert!((60.0..=95.0).contains(&payload.readings[0].value));

        let payload = sim.generate_for_sensor(&soil, t0()).into_payload().unwrap();
        assert_eq!(payload.readings.len(), 1);
        assert_eq!(payload.readings[0].metric, Metric::SoilMoisture);
        assert!((5.0..=60.0).contains(&payload.readings[0].value));
    }

    #[test]
    fn test_expired_scenario_not_reported_while_gated() {
        let mut fleet = test_fleet();
        for sensor in &mut fleet {
            sensor.organization.bucket_sync_status = BucketSyncStatus::Pending;
        }
        let mut sim = DataSimulator::new(quiet_config());
        sim.initialize(&mut MemoryDirectory::with_sensors(fleet), t0()).unwrap();

        let start_ms = t0().timestamp_millis();
        sim.weather.force(WeatherScenario {
            kind: ScenarioKind::Rain,
            start_ms,
            end_ms: start_ms + 60_000,
        });
        assert!(sim.scenario_at(t0() + Duration::seconds(30)).is_some());

        // Gated organizations never rotate the weather
        let later = t0() + Duration::minutes(5);
        assert!(sim.generate_all_active_sensors(later).is_empty());
        assert!(sim.weather.scenario().is_some());
        assert!(sim.scenario_at(later).is_none());
    }

    #[test]
    fn test_last_tick_recorded() {
        let mut sim = DataSimulator::new(quiet_config());
        let sensor = test_fleet().remove(0);
        sim.generate_for_sensor(&sensor, t0());
        let state = sim.sensor_state(&sensor.id).unwrap();
        assert_eq!(state.last_tick_ms, Some(t0().timestamp_millis()));
    }

    #[test]
    fn test_drop_still_drains_battery() {
        let mut sim = DataSimulator::new(
            quiet_config()
                .with_drop_rate(1.0)
                .with_recharge_per_day(0.0),
        );
        let sensor = test_fleet().remove(0);
        assert!(sim.generate_for_sensor(&sensor, t0()).is_dropped());
        let after_first = sim.sensor_state(&sensor.id).unwrap().battery_level;
        assert!(sim
            .generate_for_sensor(&sensor, t0() + Duration::seconds(5))
            .is_dropped());
        let after_second = sim.sensor_state(&sensor.id).unwrap().battery_level;
        assert!(after_second < after_first);
        assert!(sim.sensor_state(&sensor.id).unwrap().last_tick_ms.is_none());
    }

    #[test]
    fn test_plateau_freezes_readings() {
        let mut sim = DataSimulator::new(quiet_config().with_plateau_rate(1.0));
        let sensor = test_fleet().remove(0);
        let first = sim
            .generate_for_sensor(&sensor, t0())
            .into_payload()
            .unwrap();
        let until = sim
            .sensor_state(&sensor.id)
            .unwrap()
            .plateau_until_ms
            .unwrap();

        let mut now = t0() + Duration::seconds(5);
        while now.timestamp_millis() < until {
            let next = sim.generate_for_sensor(&sensor, now).into_payload().unwrap();
            for metric in Metric::ALL {
                let a = first.reading(metric).unwrap().value;
                let b = next.reading(metric).unwrap().value;
                assert!((a - b).abs() <= 0.1 + 1e-9, "{} moved {} -> {}", metric, a, b);
            }
            now = now + Duration::seconds(5);
        }
    }
}
