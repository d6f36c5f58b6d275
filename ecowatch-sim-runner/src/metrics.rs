// EcoWatch Simulator Runner - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for the simulator runner.
//!
//! Counters are updated by the ticker after every tick; gauges mirror the
//! simulator state at the end of the tick.

use chrono::{DateTime, Utc};
use ecowatch_sim::{DataSimulator, ScenarioKind};
use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_gauge_vec, register_int_counter, Encoder, Gauge, GaugeVec,
    IntCounter, TextEncoder,
};

const SCENARIO_KINDS: [ScenarioKind; 3] = [
    ScenarioKind::Rain,
    ScenarioKind::Heatwave,
    ScenarioKind::ColdDry,
];

lazy_static! {
    // ============================================================
    // Tick Counters
    // ============================================================

    /// Ticks executed since startup.
    pub static ref TICKS_TOTAL: IntCounter = register_int_counter!(
        "ecowatch_sim_ticks_total",
        "Simulation ticks executed"
    ).unwrap();

    /// Payloads accepted by the publisher.
    pub static ref PAYLOADS_PUBLISHED_TOTAL: IntCounter = register_int_counter!(
        "ecowatch_sim_payloads_published_total",
        "Sensor payloads published"
    ).unwrap();

    /// Readings inside published payloads.
    pub static ref READINGS_PUBLISHED_TOTAL: IntCounter = register_int_counter!(
        "ecowatch_sim_readings_published_total",
        "Sensor readings published"
    ).unwrap();

    /// Payloads the publisher refused.
    pub static ref PUBLISH_ERRORS_TOTAL: IntCounter = register_int_counter!(
        "ecowatch_sim_publish_errors_total",
        "Payloads that failed to publish"
    ).unwrap();

    // ============================================================
    // Simulation State
    // ============================================================

    /// Sensors loaded from the directory.
    pub static ref ACTIVE_SENSORS: Gauge = register_gauge!(
        "ecowatch_sim_active_sensors",
        "Active sensors known to the simulator"
    ).unwrap();

    /// Battery level per sensor (labeled by sensor ID).
    pub static ref SENSOR_BATTERY_PERCENT: GaugeVec = register_gauge_vec!(
        "ecowatch_sim_sensor_battery_percent",
        "Simulated battery level per sensor (0-100)",
        &["sensor_id"]
    ).unwrap();

    /// Weather scenario in effect (1 for the active kind, 0 otherwise).
    pub static ref WEATHER_SCENARIO: GaugeVec = register_gauge_vec!(
        "ecowatch_sim_weather_scenario",
        "Active weather scenario (1=active, 0=inactive)",
        &["kind"]
    ).unwrap();
}

/// Record one executed tick.
pub fn record_tick() {
    TICKS_TOTAL.inc();
}

/// Record a published payload with its reading count.
pub fn record_published(readings: usize) {
    PAYLOADS_PUBLISHED_TOTAL.inc();
    READINGS_PUBLISHED_TOTAL.inc_by(readings as u64);
}

/// Record a failed publish.
pub fn record_publish_error() {
    PUBLISH_ERRORS_TOTAL.inc();
}

/// Mirror the simulator state at `now` into gauges.
pub fn update_simulation_metrics(sim: &DataSimulator, now: DateTime<Utc>) {
    ACTIVE_SENSORS.set(sim.sensors().len() as f64);

    for sensor in sim.sensors() {
        if let Some(state) = sim.sensor_state(&sensor.id) {
            SENSOR_BATTERY_PERCENT
                .with_label_values(&[sensor.id.as_str()])
                .set(state.battery_level);
        }
    }

    let active = sim.scenario_at(now).map(|s| s.kind);
    for kind in SCENARIO_KINDS {
        WEATHER_SCENARIO
            .with_label_values(&[kind.name()])
            .set(if active == Some(kind) { 1.0 } else { 0.0 });
    }
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
