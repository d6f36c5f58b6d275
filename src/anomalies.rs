// EcoWatch Simulator - Anomalies and reliability
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Simulated real-world faults.
//!
//! Every trial here draws from the sensor's private generator, so one
//! sensor's faults never shift another sensor's stream.
//!
//! - Outliers: a rare per-reading trial producing a spike, a zeroed value
//!   or an omitted reading.
//! - Plateau: a stuck sensor repeating the values it had when it got stuck.
//! - Maintenance: a calibration event resetting the temperature drift.
//! - Battery: slow decay, faster on failed transmissions, rare recharges.

use crate::config::{days, hours};
use crate::generators::{clamp, MetricValues};
use crate::payload::Metric;
use crate::rng::SeededRng;
use crate::state::{SensorSimState, MAINTENANCE_PERIOD_MS};
use tracing::info;

/// Decay multiplier applied when a transmission failed.
pub const FAILED_PUBLISH_DECAY_FACTOR: f64 = 1.6;

/// Recharges only happen below this level.
pub const RECHARGE_THRESHOLD: f64 = 80.0;

/// Largest deviation from the frozen value while stuck.
pub const PLATEAU_NOISE: f64 = 0.05;

/// Result of the outlier trial on one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlierOutcome {
    /// Emit this value (unchanged, spiked or zeroed).
    Value(f64),
    /// Omit this reading only.
    Omit,
}

/// Spike range `(low, high)` added to a value.
fn spike_range(metric: Metric) -> (f64, f64) {
    match metric {
        Metric::Temperature => (-8.0, 8.0),
        Metric::Humidity => (-40.0, 40.0),
        Metric::AirQuality => (-40.0, 60.0),
        Metric::WaterQuality => (-20.0, 10.0),
        Metric::SoilMoisture => (-25.0, 25.0),
    }
}

/// Run the outlier trial on one reading.
///
/// On trigger one of three modes is picked uniformly: a spike clamped back
/// into the metric's bounds, a failure that zeroes or omits the reading, or
/// nothing (stuck sensors are handled by the plateau layer).
pub fn apply_outlier(
    metric: Metric,
    value: f64,
    rng: &mut SeededRng,
    anomaly_rate: f64,
) -> OutlierOutcome {
    if !rng.chance(anomaly_rate) {
        return OutlierOutcome::Value(value);
    }
    match rng.int(0, 2) {
        0 => {
            let (low, high) = spike_range(metric);
            let (min, max) = metric.bounds();
            let spiked = clamp(value + rng.range(low, high), min, max);
            OutlierOutcome::Value(clamp(metric.round(spiked), min, max))
        }
        1 => {
            if rng.chance(0.5) {
                OutlierOutcome::Value(0.0)
            } else {
                OutlierOutcome::Omit
            }
        }
        _ => OutlierOutcome::Value(value),
    }
}

/// Where a sensor stands with respect to plateaus on this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlateauPhase {
    /// Not stuck.
    Free,
    /// Got stuck on this tick; the tick's values become the frozen ones.
    Entered,
    /// Stuck since an earlier tick on these values.
    Frozen(MetricValues),
}

/// Advance the plateau window and run the entry trial.
///
/// An expired window is cleared first. A sensor already inside a window is
/// not retried.
pub fn plateau_step(
    state: &mut SensorSimState,
    now_ms: i64,
    interval_ms: u64,
    plateau_rate: f64,
) -> PlateauPhase {
    if let (true, Some(frozen)) = (state.in_plateau(now_ms), state.plateau_values) {
        return PlateauPhase::Frozen(frozen);
    }
    if state.plateau_until_ms.is_some() {
        state.plateau_until_ms = None;
        state.plateau_values = None;
    }

    if state.rng.chance(plateau_rate) {
        let ticks = state.rng.int(2, 10);
        state.plateau_until_ms = Some(now_ms + ticks * interval_ms as i64);
        PlateauPhase::Entered
    } else {
        PlateauPhase::Free
    }
}

/// Values emitted by a stuck sensor: the frozen ones plus noise bounded
/// to [`PLATEAU_NOISE`], rounded and kept within bounds.
pub fn frozen_values(frozen: &MetricValues, rng: &mut SeededRng) -> MetricValues {
    let mut out = *frozen;
    for metric in Metric::ALL {
        let (min, max) = metric.bounds();
        let noise = clamp(rng.normal(0.0, PLATEAU_NOISE), -PLATEAU_NOISE, PLATEAU_NOISE);
        let value = metric.round(frozen.get(metric) + noise);
        out.0[metric.index()] = clamp(value, min, max);
    }
    out
}

/// Maintenance trial, run at most once every six hours.
///
/// On success the temperature drift is reset to a small fresh value.
/// Returns whether a reset happened.
pub fn maybe_maintenance(
    state: &mut SensorSimState,
    now_ms: i64,
    interval_ms: u64,
    maintenance_per_day: f64,
) -> bool {
    if now_ms < state.next_maintenance_check_ms {
        return false;
    }
    state.next_maintenance_check_ms = now_ms + MAINTENANCE_PERIOD_MS;

    let p = maintenance_per_day * days(interval_ms) * 6.0 * 24.0;
    if state.rng.chance(p) {
        state.drift_celsius = state.rng.normal(0.0, 0.02);
        state.drift_start_ms = now_ms;
        info!("Maintenance event: temperature drift reset");
        return true;
    }
    false
}

/// Decay the battery for one tick and run the recharge trial.
///
/// Returns whether the battery was recharged.
pub fn update_battery(
    state: &mut SensorSimState,
    interval_ms: u64,
    decay_per_hour: f64,
    recharge_per_day: f64,
    publish_succeeded: bool,
) -> bool {
    let elapsed_hours = hours(interval_ms);
    let mut decay = decay_per_hour * elapsed_hours * state.battery_decay_multiplier;
    if !publish_succeeded {
        decay *= FAILED_PUBLISH_DECAY_FACTOR;
    }
    state.battery_level = clamp(state.battery_level - decay, 0.0, 100.0);

    // The trial is drawn even when the level is too high to recharge
    let p_recharge = recharge_per_day * days(interval_ms);
    if state.rng.chance(p_recharge) && state.battery_level < RECHARGE_THRESHOLD {
        state.battery_level = 100.0;
        info!("Battery recharge event: level restored to 100%");
        return true;
    }
    false
}
