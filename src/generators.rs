// EcoWatch Simulator - Physical quantity generators
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Generators for the five simulated quantities.
//!
//! Every generator clamps to the bounds of its [`Metric`] and rounds to the
//! metric's reporting precision before returning. Soil moisture and water
//! quality are slow processes and write their new level back into the
//! sensor state.
//!
//! Local time is Europe/Paris approximated by a fixed offset: UTC+2 from
//! April to October, UTC+1 otherwise.

use crate::payload::Metric;
use crate::rng::SeededRng;
use crate::state::SensorSimState;
use crate::weather::ScenarioInfluence;
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::f64::consts::PI;

/// Clamp `value` into `[min, max]`.
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Hermite interpolation of `x` between two edges, clamped to `[0, 1]`.
pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = clamp((x - edge0) / (edge1 - edge0), 0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Round half up to one decimal.
pub fn round1(value: f64) -> f64 {
    (value * 10.0 + 0.5).floor() / 10.0
}

/// Round half up to an integer.
pub fn round0(value: f64) -> f64 {
    (value + 0.5).floor()
}

fn clamp_metric(metric: Metric, value: f64) -> f64 {
    let (min, max) = metric.bounds();
    clamp(value, min, max)
}

/// Fractional local hour in Paris, in `[0, 24)`.
pub fn paris_local_hour(now: &DateTime<Utc>) -> f64 {
    let offset = if (4..=10).contains(&now.month()) { 2 } else { 1 };
    let hour = (now.hour() + offset) % 24;
    hour as f64 + now.minute() as f64 / 60.0 + now.second() as f64 / 3600.0
}

/// Meteorological season used for the temperature baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Summer,
    Winter,
    Shoulder,
}

impl Season {
    pub fn of(now: &DateTime<Utc>) -> Self {
        match now.month() {
            6..=8 => Season::Summer,
            12 | 1 | 2 => Season::Winter,
            _ => Season::Shoulder,
        }
    }

    /// Daily mean temperature in °C.
    pub fn base_celsius(&self) -> f64 {
        match self {
            Season::Summer => 22.0,
            Season::Winter => 5.0,
            Season::Shoulder => 12.0,
        }
    }

    /// Range of the diurnal amplitude.
    fn amplitude_range(&self) -> (f64, f64) {
        match self {
            Season::Summer => (5.0, 8.0),
            _ => (3.0, 6.0),
        }
    }
}

/// Temperature in °C.
///
/// Seasonal base plus a diurnal sinusoid (minimum near 05:00, maximum mid
/// afternoon), scenario delta, the sensor's drift and Gaussian noise.
pub fn temperature(
    state: &mut SensorSimState,
    global: &mut SeededRng,
    now: &DateTime<Utc>,
    influence: &ScenarioInfluence,
) -> f64 {
    let season = Season::of(now);
    let (amp_min, amp_max) = season.amplitude_range();
    let amplitude = global.range(amp_min, amp_max);
    let phase = (paris_local_hour(now) - 5.0) / 24.0 * 2.0 * PI;

    let mut temp =
        season.base_celsius() + amplitude * phase.sin() + influence.d_temp + state.drift_celsius;
    temp += state.rng.normal(0.0, 0.3);
    round1(clamp_metric(Metric::Temperature, temp))
}

/// Relative humidity in %, inversely correlated with temperature.
pub fn humidity(temp_c: f64, global: &mut SeededRng, influence: &ScenarioInfluence) -> f64 {
    let target = clamp_metric(Metric::Humidity, 80.0 - 0.8 * (temp_c - 15.0));
    let humidity = target + influence.d_humidity + global.normal(0.0, 2.5);
    round1(clamp_metric(Metric::Humidity, humidity))
}

/// CAQI-like air quality index (integer).
///
/// Rush hours (07-10h, 17-20h local) add traffic load; heat above 25 °C and
/// dryness below 40 % degrade the index further.
pub fn air_quality(
    temp_c: f64,
    humidity_pct: f64,
    now: &DateTime<Utc>,
    global: &mut SeededRng,
    influence: &ScenarioInfluence,
) -> f64 {
    let hour = paris_local_hour(now);
    let mut base = 30.0;
    if (7.0..=10.0).contains(&hour) {
        base += 15.0;
    }
    if (17.0..=20.0).contains(&hour) {
        base += 15.0;
    }
    if temp_c > 25.0 {
        base += (temp_c - 25.0) * 0.8;
    }
    if humidity_pct < 40.0 {
        base += (40.0 - humidity_pct) * 0.5;
    }
    let aq = base + influence.d_air + global.normal(0.0, 4.0);
    round0(clamp_metric(Metric::AirQuality, aq))
}

/// Soil moisture in %.
///
/// Evaporates per elapsed hour (faster above 20 °C and under a drying soil
/// factor) and jumps up while rain pushes the soil factor above 1.01.
pub fn soil_moisture(
    state: &mut SensorSimState,
    global: &mut SeededRng,
    influence: &ScenarioInfluence,
    interval_ms: u64,
    temp_c: f64,
) -> f64 {
    let hours = crate::config::hours(interval_ms);
    let evaporation = 0.08 + (temp_c - 20.0).max(0.0) * 0.02;

    let mut soil = state.soil_moisture_pct;
    soil -= evaporation * hours * (2.0 - influence.soil_factor);
    if influence.soil_factor > 1.01 {
        soil += (influence.soil_factor - 1.0) * global.range(5.0, 20.0);
    }
    soil += global.normal(0.0, 0.7);
    soil = clamp_metric(Metric::SoilMoisture, soil);

    state.soil_moisture_pct = soil;
    round1(soil)
}

/// Mean WQI toward which water quality reverts.
pub const WATER_QUALITY_MEAN: f64 = 82.0;

/// WQI-like water quality index (integer).
///
/// Random walk with 1 % per tick reversion toward [`WATER_QUALITY_MEAN`].
pub fn water_quality(
    state: &mut SensorSimState,
    global: &mut SeededRng,
    influence: &ScenarioInfluence,
) -> f64 {
    let mut wqi = state.water_quality_idx;
    wqi += global.normal(0.0, 0.15) + influence.d_water;
    wqi += (WATER_QUALITY_MEAN - wqi) * 0.01;
    wqi = clamp_metric(Metric::WaterQuality, wqi);

    state.water_quality_idx = wqi;
    round0(wqi)
}

/// All five quantities of one tick, indexed like [`Metric::ALL`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricValues(pub [f64; 5]);

impl MetricValues {
    pub fn get(&self, metric: Metric) -> f64 {
        self.0[metric.index()]
    }
}

/// Run every generator in dependency order.
pub fn generate_all(
    state: &mut SensorSimState,
    global: &mut SeededRng,
    now: &DateTime<Utc>,
    influence: &ScenarioInfluence,
    interval_ms: u64,
) -> MetricValues {
    let temp = temperature(state, global, now, influence);
    let hum = humidity(temp, global, influence);
    let air = air_quality(temp, hum, now, global, influence);
    let soil = soil_moisture(state, global, influence, interval_ms, temp);
    let water = water_quality(state, global, influence);
    MetricValues([temp, hum, air, water, soil])
}
