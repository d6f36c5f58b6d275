// EcoWatch Simulator - Weather scenarios
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Global weather regimes.
//!
//! At most one scenario is active at a time and it perturbs every sensor.
//! Starting and early ending are per-tick trials whose probability scales
//! with the tick interval relative to a day.
//!
//! While a scenario runs, its strength follows `sin(smoothstep(progress) * PI)`:
//! zero at both ends, full in the middle. Magnitudes are drawn from the
//! global generator on every evaluation, so strength jitters from one tick
//! to the next within the same scenario.

use crate::config::{days, HOUR_MS, MINUTE_MS};
use crate::generators::{clamp, smoothstep};
use crate::rng::SeededRng;
use serde::Serialize;
use std::f64::consts::PI;
use tracing::info;

/// Kind of weather regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Rain,
    Heatwave,
    ColdDry,
}

impl ScenarioKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::Rain => "rain",
            ScenarioKind::Heatwave => "heatwave",
            ScenarioKind::ColdDry => "cold_dry",
        }
    }

    /// Uniform pick among the three kinds.
    fn pick(rng: &mut SeededRng) -> Self {
        match rng.int(0, 2) {
            0 => ScenarioKind::Rain,
            1 => ScenarioKind::Heatwave,
            _ => ScenarioKind::ColdDry,
        }
    }

    /// Random duration in milliseconds.
    fn draw_duration_ms(&self, rng: &mut SeededRng) -> i64 {
        match self {
            ScenarioKind::Rain => rng.int(30, 120) * MINUTE_MS,
            ScenarioKind::Heatwave => rng.int(24, 120) * HOUR_MS,
            ScenarioKind::ColdDry => rng.int(12, 72) * HOUR_MS,
        }
    }
}

impl std::fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An active weather regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherScenario {
    #[serde(rename = "type")]
    pub kind: ScenarioKind,
    pub start_ms: i64,
    pub end_ms: i64,
}

impl WeatherScenario {
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    /// Eased strength in `[0, 1]` at `now_ms`.
    pub fn easing(&self, now_ms: i64) -> f64 {
        let raw = (now_ms - self.start_ms) as f64 / self.duration_ms().max(1) as f64;
        let progress = smoothstep(0.0, 1.0, clamp(raw, 0.0, 1.0));
        (progress * PI).sin()
    }
}

/// Deltas applied to the generators by the current weather.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioInfluence {
    /// Temperature delta in °C.
    pub d_temp: f64,
    /// Humidity delta in %.
    pub d_humidity: f64,
    /// Air quality index delta.
    pub d_air: f64,
    /// Multiplicative soil factor; above 1 wets, below 1 dries.
    pub soil_factor: f64,
    /// Water quality index delta.
    pub d_water: f64,
}

impl ScenarioInfluence {
    /// No weather effect.
    pub fn neutral() -> Self {
        Self {
            d_temp: 0.0,
            d_humidity: 0.0,
            d_air: 0.0,
            soil_factor: 1.0,
            d_water: 0.0,
        }
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::neutral()
    }
}

impl Default for ScenarioInfluence {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Transition produced by a rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScenarioEvent {
    Started(WeatherScenario),
    Expired(ScenarioKind),
    EndedEarly(ScenarioKind),
}

/// Owner of the single global weather state.
#[derive(Debug, Clone, Default)]
pub struct WeatherOrchestrator {
    scenario: Option<WeatherScenario>,
    last_rotation_ms: Option<i64>,
}

impl WeatherOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current scenario, expired or not.
    pub fn scenario(&self) -> Option<&WeatherScenario> {
        self.scenario.as_ref()
    }

    /// Scenario running at `now_ms`.
    pub fn active_at(&self, now_ms: i64) -> Option<&WeatherScenario> {
        self.scenario
            .as_ref()
            .filter(|s| now_ms >= s.start_ms && now_ms <= s.end_ms)
    }

    /// Evaluate start/end trials for the tick at `now_ms`.
    ///
    /// Only the first call for a given timestamp does anything, so the
    /// driver can call it once per sensor without multiplying the odds.
    pub fn rotate(
        &mut self,
        rng: &mut SeededRng,
        now_ms: i64,
        interval_ms: u64,
        start_per_day: f64,
        end_per_day: f64,
    ) -> Option<ScenarioEvent> {
        if self.last_rotation_ms == Some(now_ms) {
            return None;
        }
        self.last_rotation_ms = Some(now_ms);

        let tick_fraction = days(interval_ms);
        let p_start = start_per_day * tick_fraction;
        let p_end = end_per_day * tick_fraction;

        match self.scenario {
            Some(current) if now_ms <= current.end_ms => {
                if rng.chance(p_end) {
                    info!("Weather scenario ended early: {}", current.kind);
                    self.scenario = None;
                    return Some(ScenarioEvent::EndedEarly(current.kind));
                }
                None
            }
            previous => {
                if rng.chance(p_start) {
                    let kind = ScenarioKind::pick(rng);
                    let duration_ms = kind.draw_duration_ms(rng);
                    let scenario = WeatherScenario {
                        kind,
                        start_ms: now_ms,
                        end_ms: now_ms + duration_ms,
                    };
                    info!(
                        "Weather scenario started: {}, duration {:.2}h",
                        kind,
                        duration_ms as f64 / HOUR_MS as f64
                    );
                    self.scenario = Some(scenario);
                    Some(ScenarioEvent::Started(scenario))
                } else {
                    self.scenario = None;
                    previous.map(|expired| ScenarioEvent::Expired(expired.kind))
                }
            }
        }
    }

    /// Influence of the weather at `now_ms`; neutral without a running scenario.
    pub fn influence(&self, rng: &mut SeededRng, now_ms: i64) -> ScenarioInfluence {
        let Some(scenario) = self.active_at(now_ms) else {
            return ScenarioInfluence::neutral();
        };
        let e = scenario.easing(now_ms);

        match scenario.kind {
            ScenarioKind::Rain => ScenarioInfluence {
                d_temp: -1.0 * e,
                d_humidity: rng.range(10.0, 25.0) * e,
                d_air: -rng.range(5.0, 15.0) * e,
                soil_factor: 1.0 + rng.range(0.05, 0.20) * e,
                d_water: -rng.range(2.0, 6.0) * e,
            },
            ScenarioKind::Heatwave => ScenarioInfluence {
                d_temp: rng.range(3.0, 7.0) * e,
                d_humidity: -rng.range(5.0, 15.0) * e,
                d_air: rng.range(5.0, 20.0) * e,
                soil_factor: 1.0 - rng.range(0.02, 0.08) * e,
                d_water: -rng.range(0.0, 2.0) * e,
            },
            ScenarioKind::ColdDry => ScenarioInfluence {
                d_temp: -rng.range(3.0, 10.0) * e,
                d_humidity: -rng.range(5.0, 15.0) * e,
                d_air: rng.range(0.0, 10.0) * e,
                soil_factor: 1.0 - rng.range(0.0, 0.02) * e,
                d_water: 0.0,
            },
        }
    }

    #[cfg(test)]
    pub(crate) fn force(&mut self, scenario: WeatherScenario) {
        self.scenario = Some(scenario);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DAY_MS;
    use approx::assert_relative_eq;

    const INTERVAL: u64 = 5000;

    fn always_start() -> f64 {
        // p_start >= 1 for a 5 s tick
        DAY_MS as f64 / INTERVAL as f64
    }

    fn scenario(kind: ScenarioKind) -> WeatherScenario {
        WeatherScenario {
            kind,
            start_ms: 0,
            end_ms: 10 * HOUR_MS,
        }
    }

    #[test]
    fn test_neutral_without_scenario() {
        let weather = WeatherOrchestrator::new();
        let mut rng = SeededRng::new(1);
        let before = rng.clone();
        let influence = weather.influence(&mut rng, 123_456);
        assert!(influence.is_neutral());
        assert_eq!(influence.soil_factor, 1.0);
        // No draws consumed
        assert_eq!(rng, before);
    }

    #[test]
    fn test_rotation_never_starts_with_zero_rate() {
        let mut weather = WeatherOrchestrator::new();
        let mut rng = SeededRng::new(2);
        for tick in 0..10_000 {
            let event = weather.rotate(&mut rng, tick * 5000, INTERVAL, 0.0, 0.0);
            assert!(event.is_none());
        }
        assert!(weather.scenario().is_none());
    }

    #[test]
    fn test_forced_start_and_duration_ranges() {
        let mut rng = SeededRng::new(3);
        let mut seen = std::collections::HashSet::new();
        for i in 0..300 {
            let mut weather = WeatherOrchestrator::new();
            let event = weather.rotate(&mut rng, i, INTERVAL, always_start(), 0.0);
            let Some(ScenarioEvent::Started(s)) = event else {
                panic!("expected a start, got {:?}", event);
            };
            seen.insert(s.kind);
            let d = s.duration_ms();
            match s.kind {
                ScenarioKind::Rain => assert!((30 * MINUTE_MS..=120 * MINUTE_MS).contains(&d)),
                ScenarioKind::Heatwave => assert!((24 * HOUR_MS..=120 * HOUR_MS).contains(&d)),
                ScenarioKind::ColdDry => assert!((12 * HOUR_MS..=72 * HOUR_MS).contains(&d)),
            }
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_no_second_start_while_active() {
        let mut weather = WeatherOrchestrator::new();
        let mut rng = SeededRng::new(4);
        weather.rotate(&mut rng, 0, INTERVAL, always_start(), 0.0);
        let first = *weather.scenario().unwrap();
        let mut t = 0;
        while t + 5000 <= first.end_ms {
            t += 5000;
            let event = weather.rotate(&mut rng, t, INTERVAL, always_start(), 0.0);
            assert!(event.is_none());
            assert_eq!(weather.scenario(), Some(&first));
        }
    }

    #[test]
    fn test_expiry_without_restart() {
        let mut weather = WeatherOrchestrator::new();
        let mut rng = SeededRng::new(5);
        weather.force(scenario(ScenarioKind::Rain));
        let event = weather.rotate(&mut rng, 10 * HOUR_MS + 1, INTERVAL, 0.0, 0.0);
        assert_eq!(event, Some(ScenarioEvent::Expired(ScenarioKind::Rain)));
        assert!(weather.scenario().is_none());
    }

    #[test]
    fn test_early_end() {
        let mut weather = WeatherOrchestrator::new();
        let mut rng = SeededRng::new(6);
        weather.force(scenario(ScenarioKind::Heatwave));
        let event = weather.rotate(&mut rng, HOUR_MS, INTERVAL, 0.0, always_start());
        assert_eq!(event, Some(ScenarioEvent::EndedEarly(ScenarioKind::Heatwave)));
        assert!(weather.influence(&mut rng, HOUR_MS).is_neutral());
    }

    #[test]
    fn test_rotation_once_per_timestamp() {
        let mut weather = WeatherOrchestrator::new();
        let mut rng = SeededRng::new(7);
        weather.rotate(&mut rng, 5000, INTERVAL, 0.0, 0.0);
        let snapshot = rng.clone();
        weather.rotate(&mut rng, 5000, INTERVAL, always_start(), 0.0);
        assert!(weather.scenario().is_none());
        assert_eq!(rng, snapshot);
    }

    #[test]
    fn test_easing_curve() {
        let s = scenario(ScenarioKind::Rain);
        assert_relative_eq!(s.easing(0), 0.0);
        assert_relative_eq!(s.easing(5 * HOUR_MS), 1.0);
        assert!(s.easing(10 * HOUR_MS) < 1e-9);
        assert!(s.easing(HOUR_MS) < s.easing(3 * HOUR_MS));
    }

    #[test]
    fn test_influence_signs() {
        let mut rng = SeededRng::new(8);
        let mid = 5 * HOUR_MS;

        let mut weather = WeatherOrchestrator::new();
        weather.force(scenario(ScenarioKind::Rain));
        let rain = weather.influence(&mut rng, mid);
        assert_relative_eq!(rain.d_temp, -1.0);
        assert!(rain.d_humidity >= 10.0 && rain.d_humidity < 25.0);
        assert!(rain.soil_factor > 1.01);
        assert!(rain.d_water < 0.0);

        weather.force(scenario(ScenarioKind::Heatwave));
        let heat = weather.influence(&mut rng, mid);
        assert!(heat.d_temp >= 3.0);
        assert!(heat.d_humidity < 0.0);
        assert!(heat.soil_factor < 1.0);

        weather.force(scenario(ScenarioKind::ColdDry));
        let cold = weather.influence(&mut rng, mid);
        assert!(cold.d_temp <= -3.0);
        assert_eq!(cold.d_water, 0.0);
    }

    #[test]
    fn test_influence_magnitude_jitters_within_scenario() {
        // Magnitudes are redrawn on every evaluation
        let mut rng = SeededRng::new(9);
        let mut weather = WeatherOrchestrator::new();
        weather.force(scenario(ScenarioKind::Heatwave));
        let a = weather.influence(&mut rng, 5 * HOUR_MS);
        let b = weather.influence(&mut rng, 5 * HOUR_MS);
        assert_ne!(a.d_temp, b.d_temp);
    }
}
