// EcoWatch Simulator - Configuration
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Simulator configuration.
//!
//! All tunables live in one [`SimulatorConfig`], built once at startup
//! (usually from `DATA_FAKER_*` environment variables) and handed to the
//! simulator by value. Missing or malformed variables fall back to the
//! documented defaults.

use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const MINUTE_MS: i64 = 60 * 1000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Longest accepted tick interval.
pub const MAX_INTERVAL_MS: u64 = DAY_MS as u64;

/// A duration in milliseconds as a fraction of an hour.
pub fn hours(duration_ms: u64) -> f64 {
    duration_ms as f64 / HOUR_MS as f64
}

/// A duration in milliseconds as a fraction of a day.
pub fn days(duration_ms: u64) -> f64 {
    duration_ms as f64 / DAY_MS as f64
}

/// Environment variable names.
pub mod env {
    pub const SEED: &str = "DATA_FAKER_SEED";
    pub const INTERVAL_MS: &str = "DATA_FAKER_INTERVAL_MS";
    pub const DROP_RATE: &str = "DATA_FAKER_DROP_RATE";
    pub const ANOMALY_RATE: &str = "DATA_FAKER_ANOMALY_RATE";
    pub const PLATEAU_RATE: &str = "DATA_FAKER_PLATEAU_RATE";
    pub const MULTI_METRIC: &str = "DATA_FAKER_MULTI_METRIC";
    pub const BATTERY_DECAY_PER_HOUR: &str = "DATA_FAKER_BATTERY_DECAY_PER_HOUR";
    pub const RECHARGE_PER_DAY: &str = "DATA_FAKER_RECHARGE_PER_DAY";
    pub const CITY_BBOX: &str = "DATA_FAKER_CITY_BBOX";
}

/// Geographic bounding box used for sensors without fixed coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lng_min: f64,
    pub lat_max: f64,
    pub lng_max: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        // Paris intra-muros
        Self {
            lat_min: 48.80,
            lng_min: 2.28,
            lat_max: 48.90,
            lng_max: 2.41,
        }
    }
}

impl BoundingBox {
    /// Parse `"latMin,lngMin,latMax,lngMax"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<f64> = raw
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [lat_min, lng_min, lat_max, lng_max]
                if parts.iter().all(|p| p.is_finite()) =>
            {
                Some(Self {
                    lat_min: *lat_min,
                    lng_min: *lng_min,
                    lat_max: *lat_max,
                    lng_max: *lng_max,
                })
            }
            _ => None,
        }
    }
}

/// Simulator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Global seed; per-sensor seeds derive from it.
    pub seed: u32,
    /// Tick interval in milliseconds.
    pub interval_ms: u64,
    /// Probability that a whole message is lost.
    pub drop_rate: f64,
    /// Probability that a single reading gets an outlier.
    pub anomaly_rate: f64,
    /// Probability per tick that a sensor gets stuck.
    pub plateau_rate: f64,
    /// Emit every metric per sensor instead of the declared one.
    pub multi_metric: bool,
    /// Battery percentage lost per hour (before the per-sensor multiplier).
    pub battery_decay_per_hour: f64,
    /// Daily probability of a full battery recharge.
    pub recharge_per_day: f64,
    /// Daily probability of a calibration event resetting drift.
    pub maintenance_per_day: f64,
    /// Daily probability that a weather scenario starts.
    pub scenario_start_per_day: f64,
    /// Daily probability that an active scenario ends early.
    pub scenario_end_per_day: f64,
    /// Fallback area for sensors without coordinates.
    pub bbox: BoundingBox,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 1337,
            interval_ms: 5000,
            drop_rate: 0.005,
            anomaly_rate: 0.003,
            plateau_rate: 0.0015,
            multi_metric: true,
            battery_decay_per_hour: 0.2,
            recharge_per_day: 0.002,
            maintenance_per_day: 0.001,
            scenario_start_per_day: 0.12,
            scenario_end_per_day: 0.06,
            bbox: BoundingBox::default(),
        }
    }
}

impl SimulatorConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `DATA_FAKER_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let anomaly_rate = parse_number(&lookup, env::ANOMALY_RATE, defaults.anomaly_rate);

        Self {
            seed: parse_number(&lookup, env::SEED, defaults.seed),
            interval_ms: parse_number(&lookup, env::INTERVAL_MS, defaults.interval_ms),
            drop_rate: parse_number(&lookup, env::DROP_RATE, defaults.drop_rate),
            anomaly_rate,
            plateau_rate: parse_number(&lookup, env::PLATEAU_RATE, anomaly_rate * 0.5),
            multi_metric: parse_bool(&lookup, env::MULTI_METRIC, defaults.multi_metric),
            battery_decay_per_hour: parse_number(
                &lookup,
                env::BATTERY_DECAY_PER_HOUR,
                defaults.battery_decay_per_hour,
            ),
            recharge_per_day: parse_number(
                &lookup,
                env::RECHARGE_PER_DAY,
                defaults.recharge_per_day,
            ),
            bbox: match lookup(env::CITY_BBOX) {
                Some(raw) => BoundingBox::parse(&raw).unwrap_or_else(|| {
                    warn!("Malformed {}={:?}, using default", env::CITY_BBOX, raw);
                    defaults.bbox
                }),
                None => defaults.bbox,
            },
            ..defaults
        }
    }

    /// Set the global seed.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Set the tick interval.
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Set the message drop rate.
    pub fn with_drop_rate(mut self, rate: f64) -> Self {
        self.drop_rate = rate;
        self
    }

    /// Set the outlier rate; the plateau rate follows at half of it.
    pub fn with_anomaly_rate(mut self, rate: f64) -> Self {
        self.anomaly_rate = rate;
        self.plateau_rate = rate * 0.5;
        self
    }

    /// Set the plateau rate independently.
    pub fn with_plateau_rate(mut self, rate: f64) -> Self {
        self.plateau_rate = rate;
        self
    }

    /// Toggle multi-metric mode.
    pub fn with_multi_metric(mut self, enabled: bool) -> Self {
        self.multi_metric = enabled;
        self
    }

    /// Set battery decay per hour.
    pub fn with_battery_decay_per_hour(mut self, decay: f64) -> Self {
        self.battery_decay_per_hour = decay;
        self
    }

    /// Set the daily recharge probability.
    pub fn with_recharge_per_day(mut self, p: f64) -> Self {
        self.recharge_per_day = p;
        self
    }

    /// Set the daily maintenance probability.
    pub fn with_maintenance_per_day(mut self, p: f64) -> Self {
        self.maintenance_per_day = p;
        self
    }

    /// Set daily start / early-end probabilities for weather scenarios.
    pub fn with_scenario_rates(mut self, start_per_day: f64, end_per_day: f64) -> Self {
        self.scenario_start_per_day = start_per_day;
        self.scenario_end_per_day = end_per_day;
        self
    }

    /// Set the fallback bounding box.
    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = bbox;
        self
    }

    /// Check ranges. Probabilities must lie in `[0, 1]` and the interval
    /// in `(0, MAX_INTERVAL_MS]`.
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(SimError::InvalidConfig(
                "interval_ms must be positive".to_string(),
            ));
        }
        if self.interval_ms > MAX_INTERVAL_MS {
            return Err(SimError::InvalidConfig(format!(
                "interval_ms must not exceed {} (one day), got {}",
                MAX_INTERVAL_MS, self.interval_ms
            )));
        }
        let probabilities = [
            ("drop_rate", self.drop_rate),
            ("anomaly_rate", self.anomaly_rate),
            ("plateau_rate", self.plateau_rate),
        ];
        for (name, p) in probabilities {
            if !(0.0..=1.0).contains(&p) {
                return Err(SimError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, p
                )));
            }
        }
        let rates = [
            ("battery_decay_per_hour", self.battery_decay_per_hour),
            ("recharge_per_day", self.recharge_per_day),
            ("maintenance_per_day", self.maintenance_per_day),
            ("scenario_start_per_day", self.scenario_start_per_day),
            ("scenario_end_per_day", self.scenario_end_per_day),
        ];
        for (name, r) in rates {
            if !r.is_finite() || r < 0.0 {
                return Err(SimError::InvalidConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, r
                )));
            }
        }
        if self.bbox.lat_min > self.bbox.lat_max || self.bbox.lng_min > self.bbox.lng_max {
            return Err(SimError::InvalidConfig(
                "bbox minimums must not exceed maximums".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Malformed {}={:?}, using default", name, raw);
            default
        }),
        _ => default,
    }
}

fn parse_bool<F>(lookup: &F, name: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => true,
        "0" | "false" | "no" | "n" | "off" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SimulatorConfig::default();
        assert_eq!(config.seed, 1337);
        assert_eq!(config.interval_ms, 5000);
        assert!(config.multi_metric);
        assert!((config.plateau_rate - config.anomaly_rate * 0.5).abs() < 1e-12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_empty_is_default() {
        let config = SimulatorConfig::from_lookup(|_| None);
        assert_eq!(config, SimulatorConfig::default());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = SimulatorConfig::from_lookup(lookup_from(&[
            (env::SEED, "42"),
            (env::INTERVAL_MS, "1000"),
            (env::DROP_RATE, "0.1"),
            (env::ANOMALY_RATE, "0.02"),
            (env::MULTI_METRIC, "off"),
            (env::CITY_BBOX, "45.0, 4.0, 46.0, 5.0"),
        ]));
        assert_eq!(config.seed, 42);
        assert_eq!(config.interval_ms, 1000);
        assert_eq!(config.drop_rate, 0.1);
        assert_eq!(config.anomaly_rate, 0.02);
        assert_eq!(config.plateau_rate, 0.01);
        assert!(!config.multi_metric);
        assert_eq!(config.bbox.lat_min, 45.0);
        assert_eq!(config.bbox.lng_max, 5.0);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let config = SimulatorConfig::from_lookup(lookup_from(&[
            (env::SEED, "not-a-number"),
            (env::INTERVAL_MS, ""),
            (env::MULTI_METRIC, "maybe"),
            (env::CITY_BBOX, "1,2,3"),
        ]));
        assert_eq!(config.seed, 1337);
        assert_eq!(config.interval_ms, 5000);
        assert!(config.multi_metric);
        assert_eq!(config.bbox, BoundingBox::default());
    }

    #[test]
    fn test_explicit_plateau_rate() {
        let config = SimulatorConfig::from_lookup(lookup_from(&[
            (env::ANOMALY_RATE, "0.2"),
            (env::PLATEAU_RATE, "0.05"),
        ]));
        assert_eq!(config.plateau_rate, 0.05);
    }

    #[test]
    fn test_bbox_parse() {
        assert!(BoundingBox::parse("48.8,2.28,48.9,2.41").is_some());
        assert!(BoundingBox::parse("48.8,2.28,abc,2.41").is_none());
        assert!(BoundingBox::parse("48.8,2.28,48.9,2.41,1").is_none());
        assert!(BoundingBox::parse("NaN,2.28,48.9,2.41").is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(SimulatorConfig::new().with_interval_ms(0).validate().is_err());
        assert!(SimulatorConfig::new().with_drop_rate(1.5).validate().is_err());
        assert!(SimulatorConfig::new()
            .with_recharge_per_day(-1.0)
            .validate()
            .is_err());
        let inverted = BoundingBox {
            lat_min: 49.0,
            lat_max: 48.0,
            ..BoundingBox::default()
        };
        assert!(matches!(
            SimulatorConfig::new().with_bbox(inverted).validate(),
            Err(SimError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_interval_fractions() {
        assert_eq!(hours(3_600_000), 1.0);
        assert!((days(3_600_000) - 1.0 / 24.0).abs() < 1e-12);
        assert_eq!(days(MAX_INTERVAL_MS), 1.0);
    }

    #[test]
    fn test_validate_caps_interval() {
        assert!(SimulatorConfig::new()
            .with_interval_ms(MAX_INTERVAL_MS)
            .validate()
            .is_ok());
        assert!(matches!(
            SimulatorConfig::new()
                .with_interval_ms(MAX_INTERVAL_MS + 1)
                .validate(),
            Err(SimError::InvalidConfig(_))
        ));
        assert!(SimulatorConfig::new()
            .with_interval_ms(100_000_000_000_000_000)
            .validate()
            .is_err());
    }
}
