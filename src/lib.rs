//! # EcoWatch Simulator
//!
//! Deterministic synthetic environmental sensor data for the EcoWatch
//! platform.
//!
//! ## Key Features
//!
//! - **Reproducible**: one global seed drives a Mulberry32 stream per sensor
//! - **Physically plausible**: seasonal and diurnal temperature, correlated
//!   humidity, rush-hour air quality, slow soil and water processes
//! - **Weather regimes**: rain, heatwave and cold-dry spells shared by all sensors
//! - **Realistic faults**: dropped messages, outliers, stuck sensors,
//!   calibration events and battery drain
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use ecowatch_sim::{DataSimulator, MemoryDirectory, Metric, SimulatorConfig};
//!
//! let config = SimulatorConfig::default()
//!     .with_drop_rate(0.0)
//!     .with_anomaly_rate(0.0);
//! let mut sim = DataSimulator::new(config);
//!
//! let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
//! sim.initialize(&mut MemoryDirectory::new(), now).unwrap();
//!
//! for payload in sim.generate_all_active_sensors(now) {
//!     let temp = payload.reading(Metric::Temperature).unwrap();
//!     assert!((-10.0..=40.0).contains(&temp.value));
//! }
//! ```
//!
//! ## Modules
//!
//! - [`rng`]: Seeded pseudo-random generator
//! - [`config`]: Simulator configuration
//! - [`sensor`]: Sensor and organization descriptors
//! - [`payload`]: Readings and wire payloads
//! - [`state`]: Per-sensor simulation state
//! - [`weather`]: Global weather scenarios
//! - [`generators`]: Physical quantity generators
//! - [`anomalies`]: Simulated faults
//! - [`simulator`]: Simulation driver
//! - [`directory`]: Sensor directory collaborator
//! - [`publisher`]: Payload sinks

// Modules
pub mod anomalies;
pub mod config;
pub mod directory;
pub mod error;
pub mod generators;
pub mod payload;
pub mod publisher;
pub mod rng;
pub mod sensor;
pub mod simulator;
pub mod state;
pub mod weather;

// Re-exports for convenient access
pub use config::{BoundingBox, SimulatorConfig};
pub use directory::{test_fleet, JsonFileDirectory, MemoryDirectory, SensorDirectory};
pub use error::{Result, SimError};
pub use payload::{
    DeviceInfo, Metric, ReadingLocation, ReadingMetadata, SensorPayload, SensorReading,
    TickOutcome,
};
pub use publisher::{
    topic_for, CsvPublisher, JsonLinesPublisher, MemoryPublisher, Publisher, PublisherMetrics,
};
pub use rng::SeededRng;
pub use sensor::{BucketSyncStatus, Organization, SensorDescriptor, SensorInfo, SensorType};
pub use simulator::DataSimulator;
pub use state::{GeoLocation, SensorSimState};
pub use weather::{ScenarioInfluence, ScenarioKind, WeatherScenario};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
