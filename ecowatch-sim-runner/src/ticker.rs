// EcoWatch Simulator Runner - Tick scheduler
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Periodic tick loop.
//!
//! The ticker runs one simulation tick immediately, then one per configured
//! interval, and hands every payload to the publisher. Publish failures are
//! logged and counted but never stop the loop.

use crate::metrics::{
    record_publish_error, record_published, record_tick, update_simulation_metrics,
};
use chrono::Utc;
use ecowatch_sim::{DataSimulator, Publisher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for the tick loop.
#[derive(Debug, Clone)]
pub struct TickerConfig {
    /// Delay between ticks in milliseconds.
    pub interval_ms: u64,
    /// Stop after this many ticks; run until shutdown when `None`.
    pub max_ticks: Option<u64>,
}

/// Counters shared with the HTTP handlers.
#[derive(Debug, Default)]
pub struct TickerState {
    /// Ticks executed.
    pub ticks: AtomicU64,
    /// Payloads accepted by the publisher.
    pub payloads_published: AtomicU64,
    /// Readings inside accepted payloads.
    pub readings_published: AtomicU64,
    /// Payloads the publisher refused.
    pub publish_errors: AtomicU64,
    /// Whether the loop is running.
    pub running: AtomicBool,
}

/// Drives a shared simulator and publishes its output.
pub struct Ticker<P: Publisher> {
    config: TickerConfig,
    state: Arc<TickerState>,
    simulator: Arc<RwLock<DataSimulator>>,
    publisher: P,
}

impl<P: Publisher> Ticker<P> {
    pub fn new(config: TickerConfig, simulator: Arc<RwLock<DataSimulator>>, publisher: P) -> Self {
        Self {
            config,
            state: Arc::new(TickerState::default()),
            simulator,
            publisher,
        }
    }

    /// Get the shared counters.
    pub fn state(&self) -> Arc<TickerState> {
        Arc::clone(&self.state)
    }

    /// Run until `max_ticks` is reached or `shutdown` fires.
    ///
    /// The publisher is closed and handed back on exit.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> P {
        self.state.running.store(true, Ordering::SeqCst);
        info!(
            "Starting tick loop: interval={}ms, max_ticks={:?}",
            self.config.interval_ms, self.config.max_ticks
        );

        let mut ticks = interval(Duration::from_millis(self.config.interval_ms.max(1)));
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if let Some(max) = self.config.max_ticks {
                if self.state.ticks.load(Ordering::SeqCst) >= max {
                    info!("Reached {} ticks, stopping", max);
                    break;
                }
            }

            tokio::select! {
                _ = ticks.tick() => {}
                _ = shutdown.changed() => {
                    info!("Shutdown requested, stopping tick loop");
                    break;
                }
            }

            self.tick().await;
        }

        self.state.running.store(false, Ordering::SeqCst);
        if let Err(e) = self.publisher.close() {
            warn!("Failed to close publisher: {}", e);
        }
        self.publisher
    }

    /// Generate and publish one tick.
    async fn tick(&mut self) {
        let payloads = {
            let mut sim = self.simulator.write().await;
            let now = Utc::now();
            let payloads = sim.generate_all_active_sensors(now);
            update_simulation_metrics(&sim, now);
            payloads
        };

        let tick = self.state.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        record_tick();

        let mut published = 0;
        for payload in &payloads {
            match self.publisher.publish(payload) {
                Ok(()) => {
                    published += 1;
                    let readings = payload.readings.len();
                    self.state.payloads_published.fetch_add(1, Ordering::SeqCst);
                    self.state
                        .readings_published
                        .fetch_add(readings as u64, Ordering::SeqCst);
                    record_published(readings);
                }
                Err(e) => {
                    warn!("Failed to publish data for sensor {}: {}", payload.sensor_id, e);
                    self.state.publish_errors.fetch_add(1, Ordering::SeqCst);
                    record_publish_error();
                }
            }
        }
        if let Err(e) = self.publisher.flush() {
            warn!("Failed to flush publisher: {}", e);
        }

        debug!(
            "Tick {}: published {}/{} payloads",
            tick,
            published,
            payloads.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecowatch_sim::{MemoryDirectory, MemoryPublisher, SimulatorConfig};

    fn simulator() -> Arc<RwLock<DataSimulator>> {
        let config = SimulatorConfig::default().with_drop_rate(0.0);
        let mut sim = DataSimulator::new(config);
        sim.initialize(&mut MemoryDirectory::new(), Utc::now()).unwrap();
        Arc::new(RwLock::new(sim))
    }

    fn config(max_ticks: u64) -> TickerConfig {
        TickerConfig {
            interval_ms: 5,
            max_ticks: Some(max_ticks),
        }
    }

    #[tokio::test]
    async fn test_runs_requested_ticks() {
        let (_tx, rx) = watch::channel(false);
        let ticker = Ticker::new(config(3), simulator(), MemoryPublisher::new());
        let state = ticker.state();

        let publisher = ticker.run(rx).await;
        assert_eq!(state.ticks.load(Ordering::SeqCst), 3);
        assert!(!state.running.load(Ordering::SeqCst));
        assert!(!publisher.is_open());

        let published = state.payloads_published.load(Ordering::SeqCst);
        assert_eq!(publisher.pending() as u64, published);
        assert!(published >= 12);
    }

    #[tokio::test]
    async fn test_publish_errors_are_not_fatal() {
        let (_tx, rx) = watch::channel(false);
        let ticker = Ticker::new(config(3), simulator(), MemoryPublisher::with_buffer_size(2));
        let state = ticker.state();

        ticker.run(rx).await;
        assert_eq!(state.ticks.load(Ordering::SeqCst), 3);
        assert_eq!(state.payloads_published.load(Ordering::SeqCst), 2);
        assert!(state.publish_errors.load(Ordering::SeqCst) >= 10);
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let (tx, rx) = watch::channel(false);
        let ticker = Ticker::new(
            TickerConfig {
                interval_ms: 10,
                max_ticks: None,
            },
            simulator(),
            MemoryPublisher::new(),
        );
        let state = ticker.state();
        let handle = tokio::spawn(ticker.run(rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        let publisher = handle.await.unwrap();

        assert!(state.ticks.load(Ordering::SeqCst) >= 1);
        assert!(!publisher.is_open());
    }
}
