// EcoWatch Simulator - Publisher sinks
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Publisher abstraction
//!
//! A [`Publisher`] receives one [`SensorPayload`] per sensor per tick.
//! Delivery guarantees belong to the transport behind it; the sinks here
//! cover tests ([`MemoryPublisher`]) and file or stdout output
//! ([`JsonLinesPublisher`], [`CsvPublisher`]).

use crate::error::{Result, SimError};
use crate::payload::SensorPayload;
use serde::Serialize;
use std::collections::VecDeque;
use std::io::Write;

/// Topic a sensor publishes on.
pub fn topic_for(sensor_id: &str) -> String {
    format!("ecowatch/sensors/{}/data", sensor_id)
}

/// Statistics about publisher usage
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublisherMetrics {
    /// Payloads accepted
    pub payloads_published: u64,
    /// Readings inside accepted payloads
    pub readings_published: u64,
    /// Payloads refused
    pub errors: u64,
}

impl PublisherMetrics {
    fn record(&mut self, payload: &SensorPayload) {
        self.payloads_published += 1;
        self.readings_published += payload.readings.len() as u64;
    }
}

/// Trait for payload sinks
pub trait Publisher {
    /// Publish one payload
    fn publish(&mut self, payload: &SensorPayload) -> Result<()>;

    /// Publish a batch, stopping at the first failure.
    ///
    /// Returns the number of payloads published.
    fn publish_all(&mut self, payloads: &[SensorPayload]) -> Result<usize> {
        for payload in payloads {
            self.publish(payload)?;
        }
        Ok(payloads.len())
    }

    /// Flush buffered output
    fn flush(&mut self) -> Result<()>;

    /// Flush and refuse further payloads
    fn close(&mut self) -> Result<()>;

    /// Get publisher metrics
    fn metrics(&self) -> PublisherMetrics;
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn publish(&mut self, payload: &SensorPayload) -> Result<()> {
        (**self).publish(payload)
    }

    fn publish_all(&mut self, payloads: &[SensorPayload]) -> Result<usize> {
        (**self).publish_all(payloads)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn metrics(&self) -> PublisherMetrics {
        (**self).metrics()
    }
}

fn closed_error(payload: &SensorPayload) -> SimError {
    SimError::Publish {
        topic: topic_for(&payload.sensor_id),
        reason: "publisher is closed".to_string(),
    }
}

/// Published message kept by [`MemoryPublisher`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: SensorPayload,
}

/// In-memory publisher for tests and local wiring
#[derive(Debug)]
pub struct MemoryPublisher {
    messages: VecDeque<PublishedMessage>,
    max_buffer_size: usize,
    is_open: bool,
    metrics: PublisherMetrics,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::with_buffer_size(10_000)
    }

    /// Create with a bounded buffer; publishing into a full buffer fails
    pub fn with_buffer_size(max_size: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_buffer_size: max_size,
            is_open: true,
            metrics: PublisherMetrics::default(),
        }
    }

    /// Take the oldest message
    pub fn pop(&mut self) -> Option<PublishedMessage> {
        self.messages.pop_front()
    }

    pub fn messages(&self) -> impl Iterator<Item = &PublishedMessage> {
        self.messages.iter()
    }

    pub fn pending(&self) -> usize {
        self.messages.len()
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }
}

impl Default for MemoryPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher for MemoryPublisher {
    fn publish(&mut self, payload: &SensorPayload) -> Result<()> {
        if !self.is_open {
            self.metrics.errors += 1;
            return Err(closed_error(payload));
        }
        if self.messages.len() >= self.max_buffer_size {
            self.metrics.errors += 1;
            return Err(SimError::Publish {
                topic: topic_for(&payload.sensor_id),
                reason: "buffer full".to_string(),
            });
        }
        self.messages.push_back(PublishedMessage {
            topic: topic_for(&payload.sensor_id),
            payload: payload.clone(),
        });
        self.metrics.record(payload);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.is_open = false;
        Ok(())
    }

    fn metrics(&self) -> PublisherMetrics {
        self.metrics.clone()
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    topic: String,
    payload: &'a SensorPayload,
}

/// Writes one `{"topic": ..., "payload": ...}` JSON object per line
#[derive(Debug)]
pub struct JsonLinesPublisher<W: Write> {
    writer: W,
    is_open: bool,
    metrics: PublisherMetrics,
}

impl<W: Write> JsonLinesPublisher<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            is_open: true,
            metrics: PublisherMetrics::default(),
        }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Publisher for JsonLinesPublisher<W> {
    fn publish(&mut self, payload: &SensorPayload) -> Result<()> {
        if !self.is_open {
            self.metrics.errors += 1;
            return Err(closed_error(payload));
        }
        let envelope = Envelope {
            topic: topic_for(&payload.sensor_id),
            payload,
        };
        let line = serde_json::to_string(&envelope)?;
        if let Err(e) = writeln!(self.writer, "{}", line) {
            self.metrics.errors += 1;
            return Err(e.into());
        }
        self.metrics.record(payload);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.is_open {
            self.writer.flush()?;
            self.is_open = false;
        }
        Ok(())
    }

    fn metrics(&self) -> PublisherMetrics {
        self.metrics.clone()
    }
}

/// One CSV row per reading.
#[derive(Serialize)]
struct CsvRow<'a> {
    sensor_id: &'a str,
    reading_id: &'a str,
    metric: &'static str,
    value: f64,
    unit: &'a str,
    timestamp: String,
    lat: f64,
    lng: f64,
    location_name: Option<&'a str>,
    battery_level: Option<u8>,
    accuracy: Option<u8>,
    reading_interval_ms: Option<u64>,
    device_id: &'a str,
}

/// Flattens payloads into CSV, one row per reading
pub struct CsvPublisher<W: Write> {
    writer: csv::Writer<W>,
    is_open: bool,
    metrics: PublisherMetrics,
}

impl<W: Write> CsvPublisher<W> {
    /// Create a CSV publisher; the header row is written with the first reading
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
            is_open: true,
            metrics: PublisherMetrics::default(),
        }
    }

    /// Flush and recover the underlying writer
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| SimError::Io(e.into_error()))
    }
}

impl<W: Write> Publisher for CsvPublisher<W> {
    fn publish(&mut self, payload: &SensorPayload) -> Result<()> {
        if !self.is_open {
            self.metrics.errors += 1;
            return Err(closed_error(payload));
        }
        for reading in &payload.readings {
            let row = CsvRow {
                sensor_id: &payload.sensor_id,
                reading_id: &reading.id,
                metric: reading.metric.name(),
                value: reading.value,
                unit: &reading.unit,
                timestamp: reading
                    .timestamp
                    .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                lat: reading.location.lat,
                lng: reading.location.lng,
                location_name: reading.location.name.as_deref(),
                battery_level: reading.battery_level,
                accuracy: reading.metadata.as_ref().map(|m| m.accuracy),
                reading_interval_ms: reading.metadata.as_ref().map(|m| m.reading_interval),
                device_id: &payload.device_info.id,
            };
            if let Err(e) = self.writer.serialize(row) {
                self.metrics.errors += 1;
                return Err(e.into());
            }
        }
        self.metrics.record(payload);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.is_open {
            self.writer.flush()?;
            self.is_open = false;
        }
        Ok(())
    }

    fn metrics(&self) -> PublisherMetrics {
        self.metrics.clone()
    }
}
