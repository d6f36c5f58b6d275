// EcoWatch Simulator Runner - Scheduler and diagnostics server
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # EcoWatch Simulator Runner
//!
//! Ticks the simulator on a fixed interval, publishes the payloads and
//! serves diagnostics over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! # JSON lines on stdout, every 5 s
//! ecowatch-sim-runner --directory sensors.json
//!
//! # CSV file, 100 ticks, custom seed
//! ecowatch-sim-runner --output csv --csv-path readings.csv --ticks 100 --seed 42
//! ```

mod metrics;
mod ticker;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use ecowatch_sim::{
    CsvPublisher, DataSimulator, JsonFileDirectory, JsonLinesPublisher, Publisher, SensorInfo,
    SimError, SimulatorConfig, WeatherScenario,
};
use metrics::encode_metrics;
use serde::Serialize;
use std::io::BufWriter;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use thiserror::Error;
use ticker::{Ticker, TickerConfig, TickerState};
use tokio::net::TcpListener;
use tokio::sync::{watch, RwLock};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// Where payloads go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputKind {
    /// One JSON object per line on stdout
    Stdout,
    /// One CSV row per reading
    Csv,
}

/// EcoWatch sensor data simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Sensor directory JSON file (seeded with a test fleet if missing)
    #[arg(short, long, default_value = "sensors.json")]
    directory: PathBuf,

    /// Output sink
    #[arg(short, long, value_enum, default_value = "stdout")]
    output: OutputKind,

    /// CSV file path when --output csv
    #[arg(long, default_value = "readings.csv")]
    csv_path: PathBuf,

    /// Port of the diagnostics server
    #[arg(short, long, default_value = "9464")]
    port: u16,

    /// Tick interval in milliseconds (overrides DATA_FAKER_INTERVAL_MS)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Global seed (overrides DATA_FAKER_SEED)
    #[arg(long)]
    seed: Option<u32>,

    /// Stop after this many ticks
    #[arg(long)]
    ticks: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Fatal startup errors.
#[derive(Debug, Error)]
enum RunnerError {
    #[error(transparent)]
    Sim(#[from] SimError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No active sensors found in {0}")]
    NoSensors(String),
}

/// Application state shared across handlers.
struct AppState {
    simulator: Arc<RwLock<DataSimulator>>,
    ticker_state: Arc<TickerState>,
    start_time: std::time::Instant,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing; stdout is reserved for payloads
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("EcoWatch Simulator v{}", ecowatch_sim::VERSION);

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), RunnerError> {
    let config = build_config(&args, SimulatorConfig::from_env());
    config.validate()?;
    info!(
        "Config: seed={}, interval={}ms, drop_rate={}, anomaly_rate={}, multi_metric={}",
        config.seed, config.interval_ms, config.drop_rate, config.anomaly_rate, config.multi_metric
    );

    let mut directory = JsonFileDirectory::new(&args.directory);
    let mut simulator = DataSimulator::new(config.clone());
    let count = simulator.initialize(&mut directory, Utc::now())?;
    if count == 0 {
        return Err(RunnerError::NoSensors(args.directory.display().to_string()));
    }

    let publisher = build_publisher(args.output, &args.csv_path)?;
    let simulator = Arc::new(RwLock::new(simulator));
    let ticker = Ticker::new(
        TickerConfig {
            interval_ms: config.interval_ms,
            max_ticks: args.ticks,
        },
        Arc::clone(&simulator),
        publisher,
    );

    let state = Arc::new(AppState {
        simulator,
        ticker_state: ticker.state(),
        start_time: std::time::Instant::now(),
    });

    // Build router
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/status", get(status_handler))
        .route("/sensors", get(sensors_handler))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Diagnostics on http://{}", addr);
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Diagnostics server failed: {}", e);
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C");
            let _ = shutdown_tx.send(true);
        }
    });

    ticker.run(shutdown_rx).await;
    server.abort();
    info!("Simulator stopped");
    Ok(())
}

/// Apply CLI overrides on top of the environment.
fn build_config(args: &Args, mut config: SimulatorConfig) -> SimulatorConfig {
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(interval_ms) = args.interval_ms {
        config = config.with_interval_ms(interval_ms);
    }
    config
}

fn build_publisher(
    output: OutputKind,
    csv_path: &Path,
) -> Result<Box<dyn Publisher + Send>, RunnerError> {
    let publisher: Box<dyn Publisher + Send> = match output {
        OutputKind::Stdout => Box::new(JsonLinesPublisher::new(std::io::stdout())),
        OutputKind::Csv => {
            let file = std::fs::File::create(csv_path)?;
            info!("Writing readings to {}", csv_path.display());
            Box::new(CsvPublisher::new(BufWriter::new(file)))
        }
    };
    Ok(publisher)
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler() -> impl IntoResponse {
    let metrics = encode_metrics();
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        metrics,
    )
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness check handler.
async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.ticker_state.running.load(Ordering::SeqCst) {
        (StatusCode::OK, "Ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Not running")
    }
}

/// Status information response.
#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    ticks: u64,
    payloads_published: u64,
    readings_published: u64,
    publish_errors: u64,
    active_sensors: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    weather: Option<WeatherScenario>,
}

/// Status handler - returns JSON status information.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (active_sensors, weather) = {
        let sim = state.simulator.read().await;
        (sim.sensors().len(), sim.scenario_at(Utc::now()).copied())
    };
    let counters = &state.ticker_state;

    Json(StatusResponse {
        version: ecowatch_sim::VERSION.to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        ticks: counters.ticks.load(Ordering::SeqCst),
        payloads_published: counters.payloads_published.load(Ordering::SeqCst),
        readings_published: counters.readings_published.load(Ordering::SeqCst),
        publish_errors: counters.publish_errors.load(Ordering::SeqCst),
        active_sensors,
        weather,
    })
}

/// Sensor directory handler.
async fn sensors_handler(State(state): State<Arc<AppState>>) -> Json<Vec<SensorInfo>> {
    Json(state.simulator.read().await.sensors_info())
}
