//! Navigation node.
//!
//! Loads a parameter file, builds the navigation stack and drives a simulated
//! robot to the configured goal. A sensor thread publishes the configured
//! obstacles as messages of the configured type.
//!
//! ```bash
//! cargo run --bin navigate -- params/navigate.toml
//! RUST_LOG=rust_navigation=debug cargo run --bin navigate -- params/navigate.toml
//! ```

use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rust_navigation::adapters::{
    encode_laser_scan, encode_polygon_array, simulate_scan, Clock, KinematicSim, RawMessage, SensorIngest,
    SystemClock,
};
use rust_navigation::app::NavigationApp;
use rust_navigation::commander::CommanderState;
use rust_navigation::config::{NavigationConfig, SimulationConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn spawn_sensor(
    sim: KinematicSim,
    ingest: SensorIngest,
    world: SimulationConfig,
    running: Arc<AtomicBool>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new().name("sensor".into()).spawn(move || {
        let period = Duration::from_secs_f64(1.0 / world.publish_rate_hz);
        let polygons = world.polygons();
        let type_name = ingest.message_type().name;
        while running.load(Ordering::Relaxed) {
            let payload = match ingest.message_type().observation_kind {
                "scan" => encode_laser_scan(&simulate_scan(&sim.state(), &polygons, world.scan_beams, world.scan_range)),
                _ => encode_polygon_array(&polygons),
            };
            ingest.ingest(&RawMessage::new(type_name, payload));
            thread::sleep(period);
        }
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rust_navigation=info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(params) = args.get(1) else {
        eprintln!("usage: navigate <params.toml>");
        return ExitCode::from(2);
    };

    info!("Loading parameters from {}", params);
    let config = match NavigationConfig::load(Path::new(params)) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };
    let start = match config.start() {
        Ok(start) => start,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let period = config.control_loop_config().period();
    let sim = KinematicSim::new(start, Arc::clone(&clock), period);

    let mut app = match NavigationApp::build(&config, Box::new(sim.clone()), Arc::clone(&clock)) {
        Ok(app) => app,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let sensor = match spawn_sensor(sim.clone(), app.ingest(), config.simulation(), Arc::clone(&running)) {
        Ok(handle) => handle,
        Err(e) => {
            error!("failed to start sensor thread: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let final_state = match app.start_task() {
        Ok(task) => {
            info!(task, "navigating to {:?}", app.goal().state.position);
            app.run(&sim, &running)
        }
        Err(e) => {
            error!("{}", e);
            CommanderState::Failed
        }
    };

    running.store(false, Ordering::Relaxed);
    if sensor.join().is_err() {
        warn!("sensor thread panicked");
    }
    let status = app.handle().status();
    app.shutdown();

    let position = sim.state().position;
    info!(
        state = ?final_state,
        attempts = status.planning_attempts,
        controller_faults = status.controller_faults,
        dropped_observations = status.dropped_observations,
        "finished at ({:.2}, {:.2})",
        position.x,
        position.y
    );

    if final_state == CommanderState::Succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
