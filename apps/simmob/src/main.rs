//! `simmob <config-file>` — run the microscopic driving core.
//!
//! The JSON config file names the network and demand inputs and carries the
//! scheduler configuration plus optional model-parameter overrides:
//!
//! ```json
//! {
//!   "sim": { "base_gran_ms": 100, "total_ticks": 36000, "seed": 42 },
//!   "network_csv": "network.csv",
//!   "trips_csv": "trips.csv",
//!   "trajectory_csv": "trajectories.csv",
//!   "parameters": { "max_acc_car1": "2.0 2.0 2.0 2.0 2.0" }
//! }
//! ```
//!
//! Exit code 0 on success, 1 on any configuration or load error.

mod network_csv;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};

use ms_core::{ParameterManager, SimConfig, Tick};
use ms_network::NetworkLoader;
use ms_output::{CsvWriter, TrajectoryObserver};
use ms_sim::{load_trips_csv, Scheduler, SimBuilder, SimObserver};

use network_csv::CsvNetworkLoader;

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(serde::Deserialize)]
struct AppConfig {
    sim: SimConfig,
    network_csv: PathBuf,
    trips_csv: PathBuf,
    #[serde(default)]
    trajectory_csv: Option<PathBuf>,
    #[serde(default)]
    parameters: HashMap<String, String>,
}

// ── Progress reporting ────────────────────────────────────────────────────────

struct Progress {
    every: u64,
}

impl SimObserver for Progress {
    fn on_tick_end(&mut self, tick: Tick, active: usize) {
        if self.every > 0 && tick.0.is_multiple_of(self.every) {
            log::info!("tick {tick}: {active} active drivers");
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("simmob: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(config_path) = args.next() else {
        bail!("usage: simmob <config-file> [mpi]");
    };
    if let Some(flag) = args.next() {
        if flag == "mpi" {
            bail!("mpi partitioning is not supported by this build");
        }
        bail!("unknown argument {flag:?}");
    }

    let config_path = PathBuf::from(config_path);
    let app: AppConfig = serde_json::from_reader(
        std::fs::File::open(&config_path)
            .with_context(|| format!("opening {}", config_path.display()))?,
    )
    .with_context(|| format!("parsing {}", config_path.display()))?;
    app.sim.validate().context("validating configuration")?;

    // Input paths are relative to the config file.
    let base = config_path.parent().unwrap_or(Path::new("."));
    let network_path = base.join(&app.network_csv);
    let trips_path = base.join(&app.trips_csv);

    let load_start = Instant::now();
    let network = CsvNetworkLoader::new(&network_path)
        .load()
        .with_context(|| format!("loading network {}", network_path.display()))?;
    log::info!(
        "network: {} nodes, {} links, {} segments, {} lanes ({:.1?})",
        network.node_count(),
        network.link_count(),
        network.segment_count(),
        network.lane_count(),
        load_start.elapsed(),
    );

    let trips =
        load_trips_csv(&trips_path).with_context(|| format!("loading {}", trips_path.display()))?;
    log::info!("demand: {} trips", trips.len());

    let mut pm = ParameterManager::with_defaults();
    for (name, value) in &app.parameters {
        pm.set(name, value);
    }

    let total_ticks = app.sim.total_ticks;
    let mut sim = SimBuilder::new(app.sim, network)
        .params(pm)
        .trips(trips)
        .build()
        .context("building simulation")?;

    let run_start = Instant::now();
    match &app.trajectory_csv {
        Some(out) => {
            let out_path = base.join(out);
            let writer = CsvWriter::create(&out_path)
                .with_context(|| format!("creating {}", out_path.display()))?;
            let mut observer = TrajectoryObserver::new(writer);
            sim.run(&mut observer)?;
            let rows = observer.rows_written();
            observer.finish().context("flushing trajectory output")?;
            log::info!("wrote {rows} trajectory rows to {}", out_path.display());
        }
        None => {
            let mut observer = Progress {
                every: (total_ticks / 10).max(1),
            };
            sim.run(&mut observer)?;
        }
    }

    print_summary(&sim, run_start);
    Ok(())
}

fn print_summary(sim: &Scheduler, run_start: Instant) {
    let stats = sim.stats;
    println!(
        "simulated {} ticks in {:.2?}",
        sim.clock.current_tick.0,
        run_start.elapsed()
    );
    println!(
        "drivers: {} dispatched, {} completed, {} still active, {} unroutable",
        stats.dispatched,
        stats.completed,
        sim.active_count(),
        stats.dropped_no_path,
    );
}
