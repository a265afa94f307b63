//! Affinity Probe - reference child process for the verification harness
//!
//! Plays the role of a driver-backed probe: loads a topology file, applies
//! the affinity mask and hierarchy mode from its environment, and prints a
//! single `<code>:<count>` status line on stdout. On failure it prints
//! `1:0` followed by one diagnostic line. Logs go to stderr so stdout only
//! carries the status protocol.

use affinity_core::{
    visible_leaves, DeviceForest, DeviceHierarchy, AFFINITY_MASK_ENV, HIERARCHY_ENV,
};
use affinity_verify::StatusLine;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "affinity-probe")]
#[command(about = "Report how many devices are visible under the current affinity mask")]
#[command(version)]
struct Args {
    /// Topology file describing the driver's devices
    #[arg(short, long)]
    topology: PathBuf,

    /// Log level for stderr output (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Identity of the driver to report on
    driver: String,
}

fn main() {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    // Probe output must stay usable even without a logger
    let _ = tracing::subscriber::set_global_default(subscriber);

    let mask = std::env::var(AFFINITY_MASK_ENV).ok();
    let hierarchy = std::env::var(HIERARCHY_ENV).ok();

    match count_devices(&args.topology, &args.driver, mask.as_deref(), hierarchy.as_deref()) {
        Ok(count) => {
            println!("{}", StatusLine::success(count));
        }
        Err(e) => {
            println!("{}", StatusLine::failure());
            println!("{:#}", e);
            std::process::exit(1);
        }
    }
}

/// Number of top-level devices visible for `driver` under the given environment
fn count_devices(
    topology: &Path,
    driver: &str,
    mask: Option<&str>,
    hierarchy: Option<&str>,
) -> Result<usize> {
    let forest = DeviceForest::from_file(topology)
        .with_context(|| format!("Failed to load topology {}", topology.display()))?;

    if let Some(known) = &forest.driver {
        if known != driver {
            bail!("No driver matching {} (topology is for {})", driver, known);
        }
    }

    let hierarchy = match hierarchy.map(str::trim) {
        None | Some("") => DeviceHierarchy::Flat,
        Some(value) => value.parse::<DeviceHierarchy>()?,
    };

    let mask = mask.unwrap_or_default();
    let visible = visible_leaves(&forest, mask)
        .with_context(|| format!("Invalid affinity mask {:?}", mask))?;
    let count = hierarchy.visible_count(&forest, &visible);

    debug!(
        driver = %driver,
        mask = %mask,
        hierarchy = %hierarchy,
        visible_leaves = visible.len(),
        count,
        "Counted visible devices"
    );
    Ok(count)
}
