//! Affinity Harness - main entry point
//!
//! Encodes leaf selections into affinity masks and verifies a driver's
//! handling of them by running a probe process per scenario.

mod config;

use affinity_core::{encode_forest, expected_count, DeviceForest, MaskEnumerator};
use affinity_verify::{build_scenarios, run_scenarios, ChildVerifier, RunReport};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "affinity")]
#[command(about = "Hierarchical affinity mask encoder and driver verification harness")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "affinity.toml")]
    config: PathBuf,

    /// Topology file (overrides the configured path)
    #[arg(short, long)]
    topology: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode one leaf selection bitmask (decimal, 0x or 0b)
    Encode {
        /// Leaf selection, e.g. `5`, `0x1f` or `0b0110`
        #[arg(short, long)]
        mask: String,
    },
    /// Print the encoding of every leaf selection
    Enumerate,
    /// Run every scenario against the probe
    Verify {
        /// Driver identity passed to the probe
        #[arg(short, long)]
        driver: Option<String>,

        /// Write a JSON report to this path
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Skip the hand-picked literal masks
        #[arg(long)]
        no_literals: bool,

        /// Skip the device hierarchy scenarios
        #[arg(long)]
        no_hierarchy: bool,
    },
    /// Write a default configuration file to the config path
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Init => {
            if args.config.exists() {
                bail!("{} already exists", args.config.display());
            }
            config::save_default_config(&args.config)?;
            info!(path = %args.config.display(), "Wrote default configuration");
        }
        Command::Encode { mask } => {
            let (_, forest) = load(&args.config, args.topology)?;
            let mask = parse_bitmask(&mask)?;
            let leaves = forest.leaf_count();
            if leaves < 64 && mask >> leaves != 0 {
                bail!("Mask {:#b} selects more than the {} leaf devices", mask, leaves);
            }
            let encoded = encode_forest(&forest, mask);
            println!("mask:     {:#b}", mask);
            println!("selector: {:?}", encoded.as_str());
            println!("expected: {}", expected_count(mask, leaves));
        }
        Command::Enumerate => {
            let (config, forest) = load(&args.config, args.topology)?;
            let enumerator = MaskEnumerator::new(&forest, config.enumeration.max_leaves)?;
            let width = enumerator.leaf_count();
            for case in enumerator {
                println!(
                    "{:0width$b}  {:<24}  {}",
                    case.mask,
                    format!("{:?}", case.mask_string.as_str()),
                    case.expected,
                    width = width
                );
            }
        }
        Command::Verify {
            driver,
            report,
            no_literals,
            no_hierarchy,
        } => {
            let (config, forest) = load(&args.config, args.topology)?;
            let mut options = config.to_scenario_options();
            if no_literals {
                options.literals = false;
            }
            if no_hierarchy {
                options.hierarchies.clear();
            }

            let driver = driver
                .or_else(|| config.topology.driver.clone())
                .or_else(|| forest.driver.clone())
                .unwrap_or_else(|| "default".to_string());

            let scenarios = build_scenarios(&forest, &options)?;
            let verifier = ChildVerifier::new(config.to_probe_command());
            let run = run_scenarios(&verifier, scenarios, &driver).await;

            print_summary(&run);
            if let Some(path) = report {
                std::fs::write(&path, run.to_json()?)
                    .with_context(|| format!("Failed to write report {}", path.display()))?;
                info!(path = %path.display(), "Wrote report");
            }

            if !run.is_success() {
                bail!(
                    "{} of {} scenarios failed",
                    run.failed(),
                    run.outcomes.len()
                );
            }
        }
    }

    Ok(())
}

/// Load configuration and the topology it points at
fn load(config_path: &Path, topology: Option<PathBuf>) -> Result<(config::Config, DeviceForest)> {
    let mut config = config::load_config(config_path)?;
    if let Some(topology) = topology {
        config.topology.path = topology;
    }

    let path = &config.topology.path;
    let forest = DeviceForest::from_file(path)
        .with_context(|| format!("Failed to load topology {}", path.display()))?;
    info!(
        path = %path.display(),
        roots = forest.root_count(),
        leaves = forest.leaf_count(),
        "Topology loaded"
    );
    Ok((config, forest))
}

/// Parse a bitmask given as decimal, `0x` hex or `0b` binary
fn parse_bitmask(text: &str) -> Result<u64> {
    let text = text.trim().replace('_', "");
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2)
    } else {
        text.parse::<u64>()
    };
    parsed.with_context(|| format!("Invalid mask {:?}", text))
}

fn print_summary(run: &RunReport) {
    println!(
        "Driver {}: {} scenarios, {} passed, {} failed",
        run.driver,
        run.outcomes.len(),
        run.passed(),
        run.failed()
    );
    for outcome in run.failures() {
        let env: Vec<_> = outcome
            .scenario
            .env
            .iter()
            .map(|(k, v)| format!("{}={:?}", k, v))
            .collect();
        println!(
            "  - {} [{}]: {}",
            outcome.scenario.name,
            env.join(" "),
            outcome.verdict
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bitmask() {
        assert_eq!(parse_bitmask("5").unwrap(), 5);
        assert_eq!(parse_bitmask("0x1f").unwrap(), 31);
        assert_eq!(parse_bitmask("0b10").unwrap(), 2);
        assert_eq!(parse_bitmask("0b1111_0000").unwrap(), 240);
        assert!(parse_bitmask("0b102").is_err());
        assert!(parse_bitmask("all").is_err());
    }
}
