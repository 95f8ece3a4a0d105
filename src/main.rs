//! Capsim - capacitive-node circuit simulator
//!
//! # Usage
//!
//! ```bash
//! capsim circuit.net --ts-max 50n --duration 10m -vv
//! ```

use std::path::PathBuf;

use clap::Parser;
use log::{info, LevelFilter};
use capsim_core::{
    components::Registry,
    dsl,
    error::Result,
    solver::{DEFAULT_TIME_STEP_MAX, DEFAULT_VOLTAGE_DIFFERENCE_MAX},
    Session, SimulatorConfig,
};

/// Capacitive-node circuit simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the netlist script
    #[arg(value_name = "NETLIST", required_unless_present = "help_model")]
    netlist: Option<PathBuf>,

    /// Default maximum voltage change of a node per step (volts)
    #[arg(long, value_parser = parse_si, default_value_t = DEFAULT_VOLTAGE_DIFFERENCE_MAX)]
    vd_max: f64,

    /// Maximum time step (seconds)
    #[arg(long, value_parser = parse_si, default_value_t = DEFAULT_TIME_STEP_MAX)]
    ts_max: f64,

    /// Simulated duration (seconds, 0 runs while a component keeps it alive)
    #[arg(long, value_parser = parse_si)]
    duration: Option<f64>,

    /// Print the argument table of a model and exit
    #[arg(long, value_name = "MODEL")]
    help_model: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_si(text: &str) -> std::result::Result<f64, String> {
    dsl::parse_value(text).ok_or_else(|| format!("invalid number: {}", text))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let registry = Registry::with_builtin();

    if let Some(model) = &args.help_model {
        match registry.help(model) {
            Some(help) => println!("{}", help),
            None => {
                let names: Vec<&str> = registry.names().collect();
                eprintln!("unknown model '{}'; available: {}", model, names.join(", "));
            }
        }
        return Ok(());
    }

    let mut config = SimulatorConfig::new()
        .with_voltage_difference_max(args.vd_max)
        .with_time_step_max(args.ts_max);
    if let Some(duration) = args.duration {
        config = config.with_duration(duration);
    }
    config.validate()?;

    let Some(path) = args.netlist else {
        return Ok(());
    };
    let netlist = dsl::parse_file(&path)?;
    info!("{}: {} commands", path.display(), netlist.len());

    let mut session = Session::with_config(&registry, config);
    session.execute(&netlist)?;

    for (index, run) in session.runs().iter().enumerate() {
        info!(
            "run {}: {} iterations, t = {:.6e} s, {} supernodes",
            index + 1,
            run.iterations,
            run.time,
            run.supernodes
        );
    }

    Ok(())
}
