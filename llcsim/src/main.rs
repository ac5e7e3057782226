use std::fs::File;
use std::io::{stdout, BufReader};
use std::time::Instant;

use clap::Parser;
use llclib::config::CacheConfig;
use llclib::io::read_trace;
use llclib::simulator::Simulator;

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Parser, Debug)]
#[command(about = String::from("Trace-driven last-level cache simulator"))]
struct Args {
    config: String,
    trace: String,

    /// Overrides the seed from the configuration file
    #[arg(short, long)]
    seed: Option<u64>,

    /// Prints the replacement-policy statistics after the results
    #[arg(long)]
    stats: bool,

    #[arg(short, long)]
    performance: bool,

    #[arg(short, long, default_value_t = DEBUG_DEFAULT)]
    debug: bool,
}

fn main() -> Result<(), String> {
    let start = Instant::now();
    let args = Args::parse();
    let config_file = File::open(&args.config)
        .map_err(|e| format!("couldn't open the config file at path {}: {e}", args.config))?;
    let mut config: CacheConfig = serde_json::from_reader(BufReader::new(config_file))
        .map_err(|e| format!("couldn't parse the config file: {e}"))?;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    let mut simulator = Simulator::new(&config)?;
    let trace_file = File::open(&args.trace)
        .map_err(|e| format!("couldn't open the trace file at path {}: {e}", args.trace))?;
    let trace = read_trace(trace_file)?;
    let result = simulator.simulate(&trace)?;
    println!(
        "{}",
        serde_json::to_string_pretty(result)
            .map_err(|e| format!("couldn't serialise the output: {e}"))?
    );
    if args.stats {
        simulator
            .print_stats(&mut stdout())
            .map_err(|e| format!("couldn't write the statistics: {e}"))?;
    }
    if args.performance {
        let simulation_time = simulator.get_execution_time();
        let total_time = start.elapsed();
        println!(
            "Simulation time: {}s",
            simulation_time.as_nanos() as f64 / 1e9
        );
        println!(
            "Total execution time (includes initial parsing, configuration, and output): {}s",
            total_time.as_nanos() as f64 / 1e9
        )
    }
    if args.debug {
        #[cfg(debug_assertions)]
        println!("Running the debug binary, debug mode is enabled by default. If benchmarking, re-compile with the --release argument when using cargo run");
        println!("Parsed input configuration: {config:?}");
        println!(
            "Uninitialised cache lines: {}",
            simulator.uninitialised_line_count()
        )
    }
    Ok(())
}
