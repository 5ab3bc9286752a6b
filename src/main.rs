use std::path::PathBuf;

use clap::Parser;

use aimdram::sim::config::{BufferConfig, Config, SimConfig};
use aimdram::sim::stats;
use aimdram::sim::top::AimTop;

#[derive(Parser)]
#[command(version, about)]
struct AimdramArgs {
    /// Path to the AiM host request trace file.
    trace_path: PathBuf,

    /// TOML configuration file with [sim] and [buffers] sections.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    device: Option<String>,
    #[arg(long)]
    org: Option<String>,
    #[arg(long)]
    timing: Option<String>,
    #[arg(long)]
    clock_ratio: Option<i64>,
    #[arg(long)]
    delimiter: Option<String>,
}

pub fn main() {
    env_logger::init();
    let argv = AimdramArgs::parse();

    let (mut sim_config, buffer_config) = match &argv.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .unwrap_or_else(|e| panic!("cannot read config {}: {}", path.display(), e));
            let table: toml::Value = text
                .parse()
                .unwrap_or_else(|e| panic!("cannot parse config {}: {}", path.display(), e));
            (
                SimConfig::from_section(table.get("sim")),
                BufferConfig::from_section(table.get("buffers")),
            )
        }
        None => (SimConfig::default(), BufferConfig::default()),
    };

    sim_config.device = argv.device.unwrap_or(sim_config.device);
    sim_config.org_preset = argv.org.unwrap_or(sim_config.org_preset);
    sim_config.timing_preset = argv.timing.unwrap_or(sim_config.timing_preset);
    sim_config.clock_ratio = argv.clock_ratio.unwrap_or(sim_config.clock_ratio);
    sim_config.delimiter = argv.delimiter.unwrap_or(sim_config.delimiter);

    let mut top = AimTop::new(&sim_config, &buffer_config, &argv.trace_path);
    top.run();

    let ctrl_stats: Vec<_> = top.dma.controllers().iter().map(|c| c.stats()).collect();
    let report = stats::report(top.dma.stats(), &ctrl_stats);
    print!("{}", toml::to_string(&toml::Value::Table(report)).expect("stats serialize"));
}
