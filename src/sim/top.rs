//! Top-level driver: wires the trace front-end, the DMA, and the device
//! together and runs the global tick loop until end-of-compute.

use std::path::Path;

use log::info;

use crate::dma::AimDma;
use crate::dram::Dram;
use crate::sim::config::{BufferConfig, SimConfig};
use crate::trace::TraceFrontend;

pub struct AimTop {
    pub frontend: TraceFrontend,
    pub dma: AimDma,
    pub timeout: u64,
}

impl AimTop {
    pub fn new(config: &SimConfig, buffers: &BufferConfig, trace_path: &Path) -> Self {
        let dram = Dram::from_presets(&config.device, &config.org_preset, &config.timing_preset);
        let dma = AimDma::new(dram, &buffers.to_ctrl_config(), config.clock_ratio);
        let frontend = TraceFrontend::from_path(trace_path, &config.delimiter);
        AimTop {
            frontend,
            dma,
            timeout: config.timeout,
        }
    }

    /// Front-end over an in-memory trace; used by tests.
    pub fn with_trace_str(config: &SimConfig, buffers: &BufferConfig, trace: &str) -> Self {
        let dram = Dram::from_presets(&config.device, &config.org_preset, &config.timing_preset);
        let dma = AimDma::new(dram, &buffers.to_ctrl_config(), config.clock_ratio);
        let frontend = TraceFrontend::from_str(trace, &config.delimiter);
        AimTop {
            frontend,
            dma,
            timeout: config.timeout,
        }
    }

    /// Run until the EOC host request calls back. A run that exceeds the
    /// configured cycle budget has deadlocked and is fatal.
    pub fn run(&mut self) {
        let mut cycles: u64 = 0;
        while !self.frontend.finished() {
            self.frontend.tick(&mut self.dma);
            self.dma.tick();
            cycles += 1;
            if cycles >= self.timeout {
                panic!("simulation timed out after {} cycles without EOC", cycles);
            }
        }
        info!("simulation finished after {} cycles", self.dma.clk());
    }
}
