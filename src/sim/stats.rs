//! Run statistics. Counters live in plain structs and are flattened into
//! a TOML table at the end of a run, using the stat names the host-side
//! tooling greps for.

use serde::Serialize;

use crate::controller::CtrlStats;
use crate::isa;
use crate::request::{Clk, Opcode, Region, ReqKind, NUM_OPCODES};

#[derive(Debug, Clone, Default, Serialize)]
pub struct DmaStats {
    pub memory_system_cycles: Clk,
    /// Cycles the DMA yielded because blocking children were in flight.
    pub wait_read_stalls: u64,
    /// Cycles the host queue rejected an intake for lack of ISR space.
    pub isr_queue_full: u64,
    /// Request intake counts per (kind, region): `[R, W] x [GPR, CFR, MEM]`.
    rw_requests: [[u64; 3]; 2],
    /// Request intake counts per AiM opcode.
    aim_requests: [u64; NUM_OPCODES],
}

fn region_index(region: Region) -> usize {
    match region {
        Region::Gpr => 0,
        Region::Cfr => 1,
        Region::Mem => 2,
    }
}

impl DmaStats {
    pub fn count_rw(&mut self, kind: ReqKind, region: Region) {
        let kind_idx = match kind {
            ReqKind::Read => 0,
            ReqKind::Write => 1,
            other => panic!("not an ordinary request kind: {:?}", other),
        };
        self.rw_requests[kind_idx][region_index(region)] += 1;
    }

    pub fn count_aim(&mut self, opcode: Opcode) {
        self.aim_requests[opcode as usize] += 1;
    }

    pub fn rw_requests(&self, kind: ReqKind, region: Region) -> u64 {
        let kind_idx = match kind {
            ReqKind::Read => 0,
            ReqKind::Write => 1,
            other => panic!("not an ordinary request kind: {:?}", other),
        };
        self.rw_requests[kind_idx][region_index(region)]
    }

    pub fn aim_requests(&self, opcode: Opcode) -> u64 {
        self.aim_requests[opcode as usize]
    }
}

/// Flatten the run's counters into one table keyed by the conventional
/// stat names.
pub fn report(dma: &DmaStats, controllers: &[CtrlStats]) -> toml::value::Table {
    let mut table = toml::value::Table::new();
    let mut put = |name: String, val: i64| {
        table.insert(name, toml::Value::Integer(val));
    };

    put("memory_system_cycles".into(), dma.memory_system_cycles);
    put("total_num_wait_read_stalls".into(), dma.wait_read_stalls as i64);
    put("total_num_ISR_full".into(), dma.isr_queue_full as i64);

    for kind in [ReqKind::Read, ReqKind::Write] {
        for region in [Region::Gpr, Region::Cfr, Region::Mem] {
            put(
                format!(
                    "total_num_{}_{}_requests",
                    isa::kind_name(kind),
                    isa::region_name(region)
                ),
                dma.rw_requests(kind, region) as i64,
            );
        }
    }
    for opcode in Opcode::ALL {
        put(
            format!("total_num_AiM_{}_requests", isa::opcode_name(opcode)),
            dma.aim_requests(opcode) as i64,
        );
    }
    for (ch, stats) in controllers.iter().enumerate() {
        put(format!("channel_{}_row_hits", ch), stats.row_hits as i64);
        put(format!("channel_{}_row_misses", ch), stats.row_misses as i64);
        put(format!("channel_{}_row_conflicts", ch), stats.row_conflicts as i64);
    }
    table
}
