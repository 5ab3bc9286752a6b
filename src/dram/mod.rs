//! Device timing and state engine. The `Dram` owns one node tree per
//! channel and answers the controller's three questions: what command to
//! issue next for a request, whether a command is timing-ready, and what
//! happens to node state when it issues.

use log::trace;

use crate::request::Clk;

pub mod gddr6;
pub mod lpddr5;
pub mod node;
pub mod spec;
pub mod timing;

#[cfg(test)]
mod tests;

use node::ChannelTree;
use spec::{CmdId, DeviceSpec};

pub struct Dram {
    pub spec: DeviceSpec,
    channels: Vec<ChannelTree>,
    clk: Clk,
}

impl Dram {
    pub fn new(spec: DeviceSpec) -> Self {
        let channels = (0..spec.num_channels())
            .map(|id| ChannelTree::build(&spec, id))
            .collect();
        Dram {
            spec,
            channels,
            clk: 0,
        }
    }

    /// Build from a family name and preset pair. Unknown names are fatal.
    pub fn from_presets(family: &str, org_preset: &str, timing_preset: &str) -> Self {
        let spec = match family {
            "GDDR6" => gddr6::build(org_preset, timing_preset),
            "LPDDR5" => lpddr5::build(org_preset, timing_preset),
            other => panic!("unknown device family \"{}\"", other),
        };
        Dram::new(spec)
    }

    pub fn tick(&mut self) {
        self.clk += 1;
    }

    pub fn clk(&self) -> Clk {
        self.clk
    }

    pub fn read_latency(&self) -> i64 {
        self.spec.read_latency
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    fn channel_of(&self, addr_vec: &[i64]) -> usize {
        let ch = addr_vec[self.spec.levels.channel];
        assert!(ch >= 0 && (ch as usize) < self.channels.len(), "bad channel {}", ch);
        ch as usize
    }

    /// Next command that must issue to make progress toward `final_cmd`.
    pub fn get_preq_command(&self, final_cmd: CmdId, addr_vec: &[i64]) -> CmdId {
        let ch = self.channel_of(addr_vec);
        self.channels[ch].get_preq_command(&self.spec, final_cmd, addr_vec, self.clk)
    }

    /// True iff every node along the command's path allows issue now.
    pub fn check_ready(&self, cmd: CmdId, addr_vec: &[i64]) -> bool {
        let ch = self.channel_of(addr_vec);
        self.channels[ch].check_ready(&self.spec, cmd, addr_vec, self.clk)
    }

    /// Issue `cmd` at the current clock, advancing node states and the
    /// timing tables. Timing violations cannot occur here: callers check
    /// readiness first.
    pub fn issue_command(&mut self, cmd: CmdId, addr_vec: &[i64]) {
        trace!(
            "clk {} issue {} at {:?}",
            self.clk,
            self.spec.cmd_name(cmd),
            addr_vec
        );
        let ch = self.channel_of(addr_vec);
        let clk = self.clk;
        let spec = &self.spec;
        self.channels[ch].issue(spec, cmd, addr_vec, clk);
    }

    /// Per-channel mask of banks with any open (or pre-opened) row.
    pub fn open_rows(&self, channel: usize) -> u16 {
        self.channels[channel].open_rows()
    }

    pub fn channel(&self, channel: usize) -> &ChannelTree {
        &self.channels[channel]
    }
}
