//! AiM DMA front-end. Holds the host request queue, expands the head
//! request into per-channel AiM requests, fans them out to the channel
//! controllers (with per-channel backlog queues absorbing back-pressure),
//! and tracks blocking children until they call back.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::debug;

use crate::controller::{ChannelCtrl, CtrlConfig};
use crate::dram::Dram;
use crate::isa::{self, TargetLevel};
use crate::request::{Clk, Opcode, Region, ReqKind, Request};
use crate::sim::stats::DmaStats;

pub mod addr;

#[cfg(test)]
mod tests;

use addr::{channels_of_mask, popcount, tag_addr_vec};

/// Host request queue capacity (the device's ISR space).
pub const ISR_SIZE: usize = 1 << 21;

/// Architectural row-address page for the activation-function LUTs.
pub const AF_ROW_BASE: i64 = 1 << 29;

/// Configuration registers internal to the PiM device, written through
/// `W CFR addr data` host requests.
#[derive(Debug, Clone, Copy)]
pub struct Cfr {
    /// Vector data for MAC comes from the global buffer (0) or the next
    /// bank (1).
    pub broadcast: i64,
    /// EWMUL in one bank group (0) or all bank groups (1).
    pub ewmul_bg: i64,
    /// Activation function mode (0-7).
    pub afm: i64,
}

impl Default for Cfr {
    fn default() -> Self {
        Cfr {
            broadcast: 0,
            ewmul_bg: 1,
            afm: 0,
        }
    }
}

impl Cfr {
    pub fn write(&mut self, addr: i64, data: i64) {
        match addr {
            0 => self.broadcast = data,
            1 => self.ewmul_bg = data,
            2 => self.afm = data,
            other => panic!("unknown CFR at location {}", other),
        }
    }
}

/// Completion bookkeeping shared with blocking child callbacks. Children
/// fire from inside controller ticks, so the counter lives behind a
/// shared cell instead of borrowing the DMA.
struct BlockingChildren {
    outstanding: Cell<i64>,
    expected_host: Cell<i64>,
}

impl BlockingChildren {
    fn child_done(&self, req: &Request) {
        assert_eq!(
            req.host_req_id,
            self.expected_host.get(),
            "blocking child calls back for host request {} while {} heads the queue",
            req.host_req_id,
            self.expected_host.get()
        );
        self.outstanding.set(self.outstanding.get() - 1);
    }
}

pub struct AimDma {
    pub dram: Dram,
    controllers: Vec<ChannelCtrl>,
    request_queue: VecDeque<Request>,
    backlog: Vec<VecDeque<Request>>,
    blocking: Rc<BlockingChildren>,
    head_expanded: bool,
    cfr: Cfr,
    aim_req_id: i64,
    clk: Clk,
    clock_ratio: i64,
    stats: DmaStats,
}

impl AimDma {
    pub fn new(dram: Dram, ctrl_config: &CtrlConfig, clock_ratio: i64) -> Self {
        assert!(clock_ratio >= 1, "clock_ratio must be at least 1");
        let controllers = (0..dram.num_channels())
            .map(|ch| ChannelCtrl::new(&dram, ch, ctrl_config))
            .collect::<Vec<_>>();
        let backlog = (0..dram.num_channels()).map(|_| VecDeque::new()).collect();
        AimDma {
            dram,
            controllers,
            request_queue: VecDeque::new(),
            backlog,
            blocking: Rc::new(BlockingChildren {
                outstanding: Cell::new(0),
                expected_host: Cell::new(-1),
            }),
            head_expanded: false,
            cfr: Cfr::default(),
            aim_req_id: 0,
            clk: 0,
            clock_ratio,
            stats: DmaStats::default(),
        }
    }

    pub fn stats(&self) -> &DmaStats {
        &self.stats
    }

    pub fn clk(&self) -> Clk {
        self.clk
    }

    pub fn cfr(&self) -> Cfr {
        self.cfr
    }

    pub fn stalled_aim_requests(&self) -> i64 {
        self.blocking.outstanding.get()
    }

    pub fn controllers(&self) -> &[ChannelCtrl] {
        &self.controllers
    }

    pub fn host_queue_len(&self) -> usize {
        self.request_queue.len()
    }

    /// Intake contract with the host front-end: false iff the host
    /// request queue is full.
    pub fn send(&mut self, req: Request) -> bool {
        if self.request_queue.len() == ISR_SIZE {
            self.stats.isr_queue_full += 1;
            return false;
        }
        match req.kind {
            Some(ReqKind::Aim) => self.stats.count_aim(req.opcode.unwrap()),
            Some(ReqKind::Read) | Some(ReqKind::Write) => {
                self.stats.count_rw(req.kind.unwrap(), req.region.unwrap())
            }
            other => panic!("unknown host request kind {:?}", other),
        }
        self.request_queue.push_back(req);
        true
    }

    /// One simulator cycle: drain backlogs, progress the head host
    /// request, then tick the device and controllers at their ratio.
    pub fn tick(&mut self) {
        self.flush_backlogs();

        if self.blocking.outstanding.get() > 0 {
            // Blocking children still in flight; the head host request
            // cannot complete and nothing new may expand.
            self.stats.wait_read_stalls += 1;
        } else if self.head_expanded {
            if self.backlog.iter().all(|q| q.is_empty()) {
                self.complete_head();
            }
        } else if !self.request_queue.is_empty() {
            let all_sent = self.expand_head();
            if self.blocking.outstanding.get() == 0 && all_sent {
                self.complete_head();
            } else {
                self.head_expanded = true;
            }
        }

        if self.clk % self.clock_ratio == 0 {
            self.dram.tick();
            for controller in &mut self.controllers {
                controller.tick(&mut self.dram);
            }
        }

        self.clk += 1;
        self.stats.memory_system_cycles = self.clk;
    }

    fn flush_backlogs(&mut self) {
        for ch in 0..self.backlog.len() {
            while let Some(req) = self.backlog[ch].pop_front() {
                match self.controllers[ch].send(req, &self.dram) {
                    Ok(()) => {}
                    Err(req) => {
                        self.backlog[ch].push_front(req);
                        break;
                    }
                }
            }
        }
    }

    fn complete_head(&mut self) {
        let head = self
            .request_queue
            .pop_front()
            .expect("completing an empty host queue");
        debug!("clk {}: host request {} complete", self.clk, head);
        self.head_expanded = false;
        self.blocking.expected_host.set(-1);
        if let Some(callback) = &head.callback {
            callback(&head);
        }
    }

    /// Decode the head host request into per-channel children. Returns
    /// true when every child was accepted by its controller this cycle.
    fn expand_head(&mut self) -> bool {
        let host = self.request_queue.front().cloned().expect("no head to expand");
        self.blocking.expected_host.set(host.host_req_id);
        match host.kind {
            Some(ReqKind::Aim) => self.expand_aim(&host),
            Some(ReqKind::Read) => match host.region {
                // GPR and CFR reads are satisfied DMA-locally.
                Some(Region::Gpr) | Some(Region::Cfr) => true,
                Some(Region::Mem) => self.send_mem_child(&host),
                None => panic!("read host request without a region"),
            },
            Some(ReqKind::Write) => match host.region {
                Some(Region::Cfr) => {
                    self.cfr.write(host.addr, host.data);
                    true
                }
                Some(Region::Gpr) => true,
                Some(Region::Mem) => self.send_mem_child(&host),
                None => panic!("write host request without a region"),
            },
            other => panic!("unknown host request kind {:?}", other),
        }
    }

    /// Ordinary MEM read/write: one child on the channel named by the
    /// host's channel_mask field (a channel id here, not a bitmap).
    fn send_mem_child(&mut self, host: &Request) -> bool {
        let mut child = host.clone();
        child.callback = None;
        child.aim_req_id = self.next_aim_req_id();
        let channel_id = child.channel_mask;
        tag_addr_vec(&self.dram.spec, &mut child, channel_id);
        self.send_child(channel_id as usize, child)
    }

    fn expand_aim(&mut self, host: &Request) -> bool {
        let opcode = host.opcode.expect("AiM host request without an opcode");
        match opcode {
            Opcode::WrAflut => {
                panic!("ISR_WR_AFLUT not supported by now");
            }
            Opcode::Ewadd => {
                // Pure DMA-local op over two GPR operands.
                true
            }
            Opcode::Sync | Opcode::Eoc => self.fan_out_barrier(host),
            _ => self.fan_out_compute(host, opcode),
        }
    }

    /// One blocking child to every channel; the host request completes
    /// only when all of them have called back.
    fn fan_out_barrier(&mut self, host: &Request) -> bool {
        let mut all_sent = true;
        for channel_id in 0..self.controllers.len() {
            let mut child = host.clone();
            child.callback = Some(self.child_callback());
            child.aim_req_id = self.next_aim_req_id();
            child.host_req_id = host.host_req_id;
            tag_addr_vec(&self.dram.spec, &mut child, channel_id as i64);
            self.blocking.outstanding.set(self.blocking.outstanding.get() + 1);
            if !self.send_child(channel_id, child) {
                all_sent = false;
            }
        }
        all_sent
    }

    fn fan_out_compute(&mut self, host: &Request, opcode: Opcode) -> bool {
        let descriptor = isa::isr(opcode);
        let mask = host.channel_mask;
        let channel_count = popcount(mask);
        if descriptor.channel_count_eq_one && channel_count != 1 {
            panic!(
                "channel mask ({:#x}) of {} must specify exactly 1 channel",
                mask,
                isa::opcode_name(opcode)
            );
        }

        let mut base = host.clone();
        base.callback = None;

        // Single-bank reads and writes behave as ordinary memory traffic
        // at the controller.
        match opcode {
            Opcode::RdSbk => {
                base.kind = Some(ReqKind::Read);
                base.region = Some(Region::Mem);
                base.opcode = None;
            }
            Opcode::WrSbk => {
                base.kind = Some(ReqKind::Write);
                base.region = Some(Region::Mem);
                base.opcode = None;
            }
            _ => {}
        }

        // CFR side-channels resolved at expansion time.
        if opcode == Opcode::Af {
            base.afm = self.cfr.afm;
            base.row_addr = AF_ROW_BASE + base.afm;
        }
        if opcode == Opcode::MacAbk || opcode == Opcode::MacSbk {
            base.broadcast = self.cfr.broadcast;
        }
        if opcode == Opcode::MacAbk {
            base.ewmul_bg = self.cfr.ewmul_bg;
        }

        let opsize = if host.opsize == -1 { 1 } else { host.opsize };
        let col_base = if host.col_addr == -1 { 0 } else { host.col_addr };
        debug_assert!(descriptor.target_level != TargetLevel::Dma);

        let mut all_sent = true;
        for i in 0..opsize {
            for channel_id in channels_of_mask(mask) {
                let mut child = base.clone();
                child.col_addr = col_base + i;
                if descriptor.dma_blocking {
                    child.callback = Some(self.child_callback());
                    self.blocking.outstanding.set(self.blocking.outstanding.get() + 1);
                }
                child.aim_req_id = self.next_aim_req_id();
                child.host_req_id = host.host_req_id;
                tag_addr_vec(&self.dram.spec, &mut child, channel_id as i64);
                if !self.send_child(channel_id, child) {
                    all_sent = false;
                }
            }
        }
        all_sent
    }

    fn send_child(&mut self, channel_id: usize, child: Request) -> bool {
        assert!(channel_id < self.controllers.len(), "bad channel {}", channel_id);
        match self.controllers[channel_id].send(child, &self.dram) {
            Ok(()) => true,
            Err(child) => {
                self.backlog[channel_id].push_back(child);
                false
            }
        }
    }

    fn child_callback(&self) -> Rc<dyn Fn(&Request)> {
        let blocking = Rc::clone(&self.blocking);
        Rc::new(move |req| blocking.child_done(req))
    }

    fn next_aim_req_id(&mut self) -> i64 {
        let id = self.aim_req_id;
        self.aim_req_id += 1;
        id
    }
}
