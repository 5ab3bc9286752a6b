//! Per-channel controller: request buffers, write-mode arbitration,
//! read-after-write forwarding, close-hazard protection, and the pending
//! queue that fires completion callbacks after read latency.

use std::collections::VecDeque;

use log::{debug, warn};
use serde::Serialize;

use crate::dram::spec::CmdId;
use crate::dram::Dram;
use crate::request::{Clk, Opcode, ReqKind, Request};

pub mod buffer;
pub mod refresh;
pub mod scheduler;

#[cfg(test)]
mod tests;

use buffer::ReqBuffer;
use refresh::AllBankRefresher;
use scheduler::{FrFcfs, Scheduler};

/// Which buffer a scheduled request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Active,
    Priority,
    Aim,
    Read,
    Write,
}

#[derive(Debug, Clone, Copy)]
pub struct CtrlConfig {
    pub active_size: usize,
    pub priority_size: usize,
    pub read_size: usize,
    pub write_size: usize,
    pub aim_size: usize,
    pub wr_low_watermark: f32,
    pub wr_high_watermark: f32,
}

impl Default for CtrlConfig {
    fn default() -> Self {
        CtrlConfig {
            active_size: 32,
            priority_size: 512 * 3 + 32,
            read_size: 32,
            write_size: 32,
            aim_size: 32,
            wr_low_watermark: 0.2,
            wr_high_watermark: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CtrlStats {
    pub row_hits: u64,
    pub row_misses: u64,
    pub row_conflicts: u64,
}

pub struct ChannelCtrl {
    channel_id: usize,
    clk: Clk,
    active_buffer: ReqBuffer,
    priority_buffer: ReqBuffer,
    read_buffer: ReqBuffer,
    write_buffer: ReqBuffer,
    aim_buffer: ReqBuffer,
    pending: VecDeque<Request>,
    scheduler: Box<dyn Scheduler>,
    refresh: AllBankRefresher,
    wr_low_watermark: f32,
    wr_high_watermark: f32,
    is_write_mode: bool,
    stats: CtrlStats,
}

impl ChannelCtrl {
    pub fn new(dram: &Dram, channel_id: usize, config: &CtrlConfig) -> Self {
        ChannelCtrl {
            channel_id,
            clk: 0,
            active_buffer: ReqBuffer::new(config.active_size),
            priority_buffer: ReqBuffer::new(config.priority_size),
            read_buffer: ReqBuffer::new(config.read_size),
            write_buffer: ReqBuffer::new(config.write_size),
            aim_buffer: ReqBuffer::new(config.aim_size),
            pending: VecDeque::new(),
            scheduler: Box::new(FrFcfs),
            refresh: AllBankRefresher::new(&dram.spec, channel_id),
            wr_low_watermark: config.wr_low_watermark,
            wr_high_watermark: config.wr_high_watermark,
            is_write_mode: false,
            stats: CtrlStats::default(),
        }
    }

    pub fn channel_id(&self) -> usize {
        self.channel_id
    }

    pub fn stats(&self) -> CtrlStats {
        self.stats
    }

    pub fn clk(&self) -> Clk {
        self.clk
    }

    /// Accept a request for normal scheduling. `Err` hands the request
    /// back with no side effects; the caller retries next cycle.
    pub fn send(&mut self, mut req: Request, dram: &Dram) -> Result<(), Request> {
        // An AiM stream and an ordinary read/write stream never coexist
        // in one controller.
        if req.kind == Some(ReqKind::Aim) {
            if !self.write_buffer.is_empty() || !self.read_buffer.is_empty() {
                return Err(req);
            }
            req.final_command = dram.spec.final_command_for_opcode(req.opcode.unwrap()) as i64;
        } else {
            if !self.aim_buffer.is_empty() {
                return Err(req);
            }
            req.final_command = dram.spec.final_command_for_kind(req.kind.unwrap()) as i64;
        }

        // Forward matching buffered writes to incoming reads: the read
        // departs next cycle without touching the DRAM. `-1` marks an
        // unused flat address and never matches.
        if req.kind == Some(ReqKind::Read)
            && req.addr != -1
            && self.write_buffer.iter().any(|w| w.addr == req.addr)
        {
            req.arrive = self.clk;
            req.depart = self.clk + 1;
            self.pending.push_back(req);
            return Ok(());
        }

        req.arrive = self.clk;
        let buffer = match req.kind {
            Some(ReqKind::Read) => &mut self.read_buffer,
            Some(ReqKind::Write) => &mut self.write_buffer,
            Some(ReqKind::Aim) => &mut self.aim_buffer,
            other => panic!("invalid request kind {:?} sent to controller", other),
        };
        buffer.enqueue(req).map_err(|mut req| {
            req.arrive = -1;
            req
        })
    }

    /// Insert directly into the priority buffer (maintenance traffic).
    pub fn priority_send(&mut self, mut req: Request, dram: &Dram) -> Result<(), Request> {
        req.final_command = match req.kind {
            Some(ReqKind::Aim) => dram.spec.final_command_for_opcode(req.opcode.unwrap()) as i64,
            Some(kind) => dram.spec.final_command_for_kind(kind) as i64,
            None => panic!("priority request without a kind"),
        };
        self.priority_buffer.enqueue(req)
    }

    /// Advance the controller by one device-clock cycle.
    pub fn tick(&mut self, dram: &mut Dram) {
        self.clk += 1;

        self.serve_completed();

        if let Some(refresh_req) = self.refresh.tick(&dram.spec) {
            if self.priority_send(refresh_req, dram).is_err() {
                warn!("channel {}: priority buffer full, dropping refresh", self.channel_id);
            }
        }

        let Some((source, index)) = self.schedule_request(dram) else {
            return;
        };

        if self.buffer(source).get(index).opcode == Some(Opcode::Eoc) {
            // End-of-compute never reaches the device; it drains through
            // the pending queue to fire the host callback.
            let mut req = self.buffer_mut(source).remove(index);
            req.depart = self.clk;
            self.pending.push_back(req);
            debug!("channel {}: EOC ready for callback", self.channel_id);
            return;
        }

        let cmd = self.buffer(source).get(index).command as CmdId;
        let addr_vec = self.buffer(source).get(index).addr_vec.clone();
        dram.issue_command(cmd, &addr_vec);
        self.account_issue(dram, source, index, cmd);

        let clk = self.clk;
        let read_latency = dram.read_latency();
        {
            let req = self.buffer_mut(source).get_mut(index);
            if req.issue == -1 {
                req.issue = clk;
            }
        }

        let (is_final, is_aim) = {
            let req = self.buffer(source).get(index);
            (req.command == req.final_command, req.kind == Some(ReqKind::Aim))
        };
        if is_final {
            let mut req = self.buffer_mut(source).remove(index);
            if req.is_reader() {
                req.depart = clk + read_latency;
                self.pending.push_back(req);
            }
        } else if !is_aim && dram.spec.meta(cmd).is_opening {
            // The row is on its way open: move the request to the active
            // buffer so the scheduler revisits it first.
            let req = self.buffer_mut(source).remove(index);
            if let Err(req) = self.active_buffer.enqueue(req) {
                // No room to track the activation; keep scheduling it
                // from its original buffer.
                let _ = self.buffer_mut(source).enqueue(req);
            }
        }
    }

    fn buffer(&self, source: Source) -> &ReqBuffer {
        match source {
            Source::Active => &self.active_buffer,
            Source::Priority => &self.priority_buffer,
            Source::Aim => &self.aim_buffer,
            Source::Read => &self.read_buffer,
            Source::Write => &self.write_buffer,
        }
    }

    fn buffer_mut(&mut self, source: Source) -> &mut ReqBuffer {
        match source {
            Source::Active => &mut self.active_buffer,
            Source::Priority => &mut self.priority_buffer,
            Source::Aim => &mut self.aim_buffer,
            Source::Read => &mut self.read_buffer,
            Source::Write => &mut self.write_buffer,
        }
    }

    /// Fire callbacks for pending requests whose depart cycle has come.
    fn serve_completed(&mut self) {
        while let Some(head) = self.pending.front() {
            if head.depart > self.clk {
                break;
            }
            let req = self.pending.pop_front().expect("front just checked");
            match &req.callback {
                Some(callback) => callback(&req),
                None => debug!(
                    "channel {}: pending request {} completed without callback",
                    self.channel_id, req
                ),
            }
        }
    }

    fn set_write_mode(&mut self) {
        if !self.is_write_mode {
            if self.write_buffer.len() as f32
                > self.wr_high_watermark * self.write_buffer.max_size() as f32
                || self.read_buffer.is_empty()
            {
                self.is_write_mode = true;
            }
        } else if (self.write_buffer.len() as f32)
            < self.wr_low_watermark * self.write_buffer.max_size() as f32
            && !self.read_buffer.is_empty()
        {
            self.is_write_mode = false;
        }
    }

    fn schedule_request(&mut self, dram: &Dram) -> Option<(Source, usize)> {
        let mut found: Option<(Source, usize)> = None;

        // Requests whose row is already opening come first, to avoid
        // issuing activations that would go to waste.
        if let Some(i) = self.scheduler.best_request(dram, &mut self.active_buffer) {
            let req = self.active_buffer.get(i);
            if dram.check_ready(req.command as CmdId, &req.addr_vec) {
                found = Some((Source::Active, i));
            }
        }

        if found.is_none() && !self.priority_buffer.is_empty() {
            // Maintenance has strict priority: while its head is not
            // ready, no other buffer may be served.
            let req = self.priority_buffer.get_mut(0);
            req.command = dram.get_preq_command(req.final_command as CmdId, &req.addr_vec) as i64;
            if dram.check_ready(req.command as CmdId, &req.addr_vec) {
                found = Some((Source::Priority, 0));
            } else {
                return None;
            }
        }

        if found.is_none() {
            if !self.aim_buffer.is_empty() {
                let req = self.aim_buffer.get_mut(0);
                if req.opcode == Some(Opcode::Eoc) {
                    return Some((Source::Aim, 0));
                }
                req.command =
                    dram.get_preq_command(req.final_command as CmdId, &req.addr_vec) as i64;
                if dram.check_ready(req.command as CmdId, &req.addr_vec) {
                    found = Some((Source::Aim, 0));
                }
            } else {
                self.set_write_mode();
                let source = if self.is_write_mode {
                    Source::Write
                } else {
                    Source::Read
                };
                let buffer = match source {
                    Source::Write => &mut self.write_buffer,
                    _ => &mut self.read_buffer,
                };
                if let Some(i) = self.scheduler.best_request(dram, buffer) {
                    let req = self.buffer(source).get(i);
                    if dram.check_ready(req.command as CmdId, &req.addr_vec) {
                        found = Some((source, i));
                    }
                }
            }
        }

        // A closing command must not interrupt a request whose row is
        // being held open in the active buffer: compare the full bank
        // prefix of the address vectors.
        if let Some((source, index)) = found {
            let req = self.buffer(source).get(index);
            let cmd = req.command as CmdId;
            if dram.spec.meta(cmd).is_closing {
                let row_level = dram.spec.levels.row;
                let rowgroup = &req.addr_vec[..row_level];
                for (j, active) in self.active_buffer.iter().enumerate() {
                    if source == Source::Active && j == index {
                        continue;
                    }
                    if &active.addr_vec[..row_level] == rowgroup {
                        return None;
                    }
                }
            }
        }

        found
    }

    fn account_issue(&mut self, dram: &Dram, source: Source, index: usize, cmd: CmdId) {
        let meta = dram.spec.meta(cmd);
        let req = self.buffer(source).get(index);
        if req.command == req.final_command {
            if meta.is_accessing && req.issue == -1 {
                self.stats.row_hits += 1;
            }
        } else if meta.is_opening {
            self.stats.row_misses += 1;
        } else if meta.is_closing {
            self.stats.row_conflicts += 1;
        }
    }

    // Test and accounting access to buffer occupancy.
    pub fn read_buffer_len(&self) -> usize {
        self.read_buffer.len()
    }

    pub fn write_buffer_len(&self) -> usize {
        self.write_buffer.len()
    }

    pub fn aim_buffer_len(&self) -> usize {
        self.aim_buffer.len()
    }

    pub fn active_buffer_len(&self) -> usize {
        self.active_buffer.len()
    }

    pub fn priority_buffer_len(&self) -> usize {
        self.priority_buffer.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_write_mode(&self) -> bool {
        self.is_write_mode
    }

    pub fn is_idle(&self) -> bool {
        self.active_buffer.is_empty()
            && self.priority_buffer.is_empty()
            && self.read_buffer.is_empty()
            && self.write_buffer.is_empty()
            && self.aim_buffer.is_empty()
            && self.pending.is_empty()
    }
}
