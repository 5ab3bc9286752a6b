//! All-bank refresh manager. Once every nREFI controller cycles it emits
//! a refresh request for its channel, which the controller inserts
//! through the priority path.

use crate::dram::spec::DeviceSpec;
use crate::request::{Clk, ReqKind, Request};

pub struct AllBankRefresher {
    channel_id: usize,
    refresh_interval: i64,
    clk: Clk,
    last_refreshed: Clk,
}

impl AllBankRefresher {
    pub fn new(spec: &DeviceSpec, channel_id: usize) -> Self {
        AllBankRefresher {
            channel_id,
            refresh_interval: spec.refresh_interval,
            clk: 0,
            last_refreshed: 0,
        }
    }

    pub fn tick(&mut self, spec: &DeviceSpec) -> Option<Request> {
        self.clk += 1;
        if self.clk - self.last_refreshed < self.refresh_interval {
            return None;
        }
        self.last_refreshed = self.clk;

        let mut req = Request::new(ReqKind::RefAllBank);
        let mut addr_vec = vec![-1i64; spec.levels.len()];
        addr_vec[spec.levels.channel] = self.channel_id as i64;
        if let Some(rank) = spec.levels.rank {
            addr_vec[rank] = 0;
        }
        req.addr_vec = addr_vec;
        Some(req)
    }
}
