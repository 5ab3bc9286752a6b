//! Scheduler plug point. The contract is to pick some request out of a
//! buffer (or none), refreshing each candidate's next command on the way;
//! the controller then gates the pick on device readiness.

use crate::dram::Dram;
use crate::request::Request;

use super::buffer::ReqBuffer;

pub trait Scheduler {
    /// Index of the best request in `buffer`, or `None` when empty. Every
    /// candidate's `command` is recomputed against current device state.
    fn best_request(&self, dram: &Dram, buffer: &mut ReqBuffer) -> Option<usize>;
}

/// First-ready, first-come-first-serve: a request whose next command is
/// timing-ready beats any that is not; ties go to the earliest arrival.
pub struct FrFcfs;

impl FrFcfs {
    fn better(dram: &Dram, a: &Request, b: &Request) -> bool {
        let ready_a = dram.check_ready(a.command as usize, &a.addr_vec);
        let ready_b = dram.check_ready(b.command as usize, &b.addr_vec);
        if ready_a != ready_b {
            return ready_a;
        }
        a.arrive < b.arrive
    }
}

impl Scheduler for FrFcfs {
    fn best_request(&self, dram: &Dram, buffer: &mut ReqBuffer) -> Option<usize> {
        for req in buffer.iter_mut() {
            req.command = dram.get_preq_command(req.final_command as usize, &req.addr_vec) as i64;
        }
        let mut best: Option<usize> = None;
        for i in 0..buffer.len() {
            best = match best {
                None => Some(i),
                Some(b) if Self::better(dram, buffer.get(i), buffer.get(b)) => Some(i),
                keep => keep,
            };
        }
        best
    }
}
