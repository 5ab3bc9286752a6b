//! Address-vector tagging: map the `{channel, bank_index, row, col}`
//! fields of an AiM request onto an address vector in the active device's
//! level order. Slots below a command's scope stay `-1` and are treated
//! as don't-care by the timing engine.

use crate::dram::spec::DeviceSpec;
use crate::request::Request;

pub const MAX_CHANNEL_COUNT: usize = 32;
pub const BANKS_PER_CHANNEL: i64 = 16;

pub fn tag_addr_vec(spec: &DeviceSpec, req: &mut Request, channel_id: i64) {
    if channel_id < 0 || channel_id >= MAX_CHANNEL_COUNT as i64 {
        panic!("{} targets channel {} outside 0..{}", req, channel_id, MAX_CHANNEL_COUNT);
    }

    let mut addr_vec = vec![-1i64; spec.levels.len()];
    addr_vec[spec.levels.channel] = channel_id;
    if let Some(rank) = spec.levels.rank {
        addr_vec[rank] = 0;
    }
    if req.bank_index != -1 {
        if req.bank_index < 0 || req.bank_index >= BANKS_PER_CHANNEL {
            panic!("{} targets bank {} outside 0..{}", req, req.bank_index, BANKS_PER_CHANNEL);
        }
        let banks_per_group = spec.banks_per_group() as i64;
        addr_vec[spec.levels.bankgroup] = req.bank_index / banks_per_group;
        addr_vec[spec.levels.bank] = req.bank_index % banks_per_group;
    }
    addr_vec[spec.levels.row] = req.row_addr;
    addr_vec[spec.levels.column] = req.col_addr;
    req.addr_vec = addr_vec;
}

/// Set bits of a 32-channel mask, highest channel first. Bit `i`
/// addresses channel `i`.
pub fn channels_of_mask(mask: i64) -> impl Iterator<Item = usize> {
    (0..MAX_CHANNEL_COUNT)
        .rev()
        .filter(move |ch| mask & (1 << ch) != 0)
}

pub fn popcount(mask: i64) -> u32 {
    (mask as u64 & 0xFFFF_FFFF).count_ones()
}
