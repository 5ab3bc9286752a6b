use std::fmt;
use std::rc::Rc;

use num_derive::FromPrimitive;

/// Simulator clock value. `-1` means "not yet assigned".
pub type Clk = i64;
/// Flat address. `-1` means "unused".
pub type Addr = i64;
/// Per-level address indices, ordered by the active device's level order.
/// An entry is `-1` when the command's scope does not require that level.
pub type AddrVec = Vec<i64>;

/// Completion callbacks are shared, clonable values fired exactly once per
/// callback-bearing request, at or after its depart cycle.
pub type Callback = Rc<dyn Fn(&Request)>;

pub const NO_CLK: Clk = -1;
pub const NO_ADDR: Addr = -1;

/// Request kind. `Read`/`Write`/`Aim` arrive from the host; the refresh
/// kinds are produced by the per-channel refresh manager and enter through
/// the controller's priority path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum ReqKind {
    Read = 0,
    Write = 1,
    RefAllBank = 2,
    RefSingleBank = 3,
    Aim = 4,
}

pub const NUM_REQ_KINDS: usize = 5;

/// Address region targeted by ordinary read/write host requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Gpr,
    Cfr,
    Mem,
}

/// AiM ISR opcodes. Discriminants match the host-side instruction encoding
/// and index the per-family request translation tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive)]
pub enum Opcode {
    WrSbk = 1,
    WrGb = 2,
    WrBias = 3,
    WrAflut = 4,
    RdMac = 5,
    RdAf = 6,
    RdSbk = 7,
    CopyBkgb = 8,
    CopyGbbk = 9,
    MacSbk = 10,
    MacAbk = 11,
    Af = 12,
    Ewmul = 13,
    Ewadd = 14,
    WrAbk = 15,
    Eoc = 16,
    Sync = 17,
}

pub const NUM_OPCODES: usize = 18;

impl Opcode {
    pub const ALL: [Opcode; 17] = [
        Opcode::WrSbk,
        Opcode::WrGb,
        Opcode::WrBias,
        Opcode::WrAflut,
        Opcode::RdMac,
        Opcode::RdAf,
        Opcode::RdSbk,
        Opcode::CopyBkgb,
        Opcode::CopyGbbk,
        Opcode::MacSbk,
        Opcode::MacAbk,
        Opcode::Af,
        Opcode::Ewmul,
        Opcode::Ewadd,
        Opcode::WrAbk,
        Opcode::Eoc,
        Opcode::Sync,
    ];
}

/// The unit flowing through the system: one host request, or one of the
/// per-channel requests it expands into.
#[derive(Clone)]
pub struct Request {
    pub kind: Option<ReqKind>,
    pub region: Option<Region>,
    pub opcode: Option<Opcode>,

    pub addr: Addr,
    pub data: i64,
    pub addr_vec: AddrVec,

    pub host_req_id: i64,
    pub aim_req_id: i64,

    pub opsize: i64,
    pub gpr_addr_0: Addr,
    pub gpr_addr_1: Addr,
    pub channel_mask: i64,
    pub bank_index: i64,
    pub row_addr: i64,
    pub col_addr: i64,
    pub thread_index: i64,

    // Side-channel values filled from the CFRs at expansion time.
    pub broadcast: i64,
    pub afm: i64,
    pub ewmul_bg: i64,

    /// Next DRAM command that needs to issue to progress this request.
    pub command: i64,
    /// Command whose issue completes this request.
    pub final_command: i64,

    pub arrive: Clk,
    pub issue: Clk,
    pub depart: Clk,

    pub callback: Option<Callback>,
}

impl Request {
    pub fn new(kind: ReqKind) -> Self {
        Request {
            kind: Some(kind),
            region: None,
            opcode: None,
            addr: NO_ADDR,
            data: -1,
            addr_vec: Vec::new(),
            host_req_id: -1,
            aim_req_id: -1,
            opsize: -1,
            gpr_addr_0: NO_ADDR,
            gpr_addr_1: NO_ADDR,
            channel_mask: -1,
            bank_index: -1,
            row_addr: -1,
            col_addr: -1,
            thread_index: -1,
            broadcast: -1,
            afm: -1,
            ewmul_bg: -1,
            command: -1,
            final_command: -1,
            arrive: NO_CLK,
            issue: NO_CLK,
            depart: NO_CLK,
            callback: None,
        }
    }

    pub fn new_aim(opcode: Opcode) -> Self {
        let mut req = Request::new(ReqKind::Aim);
        req.opcode = Some(opcode);
        req
    }

    pub fn new_rw(kind: ReqKind, region: Region) -> Self {
        let mut req = Request::new(kind);
        req.region = Some(region);
        req
    }

    /// Readers travel through the pending queue until their depart cycle:
    /// ordinary reads, and any blocking request that owes a callback.
    pub fn is_reader(&self) -> bool {
        self.kind == Some(ReqKind::Read) || self.callback.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_are_reads_or_blocking_requests() {
        assert!(Request::new(ReqKind::Read).is_reader());
        assert!(!Request::new(ReqKind::Write).is_reader());
        assert!(!Request::new_aim(Opcode::MacAbk).is_reader());

        let mut sync = Request::new_aim(Opcode::Sync);
        sync.callback = Some(Rc::new(|_| {}));
        assert!(sync.is_reader());
    }

    #[test]
    fn fresh_requests_carry_absent_sentinels() {
        let req = Request::new_aim(Opcode::MacAbk);
        assert_eq!(req.opsize, -1);
        assert_eq!(req.channel_mask, -1);
        assert_eq!(req.arrive, NO_CLK);
        assert_eq!(req.addr, NO_ADDR);
        assert!(req.callback.is_none());
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("kind", &self.kind)
            .field("region", &self.region)
            .field("opcode", &self.opcode)
            .field("addr", &self.addr)
            .field("addr_vec", &self.addr_vec)
            .field("host_req_id", &self.host_req_id)
            .field("aim_req_id", &self.aim_req_id)
            .field("command", &self.command)
            .field("final_command", &self.final_command)
            .field("arrive", &self.arrive)
            .field("depart", &self.depart)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Some(ReqKind::Aim) => write!(
                f,
                "AiM[{:?} host={} aim={} mask={:#x} bank={} row={} col={}]",
                self.opcode, self.host_req_id, self.aim_req_id, self.channel_mask,
                self.bank_index, self.row_addr, self.col_addr
            ),
            _ => write!(
                f,
                "{:?}[{:?} host={} addr={} vec={:?}]",
                self.kind, self.region, self.host_req_id, self.addr, self.addr_vec
            ),
        }
    }
}
