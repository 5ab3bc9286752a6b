//! Value-typed device descriptors. A `DeviceSpec` is built once at init
//! from a named preset; every runtime lookup goes through pre-resolved
//! integer indices. Prerequisite and action policies are data over a
//! closed set, not callables, so the descriptor stays inspectable and the
//! hot path stays inlineable.

use crate::request::{Opcode, ReqKind, NUM_OPCODES, NUM_REQ_KINDS};

use super::timing::TimingTable;

pub type CmdId = usize;
pub type LevelId = usize;

/// Level order of the active device family, with the well-known levels
/// resolved to indices at build time.
#[derive(Debug, Clone)]
pub struct Levels {
    names: Vec<&'static str>,
    pub channel: LevelId,
    pub rank: Option<LevelId>,
    pub bankgroup: LevelId,
    pub bank: LevelId,
    pub row: LevelId,
    pub column: LevelId,
}

impl Levels {
    pub fn new(names: &[&'static str]) -> Self {
        let find = |name: &str| names.iter().position(|n| *n == name);
        let require = |name: &'static str| {
            find(name).unwrap_or_else(|| panic!("device level order is missing \"{}\"", name))
        };
        Levels {
            names: names.to_vec(),
            channel: require("channel"),
            rank: find("rank"),
            bankgroup: require("bankgroup"),
            bank: require("bank"),
            row: require("row"),
            column: require("column"),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, level: LevelId) -> &'static str {
        self.names[level]
    }

    pub fn index(&self, name: &str) -> Option<LevelId> {
        self.names.iter().position(|n| *n == name)
    }
}

/// What a command does to the node it lands on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandMeta {
    pub is_opening: bool,
    pub is_closing: bool,
    pub is_accessing: bool,
    pub is_refreshing: bool,
}

impl CommandMeta {
    pub const fn new(open: bool, close: bool, access: bool, refresh: bool) -> Self {
        CommandMeta {
            is_opening: open,
            is_closing: close,
            is_accessing: access,
            is_refreshing: refresh,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandDef {
    pub name: &'static str,
    pub scope: LevelId,
    pub meta: CommandMeta,
}

/// Per-node state machine states shared by all families. `PreOpened` is
/// only reachable on families with split two-phase activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Closed,
    Opened,
    PreOpened,
    PowerUp,
    NA,
}

/// Prerequisite policy evaluated while translating a final command into
/// the next DRAM command to issue.
#[derive(Debug, Clone, Copy)]
pub enum PreqPolicy {
    /// Bank-scoped accesses need the target row in the row buffer.
    /// `act2` is the second activation phase on two-phase families;
    /// `cas` is the bus-sync command required before data transfer when
    /// the owning rank has fallen out of sync.
    RequireRowOpen {
        act: CmdId,
        act2: Option<CmdId>,
        pre: CmdId,
        cas: Option<CmdId>,
    },
    /// The scoped bank must be precharged first.
    RequireBankClosed { pre: CmdId },
    /// Every bank under this node must be precharged first.
    RequireAllBanksClosed { prea: CmdId },
    /// All-bank compute needs the target row open in every bank: any bank
    /// holding a different row forces a full precharge, any closed (or
    /// pre-opened) bank forces a mass activate.
    RequireAllRowsOpen {
        act_all: CmdId,
        act2_all: Option<CmdId>,
        prea: CmdId,
    },
    /// Per-bank refresh pairs the target bank with its peer
    /// `pair_stride` banks away; both must be closed.
    RequireBankPairClosed { pre: CmdId, pair_stride: usize },
    /// Data-transfer commands on WCK-synced families need a CAS sync
    /// first when the rank's sync horizon has lapsed.
    RequireSynced { cas: CmdId },
}

/// State transition applied to the node a command lands on. A command may
/// carry several actions at one level (e.g. close everything and refresh
/// the sync horizon).
#[derive(Debug, Clone, Copy)]
pub enum ActionPolicy {
    OpenRow,
    PreOpenRow,
    CloseRow,
    OpenGroupRows,
    PreOpenGroupRows,
    CloseGroupRows,
    OpenAllRows,
    PreOpenAllRows,
    CloseAllRows,
    /// `synced_until = clk + horizon` on the scoped node.
    SetSync { horizon: i64 },
}

/// Effect of a command on the per-channel 16-bit open-rows mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowMaskEffect {
    #[default]
    None,
    SetBank,
    ClearBank,
    SetGroup,
    ClearGroup,
    SetAll,
    ClearAll,
}

/// Per-level organization of one preset.
#[derive(Debug, Clone)]
pub struct Organization {
    /// Total chip density in Mbit, cross-checked against the level counts.
    pub density_mbit: i64,
    pub dq: i64,
    pub counts: Vec<usize>,
}

impl Organization {
    /// The product of level counts and DQ width must reproduce the
    /// declared density. Mismatch is a fatal configuration error.
    pub fn check_density(&self, name: &str) {
        let mut bits: i64 = self.dq;
        for count in &self.counts {
            bits = bits.saturating_mul(*count as i64);
        }
        let computed = bits >> 20;
        if computed != self.density_mbit {
            panic!(
                "{}: calculated chip density {} Mb does not equal the declared density {} Mb",
                name, computed, self.density_mbit
            );
        }
    }
}

/// Named timing values of one family, `-1` meaning "not yet resolved".
#[derive(Debug, Clone)]
pub struct TimingVals {
    names: &'static [&'static str],
    vals: Vec<i64>,
}

impl TimingVals {
    pub fn new(names: &'static [&'static str]) -> Self {
        TimingVals {
            names,
            vals: vec![-1; names.len()],
        }
    }

    pub fn from_preset(names: &'static [&'static str], preset: &[i64]) -> Self {
        assert_eq!(
            names.len(),
            preset.len(),
            "timing preset length does not match the timing name table"
        );
        TimingVals {
            names,
            vals: preset.to_vec(),
        }
    }

    fn index(&self, name: &str) -> usize {
        self.names
            .iter()
            .position(|n| *n == name)
            .unwrap_or_else(|| panic!("unknown timing key \"{}\"", name))
    }

    pub fn get(&self, name: &str) -> i64 {
        self.vals[self.index(name)]
    }

    pub fn set(&mut self, name: &str, val: i64) {
        let idx = self.index(name);
        self.vals[idx] = val;
    }

    /// Every timing must be resolved before the constraint table is built.
    pub fn check_resolved(&self, device: &str) {
        for (name, val) in self.names.iter().zip(&self.vals) {
            if *val == -1 {
                panic!("in \"{}\", timing {} is not specified", device, name);
            }
        }
    }
}

/// Static descriptor of one device family instance: everything the timing
/// and state engine needs, resolved to integer indices.
pub struct DeviceSpec {
    pub name: &'static str,
    pub levels: Levels,
    pub org: Organization,
    pub commands: Vec<CommandDef>,
    pub init_states: Vec<NodeState>,
    pub timings: TimingVals,
    pub read_latency: i64,
    pub command_latencies: Vec<i64>,
    /// Final command per ordinary request kind (indexed by `ReqKind`).
    pub rw_translations: [Option<CmdId>; NUM_REQ_KINDS],
    /// Final command per AiM opcode; `None` marks opcodes with no device
    /// command (handled entirely inside the DMA, or unsupported).
    pub aim_translations: [Option<CmdId>; NUM_OPCODES],
    pub preqs: Vec<Vec<Option<PreqPolicy>>>,
    pub actions: Vec<Vec<Vec<ActionPolicy>>>,
    pub row_mask: Vec<RowMaskEffect>,
    pub timing: TimingTable,
    pub tck_ps: i64,
    /// Controller cycles between all-bank refreshes (nREFI).
    pub refresh_interval: i64,
}

impl DeviceSpec {
    pub fn num_commands(&self) -> usize {
        self.commands.len()
    }

    /// Config-time lookup; unknown names are fatal.
    pub fn cmd(&self, name: &str) -> CmdId {
        self.commands
            .iter()
            .position(|c| c.name == name)
            .unwrap_or_else(|| panic!("{}: unknown command \"{}\"", self.name, name))
    }

    pub fn cmd_name(&self, cmd: CmdId) -> &'static str {
        self.commands[cmd].name
    }

    pub fn scope(&self, cmd: CmdId) -> LevelId {
        self.commands[cmd].scope
    }

    pub fn meta(&self, cmd: CmdId) -> CommandMeta {
        self.commands[cmd].meta
    }

    pub fn num_channels(&self) -> usize {
        self.org.counts[self.levels.channel]
    }

    pub fn banks_per_group(&self) -> usize {
        self.org.counts[self.levels.bank]
    }

    pub fn final_command_for_kind(&self, kind: ReqKind) -> CmdId {
        self.rw_translations[kind as usize]
            .unwrap_or_else(|| panic!("{}: no translation for request kind {:?}", self.name, kind))
    }

    pub fn final_command_for_opcode(&self, opcode: Opcode) -> CmdId {
        self.aim_translations[opcode as usize].unwrap_or_else(|| {
            panic!(
                "{}: opcode {:?} has no device command on this family",
                self.name, opcode
            )
        })
    }

    /// Helper for building per-[level][command] policy tables.
    pub fn empty_preqs(&self) -> Vec<Vec<Option<PreqPolicy>>> {
        vec![vec![None; self.commands.len()]; self.levels.len()]
    }

    pub fn empty_actions(&self) -> Vec<Vec<Vec<ActionPolicy>>> {
        vec![vec![Vec::new(); self.commands.len()]; self.levels.len()]
    }
}

/// JEDEC rounding of a nanosecond timing into clock cycles: round up, but
/// forgive the last 1% to absorb the fixed-point error in datasheets.
pub fn jedec_rounding(t_ns: i64, tck_ps: i64) -> i64 {
    ((t_ns as f64 * 1000.0) / tck_ps as f64 - 0.01).ceil() as i64
}
