//! Timing-constraint table. Constraint rows are written with command and
//! level names for legibility at build time, then flattened into per
//! `(level, preceding-command)` edge buckets so that issuing a command
//! touches exactly the buckets that name it. Windowed rows (the nFAW
//! class) keep a ring of recent issue clocks at the scoped node.

use log::debug;

use super::spec::{CmdId, DeviceSpec, LevelId};

/// One constraint row as written by a device family definition:
/// after any of `preceding` issues at a node of `level`, none of
/// `following` may issue before `latency` cycles have passed.
pub struct ConstraintRow {
    pub level: &'static str,
    pub preceding: &'static [&'static str],
    pub following: &'static [&'static str],
    pub latency: i64,
    /// 0 for plain constraints; otherwise the sliding-window depth
    /// (e.g. 4 for a four-activate window).
    pub window: usize,
    /// Apply to sibling nodes at the same level instead of the node on
    /// the command's own path.
    pub is_sibling: bool,
}

impl ConstraintRow {
    pub const fn plain(
        level: &'static str,
        preceding: &'static [&'static str],
        following: &'static [&'static str],
        latency: i64,
    ) -> Self {
        ConstraintRow {
            level,
            preceding,
            following,
            latency,
            window: 0,
            is_sibling: false,
        }
    }

    pub const fn sibling(
        level: &'static str,
        preceding: &'static [&'static str],
        following: &'static [&'static str],
        latency: i64,
    ) -> Self {
        ConstraintRow {
            level,
            preceding,
            following,
            latency,
            window: 0,
            is_sibling: true,
        }
    }

    pub const fn windowed(
        level: &'static str,
        preceding: &'static [&'static str],
        following: &'static [&'static str],
        latency: i64,
        window: usize,
    ) -> Self {
        ConstraintRow {
            level,
            preceding,
            following,
            latency,
            window,
            is_sibling: false,
        }
    }
}

/// Resolved edge: issuing the bucket's preceding command pushes
/// `next_possible[cmd]` to at least `clk + latency`.
#[derive(Debug, Clone, Copy)]
pub struct TimingEdge {
    pub cmd: CmdId,
    pub latency: i64,
    pub is_sibling: bool,
}

/// Resolved windowed rule. Nodes of `level` keep a ring of the last
/// `window - 1` issue clocks of any member command; once the ring is
/// full, the followers may not issue before `ring_front + latency`.
#[derive(Debug, Clone)]
pub struct WindowRule {
    pub level: LevelId,
    pub member: Vec<bool>,
    pub following: Vec<CmdId>,
    pub latency: i64,
    pub window: usize,
}

pub struct TimingTable {
    /// `edges[level][preceding]` — consulted once per issue per level.
    edges: Vec<Vec<Vec<TimingEdge>>>,
    windows: Vec<WindowRule>,
}

impl TimingTable {
    pub fn edges_for(&self, level: LevelId, cmd: CmdId) -> &[TimingEdge] {
        &self.edges[level][cmd]
    }

    pub fn windows(&self) -> &[WindowRule] {
        &self.windows
    }

    /// Flatten constraint rows into runtime buckets. Unknown command or
    /// level names are fatal, so dead rules must be removed from the
    /// tables rather than carried along. Rows whose resolved latency is
    /// not positive impose nothing and are dropped.
    pub fn build(spec_name: &str, levels_len: usize, spec: &ResolveCtx, rows: &[ConstraintRow]) -> Self {
        let mut edges = vec![vec![Vec::new(); spec.num_commands]; levels_len];
        let mut windows = Vec::new();

        for row in rows {
            if row.latency <= 0 {
                debug!(
                    "{}: dropping constraint {:?} -> {:?} with non-positive latency {}",
                    spec_name, row.preceding, row.following, row.latency
                );
                continue;
            }
            let level = spec.level(row.level);
            if row.window > 0 {
                let mut member = vec![false; spec.num_commands];
                for name in row.preceding {
                    member[spec.cmd(name)] = true;
                }
                windows.push(WindowRule {
                    level,
                    member,
                    following: row.following.iter().map(|n| spec.cmd(n)).collect(),
                    latency: row.latency,
                    window: row.window,
                });
                continue;
            }
            for pre in row.preceding {
                let pre = spec.cmd(pre);
                for fol in row.following {
                    edges[level][pre].push(TimingEdge {
                        cmd: spec.cmd(fol),
                        latency: row.latency,
                        is_sibling: row.is_sibling,
                    });
                }
            }
        }

        TimingTable { edges, windows }
    }
}

/// Name-resolution context handed to the table builder, so the builder
/// does not need a fully-constructed `DeviceSpec`.
pub struct ResolveCtx {
    pub num_commands: usize,
    cmd_names: Vec<&'static str>,
    level_names: Vec<&'static str>,
    spec_name: &'static str,
}

impl ResolveCtx {
    pub fn new(spec_name: &'static str, cmd_names: Vec<&'static str>, level_names: Vec<&'static str>) -> Self {
        ResolveCtx {
            num_commands: cmd_names.len(),
            cmd_names,
            level_names,
            spec_name,
        }
    }

    pub fn for_spec(spec: &DeviceSpec) -> Self {
        ResolveCtx {
            num_commands: spec.num_commands(),
            cmd_names: spec.commands.iter().map(|c| c.name).collect(),
            level_names: (0..spec.levels.len()).map(|i| spec.levels.name(i)).collect(),
            spec_name: spec.name,
        }
    }

    fn cmd(&self, name: &str) -> CmdId {
        self.cmd_names
            .iter()
            .position(|n| *n == name)
            .unwrap_or_else(|| panic!("{}: timing rule names unknown command \"{}\"", self.spec_name, name))
    }

    fn level(&self, name: &str) -> LevelId {
        self.level_names
            .iter()
            .position(|n| *n == name)
            .unwrap_or_else(|| panic!("{}: timing rule names unknown level \"{}\"", self.spec_name, name))
    }
}
