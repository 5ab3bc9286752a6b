//! Per-channel node tree and the three walks the controller drives:
//! prerequisite translation, readiness, and issue. Nodes live in an arena
//! indexed by `usize`; the tree is built once per channel, down to the
//! bank level. Rows are tracked as a small map on the bank node, not as
//! materialized nodes.

use std::collections::{HashMap, VecDeque};

use crate::request::Clk;

use super::spec::{ActionPolicy, CmdId, DeviceSpec, NodeState, PreqPolicy, RowMaskEffect};

#[derive(Debug)]
pub struct Node {
    pub level: usize,
    pub node_id: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub state: NodeState,
    /// Which rows are currently active in this bank's row buffer.
    pub row_state: HashMap<i64, NodeState>,
    /// Earliest clock at which each command may issue at this node.
    pub next_possible: Vec<Clk>,
    /// Ring of recent issue clocks, one per windowed rule at this level.
    windows: Vec<VecDeque<Clk>>,
    /// Data-transfer sync horizon (WCK-synced families); `-1` = never.
    pub synced_until: Clk,
}

/// One channel's node tree plus the channel's 16-bit open-rows mask.
pub struct ChannelTree {
    nodes: Vec<Node>,
    root: usize,
    open_rows: u16,
}

impl ChannelTree {
    pub fn build(spec: &DeviceSpec, channel_id: usize) -> Self {
        let mut tree = ChannelTree {
            nodes: Vec::new(),
            root: 0,
            open_rows: 0,
        };
        let root = tree.alloc(spec, spec.levels.channel, channel_id, None);
        tree.root = root;
        tree.grow(spec, root);
        tree
    }

    fn alloc(&mut self, spec: &DeviceSpec, level: usize, node_id: usize, parent: Option<usize>) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node {
            level,
            node_id,
            parent,
            children: Vec::new(),
            state: spec.init_states[level],
            row_state: HashMap::new(),
            next_possible: vec![0; spec.num_commands()],
            windows: spec.timing.windows().iter().map(|_| VecDeque::new()).collect(),
            synced_until: -1,
        });
        idx
    }

    fn grow(&mut self, spec: &DeviceSpec, idx: usize) {
        let level = self.nodes[idx].level;
        if level >= spec.levels.bank {
            return;
        }
        let child_level = level + 1;
        for id in 0..spec.org.counts[child_level] {
            let child = self.alloc(spec, child_level, id, Some(idx));
            self.nodes[idx].children.push(child);
            self.grow(spec, child);
        }
    }

    pub fn open_rows(&self) -> u16 {
        self.open_rows
    }

    fn child_on_path(&self, idx: usize, addr_vec: &[i64]) -> Option<usize> {
        let node = &self.nodes[idx];
        if node.children.is_empty() {
            return None;
        }
        let child_id = *addr_vec.get(node.level + 1)?;
        if child_id < 0 {
            return None;
        }
        let child_id = child_id as usize;
        if child_id >= node.children.len() {
            panic!(
                "address vector entry {} out of range at level {}",
                child_id,
                node.level + 1
            );
        }
        Some(node.children[child_id])
    }

    /// Translate the desired final command into the next command that can
    /// legally issue given current node states.
    pub fn get_preq_command(&self, spec: &DeviceSpec, final_cmd: CmdId, addr_vec: &[i64], clk: Clk) -> CmdId {
        let mut cmd = final_cmd;
        let mut idx = self.root;
        loop {
            let level = self.nodes[idx].level;
            if let Some(policy) = spec.preqs[level][cmd] {
                cmd = self.eval_preq(spec, idx, policy, cmd, addr_vec, clk);
            }
            if spec.scope(cmd) <= self.nodes[idx].level {
                return cmd;
            }
            match self.child_on_path(idx, addr_vec) {
                Some(child) => idx = child,
                None => return cmd,
            }
        }
    }

    /// True iff `cmd` may issue at `clk` at every node along its path.
    pub fn check_ready(&self, spec: &DeviceSpec, cmd: CmdId, addr_vec: &[i64], clk: Clk) -> bool {
        let mut idx = self.root;
        loop {
            let node = &self.nodes[idx];
            if node.next_possible[cmd] > clk {
                return false;
            }
            if spec.scope(cmd) <= node.level {
                return true;
            }
            match self.child_on_path(idx, addr_vec) {
                Some(child) => idx = child,
                None => return true,
            }
        }
    }

    /// Issue `cmd`: advance timing state, apply node state actions, and
    /// update the open-rows mask. Readiness must have been checked.
    pub fn issue(&mut self, spec: &DeviceSpec, cmd: CmdId, addr_vec: &[i64], clk: Clk) {
        self.update_timing(spec, cmd, addr_vec, clk);
        self.update_states(spec, cmd, addr_vec, clk);
        self.update_row_mask(spec, cmd, addr_vec);
    }

    fn update_timing(&mut self, spec: &DeviceSpec, cmd: CmdId, addr_vec: &[i64], clk: Clk) {
        let mut idx = self.root;
        loop {
            let level = self.nodes[idx].level;
            for edge in spec.timing.edges_for(level, cmd) {
                let bound = clk + edge.latency;
                if edge.is_sibling {
                    if let Some(parent) = self.nodes[idx].parent {
                        let siblings: Vec<usize> = self.nodes[parent]
                            .children
                            .iter()
                            .copied()
                            .filter(|s| *s != idx)
                            .collect();
                        for sib in siblings {
                            let slot = &mut self.nodes[sib].next_possible[edge.cmd];
                            *slot = (*slot).max(bound);
                        }
                    }
                } else {
                    let slot = &mut self.nodes[idx].next_possible[edge.cmd];
                    *slot = (*slot).max(bound);
                }
            }
            for (ri, rule) in spec.timing.windows().iter().enumerate() {
                if rule.level != level || !rule.member[cmd] {
                    continue;
                }
                let node = &mut self.nodes[idx];
                node.windows[ri].push_back(clk);
                while node.windows[ri].len() > rule.window - 1 {
                    node.windows[ri].pop_front();
                }
                if node.windows[ri].len() == rule.window - 1 {
                    let bound = node.windows[ri].front().copied().unwrap_or(clk) + rule.latency;
                    for fol in &rule.following {
                        node.next_possible[*fol] = node.next_possible[*fol].max(bound);
                    }
                }
            }
            if spec.scope(cmd) <= level {
                return;
            }
            match self.child_on_path(idx, addr_vec) {
                Some(child) => idx = child,
                None => return,
            }
        }
    }

    fn update_states(&mut self, spec: &DeviceSpec, cmd: CmdId, addr_vec: &[i64], clk: Clk) {
        let mut idx = self.root;
        loop {
            let level = self.nodes[idx].level;
            let actions: Vec<ActionPolicy> = spec.actions[level][cmd].clone();
            for action in actions {
                self.apply_action(spec, idx, action, addr_vec, clk);
            }
            if spec.scope(cmd) <= level {
                return;
            }
            match self.child_on_path(idx, addr_vec) {
                Some(child) => idx = child,
                None => return,
            }
        }
    }

    fn apply_action(&mut self, spec: &DeviceSpec, idx: usize, action: ActionPolicy, addr_vec: &[i64], clk: Clk) {
        let row_id = addr_vec.get(spec.levels.row).copied().unwrap_or(-1);
        match action {
            ActionPolicy::OpenRow => self.set_bank(idx, NodeState::Opened, row_id),
            ActionPolicy::PreOpenRow => self.set_bank(idx, NodeState::PreOpened, row_id),
            ActionPolicy::CloseRow => self.close_bank(idx),
            ActionPolicy::OpenGroupRows => {
                for bank in self.nodes[idx].children.clone() {
                    self.set_bank(bank, NodeState::Opened, row_id);
                }
            }
            ActionPolicy::PreOpenGroupRows => {
                for bank in self.nodes[idx].children.clone() {
                    self.set_bank(bank, NodeState::PreOpened, row_id);
                }
            }
            ActionPolicy::CloseGroupRows => {
                for bank in self.nodes[idx].children.clone() {
                    self.close_bank(bank);
                }
            }
            ActionPolicy::OpenAllRows => {
                for bank in self.bank_descendants(spec, idx) {
                    self.set_bank(bank, NodeState::Opened, row_id);
                }
            }
            ActionPolicy::PreOpenAllRows => {
                for bank in self.bank_descendants(spec, idx) {
                    self.set_bank(bank, NodeState::PreOpened, row_id);
                }
            }
            ActionPolicy::CloseAllRows => {
                for bank in self.bank_descendants(spec, idx) {
                    self.close_bank(bank);
                }
            }
            ActionPolicy::SetSync { horizon } => {
                self.nodes[idx].synced_until = clk + horizon;
            }
        }
    }

    fn set_bank(&mut self, idx: usize, state: NodeState, row_id: i64) {
        debug_assert!(row_id != -1, "open action without a row address");
        let node = &mut self.nodes[idx];
        node.state = state;
        node.row_state.insert(row_id, state);
    }

    fn close_bank(&mut self, idx: usize) {
        let node = &mut self.nodes[idx];
        node.state = NodeState::Closed;
        node.row_state.clear();
    }

    fn update_row_mask(&mut self, spec: &DeviceSpec, cmd: CmdId, addr_vec: &[i64]) {
        let banks_per_group = spec.banks_per_group();
        let flat_bank = || {
            let bg = addr_vec[spec.levels.bankgroup];
            let ba = addr_vec[spec.levels.bank];
            debug_assert!(bg >= 0 && ba >= 0);
            (bg as usize) * banks_per_group + ba as usize
        };
        match spec.row_mask[cmd] {
            RowMaskEffect::None => {}
            RowMaskEffect::SetBank => self.open_rows |= 1 << flat_bank(),
            RowMaskEffect::ClearBank => self.open_rows &= !(1 << flat_bank()),
            RowMaskEffect::SetGroup => {
                let bg = addr_vec[spec.levels.bankgroup] as usize;
                for b in bg * banks_per_group..(bg + 1) * banks_per_group {
                    self.open_rows |= 1 << b;
                }
            }
            RowMaskEffect::ClearGroup => {
                let bg = addr_vec[spec.levels.bankgroup] as usize;
                for b in bg * banks_per_group..(bg + 1) * banks_per_group {
                    self.open_rows &= !(1 << b);
                }
            }
            RowMaskEffect::SetAll => self.open_rows = 0xFFFF,
            RowMaskEffect::ClearAll => self.open_rows = 0,
        }
    }

    fn eval_preq(
        &self,
        spec: &DeviceSpec,
        idx: usize,
        policy: PreqPolicy,
        cmd: CmdId,
        addr_vec: &[i64],
        clk: Clk,
    ) -> CmdId {
        match policy {
            PreqPolicy::RequireRowOpen { act, act2, pre, cas } => {
                let row_id = addr_vec[spec.levels.row];
                let node = &self.nodes[idx];
                match node.state {
                    NodeState::Closed => act,
                    NodeState::PreOpened => act2.unwrap_or(act),
                    NodeState::Opened => {
                        if node.row_state.contains_key(&row_id) {
                            match cas {
                                Some(cas) if !self.rank_synced(spec, idx, clk) => cas,
                                _ => cmd,
                            }
                        } else {
                            pre
                        }
                    }
                    other => panic!(
                        "invalid bank state {:?} for {} at {}",
                        other,
                        spec.cmd_name(cmd),
                        spec.levels.name(node.level)
                    ),
                }
            }
            PreqPolicy::RequireBankClosed { pre } => match self.nodes[idx].state {
                NodeState::Closed => cmd,
                NodeState::Opened | NodeState::PreOpened => pre,
                other => panic!("invalid bank state {:?} for {}", other, spec.cmd_name(cmd)),
            },
            PreqPolicy::RequireAllBanksClosed { prea } => {
                for bank in self.bank_descendants(spec, idx) {
                    if self.nodes[bank].state != NodeState::Closed {
                        return prea;
                    }
                }
                cmd
            }
            PreqPolicy::RequireAllRowsOpen { act_all, act2_all, prea } => {
                let row_id = addr_vec[spec.levels.row];
                assert!(row_id != -1, "all-rows-open prerequisite without a row address");
                let mut any_pre_opened = false;
                for bank in self.bank_descendants(spec, idx) {
                    match self.nodes[bank].state {
                        NodeState::Closed => {}
                        NodeState::PreOpened => any_pre_opened = true,
                        NodeState::Opened => {
                            if !self.nodes[bank].row_state.contains_key(&row_id) {
                                return prea;
                            }
                        }
                        other => panic!("invalid bank state {:?} for {}", other, spec.cmd_name(cmd)),
                    }
                }
                // Any closed bank shows up as a hole in the open-rows
                // mask, which is the O(1) check.
                if self.open_rows != 0xFFFF {
                    return act_all;
                }
                if any_pre_opened {
                    return act2_all.unwrap_or(act_all);
                }
                cmd
            }
            PreqPolicy::RequireBankPairClosed { pre, pair_stride } => {
                let target = addr_vec[spec.levels.bankgroup].max(0) as usize * spec.banks_per_group()
                    + addr_vec[spec.levels.bank].max(0) as usize;
                let pair = (target + pair_stride) % 16;
                for (flat, bank) in self.bank_descendants(spec, idx).into_iter().enumerate() {
                    if (flat == target || flat == pair) && self.nodes[bank].state != NodeState::Closed {
                        return pre;
                    }
                }
                cmd
            }
            PreqPolicy::RequireSynced { cas } => {
                if self.nodes[idx].synced_until < clk {
                    cas
                } else {
                    cmd
                }
            }
        }
    }

    fn rank_synced(&self, spec: &DeviceSpec, idx: usize, clk: Clk) -> bool {
        let rank_level = spec.levels.rank.unwrap_or(spec.levels.channel);
        let mut cur = idx;
        loop {
            let node = &self.nodes[cur];
            if node.level == rank_level {
                return node.synced_until >= clk;
            }
            match node.parent {
                Some(parent) => cur = parent,
                None => return false,
            }
        }
    }

    /// Flat-order bank nodes under `idx` (which may itself be a bank).
    fn bank_descendants(&self, spec: &DeviceSpec, idx: usize) -> Vec<usize> {
        let mut banks = Vec::new();
        self.collect_banks(spec, idx, &mut banks);
        banks
    }

    fn collect_banks(&self, spec: &DeviceSpec, idx: usize, out: &mut Vec<usize>) {
        let node = &self.nodes[idx];
        if node.level == spec.levels.bank {
            out.push(idx);
            return;
        }
        for child in &node.children {
            self.collect_banks(spec, *child, out);
        }
    }

    /// Test and stats access to a bank's state by flat index.
    pub fn bank_state(&self, spec: &DeviceSpec, flat_bank: usize) -> NodeState {
        let banks = self.bank_descendants(spec, self.root);
        self.nodes[banks[flat_bank]].state
    }

    pub fn bank_has_row(&self, spec: &DeviceSpec, flat_bank: usize, row: i64) -> bool {
        let banks = self.bank_descendants(spec, self.root);
        self.nodes[banks[flat_bank]].row_state.contains_key(&row)
    }

    pub fn next_possible_at_root(&self, cmd: CmdId) -> Clk {
        self.nodes[self.root].next_possible[cmd]
    }
}
