use std::cell::Cell;
use std::rc::Rc;

use super::{ChannelCtrl, CtrlConfig};
use crate::dma::addr::tag_addr_vec;
use crate::dram::gddr6;
use crate::dram::timing::{ConstraintRow, ResolveCtx, TimingTable};
use crate::dram::Dram;
use crate::request::{Opcode, Region, ReqKind, Request};

fn aim_dram() -> Dram {
    Dram::from_presets("GDDR6", "GDDR6_AiM_org", "GDDR6_AiM_timing")
}

fn ctrl(dram: &Dram) -> ChannelCtrl {
    ChannelCtrl::new(dram, 0, &CtrlConfig::default())
}

/// One device-clock cycle, in the order the DMA drives it.
fn step(dram: &mut Dram, ctrl: &mut ChannelCtrl) {
    dram.tick();
    ctrl.tick(dram);
}

fn mem_req(dram: &Dram, kind: ReqKind, bank: i64, row: i64, addr: i64) -> Request {
    let mut req = Request::new_rw(kind, Region::Mem);
    req.bank_index = bank;
    req.row_addr = row;
    req.col_addr = 0;
    req.addr = addr;
    tag_addr_vec(&dram.spec, &mut req, 0);
    req
}

fn aim_req(dram: &Dram, opcode: Opcode, bank: i64, row: i64) -> Request {
    let mut req = Request::new_aim(opcode);
    req.bank_index = bank;
    req.row_addr = row;
    req.col_addr = 0;
    tag_addr_vec(&dram.spec, &mut req, 0);
    req
}

fn counting_callback() -> (Rc<Cell<u32>>, Rc<dyn Fn(&Request)>) {
    let count = Rc::new(Cell::new(0u32));
    let captured = Rc::clone(&count);
    (count, Rc::new(move |_req: &Request| captured.set(captured.get() + 1)))
}

#[test]
fn raw_forwarding_departs_next_cycle() {
    let mut dram = aim_dram();
    let mut ctrl = ctrl(&dram);

    let write = mem_req(&dram, ReqKind::Write, 0, 0, 7);
    assert!(ctrl.send(write, &dram).is_ok());

    let fired = Rc::new(Cell::new(false));
    let captured = Rc::clone(&fired);
    let mut read = mem_req(&dram, ReqKind::Read, 0, 0, 7);
    read.callback = Some(Rc::new(move |req: &Request| {
        assert_eq!(req.depart - req.arrive, 1);
        captured.set(true);
    }));
    assert!(ctrl.send(read, &dram).is_ok());

    // The read bypassed scheduling entirely.
    assert_eq!(ctrl.read_buffer_len(), 0);
    assert_eq!(ctrl.pending_len(), 1);

    step(&mut dram, &mut ctrl);
    assert!(fired.get());
    assert_eq!(ctrl.pending_len(), 0);
    assert_eq!(ctrl.stats().row_hits, 0);
}

#[test]
fn unrelated_read_is_not_forwarded() {
    let dram = aim_dram();
    let mut ctrl = ctrl(&dram);
    assert!(ctrl.send(mem_req(&dram, ReqKind::Write, 0, 0, 7), &dram).is_ok());
    assert!(ctrl.send(mem_req(&dram, ReqKind::Read, 0, 0, 8), &dram).is_ok());
    assert_eq!(ctrl.read_buffer_len(), 1);
    assert_eq!(ctrl.pending_len(), 0);
}

#[test]
fn aim_and_ordinary_streams_are_exclusive() {
    let dram = aim_dram();
    let mut ctrl = ctrl(&dram);

    assert!(ctrl.send(mem_req(&dram, ReqKind::Write, 0, 0, 1), &dram).is_ok());
    let rejected = ctrl.send(aim_req(&dram, Opcode::MacAbk, -1, 0), &dram);
    assert!(rejected.is_err());

    let dram2 = aim_dram();
    let mut ctrl2 = ChannelCtrl::new(&dram2, 0, &CtrlConfig::default());
    assert!(ctrl2.send(aim_req(&dram2, Opcode::MacAbk, -1, 0), &dram2).is_ok());
    assert!(ctrl2.send(mem_req(&dram2, ReqKind::Read, 0, 0, 1), &dram2).is_err());
    assert!(ctrl2.send(mem_req(&dram2, ReqKind::Write, 0, 0, 2), &dram2).is_err());
}

#[test]
fn eoc_fires_callback_exactly_once() {
    let mut dram = aim_dram();
    let mut ctrl = ctrl(&dram);

    let (count, callback) = counting_callback();
    let mut eoc = Request::new_aim(Opcode::Eoc);
    eoc.callback = Some(callback);
    tag_addr_vec(&dram.spec, &mut eoc, 0);
    assert!(ctrl.send(eoc, &dram).is_ok());

    step(&mut dram, &mut ctrl);
    assert_eq!(ctrl.aim_buffer_len(), 0);
    assert_eq!(ctrl.pending_len(), 1);

    for _ in 0..5 {
        step(&mut dram, &mut ctrl);
    }
    assert_eq!(count.get(), 1);
    assert!(ctrl.is_idle());
}

#[test]
fn write_mode_watermarks() {
    let mut dram = aim_dram();
    let mut ctrl = ctrl(&dram);

    assert!(ctrl.send(mem_req(&dram, ReqKind::Read, 0, 99, 999), &dram).is_ok());
    for i in 0..26i64 {
        let req = mem_req(&dram, ReqKind::Write, i % 16, i / 16, 100 + i);
        assert!(ctrl.send(req, &dram).is_ok());
    }
    assert!(!ctrl.is_write_mode());

    // 26 writes exceed the 0.8 * 32 high watermark.
    step(&mut dram, &mut ctrl);
    assert!(ctrl.is_write_mode());

    let mut was_write_mode = true;
    for _ in 0..20_000 {
        step(&mut dram, &mut ctrl);
        if was_write_mode && !ctrl.is_write_mode() {
            // Exit requires dropping below 0.2 * 32 with reads waiting.
            assert!(ctrl.write_buffer_len() < 7);
        }
        was_write_mode = ctrl.is_write_mode();
        if ctrl.is_idle() {
            break;
        }
    }
    assert!(ctrl.is_idle());
    assert!(!ctrl.is_write_mode());
}

#[test]
fn nonready_priority_head_blocks_other_buffers() {
    let mut dram = aim_dram();
    let mut ctrl = ctrl(&dram);

    // Open a row so the refresh prerequisite (close everything) is not
    // immediately ready.
    assert!(ctrl.send(mem_req(&dram, ReqKind::Write, 0, 0, 1), &dram).is_ok());
    for _ in 0..3 {
        step(&mut dram, &mut ctrl);
        if ctrl.active_buffer_len() == 1 {
            break;
        }
    }
    assert_eq!(ctrl.active_buffer_len(), 1);

    assert!(ctrl.send(mem_req(&dram, ReqKind::Read, 4, 0, 2), &dram).is_ok());

    let mut refresh = Request::new(ReqKind::RefAllBank);
    let mut addr_vec = vec![-1i64; dram.spec.levels.len()];
    addr_vec[dram.spec.levels.channel] = 0;
    refresh.addr_vec = addr_vec;
    assert!(ctrl.priority_send(refresh, &dram).is_ok());

    for _ in 0..5_000 {
        if ctrl.priority_buffer_len() > 0 {
            // Strict priority: the read may not be served while the
            // refresh (or its precharge prerequisite) is pending.
            assert_eq!(ctrl.read_buffer_len(), 1);
        }
        step(&mut dram, &mut ctrl);
        if ctrl.is_idle() {
            break;
        }
    }
    assert!(ctrl.is_idle());
}

#[test]
fn closing_command_spares_active_rows() {
    // Stretched write timing so the precharge for the second write
    // becomes ready long before the first write completes.
    let mut spec = gddr6::build("GDDR6_AiM_org", "GDDR6_AiM_timing");
    let ctx = ResolveCtx::for_spec(&spec);
    spec.timing = TimingTable::build(
        "test",
        spec.levels.len(),
        &ctx,
        &[
            ConstraintRow::plain("bank", &["ACT"], &["WR"], 100),
            ConstraintRow::plain("bank", &["ACT"], &["PRE"], 5),
        ],
    );
    let mut dram = Dram::new(spec);
    let mut ctrl = ChannelCtrl::new(&dram, 0, &CtrlConfig::default());

    assert!(ctrl.send(mem_req(&dram, ReqKind::Write, 0, 0, 1), &dram).is_ok());
    step(&mut dram, &mut ctrl);
    assert_eq!(ctrl.active_buffer_len(), 1);

    assert!(ctrl.send(mem_req(&dram, ReqKind::Write, 0, 5, 2), &dram).is_ok());

    // While the first write holds its row open from the active buffer,
    // the second write's precharge must not interrupt it.
    while ctrl.active_buffer_len() == 1 {
        assert!(dram.channel(0).bank_has_row(&dram.spec, 0, 0));
        step(&mut dram, &mut ctrl);
        assert!(ctrl.clk() < 400, "first write never completed");
    }
    for _ in 0..400 {
        step(&mut dram, &mut ctrl);
        if ctrl.is_idle() {
            break;
        }
    }
    assert!(ctrl.is_idle());
    assert!(dram.channel(0).bank_has_row(&dram.spec, 0, 5));
}

#[test]
fn refresh_manager_issues_refab() {
    let mut spec = gddr6::build("GDDR6_AiM_org", "GDDR6_AiM_timing");
    spec.refresh_interval = 20;
    let act = spec.cmd("ACT");
    let mut dram = Dram::new(spec);
    let mut ctrl = ChannelCtrl::new(&dram, 0, &CtrlConfig::default());

    for _ in 0..30 {
        step(&mut dram, &mut ctrl);
    }
    assert_eq!(ctrl.priority_buffer_len(), 0);
    // The refresh-to-activate window proves a REFab went out.
    assert!(dram.channel(0).next_possible_at_root(act) > 0);
}
