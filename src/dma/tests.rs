use std::cell::Cell;
use std::rc::Rc;

use super::AimDma;
use crate::controller::CtrlConfig;
use crate::dram::Dram;
use crate::request::{Opcode, Region, ReqKind, Request};

fn aim_dma() -> AimDma {
    let dram = Dram::from_presets("GDDR6", "GDDR6_AiM_org", "GDDR6_AiM_timing");
    AimDma::new(dram, &CtrlConfig::default(), 1)
}

fn aim_host(opcode: Opcode, host_req_id: i64) -> Request {
    let mut req = Request::new_aim(opcode);
    req.host_req_id = host_req_id;
    req
}

fn run_until_drained(dma: &mut AimDma, bound: u64) {
    for _ in 0..bound {
        dma.tick();
        if dma.host_queue_len() == 0
            && dma.stalled_aim_requests() == 0
            && dma.controllers().iter().all(|c| c.is_idle())
        {
            return;
        }
    }
    panic!("DMA did not drain within {} cycles", bound);
}

#[test]
fn mac_abk_fans_out_to_every_channel() {
    let mut dma = aim_dma();
    let mut host = aim_host(Opcode::MacAbk, 0);
    host.opsize = 4;
    host.channel_mask = 0xFFFF_FFFF;
    host.row_addr = 2;
    assert!(dma.send(host));

    dma.tick();
    // 4 x 32 children, four per channel; the host request is complete
    // because MAC_ABK children do not block.
    assert_eq!(dma.host_queue_len(), 0);
    for ctrl in dma.controllers() {
        assert_eq!(ctrl.aim_buffer_len(), 4);
    }
    assert_eq!(dma.stats().aim_requests(Opcode::MacAbk), 1);

    run_until_drained(&mut dma, 10_000);
    for ch in 0..dma.dram.num_channels() {
        assert_eq!(dma.dram.open_rows(ch), 0xFFFF, "channel {}", ch);
        for bank in 0..16 {
            assert!(dma.dram.channel(ch).bank_has_row(&dma.dram.spec, bank, 2));
        }
        // One mass activate, then the remaining bursts ride the open rows.
        let stats = dma.controllers()[ch].stats();
        assert_eq!(stats.row_misses, 1);
        assert_eq!(stats.row_hits, 3);
    }
}

#[test]
fn wr_sbk_lands_on_the_masked_channel_as_a_write() {
    let mut dma = aim_dma();
    let mut host = aim_host(Opcode::WrSbk, 0);
    host.opsize = 1;
    host.gpr_addr_0 = 0;
    host.channel_mask = 0x1;
    host.bank_index = 0;
    host.row_addr = 0;
    host.col_addr = 0;
    assert!(dma.send(host));

    dma.tick();
    assert_eq!(dma.host_queue_len(), 0);
    assert!(!dma.controllers()[0].is_idle());
    for ctrl in &dma.controllers()[1..] {
        assert!(ctrl.is_idle());
    }

    run_until_drained(&mut dma, 1_000);
    assert!(dma.dram.channel(0).bank_has_row(&dma.dram.spec, 0, 0));
}

#[test]
fn blocking_children_gate_the_host_request() {
    let mut dma = aim_dma();
    let mut host = aim_host(Opcode::RdMac, 0);
    host.gpr_addr_0 = 0;
    host.channel_mask = 0b11;
    assert!(dma.send(host));

    dma.tick();
    assert_eq!(dma.stalled_aim_requests(), 2);

    for _ in 0..500 {
        if dma.stalled_aim_requests() > 0 {
            // The host request stays at the head until every blocking
            // child has called back.
            assert_eq!(dma.host_queue_len(), 1);
        }
        dma.tick();
    }
    assert_eq!(dma.stalled_aim_requests(), 0);
    assert_eq!(dma.host_queue_len(), 0);
}

#[test]
fn cfr_write_feeds_af_row_synthesis() {
    let mut dma = aim_dma();
    let mut cfr_write = Request::new_rw(ReqKind::Write, Region::Cfr);
    cfr_write.host_req_id = 0;
    cfr_write.addr = 2;
    cfr_write.data = 5;
    assert!(dma.send(cfr_write));
    dma.tick();
    assert_eq!(dma.cfr().afm, 5);
    assert_eq!(dma.host_queue_len(), 0);

    let mut af = aim_host(Opcode::Af, 1);
    af.channel_mask = 0x1;
    assert!(dma.send(af));
    run_until_drained(&mut dma, 2_000);

    // The LUT page address is architectural: (1 << 29) + AFM.
    let af_row = (1 << 29) + 5;
    assert!(dma.dram.channel(0).bank_has_row(&dma.dram.spec, 0, af_row));
    assert_eq!(dma.dram.open_rows(0), 0xFFFF);
}

#[test]
#[should_panic(expected = "unknown CFR")]
fn unknown_cfr_address_is_fatal() {
    let mut dma = aim_dma();
    let mut cfr_write = Request::new_rw(ReqKind::Write, Region::Cfr);
    cfr_write.addr = 9;
    cfr_write.data = 1;
    assert!(dma.send(cfr_write));
    dma.tick();
}

#[test]
fn ewadd_completes_locally() {
    let mut dma = aim_dma();
    let (count, callback) = {
        let count = Rc::new(Cell::new(0u32));
        let captured = Rc::clone(&count);
        let cb: Rc<dyn Fn(&Request)> = Rc::new(move |_| captured.set(captured.get() + 1));
        (count, cb)
    };
    let mut host = aim_host(Opcode::Ewadd, 0);
    host.opsize = 1;
    host.gpr_addr_0 = 1;
    host.gpr_addr_1 = 2;
    host.callback = Some(callback);
    assert!(dma.send(host));
    dma.tick();
    assert_eq!(count.get(), 1);
    assert_eq!(dma.host_queue_len(), 0);
    assert!(dma.controllers().iter().all(|c| c.is_idle()));
}

#[test]
#[should_panic(expected = "not supported")]
fn wr_aflut_is_fatal() {
    let mut dma = aim_dma();
    let mut host = aim_host(Opcode::WrAflut, 0);
    host.opsize = 1;
    assert!(dma.send(host));
    dma.tick();
}

#[test]
#[should_panic(expected = "exactly 1 channel")]
fn wr_abk_requires_single_channel_mask() {
    let mut dma = aim_dma();
    let mut host = aim_host(Opcode::WrAbk, 0);
    host.gpr_addr_0 = 0;
    host.channel_mask = 0b11;
    host.row_addr = 0;
    assert!(dma.send(host));
    dma.tick();
}

#[test]
fn backlog_absorbs_controller_backpressure() {
    let mut dma = aim_dma();
    let mut host = aim_host(Opcode::MacAbk, 0);
    host.opsize = 40;
    host.channel_mask = 0x1;
    host.row_addr = 0;
    assert!(dma.send(host));

    dma.tick();
    // Channel 0's AiM buffer fills; the overflow waits in the backlog
    // and the host request stays at the head.
    assert_eq!(dma.controllers()[0].aim_buffer_len(), 32);
    assert_eq!(dma.host_queue_len(), 1);

    run_until_drained(&mut dma, 20_000);
}

#[test]
fn sync_blocks_on_every_channel() {
    let mut dma = aim_dma();
    let host = aim_host(Opcode::Sync, 0);
    assert!(dma.send(host));
    dma.tick();
    assert_eq!(dma.stalled_aim_requests(), 32);
    assert_eq!(dma.host_queue_len(), 1);
    run_until_drained(&mut dma, 1_000);
}
