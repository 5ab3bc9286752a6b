use super::gddr6;
use super::spec::{jedec_rounding, Organization};
use super::timing::{ConstraintRow, ResolveCtx, TimingTable};
use super::Dram;
use crate::request::{Opcode, ReqKind};

fn aim_dram() -> Dram {
    Dram::from_presets("GDDR6", "GDDR6_AiM_org", "GDDR6_AiM_timing")
}

/// GDDR6 address vector: channel, bankgroup, bank, row, column.
fn av(ch: i64, bg: i64, ba: i64, row: i64, col: i64) -> Vec<i64> {
    vec![ch, bg, ba, row, col]
}

/// Rebuild the AiM device with a replacement constraint table, keeping
/// states and policies; used to probe the timing engine in isolation.
fn doctored(rows: Vec<ConstraintRow>) -> Dram {
    let mut spec = gddr6::build("GDDR6_AiM_org", "GDDR6_AiM_timing");
    let ctx = ResolveCtx::for_spec(&spec);
    spec.timing = TimingTable::build("test", spec.levels.len(), &ctx, &rows);
    Dram::new(spec)
}

#[test]
fn read_on_closed_bank_requires_activate() {
    let dram = aim_dram();
    let rd = dram.spec.cmd("RD");
    let act = dram.spec.cmd("ACT");
    assert_eq!(dram.get_preq_command(rd, &av(0, 0, 0, 5, 0)), act);
}

#[test]
fn activate_opens_row_and_sets_mask() {
    let mut dram = aim_dram();
    let rd = dram.spec.cmd("RD");
    let act = dram.spec.cmd("ACT");
    dram.issue_command(act, &av(0, 0, 0, 5, -1));
    assert_eq!(dram.get_preq_command(rd, &av(0, 0, 0, 5, 0)), rd);
    assert!(dram.channel(0).bank_has_row(&dram.spec, 0, 5));
    assert_eq!(dram.open_rows(0), 0b1);
    assert_eq!(dram.open_rows(1), 0);
}

#[test]
fn conflicting_row_requires_precharge() {
    let mut dram = aim_dram();
    let rd = dram.spec.cmd("RD");
    let act = dram.spec.cmd("ACT");
    let pre = dram.spec.cmd("PRE");
    dram.issue_command(act, &av(0, 0, 0, 5, -1));
    assert_eq!(dram.get_preq_command(rd, &av(0, 0, 0, 9, 0)), pre);
}

#[test]
fn activate_to_read_obeys_rcd() {
    let mut dram = aim_dram();
    let rd = dram.spec.cmd("RD");
    let act = dram.spec.cmd("ACT");
    let nrcdrd = dram.spec.timings.get("nRCDRD");
    dram.issue_command(act, &av(0, 0, 0, 5, -1));
    while dram.clk() < nrcdrd {
        assert!(!dram.check_ready(rd, &av(0, 0, 0, 5, 0)), "clk {}", dram.clk());
        dram.tick();
    }
    assert!(dram.check_ready(rd, &av(0, 0, 0, 5, 0)));
}

#[test]
fn precharge_waits_for_ras() {
    let mut dram = aim_dram();
    let act = dram.spec.cmd("ACT");
    let pre = dram.spec.cmd("PRE");
    let nras = dram.spec.timings.get("nRAS");
    dram.issue_command(act, &av(0, 0, 0, 5, -1));
    while dram.clk() < nras {
        assert!(!dram.check_ready(pre, &av(0, 0, 0, -1, -1)));
        dram.tick();
    }
    assert!(dram.check_ready(pre, &av(0, 0, 0, -1, -1)));
}

#[test]
fn mass_open_prerequisite_chain() {
    let mut dram = aim_dram();
    let mac16 = dram.spec.cmd("MAC16");
    let act16 = dram.spec.cmd("ACT16");
    let prea = dram.spec.cmd("PREA");
    let target = av(0, -1, -1, 3, 0);

    // All banks closed: a mass activate comes first.
    assert_eq!(dram.get_preq_command(mac16, &target), act16);
    dram.issue_command(act16, &target);
    assert_eq!(dram.open_rows(0), 0xFFFF);
    assert_eq!(dram.get_preq_command(mac16, &target), mac16);

    // A bank holding a different row forces a full precharge.
    assert_eq!(dram.get_preq_command(mac16, &av(0, -1, -1, 9, 0)), prea);
    dram.issue_command(prea, &av(0, -1, -1, -1, -1));
    assert_eq!(dram.open_rows(0), 0);
    for bank in 0..16 {
        assert!(!dram.channel(0).bank_has_row(&dram.spec, bank, 3));
    }
}

#[test]
fn refresh_requires_all_banks_closed() {
    let mut dram = aim_dram();
    let refab = dram.spec.cmd("REFab");
    let prea = dram.spec.cmd("PREA");
    let act = dram.spec.cmd("ACT");
    let refresh_vec = av(0, -1, -1, -1, -1);
    assert_eq!(dram.get_preq_command(refab, &refresh_vec), refab);
    dram.issue_command(act, &av(0, 1, 2, 7, -1));
    assert_eq!(dram.get_preq_command(refab, &refresh_vec), prea);
}

#[test]
fn rda_closes_bank_and_clears_mask() {
    let mut dram = aim_dram();
    let act = dram.spec.cmd("ACT");
    let rda = dram.spec.cmd("RDA");
    dram.issue_command(act, &av(0, 2, 1, 4, -1));
    assert_eq!(dram.open_rows(0), 1 << 9);
    dram.issue_command(rda, &av(0, 2, 1, 4, 0));
    assert_eq!(dram.open_rows(0), 0);
    assert!(!dram.channel(0).bank_has_row(&dram.spec, 9, 4));
}

#[test]
fn group_activate_covers_its_banks_only() {
    let mut dram = aim_dram();
    let act4 = dram.spec.cmd("ACT4");
    dram.issue_command(act4, &av(0, 1, -1, 7, -1));
    assert_eq!(dram.open_rows(0), 0b1111 << 4);
    for bank in 4..8 {
        assert!(dram.channel(0).bank_has_row(&dram.spec, bank, 7));
    }
    assert!(!dram.channel(0).bank_has_row(&dram.spec, 0, 7));
}

#[test]
fn four_activate_window_gates_fifth() {
    let mut dram = doctored(vec![ConstraintRow::windowed(
        "channel",
        &["ACT"],
        &["ACT"],
        28,
        4,
    )]);
    let act = dram.spec.cmd("ACT");
    for bank in 0..3 {
        assert!(dram.check_ready(act, &av(0, 0, bank, 1, -1)));
        dram.issue_command(act, &av(0, 0, bank, 1, -1));
        dram.tick();
    }
    // Ring holds issue clocks 0, 1, 2: the next activate waits for the
    // oldest plus the window latency.
    while dram.clk() < 28 {
        assert!(!dram.check_ready(act, &av(0, 1, 0, 1, -1)), "clk {}", dram.clk());
        dram.tick();
    }
    assert!(dram.check_ready(act, &av(0, 1, 0, 1, -1)));
}

#[test]
fn sibling_constraint_spares_own_node() {
    let mut dram = doctored(vec![ConstraintRow::sibling(
        "bankgroup",
        &["ACT"],
        &["ACT"],
        10,
    )]);
    let act = dram.spec.cmd("ACT");
    dram.issue_command(act, &av(0, 0, 0, 5, -1));
    // Another bank in the same group is unaffected; sibling groups wait.
    assert!(dram.check_ready(act, &av(0, 0, 1, 5, -1)));
    assert!(!dram.check_ready(act, &av(0, 1, 0, 5, -1)));
    for _ in 0..10 {
        dram.tick();
    }
    assert!(dram.check_ready(act, &av(0, 1, 0, 5, -1)));
}

#[test]
fn open_rows_mask_tracks_bank_states() {
    let mut dram = aim_dram();
    let spec_cmd = |dram: &Dram, name: &str| dram.spec.cmd(name);
    let steps: Vec<(&str, Vec<i64>)> = vec![
        ("ACT", av(0, 0, 0, 1, -1)),
        ("ACT", av(0, 3, 2, 1, -1)),
        ("ACT4", av(0, 1, -1, 2, -1)),
        ("PRE", av(0, 0, 0, -1, -1)),
        ("ACT16", av(0, -1, -1, 4, -1)),
        ("RDA", av(0, 2, 2, 4, 0)),
        ("PRE4", av(0, 1, -1, -1, -1)),
        ("WRA", av(0, 3, 3, 4, 0)),
        ("PREA", av(0, -1, -1, -1, -1)),
        ("ACT", av(0, 2, 0, 9, -1)),
    ];
    for (name, addr_vec) in steps {
        let cmd = spec_cmd(&dram, name);
        dram.issue_command(cmd, &addr_vec);
        // The mask bit for a bank is set iff any row in it is not closed.
        let mask = dram.open_rows(0);
        for bank in 0..16 {
            let open = dram.channel(0).bank_state(&dram.spec, bank)
                != crate::dram::spec::NodeState::Closed;
            assert_eq!(mask & (1 << bank) != 0, open, "{} bank {}", name, bank);
        }
        dram.tick();
    }
}

#[test]
fn final_command_translations() {
    let dram = aim_dram();
    assert_eq!(
        dram.spec.final_command_for_opcode(Opcode::MacAbk),
        dram.spec.cmd("MAC16")
    );
    assert_eq!(
        dram.spec.final_command_for_opcode(Opcode::WrSbk),
        dram.spec.cmd("WR")
    );
    assert_eq!(
        dram.spec.final_command_for_kind(ReqKind::Read),
        dram.spec.cmd("RD")
    );
    assert_eq!(
        dram.spec.final_command_for_kind(ReqKind::RefAllBank),
        dram.spec.cmd("REFab")
    );
}

#[test]
#[should_panic(expected = "no device command")]
fn aflut_has_no_device_command() {
    let dram = aim_dram();
    dram.spec.final_command_for_opcode(Opcode::WrAflut);
}

#[test]
#[should_panic(expected = "does not equal the declared density")]
fn density_mismatch_is_fatal() {
    let org = Organization {
        density_mbit: 4096,
        dq: 16,
        counts: vec![2, 4, 4, 1 << 14, 1 << 10],
    };
    org.check_density("test");
}

#[test]
fn jedec_rounding_rounds_up_with_guard() {
    assert_eq!(jedec_rounding(260, 1000), 260);
    assert_eq!(jedec_rounding(7800, 1000), 7800);
    assert_eq!(jedec_rounding(14, 1250), 12); // 11.2 cycles
    assert_eq!(jedec_rounding(10, 1000), 10); // exact stays exact
}

#[test]
fn lpddr5_two_phase_activation_with_cas_sync() {
    let mut dram = Dram::from_presets("LPDDR5", "LPDDR5_AiM_org", "LPDDR5_AiM_timing");
    let rd = dram.spec.cmd("RD");
    let act1 = dram.spec.cmd("ACT-1");
    let act2 = dram.spec.cmd("ACT-2");
    let casrd = dram.spec.cmd("CASRD");
    let v = |row: i64, col: i64| vec![0, 0, 0, 0, row, col];

    assert_eq!(dram.get_preq_command(rd, &v(5, 0)), act1);
    dram.issue_command(act1, &v(5, -1));
    assert_eq!(dram.get_preq_command(rd, &v(5, 0)), act2);
    assert_eq!(dram.open_rows(0), 0b1);
    dram.issue_command(act2, &v(5, -1));

    // Row open but the rank has never synced: CAS comes first.
    dram.tick();
    assert_eq!(dram.get_preq_command(rd, &v(5, 0)), casrd);
    dram.issue_command(casrd, &v(5, 0));
    assert_eq!(dram.get_preq_command(rd, &v(5, 0)), rd);
    assert!(dram.channel(0).bank_has_row(&dram.spec, 0, 5));
}

#[test]
fn lpddr5_mass_open_is_staged() {
    let mut dram = Dram::from_presets("LPDDR5", "LPDDR5_AiM_org", "LPDDR5_AiM_timing");
    let mac16 = dram.spec.cmd("MAC16");
    let act16_1 = dram.spec.cmd("ACT16-1");
    let act16_2 = dram.spec.cmd("ACT16-2");
    let target = vec![0, 0, -1, -1, 3, -1];

    assert_eq!(dram.get_preq_command(mac16, &target), act16_1);
    dram.issue_command(act16_1, &target);
    assert_eq!(dram.open_rows(0), 0xFFFF);
    assert_eq!(dram.get_preq_command(mac16, &target), act16_2);
    dram.issue_command(act16_2, &target);
    assert_eq!(dram.get_preq_command(mac16, &target), mac16);
}

#[test]
fn lpddr5_register_write_needs_sync() {
    let mut dram = Dram::from_presets("LPDDR5", "LPDDR5_AiM_org", "LPDDR5_AiM_timing");
    let wrgb = dram.spec.cmd("WRGB");
    let caswrgb = dram.spec.cmd("CASWRGB");
    let v = vec![0, 0, -1, -1, -1, -1];
    dram.tick();
    assert_eq!(dram.get_preq_command(wrgb, &v), caswrgb);
    dram.issue_command(caswrgb, &v);
    assert_eq!(dram.get_preq_command(wrgb, &v), wrgb);
}
