use crate::request::Opcode;
use crate::sim::config::{BufferConfig, SimConfig};
use crate::sim::stats;
use crate::sim::top::AimTop;

fn gddr6_config() -> SimConfig {
    SimConfig {
        timeout: 200_000,
        ..SimConfig::default()
    }
}

fn run_trace(trace: &str) -> AimTop {
    let mut top = AimTop::with_trace_str(&gddr6_config(), &BufferConfig::default(), trace);
    top.run();
    top
}

#[test]
fn single_wr_sbk_on_channel_zero() {
    let top = run_trace("AiM WR_SBK 1 0 0x00000001 0 0 0\nAiM EOC\n");

    let dma_stats = top.dma.stats();
    assert!(dma_stats.memory_system_cycles > 0);
    assert_eq!(dma_stats.aim_requests(Opcode::WrSbk), 1);
    assert_eq!(dma_stats.aim_requests(Opcode::Eoc), 1);

    // Mask bit 0 addresses channel 0; its write activated row 0.
    assert!(top.dma.dram.channel(0).bank_has_row(&top.dma.dram.spec, 0, 0));
    assert_eq!(top.dma.controllers()[0].stats().row_misses, 1);
    for ctrl in &top.dma.controllers()[1..] {
        assert_eq!(ctrl.stats().row_misses, 0);
    }
}

#[test]
fn mac_abk_across_all_channels() {
    let top = run_trace("AiM MAC_ABK 4 0xFFFFFFFF 2\nAiM EOC\n");

    assert_eq!(top.dma.stats().aim_requests(Opcode::MacAbk), 1);
    assert_eq!(top.dma.stalled_aim_requests(), 0);
    for ch in 0..top.dma.dram.num_channels() {
        // Every channel mass-activated row 2 and ran its four bursts.
        assert_eq!(top.dma.dram.open_rows(ch), 0xFFFF, "channel {}", ch);
        let stats = top.dma.controllers()[ch].stats();
        assert_eq!(stats.row_misses, 1, "channel {}", ch);
        assert_eq!(stats.row_hits, 3, "channel {}", ch);
    }
}

#[test]
fn buffered_write_forwards_to_read() {
    let top = run_trace(
        "W MEM 0 0 0 7\n\
         W MEM 0 1 0 8\n\
         W MEM 0 2 0 9\n\
         R MEM 0 1 0 8\n\
         AiM EOC\n",
    );

    let stats = top.dma.controllers()[0].stats();
    // Three writes each opened a row; the read was served out of the
    // write buffer without touching the DRAM.
    assert_eq!(stats.row_misses, 3);
    assert_eq!(stats.row_hits, 0);
    assert_eq!(stats.row_conflicts, 0);
    assert_eq!(top.dma.stats().rw_requests(crate::request::ReqKind::Read, crate::request::Region::Mem), 1);
}

#[test]
fn eoc_terminates_the_run() {
    let top = run_trace("AiM EOC\n");
    assert!(top.frontend.finished());
    assert!(top.dma.stats().memory_system_cycles < 100);
    assert_eq!(top.dma.stalled_aim_requests(), 0);
    for ctrl in top.dma.controllers() {
        assert!(ctrl.is_idle());
    }
}

#[test]
fn sync_drains_every_channel_before_completing() {
    let top = run_trace("AiM SYNC\nAiM EOC\n");
    assert_eq!(top.dma.stats().aim_requests(Opcode::Sync), 1);
    assert_eq!(top.dma.stalled_aim_requests(), 0);
    assert!(top.frontend.finished());
}

#[test]
fn comma_delimited_traces_parse() {
    let config = SimConfig {
        delimiter: ",".to_string(),
        timeout: 200_000,
        ..SimConfig::default()
    };
    let mut top = AimTop::with_trace_str(
        &config,
        &BufferConfig::default(),
        "AiM,WR_SBK,1,0,0x00000001,0,0,0\nAiM,EOC\n",
    );
    top.run();
    assert_eq!(top.dma.stats().aim_requests(Opcode::WrSbk), 1);
}

#[test]
fn comments_and_blank_lines_are_skipped() {
    let top = run_trace("# kernel prologue\n\n# barrier\nAiM EOC\n");
    assert!(top.frontend.finished());
}

#[test]
fn gpr_and_cfr_requests_complete_locally() {
    let top = run_trace(
        "W CFR 0 1\n\
         R GPR 16\n\
         W GPR 17\n\
         AiM EOC\n",
    );
    assert_eq!(top.dma.cfr().broadcast, 1);
    let stats = top.dma.stats();
    assert_eq!(stats.rw_requests(crate::request::ReqKind::Write, crate::request::Region::Cfr), 1);
    assert_eq!(stats.rw_requests(crate::request::ReqKind::Read, crate::request::Region::Gpr), 1);
    assert_eq!(stats.rw_requests(crate::request::ReqKind::Write, crate::request::Region::Gpr), 1);
}

#[test]
fn lpddr5_runs_the_same_kernel() {
    let config = SimConfig {
        device: "LPDDR5".to_string(),
        org_preset: "LPDDR5_AiM_org".to_string(),
        timing_preset: "LPDDR5_AiM_timing".to_string(),
        timeout: 200_000,
        ..SimConfig::default()
    };
    let mut top = AimTop::with_trace_str(
        &config,
        &BufferConfig::default(),
        "AiM WR_SBK 1 0 0x00000001 0 0 0\nAiM EOC\n",
    );
    top.run();
    // Two-phase activation still lands the row in the bank's buffer.
    assert!(top.dma.dram.channel(0).bank_has_row(&top.dma.dram.spec, 0, 0));
}

#[test]
fn clock_ratio_divides_controller_ticks() {
    let config = SimConfig {
        clock_ratio: 2,
        timeout: 200_000,
        ..SimConfig::default()
    };
    let mut top = AimTop::with_trace_str(&config, &BufferConfig::default(), "AiM EOC\n");
    top.run();
    assert!(top.frontend.finished());
    // The DMA saw more cycles than the controllers ticked.
    assert!(top.dma.clk() > top.dma.controllers()[0].clk());
}

#[test]
fn stats_report_carries_the_conventional_names() {
    let top = run_trace("AiM WR_SBK 1 0 0x00000001 0 0 0\nAiM EOC\n");
    let ctrl_stats: Vec<_> = top.dma.controllers().iter().map(|c| c.stats()).collect();
    let report = stats::report(top.dma.stats(), &ctrl_stats);
    assert!(report.contains_key("memory_system_cycles"));
    assert!(report.contains_key("total_num_ISR_full"));
    assert!(report.contains_key("total_num_R_MEM_requests"));
    assert_eq!(
        report["total_num_AiM_ISR_WR_SBK_requests"],
        toml::Value::Integer(1)
    );
    assert!(report.contains_key("channel_31_row_conflicts"));
}

#[test]
#[should_panic(expected = "requires 3 fields")]
fn wrong_aim_field_count_is_fatal() {
    run_trace("AiM MAC_ABK 4 0xFFFFFFFF\nAiM EOC\n");
}

#[test]
#[should_panic(expected = "unknown AiM opcode")]
fn unknown_opcode_is_fatal() {
    run_trace("AiM MAC_XYZ 4 0xFFFFFFFF 2\nAiM EOC\n");
}

#[test]
#[should_panic(expected = "unknown type")]
fn unknown_request_type_is_fatal() {
    run_trace("X MEM 0 0 0\nAiM EOC\n");
}

#[test]
#[should_panic(expected = "EOF reached while EOC not reached")]
fn missing_eoc_is_fatal() {
    run_trace("AiM WR_SBK 1 0 0x00000001 0 0 0\n");
}

#[test]
#[should_panic(expected = "malformed integer")]
fn malformed_literal_is_fatal() {
    run_trace("AiM WR_SBK 1 0 0xZZ 0 0 0\nAiM EOC\n");
}
