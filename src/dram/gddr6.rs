//! GDDR6 device family, including the AiM organization: 32 channels of
//! 4 bankgroups x 4 banks with on-die MAC/AF/EWMUL compute commands and
//! a global buffer.

use super::spec::{
    jedec_rounding, ActionPolicy, CommandDef, CommandMeta, DeviceSpec, Levels, NodeState,
    Organization, PreqPolicy, RowMaskEffect, TimingVals,
};
use super::timing::{ConstraintRow, ResolveCtx, TimingTable};
use crate::request::{Opcode, ReqKind, NUM_OPCODES, NUM_REQ_KINDS};

pub const LEVEL_NAMES: [&str; 5] = ["channel", "bankgroup", "bank", "row", "column"];

pub const TIMING_NAMES: [&str; 34] = [
    "rate", "nBL", "nCL", "nRCDRD", "nRCDRDMAC", "nRCDEWMUL", "nRCDRDAF", "nRCDRDCP", "nRCDWR",
    "nRCDWRCP", "nRP", "nRAS", "nRC", "nWR", "nRTP", "nCWL", "nCCDS", "nCCDL", "nRRDS", "nRRDL",
    "nWTRS", "nWTRL", "nFAW", "nRFC", "nRFCpb", "nRREFD", "nREFI", "nCLREG", "nCLGB", "nCWLREG",
    "nCWLGB", "nWPRE", "nMODCH", "tCK_ps",
];

fn org_preset(name: &str) -> Organization {
    let (density_mbit, dq, counts) = match name {
        "GDDR6_8Gb_x8" => (8 << 10, 8, vec![2, 4, 4, 1 << 14, 1 << 11]),
        "GDDR6_8Gb_x16" => (8 << 10, 16, vec![2, 4, 4, 1 << 14, 1 << 10]),
        "GDDR6_16Gb_x8" => (16 << 10, 8, vec![2, 4, 4, 1 << 15, 1 << 11]),
        "GDDR6_16Gb_x16" => (16 << 10, 16, vec![2, 4, 4, 1 << 14, 1 << 11]),
        "GDDR6_32Gb_x8" => (32 << 10, 8, vec![2, 4, 4, 1 << 16, 1 << 11]),
        "GDDR6_32Gb_x16" => (32 << 10, 16, vec![2, 4, 4, 1 << 15, 1 << 11]),
        "GDDR6_AiM_org" => (128 << 10, 16, vec![32, 4, 4, 1 << 14, 1 << 10]),
        other => panic!("GDDR6: unrecognized organization preset \"{}\"", other),
    };
    Organization {
        density_mbit,
        dq,
        counts,
    }
}

#[rustfmt::skip]
fn timing_preset(name: &str) -> Vec<i64> {
    match name {
        // rate nBL nCL nRCDRD nRCDRDMAC nRCDEWMUL nRCDRDAF nRCDRDCP nRCDWR nRCDWRCP
        // nRP nRAS nRC nWR nRTP nCWL nCCDS nCCDL nRRDS nRRDL nWTRS nWTRL nFAW
        // nRFC nRFCpb nRREFD nREFI nCLREG nCLGB nCWLREG nCWLGB nWPRE nMODCH tCK_ps
        "GDDR6_2000_1350mV_double" => vec![
            2000, 8, 24, 26, 26, 26, 26, 30, 16, 16,
            26, 53, 79, 26, 4, 6, 4, 6, 7, 7, 9, 11, 28,
            210, 105, 14, 3333, 0, 1, 1, 1, 1, 32, 570,
        ],
        "GDDR6_2000_1250mV_double" => vec![
            2000, 8, 24, 30, 30, 30, 30, 30, 19, 19,
            30, 60, 89, 30, 4, 6, 4, 6, 11, 11, 9, 11, 42,
            210, 105, 21, 3333, 0, 1, 1, 1, 1, 32, 570,
        ],
        "GDDR6_2000_1350mV_quad" => vec![
            2000, 4, 24, 26, 26, 26, 26, 30, 16, 16,
            26, 53, 79, 26, 4, 6, 4, 6, 7, 7, 9, 11, 28,
            210, 105, 14, 3333, 0, 1, 1, 1, 1, 32, 570,
        ],
        "GDDR6_2000_1250mV_quad" => vec![
            2000, 4, 24, 30, 30, 30, 30, 30, 19, 19,
            30, 60, 89, 30, 4, 6, 4, 6, 11, 11, 9, 11, 42,
            210, 105, 21, 3333, 0, 1, 1, 1, 1, 32, 570,
        ],
        "GDDR6_AiM_timing" => vec![
            2000, 2, 50, 36, 56, 25, 86, 66, 28, 48,
            32, 54, 89, 33, 12, 6, 2, 2, 11, 11, 9, 11, 42,
            210, 105, 21, 3333, 0, 1, 1, 1, 1, 32, 500,
        ],
        other => panic!("GDDR6: unrecognized timing preset \"{}\"", other),
    }
}

#[rustfmt::skip]
fn commands(levels: &Levels) -> Vec<CommandDef> {
    let lvl = |name: &str| levels.index(name).unwrap();
    let cmd = |name: &'static str, scope: &str, open: bool, close: bool, access: bool, refresh: bool| {
        CommandDef { name, scope: lvl(scope), meta: CommandMeta::new(open, close, access, refresh) }
    };
    vec![
        cmd("ACT",     "row",       true,  false, false, false),
        cmd("PREA",    "channel",   false, true,  false, false),
        cmd("PRE",     "bank",      false, true,  false, false),
        cmd("RD",      "column",    false, false, true,  false),
        cmd("WR",      "column",    false, false, true,  false),
        cmd("RDA",     "column",    false, true,  true,  false),
        cmd("WRA",     "column",    false, true,  true,  false),
        cmd("REFab",   "channel",   false, false, false, true),
        cmd("REFpb",   "bank",      false, false, false, true),
        cmd("ACT4",    "bankgroup", true,  false, false, false),
        cmd("ACT16",   "channel",   true,  false, false, false),
        cmd("PRE4",    "bankgroup", false, true,  false, false),
        cmd("MAC",     "column",    false, false, true,  false),
        cmd("MAC16",   "channel",   false, false, true,  false),
        cmd("AF16",    "channel",   false, false, false, false),
        cmd("EWMUL16", "channel",   false, false, true,  false),
        cmd("RDCP",    "column",    false, false, true,  false),
        cmd("WRCP",    "column",    false, false, true,  false),
        cmd("WRGB",    "channel",   false, false, false, false),
        cmd("RDMAC16", "channel",   false, false, false, false),
        cmd("RDAF16",  "channel",   false, false, false, false),
        cmd("WRMAC16", "channel",   false, false, false, false),
        cmd("WRA16",   "channel",   false, true,  true,  false),
        cmd("TMOD",    "channel",   false, false, false, false),
        cmd("SYNC",    "channel",   false, false, false, false),
        cmd("EOC",     "channel",   false, false, false, false),
    ]
}

fn resolve_timings(org: &Organization, preset_name: &str) -> TimingVals {
    let mut t = TimingVals::from_preset(&TIMING_NAMES, &timing_preset(preset_name));

    let rate = t.get("rate");
    let tck_ps = 2_000_000 / rate;
    t.set("tCK_ps", tck_ps);

    // Secondary timings fixed by frequency and DQ width (JESD250 tables).
    let dq_id = match org.dq {
        8 => Some(0),
        16 => Some(1),
        _ => None,
    };
    let rate_id = match rate {
        2000 => Some(0usize),
        _ => None,
    };
    if let (Some(dq_id), Some(_)) = (dq_id, rate_id) {
        const NRRDS: [i64; 2] = [4, 5];
        const NRRDL: [i64; 2] = [5, 6];
        const NFAW: [i64; 2] = [20, 28];
        t.set("nRRDS", NRRDS[dq_id]);
        t.set("nRRDL", NRRDL[dq_id]);
        t.set("nFAW", NFAW[dq_id]);
    }

    // Refresh timings derived from die density (nanosecond tables). The
    // AiM organization folds 32 channels into its declared density, so
    // fall back to per-channel density when the total is not tabulated.
    const TRFC_NS: [i64; 3] = [260, 360, 550];
    const TREFI_BASE_NS: i64 = 7800;
    let density_id = |density: i64| match density {
        4096 => Some(0usize),
        8192 => Some(1),
        16384 => Some(2),
        _ => None,
    };
    let id = density_id(org.density_mbit)
        .or_else(|| density_id(org.density_mbit / org.counts[0] as i64));
    if let Some(id) = id {
        t.set("nRFC", jedec_rounding(TRFC_NS[id], tck_ps));
        t.set("nREFI", jedec_rounding(TREFI_BASE_NS, tck_ps));
    }

    // Register-file and global-buffer CAS latencies are architectural.
    t.set("nCLREG", 0);
    t.set("nCLGB", 1);
    t.set("nCWLREG", 1);
    t.set("nCWLGB", 1);
    t.set("nWPRE", 1);

    t.check_resolved("GDDR6");
    t
}

#[rustfmt::skip]
fn constraint_rows(t: &TimingVals) -> Vec<ConstraintRow> {
    let v = |name: &str| t.get(name);
    vec![
        /*** Channel ***/
        // CAS <-> CAS: external data bus occupancy. AiM commands on the
        // external bus: RDMAC16/RDAF16 read side, WRGB/WRMAC16 write side.
        ConstraintRow::plain("channel", &["RD", "RDA", "RDMAC16", "RDAF16"], &["RD", "RDA", "RDMAC16", "RDAF16"], v("nBL")),
        ConstraintRow::plain("channel", &["WR", "WRA", "WRA16", "WRGB", "WRMAC16"], &["WR", "WRA", "WRA16", "WRGB", "WRMAC16"], v("nBL")),

        // CAS <-> CAS across bank groups (nCCDS) and within one (nCCDL).
        ConstraintRow::plain("channel", &["RD", "RDA", "MAC", "MAC16", "RDCP", "RDMAC16", "RDAF16"], &["RD", "RDA", "MAC", "MAC16", "RDCP", "RDMAC16", "RDAF16"], v("nCCDS")),
        ConstraintRow::plain("channel", &["WR", "WRA", "WRA16", "WRGB", "WRCP", "WRMAC16"], &["WR", "WRA", "WRA16", "WRGB", "WRCP", "WRMAC16"], v("nCCDS")),
        ConstraintRow::plain("channel", &["RD", "RDA", "MAC", "RDCP", "RDMAC16", "RDAF16", "MAC16", "EWMUL16"], &["RDMAC16", "RDAF16", "MAC16", "EWMUL16"], v("nCCDL")),
        ConstraintRow::plain("channel", &["RDMAC16", "RDAF16", "MAC16", "EWMUL16"], &["RD", "RDA", "MAC", "RDCP", "RDMAC16", "RDAF16", "MAC16", "EWMUL16"], v("nCCDL")),
        ConstraintRow::plain("channel", &["WR", "WRA", "WRCP", "WRA16", "WRMAC16", "EWMUL16"], &["WRA16", "WRMAC16", "EWMUL16"], v("nCCDL")),
        ConstraintRow::plain("channel", &["WRA16", "WRMAC16", "EWMUL16"], &["WR", "WRA", "WRCP", "WRA16", "WRMAC16", "EWMUL16"], v("nCCDL")),

        // RD <-> WR turnaround (tRTW, bus direction change).
        ConstraintRow::plain("channel", &["RD", "RDA"], &["WR", "WRA"], v("nCL") + v("nBL") + 3 - v("nCWL") + v("nWPRE")),
        ConstraintRow::plain("channel", &["RD", "RDA"], &["WRA16"], v("nCL") + v("nBL") + 3 - v("nCWL") + v("nWPRE")),
        ConstraintRow::plain("channel", &["RDMAC16", "RDAF16"], &["WR", "WRA"], v("nCLREG") + v("nBL") + 3 - v("nCWL") + v("nWPRE")),
        ConstraintRow::plain("channel", &["RDMAC16", "RDAF16"], &["WRA16"], v("nCLREG") + v("nBL") + 3 - v("nCWL") + v("nWPRE")),
        ConstraintRow::plain("channel", &["RD", "RDA"], &["WRGB"], v("nCL") + v("nBL") + 3 - v("nCWLGB") + v("nWPRE")),
        ConstraintRow::plain("channel", &["RD", "RDA"], &["WRMAC16"], v("nCL") + v("nBL") + 3 - v("nCWLREG") + v("nWPRE")),
        ConstraintRow::plain("channel", &["RDMAC16", "RDAF16"], &["WRGB"], v("nCLREG") + v("nBL") + 3 - v("nCWLGB") + v("nWPRE")),
        ConstraintRow::plain("channel", &["RDMAC16", "RDAF16"], &["WRMAC16"], v("nCLREG") + v("nBL") + 3 - v("nCWLREG") + v("nWPRE")),

        // WR <-> RD: minimum read after write.
        ConstraintRow::plain("channel", &["WR", "WRA"], &["RD", "RDA", "RDMAC16", "RDAF16"], v("nCWL") + v("nBL") + v("nWTRS")),
        ConstraintRow::plain("channel", &["WRA16"], &["RD", "RDA", "RDMAC16", "RDAF16"], v("nCWL") + v("nBL") + v("nWTRS")),
        ConstraintRow::plain("channel", &["WRGB"], &["RD", "RDA", "RDMAC16", "RDAF16"], v("nCWLGB") + v("nBL") + v("nWTRS")),
        ConstraintRow::plain("channel", &["WRMAC16"], &["RD", "RDA", "RDMAC16", "RDAF16"], v("nCWLREG") + v("nBL") + v("nWTRS")),
        ConstraintRow::plain("channel", &["WR", "WRA"], &["RDMAC16", "RDAF16"], v("nCWL") + v("nBL") + v("nWTRL")),
        ConstraintRow::plain("channel", &["WRA16"], &["RD", "RDA", "RDMAC16", "RDAF16"], v("nCWL") + v("nBL") + v("nWTRL")),
        ConstraintRow::plain("channel", &["WRMAC16"], &["RD", "RDA", "RDMAC16", "RDAF16"], v("nCWLREG") + v("nBL") + v("nWTRL")),

        // CAS <-> PREA: read/write to precharge spacing.
        ConstraintRow::plain("channel", &["RD", "RDCP", "MAC", "MAC16", "AF16", "EWMUL16"], &["PREA"], v("nRTP")),
        ConstraintRow::plain("channel", &["MAC16", "AF16", "EWMUL16"], &["PRE", "PRE4"], v("nRTP")),
        ConstraintRow::plain("channel", &["WR", "WRCP"], &["PREA"], v("nCWL") + v("nBL") + v("nWR")),
        ConstraintRow::plain("channel", &["EWMUL16"], &["PRE", "PRE4", "PREA"], v("nCWL") + v("nWR")),

        // RAS <-> RAS.
        ConstraintRow::plain("channel", &["ACT", "ACT4"], &["ACT", "ACT4"], v("nRRDS")),
        ConstraintRow::plain("channel", &["ACT", "ACT4", "ACT16"], &["ACT16"], v("nRRDL")),
        ConstraintRow::plain("channel", &["ACT16"], &["ACT", "ACT4", "ACT16"], v("nRRDL")),
        ConstraintRow::plain("channel", &["ACT", "ACT4", "ACT16"], &["ACT16"], v("nRC")),
        ConstraintRow::plain("channel", &["ACT16"], &["ACT", "ACT4", "ACT16"], v("nRC")),
        ConstraintRow::plain("channel", &["ACT", "ACT4", "ACT16"], &["PREA"], v("nRAS")),
        ConstraintRow::plain("channel", &["ACT16"], &["PRE", "PRE4"], v("nRAS")),
        ConstraintRow::plain("channel", &["PRE", "PRE4", "PREA"], &["ACT16"], v("nRP")),
        ConstraintRow::plain("channel", &["PREA"], &["ACT", "ACT4", "ACT16"], v("nRP")),
        ConstraintRow::plain("channel", &["ACT", "ACT4", "ACT16"], &["MAC16"], v("nRCDRDMAC")),
        ConstraintRow::plain("channel", &["ACT", "ACT4", "ACT16"], &["AF16"], v("nRCDRDAF")),
        ConstraintRow::plain("channel", &["ACT", "ACT4", "ACT16"], &["EWMUL16"], v("nRCDEWMUL")),
        ConstraintRow::plain("channel", &["ACT16"], &["MAC"], v("nRCDRDMAC")),
        ConstraintRow::plain("channel", &["ACT16"], &["RDCP"], v("nRCDRDCP")),
        ConstraintRow::plain("channel", &["ACT16"], &["RD", "RDA"], v("nRCDRD")),
        ConstraintRow::plain("channel", &["ACT", "ACT4", "ACT16"], &["WRA16"], v("nRCDWR")),
        ConstraintRow::plain("channel", &["ACT16"], &["WRCP"], v("nRCDWRCP")),
        ConstraintRow::plain("channel", &["ACT16"], &["WR", "WRA"], v("nRCDWR")),
        ConstraintRow::plain("channel", &["RDA"], &["ACT16"], v("nRTP") + v("nRP")),
        ConstraintRow::plain("channel", &["WRA"], &["ACT16"], v("nCWL") + v("nBL") + v("nWR") + v("nRP")),
        ConstraintRow::plain("channel", &["WRA16"], &["ACT", "ACT4", "ACT16"], v("nCWL") + v("nBL") + v("nWR") + v("nRP")),

        // RAS <-> REF: all banks precharged before REFab.
        ConstraintRow::plain("channel", &["ACT", "ACT4", "ACT16"], &["REFab"], v("nRC")),
        ConstraintRow::plain("channel", &["PRE", "PRE4", "PREA"], &["REFab"], v("nRP")),
        ConstraintRow::plain("channel", &["RDA"], &["REFab"], v("nRTP") + v("nRP")),
        ConstraintRow::plain("channel", &["WRA"], &["REFab"], v("nCWL") + v("nBL") + v("nWR") + v("nRP")),
        ConstraintRow::plain("channel", &["WRA16"], &["REFpb", "REFab"], v("nCWL") + v("nBL") + v("nWR") + v("nRP")),
        ConstraintRow::plain("channel", &["REFab"], &["ACT", "ACT4", "ACT16"], v("nRFC")),

        // RAS <-> REFpb.
        ConstraintRow::plain("channel", &["ACT", "ACT4", "ACT16"], &["REFpb"], v("nRRDL")),
        ConstraintRow::plain("channel", &["ACT16"], &["REFpb"], v("nRC")),
        ConstraintRow::plain("channel", &["PREA"], &["REFpb"], v("nRP")),
        ConstraintRow::plain("channel", &["REFpb"], &["ACT16"], v("nRFCpb")),
        ConstraintRow::plain("channel", &["REFpb"], &["ACT", "ACT4", "ACT16"], v("nRREFD")),

        ConstraintRow::plain("channel", &["PREA"], &["PRE", "PRE4", "PREA"], v("nRP")),
        ConstraintRow::plain("channel", &["PRE", "PRE4"], &["PREA"], v("nRP")),
        ConstraintRow::plain("channel", &["PRE4"], &["PRE", "PRE4"], v("nRP")),
        ConstraintRow::plain("channel", &["PRE"], &["PRE4"], v("nRP")),

        // Mode-register traffic stalls everything.
        ConstraintRow::plain("channel", &["TMOD"], &["ACT", "PREA", "PRE", "RD", "WR", "RDA", "WRA", "REFab", "REFpb", "ACT4", "ACT16", "PRE4", "MAC", "MAC16", "AF16", "EWMUL16", "RDCP", "WRCP", "WRGB", "RDMAC16", "RDAF16", "WRMAC16", "WRA16", "SYNC", "EOC"], v("nMODCH")),

        /*** Bank group ***/
        ConstraintRow::plain("bankgroup", &["RD", "RDA", "MAC", "RDCP"], &["RD", "RDA", "MAC", "RDCP"], v("nCCDL")),
        ConstraintRow::plain("bankgroup", &["WR", "WRA", "WRCP"], &["WR", "WRA", "WRCP"], v("nCCDL")),
        ConstraintRow::plain("bankgroup", &["WR", "WRA"], &["RD", "RDA"], v("nCWL") + v("nBL") + v("nWTRL")),
        ConstraintRow::plain("bankgroup", &["RD", "RDCP", "MAC"], &["PRE4"], v("nRTP")),
        ConstraintRow::plain("bankgroup", &["WR", "WRCP"], &["PRE4"], v("nCWL") + v("nBL") + v("nWR")),
        ConstraintRow::plain("bankgroup", &["ACT", "ACT4"], &["ACT", "ACT4"], v("nRRDL")),
        ConstraintRow::plain("bankgroup", &["ACT", "ACT4"], &["ACT4"], v("nRC")),
        ConstraintRow::plain("bankgroup", &["ACT4"], &["ACT", "ACT4"], v("nRC")),
        ConstraintRow::plain("bankgroup", &["ACT", "ACT4"], &["PRE4"], v("nRAS")),
        ConstraintRow::plain("bankgroup", &["ACT4"], &["PRE"], v("nRAS")),
        ConstraintRow::plain("bankgroup", &["PRE", "PRE4"], &["ACT4"], v("nRP")),
        ConstraintRow::plain("bankgroup", &["PRE4"], &["ACT"], v("nRP")),
        ConstraintRow::plain("bankgroup", &["RDA"], &["ACT4"], v("nRTP") + v("nRP")),
        ConstraintRow::plain("bankgroup", &["WRA"], &["ACT4"], v("nCWL") + v("nBL") + v("nWR") + v("nRP")),
        ConstraintRow::plain("bankgroup", &["ACT4"], &["REFpb"], v("nRC")),
        ConstraintRow::plain("bankgroup", &["PRE4"], &["REFpb"], v("nRP")),
        ConstraintRow::plain("bankgroup", &["REFpb"], &["ACT4"], v("nRFCpb")),
        ConstraintRow::plain("bankgroup", &["ACT4"], &["MAC"], v("nRCDRDMAC")),
        ConstraintRow::plain("bankgroup", &["ACT4"], &["RDCP"], v("nRCDRDCP")),
        ConstraintRow::plain("bankgroup", &["ACT4"], &["RD", "RDA"], v("nRCDRD")),
        ConstraintRow::plain("bankgroup", &["ACT4"], &["WRCP"], v("nRCDWRCP")),
        ConstraintRow::plain("bankgroup", &["ACT4"], &["WR", "WRA"], v("nRCDWR")),

        /*** Bank ***/
        ConstraintRow::plain("bank", &["ACT"], &["MAC"], v("nRCDRDMAC")),
        ConstraintRow::plain("bank", &["ACT"], &["RDCP"], v("nRCDRDCP")),
        ConstraintRow::plain("bank", &["ACT"], &["RD", "RDA"], v("nRCDRD")),
        ConstraintRow::plain("bank", &["ACT"], &["WRCP"], v("nRCDWRCP")),
        ConstraintRow::plain("bank", &["ACT"], &["WR", "WRA"], v("nRCDWR")),
        ConstraintRow::plain("bank", &["RD", "RDCP", "MAC"], &["PRE"], v("nRTP")),
        ConstraintRow::plain("bank", &["WR", "WRCP"], &["PRE"], v("nCWL") + v("nBL") + v("nWR")),
        ConstraintRow::plain("bank", &["ACT"], &["ACT"], v("nRC")),
        ConstraintRow::plain("bank", &["ACT"], &["PRE"], v("nRAS")),
        ConstraintRow::plain("bank", &["PRE"], &["ACT"], v("nRP")),
        ConstraintRow::plain("bank", &["PRE"], &["PRE"], v("nRP")),
        ConstraintRow::plain("bank", &["RDA"], &["ACT"], v("nRTP") + v("nRP")),
        ConstraintRow::plain("bank", &["WRA"], &["ACT"], v("nCWL") + v("nBL") + v("nWR") + v("nRP")),
        ConstraintRow::plain("bank", &["ACT"], &["REFpb"], v("nRC")),
        ConstraintRow::plain("bank", &["PRE"], &["REFpb"], v("nRP")),
        ConstraintRow::plain("bank", &["RDA"], &["REFpb"], v("nRTP") + v("nRP")),
        ConstraintRow::plain("bank", &["WRA"], &["REFpb"], v("nCWL") + v("nBL") + v("nWR") + v("nRP")),
        ConstraintRow::plain("bank", &["REFpb"], &["ACT"], v("nRFCpb")),
    ]
}

pub fn build(org_preset: &str, timing_preset_name: &str) -> DeviceSpec {
    let levels = Levels::new(&LEVEL_NAMES);
    let org = org_preset_checked(org_preset);
    let commands = commands(&levels);
    let timings = resolve_timings(&org, timing_preset_name);

    let init_states = vec![
        NodeState::NA,     // channel
        NodeState::NA,     // bankgroup
        NodeState::Closed, // bank
        NodeState::Closed, // row
        NodeState::NA,     // column
    ];

    let ctx = ResolveCtx::new(
        "GDDR6",
        commands.iter().map(|c| c.name).collect(),
        LEVEL_NAMES.to_vec(),
    );
    let timing = TimingTable::build("GDDR6", levels.len(), &ctx, &constraint_rows(&timings));

    let mut spec = DeviceSpec {
        name: "GDDR6",
        levels,
        org,
        commands,
        init_states,
        read_latency: timings.get("nCL") + timings.get("nBL"),
        command_latencies: Vec::new(),
        rw_translations: [None; NUM_REQ_KINDS],
        aim_translations: [None; NUM_OPCODES],
        preqs: Vec::new(),
        actions: Vec::new(),
        row_mask: Vec::new(),
        timing,
        tck_ps: timings.get("tCK_ps"),
        refresh_interval: timings.get("nREFI"),
        timings,
    };

    set_latencies(&mut spec);
    set_translations(&mut spec);
    set_preqs(&mut spec);
    set_actions(&mut spec);
    set_row_mask(&mut spec);
    spec
}

fn org_preset_checked(name: &str) -> Organization {
    let org = org_preset(name);
    org.check_density(name);
    org
}

fn set_latencies(spec: &mut DeviceSpec) {
    let t = |name: &str| spec.timings.get(name);
    let mut lat = vec![-1i64; spec.num_commands()];
    let entries: [(&str, i64); 16] = [
        ("WR", t("nCWL") + t("nBL")),
        ("WRGB", t("nCWLGB") + t("nBL")),
        ("WRMAC16", t("nCWLREG") + t("nBL")),
        ("RDMAC16", t("nCLREG") + t("nBL")),
        ("RDAF16", t("nCLREG") + t("nBL")),
        ("RD", t("nCL") + t("nBL")),
        ("RDCP", 1),
        ("WRCP", 1),
        ("MAC", 1),
        ("MAC16", 1),
        ("AF16", 1),
        ("EWMUL16", 1),
        ("WRA16", t("nCWL") + t("nBL") + t("nRP")),
        ("SYNC", 1),
        ("EOC", 1),
        ("TMOD", 1),
    ];
    for (name, val) in entries {
        lat[spec.cmd(name)] = val;
    }
    spec.command_latencies = lat;
}

fn set_translations(spec: &mut DeviceSpec) {
    spec.rw_translations[ReqKind::Read as usize] = Some(spec.cmd("RD"));
    spec.rw_translations[ReqKind::Write as usize] = Some(spec.cmd("WR"));
    spec.rw_translations[ReqKind::RefAllBank as usize] = Some(spec.cmd("REFab"));
    spec.rw_translations[ReqKind::RefSingleBank as usize] = Some(spec.cmd("PRE"));

    let pairs: [(Opcode, &str); 15] = [
        (Opcode::WrSbk, "WR"),
        (Opcode::WrGb, "WRGB"),
        (Opcode::WrBias, "WRMAC16"),
        (Opcode::RdMac, "RDMAC16"),
        (Opcode::RdAf, "RDAF16"),
        (Opcode::RdSbk, "RD"),
        (Opcode::CopyBkgb, "RDCP"),
        (Opcode::CopyGbbk, "WRCP"),
        (Opcode::MacSbk, "MAC"),
        (Opcode::MacAbk, "MAC16"),
        (Opcode::Af, "AF16"),
        (Opcode::Ewmul, "EWMUL16"),
        (Opcode::WrAbk, "WRA16"),
        (Opcode::Sync, "SYNC"),
        (Opcode::Eoc, "EOC"),
    ];
    for (opcode, cmd) in pairs {
        spec.aim_translations[opcode as usize] = Some(spec.cmd(cmd));
    }
    // ISR_WR_AFLUT and ISR_EWADD have no device command on this family.
}

fn set_preqs(spec: &mut DeviceSpec) {
    let mut preqs = spec.empty_preqs();
    let channel = spec.levels.channel;
    let bank = spec.levels.bank;

    preqs[channel][spec.cmd("REFab")] = Some(PreqPolicy::RequireAllBanksClosed {
        prea: spec.cmd("PREA"),
    });

    let row_open = PreqPolicy::RequireRowOpen {
        act: spec.cmd("ACT"),
        act2: None,
        pre: spec.cmd("PRE"),
        cas: None,
    };
    for name in ["RD", "WR", "RDA", "WRA", "RDCP", "WRCP", "MAC"] {
        preqs[bank][spec.cmd(name)] = Some(row_open);
    }

    let all_rows = PreqPolicy::RequireAllRowsOpen {
        act_all: spec.cmd("ACT16"),
        act2_all: None,
        prea: spec.cmd("PREA"),
    };
    for name in ["WRA16", "MAC16", "AF16", "EWMUL16"] {
        preqs[channel][spec.cmd(name)] = Some(all_rows);
    }

    spec.preqs = preqs;
}

fn set_actions(spec: &mut DeviceSpec) {
    let mut actions = spec.empty_actions();
    let channel = spec.levels.channel;
    let bankgroup = spec.levels.bankgroup;
    let bank = spec.levels.bank;

    actions[channel][spec.cmd("WRA16")].push(ActionPolicy::CloseAllRows);
    actions[channel][spec.cmd("PREA")].push(ActionPolicy::CloseAllRows);
    actions[channel][spec.cmd("ACT16")].push(ActionPolicy::OpenAllRows);

    actions[bankgroup][spec.cmd("PRE4")].push(ActionPolicy::CloseGroupRows);
    actions[bankgroup][spec.cmd("ACT4")].push(ActionPolicy::OpenGroupRows);

    actions[bank][spec.cmd("ACT")].push(ActionPolicy::OpenRow);
    actions[bank][spec.cmd("PRE")].push(ActionPolicy::CloseRow);
    actions[bank][spec.cmd("RDA")].push(ActionPolicy::CloseRow);
    actions[bank][spec.cmd("WRA")].push(ActionPolicy::CloseRow);

    spec.actions = actions;
}

fn set_row_mask(spec: &mut DeviceSpec) {
    let mut mask = vec![RowMaskEffect::None; spec.num_commands()];
    mask[spec.cmd("WRA16")] = RowMaskEffect::ClearAll;
    mask[spec.cmd("PREA")] = RowMaskEffect::ClearAll;
    mask[spec.cmd("PRE4")] = RowMaskEffect::ClearGroup;
    mask[spec.cmd("PRE")] = RowMaskEffect::ClearBank;
    mask[spec.cmd("RDA")] = RowMaskEffect::ClearBank;
    mask[spec.cmd("WRA")] = RowMaskEffect::ClearBank;
    mask[spec.cmd("ACT16")] = RowMaskEffect::SetAll;
    mask[spec.cmd("ACT4")] = RowMaskEffect::SetGroup;
    mask[spec.cmd("ACT")] = RowMaskEffect::SetBank;
    spec.row_mask = mask;
}
