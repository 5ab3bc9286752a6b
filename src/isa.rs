//! Static, process-wide AiM ISR vocabulary: per-opcode field legality,
//! blocking/broadcast flags, and the string lookups used at trace-parse
//! time. Runtime paths go through pre-resolved enums only.

use phf::phf_map;

use crate::request::{Opcode, Region, ReqKind};

/// Host-visible fields an AiM opcode may carry, in trace field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Opsize,
    GprAddr0,
    GprAddr1,
    ChannelMask,
    BankIndex,
    RowAddr,
    ColAddr,
    ThreadIndex,
}

/// Trace lines list legal fields in this declaration order.
pub const FIELD_ORDER: [Field; 8] = [
    Field::Opsize,
    Field::GprAddr0,
    Field::GprAddr1,
    Field::ChannelMask,
    Field::BankIndex,
    Field::RowAddr,
    Field::ColAddr,
    Field::ThreadIndex,
];

impl Field {
    pub const fn mask(self) -> u8 {
        1 << self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Opsize => "opsize",
            Field::GprAddr0 => "GPR_addr_0",
            Field::GprAddr1 => "GPR_addr_1",
            Field::ChannelMask => "channel_mask",
            Field::BankIndex => "bank_index",
            Field::RowAddr => "row_addr",
            Field::ColAddr => "col_addr",
            Field::ThreadIndex => "thread_index",
        }
    }
}

const OPSIZE: u8 = Field::Opsize.mask();
const GPR0: u8 = Field::GprAddr0.mask();
const GPR1: u8 = Field::GprAddr1.mask();
const CH_MASK: u8 = Field::ChannelMask.mask();
const BANK: u8 = Field::BankIndex.mask();
const ROW: u8 = Field::RowAddr.mask();
const COL: u8 = Field::ColAddr.mask();

/// Hierarchy level at which an opcode effectively operates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetLevel {
    Column,
    Bank,
    Channel,
    Dma,
}

/// Descriptor for one AiM ISR opcode.
#[derive(Debug, Clone, Copy)]
pub struct AimIsr {
    pub opcode: Opcode,
    pub legal_fields: u8,
    /// The host request's channel mask must have exactly one bit set.
    pub channel_count_eq_one: bool,
    /// Each expanded child carries a completion callback and gates its
    /// parent host request.
    pub dma_blocking: bool,
    /// Reads/writes on-chip register files rather than DRAM bank arrays.
    pub require_reg_rw_mod: bool,
    pub target_level: TargetLevel,
}

impl AimIsr {
    pub fn is_field_legal(&self, field: Field) -> bool {
        self.legal_fields & field.mask() != 0
    }

    pub fn legal_field_count(&self) -> usize {
        self.legal_fields.count_ones() as usize
    }
}

static ISR_TABLE: phf::Map<&'static str, AimIsr> = phf_map! {
    "ISR_WR_SBK" => AimIsr {
        opcode: Opcode::WrSbk,
        legal_fields: OPSIZE | GPR0 | CH_MASK | BANK | ROW | COL,
        channel_count_eq_one: false,
        dma_blocking: false,
        require_reg_rw_mod: false,
        target_level: TargetLevel::Column,
    },
    "ISR_WR_ABK" => AimIsr {
        opcode: Opcode::WrAbk,
        legal_fields: GPR0 | CH_MASK | ROW,
        channel_count_eq_one: true,
        dma_blocking: false,
        require_reg_rw_mod: false,
        target_level: TargetLevel::Column,
    },
    "ISR_WR_GB" => AimIsr {
        opcode: Opcode::WrGb,
        legal_fields: OPSIZE | GPR0 | CH_MASK,
        channel_count_eq_one: false,
        dma_blocking: false,
        require_reg_rw_mod: true,
        target_level: TargetLevel::Channel,
    },
    "ISR_WR_BIAS" => AimIsr {
        opcode: Opcode::WrBias,
        legal_fields: GPR0 | CH_MASK,
        channel_count_eq_one: false,
        dma_blocking: false,
        require_reg_rw_mod: true,
        target_level: TargetLevel::Bank,
    },
    "ISR_WR_AFLUT" => AimIsr {
        opcode: Opcode::WrAflut,
        legal_fields: OPSIZE,
        channel_count_eq_one: false,
        dma_blocking: false,
        require_reg_rw_mod: false,
        target_level: TargetLevel::Column,
    },
    "ISR_RD_MAC" => AimIsr {
        opcode: Opcode::RdMac,
        legal_fields: GPR0 | CH_MASK,
        channel_count_eq_one: false,
        dma_blocking: true,
        require_reg_rw_mod: true,
        target_level: TargetLevel::Bank,
    },
    "ISR_RD_AF" => AimIsr {
        opcode: Opcode::RdAf,
        legal_fields: GPR0 | CH_MASK,
        channel_count_eq_one: false,
        dma_blocking: true,
        require_reg_rw_mod: true,
        target_level: TargetLevel::Bank,
    },
    "ISR_RD_SBK" => AimIsr {
        opcode: Opcode::RdSbk,
        legal_fields: OPSIZE | GPR0 | CH_MASK | BANK | ROW | COL,
        channel_count_eq_one: false,
        dma_blocking: false,
        require_reg_rw_mod: false,
        target_level: TargetLevel::Column,
    },
    "ISR_COPY_BKGB" => AimIsr {
        opcode: Opcode::CopyBkgb,
        legal_fields: OPSIZE | CH_MASK | BANK | ROW,
        channel_count_eq_one: false,
        dma_blocking: false,
        require_reg_rw_mod: false,
        target_level: TargetLevel::Column,
    },
    "ISR_COPY_GBBK" => AimIsr {
        opcode: Opcode::CopyGbbk,
        legal_fields: OPSIZE | CH_MASK | BANK | ROW,
        channel_count_eq_one: false,
        dma_blocking: false,
        require_reg_rw_mod: false,
        target_level: TargetLevel::Column,
    },
    "ISR_MAC_SBK" => AimIsr {
        opcode: Opcode::MacSbk,
        legal_fields: OPSIZE | CH_MASK | BANK | ROW,
        channel_count_eq_one: false,
        dma_blocking: false,
        require_reg_rw_mod: false,
        target_level: TargetLevel::Bank,
    },
    "ISR_MAC_ABK" => AimIsr {
        opcode: Opcode::MacAbk,
        legal_fields: OPSIZE | CH_MASK | ROW,
        channel_count_eq_one: false,
        dma_blocking: false,
        require_reg_rw_mod: false,
        target_level: TargetLevel::Bank,
    },
    "ISR_AF" => AimIsr {
        opcode: Opcode::Af,
        legal_fields: CH_MASK,
        channel_count_eq_one: false,
        dma_blocking: false,
        require_reg_rw_mod: false,
        target_level: TargetLevel::Bank,
    },
    "ISR_EWMUL" => AimIsr {
        opcode: Opcode::Ewmul,
        legal_fields: OPSIZE | CH_MASK | ROW,
        channel_count_eq_one: false,
        dma_blocking: false,
        require_reg_rw_mod: false,
        target_level: TargetLevel::Column,
    },
    "ISR_EWADD" => AimIsr {
        opcode: Opcode::Ewadd,
        legal_fields: OPSIZE | GPR0 | GPR1,
        channel_count_eq_one: false,
        dma_blocking: false,
        require_reg_rw_mod: false,
        target_level: TargetLevel::Dma,
    },
    "ISR_SYNC" => AimIsr {
        opcode: Opcode::Sync,
        legal_fields: 0,
        channel_count_eq_one: false,
        dma_blocking: true,
        require_reg_rw_mod: false,
        target_level: TargetLevel::Channel,
    },
    "ISR_EOC" => AimIsr {
        opcode: Opcode::Eoc,
        legal_fields: 0,
        channel_count_eq_one: false,
        dma_blocking: true,
        require_reg_rw_mod: false,
        target_level: TargetLevel::Dma,
    },
};

pub fn opcode_name(opcode: Opcode) -> &'static str {
    match opcode {
        Opcode::WrSbk => "ISR_WR_SBK",
        Opcode::WrGb => "ISR_WR_GB",
        Opcode::WrBias => "ISR_WR_BIAS",
        Opcode::WrAflut => "ISR_WR_AFLUT",
        Opcode::RdMac => "ISR_RD_MAC",
        Opcode::RdAf => "ISR_RD_AF",
        Opcode::RdSbk => "ISR_RD_SBK",
        Opcode::CopyBkgb => "ISR_COPY_BKGB",
        Opcode::CopyGbbk => "ISR_COPY_GBBK",
        Opcode::MacSbk => "ISR_MAC_SBK",
        Opcode::MacAbk => "ISR_MAC_ABK",
        Opcode::Af => "ISR_AF",
        Opcode::Ewmul => "ISR_EWMUL",
        Opcode::Ewadd => "ISR_EWADD",
        Opcode::WrAbk => "ISR_WR_ABK",
        Opcode::Eoc => "ISR_EOC",
        Opcode::Sync => "ISR_SYNC",
    }
}

/// Descriptor lookup by opcode name ("ISR_WR_SBK").
pub fn isr_for_name(name: &str) -> Option<&'static AimIsr> {
    ISR_TABLE.get(name)
}

/// Descriptor lookup by opcode enum value.
pub fn isr(opcode: Opcode) -> &'static AimIsr {
    ISR_TABLE
        .get(opcode_name(opcode))
        .unwrap_or_else(|| panic!("no ISR descriptor for opcode {:?}", opcode))
}

pub fn parse_kind(s: &str) -> Option<ReqKind> {
    match s {
        "R" => Some(ReqKind::Read),
        "W" => Some(ReqKind::Write),
        "AiM" => Some(ReqKind::Aim),
        _ => None,
    }
}

pub fn kind_name(kind: ReqKind) -> &'static str {
    match kind {
        ReqKind::Read => "R",
        ReqKind::Write => "W",
        ReqKind::RefAllBank => "REFab",
        ReqKind::RefSingleBank => "REFsb",
        ReqKind::Aim => "AiM",
    }
}

pub fn parse_region(s: &str) -> Option<Region> {
    match s {
        "GPR" => Some(Region::Gpr),
        "CFR" => Some(Region::Cfr),
        "MEM" => Some(Region::Mem),
        _ => None,
    }
}

pub fn region_name(region: Region) -> &'static str {
    match region {
        Region::Gpr => "GPR",
        Region::Cfr => "CFR",
        Region::Mem => "MEM",
    }
}

/// A legal field must be present (`!= -1`), an illegal one absent (`== -1`).
/// Violations are trace errors and fatal.
pub fn check_field_value(descriptor: &AimIsr, field: Field, value: i64) {
    if descriptor.is_field_legal(field) {
        if value == -1 {
            panic!(
                "trace: opcode {} must be provided with field {}",
                opcode_name(descriptor.opcode),
                field.name()
            );
        }
    } else if value != -1 {
        panic!(
            "trace: opcode {} does not accept field {}",
            opcode_name(descriptor.opcode),
            field.name()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_roundtrip_for_all_opcodes() {
        for opcode in Opcode::ALL {
            let desc = isr(opcode);
            assert_eq!(desc.opcode, opcode);
            assert_eq!(isr_for_name(opcode_name(opcode)).unwrap().opcode, opcode);
        }
    }

    #[test]
    fn blocking_opcodes_match_barrier_set() {
        for opcode in Opcode::ALL {
            let expected = matches!(
                opcode,
                Opcode::RdMac | Opcode::RdAf | Opcode::Sync | Opcode::Eoc
            );
            assert_eq!(isr(opcode).dma_blocking, expected, "{:?}", opcode);
        }
    }

    #[test]
    fn register_file_opcodes_are_flagged() {
        for opcode in Opcode::ALL {
            let expected = matches!(
                opcode,
                Opcode::WrGb | Opcode::WrBias | Opcode::RdMac | Opcode::RdAf
            );
            assert_eq!(isr(opcode).require_reg_rw_mod, expected, "{:?}", opcode);
        }
    }

    #[test]
    fn field_order_matches_masks() {
        let desc = isr(Opcode::Ewadd);
        let legal: Vec<Field> = FIELD_ORDER
            .iter()
            .copied()
            .filter(|f| desc.is_field_legal(*f))
            .collect();
        assert_eq!(legal, vec![Field::Opsize, Field::GprAddr0, Field::GprAddr1]);
        assert_eq!(desc.legal_field_count(), 3);
    }

    #[test]
    fn wr_sbk_takes_six_fields() {
        assert_eq!(isr(Opcode::WrSbk).legal_field_count(), 6);
        assert_eq!(isr(Opcode::RdSbk).legal_field_count(), 6);
        assert!(!isr(Opcode::WrSbk).is_field_legal(Field::ThreadIndex));
    }

    #[test]
    #[should_panic(expected = "must be provided")]
    fn missing_legal_field_is_fatal() {
        check_field_value(isr(Opcode::MacAbk), Field::RowAddr, -1);
    }

    #[test]
    #[should_panic(expected = "does not accept")]
    fn present_illegal_field_is_fatal() {
        check_field_value(isr(Opcode::MacAbk), Field::BankIndex, 3);
    }

    #[test]
    fn unknown_strings_are_rejected() {
        assert!(isr_for_name("ISR_BOGUS").is_none());
        assert!(parse_kind("X").is_none());
        assert!(parse_region("ROM").is_none());
    }
}
