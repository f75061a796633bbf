//! Report control block attribute model.
//!
//! An RCB is addressed as an MMS named variable; each attribute is one
//! more `$`-separated component on the item ID. Buffered blocks live
//! under `$BR$`, unbuffered ones under `$RP$`.

use bitflags::bitflags;

use crate::ber::BitString;
use crate::mms::ObjectName;

/// RCB attribute names, as they appear on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RcbAttribute {
    RptId,
    RptEna,
    Resv,
    ResvTms,
    DatSet,
    ConfRev,
    OptFlds,
    BufTm,
    SqNum,
    TrgOps,
    IntgPd,
    Gi,
    PurgeBuf,
    EntryId,
}

impl RcbAttribute {
    pub fn name(self) -> &'static str {
        match self {
            Self::RptId => "RptID",
            Self::RptEna => "RptEna",
            Self::Resv => "Resv",
            Self::ResvTms => "ResvTms",
            Self::DatSet => "DatSet",
            Self::ConfRev => "ConfRev",
            Self::OptFlds => "OptFlds",
            Self::BufTm => "BufTm",
            Self::SqNum => "SqNum",
            Self::TrgOps => "TrgOps",
            Self::IntgPd => "IntgPd",
            Self::Gi => "GI",
            Self::PurgeBuf => "PurgeBuf",
            Self::EntryId => "EntryID",
        }
    }
}

/// Unbuffered vs buffered report control block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RcbType {
    Unbuffered,
    Buffered,
}

/// A fully-qualified RCB reference: MMS domain plus the `$`-separated
/// item path of the block itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RcbReference {
    pub domain_id: String,
    pub item_id: String,
}

impl RcbReference {
    pub fn new(domain_id: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            domain_id: domain_id.into(),
            item_id: item_id.into(),
        }
    }

    /// Buffered blocks are hosted under the `BR` functional component,
    /// unbuffered ones under `RP`.
    pub fn rcb_type(&self) -> RcbType {
        if self.item_id.contains("$BR$") {
            RcbType::Buffered
        } else {
            RcbType::Unbuffered
        }
    }

    /// ObjectName of one attribute of this block.
    pub fn attribute(&self, attribute: RcbAttribute) -> ObjectName {
        ObjectName::domain_specific(&self.domain_id, format!("{}${}", self.item_id, attribute.name()))
    }

    pub fn to_object_name(&self) -> ObjectName {
        ObjectName::domain_specific(&self.domain_id, &self.item_id)
    }
}

impl core::fmt::Display for RcbReference {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.domain_id, self.item_id)
    }
}

bitflags! {
    /// OptFlds: which optional header members a report carries.
    ///
    /// Flag values equal `1 << bit-index`, bit 0 being the most
    /// significant bit of the wire bit-string; conversion to the 10-bit
    /// wire form is positional.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct OptFlds: u16 {
        const SEQUENCE_NUMBER = 1 << 1;
        const REPORT_TIME_STAMP = 1 << 2;
        const REASON_FOR_INCLUSION = 1 << 3;
        const DATA_SET_NAME = 1 << 4;
        const DATA_REFERENCE = 1 << 5;
        const BUFFER_OVERFLOW = 1 << 6;
        const ENTRY_ID = 1 << 7;
        const CONF_REVISION = 1 << 8;
        const SEGMENTATION = 1 << 9;
    }
}

impl OptFlds {
    pub const BIT_LENGTH: usize = 10;

    /// The subscription default: everything except segmentation, chosen
    /// to maximize the information available to the decoder.
    pub fn subscription_default() -> Self {
        Self::SEQUENCE_NUMBER
            | Self::REPORT_TIME_STAMP
            | Self::REASON_FOR_INCLUSION
            | Self::DATA_SET_NAME
            | Self::DATA_REFERENCE
            | Self::BUFFER_OVERFLOW
            | Self::ENTRY_ID
            | Self::CONF_REVISION
    }

    pub fn to_bit_string(self) -> BitString {
        bitflags_to_bit_string(self.bits(), Self::BIT_LENGTH)
    }

    pub fn from_bit_string(bits: &BitString) -> Self {
        Self::from_bits_truncate(bit_string_to_bitflags(bits, Self::BIT_LENGTH))
    }
}

bitflags! {
    /// TrgOps: which events trigger a report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct TrgOps: u16 {
        const DATA_CHANGE = 1 << 1;
        const QUALITY_CHANGE = 1 << 2;
        const DATA_UPDATE = 1 << 3;
        const INTEGRITY = 1 << 4;
        const GENERAL_INTERROGATION = 1 << 5;
    }
}

impl TrgOps {
    pub const BIT_LENGTH: usize = 6;

    pub fn subscription_default() -> Self {
        Self::DATA_CHANGE | Self::QUALITY_CHANGE | Self::INTEGRITY | Self::GENERAL_INTERROGATION
    }

    pub fn to_bit_string(self) -> BitString {
        bitflags_to_bit_string(self.bits(), Self::BIT_LENGTH)
    }

    pub fn from_bit_string(bits: &BitString) -> Self {
        Self::from_bits_truncate(bit_string_to_bitflags(bits, Self::BIT_LENGTH))
    }
}

bitflags! {
    /// Per-member reason-for-inclusion code carried in reports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ReasonCode: u8 {
        const DATA_CHANGE = 1 << 1;
        const QUALITY_CHANGE = 1 << 2;
        const DATA_UPDATE = 1 << 3;
        const INTEGRITY = 1 << 4;
        const GENERAL_INTERROGATION = 1 << 5;
        const APPLICATION_TRIGGER = 1 << 6;
    }
}

impl ReasonCode {
    pub const BIT_LENGTH: usize = 7;

    pub fn from_bit_string(bits: &BitString) -> Self {
        Self::from_bits_truncate(
            u8::try_from(bit_string_to_bitflags(bits, Self::BIT_LENGTH)).unwrap_or(0),
        )
    }
}

fn bitflags_to_bit_string(bits: u16, bit_length: usize) -> BitString {
    let mut out = BitString::zeroed(bit_length);

    for index in 0..bit_length {
        if bits & (1 << index) != 0 {
            out.set_bit(index, true);
        }
    }

    out
}

fn bit_string_to_bitflags(bits: &BitString, bit_length: usize) -> u16 {
    let mut out = 0u16;

    for index in 0..bit_length.min(bits.bit_length()) {
        if bits.bit(index) {
            out |= 1 << index;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opt_flds_wire_positions() {
        let flds = OptFlds::subscription_default();
        let bits = flds.to_bit_string();

        assert_eq!(bits.bit_length(), 10);
        // 0111 1111 10: everything but reserved and segmentation
        assert_eq!(bits.octets(), [0b0111_1111, 0b1000_0000]);
        assert_eq!(OptFlds::from_bit_string(&bits), flds);
    }

    #[test]
    fn trg_ops_wire_positions() {
        let ops = TrgOps::subscription_default();
        let bits = ops.to_bit_string();

        assert_eq!(bits.bit_length(), 6);
        // 0110 11: dchg, qchg, integrity, GI
        assert_eq!(bits.octets(), [0b0110_1100]);
        assert_eq!(TrgOps::from_bit_string(&bits), ops);
    }

    #[test]
    fn rcb_reference_attributes() {
        let rcb = RcbReference::new("VMC7_1LD0", "LLN0$BR$brcbST01");

        assert_eq!(rcb.rcb_type(), RcbType::Buffered);
        assert_eq!(
            rcb.attribute(RcbAttribute::RptEna),
            ObjectName::domain_specific("VMC7_1LD0", "LLN0$BR$brcbST01$RptEna")
        );

        let urcb = RcbReference::new("VMC7_1LD0", "LLN0$RP$urcbMX01");
        assert_eq!(urcb.rcb_type(), RcbType::Unbuffered);
    }
}
