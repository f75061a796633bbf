use core::fmt;

use ironmms_core::{invalid_err, OctetReader, OctetWriter, WireResult};

use crate::ber::{self, BitString, Float, Tag};
use crate::time::{BinaryTime, UtcTime};

/// Data CHOICE context tags (ISO 9506-2).
mod data_tag {
    pub const ARRAY: u32 = 1;
    pub const STRUCTURE: u32 = 2;
    pub const BOOLEAN: u32 = 3;
    pub const BIT_STRING: u32 = 4;
    pub const INTEGER: u32 = 5;
    pub const UNSIGNED: u32 = 6;
    pub const FLOATING_POINT: u32 = 7;
    pub const OCTET_STRING: u32 = 9;
    pub const VISIBLE_STRING: u32 = 10;
    pub const GENERALIZED_TIME: u32 = 11;
    pub const BINARY_TIME: u32 = 12;
    pub const BCD: u32 = 13;
    pub const BOOLEAN_ARRAY: u32 = 14;
    pub const OBJ_ID: u32 = 15;
    pub const MMS_STRING: u32 = 16;
    pub const UTC_TIME: u32 = 17;
}

/// A dynamic MMS value.
///
/// Structure and array nesting is naturally recursive; the canonical IEC
/// 61850 shapes (AnalogueValue as a two-member structure, Vector as a
/// structure holding a nested AnalogueValue) are preserved as-is.
#[derive(Clone, Debug, PartialEq)]
pub enum MmsValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f32),
    Double(f64),
    BitString(BitString),
    OctetString(Vec<u8>),
    VisibleString(String),
    BinaryTime(BinaryTime),
    UtcTime(UtcTime),
    Structure(Vec<MmsValue>),
    Array(Vec<MmsValue>),
}

impl MmsValue {
    pub const NAME: &'static str = "MmsValue";

    fn tag(&self) -> Tag {
        match self {
            Self::Bool(_) => Tag::context(data_tag::BOOLEAN),
            Self::Int(_) => Tag::context(data_tag::INTEGER),
            Self::Uint(_) => Tag::context(data_tag::UNSIGNED),
            Self::Float(_) | Self::Double(_) => Tag::context(data_tag::FLOATING_POINT),
            Self::BitString(_) => Tag::context(data_tag::BIT_STRING),
            Self::OctetString(_) => Tag::context(data_tag::OCTET_STRING),
            Self::VisibleString(_) => Tag::context(data_tag::VISIBLE_STRING),
            Self::BinaryTime(_) => Tag::context(data_tag::BINARY_TIME),
            Self::UtcTime(_) => Tag::context(data_tag::UTC_TIME),
            Self::Structure(_) => Tag::context_constructed(data_tag::STRUCTURE),
            Self::Array(_) => Tag::context_constructed(data_tag::ARRAY),
        }
    }

    fn content_size(&self) -> usize {
        match self {
            Self::Bool(_) => 1,
            Self::Int(value) => ber::sizeof_integer_content(*value),
            Self::Uint(value) => ber::sizeof_unsigned_content(*value),
            Self::Float(_) => ber::FLOAT32_CONTENT_SIZE,
            Self::Double(_) => ber::FLOAT64_CONTENT_SIZE,
            Self::BitString(bits) => bits.content_size(),
            Self::OctetString(bytes) => bytes.len(),
            Self::VisibleString(s) => s.len(),
            Self::BinaryTime(t) => t.content_size(),
            Self::UtcTime(_) => UtcTime::CONTENT_SIZE,
            Self::Structure(members) | Self::Array(members) => members.iter().map(Self::data_size).sum(),
        }
    }

    /// Size of this value as a full Data TLV.
    pub fn data_size(&self) -> usize {
        ber::sizeof_tlv(self.tag().number, self.content_size())
    }

    /// Writes this value as a Data TLV (context-tagged CHOICE).
    pub fn write_data(&self, dst: &mut OctetWriter<'_>) -> WireResult<usize> {
        let tag = self.tag();

        match self {
            Self::Bool(value) => ber::write_bool(dst, tag, *value),
            Self::Int(value) => ber::write_integer(dst, tag, *value),
            Self::Uint(value) => ber::write_unsigned(dst, tag, *value),
            Self::Float(value) => ber::write_float32(dst, tag, *value),
            Self::Double(value) => ber::write_float64(dst, tag, *value),
            Self::BitString(bits) => ber::write_bit_string(dst, tag, bits),
            Self::OctetString(bytes) => ber::write_octet_string(dst, tag, bytes),
            Self::VisibleString(s) => ber::write_visible_string(dst, tag, s),
            Self::BinaryTime(t) => ber::write_octet_string(dst, tag, &t.to_content()),
            Self::UtcTime(t) => ber::write_octet_string(dst, tag, &t.to_content()),
            Self::Structure(members) | Self::Array(members) => {
                let mut written = ber::write_header(dst, tag, self.content_size())?;
                for member in members {
                    written += member.write_data(dst)?;
                }
                Ok(written)
            }
        }
    }

    /// Reads one Data TLV.
    pub fn read_data(src: &mut OctetReader<'_>) -> WireResult<Self> {
        let (tag, content) = ber::read_tlv(src)?;
        Self::from_tlv(tag, content)
    }

    /// Builds a value from an already-read Data TLV.
    pub fn from_tlv(tag: Tag, content: &[u8]) -> WireResult<Self> {
        match tag.number {
            data_tag::BOOLEAN => ber::parse_bool(content).map(Self::Bool),
            data_tag::INTEGER => ber::parse_integer(content).map(Self::Int),
            data_tag::UNSIGNED | data_tag::BCD => ber::parse_unsigned(content).map(Self::Uint),
            data_tag::FLOATING_POINT => Ok(match ber::parse_float(content)? {
                Float::Single(value) => Self::Float(value),
                Float::Double(value) => Self::Double(value),
            }),
            data_tag::BIT_STRING | data_tag::BOOLEAN_ARRAY => ber::parse_bit_string(content).map(Self::BitString),
            data_tag::OCTET_STRING | data_tag::OBJ_ID => Ok(Self::OctetString(content.to_vec())),
            data_tag::VISIBLE_STRING | data_tag::MMS_STRING | data_tag::GENERALIZED_TIME => {
                ber::parse_visible_string(content).map(Self::VisibleString)
            }
            data_tag::BINARY_TIME => BinaryTime::from_content(content).map(Self::BinaryTime),
            data_tag::UTC_TIME => UtcTime::from_content(content).map(Self::UtcTime),
            data_tag::STRUCTURE | data_tag::ARRAY => {
                let mut inner = OctetReader::new(content);
                let mut members = Vec::new();

                while !inner.is_empty() {
                    members.push(Self::read_data(&mut inner)?);
                }

                if tag.number == data_tag::STRUCTURE {
                    Ok(Self::Structure(members))
                } else {
                    Ok(Self::Array(members))
                }
            }
            _ => Err(invalid_err(Self::NAME, "tag", "unknown Data alternative")),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Uint(value) => Some(*value),
            Self::Int(value) => u64::try_from(*value).ok(),
            _ => None,
        }
    }

    pub fn as_visible_string(&self) -> Option<&str> {
        match self {
            Self::VisibleString(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bit_string(&self) -> Option<&BitString> {
        match self {
            Self::BitString(bits) => Some(bits),
            _ => None,
        }
    }

    /// Numeric projection used by measurement sinks: integers, unsigned,
    /// floats and booleans all collapse to f64.
    #[expect(clippy::cast_precision_loss)] // measurement projection
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
            Self::Int(value) => Some(*value as f64),
            Self::Uint(value) => Some(*value as f64),
            Self::Float(value) => Some(f64::from(*value)),
            Self::Double(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for MmsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Uint(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::BitString(bits) => {
                write!(f, "b'")?;
                for index in 0..bits.bit_length() {
                    write!(f, "{}", u8::from(bits.bit(index)))?;
                }
                write!(f, "'")
            }
            Self::OctetString(bytes) => {
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Self::VisibleString(s) => write!(f, "{s}"),
            Self::BinaryTime(t) => write!(f, "{t}"),
            Self::UtcTime(t) => write!(f, "{t}"),
            Self::Structure(members) | Self::Array(members) => {
                write!(f, "{{")?;
                for (index, member) in members.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{member}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// DataAccessError values returned for failed variable access.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DataAccessError(pub u8);

impl DataAccessError {
    pub const OBJECT_INVALIDATED: Self = Self(0);
    pub const HARDWARE_FAULT: Self = Self(1);
    pub const TEMPORARILY_UNAVAILABLE: Self = Self(2);
    pub const OBJECT_ACCESS_DENIED: Self = Self(3);
    pub const OBJECT_UNDEFINED: Self = Self(4);
    pub const INVALID_ADDRESS: Self = Self(5);
    pub const TYPE_UNSUPPORTED: Self = Self(6);
    pub const TYPE_INCONSISTENT: Self = Self(7);
    pub const OBJECT_ATTRIBUTE_INCONSISTENT: Self = Self(8);
    pub const OBJECT_ACCESS_UNSUPPORTED: Self = Self(9);
    pub const OBJECT_NON_EXISTENT: Self = Self(10);
    pub const OBJECT_VALUE_INVALID: Self = Self(11);
}

impl fmt::Display for DataAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::OBJECT_INVALIDATED => "object-invalidated",
            Self::HARDWARE_FAULT => "hardware-fault",
            Self::TEMPORARILY_UNAVAILABLE => "temporarily-unavailable",
            Self::OBJECT_ACCESS_DENIED => "object-access-denied",
            Self::OBJECT_UNDEFINED => "object-undefined",
            Self::INVALID_ADDRESS => "invalid-address",
            Self::TYPE_UNSUPPORTED => "type-unsupported",
            Self::TYPE_INCONSISTENT => "type-inconsistent",
            Self::OBJECT_ATTRIBUTE_INCONSISTENT => "object-attribute-inconsistent",
            Self::OBJECT_ACCESS_UNSUPPORTED => "object-access-unsupported",
            Self::OBJECT_NON_EXISTENT => "object-non-existent",
            Self::OBJECT_VALUE_INVALID => "object-value-invalid",
            Self(other) => return write!(f, "data-access-error({other})"),
        };

        write!(f, "{name}")
    }
}

impl std::error::Error for DataAccessError {}

/// AccessResult CHOICE: `failure [0] DataAccessError` or a Data value.
#[derive(Clone, Debug, PartialEq)]
pub enum AccessResult {
    Success(MmsValue),
    Failure(DataAccessError),
}

const FAILURE_TAG: u32 = 0;

impl AccessResult {
    pub const NAME: &'static str = "AccessResult";

    pub fn size(&self) -> usize {
        match self {
            Self::Success(value) => value.data_size(),
            Self::Failure(error) => ber::sizeof_tlv(FAILURE_TAG, ber::sizeof_unsigned_content(u64::from(error.0))),
        }
    }

    pub fn write(&self, dst: &mut OctetWriter<'_>) -> WireResult<usize> {
        match self {
            Self::Success(value) => value.write_data(dst),
            Self::Failure(error) => ber::write_unsigned(dst, Tag::context(FAILURE_TAG), u64::from(error.0)),
        }
    }

    pub fn read(src: &mut OctetReader<'_>) -> WireResult<Self> {
        let (tag, content) = ber::read_tlv(src)?;

        if tag.number == FAILURE_TAG && !tag.constructed {
            let code = ber::parse_unsigned(content)?;
            let code = u8::try_from(code)
                .map_err(|_| invalid_err(Self::NAME, "failure", "error code out of range"))?;
            return Ok(Self::Failure(DataAccessError(code)));
        }

        MmsValue::from_tlv(tag, content).map(Self::Success)
    }

    pub fn success(&self) -> Option<&MmsValue> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: &MmsValue) -> MmsValue {
        let mut buf = vec![0; value.data_size()];
        let mut cur = OctetWriter::new(&mut buf);
        let written = value.write_data(&mut cur).unwrap();
        assert_eq!(written, buf.len());

        let mut cur = OctetReader::new(&buf);
        let decoded = MmsValue::read_data(&mut cur).unwrap();
        assert!(cur.is_empty(), "decode must consume the full encoding");
        decoded
    }

    #[test]
    fn scalar_round_trips() {
        for value in [
            MmsValue::Bool(true),
            MmsValue::Int(-12345),
            MmsValue::Uint(54321),
            MmsValue::Float(50.0),
            MmsValue::Double(-2.5),
            MmsValue::OctetString(vec![0xDE, 0xAD]),
            MmsValue::VisibleString("LLN0$ST".to_owned()),
        ] {
            assert_eq!(round_trip(&value), value);
        }
    }

    #[test]
    fn float_wire_form_is_context_tagged() {
        let value = MmsValue::Float(50.0);
        let mut buf = vec![0; value.data_size()];
        let mut cur = OctetWriter::new(&mut buf);
        value.write_data(&mut cur).unwrap();

        assert_eq!(buf, [0x87, 0x05, 0x08, 0x42, 0x48, 0x00, 0x00]);
    }

    #[test]
    fn analogue_value_structure_nests() {
        // AnalogueValue { i, f } inside Vector { mag, ang }
        let mag = MmsValue::Structure(vec![MmsValue::Int(100), MmsValue::Float(99.5)]);
        let vector = MmsValue::Structure(vec![mag.clone(), MmsValue::Structure(vec![
            MmsValue::Int(-3),
            MmsValue::Float(0.25),
        ])]);

        assert_eq!(round_trip(&vector), vector);

        let array = MmsValue::Array(vec![mag.clone(), mag]);
        assert_eq!(round_trip(&array), array);
    }

    #[test]
    fn access_result_failure_round_trip() {
        let failure = AccessResult::Failure(DataAccessError::OBJECT_ACCESS_DENIED);

        let mut buf = vec![0; failure.size()];
        let mut cur = OctetWriter::new(&mut buf);
        failure.write(&mut cur).unwrap();
        assert_eq!(buf, [0x80, 0x01, 0x03]);

        let mut cur = OctetReader::new(&buf);
        assert_eq!(AccessResult::read(&mut cur).unwrap(), failure);
    }
}
