//! Wire codec vocabulary: the error kinds a codec can raise and the
//! encode/decode traits the PDU types implement.

use core::fmt;

use ironmms_error::Error;

use crate::{OctetReader, OctetWriter};

pub type WireResult<T> = Result<T, WireError>;

pub type WireError = Error<WireErrorKind>;

/// What can go wrong while putting an element on the wire or lifting
/// one off it.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub enum WireErrorKind {
    /// Ran out of octets (or of room) mid-element.
    Truncated { wanted: usize, available: usize },
    /// A framing or encoding invariant does not hold.
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
    /// A tag, type or message code this client does not speak.
    UnknownTag { tag: u8 },
}

impl fmt::Display for WireErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { wanted, available } => {
                write!(f, "truncated element: wanted {wanted} octets, {available} available")
            }
            Self::Invalid { field, reason } => {
                write!(f, "invalid `{field}`: {reason}")
            }
            Self::UnknownTag { tag } => {
                write!(f, "unknown tag ({tag})")
            }
        }
    }
}

impl std::error::Error for WireErrorKind {}

pub fn truncated_err(context: &'static str, wanted: usize, available: usize) -> WireError {
    WireError::new(context, WireErrorKind::Truncated { wanted, available })
}

pub fn invalid_err(context: &'static str, field: &'static str, reason: &'static str) -> WireError {
    WireError::new(context, WireErrorKind::Invalid { field, reason })
}

pub fn unknown_tag_err(context: &'static str, tag: u8) -> WireError {
    WireError::new(context, WireErrorKind::UnknownTag { tag })
}

/// An element that can be laid out on the wire.
///
/// Encoding is two-phase: [`encoded_len`](Self::encoded_len) sizes the
/// element exactly, then [`encode_into`](Self::encode_into) fills a
/// writer with at least that much room. The helpers below handle the
/// buffer management.
pub trait WireEncode {
    /// Exact number of octets [`encode_into`](Self::encode_into) produces.
    fn encoded_len(&self) -> usize;

    /// Writes the element.
    fn encode_into(&self, out: &mut OctetWriter<'_>) -> WireResult<()>;
}

const _: Option<&dyn WireEncode> = None; // object-safety assertion

/// An element that can be lifted off the wire.
///
/// MMS values own their payload (strings, octet strings, nested
/// structures), so decoding always yields an owned value.
pub trait WireDecode: Sized {
    fn decode_from(src: &mut OctetReader<'_>) -> WireResult<Self>;
}

/// Encodes one element into a fresh buffer.
pub fn to_octets<T>(element: &T) -> WireResult<Vec<u8>>
where
    T: WireEncode + ?Sized,
{
    let mut octets = vec![0; element.encoded_len()];
    let mut writer = OctetWriter::new(&mut octets);
    element.encode_into(&mut writer)?;
    debug_assert_eq!(writer.position(), octets.len());
    Ok(octets)
}

/// Encodes one element onto the end of `out`, returning the number of
/// octets appended. `out` is left untouched on failure.
pub fn append_octets<T>(element: &T, out: &mut Vec<u8>) -> WireResult<usize>
where
    T: WireEncode + ?Sized,
{
    let len = element.encoded_len();
    let start = out.len();
    out.resize(start + len, 0);

    let mut writer = OctetWriter::new(&mut out[start..]);
    match element.encode_into(&mut writer) {
        Ok(()) => {
            debug_assert_eq!(writer.position(), len);
            Ok(len)
        }
        Err(error) => {
            out.truncate(start);
            Err(error)
        }
    }
}

/// Decodes one element from a slice.
pub fn from_octets<T: WireDecode>(octets: &[u8]) -> WireResult<T> {
    T::decode_from(&mut OctetReader::new(octets))
}
