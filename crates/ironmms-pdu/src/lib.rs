#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod ber;
pub mod cotp;
pub mod mms;
pub mod rcb;
pub mod time;
pub mod tpkt;

pub use ironmms_core::{
    append_octets, from_octets, to_octets, OctetReader, OctetWriter, WireDecode, WireEncode, WireError, WireErrorKind,
    WireResult,
};

/// Incremental frame-size probe used by buffered readers.
///
/// Implementations look at the first few bytes of a partially received
/// stream and report how many bytes make up the next complete frame, or
/// `None` when more bytes are needed before the size is known.
pub trait PduHint: Send + Sync + core::fmt::Debug + 'static {
    /// Finds next PDU size by reading the next few bytes.
    fn find_size(&self, octets: &[u8]) -> WireResult<Option<usize>>;
}

const _: Option<&dyn PduHint> = None; // object-safety assertion

/// Hint matching TPKT-framed traffic, which is everything on an MMS wire.
#[derive(Clone, Copy, Debug)]
pub struct TpktHint;

pub const TPKT_HINT: TpktHint = TpktHint;

impl PduHint for TpktHint {
    fn find_size(&self, octets: &[u8]) -> WireResult<Option<usize>> {
        if octets.len() < tpkt::HEADER_LEN {
            return Ok(None);
        }

        tpkt::read_header(&mut OctetReader::new(octets)).map(Some)
    }
}
