//! RFC 1006 framing.
//!
//! Every TPDU the MMS stack exchanges travels inside one TPKT frame: a
//! version octet, a reserved octet that must be zero, and the big-endian
//! total frame length (header included), followed by the TPDU octets.
//! A version or reserved mismatch is a framing fault that tears the
//! connection down.

use ironmms_core::{ensure_octets, invalid_err, OctetReader, OctetWriter, WireResult};

const CONTEXT: &str = "Tpkt";

pub const VERSION: u8 = 3;

pub const HEADER_LEN: usize = 4;

/// The smallest legal frame: the header plus a minimal 3-octet TPDU.
pub const MIN_FRAME_LEN: usize = 7;

/// The length field is 16 bits and covers the header.
pub const MAX_FRAME_LEN: usize = 65_535;

/// Largest TPDU that fits one frame.
pub const MAX_TPDU_LEN: usize = MAX_FRAME_LEN - HEADER_LEN;

/// Writes the header of a frame totalling `frame_len` octets.
pub fn write_header(out: &mut OctetWriter<'_>, frame_len: usize) -> WireResult<()> {
    ensure_octets!(out, HEADER_LEN, CONTEXT);

    let frame_len =
        u16::try_from(frame_len).map_err(|_| invalid_err(CONTEXT, "length", "frame larger than 65535 octets"))?;

    out.put_u8(VERSION);
    out.put_u8(0); // reserved
    out.put_u16(frame_len);

    Ok(())
}

/// Reads and validates a frame header, returning the total frame length
/// (header included).
pub fn read_header(src: &mut OctetReader<'_>) -> WireResult<usize> {
    ensure_octets!(src, HEADER_LEN, CONTEXT);

    let version = src.take_u8();
    if version != VERSION {
        return Err(invalid_err(CONTEXT, "version", "not an RFC 1006 frame"));
    }

    let reserved = src.take_u8();
    if reserved != 0 {
        return Err(invalid_err(CONTEXT, "reserved", "must be zero"));
    }

    let frame_len = usize::from(src.take_u16());
    if frame_len < MIN_FRAME_LEN {
        return Err(invalid_err(CONTEXT, "length", "frame shorter than the minimal TPDU"));
    }

    Ok(frame_len)
}
