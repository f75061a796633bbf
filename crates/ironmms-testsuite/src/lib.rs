//! Shared helpers and wire vectors for the IronMMS integration tests.

use ironmms_core::{from_octets, to_octets, OctetReader, WireDecode};
use ironmms_pdu::cotp::{segment_user_data, Cotp, CotpPdu, DataTransfer, Reassembler, Tpdu};
use ironmms_pdu::mms::MmsPdu;
use ironmms_pdu::{PduHint as _, TPKT_HINT};

/// Encodes one MMS PDU as a sequence of TPKT-framed DT TPDUs, the way it
/// travels on the wire.
pub fn mms_frames(pdu: &MmsPdu, max_tpdu_size: usize) -> Vec<u8> {
    let user_data = to_octets(pdu).expect("encode MMS PDU");

    let mut out = Vec::new();
    for fragment in segment_user_data(&user_data, max_tpdu_size) {
        out.extend_from_slice(&to_octets(&Cotp(fragment)).expect("encode DT TPDU"));
    }

    out
}

/// Splits a byte stream into TPKT frames.
pub fn split_frames(mut octets: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();

    while !octets.is_empty() {
        let size = TPKT_HINT
            .find_size(octets)
            .expect("valid TPKT header")
            .expect("complete frame");
        let (frame, rest) = octets.split_at(size);
        frames.push(frame.to_vec());
        octets = rest;
    }

    frames
}

/// Reassembles every MMS PDU out of a byte stream of DT frames.
pub fn decode_mms_stream(octets: &[u8]) -> Vec<MmsPdu> {
    let mut reassembler = Reassembler::new();
    let mut pdus = Vec::new();

    for frame in split_frames(octets) {
        let tpdu = from_octets::<Tpdu>(&frame).expect("decode TPDU");
        let Tpdu::Data(data) = tpdu else {
            panic!("expected a DT TPDU");
        };

        if let Some(user_data) = reassembler.feed(data) {
            pdus.push(from_octets::<MmsPdu>(&user_data).expect("decode MMS PDU"));
        }
    }

    pdus
}

/// Encodes one COTP TPDU into its TPKT frame.
pub fn cotp_frame<T>(pdu: &T) -> Vec<u8>
where
    T: CotpPdu + Clone,
{
    to_octets(&Cotp(pdu.clone())).expect("encode COTP TPDU")
}

/// Reads a single DT TPDU out of a frame.
pub fn dt_of_frame(frame: &[u8]) -> DataTransfer {
    match from_octets::<Tpdu>(frame).expect("decode TPDU") {
        Tpdu::Data(data) => data,
        other => panic!("expected DT, got {other:?}"),
    }
}

/// Convenience for tests reading one PDU out of a full stream.
pub fn decode_single_mms(octets: &[u8]) -> MmsPdu {
    let mut pdus = decode_mms_stream(octets);
    assert_eq!(pdus.len(), 1, "expected exactly one MMS PDU");
    pdus.remove(0)
}

/// Decodes a value, asserting the whole input is consumed.
pub fn decode_exact<T: WireDecode>(octets: &[u8]) -> T {
    let mut src = OctetReader::new(octets);
    let value = T::decode_from(&mut src).expect("decode");
    assert!(src.is_empty(), "decode must consume the full input");
    value
}
