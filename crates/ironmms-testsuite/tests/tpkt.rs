use ironmms_core::{OctetReader, OctetWriter};
use ironmms_pdu::{tpkt, PduHint as _, TPKT_HINT};
use rstest::rstest;

/// 17 bytes of COTP-looking payload.
const PAYLOAD: [u8; 17] = [
    0xE0, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC1, 0x02, 0x00, 0x01, 0xC2, 0x02, 0x00, 0x01, 0xC0, 0x01, 0x0A,
];

fn frame(payload: &[u8]) -> Vec<u8> {
    let frame_len = tpkt::HEADER_LEN + payload.len();

    let mut buf = vec![0; frame_len];
    let mut out = OctetWriter::new(&mut buf);
    tpkt::write_header(&mut out, frame_len).unwrap();
    out.put_octets(payload);

    buf
}

#[test]
fn length_covers_header_and_payload() {
    let buf = frame(&PAYLOAD);

    assert_eq!(&buf[..4], [0x03, 0x00, 0x00, 0x15]);
    assert_eq!(&buf[4..], PAYLOAD);
}

#[test]
fn round_trip_returns_payload() {
    let buf = frame(&PAYLOAD);

    let mut src = OctetReader::new(&buf);
    let frame_len = tpkt::read_header(&mut src).unwrap();

    assert_eq!(frame_len, 21);
    assert_eq!(src.rest(), PAYLOAD);
}

#[test]
fn hint_waits_for_the_full_header() {
    assert_eq!(TPKT_HINT.find_size(&[0x03]).unwrap(), None);
    assert_eq!(TPKT_HINT.find_size(&[0x03, 0x00, 0x00]).unwrap(), None);

    let buf = frame(&PAYLOAD);
    assert_eq!(TPKT_HINT.find_size(&buf[..4]).unwrap(), Some(21));
}

#[rstest]
#[case::wrong_version(&[0x02, 0x00, 0x00, 0x15])]
#[case::garbage_version(&[0xFF, 0x00, 0x00, 0x15])]
#[case::nonzero_reserved(&[0x03, 0x01, 0x00, 0x15])]
#[case::garbage_reserved(&[0x03, 0xAB, 0x00, 0x15])]
#[case::length_below_minimum(&[0x03, 0x00, 0x00, 0x06])]
fn header_invariant_violations_are_rejected(#[case] header: &[u8]) {
    let mut src = OctetReader::new(header);
    assert!(tpkt::read_header(&mut src).is_err());
}

#[test]
fn smallest_legal_frame_is_accepted() {
    let mut src = OctetReader::new(&[0x03, 0x00, 0x00, 0x07]);
    assert_eq!(tpkt::read_header(&mut src).unwrap(), tpkt::MIN_FRAME_LEN);
}

#[test]
fn max_payload_round_trips() {
    let payload = vec![0xA5u8; tpkt::MAX_TPDU_LEN];
    let buf = frame(&payload);

    let mut src = OctetReader::new(&buf);
    let frame_len = tpkt::read_header(&mut src).unwrap();

    assert_eq!(frame_len, tpkt::MAX_FRAME_LEN);
    assert_eq!(src.rest(), payload.as_slice());
}
