use ironmms_core::{OctetReader, OctetWriter, WireResult};
use ironmms_pdu::ber::{self, universal, BitString, Tag};
use ironmms_pdu::mms::MmsValue;
use ironmms_pdu::time::{BinaryTime, UtcTime};
use proptest::prelude::*;

fn encode_with<F>(capacity: usize, f: F) -> Vec<u8>
where
    F: FnOnce(&mut OctetWriter<'_>) -> WireResult<usize>,
{
    let mut buf = vec![0; capacity];
    let mut out = OctetWriter::new(&mut buf);
    let written = f(&mut out).unwrap();
    buf.truncate(written);
    buf
}

#[test]
fn integer_vectors() {
    let int_tag = Tag::universal(universal::INTEGER);

    assert_eq!(encode_with(8, |out| ber::write_integer(out, int_tag, 42)), [0x02, 0x01, 0x2A]);
    assert_eq!(encode_with(8, |out| ber::write_integer(out, int_tag, -1)), [0x02, 0x01, 0xFF]);
    assert_eq!(
        encode_with(8, |out| ber::write_integer(out, int_tag, 256)),
        [0x02, 0x02, 0x01, 0x00]
    );
}

#[test]
fn float_vectors() {
    // Universal REAL form
    assert_eq!(
        encode_with(8, |out| ber::write_float32(out, Tag::universal(universal::REAL), 50.0)),
        [0x09, 0x05, 0x08, 0x42, 0x48, 0x00, 0x00]
    );

    // MMS Data CHOICE form (floating-point is context tag 7)
    let value = MmsValue::Float(50.0);
    assert_eq!(
        encode_with(8, |out| value.write_data(out)),
        [0x87, 0x05, 0x08, 0x42, 0x48, 0x00, 0x00]
    );
}

fn bit_string_strategy() -> impl Strategy<Value = BitString> {
    prop::collection::vec(any::<bool>(), 0..24).prop_map(|bits| {
        let mut out = BitString::zeroed(bits.len());
        for (index, bit) in bits.iter().enumerate() {
            out.set_bit(index, *bit);
        }
        out
    })
}

fn scalar_strategy() -> impl Strategy<Value = MmsValue> {
    prop_oneof![
        any::<bool>().prop_map(MmsValue::Bool),
        any::<i64>().prop_map(MmsValue::Int),
        any::<u64>().prop_map(MmsValue::Uint),
        any::<f32>()
            .prop_filter("finite floats round-trip by equality", |f| f.is_finite())
            .prop_map(MmsValue::Float),
        any::<f64>()
            .prop_filter("finite floats round-trip by equality", |f| f.is_finite())
            .prop_map(MmsValue::Double),
        bit_string_strategy().prop_map(MmsValue::BitString),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(MmsValue::OctetString),
        "[ -~]{0,24}".prop_map(MmsValue::VisibleString),
        (any::<u32>(), 0u32..(1 << 24), any::<u8>()).prop_map(|(seconds, fraction, quality)| {
            MmsValue::UtcTime(UtcTime {
                seconds,
                fraction,
                quality,
            })
        }),
        (0u32..86_400_000, proptest::option::of(0u32..u32::from(u16::MAX))).prop_map(
            |(millis_of_day, days_since_1984)| {
                MmsValue::BinaryTime(BinaryTime {
                    millis_of_day,
                    days_since_1984,
                })
            }
        ),
    ]
}

fn value_strategy() -> impl Strategy<Value = MmsValue> {
    scalar_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(MmsValue::Structure),
            prop::collection::vec(inner, 0..4).prop_map(MmsValue::Array),
        ]
    })
}

proptest! {
    /// decode(encode(v)) == v for every value.
    #[test]
    fn data_round_trip(value in value_strategy()) {
        let buf = encode_with(4096, |out| value.write_data(out));

        let mut src = OctetReader::new(&buf);
        let decoded = MmsValue::read_data(&mut src).unwrap();

        prop_assert!(src.is_empty(), "decode must consume the full encoding");
        prop_assert_eq!(decoded, value);
    }

    /// The advertised size matches the bytes actually written.
    #[test]
    fn data_size_is_exact(value in value_strategy()) {
        let buf = encode_with(4096, |out| value.write_data(out));
        prop_assert_eq!(buf.len(), value.data_size());
    }

    /// One TLV read consumes exactly one encoding, even with trailing bytes.
    #[test]
    fn tlv_length_exactness(value in value_strategy(), trailing in prop::collection::vec(any::<u8>(), 0..8)) {
        let mut buf = encode_with(4096, |out| value.write_data(out));
        let encoded_len = buf.len();
        buf.extend_from_slice(&trailing);

        let mut src = OctetReader::new(&buf);
        let _ = ber::read_tlv(&mut src).unwrap();
        prop_assert_eq!(src.position(), encoded_len);
    }
}

#[test]
fn indefinite_length_structure_decodes() {
    // structure { integer 5 } with an indefinite outer length
    let buf = [0xA2, 0x80, 0x85, 0x01, 0x05, 0x00, 0x00];

    let mut src = OctetReader::new(&buf);
    let decoded = MmsValue::read_data(&mut src).unwrap();

    assert_eq!(decoded, MmsValue::Structure(vec![MmsValue::Int(5)]));
    assert!(src.is_empty());
}
