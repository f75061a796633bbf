//! ASN.1 BER primitives for the MMS subset.
//!
//! Encoding always produces definite, minimal lengths. Decoding also
//! accepts indefinite lengths (terminated by an end-of-contents marker),
//! because MMS stacks in the wild emit them inside constructed values.

use ironmms_core::{ensure_octets, invalid_err, truncated_err, OctetReader, OctetWriter, WireResult};

const NAME: &str = "Ber";

const TAG_NUMBER_MASK: u8 = 0x1F;
const CONSTRUCTED_BIT: u8 = 0x20;

/// BER tag class (bits 8-7 of the identifier octet).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TagClass {
    Universal = 0x00,
    Application = 0x40,
    ContextSpecific = 0x80,
    Private = 0xC0,
}

impl TagClass {
    fn from_identifier(identifier: u8) -> Self {
        match identifier & 0xC0 {
            0x00 => Self::Universal,
            0x40 => Self::Application,
            0x80 => Self::ContextSpecific,
            _ => Self::Private,
        }
    }
}

/// Universal tag numbers used by the MMS subset.
pub mod universal {
    pub const BOOLEAN: u32 = 0x01;
    pub const INTEGER: u32 = 0x02;
    pub const BIT_STRING: u32 = 0x03;
    pub const OCTET_STRING: u32 = 0x04;
    pub const EXTERNAL: u32 = 0x08;
    pub const REAL: u32 = 0x09;
    pub const SEQUENCE: u32 = 0x10;
    pub const VISIBLE_STRING: u32 = 0x1A;
}

/// A decoded BER identifier: class, primitive/constructed flag, tag number.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub class: TagClass,
    pub constructed: bool,
    pub number: u32,
}

impl Tag {
    pub const fn universal(number: u32) -> Self {
        Self {
            class: TagClass::Universal,
            constructed: false,
            number,
        }
    }

    pub const fn sequence() -> Self {
        Self {
            class: TagClass::Universal,
            constructed: true,
            number: universal::SEQUENCE,
        }
    }

    pub const fn context(number: u32) -> Self {
        Self {
            class: TagClass::ContextSpecific,
            constructed: false,
            number,
        }
    }

    pub const fn context_constructed(number: u32) -> Self {
        Self {
            class: TagClass::ContextSpecific,
            constructed: true,
            number,
        }
    }

    /// True for a context-specific or application tag with this number,
    /// constructed or not. MMS CHOICE dispatch in the wild is loose about
    /// the class bits, so matching considers both classes.
    pub fn is_choice(&self, number: u32) -> bool {
        matches!(self.class, TagClass::ContextSpecific | TagClass::Application) && self.number == number
    }
}

/// A decoded BER length field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Length {
    Definite(usize),
    Indefinite,
}

/// Number of octets needed to encode this tag.
pub fn sizeof_tag(number: u32) -> usize {
    if number < 31 {
        1
    } else {
        // long form: leading octet plus base-128 continuation octets
        let mut n = number;
        let mut octets = 1;
        while n > 0 {
            octets += 1;
            n >>= 7;
        }
        octets
    }
}

/// Number of octets needed to encode this definite length.
pub fn sizeof_length(length: usize) -> usize {
    if length < 0x80 {
        1
    } else {
        let mut n = length;
        let mut octets = 1;
        while n > 0 {
            octets += 1;
            n >>= 8;
        }
        octets
    }
}

/// Full size of a TLV with a short-or-long tag and the given content length.
pub fn sizeof_tlv(tag_number: u32, content_length: usize) -> usize {
    sizeof_tag(tag_number) + sizeof_length(content_length) + content_length
}

pub fn write_tag(out: &mut OctetWriter<'_>, tag: Tag) -> WireResult<usize> {
    ensure_octets!(out, sizeof_tag(tag.number), NAME);

    let leading = tag.class as u8 | if tag.constructed { CONSTRUCTED_BIT } else { 0 };

    if tag.number < 31 {
        #[expect(clippy::cast_possible_truncation)] // number < 31
        out.put_u8(leading | (tag.number as u8 & TAG_NUMBER_MASK));
        Ok(1)
    } else {
        out.put_u8(leading | TAG_NUMBER_MASK);

        let mut written = 1;
        let total = sizeof_tag(tag.number) - 1;
        for i in (0..total).rev() {
            #[expect(clippy::cast_possible_truncation)] // masked to 7 bits
            let mut octet = ((tag.number >> (7 * i)) & 0x7F) as u8;
            if i != 0 {
                octet |= 0x80;
            }
            out.put_u8(octet);
            written += 1;
        }
        Ok(written)
    }
}

pub fn read_tag(src: &mut OctetReader<'_>) -> WireResult<Tag> {
    ensure_octets!(src, 1, NAME);
    let identifier = src.take_u8();

    let class = TagClass::from_identifier(identifier);
    let constructed = identifier & CONSTRUCTED_BIT != 0;
    let mut number = u32::from(identifier & TAG_NUMBER_MASK);

    if number == u32::from(TAG_NUMBER_MASK) {
        // long form tag number, base-128 big-endian
        number = 0;
        loop {
            ensure_octets!(src, 1, NAME);
            let octet = src.take_u8();

            if number > (u32::MAX >> 7) {
                return Err(invalid_err(NAME, "tag", "tag number overflow"));
            }

            number = (number << 7) | u32::from(octet & 0x7F);

            if octet & 0x80 == 0 {
                break;
            }
        }
    }

    Ok(Tag {
        class,
        constructed,
        number,
    })
}

pub fn write_length(out: &mut OctetWriter<'_>, length: usize) -> WireResult<usize> {
    ensure_octets!(out, sizeof_length(length), NAME);

    if length < 0x80 {
        #[expect(clippy::cast_possible_truncation)] // length < 0x80
        out.put_u8(length as u8);
        return Ok(1);
    }

    let octets = sizeof_length(length) - 1;
    #[expect(clippy::cast_possible_truncation)] // at most 8 length octets
    out.put_u8(0x80 | octets as u8);

    for i in (0..octets).rev() {
        #[expect(clippy::cast_possible_truncation)] // masked to one octet
        out.put_u8(((length >> (8 * i)) & 0xFF) as u8);
    }

    Ok(1 + octets)
}

pub fn read_length(src: &mut OctetReader<'_>) -> WireResult<Length> {
    ensure_octets!(src, 1, NAME);
    let octet = src.take_u8();

    if octet & 0x80 == 0 {
        return Ok(Length::Definite(usize::from(octet)));
    }

    let count = usize::from(octet & 0x7F);

    if count == 0 {
        return Ok(Length::Indefinite);
    }

    if count == 0x7F {
        return Err(invalid_err(NAME, "length", "reserved length form"));
    }

    if count > core::mem::size_of::<usize>() {
        return Err(invalid_err(NAME, "length", "length of the length too large"));
    }

    ensure_octets!(src, count, NAME);

    let mut length = 0usize;
    for _ in 0..count {
        length = (length << 8) | usize::from(src.take_u8());
    }

    Ok(Length::Definite(length))
}

pub fn write_header(out: &mut OctetWriter<'_>, tag: Tag, content_length: usize) -> WireResult<usize> {
    let tag_len = write_tag(out, tag)?;
    let len_len = write_length(out, content_length)?;
    Ok(tag_len + len_len)
}

/// Reads one TLV and returns the tag with its content slice.
///
/// Indefinite-length values are resolved by scanning for the matching
/// end-of-contents marker; the returned content excludes the marker and
/// the reader is left after it.
pub fn read_tlv<'a>(src: &mut OctetReader<'a>) -> WireResult<(Tag, &'a [u8])> {
    let tag = read_tag(src)?;

    match read_length(src)? {
        Length::Definite(length) => {
            ensure_octets!(src, length, NAME);
            Ok((tag, src.take_octets(length)))
        }
        Length::Indefinite => {
            if !tag.constructed {
                return Err(invalid_err(NAME, "length", "indefinite length on primitive value"));
            }

            let content_length = indefinite_content_length(src)?;
            let content = src.take_octets(content_length);
            src.skip(2); // end-of-contents

            Ok((tag, content))
        }
    }
}

/// Skips one TLV, indefinite forms included.
pub fn skip_tlv(src: &mut OctetReader<'_>) -> WireResult<()> {
    let tag = read_tag(src)?;

    match read_length(src)? {
        Length::Definite(length) => {
            ensure_octets!(src, length, NAME);
            src.skip(length);
            Ok(())
        }
        Length::Indefinite => {
            if !tag.constructed {
                return Err(invalid_err(NAME, "length", "indefinite length on primitive value"));
            }

            loop {
                ensure_octets!(src, 2, NAME);
                if src.peek_octets(2) == [0x00, 0x00] {
                    src.skip(2);
                    return Ok(());
                }
                skip_tlv(src)?;
            }
        }
    }
}

fn indefinite_content_length(src: &OctetReader<'_>) -> WireResult<usize> {
    let mut probe = src.clone();
    let start = probe.position();

    loop {
        if probe.remaining() < 2 {
            return Err(truncated_err(NAME, 2, probe.remaining()));
        }
        if probe.peek_octets(2) == [0x00, 0x00] {
            return Ok(probe.position() - start);
        }
        skip_tlv(&mut probe)?;
    }
}

// == INTEGER == //

/// Content octets of a minimal two's-complement INTEGER.
pub fn sizeof_integer_content(value: i64) -> usize {
    let octets = value.to_be_bytes();
    let mut n = 8;

    while n > 1 {
        let first = octets[8 - n];
        let second = octets[8 - n + 1];
        let redundant = (first == 0x00 && second & 0x80 == 0) || (first == 0xFF && second & 0x80 != 0);
        if !redundant {
            break;
        }
        n -= 1;
    }

    n
}

/// Content octets of a minimal unsigned integer (leading zero octet added
/// when the top bit would read as a sign).
pub fn sizeof_unsigned_content(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits / 8 + 1
}

pub fn write_integer(out: &mut OctetWriter<'_>, tag: Tag, value: i64) -> WireResult<usize> {
    let content_length = sizeof_integer_content(value);
    let header = write_header(out, tag, content_length)?;

    ensure_octets!(out, content_length, NAME);
    let octets = value.to_be_bytes();
    out.put_octets(&octets[8 - content_length..]);

    Ok(header + content_length)
}

pub fn write_unsigned(out: &mut OctetWriter<'_>, tag: Tag, value: u64) -> WireResult<usize> {
    let content_length = sizeof_unsigned_content(value);
    let header = write_header(out, tag, content_length)?;

    ensure_octets!(out, content_length, NAME);
    let octets = value.to_be_bytes();
    if content_length > 8 {
        out.put_u8(0x00);
        out.put_octets(&octets);
    } else {
        out.put_octets(&octets[8 - content_length..]);
    }

    Ok(header + content_length)
}

pub fn parse_integer(content: &[u8]) -> WireResult<i64> {
    if content.is_empty() || content.len() > 8 {
        return Err(invalid_err(NAME, "integer", "invalid content length"));
    }

    let mut value = i64::from(content[0] as i8); // sign extension
    for &octet in &content[1..] {
        value = (value << 8) | i64::from(octet);
    }

    Ok(value)
}

pub fn parse_unsigned(content: &[u8]) -> WireResult<u64> {
    let content = match content {
        [] => return Err(invalid_err(NAME, "unsigned", "empty content")),
        [0x00, rest @ ..] if rest.len() == 8 => rest,
        _ if content.len() > 8 => return Err(invalid_err(NAME, "unsigned", "invalid content length")),
        _ => content,
    };

    let mut value = 0u64;
    for &octet in content {
        value = (value << 8) | u64::from(octet);
    }

    Ok(value)
}

// == BOOLEAN == //

pub fn write_bool(out: &mut OctetWriter<'_>, tag: Tag, value: bool) -> WireResult<usize> {
    let header = write_header(out, tag, 1)?;
    ensure_octets!(out, 1, NAME);
    out.put_u8(if value { 0xFF } else { 0x00 });
    Ok(header + 1)
}

pub fn parse_bool(content: &[u8]) -> WireResult<bool> {
    match content {
        // Any non-zero octet is accepted as true.
        [octet] => Ok(*octet != 0),
        _ => Err(invalid_err(NAME, "boolean", "invalid content length")),
    }
}

// == BIT STRING == //

/// An MSB-first bit string with an explicit bit count.
///
/// MMS bit strings (OptFlds, TrgOps, inclusion, quality, reason codes)
/// all declare their length in bits; the wire form prefixes the content
/// with the number of unused bits in the last octet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitString {
    data: Vec<u8>,
    bit_length: usize,
}

impl BitString {
    pub fn new(data: Vec<u8>, bit_length: usize) -> Self {
        debug_assert!(bit_length <= data.len() * 8);
        Self { data, bit_length }
    }

    /// All-zero bit string of the given length.
    pub fn zeroed(bit_length: usize) -> Self {
        Self {
            data: vec![0; bit_length.div_ceil(8)],
            bit_length,
        }
    }

    pub fn bit_length(&self) -> usize {
        self.bit_length
    }

    pub fn octets(&self) -> &[u8] {
        &self.data
    }

    /// Bit `index`, counting from the most significant bit of the first octet.
    pub fn bit(&self, index: usize) -> bool {
        if index >= self.bit_length {
            return false;
        }
        self.data[index / 8] & (0x80 >> (index % 8)) != 0
    }

    pub fn set_bit(&mut self, index: usize, value: bool) {
        debug_assert!(index < self.bit_length);
        let mask = 0x80 >> (index % 8);
        if value {
            self.data[index / 8] |= mask;
        } else {
            self.data[index / 8] &= !mask;
        }
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        // Trailing padding bits are kept clear by construction, but mask
        // them out anyway in case the peer set them.
        let mut count = 0;
        for index in 0..self.bit_length {
            if self.bit(index) {
                count += 1;
            }
        }
        count
    }

    pub fn content_size(&self) -> usize {
        1 + self.data.len()
    }
}

pub fn write_bit_string(out: &mut OctetWriter<'_>, tag: Tag, value: &BitString) -> WireResult<usize> {
    let content_length = value.content_size();
    let header = write_header(out, tag, content_length)?;

    ensure_octets!(out, content_length, NAME);
    let unused = value.octets().len() * 8 - value.bit_length();
    #[expect(clippy::cast_possible_truncation)] // unused is in 0..8
    out.put_u8(unused as u8);
    out.put_octets(value.octets());

    Ok(header + content_length)
}

pub fn parse_bit_string(content: &[u8]) -> WireResult<BitString> {
    let (&unused, data) = content
        .split_first()
        .ok_or_else(|| invalid_err(NAME, "bitString", "empty content"))?;

    if unused > 7 || (data.is_empty() && unused != 0) {
        return Err(invalid_err(NAME, "bitString", "invalid unused bit count"));
    }

    Ok(BitString::new(data.to_vec(), data.len() * 8 - usize::from(unused)))
}

// == OCTET STRING, VISIBLE STRING == //

pub fn write_octet_string(out: &mut OctetWriter<'_>, tag: Tag, value: &[u8]) -> WireResult<usize> {
    let header = write_header(out, tag, value.len())?;
    ensure_octets!(out, value.len(), NAME);
    out.put_octets(value);
    Ok(header + value.len())
}

pub fn write_visible_string(out: &mut OctetWriter<'_>, tag: Tag, value: &str) -> WireResult<usize> {
    write_octet_string(out, tag, value.as_bytes())
}

pub fn parse_visible_string(content: &[u8]) -> WireResult<String> {
    core::str::from_utf8(content)
        .map(str::to_owned)
        .map_err(|_| invalid_err(NAME, "visibleString", "invalid character data"))
}

// == FLOATING POINT (MMS convention) == //

/// Exponent width octet for IEEE 754 binary32.
pub const FLOAT32_EXPONENT_WIDTH: u8 = 8;
/// Exponent width octet for IEEE 754 binary64.
pub const FLOAT64_EXPONENT_WIDTH: u8 = 11;

pub const FLOAT32_CONTENT_SIZE: usize = 5;
pub const FLOAT64_CONTENT_SIZE: usize = 9;

pub fn write_float32(out: &mut OctetWriter<'_>, tag: Tag, value: f32) -> WireResult<usize> {
    let header = write_header(out, tag, FLOAT32_CONTENT_SIZE)?;
    ensure_octets!(out, FLOAT32_CONTENT_SIZE, NAME);
    out.put_u8(FLOAT32_EXPONENT_WIDTH);
    out.put_octets(&value.to_be_bytes());
    Ok(header + FLOAT32_CONTENT_SIZE)
}

pub fn write_float64(out: &mut OctetWriter<'_>, tag: Tag, value: f64) -> WireResult<usize> {
    let header = write_header(out, tag, FLOAT64_CONTENT_SIZE)?;
    ensure_octets!(out, FLOAT64_CONTENT_SIZE, NAME);
    out.put_u8(FLOAT64_EXPONENT_WIDTH);
    out.put_octets(&value.to_be_bytes());
    Ok(header + FLOAT64_CONTENT_SIZE)
}

/// A decoded MMS floating point value, width preserved.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Float {
    Single(f32),
    Double(f64),
}

pub fn parse_float(content: &[u8]) -> WireResult<Float> {
    match content {
        [FLOAT32_EXPONENT_WIDTH, octets @ ..] if octets.len() == 4 => {
            Ok(Float::Single(f32::from_be_bytes(octets.try_into().expect("4 octets"))))
        }
        [FLOAT64_EXPONENT_WIDTH, octets @ ..] if octets.len() == 8 => {
            Ok(Float::Double(f64::from_be_bytes(octets.try_into().expect("8 octets"))))
        }
        _ => Err(invalid_err(NAME, "floatingPoint", "unsupported exponent width")),
    }
}

#[cfg(test)]
mod tests {
    use ironmms_core::WireErrorKind;

    use super::*;

    fn encode_with<F>(len: usize, f: F) -> Vec<u8>
    where
        F: FnOnce(&mut OctetWriter<'_>) -> WireResult<usize>,
    {
        let mut buf = vec![0; len];
        let mut out = OctetWriter::new(&mut buf);
        let written = f(&mut out).unwrap();
        assert_eq!(written, out.position());
        buf.truncate(written);
        buf
    }

    #[test]
    fn write_integer_is_minimal() {
        assert_eq!(
            encode_with(8, |out| write_integer(out, Tag::universal(universal::INTEGER), 42)),
            [0x02, 0x01, 0x2A]
        );
        assert_eq!(
            encode_with(8, |out| write_integer(out, Tag::universal(universal::INTEGER), -1)),
            [0x02, 0x01, 0xFF]
        );
        assert_eq!(
            encode_with(8, |out| write_integer(out, Tag::universal(universal::INTEGER), 256)),
            [0x02, 0x02, 0x01, 0x00]
        );
        assert_eq!(
            encode_with(8, |out| write_integer(out, Tag::universal(universal::INTEGER), 0)),
            [0x02, 0x01, 0x00]
        );
    }

    #[test]
    fn parse_integer_sign_extends() {
        assert_eq!(parse_integer(&[0x2A]).unwrap(), 42);
        assert_eq!(parse_integer(&[0xFF]).unwrap(), -1);
        assert_eq!(parse_integer(&[0x01, 0x00]).unwrap(), 256);
        assert_eq!(parse_integer(&[0xFF, 0x00]).unwrap(), -256);
    }

    #[test]
    fn unsigned_needs_leading_zero_octet() {
        assert_eq!(
            encode_with(8, |out| write_unsigned(out, Tag::universal(universal::INTEGER), 255)),
            [0x02, 0x02, 0x00, 0xFF]
        );
        assert_eq!(parse_unsigned(&[0x00, 0xFF]).unwrap(), 255);
        assert_eq!(parse_unsigned(&[0x7F]).unwrap(), 127);
    }

    #[test]
    fn write_float32_uses_mms_exponent_width() {
        assert_eq!(
            encode_with(8, |out| write_float32(out, Tag::universal(universal::REAL), 50.0)),
            [0x09, 0x05, 0x08, 0x42, 0x48, 0x00, 0x00]
        );
    }

    #[test]
    fn parse_float_reads_both_widths() {
        assert_eq!(
            parse_float(&[0x08, 0x42, 0x48, 0x00, 0x00]).unwrap(),
            Float::Single(50.0)
        );
        assert_eq!(
            parse_float(&[0x0B, 0x40, 0x49, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]).unwrap(),
            Float::Double(50.0)
        );
    }

    #[test]
    fn bool_wire_form() {
        assert_eq!(
            encode_with(4, |out| write_bool(out, Tag::universal(universal::BOOLEAN), true)),
            [0x01, 0x01, 0xFF]
        );
        assert!(parse_bool(&[0x01]).unwrap()); // any non-zero is true
        assert!(!parse_bool(&[0x00]).unwrap());
    }

    #[test]
    fn bit_string_unused_bits() {
        let mut bits = BitString::zeroed(10);
        bits.set_bit(1, true);
        bits.set_bit(9, true);

        let buf = encode_with(8, |out| {
            write_bit_string(out, Tag::universal(universal::BIT_STRING), &bits)
        });
        assert_eq!(buf, [0x03, 0x03, 0x06, 0x40, 0x40]);

        let parsed = parse_bit_string(&buf[2..]).unwrap();
        assert_eq!(parsed, bits);
        assert_eq!(parsed.count_ones(), 2);
    }

    #[test]
    fn long_form_tag_round_trip() {
        let tag = Tag {
            class: TagClass::ContextSpecific,
            constructed: true,
            number: 40,
        };

        let buf = encode_with(8, |out| {
            let tag_len = write_tag(out, tag)?;
            let len_len = write_length(out, 0)?;
            Ok(tag_len + len_len)
        });
        assert_eq!(buf, [0xBF, 0x28, 0x00]);

        let mut src = OctetReader::new(&buf);
        assert_eq!(read_tag(&mut src).unwrap(), tag);
    }

    #[test]
    fn length_long_form() {
        assert_eq!(encode_with(4, |out| write_length(out, 0x100)), [0x82, 0x01, 0x00]);
        assert_eq!(encode_with(4, |out| write_length(out, 0xFA)), [0x81, 0xFA]);
        assert_eq!(encode_with(4, |out| write_length(out, 0x70)), [0x70]);

        let mut src = OctetReader::new(&[0x82, 0x01, 0x00]);
        assert_eq!(read_length(&mut src).unwrap(), Length::Definite(0x100));
    }

    #[test]
    fn read_tlv_consumes_exactly_one_value() {
        let buf = [0x02, 0x01, 0x2A, 0x01, 0x01, 0xFF];
        let mut src = OctetReader::new(&buf);

        let (tag, content) = read_tlv(&mut src).unwrap();
        assert_eq!(tag, Tag::universal(universal::INTEGER));
        assert_eq!(content, [0x2A]);
        assert_eq!(src.position(), 3);
    }

    #[test]
    fn read_tlv_resolves_indefinite_length() {
        // constructed context 0, indefinite, containing one INTEGER, then EOC
        let buf = [0xA0, 0x80, 0x02, 0x01, 0x2A, 0x00, 0x00];
        let mut src = OctetReader::new(&buf);

        let (tag, content) = read_tlv(&mut src).unwrap();
        assert_eq!(tag, Tag::context_constructed(0));
        assert_eq!(content, [0x02, 0x01, 0x2A]);
        assert!(src.is_empty());
    }

    #[test]
    fn read_tlv_resolves_nested_indefinite_length() {
        let buf = [0xA0, 0x80, 0xA1, 0x80, 0x02, 0x01, 0x2A, 0x00, 0x00, 0x00, 0x00];
        let mut src = OctetReader::new(&buf);

        let (tag, content) = read_tlv(&mut src).unwrap();
        assert_eq!(tag, Tag::context_constructed(0));
        assert_eq!(content, [0xA1, 0x80, 0x02, 0x01, 0x2A, 0x00, 0x00]);
        assert!(src.is_empty());
    }

    #[test]
    fn indefinite_length_on_primitive_is_rejected() {
        let buf = [0x02, 0x80, 0x00, 0x00];
        let mut src = OctetReader::new(&buf);

        assert!(matches!(
            read_tlv(&mut src).unwrap_err().kind(),
            WireErrorKind::Invalid { .. }
        ));
    }
}
