//! ISO 8073 (X.224) class-0 COTP TPDUs.
//!
//! MMS uses the "simple class" only: a connection request/confirm
//! exchange followed by data TPDUs. Class 0 has no flow control and no
//! checksums; the only subtlety is segmentation, where user data is
//! split across several DT TPDUs and the end-of-transmission bit marks
//! the last one.

use core::mem;

use ironmms_core::{
    ensure_octets, invalid_err, unknown_tag_err, OctetReader, OctetWriter, WireDecode, WireEncode, WireResult,
};

use crate::tpkt;

/// TPDU type code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TpduCode(u8);

impl TpduCode {
    pub const CONNECTION_REQUEST: Self = Self(0xE0);
    pub const CONNECTION_CONFIRM: Self = Self(0xD0);
    pub const DISCONNECT_REQUEST: Self = Self(0x80);
    pub const DATA: Self = Self(0xF0);
    pub const ERROR: Self = Self(0x70);
}

impl TpduCode {
    pub fn header_fixed_part_size(self) -> usize {
        if self == TpduCode::DATA {
            TpduHeader::DATA_FIXED_PART_SIZE
        } else {
            TpduHeader::NOT_DATA_FIXED_PART_SIZE
        }
    }

    pub fn check_expected(self, expected: TpduCode) -> WireResult<()> {
        if self == expected {
            Ok(())
        } else {
            Err(unknown_tag_err(TpduHeader::NAME, self.0))
        }
    }
}

impl From<u8> for TpduCode {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<TpduCode> for u8 {
    fn from(value: TpduCode) -> Self {
        value.0
    }
}

/// TPDU header, right after the TPKT header.
///
/// The length indicator covers the header octets after itself, variable
/// part included, user data excluded. For a DT TPDU the fixed part is
/// `code, EOT`; for the other codes it is `code, DST-REF, SRC-REF,
/// trailer` where the trailer octet is the class option (CR/CC) or the
/// disconnect reason (DR).
#[derive(Debug, PartialEq, Eq)]
pub struct TpduHeader {
    pub li: u8,
    pub code: TpduCode,
    /// End-of-transmission flag; meaningful for DT only.
    pub eot: bool,
    pub dst_ref: u16,
    pub src_ref: u16,
    /// Class option (CR/CC) or disconnect reason (DR).
    pub trailer: u8,
}

impl TpduHeader {
    pub const DATA_FIXED_PART_SIZE: usize = 3;

    pub const NOT_DATA_FIXED_PART_SIZE: usize = 7;

    pub const NAME: &'static str = "TpduHeader";

    const EOT_BIT: u8 = 0x80;

    pub fn data(eot: bool) -> Self {
        Self {
            li: 2, // code + EOT
            code: TpduCode::DATA,
            eot,
            dst_ref: 0,
            src_ref: 0,
            trailer: 0,
        }
    }

    pub fn control(code: TpduCode, variable_part_size: usize, dst_ref: u16, src_ref: u16, trailer: u8) -> Self {
        Self {
            li: u8::try_from(Self::NOT_DATA_FIXED_PART_SIZE + variable_part_size - 1).expect("checked by caller"),
            code,
            eot: false,
            dst_ref,
            src_ref,
            trailer,
        }
    }

    /// Reads the fixed part; `frame_len` is the total TPKT frame length
    /// used to cross-check the length indicator.
    pub fn read(src: &mut OctetReader<'_>, frame_len: usize) -> WireResult<Self> {
        ensure_octets!(src, Self::DATA_FIXED_PART_SIZE, Self::NAME);

        let li = src.take_u8();
        let code = TpduCode::from(src.take_u8());

        if usize::from(li) + 1 + tpkt::HEADER_LEN > frame_len {
            return Err(invalid_err(Self::NAME, "li", "tpdu length greater than frame length"));
        }

        // The value 255 (1111 1111) is reserved for possible extensions.
        if li == 0b1111_1111 {
            return Err(invalid_err(Self::NAME, "li", "reserved LI value 255"));
        }

        if code == TpduCode::DATA {
            let nr_eot = src.take_u8();

            Ok(Self {
                li,
                code,
                eot: nr_eot & Self::EOT_BIT != 0,
                dst_ref: 0,
                src_ref: 0,
                trailer: 0,
            })
        } else {
            ensure_octets!(src, 5, Self::NAME);

            let dst_ref = src.take_u16();
            let src_ref = src.take_u16();
            let trailer = src.take_u8();

            Ok(Self {
                li,
                code,
                eot: false,
                dst_ref,
                src_ref,
                trailer,
            })
        }
    }

    pub fn write(&self, out: &mut OctetWriter<'_>) -> WireResult<()> {
        ensure_octets!(out, self.fixed_part_size(), Self::NAME);

        out.put_u8(self.li);
        out.put_u8(u8::from(self.code));

        if self.code == TpduCode::DATA {
            // Class 0 carries no TPDU-NR, only the EOT bit.
            out.put_u8(if self.eot { Self::EOT_BIT } else { 0 });
        } else {
            out.put_u16(self.dst_ref);
            out.put_u16(self.src_ref);
            out.put_u8(self.trailer);
        }

        Ok(())
    }

    /// Fixed part of the TPDU header.
    pub fn fixed_part_size(&self) -> usize {
        self.code.header_fixed_part_size()
    }

    /// Variable part of the TPDU header.
    pub fn variable_part_size(&self) -> usize {
        self.size() - self.fixed_part_size()
    }

    /// Size of the whole TPDU header, including LI field and variable part.
    pub fn size(&self) -> usize {
        usize::from(self.li) + 1
    }
}

/// One COTP TPDU inside its TPKT frame.
pub trait CotpPdu: Sized {
    const COTP_NAME: &'static str;

    const TPDU_CODE: TpduCode;

    fn body_encode(&self, out: &mut OctetWriter<'_>) -> WireResult<()>;

    fn body_decode(src: &mut OctetReader<'_>, frame_len: usize, tpdu: &TpduHeader) -> WireResult<Self>;

    fn header(&self) -> TpduHeader;

    fn tpdu_header_variable_part_size(&self) -> usize;

    fn tpdu_user_data_size(&self) -> usize;
}

/// TPKT framing wrapper: `Cotp(tpdu)` encodes and decodes the full
/// on-wire frame around the inner TPDU.
pub struct Cotp<T>(pub T);

impl<T> WireEncode for Cotp<T>
where
    T: CotpPdu,
{
    fn encoded_len(&self) -> usize {
        tpkt::HEADER_LEN
            + T::TPDU_CODE.header_fixed_part_size()
            + self.0.tpdu_header_variable_part_size()
            + self.0.tpdu_user_data_size()
    }

    fn encode_into(&self, out: &mut OctetWriter<'_>) -> WireResult<()> {
        let frame_len = self.encoded_len();

        ensure_octets!(out, frame_len, T::COTP_NAME);

        tpkt::write_header(out, frame_len)?;
        self.0.header().write(out)?;
        self.0.body_encode(out)
    }
}

impl<T> WireDecode for Cotp<T>
where
    T: CotpPdu,
{
    fn decode_from(src: &mut OctetReader<'_>) -> WireResult<Self> {
        let frame_len = tpkt::read_header(src)?;

        ensure_octets!(src, frame_len.saturating_sub(tpkt::HEADER_LEN), T::COTP_NAME);

        let tpdu = TpduHeader::read(src, frame_len)?;
        tpdu.code.check_expected(T::TPDU_CODE)?;

        if tpdu.size() < tpdu.fixed_part_size() {
            return Err(invalid_err(
                TpduHeader::NAME,
                "li",
                "fixed part bigger than total header size",
            ));
        }

        T::body_decode(src, frame_len, &tpdu).map(Cotp)
    }
}

/// COTP parameter codes carried in the variable part of CR/CC TPDUs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct ParameterCode(u8);

impl ParameterCode {
    const TPDU_SIZE: Self = Self(0xC0);
    const SRC_TSAP: Self = Self(0xC1);
    const DST_TSAP: Self = Self(0xC2);
}

/// Variable part of a CR or CC TPDU.
///
/// TSAP selectors default to `[0x00, 0x01]` on both sides, which is what
/// ISO-TSAP MMS servers expect unless configured otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CotpParameters {
    /// Maximum TPDU size as a power of two exponent (0x0B = 2048 octets).
    pub tpdu_size_exp: u8,
    pub src_tsap: Vec<u8>,
    pub dst_tsap: Vec<u8>,
}

impl CotpParameters {
    pub const NAME: &'static str = "CotpParameters";

    pub const DEFAULT_TPDU_SIZE_EXP: u8 = 0x0B; // 2048

    pub const DEFAULT_TSAP: [u8; 2] = [0x00, 0x01];

    pub fn max_tpdu_size(&self) -> usize {
        1 << self.tpdu_size_exp
    }

    fn write(&self, out: &mut OctetWriter<'_>) -> WireResult<()> {
        ensure_octets!(out, self.size(), Self::NAME);

        let src_tsap_len = u8::try_from(self.src_tsap.len())
            .map_err(|_| invalid_err(Self::NAME, "srcTsap", "selector too long"))?;
        let dst_tsap_len = u8::try_from(self.dst_tsap.len())
            .map_err(|_| invalid_err(Self::NAME, "dstTsap", "selector too long"))?;

        out.put_u8(ParameterCode::TPDU_SIZE.0);
        out.put_u8(1);
        out.put_u8(self.tpdu_size_exp);

        out.put_u8(ParameterCode::SRC_TSAP.0);
        out.put_u8(src_tsap_len);
        out.put_octets(&self.src_tsap);

        out.put_u8(ParameterCode::DST_TSAP.0);
        out.put_u8(dst_tsap_len);
        out.put_octets(&self.dst_tsap);

        Ok(())
    }

    fn read(src: &mut OctetReader<'_>, variable_part_size: usize) -> WireResult<Self> {
        ensure_octets!(src, variable_part_size, Self::NAME);

        let mut params = Self::default();
        let end = src.position() + variable_part_size;

        while src.position() + 2 <= end {
            let code = ParameterCode(src.take_u8());
            let len = usize::from(src.take_u8());

            if src.position() + len > end {
                return Err(invalid_err(Self::NAME, "parameter", "length exceeds variable part"));
            }

            let value = src.take_octets(len);

            match code {
                ParameterCode::TPDU_SIZE => {
                    let exp = *value
                        .first()
                        .ok_or_else(|| invalid_err(Self::NAME, "tpduSize", "empty parameter"))?;
                    if !(7..=13).contains(&exp) {
                        return Err(invalid_err(Self::NAME, "tpduSize", "exponent out of class 0 range"));
                    }
                    params.tpdu_size_exp = exp;
                }
                ParameterCode::SRC_TSAP => params.src_tsap = value.to_vec(),
                ParameterCode::DST_TSAP => params.dst_tsap = value.to_vec(),
                // Unknown parameters (e.g. checksum proposals) are skipped.
                _ => {}
            }
        }

        Ok(params)
    }

    fn size(&self) -> usize {
        3 + 2 + self.src_tsap.len() + 2 + self.dst_tsap.len()
    }
}

impl Default for CotpParameters {
    fn default() -> Self {
        Self {
            tpdu_size_exp: Self::DEFAULT_TPDU_SIZE_EXP,
            src_tsap: Self::DEFAULT_TSAP.to_vec(),
            dst_tsap: Self::DEFAULT_TSAP.to_vec(),
        }
    }
}

/// CR TPDU: opens the transport connection.
///
/// The destination reference is always zero (the peer has not allocated
/// one yet) and the source reference identifies this end for the lifetime
/// of the connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub src_ref: u16,
    pub parameters: CotpParameters,
}

impl CotpPdu for ConnectionRequest {
    const COTP_NAME: &'static str = "COTP Connection Request";

    const TPDU_CODE: TpduCode = TpduCode::CONNECTION_REQUEST;

    fn body_encode(&self, out: &mut OctetWriter<'_>) -> WireResult<()> {
        self.parameters.write(out)
    }

    fn body_decode(src: &mut OctetReader<'_>, _: usize, tpdu: &TpduHeader) -> WireResult<Self> {
        let parameters = CotpParameters::read(src, tpdu.variable_part_size())?;

        Ok(Self {
            src_ref: tpdu.src_ref,
            parameters,
        })
    }

    fn header(&self) -> TpduHeader {
        TpduHeader::control(
            Self::TPDU_CODE,
            self.parameters.size(),
            0, // DST-REF: not yet assigned
            self.src_ref,
            0, // class 0, no options
        )
    }

    fn tpdu_header_variable_part_size(&self) -> usize {
        self.parameters.size()
    }

    fn tpdu_user_data_size(&self) -> usize {
        0
    }
}

/// CC TPDU: the peer accepted the connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfirm {
    /// Our reference, echoed back by the peer.
    pub dst_ref: u16,
    /// The peer's reference; used as DST-REF in everything we send next.
    pub src_ref: u16,
    pub parameters: CotpParameters,
}

impl CotpPdu for ConnectionConfirm {
    const COTP_NAME: &'static str = "COTP Connection Confirm";

    const TPDU_CODE: TpduCode = TpduCode::CONNECTION_CONFIRM;

    fn body_encode(&self, out: &mut OctetWriter<'_>) -> WireResult<()> {
        self.parameters.write(out)
    }

    fn body_decode(src: &mut OctetReader<'_>, _: usize, tpdu: &TpduHeader) -> WireResult<Self> {
        let parameters = CotpParameters::read(src, tpdu.variable_part_size())?;

        Ok(Self {
            dst_ref: tpdu.dst_ref,
            src_ref: tpdu.src_ref,
            parameters,
        })
    }

    fn header(&self) -> TpduHeader {
        TpduHeader::control(Self::TPDU_CODE, self.parameters.size(), self.dst_ref, self.src_ref, 0)
    }

    fn tpdu_header_variable_part_size(&self) -> usize {
        self.parameters.size()
    }

    fn tpdu_user_data_size(&self) -> usize {
        0
    }
}

/// DR TPDU: the peer is tearing the connection down.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisconnectRequest {
    pub dst_ref: u16,
    pub src_ref: u16,
    pub reason: u8,
}

impl CotpPdu for DisconnectRequest {
    const COTP_NAME: &'static str = "COTP Disconnect Request";

    const TPDU_CODE: TpduCode = TpduCode::DISCONNECT_REQUEST;

    fn body_encode(&self, _: &mut OctetWriter<'_>) -> WireResult<()> {
        Ok(())
    }

    fn body_decode(_: &mut OctetReader<'_>, _: usize, tpdu: &TpduHeader) -> WireResult<Self> {
        Ok(Self {
            dst_ref: tpdu.dst_ref,
            src_ref: tpdu.src_ref,
            reason: tpdu.trailer,
        })
    }

    fn header(&self) -> TpduHeader {
        TpduHeader::control(Self::TPDU_CODE, 0, self.dst_ref, self.src_ref, self.reason)
    }

    fn tpdu_header_variable_part_size(&self) -> usize {
        0
    }

    fn tpdu_user_data_size(&self) -> usize {
        0
    }
}

/// DT TPDU: one fragment of transport user data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataTransfer {
    pub eot: bool,
    pub user_data: Vec<u8>,
}

impl DataTransfer {
    /// Header overhead of a DT TPDU (LI, code, EOT octet).
    pub const HEADER_SIZE: usize = TpduHeader::DATA_FIXED_PART_SIZE;

    /// Maximum user data per DT TPDU for a negotiated TPDU size.
    pub fn max_user_data(max_tpdu_size: usize) -> usize {
        max_tpdu_size - Self::HEADER_SIZE
    }
}

impl CotpPdu for DataTransfer {
    const COTP_NAME: &'static str = "COTP Data";

    const TPDU_CODE: TpduCode = TpduCode::DATA;

    fn body_encode(&self, out: &mut OctetWriter<'_>) -> WireResult<()> {
        ensure_octets!(out, self.user_data.len(), Self::COTP_NAME);
        out.put_octets(&self.user_data);

        Ok(())
    }

    fn body_decode(src: &mut OctetReader<'_>, frame_len: usize, tpdu: &TpduHeader) -> WireResult<Self> {
        let user_data_len = user_data_len(frame_len, tpdu);

        ensure_octets!(src, user_data_len, Self::COTP_NAME);
        let user_data = src.take_octets(user_data_len).to_vec();

        Ok(Self {
            eot: tpdu.eot,
            user_data,
        })
    }

    fn header(&self) -> TpduHeader {
        TpduHeader::data(self.eot)
    }

    fn tpdu_header_variable_part_size(&self) -> usize {
        0
    }

    fn tpdu_user_data_size(&self) -> usize {
        self.user_data.len()
    }
}

/// Splits transport user data into DT TPDUs honoring the negotiated TPDU
/// size, EOT set on the last fragment only.
pub fn segment_user_data(user_data: &[u8], max_tpdu_size: usize) -> Vec<DataTransfer> {
    let chunk_size = DataTransfer::max_user_data(max_tpdu_size);

    if user_data.is_empty() {
        return vec![DataTransfer {
            eot: true,
            user_data: Vec::new(),
        }];
    }

    let mut fragments: Vec<DataTransfer> = user_data
        .chunks(chunk_size)
        .map(|chunk| DataTransfer {
            eot: false,
            user_data: chunk.to_vec(),
        })
        .collect();

    if let Some(last) = fragments.last_mut() {
        last.eot = true;
    }

    fragments
}

/// Any TPDU the peer may send after connection establishment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tpdu {
    ConnectionConfirm(ConnectionConfirm),
    Data(DataTransfer),
    DisconnectRequest(DisconnectRequest),
}

impl Tpdu {
    pub const NAME: &'static str = "Tpdu";

    pub fn code(&self) -> TpduCode {
        match self {
            Self::ConnectionConfirm(_) => TpduCode::CONNECTION_CONFIRM,
            Self::Data(_) => TpduCode::DATA,
            Self::DisconnectRequest(_) => TpduCode::DISCONNECT_REQUEST,
        }
    }
}

impl WireDecode for Tpdu {
    fn decode_from(src: &mut OctetReader<'_>) -> WireResult<Self> {
        let frame_len = tpkt::read_header(src)?;

        ensure_octets!(src, frame_len.saturating_sub(tpkt::HEADER_LEN), Self::NAME);

        let tpdu = TpduHeader::read(src, frame_len)?;

        match tpdu.code {
            TpduCode::DATA => DataTransfer::body_decode(src, frame_len, &tpdu).map(Self::Data),
            TpduCode::CONNECTION_CONFIRM => {
                ConnectionConfirm::body_decode(src, frame_len, &tpdu).map(Self::ConnectionConfirm)
            }
            TpduCode::DISCONNECT_REQUEST => {
                DisconnectRequest::body_decode(src, frame_len, &tpdu).map(Self::DisconnectRequest)
            }
            code => Err(unknown_tag_err(Self::NAME, u8::from(code))),
        }
    }
}

/// Accumulates DT TPDU user data until a fragment with EOT set completes
/// the transport service data unit.
#[derive(Debug, Default)]
pub struct Reassembler {
    buf: Vec<u8>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one DT TPDU; returns the full user data once EOT is seen.
    pub fn feed(&mut self, dt: DataTransfer) -> Option<Vec<u8>> {
        self.buf.extend_from_slice(&dt.user_data);

        if dt.eot {
            Some(mem::take(&mut self.buf))
        } else {
            None
        }
    }

    /// True when no partial TSDU is pending.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

fn user_data_len(frame_len: usize, tpdu: &TpduHeader) -> usize {
    frame_len - tpkt::HEADER_LEN - tpdu.size()
}

#[cfg(test)]
mod tests {
    use ironmms_core::{from_octets, to_octets};

    use super::*;

    #[test]
    fn connection_request_round_trip() {
        let cr = ConnectionRequest {
            src_ref: 0x0002,
            parameters: CotpParameters::default(),
        };

        let buf = to_octets(&Cotp(cr.clone())).unwrap();

        // TPKT(4) + fixed(7) + params(3 + 4 + 4)
        assert_eq!(buf.len(), 22);
        assert_eq!(&buf[..4], [0x03, 0x00, 0x00, 0x16]);
        assert_eq!(buf[4], 17); // LI
        assert_eq!(buf[5], 0xE0);

        let decoded: Cotp<ConnectionRequest> = from_octets(&buf).unwrap();
        assert_eq!(decoded.0, cr);
    }

    #[test]
    fn data_transfer_eot_bit() {
        let dt = DataTransfer {
            eot: true,
            user_data: vec![0xAA, 0xBB],
        };

        let buf = to_octets(&Cotp(dt)).unwrap();
        assert_eq!(buf, [0x03, 0x00, 0x00, 0x09, 0x02, 0xF0, 0x80, 0xAA, 0xBB]);
    }

    #[test]
    fn segmentation_marks_last_fragment_only() {
        let data = vec![0u8; 5000];
        let fragments = segment_user_data(&data, 2048);

        assert_eq!(fragments.len(), 3);
        assert!(!fragments[0].eot);
        assert!(!fragments[1].eot);
        assert!(fragments[2].eot);
        assert_eq!(fragments[0].user_data.len(), 2045);
        assert_eq!(
            fragments.iter().map(|f| f.user_data.len()).sum::<usize>(),
            data.len()
        );
    }

    #[test]
    fn reassembler_concatenates_until_eot() {
        let mut reassembler = Reassembler::new();

        assert_eq!(
            reassembler.feed(DataTransfer {
                eot: false,
                user_data: vec![1, 2],
            }),
            None
        );
        assert_eq!(
            reassembler.feed(DataTransfer {
                eot: true,
                user_data: vec![3],
            }),
            Some(vec![1, 2, 3])
        );
        assert!(reassembler.is_empty());
    }
}
