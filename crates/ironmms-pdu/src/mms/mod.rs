//! ISO 9506 MMS PDUs, reduced to the subset a reporting client exchanges:
//! initiate, confirmed read/write/identify, and the unconfirmed
//! information report.

mod data;
mod initiate;
mod name;
mod report;
mod service;

pub use self::data::*;
pub use self::initiate::*;
pub use self::name::*;
pub use self::report::*;
pub use self::service::*;

use ironmms_core::{
    ensure_octets, invalid_err, unknown_tag_err, OctetReader, OctetWriter, WireDecode, WireEncode, WireResult,
};

use crate::ber::{self, Tag};

/// MMSpdu CHOICE tag numbers.
///
/// Encoded context-specific; on decode the application class is accepted
/// for the same numbers since both appear in the wild.
mod pdu_tag {
    pub const CONFIRMED_REQUEST: u32 = 0;
    pub const CONFIRMED_RESPONSE: u32 = 1;
    pub const CONFIRMED_ERROR: u32 = 2;
    pub const UNCONFIRMED: u32 = 3;
    pub const INITIATE_REQUEST: u32 = 8;
    pub const INITIATE_RESPONSE: u32 = 9;
}

/// Unconfirmed-service CHOICE tag: informationReport.
const INFORMATION_REPORT_TAG: u32 = 0;

/// A decoded or to-be-encoded MMS PDU.
#[derive(Clone, Debug, PartialEq)]
pub enum MmsPdu {
    ConfirmedRequest(ConfirmedRequest),
    ConfirmedResponse(ConfirmedResponse),
    ConfirmedError(ConfirmedError),
    InformationReport(InformationReport),
    InitiateRequest(InitiateRequest),
    InitiateResponse(InitiateResponse),
}

impl MmsPdu {
    pub const NAME: &'static str = "MmsPdu";

    fn tag_number(&self) -> u32 {
        match self {
            Self::ConfirmedRequest(_) => pdu_tag::CONFIRMED_REQUEST,
            Self::ConfirmedResponse(_) => pdu_tag::CONFIRMED_RESPONSE,
            Self::ConfirmedError(_) => pdu_tag::CONFIRMED_ERROR,
            Self::InformationReport(_) => pdu_tag::UNCONFIRMED,
            Self::InitiateRequest(_) => pdu_tag::INITIATE_REQUEST,
            Self::InitiateResponse(_) => pdu_tag::INITIATE_RESPONSE,
        }
    }

    fn content_size(&self) -> usize {
        match self {
            Self::ConfirmedRequest(pdu) => pdu.content_size(),
            Self::ConfirmedResponse(pdu) => pdu.content_size(),
            Self::ConfirmedError(pdu) => pdu.content_size(),
            Self::InformationReport(pdu) => ber::sizeof_tlv(INFORMATION_REPORT_TAG, pdu.content_size()),
            Self::InitiateRequest(pdu) => pdu.content_size(),
            Self::InitiateResponse(pdu) => pdu.content_size(),
        }
    }
}

impl WireEncode for MmsPdu {
    fn encoded_len(&self) -> usize {
        ber::sizeof_tlv(self.tag_number(), self.content_size())
    }

    fn encode_into(&self, out: &mut OctetWriter<'_>) -> WireResult<()> {
        ensure_octets!(out, self.encoded_len(), Self::NAME);

        let content_size = self.content_size();
        ber::write_header(out, Tag::context_constructed(self.tag_number()), content_size)?;

        match self {
            Self::ConfirmedRequest(pdu) => pdu.write_content(out)?,
            Self::ConfirmedResponse(pdu) => pdu.write_content(out)?,
            Self::ConfirmedError(pdu) => pdu.write_content(out)?,
            Self::InformationReport(pdu) => {
                ber::write_header(out, Tag::context_constructed(INFORMATION_REPORT_TAG), pdu.content_size())?;
                pdu.write_content(out)?;
            }
            Self::InitiateRequest(pdu) => pdu.write_content(out)?,
            Self::InitiateResponse(pdu) => pdu.write_content(out)?,
        }

        Ok(())
    }
}

impl WireDecode for MmsPdu {
    fn decode_from(src: &mut OctetReader<'_>) -> WireResult<Self> {
        let (tag, content) = ber::read_tlv(src)?;

        // Both context-specific and application class tags are seen in the
        // wild for the MMSpdu CHOICE; dispatch on the number alone.
        if !tag.constructed || !tag.is_choice(tag.number) {
            return Err(invalid_err(Self::NAME, "tag", "unexpected tag class for CHOICE"));
        }

        match tag.number {
            pdu_tag::CONFIRMED_REQUEST => ConfirmedRequest::from_content(content).map(Self::ConfirmedRequest),
            pdu_tag::CONFIRMED_RESPONSE => ConfirmedResponse::from_content(content).map(Self::ConfirmedResponse),
            pdu_tag::CONFIRMED_ERROR => ConfirmedError::from_content(content).map(Self::ConfirmedError),
            pdu_tag::UNCONFIRMED => {
                let mut inner = OctetReader::new(content);
                let (service_tag, service_content) = ber::read_tlv(&mut inner)?;

                if !service_tag.is_choice(INFORMATION_REPORT_TAG) {
                    return Err(invalid_err(
                        Self::NAME,
                        "unconfirmedService",
                        "unknown unconfirmed service",
                    ));
                }

                InformationReport::from_content(service_content).map(Self::InformationReport)
            }
            pdu_tag::INITIATE_REQUEST => InitiateRequest::from_content(content).map(Self::InitiateRequest),
            pdu_tag::INITIATE_RESPONSE => InitiateResponse::from_content(content).map(Self::InitiateResponse),
            number => Err(unknown_tag_err(Self::NAME, u8::try_from(number).unwrap_or(u8::MAX))),
        }
    }
}
