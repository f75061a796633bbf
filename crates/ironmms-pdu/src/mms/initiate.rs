use ironmms_core::{OctetReader, OctetWriter, WireResult};

use crate::ber::{self, BitString, Tag};

/// Proposed parameter CBB: str1, str2, vnam, valt, vadr, tpy, vlis.
const PARAMETER_CBB: [u8; 2] = [0xFB, 0x00];
const PARAMETER_CBB_BITS: usize = 11;

/// Standard client service mask (getNameList, read, write, identify,
/// informationReport and friends).
const SERVICES_SUPPORTED: [u8; 11] = [
    0xEE, 0x1C, 0x00, 0x00, 0x04, 0x08, 0x00, 0x00, 0x79, 0xEF, 0x18,
];
const SERVICES_SUPPORTED_BITS: usize = 85;

mod field_tag {
    pub const LOCAL_DETAIL: u32 = 0;
    pub const MAX_SERV_OUTSTANDING_CALLING: u32 = 1;
    pub const MAX_SERV_OUTSTANDING_CALLED: u32 = 2;
    pub const DATA_STRUCTURE_NESTING_LEVEL: u32 = 3;
    pub const INIT_DETAIL: u32 = 4;

    pub const VERSION_NUMBER: u32 = 0;
    pub const PARAMETER_CBB: u32 = 1;
    pub const SERVICES_SUPPORTED: u32 = 2;
}

/// initiate-RequestPDU.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitiateRequest {
    /// Maximum MMS message size this client accepts.
    pub local_detail_calling: i64,
    pub max_serv_outstanding_calling: i64,
    pub max_serv_outstanding_called: i64,
    pub data_structure_nesting_level: i64,
    pub version_number: i64,
    pub parameter_cbb: BitString,
    pub services_supported: BitString,
}

impl Default for InitiateRequest {
    fn default() -> Self {
        Self {
            local_detail_calling: 65000,
            max_serv_outstanding_calling: 10,
            max_serv_outstanding_called: 10,
            data_structure_nesting_level: 5,
            version_number: 1,
            parameter_cbb: BitString::new(PARAMETER_CBB.to_vec(), PARAMETER_CBB_BITS),
            services_supported: BitString::new(SERVICES_SUPPORTED.to_vec(), SERVICES_SUPPORTED_BITS),
        }
    }
}

impl InitiateRequest {
    pub const NAME: &'static str = "InitiateRequest";

    fn detail_size(&self) -> usize {
        ber::sizeof_tlv(field_tag::VERSION_NUMBER, ber::sizeof_integer_content(self.version_number))
            + ber::sizeof_tlv(field_tag::PARAMETER_CBB, self.parameter_cbb.content_size())
            + ber::sizeof_tlv(field_tag::SERVICES_SUPPORTED, self.services_supported.content_size())
    }

    pub(crate) fn content_size(&self) -> usize {
        ber::sizeof_tlv(field_tag::LOCAL_DETAIL, ber::sizeof_integer_content(self.local_detail_calling))
            + ber::sizeof_tlv(
                field_tag::MAX_SERV_OUTSTANDING_CALLING,
                ber::sizeof_integer_content(self.max_serv_outstanding_calling),
            )
            + ber::sizeof_tlv(
                field_tag::MAX_SERV_OUTSTANDING_CALLED,
                ber::sizeof_integer_content(self.max_serv_outstanding_called),
            )
            + ber::sizeof_tlv(
                field_tag::DATA_STRUCTURE_NESTING_LEVEL,
                ber::sizeof_integer_content(self.data_structure_nesting_level),
            )
            + ber::sizeof_tlv(field_tag::INIT_DETAIL, self.detail_size())
    }

    pub(crate) fn write_content(&self, dst: &mut OctetWriter<'_>) -> WireResult<()> {
        ber::write_integer(dst, Tag::context(field_tag::LOCAL_DETAIL), self.local_detail_calling)?;
        ber::write_integer(
            dst,
            Tag::context(field_tag::MAX_SERV_OUTSTANDING_CALLING),
            self.max_serv_outstanding_calling,
        )?;
        ber::write_integer(
            dst,
            Tag::context(field_tag::MAX_SERV_OUTSTANDING_CALLED),
            self.max_serv_outstanding_called,
        )?;
        ber::write_integer(
            dst,
            Tag::context(field_tag::DATA_STRUCTURE_NESTING_LEVEL),
            self.data_structure_nesting_level,
        )?;

        ber::write_header(dst, Tag::context_constructed(field_tag::INIT_DETAIL), self.detail_size())?;
        ber::write_integer(dst, Tag::context(field_tag::VERSION_NUMBER), self.version_number)?;
        ber::write_bit_string(dst, Tag::context(field_tag::PARAMETER_CBB), &self.parameter_cbb)?;
        ber::write_bit_string(dst, Tag::context(field_tag::SERVICES_SUPPORTED), &self.services_supported)?;

        Ok(())
    }

    pub(crate) fn from_content(content: &[u8]) -> WireResult<Self> {
        let mut request = Self::default();
        read_initiate_fields(
            content,
            &mut request.local_detail_calling,
            &mut request.max_serv_outstanding_calling,
            &mut request.max_serv_outstanding_called,
            &mut request.data_structure_nesting_level,
            &mut request.version_number,
            &mut request.parameter_cbb,
            &mut request.services_supported,
        )?;
        Ok(request)
    }
}

/// initiate-ResponsePDU with the negotiated session parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitiateResponse {
    pub local_detail_called: i64,
    pub max_serv_outstanding_calling: i64,
    pub max_serv_outstanding_called: i64,
    pub data_structure_nesting_level: i64,
    pub version_number: i64,
    pub parameter_cbb: BitString,
    pub services_supported: BitString,
}

impl Default for InitiateResponse {
    fn default() -> Self {
        Self {
            local_detail_called: 65000,
            max_serv_outstanding_calling: 10,
            max_serv_outstanding_called: 10,
            data_structure_nesting_level: 5,
            version_number: 1,
            parameter_cbb: BitString::new(PARAMETER_CBB.to_vec(), PARAMETER_CBB_BITS),
            services_supported: BitString::new(SERVICES_SUPPORTED.to_vec(), SERVICES_SUPPORTED_BITS),
        }
    }
}

impl InitiateResponse {
    pub const NAME: &'static str = "InitiateResponse";

    fn detail_size(&self) -> usize {
        ber::sizeof_tlv(field_tag::VERSION_NUMBER, ber::sizeof_integer_content(self.version_number))
            + ber::sizeof_tlv(field_tag::PARAMETER_CBB, self.parameter_cbb.content_size())
            + ber::sizeof_tlv(field_tag::SERVICES_SUPPORTED, self.services_supported.content_size())
    }

    pub(crate) fn content_size(&self) -> usize {
        ber::sizeof_tlv(field_tag::LOCAL_DETAIL, ber::sizeof_integer_content(self.local_detail_called))
            + ber::sizeof_tlv(
                field_tag::MAX_SERV_OUTSTANDING_CALLING,
                ber::sizeof_integer_content(self.max_serv_outstanding_calling),
            )
            + ber::sizeof_tlv(
                field_tag::MAX_SERV_OUTSTANDING_CALLED,
                ber::sizeof_integer_content(self.max_serv_outstanding_called),
            )
            + ber::sizeof_tlv(
                field_tag::DATA_STRUCTURE_NESTING_LEVEL,
                ber::sizeof_integer_content(self.data_structure_nesting_level),
            )
            + ber::sizeof_tlv(field_tag::INIT_DETAIL, self.detail_size())
    }

    pub(crate) fn write_content(&self, dst: &mut OctetWriter<'_>) -> WireResult<()> {
        ber::write_integer(dst, Tag::context(field_tag::LOCAL_DETAIL), self.local_detail_called)?;
        ber::write_integer(
            dst,
            Tag::context(field_tag::MAX_SERV_OUTSTANDING_CALLING),
            self.max_serv_outstanding_calling,
        )?;
        ber::write_integer(
            dst,
            Tag::context(field_tag::MAX_SERV_OUTSTANDING_CALLED),
            self.max_serv_outstanding_called,
        )?;
        ber::write_integer(
            dst,
            Tag::context(field_tag::DATA_STRUCTURE_NESTING_LEVEL),
            self.data_structure_nesting_level,
        )?;

        ber::write_header(dst, Tag::context_constructed(field_tag::INIT_DETAIL), self.detail_size())?;
        ber::write_integer(dst, Tag::context(field_tag::VERSION_NUMBER), self.version_number)?;
        ber::write_bit_string(dst, Tag::context(field_tag::PARAMETER_CBB), &self.parameter_cbb)?;
        ber::write_bit_string(dst, Tag::context(field_tag::SERVICES_SUPPORTED), &self.services_supported)?;

        Ok(())
    }

    pub(crate) fn from_content(content: &[u8]) -> WireResult<Self> {
        let mut response = Self::default();
        read_initiate_fields(
            content,
            &mut response.local_detail_called,
            &mut response.max_serv_outstanding_calling,
            &mut response.max_serv_outstanding_called,
            &mut response.data_structure_nesting_level,
            &mut response.version_number,
            &mut response.parameter_cbb,
            &mut response.services_supported,
        )?;
        Ok(response)
    }
}

#[expect(clippy::too_many_arguments)] // request and response share the exact field layout
fn read_initiate_fields(
    content: &[u8],
    local_detail: &mut i64,
    calling: &mut i64,
    called: &mut i64,
    nesting: &mut i64,
    version: &mut i64,
    cbb: &mut BitString,
    services: &mut BitString,
) -> WireResult<()> {
    let mut src = OctetReader::new(content);

    while !src.is_empty() {
        let (tag, tag_content) = ber::read_tlv(&mut src)?;

        match tag.number {
            field_tag::LOCAL_DETAIL => *local_detail = ber::parse_integer(tag_content)?,
            field_tag::MAX_SERV_OUTSTANDING_CALLING => *calling = ber::parse_integer(tag_content)?,
            field_tag::MAX_SERV_OUTSTANDING_CALLED => *called = ber::parse_integer(tag_content)?,
            field_tag::DATA_STRUCTURE_NESTING_LEVEL => *nesting = ber::parse_integer(tag_content)?,
            field_tag::INIT_DETAIL if tag.constructed => {
                let mut detail = OctetReader::new(tag_content);

                while !detail.is_empty() {
                    let (detail_tag, detail_content) = ber::read_tlv(&mut detail)?;

                    match detail_tag.number {
                        field_tag::VERSION_NUMBER => *version = ber::parse_integer(detail_content)?,
                        field_tag::PARAMETER_CBB => *cbb = ber::parse_bit_string(detail_content)?,
                        field_tag::SERVICES_SUPPORTED => *services = ber::parse_bit_string(detail_content)?,
                        _ => {}
                    }
                }
            }
            // Unknown members are tolerated; only the negotiated basics matter.
            _ => {}
        }
    }

    Ok(())
}
