use core::fmt;

use ironmms_core::{invalid_err, OctetReader, OctetWriter, WireResult};
use tap::prelude::*;

use crate::ber::{self, universal, Tag};

/// MMS ObjectName CHOICE.
///
/// Reports reference variables by domain-specific names. Item IDs use `$`
/// as the hierarchical separator (`LLN0$BR$brcbST01$RptEna`); the IEC
/// 61850 textual form separates the domain with `/`, which maps to the
/// two-part MMS name at this boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObjectName {
    VmdSpecific(String),
    DomainSpecific { domain_id: String, item_id: String },
    AaSpecific(String),
}

mod name_tag {
    pub const VMD_SPECIFIC: u32 = 0;
    pub const DOMAIN_SPECIFIC: u32 = 1;
    pub const AA_SPECIFIC: u32 = 2;
}

impl ObjectName {
    pub const NAME: &'static str = "ObjectName";

    pub fn domain_specific(domain_id: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self::DomainSpecific {
            domain_id: domain_id.into(),
            item_id: item_id.into(),
        }
    }

    /// Splits an IEC 61850 textual reference (`VMC7_1LD0/LLN0$BR$CB01`)
    /// into the MMS domain-specific form.
    pub fn parse_reference(reference: &str) -> Option<Self> {
        let (domain, item) = reference.split_once('/')?;

        if domain.is_empty() || item.is_empty() {
            return None;
        }

        Self::domain_specific(domain, item).pipe(Some)
    }

    /// Size of the full ObjectName TLV.
    pub fn object_size(&self) -> usize {
        match self {
            Self::VmdSpecific(name) | Self::AaSpecific(name) => ber::sizeof_tlv(name_tag::VMD_SPECIFIC, name.len()),
            Self::DomainSpecific { .. } => ber::sizeof_tlv(name_tag::DOMAIN_SPECIFIC, self.content_size()),
        }
    }

    fn content_size(&self) -> usize {
        match self {
            Self::VmdSpecific(name) | Self::AaSpecific(name) => name.len(),
            Self::DomainSpecific { domain_id, item_id } => {
                ber::sizeof_tlv(universal::VISIBLE_STRING, domain_id.len())
                    + ber::sizeof_tlv(universal::VISIBLE_STRING, item_id.len())
            }
        }
    }

    pub fn write(&self, out: &mut OctetWriter<'_>) -> WireResult<usize> {
        match self {
            Self::VmdSpecific(name) => ber::write_visible_string(out, Tag::context(name_tag::VMD_SPECIFIC), name),
            Self::AaSpecific(name) => ber::write_visible_string(out, Tag::context(name_tag::AA_SPECIFIC), name),
            Self::DomainSpecific { domain_id, item_id } => {
                let content_size = self.content_size();
                let mut written =
                    ber::write_header(out, Tag::context_constructed(name_tag::DOMAIN_SPECIFIC), content_size)?;
                written += ber::write_visible_string(out, Tag::universal(universal::VISIBLE_STRING), domain_id)?;
                written += ber::write_visible_string(out, Tag::universal(universal::VISIBLE_STRING), item_id)?;
                Ok(written)
            }
        }
    }

    pub fn read(src: &mut OctetReader<'_>) -> WireResult<Self> {
        let (tag, content) = ber::read_tlv(src)?;
        Self::from_tlv(tag, content)
    }

    pub fn from_tlv(tag: Tag, content: &[u8]) -> WireResult<Self> {
        match tag.number {
            name_tag::VMD_SPECIFIC if !tag.constructed => ber::parse_visible_string(content).map(Self::VmdSpecific),
            name_tag::AA_SPECIFIC if !tag.constructed => ber::parse_visible_string(content).map(Self::AaSpecific),
            name_tag::DOMAIN_SPECIFIC if tag.constructed => {
                let mut inner = OctetReader::new(content);

                let (domain_tag, domain) = ber::read_tlv(&mut inner)?;
                let (item_tag, item) = ber::read_tlv(&mut inner)?;

                if domain_tag.number != universal::VISIBLE_STRING || item_tag.number != universal::VISIBLE_STRING {
                    return Err(invalid_err(Self::NAME, "identifier", "expected visible strings"));
                }

                Ok(Self::DomainSpecific {
                    domain_id: ber::parse_visible_string(domain)?,
                    item_id: ber::parse_visible_string(item)?,
                })
            }
            _ => Err(invalid_err(Self::NAME, "tag", "unknown ObjectName alternative")),
        }
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VmdSpecific(name) | Self::AaSpecific(name) => write!(f, "{name}"),
            Self::DomainSpecific { domain_id, item_id } => write!(f, "{domain_id}/{item_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_splits_on_slash() {
        let name = ObjectName::parse_reference("VMC7_1LD0/LLN0$BR$CB01").unwrap();
        assert_eq!(name, ObjectName::domain_specific("VMC7_1LD0", "LLN0$BR$CB01"));
        assert_eq!(name.to_string(), "VMC7_1LD0/LLN0$BR$CB01");

        assert!(ObjectName::parse_reference("no-domain").is_none());
        assert!(ObjectName::parse_reference("/empty").is_none());
    }

    #[test]
    fn domain_specific_wire_form() {
        let name = ObjectName::domain_specific("D", "LLN0$MX");

        let mut buf = vec![0; name.object_size()];
        let mut out = OctetWriter::new(&mut buf);
        let written = name.write(&mut out).unwrap();
        assert_eq!(written, name.object_size());
        assert_eq!(
            buf,
            [0xA1, 0x0C, 0x1A, 0x01, b'D', 0x1A, 0x07, b'L', b'L', b'N', b'0', b'$', b'M', b'X']
        );

        let mut src = OctetReader::new(&buf);
        assert_eq!(ObjectName::read(&mut src).unwrap(), name);
    }
}
