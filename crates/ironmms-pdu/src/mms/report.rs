use ironmms_core::{invalid_err, OctetReader, OctetWriter, WireResult};

use crate::ber::{self, Tag};
use crate::mms::{AccessResult, ObjectName};

/// informationReport: the unsolicited dataset snapshot an IED pushes when
/// a report control block fires.
///
/// The variable access specification is a named-variable-list reference
/// (IEDs report against the `RPT` pseudo list); a listOfVariable
/// specification is tolerated and skipped. The interesting payload is the
/// ordered list of access results, interpreted by the report decoder one
/// layer up.
#[derive(Clone, Debug, PartialEq)]
pub struct InformationReport {
    pub variable_list_name: Option<ObjectName>,
    pub access_results: Vec<AccessResult>,
}

mod field_tag {
    pub const LIST_OF_VARIABLE: u32 = 0;
    pub const VARIABLE_LIST_NAME: u32 = 1;
    pub const LIST_OF_ACCESS_RESULT: u32 = 0;
}

impl InformationReport {
    pub const NAME: &'static str = "InformationReport";

    pub fn new(access_results: Vec<AccessResult>) -> Self {
        Self {
            variable_list_name: Some(ObjectName::VmdSpecific("RPT".to_owned())),
            access_results,
        }
    }

    fn list_size(&self) -> usize {
        self.access_results.iter().map(AccessResult::size).sum()
    }

    pub(crate) fn content_size(&self) -> usize {
        let name_size = self
            .variable_list_name
            .as_ref()
            .map_or_else(
                || ber::sizeof_tlv(field_tag::LIST_OF_VARIABLE, 0),
                |name| ber::sizeof_tlv(field_tag::VARIABLE_LIST_NAME, name.object_size()),
            );

        name_size + ber::sizeof_tlv(field_tag::LIST_OF_ACCESS_RESULT, self.list_size())
    }

    pub(crate) fn write_content(&self, dst: &mut OctetWriter<'_>) -> WireResult<()> {
        match &self.variable_list_name {
            Some(name) => {
                ber::write_header(
                    dst,
                    Tag::context_constructed(field_tag::VARIABLE_LIST_NAME),
                    name.object_size(),
                )?;
                name.write(dst)?;
            }
            None => {
                ber::write_header(dst, Tag::context_constructed(field_tag::LIST_OF_VARIABLE), 0)?;
            }
        }

        ber::write_header(
            dst,
            Tag::context_constructed(field_tag::LIST_OF_ACCESS_RESULT),
            self.list_size(),
        )?;
        for result in &self.access_results {
            result.write(dst)?;
        }

        Ok(())
    }

    pub(crate) fn from_content(content: &[u8]) -> WireResult<Self> {
        let mut src = OctetReader::new(content);

        // The variable access specification comes first: either a
        // variableListName [1] or a listOfVariable [0]. The following
        // [0] element is the listOfAccessResult.
        let (spec_tag, spec_content) = ber::read_tlv(&mut src)?;

        let variable_list_name = if spec_tag.is_choice(field_tag::VARIABLE_LIST_NAME) {
            let mut name_cursor = OctetReader::new(spec_content);
            Some(ObjectName::read(&mut name_cursor)?)
        } else if spec_tag.is_choice(field_tag::LIST_OF_VARIABLE) {
            None
        } else {
            return Err(invalid_err(
                Self::NAME,
                "variableAccessSpecification",
                "unknown alternative",
            ));
        };

        let (list_tag, list_content) = ber::read_tlv(&mut src)?;
        if !list_tag.is_choice(field_tag::LIST_OF_ACCESS_RESULT) {
            return Err(invalid_err(Self::NAME, "listOfAccessResult", "missing"));
        }

        // A malformed element truncates the list instead of rejecting the
        // report: the successfully-parsed prefix is still delivered and
        // the report decoder flags the count mismatch downstream.
        let mut access_results = Vec::new();
        let mut list_cursor = OctetReader::new(list_content);
        while !list_cursor.is_empty() {
            match AccessResult::read(&mut list_cursor) {
                Ok(result) => access_results.push(result),
                Err(_) => break,
            }
        }

        Ok(Self {
            variable_list_name,
            access_results,
        })
    }
}
