use core::fmt;

use ironmms_core::{invalid_err, OctetReader, OctetWriter, WireResult};

use crate::ber::{self, universal, Tag};
use crate::mms::{AccessResult, DataAccessError, MmsValue, ObjectName};

/// ConfirmedService CHOICE tag numbers used by this client.
mod service_tag {
    pub const IDENTIFY: u32 = 2;
    pub const READ: u32 = 4;
    pub const WRITE: u32 = 5;
}

/// Read-Request: a list of named variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadRequest {
    pub variables: Vec<ObjectName>,
}

impl ReadRequest {
    const NAME: &'static str = "ReadRequest";

    /// listOfVariable content: one SEQUENCE per variable wrapping
    /// `variableSpecification: name [0] ObjectName`.
    fn list_of_variable_size(variables: &[ObjectName]) -> usize {
        variables
            .iter()
            .map(|variable| {
                let name_field = ber::sizeof_tlv(0, variable.object_size());
                ber::sizeof_tlv(universal::SEQUENCE, name_field)
            })
            .sum()
    }

    fn write_list_of_variable(dst: &mut OctetWriter<'_>, variables: &[ObjectName]) -> WireResult<()> {
        for variable in variables {
            let name_field = ber::sizeof_tlv(0, variable.object_size());
            ber::write_header(dst, Tag::sequence(), name_field)?;
            ber::write_header(dst, Tag::context_constructed(0), variable.object_size())?;
            variable.write(dst)?;
        }

        Ok(())
    }

    fn read_list_of_variable(content: &[u8]) -> WireResult<Vec<ObjectName>> {
        let mut variables = Vec::new();
        let mut src = OctetReader::new(content);

        while !src.is_empty() {
            let (seq_tag, seq_content) = ber::read_tlv(&mut src)?;
            if seq_tag.number != universal::SEQUENCE {
                return Err(invalid_err(Self::NAME, "listOfVariable", "expected SEQUENCE"));
            }

            let mut inner = OctetReader::new(seq_content);
            let (name_tag, name_content) = ber::read_tlv(&mut inner)?;
            if !name_tag.is_choice(0) {
                return Err(invalid_err(Self::NAME, "variableSpecification", "expected name"));
            }

            let mut name_cursor = OctetReader::new(name_content);
            variables.push(ObjectName::read(&mut name_cursor)?);
        }

        Ok(variables)
    }

    /// variableAccessSpecification [1] { listOfVariable [0] { ... } }
    fn content_size(&self) -> usize {
        let lov = ber::sizeof_tlv(0, Self::list_of_variable_size(&self.variables));
        ber::sizeof_tlv(1, lov)
    }

    fn write_content(&self, dst: &mut OctetWriter<'_>) -> WireResult<()> {
        let lov_content = Self::list_of_variable_size(&self.variables);
        let lov = ber::sizeof_tlv(0, lov_content);

        ber::write_header(dst, Tag::context_constructed(1), lov)?;
        ber::write_header(dst, Tag::context_constructed(0), lov_content)?;
        Self::write_list_of_variable(dst, &self.variables)
    }

    fn from_content(content: &[u8]) -> WireResult<Self> {
        let mut src = OctetReader::new(content);

        while !src.is_empty() {
            let (tag, tag_content) = ber::read_tlv(&mut src)?;

            // specificationWithResult [0] is skipped when present.
            if tag.is_choice(1) {
                let mut inner = OctetReader::new(tag_content);
                let (spec_tag, spec_content) = ber::read_tlv(&mut inner)?;

                if !spec_tag.is_choice(0) {
                    return Err(invalid_err(
                        Self::NAME,
                        "variableAccessSpecification",
                        "only listOfVariable is supported",
                    ));
                }

                return Self::read_list_of_variable(spec_content).map(|variables| Self { variables });
            }
        }

        Err(invalid_err(Self::NAME, "variableAccessSpecification", "missing"))
    }
}

/// Write-Request: one named variable and the value to assign.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteRequest {
    pub variable: ObjectName,
    pub value: MmsValue,
}

impl WriteRequest {
    const NAME: &'static str = "WriteRequest";

    fn content_size(&self) -> usize {
        let lov_content = ReadRequest::list_of_variable_size(core::slice::from_ref(&self.variable));
        let lov = ber::sizeof_tlv(0, lov_content);
        let list_of_data = ber::sizeof_tlv(0, self.value.data_size());

        lov + list_of_data
    }

    fn write_content(&self, dst: &mut OctetWriter<'_>) -> WireResult<()> {
        let variables = core::slice::from_ref(&self.variable);
        let lov_content = ReadRequest::list_of_variable_size(variables);

        ber::write_header(dst, Tag::context_constructed(0), lov_content)?;
        ReadRequest::write_list_of_variable(dst, variables)?;

        ber::write_header(dst, Tag::context_constructed(0), self.value.data_size())?;
        self.value.write_data(dst)?;

        Ok(())
    }

    fn from_content(content: &[u8]) -> WireResult<Self> {
        let mut src = OctetReader::new(content);

        // variableAccessSpecification comes first; listOfData is the
        // second [0]-tagged element.
        let (spec_tag, spec_content) = ber::read_tlv(&mut src)?;
        if !spec_tag.is_choice(0) {
            return Err(invalid_err(Self::NAME, "variableAccessSpecification", "only listOfVariable is supported"));
        }

        let variables = ReadRequest::read_list_of_variable(spec_content)?;
        let variable = variables
            .into_iter()
            .next()
            .ok_or_else(|| invalid_err(Self::NAME, "listOfVariable", "empty"))?;

        let (data_tag, data_content) = ber::read_tlv(&mut src)?;
        if !data_tag.is_choice(0) {
            return Err(invalid_err(Self::NAME, "listOfData", "missing"));
        }

        let mut inner = OctetReader::new(data_content);
        let value = MmsValue::read_data(&mut inner)?;

        Ok(Self { variable, value })
    }
}

/// A confirmed service request.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfirmedServiceRequest {
    Read(ReadRequest),
    Write(WriteRequest),
    /// Identify doubles as the session keep-alive probe.
    Identify,
}

impl ConfirmedServiceRequest {
    fn tag_number(&self) -> u32 {
        match self {
            Self::Read(_) => service_tag::READ,
            Self::Write(_) => service_tag::WRITE,
            Self::Identify => service_tag::IDENTIFY,
        }
    }

    fn inner_content_size(&self) -> usize {
        match self {
            Self::Read(request) => request.content_size(),
            Self::Write(request) => request.content_size(),
            Self::Identify => 0,
        }
    }

    fn size(&self) -> usize {
        ber::sizeof_tlv(self.tag_number(), self.inner_content_size())
    }

    fn write(&self, dst: &mut OctetWriter<'_>) -> WireResult<()> {
        match self {
            Self::Read(request) => {
                ber::write_header(dst, Tag::context_constructed(service_tag::READ), request.content_size())?;
                request.write_content(dst)
            }
            Self::Write(request) => {
                ber::write_header(dst, Tag::context_constructed(service_tag::WRITE), request.content_size())?;
                request.write_content(dst)
            }
            Self::Identify => {
                // identify takes no argument: an empty primitive
                ber::write_header(dst, Tag::context(service_tag::IDENTIFY), 0)?;
                Ok(())
            }
        }
    }
}

/// confirmed-RequestPDU: plain INTEGER invokeID followed by the service
/// CHOICE.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfirmedRequest {
    pub invoke_id: u32,
    pub service: ConfirmedServiceRequest,
}

impl ConfirmedRequest {
    pub const NAME: &'static str = "ConfirmedRequest";

    pub fn read(invoke_id: u32, variables: Vec<ObjectName>) -> Self {
        Self {
            invoke_id,
            service: ConfirmedServiceRequest::Read(ReadRequest { variables }),
        }
    }

    pub fn write(invoke_id: u32, variable: ObjectName, value: MmsValue) -> Self {
        Self {
            invoke_id,
            service: ConfirmedServiceRequest::Write(WriteRequest { variable, value }),
        }
    }

    pub fn identify(invoke_id: u32) -> Self {
        Self {
            invoke_id,
            service: ConfirmedServiceRequest::Identify,
        }
    }

    pub(crate) fn content_size(&self) -> usize {
        let invoke = ber::sizeof_tlv(universal::INTEGER, ber::sizeof_unsigned_content(u64::from(self.invoke_id)));
        invoke + self.service.size()
    }

    pub(crate) fn write_content(&self, dst: &mut OctetWriter<'_>) -> WireResult<()> {
        ber::write_unsigned(dst, Tag::universal(universal::INTEGER), u64::from(self.invoke_id))?;
        self.service.write(dst)
    }

    pub(crate) fn from_content(content: &[u8]) -> WireResult<Self> {
        let mut src = OctetReader::new(content);

        let invoke_id = read_invoke_id(&mut src)?;
        let (tag, service_content) = ber::read_tlv(&mut src)?;

        let service = match tag.number {
            service_tag::READ => ConfirmedServiceRequest::Read(ReadRequest::from_content(service_content)?),
            service_tag::WRITE => ConfirmedServiceRequest::Write(WriteRequest::from_content(service_content)?),
            service_tag::IDENTIFY => ConfirmedServiceRequest::Identify,
            _ => return Err(invalid_err(Self::NAME, "service", "unsupported confirmed service")),
        };

        Ok(Self { invoke_id, service })
    }
}

/// Write-Response list element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteResult {
    Success,
    Failure(DataAccessError),
}

/// Identify-Response: server identity strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentifyResponse {
    pub vendor_name: String,
    pub model_name: String,
    pub revision: String,
}

/// A confirmed service response.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfirmedServiceResponse {
    Read(Vec<AccessResult>),
    Write(Vec<WriteResult>),
    Identify(IdentifyResponse),
}

impl ConfirmedServiceResponse {
    fn tag_number(&self) -> u32 {
        match self {
            Self::Read(_) => service_tag::READ,
            Self::Write(_) => service_tag::WRITE,
            Self::Identify(_) => service_tag::IDENTIFY,
        }
    }

    fn inner_content_size(&self) -> usize {
        match self {
            Self::Read(results) => {
                let list: usize = results.iter().map(AccessResult::size).sum();
                ber::sizeof_tlv(1, list)
            }
            Self::Write(results) => results
                .iter()
                .map(|result| match result {
                    WriteResult::Success => ber::sizeof_tlv(1, 0),
                    WriteResult::Failure(error) => {
                        ber::sizeof_tlv(0, ber::sizeof_unsigned_content(u64::from(error.0)))
                    }
                })
                .sum(),
            Self::Identify(identity) => {
                ber::sizeof_tlv(0, identity.vendor_name.len())
                    + ber::sizeof_tlv(1, identity.model_name.len())
                    + ber::sizeof_tlv(2, identity.revision.len())
            }
        }
    }

    fn size(&self) -> usize {
        ber::sizeof_tlv(self.tag_number(), self.inner_content_size())
    }

    fn write(&self, dst: &mut OctetWriter<'_>) -> WireResult<()> {
        ber::write_header(dst, Tag::context_constructed(self.tag_number()), self.inner_content_size())?;

        match self {
            Self::Read(results) => {
                let list: usize = results.iter().map(AccessResult::size).sum();
                ber::write_header(dst, Tag::context_constructed(1), list)?;
                for result in results {
                    result.write(dst)?;
                }
            }
            Self::Write(results) => {
                for result in results {
                    match result {
                        WriteResult::Success => {
                            ber::write_header(dst, Tag::context(1), 0)?;
                        }
                        WriteResult::Failure(error) => {
                            ber::write_unsigned(dst, Tag::context(0), u64::from(error.0))?;
                        }
                    }
                }
            }
            Self::Identify(identity) => {
                ber::write_visible_string(dst, Tag::context(0), &identity.vendor_name)?;
                ber::write_visible_string(dst, Tag::context(1), &identity.model_name)?;
                ber::write_visible_string(dst, Tag::context(2), &identity.revision)?;
            }
        }

        Ok(())
    }
}

/// confirmed-ResponsePDU.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfirmedResponse {
    pub invoke_id: u32,
    pub service: ConfirmedServiceResponse,
}

impl ConfirmedResponse {
    pub const NAME: &'static str = "ConfirmedResponse";

    pub(crate) fn content_size(&self) -> usize {
        let invoke = ber::sizeof_tlv(universal::INTEGER, ber::sizeof_unsigned_content(u64::from(self.invoke_id)));
        invoke + self.service.size()
    }

    pub(crate) fn write_content(&self, dst: &mut OctetWriter<'_>) -> WireResult<()> {
        ber::write_unsigned(dst, Tag::universal(universal::INTEGER), u64::from(self.invoke_id))?;
        self.service.write(dst)
    }

    pub(crate) fn from_content(content: &[u8]) -> WireResult<Self> {
        let mut src = OctetReader::new(content);

        let invoke_id = read_invoke_id(&mut src)?;
        let (tag, service_content) = ber::read_tlv(&mut src)?;

        let service = match tag.number {
            service_tag::READ => {
                let mut inner = OctetReader::new(service_content);
                let mut results = None;

                while !inner.is_empty() {
                    let (part_tag, part_content) = ber::read_tlv(&mut inner)?;

                    // [0] echoes the variableAccessSpecification; ignored.
                    if part_tag.is_choice(1) {
                        let mut list = Vec::new();
                        let mut list_cursor = OctetReader::new(part_content);
                        while !list_cursor.is_empty() {
                            list.push(AccessResult::read(&mut list_cursor)?);
                        }
                        results = Some(list);
                    }
                }

                let results =
                    results.ok_or_else(|| invalid_err(Self::NAME, "listOfAccessResult", "missing"))?;
                ConfirmedServiceResponse::Read(results)
            }
            service_tag::WRITE => {
                let mut inner = OctetReader::new(service_content);
                let mut results = Vec::new();

                while !inner.is_empty() {
                    let (part_tag, part_content) = ber::read_tlv(&mut inner)?;

                    if part_tag.number == 1 {
                        results.push(WriteResult::Success);
                    } else {
                        let code = ber::parse_unsigned(part_content)?;
                        let code = u8::try_from(code)
                            .map_err(|_| invalid_err(Self::NAME, "failure", "error code out of range"))?;
                        results.push(WriteResult::Failure(DataAccessError(code)));
                    }
                }

                ConfirmedServiceResponse::Write(results)
            }
            service_tag::IDENTIFY => {
                let mut inner = OctetReader::new(service_content);
                let mut identity = IdentifyResponse::default();

                while !inner.is_empty() {
                    let (part_tag, part_content) = ber::read_tlv(&mut inner)?;
                    let value = ber::parse_visible_string(part_content)?;

                    match part_tag.number {
                        0 => identity.vendor_name = value,
                        1 => identity.model_name = value,
                        2 => identity.revision = value,
                        _ => {}
                    }
                }

                ConfirmedServiceResponse::Identify(identity)
            }
            _ => return Err(invalid_err(Self::NAME, "service", "unsupported confirmed service")),
        };

        Ok(Self { invoke_id, service })
    }
}

/// ServiceError class/code pair carried by a confirmed-ErrorPDU.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ServiceError {
    pub class: u8,
    pub code: i64,
}

impl ServiceError {
    pub const CLASS_VMD_STATE: u8 = 0;
    pub const CLASS_APPLICATION_REFERENCE: u8 = 1;
    pub const CLASS_DEFINITION: u8 = 2;
    pub const CLASS_RESOURCE: u8 = 3;
    pub const CLASS_SERVICE: u8 = 4;
    pub const CLASS_SERVICE_PREEMPT: u8 = 5;
    pub const CLASS_TIME_RESOLUTION: u8 = 6;
    pub const CLASS_ACCESS: u8 = 7;
    pub const CLASS_INITIATE: u8 = 8;
    pub const CLASS_CONCLUDE: u8 = 9;
    pub const CLASS_CANCEL: u8 = 10;
    pub const CLASS_FILE: u8 = 11;
    pub const CLASS_OTHERS: u8 = 12;

    fn class_name(self) -> &'static str {
        match self.class {
            Self::CLASS_VMD_STATE => "vmd-state",
            Self::CLASS_APPLICATION_REFERENCE => "application-reference",
            Self::CLASS_DEFINITION => "definition",
            Self::CLASS_RESOURCE => "resource",
            Self::CLASS_SERVICE => "service",
            Self::CLASS_SERVICE_PREEMPT => "service-preempt",
            Self::CLASS_TIME_RESOLUTION => "time-resolution",
            Self::CLASS_ACCESS => "access",
            Self::CLASS_INITIATE => "initiate",
            Self::CLASS_CONCLUDE => "conclude",
            Self::CLASS_CANCEL => "cancel",
            Self::CLASS_FILE => "file",
            _ => "others",
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error, code {}", self.class_name(), self.code)
    }
}

impl std::error::Error for ServiceError {}

/// confirmed-ErrorPDU.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmedError {
    pub invoke_id: u32,
    pub service_error: ServiceError,
}

impl ConfirmedError {
    pub const NAME: &'static str = "ConfirmedError";

    pub(crate) fn content_size(&self) -> usize {
        let invoke = ber::sizeof_tlv(0, ber::sizeof_unsigned_content(u64::from(self.invoke_id)));
        let code = ber::sizeof_tlv(
            u32::from(self.service_error.class),
            ber::sizeof_integer_content(self.service_error.code),
        );
        let error_class = ber::sizeof_tlv(0, code);
        invoke + ber::sizeof_tlv(2, error_class)
    }

    pub(crate) fn write_content(&self, dst: &mut OctetWriter<'_>) -> WireResult<()> {
        ber::write_unsigned(dst, Tag::context(0), u64::from(self.invoke_id))?;

        let code = ber::sizeof_tlv(
            u32::from(self.service_error.class),
            ber::sizeof_integer_content(self.service_error.code),
        );
        ber::write_header(dst, Tag::context_constructed(2), ber::sizeof_tlv(0, code))?;
        ber::write_header(dst, Tag::context_constructed(0), code)?;
        ber::write_integer(
            dst,
            Tag::context(u32::from(self.service_error.class)),
            self.service_error.code,
        )?;

        Ok(())
    }

    pub(crate) fn from_content(content: &[u8]) -> WireResult<Self> {
        let mut src = OctetReader::new(content);
        let mut invoke_id = None;
        let mut service_error = None;

        while !src.is_empty() {
            let (tag, tag_content) = ber::read_tlv(&mut src)?;

            match tag.number {
                0 if !tag.constructed => {
                    invoke_id = Some(
                        u32::try_from(ber::parse_unsigned(tag_content)?)
                            .map_err(|_| invalid_err(Self::NAME, "invokeID", "out of range"))?,
                    );
                }
                2 if tag.constructed => {
                    let mut inner = OctetReader::new(tag_content);
                    let (class_tag, class_content) = ber::read_tlv(&mut inner)?;

                    if class_tag.number != 0 {
                        return Err(invalid_err(Self::NAME, "serviceError", "missing errorClass"));
                    }

                    let mut class_cursor = OctetReader::new(class_content);
                    let (code_tag, code_content) = ber::read_tlv(&mut class_cursor)?;

                    service_error = Some(ServiceError {
                        class: u8::try_from(code_tag.number)
                            .map_err(|_| invalid_err(Self::NAME, "errorClass", "out of range"))?,
                        code: ber::parse_integer(code_content)?,
                    });
                }
                _ => {}
            }
        }

        match (invoke_id, service_error) {
            (Some(invoke_id), Some(service_error)) => Ok(Self {
                invoke_id,
                service_error,
            }),
            _ => Err(invalid_err(Self::NAME, "content", "missing invokeID or serviceError")),
        }
    }
}

fn read_invoke_id(src: &mut OctetReader<'_>) -> WireResult<u32> {
    let (tag, content) = ber::read_tlv(src)?;

    if tag.number != universal::INTEGER || tag.constructed {
        return Err(invalid_err("InvokeId", "invokeID", "expected INTEGER"));
    }

    u32::try_from(ber::parse_unsigned(content)?).map_err(|_| invalid_err("InvokeId", "invokeID", "out of range"))
}
