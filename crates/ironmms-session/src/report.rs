use core::fmt;

use ironmms_pdu::ber::BitString;
use ironmms_pdu::mms::{AccessResult, InformationReport, MmsValue};
use ironmms_pdu::rcb::{OptFlds, ReasonCode};
use ironmms_pdu::time::{BinaryTime, UtcTime};

use crate::{protocol_err, SessionResult};

/// Time of entry or per-member timestamp; IEDs emit either form.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReportTimestamp {
    Utc(UtcTime),
    Binary(BinaryTime),
}

impl ReportTimestamp {
    fn from_value(value: &MmsValue) -> Option<Self> {
        match value {
            MmsValue::UtcTime(t) => Some(Self::Utc(*t)),
            MmsValue::BinaryTime(t) => Some(Self::Binary(*t)),
            _ => None,
        }
    }

    pub fn as_unix_millis(self) -> i64 {
        match self {
            Self::Utc(t) => t.as_unix_millis(),
            Self::Binary(t) => t.as_unix_millis(),
        }
    }
}

impl fmt::Display for ReportTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utc(t) => write!(f, "{t}"),
            Self::Binary(t) => write!(f, "{t}"),
        }
    }
}

/// One dataset member of a decoded report.
///
/// Every member of the dataset gets an entry; only the ones whose
/// inclusion bit is set carry a value.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportEntry {
    /// Index into the dataset.
    pub index: usize,
    /// Label from the registered SCL mapping, when one is known.
    pub label: Option<String>,
    /// Data reference reported by the IED, when OptFlds requests it.
    pub data_ref: Option<String>,
    pub value: Option<MmsValue>,
    /// Adjacent quality member, when the report carries one.
    pub quality: Option<BitString>,
    /// Adjacent timestamp member, when the report carries one.
    pub timestamp: Option<ReportTimestamp>,
    /// Why this member was included.
    pub reason: Option<ReasonCode>,
}

impl ReportEntry {
    fn empty(index: usize) -> Self {
        Self {
            index,
            label: None,
            data_ref: None,
            value: None,
            quality: None,
            timestamp: None,
            reason: None,
        }
    }
}

/// A decoded report.
#[derive(Clone, Debug, PartialEq)]
pub struct MmsReport {
    pub rpt_id: String,
    /// Effective OptFlds: the report-embedded value when present,
    /// otherwise the subscription-time hint.
    pub opt_flds: OptFlds,
    pub dataset_ref: Option<String>,
    pub sequence_number: Option<u64>,
    pub time_of_entry: Option<ReportTimestamp>,
    pub buffer_overflow: Option<bool>,
    pub entry_id: Option<Vec<u8>>,
    pub conf_rev: Option<u64>,
    pub sub_sequence_number: Option<u64>,
    pub more_segments_follow: Option<bool>,
    /// One bit per dataset member; set iff that member's value is
    /// present in this report instance.
    pub inclusion: BitString,
    pub entries: Vec<ReportEntry>,
    /// Set when the element count did not line up with OptFlds and the
    /// inclusion bitstring; the report is a best-effort prefix.
    pub decode_mismatch: bool,
}

impl MmsReport {
    /// Number of members whose value is present.
    pub fn included_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.value.is_some()).count()
    }
}

/// Splits an access-result list into report header fields and dataset
/// member entries, driven by OptFlds and the inclusion bitstring.
pub struct ReportDecoder<'a> {
    values: Vec<Option<&'a MmsValue>>,
    cursor: usize,
    mismatch: bool,
}

impl<'a> ReportDecoder<'a> {
    pub const NAME: &'static str = "ReportDecoder";

    pub fn new(report: &'a InformationReport) -> Self {
        let values = report
            .access_results
            .iter()
            .map(AccessResult::success)
            .collect();

        Self {
            values,
            cursor: 0,
            mismatch: false,
        }
    }

    /// Decodes the report. `opt_flds_hint` is the subscription-time
    /// OptFlds, used when the report does not embed its own; `labels` is
    /// the ordered member label list of the dataset, when known.
    pub fn decode(mut self, opt_flds_hint: OptFlds, labels: Option<&[String]>) -> SessionResult<MmsReport> {
        // 1. RptID, always first, always a visible string.
        let rpt_id = self
            .next()
            .and_then(MmsValue::as_visible_string)
            .ok_or_else(|| protocol_err(Self::NAME, "first report member is not a visible string RptID"))?
            .to_owned();

        // 2. IEDs embed OptFlds as a 10-bit string right after RptID;
        // fall back to the subscription hint otherwise.
        let opt_flds = match self.peek().and_then(MmsValue::as_bit_string) {
            Some(bits) if bits.bit_length() == OptFlds::BIT_LENGTH => {
                self.advance();
                OptFlds::from_bit_string(bits)
            }
            _ => opt_flds_hint,
        };

        // 3. Optional header fields, in OptFlds bit order.
        let sequence_number = if opt_flds.contains(OptFlds::SEQUENCE_NUMBER) {
            self.take_u64()
        } else {
            None
        };

        let time_of_entry = if opt_flds.contains(OptFlds::REPORT_TIME_STAMP) {
            self.take_timestamp()
        } else {
            None
        };

        let dataset_ref = if opt_flds.contains(OptFlds::DATA_SET_NAME) {
            self.take_string().map(|raw| normalize_dataset_ref(&raw))
        } else {
            None
        };

        let buffer_overflow = if opt_flds.contains(OptFlds::BUFFER_OVERFLOW) {
            self.take_bool()
        } else {
            None
        };

        let entry_id = if opt_flds.contains(OptFlds::ENTRY_ID) {
            self.take_octets()
        } else {
            None
        };

        let conf_rev = if opt_flds.contains(OptFlds::CONF_REVISION) {
            self.take_u64()
        } else {
            None
        };

        let (sub_sequence_number, more_segments_follow) = if opt_flds.contains(OptFlds::SEGMENTATION) {
            (self.take_u64(), self.take_bool())
        } else {
            (None, None)
        };

        // 4. Inclusion bitstring; its length is the dataset member count.
        let inclusion = self
            .next()
            .and_then(MmsValue::as_bit_string)
            .cloned()
            .ok_or_else(|| protocol_err(Self::NAME, "missing inclusion bitstring"))?;

        let member_count = inclusion.bit_length();
        let included: Vec<usize> = (0..member_count).filter(|&index| inclusion.bit(index)).collect();

        let mut entries: Vec<ReportEntry> = (0..member_count).map(ReportEntry::empty).collect();

        // 5. Data references: one visible string per included member.
        if opt_flds.contains(OptFlds::DATA_REFERENCE) {
            for &index in &included {
                match self.peek() {
                    Some(MmsValue::VisibleString(data_ref)) => {
                        entries[index].data_ref = Some(data_ref.clone());
                        self.advance();
                    }
                    _ => {
                        self.mismatch = true;
                        break;
                    }
                }
            }
        }

        // 6. The value block, with per-row / per-column shape detection.
        let reasons_expected = if opt_flds.contains(OptFlds::REASON_FOR_INCLUSION) {
            included.len()
        } else {
            0
        };

        self.decode_value_block(&included, reasons_expected, &mut entries);

        // 7. Per-member reasons trail the value block.
        if reasons_expected > 0 {
            for &index in &included {
                match self.next() {
                    Some(MmsValue::BitString(bits)) => {
                        entries[index].reason = Some(ReasonCode::from_bit_string(bits));
                    }
                    _ => {
                        self.mismatch = true;
                        break;
                    }
                }
            }
        }

        if !self.is_exhausted() {
            debug!(remaining = self.remaining(), "Trailing report members ignored");
            self.mismatch = true;
        }

        // 8. Labels from the registered mapping.
        if let Some(labels) = labels {
            for entry in &mut entries {
                entry.label = labels.get(entry.index).cloned();
            }
        }

        Ok(MmsReport {
            rpt_id,
            opt_flds,
            dataset_ref,
            sequence_number,
            time_of_entry,
            buffer_overflow,
            entry_id,
            conf_rev,
            sub_sequence_number,
            more_segments_follow,
            inclusion,
            entries,
            decode_mismatch: self.mismatch,
        })
    }

    /// Fills values (and adjacent quality/timestamp members) for the
    /// included entries.
    ///
    /// Two layouts exist in the wild: per-column (all values, then all
    /// qualities, then all timestamps) and per-row (value, quality,
    /// timestamp member by member). The shape is probed by counting the
    /// remaining elements against popcount(inclusion) and sniffing the
    /// element right after the first value.
    fn decode_value_block(&mut self, included: &[usize], reasons_expected: usize, entries: &mut [ReportEntry]) {
        let n = included.len();

        if n == 0 {
            return;
        }

        let available = self.remaining().saturating_sub(reasons_expected);

        if available < n {
            // Fewer values than inclusion bits: best-effort prefix.
            self.mismatch = true;
        }

        let columns = if available >= n && available % n == 0 {
            (available / n).min(3)
        } else {
            1
        };

        let per_row = columns > 1 && n > 1 && {
            // In a per-row layout the element right after the first
            // value belongs to the same member: a quality bitstring or a
            // timestamp. Per-column layouts put the second value there.
            self.peek_at(1)
                .map(|value| is_quality(value) || ReportTimestamp::from_value(value).is_some())
                .unwrap_or(false)
        };

        if columns > 1 && per_row {
            for &index in included {
                entries[index].value = self.next().cloned();
                for _ in 1..columns {
                    match self.peek() {
                        Some(value) if is_quality(value) => {
                            entries[index].quality = value.as_bit_string().cloned();
                            self.advance();
                        }
                        Some(value) if ReportTimestamp::from_value(value).is_some() => {
                            entries[index].timestamp = ReportTimestamp::from_value(value);
                            self.advance();
                        }
                        _ => {
                            self.mismatch = true;
                            return;
                        }
                    }
                }
            }
        } else {
            // Per-column: the value column first.
            for &index in included {
                entries[index].value = self.next().cloned();
            }

            // Remaining columns hold qualities and/or timestamps.
            for _ in 1..columns {
                let Some(first) = self.peek() else {
                    self.mismatch = true;
                    return;
                };

                if is_quality(first) {
                    for &index in included {
                        entries[index].quality = self.next().and_then(MmsValue::as_bit_string).cloned();
                    }
                } else if ReportTimestamp::from_value(first).is_some() {
                    for &index in included {
                        entries[index].timestamp = self.next().and_then(ReportTimestamp::from_value);
                    }
                } else {
                    self.mismatch = true;
                    return;
                }
            }
        }
    }

    fn next(&mut self) -> Option<&'a MmsValue> {
        let value = self.values.get(self.cursor).copied().flatten();
        self.cursor += 1;
        value
    }

    fn peek(&self) -> Option<&'a MmsValue> {
        self.values.get(self.cursor).copied().flatten()
    }

    fn peek_at(&self, offset: usize) -> Option<&'a MmsValue> {
        self.values.get(self.cursor + offset).copied().flatten()
    }

    fn advance(&mut self) {
        self.cursor += 1;
    }

    fn remaining(&self) -> usize {
        self.values.len().saturating_sub(self.cursor)
    }

    fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    fn take_u64(&mut self) -> Option<u64> {
        match self.next().and_then(MmsValue::as_u64) {
            Some(value) => Some(value),
            None => {
                self.mismatch = true;
                None
            }
        }
    }

    fn take_bool(&mut self) -> Option<bool> {
        match self.next().and_then(MmsValue::as_bool) {
            Some(value) => Some(value),
            None => {
                self.mismatch = true;
                None
            }
        }
    }

    fn take_string(&mut self) -> Option<String> {
        match self.next().and_then(MmsValue::as_visible_string) {
            Some(value) => Some(value.to_owned()),
            None => {
                self.mismatch = true;
                None
            }
        }
    }

    fn take_octets(&mut self) -> Option<Vec<u8>> {
        match self.next() {
            Some(MmsValue::OctetString(bytes)) => Some(bytes.clone()),
            _ => {
                self.mismatch = true;
                None
            }
        }
    }

    fn take_timestamp(&mut self) -> Option<ReportTimestamp> {
        match self.next().and_then(ReportTimestamp::from_value) {
            Some(value) => Some(value),
            None => {
                self.mismatch = true;
                None
            }
        }
    }
}

/// IEC 61850 quality is a 13-bit string.
fn is_quality(value: &MmsValue) -> bool {
    matches!(value, MmsValue::BitString(bits) if bits.bit_length() <= 13)
}

fn normalize_dataset_ref(raw: &str) -> String {
    raw.replacen(' ', "/", 1)
}
