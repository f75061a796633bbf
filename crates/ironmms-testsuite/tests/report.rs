use ironmms_pdu::ber::BitString;
use ironmms_pdu::mms::{AccessResult, InformationReport, MmsValue};
use ironmms_pdu::rcb::{OptFlds, ReasonCode};
use ironmms_pdu::time::{BinaryTime, UtcTime};
use ironmms_session::{ReportDecoder, ReportTimestamp};

fn report_of(values: Vec<MmsValue>) -> InformationReport {
    InformationReport::new(values.into_iter().map(AccessResult::Success).collect())
}

fn inclusion(bits: &[bool]) -> BitString {
    let mut out = BitString::zeroed(bits.len());
    for (index, bit) in bits.iter().enumerate() {
        out.set_bit(index, *bit);
    }
    out
}

/// Half-included 24-member dataset with sequence number, entry time and
/// buffer overflow in the header.
#[test]
fn header_fields_follow_opt_flds() {
    let opt_flds = OptFlds::SEQUENCE_NUMBER | OptFlds::REPORT_TIME_STAMP | OptFlds::BUFFER_OVERFLOW;

    let time_of_entry = BinaryTime {
        millis_of_day: 14_913_235,
        days_since_1984: Some(338),
    };

    let mut included = [false; 24];
    for slot in included.iter_mut().take(12) {
        *slot = true;
    }

    let mut values = vec![
        MmsValue::VisibleString("LDPHAS1_CYPO_DEP1".to_owned()),
        MmsValue::Uint(1),
        MmsValue::BinaryTime(time_of_entry),
        MmsValue::Bool(false),
        MmsValue::BitString(inclusion(&included)),
    ];
    values.extend((0..12).map(|i| MmsValue::Int(i)));

    let report = report_of(values);
    let decoded = ReportDecoder::new(&report).decode(opt_flds, None).unwrap();

    assert_eq!(decoded.rpt_id, "LDPHAS1_CYPO_DEP1");
    assert_eq!(decoded.sequence_number, Some(1));
    assert_eq!(decoded.time_of_entry, Some(ReportTimestamp::Binary(time_of_entry)));
    assert_eq!(
        decoded.time_of_entry.unwrap().to_string(),
        "1984-12-04T04:08:33.235000Z"
    );
    assert_eq!(decoded.buffer_overflow, Some(false));

    // Fields not flagged in OptFlds are absent.
    assert_eq!(decoded.dataset_ref, None);
    assert_eq!(decoded.entry_id, None);
    assert_eq!(decoded.conf_rev, None);

    // 24 members, values present exactly where the inclusion bit is set.
    assert_eq!(decoded.entries.len(), 24);
    assert_eq!(decoded.included_count(), 12);
    assert_eq!(decoded.included_count(), decoded.inclusion.count_ones());
    assert!(decoded.entries[..12].iter().all(|e| e.value.is_some()));
    assert!(decoded.entries[12..].iter().all(|e| e.value.is_none()));
    assert!(!decoded.decode_mismatch);
}

#[test]
fn embedded_opt_flds_wins_over_hint() {
    // Second element is a 10-bit string: the report-carried OptFlds,
    // flagging only the sequence number.
    let embedded = OptFlds::SEQUENCE_NUMBER;

    let report = report_of(vec![
        MmsValue::VisibleString("RPT".to_owned()),
        MmsValue::BitString(embedded.to_bit_string()),
        MmsValue::Uint(42),
        MmsValue::BitString(inclusion(&[true])),
        MmsValue::Bool(true),
    ]);

    // The hint claims a timestamp too; the embedded OptFlds rules.
    let hint = OptFlds::SEQUENCE_NUMBER | OptFlds::REPORT_TIME_STAMP;
    let decoded = ReportDecoder::new(&report).decode(hint, None).unwrap();

    assert_eq!(decoded.opt_flds, embedded);
    assert_eq!(decoded.sequence_number, Some(42));
    assert_eq!(decoded.time_of_entry, None);
    assert_eq!(decoded.entries[0].value, Some(MmsValue::Bool(true)));
    assert!(!decoded.decode_mismatch);
}

fn quality() -> BitString {
    BitString::zeroed(13)
}

fn member_time(seconds: u32) -> MmsValue {
    MmsValue::UtcTime(UtcTime {
        seconds,
        fraction: 0,
        quality: 0,
    })
}

/// Per-row: value, quality, timestamp member by member.
#[test]
fn per_row_layout_is_detected() {
    let report = report_of(vec![
        MmsValue::VisibleString("RPT".to_owned()),
        MmsValue::BitString(inclusion(&[true, true])),
        MmsValue::Float(1.0),
        MmsValue::BitString(quality()),
        member_time(100),
        MmsValue::Float(2.0),
        MmsValue::BitString(quality()),
        member_time(200),
    ]);

    let decoded = ReportDecoder::new(&report).decode(OptFlds::empty(), None).unwrap();

    assert!(!decoded.decode_mismatch);
    assert_eq!(decoded.entries[0].value, Some(MmsValue::Float(1.0)));
    assert_eq!(decoded.entries[0].quality, Some(quality()));
    assert_eq!(decoded.entries[0].timestamp.unwrap().as_unix_millis(), 100_000);
    assert_eq!(decoded.entries[1].value, Some(MmsValue::Float(2.0)));
    assert_eq!(decoded.entries[1].timestamp.unwrap().as_unix_millis(), 200_000);
}

/// Per-column: all values, then all qualities, then all timestamps.
#[test]
fn per_column_layout_is_detected() {
    let report = report_of(vec![
        MmsValue::VisibleString("RPT".to_owned()),
        MmsValue::BitString(inclusion(&[true, true])),
        MmsValue::Float(1.0),
        MmsValue::Float(2.0),
        MmsValue::BitString(quality()),
        MmsValue::BitString(quality()),
        member_time(100),
        member_time(200),
    ]);

    let decoded = ReportDecoder::new(&report).decode(OptFlds::empty(), None).unwrap();

    assert!(!decoded.decode_mismatch);
    assert_eq!(decoded.entries[0].value, Some(MmsValue::Float(1.0)));
    assert_eq!(decoded.entries[0].quality, Some(quality()));
    assert_eq!(decoded.entries[0].timestamp.unwrap().as_unix_millis(), 100_000);
    assert_eq!(decoded.entries[1].value, Some(MmsValue::Float(2.0)));
    assert_eq!(decoded.entries[1].timestamp.unwrap().as_unix_millis(), 200_000);
}

#[test]
fn data_references_and_reasons_attach_to_members() {
    let opt_flds = OptFlds::DATA_REFERENCE | OptFlds::REASON_FOR_INCLUSION;

    let mut gi_reason = BitString::zeroed(7);
    gi_reason.set_bit(5, true); // general-interrogation

    let report = report_of(vec![
        MmsValue::VisibleString("RPT".to_owned()),
        MmsValue::BitString(inclusion(&[true, false, true])),
        MmsValue::VisibleString("D/MMXU1$MX$TotW".to_owned()),
        MmsValue::VisibleString("D/MMXU1$MX$TotVAr".to_owned()),
        MmsValue::Float(10.0),
        MmsValue::Float(20.0),
        MmsValue::BitString(gi_reason.clone()),
        MmsValue::BitString(gi_reason),
    ]);

    let decoded = ReportDecoder::new(&report).decode(opt_flds, None).unwrap();

    assert!(!decoded.decode_mismatch);
    assert_eq!(decoded.entries[0].data_ref.as_deref(), Some("D/MMXU1$MX$TotW"));
    assert_eq!(decoded.entries[0].reason, Some(ReasonCode::GENERAL_INTERROGATION));
    assert_eq!(decoded.entries[1].value, None);
    assert_eq!(decoded.entries[1].data_ref, None);
    assert_eq!(decoded.entries[2].data_ref.as_deref(), Some("D/MMXU1$MX$TotVAr"));
    assert_eq!(decoded.entries[2].value, Some(MmsValue::Float(20.0)));
}

#[test]
fn missing_values_degrade_to_best_effort() {
    // Inclusion claims two members, only one value follows.
    let report = report_of(vec![
        MmsValue::VisibleString("RPT".to_owned()),
        MmsValue::BitString(inclusion(&[true, true])),
        MmsValue::Int(1),
    ]);

    let decoded = ReportDecoder::new(&report).decode(OptFlds::empty(), None).unwrap();

    assert!(decoded.decode_mismatch);
    assert_eq!(decoded.entries[0].value, Some(MmsValue::Int(1)));
    assert_eq!(decoded.entries[1].value, None);
}

#[test]
fn rpt_id_must_be_a_visible_string() {
    let report = report_of(vec![MmsValue::Uint(1)]);

    assert!(ReportDecoder::new(&report).decode(OptFlds::empty(), None).is_err());
}

#[test]
fn labeling_is_stable_across_reports() {
    let labels: Vec<String> = ["TotW", "TotVAr"].iter().map(|s| (*s).to_owned()).collect();

    let make = || {
        report_of(vec![
            MmsValue::VisibleString("RPT".to_owned()),
            MmsValue::BitString(inclusion(&[true, true])),
            MmsValue::Float(1.0),
            MmsValue::Float(2.0),
        ])
    };

    let first = ReportDecoder::new(&make()).decode(OptFlds::empty(), Some(&labels)).unwrap();
    let second = ReportDecoder::new(&make()).decode(OptFlds::empty(), Some(&labels)).unwrap();

    let first_labels: Vec<_> = first.entries.iter().map(|e| e.label.clone()).collect();
    let second_labels: Vec<_> = second.entries.iter().map(|e| e.label.clone()).collect();

    assert_eq!(first_labels, second_labels);
    assert_eq!(first.entries[0].label.as_deref(), Some("TotW"));
    assert_eq!(first.entries[1].label.as_deref(), Some("TotVAr"));
}

#[test]
fn analogue_value_and_vector_structures_are_preserved() {
    let analogue = MmsValue::Structure(vec![MmsValue::Int(230), MmsValue::Float(230.2)]);
    let vector = MmsValue::Structure(vec![analogue.clone(), MmsValue::Structure(vec![
        MmsValue::Int(-120),
        MmsValue::Float(-120.1),
    ])]);

    let report = report_of(vec![
        MmsValue::VisibleString("RPT".to_owned()),
        MmsValue::BitString(inclusion(&[true, true])),
        analogue.clone(),
        vector.clone(),
    ]);

    let decoded = ReportDecoder::new(&report).decode(OptFlds::empty(), None).unwrap();

    assert_eq!(decoded.entries[0].value, Some(analogue));
    assert_eq!(decoded.entries[1].value, Some(vector));
}

#[test]
fn dataset_name_is_normalized_to_slash_form() {
    let report = report_of(vec![
        MmsValue::VisibleString("RPT".to_owned()),
        MmsValue::VisibleString("VMC7_1LD0 LLN0$DSET1".to_owned()),
        MmsValue::BitString(inclusion(&[true])),
        MmsValue::Bool(true),
    ]);

    let decoded = ReportDecoder::new(&report)
        .decode(OptFlds::DATA_SET_NAME, None)
        .unwrap();

    assert_eq!(decoded.dataset_ref.as_deref(), Some("VMC7_1LD0/LLN0$DSET1"));
}
