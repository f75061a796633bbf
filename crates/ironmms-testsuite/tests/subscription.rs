use ironmms_connector::{
    Config, ConnectorError, ConnectorErrorKind, InvokeSequencer, RcbEnableStep, RcbSubscriptionSequence, Sequence as _,
};
use ironmms_pdu::mms::{
    AccessResult, ConfirmedResponse, ConfirmedServiceRequest, ConfirmedServiceResponse, DataAccessError, MmsPdu,
    MmsValue, ObjectName, WriteResult,
};
use ironmms_pdu::rcb::{OptFlds, RcbReference, TrgOps};
use ironmms_testsuite::{decode_mms_stream, mms_frames, split_frames};

const MAX_TPDU: usize = 2048;

/// Pumps a subscription sequence against a scripted list of responses,
/// the way the blocking driver would, collecting every request the
/// sequence sends.
fn run_sequence(
    sequence: &mut RcbSubscriptionSequence,
    responses: Vec<MmsPdu>,
) -> (Vec<MmsPdu>, Result<(), ConnectorError>) {
    let mut requests = Vec::new();
    let mut responses = responses.into_iter();
    let mut buf = Vec::new();

    while !sequence.is_done() {
        if sequence.awaiting().is_some() {
            let response = responses.next().expect("mock IED script exhausted");

            for frame in split_frames(&mms_frames(&response, MAX_TPDU)) {
                buf.clear();
                if let Err(error) = sequence.step(&frame, &mut buf) {
                    return (requests, Err(error));
                }
            }
        } else {
            buf.clear();
            match sequence.step(&[], &mut buf) {
                Ok(written) => {
                    if written > 0 {
                        requests.extend(decode_mms_stream(&buf[..written]));
                    }
                }
                Err(error) => return (requests, Err(error)),
            }
        }
    }

    (requests, Ok(()))
}

fn write_response(invoke_id: u32, result: WriteResult) -> MmsPdu {
    MmsPdu::ConfirmedResponse(ConfirmedResponse {
        invoke_id,
        service: ConfirmedServiceResponse::Write(vec![result]),
    })
}

fn read_response(invoke_id: u32, rpt_ena: bool) -> MmsPdu {
    MmsPdu::ConfirmedResponse(ConfirmedResponse {
        invoke_id,
        service: ConfirmedServiceResponse::Read(vec![
            AccessResult::Success(MmsValue::Bool(rpt_ena)),                                  // RptEna
            AccessResult::Success(MmsValue::Bool(false)),                                    // Resv
            AccessResult::Success(MmsValue::VisibleString("VMC7_1LD0 LLN0$DSET1".to_owned())), // DatSet
            AccessResult::Success(MmsValue::Uint(2)),                                        // ConfRev
            AccessResult::Success(MmsValue::BitString(OptFlds::SEQUENCE_NUMBER.to_bit_string())), // OptFlds
            AccessResult::Success(MmsValue::BitString(TrgOps::DATA_CHANGE.to_bit_string())), // TrgOps
            AccessResult::Success(MmsValue::Uint(50)),                                       // BufTm
            AccessResult::Success(MmsValue::Uint(5000)),                                     // IntgPd
            AccessResult::Success(MmsValue::Bool(false)),                                    // GI
            AccessResult::Success(MmsValue::VisibleString("URCB01".to_owned())),             // RptID
        ]),
    })
}

/// Write requests as (item id, value) pairs.
fn writes_of(requests: &[MmsPdu]) -> Vec<(String, MmsValue)> {
    requests
        .iter()
        .filter_map(|pdu| match pdu {
            MmsPdu::ConfirmedRequest(request) => match &request.service {
                ConfirmedServiceRequest::Write(write) => {
                    let ObjectName::DomainSpecific { item_id, .. } = &write.variable else {
                        panic!("writes use domain-specific names");
                    };
                    Some((item_id.clone(), write.value.clone()))
                }
                _ => None,
            },
            _ => None,
        })
        .collect()
}

#[test]
fn enable_dance_runs_the_eight_steps_in_order() {
    let rcb = RcbReference::new("VMC7_1LD0", "LLN0$RP$urcb01");
    let config = Config::default();

    let mut sequence = RcbSubscriptionSequence::new(rcb, config.clone(), MAX_TPDU, InvokeSequencer::new());

    // RptEna reads true, so a disable write comes first; every write is
    // accepted.
    let mut responses = vec![read_response(0, true)];
    responses.extend((1..=8).map(|invoke_id| write_response(invoke_id, WriteResult::Success)));

    let (requests, outcome) = run_sequence(&mut sequence, responses);
    outcome.unwrap();

    // One read plus the eight writes.
    assert_eq!(requests.len(), 9);
    assert!(matches!(
        &requests[0],
        MmsPdu::ConfirmedRequest(request) if matches!(request.service, ConfirmedServiceRequest::Read(_))
    ));

    let writes = writes_of(&requests);
    let items: Vec<&str> = writes.iter().map(|(item, _)| item.as_str()).collect();

    assert_eq!(
        items,
        [
            "LLN0$RP$urcb01$RptEna",
            "LLN0$RP$urcb01$Resv",
            "LLN0$RP$urcb01$OptFlds",
            "LLN0$RP$urcb01$TrgOps",
            "LLN0$RP$urcb01$BufTm",
            "LLN0$RP$urcb01$IntgPd",
            "LLN0$RP$urcb01$GI",
            "LLN0$RP$urcb01$RptEna",
        ]
    );

    // Disabled first, enabled last.
    assert_eq!(writes[0].1, MmsValue::Bool(false));
    assert_eq!(writes[7].1, MmsValue::Bool(true));

    // Converges to the configured OptFlds/TrgOps regardless of what the
    // block held before.
    assert_eq!(writes[2].1, MmsValue::BitString(config.opt_flds.to_bit_string()));
    assert_eq!(writes[3].1, MmsValue::BitString(config.trg_ops.to_bit_string()));

    // BufTm forced to zero, integrity period from the configuration,
    // and an immediate general interrogation.
    assert_eq!(writes[4].1, MmsValue::Uint(0));
    assert_eq!(writes[5].1, MmsValue::Uint(u64::from(config.integrity_period_ms)));
    assert_eq!(writes[6].1, MmsValue::Bool(true));

    let result = sequence.into_result();
    assert_eq!(result.rpt_id, "URCB01");
    assert_eq!(result.dataset_ref.as_deref(), Some("VMC7_1LD0/LLN0$DSET1"));
    assert_eq!(result.conf_rev, Some(2));
}

#[test]
fn access_denied_on_reserve_skips_the_enable() {
    let rcb = RcbReference::new("VMC7_1LD0", "LLN0$RP$urcb01");

    let mut sequence = RcbSubscriptionSequence::new(rcb, Config::default(), MAX_TPDU, InvokeSequencer::new());

    // RptEna reads false: no disable, the reserve write is invoke 1 and
    // the server denies it.
    let responses = vec![
        read_response(0, false),
        write_response(1, WriteResult::Failure(DataAccessError::OBJECT_ACCESS_DENIED)),
    ];

    let (requests, outcome) = run_sequence(&mut sequence, responses);
    let error = outcome.unwrap_err();

    assert!(matches!(
        error.kind(),
        ConnectorErrorKind::RcbEnableFailed {
            step: RcbEnableStep::Reserve
        }
    ));

    // No RptEna := true ever goes out for this block.
    let writes = writes_of(&requests);
    assert!(!writes
        .iter()
        .any(|(item, value)| item.ends_with("$RptEna") && *value == MmsValue::Bool(true)));
}

#[test]
fn disabled_urcb_skips_the_disable_write() {
    let rcb = RcbReference::new("VMC7_1LD0", "LLN0$RP$urcb01");

    let mut sequence = RcbSubscriptionSequence::new(rcb, Config::default(), MAX_TPDU, InvokeSequencer::new());

    let mut responses = vec![read_response(0, false)];
    responses.extend((1..=7).map(|invoke_id| write_response(invoke_id, WriteResult::Success)));

    let (requests, outcome) = run_sequence(&mut sequence, responses);
    outcome.unwrap();

    // Read plus seven writes: no disable needed.
    assert_eq!(requests.len(), 8);

    let writes = writes_of(&requests);
    assert_eq!(writes[0].0, "LLN0$RP$urcb01$Resv");
}

#[test]
fn brcb_reserves_with_resv_tms() {
    let rcb = RcbReference::new("VMC7_1LD0", "LLN0$BR$brcb01");
    let config = Config::default();

    let mut sequence = RcbSubscriptionSequence::new(rcb, config.clone(), MAX_TPDU, InvokeSequencer::new());

    let mut responses = vec![read_response(0, false)];
    responses.extend((1..=7).map(|invoke_id| write_response(invoke_id, WriteResult::Success)));

    let (requests, outcome) = run_sequence(&mut sequence, responses);
    outcome.unwrap();

    let writes = writes_of(&requests);
    assert_eq!(writes[0].0, "LLN0$BR$brcb01$ResvTms");
    assert_eq!(writes[0].1, MmsValue::Int(i64::from(config.reservation_time_s)));
}

#[test]
fn stray_report_during_the_dance_is_discarded() {
    use ironmms_pdu::mms::InformationReport;

    let rcb = RcbReference::new("VMC7_1LD0", "LLN0$RP$urcb01");

    let mut sequence = RcbSubscriptionSequence::new(rcb, Config::default(), MAX_TPDU, InvokeSequencer::new());

    let stray = MmsPdu::InformationReport(InformationReport::new(vec![AccessResult::Success(
        MmsValue::VisibleString("URCB01".to_owned()),
    )]));

    // The stray report arrives before the read response; the sequence
    // keeps waiting and completes normally.
    let mut responses = vec![stray, read_response(0, false)];
    responses.extend((1..=7).map(|invoke_id| write_response(invoke_id, WriteResult::Success)));

    let (requests, outcome) = run_sequence(&mut sequence, responses);
    outcome.unwrap();
    assert_eq!(requests.len(), 8);
}
