use expect_test::expect;
use ironmms_core::{from_octets, to_octets, WireEncode as _};
use ironmms_pdu::mms::{
    AccessResult, ConfirmedError, ConfirmedRequest, ConfirmedResponse, ConfirmedServiceRequest,
    ConfirmedServiceResponse, DataAccessError, IdentifyResponse, InformationReport, InitiateRequest, InitiateResponse,
    MmsPdu, MmsValue, ObjectName, ServiceError, WriteResult,
};
use ironmms_testsuite::decode_exact;

fn round_trip(pdu: &MmsPdu) -> MmsPdu {
    let buf = to_octets(pdu).unwrap();
    assert_eq!(buf.len(), pdu.encoded_len());
    decode_exact(&buf)
}

#[test]
fn initiate_request_wire_prefix() {
    let pdu = MmsPdu::InitiateRequest(InitiateRequest::default());
    let buf = to_octets(&pdu).unwrap();

    // initiate-RequestPDU [8], then localDetailCalling [0] = 65000
    assert_eq!(buf[0], 0xA8);
    assert_eq!(&buf[2..7], hex::decode("800300fde8").unwrap().as_slice());

    assert_eq!(round_trip(&pdu), pdu);
}

#[test]
fn initiate_response_round_trips() {
    let pdu = MmsPdu::InitiateResponse(InitiateResponse {
        local_detail_called: 32000,
        max_serv_outstanding_calling: 5,
        max_serv_outstanding_called: 5,
        data_structure_nesting_level: 7,
        version_number: 1,
        ..InitiateResponse::default()
    });

    assert_eq!(round_trip(&pdu), pdu);
}

#[test]
fn read_request_names_the_rcb_attributes() {
    let pdu = MmsPdu::ConfirmedRequest(ConfirmedRequest::read(
        7,
        vec![
            ObjectName::domain_specific("VMC7_1LD0", "LLN0$BR$CB01$RptEna"),
            ObjectName::domain_specific("VMC7_1LD0", "LLN0$BR$CB01$DatSet"),
        ],
    ));

    let decoded = round_trip(&pdu);

    let MmsPdu::ConfirmedRequest(request) = decoded else {
        panic!("expected a confirmed request");
    };
    assert_eq!(request.invoke_id, 7);

    let ConfirmedServiceRequest::Read(read) = request.service else {
        panic!("expected a read");
    };
    assert_eq!(read.variables.len(), 2);
    assert_eq!(read.variables[0].to_string(), "VMC7_1LD0/LLN0$BR$CB01$RptEna");
}

#[test]
fn write_request_round_trips_every_data_variant() {
    let values = [
        MmsValue::Bool(true),
        MmsValue::Int(-5),
        MmsValue::Uint(60),
        MmsValue::Float(0.5),
        MmsValue::BitString(ironmms_pdu::rcb::OptFlds::subscription_default().to_bit_string()),
        MmsValue::OctetString(vec![1, 2, 3]),
        MmsValue::VisibleString("REPORT_A".to_owned()),
    ];

    for value in values {
        let pdu = MmsPdu::ConfirmedRequest(ConfirmedRequest::write(
            1,
            ObjectName::domain_specific("D", "LLN0$RP$CB$OptFlds"),
            value,
        ));

        assert_eq!(round_trip(&pdu), pdu);
    }
}

#[test]
fn write_response_success_and_failure() {
    let pdu = MmsPdu::ConfirmedResponse(ConfirmedResponse {
        invoke_id: 3,
        service: ConfirmedServiceResponse::Write(vec![
            WriteResult::Success,
            WriteResult::Failure(DataAccessError::OBJECT_ACCESS_DENIED),
        ]),
    });

    assert_eq!(round_trip(&pdu), pdu);
}

#[test]
fn read_response_carries_access_results() {
    let pdu = MmsPdu::ConfirmedResponse(ConfirmedResponse {
        invoke_id: 9,
        service: ConfirmedServiceResponse::Read(vec![
            AccessResult::Success(MmsValue::Bool(false)),
            AccessResult::Failure(DataAccessError::OBJECT_NON_EXISTENT),
            AccessResult::Success(MmsValue::Uint(2)),
        ]),
    });

    assert_eq!(round_trip(&pdu), pdu);
}

#[test]
fn identify_exchange_round_trips() {
    let request = MmsPdu::ConfirmedRequest(ConfirmedRequest::identify(0xFFFF));
    assert_eq!(round_trip(&request), request);

    let response = MmsPdu::ConfirmedResponse(ConfirmedResponse {
        invoke_id: 0xFFFF,
        service: ConfirmedServiceResponse::Identify(IdentifyResponse {
            vendor_name: "Devolutions".to_owned(),
            model_name: "IronMMS".to_owned(),
            revision: "0.1".to_owned(),
        }),
    });
    assert_eq!(round_trip(&response), response);
}

#[test]
fn confirmed_error_round_trips() {
    let pdu = MmsPdu::ConfirmedError(ConfirmedError {
        invoke_id: 12,
        service_error: ServiceError {
            class: ServiceError::CLASS_ACCESS,
            code: 3,
        },
    });

    assert_eq!(round_trip(&pdu), pdu);
}

#[test]
fn information_report_round_trips() {
    let pdu = MmsPdu::InformationReport(InformationReport::new(vec![
        AccessResult::Success(MmsValue::VisibleString("RPT01".to_owned())),
        AccessResult::Success(MmsValue::Uint(1)),
        AccessResult::Success(MmsValue::Structure(vec![MmsValue::Int(4), MmsValue::Float(4.5)])),
    ]));

    assert_eq!(round_trip(&pdu), pdu);
}

#[test]
fn unknown_pdu_tag_is_rejected() {
    // [5] constructed is a cancel-RequestPDU, which this client does not speak
    let e = from_octets::<MmsPdu>(&[0xA5, 0x03, 0x02, 0x01, 0x01]).err().unwrap();

    expect![[r#"
        Error {
            context: "MmsPdu",
            kind: UnknownTag {
                tag: 5,
            },
            cause: None,
        }
    "#]]
    .assert_debug_eq(&e);
}
