use ironmms_core::from_octets;
use ironmms_pdu::cotp::{
    segment_user_data, ConnectionConfirm, ConnectionRequest, CotpParameters, DataTransfer, Reassembler, Tpdu,
};
use ironmms_testsuite::{cotp_frame, dt_of_frame, split_frames};

#[test]
fn connection_request_wire_form() {
    let cr = ConnectionRequest {
        src_ref: 0x0001,
        parameters: CotpParameters::default(),
    };

    let buf = cotp_frame(&cr);

    assert_eq!(
        buf,
        [
            0x03, 0x00, 0x00, 0x16, // TPKT, length 22
            0x11, 0xE0, // LI 17, CR
            0x00, 0x00, // DST-REF, unassigned
            0x00, 0x01, // SRC-REF
            0x00, // class 0
            0xC0, 0x01, 0x0B, // TPDU size 2048
            0xC1, 0x02, 0x00, 0x01, // calling TSAP
            0xC2, 0x02, 0x00, 0x01, // called TSAP
        ]
    );
}

#[test]
fn connection_confirm_extracts_peer_reference() {
    let cc = ConnectionConfirm {
        dst_ref: 0x0001,
        src_ref: 0xCAFE,
        parameters: CotpParameters {
            tpdu_size_exp: 0x0A, // 1024
            ..CotpParameters::default()
        },
    };

    let buf = cotp_frame(&cc);
    let decoded: Tpdu = from_octets(&buf).unwrap();

    let Tpdu::ConnectionConfirm(confirm) = decoded else {
        panic!("expected CC");
    };

    assert_eq!(confirm.src_ref, 0xCAFE);
    assert_eq!(confirm.dst_ref, 0x0001);
    assert_eq!(confirm.parameters.max_tpdu_size(), 1024);
}

#[test]
fn segmented_user_data_reassembles() {
    let user_data: Vec<u8> = (0..6000u32).map(|i| u8::try_from(i % 251).unwrap()).collect();

    let fragments = segment_user_data(&user_data, 2048);
    assert!(fragments.len() > 1);

    let stream: Vec<u8> = fragments.iter().flat_map(|f| cotp_frame(f)).collect();

    let mut reassembler = Reassembler::new();
    let mut output = None;

    for frame in split_frames(&stream) {
        let data = dt_of_frame(&frame);
        if let Some(done) = reassembler.feed(data) {
            assert!(output.is_none(), "only the EOT fragment completes the TSDU");
            output = Some(done);
        }
    }

    assert_eq!(output.as_deref(), Some(user_data.as_slice()));
}

#[test]
fn empty_user_data_is_a_single_eot_fragment() {
    let fragments = segment_user_data(&[], 2048);

    assert_eq!(
        fragments,
        [DataTransfer {
            eot: true,
            user_data: Vec::new(),
        }]
    );
}
