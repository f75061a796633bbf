use core::mem;

use ironmms_core::{append_octets, from_octets};
use ironmms_pdu::cotp::{ConnectionRequest, Cotp, Reassembler, Tpdu};
use ironmms_pdu::mms::{InitiateRequest, InitiateResponse, MmsPdu};
use ironmms_pdu::{PduHint, TPKT_HINT};

use crate::{
    encode_mms_packet, unexpected_err, wire_err, Config, ConnectorError, ConnectorErrorKind, ConnectorResult, Sequence,
};

/// Negotiated session parameters handed to the subscription and receive
/// stages once the initiate exchange completes.
#[derive(Debug, Clone)]
pub struct ConnectionResult {
    /// Our COTP source reference.
    pub src_ref: u16,
    /// The peer's reference.
    pub dst_ref: u16,
    /// Negotiated maximum TPDU size; DT segmentation boundary.
    pub max_tpdu_size: usize,
    /// Server-negotiated initiate parameters.
    pub negotiated: InitiateResponse,
}

#[derive(Default, Debug)]
#[non_exhaustive]
pub enum ClientConnectorState {
    #[default]
    Consumed,

    CotpConnectionSendRequest,
    CotpConnectionWaitConfirm,
    MmsInitiateSendRequest,
    MmsInitiateWaitResponse,
    Connected {
        result: ConnectionResult,
    },
}

impl ClientConnectorState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Consumed => "Consumed",
            Self::CotpConnectionSendRequest => "CotpConnectionSendRequest",
            Self::CotpConnectionWaitConfirm => "CotpConnectionWaitConfirm",
            Self::MmsInitiateSendRequest => "MmsInitiateSendRequest",
            Self::MmsInitiateWaitResponse => "MmsInitiateWaitResponse",
            Self::Connected { .. } => "Connected",
        }
    }
}

/// Drives the connection sequence: COTP CR/CC, then the MMS initiate
/// exchange.
///
/// ```diagram
/// SendRequest ──CR──▶ WaitConfirm ──CC──▶ SendInitiate ──initiate-RQ──▶ WaitResponse ──▶ Connected
/// ```
#[derive(Debug)]
pub struct ClientConnector {
    pub config: Config,
    pub state: ClientConnectorState,
    src_ref: u16,
    dst_ref: u16,
    max_tpdu_size: usize,
    reassembler: Reassembler,
}

impl ClientConnector {
    pub fn new(config: Config) -> Self {
        // Zero is reserved for "unassigned" in CR TPDUs.
        let src_ref = rand::random::<u16>().max(1);
        Self::with_src_ref(config, src_ref)
    }

    /// Deterministic source reference; used by tests.
    pub fn with_src_ref(config: Config, src_ref: u16) -> Self {
        let max_tpdu_size = config.cotp.max_tpdu_size();

        Self {
            config,
            state: ClientConnectorState::CotpConnectionSendRequest,
            src_ref,
            dst_ref: 0,
            max_tpdu_size,
            reassembler: Reassembler::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ClientConnectorState::Connected { .. })
    }

    /// Consumes the terminal state.
    ///
    /// # Panics
    ///
    /// Panics if the sequence is not in the `Connected` state.
    pub fn into_connection_result(mut self) -> ConnectionResult {
        match mem::take(&mut self.state) {
            ClientConnectorState::Connected { result } => result,
            _ => panic!("connector sequence is not connected"),
        }
    }
}

impl Sequence for ClientConnector {
    fn awaiting(&self) -> Option<&dyn PduHint> {
        match &self.state {
            ClientConnectorState::CotpConnectionWaitConfirm | ClientConnectorState::MmsInitiateWaitResponse => {
                Some(&TPKT_HINT)
            }
            _ => None,
        }
    }

    fn state_name(&self) -> &'static str {
        self.state.name()
    }

    fn step(&mut self, input: &[u8], output: &mut Vec<u8>) -> ConnectorResult<usize> {
        let (written, next_state) = match mem::take(&mut self.state) {
            // Invalid state
            ClientConnectorState::Consumed => {
                return Err(unexpected_err("connector", "stepped after the terminal state was taken out"))
            }

            //== COTP connection establishment ==//
            ClientConnectorState::CotpConnectionSendRequest => {
                debug!(src_ref = self.src_ref, "COTP connection");

                let connection_request = ConnectionRequest {
                    src_ref: self.src_ref,
                    parameters: self.config.cotp.clone(),
                };

                let written = append_octets(&Cotp(connection_request), output).map_err(wire_err)?;

                (written, ClientConnectorState::CotpConnectionWaitConfirm)
            }
            ClientConnectorState::CotpConnectionWaitConfirm => {
                let tpdu: Tpdu = from_octets(input).map_err(wire_err)?;

                let confirm = match tpdu {
                    Tpdu::ConnectionConfirm(confirm) => confirm,
                    Tpdu::DisconnectRequest(dr) => {
                        return Err(ConnectorError::new(
                            "COTP connection",
                            ConnectorErrorKind::CotpRefused { reason: dr.reason },
                        ));
                    }
                    Tpdu::Data(_) => {
                        return Err(unexpected_err("COTP connection", "data TPDU before connection confirm"));
                    }
                };

                self.dst_ref = confirm.src_ref;
                self.max_tpdu_size = self.max_tpdu_size.min(confirm.parameters.max_tpdu_size());

                debug!(
                    dst_ref = self.dst_ref,
                    max_tpdu_size = self.max_tpdu_size,
                    "COTP connection confirmed"
                );

                (0, ClientConnectorState::MmsInitiateSendRequest)
            }

            //== MMS initiate exchange ==//
            ClientConnectorState::MmsInitiateSendRequest => {
                let initiate = InitiateRequest {
                    local_detail_calling: self.config.local_detail,
                    ..InitiateRequest::default()
                };

                debug!(message = ?initiate, "Send");

                let written = encode_mms_packet(&MmsPdu::InitiateRequest(initiate), self.max_tpdu_size, output)?;

                (written, ClientConnectorState::MmsInitiateWaitResponse)
            }
            ClientConnectorState::MmsInitiateWaitResponse => {
                let tpdu: Tpdu = from_octets(input).map_err(wire_err)?;

                let data = match tpdu {
                    Tpdu::Data(data) => data,
                    Tpdu::DisconnectRequest(dr) => {
                        return Err(ConnectorError::new(
                            "MMS initiate",
                            ConnectorErrorKind::PeerDisconnect { reason: dr.reason },
                        ));
                    }
                    Tpdu::ConnectionConfirm(_) => {
                        return Err(unexpected_err("MMS initiate", "unexpected connection confirm"));
                    }
                };

                let Some(user_data) = self.reassembler.feed(data) else {
                    // More DT fragments to come.
                    self.state = ClientConnectorState::MmsInitiateWaitResponse;
                    return Ok(0);
                };

                let pdu: MmsPdu = from_octets(&user_data).map_err(wire_err)?;

                let negotiated = match pdu {
                    MmsPdu::InitiateResponse(response) => response,
                    MmsPdu::ConfirmedError(error) => {
                        return Err(ConnectorError::new(
                            "MMS initiate",
                            ConnectorErrorKind::MmsService(error.service_error),
                        ));
                    }
                    other => {
                        return Err(unexpected_err("MMS initiate", format!("unexpected PDU: {other:?}")));
                    }
                };

                info!(version = negotiated.version_number, "MMS session initiated");

                let result = ConnectionResult {
                    src_ref: self.src_ref,
                    dst_ref: self.dst_ref,
                    max_tpdu_size: self.max_tpdu_size,
                    negotiated,
                };

                (0, ClientConnectorState::Connected { result })
            }

            //== Terminal ==//
            ClientConnectorState::Connected { .. } => {
                return Err(unexpected_err("connector", "sequence is already done"));
            }
        };

        self.state = next_state;

        Ok(written)
    }
}
