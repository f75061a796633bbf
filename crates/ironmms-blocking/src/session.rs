use std::io::{self, Read, Write};

use ironmms_connector::{encode_mms_packet, ConnectionResult, InvokeSequencer};
use ironmms_core::from_octets;
use ironmms_pdu::cotp::{Reassembler, Tpdu};
use ironmms_pdu::mms::{ConfirmedRequest, MmsPdu};
use ironmms_pdu::TPKT_HINT;
use ironmms_session::{protocol_err, transport_err, wire_err, ReportProcessor, SessionEvent, SessionResult};

use crate::framed::Framed;

/// The receive loop of an established, subscribed session.
///
/// Single-threaded by design: the socket read is the only blocking
/// point. A read timeout surfaces as an idle tick; when keep-alive is
/// enabled an MMS identify request goes out on each tick.
pub struct ActiveSession<S> {
    framed: Framed<S>,
    processor: ReportProcessor,
    reassembler: Reassembler,
    max_tpdu_size: usize,
    invokes: InvokeSequencer,
    keep_alive: bool,
    write_buf: Vec<u8>,
}

impl<S> ActiveSession<S>
where
    S: Read + Write,
{
    pub fn new(
        framed: Framed<S>,
        processor: ReportProcessor,
        connection: &ConnectionResult,
        invokes: InvokeSequencer,
        keep_alive: bool,
    ) -> Self {
        Self {
            framed,
            processor,
            reassembler: Reassembler::new(),
            max_tpdu_size: connection.max_tpdu_size,
            invokes,
            keep_alive,
            write_buf: Vec::new(),
        }
    }

    pub fn processor_mut(&mut self) -> &mut ReportProcessor {
        &mut self.processor
    }

    /// Blocks until the next session event.
    ///
    /// Reports are delivered in receive order. Transport loss and fatal
    /// decode errors terminate the loop with an error; the caller closes
    /// the socket, which also releases server-side URCB reservations.
    pub fn next_event(&mut self) -> SessionResult<SessionEvent> {
        loop {
            let frame = match self.framed.read_by_hint(&TPKT_HINT) {
                Ok(frame) => frame,
                Err(error) if is_idle_timeout(&error) => {
                    trace!("Idle read timeout");
                    self.handle_idle()?;
                    continue;
                }
                Err(error) => {
                    return Err(transport_err("receive loop", error));
                }
            };

            let tpdu: Tpdu = from_octets(&frame).map_err(wire_err)?;

            let data = match tpdu {
                Tpdu::Data(data) => data,
                Tpdu::DisconnectRequest(dr) => {
                    warn!(reason = dr.reason, "Peer disconnect");
                    return Err(protocol_err("receive loop", "peer disconnect"));
                }
                Tpdu::ConnectionConfirm(_) => {
                    return Err(protocol_err("receive loop", "unexpected connection confirm"));
                }
            };

            let Some(user_data) = self.reassembler.feed(data) else {
                continue;
            };

            let pdu: MmsPdu = match from_octets(&user_data) {
                Ok(pdu) => pdu,
                // An undecodable unconfirmed PDU (e.g. an unconfirmed
                // service this client does not speak) is dropped with a
                // warning; anything else is fatal.
                Err(error) if matches!(user_data.first(), Some(&(0xA3 | 0x63))) => {
                    warn!(error = %error.verbose(), "Discarding undecodable unconfirmed PDU");
                    continue;
                }
                Err(error) => return Err(wire_err(error)),
            };

            match self.processor.process_pdu(&pdu)? {
                SessionEvent::Discarded => continue,
                event => return Ok(event),
            }
        }
    }

    fn handle_idle(&mut self) -> SessionResult<()> {
        if !self.keep_alive {
            return Ok(());
        }

        let invoke_id = self.invokes.next_invoke_id();

        debug!(invoke_id, "Sending identify keep-alive");

        self.write_buf.clear();
        let request = MmsPdu::ConfirmedRequest(ConfirmedRequest::identify(invoke_id));
        encode_mms_packet(&request, self.max_tpdu_size, &mut self.write_buf)
            .map_err(|e| transport_err("keep-alive", e))?;

        self.framed
            .write_all(&self.write_buf)
            .map_err(|e| transport_err("keep-alive", e))
    }
}

fn is_idle_timeout(error: &io::Error) -> bool {
    matches!(error.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
