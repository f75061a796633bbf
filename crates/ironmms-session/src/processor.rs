use std::collections::HashMap;

use ironmms_pdu::mms::{ConfirmedServiceResponse, IdentifyResponse, MmsPdu};
use ironmms_pdu::rcb::OptFlds;

use crate::{LabelMap, MmsReport, ReportDecoder, SessionResult};

/// What the receive loop should do with a processed PDU.
#[derive(Debug)]
pub enum SessionEvent {
    /// A decoded report, ready for the sink.
    Report(MmsReport),
    /// The server answered the keep-alive probe.
    KeepAlive(IdentifyResponse),
    /// A confirmed response nobody is waiting for anymore.
    Discarded,
}

/// Per-subscription decode hints.
#[derive(Debug, Clone)]
struct SubscriptionHint {
    opt_flds: OptFlds,
    dataset_ref: Option<String>,
}

/// Turns incoming PDUs into session events.
///
/// Owns the read-only dataset label registry and the per-RptID OptFlds
/// hints collected during subscription.
#[derive(Debug, Default)]
pub struct ReportProcessor {
    labels: LabelMap,
    hints: HashMap<String, SubscriptionHint>,
}

impl ReportProcessor {
    pub fn new(labels: LabelMap) -> Self {
        Self {
            labels,
            hints: HashMap::new(),
        }
    }

    /// Registers the decode hints of one enabled RCB, keyed by RptID.
    pub fn register_subscription(&mut self, rpt_id: impl Into<String>, opt_flds: OptFlds, dataset_ref: Option<String>) {
        self.hints.insert(
            rpt_id.into(),
            SubscriptionHint {
                opt_flds,
                dataset_ref,
            },
        );
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Processes one reassembled MMS PDU from the receive loop.
    pub fn process_pdu(&self, pdu: &MmsPdu) -> SessionResult<SessionEvent> {
        match pdu {
            MmsPdu::InformationReport(report) => {
                let decoder = ReportDecoder::new(report);

                // Peek the RptID to find the hints before decoding.
                let rpt_id = report
                    .access_results
                    .first()
                    .and_then(|result| result.success())
                    .and_then(|value| value.as_visible_string());

                let hint = rpt_id.and_then(|id| self.hints.get(id));
                let opt_flds = hint.map_or_else(OptFlds::subscription_default, |hint| hint.opt_flds);

                // A report this client cannot make sense of is dropped;
                // only transport and session-level faults are fatal.
                let mut decoded = match decoder.decode(opt_flds, None) {
                    Ok(decoded) => decoded,
                    Err(error) => {
                        warn!(error = %error.verbose(), "Rejecting malformed report");
                        return Ok(SessionEvent::Discarded);
                    }
                };

                // The report-carried dataset name wins; otherwise use
                // what the RCB advertised at subscription time.
                if decoded.dataset_ref.is_none() {
                    decoded.dataset_ref = hint.and_then(|hint| hint.dataset_ref.clone());
                }

                if let Some(labels) = decoded
                    .dataset_ref
                    .as_deref()
                    .and_then(|dataset_ref| self.labels.labels_for(dataset_ref))
                {
                    for entry in &mut decoded.entries {
                        entry.label = labels.get(entry.index).cloned();
                    }
                }

                if decoded.decode_mismatch {
                    warn!(rpt_id = %decoded.rpt_id, "Report decoded with mismatching member count");
                }

                Ok(SessionEvent::Report(decoded))
            }
            MmsPdu::ConfirmedResponse(response) => match &response.service {
                ConfirmedServiceResponse::Identify(identity) => Ok(SessionEvent::KeepAlive(identity.clone())),
                _ => {
                    debug!(invoke_id = response.invoke_id, "Discarding unsolicited confirmed response");
                    Ok(SessionEvent::Discarded)
                }
            },
            other => {
                debug!(?other, "Discarding unexpected PDU");
                Ok(SessionEvent::Discarded)
            }
        }
    }
}
