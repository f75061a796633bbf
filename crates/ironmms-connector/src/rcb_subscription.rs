use core::fmt;

use ironmms_core::from_octets;
use ironmms_pdu::cotp::{Reassembler, Tpdu};
use ironmms_pdu::mms::{
    AccessResult, ConfirmedRequest, ConfirmedResponse, ConfirmedServiceResponse, DataAccessError, MmsPdu, MmsValue,
    WriteResult,
};
use ironmms_pdu::rcb::{OptFlds, RcbAttribute, RcbReference, RcbType, TrgOps};
use ironmms_pdu::{PduHint, TPKT_HINT};

use crate::{
    encode_mms_packet, unexpected_err, wire_err, Config, ConnectorError, ConnectorErrorKind, ConnectorResult,
    InvokeSequencer, Sequence,
};

/// One of the setup operations of the enable dance; carried by
/// enable-failure errors so the operator knows where the server balked.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RcbEnableStep {
    ReadAttributes,
    Disable,
    Reserve,
    OptFlds,
    TrgOps,
    BufTm,
    IntgPd,
    Gi,
    Enable,
}

impl fmt::Display for RcbEnableStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadAttributes => "read-attributes",
            Self::Disable => "disable",
            Self::Reserve => "reserve",
            Self::OptFlds => "opt-flds",
            Self::TrgOps => "trg-ops",
            Self::BufTm => "buf-tm",
            Self::IntgPd => "intg-pd",
            Self::Gi => "gi",
            Self::Enable => "enable",
        };
        write!(f, "{name}")
    }
}

/// Attribute values read from the block before reconfiguration.
#[derive(Clone, Debug, Default)]
pub struct RcbSnapshot {
    pub rpt_id: Option<String>,
    pub rpt_ena: bool,
    pub dat_set: Option<String>,
    pub conf_rev: Option<u64>,
    pub opt_flds: Option<OptFlds>,
    pub trg_ops: Option<TrgOps>,
    pub buf_tm: Option<u64>,
    pub intg_pd: Option<u64>,
}

/// Outcome of a successful subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionResult {
    pub rcb: RcbReference,
    /// Effective RptID: the configured one, falling back to the block
    /// reference.
    pub rpt_id: String,
    /// Dataset reference in `/`-separated textual form.
    pub dataset_ref: Option<String>,
    pub conf_rev: Option<u64>,
    /// OptFlds as configured; the receive stage uses it as the decode
    /// hint for reports that do not embed their own.
    pub opt_flds: OptFlds,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RcbSubscriptionState {
    SendRead,
    WaitRead,
    SendDisable,
    WaitDisable,
    SendReserve,
    WaitReserve,
    SendOptFlds,
    WaitOptFlds,
    SendTrgOps,
    WaitTrgOps,
    SendBufTm,
    WaitBufTm,
    SendIntgPd,
    WaitIntgPd,
    SendGi,
    WaitGi,
    SendEnable,
    WaitEnable,
    Done,
}

impl RcbSubscriptionState {
    pub fn name(self) -> &'static str {
        match self {
            Self::SendRead => "SendRead",
            Self::WaitRead => "WaitRead",
            Self::SendDisable => "SendDisable",
            Self::WaitDisable => "WaitDisable",
            Self::SendReserve => "SendReserve",
            Self::WaitReserve => "WaitReserve",
            Self::SendOptFlds => "SendOptFlds",
            Self::WaitOptFlds => "WaitOptFlds",
            Self::SendTrgOps => "SendTrgOps",
            Self::WaitTrgOps => "WaitTrgOps",
            Self::SendBufTm => "SendBufTm",
            Self::WaitBufTm => "WaitBufTm",
            Self::SendIntgPd => "SendIntgPd",
            Self::WaitIntgPd => "WaitIntgPd",
            Self::SendGi => "SendGi",
            Self::WaitGi => "WaitGi",
            Self::SendEnable => "SendEnable",
            Self::WaitEnable => "WaitEnable",
            Self::Done => "Done",
        }
    }
}

/// Drives the enable dance for one report control block:
///
/// 1. read the block attributes
/// 2. write `RptEna := false` when the block is currently enabled
/// 3. reserve (`Resv := true` for URCBs, `ResvTms` for BRCBs)
/// 4. write OptFlds
/// 5. write TrgOps
/// 6. write `BufTm := 0`, then the integrity period
/// 7. write `GI := true` for an immediate full snapshot
/// 8. write `RptEna := true`
///
/// All writes for one block complete before the next block starts, so
/// server-side resource allocation stays deterministic. A failed step
/// surfaces as `RcbEnableFailed`; the caller skips the block and carries
/// on with the rest.
pub struct RcbSubscriptionSequence {
    rcb: RcbReference,
    config: Config,
    max_tpdu_size: usize,
    invokes: InvokeSequencer,
    pending_invoke: u32,
    reassembler: Reassembler,
    snapshot: RcbSnapshot,
    state: RcbSubscriptionState,
}

impl RcbSubscriptionSequence {
    pub fn new(rcb: RcbReference, config: Config, max_tpdu_size: usize, invokes: InvokeSequencer) -> Self {
        Self {
            rcb,
            config,
            max_tpdu_size,
            invokes,
            pending_invoke: 0,
            reassembler: Reassembler::new(),
            snapshot: RcbSnapshot::default(),
            state: RcbSubscriptionState::SendRead,
        }
    }

    /// The invoke allocator in its current position; thread it into the
    /// next sequence whether this one succeeded or not.
    pub fn invokes(&self) -> InvokeSequencer {
        self.invokes
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, RcbSubscriptionState::Done)
    }

    pub fn snapshot(&self) -> &RcbSnapshot {
        &self.snapshot
    }

    /// Result of a completed sequence.
    ///
    /// # Panics
    ///
    /// Panics if the sequence did not reach `Done`.
    pub fn into_result(self) -> SubscriptionResult {
        assert!(self.is_done(), "subscription sequence is not done");

        let rpt_id = self
            .snapshot
            .rpt_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.rcb.to_string());

        let dataset_ref = self.snapshot.dat_set.as_deref().map(normalize_dataset_ref);

        SubscriptionResult {
            rpt_id,
            dataset_ref,
            conf_rev: self.snapshot.conf_rev,
            opt_flds: self.config.opt_flds,
            rcb: self.rcb,
        }
    }

    fn read_attributes(&self) -> Vec<RcbAttribute> {
        let reserve = match self.rcb.rcb_type() {
            RcbType::Unbuffered => RcbAttribute::Resv,
            RcbType::Buffered => RcbAttribute::ResvTms,
        };

        vec![
            RcbAttribute::RptEna,
            reserve,
            RcbAttribute::DatSet,
            RcbAttribute::ConfRev,
            RcbAttribute::OptFlds,
            RcbAttribute::TrgOps,
            RcbAttribute::BufTm,
            RcbAttribute::IntgPd,
            RcbAttribute::Gi,
            RcbAttribute::RptId,
        ]
    }

    fn send_read(&mut self, output: &mut Vec<u8>) -> ConnectorResult<usize> {
        let variables = self
            .read_attributes()
            .into_iter()
            .map(|attribute| self.rcb.attribute(attribute))
            .collect();

        self.pending_invoke = self.invokes.next_invoke_id();
        let request = ConfirmedRequest::read(self.pending_invoke, variables);

        encode_mms_packet(&MmsPdu::ConfirmedRequest(request), self.max_tpdu_size, output)
    }

    fn send_write(&mut self, attribute: RcbAttribute, value: MmsValue, output: &mut Vec<u8>) -> ConnectorResult<usize> {
        self.pending_invoke = self.invokes.next_invoke_id();
        let request = ConfirmedRequest::write(self.pending_invoke, self.rcb.attribute(attribute), value);

        encode_mms_packet(&MmsPdu::ConfirmedRequest(request), self.max_tpdu_size, output)
    }

    /// Feeds one TPKT frame; returns the reassembled MMS PDU once
    /// complete, or `None` while fragments are pending.
    fn process_input(&mut self, input: &[u8]) -> ConnectorResult<Option<MmsPdu>> {
        let tpdu: Tpdu = from_octets(input).map_err(wire_err)?;

        let data = match tpdu {
            Tpdu::Data(data) => data,
            Tpdu::DisconnectRequest(dr) => {
                return Err(ConnectorError::new(
                    "RCB subscription",
                    ConnectorErrorKind::PeerDisconnect { reason: dr.reason },
                ));
            }
            Tpdu::ConnectionConfirm(_) => {
                return Err(unexpected_err("RCB subscription", "unexpected connection confirm"));
            }
        };

        let Some(user_data) = self.reassembler.feed(data) else {
            return Ok(None);
        };

        from_octets(&user_data).map(Some).map_err(wire_err)
    }

    /// Validates a confirmed response for the pending invoke.
    ///
    /// Returns `None` for unrelated traffic (stray reports, stale
    /// responses), which the caller discards without a state change.
    fn expect_response(&self, pdu: MmsPdu, step: RcbEnableStep) -> ConnectorResult<Option<ConfirmedResponse>> {
        match pdu {
            MmsPdu::ConfirmedResponse(response) if response.invoke_id == self.pending_invoke => Ok(Some(response)),
            MmsPdu::ConfirmedResponse(response) => {
                warn!(
                    invoke_id = response.invoke_id,
                    expected = self.pending_invoke,
                    "Discarding stale confirmed response"
                );
                Ok(None)
            }
            MmsPdu::InformationReport(_) => {
                debug!(rcb = %self.rcb, "Report received during subscription; discarding");
                Ok(None)
            }
            MmsPdu::ConfirmedError(error) if error.invoke_id == self.pending_invoke => {
                Err(enable_failed(&self.rcb, step, error.service_error))
            }
            other => Err(unexpected_err("RCB subscription", format!("unexpected PDU: {other:?}"))),
        }
    }

    /// Checks the single write result of a setup step.
    fn check_write(
        &self,
        response: &ConfirmedResponse,
        step: RcbEnableStep,
        tolerate_access_denied: bool,
    ) -> ConnectorResult<()> {
        let ConfirmedServiceResponse::Write(results) = &response.service else {
            return Err(unexpected_err(
                "RCB subscription",
                format!("expected a write response at {step}"),
            ));
        };

        match results.first() {
            Some(WriteResult::Success) => Ok(()),
            Some(WriteResult::Failure(error)) => {
                if tolerate_access_denied && *error == DataAccessError::OBJECT_ACCESS_DENIED {
                    // Another client owns the block state; it was not
                    // enabled by us, so reconfiguration proceeds.
                    warn!(rcb = %self.rcb, "Ignoring access denied while disabling a foreign URCB");
                    Ok(())
                } else {
                    Err(enable_failed(&self.rcb, step, *error))
                }
            }
            None => Err(unexpected_err(
                "RCB subscription",
                format!("empty write response at {step}"),
            )),
        }
    }

    fn apply_read_results(&mut self, results: &[AccessResult]) {
        for (attribute, result) in self.read_attributes().iter().zip(results) {
            let Some(value) = result.success() else {
                debug!(rcb = %self.rcb, attribute = attribute.name(), "Attribute read failed");
                continue;
            };

            match attribute {
                RcbAttribute::RptEna => self.snapshot.rpt_ena = value.as_bool().unwrap_or(false),
                RcbAttribute::DatSet => {
                    self.snapshot.dat_set = value.as_visible_string().map(str::to_owned);
                }
                RcbAttribute::ConfRev => self.snapshot.conf_rev = value.as_u64(),
                RcbAttribute::OptFlds => {
                    self.snapshot.opt_flds = value.as_bit_string().map(OptFlds::from_bit_string);
                }
                RcbAttribute::TrgOps => {
                    self.snapshot.trg_ops = value.as_bit_string().map(TrgOps::from_bit_string);
                }
                RcbAttribute::BufTm => self.snapshot.buf_tm = value.as_u64(),
                RcbAttribute::IntgPd => self.snapshot.intg_pd = value.as_u64(),
                RcbAttribute::RptId => {
                    self.snapshot.rpt_id = value.as_visible_string().map(str::to_owned);
                }
                _ => {}
            }
        }
    }
}

impl Sequence for RcbSubscriptionSequence {
    fn awaiting(&self) -> Option<&dyn PduHint> {
        use RcbSubscriptionState as S;

        match self.state {
            S::WaitRead
            | S::WaitDisable
            | S::WaitReserve
            | S::WaitOptFlds
            | S::WaitTrgOps
            | S::WaitBufTm
            | S::WaitIntgPd
            | S::WaitGi
            | S::WaitEnable => Some(&TPKT_HINT),
            _ => None,
        }
    }

    fn state_name(&self) -> &'static str {
        self.state.name()
    }

    fn step(&mut self, input: &[u8], output: &mut Vec<u8>) -> ConnectorResult<usize> {
        use RcbSubscriptionState as S;

        let is_urcb = self.rcb.rcb_type() == RcbType::Unbuffered;

        let (written, next_state) = match self.state {
            S::SendRead => {
                debug!(rcb = %self.rcb, "Reading RCB attributes");
                (self.send_read(output)?, S::WaitRead)
            }
            S::WaitRead => {
                let Some(pdu) = self.process_input(input)? else {
                    return Ok(0);
                };
                let Some(response) = self.expect_response(pdu, RcbEnableStep::ReadAttributes)? else {
                    return Ok(0);
                };

                let ConfirmedServiceResponse::Read(results) = &response.service else {
                    return Err(unexpected_err("RCB subscription", "expected a read response"));
                };

                self.apply_read_results(results);

                debug!(rcb = %self.rcb, snapshot = ?self.snapshot, "RCB attributes read");

                if self.snapshot.rpt_ena {
                    // The server refuses reconfiguration while enabled.
                    (0, S::SendDisable)
                } else {
                    (0, S::SendReserve)
                }
            }

            S::SendDisable => (
                self.send_write(RcbAttribute::RptEna, MmsValue::Bool(false), output)?,
                S::WaitDisable,
            ),
            S::WaitDisable => {
                let Some(pdu) = self.process_input(input)? else {
                    return Ok(0);
                };
                let Some(response) = self.expect_response(pdu, RcbEnableStep::Disable)? else {
                    return Ok(0);
                };

                self.check_write(&response, RcbEnableStep::Disable, is_urcb)?;
                (0, S::SendReserve)
            }

            S::SendReserve => {
                let (attribute, value) = match self.rcb.rcb_type() {
                    RcbType::Unbuffered => (RcbAttribute::Resv, MmsValue::Bool(true)),
                    RcbType::Buffered => (
                        RcbAttribute::ResvTms,
                        MmsValue::Int(i64::from(self.config.reservation_time_s)),
                    ),
                };

                (self.send_write(attribute, value, output)?, S::WaitReserve)
            }
            S::WaitReserve => {
                let Some(pdu) = self.process_input(input)? else {
                    return Ok(0);
                };
                let Some(response) = self.expect_response(pdu, RcbEnableStep::Reserve)? else {
                    return Ok(0);
                };

                self.check_write(&response, RcbEnableStep::Reserve, false)?;
                (0, S::SendOptFlds)
            }

            S::SendOptFlds => (
                self.send_write(
                    RcbAttribute::OptFlds,
                    MmsValue::BitString(self.config.opt_flds.to_bit_string()),
                    output,
                )?,
                S::WaitOptFlds,
            ),
            S::WaitOptFlds => {
                let Some(pdu) = self.process_input(input)? else {
                    return Ok(0);
                };
                let Some(response) = self.expect_response(pdu, RcbEnableStep::OptFlds)? else {
                    return Ok(0);
                };

                self.check_write(&response, RcbEnableStep::OptFlds, false)?;
                (0, S::SendTrgOps)
            }

            S::SendTrgOps => (
                self.send_write(
                    RcbAttribute::TrgOps,
                    MmsValue::BitString(self.config.trg_ops.to_bit_string()),
                    output,
                )?,
                S::WaitTrgOps,
            ),
            S::WaitTrgOps => {
                let Some(pdu) = self.process_input(input)? else {
                    return Ok(0);
                };
                let Some(response) = self.expect_response(pdu, RcbEnableStep::TrgOps)? else {
                    return Ok(0);
                };

                self.check_write(&response, RcbEnableStep::TrgOps, false)?;
                (0, S::SendBufTm)
            }

            S::SendBufTm => (
                self.send_write(RcbAttribute::BufTm, MmsValue::Uint(0), output)?,
                S::WaitBufTm,
            ),
            S::WaitBufTm => {
                let Some(pdu) = self.process_input(input)? else {
                    return Ok(0);
                };
                let Some(response) = self.expect_response(pdu, RcbEnableStep::BufTm)? else {
                    return Ok(0);
                };

                self.check_write(&response, RcbEnableStep::BufTm, false)?;
                (0, S::SendIntgPd)
            }

            S::SendIntgPd => (
                self.send_write(
                    RcbAttribute::IntgPd,
                    MmsValue::Uint(u64::from(self.config.integrity_period_ms)),
                    output,
                )?,
                S::WaitIntgPd,
            ),
            S::WaitIntgPd => {
                let Some(pdu) = self.process_input(input)? else {
                    return Ok(0);
                };
                let Some(response) = self.expect_response(pdu, RcbEnableStep::IntgPd)? else {
                    return Ok(0);
                };

                self.check_write(&response, RcbEnableStep::IntgPd, false)?;
                (0, S::SendGi)
            }

            S::SendGi => (
                self.send_write(RcbAttribute::Gi, MmsValue::Bool(true), output)?,
                S::WaitGi,
            ),
            S::WaitGi => {
                let Some(pdu) = self.process_input(input)? else {
                    return Ok(0);
                };
                let Some(response) = self.expect_response(pdu, RcbEnableStep::Gi)? else {
                    return Ok(0);
                };

                self.check_write(&response, RcbEnableStep::Gi, false)?;
                (0, S::SendEnable)
            }

            S::SendEnable => (
                self.send_write(RcbAttribute::RptEna, MmsValue::Bool(true), output)?,
                S::WaitEnable,
            ),
            S::WaitEnable => {
                let Some(pdu) = self.process_input(input)? else {
                    return Ok(0);
                };
                let Some(response) = self.expect_response(pdu, RcbEnableStep::Enable)? else {
                    return Ok(0);
                };

                self.check_write(&response, RcbEnableStep::Enable, false)?;

                info!(rcb = %self.rcb, "Reporting enabled");

                (0, S::Done)
            }

            S::Done => {
                return Err(unexpected_err("RCB subscription", "sequence is already done"));
            }
        };

        self.state = next_state;

        Ok(written)
    }
}

/// Dataset references arrive in MMS wire form with a space between the
/// domain and the item; the textual IEC form uses `/`.
fn normalize_dataset_ref(raw: &str) -> String {
    raw.replacen(' ', "/", 1)
}

fn enable_failed<E>(rcb: &RcbReference, step: RcbEnableStep, cause: E) -> ConnectorError
where
    E: std::error::Error + Send + Sync + 'static,
{
    error!(rcb = %rcb, %step, %cause, "RCB enable step failed");
    ConnectorError::new("RCB enable", ConnectorErrorKind::RcbEnableFailed { step }).caused_by(cause)
}
