#![cfg_attr(doc, doc = include_str!("../README.md"))]

#[macro_use]
extern crate tracing;

mod connection;
mod rcb_subscription;

use core::fmt;

use ironmms_core::{append_octets, to_octets, WireError};
use ironmms_pdu::cotp::{self, CotpParameters};
use ironmms_pdu::mms::{MmsPdu, ServiceError};
use ironmms_pdu::rcb::{OptFlds, TrgOps};
use ironmms_pdu::PduHint;

pub use self::connection::{ClientConnector, ClientConnectorState, ConnectionResult};
pub use self::rcb_subscription::{
    RcbEnableStep, RcbSnapshot, RcbSubscriptionSequence, RcbSubscriptionState, SubscriptionResult,
};

/// Connection and subscription parameters.
#[derive(Debug, Clone)]
pub struct Config {
    /// COTP connection options (TSAP selectors, proposed TPDU size).
    pub cotp: CotpParameters,
    /// Maximum MMS message size advertised in the initiate request.
    pub local_detail: i64,
    /// Integrity period written to each RCB, in milliseconds.
    pub integrity_period_ms: u32,
    /// BRCB reservation time written to `ResvTms`, in seconds.
    pub reservation_time_s: u16,
    /// OptFlds written during subscription.
    pub opt_flds: OptFlds,
    /// TrgOps written during subscription.
    pub trg_ops: TrgOps,
    /// Send an MMS identify as keep-alive when the read side idles.
    ///
    /// Off by default: the observed IEDs do not require it.
    pub keep_alive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cotp: CotpParameters::default(),
            local_detail: 65000,
            integrity_period_ms: 10_000,
            reservation_time_s: 60,
            opt_flds: OptFlds::subscription_default(),
            trg_ops: TrgOps::subscription_default(),
            keep_alive: false,
        }
    }
}

/// Session-wide invoke ID allocator.
///
/// A plain monotonically increasing u16 with wraparound; uniqueness among
/// *pending* exchanges is guaranteed by this client never having more
/// than a handful outstanding.
#[derive(Debug, Default, Clone, Copy)]
pub struct InvokeSequencer {
    next: u16,
}

impl InvokeSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_invoke_id(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        u32::from(id)
    }
}

/// A sans-IO exchange.
///
/// The driver loop is: when [`awaiting`](Self::awaiting) returns a frame
/// hint, read one frame off the transport and pass it to
/// [`step`](Self::step); otherwise call `step` with empty input. Octets
/// the step appends to `output` go to the transport verbatim; the return
/// value is how many it produced (zero when the sequence only consumed).
pub trait Sequence: Send {
    fn awaiting(&self) -> Option<&dyn PduHint>;

    /// Human-readable name of the current state, for log lines.
    fn state_name(&self) -> &'static str;

    fn step(&mut self, input: &[u8], output: &mut Vec<u8>) -> ConnectorResult<usize>;
}

const _: Option<&dyn Sequence> = None; // object-safety assertion

pub type ConnectorResult<T> = Result<T, ConnectorError>;

pub type ConnectorError = ironmms_error::Error<ConnectorErrorKind>;

#[non_exhaustive]
#[derive(Debug)]
pub enum ConnectorErrorKind {
    /// Codec failure on either direction of the wire.
    Wire(WireError),
    /// The peer refused the COTP connection (DR or unsupported TPDU).
    CotpRefused { reason: u8 },
    /// The peer disconnected an established transport.
    PeerDisconnect { reason: u8 },
    /// Server-returned confirmed-ErrorPDU.
    MmsService(ServiceError),
    /// One of the RCB setup writes failed; non-fatal, the subscription of
    /// the remaining blocks continues.
    RcbEnableFailed { step: rcb_subscription::RcbEnableStep },
    /// The peer broke the exchange contract.
    Unexpected { description: String },
    /// Socket-level failure reported by the driver.
    Io,
}

impl fmt::Display for ConnectorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            ConnectorErrorKind::Wire(_) => write!(f, "wire codec error"),
            ConnectorErrorKind::CotpRefused { reason } => write!(f, "COTP connection refused (reason {reason})"),
            ConnectorErrorKind::PeerDisconnect { reason } => write!(f, "peer disconnect (reason {reason})"),
            ConnectorErrorKind::MmsService(error) => write!(f, "MMS service error: {error}"),
            ConnectorErrorKind::RcbEnableFailed { step } => write!(f, "RCB enable failed at step {step}"),
            ConnectorErrorKind::Unexpected { description } => write!(f, "unexpected peer behavior: {description}"),
            ConnectorErrorKind::Io => write!(f, "transport I/O error"),
        }
    }
}

impl std::error::Error for ConnectorErrorKind {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self {
            ConnectorErrorKind::Wire(e) => Some(e),
            ConnectorErrorKind::MmsService(e) => Some(e),
            _ => None,
        }
    }
}

pub fn wire_err(error: WireError) -> ConnectorError {
    ConnectorError::new("wire codec", ConnectorErrorKind::Wire(error))
}

pub fn unexpected_err(context: &'static str, description: impl Into<String>) -> ConnectorError {
    ConnectorError::new(
        context,
        ConnectorErrorKind::Unexpected {
            description: description.into(),
        },
    )
}

pub fn io_err(context: &'static str, cause: std::io::Error) -> ConnectorError {
    ConnectorError::new(context, ConnectorErrorKind::Io).caused_by(cause)
}

/// Encodes one MMS PDU as COTP user data, segmented into DT TPDUs at the
/// negotiated TPDU size, and appends the TPKT frames to `out`.
pub fn encode_mms_packet(pdu: &MmsPdu, max_tpdu_size: usize, out: &mut Vec<u8>) -> ConnectorResult<usize> {
    let user_data = to_octets(pdu).map_err(wire_err)?;

    let mut written = 0;
    for fragment in cotp::segment_user_data(&user_data, max_tpdu_size) {
        written += append_octets(&cotp::Cotp(fragment), out).map_err(wire_err)?;
    }

    Ok(written)
}
