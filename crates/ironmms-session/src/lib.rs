#![cfg_attr(doc, doc = include_str!("../README.md"))]

#[macro_use]
extern crate tracing;

mod label;
mod processor;
mod report;

use core::fmt;

use ironmms_core::WireError;

pub use self::label::LabelMap;
pub use self::processor::{ReportProcessor, SessionEvent};
pub use self::report::{MmsReport, ReportDecoder, ReportEntry, ReportTimestamp};

pub type SessionResult<T> = Result<T, SessionError>;

pub type SessionError = ironmms_error::Error<SessionErrorKind>;

#[non_exhaustive]
#[derive(Debug)]
pub enum SessionErrorKind {
    /// Codec failure on received octets.
    Wire(WireError),
    /// A PDU that makes no sense in the current session state.
    Protocol { description: &'static str },
    /// Socket-level failure.
    Transport,
}

impl fmt::Display for SessionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wire(_) => write!(f, "wire codec error"),
            Self::Protocol { description } => write!(f, "protocol error: {description}"),
            Self::Transport => write!(f, "transport error"),
        }
    }
}

impl std::error::Error for SessionErrorKind {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Wire(e) => Some(e),
            _ => None,
        }
    }
}

pub fn wire_err(error: WireError) -> SessionError {
    SessionError::new("wire codec", SessionErrorKind::Wire(error))
}

pub fn protocol_err(context: &'static str, description: &'static str) -> SessionError {
    SessionError::new(context, SessionErrorKind::Protocol { description })
}

pub fn transport_err<E>(context: &'static str, cause: E) -> SessionError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SessionError::new(context, SessionErrorKind::Transport).caused_by(cause)
}
