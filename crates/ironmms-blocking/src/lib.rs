#![cfg_attr(doc, doc = include_str!("../README.md"))]

#[macro_use]
extern crate tracing;

mod connector;
mod framed;
mod session;

use core::time::Duration;

pub use self::connector::*;
pub use self::framed::*;
pub use self::session::*;

/// TCP connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// COTP CR/CC exchange timeout.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Per confirmed MMS exchange timeout.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Idle read timeout of the receive loop; when it elapses the loop sends
/// a keep-alive probe (when enabled) and keeps waiting.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(60);
