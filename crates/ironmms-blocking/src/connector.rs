use std::io::{Read, Write};

use ironmms_connector::{
    io_err, ClientConnector, ConnectionResult, ConnectorError, ConnectorResult, InvokeSequencer,
    RcbSubscriptionSequence, Sequence, SubscriptionResult,
};

use crate::framed::Framed;

/// Drives the connection sequence to completion: COTP connection, then
/// the MMS initiate exchange.
pub fn connect<S>(framed: &mut Framed<S>, mut connector: ClientConnector) -> ConnectorResult<ConnectionResult>
where
    S: Read + Write,
{
    let mut buf = Vec::new();

    info!("Establishing the MMS session");

    while !connector.is_connected() {
        single_sequence_step(framed, &mut connector, &mut buf)?;
    }

    info!("MMS session established");

    Ok(connector.into_connection_result())
}

/// Drives one RCB subscription sequence to completion.
///
/// The invoke allocator is always handed back, success or not, so the
/// caller can thread it into the next sequence.
pub fn subscribe<S>(
    framed: &mut Framed<S>,
    mut sequence: RcbSubscriptionSequence,
) -> (InvokeSequencer, Result<SubscriptionResult, ConnectorError>)
where
    S: Read + Write,
{
    let mut buf = Vec::new();

    while !sequence.is_done() {
        if let Err(error) = single_sequence_step(framed, &mut sequence, &mut buf) {
            return (sequence.invokes(), Err(error));
        }
    }

    (sequence.invokes(), Ok(sequence.into_result()))
}

/// One step of a sans-IO sequence: read a frame when the sequence wants
/// one, let it step, write whatever it produced.
pub fn single_sequence_step<S>(
    framed: &mut Framed<S>,
    sequence: &mut dyn Sequence,
    buf: &mut Vec<u8>,
) -> ConnectorResult<()>
where
    S: Read + Write,
{
    buf.clear();

    let written = if let Some(hint) = sequence.awaiting() {
        debug!(state = sequence.state_name(), ?hint, "Awaiting a frame");

        let frame = framed
            .read_by_hint(hint)
            .map_err(|e| io_err("read frame by hint", e))?;

        trace!(length = frame.len(), "Frame received");

        sequence.step(&frame, buf)?
    } else {
        sequence.step(&[], buf)?
    };

    if written > 0 {
        trace!(written, "Sending produced octets");
        framed
            .write_all(&buf[..written])
            .map_err(|e| io_err("write frame", e))?;
    }

    Ok(())
}
