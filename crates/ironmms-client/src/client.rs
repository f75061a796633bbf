use std::net::{TcpStream, ToSocketAddrs as _};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use ironmms_blocking::{
    single_sequence_step, ActiveSession, Framed, CONNECT_TIMEOUT, EXCHANGE_TIMEOUT, HANDSHAKE_TIMEOUT, IDLE_TIMEOUT,
};
use ironmms_connector::{
    ClientConnector, ClientConnectorState, ConnectorErrorKind, InvokeSequencer, RcbSubscriptionSequence,
};
use ironmms_pdu::mms::MmsValue;
use ironmms_session::{LabelMap, MmsReport, ReportProcessor, SessionEvent};
use ironmms_sink::{HttpSink, MeasurementSink as _};

use crate::config::Config;
use crate::hexdump::Sniffer;

/// A runtime failure, classified for the exit code.
#[derive(Debug)]
pub enum ClientError {
    /// TCP or COTP connection failure.
    Connect(anyhow::Error),
    /// MMS initiate failure.
    Initiate(anyhow::Error),
    /// Anything after the session came up.
    Runtime(anyhow::Error),
}

impl ClientError {
    pub fn error(&self) -> &anyhow::Error {
        match self {
            Self::Connect(e) | Self::Initiate(e) | Self::Runtime(e) => e,
        }
    }
}

pub fn run(config: Config, labels: LabelMap) -> Result<(), ClientError> {
    let connector_config = ironmms_connector::Config {
        keep_alive: config.keep_alive,
        ..ironmms_connector::Config::default()
    };

    //== TCP ==//

    let addr = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .with_context(|| format!("resolve {}:{}", config.host, config.port))
        .map_err(ClientError::Connect)?;

    info!(%addr, "Connecting");

    let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
        .with_context(|| format!("connect to {addr}"))
        .map_err(ClientError::Connect)?;

    // Control handle for socket options; the stream itself moves into
    // the framed reader.
    let control = stream
        .try_clone()
        .context("clone socket handle")
        .map_err(ClientError::Connect)?;

    let _ = control.set_nodelay(true);
    control
        .set_read_timeout(Some(HANDSHAKE_TIMEOUT))
        .context("set handshake timeout")
        .map_err(ClientError::Connect)?;

    let mut framed = Framed::new(Sniffer::new(stream, config.debug));

    //== COTP connection + MMS initiate ==//

    let mut connector = ClientConnector::new(connector_config.clone());
    let mut buf = Vec::new();

    while !connector.is_connected() {
        let in_initiate = matches!(
            connector.state,
            ClientConnectorState::MmsInitiateSendRequest | ClientConnectorState::MmsInitiateWaitResponse
        );

        if let Err(error) = single_sequence_step(&mut framed, &mut connector, &mut buf) {
            let error = anyhow::Error::new(error).context("connection sequence");
            return Err(if in_initiate {
                ClientError::Initiate(error)
            } else {
                ClientError::Connect(error)
            });
        }
    }

    let connection = connector.into_connection_result();

    //== RCB subscription, strictly one block at a time ==//

    control
        .set_read_timeout(Some(EXCHANGE_TIMEOUT))
        .context("set exchange timeout")
        .map_err(ClientError::Runtime)?;

    let mut invokes = InvokeSequencer::new();
    let mut subscriptions = Vec::new();

    for rcb in &config.rcbs {
        let sequence = RcbSubscriptionSequence::new(
            rcb.clone(),
            connector_config.clone(),
            connection.max_tpdu_size,
            invokes,
        );

        let (next_invokes, outcome) = ironmms_blocking::subscribe(&mut framed, sequence);
        invokes = next_invokes;

        match outcome {
            Ok(result) => {
                info!(rcb = %result.rcb, rpt_id = %result.rpt_id, dataset = ?result.dataset_ref, "Subscribed");
                subscriptions.push(result);
            }
            Err(error) if matches!(error.kind(), ConnectorErrorKind::RcbEnableFailed { .. }) => {
                // Partial subscription is acceptable; carry on with the
                // remaining blocks.
                warn!(rcb = %rcb, error = %error.verbose(), "Skipping RCB");
            }
            Err(error) => {
                return Err(ClientError::Runtime(
                    anyhow::Error::new(error).context("RCB subscription"),
                ));
            }
        }
    }

    if subscriptions.is_empty() {
        return Err(ClientError::Runtime(anyhow::anyhow!("no RCB could be enabled")));
    }

    //== Receive loop ==//

    let mut processor = ReportProcessor::new(labels);
    for subscription in &subscriptions {
        processor.register_subscription(
            subscription.rpt_id.clone(),
            subscription.opt_flds,
            subscription.dataset_ref.clone(),
        );
    }

    control
        .set_read_timeout(Some(IDLE_TIMEOUT))
        .context("set idle timeout")
        .map_err(ClientError::Runtime)?;

    let mut sink = config.sink_url.as_ref().map(|url| {
        HttpSink::new(
            url.clone(),
            Duration::from_millis(config.sink_batch_ms),
            config.sink_no_batch,
        )
    });

    let mut session = ActiveSession::new(framed, processor, &connection, invokes, config.keep_alive);

    info!("Waiting for reports");

    loop {
        let event = session
            .next_event()
            .map_err(|e| ClientError::Runtime(anyhow::Error::new(e).context("receive loop")))?;

        match event {
            SessionEvent::Report(report) => handle_report(&report, &config, sink.as_mut()),
            SessionEvent::KeepAlive(identity) => {
                debug!(vendor = %identity.vendor_name, "Keep-alive answered");
            }
            SessionEvent::Discarded => {}
        }

        if let Some(sink) = sink.as_mut() {
            sink.maybe_flush();
        }
    }
}

fn handle_report(report: &MmsReport, config: &Config, sink: Option<&mut HttpSink>) {
    info!(
        rpt_id = %report.rpt_id,
        seq = ?report.sequence_number,
        dataset = ?report.dataset_ref,
        included = report.included_count(),
        members = report.entries.len(),
        mismatch = report.decode_mismatch,
        "Report"
    );

    if config.verbose {
        for entry in &report.entries {
            let Some(value) = &entry.value else {
                continue;
            };

            info!(
                index = entry.index,
                label = entry.label.as_deref().unwrap_or("-"),
                %value,
                quality = ?entry.quality,
                reason = ?entry.reason,
                "  entry"
            );
        }
    }

    let Some(sink) = sink else {
        return;
    };

    let report_millis = report
        .time_of_entry
        .map(|t| t.as_unix_millis())
        .unwrap_or_else(now_millis);

    let dataset = report.dataset_ref.as_deref().unwrap_or("-");

    for entry in &report.entries {
        let Some(value) = entry.value.as_ref().and_then(sample_value) else {
            continue;
        };

        let fallback = format!("member{}", entry.index);
        let metric = entry.label.as_deref().unwrap_or(&fallback);
        let timestamp = entry.timestamp.map(|t| t.as_unix_millis()).unwrap_or(report_millis);

        sink.push(
            metric,
            &[("rpt_id", &report.rpt_id), ("dataset", dataset)],
            value,
            timestamp,
        );
    }
}

/// Numeric projection for the sink. Scalars project directly; for
/// structures (AnalogueValue, Vector) the first numeric member wins.
fn sample_value(value: &MmsValue) -> Option<f64> {
    if let Some(projected) = value.as_f64() {
        return Some(projected);
    }

    match value {
        MmsValue::Structure(members) => members.iter().find_map(sample_value),
        _ => None,
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
