#![cfg_attr(doc, doc = include_str!("../README.md"))]

#[macro_use]
extern crate tracing;

mod line;

use std::time::{Duration, Instant};

pub use self::line::format_point;

/// Flush whenever this many samples are pending, regardless of the
/// batching interval.
pub const MAX_BATCH_SAMPLES: usize = 500;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that accepts measurement samples.
///
/// Single-threaded contract: `push` and `flush` are called from the
/// receive loop only; an implementation needing cross-thread access
/// provides its own synchronization.
pub trait MeasurementSink {
    /// Queues one sample.
    fn push(&mut self, metric: &str, labels: &[(&str, &str)], value: f64, timestamp_ms: i64);

    /// Forces out anything pending.
    fn flush(&mut self);

    /// Gives the sink a chance to flush on its timer; called once per
    /// loop iteration.
    fn maybe_flush(&mut self) {}
}

/// Batching HTTP sink: accumulates line-protocol points and POSTs them
/// to the configured endpoint when the batch is big or old enough.
pub struct HttpSink {
    client: reqwest::blocking::Client,
    url: String,
    batch: Vec<String>,
    batch_interval: Duration,
    last_flush: Instant,
    /// One POST per report/push, no accumulation.
    unbatched: bool,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, batch_interval: Duration, unbatched: bool) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: url.into(),
            batch: Vec::new(),
            batch_interval,
            last_flush: Instant::now(),
            unbatched,
        }
    }

    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    fn post(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let body = self.batch.join("\n");
        let count = self.batch.len();
        self.batch.clear();
        self.last_flush = Instant::now();

        match self.client.post(&self.url).body(body).send() {
            Ok(response) if response.status().is_success() => {
                trace!(count, "Sink batch delivered");
            }
            Ok(response) => {
                // Samples are dropped rather than retried; reporting
                // data ages out too fast to be worth a backlog.
                warn!(status = %response.status(), count, "Sink endpoint rejected batch");
            }
            Err(error) => {
                warn!(%error, count, "Sink POST failed");
            }
        }
    }
}

impl MeasurementSink for HttpSink {
    fn push(&mut self, metric: &str, labels: &[(&str, &str)], value: f64, timestamp_ms: i64) {
        self.batch.push(format_point(metric, labels, value, timestamp_ms));

        if self.unbatched || self.batch.len() >= MAX_BATCH_SAMPLES {
            self.post();
        }
    }

    fn flush(&mut self) {
        self.post();
    }

    fn maybe_flush(&mut self) {
        if !self.batch.is_empty() && self.last_flush.elapsed() >= self.batch_interval {
            self.post();
        }
    }
}
