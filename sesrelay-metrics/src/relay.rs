//! Delivery outcome counters.
//!
//! Every increment goes to an OpenTelemetry counter, for OTLP export, and to
//! a local atomic, which backs the Prometheus exposition and tests.

use std::sync::atomic::{AtomicU64, Ordering};

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Meter},
};

use crate::outcome::{FailureCause, OutcomeRecorder};

#[derive(Debug)]
pub struct RelayMetrics {
    /// Messages accepted by the sending API
    sent_total: Counter<u64>,

    /// Failed submissions, by cause
    failed_total: Counter<u64>,

    /// Failures reported by the sending API itself
    provider_errors_total: Counter<u64>,

    sent: AtomicU64,
    failed: [AtomicU64; FailureCause::ALL.len()],
    provider_errors: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelaySnapshot {
    pub sent: u64,
    pub no_recipients: u64,
    pub read_error: u64,
    pub size_exceeded: u64,
    pub send_error: u64,
    pub provider_errors: u64,
}

impl RelaySnapshot {
    #[must_use]
    pub const fn failures(&self, cause: FailureCause) -> u64 {
        match cause {
            FailureCause::NoRecipients => self.no_recipients,
            FailureCause::ReadError => self.read_error,
            FailureCause::SizeExceeded => self.size_exceeded,
            FailureCause::SendError => self.send_error,
        }
    }

    /// Total submissions, successful or not.
    #[must_use]
    pub const fn attempts(&self) -> u64 {
        self.sent + self.no_recipients + self.read_error + self.size_exceeded + self.send_error
    }
}

const fn slot(cause: FailureCause) -> usize {
    match cause {
        FailureCause::NoRecipients => 0,
        FailureCause::ReadError => 1,
        FailureCause::SizeExceeded => 2,
        FailureCause::SendError => 3,
    }
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayMetrics {
    /// Creates the instruments on the global meter provider.
    ///
    /// Install an exporting provider first if the counters should leave the
    /// process over OTLP.
    #[must_use]
    pub fn new() -> Self {
        let meter = meter();

        let sent_total = meter
            .u64_counter("smtpd.email_send_success")
            .with_description("Total number of successfully sent emails")
            .build();

        let failed_total = meter
            .u64_counter("smtpd.email_send_fail")
            .with_description("Total number of emails that failed to send")
            .build();

        let provider_errors_total = meter
            .u64_counter("smtpd.ses_error")
            .with_description("Total number of errors returned by SES")
            .build();

        Self {
            sent_total,
            failed_total,
            provider_errors_total,
            sent: AtomicU64::new(0),
            failed: Default::default(),
            provider_errors: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> RelaySnapshot {
        let failed = |cause| self.failed[slot(cause)].load(Ordering::Relaxed);

        RelaySnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            no_recipients: failed(FailureCause::NoRecipients),
            read_error: failed(FailureCause::ReadError),
            size_exceeded: failed(FailureCause::SizeExceeded),
            send_error: failed(FailureCause::SendError),
            provider_errors: self.provider_errors.load(Ordering::Relaxed),
        }
    }
}

impl OutcomeRecorder for RelayMetrics {
    fn record_success(&self) {
        self.sent_total.add(1, &[]);
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self, cause: FailureCause) {
        let attributes = [KeyValue::new("type", cause.as_str())];
        self.failed_total.add(1, &attributes);
        self.failed[slot(cause)].fetch_add(1, Ordering::Relaxed);
    }

    fn record_provider_error(&self) {
        self.provider_errors_total.add(1, &[]);
        self.provider_errors.fetch_add(1, Ordering::Relaxed);
    }
}

fn meter() -> Meter {
    opentelemetry::global::meter("sesrelay")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn counts_each_outcome() {
        let metrics = RelayMetrics::new();

        metrics.record_success();
        metrics.record_success();
        metrics.record_failure(FailureCause::NoRecipients);
        metrics.record_failure(FailureCause::SendError);
        metrics.record_provider_error();

        assert_eq!(
            metrics.snapshot(),
            RelaySnapshot {
                sent: 2,
                no_recipients: 1,
                read_error: 0,
                size_exceeded: 0,
                send_error: 1,
                provider_errors: 1,
            }
        );
        assert_eq!(metrics.snapshot().attempts(), 4);
    }

    #[tokio::test]
    async fn concurrent_increments() {
        let metrics = Arc::new(RelayMetrics::new());

        let tasks = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                tokio::spawn(async move {
                    for _ in 0..100 {
                        metrics.record_failure(FailureCause::ReadError);
                    }
                })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(metrics.snapshot().failures(FailureCause::ReadError), 800);
    }
}
