#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use sesrelay_bridge::{MailTransport, RawEmailRequest, RelayContext, TransportError};
use sesrelay_metrics::RelayMetrics;

/// Records every request and answers according to its switches.
#[derive(Default)]
pub struct MockTransport {
    pub requests: Mutex<Vec<RawEmailRequest>>,
    pub fail_sends: AtomicBool,
    pub known_sets: Vec<String>,
}

impl MockTransport {
    pub fn with_sets(sets: &[&str]) -> Self {
        Self {
            known_sets: sets.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        let transport = Self::default();
        transport.fail_sends.store(true, Ordering::SeqCst);
        transport
    }

    pub fn sent(&self) -> Vec<RawEmailRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    async fn send_raw(&self, request: RawEmailRequest) -> Result<Option<String>, TransportError> {
        self.requests.lock().push(request);

        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Api {
                operation: "SendRawEmail",
                message: String::from("Throttling: Maximum sending rate exceeded"),
            });
        }

        Ok(Some(format!("mock-{}", self.requests.lock().len())))
    }

    async fn configuration_set_exists(&self, name: &str) -> Result<(), TransportError> {
        if self.known_sets.iter().any(|set| set == name) {
            Ok(())
        } else {
            Err(TransportError::Api {
                operation: "DescribeConfigurationSet",
                message: format!("Configuration set <{name}> does not exist"),
            })
        }
    }
}

pub fn context(
    transport: &Arc<MockTransport>,
    configuration_set_name: Option<&str>,
) -> (Arc<RelayContext>, Arc<RelayMetrics>) {
    let metrics = Arc::new(RelayMetrics::new());
    let context = RelayContext::new(
        Arc::clone(transport) as Arc<dyn MailTransport>,
        configuration_set_name.map(ToString::to_string),
        Arc::clone(&metrics) as _,
    );

    (Arc::new(context), metrics)
}
