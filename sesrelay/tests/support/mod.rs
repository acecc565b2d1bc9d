//! Harness that runs the whole relay on loopback against a mock transport.

#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use clap::Parser;
use parking_lot::Mutex;
use sesrelay::{Args, Controller, StartupError};
use sesrelay_bridge::{MailTransport, RawEmailRequest, TransportError};
use sesrelay_common::Signal;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    task::JoinHandle,
    time::timeout,
};

/// Records every send and answers according to its switches.
#[derive(Default)]
pub struct MockTransport {
    pub requests: Mutex<Vec<RawEmailRequest>>,
    pub fail_sends: AtomicBool,
    pub known_sets: Vec<String>,
}

impl MockTransport {
    pub fn sent(&self) -> Vec<RawEmailRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    async fn send_raw(&self, request: RawEmailRequest) -> Result<Option<String>, TransportError> {
        let count = {
            let mut requests = self.requests.lock();
            requests.push(request);
            requests.len()
        };

        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Api {
                operation: "SendRawEmail",
                message: String::from("ServiceUnavailable"),
            });
        }

        Ok(Some(format!("0100-mock-{count}")))
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

pub struct RelayHarness {
    pub transport: Arc<MockTransport>,
    pub smtp_address: SocketAddr,
    pub health_address: Option<SocketAddr>,
    pub metrics_address: Option<SocketAddr>,
    pub metrics: Arc<sesrelay_metrics::RelayMetrics>,
    shutdown: tokio::sync::broadcast::Sender<Signal>,
    handle: JoinHandle<Result<(), StartupError>>,
}

impl RelayHarness {
    /// Starts the relay on ephemeral loopback ports. `flags` are appended to
    /// the command line.
    pub async fn start(transport: MockTransport, flags: &[&str]) -> Result<Self, StartupError> {
        let mut argv = vec!["ses-smtpd-relay", "127.0.0.1:0"];
        argv.extend_from_slice(flags);
        let args = Args::try_parse_from(argv).expect("valid flags");

        let transport = Arc::new(transport);
        let running = Controller::new(args)
            .start_with(Arc::clone(&transport) as Arc<dyn MailTransport>)
            .await?;

        let smtp_address = running.smtp_address();
        let health_address = running.health_address();
        let metrics_address = running.metrics_address();
        let metrics = running.metrics();
        let shutdown = running.shutdown_handle();
        let handle = tokio::spawn(running.until(std::future::pending()));

        Ok(Self {
            transport,
            smtp_address,
            health_address,
            metrics_address,
            metrics,
            shutdown,
            handle,
        })
    }

    pub async fn connect(&self) -> SmtpClient {
        SmtpClient::connect(self.smtp_address).await
    }

    /// Broadcasts shutdown and waits for the controller to finish.
    pub async fn shutdown(self) -> Result<(), StartupError> {
        let _ = self.shutdown.send(Signal::Shutdown);

        timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("controller stopped in time")
            .expect("controller task did not panic")
    }
}

/// A line-at-a-time SMTP client.
pub struct SmtpClient {
    stream: BufReader<TcpStream>,
}

impl SmtpClient {
    pub async fn connect(address: SocketAddr) -> Self {
        let stream = TcpStream::connect(address).await.expect("connect");
        let mut client = Self {
            stream: BufReader::new(stream),
        };

        let greeting = client.reply().await;
        assert!(greeting.starts_with("220 "), "unexpected greeting {greeting:?}");

        client
    }

    pub async fn send(&mut self, line: &str) {
        self.stream
            .get_mut()
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .expect("write");
    }

    pub async fn write_raw(&mut self, bytes: &[u8]) {
        self.stream.get_mut().write_all(bytes).await.expect("write");
    }

    /// Reads a complete reply, one entry per line, without the CRLFs.
    pub async fn reply_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();

        loop {
            let mut line = String::new();
            let read = timeout(Duration::from_secs(5), self.stream.read_line(&mut line))
                .await
                .expect("reply in time")
                .expect("read");
            assert!(read > 0, "connection closed while waiting for a reply");

            let line = line.trim_end().to_string();
            let last = line.as_bytes().get(3) != Some(&b'-');
            lines.push(line);

            if last {
                return lines;
            }
        }
    }

    /// The final line of the next reply.
    pub async fn reply(&mut self) -> String {
        self.reply_lines().await.pop().unwrap_or_default()
    }

    pub async fn command(&mut self, line: &str) -> String {
        self.send(line).await;
        self.reply().await
    }

    /// Runs EHLO, MAIL, each RCPT and DATA, returning the reply to the body.
    pub async fn transaction(&mut self, from: &str, to: &[&str], body: &str) -> String {
        assert!(self.command("EHLO client.example.org").await.starts_with("250 "));
        assert!(self.command(&format!("MAIL FROM:<{from}>")).await.starts_with("250 "));
        for recipient in to {
            assert!(self.command(&format!("RCPT TO:<{recipient}>")).await.starts_with("250 "));
        }
        assert!(self.command("DATA").await.starts_with("354 "));

        self.write_raw(body.as_bytes()).await;
        self.command(".").await
    }

    /// Reads until the server closes the connection.
    pub async fn remaining(mut self) -> String {
        let mut rest = String::new();
        let _ = timeout(Duration::from_secs(5), self.stream.read_to_string(&mut rest)).await;
        rest
    }
}

/// Minimal HTTP/1.1 GET, returning the status line and the body.
pub async fn http_get(address: SocketAddr, path: &str) -> (String, String) {
    let mut stream = TcpStream::connect(address).await.expect("connect");
    stream
        .write_all(
            format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                .as_bytes(),
        )
        .await
        .expect("write");

    let mut response = String::new();
    timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
        .await
        .expect("response in time")
        .expect("read");

    let status = response.lines().next().unwrap_or_default().to_string();
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();

    (status, body)
}
