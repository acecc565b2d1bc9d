mod support;

use std::{
    io,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use pretty_assertions::assert_eq;
use sesrelay_bridge::{MAX_MESSAGE_SIZE, Phase, RelayBackend, RelaySession, TransactionError};
use sesrelay_metrics::{FailureCause, RelaySnapshot};
use sesrelay_smtp::{Backend, BackendSession, MailParameters};
use support::{MockTransport, context};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

fn peer() -> SocketAddr {
    "192.0.2.10:40000".parse().unwrap()
}

async fn envelope(session: &mut RelaySession, from: &str, to: &[&str]) {
    session.mail(from, &MailParameters::new()).await.unwrap();
    for recipient in to {
        session.rcpt(recipient).await.unwrap();
    }
}

struct FailingReader;

impl AsyncRead for FailingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::TimedOut, "timed out")))
    }
}

#[tokio::test]
async fn successful_send() {
    let transport = Arc::new(MockTransport::default());
    let (context, metrics) = context(&transport, None);
    let mut session = RelaySession::new(peer(), context);

    envelope(&mut session, "a@example.com", &["b@example.com"]).await;
    let mut body: &[u8] = b"Subject: hi\r\n\r\nhello";
    let id = session.data(&mut body).await.unwrap();

    assert_eq!(id.as_deref(), Some("mock-1"));
    assert_eq!(
        metrics.snapshot(),
        RelaySnapshot {
            sent: 1,
            ..RelaySnapshot::default()
        }
    );

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].source, "a@example.com");
    assert_eq!(sent[0].destinations, ["b@example.com"]);
    assert_eq!(sent[0].raw_message, b"Subject: hi\r\n\r\nhello");
    assert_eq!(sent[0].configuration_set_name, None);

    // Handed off, so nothing is left behind.
    assert_eq!(session.transaction().phase(), Phase::Idle);
}

#[tokio::test]
async fn no_recipients() {
    let transport = Arc::new(MockTransport::default());
    let (context, metrics) = context(&transport, None);
    let mut session = RelaySession::new(peer(), context);

    envelope(&mut session, "a@example.com", &[]).await;
    let mut body: &[u8] = b"Subject: hi\r\n\r\nhello";
    let reply = session.data(&mut body).await.unwrap_err();

    assert_eq!(reply.to_string(), "554 5.5.1 Error: no valid recipients");
    assert_eq!(metrics.snapshot().failures(FailureCause::NoRecipients), 1);
    assert_eq!(metrics.snapshot().attempts(), 1);
    assert!(transport.sent().is_empty());

    // Nothing was read, and the sender is still there.
    assert_eq!(body.len(), 20);
    assert_eq!(session.transaction().phase(), Phase::HasSender);
}

#[tokio::test]
async fn recipients_added_after_rejection() {
    let transport = Arc::new(MockTransport::default());
    let (context, metrics) = context(&transport, None);
    let mut session = RelaySession::new(peer(), context);

    envelope(&mut session, "a@example.com", &[]).await;
    let mut body: &[u8] = b"x";
    assert!(session.data(&mut body).await.is_err());

    session.rcpt("b@example.com").await.unwrap();
    let mut body: &[u8] = b"x";
    assert!(session.data(&mut body).await.is_ok());

    assert_eq!(transport.sent()[0].source, "a@example.com");
    assert_eq!(metrics.snapshot().sent, 1);
}

#[tokio::test]
async fn oversized_body() {
    let transport = Arc::new(MockTransport::default());
    let (context, metrics) = context(&transport, None);
    let mut session = RelaySession::new(peer(), context);

    envelope(&mut session, "a@example.com", &["b@example.com"]).await;
    let mut body = tokio::io::repeat(b'x').take(MAX_MESSAGE_SIZE as u64 + 1);
    let reply = session.data(&mut body).await.unwrap_err();

    assert_eq!(reply.to_string(), "554 5.5.1 Error: maximum message size exceeded");
    assert_eq!(metrics.snapshot().failures(FailureCause::SizeExceeded), 1);
    assert_eq!(metrics.snapshot().attempts(), 1);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn body_at_the_limit() {
    let transport = Arc::new(MockTransport::default());
    let (context, metrics) = context(&transport, None);
    let mut session = RelaySession::new(peer(), context);

    envelope(&mut session, "a@example.com", &["b@example.com"]).await;
    let mut body = tokio::io::repeat(b'x').take(MAX_MESSAGE_SIZE as u64);
    session.data(&mut body).await.unwrap();

    assert_eq!(metrics.snapshot().sent, 1);
    assert_eq!(transport.sent()[0].raw_message.len(), MAX_MESSAGE_SIZE);
}

#[tokio::test]
async fn read_failure() {
    let transport = Arc::new(MockTransport::default());
    let (context, metrics) = context(&transport, None);
    let mut session = RelaySession::new(peer(), context);

    envelope(&mut session, "a@example.com", &["b@example.com"]).await;
    let reply = session.data(&mut FailingReader).await.unwrap_err();

    assert_eq!(
        reply.to_string(),
        "451 4.5.1 Temporary server error reading message"
    );
    assert_eq!(metrics.snapshot().failures(FailureCause::ReadError), 1);
    assert!(transport.sent().is_empty());
    assert_eq!(session.transaction().phase(), Phase::Idle);
}

#[tokio::test]
async fn send_failure() {
    let transport = Arc::new(MockTransport::failing());
    let (context, metrics) = context(&transport, None);
    let mut session = RelaySession::new(peer(), context);

    envelope(&mut session, "a@example.com", &["b@example.com"]).await;
    let mut body: &[u8] = b"x";
    let err = session.submit(&mut body).await.unwrap_err();

    assert!(matches!(err, TransactionError::Send(_)));
    assert_eq!(
        err.reply().to_string(),
        "451 4.5.1 Temporary server error. Please try again later"
    );
    assert_eq!(
        metrics.snapshot(),
        RelaySnapshot {
            send_error: 1,
            provider_errors: 1,
            ..RelaySnapshot::default()
        }
    );
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn configuration_set_forwarded_verbatim() {
    let transport = Arc::new(MockTransport::default());
    let (context, _metrics) = context(&transport, Some("campaign-1"));
    let mut session = RelaySession::new(peer(), context);

    for _ in 0..3 {
        envelope(&mut session, "a@example.com", &["b@example.com"]).await;
        let mut body: &[u8] = b"x";
        session.data(&mut body).await.unwrap();
    }

    let sent = transport.sent();
    assert_eq!(sent.len(), 3);
    for request in sent {
        assert_eq!(request.configuration_set_name.as_deref(), Some("campaign-1"));
    }
}

#[tokio::test]
async fn reset_behaves_like_a_fresh_connection() {
    let transport = Arc::new(MockTransport::default());
    let (context, _metrics) = context(&transport, None);
    let mut session = RelaySession::new(peer(), Arc::clone(&context));

    envelope(&mut session, "stale@example.com", &["stale@example.com"]).await;
    session.reset();
    assert_eq!(session.transaction().phase(), Phase::Idle);

    envelope(&mut session, "a@example.com", &["b@example.com"]).await;
    let mut body: &[u8] = b"x";
    session.data(&mut body).await.unwrap();

    let mut fresh = RelaySession::new(peer(), context);
    envelope(&mut fresh, "a@example.com", &["b@example.com"]).await;
    let mut body: &[u8] = b"x";
    fresh.data(&mut body).await.unwrap();

    let sent = transport.sent();
    assert_eq!(sent[0], sent[1]);
}

#[tokio::test]
async fn concurrent_connections_stay_separate() {
    let transport = Arc::new(MockTransport::default());
    let (context, metrics) = context(&transport, None);
    let backend = Arc::new(RelayBackend::new(context));

    let tasks = [("a@example.com", "b@example.com"), ("c@example.com", "d@example.com")]
        .into_iter()
        .map(|(from, to)| {
            let backend = Arc::clone(&backend);
            tokio::spawn(async move {
                let mut session = backend.new_session(peer());
                session.mail(from, &MailParameters::new()).await.unwrap();
                tokio::task::yield_now().await;
                session.rcpt(to).await.unwrap();
                let mut body: &[u8] = b"x";
                session.data(&mut body).await.unwrap();
            })
        })
        .collect::<Vec<_>>();

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(metrics.snapshot().sent, 2);

    let mut pairs = transport
        .sent()
        .into_iter()
        .map(|request| (request.source, request.destinations))
        .collect::<Vec<_>>();
    pairs.sort();
    assert_eq!(
        pairs,
        [
            (String::from("a@example.com"), vec![String::from("b@example.com")]),
            (String::from("c@example.com"), vec![String::from("d@example.com")]),
        ]
    );
}

#[tokio::test]
async fn authentication_is_trusted() {
    let transport = Arc::new(MockTransport::default());
    let (context, _metrics) = context(&transport, None);
    let mut session = RelaySession::new(peer(), context);

    assert!(session.auth_plain("", "anyone", "anything").await.is_ok());
}

struct RefuseAll;

#[async_trait::async_trait]
impl sesrelay_bridge::AuthPolicy for RefuseAll {
    async fn authenticate(
        &self,
        _identity: &str,
        _username: &str,
        _password: &str,
    ) -> Result<(), sesrelay_common::status::Reply> {
        Err(sesrelay_common::status::Reply::new(
            sesrelay_common::status::Status::Unknown(535),
            sesrelay_common::status::EnhancedCode::new(5, 7, 8),
            "Authentication credentials invalid",
        ))
    }
}

#[tokio::test]
async fn authentication_follows_policy() {
    let transport = Arc::new(MockTransport::default());
    let (context, _metrics) = context(&transport, None);
    let context = Arc::new((*context).clone().with_auth(Arc::new(RefuseAll)));
    let mut session = RelaySession::new(peer(), context);

    let reply = session
        .auth_plain("", "anyone", "anything")
        .await
        .unwrap_err();
    assert_eq!(
        reply.to_string(),
        "535 5.7.8 Authentication credentials invalid"
    );

    // Refused credentials do not disturb the transaction.
    envelope(&mut session, "a@example.org", &["b@example.com"]).await;
    assert_eq!(session.transaction().phase(), Phase::HasRecipients);
}
