//! Scripted transport for deterministic tests without a network.

use std::collections::VecDeque;
use std::future::pending;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use parley_core::{BearerToken, TransportError};
use tokio::sync::mpsc;

use crate::transport::{Connection, Connector};

/// Outcome of one scripted connect attempt.
pub enum MockAttempt {
    Accept(MockConnection),
    Refuse(TransportError),
    /// Accept, but hand back a [`StalledConnection`].
    Stall,
}

impl MockAttempt {
    pub fn refuse() -> Self {
        Self::Refuse(TransportError::ConnectFailed("connection refused".into()))
    }
}

/// Connector that replays scripted attempts in order. Once the script is
/// exhausted every attempt is refused.
#[derive(Default)]
pub struct MockConnector {
    script: Mutex<VecDeque<MockAttempt>>,
    attempts: AtomicUsize,
    last_token: Mutex<Option<String>>,
}

impl MockConnector {
    pub fn new(script: Vec<MockAttempt>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn push(&self, attempt: MockAttempt) {
        self.script.lock().push_back(attempt);
    }

    /// Number of connect calls made so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// `Authorization` value presented on the latest attempt.
    pub fn last_authorization(&self) -> Option<String> {
        self.last_token.lock().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        _url: &str,
        token: Option<&BearerToken>,
    ) -> Result<Box<dyn Connection>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        *self.last_token.lock() = token.map(BearerToken::header_value);
        match self.script.lock().pop_front() {
            Some(MockAttempt::Accept(conn)) => Ok(Box::new(conn)),
            Some(MockAttempt::Refuse(e)) => Err(e),
            Some(MockAttempt::Stall) => Ok(Box::new(StalledConnection)),
            None => Err(TransportError::ConnectFailed("no scripted attempt left".into())),
        }
    }
}

enum RemoteFrame {
    Text(String),
    Error(String),
    Close,
}

/// Client half of an in-memory link.
pub struct MockConnection {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<RemoteFrame>,
}

/// Server half of an in-memory link.
pub struct MockRemote {
    /// Frames written by the client. Drop it to make client writes fail.
    pub sent: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<RemoteFrame>,
}

/// Create a connected client/server pair.
pub fn mock_link() -> (MockConnection, MockRemote) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    (
        MockConnection {
            outbound: outbound_tx,
            inbound: inbound_rx,
        },
        MockRemote {
            sent: outbound_rx,
            inbound: inbound_tx,
        },
    )
}

impl MockRemote {
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.inbound.send(RemoteFrame::Text(text.into()));
    }

    pub fn push_error(&self, message: impl Into<String>) {
        let _ = self.inbound.send(RemoteFrame::Error(message.into()));
    }

    pub fn close(&self) {
        let _ = self.inbound.send(RemoteFrame::Close);
    }

    /// Next frame the client wrote.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.recv().await
    }

    /// Frames written so far, without waiting.
    pub fn drain_sent(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.sent.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.outbound
            .send(text)
            .map_err(|_| TransportError::Closed("remote dropped".into()))
    }

    async fn recv_text(&mut self) -> Option<Result<String, TransportError>> {
        match self.inbound.recv().await? {
            RemoteFrame::Text(text) => Some(Ok(text)),
            RemoteFrame::Error(message) => Some(Err(TransportError::Protocol(message))),
            RemoteFrame::Close => None,
        }
    }

    async fn close(&mut self) {
        self.inbound.close();
    }
}

/// Connection to a peer that has stopped reading: writes and closes never
/// complete and nothing arrives.
pub struct StalledConnection;

#[async_trait]
impl Connection for StalledConnection {
    async fn send_text(&mut self, _text: String) -> Result<(), TransportError> {
        pending().await
    }

    async fn recv_text(&mut self) -> Option<Result<String, TransportError>> {
        pending().await
    }

    async fn close(&mut self) {
        pending::<()>().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn link_carries_frames_both_ways() {
        let (mut conn, mut remote) = mock_link();
        conn.send_text("hello".into()).await.unwrap();
        assert_eq!(remote.next_sent().await.as_deref(), Some("hello"));

        remote.push_text("hi");
        remote.close();
        assert_eq!(conn.recv_text().await.unwrap().unwrap(), "hi");
        assert!(conn.recv_text().await.is_none());
    }

    #[tokio::test]
    async fn writes_fail_once_remote_stops_reading() {
        let (mut conn, remote) = mock_link();
        drop(remote.sent);
        assert!(matches!(
            conn.send_text("x".into()).await,
            Err(TransportError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn connector_replays_script_then_refuses() {
        let (conn, _remote) = mock_link();
        let connector = MockConnector::new(vec![MockAttempt::refuse(), MockAttempt::Accept(conn)]);
        let token = BearerToken::new("t0k");
        assert!(connector.connect("ws://x", None).await.is_err());
        assert!(connector.connect("ws://x", Some(&token)).await.is_ok());
        assert!(connector.connect("ws://x", None).await.is_err());
        assert_eq!(connector.attempts(), 3);
        assert_eq!(connector.last_authorization(), None);
    }
}
