use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::wire::SessionSummary;

/// Lifecycle state of a transport channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Reconnecting,
    Offline,
    /// Terminal. Only reached through an explicit disconnect.
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Offline => "offline",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a `went-offline` event fired.
///
/// Both causes share one public event kind. Consumers that need to tell them
/// apart must inspect the reason: only `RetriesExhausted` moves the channel into
/// [`ConnectionState::Offline`]; `NetworkUnavailable` leaves state and retry
/// bookkeeping untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineReason {
    NetworkUnavailable,
    RetriesExhausted,
}

/// Events published by a transport channel to its subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelEvent {
    ConnectionOpened,
    ConnectionClosed {
        reason: String,
        by_caller: bool,
    },
    SocketError {
        message: String,
    },
    /// Any inbound frame other than the session summary, as parsed JSON.
    MessageReceived(serde_json::Value),
    ReconnectAttempting {
        attempt: u32,
        delay: Duration,
    },
    ReconnectSucceeded {
        attempts: u32,
    },
    WentOffline {
        reason: OfflineReason,
    },
    CameOnline,
    SessionSummaryReceived(SessionSummary),
}

/// Discriminant used to key subscriptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelEventKind {
    ConnectionOpened,
    ConnectionClosed,
    SocketError,
    MessageReceived,
    ReconnectAttempting,
    ReconnectSucceeded,
    WentOffline,
    CameOnline,
    SessionSummaryReceived,
}

impl ChannelEventKind {
    pub const ALL: [ChannelEventKind; 9] = [
        Self::ConnectionOpened,
        Self::ConnectionClosed,
        Self::SocketError,
        Self::MessageReceived,
        Self::ReconnectAttempting,
        Self::ReconnectSucceeded,
        Self::WentOffline,
        Self::CameOnline,
        Self::SessionSummaryReceived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionOpened => "connection-opened",
            Self::ConnectionClosed => "connection-closed",
            Self::SocketError => "socket-error",
            Self::MessageReceived => "message-received",
            Self::ReconnectAttempting => "reconnect-attempting",
            Self::ReconnectSucceeded => "reconnect-succeeded",
            Self::WentOffline => "went-offline",
            Self::CameOnline => "came-online",
            Self::SessionSummaryReceived => "session-summary-received",
        }
    }
}

impl ChannelEvent {
    pub fn kind(&self) -> ChannelEventKind {
        match self {
            Self::ConnectionOpened => ChannelEventKind::ConnectionOpened,
            Self::ConnectionClosed { .. } => ChannelEventKind::ConnectionClosed,
            Self::SocketError { .. } => ChannelEventKind::SocketError,
            Self::MessageReceived(_) => ChannelEventKind::MessageReceived,
            Self::ReconnectAttempting { .. } => ChannelEventKind::ReconnectAttempting,
            Self::ReconnectSucceeded { .. } => ChannelEventKind::ReconnectSucceeded,
            Self::WentOffline { .. } => ChannelEventKind::WentOffline,
            Self::CameOnline => ChannelEventKind::CameOnline,
            Self::SessionSummaryReceived(_) => ChannelEventKind::SessionSummaryReceived,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_matches_variant() {
        let evt = ChannelEvent::ReconnectAttempting {
            attempt: 2,
            delay: Duration::from_millis(1800),
        };
        assert_eq!(evt.kind(), ChannelEventKind::ReconnectAttempting);
        assert_eq!(evt.kind().as_str(), "reconnect-attempting");
    }

    #[test]
    fn offline_event_kind_is_shared_by_both_causes() {
        let network = ChannelEvent::WentOffline {
            reason: OfflineReason::NetworkUnavailable,
        };
        let exhausted = ChannelEvent::WentOffline {
            reason: OfflineReason::RetriesExhausted,
        };
        assert_eq!(network.kind(), exhausted.kind());
        assert_ne!(network, exhausted);
    }

    #[test]
    fn kind_serde_is_kebab_case() {
        for kind in ChannelEventKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn state_display() {
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
        assert_eq!(ConnectionState::Closed.as_str(), "closed");
    }
}
