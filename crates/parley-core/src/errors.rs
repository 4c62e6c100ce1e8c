use std::time::Duration;

/// Failures of the underlying duplex socket.
///
/// These never reach callers of the channel as `Err` values: the channel turns
/// them into `socket-error` events and feeds the reconnect policy with them.
#[derive(Clone, Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection closed: {0}")]
    Closed(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "invalid_url",
            Self::ConnectFailed(_) => "connect_failed",
            Self::Timeout(_) => "timeout",
            Self::Closed(_) => "closed",
            Self::Protocol(_) => "protocol",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_strings() {
        assert_eq!(TransportError::Protocol("x".into()).error_kind(), "protocol");
        assert_eq!(
            TransportError::Timeout(Duration::from_millis(5)).error_kind(),
            "timeout"
        );
    }

    #[test]
    fn display_includes_detail() {
        let err = TransportError::ConnectFailed("connection refused".into());
        assert_eq!(err.to_string(), "connect failed: connection refused");
    }
}
