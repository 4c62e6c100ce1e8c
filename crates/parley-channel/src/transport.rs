//! Duplex text transport used by the channel.
//!
//! [`Connector`] opens connections; [`Connection`] carries text frames. The
//! production implementation is [`WsConnector`] over `tokio-tungstenite`;
//! tests script both sides through [`crate::mock`].

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parley_core::{BearerToken, TransportError};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

/// An open duplex connection.
#[async_trait]
pub trait Connection: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Next inbound text frame, or `None` once the peer has closed.
    ///
    /// Must be cancel-safe: the channel polls it inside `select!`.
    async fn recv_text(&mut self) -> Option<Result<String, TransportError>>;

    async fn close(&mut self);
}

/// Opens connections to the tutor endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(
        &self,
        url: &str,
        token: Option<&BearerToken>,
    ) -> Result<Box<dyn Connection>, TransportError>;
}

/// WebSocket connector. Sends the credential as an `Authorization` header.
#[derive(Clone, Debug, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        url: &str,
        token: Option<&BearerToken>,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        if let Some(token) = token {
            let value = HeaderValue::from_str(&token.header_value())
                .map_err(|_| TransportError::InvalidUrl("credential is not a valid header value".into()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
        debug!(url, status = %response.status(), "websocket handshake complete");
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Closed(e.to_string()))
    }

    async fn recv_text(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => {
                    return Some(String::from_utf8(bytes.to_vec()).map_err(|_| {
                        TransportError::Protocol("binary frame is not utf-8".into())
                    }))
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "peer sent close frame");
                    return None;
                }
                // Ping/pong are answered by tungstenite itself.
                Ok(_) => continue,
                Err(e) => return Some(Err(TransportError::Closed(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "websocket close failed");
        }
    }
}
