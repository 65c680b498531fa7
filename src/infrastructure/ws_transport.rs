// WebSocket transport for road streams
use crate::application::stream_transport::{
    Endpoint, RawMessage, StreamConnection, StreamTransport, TransportError,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StreamTransport for WebSocketTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn StreamConnection>, TransportError> {
        let (ws, response) = connect_async(endpoint.url.as_str())
            .await
            .map_err(|e| TransportError::Refused(e.to_string()))?;
        debug!(url = %endpoint.url, status = %response.status(), "websocket handshake complete");

        Ok(Box::new(WebSocketConnection { ws }))
    }
}

struct WebSocketConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl StreamConnection for WebSocketConnection {
    async fn next_message(&mut self) -> Option<Result<RawMessage, TransportError>> {
        while let Some(message) = self.ws.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(Ok(RawMessage::Text(text.to_string()))),
                Ok(Message::Binary(data)) => return Some(Ok(RawMessage::Binary(Bytes::from(data)))),
                Ok(Message::Ping(payload)) => {
                    // Keepalive
                    if let Err(e) = self.ws.send(Message::Pong(payload)).await {
                        return Some(Err(TransportError::Lost(e.to_string())));
                    }
                }
                Ok(Message::Close(frame)) => {
                    trace!(?frame, "server closed websocket");
                    return None;
                }
                Ok(_) => {}
                Err(e) => return Some(Err(TransportError::Lost(e.to_string()))),
            }
        }
        None
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            trace!(error = %e, "websocket close failed");
        }
    }
}
