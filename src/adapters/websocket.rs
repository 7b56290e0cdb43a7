//! WebSocket transport and scheme-based transport selection
//!
//! Text frames and UTF-8 binary frames become `RawFrame`s; control frames
//! are skipped. The stream ends when the server closes the socket.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use crate::adapters::errors::{StreamError, StreamResult};
use crate::adapters::sse::SseTransport;
use crate::adapters::traits::{FrameStream, FrameTransport};
use crate::core::types::RawFrame;

#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FrameTransport for WebSocketTransport {
    async fn open(&self, endpoint: &str, token: Option<&str>) -> StreamResult<FrameStream> {
        let mut request = endpoint
            .into_client_request()
            .map_err(|e| StreamError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;

        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                StreamError::ConnectionFailed("Bearer token is not a valid header value".into())
            })?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (ws_stream, _response) = connect_async(request).await?;
        tracing::info!(endpoint, "WebSocket stream connected");

        let frames = ws_stream.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(RawFrame::new(text))),
                Ok(Message::Binary(data)) => match String::from_utf8(data) {
                    Ok(text) => Some(Ok(RawFrame::new(text))),
                    Err(e) => {
                        tracing::debug!(error = %e, "Skipping non UTF-8 binary frame");
                        None
                    }
                },
                Ok(Message::Close(frame)) => {
                    tracing::info!(?frame, "WebSocket closed by server");
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(StreamError::from(e))),
            }
        });

        Ok(frames.boxed())
    }
}

/// Picks SSE for http(s) endpoints and WebSocket for ws(s) endpoints
#[derive(Debug, Clone)]
pub struct AutoTransport {
    sse: SseTransport,
    websocket: WebSocketTransport,
}

impl AutoTransport {
    pub fn new() -> StreamResult<Self> {
        Ok(Self {
            sse: SseTransport::new()?,
            websocket: WebSocketTransport::new(),
        })
    }
}

#[async_trait]
impl FrameTransport for AutoTransport {
    async fn open(&self, endpoint: &str, token: Option<&str>) -> StreamResult<FrameStream> {
        let scheme = endpoint
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .unwrap_or_default();

        match scheme.as_str() {
            "http" | "https" => self.sse.open(endpoint, token).await,
            "ws" | "wss" => self.websocket.open(endpoint, token).await,
            _ => Err(StreamError::InvalidEndpoint(format!(
                "{}: unsupported scheme",
                endpoint
            ))),
        }
    }
}
