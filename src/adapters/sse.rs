//! Server-Sent Events transport
//!
//! Opens a long-lived `text/event-stream` GET and yields one frame per
//! dispatched event (the joined `data:` lines). Non-2xx responses and
//! body read errors are transport failures.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};

use crate::adapters::errors::{StreamError, StreamResult};
use crate::adapters::traits::{FrameStream, FrameTransport};
use crate::core::types::RawFrame;

/// Incremental SSE line parser, fed with raw body chunks
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every event it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line).into_owned();
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Flush whatever is left when the body ends
    pub fn finish(&mut self) -> Vec<RawFrame> {
        let mut frames = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).into_owned();
            if let Some(frame) = self.process_line(line.trim_end_matches('\r')) {
                frames.push(frame);
            }
        }
        if let Some(frame) = self.dispatch() {
            frames.push(frame);
        }
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<RawFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data_lines.push(value.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<RawFrame> {
        if self.data_lines.is_empty() {
            return None;
        }
        let payload = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(RawFrame::new(payload))
    }
}

struct BodyState<S> {
    body: S,
    decoder: SseLineDecoder,
    pending: VecDeque<RawFrame>,
    done: bool,
}

/// Turn a chunked body into a stream of SSE frames
pub fn sse_frames<S, B>(body: S) -> impl Stream<Item = StreamResult<RawFrame>> + Send + 'static
where
    S: Stream<Item = reqwest::Result<B>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = BodyState {
        body,
        decoder: SseLineDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.done {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.feed(chunk.as_ref());
                    state.pending.extend(frames);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(StreamError::Http(e)), state));
                }
                None => {
                    state.done = true;
                    let frames = state.decoder.finish();
                    state.pending.extend(frames);
                }
            }
        }
    })
}

/// HTTP streaming transport
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: reqwest::Client,
}

impl SseTransport {
    pub fn new() -> StreamResult<Self> {
        let client = reqwest::Client::builder()
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FrameTransport for SseTransport {
    async fn open(&self, endpoint: &str, token: Option<&str>) -> StreamResult<FrameStream> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|e| StreamError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;

        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(endpoint, status = status.as_u16(), "SSE subscription rejected");
            return Err(StreamError::HttpStatus(status.as_u16()));
        }

        tracing::info!(endpoint, "SSE stream connected");
        Ok(sse_frames(Box::pin(response.bytes_stream())).boxed())
    }
}
