//! Streaming support for the Inference Gateway SDK.
//!
//! A streaming call hands its response body to a decoder task that frames
//! the bytes into [`StreamEvent`]s and publishes them onto a bounded
//! channel. The consumer drains the channel through [`EventStream`] until it
//! closes; mid-stream failures arrive in-band as `error`-kind events rather
//! than by the channel going silent.

use crate::error::{Error, Result};
use crate::request::MessageRole;
use crate::response::Usage;
use bytes::{Bytes, BytesMut};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Backpressure capacity of the event channel: the decoder runs ahead of the
/// consumer by at most this many events.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// SSE framing variant spoken by the gateway.
///
/// The wire contract changed across gateway versions, so the variant is an
/// explicit per-client policy rather than something the decoder guesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SseFraming {
    /// `event:`/`data:` records terminated by a blank line, ended by a
    /// `stream-end` event (older gateways).
    Records,
    /// `data: `-prefixed lines carrying completion chunks, ended by the
    /// `data: [DONE]` sentinel (current gateways).
    #[default]
    Lines,
}

/// Kind of a decoded stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// The stream has started.
    StreamStart,
    /// A new message has started.
    MessageStart,
    /// Content is about to be delivered.
    ContentStart,
    /// An incremental content fragment.
    ContentDelta,
    /// Content delivery has finished.
    ContentEnd,
    /// The message has finished.
    MessageEnd,
    /// The stream has completed normally.
    StreamEnd,
    /// A failure, reported by the gateway or synthesized by the decoder.
    Error,
    /// An event kind this SDK does not recognize, preserved verbatim.
    Other(String),
}

impl EventKind {
    /// Wire name of this event kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::StreamStart => "stream-start",
            Self::MessageStart => "message-start",
            Self::ContentStart => "content-start",
            Self::ContentDelta => "content-delta",
            Self::ContentEnd => "content-end",
            Self::MessageEnd => "message-end",
            Self::StreamEnd => "stream-end",
            Self::Error => "error",
            Self::Other(kind) => kind,
        }
    }

    /// Parse a wire name, preserving unrecognized kinds as [`Self::Other`].
    pub fn from_wire(value: &str) -> Self {
        match value {
            "stream-start" => Self::StreamStart,
            "message-start" => Self::MessageStart,
            "content-start" => Self::ContentStart,
            "content-delta" => Self::ContentDelta,
            "content-end" => Self::ContentEnd,
            "message-end" => Self::MessageEnd,
            "stream-end" => Self::StreamEnd,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&value))
    }
}

/// One decoded unit from a live stream.
///
/// Immutable once produced; delivered exactly once through the event channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// The event kind, when the record carried one. Absent means a
    /// data-only event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<EventKind>,
    /// The raw payload, typically a JSON document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
}

impl StreamEvent {
    pub(crate) fn new(event: Option<EventKind>, data: Option<Bytes>) -> Self {
        Self { event, data }
    }

    pub(crate) fn error(message: impl Into<String>) -> Self {
        Self {
            event: Some(EventKind::Error),
            data: Some(Bytes::from(message.into())),
        }
    }

    /// Check if this event ends the stream normally.
    pub fn is_stream_end(&self) -> bool {
        self.event == Some(EventKind::StreamEnd)
    }

    /// Check if this event reports a failure.
    pub fn is_error(&self) -> bool {
        self.event == Some(EventKind::Error)
    }

    /// The payload as UTF-8 text, when present and valid.
    pub fn data_str(&self) -> Option<&str> {
        self.data.as_deref().and_then(|d| std::str::from_utf8(d).ok())
    }

    /// Decode the payload as a completion chunk.
    pub fn chunk(&self) -> Result<StreamChunk> {
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| Error::parse("event has no payload"))?;
        serde_json::from_slice(data)
            .map_err(|e| Error::parse(format!("invalid completion chunk: {e}")))
    }
}

/// A `chat.completion.chunk` payload carried by `content-delta` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Unique identifier for this completion.
    pub id: String,
    /// Object type (always "chat.completion.chunk").
    pub object: String,
    /// Unix timestamp of when the chunk was created.
    pub created: i64,
    /// Model used for the completion.
    pub model: String,
    /// List of completion choices.
    pub choices: Vec<StreamChoice>,
    /// Usage information (only in the final chunk, when requested).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    /// Get the content delta from the first choice.
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .unwrap_or("")
    }

    /// Check if this is the final chunk.
    pub fn is_final(&self) -> bool {
        self.choices
            .first()
            .map(|c| c.finish_reason.is_some())
            .unwrap_or(false)
    }
}

/// A choice in a completion chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    /// Index of this choice.
    pub index: u32,
    /// The delta content.
    pub delta: StreamDelta,
    /// Reason for completion (only in the final chunk).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<crate::response::FinishReason>,
}

/// Delta content in a completion chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Role of the message (only in the first chunk).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,
    /// Content fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Reasoning fragment, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Tool call fragments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<StreamToolCall>>,
}

/// A tool call fragment in a completion chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamToolCall {
    /// Index of this tool call.
    pub index: u32,
    /// Tool call ID (only in its first fragment).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Type of the tool.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub tool_type: Option<crate::request::ToolType>,
    /// Function fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<StreamFunctionCall>,
}

/// A function call fragment in a completion chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamFunctionCall {
    /// Function name (only in the first fragment).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Arguments fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Consumer half of a streaming call.
///
/// Yields [`StreamEvent`]s in the order the decoder produced them; the
/// stream ends when the decoder closes the channel. Dropping the
/// `EventStream` cancels the decoder task promptly.
pub struct EventStream {
    rx: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
}

impl EventStream {
    pub(crate) fn new(rx: mpsc::Receiver<StreamEvent>, cancel: CancellationToken) -> Self {
        Self { rx, cancel }
    }

    /// Receive the next event, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Request cancellation of the producing decoder task.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this stream when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drain the stream, concatenating all `content-delta` fragments.
    ///
    /// Stops at `stream-end`; an in-band error event becomes an
    /// [`Error::Streaming`].
    pub async fn collect_content(mut self) -> Result<String> {
        let mut content = String::new();
        while let Some(event) = self.rx.recv().await {
            match event.event {
                Some(EventKind::ContentDelta) => content.push_str(event.chunk()?.content()),
                Some(EventKind::StreamEnd) => break,
                Some(EventKind::Error) => {
                    return Err(Error::streaming(
                        event.data_str().unwrap_or("stream error").to_string(),
                    ));
                }
                _ => {}
            }
        }
        Ok(content)
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Spawn the decoder task for a response body.
///
/// The task owns the body exclusively, publishes events into a bounded
/// channel, and closes the channel on every exit path: normal termination,
/// read error, cancellation, or consumer abandonment.
pub(crate) fn spawn_decoder<S, E>(
    body: S,
    framing: SseFraming,
    cancel: CancellationToken,
) -> mpsc::Receiver<StreamEvent>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(decode_loop(body, framing, cancel, tx));
    rx
}

async fn decode_loop<S, E>(
    body: S,
    framing: SseFraming,
    cancel: CancellationToken,
    tx: mpsc::Sender<StreamEvent>,
) where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send,
    E: std::fmt::Display,
{
    use futures::StreamExt;

    let mut body = std::pin::pin!(body);
    let mut buffer = BytesMut::new();

    loop {
        let chunk = tokio::select! {
            () = cancel.cancelled() => {
                debug!("stream canceled by caller");
                let _ = tx.send(StreamEvent::error("request canceled")).await;
                return;
            }
            chunk = body.next() => chunk,
        };

        match chunk {
            None => break,
            Some(Err(e)) => {
                let _ = tx
                    .send(StreamEvent::error(format!("error reading stream chunk: {e}")))
                    .await;
                return;
            }
            Some(Ok(bytes)) => {
                buffer.extend_from_slice(&bytes);
                match framing {
                    SseFraming::Records => {
                        if drain_records(&mut buffer, &tx).await.is_break() {
                            return;
                        }
                    }
                    SseFraming::Lines => {
                        if drain_lines(&mut buffer, &tx).await.is_break() {
                            return;
                        }
                    }
                }
            }
        }
    }

    // Clean end of stream. A pending partial record is flushed in records
    // mode; lines mode discards incomplete trailing input.
    if framing == SseFraming::Records && buffer.iter().any(|b| !b.is_ascii_whitespace()) {
        match parse_record(&buffer) {
            Ok(event) => {
                let _ = tx.send(event).await;
            }
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::error(format!("error parsing stream event: {e}")))
                    .await;
            }
        }
    }
}

/// Emit every complete record in the buffer. Breaks when the stream is done
/// (terminal event seen or consumer gone).
async fn drain_records(
    buffer: &mut BytesMut,
    tx: &mpsc::Sender<StreamEvent>,
) -> std::ops::ControlFlow<()> {
    use std::ops::ControlFlow;

    while let Some(end) = buffer.windows(2).position(|w| w == b"\n\n") {
        let record = buffer.split_to(end + 2);

        let event = match parse_record(&record[..end]) {
            Ok(event) => event,
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::error(format!("error parsing stream event: {e}")))
                    .await;
                return ControlFlow::Break(());
            }
        };

        // Comment and keepalive records carry no fields.
        if event.event.is_none() && event.data.is_none() {
            continue;
        }

        let terminal = event.is_stream_end();
        if tx.send(event).await.is_err() || terminal {
            return ControlFlow::Break(());
        }
    }

    ControlFlow::Continue(())
}

/// Emit every complete `data: ` line in the buffer. Breaks on the `[DONE]`
/// sentinel or when the consumer is gone.
async fn drain_lines(
    buffer: &mut BytesMut,
    tx: &mpsc::Sender<StreamEvent>,
) -> std::ops::ControlFlow<()> {
    use std::ops::ControlFlow;

    while let Some(end) = buffer.iter().position(|&b| b == b'\n') {
        let line = buffer.split_to(end + 1);
        let mut line = &line[..end];
        if line.ends_with(b"\r") {
            line = &line[..line.len() - 1];
        }

        if line.is_empty() {
            continue;
        }

        let Some(payload) = line.strip_prefix(b"data: ") else {
            continue;
        };

        if payload == b"[DONE]".as_slice() {
            let _ = tx
                .send(StreamEvent::new(Some(EventKind::StreamEnd), None))
                .await;
            return ControlFlow::Break(());
        }

        let event = StreamEvent::new(
            Some(EventKind::ContentDelta),
            Some(Bytes::copy_from_slice(payload)),
        );
        if tx.send(event).await.is_err() {
            return ControlFlow::Break(());
        }
    }

    ControlFlow::Continue(())
}

/// Parse one record into an event: split each line once on the first colon,
/// trim both sides, `data` sets the payload and `event` sets the kind.
fn parse_record(record: &[u8]) -> Result<StreamEvent> {
    let text = std::str::from_utf8(record)
        .map_err(|e| Error::parse(format!("record is not valid UTF-8: {e}")))?;

    let mut event = None;
    let mut data = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        match field.trim() {
            "data" => data = Some(Bytes::copy_from_slice(value.trim().as_bytes())),
            "event" => event = Some(EventKind::from_wire(value.trim())),
            _ => {}
        }
    }

    Ok(StreamEvent::new(event, data))
}
