//! Incremental decoding of the streamed coach reply body.
//!
//! The body is a sequence of concatenated JSON objects, not newline- or
//! SSE-delimited: object boundaries have to be discovered by parsing. A
//! single object may span several transport chunks and a single chunk may
//! carry several complete objects plus the prefix of the next one.

use async_stream::stream;
use futures::StreamExt;
use std::pin::Pin;
use tokio_stream::Stream;

use crate::types::StreamEvent;

/// Agent id used when the backend never names one
pub const DEFAULT_AGENT_ID: &str = "Default";

/// Events emitted while decoding one streamed reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyEvent {
    /// One incremental piece of display text
    Fragment { text: String },
    /// Reply finished; `text` is the full reply with the agent header
    /// folded in exactly once
    Done { agent_id: String, text: String },
    /// Transport failed mid-stream
    Error { message: String },
}

/// A stream of reply events
pub type ReplyEventStream = Pin<Box<dyn Stream<Item = ReplyEvent> + Send>>;

/// Incremental parser for a concatenated-JSON reply body.
///
/// Feed it transport chunks in whatever sizes they arrive; it drains
/// complete JSON objects from the front of its buffer and keeps the
/// unconsumed tail until more data makes it parseable. The buffer holds
/// raw bytes: a chunk boundary may fall inside a multi-byte UTF-8
/// character, so chunks cannot be converted to text individually.
#[derive(Debug, Default)]
pub struct FragmentDecoder {
    buffer: Vec<u8>,
    agent_id: Option<String>,
}

impl FragmentDecoder {
    /// Feed arbitrary bytes and drain the display fragments they complete.
    ///
    /// The first non-empty content fragment of the stream is preceded by a
    /// header fragment `"{agent_id}: "`; empty content never emits and
    /// never triggers the header.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut fragments = Vec::new();

        loop {
            let parsed = {
                let mut objects =
                    serde_json::Deserializer::from_slice(&self.buffer).into_iter::<StreamEvent>();
                match objects.next() {
                    Some(Ok(event)) => Some((event, objects.byte_offset())),
                    // Incomplete trailing data: keep the buffer and wait
                    // for the next chunk. A genuinely malformed tail never
                    // completes and is dropped in finish().
                    Some(Err(_)) | None => None,
                }
            };

            let Some((event, consumed)) = parsed else {
                break;
            };
            self.buffer.drain(..consumed);
            let whitespace = self.buffer.len() - self.buffer.trim_ascii_start().len();
            self.buffer.drain(..whitespace);

            let Some(content) = event.content() else {
                continue;
            };
            if content.is_empty() {
                continue;
            }

            if self.agent_id.is_none() {
                let agent_id = event
                    .agent_id
                    .clone()
                    .unwrap_or_else(|| DEFAULT_AGENT_ID.to_string());
                fragments.push(format!("{agent_id}: "));
                self.agent_id = Some(agent_id);
            }
            fragments.push(content.to_string());
        }

        fragments
    }

    /// Agent id confirmed by the backend, once a content fragment has been
    /// seen.
    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    /// End of transport. Discards any unparsed trailing bytes and returns
    /// the confirmed agent id, if any.
    pub fn finish(self) -> Option<String> {
        let trailing = self.buffer.trim_ascii();
        if !trailing.is_empty() {
            tracing::warn!(
                bytes = trailing.len(),
                "discarding unparsed trailing data at end of stream"
            );
        }
        self.agent_id
    }
}

/// Decode a streamed reply body into [`ReplyEvent`]s.
///
/// Yields one `Fragment` per emitted piece of text and terminates with
/// either `Done` (carrying the accumulated reply) or `Error` (transport
/// failure mid-stream). A reply with zero fragments still produces `Done`,
/// with empty accumulated text and the agent id falling back to
/// [`DEFAULT_AGENT_ID`].
pub fn decode_reply<S, B, E>(body: S) -> ReplyEventStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(stream! {
        let mut body = std::pin::pin!(body);
        let mut decoder = FragmentDecoder::default();
        let mut accumulated = String::new();

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for text in decoder.feed(bytes.as_ref()) {
                        accumulated.push_str(&text);
                        yield ReplyEvent::Fragment { text };
                    }
                }
                Err(e) => {
                    yield ReplyEvent::Error {
                        message: format!("stream error: {e}"),
                    };
                    return;
                }
            }
        }

        let agent_id = decoder
            .finish()
            .unwrap_or_else(|| DEFAULT_AGENT_ID.to_string());
        yield ReplyEvent::Done { agent_id, text: accumulated };
    })
}
