#[cfg(test)]
#[path = "decoder_test.rs"]
mod tests;

use async_trait::async_trait;
use eyre::{Context, Result};
use futures::TryStreamExt;
use futures::stream::{BoxStream, StreamExt};
use std::collections::VecDeque;
use thiserror::Error;

use super::codec::{self, DecodeError};

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("decoder already completed")]
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Streaming,
    Complete,
}

/// The outcome of flushing one unit.
#[derive(Debug)]
pub struct UnitOutcome {
    pub unit: String,
    pub result: Result<String, DecodeError>,
}

impl UnitOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// StreamDecoder turns newline delimited base64 units into text.
///
/// Bytes are buffered until a `\n` completes a unit; only complete units are
/// decoded. Whatever is left when the stream ends is flushed by
/// [`StreamDecoder::finish`].
#[derive(Debug)]
pub struct StreamDecoder {
    text: String,
    pending: String,
    state: DecoderState,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            text: prefix.into(),
            ..Self::default()
        }
    }

    /// push appends a chunk and flushes every unit it completes, in arrival
    /// order. Empty units are skipped without an outcome.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<UnitOutcome>, StreamError> {
        if self.state == DecoderState::Complete {
            return Err(StreamError::Completed);
        }

        self.pending.push_str(&String::from_utf8_lossy(chunk));
        let Some(last_newline) = self.pending.rfind('\n') else {
            return Ok(vec![]);
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        let outcomes = complete
            .split('\n')
            .filter(|unit| !unit.is_empty())
            .map(|unit| self.flush(unit))
            .collect();
        Ok(outcomes)
    }

    /// finish flushes the pending partial unit, if any, and completes the
    /// decoder. A failed flush leaves the partial data out of the text.
    pub fn finish(&mut self) -> Result<Option<UnitOutcome>, StreamError> {
        if self.state == DecoderState::Complete {
            return Err(StreamError::Completed);
        }
        self.state = DecoderState::Complete;

        if self.pending.is_empty() {
            return Ok(None);
        }
        let unit = std::mem::take(&mut self.pending);
        Ok(Some(self.flush(&unit)))
    }

    fn flush(&mut self, unit: &str) -> UnitOutcome {
        let result = codec::decode(unit);
        if let Ok(text) = &result {
            self.text.push_str(text);
        }
        UnitOutcome {
            unit: unit.to_string(),
            result,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self {
            text: String::new(),
            pending: String::new(),
            state: DecoderState::Streaming,
        }
    }
}

/// Source of raw body chunks. `Ok(None)` marks the end of the stream.
#[async_trait]
pub trait ChunkStream: Send {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

pub type BoxChunkStream = Box<dyn ChunkStream>;

pub struct HttpChunkStream {
    inner: BoxStream<'static, reqwest::Result<Vec<u8>>>,
}

impl HttpChunkStream {
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            inner: response.bytes_stream().map_ok(|b| b.to_vec()).boxed(),
        }
    }
}

#[async_trait]
impl ChunkStream for HttpChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self.inner.next().await {
            Some(chunk) => Ok(Some(chunk.wrap_err("reading response chunk")?)),
            None => Ok(None),
        }
    }
}

/// Chunk stream over bytes already in memory.
#[derive(Debug, Default)]
pub struct MemoryChunkStream {
    chunks: VecDeque<Vec<u8>>,
}

impl MemoryChunkStream {
    pub fn new<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ChunkStream for MemoryChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.chunks.pop_front())
    }
}

/// Receives the full accumulated text every time it changes.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn update(&self, text: &str) -> Result<()>;
}

#[derive(Debug)]
pub struct StreamReport {
    pub text: String,
    pub failures: Vec<UnitOutcome>,
}

/// stream_to_message drives a [`StreamDecoder`] over `stream`, updating
/// `sink` after every chunk. Decode failures do not stop the stream; they are
/// collected into the report. Transport errors are returned.
pub async fn stream_to_message<S, K>(
    stream: &mut S,
    sink: &K,
    prefix: Option<&str>,
) -> Result<StreamReport>
where
    S: ChunkStream + ?Sized,
    K: MessageSink + ?Sized,
{
    let mut decoder = StreamDecoder::with_prefix(prefix.unwrap_or_default());
    let mut failures = vec![];

    while let Some(chunk) = stream.next_chunk().await? {
        let outcomes = decoder.push(&chunk)?;
        failures.extend(outcomes.into_iter().filter(|o| !o.is_ok()));
        sink.update(decoder.text())
            .await
            .wrap_err("updating message")?;
    }

    if let Some(outcome) = decoder.finish()? {
        if outcome.is_ok() {
            sink.update(decoder.text())
                .await
                .wrap_err("updating message")?;
        } else {
            failures.push(outcome);
        }
    }

    Ok(StreamReport {
        text: decoder.into_text(),
        failures,
    })
}
