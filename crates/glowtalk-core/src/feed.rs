//! Incremental reader for the newline-delimited JSON content feed.
//!
//! The feed may stream megabytes, so nothing here buffers the whole body:
//! bytes are split into lines as chunks arrive and each complete line is
//! parsed into a [`ContentFragment`] on demand.

use crate::cancellation::CancellationToken;
use crate::model::ContentFragment;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use thiserror::Error;
use tracing::{debug, info, warn};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Byte stream of a streamed HTTP response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed transport failed: {0}")]
    Transport(#[source] BoxError),
    #[error("malformed feed record on line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// How an ingestion run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Completed { fragments: usize },
    Cancelled { fragments: usize },
}

/// Splits a chunked byte stream into lines.
///
/// Holds only the chunk being consumed plus the partial line carried over from
/// earlier chunks.
#[derive(Debug, Default)]
pub struct LineSplitter {
    partial: Vec<u8>,
    chunk: Bytes,
    cursor: usize,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands the next transport chunk to the splitter.
    ///
    /// Any unconsumed part of the previous chunk is moved into the partial
    /// line first, so no bytes are lost if a caller pushes early.
    pub fn push(&mut self, chunk: Bytes) {
        if self.cursor < self.chunk.len() {
            self.partial.extend_from_slice(&self.chunk[self.cursor..]);
        }
        self.chunk = chunk;
        self.cursor = 0;
    }

    /// Next complete line without its terminator, or `None` once the current
    /// chunk is exhausted.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let rest = &self.chunk[self.cursor..];
        match rest.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                let mut line = std::mem::take(&mut self.partial);
                line.extend_from_slice(&rest[..pos]);
                self.cursor += pos + 1;
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                Some(line)
            }
            None => {
                self.partial.extend_from_slice(rest);
                self.cursor = self.chunk.len();
                None
            }
        }
    }

    /// Bytes of an unterminated line still waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.partial.len() + (self.chunk.len() - self.cursor)
    }

    /// Drops the unterminated tail left at end of stream.
    pub fn discard_tail(&mut self) -> usize {
        let dropped = self.pending_len();
        self.partial.clear();
        self.chunk = Bytes::new();
        self.cursor = 0;
        dropped
    }
}

/// Lazy, cancellable sequence of fragments decoded from a byte stream.
pub struct FeedReader<S> {
    stream: Option<S>,
    splitter: LineSplitter,
    cancel: CancellationToken,
    line_no: usize,
    emitted: usize,
    cancelled: bool,
}

impl<S, E> FeedReader<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<BoxError>,
{
    pub fn new(stream: S, cancel: CancellationToken) -> Self {
        Self {
            stream: Some(stream),
            splitter: LineSplitter::new(),
            cancel,
            line_no: 0,
            emitted: 0,
            cancelled: false,
        }
    }

    /// Next fragment in arrival order.
    ///
    /// `Ok(None)` means the feed ended or was cancelled; the two are told
    /// apart with [`was_cancelled`](Self::was_cancelled). After an error or
    /// `None` the reader stays finished.
    pub async fn next_fragment(&mut self) -> Result<Option<ContentFragment>, FeedError> {
        loop {
            if self.cancel.is_cancelled() {
                self.abort();
                return Ok(None);
            }
            if self.stream.is_none() {
                return Ok(None);
            }

            while let Some(line) = self.splitter.next_line() {
                self.line_no += 1;
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                match decode_line(&line, self.line_no) {
                    Ok(fragment) => {
                        self.emitted += 1;
                        return Ok(Some(fragment));
                    }
                    Err(err) => {
                        warn!(line = self.line_no, "Aborting ingestion: {err}");
                        self.finish();
                        return Err(err);
                    }
                }
            }

            let Some(stream) = self.stream.as_mut() else {
                return Ok(None);
            };
            let cancel = self.cancel.clone();
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = stream.next() => Some(next),
            };
            let Some(next) = next else {
                self.abort();
                return Ok(None);
            };

            match next {
                Some(Ok(chunk)) => self.splitter.push(chunk),
                Some(Err(err)) => {
                    self.finish();
                    return Err(FeedError::Transport(err.into()));
                }
                None => {
                    let dropped = self.splitter.discard_tail();
                    if dropped > 0 {
                        debug!(bytes = dropped, "Discarding unterminated record at end of feed");
                    }
                    self.stream = None;
                    return Ok(None);
                }
            }
        }
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn fragments_emitted(&self) -> usize {
        self.emitted
    }

    fn abort(&mut self) {
        if !self.cancelled {
            debug!(fragments = self.emitted, "Feed read cancelled; releasing transport");
        }
        self.cancelled = true;
        self.finish();
    }

    fn finish(&mut self) {
        self.stream = None;
        self.splitter.discard_tail();
    }
}

fn decode_line(line: &[u8], line_no: usize) -> Result<ContentFragment, FeedError> {
    let text = std::str::from_utf8(line).map_err(|err| FeedError::Malformed {
        line: line_no,
        reason: format!("invalid UTF-8: {err}"),
    })?;
    let fragment: ContentFragment =
        serde_json::from_str(text.trim()).map_err(|err| FeedError::Malformed {
            line: line_no,
            reason: err.to_string(),
        })?;
    if fragment.announcement().is_none() {
        return Err(FeedError::Malformed {
            line: line_no,
            reason: format!("fragment {} has no announcement piece", fragment.id),
        });
    }
    Ok(fragment)
}

/// Opens the streamed content feed at `url`.
pub async fn open_feed(
    client: &reqwest::Client,
    url: &str,
    cancel: CancellationToken,
) -> Result<FeedReader<ByteStream>, FeedError> {
    info!(%url, "Opening content feed");
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|err| FeedError::Transport(err.into()))?;
    let stream: ByteStream = Box::pin(response.bytes_stream());
    Ok(FeedReader::new(stream, cancel))
}

/// Drives `reader` to the end, handing each fragment to `on_fragment`.
pub async fn ingest<S, E, F>(
    reader: &mut FeedReader<S>,
    mut on_fragment: F,
) -> Result<IngestOutcome, FeedError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<BoxError>,
    F: FnMut(ContentFragment),
{
    while let Some(fragment) = reader.next_fragment().await? {
        on_fragment(fragment);
    }
    let fragments = reader.fragments_emitted();
    if reader.was_cancelled() {
        Ok(IngestOutcome::Cancelled { fragments })
    } else {
        info!(fragments, "Content feed complete");
        Ok(IngestOutcome::Completed { fragments })
    }
}
