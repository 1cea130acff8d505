//! Generation queue status, polled or pushed as a server-sent event stream.

use crate::cancellation::CancellationToken;
use crate::feed::{BoxError, ByteStream, LineSplitter};
use crate::progress::GenerationEta;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("status transport failed: {0}")]
    Transport(#[source] BoxError),
    #[error("malformed status payload: {0}")]
    Malformed(String),
}

/// Counts of generation jobs by state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct GenerationStatus {
    #[serde(default)]
    pub pending: usize,
    #[serde(default)]
    pub in_progress: usize,
    #[serde(default)]
    pub completed: usize,
    #[serde(default)]
    pub failed: usize,
}

impl GenerationStatus {
    pub fn parse(text: &str) -> Result<Self, StatusError> {
        serde_json::from_str(text.trim()).map_err(|err| StatusError::Malformed(err.to_string()))
    }

    /// Jobs that have not reached a final state.
    pub fn remaining(&self) -> usize {
        self.pending + self.in_progress
    }

    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.completed + self.failed
    }
}

/// Line-level parser for `text/event-stream` bodies.
///
/// Only `data` fields matter; other fields and comments are ignored.
#[derive(Debug, Default)]
pub struct SseParser {
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line without its terminator; returns a message payload when
    /// the line completes one.
    pub fn feed_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            let message = self.data.join("\n");
            self.data.clear();
            return Some(message);
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }
}

/// Cancellable sequence of status snapshots pushed by the server.
pub struct StatusSubscription<S> {
    stream: Option<S>,
    splitter: LineSplitter,
    parser: SseParser,
    cancel: CancellationToken,
}

impl<S, E> StatusSubscription<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<BoxError>,
{
    pub fn new(stream: S, cancel: CancellationToken) -> Self {
        Self {
            stream: Some(stream),
            splitter: LineSplitter::new(),
            parser: SseParser::new(),
            cancel,
        }
    }

    /// Next snapshot, or `None` once the stream ends or is cancelled.
    ///
    /// Unreadable messages are skipped; only transport failures end the
    /// subscription with an error.
    pub async fn next_status(&mut self) -> Result<Option<GenerationStatus>, StatusError> {
        loop {
            if self.cancel.is_cancelled() {
                self.stream = None;
                return Ok(None);
            }
            while let Some(line) = self.splitter.next_line() {
                let Ok(line) = std::str::from_utf8(&line) else {
                    warn!("Skipping non UTF-8 status line");
                    continue;
                };
                let Some(message) = self.parser.feed_line(line) else {
                    continue;
                };
                match GenerationStatus::parse(&message) {
                    Ok(status) => return Ok(Some(status)),
                    Err(err) => warn!("Skipping status message: {err}"),
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
            match next {
                None => {
                    debug!("Status subscription cancelled");
                    self.stream = None;
                    return Ok(None);
                }
                Some(Some(Ok(chunk))) => self.splitter.push(chunk),
                Some(Some(Err(err))) => {
                    self.stream = None;
                    return Err(StatusError::Transport(err.into()));
                }
                Some(None) => {
                    self.stream = None;
                    self.splitter.discard_tail();
                    return Ok(None);
                }
            }
        }
    }
}

/// Opens a pushed status stream at `url`.
pub async fn subscribe_status(
    client: &reqwest::Client,
    url: &str,
    cancel: CancellationToken,
) -> Result<StatusSubscription<ByteStream>, StatusError> {
    info!(%url, "Subscribing to generation status");
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|err| StatusError::Transport(err.into()))?;
    let stream: ByteStream = Box::pin(response.bytes_stream());
    Ok(StatusSubscription::new(stream, cancel))
}

/// Fetches one status snapshot from the queue status endpoint.
pub async fn fetch_status(
    client: &reqwest::Client,
    url: &str,
) -> Result<GenerationStatus, StatusError> {
    let body = client
        .get(url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|err| StatusError::Transport(err.into()))?
        .text()
        .await
        .map_err(|err| StatusError::Transport(err.into()))?;
    GenerationStatus::parse(&body)
}

/// What changed between two status snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub status: GenerationStatus,
    /// More clips finished since the last snapshot; the feed may have new audio.
    pub new_clips: bool,
    pub total_changed: bool,
    pub eta: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct StatusTracker {
    last: Option<GenerationStatus>,
    eta: GenerationEta,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<GenerationStatus> {
        self.last
    }

    pub fn observe(&mut self, status: GenerationStatus, at: Instant) -> StatusChange {
        let eta = self.eta.observe(status.remaining(), at);
        let (new_clips, total_changed) = match self.last {
            Some(last) => (
                status.completed > last.completed,
                status.total() != last.total(),
            ),
            None => (false, true),
        };
        self.last = Some(status);
        if new_clips {
            debug!(
                completed = status.completed,
                remaining = status.remaining(),
                "New clips generated"
            );
        }
        StatusChange {
            status,
            new_clips,
            total_changed,
            eta,
        }
    }
}
