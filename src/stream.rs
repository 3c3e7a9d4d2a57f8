//! Filtered stream consumer.
//!
//! Opens one persistent POST connection to `statuses/filter.json` and turns
//! the newline-delimited JSON body into [`StreamEvent`]s. Lines that do not
//! parse as a [`Tweet`] (keep-alive blanks, delete/limit notices, garbage)
//! are dropped without surfacing an error. There is no reconnection: each
//! subscription is one connection, read until the peer closes it or the
//! subscription is cancelled.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace, warn};

use crate::client::TwitterClient;
use crate::error::{Result, TwitterError};
use crate::params::ParameterSet;
use crate::types::{StreamFilter, Tweet};

/// Streaming endpoint, relative to the stream base URL.
pub const FILTER_ENDPOINT: &str = "statuses/filter.json";

/// An event produced by a subscription.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum StreamEvent {
    /// A line parsed as a status.
    TweetReceived(Tweet),
}

/// How a subscription's read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The peer closed the connection (end of stream).
    Closed,
    /// The subscription was cancelled.
    Cancelled,
    /// The consumer dropped its receiver.
    ReceiverDropped,
}

/// A live filtered-stream connection.
///
/// Events arrive in line order. Consume them with [`recv`](Self::recv),
/// [`blocking_recv`](Self::blocking_recv), [`for_each`](Self::for_each), or
/// as a [`futures::Stream`].
///
/// Dropping a subscription cancels its read loop and releases the connection.
pub struct Subscription {
    events: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
    handle: JoinHandle<Result<StreamEnd>>,
    _cancel_on_drop: DropGuard,
}

impl Subscription {
    /// Spawn the read loop over `body`, delivering into a channel of
    /// `capacity` events.
    pub(crate) fn spawn<S, E>(body: S, capacity: usize) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: Into<TwitterError> + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(pump_lines(body, event_tx, cancel.clone()));

        Self {
            events: event_rx,
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            handle,
        }
    }

    /// Wait for the next event; `None` once the read loop has ended.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Blocking variant of [`recv`](Self::recv) for use outside the runtime.
    pub fn blocking_recv(&mut self) -> Option<StreamEvent> {
        self.events.blocking_recv()
    }

    /// Stop the read loop. Events already queued can still be received.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this subscription when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Invoke `on_tweet` for every received status until the stream ends,
    /// then report how it ended.
    pub async fn for_each<F>(mut self, mut on_tweet: F) -> Result<StreamEnd>
    where
        F: FnMut(Tweet),
    {
        while let Some(event) = self.events.recv().await {
            match event {
                StreamEvent::TweetReceived(tweet) => on_tweet(tweet),
            }
        }
        self.join().await
    }

    /// Wait for the read loop to finish.
    ///
    /// Drops the event receiver first, so a loop that is still running ends
    /// promptly with [`StreamEnd::ReceiverDropped`]. A transport failure in
    /// the middle of the stream is returned here.
    pub async fn join(self) -> Result<StreamEnd> {
        let Self {
            events,
            handle,
            _cancel_on_drop: guard,
            ..
        } = self;
        drop(events);
        let joined = handle.await;
        // The loop has finished; dropping the guard now cannot change its end.
        drop(guard);

        match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Ok(StreamEnd::Cancelled),
        }
    }
}

impl Stream for Subscription {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl TwitterClient {
    /// Open a filtered stream.
    ///
    /// Fails with `NotAuthenticated` before credentials are set, with
    /// `InvalidArgument` when the filter is empty, and with `Transport` when
    /// the connection cannot be established. The body is then read on a
    /// spawned task.
    pub async fn subscribe(&self, filter: &StreamFilter) -> Result<Subscription> {
        self.credentials().check_ready()?;
        let params = filter_params(filter)?;

        let url = self.stream_url(FILTER_ENDPOINT);
        let signed = self.sign_request(&url, params)?;

        info!(
            %url,
            track = filter.hashtags.len(),
            languages = filter.languages.len(),
            locations = filter.bounding_boxes.len(),
            "Connecting to Twitter filtered stream"
        );

        let response = self.post_signed(self.stream_http(), &url, &signed).await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "Stream endpoint returned non-success status");
        }

        Ok(Subscription::spawn(
            response.bytes_stream(),
            self.config().stream_buffer,
        ))
    }
}

/// `track`, `language` and `locations` parameters, omitting empty ones.
pub fn filter_params(filter: &StreamFilter) -> Result<ParameterSet> {
    if filter.is_empty() {
        return Err(TwitterError::InvalidArgument(
            "At least one hashtag, language or bounding box is required".to_string(),
        ));
    }

    let mut params = ParameterSet::new();
    for (key, value) in [
        ("track", filter.track_param()),
        ("language", filter.language_param()),
        ("locations", filter.locations_param()),
    ] {
        if !value.is_empty() {
            params = params.with(key, value);
        }
    }
    Ok(params)
}

/// Parse one stream line as a status.
pub fn parse_line(line: &str) -> Result<Tweet> {
    Ok(serde_json::from_str(line)?)
}

/// Longest line kept before it is discarded as garbage.
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Accumulates body chunks and yields complete lines.
#[derive(Debug)]
struct LineBuffer {
    buffer: BytesMut,
    // Bytes already searched for a newline.
    scanned: usize,
    // Dropping the rest of an oversized line.
    discarding: bool,
    max_line: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    fn with_limit(max_line: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
            discarding: false,
            max_line,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete line without its `\n` / `\r\n` terminator.
    fn next_line(&mut self) -> Option<String> {
        loop {
            match self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
                Some(offset) => {
                    let line = self.buffer.split_to(self.scanned + offset + 1);
                    self.scanned = 0;
                    if std::mem::take(&mut self.discarding) {
                        continue;
                    }
                    return Some(decode_line(&line));
                }
                None if self.buffer.len() > self.max_line => {
                    if !self.discarding {
                        warn!(limit = self.max_line, "Discarding oversized stream line");
                    }
                    self.buffer.clear();
                    self.scanned = 0;
                    self.discarding = true;
                    return None;
                }
                None => {
                    self.scanned = self.buffer.len();
                    return None;
                }
            }
        }
    }

    /// Whatever is left after the final newline.
    fn finish(&mut self) -> Option<String> {
        let rest = self.buffer.split();
        self.scanned = 0;
        if rest.is_empty() || std::mem::take(&mut self.discarding) {
            return None;
        }
        Some(decode_line(&rest))
    }
}

fn decode_line(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    text.trim_end_matches(|c: char| c == '\n' || c == '\r').to_string()
}

/// Read `body` to completion, delivering one event per parsed line.
pub(crate) async fn pump_lines<S, E>(
    body: S,
    event_tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) -> Result<StreamEnd>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Into<TwitterError>,
{
    futures::pin_mut!(body);
    let mut lines = LineBuffer::default();

    let end = loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => break StreamEnd::Cancelled,
            _ = event_tx.closed() => break StreamEnd::ReceiverDropped,
            chunk = body.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                lines.push(&bytes);
                while let Some(line) = lines.next_line() {
                    if let Some(end) = deliver(&line, &event_tx, &cancel).await {
                        return Ok(log_end(end));
                    }
                }
            }
            Some(Err(e)) => {
                let err: TwitterError = e.into();
                warn!(error = %err, "Stream read failed");
                return Err(err);
            }
            None => {
                if let Some(line) = lines.finish() {
                    if let Some(end) = deliver(&line, &event_tx, &cancel).await {
                        return Ok(log_end(end));
                    }
                }
                break StreamEnd::Closed;
            }
        }
    };

    Ok(log_end(end))
}

/// Parse and send one line. `Some` means the loop must stop.
async fn deliver(
    line: &str,
    event_tx: &mpsc::Sender<StreamEvent>,
    cancel: &CancellationToken,
) -> Option<StreamEnd> {
    let tweet = match parse_line(line) {
        Ok(tweet) => tweet,
        Err(e) => {
            trace!(error = %e, len = line.len(), "Skipping unparseable stream line");
            return None;
        }
    };

    debug!(tweet_id = ?tweet.status_id(), "Received stream tweet");

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Some(StreamEnd::Cancelled),
        sent = event_tx.send(StreamEvent::TweetReceived(tweet)) => match sent {
            Ok(()) => None,
            Err(_) => Some(StreamEnd::ReceiverDropped),
        },
    }
}

fn log_end(end: StreamEnd) -> StreamEnd {
    info!(?end, "Twitter filtered stream ended");
    end
}
