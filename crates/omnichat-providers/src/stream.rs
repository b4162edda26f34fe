//! Cancellable delta streams.
//!
//! A streaming call spawns one producer task that owns the HTTP response and
//! feeds decoded events into a bounded channel; the caller holds the
//! receiving [`DeltaStream`]. Cancelling the stream (explicitly, through its
//! token, or by dropping it) aborts the producer, which drops the response
//! and closes the connection.

use crate::http;
use crate::{Provider, Result, ServiceError, StreamEvent};
use eventsource_stream::{EventStreamError, Eventsource};
use futures::{Stream, StreamExt};
use reqwest::RequestBuilder;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Buffered events between the network reader and the consumer.
const CHANNEL_CAPACITY: usize = 64;

/// Consecutive unparseable records tolerated before the stream fails.
const MAX_MALFORMED_RECORDS: usize = 8;

/// Per-provider decoder from SSE records to stream events.
pub(crate) trait StreamDecoder: Send + 'static {
    /// Decode one SSE record. `event` is the record's event name
    /// ("message" when the record had none).
    fn decode(&mut self, event: &str, data: &str) -> Vec<StreamEvent>;
}

/// Ordered, cancellable sequence of [`StreamEvent`]s for one streaming call.
///
/// Yields deltas in arrival order followed by at most one terminal event.
/// Nothing is yielded after [`DeltaStream::cancel`].
pub struct DeltaStream {
    events: ReceiverStream<StreamEvent>,
    cancel: CancellationToken,
    finished: bool,
}

impl DeltaStream {
    /// Run `producer` on the runtime, handing it the sending half.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(EventSink) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let task = producer(EventSink {
            tx,
            cancel: cancel.clone(),
        });

        let guard = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = guard.cancelled() => debug!("Stream cancelled, closing connection"),
                _ = task => {}
            }
        });

        Self::from_parts(rx, cancel)
    }

    /// A stream that fails immediately without touching the network.
    pub(crate) fn failed(err: ServiceError) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // Capacity is 1 and the channel is fresh, so this cannot fail.
        let _ = tx.try_send(StreamEvent::Failed(err));
        Self::from_parts(rx, CancellationToken::new())
    }

    fn from_parts(rx: mpsc::Receiver<StreamEvent>, cancel: CancellationToken) -> Self {
        Self {
            events: ReceiverStream::new(rx),
            cancel,
            finished: false,
        }
    }

    /// Stop the stream. The network read is aborted and no further events
    /// are yielded; cancellation is not reported as an error.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this stream from another task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drain the stream into the full response text.
    ///
    /// Returns the error of a `Failed` terminal event. A cancelled stream
    /// returns whatever text arrived before cancellation.
    pub async fn into_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(event) = self.next().await {
            match event {
                StreamEvent::Delta(delta) => text.push_str(&delta),
                StreamEvent::Completed => break,
                StreamEvent::Failed(err) => return Err(err),
            }
        }
        Ok(text)
    }
}

impl Stream for DeltaStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished || self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }

        match self.events.poll_next_unpin(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminal() {
                    self.finished = true;
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for DeltaStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl fmt::Debug for DeltaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeltaStream")
            .field("finished", &self.finished)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Sending half handed to a producer task.
pub(crate) struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    /// Forward one event. Returns false once the consumer is gone or has
    /// cancelled, after which the producer should stop.
    pub(crate) async fn send(&self, event: StreamEvent) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(event) => sent.is_ok(),
        }
    }
}

/// Read an SSE body to the end, decoding records into `sink`.
///
/// Ends with exactly one terminal event: the decoder's own, `Completed` at
/// end of input, or `Failed` on transport errors and idle timeouts.
pub(crate) async fn pump<S, B, E, D>(
    body: S,
    mut decoder: D,
    idle_timeout: Duration,
    sink: &EventSink,
) where
    S: Stream<Item = std::result::Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: fmt::Display + Send,
    D: StreamDecoder,
{
    let mut records = Box::pin(lossy_utf8(body).eventsource());
    let mut malformed = 0;

    loop {
        let next = match tokio::time::timeout(idle_timeout, records.next()).await {
            Ok(next) => next,
            Err(_) => {
                let message = format!("No data received for {}s", idle_timeout.as_secs());
                sink.send(StreamEvent::Failed(ServiceError::network(message))).await;
                return;
            }
        };

        let record = match next {
            Some(Ok(record)) => record,
            Some(Err(EventStreamError::Transport(e))) => {
                sink.send(StreamEvent::Failed(ServiceError::network(e.to_string())))
                    .await;
                return;
            }
            Some(Err(e)) => {
                malformed += 1;
                if malformed >= MAX_MALFORMED_RECORDS {
                    sink.send(StreamEvent::Failed(ServiceError::Decoding(e.to_string())))
                        .await;
                    return;
                }
                warn!(error = %e, "Skipping malformed SSE record");
                continue;
            }
            None => {
                sink.send(StreamEvent::Completed).await;
                return;
            }
        };
        malformed = 0;

        trace!(event = %record.event, data = %record.data, "SSE record");

        for event in decoder.decode(&record.event, &record.data) {
            let terminal = event.is_terminal();
            if !sink.send(event).await || terminal {
                return;
            }
        }
    }
}

/// Decode a byte stream as UTF-8, replacing invalid sequences.
///
/// A character split across chunks is carried over to the next chunk, so
/// only bytes that can never form valid UTF-8 become U+FFFD.
fn lossy_utf8<S, B, E>(body: S) -> impl Stream<Item = std::result::Result<String, E>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
{
    body.scan(Vec::new(), |pending: &mut Vec<u8>, chunk| {
        let item = chunk.map(|bytes| {
            pending.extend_from_slice(bytes.as_ref());
            take_utf8(pending)
        });
        futures::future::ready(Some(item))
    })
}

/// Drain the decodable prefix of `pending`, leaving an incomplete trailing
/// character in place.
fn take_utf8(pending: &mut Vec<u8>) -> String {
    let mut text = String::with_capacity(pending.len());
    let mut consumed = 0;

    while consumed < pending.len() {
        match std::str::from_utf8(&pending[consumed..]) {
            Ok(valid) => {
                text.push_str(valid);
                consumed = pending.len();
            }
            Err(e) => {
                let valid_end = consumed + e.valid_up_to();
                let valid = std::str::from_utf8(&pending[consumed..valid_end]).unwrap_or_default();
                text.push_str(valid);
                match e.error_len() {
                    Some(len) => {
                        warn!(bytes = len, "Replacing invalid UTF-8 in stream body");
                        text.push(char::REPLACEMENT_CHARACTER);
                        consumed = valid_end + len;
                    }
                    None => {
                        consumed = valid_end;
                        break;
                    }
                }
            }
        }
    }

    pending.drain(..consumed);
    text
}

/// Execute `request` on a producer task and decode its SSE body.
///
/// A request that could not be built fails the stream without any I/O.
/// Waiting for the response headers is bounded by `idle_timeout` too.
pub(crate) fn open<D: StreamDecoder>(
    request: Result<RequestBuilder>,
    provider: Provider,
    decoder: D,
    idle_timeout: Duration,
) -> DeltaStream {
    let request = match request {
        Ok(request) => request,
        Err(err) => return DeltaStream::failed(err),
    };

    DeltaStream::spawn(move |sink| async move {
        let executed = tokio::time::timeout(idle_timeout, http::execute(request, provider)).await;
        let response = match executed {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                sink.send(StreamEvent::Failed(err)).await;
                return;
            }
            Err(_) => {
                let message = format!("No response received for {}s", idle_timeout.as_secs());
                sink.send(StreamEvent::Failed(ServiceError::network(message))).await;
                return;
            }
        };

        debug!(%provider, "Stream opened");
        pump(response.bytes_stream(), decoder, idle_timeout, &sink).await;
    })
}
