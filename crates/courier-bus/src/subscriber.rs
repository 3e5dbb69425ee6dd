//! # Envelope Subscriber
//!
//! Defines the subscription side of the bus. Subscribers receive wire JSON,
//! decode it, and hand back envelopes that match their filter.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};

use courier_envelope::{codec, Envelope};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::{debug, warn};

use crate::filter::EnvelopeFilter;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was closed.
    #[error("Envelope bus closed")]
    Closed,
}

/// Keeps a subscription registered with the bus until dropped.
pub(crate) struct SubscriptionGuard {
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    key: String,
}

impl SubscriptionGuard {
    pub(crate) fn register(
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
        key: String,
    ) -> Self {
        if let Ok(mut subs) = subscriptions.write() {
            *subs.entry(key.clone()).or_insert(0) += 1;
        }
        Self { subscriptions, key }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let Ok(mut subs) = self.subscriptions.write() else {
            return;
        };
        let Some(count) = subs.get_mut(&self.key) else {
            debug!(filter = %self.key, "Subscription dropped");
            return;
        };

        *count = count.saturating_sub(1);
        if *count == 0 {
            subs.remove(&self.key);
        }
        debug!(filter = %self.key, "Subscription dropped");
    }
}

/// Decode one wire message and apply the filter.
///
/// Undecodable messages are logged and skipped; they never end the
/// subscription.
fn accept(filter: &EnvelopeFilter, raw: &str) -> Option<Envelope> {
    match codec::decode(raw) {
        Ok(envelope) if filter.matches(&envelope) => Some(envelope),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "Skipping undecodable message");
            None
        }
    }
}

/// A subscription handle for receiving envelopes.
///
/// When dropped, the subscription is automatically cleaned up and no further
/// envelopes are delivered to it.
pub struct Subscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<Arc<str>>,

    /// Filter for this subscription.
    filter: EnvelopeFilter,

    /// Registration with the bus (for cleanup).
    guard: SubscriptionGuard,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<Arc<str>>,
        filter: EnvelopeFilter,
        guard: SubscriptionGuard,
    ) -> Self {
        Self {
            receiver,
            filter,
            guard,
        }
    }

    /// Receive the next envelope that decodes and matches the filter.
    ///
    /// # Returns
    ///
    /// - `Some(envelope)` - The next matching envelope
    /// - `None` - The channel was closed (bus dropped)
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            let raw = match self.receiver.recv().await {
                Ok(raw) => raw,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, some envelopes dropped");
                    continue;
                }
            };

            if let Some(envelope) = accept(&self.filter, &raw) {
                return Some(envelope);
            }
        }
    }

    /// Try to receive the next envelope without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(envelope))` - An envelope was available and matched
    /// - `Ok(None)` - No envelope available (would block)
    /// - `Err(SubscriptionError::Closed)` - The channel was closed
    pub fn try_recv(&mut self) -> Result<Option<Envelope>, SubscriptionError> {
        loop {
            let raw = match self.receiver.try_recv() {
                Ok(raw) => raw,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if let Some(envelope) = accept(&self.filter, &raw) {
                return Ok(Some(envelope));
            }
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn envelope_filter(&self) -> &EnvelopeFilter {
        &self.filter
    }

    /// Convert into a [`Stream`] of envelopes.
    #[must_use]
    pub fn into_stream(self) -> EnvelopeStream {
        EnvelopeStream {
            inner: BroadcastStream::new(self.receiver),
            filter: self.filter,
            _guard: self.guard,
        }
    }
}

/// A stream wrapper for subscriptions.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
pub struct EnvelopeStream {
    inner: BroadcastStream<Arc<str>>,
    filter: EnvelopeFilter,
    _guard: SubscriptionGuard,
}

impl EnvelopeStream {
    /// Get the filter for this stream.
    #[must_use]
    pub fn envelope_filter(&self) -> &EnvelopeFilter {
        &self.filter
    }
}

impl Stream for EnvelopeStream {
    type Item = Envelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(raw))) => {
                    if let Some(envelope) = accept(&self.filter, &raw) {
                        return Poll::Ready(Some(envelope));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    debug!(lagged = count, "Stream lagged, some envelopes dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
