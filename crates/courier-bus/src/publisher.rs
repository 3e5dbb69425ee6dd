//! # Envelope Publisher
//!
//! Defines the publishing side of the bus.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use courier_envelope::{codec, CodecError, Envelope};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::filter::EnvelopeFilter;
use crate::subscriber::{EnvelopeStream, Subscription, SubscriptionGuard};
use crate::DEFAULT_CHANNEL_CAPACITY;

/// Errors from publish operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The envelope could not be encoded to wire JSON.
    #[error("Failed to encode envelope: {0}")]
    Encoding(#[from] CodecError),
}

/// Trait for publishing envelopes to the bus.
#[async_trait]
pub trait EnvelopePublisher: Send + Sync {
    /// Publish an envelope to the bus.
    ///
    /// # Returns
    ///
    /// The number of active subscribers that received the envelope.
    async fn publish(&self, envelope: &Envelope) -> Result<usize, PublishError>;

    /// Get the total number of envelopes published.
    fn envelopes_published(&self) -> u64;
}

/// In-memory implementation of the envelope bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics.
/// Envelopes travel as encoded wire JSON, exactly as they would through an
/// external broker; subscribers decode on receipt.
pub struct InMemoryEnvelopeBus {
    /// Broadcast sender for wire messages.
    sender: broadcast::Sender<Arc<str>>,

    /// Active subscription count by filter key.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Total messages published.
    envelopes_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryEnvelopeBus {
    /// Create a new in-memory bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            envelopes_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to envelopes matching a filter.
    ///
    /// Only messages published after this call are delivered.
    #[must_use]
    pub fn subscribe(&self, filter: EnvelopeFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let guard = SubscriptionGuard::register(self.subscriptions.clone(), filter.key());

        debug!(
            categories = ?filter.categories,
            event_types = ?filter.event_types,
            "New subscription created"
        );

        Subscription::new(receiver, filter, guard)
    }

    /// Get a stream of envelopes matching a filter.
    #[must_use]
    pub fn envelope_stream(&self, filter: EnvelopeFilter) -> EnvelopeStream {
        self.subscribe(filter).into_stream()
    }

    /// Relay wire text to subscribers without decoding it first.
    ///
    /// Subscribers decode on receipt and skip text that is not a valid
    /// envelope.
    pub fn publish_raw(&self, wire: impl Into<Arc<str>>) -> usize {
        self.envelopes_published.fetch_add(1, Ordering::Relaxed);
        match self.sender.send(wire.into()) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("Raw message dropped (no receivers)");
                0
            }
        }
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the number of live subscriptions registered under `filter`.
    #[must_use]
    pub fn subscriptions_for(&self, filter: &EnvelopeFilter) -> usize {
        self.subscriptions
            .read()
            .map(|subs| subs.get(&filter.key()).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEnvelopeBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EnvelopePublisher for InMemoryEnvelopeBus {
    async fn publish(&self, envelope: &Envelope) -> Result<usize, PublishError> {
        let wire = codec::encode(envelope)?;

        // Always increment counter (publish was attempted)
        self.envelopes_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(Arc::from(wire)) {
            Ok(receiver_count) => {
                debug!(
                    event_type = envelope.event_type(),
                    from = envelope.from(),
                    receivers = receiver_count,
                    "Envelope published"
                );
                Ok(receiver_count)
            }
            Err(e) => {
                // No receivers - envelope is dropped
                warn!(
                    event_type = envelope.event_type(),
                    from = envelope.from(),
                    error = %e,
                    "Envelope dropped (no receivers)"
                );
                Ok(0)
            }
        }
    }

    fn envelopes_published(&self) -> u64 {
        self.envelopes_published.load(Ordering::Relaxed)
    }
}
