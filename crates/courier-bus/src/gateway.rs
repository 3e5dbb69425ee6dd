//! # Dispatch Gateway
//!
//! Turns inbound envelopes into handler messages.
//!
//! ## Flow
//!
//! ```text
//! Subscription ──▶ resolve requester_id ──▶ MappingRegistry ──▶ HandlerAddress
//!                  (bounded timeout)          │
//!                                             └── None ──▶ dropped (debug log)
//! ```
//!
//! Failures never escape a dispatch: a requester that cannot be resolved is
//! treated as absent, and an envelope nobody maps is dropped.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use courier_envelope::headers::REQUESTER_ID;
use courier_envelope::{codec, CodecError, Envelope, User};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ports::{HandlerAddress, SendError, UserResolver};
use crate::registry::MappingRegistry;
use crate::subscriber::Subscription;

/// Default bound on a single requester lookup.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Why an envelope was not forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// No route for the event type, or the route declined the envelope.
    Unmatched,
    /// The handler refused the mapped message.
    HandlerUnavailable(SendError),
    /// The wire text was not a valid envelope.
    Undecodable(CodecError),
}

/// Result of dispatching one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Forwarded,
    Dropped(DropReason),
}

impl DispatchOutcome {
    #[must_use]
    pub fn is_forwarded(&self) -> bool {
        matches!(self, Self::Forwarded)
    }
}

/// Gateway counters.
#[derive(Debug, Default)]
pub struct GatewayStats {
    received: AtomicU64,
    forwarded: AtomicU64,
    dropped: AtomicU64,
    resolve_failures: AtomicU64,
    send_failures: AtomicU64,
}

impl GatewayStats {
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Envelopes dropped for any reason, send failures included.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Requester lookups that failed or timed out.
    pub fn resolve_failures(&self) -> u64 {
        self.resolve_failures.load(Ordering::Relaxed)
    }

    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Routes envelopes to a handler after resolving the acting user.
///
/// The resolver and the handler address are shared by every dispatch; a
/// gateway behind an `Arc` may dispatch concurrently.
pub struct DispatchGateway<M> {
    handler: Arc<dyn HandlerAddress<M>>,
    resolver: Arc<dyn UserResolver>,
    registry: MappingRegistry<M>,
    resolve_timeout: Duration,
    stats: GatewayStats,
}

impl<M: Send + 'static> DispatchGateway<M> {
    pub fn new(
        handler: Arc<dyn HandlerAddress<M>>,
        resolver: Arc<dyn UserResolver>,
        registry: MappingRegistry<M>,
    ) -> Self {
        Self {
            handler,
            resolver,
            registry,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            stats: GatewayStats::default(),
        }
    }

    /// Set the bound on a single requester lookup.
    #[must_use]
    pub fn with_resolve_timeout(mut self, resolve_timeout: Duration) -> Self {
        self.resolve_timeout = resolve_timeout;
        self
    }

    pub fn resolve_timeout(&self) -> Duration {
        self.resolve_timeout
    }

    pub fn stats(&self) -> &GatewayStats {
        &self.stats
    }

    pub fn registry(&self) -> &MappingRegistry<M> {
        &self.registry
    }

    /// Dispatch one envelope.
    ///
    /// Never fails; the outcome reports what happened.
    pub async fn dispatch(&self, envelope: &Envelope) -> DispatchOutcome {
        GatewayStats::bump(&self.stats.received);

        let requester = self.resolve_requester(envelope).await;

        let Some(message) = self.registry.map(envelope, requester.as_ref()) else {
            GatewayStats::bump(&self.stats.dropped);
            debug!(
                event_type = envelope.event_type(),
                envelope = %envelope
                    .to_pretty_json()
                    .unwrap_or_else(|e| format!("<unencodable: {e}>")),
                "No mapping for envelope, dropping"
            );
            return DispatchOutcome::Dropped(DropReason::Unmatched);
        };

        match self.handler.send(message) {
            Ok(()) => {
                GatewayStats::bump(&self.stats.forwarded);
                debug!(
                    event_type = envelope.event_type(),
                    from = envelope.from(),
                    requester = requester.as_ref().map(|u| u.identifier.as_str()),
                    "Envelope forwarded"
                );
                DispatchOutcome::Forwarded
            }
            Err(e) => {
                GatewayStats::bump(&self.stats.send_failures);
                GatewayStats::bump(&self.stats.dropped);
                warn!(
                    event_type = envelope.event_type(),
                    error = %e,
                    "Handler refused message, dropping envelope"
                );
                DispatchOutcome::Dropped(DropReason::HandlerUnavailable(e))
            }
        }
    }

    /// Decode wire text and dispatch the envelope it carries.
    pub async fn dispatch_wire(&self, input: &str) -> DispatchOutcome {
        match codec::decode(input) {
            Ok(envelope) => self.dispatch(&envelope).await,
            Err(e) => {
                GatewayStats::bump(&self.stats.received);
                GatewayStats::bump(&self.stats.dropped);
                warn!(error = %e, "Undecodable envelope, dropping");
                DispatchOutcome::Dropped(DropReason::Undecodable(e))
            }
        }
    }

    /// Look up the user named by the `requester_id` custom header.
    async fn resolve_requester(&self, envelope: &Envelope) -> Option<User> {
        let identifier = envelope
            .custom_header(REQUESTER_ID)
            .filter(|id| !id.trim().is_empty())?;

        match tokio::time::timeout(self.resolve_timeout, self.resolver.resolve(identifier)).await {
            Ok(Ok(Some(user))) => Some(user),
            Ok(Ok(None)) => {
                debug!(requester_id = identifier, "Requester not found");
                None
            }
            Ok(Err(e)) => {
                GatewayStats::bump(&self.stats.resolve_failures);
                warn!(requester_id = identifier, error = %e, "Requester resolution failed");
                None
            }
            Err(_) => {
                GatewayStats::bump(&self.stats.resolve_failures);
                warn!(
                    requester_id = identifier,
                    timeout_ms = self.resolve_timeout.as_millis() as u64,
                    "Requester resolution timed out"
                );
                None
            }
        }
    }

    /// Dispatch on its own task so a panicking mapping costs one envelope,
    /// not the receive loop. Awaited before the next envelope is taken.
    async fn dispatch_isolated(self: &Arc<Self>, envelope: Envelope) {
        let event_type = envelope.event_type().to_string();
        let gateway = Arc::clone(self);
        let task = tokio::spawn(async move { gateway.dispatch(&envelope).await });

        if let Err(e) = task.await {
            GatewayStats::bump(&self.stats.dropped);
            warn!(
                event_type = %event_type,
                panicked = e.is_panic(),
                error = %e,
                "Dispatch aborted, dropping envelope"
            );
        }
    }

    /// Run the receive loop for `subscription` on a new task.
    ///
    /// Envelopes are dispatched one at a time, in delivery order. A dispatch
    /// that panics is counted as dropped and the loop carries on.
    pub fn spawn(self: Arc<Self>, mut subscription: Subscription) -> GatewayHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let routes = self.registry.len();

        let task = tokio::spawn(async move {
            info!(routes, "Gateway receive loop started");
            loop {
                // The dispatch runs outside `select!` so shutdown never
                // cancels it midway.
                let envelope = tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    next = subscription.recv() => match next {
                        Some(envelope) => envelope,
                        None => break,
                    },
                };
                self.dispatch_isolated(envelope).await;
            }
            info!(
                received = self.stats.received(),
                forwarded = self.stats.forwarded(),
                dropped = self.stats.dropped(),
                "Gateway receive loop stopped"
            );
        });

        GatewayHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

impl<M> fmt::Debug for DispatchGateway<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchGateway")
            .field("registry", &self.registry)
            .field("resolve_timeout", &self.resolve_timeout)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Handle to a running gateway receive loop.
///
/// Dropping the handle also stops the loop.
#[derive(Debug)]
pub struct GatewayHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl GatewayHandle {
    /// Stop receiving. An in-flight dispatch completes before this returns.
    pub async fn unsubscribe(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Gateway task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
