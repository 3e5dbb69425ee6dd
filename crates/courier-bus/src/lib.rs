//! # Courier Bus - Envelope Delivery and Dispatch
//!
//! Moves envelopes between services and into in-process handlers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────────┐
//! │  Service A   │                    │ DispatchGateway  │
//! │              │    publish()       │  resolve user    │
//! │              │ ──────┐            │  map → handler   │
//! └──────────────┘       │            └──────────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │ Envelope Bus │          │
//!                  │ (wire JSON)  │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! ## Guarantees
//!
//! - **Wire fidelity:** the bus carries encoded envelopes, so every hop goes
//!   through the same codec an external broker would.
//! - **No escalation:** undecodable input, unknown requesters and unmatched
//!   envelopes are logged and skipped, never raised to the publisher.
//! - **Advisory redelivery:** `ttl` and retry ceilings are enforced only by
//!   consumers that consult a [`RedeliveryPolicy`].

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod filter;
pub mod gateway;
pub mod ports;
pub mod publisher;
pub mod redelivery;
pub mod registry;
pub mod subscriber;

// Re-export main types
pub use filter::EnvelopeFilter;
pub use gateway::{
    DispatchGateway, DispatchOutcome, DropReason, GatewayHandle, GatewayStats,
    DEFAULT_RESOLVE_TIMEOUT,
};
pub use ports::{HandlerAddress, NoUsers, ResolveError, SendError, UserResolver};
pub use publisher::{EnvelopePublisher, InMemoryEnvelopeBus, PublishError};
pub use redelivery::{DeadLetterReason, RedeliveryDecision, RedeliveryPolicy};
pub use registry::{Mapping, MappingRegistry};
pub use subscriber::{EnvelopeStream, Subscription, SubscriptionError};

/// Maximum envelopes to buffer per subscriber before the slowest one lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Channel that dead-lettered envelopes are published to.
pub const DEAD_LETTER_CHANNEL: &str = "courier.dead-letter";
