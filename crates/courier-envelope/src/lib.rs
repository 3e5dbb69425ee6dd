//! # Courier Envelope
//!
//! The envelope format shared by every service on the bus: an immutable,
//! versioned [`Envelope`] (header metadata plus opaque payload), the
//! [`EnvelopeBuilder`] that validates and produces it, and the JSON
//! [`codec`] that moves it on and off the wire.
//!
//! ## Design Principles
//!
//! - **Validated at construction**: `category`, `from` and `event_type` are
//!   always present on a constructed envelope.
//! - **Immutable values**: retries and relays go through the builder, never
//!   through mutation of a received envelope.
//! - **Opaque payload**: the envelope layer only interprets the payload to
//!   decide how it travels on the wire.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod builder;
pub mod codec;
pub mod entities;
pub mod envelope;
pub mod errors;
pub mod headers;

pub use builder::{current_time_millis, EnvelopeBuilder};
pub use codec::{decode, decode_slice, encode, encode_pretty};
pub use entities::User;
pub use envelope::{Category, Envelope, Header, ENVELOPE_VERSION, UNBOUNDED_REDELIVERY};
pub use errors::{CodecError, EnvelopeError};
pub use headers::event_types;
