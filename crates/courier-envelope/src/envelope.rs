//! # Envelope
//!
//! The universal unit of exchange between services.
//!
//! ## Properties
//!
//! - **Versioning**: every envelope reports [`ENVELOPE_VERSION`], checked by
//!   the codec before anything else is parsed.
//! - **Correlation**: request/reply flows use `correlation_id` and `reply_to`.
//! - **Retry bookkeeping**: `redelivery_count`, `max_redelivery_count` and
//!   `ttl` are advisory; the consumer owns the policy.
//! - **Opaque payload**: a string holding either a scalar or a JSON document.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::EnvelopeError;

/// Semantic version of the envelope format produced by this implementation.
pub const ENVELOPE_VERSION: &str = "1.0.0";

/// Default `max_redelivery_count`: no ceiling.
pub const UNBOUNDED_REDELIVERY: i32 = -1;

/// Broad classification of the traffic an envelope belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    /// Domain traffic: requests, replies and domain events.
    #[default]
    Business,
    /// Infrastructure traffic: service presence, diagnostics.
    Technical,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Business => write!(f, "BUSINESS"),
            Category::Technical => write!(f, "TECHNICAL"),
        }
    }
}

/// Metadata block of an envelope.
///
/// A `Header` can only exist with a non-blank `from` and `event_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub(crate) category: Category,
    pub(crate) from: String,
    pub(crate) reply_to: Option<String>,
    pub(crate) correlation_id: Option<String>,
    pub(crate) creation_date: i64,
    pub(crate) event_type: String,
    pub(crate) ttl: i64,
    pub(crate) redelivery_count: u32,
    pub(crate) max_redelivery_count: i32,
    pub(crate) custom: BTreeMap<String, String>,
}

impl Header {
    /// Create a header with the mandatory fields and defaults for the rest.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::MissingField`] when `from` or `event_type`
    /// is blank.
    pub fn new(
        category: Category,
        from: impl Into<String>,
        event_type: impl Into<String>,
        creation_date: i64,
    ) -> Result<Self, EnvelopeError> {
        let header = Self {
            category,
            from: from.into(),
            reply_to: None,
            correlation_id: None,
            creation_date,
            event_type: event_type.into(),
            ttl: 0,
            redelivery_count: 0,
            max_redelivery_count: UNBOUNDED_REDELIVERY,
            custom: BTreeMap::new(),
        };
        header.validate()?;
        Ok(header)
    }

    pub(crate) fn validate(&self) -> Result<(), EnvelopeError> {
        if is_blank(&self.from) {
            return Err(EnvelopeError::MissingField("from"));
        }
        if is_blank(&self.event_type) {
            return Err(EnvelopeError::MissingField("eventType"));
        }
        Ok(())
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn reply_to(&self) -> Option<&str> {
        self.reply_to.as_deref()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn creation_date(&self) -> i64 {
        self.creation_date
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn ttl(&self) -> i64 {
        self.ttl
    }

    pub fn redelivery_count(&self) -> u32 {
        self.redelivery_count
    }

    pub fn max_redelivery_count(&self) -> i32 {
        self.max_redelivery_count
    }

    /// Returns an independent copy of the custom headers.
    pub fn custom(&self) -> BTreeMap<String, String> {
        self.custom.clone()
    }

    /// Read a single custom header.
    pub fn custom_header(&self, key: &str) -> Option<&str> {
        self.custom.get(key).map(String::as_str)
    }
}

/// An immutable, versioned envelope: header metadata plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    header: Header,
    payload: String,
}

impl Envelope {
    /// Wrap a validated header and a payload.
    pub fn new(header: Header, payload: impl Into<String>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    /// The envelope format version.
    pub fn version(&self) -> &'static str {
        ENVELOPE_VERSION
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn category(&self) -> Category {
        self.header.category
    }

    pub fn from(&self) -> &str {
        &self.header.from
    }

    pub fn reply_to(&self) -> Option<&str> {
        self.header.reply_to()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.header.correlation_id()
    }

    pub fn creation_date(&self) -> i64 {
        self.header.creation_date
    }

    pub fn event_type(&self) -> &str {
        &self.header.event_type
    }

    pub fn ttl(&self) -> i64 {
        self.header.ttl
    }

    pub fn redelivery_count(&self) -> u32 {
        self.header.redelivery_count
    }

    pub fn max_redelivery_count(&self) -> i32 {
        self.header.max_redelivery_count
    }

    /// Returns an independent copy of the custom headers.
    ///
    /// Mutating the returned map never affects the envelope.
    pub fn custom(&self) -> BTreeMap<String, String> {
        self.header.custom()
    }

    /// Read a single custom header.
    pub fn custom_header(&self, key: &str) -> Option<&str> {
        self.header.custom_header(key)
    }

    /// The raw payload as carried by the envelope.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Decode the payload JSON into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::PayloadDecoding`] when the payload is not a
    /// JSON document of the requested shape.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, EnvelopeError> {
        serde_json::from_str(&self.payload)
            .map_err(|e| EnvelopeError::PayloadDecoding(e.to_string()))
    }

    /// The raw payload re-encoded as a JSON string literal.
    pub fn payload_as_json_string(&self) -> String {
        serde_json::Value::String(self.payload.clone()).to_string()
    }

    /// Consume the envelope, returning its payload.
    pub fn into_payload(self) -> String {
        self.payload
    }

    /// A copy of this envelope with the redelivery count incremented.
    ///
    /// Everything else, creation date included, is carried over unchanged.
    #[must_use]
    pub fn redelivered(&self) -> Self {
        let mut next = self.clone();
        next.header.redelivery_count = next.header.redelivery_count.saturating_add(1);
        next
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Envelope{{version={}, category={}, from={}, eventType={}, correlationId={}, redelivery={}/{}}}",
            ENVELOPE_VERSION,
            self.header.category,
            self.header.from,
            self.header.event_type,
            self.header.correlation_id.as_deref().unwrap_or("-"),
            self.header.redelivery_count,
            self.header.max_redelivery_count,
        )
    }
}

pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
