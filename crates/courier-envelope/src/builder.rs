//! # Envelope Builder
//!
//! Mutable accumulator producing immutable [`Envelope`]s.
//!
//! A consumer that wants to retry a received envelope copies it into a
//! builder, bumps the redelivery count and builds a fresh envelope; the
//! original is never touched.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use uuid::Uuid;

use crate::envelope::{is_blank, Category, Envelope, Header, UNBOUNDED_REDELIVERY};
use crate::errors::EnvelopeError;

/// Current wall-clock time in epoch milliseconds.
pub fn current_time_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Builder for [`Envelope`].
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    category: Option<Category>,
    from: Option<String>,
    reply_to: Option<String>,
    correlation_id: Option<String>,
    creation_date: i64,
    event_type: Option<String>,
    ttl: i64,
    redelivery_count: u32,
    max_redelivery_count: i32,
    custom: Option<BTreeMap<String, String>>,
    payload: Option<String>,
}

impl Default for EnvelopeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            category: None,
            from: None,
            reply_to: None,
            correlation_id: None,
            creation_date: 0,
            event_type: None,
            ttl: 0,
            redelivery_count: 0,
            max_redelivery_count: UNBOUNDED_REDELIVERY,
            custom: None,
            payload: None,
        }
    }

    /// Create a builder holding every field of `source`.
    #[must_use]
    pub fn from_envelope(source: &Envelope) -> Self {
        let header = source.header();
        Self {
            category: Some(header.category),
            from: Some(header.from.clone()),
            reply_to: header.reply_to.clone(),
            correlation_id: header.correlation_id.clone(),
            creation_date: header.creation_date,
            event_type: Some(header.event_type.clone()),
            ttl: header.ttl,
            redelivery_count: header.redelivery_count,
            max_redelivery_count: header.max_redelivery_count,
            custom: Some(header.custom()),
            payload: Some(source.payload().to_string()),
        }
    }

    /// Copy every field of `source` except `from`.
    ///
    /// Used when forwarding: the relaying component stamps its own origin.
    #[must_use]
    pub fn relay(self, source: &Envelope) -> Self {
        let from = self.from;
        Self {
            from,
            ..Self::from_envelope(source)
        }
    }

    /// Prepare a reply to `request`: same category and correlation id.
    ///
    /// Where the reply goes is the request's `reply_to`, read by the caller.
    #[must_use]
    pub fn reply_to_envelope(self, request: &Envelope) -> Self {
        let mut builder = self.with_category(request.category());
        builder.correlation_id = request.correlation_id().map(str::to_string);
        builder
    }

    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    #[must_use]
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Use a freshly generated UUID v4 as correlation id.
    #[must_use]
    pub fn with_new_correlation_id(self) -> Self {
        self.with_correlation_id(Uuid::new_v4().to_string())
    }

    /// Set the creation date in epoch milliseconds; values `<= 0` are
    /// replaced by the current time at build.
    #[must_use]
    pub fn with_creation_date(mut self, creation_date: i64) -> Self {
        self.creation_date = creation_date;
        self
    }

    #[must_use]
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_redelivery_count(mut self, redelivery_count: u32) -> Self {
        self.redelivery_count = redelivery_count;
        self
    }

    #[must_use]
    pub fn with_max_redelivery_count(mut self, max_redelivery_count: i32) -> Self {
        self.max_redelivery_count = max_redelivery_count;
        self
    }

    /// Replace the whole custom header map.
    #[must_use]
    pub fn with_custom(mut self, custom: BTreeMap<String, String>) -> Self {
        self.custom = Some(custom);
        self
    }

    /// Set a payload already in wire form; it is stored without re-encoding.
    #[must_use]
    pub fn with_json_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Encode `payload` to JSON and store it.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::PayloadEncoding`] when `payload` cannot be
    /// serialized.
    pub fn with_payload<T: Serialize + ?Sized>(
        mut self,
        payload: &T,
    ) -> Result<Self, EnvelopeError> {
        let encoded = serde_json::to_string(payload)
            .map_err(|e| EnvelopeError::PayloadEncoding(e.to_string()))?;
        self.payload = Some(encoded);
        Ok(self)
    }

    /// Add one custom header.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::BlankCustomHeaderKey`] for a blank key; the
    /// builder is left unchanged.
    pub fn add_custom_header(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&mut Self, EnvelopeError> {
        let key = key.into();
        if is_blank(&key) {
            return Err(EnvelopeError::BlankCustomHeaderKey);
        }
        self.custom
            .get_or_insert_with(BTreeMap::new)
            .insert(key, value.into());
        Ok(self)
    }

    /// Copy the custom header `key` from `source`, if it has one.
    ///
    /// Other keys already accumulated in the builder are left untouched.
    pub fn copy_custom_header(&mut self, source: &Envelope, key: &str) -> &mut Self {
        if let Some(value) = source.custom_header(key) {
            self.custom
                .get_or_insert_with(BTreeMap::new)
                .insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn increment_redelivery_count(&mut self) -> &mut Self {
        self.redelivery_count = self.redelivery_count.saturating_add(1);
        self
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }

    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    pub fn creation_date(&self) -> i64 {
        self.creation_date
    }

    pub fn redelivery_count(&self) -> u32 {
        self.redelivery_count
    }

    pub fn custom_header(&self, key: &str) -> Option<&str> {
        self.custom.as_ref()?.get(key).map(String::as_str)
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// Validate the accumulated fields and produce an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::MissingField`] naming `from` or `eventType`
    /// when either is unset or blank.
    pub fn build(&self) -> Result<Envelope, EnvelopeError> {
        let from = self
            .from
            .as_deref()
            .filter(|f| !is_blank(f))
            .ok_or(EnvelopeError::MissingField("from"))?;
        let event_type = self
            .event_type
            .as_deref()
            .filter(|t| !is_blank(t))
            .ok_or(EnvelopeError::MissingField("eventType"))?;

        let creation_date = if self.creation_date <= 0 {
            current_time_millis()
        } else {
            self.creation_date
        };

        let header = Header {
            category: self.category.unwrap_or_default(),
            from: from.to_string(),
            reply_to: self.reply_to.clone(),
            correlation_id: self.correlation_id.clone(),
            creation_date,
            event_type: event_type.to_string(),
            ttl: self.ttl,
            redelivery_count: self.redelivery_count,
            max_redelivery_count: self.max_redelivery_count,
            custom: self.custom.clone().unwrap_or_default(),
        };
        header.validate()?;

        Ok(Envelope::new(header, self.payload.clone().unwrap_or_default()))
    }
}
