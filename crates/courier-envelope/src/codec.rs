//! # JSON Wire Codec
//!
//! Transcodes [`Envelope`]s to and from the canonical wire shape:
//!
//! ```text
//! {
//!   "version": "1.0.0",
//!   "headers": {
//!     "category": "BUSINESS" | "TECHNICAL",
//!     "from": "...",
//!     "replyTo": "...",            (omitted when absent)
//!     "correlationId": "...",      (omitted when absent)
//!     "creationDate": 1480978336019,
//!     "eventType": "...",
//!     "ttl": 0,
//!     "redeliveryCount": 0,
//!     "maxRedeliveryCount": -1,
//!     "custom": { "requester_id": "..." }
//!   },
//!   "payload": { ... } | [ ... ] | "..."
//! }
//! ```
//!
//! ## Payload Rule
//!
//! The payload is polymorphic on the wire. A stored payload that parses as a
//! JSON object or array is embedded structurally; anything else travels as
//! a JSON string. On decode, an embedded document is kept as its exact wire
//! text and a string is kept as its raw value. Embedded documents are carried
//! as [`RawValue`], so numbers and key order survive a round trip untouched.
//!
//! All functions are stateless and reentrant.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::builder::EnvelopeBuilder;
use crate::envelope::{Category, Envelope, ENVELOPE_VERSION, UNBOUNDED_REDELIVERY};
use crate::errors::CodecError;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireHeaders {
    category: Category,
    from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    creation_date: i64,
    event_type: String,
    #[serde(default)]
    ttl: i64,
    #[serde(default)]
    redelivery_count: u32,
    #[serde(default = "unbounded_redelivery")]
    max_redelivery_count: i32,
    #[serde(default)]
    custom: BTreeMap<String, Value>,
}

fn unbounded_redelivery() -> i32 {
    UNBOUNDED_REDELIVERY
}

#[derive(Debug, Serialize)]
struct WireEnvelope<'a> {
    version: &'a str,
    headers: WireHeaders,
    payload: Box<RawValue>,
}

/// Inbound root, with the payload left as borrowed wire text.
#[derive(Debug, Deserialize)]
struct InboundEnvelope<'a> {
    #[serde(default)]
    version: Option<Value>,
    #[serde(default)]
    headers: Option<Value>,
    #[serde(default, borrow)]
    payload: Option<&'a RawValue>,
}

/// Encode an envelope to compact wire JSON.
///
/// # Errors
///
/// Returns [`CodecError::Encoding`] if serialization fails.
pub fn encode(envelope: &Envelope) -> Result<String, CodecError> {
    serde_json::to_string(&to_wire(envelope)?).map_err(|e| CodecError::Encoding(e.to_string()))
}

/// Encode an envelope to indented wire JSON, for diagnostics.
///
/// # Errors
///
/// Returns [`CodecError::Encoding`] if serialization fails.
pub fn encode_pretty(envelope: &Envelope) -> Result<String, CodecError> {
    serde_json::to_string_pretty(&to_wire(envelope)?)
        .map_err(|e| CodecError::Encoding(e.to_string()))
}

/// Encode an envelope to a JSON value.
///
/// # Errors
///
/// Returns [`CodecError::Encoding`] if serialization fails.
pub fn to_value(envelope: &Envelope) -> Result<Value, CodecError> {
    serde_json::to_value(to_wire(envelope)?).map_err(|e| CodecError::Encoding(e.to_string()))
}

/// Decode wire JSON into an envelope.
///
/// # Errors
///
/// Fails on blank or malformed input, on a missing or unknown `version`, on
/// a missing `headers` block, and on headers violating the envelope
/// invariants. No partially-built envelope is ever returned.
pub fn decode(input: &str) -> Result<Envelope, CodecError> {
    let trimmed = input.trim_start();
    if trimmed.is_empty() {
        return Err(CodecError::EmptyInput);
    }
    if !trimmed.starts_with('{') {
        return Err(not_an_object());
    }
    let root: InboundEnvelope<'_> =
        serde_json::from_str(input).map_err(|e| CodecError::Malformed(e.to_string()))?;

    check_version(root.version.as_ref())?;
    let payload = match root.payload {
        None => String::new(),
        Some(raw) if raw.get().starts_with('"') => serde_json::from_str::<String>(raw.get())
            .map_err(|e| CodecError::Malformed(e.to_string()))?,
        Some(raw) => raw.get().to_string(),
    };
    assemble(root.headers, payload)
}

/// Decode wire bytes (UTF-8 JSON) into an envelope.
///
/// # Errors
///
/// Same conditions as [`decode`], plus invalid UTF-8.
pub fn decode_slice(input: &[u8]) -> Result<Envelope, CodecError> {
    let text = std::str::from_utf8(input).map_err(|e| CodecError::Malformed(e.to_string()))?;
    decode(text)
}

/// Decode an already-parsed JSON value into an envelope.
///
/// # Errors
///
/// Same conditions as [`decode`].
pub fn from_value(value: Value) -> Result<Envelope, CodecError> {
    let Value::Object(mut root) = value else {
        return Err(not_an_object());
    };

    check_version(root.get("version"))?;
    let payload = match root.remove("payload") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(raw)) => raw,
        Some(structured) => structured.to_string(),
    };
    assemble(root.remove("headers"), payload)
}

fn not_an_object() -> CodecError {
    CodecError::Malformed("envelope must be a JSON object".to_string())
}

fn assemble(headers: Option<Value>, payload: String) -> Result<Envelope, CodecError> {
    let headers = match headers {
        None | Some(Value::Null) => return Err(CodecError::MissingHeaders),
        Some(headers) => headers,
    };
    let headers: WireHeaders =
        serde_json::from_value(headers).map_err(|e| CodecError::Malformed(e.to_string()))?;

    let mut builder = EnvelopeBuilder::new()
        .with_category(headers.category)
        .with_from(headers.from)
        .with_creation_date(headers.creation_date)
        .with_event_type(headers.event_type)
        .with_ttl(headers.ttl)
        .with_redelivery_count(headers.redelivery_count)
        .with_max_redelivery_count(headers.max_redelivery_count)
        .with_custom(custom_strings(headers.custom))
        .with_json_payload(payload);
    if let Some(reply_to) = headers.reply_to {
        builder = builder.with_reply_to(reply_to);
    }
    if let Some(correlation_id) = headers.correlation_id {
        builder = builder.with_correlation_id(correlation_id);
    }

    Ok(builder.build()?)
}

fn check_version(version: Option<&Value>) -> Result<(), CodecError> {
    let received = match version {
        Some(Value::String(version)) if version == ENVELOPE_VERSION => return Ok(()),
        Some(Value::String(version)) => Some(version.clone()),
        Some(other) => Some(other.to_string()),
        None => None,
    };
    Err(CodecError::UnsupportedVersion {
        received,
        supported: ENVELOPE_VERSION,
    })
}

// Non-string scalars are kept as their JSON text; nulls are skipped.
fn custom_strings(custom: BTreeMap<String, Value>) -> BTreeMap<String, String> {
    custom
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect()
}

// Objects and arrays are embedded as written; anything else is quoted.
fn embed_payload(payload: &str) -> Result<Box<RawValue>, CodecError> {
    let trimmed = payload.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(structured) = RawValue::from_string(trimmed.to_string()) {
            return Ok(structured);
        }
    }
    let quoted =
        serde_json::to_string(payload).map_err(|e| CodecError::Encoding(e.to_string()))?;
    RawValue::from_string(quoted).map_err(|e| CodecError::Encoding(e.to_string()))
}

fn to_wire(envelope: &Envelope) -> Result<WireEnvelope<'static>, CodecError> {
    let header = envelope.header();
    Ok(WireEnvelope {
        version: ENVELOPE_VERSION,
        headers: WireHeaders {
            category: header.category(),
            from: header.from().to_string(),
            reply_to: header.reply_to().map(str::to_string),
            correlation_id: header.correlation_id().map(str::to_string),
            creation_date: header.creation_date(),
            event_type: header.event_type().to_string(),
            ttl: header.ttl(),
            redelivery_count: header.redelivery_count(),
            max_redelivery_count: header.max_redelivery_count(),
            custom: header
                .custom()
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
        },
        payload: embed_payload(envelope.payload())?,
    })
}

impl Envelope {
    /// Shorthand for [`encode`].
    ///
    /// # Errors
    ///
    /// See [`encode`].
    pub fn to_json(&self) -> Result<String, CodecError> {
        encode(self)
    }

    /// Shorthand for [`encode_pretty`].
    ///
    /// # Errors
    ///
    /// See [`encode_pretty`].
    pub fn to_pretty_json(&self) -> Result<String, CodecError> {
        encode_pretty(self)
    }

    /// Shorthand for [`decode`].
    ///
    /// # Errors
    ///
    /// See [`decode`].
    pub fn from_json(input: &str) -> Result<Self, CodecError> {
        decode(input)
    }
}

impl FromStr for Envelope {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}
