//! # Error Types
//!
//! Defines the errors raised while building, inspecting and transcoding
//! envelopes.

use thiserror::Error;

/// Errors raised while constructing or reading an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// A mandatory header field is missing or blank.
    #[error("{0} must be defined")]
    MissingField(&'static str),

    /// A custom header was added with a blank key.
    #[error("custom header key must be defined")]
    BlankCustomHeaderKey,

    /// A structured payload could not be encoded to JSON.
    #[error("Failed to encode payload: {0}")]
    PayloadEncoding(String),

    /// The payload could not be decoded into the requested shape.
    #[error("Failed to decode payload: {0}")]
    PayloadDecoding(String),
}

/// Errors raised by the JSON wire codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The wire input was empty or only whitespace.
    #[error("Wire input is empty")]
    EmptyInput,

    /// The wire input is not a JSON envelope.
    #[error("Malformed envelope: {0}")]
    Malformed(String),

    /// The envelope carries a version this implementation does not understand.
    #[error("Unsupported version: received {received:?}, supported {supported}")]
    UnsupportedVersion {
        received: Option<String>,
        supported: &'static str,
    },

    /// The envelope has no `headers` block.
    #[error("Envelope has no headers block")]
    MissingHeaders,

    /// The headers block violates the envelope invariants.
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(#[from] EnvelopeError),

    /// The envelope could not be serialized.
    #[error("Failed to encode envelope: {0}")]
    Encoding(String),
}
