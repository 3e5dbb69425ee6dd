//! # Redelivery Policy
//!
//! Envelopes carry `ttl`, `redeliveryCount` and `maxRedeliveryCount` but
//! nothing in the envelope layer acts on them. Consumers that retry a
//! failed envelope ask a [`RedeliveryPolicy`] whether to retry it or route
//! it to the dead letter channel.

use std::fmt;

use courier_envelope::Envelope;

/// What to do with an envelope whose processing failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeliveryDecision {
    /// Publish this copy again; its redelivery count is already incremented.
    Retry(Envelope),
    /// Give up and route the envelope, unchanged, to the dead letter channel.
    DeadLetter {
        envelope: Envelope,
        reason: DeadLetterReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadLetterReason {
    /// `creationDate + ttl` lies in the past.
    Expired,
    /// `redeliveryCount` reached the ceiling.
    RetriesExhausted,
}

impl fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => write!(f, "expired"),
            Self::RetriesExhausted => write!(f, "retries exhausted"),
        }
    }
}

/// Decides between retry and dead letter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedeliveryPolicy {
    /// Ceiling applied to envelopes that leave `maxRedeliveryCount`
    /// unbounded. `None` keeps them unbounded.
    default_ceiling: Option<u32>,
}

impl RedeliveryPolicy {
    /// Policy that honours each envelope's own ceiling and nothing else.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy that caps unbounded envelopes at `ceiling` redeliveries.
    #[must_use]
    pub fn with_default_ceiling(ceiling: u32) -> Self {
        Self {
            default_ceiling: Some(ceiling),
        }
    }

    pub fn default_ceiling(&self) -> Option<u32> {
        self.default_ceiling
    }

    /// The ceiling that applies to `envelope`, if any.
    pub fn ceiling_for(&self, envelope: &Envelope) -> Option<u32> {
        u32::try_from(envelope.max_redelivery_count())
            .ok()
            .or(self.default_ceiling)
    }

    /// Whether `envelope` has outlived its ttl at `now_millis`.
    ///
    /// A ttl of zero or less never expires.
    pub fn is_expired(envelope: &Envelope, now_millis: i64) -> bool {
        envelope.ttl() > 0 && now_millis > envelope.creation_date().saturating_add(envelope.ttl())
    }

    /// Evaluate a failed `envelope` at `now_millis`.
    ///
    /// Expiry is checked before the retry ceiling.
    pub fn evaluate(&self, envelope: &Envelope, now_millis: i64) -> RedeliveryDecision {
        if Self::is_expired(envelope, now_millis) {
            return RedeliveryDecision::DeadLetter {
                envelope: envelope.clone(),
                reason: DeadLetterReason::Expired,
            };
        }

        match self.ceiling_for(envelope) {
            Some(ceiling) if envelope.redelivery_count() >= ceiling => {
                RedeliveryDecision::DeadLetter {
                    envelope: envelope.clone(),
                    reason: DeadLetterReason::RetriesExhausted,
                }
            }
            _ => RedeliveryDecision::Retry(envelope.redelivered()),
        }
    }
}
