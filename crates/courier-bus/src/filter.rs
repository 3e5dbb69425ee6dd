//! # Envelope Filters
//!
//! Subscription-side selection of envelopes by category and event type.

use courier_envelope::{Category, Envelope};

/// Filter for subscribing to specific envelopes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvelopeFilter {
    /// Categories to include. Empty means all categories.
    pub categories: Vec<Category>,
    /// Event types to include. Empty means all event types.
    pub event_types: Vec<String>,
}

impl EnvelopeFilter {
    /// Create a filter that accepts all envelopes.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific event types.
    #[must_use]
    pub fn event_types<I, S>(event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: Vec::new(),
            event_types: event_types.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a filter for a single category.
    #[must_use]
    pub fn category(category: Category) -> Self {
        Self {
            categories: vec![category],
            event_types: Vec::new(),
        }
    }

    /// Check if an envelope matches this filter.
    #[must_use]
    pub fn matches(&self, envelope: &Envelope) -> bool {
        let category_match =
            self.categories.is_empty() || self.categories.contains(&envelope.category());

        let type_match = self.event_types.is_empty()
            || self
                .event_types
                .iter()
                .any(|t| t == envelope.event_type());

        category_match && type_match
    }

    /// Stable key used for subscription bookkeeping.
    pub(crate) fn key(&self) -> String {
        format!("{:?}|{:?}", self.categories, self.event_types)
    }
}
