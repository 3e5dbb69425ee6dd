//! # Mapping Registry
//!
//! Event type → mapping function. Each event family registers the mapping
//! that turns `(envelope, requester)` into a handler message; the gateway
//! itself stays closed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use courier_envelope::{Envelope, User};

/// A mapping from an envelope (plus the resolved requester, if any) to a
/// target message. Returning `None` declines the envelope.
pub type Mapping<M> = Arc<dyn Fn(&Envelope, Option<&User>) -> Option<M> + Send + Sync>;

/// Registered mappings, keyed by event type.
pub struct MappingRegistry<M> {
    routes: HashMap<String, Mapping<M>>,
}

impl<M> MappingRegistry<M> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register `mapping` for `event_type`, replacing any previous one.
    pub fn register<F>(&mut self, event_type: impl Into<String>, mapping: F) -> &mut Self
    where
        F: Fn(&Envelope, Option<&User>) -> Option<M> + Send + Sync + 'static,
    {
        self.routes.insert(event_type.into(), Arc::new(mapping));
        self
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with_route<F>(mut self, event_type: impl Into<String>, mapping: F) -> Self
    where
        F: Fn(&Envelope, Option<&User>) -> Option<M> + Send + Sync + 'static,
    {
        self.register(event_type, mapping);
        self
    }

    /// Merge every route of `other` into this registry.
    pub fn extend(&mut self, other: MappingRegistry<M>) -> &mut Self {
        self.routes.extend(other.routes);
        self
    }

    /// Map `envelope` through the route registered for its event type.
    ///
    /// Returns `None` when no route matches or the route declines.
    pub fn map(&self, envelope: &Envelope, requester: Option<&User>) -> Option<M> {
        let mapping = self.routes.get(envelope.event_type())?;
        mapping(envelope, requester)
    }

    pub fn handles(&self, event_type: &str) -> bool {
        self.routes.contains_key(event_type)
    }

    /// Registered event types, sorted.
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<M> Default for MappingRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for MappingRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingRegistry")
            .field("event_types", &self.event_types())
            .finish()
    }
}
