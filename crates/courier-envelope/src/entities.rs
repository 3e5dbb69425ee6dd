//! # Core Domain Entities
//!
//! Values shared between the gateway and the stores that back it.

use serde::{Deserialize, Serialize};

/// A user as resolved from the `requester_id` custom header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque, stable identifier.
    pub identifier: String,
    /// Identifier of the entity (organisation) the user belongs to.
    pub entity_identifier: Option<String>,
    /// Login name.
    pub username: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    pub email: String,
}

impl User {
    /// Create a user with no entity and an empty display name.
    pub fn new(
        identifier: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            entity_identifier: None,
            username: username.into(),
            name: String::new(),
            email: email.into(),
        }
    }

    #[must_use]
    pub fn with_entity(mut self, entity_identifier: impl Into<String>) -> Self {
        self.entity_identifier = Some(entity_identifier.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
