//! # In-Memory User Directory
//!
//! Backs the gateway's [`UserResolver`] port and the user service's store.
//!
//! ## Eligibility
//!
//! A new user is accepted only when its identifier is unused and its
//! username is neither taken nor reserved.

use std::collections::HashMap;

use async_trait::async_trait;
use courier_bus::{ResolveError, UserResolver};
use courier_envelope::User;
use parking_lot::RwLock;
use thiserror::Error;

/// Why a user could not be stored.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Identifier {0} is already registered")]
    IdentifierTaken(String),

    #[error("Username {0} is already taken")]
    UsernameTaken(String),

    #[error("Username {0} is reserved")]
    UsernameReserved(String),

    #[error("{0} must be defined")]
    MissingField(&'static str),

    #[error("Unknown user {0}")]
    UnknownUser(String),
}

/// Users keyed by identifier.
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: RwLock<HashMap<String, User>>,
    reserved_usernames: Vec<String>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory that refuses the given usernames.
    pub fn with_reserved_usernames<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: RwLock::new(HashMap::new()),
            reserved_usernames: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether `user` may be registered.
    pub fn check_eligible(&self, user: &User) -> Result<(), DirectoryError> {
        if user.identifier.trim().is_empty() {
            return Err(DirectoryError::MissingField("identifier"));
        }
        if user.username.trim().is_empty() {
            return Err(DirectoryError::MissingField("username"));
        }
        if self.reserved_usernames.iter().any(|r| r == &user.username) {
            return Err(DirectoryError::UsernameReserved(user.username.clone()));
        }

        let users = self.users.read();
        if users.contains_key(&user.identifier) {
            return Err(DirectoryError::IdentifierTaken(user.identifier.clone()));
        }
        if users.values().any(|u| u.username == user.username) {
            return Err(DirectoryError::UsernameTaken(user.username.clone()));
        }
        Ok(())
    }

    /// Register a new user.
    pub fn create(&self, user: User) -> Result<(), DirectoryError> {
        self.check_eligible(&user)?;

        let mut users = self.users.write();
        // Re-check under the write lock; another writer may have won.
        if users.contains_key(&user.identifier) {
            return Err(DirectoryError::IdentifierTaken(user.identifier));
        }
        if users.values().any(|u| u.username == user.username) {
            return Err(DirectoryError::UsernameTaken(user.username));
        }
        users.insert(user.identifier.clone(), user);
        Ok(())
    }

    /// Replace an existing user, keeping its identifier.
    ///
    /// Renaming to a username held by someone else is refused.
    pub fn update(&self, user: User) -> Result<User, DirectoryError> {
        let mut users = self.users.write();
        if !users.contains_key(&user.identifier) {
            return Err(DirectoryError::UnknownUser(user.identifier));
        }
        if users
            .values()
            .any(|u| u.username == user.username && u.identifier != user.identifier)
        {
            return Err(DirectoryError::UsernameTaken(user.username));
        }
        users.insert(user.identifier.clone(), user.clone());
        Ok(user)
    }

    pub fn get(&self, identifier: &str) -> Option<User> {
        self.users.read().get(identifier).cloned()
    }

    pub fn find_by_username(&self, username: &str) -> Option<User> {
        self.users
            .read()
            .values()
            .find(|u| u.username == username)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserResolver for UserDirectory {
    async fn resolve(&self, identifier: &str) -> Result<Option<User>, ResolveError> {
        Ok(self.get(identifier))
    }
}
