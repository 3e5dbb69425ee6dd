//! Outbound (Driven) ports of the dispatch gateway.
//!
//! These traits define the external collaborators the gateway depends on:
//! a store able to resolve users, and a handler able to accept messages.
//! Both are shared by every dispatch and must be safe for concurrent use.

use async_trait::async_trait;
use courier_envelope::User;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors reported by a [`UserResolver`].
///
/// An unknown identifier is not an error; see [`UserResolver::resolve`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The backing store could not be reached.
    #[error("User store unavailable: {0}")]
    Unavailable(String),
}

/// Errors reported by a [`HandlerAddress`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The handler's mailbox is closed.
    #[error("Handler mailbox closed")]
    Closed,

    /// The handler's mailbox is full.
    #[error("Handler mailbox full")]
    Full,
}

/// Looks up users by opaque identifier.
#[async_trait]
pub trait UserResolver: Send + Sync {
    /// Resolve `identifier` to a user.
    ///
    /// # Returns
    /// - `Ok(Some(user))`: the user exists
    /// - `Ok(None)`: no such user
    /// - `Err`: the store could not be queried
    async fn resolve(&self, identifier: &str) -> Result<Option<User>, ResolveError>;
}

/// An addressable, asynchronous message destination.
///
/// `send` must not block; delivery is at-most-once from the sender's point
/// of view and no reply is awaited.
pub trait HandlerAddress<M>: Send + Sync {
    /// Hand `message` to the destination.
    fn send(&self, message: M) -> Result<(), SendError>;
}

impl<M: Send> HandlerAddress<M> for mpsc::UnboundedSender<M> {
    fn send(&self, message: M) -> Result<(), SendError> {
        mpsc::UnboundedSender::send(self, message).map_err(|_| SendError::Closed)
    }
}

impl<M: Send> HandlerAddress<M> for mpsc::Sender<M> {
    fn send(&self, message: M) -> Result<(), SendError> {
        self.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }
}

/// Resolver that knows no users.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUsers;

#[async_trait]
impl UserResolver for NoUsers {
    async fn resolve(&self, _identifier: &str) -> Result<Option<User>, ResolveError> {
        Ok(None)
    }
}
