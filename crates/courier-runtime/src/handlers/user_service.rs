//! # User Service Handler
//!
//! Consumes [`UserCommand`]s produced by the dispatch gateway.
//!
//! ## Flow
//!
//! ```text
//! user_creation_request ──▶ gateway ──▶ UserCommand::Create ──▶ directory
//!                                                                  │
//!                         user_creation_reply ◀────────────────────┤
//!                         user_created (on success) ◀──────────────┘
//! ```
//!
//! Replies carry the request's correlation id and are only sent when the
//! request names a `replyTo`.
//!
//! ## Reply Delivery
//!
//! The in-process bus has a single shared channel, so a reply is broadcast
//! rather than routed to the `replyTo` destination. The destination is only
//! recorded in the logs. Requesters subscribe to the reply event type and
//! match their own replies by correlation id. A reply never names a
//! `replyTo` of its own.

use std::sync::Arc;

use courier_bus::{EnvelopePublisher, MappingRegistry, PublishError};
use courier_envelope::event_types::{
    USER_CREATION_EVENT, USER_CREATION_REPLY, USER_CREATION_REQUEST, USER_UPDATE_REPLY,
    USER_UPDATE_REQUEST,
};
use courier_envelope::headers::{ENTITY_ID, REQUESTER_ID};
use courier_envelope::{Category, Envelope, EnvelopeBuilder, EnvelopeError, User};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::adapters::UserDirectory;

/// Messages accepted by the user service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Create {
        request: Envelope,
        requester: Option<User>,
        user: User,
    },
    Update {
        request: Envelope,
        requester: Option<User>,
        user: User,
    },
}

impl UserCommand {
    pub fn request(&self) -> &Envelope {
        match self {
            Self::Create { request, .. } | Self::Update { request, .. } => request,
        }
    }
}

/// Payload of `user_creation_reply` and `user_update_reply`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl UserReply {
    fn accepted(user: User) -> Self {
        Self {
            success: true,
            user: Some(user),
            reason: None,
        }
    }

    fn refused(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            user: None,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum UserServiceError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Gateway routes for the user service.
///
/// Requests whose payload is not a user are declined.
pub fn user_routes() -> MappingRegistry<UserCommand> {
    MappingRegistry::new()
        .with_route(USER_CREATION_REQUEST, |envelope: &Envelope, requester: Option<&User>| {
            decode_user(envelope).map(|user| UserCommand::Create {
                request: envelope.clone(),
                requester: requester.cloned(),
                user,
            })
        })
        .with_route(USER_UPDATE_REQUEST, |envelope: &Envelope, requester: Option<&User>| {
            decode_user(envelope).map(|user| UserCommand::Update {
                request: envelope.clone(),
                requester: requester.cloned(),
                user,
            })
        })
}

fn decode_user(envelope: &Envelope) -> Option<User> {
    match envelope.payload_as::<User>() {
        Ok(user) => Some(user),
        Err(e) => {
            warn!(
                event_type = envelope.event_type(),
                from = envelope.from(),
                error = %e,
                "Payload is not a user"
            );
            None
        }
    }
}

/// Registers and updates users, answering over the bus.
pub struct UserService {
    service_name: String,
    directory: Arc<UserDirectory>,
    publisher: Arc<dyn EnvelopePublisher>,
}

impl UserService {
    pub fn new(
        service_name: impl Into<String>,
        directory: Arc<UserDirectory>,
        publisher: Arc<dyn EnvelopePublisher>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            directory,
            publisher,
        }
    }

    /// Handle one command.
    pub async fn handle(&self, command: UserCommand) -> Result<(), UserServiceError> {
        match command {
            UserCommand::Create { request, user, .. } => self.create(&request, user).await,
            UserCommand::Update {
                request,
                requester,
                user,
            } => self.update(&request, requester.as_ref(), user).await,
        }
    }

    async fn create(&self, request: &Envelope, user: User) -> Result<(), UserServiceError> {
        match self.directory.create(user.clone()) {
            Ok(()) => {
                info!(identifier = %user.identifier, username = %user.username, "User created");
                self.reply(request, USER_CREATION_REPLY, &UserReply::accepted(user.clone()))
                    .await?;
                self.announce_created(request, &user).await
            }
            Err(e) => {
                debug!(identifier = %user.identifier, reason = %e, "User creation refused");
                self.reply(request, USER_CREATION_REPLY, &UserReply::refused(e.to_string()))
                    .await
            }
        }
    }

    async fn update(
        &self,
        request: &Envelope,
        requester: Option<&User>,
        user: User,
    ) -> Result<(), UserServiceError> {
        // Users may only update themselves.
        let allowed = requester.is_some_and(|r| r.identifier == user.identifier);
        let reply = if !allowed {
            debug!(identifier = %user.identifier, "User update refused: requester mismatch");
            UserReply::refused(format!("Requester may not update user {}", user.identifier))
        } else {
            match self.directory.update(user) {
                Ok(updated) => {
                    info!(identifier = %updated.identifier, "User updated");
                    UserReply::accepted(updated)
                }
                Err(e) => UserReply::refused(e.to_string()),
            }
        };

        self.reply(request, USER_UPDATE_REPLY, &reply).await
    }

    /// Publish `reply` to the request's `replyTo`, if any.
    async fn reply(
        &self,
        request: &Envelope,
        event_type: &str,
        reply: &UserReply,
    ) -> Result<(), UserServiceError> {
        let Some(destination) = request.reply_to() else {
            debug!(event_type, "Request has no replyTo, not replying");
            return Ok(());
        };

        let mut builder = EnvelopeBuilder::new()
            .reply_to_envelope(request)
            .with_from(self.service_name.as_str())
            .with_event_type(event_type)
            .with_payload(reply)?;
        builder.copy_custom_header(request, REQUESTER_ID);
        let envelope = builder.build()?;

        self.publisher.publish(&envelope).await?;
        debug!(
            event_type,
            destination,
            correlation_id = envelope.correlation_id(),
            "Reply published"
        );
        Ok(())
    }

    async fn announce_created(
        &self,
        request: &Envelope,
        user: &User,
    ) -> Result<(), UserServiceError> {
        let mut builder = EnvelopeBuilder::new()
            .with_category(Category::Business)
            .with_from(self.service_name.as_str())
            .with_event_type(USER_CREATION_EVENT)
            .with_payload(user)?;
        builder.copy_custom_header(request, REQUESTER_ID);
        if let Some(entity) = &user.entity_identifier {
            builder.add_custom_header(ENTITY_ID, entity.as_str())?;
        }
        let envelope = builder.build()?;

        self.publisher.publish(&envelope).await?;
        Ok(())
    }

    /// Consume `mailbox` until it closes or `shutdown` fires.
    pub async fn run(
        self,
        mut mailbox: mpsc::UnboundedReceiver<UserCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(service = %self.service_name, "User service started");

        loop {
            let command = tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    info!("User service shutdown signal received");
                    break;
                }
                next = mailbox.recv() => match next {
                    Some(command) => command,
                    None => {
                        info!("User service mailbox closed, exiting");
                        break;
                    }
                },
            };

            let event_type = command.request().event_type().to_string();
            if let Err(e) = self.handle(command).await {
                warn!(event_type = %event_type, error = %e, "User command failed");
            }
        }
    }
}
