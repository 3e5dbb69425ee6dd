//! # Reserved Names
//!
//! Custom header keys and event types shared by convention across
//! services. Custom headers are plain keys of the `custom` map, not
//! first-class header fields; any mapping is free to read or ignore them.

/// Identifier of the user on whose behalf the envelope was sent.
pub const REQUESTER_ID: &str = "requester_id";

/// Identifier of the entity the envelope concerns.
pub const ENTITY_ID: &str = "entity_id";

/// Identifier of the project configuration the envelope concerns.
pub const PROJECT_CONFIGURATION_ID: &str = "projectconfiguration_id";

/// Marks an envelope re-broadcast by another service.
pub const BROADCAST_FROM: &str = "broadcast_from";

/// Well-known event types.
pub mod event_types {
    // Technical
    pub const SERVICE_CONNECT: &str = "service_connection";

    // Business
    pub const USER_CREATION_REQUEST: &str = "user_creation_request";
    pub const USER_CREATION_REPLY: &str = "user_creation_reply";
    pub const USER_CREATION_EVENT: &str = "user_created";
    pub const USER_IDENTIFIER_CREATION_REQUEST: &str = "user_id_creation_request";
    pub const USER_IDENTIFIER_CREATION_REPLY: &str = "user_id_creation_reply";
    pub const USER_UPDATE_REQUEST: &str = "user_update_request";
    pub const USER_UPDATE_REPLY: &str = "user_update_reply";
    pub const PROJECTCONFIG_CREATION_REQUEST: &str = "projectconfig_creation_request";
    pub const PROJECTCONFIG_CREATION_REPLY: &str = "projectconfig_creation_reply";
    pub const PROJECTCONFIG_CREATION_EVENT: &str = "projectconfig_created";
    pub const PROJECTCONFIG_CHANGE_USER_REQUEST: &str = "projectconfig_change_user_request";
    pub const PROJECTCONFIG_CHANGE_USER_REPLY: &str = "projectconfig_change_user_reply";
    pub const PROJECTCONFIG_START_REQUEST: &str = "projectconfig_start_request";
    pub const PROJECTCONFIG_START_REPLY: &str = "projectconfig_start_reply";
    pub const PROJECTCONFIG_STARTED: &str = "projectconfig_started";
    pub const PROJECT_CREATION_REQUEST: &str = "project_creation_request";
    pub const PROJECT_CREATION_REPLY: &str = "project_creation_reply";
    pub const STACK_STARTED: &str = "stack_started";
    pub const BRICK_STARTING: &str = "brick_starting";
    pub const BRICK_CONFIGURING: &str = "brick_configuring";
    pub const BRICK_RUNNING: &str = "brick_running";
    pub const BRICK_ON_FAILURE: &str = "brick_onfailure";
    pub const BRICK_STOPPED: &str = "brick_stopped";
    pub const ERROR_THROWN_FROM: &str = "error_throw_from";
}
