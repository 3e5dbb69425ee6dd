//! # Event Handlers
//!
//! In-process handlers fed by the dispatch gateway.

pub mod user_service;

pub use user_service::*;
