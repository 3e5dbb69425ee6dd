//! # Adapter Implementations
//!
//! Concrete implementations of the outbound ports declared by
//! `courier-bus`.

pub mod user_directory;

pub use user_directory::*;
