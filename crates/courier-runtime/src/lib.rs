//! # Courier Runtime Library
//!
//! This library exposes the internal modules of the runtime for testing.
//! The main entry point is the `main.rs` binary.
//!
//! ## Layout
//!
//! - `config` - Transport and gateway settings from the environment
//! - `telemetry` - Tracing subscriber installation
//! - `adapters` - Port implementations (in-memory user directory)
//! - `handlers` - The user service and its gateway routes
//! - `runtime` - Process wiring and graceful shutdown

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod runtime;
pub mod telemetry;

pub use adapters::{DirectoryError, UserDirectory};
pub use config::{ConfigError, CourierConfig, GatewayConfig, TransportConfig};
pub use handlers::{user_routes, UserCommand, UserReply, UserService, UserServiceError};
pub use runtime::{CourierRuntime, RuntimeError};
pub use telemetry::{init_tracing, TelemetryConfig, TelemetryError};
