//! # Courier Test Suite
//!
//! Unified test crate for flows that span more than one crate.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── envelope_flows.rs   # builder → codec → bus
//!     ├── dispatch_flows.rs   # bus → gateway → handler
//!     └── e2e_service.rs      # full runtime request/reply
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p courier-tests
//! cargo test -p courier-tests integration::dispatch_flows
//! ```

#![allow(dead_code)]

pub mod integration;
