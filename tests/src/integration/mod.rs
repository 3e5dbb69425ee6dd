//! # Integration Tests
//!
//! Cross-crate flows over the in-process bus.

pub mod dispatch_flows;
pub mod e2e_service;
pub mod envelope_flows;
