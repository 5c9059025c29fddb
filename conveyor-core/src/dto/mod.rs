//! Data Transfer Objects for the orchestrator API
//!
//! Requests and responses exchanged between the orchestrator HTTP surface,
//! the CI driver callback and the client crate.

pub mod job;
pub mod publish;
