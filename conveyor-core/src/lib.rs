//! Conveyor Core
//!
//! Core types and abstractions for the Conveyor delivery engine.
//!
//! This crate contains:
//! - Domain types: Core business entities (PublishOrder, PublishJob, pipeline snapshots, etc.)
//! - DTOs: Data transfer objects for the orchestrator HTTP API

pub mod domain;
pub mod dto;
