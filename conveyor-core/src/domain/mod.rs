//! Core domain types
//!
//! This module contains the core domain structures used across Conveyor services.
//! These types represent the fundamental business entities and are shared between
//! the orchestrator (for persistence and job construction) and its clients.

pub mod job;
pub mod pipeline;
pub mod project;
pub mod publish;
pub mod setting;
