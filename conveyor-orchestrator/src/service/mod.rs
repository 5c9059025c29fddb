//! Service layer
//!
//! The pipeline manager and the engine logic split by concern: job
//! submission, the concurrency guard, the publish state machine, image
//! resolution and step rendering.

mod build;
mod deploy;
mod error;
mod guard;
mod image;
mod manifest;
mod pipeline;
mod preview;
mod render;
mod settings;
mod state;

pub use error::EngineError;
pub use pipeline::PipelineManager;
