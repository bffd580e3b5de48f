//! Message processor and reply templates
//!
//! This crate is the engine's single entry point: one inbound message in, one
//! outbound decision out. The processor layers global interrupt detection,
//! active-flow dispatch, FAQ short-circuiting, service auto-booking, rating
//! capture and intent fallback on top of the matching and flow crates.

pub mod processor;
pub mod templates;

pub use processor::{MessageProcessor, ProcessorConfig, ProcessorDeps};
