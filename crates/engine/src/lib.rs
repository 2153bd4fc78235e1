//! The tabletalk orchestration engine.
//!
//! [`ChatEngine`] drives the tool-calling loop: replay the stored
//! context, call the model, execute whatever tools it requests, persist
//! each round atomically, and hand the final reply to the streamer.

pub mod assembler;
pub mod dispatch;
pub mod runner;
pub mod streamer;

pub use runner::{ChatEngine, FALLBACK_REPLY};
pub use streamer::{stream_text, StreamClosed, StreamSink, CHUNK_DELAY, CHUNK_DELIMITER, CHUNK_SIZE};
