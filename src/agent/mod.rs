//! Content-generation agents.
//!
//! - `llm`: text generation backends
//! - `research`: topic lookup with layered fallback
//! - `workflow`: the session state machine tying them together

pub mod llm;
pub mod research;
pub mod workflow;
