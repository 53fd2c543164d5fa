//! Scribe server library.
//!
//! Human-in-the-loop content generation: a researcher and a writer agent
//! produce a draft, a human reviewer approves it or asks for revisions.

pub mod agent;
pub mod config;
pub mod coordinator;
pub mod server;
pub mod session_store;
