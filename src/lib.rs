//! STREAMBET — live-stream wagering and wallet ledger core.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod ledger;
pub mod events;
pub mod store;
pub mod engine;
pub mod oracle;
pub mod storage;
