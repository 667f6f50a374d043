//! Transaction builders
//!
//! Fluent construction of token transfers, including resuming and
//! co-signing transactions produced by other parties.

pub mod transfer;

pub use transfer::{BuilderConfig, BuilderError, BuilderState, TransferBuilder, DEFAULT_THRESHOLD};
