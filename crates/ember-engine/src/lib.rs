//! # ember-engine
//!
//! The capability boundary between the Ember driver and the engine's native
//! wire client. The driver never talks to a database directly; everything it
//! needs from the engine is expressed by the [`EngineClient`] trait plus the
//! opaque handle, metadata, and parameter-block types in this crate.
//!
//! ## Core Types
//!
//! - **[`EngineClient`]**: blocking attach/transaction/prepare/fetch operations
//! - **[`MessageMetadata`]** / **[`ColumnMetadata`]**: binary layout of one row message
//! - **[`SqlType`]**: wire type tags with the nullability bit masked off
//! - **[`ParamBlock`]**: ordered tag/value connection parameter block
//! - **[`EngineError`]**: formatted engine status-object text
//!
//! All calls block the calling thread until the engine responds; timeouts
//! and cancellation, if any, are the implementation's responsibility.

mod client;
mod error;
mod metadata;
mod params;
mod types;

pub use client::{
   AttachmentHandle, CursorHandle, DIALECT_CURRENT, EngineClient, FetchStatus,
   PREPARE_PREFETCH_METADATA, StatementHandle, TransactionHandle,
};
pub use error::EngineError;
pub use metadata::{ColumnMetadata, MessageMetadata};
pub use params::{ParamBlock, ParamTag, TransactionOptions};
pub use types::SqlType;

/// A type alias for Results produced by engine calls.
pub type Result<T> = std::result::Result<T, EngineError>;
