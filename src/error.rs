//! Error types for driver operations.

use ember_engine::{EngineError, SqlType};

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by connection, transaction, and statement operations.
///
/// Teardown paths (disconnect, drops, cascade releases) never surface these;
/// engine failures there are logged and local state is forced to its
/// released condition.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Operation requires a detached connection but a live attachment exists.
   #[error("connection is already attached: disconnect first")]
   AlreadyConnected,

   /// Operation requires a bound or connected dependency that is missing.
   #[error("unbound resource: {0}")]
   Unbound(&'static str),

   /// Malformed SQL detected during placeholder rewriting.
   #[error("invalid SQL statement: {0}")]
   InvalidStatement(String),

   /// A parameter setter or field accessor was used against a
   /// type-incompatible column.
   #[error("invalid binding: cannot write {value_kind} value to {column:?} column")]
   InvalidBinding {
      value_kind: &'static str,
      column: SqlType,
   },

   /// Failure reported by the engine, surfaced unmodified.
   #[error(transparent)]
   Engine(#[from] EngineError),
}
