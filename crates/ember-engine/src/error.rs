//! Error type for engine client operations.

use thiserror::Error;

/// A failure reported by the engine, carrying the formatted text of its
/// status object.
///
/// The driver treats this as opaque: operational failures propagate it to
/// the caller unmodified, and teardown paths format it for logging only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineError {
   message: String,
}

impl EngineError {
   pub fn new(message: impl Into<String>) -> Self {
      Self {
         message: message.into(),
      }
   }

   /// The human-readable status text.
   pub fn message(&self) -> &str {
      &self.message
   }
}
