//! Connection parameter blocks and transaction options.

/// Tags accepted in a connection parameter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamTag {
   UserName,
   Password,
   DbCharset,
}

/// Ordered tag/value connection parameter block, handed to
/// [`EngineClient::attach`](crate::EngineClient::attach) and
/// [`EngineClient::create_database`](crate::EngineClient::create_database).
///
/// Entry order is preserved; the engine reads the block sequentially.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamBlock {
   entries: Vec<(ParamTag, String)>,
}

impl ParamBlock {
   pub fn new() -> Self {
      Self::default()
   }

   /// Appends a tagged string entry.
   pub fn insert(&mut self, tag: ParamTag, value: impl Into<String>) {
      self.entries.push((tag, value.into()));
   }

   /// First value stored under `tag`, if any.
   pub fn get(&self, tag: ParamTag) -> Option<&str> {
      self
         .entries
         .iter()
         .find(|(t, _)| *t == tag)
         .map(|(_, v)| v.as_str())
   }

   pub fn entries(&self) -> &[(ParamTag, String)] {
      &self.entries
   }

   pub fn is_empty(&self) -> bool {
      self.entries.is_empty()
   }
}

/// Options block for starting an engine transaction.
///
/// An empty block requests the engine's default isolation and lock
/// behavior, which is all this driver currently needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOptions {
   /// Raw transaction parameter bytes, passed through to the engine.
   pub tpb: Vec<u8>,
}
