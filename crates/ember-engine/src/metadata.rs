//! Row-message metadata reported by the engine after prepare.

/// Binary layout of one column or parameter within a row message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
   /// Column name from the statement's underlying relation.
   pub name: String,

   /// Select-list alias, when the statement defines one.
   pub alias: Option<String>,

   /// Raw wire type code. The lowest bit is the nullability flag and is
   /// still set here; it is masked off when descriptors are built.
   pub raw_type: u16,

   /// Declared byte length of the value payload.
   pub length: usize,

   /// Byte offset of the value within the row message.
   pub offset: usize,

   /// Byte offset of the 16-bit null indicator within the row message.
   pub null_offset: usize,
}

/// Layout of a complete row message: every column of one statement's input
/// or output side plus the total buffer size to allocate for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageMetadata {
   /// Total byte length of one row message (values plus null indicators).
   pub message_length: usize,

   /// Per-column layout, in positional order.
   pub columns: Vec<ColumnMetadata>,
}

impl MessageMetadata {
   /// Number of columns described.
   pub fn count(&self) -> usize {
      self.columns.len()
   }
}
