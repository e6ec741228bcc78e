//! The blocking engine client capability.

use crate::error::EngineError;
use crate::metadata::MessageMetadata;
use crate::params::{ParamBlock, TransactionOptions};

/// Opaque handle to a live engine attachment (session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentHandle(pub u64);

/// Opaque handle to an engine-side transaction context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionHandle(pub u64);

/// Opaque handle to a prepared statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementHandle(pub u64);

/// Opaque handle to an open cursor over a prepared statement's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorHandle(pub u64);

/// Outcome of one cursor advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
   /// A row was produced into the output buffer.
   Row,
   /// The cursor is past the last row; the buffer is unchanged.
   Eof,
}

/// SQL dialect this driver speaks.
pub const DIALECT_CURRENT: u16 = 3;

/// Prepare flag requesting input/output metadata alongside compilation.
pub const PREPARE_PREFETCH_METADATA: u32 = 0x1;

/// Blocking operations the driver requires from the engine's native client.
///
/// Every method blocks the calling thread until the engine responds and
/// reports failure as an [`EngineError`] carrying the formatted status
/// text. Implementations own the wire protocol; the driver owns nothing
/// below this trait.
pub trait EngineClient {
   /// Attaches to an existing database at `target` (`server:path`).
   fn attach(&self, target: &str, params: &ParamBlock) -> Result<AttachmentHandle, EngineError>;

   /// Creates the database at `target` and attaches to it.
   fn create_database(
      &self,
      target: &str,
      params: &ParamBlock,
   ) -> Result<AttachmentHandle, EngineError>;

   /// Detaches a live attachment. The handle is invalid afterwards even on
   /// failure.
   fn detach(&self, attachment: AttachmentHandle) -> Result<(), EngineError>;

   fn start_transaction(
      &self,
      attachment: AttachmentHandle,
      options: &TransactionOptions,
   ) -> Result<TransactionHandle, EngineError>;

   fn commit(&self, transaction: TransactionHandle) -> Result<(), EngineError>;

   /// Commits but keeps the transaction context alive for reuse.
   fn commit_retaining(&self, transaction: TransactionHandle) -> Result<(), EngineError>;

   fn rollback(&self, transaction: TransactionHandle) -> Result<(), EngineError>;

   /// Rolls back but keeps the transaction context alive for reuse.
   fn rollback_retaining(&self, transaction: TransactionHandle) -> Result<(), EngineError>;

   /// Compiles `sql` within the given transaction context.
   fn prepare(
      &self,
      attachment: AttachmentHandle,
      transaction: TransactionHandle,
      sql: &str,
      dialect: u16,
      flags: u32,
   ) -> Result<StatementHandle, EngineError>;

   /// Layout of the statement's parameter message.
   fn input_metadata(&self, statement: StatementHandle) -> Result<MessageMetadata, EngineError>;

   /// Layout of the statement's result-row message.
   fn output_metadata(&self, statement: StatementHandle) -> Result<MessageMetadata, EngineError>;

   /// Runs a statement that produces no cursor (DML/DDL).
   fn execute(
      &self,
      statement: StatementHandle,
      transaction: TransactionHandle,
      in_buffer: &[u8],
   ) -> Result<(), EngineError>;

   /// Opens a cursor bound to the current contents of `in_buffer`.
   fn open_cursor(
      &self,
      statement: StatementHandle,
      transaction: TransactionHandle,
      in_buffer: &[u8],
   ) -> Result<CursorHandle, EngineError>;

   /// Advances the cursor, filling `out_buffer` with the next row message.
   fn fetch_next(
      &self,
      cursor: CursorHandle,
      out_buffer: &mut [u8],
   ) -> Result<FetchStatus, EngineError>;

   /// True before the first row has been fetched.
   fn is_bof(&self, cursor: CursorHandle) -> Result<bool, EngineError>;

   /// True once the cursor has advanced past the last row.
   fn is_eof(&self, cursor: CursorHandle) -> Result<bool, EngineError>;

   fn close_cursor(&self, cursor: CursorHandle) -> Result<(), EngineError>;

   /// Releases a prepared statement handle.
   fn release_statement(&self, statement: StatementHandle) -> Result<(), EngineError>;

   /// Rows affected by the last execution of the statement.
   fn affected_records(&self, statement: StatementHandle) -> Result<u64, EngineError>;
}
