//! Scriptable in-memory engine for integration tests.
//!
//! `MockEngine` implements [`EngineClient`] over plain maps: handles are
//! monotonically numbered, statements are scripted per SQL text, and every
//! call is appended to an ordered log so tests can assert teardown order.
//! Using a stale or foreign handle panics immediately rather than returning
//! an error, since that always indicates a driver bug.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use ember_driver::{
   AttachmentHandle, ColumnMetadata, CursorHandle, EngineClient, EngineError, FetchStatus,
   MessageMetadata, ParamBlock, StatementHandle, TransactionHandle, TransactionOptions,
};

/// Scripted behavior for one SQL text, keyed by the rewritten form the
/// driver hands to `prepare`.
#[derive(Debug, Clone, Default)]
pub struct StatementScript {
   pub input: MessageMetadata,
   pub output: MessageMetadata,
   pub rows: Vec<Vec<u8>>,
   pub affected: u64,
}

struct CursorState {
   statement: u64,
   next_row: usize,
   fetched_any: bool,
   eof: bool,
}

#[derive(Default)]
struct Inner {
   next_handle: u64,
   scripts: HashMap<String, StatementScript>,
   attachments: HashSet<u64>,
   transactions: HashMap<u64, u64>,
   statements: HashMap<u64, String>,
   cursors: HashMap<u64, CursorState>,
   calls: Vec<String>,
   fail_next: Option<&'static str>,
   captured_params: HashMap<String, Vec<u8>>,
}

impl Inner {
   fn handle(&mut self) -> u64 {
      self.next_handle += 1;
      self.next_handle
   }
}

#[derive(Default)]
pub struct MockEngine {
   inner: RefCell<Inner>,
}

impl MockEngine {
   pub fn new() -> Rc<Self> {
      Rc::new(Self::default())
   }

   /// Registers the script to play when `sql` is prepared.
   pub fn script(&self, sql: &str, script: StatementScript) {
      self.inner.borrow_mut().scripts.insert(sql.to_string(), script);
   }

   /// Makes the next call named `op` fail with an engine error. One-shot.
   pub fn fail_next(&self, op: &'static str) {
      self.inner.borrow_mut().fail_next = Some(op);
   }

   /// Ordered names of every engine call made so far.
   pub fn call_log(&self) -> Vec<String> {
      self.inner.borrow().calls.clone()
   }

   pub fn call_count(&self, op: &str) -> usize {
      self.inner.borrow().calls.iter().filter(|c| *c == op).count()
   }

   /// Parameter buffer captured at the last execute/open of `sql`.
   pub fn captured_params(&self, sql: &str) -> Option<Vec<u8>> {
      self.inner.borrow().captured_params.get(sql).cloned()
   }

   pub fn live_attachments(&self) -> usize {
      self.inner.borrow().attachments.len()
   }

   pub fn live_transactions(&self) -> usize {
      self.inner.borrow().transactions.len()
   }

   pub fn live_statements(&self) -> usize {
      self.inner.borrow().statements.len()
   }

   pub fn live_cursors(&self) -> usize {
      self.inner.borrow().cursors.len()
   }

   fn record(&self, op: &'static str) -> Result<(), EngineError> {
      let mut inner = self.inner.borrow_mut();
      inner.calls.push(op.to_string());
      if inner.fail_next == Some(op) {
         inner.fail_next = None;
         return Err(EngineError::new(format!("scripted failure in {op}")));
      }
      Ok(())
   }

   fn script_for(&self, statement: u64) -> StatementScript {
      let inner = self.inner.borrow();
      let sql = inner
         .statements
         .get(&statement)
         .unwrap_or_else(|| panic!("unknown statement handle {statement}"));
      inner.scripts.get(sql).cloned().unwrap_or_default()
   }
}

impl EngineClient for MockEngine {
   fn attach(&self, _target: &str, _params: &ParamBlock) -> Result<AttachmentHandle, EngineError> {
      self.record("attach")?;
      let mut inner = self.inner.borrow_mut();
      let handle = inner.handle();
      inner.attachments.insert(handle);
      Ok(AttachmentHandle(handle))
   }

   fn create_database(
      &self,
      _target: &str,
      _params: &ParamBlock,
   ) -> Result<AttachmentHandle, EngineError> {
      self.record("create_database")?;
      let mut inner = self.inner.borrow_mut();
      let handle = inner.handle();
      inner.attachments.insert(handle);
      Ok(AttachmentHandle(handle))
   }

   fn detach(&self, attachment: AttachmentHandle) -> Result<(), EngineError> {
      self.record("detach")?;
      let mut inner = self.inner.borrow_mut();
      assert!(
         inner.attachments.remove(&attachment.0),
         "detach of unknown attachment {attachment:?}"
      );
      Ok(())
   }

   fn start_transaction(
      &self,
      attachment: AttachmentHandle,
      _options: &TransactionOptions,
   ) -> Result<TransactionHandle, EngineError> {
      self.record("start_transaction")?;
      let mut inner = self.inner.borrow_mut();
      assert!(
         inner.attachments.contains(&attachment.0),
         "transaction on unknown attachment {attachment:?}"
      );
      let handle = inner.handle();
      inner.transactions.insert(handle, attachment.0);
      Ok(TransactionHandle(handle))
   }

   fn commit(&self, transaction: TransactionHandle) -> Result<(), EngineError> {
      self.record("commit")?;
      let mut inner = self.inner.borrow_mut();
      assert!(
         inner.transactions.remove(&transaction.0).is_some(),
         "commit of unknown transaction {transaction:?}"
      );
      Ok(())
   }

   fn commit_retaining(&self, transaction: TransactionHandle) -> Result<(), EngineError> {
      self.record("commit_retaining")?;
      assert!(
         self.inner.borrow().transactions.contains_key(&transaction.0),
         "commit_retaining of unknown transaction {transaction:?}"
      );
      Ok(())
   }

   fn rollback(&self, transaction: TransactionHandle) -> Result<(), EngineError> {
      self.record("rollback")?;
      let mut inner = self.inner.borrow_mut();
      assert!(
         inner.transactions.remove(&transaction.0).is_some(),
         "rollback of unknown transaction {transaction:?}"
      );
      Ok(())
   }

   fn rollback_retaining(&self, transaction: TransactionHandle) -> Result<(), EngineError> {
      self.record("rollback_retaining")?;
      assert!(
         self.inner.borrow().transactions.contains_key(&transaction.0),
         "rollback_retaining of unknown transaction {transaction:?}"
      );
      Ok(())
   }

   fn prepare(
      &self,
      attachment: AttachmentHandle,
      transaction: TransactionHandle,
      sql: &str,
      _dialect: u16,
      _flags: u32,
   ) -> Result<StatementHandle, EngineError> {
      self.record("prepare")?;
      let mut inner = self.inner.borrow_mut();
      assert!(
         inner.attachments.contains(&attachment.0),
         "prepare on unknown attachment {attachment:?}"
      );
      assert!(
         inner.transactions.contains_key(&transaction.0),
         "prepare on unknown transaction {transaction:?}"
      );
      let handle = inner.handle();
      inner.statements.insert(handle, sql.to_string());
      Ok(StatementHandle(handle))
   }

   fn input_metadata(&self, statement: StatementHandle) -> Result<MessageMetadata, EngineError> {
      self.record("input_metadata")?;
      Ok(self.script_for(statement.0).input)
   }

   fn output_metadata(&self, statement: StatementHandle) -> Result<MessageMetadata, EngineError> {
      self.record("output_metadata")?;
      Ok(self.script_for(statement.0).output)
   }

   fn execute(
      &self,
      statement: StatementHandle,
      transaction: TransactionHandle,
      in_buffer: &[u8],
   ) -> Result<(), EngineError> {
      self.record("execute")?;
      let mut inner = self.inner.borrow_mut();
      assert!(
         inner.transactions.contains_key(&transaction.0),
         "execute on unknown transaction {transaction:?}"
      );
      let sql = inner
         .statements
         .get(&statement.0)
         .unwrap_or_else(|| panic!("execute of unknown statement {statement:?}"))
         .clone();
      inner.captured_params.insert(sql, in_buffer.to_vec());
      Ok(())
   }

   fn open_cursor(
      &self,
      statement: StatementHandle,
      transaction: TransactionHandle,
      in_buffer: &[u8],
   ) -> Result<CursorHandle, EngineError> {
      self.record("open_cursor")?;
      let mut inner = self.inner.borrow_mut();
      assert!(
         inner.transactions.contains_key(&transaction.0),
         "open_cursor on unknown transaction {transaction:?}"
      );
      let sql = inner
         .statements
         .get(&statement.0)
         .unwrap_or_else(|| panic!("open_cursor of unknown statement {statement:?}"))
         .clone();
      inner.captured_params.insert(sql, in_buffer.to_vec());
      let handle = inner.handle();
      inner.cursors.insert(
         handle,
         CursorState {
            statement: statement.0,
            next_row: 0,
            fetched_any: false,
            eof: false,
         },
      );
      Ok(CursorHandle(handle))
   }

   fn fetch_next(
      &self,
      cursor: CursorHandle,
      out_buffer: &mut [u8],
   ) -> Result<FetchStatus, EngineError> {
      self.record("fetch_next")?;
      let statement = {
         let inner = self.inner.borrow();
         inner
            .cursors
            .get(&cursor.0)
            .unwrap_or_else(|| panic!("fetch on unknown cursor {cursor:?}"))
            .statement
      };
      let script = self.script_for(statement);

      let mut inner = self.inner.borrow_mut();
      let state = inner.cursors.get_mut(&cursor.0).unwrap();
      state.fetched_any = true;
      match script.rows.get(state.next_row) {
         Some(row) => {
            assert!(
               row.len() <= out_buffer.len(),
               "scripted row larger than the output buffer"
            );
            out_buffer[..row.len()].copy_from_slice(row);
            state.next_row += 1;
            Ok(FetchStatus::Row)
         }
         None => {
            state.eof = true;
            Ok(FetchStatus::Eof)
         }
      }
   }

   fn is_bof(&self, cursor: CursorHandle) -> Result<bool, EngineError> {
      self.record("is_bof")?;
      let inner = self.inner.borrow();
      let state = inner
         .cursors
         .get(&cursor.0)
         .unwrap_or_else(|| panic!("is_bof on unknown cursor {cursor:?}"));
      Ok(!state.fetched_any)
   }

   fn is_eof(&self, cursor: CursorHandle) -> Result<bool, EngineError> {
      self.record("is_eof")?;
      let inner = self.inner.borrow();
      let state = inner
         .cursors
         .get(&cursor.0)
         .unwrap_or_else(|| panic!("is_eof on unknown cursor {cursor:?}"));
      Ok(state.eof)
   }

   fn close_cursor(&self, cursor: CursorHandle) -> Result<(), EngineError> {
      self.record("close_cursor")?;
      let mut inner = self.inner.borrow_mut();
      assert!(
         inner.cursors.remove(&cursor.0).is_some(),
         "close of unknown cursor {cursor:?}"
      );
      Ok(())
   }

   fn release_statement(&self, statement: StatementHandle) -> Result<(), EngineError> {
      self.record("release_statement")?;
      let mut inner = self.inner.borrow_mut();
      assert!(
         inner.statements.remove(&statement.0).is_some(),
         "release of unknown statement {statement:?}"
      );
      Ok(())
   }

   fn affected_records(&self, statement: StatementHandle) -> Result<u64, EngineError> {
      self.record("affected_records")?;
      Ok(self.script_for(statement.0).affected)
   }
}

/// Column layout helper for scripted metadata.
pub fn column(
   name: &str,
   alias: Option<&str>,
   raw_type: u16,
   length: usize,
   offset: usize,
   null_offset: usize,
) -> ColumnMetadata {
   ColumnMetadata {
      name: name.to_string(),
      alias: alias.map(str::to_string),
      raw_type,
      length,
      offset,
      null_offset,
   }
}

pub fn metadata(message_length: usize, columns: Vec<ColumnMetadata>) -> MessageMetadata {
   MessageMetadata {
      message_length,
      columns,
   }
}
