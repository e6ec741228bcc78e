//! Statement lifecycle, lazy preparation, and typed field/parameter access.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use ember_engine::{
   CursorHandle, DIALECT_CURRENT, EngineClient, FetchStatus, MessageMetadata,
   PREPARE_PREFETCH_METADATA, SqlType, StatementHandle,
};
use ember_lifecycle::{SubscriptionId, TransactionEvent};
use indexmap::IndexMap;
use tracing::{debug, error};

use crate::codec::{self, ColumnDescriptor};
use crate::error::{Error, Result};
use crate::rewrite::{self, RewrittenSql};
use crate::transaction::{Transaction, TransactionShared};

/// Default format string for [`Field::format_date`].
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Everything that exists only between a successful prepare and the next
/// release: the engine handle, both row-message layouts, and both buffers.
struct PreparedState {
   handle: StatementHandle,
   fields: Vec<ColumnDescriptor>,
   parameters: Vec<ColumnDescriptor>,
   named_fields: IndexMap<String, usize>,
   field_buffer: Vec<u8>,
   parameter_buffer: Vec<u8>,
}

impl PreparedState {
   fn build(
      handle: StatementHandle,
      input: &MessageMetadata,
      output: &MessageMetadata,
   ) -> Self {
      let fields: Vec<ColumnDescriptor> = output
         .columns
         .iter()
         .map(ColumnDescriptor::from_metadata)
         .collect();
      let parameters: Vec<ColumnDescriptor> = input
         .columns
         .iter()
         .map(ColumnDescriptor::from_metadata)
         .collect();

      // Alias wins over the relation's column name, as the engine reports
      // the select list.
      let mut named_fields = IndexMap::new();
      for (index, column) in output.columns.iter().enumerate() {
         let key = match &column.alias {
            Some(alias) if !alias.is_empty() => alias.clone(),
            _ => column.name.clone(),
         };
         named_fields.insert(key, index);
      }

      Self {
         handle,
         fields,
         parameters,
         named_fields,
         field_buffer: vec![0u8; output.message_length],
         parameter_buffer: vec![0u8; input.message_length],
      }
   }
}

struct StatementState {
   transaction: Weak<TransactionShared>,
   subscription: Option<SubscriptionId>,
   sql: Option<RewrittenSql>,
   prepared: Option<PreparedState>,
   cursor: Option<CursorHandle>,
}

pub(crate) struct StatementShared {
   engine: Rc<dyn EngineClient>,
   state: RefCell<StatementState>,
}

impl StatementShared {
   /// Requires a bound, live transaction and connects it on demand.
   fn check_transaction(&self) -> Result<Rc<TransactionShared>> {
      let transaction = self
         .state
         .borrow()
         .transaction
         .upgrade()
         .ok_or(Error::Unbound("statement has no bound transaction"))?;
      transaction.connect()?;
      Ok(transaction)
   }

   /// Prepares lazily: compiles the SQL, pulls both metadata sides, and
   /// allocates zero-filled buffers at the reported message lengths. No-op
   /// when already prepared.
   fn ensure_prepared(&self, transaction: &TransactionShared) -> Result<()> {
      if self.state.borrow().prepared.is_some() {
         return Ok(());
      }

      let (text, positional_count) = {
         let state = self.state.borrow();
         let sql = state
            .sql
            .as_ref()
            .ok_or(Error::Unbound("statement has no SQL text"))?;
         (sql.text.clone(), sql.positional_count)
      };

      let (attachment, txn_handle) = transaction.context()?;
      let handle = self.engine.prepare(
         attachment,
         txn_handle,
         &text,
         DIALECT_CURRENT,
         PREPARE_PREFETCH_METADATA,
      )?;
      let metadata = self
         .engine
         .output_metadata(handle)
         .and_then(|output| self.engine.input_metadata(handle).map(|input| (input, output)));
      let (input, output) = match metadata {
         Ok(pair) => pair,
         Err(e) => {
            // The handle was never stored; free it before surfacing the error.
            if let Err(release) = self.engine.release_statement(handle) {
               error!(error = %release, "release failed for statement after metadata error");
            }
            return Err(e.into());
         }
      };
      debug_assert_eq!(
         input.count(),
         positional_count,
         "engine parameter count disagrees with the placeholder rewrite"
      );

      self.state.borrow_mut().prepared = Some(PreparedState::build(handle, &input, &output));
      debug!(fields = output.count(), parameters = input.count(), "statement prepared");
      Ok(())
   }

   /// Full release of cursor and prepared state, infallible. Metadata is
   /// not trusted across a new transaction context, so descriptors and
   /// buffers go too; the next use re-prepares from scratch.
   fn release(&self) {
      let cursor = self.state.borrow_mut().cursor.take();
      if let Some(cursor) = cursor {
         if let Err(e) = self.engine.close_cursor(cursor) {
            error!(error = %e, "close failed while releasing statement cursor");
         }
      }

      let prepared = self.state.borrow_mut().prepared.take();
      if let Some(prepared) = prepared {
         if let Err(e) = self.engine.release_statement(prepared.handle) {
            error!(error = %e, "release failed for prepared statement handle");
         }
      }
   }

   fn detach_from_transaction(&self) {
      let (transaction, subscription) = {
         let mut state = self.state.borrow_mut();
         (state.transaction.upgrade(), state.subscription.take())
      };
      if let (Some(transaction), Some(id)) = (transaction, subscription) {
         transaction.hub.unsubscribe(id);
      }
   }

   fn with_field_buffer<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
      let state = self.state.borrow();
      match state.prepared.as_ref() {
         Some(prepared) => f(&prepared.field_buffer),
         None => f(&[]),
      }
   }

   fn with_parameter_buffer<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
      let mut state = self.state.borrow_mut();
      match state.prepared.as_mut() {
         Some(prepared) => f(&mut prepared.parameter_buffer),
         None => f(&mut []),
      }
   }
}

/// A prepared SQL statement bound to exactly one [`Transaction`].
///
/// Preparation is lazy: the first `open()`, `execute()`, or field/parameter
/// access compiles the SQL and caches descriptors and buffers. Ending the
/// transaction context (commit, rollback, connection loss) releases all of
/// that through the lifecycle cascade; the statement then re-prepares
/// transparently on its next use.
///
/// # Examples
///
/// ```no_run
/// use std::rc::Rc;
/// use ember_driver::{EngineClient, Statement, Transaction};
///
/// # fn example(engine: Rc<dyn EngineClient>, transaction: &Transaction) -> ember_driver::Result<()> {
/// let statement = Statement::new(engine);
/// statement.bind_transaction(transaction);
/// statement.set_sql("SELECT ID, DESC FROM TEST WHERE ID >= :ID")?;
///
/// if let Some(param) = statement.param_by_name("ID")? {
///    param.set_int(3)?;
/// }
///
/// statement.open()?;
/// while statement.fetch()? {
///    let id = statement.field_by_name("ID")?.map(|f| f.as_integer());
///    println!("ID: {id:?}");
/// }
/// statement.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Statement {
   shared: Rc<StatementShared>,
}

impl Statement {
   pub fn new(engine: Rc<dyn EngineClient>) -> Self {
      Self {
         shared: Rc::new(StatementShared {
            engine,
            state: RefCell::new(StatementState {
               transaction: Weak::new(),
               subscription: None,
               sql: None,
               prepared: None,
               cursor: None,
            }),
         }),
      }
   }

   /// Sets the statement's SQL text, rewriting named placeholders to
   /// positional form.
   ///
   /// Any prepared or cursor state is released first. On an
   /// [`Error::InvalidStatement`] the statement is left with no SQL and no
   /// partial named-parameter entries.
   pub fn set_sql(&self, sql: &str) -> Result<()> {
      self.shared.release();
      self.shared.state.borrow_mut().sql = None;

      let rewritten = rewrite::rewrite_placeholders(sql)?;
      self.shared.state.borrow_mut().sql = Some(rewritten);
      Ok(())
   }

   /// Binds this statement to `transaction`.
   ///
   /// Unsubscribes from any previously bound transaction's hub, releases
   /// prepared and cursor state, then subscribes to the new hub.
   pub fn bind_transaction(&self, transaction: &Transaction) {
      self.shared.detach_from_transaction();
      self.shared.release();

      let weak_self = Rc::downgrade(&self.shared);
      let subscription = transaction.shared().hub.subscribe(move |event| {
         let Some(shared) = weak_self.upgrade() else {
            return;
         };
         match event {
            TransactionEvent::Disconnected => shared.release(),
            TransactionEvent::Closed => {
               shared.release();
               let mut state = shared.state.borrow_mut();
               state.transaction = Weak::new();
               state.subscription = None;
            }
         }
      });

      let mut state = self.shared.state.borrow_mut();
      state.transaction = Rc::downgrade(transaction.shared());
      state.subscription = Some(subscription);
   }

   /// Runs the statement without opening a cursor (DML/DDL), preparing
   /// lazily if needed.
   pub fn execute(&self) -> Result<()> {
      let transaction = self.shared.check_transaction()?;
      self.shared.ensure_prepared(&transaction)?;
      let (_, txn_handle) = transaction.context()?;

      let state = self.shared.state.borrow();
      let Some(prepared) = state.prepared.as_ref() else {
         return Err(Error::Unbound("statement is not prepared"));
      };
      self
         .shared
         .engine
         .execute(prepared.handle, txn_handle, &prepared.parameter_buffer)?;
      Ok(())
   }

   /// Opens a cursor bound to the current parameter buffer contents,
   /// preparing lazily if needed. An already-open cursor is released
   /// first.
   pub fn open(&self) -> Result<()> {
      let transaction = self.shared.check_transaction()?;
      self.shared.ensure_prepared(&transaction)?;
      let (_, txn_handle) = transaction.context()?;

      let stale = self.shared.state.borrow_mut().cursor.take();
      if let Some(stale) = stale {
         if let Err(e) = self.shared.engine.close_cursor(stale) {
            error!(error = %e, "close failed for stale cursor before re-open");
         }
      }

      let cursor = {
         let state = self.shared.state.borrow();
         let Some(prepared) = state.prepared.as_ref() else {
            return Err(Error::Unbound("statement is not prepared"));
         };
         self
            .shared
            .engine
            .open_cursor(prepared.handle, txn_handle, &prepared.parameter_buffer)?
      };
      self.shared.state.borrow_mut().cursor = Some(cursor);
      Ok(())
   }

   /// Advances the cursor into the field buffer; `true` when a row was
   /// produced.
   pub fn fetch(&self) -> Result<bool> {
      let mut state = self.shared.state.borrow_mut();
      let cursor = state
         .cursor
         .ok_or(Error::Unbound("statement has no open cursor"))?;
      let Some(prepared) = state.prepared.as_mut() else {
         return Err(Error::Unbound("statement is not prepared"));
      };
      let status = self
         .shared
         .engine
         .fetch_next(cursor, &mut prepared.field_buffer)?;
      Ok(status == FetchStatus::Row)
   }

   /// Advances the cursor, discarding the row indicator.
   pub fn next(&self) -> Result<()> {
      self.fetch()?;
      Ok(())
   }

   /// True before the first row has been fetched.
   pub fn bof(&self) -> Result<bool> {
      let cursor = self
         .shared
         .state
         .borrow()
         .cursor
         .ok_or(Error::Unbound("statement has no open cursor"))?;
      Ok(self.shared.engine.is_bof(cursor)?)
   }

   /// True once the cursor has advanced past the last row.
   pub fn eof(&self) -> Result<bool> {
      let cursor = self
         .shared
         .state
         .borrow()
         .cursor
         .ok_or(Error::Unbound("statement has no open cursor"))?;
      Ok(self.shared.engine.is_eof(cursor)?)
   }

   /// Releases only the cursor; the prepared handle and metadata remain,
   /// so the statement can be re-opened without re-preparing. No-op when
   /// no cursor is open.
   pub fn close(&self) -> Result<()> {
      let cursor = self.shared.state.borrow_mut().cursor.take();
      if let Some(cursor) = cursor {
         self.shared.engine.close_cursor(cursor)?;
      }
      Ok(())
   }

   /// Releases cursor, prepared handle, descriptors, and both buffers.
   /// The SQL text and its name table survive until the next `set_sql`.
   pub fn reset(&self) {
      self.shared.release();
   }

   /// Rows affected by the last execution; 0 when the statement has never
   /// been prepared.
   pub fn affected_records(&self) -> Result<u64> {
      let handle = self
         .shared
         .state
         .borrow()
         .prepared
         .as_ref()
         .map(|prepared| prepared.handle);
      match handle {
         Some(handle) => Ok(self.shared.engine.affected_records(handle)?),
         None => Ok(0),
      }
   }

   pub fn is_prepared(&self) -> bool {
      self.shared.state.borrow().prepared.is_some()
   }

   /// Result field at positional index `index`, preparing lazily.
   ///
   /// `Ok(None)` when the statement has no such field.
   pub fn field(&self, index: usize) -> Result<Option<Field<'_>>> {
      self.prepare_for_access()?;
      let state = self.shared.state.borrow();
      let descriptor = state
         .prepared
         .as_ref()
         .and_then(|prepared| prepared.fields.get(index))
         .copied();
      Ok(descriptor.map(|descriptor| Field {
         shared: &self.shared,
         descriptor,
      }))
   }

   /// Result field by select-list alias or column name, preparing lazily.
   pub fn field_by_name(&self, name: &str) -> Result<Option<Field<'_>>> {
      self.prepare_for_access()?;
      let state = self.shared.state.borrow();
      let descriptor = state.prepared.as_ref().and_then(|prepared| {
         let index = *prepared.named_fields.get(name)?;
         prepared.fields.get(index).copied()
      });
      Ok(descriptor.map(|descriptor| Field {
         shared: &self.shared,
         descriptor,
      }))
   }

   /// Parameter at positional index `index`, preparing lazily.
   pub fn parameter(&self, index: usize) -> Result<Option<Parameter<'_>>> {
      self.prepare_for_access()?;
      let state = self.shared.state.borrow();
      let descriptor = state
         .prepared
         .as_ref()
         .and_then(|prepared| prepared.parameters.get(index))
         .copied();
      Ok(descriptor.map(|descriptor| Parameter {
         shared: &self.shared,
         descriptor,
      }))
   }

   /// Parameter by the name it carried before placeholder rewriting.
   pub fn param_by_name(&self, name: &str) -> Result<Option<Parameter<'_>>> {
      self.prepare_for_access()?;
      let state = self.shared.state.borrow();
      let index = state
         .sql
         .as_ref()
         .and_then(|sql| sql.named.get(name).copied());
      let descriptor = match (index, state.prepared.as_ref()) {
         (Some(index), Some(prepared)) => prepared.parameters.get(index).copied(),
         _ => None,
      };
      Ok(descriptor.map(|descriptor| Parameter {
         shared: &self.shared,
         descriptor,
      }))
   }

   fn prepare_for_access(&self) -> Result<()> {
      let transaction = self.shared.check_transaction()?;
      self.shared.ensure_prepared(&transaction)
   }
}

impl Drop for Statement {
   fn drop(&mut self) {
      self.shared.release();
      self.shared.detach_from_transaction();
   }
}

impl std::fmt::Debug for Statement {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      let state = self.shared.state.borrow();
      f.debug_struct("Statement")
         .field("prepared", &state.prepared.is_some())
         .field("open", &state.cursor.is_some())
         .finish()
   }
}

/// Read-only view of one result column of the current row.
///
/// Pure metadata over the statement's field buffer; obtaining one never
/// copies row data. Reads of a NULL value return the getter's sentinel
/// (0 / 0.0 / empty string) rather than failing.
pub struct Field<'a> {
   shared: &'a StatementShared,
   descriptor: ColumnDescriptor,
}

impl Field<'_> {
   pub fn sql_type(&self) -> SqlType {
      self.descriptor.sql_type
   }

   /// Declared payload byte length.
   pub fn length(&self) -> usize {
      self.descriptor.length
   }

   /// True when the current row holds SQL NULL in this column.
   pub fn is_null(&self) -> bool {
      self
         .shared
         .with_field_buffer(|buffer| codec::is_null(&self.descriptor, buffer))
   }

   pub fn as_integer(&self) -> i64 {
      self
         .shared
         .with_field_buffer(|buffer| codec::read_integer(&self.descriptor, buffer))
   }

   pub fn as_double(&self) -> f64 {
      self
         .shared
         .with_field_buffer(|buffer| codec::read_double(&self.descriptor, buffer))
   }

   pub fn as_string(&self) -> String {
      self
         .shared
         .with_field_buffer(|buffer| codec::read_string(&self.descriptor, buffer))
   }

   /// Formats a Date or Timestamp column with a strftime-style format
   /// string; see [`DEFAULT_DATE_FORMAT`]. Empty for non-temporal columns.
   pub fn format_date(&self, format: &str) -> String {
      self
         .shared
         .with_field_buffer(|buffer| codec::format_temporal(&self.descriptor, buffer, format))
   }
}

/// Write-only view of one statement parameter.
///
/// Every setter clears the null indicator except [`Parameter::set_null`],
/// which sets it and leaves the payload bytes uninterpreted.
pub struct Parameter<'a> {
   shared: &'a StatementShared,
   descriptor: ColumnDescriptor,
}

impl Parameter<'_> {
   pub fn sql_type(&self) -> SqlType {
      self.descriptor.sql_type
   }

   /// Declared payload byte length.
   pub fn length(&self) -> usize {
      self.descriptor.length
   }

   /// Writes an integer; [`Error::InvalidBinding`] unless the parameter is
   /// a Short, Long, or Int64 column.
   pub fn set_int(&self, value: i64) -> Result<()> {
      self
         .shared
         .with_parameter_buffer(|buffer| codec::write_integer(&self.descriptor, buffer, value))
   }

   /// Writes a double; integer columns round half away from zero,
   /// non-numeric columns are [`Error::InvalidBinding`].
   pub fn set_double(&self, value: f64) -> Result<()> {
      self
         .shared
         .with_parameter_buffer(|buffer| codec::write_double(&self.descriptor, buffer, value))
   }

   /// Writes text; Text columns are space-padded, Varying columns get a
   /// length prefix. Text longer than the declared column length is a
   /// caller contract violation.
   pub fn set_text(&self, value: &str) -> Result<()> {
      self
         .shared
         .with_parameter_buffer(|buffer| codec::write_text(&self.descriptor, buffer, value))
   }

   /// Marks the parameter SQL NULL, leaving the payload bytes untouched.
   pub fn set_null(&self) {
      self
         .shared
         .with_parameter_buffer(|buffer| codec::write_null(&self.descriptor, buffer));
   }
}
