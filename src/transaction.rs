//! Transaction lifecycle: binding, commit/rollback, and cascade reactions.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use ember_engine::{AttachmentHandle, EngineClient, TransactionHandle, TransactionOptions};
use ember_lifecycle::{ConnectionEvent, LifecycleHub, SubscriptionId, TransactionEvent};
use tracing::{debug, error};

use crate::connection::{Connection, ConnectionShared};
use crate::error::{Error, Result};

pub(crate) struct TransactionState {
   connection: Weak<ConnectionShared>,
   subscription: Option<SubscriptionId>,
   pub(crate) handle: Option<TransactionHandle>,
   options: TransactionOptions,
}

pub(crate) struct TransactionShared {
   pub(crate) engine: Rc<dyn EngineClient>,
   pub(crate) hub: LifecycleHub<TransactionEvent>,
   pub(crate) state: RefCell<TransactionState>,
}

impl TransactionShared {
   /// Ensures the bound connection is attached and an engine transaction
   /// is active. Idempotent when a handle already exists.
   pub(crate) fn connect(&self) -> Result<()> {
      let connection = self
         .state
         .borrow()
         .connection
         .upgrade()
         .ok_or(Error::Unbound("transaction has no bound connection"))?;

      if self.state.borrow().handle.is_some() {
         return Ok(());
      }

      let attachment = connection.ensure_attached()?;
      let options = self.state.borrow().options.clone();
      let handle = self.engine.start_transaction(attachment, &options)?;
      self.state.borrow_mut().handle = Some(handle);
      debug!("transaction started");
      Ok(())
   }

   /// Attachment and transaction handles for statement-level engine calls.
   /// Both must be live; `connect()` establishes them.
   pub(crate) fn context(&self) -> Result<(AttachmentHandle, TransactionHandle)> {
      let state = self.state.borrow();
      let connection = state
         .connection
         .upgrade()
         .ok_or(Error::Unbound("transaction has no bound connection"))?;
      let attachment = connection
         .state
         .borrow()
         .handle
         .ok_or(Error::Unbound("connection is not attached"))?;
      let handle = state
         .handle
         .ok_or(Error::Unbound("transaction is not active"))?;
      Ok((attachment, handle))
   }

   /// Rollback-style cleanup that cannot fail: broadcast first so
   /// dependent statements drop their handles, then roll back, logging
   /// instead of propagating engine errors. No-op without an active
   /// handle.
   pub(crate) fn release(&self) {
      if self.state.borrow().handle.is_none() {
         return;
      }
      self.hub.broadcast(TransactionEvent::Disconnected);
      let handle = self.state.borrow_mut().handle.take();
      if let Some(handle) = handle {
         if let Err(e) = self.engine.rollback(handle) {
            error!(error = %e, "rollback failed while releasing transaction handle");
         }
      }
   }

   fn detach_from_connection(&self) {
      let (connection, subscription) = {
         let mut state = self.state.borrow_mut();
         (state.connection.upgrade(), state.subscription.take())
      };
      if let (Some(connection), Some(id)) = (connection, subscription) {
         connection.hub.unsubscribe(id);
      }
   }
}

/// An engine-side unit of work, bound to exactly one [`Connection`].
///
/// The transaction subscribes to its connection's lifecycle hub: a
/// disconnecting connection releases the transaction handle before the
/// detach happens, and a destroyed connection additionally unbinds the
/// transaction for good. Both reactions are re-published downward as
/// [`TransactionEvent::Disconnected`] so statements hear about them without
/// ever subscribing to the connection directly.
pub struct Transaction {
   shared: Rc<TransactionShared>,
}

impl Transaction {
   pub fn new(engine: Rc<dyn EngineClient>) -> Self {
      Self::with_options(engine, TransactionOptions::default())
   }

   /// Creates a transaction that will start engine transactions with the
   /// given options block.
   pub fn with_options(engine: Rc<dyn EngineClient>, options: TransactionOptions) -> Self {
      Self {
         shared: Rc::new(TransactionShared {
            engine,
            hub: LifecycleHub::new(),
            state: RefCell::new(TransactionState {
               connection: Weak::new(),
               subscription: None,
               handle: None,
               options,
            }),
         }),
      }
   }

   /// Binds this transaction to `connection`.
   ///
   /// Unsubscribes from any previously bound connection, releases any
   /// active engine transaction, then subscribes to the new connection's
   /// lifecycle hub.
   pub fn bind_connection(&self, connection: &Connection) {
      self.shared.detach_from_connection();
      self.shared.release();

      let weak_self = Rc::downgrade(&self.shared);
      let subscription = connection.shared().hub.subscribe(move |event| {
         let Some(shared) = weak_self.upgrade() else {
            return;
         };
         match event {
            ConnectionEvent::Disconnected => shared.release(),
            ConnectionEvent::Closed => {
               shared.release();
               // Even with no live handle, dependents must hear that the
               // context is gone for good.
               shared.hub.broadcast(TransactionEvent::Disconnected);
               let mut state = shared.state.borrow_mut();
               state.connection = Weak::new();
               state.subscription = None;
            }
         }
      });

      let mut state = self.shared.state.borrow_mut();
      state.connection = Rc::downgrade(connection.shared());
      state.subscription = Some(subscription);
   }

   /// Ensures the bound connection is attached and starts an engine
   /// transaction if none is active.
   ///
   /// Fails with [`Error::Unbound`] when no connection is bound (or the
   /// bound connection no longer exists).
   pub fn connect(&self) -> Result<()> {
      self.shared.connect()
   }

   /// Commits and ends the transaction context.
   ///
   /// Dependent statements are told to release their handles after the
   /// commit via [`TransactionEvent::Disconnected`]. No-op when inactive.
   pub fn commit(&self) -> Result<()> {
      let Some(handle) = self.shared.state.borrow().handle else {
         return Ok(());
      };
      self.shared.engine.commit(handle)?;
      self.shared.state.borrow_mut().handle = None;
      self.shared.hub.broadcast(TransactionEvent::Disconnected);
      Ok(())
   }

   /// Commits but keeps the transaction context alive for reuse: no
   /// broadcast, handle unchanged. No-op when inactive.
   pub fn commit_retaining(&self) -> Result<()> {
      let Some(handle) = self.shared.state.borrow().handle else {
         return Ok(());
      };
      self.shared.engine.commit_retaining(handle)?;
      Ok(())
   }

   /// Rolls back and ends the transaction context.
   ///
   /// Broadcasts [`TransactionEvent::Disconnected`] *before* issuing the
   /// rollback, so dependent statements are not left holding handles that
   /// reference a transaction about to end. No-op when inactive.
   pub fn rollback(&self) -> Result<()> {
      let Some(handle) = self.shared.state.borrow().handle else {
         return Ok(());
      };
      self.shared.hub.broadcast(TransactionEvent::Disconnected);
      self.shared.engine.rollback(handle)?;
      self.shared.state.borrow_mut().handle = None;
      Ok(())
   }

   /// Rolls back but keeps the transaction context alive for reuse: no
   /// broadcast, handle unchanged. No-op when inactive.
   pub fn rollback_retaining(&self) -> Result<()> {
      let Some(handle) = self.shared.state.borrow().handle else {
         return Ok(());
      };
      self.shared.engine.rollback_retaining(handle)?;
      Ok(())
   }

   /// True while an engine transaction handle is live.
   pub fn is_active(&self) -> bool {
      self.shared.state.borrow().handle.is_some()
   }

   pub(crate) fn shared(&self) -> &Rc<TransactionShared> {
      &self.shared
   }
}

impl Drop for Transaction {
   fn drop(&mut self) {
      self.shared.hub.broadcast(TransactionEvent::Closed);
      let handle = self.shared.state.borrow_mut().handle.take();
      if let Some(handle) = handle {
         if let Err(e) = self.shared.engine.rollback(handle) {
            error!(error = %e, "rollback failed while dropping transaction");
         }
      }
      self.shared.detach_from_connection();
   }
}

impl std::fmt::Debug for Transaction {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      let state = self.shared.state.borrow();
      f.debug_struct("Transaction")
         .field("bound", &(state.connection.strong_count() > 0))
         .field("active", &state.handle.is_some())
         .finish()
   }
}
