//! Connection lifecycle: attach, detach, and downward invalidation.

use std::cell::RefCell;
use std::rc::Rc;

use ember_engine::{AttachmentHandle, EngineClient, ParamBlock};
use ember_lifecycle::{ConnectionEvent, LifecycleHub};
use tracing::{debug, error};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};

pub(crate) struct ConnectionState {
   pub(crate) handle: Option<AttachmentHandle>,
   config: Option<ConnectionConfig>,
   target: String,
   params: ParamBlock,
}

/// Shared core of a connection: the hub outlives any single borrow of the
/// mutable state so broadcasts can run while no state borrow is held.
pub(crate) struct ConnectionShared {
   pub(crate) engine: Rc<dyn EngineClient>,
   pub(crate) hub: LifecycleHub<ConnectionEvent>,
   pub(crate) state: RefCell<ConnectionState>,
}

impl ConnectionShared {
   /// Attaches if no attachment is live yet and returns the handle.
   pub(crate) fn ensure_attached(&self) -> Result<AttachmentHandle> {
      let mut state = self.state.borrow_mut();
      if let Some(handle) = state.handle {
         return Ok(handle);
      }
      if state.config.is_none() {
         return Err(Error::Unbound("connection is not configured"));
      }

      let handle = self.engine.attach(&state.target, &state.params)?;
      state.handle = Some(handle);
      debug!(target = %state.target, "attached");
      Ok(handle)
   }

   /// Detaches unconditionally; an engine failure is logged and the local
   /// handle is cleared regardless, so teardown cannot fail.
   fn force_detach(&self) {
      let handle = self.state.borrow_mut().handle.take();
      if let Some(handle) = handle {
         if let Err(e) = self.engine.detach(handle) {
            error!(error = %e, "detach failed; attachment handle released anyway");
         }
      }
   }
}

/// A live session to the database engine.
///
/// Dependent transactions subscribe to the connection's lifecycle hub and
/// are told to release their engine handles before this connection detaches
/// — see [`Transaction::bind_connection`](crate::Transaction::bind_connection).
///
/// # Examples
///
/// ```no_run
/// use std::rc::Rc;
/// use ember_driver::{Connection, ConnectionConfig, EngineClient};
///
/// # fn example(engine: Rc<dyn EngineClient>) -> ember_driver::Result<()> {
/// let connection = Connection::new(engine);
/// connection.configure(ConnectionConfig {
///    server: "10.10.10.80".into(),
///    database: "/srv/db/app.edb".into(),
///    username: "sysdba".into(),
///    password: "masterkey".into(),
///    ..Default::default()
/// })?;
/// connection.connect()?;
/// // ...
/// connection.disconnect();
/// # Ok(())
/// # }
/// ```
pub struct Connection {
   shared: Rc<ConnectionShared>,
}

impl Connection {
   pub fn new(engine: Rc<dyn EngineClient>) -> Self {
      Self {
         shared: Rc::new(ConnectionShared {
            engine,
            hub: LifecycleHub::new(),
            state: RefCell::new(ConnectionState {
               handle: None,
               config: None,
               target: String::new(),
               params: ParamBlock::new(),
            }),
         }),
      }
   }

   /// Stores connection settings and builds the engine parameter block.
   ///
   /// Fails with [`Error::AlreadyConnected`] while an attachment is live;
   /// disconnect first.
   pub fn configure(&self, config: ConnectionConfig) -> Result<()> {
      let mut state = self.shared.state.borrow_mut();
      if state.handle.is_some() {
         return Err(Error::AlreadyConnected);
      }
      state.target = config.target();
      state.params = config.param_block();
      state.config = Some(config);
      Ok(())
   }

   /// Creates the configured database and holds the resulting attachment.
   ///
   /// Fails with [`Error::AlreadyConnected`] while attached.
   pub fn create_database(&self) -> Result<()> {
      let mut state = self.shared.state.borrow_mut();
      if state.handle.is_some() {
         return Err(Error::AlreadyConnected);
      }
      if state.config.is_none() {
         return Err(Error::Unbound("connection is not configured"));
      }

      let handle = self
         .shared
         .engine
         .create_database(&state.target, &state.params)?;
      state.handle = Some(handle);
      debug!(target = %state.target, "database created");
      Ok(())
   }

   /// Attaches to the configured database. No-op when already attached.
   pub fn connect(&self) -> Result<()> {
      self.shared.ensure_attached()?;
      Ok(())
   }

   /// Detaches from the engine.
   ///
   /// When attached, broadcasts [`ConnectionEvent::Disconnected`] first so
   /// dependent transactions release their handles while the attachment is
   /// still live, then detaches. An engine-level detach failure is logged,
   /// never raised, and the handle is cleared regardless. A no-op (no
   /// broadcast) when not attached.
   pub fn disconnect(&self) {
      if self.shared.state.borrow().handle.is_none() {
         return;
      }
      self.shared.hub.broadcast(ConnectionEvent::Disconnected);
      self.shared.force_detach();
   }

   pub fn is_connected(&self) -> bool {
      self.shared.state.borrow().handle.is_some()
   }

   /// Raw attachment handle, when attached.
   pub fn handle(&self) -> Option<AttachmentHandle> {
      self.shared.state.borrow().handle
   }

   pub(crate) fn shared(&self) -> &Rc<ConnectionShared> {
      &self.shared
   }
}

impl Drop for Connection {
   fn drop(&mut self) {
      // Closed tells dependents to release now and never expect a
      // reconnection; it precedes the detach so their handles go first.
      self.shared.hub.broadcast(ConnectionEvent::Closed);
      self.shared.force_detach();
   }
}

impl std::fmt::Debug for Connection {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      let state = self.shared.state.borrow();
      f.debug_struct("Connection")
         .field("target", &state.target)
         .field("attached", &state.handle.is_some())
         .finish()
   }
}
