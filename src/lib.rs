//! A client-side driver layer over a binary SQL engine protocol.
//!
//! Three resource handles form a dependency chain: a [`Connection`] owns an
//! engine attachment, a [`Transaction`] binds to a connection, and a
//! [`Statement`] binds to a transaction. Each parent publishes lifecycle
//! events on a [`LifecycleHub`]; dependents subscribe and release their own
//! engine handles the moment the parent's context ends, so a disconnect or
//! rollback never leaves a child holding a stale handle.
//!
//! Statements rewrite `:name` placeholders to positional form, prepare
//! lazily, and expose typed [`Field`] and [`Parameter`] views over the raw
//! row buffers.
//!
//! # Examples
//!
//! ```no_run
//! use std::rc::Rc;
//! use ember_driver::{
//!    Connection, ConnectionConfig, EngineClient, Statement, Transaction,
//! };
//!
//! # fn example(engine: Rc<dyn EngineClient>) -> ember_driver::Result<()> {
//! let connection = Connection::new(engine.clone());
//! connection.configure(ConnectionConfig {
//!    server: "10.10.10.80".into(),
//!    database: "/srv/db/app.edb".into(),
//!    username: "sysdba".into(),
//!    password: "masterkey".into(),
//!    ..Default::default()
//! })?;
//!
//! let transaction = Transaction::new(engine.clone());
//! transaction.bind_connection(&connection);
//!
//! let statement = Statement::new(engine);
//! statement.bind_transaction(&transaction);
//! statement.set_sql("SELECT ID, DESC FROM TEST WHERE ID >= :ID")?;
//! if let Some(param) = statement.param_by_name("ID")? {
//!    param.set_int(3)?;
//! }
//!
//! statement.open()?;
//! while statement.fetch()? {
//!    if let Some(field) = statement.field_by_name("DESC")? {
//!       println!("{}", field.as_string());
//!    }
//! }
//! statement.close()?;
//! transaction.commit()?;
//! connection.disconnect();
//! # Ok(())
//! # }
//! ```

mod codec;
pub mod config;
pub mod connection;
pub mod error;
mod rewrite;
pub mod statement;
pub mod transaction;

pub use config::ConnectionConfig;
pub use connection::Connection;
pub use error::{Error, Result};
pub use statement::{DEFAULT_DATE_FORMAT, Field, Parameter, Statement};
pub use transaction::Transaction;

pub use ember_engine::{
   AttachmentHandle, ColumnMetadata, CursorHandle, EngineClient, EngineError, FetchStatus,
   MessageMetadata, ParamBlock, ParamTag, SqlType, StatementHandle, TransactionHandle,
   TransactionOptions,
};
pub use ember_lifecycle::{ConnectionEvent, LifecycleHub, SubscriptionId, TransactionEvent};
