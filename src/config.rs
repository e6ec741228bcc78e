//! Configuration for Ember connections.

use ember_engine::{ParamBlock, ParamTag};
use serde::{Deserialize, Serialize};

/// Connection settings for one Ember database.
///
/// # Examples
///
/// ```
/// use ember_driver::ConnectionConfig;
///
/// let config = ConnectionConfig {
///    server: "10.10.10.80".into(),
///    database: "/srv/db/app.edb".into(),
///    username: "sysdba".into(),
///    password: "masterkey".into(),
///    ..Default::default()
/// };
///
/// assert_eq!(config.target(), "10.10.10.80:/srv/db/app.edb");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
   /// Host name or address of the engine server.
   pub server: String,

   /// Database path on the server.
   pub database: String,

   /// User name placed in the connection parameter block.
   pub username: String,

   /// Password placed in the connection parameter block.
   pub password: String,

   /// Database character set.
   ///
   /// Default: `UTF8`
   pub charset: String,
}

impl Default for ConnectionConfig {
   fn default() -> Self {
      Self {
         server: String::new(),
         database: String::new(),
         username: String::new(),
         password: String::new(),
         charset: "UTF8".to_string(),
      }
   }
}

impl ConnectionConfig {
   /// Connection target in the engine's `server:database` form.
   pub fn target(&self) -> String {
      format!("{}:{}", self.server, self.database)
   }

   /// Builds the engine parameter block for this configuration.
   pub fn param_block(&self) -> ParamBlock {
      let mut block = ParamBlock::new();
      block.insert(ParamTag::UserName, self.username.clone());
      block.insert(ParamTag::Password, self.password.clone());
      block.insert(ParamTag::DbCharset, self.charset.clone());
      block
   }
}
