//! BSATN WebSocket client.
//!
//! Speaks the binary (BSATN) subscription protocol over a WebSocket:
//! subscriptions with per-table insert/delete callbacks, reducer calls,
//! one-off queries and automatic reconnection with exponential backoff.
//!
//! ```no_run
//! use std::sync::Arc;
//! use bsatn_client::{ConnectionDelegate, DbConnection, TableRow};
//!
//! struct Printer;
//!
//! impl ConnectionDelegate for Printer {
//!     fn on_insert(&self, table: &str, rows: &[TableRow]) {
//!         println!("{}: {} new rows", table, rows.len());
//!     }
//! }
//!
//! # async fn run() -> bsatn_client::ClientResult<()> {
//! let printer = Arc::new(Printer);
//! let conn = DbConnection::builder()
//!     .with_uri("http://localhost:3000")
//!     .with_database("quickstart-chat")
//!     .with_delegate(&printer)
//!     .connect()
//!     .await?;
//! conn.subscribe(&["SELECT * FROM message"])?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod protocol;

pub use bsatn_core;

pub use client::{
    ConnectionDelegate, ConnectionState, DbConnection, DbConnectionBuilder, FnRowDecoder,
    OneOffQueryResult, OneOffTableRows, ReducerEvent, ReducerStatus, RowDecoder, TableRow,
};
pub use config::ConnectionConfig;
pub use error::{ClientError, ClientResult};
pub use identity::{create_identity, Credentials};
pub use protocol::{Compression, ConnectionId, Identity, QueryId};
