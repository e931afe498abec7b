use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ClientError;
use crate::protocol::{
    ConnectionId, EnergyQuanta, Identity, QueryId, SubscriptionError, Timestamp,
    TransactionUpdate, UpdateStatus,
};

/// A row as handed to the delegate: decoded by the table's registered
/// decoder, or the raw BSATN bytes when there is none (or it failed).
#[derive(Clone)]
pub enum TableRow {
    Decoded(Arc<dyn Any + Send + Sync>),
    Raw(Vec<u8>),
}

impl TableRow {
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            TableRow::Decoded(row) => row.downcast_ref::<T>(),
            TableRow::Raw(_) => None,
        }
    }

    pub fn raw(&self) -> Option<&[u8]> {
        match self {
            TableRow::Raw(bytes) => Some(bytes),
            TableRow::Decoded(_) => None,
        }
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, TableRow::Decoded(_))
    }
}

impl fmt::Debug for TableRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableRow::Decoded(_) => f.write_str("Decoded(..)"),
            TableRow::Raw(bytes) => write!(f, "Raw({})", hex::encode(bytes)),
        }
    }
}

/// Reducer outcome without the row payload, which is delivered separately
/// through `on_insert`/`on_delete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReducerStatus {
    Committed,
    Failed(String),
    OutOfEnergy,
}

#[derive(Debug, Clone)]
pub struct ReducerEvent {
    pub reducer_name: String,
    pub reducer_id: u32,
    pub args: Vec<u8>,
    pub request_id: u32,
    pub status: ReducerStatus,
    pub caller_identity: Identity,
    pub caller_connection_id: ConnectionId,
    pub timestamp: Timestamp,
    pub energy_used: EnergyQuanta,
    pub host_execution_micros: u64,
}

impl ReducerEvent {
    pub(crate) fn from_transaction(tx: &TransactionUpdate) -> Self {
        let status = match &tx.status {
            UpdateStatus::Committed(_) => ReducerStatus::Committed,
            UpdateStatus::Failed(reason) => ReducerStatus::Failed(reason.clone()),
            UpdateStatus::OutOfEnergy => ReducerStatus::OutOfEnergy,
        };
        Self {
            reducer_name: tx.reducer_call.reducer_name.clone(),
            reducer_id: tx.reducer_call.reducer_id,
            args: tx.reducer_call.args.clone(),
            request_id: tx.reducer_call.request_id,
            status,
            caller_identity: tx.caller_identity,
            caller_connection_id: tx.caller_connection_id,
            timestamp: tx.timestamp,
            energy_used: tx.energy_quanta_used,
            host_execution_micros: tx.total_host_execution_micros,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OneOffTableRows {
    pub table_name: String,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone)]
pub struct OneOffQueryResult {
    pub tables: Vec<OneOffTableRows>,
    pub host_execution_micros: u64,
}

impl OneOffQueryResult {
    pub fn table(&self, name: &str) -> Option<&OneOffTableRows> {
        self.tables.iter().find(|t| t.table_name == name)
    }

    pub fn row_count(&self) -> usize {
        self.tables.iter().map(|t| t.rows.len()).sum()
    }
}

/// Callbacks invoked by a [`DbConnection`](super::DbConnection).
///
/// Every method has an empty default body. Callbacks run on the
/// connection's tasks with no internal lock held, so they may call back
/// into the connection.
#[allow(unused_variables)]
pub trait ConnectionDelegate: Send + Sync {
    fn on_connect(&self) {}

    /// `error` is `None` for a requested disconnect.
    fn on_disconnect(&self, error: Option<&ClientError>) {}

    fn on_reconnect_attempt(&self, attempt: u32, max_attempts: u32, delay: Duration) {}

    /// Reported once, when the reconnect budget is spent.
    fn on_reconnect_failed(&self, error: &ClientError) {}

    fn on_identity_received(&self, identity: Identity, token: &str, connection_id: ConnectionId) {}

    fn on_insert(&self, table: &str, rows: &[TableRow]) {}

    fn on_delete(&self, table: &str, rows: &[TableRow]) {}

    fn on_reducer_event(&self, event: &ReducerEvent) {}

    fn on_one_off_query_result(&self, message_id: &[u8], result: &OneOffQueryResult) {}

    /// `query_id` is `None` for the legacy `Subscribe` call.
    fn on_subscription_applied(&self, request_id: u32, query_id: Option<QueryId>) {}

    fn on_unsubscribe_applied(&self, request_id: u32, query_id: QueryId) {}

    fn on_subscription_error(&self, error: &SubscriptionError) {}
}
