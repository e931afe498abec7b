//! Inbound message handling: one decoded frame in, delegate callbacks out.

use bsatn_core::RowList;
use tracing::{debug, info, warn};

use super::decoder::decode_rows;
use super::delegate::{
    ConnectionDelegate, OneOffQueryResult, OneOffTableRows, ReducerEvent, TableRow,
};
use super::pending::MessageId;
use super::DbConnection;
use crate::error::ClientError;
use crate::protocol::{
    decode_server_frame, DatabaseUpdate, IdentityToken, OneOffQueryResponse, ServerMessage,
    TableUpdate, UpdateStatus,
};

/// How rows of an update are reported.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Apply {
    /// Deletes, then inserts.
    Diff,
    /// Every row is reported as deleted.
    Remove,
}

impl DbConnection {
    /// Decode and dispatch one frame. Failures stay local to the frame.
    pub(crate) fn handle_frame(&self, frame: &[u8]) {
        match decode_server_frame(frame) {
            Ok(msg) => self.handle_message(msg),
            Err(e) => warn!("Dropping undecodable frame ({} bytes): {}", frame.len(), e),
        }
    }

    pub(crate) fn handle_message(&self, msg: ServerMessage) {
        debug!("Received {}", msg.name());
        let delegate = self.delegate();
        let delegate = delegate.as_deref();

        match msg {
            ServerMessage::IdentityToken(token) => self.on_identity(token, delegate),
            ServerMessage::InitialSubscription(m) => {
                self.apply_database_update(m.database_update, Apply::Diff, delegate);
                if let Some(d) = delegate {
                    d.on_subscription_applied(m.request_id, None);
                }
            }
            ServerMessage::TransactionUpdate(tx) => {
                let event = ReducerEvent::from_transaction(&tx);
                match tx.status {
                    UpdateStatus::Committed(update) => {
                        self.apply_database_update(update, Apply::Diff, delegate)
                    }
                    UpdateStatus::Failed(ref reason) => {
                        info!("Reducer '{}' failed: {}", event.reducer_name, reason)
                    }
                    UpdateStatus::OutOfEnergy => {
                        warn!("Reducer '{}' ran out of energy", event.reducer_name)
                    }
                }
                if let Some(d) = delegate {
                    d.on_reducer_event(&event);
                }
            }
            ServerMessage::TransactionUpdateLight(m) => {
                self.apply_database_update(m.update, Apply::Diff, delegate);
            }
            ServerMessage::OneOffQueryResponse(response) => {
                self.on_one_off_response(response, delegate)
            }
            ServerMessage::SubscribeApplied(m) => {
                self.apply_table_update(m.rows.table_rows, Apply::Diff, delegate);
                if let Some(d) = delegate {
                    d.on_subscription_applied(m.request_id, Some(m.query_id));
                }
            }
            ServerMessage::UnsubscribeApplied(m) => {
                self.apply_table_update(m.rows.table_rows, Apply::Remove, delegate);
                if let Some(d) = delegate {
                    d.on_unsubscribe_applied(m.request_id, m.query_id);
                }
            }
            ServerMessage::SubscribeMultiApplied(m) => {
                self.apply_database_update(m.update, Apply::Diff, delegate);
                if let Some(d) = delegate {
                    d.on_subscription_applied(m.request_id, Some(m.query_id));
                }
            }
            ServerMessage::UnsubscribeMultiApplied(m) => {
                self.apply_database_update(m.update, Apply::Remove, delegate);
                if let Some(d) = delegate {
                    d.on_unsubscribe_applied(m.request_id, m.query_id);
                }
            }
            ServerMessage::SubscriptionError(err) => {
                warn!("Subscription error: {}", err.error);
                if let Some(d) = delegate {
                    d.on_subscription_error(&err);
                }
            }
        }
    }

    fn on_identity(&self, msg: IdentityToken, delegate: Option<&dyn ConnectionDelegate>) {
        {
            let mut session = self.inner.session.lock();
            session.identity = Some(msg.identity);
            session.connection_id = Some(msg.connection_id);
            session.reconnect.last_token = Some(msg.token.clone());
        }
        info!("Identity {} (connection {})", msg.identity, msg.connection_id);
        if let Some(d) = delegate {
            d.on_identity_received(msg.identity, &msg.token, msg.connection_id);
        }
    }

    fn on_one_off_response(
        &self,
        response: OneOffQueryResponse,
        delegate: Option<&dyn ConnectionDelegate>,
    ) {
        let Ok(message_id) = MessageId::try_from(response.message_id.as_slice()) else {
            warn!(
                "One-off query response with {}-byte message id",
                response.message_id.len()
            );
            return;
        };

        if !self.inner.session.lock().pending.contains(&message_id) {
            debug!(
                "One-off query response for unknown or expired id {}",
                hex::encode(message_id)
            );
            return;
        }

        let result = match response.error {
            Some(error) => Err(ClientError::QueryFailed(error)),
            None => {
                let tables = response
                    .tables
                    .into_iter()
                    .map(|table| OneOffTableRows {
                        rows: self.decode_table_rows(&table.table_name, table.rows),
                        table_name: table.table_name,
                    })
                    .collect();
                Ok(OneOffQueryResult {
                    tables,
                    host_execution_micros: response.total_host_execution_micros,
                })
            }
        };

        let notify = match (&result, delegate) {
            (Ok(result), Some(d)) => Some((result.clone(), d)),
            _ => None,
        };
        let delivered = self
            .inner
            .session
            .lock()
            .pending
            .complete(&message_id, result);
        if !delivered {
            debug!(
                "One-off query {} already timed out or was cancelled",
                hex::encode(message_id)
            );
            return;
        }
        if let Some((result, d)) = notify {
            d.on_one_off_query_result(&message_id, &result);
        }
    }

    fn apply_database_update(
        &self,
        update: DatabaseUpdate,
        apply: Apply,
        delegate: Option<&dyn ConnectionDelegate>,
    ) {
        for table in update.tables {
            self.apply_table_update(table, apply, delegate);
        }
    }

    fn apply_table_update(
        &self,
        table: TableUpdate,
        apply: Apply,
        delegate: Option<&dyn ConnectionDelegate>,
    ) {
        let Some(d) = delegate else { return };
        let name = table.table_name.clone();
        for update in table.into_query_updates() {
            let update = match update {
                Ok(update) => update,
                Err(e) => {
                    warn!("Skipping update for table '{}': {}", name, e);
                    continue;
                }
            };

            let mut deletes = self.decode_table_rows(&name, update.deletes);
            let inserts = self.decode_table_rows(&name, update.inserts);

            match apply {
                Apply::Diff => {
                    report(d, &name, &deletes, &inserts);
                }
                Apply::Remove => {
                    deletes.extend(inserts);
                    report(d, &name, &deletes, &[]);
                }
            }
        }
    }

    fn decode_table_rows(&self, table: &str, rows: RowList) -> Vec<TableRow> {
        let decoder = self.decoder_for(table);
        decode_rows(decoder.as_deref(), table, rows)
    }
}

fn report(delegate: &dyn ConnectionDelegate, table: &str, deletes: &[TableRow], inserts: &[TableRow]) {
    if !deletes.is_empty() {
        delegate.on_delete(table, deletes);
    }
    if !inserts.is_empty() {
        delegate.on_insert(table, inserts);
    }
}
