//! Stateful connection: socket lifecycle, request correlation, row
//! decoding, update dispatch and automatic reconnection.
//!
//! All mutable state sits behind one `parking_lot::Mutex` that is only held
//! for synchronous bookkeeping. The receive loop, the socket writer, the
//! reconnect loop and one-off query timeouts each run as their own tokio
//! task, and delegate callbacks are invoked after the lock is released.

mod builder;
mod decoder;
mod delegate;
mod dispatch;
mod pending;
mod reconnect;
mod socket;

pub use builder::DbConnectionBuilder;
pub use decoder::{FnRowDecoder, RowDecoder};
pub use delegate::{
    ConnectionDelegate, OneOffQueryResult, OneOffTableRows, ReducerEvent, ReducerStatus, TableRow,
};

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use bsatn_core::{AlgebraicValue, BsatnResult, ProductSchema};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::{ClientError, ClientResult};
use crate::protocol::{
    encode_client_message, CallReducer, CallReducerFlags, ClientMessage, ConnectionId, Identity,
    OneOffQuery, QueryId, Subscribe, SubscribeMulti, SubscribeSingle, Unsubscribe,
    UnsubscribeMulti,
};

use pending::{MessageId, PendingQueries};
use reconnect::{ReconnectPolicy, ReconnectStep};

/// Lifecycle phase of a [`DbConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectMode {
    User,
    Reconnect,
}

struct Session {
    phase: ConnectionState,
    /// Bumped on every connect and disconnect; events from an older
    /// session are ignored.
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    receive_task: Option<JoinHandle<()>>,
    writer_task: Option<JoinHandle<()>>,
    reconnect_task: Option<JoinHandle<()>>,
    next_request_id: u32,
    next_query_id: u32,
    identity: Option<Identity>,
    connection_id: Option<ConnectionId>,
    decoders: HashMap<String, Arc<dyn RowDecoder>>,
    pending: PendingQueries,
    reconnect: ReconnectPolicy,
}

impl Session {
    fn next_request_id(&mut self) -> u32 {
        let id = self.next_request_id;
        self.next_request_id = id.wrapping_add(1);
        id
    }

    fn next_query_id(&mut self) -> QueryId {
        let id = self.next_query_id;
        self.next_query_id = id.wrapping_add(1);
        QueryId(id)
    }

    fn send(&self, msg: ClientMessage) -> ClientResult<()> {
        let outbound = self.outbound.as_ref().ok_or(ClientError::Disconnected)?;
        debug!("Sending {}", msg.name());
        outbound
            .send(Message::binary(encode_client_message(&msg)))
            .map_err(|_| ClientError::Disconnected)
    }

    fn abort_tasks(&mut self) {
        self.outbound = None;
        if let Some(task) = self.receive_task.take() {
            task.abort();
        }
        // The writer finishes on its own once `outbound` is dropped, sending a
        // close frame on the way out.
        self.writer_task = None;
    }
}

struct Inner {
    config: ConnectionConfig,
    delegate: Option<Weak<dyn ConnectionDelegate>>,
    session: Mutex<Session>,
}

/// Handle to one logical connection. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct DbConnection {
    inner: Arc<Inner>,
}

impl DbConnection {
    pub fn builder() -> DbConnectionBuilder {
        DbConnectionBuilder::new()
    }

    pub(crate) fn from_parts(
        config: ConnectionConfig,
        delegate: Option<Weak<dyn ConnectionDelegate>>,
        decoders: HashMap<String, Arc<dyn RowDecoder>>,
    ) -> Self {
        let session = Session {
            phase: ConnectionState::Disconnected,
            generation: 0,
            outbound: None,
            receive_task: None,
            writer_task: None,
            reconnect_task: None,
            next_request_id: 1,
            next_query_id: 1,
            identity: None,
            connection_id: None,
            decoders,
            pending: PendingQueries::default(),
            reconnect: ReconnectPolicy::new(&config),
        };
        Self {
            inner: Arc::new(Inner {
                config,
                delegate,
                session: Mutex::new(session),
            }),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.session.lock().phase
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Identity assigned by the server in this connection's lifetime, if any.
    pub fn identity(&self) -> Option<Identity> {
        self.inner.session.lock().identity
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.inner.session.lock().connection_id
    }

    /// Token used for the next (re)connect.
    pub fn token(&self) -> Option<String> {
        self.inner.session.lock().reconnect.last_token.clone()
    }

    pub(crate) fn delegate(&self) -> Option<Arc<dyn ConnectionDelegate>> {
        self.inner.delegate.as_ref().and_then(Weak::upgrade)
    }

    // ========== Lifecycle ==========

    /// Open the socket and start the receive loop.
    pub async fn connect(&self) -> ClientResult<()> {
        self.establish(ConnectMode::User).await
    }

    async fn establish(&self, mode: ConnectMode) -> ClientResult<()> {
        let url = self.inner.config.subscribe_url()?;

        let (token, generation) = {
            let mut session = self.inner.session.lock();
            let expected = match mode {
                ConnectMode::User => ConnectionState::Disconnected,
                ConnectMode::Reconnect => ConnectionState::Reconnecting,
            };
            if session.phase != expected {
                return Err(ClientError::AlreadyConnected);
            }
            if mode == ConnectMode::User {
                session.phase = ConnectionState::Connecting;
            }
            session.generation += 1;
            (session.reconnect.last_token.clone(), session.generation)
        };

        let ws = match socket::open(&url, token.as_deref()).await {
            Ok(ws) => ws,
            Err(e) => {
                let mut session = self.inner.session.lock();
                if session.generation == generation && mode == ConnectMode::User {
                    session.phase = ConnectionState::Disconnected;
                }
                return Err(e);
            }
        };

        let (sink, stream) = ws.split();
        {
            let mut session = self.inner.session.lock();
            if session.generation != generation {
                // disconnect() ran while the handshake was in flight
                return Err(ClientError::Disconnected);
            }

            let (tx, rx) = mpsc::unbounded_channel();
            session.outbound = Some(tx);
            session.phase = ConnectionState::Connected;
            session.reconnect.reset();
            session.writer_task = Some(tokio::spawn(socket::write_loop(sink, rx)));

            let conn = self.clone();
            session.receive_task = Some(tokio::spawn(async move {
                let frames = conn.clone();
                let reason = socket::read_loop(stream, |frame| frames.handle_frame(frame)).await;
                conn.handle_close(generation, reason);
            }));
        }

        info!("Connected to {}", url);
        if let Some(delegate) = self.delegate() {
            delegate.on_connect();
        }
        Ok(())
    }

    /// Close the socket, stop reconnecting and fail every pending one-off
    /// query with [`ClientError::Disconnected`]. `on_disconnect` fires only
    /// when a live session is closed.
    pub async fn disconnect(&self) -> ClientResult<()> {
        let was_connected = {
            let mut session = self.inner.session.lock();
            // Reconnecting already reported its loss; Connecting never reported a connect.
            let was_connected = session.phase == ConnectionState::Connected;
            session.generation += 1;
            session.phase = ConnectionState::Disconnected;
            session.abort_tasks();
            if let Some(task) = session.reconnect_task.take() {
                task.abort();
            }
            let failed = session.pending.fail_all();
            if failed > 0 {
                debug!("Failed {} pending one-off queries on disconnect", failed);
            }
            was_connected
        };

        if was_connected {
            info!("Disconnected");
            if let Some(delegate) = self.delegate() {
                delegate.on_disconnect(None);
            }
        }
        Ok(())
    }

    /// Disable automatic reconnection and cancel any pending backoff.
    pub fn stop_auto_reconnect(&self) {
        let mut session = self.inner.session.lock();
        session.reconnect.disable();
        if let Some(task) = session.reconnect_task.take() {
            task.abort();
        }
        if session.phase == ConnectionState::Reconnecting {
            session.phase = ConnectionState::Disconnected;
        }
    }

    /// Socket closed underneath us.
    fn handle_close(&self, generation: u64, reason: ClientError) {
        let reconnect = {
            let mut session = self.inner.session.lock();
            if session.generation != generation {
                return;
            }
            session.outbound = None;
            session.receive_task = None;
            session.writer_task = None;
            session.pending.fail_all();

            if session.reconnect.enabled {
                session.phase = ConnectionState::Reconnecting;
                let conn = self.clone();
                session.reconnect_task = Some(tokio::spawn(async move {
                    conn.reconnect_loop().await;
                }));
                true
            } else {
                session.phase = ConnectionState::Disconnected;
                false
            }
        };

        warn!("Connection lost: {}", reason);
        if let Some(delegate) = self.delegate() {
            delegate.on_disconnect(Some(&reason));
        }
        if reconnect {
            debug!("Scheduling reconnect");
        }
    }

    async fn reconnect_loop(&self) {
        loop {
            let (step, max_attempts) = {
                let mut session = self.inner.session.lock();
                if session.phase != ConnectionState::Reconnecting {
                    return;
                }
                (session.reconnect.next_step(), session.reconnect.max_attempts)
            };

            match step {
                ReconnectStep::Retry { attempt, delay } => {
                    info!(
                        "Reconnect attempt {}/{} in {:?}",
                        attempt, max_attempts, delay
                    );
                    if let Some(delegate) = self.delegate() {
                        delegate.on_reconnect_attempt(attempt, max_attempts, delay);
                    }
                    tokio::time::sleep(delay).await;

                    match self.establish(ConnectMode::Reconnect).await {
                        Ok(()) => return,
                        Err(ClientError::AlreadyConnected) => return,
                        Err(e) => warn!("Reconnect attempt {} failed: {}", attempt, e),
                    }
                }
                ReconnectStep::Exhausted { attempts } => {
                    self.inner.session.lock().phase = ConnectionState::Disconnected;
                    let err = ClientError::ReconnectExhausted { attempts };
                    warn!("{}", err);
                    if let Some(delegate) = self.delegate() {
                        delegate.on_reconnect_failed(&err);
                    }
                    return;
                }
                ReconnectStep::Stop => {
                    self.inner.session.lock().phase = ConnectionState::Disconnected;
                    return;
                }
            }
        }
    }

    // ========== Requests ==========

    /// Invoke a reducer with pre-encoded BSATN arguments. Returns the request id.
    pub fn call_reducer(&self, reducer: &str, args: Vec<u8>) -> ClientResult<u32> {
        self.call_reducer_with_flags(reducer, args, CallReducerFlags::FullUpdate)
    }

    pub fn call_reducer_with_flags(
        &self,
        reducer: &str,
        args: Vec<u8>,
        flags: CallReducerFlags,
    ) -> ClientResult<u32> {
        let mut session = self.inner.session.lock();
        let request_id = session.next_request_id();
        session.send(ClientMessage::CallReducer(CallReducer {
            reducer: reducer.to_string(),
            args,
            request_id,
            flags,
        }))?;
        Ok(request_id)
    }

    /// Legacy subscribe: replaces the whole subscription set.
    pub fn subscribe(&self, queries: &[&str]) -> ClientResult<u32> {
        let mut session = self.inner.session.lock();
        let request_id = session.next_request_id();
        session.send(ClientMessage::Subscribe(Subscribe {
            query_strings: queries.iter().map(|q| q.to_string()).collect(),
            request_id,
        }))?;
        Ok(request_id)
    }

    pub fn subscribe_single(&self, query: &str) -> ClientResult<QueryId> {
        let mut session = self.inner.session.lock();
        let request_id = session.next_request_id();
        let query_id = session.next_query_id();
        session.send(ClientMessage::SubscribeSingle(SubscribeSingle {
            query: query.to_string(),
            request_id,
            query_id,
        }))?;
        Ok(query_id)
    }

    pub fn subscribe_multi(&self, queries: &[&str]) -> ClientResult<QueryId> {
        let mut session = self.inner.session.lock();
        let request_id = session.next_request_id();
        let query_id = session.next_query_id();
        session.send(ClientMessage::SubscribeMulti(SubscribeMulti {
            query_strings: queries.iter().map(|q| q.to_string()).collect(),
            request_id,
            query_id,
        }))?;
        Ok(query_id)
    }

    pub fn unsubscribe(&self, query_id: QueryId) -> ClientResult<u32> {
        let mut session = self.inner.session.lock();
        let request_id = session.next_request_id();
        session.send(ClientMessage::Unsubscribe(Unsubscribe {
            request_id,
            query_id,
        }))?;
        Ok(request_id)
    }

    pub fn unsubscribe_multi(&self, query_id: QueryId) -> ClientResult<u32> {
        let mut session = self.inner.session.lock();
        let request_id = session.next_request_id();
        session.send(ClientMessage::UnsubscribeMulti(UnsubscribeMulti {
            request_id,
            query_id,
        }))?;
        Ok(request_id)
    }

    /// Run a query once, outside any subscription, with the configured timeout.
    pub async fn one_off_query(&self, query: &str) -> ClientResult<OneOffQueryResult> {
        self.one_off_query_with_timeout(query, self.inner.config.query_timeout)
            .await
    }

    pub async fn one_off_query_with_timeout(
        &self,
        query: &str,
        timeout: Duration,
    ) -> ClientResult<OneOffQueryResult> {
        let message_id: MessageId = rand::random();
        let (tx, rx) = oneshot::channel();

        {
            let mut session = self.inner.session.lock();
            if session.outbound.is_none() {
                return Err(ClientError::Disconnected);
            }
            session.pending.insert(message_id, tx);
            let sent = session.send(ClientMessage::OneOffQuery(OneOffQuery {
                message_id: message_id.to_vec(),
                query_string: query.to_string(),
            }));
            if let Err(e) = sent {
                session.pending.complete(&message_id, Err(ClientError::Disconnected));
                return Err(e);
            }
        }

        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                let timed_out = inner
                    .session
                    .lock()
                    .pending
                    .complete(&message_id, Err(ClientError::Timeout(timeout)));
                if timed_out {
                    warn!("One-off query {} timed out", hex::encode(message_id));
                }
            }
        });

        rx.await.unwrap_or(Err(ClientError::Disconnected))
    }

    // ========== Row decoders ==========

    /// Decode rows of `table` with `decode` from now on.
    pub fn register_table<T, F>(&self, table: &str, schema: ProductSchema, decode: F)
    where
        T: Any + Send + Sync,
        F: Fn(Vec<AlgebraicValue>) -> BsatnResult<T> + Send + Sync + 'static,
    {
        self.register_decoder(table, Arc::new(FnRowDecoder::new(schema, decode)));
    }

    pub fn register_decoder(&self, table: &str, decoder: Arc<dyn RowDecoder>) {
        self.inner
            .session
            .lock()
            .decoders
            .insert(table.to_string(), decoder);
    }

    pub(crate) fn decoder_for(&self, table: &str) -> Option<Arc<dyn RowDecoder>> {
        self.inner.session.lock().decoders.get(table).cloned()
    }

    #[cfg(test)]
    pub(crate) fn pending_queries(&self) -> usize {
        self.inner.session.lock().pending.len()
    }
}
