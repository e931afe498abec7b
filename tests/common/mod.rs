//! In-process WebSocket server and recording delegate shared by the
//! connection tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bsatn_client::protocol::{
    decode_client_message, encode_server_frame, ClientMessage, Compression, ServerMessage,
};
use bsatn_client::{
    ClientError, ConnectionDelegate, ConnectionId, DbConnectionBuilder, Identity, QueryId,
    ReducerEvent, TableRow,
};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

pub const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Mock server
// ============================================================================

pub struct MockServer {
    pub addr: SocketAddr,
    sockets: mpsc::UnboundedReceiver<MockSocket>,
    accept_task: Option<JoinHandle<()>>,
}

pub struct MockSocket {
    ws: WebSocketStream<TcpStream>,
    pub authorization: Option<String>,
    pub path: String,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, sockets) = mpsc::unbounded_channel();

        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut authorization = None;
                    let mut path = String::new();
                    let callback = |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
                        authorization = req
                            .headers()
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        path = req.uri().to_string();
                        resp.headers_mut().insert(
                            "sec-websocket-protocol",
                            HeaderValue::from_static("v1.bsatn.spacetimedb"),
                        );
                        Ok(resp)
                    };
                    let accepted = accept_hdr_async(stream, callback).await;
                    if let Ok(ws) = accepted {
                        let _ = tx.send(MockSocket {
                            ws,
                            authorization,
                            path,
                        });
                    }
                });
            }
        });

        Self {
            addr,
            sockets,
            accept_task: Some(accept_task),
        }
    }

    pub fn uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Builder pointed at this server, with fast reconnects and no compression.
    pub fn builder(&self) -> DbConnectionBuilder {
        DbConnectionBuilder::new()
            .with_uri(&self.uri())
            .with_database("chat")
            .with_compression(Compression::None)
            .reconnect_backoff(
                Duration::from_millis(10),
                Duration::from_millis(50),
                Duration::ZERO,
            )
    }

    pub async fn accept(&mut self) -> MockSocket {
        tokio::time::timeout(WAIT, self.sockets.recv())
            .await
            .expect("no connection within timeout")
            .expect("server stopped")
    }

    /// No client connects within `wait`.
    pub async fn assert_no_connection(&mut self, wait: Duration) {
        if let Ok(Some(socket)) = tokio::time::timeout(wait, self.sockets.recv()).await {
            panic!("unexpected connection to {}", socket.path);
        }
    }

    /// Stop listening; later connects are refused.
    pub async fn shutdown(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl MockSocket {
    pub async fn send(&mut self, msg: &ServerMessage) {
        self.send_compressed(msg, Compression::None).await;
    }

    pub async fn send_compressed(&mut self, msg: &ServerMessage, compression: Compression) {
        let frame = encode_server_frame(msg, compression).unwrap();
        self.ws.send(Message::binary(frame)).await.unwrap();
    }

    pub async fn send_raw(&mut self, frame: Vec<u8>) {
        self.ws.send(Message::binary(frame)).await.unwrap();
    }

    pub async fn recv(&mut self) -> ClientMessage {
        loop {
            let msg = tokio::time::timeout(WAIT, self.ws.next())
                .await
                .expect("no client message within timeout")
                .expect("socket closed")
                .unwrap();
            if let Message::Binary(data) = msg {
                return decode_client_message(&data).unwrap();
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
        // Drain until the client acknowledges the close.
        let drain = async { while let Some(Ok(_)) = self.ws.next().await {} };
        let _ = tokio::time::timeout(Duration::from_secs(1), drain).await;
    }
}

// ============================================================================
// Recording delegate
// ============================================================================

#[derive(Debug)]
pub enum Event {
    Connected,
    Disconnected(Option<String>),
    ReconnectAttempt(u32),
    ReconnectFailed(String),
    Identity(Identity, String, ConnectionId),
    Insert(String, Vec<TableRow>),
    Delete(String, Vec<TableRow>),
    Reducer(ReducerEvent),
    SubscriptionApplied(u32, Option<QueryId>),
    UnsubscribeApplied(u32, QueryId),
    SubscriptionError(String),
}

pub struct Recorder {
    tx: mpsc::UnboundedSender<Event>,
}

pub struct Events {
    rx: mpsc::UnboundedReceiver<Event>,
}

pub fn recorder() -> (Arc<Recorder>, Events) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(Recorder { tx }), Events { rx })
}

impl Events {
    pub async fn next(&mut self) -> Event {
        tokio::time::timeout(WAIT, self.rx.recv())
            .await
            .expect("no event within timeout")
            .expect("recorder dropped")
    }

    /// Nothing further arrives within `wait`.
    pub async fn assert_quiet(&mut self, wait: Duration) {
        if let Ok(Some(event)) = tokio::time::timeout(wait, self.rx.recv()).await {
            panic!("unexpected event: {:?}", event);
        }
    }
}

impl ConnectionDelegate for Recorder {
    fn on_connect(&self) {
        let _ = self.tx.send(Event::Connected);
    }

    fn on_disconnect(&self, error: Option<&ClientError>) {
        let _ = self.tx.send(Event::Disconnected(error.map(|e| e.to_string())));
    }

    fn on_reconnect_attempt(&self, attempt: u32, _max_attempts: u32, _delay: Duration) {
        let _ = self.tx.send(Event::ReconnectAttempt(attempt));
    }

    fn on_reconnect_failed(&self, error: &ClientError) {
        let _ = self.tx.send(Event::ReconnectFailed(error.to_string()));
    }

    fn on_identity_received(&self, identity: Identity, token: &str, connection_id: ConnectionId) {
        let _ = self
            .tx
            .send(Event::Identity(identity, token.to_string(), connection_id));
    }

    fn on_insert(&self, table: &str, rows: &[TableRow]) {
        let _ = self.tx.send(Event::Insert(table.to_string(), rows.to_vec()));
    }

    fn on_delete(&self, table: &str, rows: &[TableRow]) {
        let _ = self.tx.send(Event::Delete(table.to_string(), rows.to_vec()));
    }

    fn on_reducer_event(&self, event: &ReducerEvent) {
        let _ = self.tx.send(Event::Reducer(event.clone()));
    }

    fn on_subscription_applied(&self, request_id: u32, query_id: Option<QueryId>) {
        let _ = self.tx.send(Event::SubscriptionApplied(request_id, query_id));
    }

    fn on_unsubscribe_applied(&self, request_id: u32, query_id: QueryId) {
        let _ = self.tx.send(Event::UnsubscribeApplied(request_id, query_id));
    }

    fn on_subscription_error(&self, error: &bsatn_client::protocol::SubscriptionError) {
        let _ = self.tx.send(Event::SubscriptionError(error.error.clone()));
    }
}
