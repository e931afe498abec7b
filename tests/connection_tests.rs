//! End-to-end connection behavior against an in-process WebSocket server.

mod common;

use std::time::Duration;

use bsatn_client::bsatn_core::{to_bytes, AlgebraicType, AlgebraicValue, ProductSchema, RowList, U256};
use bsatn_client::protocol::{
    ClientMessage, Compression, DatabaseUpdate, EnergyQuanta, IdentityToken, OneOffQueryResponse,
    OneOffTable, QueryUpdate, ReducerCallInfo, ServerMessage, SubscribeMultiApplied, TableUpdate,
    Timestamp, TransactionUpdate, UpdateStatus,
};
use bsatn_client::{ClientError, ConnectionId, ConnectionState, Identity, ReducerStatus};
use common::{recorder, Event, MockServer};

fn identity_token(token: &str) -> ServerMessage {
    ServerMessage::IdentityToken(IdentityToken {
        identity: Identity(U256::from(0xfeedu64)),
        token: token.to_string(),
        connection_id: ConnectionId(0x1234),
    })
}

fn message_row(text: &str) -> Vec<u8> {
    to_bytes(&text.to_string())
}

fn committed(reducer: &str, request_id: u32, table: &str, inserts: Vec<Vec<u8>>) -> ServerMessage {
    ServerMessage::TransactionUpdate(TransactionUpdate {
        status: UpdateStatus::Committed(DatabaseUpdate {
            tables: vec![TableUpdate::new(
                4096,
                table,
                QueryUpdate {
                    deletes: RowList::new(),
                    inserts: RowList::from(inserts),
                },
            )],
        }),
        timestamp: Timestamp(1_700_000_000_000_000),
        caller_identity: Identity(U256::from(0xfeedu64)),
        caller_connection_id: ConnectionId(0x1234),
        reducer_call: ReducerCallInfo {
            reducer_name: reducer.to_string(),
            reducer_id: 2,
            args: vec![],
            request_id,
        },
        energy_quanta_used: EnergyQuanta(1000),
        total_host_execution_micros: 250,
    })
}

// ============================================================================
// Connect / identity
// ============================================================================

#[tokio::test]
async fn test_connect_sends_headers_and_captures_identity() {
    let mut server = MockServer::start().await;
    let (delegate, mut events) = recorder();
    let conn = server
        .builder()
        .with_token(Some("initial-token".to_string()))
        .with_delegate(&delegate)
        .connect()
        .await
        .unwrap();

    assert!(matches!(events.next().await, Event::Connected));
    assert_eq!(conn.state(), ConnectionState::Connected);

    let mut socket = server.accept().await;
    assert_eq!(socket.authorization.as_deref(), Some("Bearer initial-token"));
    assert_eq!(socket.path, "/v1/database/chat/subscribe?compression=None");

    socket.send(&identity_token("server-token")).await;
    match events.next().await {
        Event::Identity(identity, token, connection_id) => {
            assert_eq!(identity, Identity(U256::from(0xfeedu64)));
            assert_eq!(token, "server-token");
            assert_eq!(connection_id, ConnectionId(0x1234));
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(conn.identity(), Some(Identity(U256::from(0xfeedu64))));
    assert_eq!(conn.token().as_deref(), Some("server-token"));

    conn.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_second_connect_is_rejected() {
    let mut server = MockServer::start().await;
    let conn = server.builder().connect().await.unwrap();
    let _socket = server.accept().await;

    assert!(matches!(
        conn.connect().await,
        Err(ClientError::AlreadyConnected)
    ));
    conn.disconnect().await.unwrap();
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_requests_after_disconnect_fail() {
    let mut server = MockServer::start().await;
    let conn = server.builder().connect().await.unwrap();
    let _socket = server.accept().await;
    conn.disconnect().await.unwrap();

    assert!(matches!(
        conn.call_reducer("send_message", vec![]),
        Err(ClientError::Disconnected)
    ));
    assert!(matches!(
        conn.one_off_query("SELECT * FROM user").await,
        Err(ClientError::Disconnected)
    ));
}

// ============================================================================
// Reducers and subscriptions
// ============================================================================

#[tokio::test]
async fn test_reducer_call_round_trip() {
    let mut server = MockServer::start().await;
    let (delegate, mut events) = recorder();
    let conn = server
        .builder()
        .with_delegate(&delegate)
        .connect()
        .await
        .unwrap();
    let mut socket = server.accept().await;
    assert!(matches!(events.next().await, Event::Connected));

    let request_id = conn
        .call_reducer("send_message", message_row("Hello, World!"))
        .unwrap();

    match socket.recv().await {
        ClientMessage::CallReducer(call) => {
            assert_eq!(call.reducer, "send_message");
            assert_eq!(call.request_id, request_id);
            assert_eq!(call.args, message_row("Hello, World!"));
        }
        other => panic!("unexpected message: {:?}", other),
    }

    socket
        .send_compressed(
            &committed("send_message", request_id, "message", vec![message_row("Hello, World!")]),
            Compression::Brotli,
        )
        .await;

    match events.next().await {
        Event::Insert(table, rows) => {
            assert_eq!(table, "message");
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].raw(), Some(message_row("Hello, World!").as_slice()));
        }
        other => panic!("unexpected event: {:?}", other),
    }
    match events.next().await {
        Event::Reducer(event) => {
            assert_eq!(event.reducer_name, "send_message");
            assert_eq!(event.request_id, request_id);
            assert_eq!(event.status, ReducerStatus::Committed);
            assert_eq!(event.energy_used, EnergyQuanta(1000));
        }
        other => panic!("unexpected event: {:?}", other),
    }

    conn.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_subscribe_multi_decodes_rows() {
    let mut server = MockServer::start().await;
    let (delegate, mut events) = recorder();
    let conn = server
        .builder()
        .with_delegate(&delegate)
        .with_table(
            "message",
            ProductSchema::new(vec![AlgebraicType::String]),
            |mut fields: Vec<AlgebraicValue>| match fields.pop() {
                Some(AlgebraicValue::String(text)) => Ok(text),
                _ => Err(bsatn_client::bsatn_core::BsatnError::invalid_structure("text")),
            },
        )
        .connect()
        .await
        .unwrap();
    let mut socket = server.accept().await;
    assert!(matches!(events.next().await, Event::Connected));

    let query_id = conn.subscribe_multi(&["SELECT * FROM message"]).unwrap();
    let request_id = match socket.recv().await {
        ClientMessage::SubscribeMulti(sub) => {
            assert_eq!(sub.query_strings, vec!["SELECT * FROM message".to_string()]);
            assert_eq!(sub.query_id, query_id);
            sub.request_id
        }
        other => panic!("unexpected message: {:?}", other),
    };

    socket
        .send(&ServerMessage::SubscribeMultiApplied(SubscribeMultiApplied {
            request_id,
            total_host_execution_micros: 10,
            query_id,
            update: DatabaseUpdate {
                tables: vec![TableUpdate::new(
                    4096,
                    "message",
                    QueryUpdate {
                        deletes: RowList::new(),
                        inserts: RowList::from(vec![message_row("first"), message_row("second")]),
                    },
                )],
            },
        }))
        .await;

    match events.next().await {
        Event::Insert(table, rows) => {
            assert_eq!(table, "message");
            let texts: Vec<_> = rows
                .iter()
                .filter_map(|r| r.downcast_ref::<String>().cloned())
                .collect();
            assert_eq!(texts, vec!["first".to_string(), "second".to_string()]);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(matches!(
        events.next().await,
        Event::SubscriptionApplied(id, Some(q)) if id == request_id && q == query_id
    ));

    conn.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_bad_frame_does_not_end_session() {
    let mut server = MockServer::start().await;
    let (delegate, mut events) = recorder();
    let conn = server
        .builder()
        .with_delegate(&delegate)
        .connect()
        .await
        .unwrap();
    let mut socket = server.accept().await;
    assert!(matches!(events.next().await, Event::Connected));

    socket.send_raw(vec![2, 0x1f, 0x8b]).await; // gzip
    socket.send_raw(vec![0, 99]).await; // unknown message tag
    socket.send(&identity_token("still-alive")).await;

    assert!(matches!(events.next().await, Event::Identity(_, token, _) if token == "still-alive"));
    assert!(conn.is_connected());
    conn.disconnect().await.unwrap();
}

// ============================================================================
// One-off queries
// ============================================================================

#[tokio::test]
async fn test_one_off_query_response() {
    let mut server = MockServer::start().await;
    let conn = server.builder().connect().await.unwrap();
    let mut socket = server.accept().await;

    let query = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.one_off_query("SELECT * FROM user").await })
    };

    let message_id = match socket.recv().await {
        ClientMessage::OneOffQuery(q) => {
            assert_eq!(q.query_string, "SELECT * FROM user");
            assert_eq!(q.message_id.len(), 16);
            q.message_id
        }
        other => panic!("unexpected message: {:?}", other),
    };

    socket
        .send(&ServerMessage::OneOffQueryResponse(OneOffQueryResponse {
            message_id,
            error: None,
            tables: vec![OneOffTable {
                table_name: "user".to_string(),
                rows: RowList::from(vec![vec![1], vec![2]]),
            }],
            total_host_execution_micros: 42,
        }))
        .await;

    let result = query.await.unwrap().unwrap();
    assert_eq!(result.host_execution_micros, 42);
    assert_eq!(result.table("user").map(|t| t.rows.len()), Some(2));

    conn.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_one_off_query_error_and_timeout() {
    let mut server = MockServer::start().await;
    let conn = server.builder().connect().await.unwrap();
    let mut socket = server.accept().await;

    // Server-reported failure
    let failing = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.one_off_query("SELECT * FROM nope").await })
    };
    let ClientMessage::OneOffQuery(q) = socket.recv().await else {
        panic!("expected OneOffQuery");
    };
    socket
        .send(&ServerMessage::OneOffQueryResponse(OneOffQueryResponse {
            message_id: q.message_id,
            error: Some("no such table: nope".to_string()),
            tables: vec![],
            total_host_execution_micros: 1,
        }))
        .await;
    match failing.await.unwrap() {
        Err(ClientError::QueryFailed(msg)) => assert_eq!(msg, "no such table: nope"),
        other => panic!("unexpected result: {:?}", other.map(|r| r.row_count())),
    }

    // No response at all
    let result = conn
        .one_off_query_with_timeout("SELECT * FROM user", Duration::from_millis(100))
        .await;
    assert!(matches!(result, Err(ClientError::Timeout(_))));

    // A late response after the timeout is ignored
    let ClientMessage::OneOffQuery(late) = socket.recv().await else {
        panic!("expected OneOffQuery");
    };
    socket
        .send(&ServerMessage::OneOffQueryResponse(OneOffQueryResponse {
            message_id: late.message_id,
            error: None,
            tables: vec![],
            total_host_execution_micros: 1,
        }))
        .await;
    socket.send(&identity_token("after-late")).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(conn.token().as_deref(), Some("after-late"));

    conn.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_fails_pending_queries() {
    let mut server = MockServer::start().await;
    let conn = server.builder().connect().await.unwrap();
    let mut socket = server.accept().await;

    let query = {
        let conn = conn.clone();
        tokio::spawn(async move {
            conn.one_off_query_with_timeout("SELECT * FROM user", Duration::from_secs(60))
                .await
        })
    };
    assert!(matches!(socket.recv().await, ClientMessage::OneOffQuery(_)));

    conn.disconnect().await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(1), query)
        .await
        .expect("query should fail immediately")
        .unwrap();
    assert!(matches!(result, Err(ClientError::Disconnected)));
}

// ============================================================================
// Reconnection
// ============================================================================

#[tokio::test]
async fn test_reconnect_uses_server_token() {
    let mut server = MockServer::start().await;
    let (delegate, mut events) = recorder();
    let conn = server
        .builder()
        .with_delegate(&delegate)
        .connect()
        .await
        .unwrap();
    let mut socket = server.accept().await;
    assert!(socket.authorization.is_none());
    assert!(matches!(events.next().await, Event::Connected));

    socket.send(&identity_token("issued")).await;
    assert!(matches!(events.next().await, Event::Identity(..)));
    socket.close().await;

    assert!(matches!(events.next().await, Event::Disconnected(Some(_))));
    assert!(matches!(events.next().await, Event::ReconnectAttempt(1)));
    let socket = server.accept().await;
    assert_eq!(socket.authorization.as_deref(), Some("Bearer issued"));
    assert!(matches!(events.next().await, Event::Connected));
    assert_eq!(conn.state(), ConnectionState::Connected);

    conn.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_reconnect_exhaustion_reported_once() {
    let mut server = MockServer::start().await;
    let (delegate, mut events) = recorder();
    let conn = server
        .builder()
        .max_reconnect_attempts(3)
        .with_delegate(&delegate)
        .connect()
        .await
        .unwrap();
    let socket = server.accept().await;
    assert!(matches!(events.next().await, Event::Connected));

    server.shutdown().await;
    socket.close().await;

    assert!(matches!(events.next().await, Event::Disconnected(Some(_))));
    for expected in 1..=3 {
        match events.next().await {
            Event::ReconnectAttempt(attempt) => assert_eq!(attempt, expected),
            other => panic!("unexpected event: {:?}", other),
        }
    }
    match events.next().await {
        Event::ReconnectFailed(msg) => assert_eq!(msg, "Gave up reconnecting after 3 attempts"),
        other => panic!("unexpected event: {:?}", other),
    }
    events.assert_quiet(Duration::from_millis(300)).await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_stop_auto_reconnect() {
    let mut server = MockServer::start().await;
    let (delegate, mut events) = recorder();
    let conn = server
        .builder()
        .with_delegate(&delegate)
        .connect()
        .await
        .unwrap();
    let socket = server.accept().await;
    assert!(matches!(events.next().await, Event::Connected));

    conn.stop_auto_reconnect();
    socket.close().await;

    assert!(matches!(events.next().await, Event::Disconnected(Some(_))));
    events.assert_quiet(Duration::from_millis(200)).await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_stop_auto_reconnect_cancels_pending_backoff() {
    let mut server = MockServer::start().await;
    let (delegate, mut events) = recorder();
    let conn = server
        .builder()
        .reconnect_backoff(
            Duration::from_millis(500),
            Duration::from_millis(500),
            Duration::ZERO,
        )
        .with_delegate(&delegate)
        .connect()
        .await
        .unwrap();
    let socket = server.accept().await;
    assert!(matches!(events.next().await, Event::Connected));

    socket.close().await;
    assert!(matches!(events.next().await, Event::Disconnected(Some(_))));
    assert!(matches!(events.next().await, Event::ReconnectAttempt(1)));
    assert_eq!(conn.state(), ConnectionState::Reconnecting);

    conn.stop_auto_reconnect();
    assert_eq!(conn.state(), ConnectionState::Disconnected);

    server.assert_no_connection(Duration::from_secs(1)).await;
    events.assert_quiet(Duration::from_millis(100)).await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}
