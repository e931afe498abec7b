//! Wire-level fixtures for client and server messages.

use bsatn_client::bsatn_core::{to_bytes, BsatnError, U256};
use bsatn_client::protocol::{
    compress_brotli, decode_client_message, decode_server_frame, encode_client_message,
    encode_server_frame, CallReducer, CallReducerFlags, ClientMessage, Compression, CompressedQueryUpdate,
    ConnectionId, EnergyQuanta, Identity, IdentityToken, ServerMessage, Timestamp, UpdateStatus,
};
use bsatn_client::ClientError;

/// Little-endian fixture builder.
#[derive(Default)]
struct Bytes(Vec<u8>);

impl Bytes {
    fn u8(mut self, v: u8) -> Self {
        self.0.push(v);
        self
    }

    fn u32(mut self, v: u32) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn u64(mut self, v: u64) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn u128(mut self, v: u128) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn str(self, s: &str) -> Self {
        self.bytes(s.as_bytes())
    }

    fn bytes(mut self, b: &[u8]) -> Self {
        self.0.extend_from_slice(&(b.len() as u32).to_le_bytes());
        self.0.extend_from_slice(b);
        self
    }

    fn raw(mut self, b: &[u8]) -> Self {
        self.0.extend_from_slice(b);
        self
    }
}

#[test]
fn test_call_reducer_layout() {
    let msg = ClientMessage::CallReducer(CallReducer {
        reducer: "send_message".to_string(),
        args: vec![0x01, 0x02, 0x03, 0x04],
        request_id: 123_456_789,
        flags: CallReducerFlags::FullUpdate,
    });

    let expected = Bytes::default()
        .u8(0)
        .str("send_message")
        .bytes(&[0x01, 0x02, 0x03, 0x04])
        .u32(123_456_789)
        .u8(0)
        .0;
    let encoded = encode_client_message(&msg);
    assert_eq!(encoded, expected);
    assert_eq!(&encoded[1..5], &12u32.to_le_bytes());
    assert_eq!(&encoded[25..29], &123_456_789u32.to_le_bytes());

    match decode_client_message(&encoded).unwrap() {
        ClientMessage::CallReducer(call) => {
            assert_eq!(call.reducer, "send_message");
            assert_eq!(call.args, vec![0x01, 0x02, 0x03, 0x04]);
            assert_eq!(call.request_id, 123_456_789);
            assert_eq!(call.flags, CallReducerFlags::FullUpdate);
        }
        other => panic!("expected CallReducer, got {:?}", other),
    }
}

fn committed_send_message_frame() -> Vec<u8> {
    let row = Bytes::default().str("Hello, World!").0;
    let identity = [0xabu8; 32];

    Bytes::default()
        .u8(Compression::NONE_TAG)
        .u8(ServerMessage::TRANSACTION_UPDATE)
        // status: Committed(DatabaseUpdate)
        .u8(0)
        .u32(1)
        .u32(4096)
        .str("message")
        .u64(1)
        .u32(1)
        .u8(0)
        // deletes: empty row list
        .u32(0)
        .u32(0)
        // inserts: one row at offset 0
        .u32(1)
        .u64(0)
        .bytes(&row)
        // timestamp, caller, reducer call
        .u64(1_700_000_000_123_456)
        .raw(&identity)
        .u128(0x0102)
        .str("send_message")
        .u32(3)
        .bytes(&row)
        .u32(42)
        .u128(5_000)
        .u64(180)
        .0
}

#[test]
fn test_committed_transaction_fixture() {
    let tx = match decode_server_frame(&committed_send_message_frame()).unwrap() {
        ServerMessage::TransactionUpdate(tx) => tx,
        other => panic!("expected TransactionUpdate, got {:?}", other),
    };

    assert_eq!(tx.timestamp, Timestamp(1_700_000_000_123_456));
    assert_eq!(tx.caller_identity, Identity(U256::from_le_bytes([0xab; 32])));
    assert_eq!(tx.caller_connection_id, ConnectionId(0x0102));
    assert_eq!(tx.reducer_call.reducer_name, "send_message");
    assert_eq!(tx.reducer_call.reducer_id, 3);
    assert_eq!(tx.reducer_call.request_id, 42);
    assert_eq!(tx.energy_quanta_used, EnergyQuanta(5_000));
    assert_eq!(tx.total_host_execution_micros, 180);

    let UpdateStatus::Committed(update) = tx.status else {
        panic!("expected Committed");
    };
    assert_eq!(update.tables.len(), 1);
    let table = &update.tables[0];
    assert_eq!(table.table_name, "message");
    assert_eq!(table.num_rows, 1);
    match &table.updates[0] {
        CompressedQueryUpdate::Uncompressed(q) => {
            assert!(q.deletes.is_empty());
            assert_eq!(q.inserts.len(), 1);
            assert_eq!(
                q.inserts.get(0),
                Some(to_bytes(&"Hello, World!".to_string()).as_slice())
            );
        }
        other => panic!("unexpected update: {:?}", other),
    }
}

#[test]
fn test_brotli_frame_matches_uncompressed() {
    let plain = committed_send_message_frame();
    let mut frame = vec![Compression::BROTLI_TAG];
    frame.extend(compress_brotli(&plain[1..]).unwrap());

    assert_eq!(
        decode_server_frame(&frame).unwrap(),
        decode_server_frame(&plain).unwrap()
    );
}

#[test]
fn test_gzip_frames_are_rejected() {
    let msg = ServerMessage::IdentityToken(IdentityToken {
        identity: Identity(U256::from(1u64)),
        token: "t".to_string(),
        connection_id: ConnectionId(1),
    });
    let mut frame = encode_server_frame(&msg, Compression::None).unwrap();
    frame[0] = Compression::GZIP_TAG;

    assert!(matches!(
        decode_server_frame(&frame),
        Err(ClientError::UnsupportedCompression(_))
    ));
    assert!(matches!(
        encode_server_frame(&msg, Compression::Gzip),
        Err(ClientError::UnsupportedCompression(_))
    ));
}

#[test]
fn test_unknown_update_status() {
    let mut frame = committed_send_message_frame();
    // status tag follows the compression and message tags
    frame[2] = 7;

    match decode_server_frame(&frame) {
        Err(ClientError::Codec(BsatnError::UnsupportedTag { context, tag })) => {
            assert_eq!(context, "UpdateStatus");
            assert_eq!(tag, 7);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_unknown_frame_compression() {
    assert!(matches!(
        decode_server_frame(&[9, 3]),
        Err(ClientError::Codec(BsatnError::UnsupportedTag { .. }))
    ));
}
