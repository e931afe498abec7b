//! Wire protocol definitions for the BSATN WebSocket API
//!
//! Every server frame is `[compression: u8][payload]`, where the payload
//! (decompressed if needed) is `[message tag: u8][fields...]`. Client frames
//! are never compressed and start directly with the message tag.

/// Implement `Encode`/`Decode` for a struct whose fields are written in
/// declaration order with no framing.
macro_rules! bsatn_product {
    ($ty:ident { $($field:ident),* $(,)? }) => {
        impl bsatn_core::Encode for $ty {
            fn encode(&self, w: &mut bsatn_core::BsatnWriter) {
                $( bsatn_core::Encode::encode(&self.$field, w); )*
            }
        }

        impl bsatn_core::Decode for $ty {
            fn decode(r: &mut bsatn_core::BsatnReader<'_>) -> bsatn_core::BsatnResult<Self> {
                Ok(Self {
                    $( $field: bsatn_core::Decode::decode(r)?, )*
                })
            }
        }
    };
}

pub mod client_message;
pub mod codec;
pub mod server_message;
pub mod types;
pub mod update;

pub use client_message::{
    CallReducer, CallReducerFlags, ClientMessage, OneOffQuery, Subscribe, SubscribeMulti,
    SubscribeSingle, Unsubscribe, UnsubscribeMulti,
};
pub use codec::{
    compress_brotli, decode_client_message, decode_server_frame, decompress_brotli,
    encode_client_message, encode_server_frame, Compression, MAX_DECOMPRESSED_SIZE,
};
pub use server_message::{
    IdentityToken, InitialSubscription, OneOffQueryResponse, OneOffTable, ServerMessage,
    SubscribeApplied, SubscribeMultiApplied, SubscribeRows, SubscriptionError, TransactionUpdate,
    TransactionUpdateLight, UnsubscribeApplied, UnsubscribeMultiApplied,
};
pub use types::{ConnectionId, EnergyQuanta, Identity, QueryId, Timestamp};
pub use update::{
    CompressedQueryUpdate, DatabaseUpdate, QueryUpdate, ReducerCallInfo, TableUpdate,
    UpdateStatus,
};
