use bsatn_core::{BsatnError, BsatnReader, BsatnResult, BsatnWriter, Decode, Encode, RowList};

use super::types::{ConnectionId, EnergyQuanta, Identity, QueryId, Timestamp};
use super::update::{DatabaseUpdate, ReducerCallInfo, TableUpdate, UpdateStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialSubscription {
    pub database_update: DatabaseUpdate,
    pub request_id: u32,
    pub total_host_execution_micros: u64,
}

bsatn_product!(InitialSubscription {
    database_update,
    request_id,
    total_host_execution_micros,
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionUpdate {
    pub status: UpdateStatus,
    pub timestamp: Timestamp,
    pub caller_identity: Identity,
    pub caller_connection_id: ConnectionId,
    pub reducer_call: ReducerCallInfo,
    pub energy_quanta_used: EnergyQuanta,
    pub total_host_execution_micros: u64,
}

bsatn_product!(TransactionUpdate {
    status,
    timestamp,
    caller_identity,
    caller_connection_id,
    reducer_call,
    energy_quanta_used,
    total_host_execution_micros,
});

/// Transaction update without reducer metadata, sent in light mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionUpdateLight {
    pub request_id: u32,
    pub update: DatabaseUpdate,
}

bsatn_product!(TransactionUpdateLight { request_id, update });

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityToken {
    pub identity: Identity,
    pub token: String,
    pub connection_id: ConnectionId,
}

bsatn_product!(IdentityToken {
    identity,
    token,
    connection_id,
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneOffTable {
    pub table_name: String,
    pub rows: RowList,
}

bsatn_product!(OneOffTable { table_name, rows });

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneOffQueryResponse {
    pub message_id: Vec<u8>,
    pub error: Option<String>,
    pub tables: Vec<OneOffTable>,
    pub total_host_execution_micros: u64,
}

bsatn_product!(OneOffQueryResponse {
    message_id,
    error,
    tables,
    total_host_execution_micros,
});

/// Rows matched by a single-query subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRows {
    pub table_id: u32,
    pub table_name: String,
    pub table_rows: TableUpdate,
}

bsatn_product!(SubscribeRows {
    table_id,
    table_name,
    table_rows,
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeApplied {
    pub request_id: u32,
    pub total_host_execution_micros: u64,
    pub query_id: QueryId,
    pub rows: SubscribeRows,
}

bsatn_product!(SubscribeApplied {
    request_id,
    total_host_execution_micros,
    query_id,
    rows,
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeApplied {
    pub request_id: u32,
    pub total_host_execution_micros: u64,
    pub query_id: QueryId,
    pub rows: SubscribeRows,
}

bsatn_product!(UnsubscribeApplied {
    request_id,
    total_host_execution_micros,
    query_id,
    rows,
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionError {
    pub total_host_execution_micros: u64,
    pub request_id: Option<u32>,
    pub query_id: Option<u32>,
    pub table_id: Option<u32>,
    pub error: String,
}

bsatn_product!(SubscriptionError {
    total_host_execution_micros,
    request_id,
    query_id,
    table_id,
    error,
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeMultiApplied {
    pub request_id: u32,
    pub total_host_execution_micros: u64,
    pub query_id: QueryId,
    pub update: DatabaseUpdate,
}

bsatn_product!(SubscribeMultiApplied {
    request_id,
    total_host_execution_micros,
    query_id,
    update,
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeMultiApplied {
    pub request_id: u32,
    pub total_host_execution_micros: u64,
    pub query_id: QueryId,
    pub update: DatabaseUpdate,
}

bsatn_product!(UnsubscribeMultiApplied {
    request_id,
    total_host_execution_micros,
    query_id,
    update,
});

/// Messages sent from the server to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    InitialSubscription(InitialSubscription),
    TransactionUpdate(TransactionUpdate),
    TransactionUpdateLight(TransactionUpdateLight),
    IdentityToken(IdentityToken),
    OneOffQueryResponse(OneOffQueryResponse),
    SubscribeApplied(SubscribeApplied),
    UnsubscribeApplied(UnsubscribeApplied),
    SubscriptionError(SubscriptionError),
    SubscribeMultiApplied(SubscribeMultiApplied),
    UnsubscribeMultiApplied(UnsubscribeMultiApplied),
}

impl ServerMessage {
    pub const INITIAL_SUBSCRIPTION: u8 = 0;
    pub const TRANSACTION_UPDATE: u8 = 1;
    pub const TRANSACTION_UPDATE_LIGHT: u8 = 2;
    pub const IDENTITY_TOKEN: u8 = 3;
    pub const ONE_OFF_QUERY_RESPONSE: u8 = 4;
    pub const SUBSCRIBE_APPLIED: u8 = 5;
    pub const UNSUBSCRIBE_APPLIED: u8 = 6;
    pub const SUBSCRIPTION_ERROR: u8 = 7;
    pub const SUBSCRIBE_MULTI_APPLIED: u8 = 8;
    pub const UNSUBSCRIBE_MULTI_APPLIED: u8 = 9;

    pub fn tag(&self) -> u8 {
        match self {
            ServerMessage::InitialSubscription(_) => Self::INITIAL_SUBSCRIPTION,
            ServerMessage::TransactionUpdate(_) => Self::TRANSACTION_UPDATE,
            ServerMessage::TransactionUpdateLight(_) => Self::TRANSACTION_UPDATE_LIGHT,
            ServerMessage::IdentityToken(_) => Self::IDENTITY_TOKEN,
            ServerMessage::OneOffQueryResponse(_) => Self::ONE_OFF_QUERY_RESPONSE,
            ServerMessage::SubscribeApplied(_) => Self::SUBSCRIBE_APPLIED,
            ServerMessage::UnsubscribeApplied(_) => Self::UNSUBSCRIBE_APPLIED,
            ServerMessage::SubscriptionError(_) => Self::SUBSCRIPTION_ERROR,
            ServerMessage::SubscribeMultiApplied(_) => Self::SUBSCRIBE_MULTI_APPLIED,
            ServerMessage::UnsubscribeMultiApplied(_) => Self::UNSUBSCRIBE_MULTI_APPLIED,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerMessage::InitialSubscription(_) => "InitialSubscription",
            ServerMessage::TransactionUpdate(_) => "TransactionUpdate",
            ServerMessage::TransactionUpdateLight(_) => "TransactionUpdateLight",
            ServerMessage::IdentityToken(_) => "IdentityToken",
            ServerMessage::OneOffQueryResponse(_) => "OneOffQueryResponse",
            ServerMessage::SubscribeApplied(_) => "SubscribeApplied",
            ServerMessage::UnsubscribeApplied(_) => "UnsubscribeApplied",
            ServerMessage::SubscriptionError(_) => "SubscriptionError",
            ServerMessage::SubscribeMultiApplied(_) => "SubscribeMultiApplied",
            ServerMessage::UnsubscribeMultiApplied(_) => "UnsubscribeMultiApplied",
        }
    }
}

impl Encode for ServerMessage {
    fn encode(&self, w: &mut BsatnWriter) {
        w.write_u8(self.tag());
        match self {
            ServerMessage::InitialSubscription(m) => m.encode(w),
            ServerMessage::TransactionUpdate(m) => m.encode(w),
            ServerMessage::TransactionUpdateLight(m) => m.encode(w),
            ServerMessage::IdentityToken(m) => m.encode(w),
            ServerMessage::OneOffQueryResponse(m) => m.encode(w),
            ServerMessage::SubscribeApplied(m) => m.encode(w),
            ServerMessage::UnsubscribeApplied(m) => m.encode(w),
            ServerMessage::SubscriptionError(m) => m.encode(w),
            ServerMessage::SubscribeMultiApplied(m) => m.encode(w),
            ServerMessage::UnsubscribeMultiApplied(m) => m.encode(w),
        }
    }
}

impl Decode for ServerMessage {
    fn decode(r: &mut BsatnReader<'_>) -> BsatnResult<Self> {
        Ok(match r.read_u8()? {
            Self::INITIAL_SUBSCRIPTION => ServerMessage::InitialSubscription(Decode::decode(r)?),
            Self::TRANSACTION_UPDATE => ServerMessage::TransactionUpdate(Decode::decode(r)?),
            Self::TRANSACTION_UPDATE_LIGHT => {
                ServerMessage::TransactionUpdateLight(Decode::decode(r)?)
            }
            Self::IDENTITY_TOKEN => ServerMessage::IdentityToken(Decode::decode(r)?),
            Self::ONE_OFF_QUERY_RESPONSE => ServerMessage::OneOffQueryResponse(Decode::decode(r)?),
            Self::SUBSCRIBE_APPLIED => ServerMessage::SubscribeApplied(Decode::decode(r)?),
            Self::UNSUBSCRIBE_APPLIED => ServerMessage::UnsubscribeApplied(Decode::decode(r)?),
            Self::SUBSCRIPTION_ERROR => ServerMessage::SubscriptionError(Decode::decode(r)?),
            Self::SUBSCRIBE_MULTI_APPLIED => {
                ServerMessage::SubscribeMultiApplied(Decode::decode(r)?)
            }
            Self::UNSUBSCRIBE_MULTI_APPLIED => {
                ServerMessage::UnsubscribeMultiApplied(Decode::decode(r)?)
            }
            tag => return Err(BsatnError::unsupported_tag("ServerMessage", tag)),
        })
    }
}
