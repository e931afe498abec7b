use bsatn_core::{BsatnError, BsatnReader, BsatnResult, BsatnWriter, Decode, Encode};

use super::types::QueryId;

/// How the server should report a reducer call back to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallReducerFlags {
    /// Send the full transaction update, even when it touches no subscribed rows.
    #[default]
    FullUpdate,
    /// Only notify on failure.
    NoSuccessNotify,
}

impl Encode for CallReducerFlags {
    fn encode(&self, w: &mut BsatnWriter) {
        w.write_u8(match self {
            CallReducerFlags::FullUpdate => 0,
            CallReducerFlags::NoSuccessNotify => 1,
        });
    }
}

impl Decode for CallReducerFlags {
    fn decode(r: &mut BsatnReader<'_>) -> BsatnResult<Self> {
        match r.read_u8()? {
            0 => Ok(CallReducerFlags::FullUpdate),
            1 => Ok(CallReducerFlags::NoSuccessNotify),
            tag => Err(BsatnError::unsupported_tag("CallReducerFlags", tag)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallReducer {
    pub reducer: String,
    pub args: Vec<u8>,
    pub request_id: u32,
    pub flags: CallReducerFlags,
}

bsatn_product!(CallReducer {
    reducer,
    args,
    request_id,
    flags,
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe {
    pub query_strings: Vec<String>,
    pub request_id: u32,
}

bsatn_product!(Subscribe {
    query_strings,
    request_id,
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneOffQuery {
    pub message_id: Vec<u8>,
    pub query_string: String,
}

bsatn_product!(OneOffQuery {
    message_id,
    query_string,
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeSingle {
    pub query: String,
    pub request_id: u32,
    pub query_id: QueryId,
}

bsatn_product!(SubscribeSingle {
    query,
    request_id,
    query_id,
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeMulti {
    pub query_strings: Vec<String>,
    pub request_id: u32,
    pub query_id: QueryId,
}

bsatn_product!(SubscribeMulti {
    query_strings,
    request_id,
    query_id,
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsubscribe {
    pub request_id: u32,
    pub query_id: QueryId,
}

bsatn_product!(Unsubscribe {
    request_id,
    query_id,
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeMulti {
    pub request_id: u32,
    pub query_id: QueryId,
}

bsatn_product!(UnsubscribeMulti {
    request_id,
    query_id,
});

/// Messages sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    CallReducer(CallReducer),
    Subscribe(Subscribe),
    OneOffQuery(OneOffQuery),
    SubscribeSingle(SubscribeSingle),
    SubscribeMulti(SubscribeMulti),
    Unsubscribe(Unsubscribe),
    UnsubscribeMulti(UnsubscribeMulti),
}

impl ClientMessage {
    pub const CALL_REDUCER: u8 = 0;
    pub const SUBSCRIBE: u8 = 1;
    pub const ONE_OFF_QUERY: u8 = 2;
    pub const SUBSCRIBE_SINGLE: u8 = 3;
    pub const SUBSCRIBE_MULTI: u8 = 4;
    pub const UNSUBSCRIBE: u8 = 5;
    pub const UNSUBSCRIBE_MULTI: u8 = 6;

    pub fn tag(&self) -> u8 {
        match self {
            ClientMessage::CallReducer(_) => Self::CALL_REDUCER,
            ClientMessage::Subscribe(_) => Self::SUBSCRIBE,
            ClientMessage::OneOffQuery(_) => Self::ONE_OFF_QUERY,
            ClientMessage::SubscribeSingle(_) => Self::SUBSCRIBE_SINGLE,
            ClientMessage::SubscribeMulti(_) => Self::SUBSCRIBE_MULTI,
            ClientMessage::Unsubscribe(_) => Self::UNSUBSCRIBE,
            ClientMessage::UnsubscribeMulti(_) => Self::UNSUBSCRIBE_MULTI,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::CallReducer(_) => "CallReducer",
            ClientMessage::Subscribe(_) => "Subscribe",
            ClientMessage::OneOffQuery(_) => "OneOffQuery",
            ClientMessage::SubscribeSingle(_) => "SubscribeSingle",
            ClientMessage::SubscribeMulti(_) => "SubscribeMulti",
            ClientMessage::Unsubscribe(_) => "Unsubscribe",
            ClientMessage::UnsubscribeMulti(_) => "UnsubscribeMulti",
        }
    }
}

impl Encode for ClientMessage {
    fn encode(&self, w: &mut BsatnWriter) {
        w.write_u8(self.tag());
        match self {
            ClientMessage::CallReducer(m) => m.encode(w),
            ClientMessage::Subscribe(m) => m.encode(w),
            ClientMessage::OneOffQuery(m) => m.encode(w),
            ClientMessage::SubscribeSingle(m) => m.encode(w),
            ClientMessage::SubscribeMulti(m) => m.encode(w),
            ClientMessage::Unsubscribe(m) => m.encode(w),
            ClientMessage::UnsubscribeMulti(m) => m.encode(w),
        }
    }
}

impl Decode for ClientMessage {
    fn decode(r: &mut BsatnReader<'_>) -> BsatnResult<Self> {
        Ok(match r.read_u8()? {
            Self::CALL_REDUCER => ClientMessage::CallReducer(Decode::decode(r)?),
            Self::SUBSCRIBE => ClientMessage::Subscribe(Decode::decode(r)?),
            Self::ONE_OFF_QUERY => ClientMessage::OneOffQuery(Decode::decode(r)?),
            Self::SUBSCRIBE_SINGLE => ClientMessage::SubscribeSingle(Decode::decode(r)?),
            Self::SUBSCRIBE_MULTI => ClientMessage::SubscribeMulti(Decode::decode(r)?),
            Self::UNSUBSCRIBE => ClientMessage::Unsubscribe(Decode::decode(r)?),
            Self::UNSUBSCRIBE_MULTI => ClientMessage::UnsubscribeMulti(Decode::decode(r)?),
            tag => return Err(BsatnError::unsupported_tag("ClientMessage", tag)),
        })
    }
}
