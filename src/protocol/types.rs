use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bsatn_core::{BsatnReader, BsatnResult, BsatnWriter, Decode, Encode, U256};

use crate::error::ClientResult;

macro_rules! newtype_codec {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(&self, w: &mut BsatnWriter) {
                    self.0.encode(w);
                }
            }

            impl Decode for $ty {
                fn decode(r: &mut BsatnReader<'_>) -> BsatnResult<Self> {
                    Decode::decode(r).map($ty)
                }
            }
        )*
    };
}

/// A client identity; rendered as 64 hex characters, most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Identity(pub U256);

impl Identity {
    pub fn from_hex(s: &str) -> ClientResult<Self> {
        Ok(Identity(U256::from_be_hex(s)?))
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Per-connection id assigned by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConnectionId(pub u128);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Client-assigned subscription id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct QueryId(pub u32);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn as_micros(&self) -> u64 {
        self.0
    }

    pub fn to_system_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_micros(self.0)
    }
}

/// Energy consumed by a reducer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct EnergyQuanta(pub u128);

impl fmt::Display for EnergyQuanta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} eV", self.0)
    }
}

newtype_codec!(Identity, ConnectionId, QueryId, Timestamp, EnergyQuanta);
