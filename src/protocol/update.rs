use bsatn_core::{
    from_bytes, BsatnError, BsatnReader, BsatnResult, BsatnWriter, Decode, Encode, RowList,
};

use super::codec::{decompress, Compression};
use crate::error::ClientResult;

/// Rows removed and added for one table by one query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryUpdate {
    pub deletes: RowList,
    pub inserts: RowList,
}

bsatn_product!(QueryUpdate { deletes, inserts });

/// A [`QueryUpdate`], possibly compressed on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressedQueryUpdate {
    Uncompressed(QueryUpdate),
    Brotli(Vec<u8>),
    Gzip(Vec<u8>),
}

impl CompressedQueryUpdate {
    /// Decompress (if needed) and parse the inner update.
    pub fn resolve(self) -> ClientResult<QueryUpdate> {
        match self {
            CompressedQueryUpdate::Uncompressed(update) => Ok(update),
            CompressedQueryUpdate::Brotli(data) => {
                let raw = decompress(Compression::Brotli, &data)?;
                Ok(from_bytes(&raw)?)
            }
            CompressedQueryUpdate::Gzip(data) => {
                let raw = decompress(Compression::Gzip, &data)?;
                Ok(from_bytes(&raw)?)
            }
        }
    }
}

impl Encode for CompressedQueryUpdate {
    fn encode(&self, w: &mut BsatnWriter) {
        match self {
            CompressedQueryUpdate::Uncompressed(update) => {
                w.write_u8(Compression::NONE_TAG);
                update.encode(w);
            }
            CompressedQueryUpdate::Brotli(data) => {
                w.write_u8(Compression::BROTLI_TAG);
                w.write_bytes(data);
            }
            CompressedQueryUpdate::Gzip(data) => {
                w.write_u8(Compression::GZIP_TAG);
                w.write_bytes(data);
            }
        }
    }
}

impl Decode for CompressedQueryUpdate {
    fn decode(r: &mut BsatnReader<'_>) -> BsatnResult<Self> {
        match r.read_u8()? {
            Compression::NONE_TAG => Ok(CompressedQueryUpdate::Uncompressed(QueryUpdate::decode(r)?)),
            Compression::BROTLI_TAG => Ok(CompressedQueryUpdate::Brotli(r.read_bytes()?.to_vec())),
            Compression::GZIP_TAG => Ok(CompressedQueryUpdate::Gzip(r.read_bytes()?.to_vec())),
            tag => Err(BsatnError::unsupported_tag("CompressedQueryUpdate", tag)),
        }
    }
}

/// All changes to one table in a transaction or subscription result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableUpdate {
    pub table_id: u32,
    pub table_name: String,
    pub num_rows: u64,
    pub updates: Vec<CompressedQueryUpdate>,
}

bsatn_product!(TableUpdate {
    table_id,
    table_name,
    num_rows,
    updates,
});

impl TableUpdate {
    pub fn new(table_id: u32, table_name: impl Into<String>, update: QueryUpdate) -> Self {
        Self {
            table_id,
            table_name: table_name.into(),
            num_rows: (update.inserts.len() + update.deletes.len()) as u64,
            updates: vec![CompressedQueryUpdate::Uncompressed(update)],
        }
    }

    /// Resolve every nested update. Each result stands alone, so one bad
    /// update does not hide the others.
    pub fn into_query_updates(self) -> impl Iterator<Item = ClientResult<QueryUpdate>> {
        self.updates.into_iter().map(CompressedQueryUpdate::resolve)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DatabaseUpdate {
    pub tables: Vec<TableUpdate>,
}

bsatn_product!(DatabaseUpdate { tables });

impl DatabaseUpdate {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Outcome of the reducer call behind a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    Committed(DatabaseUpdate),
    Failed(String),
    OutOfEnergy,
}

impl Encode for UpdateStatus {
    fn encode(&self, w: &mut BsatnWriter) {
        match self {
            UpdateStatus::Committed(update) => {
                w.write_u8(0);
                update.encode(w);
            }
            UpdateStatus::Failed(message) => {
                w.write_u8(1);
                w.write_str(message);
            }
            UpdateStatus::OutOfEnergy => w.write_u8(2),
        }
    }
}

impl Decode for UpdateStatus {
    fn decode(r: &mut BsatnReader<'_>) -> BsatnResult<Self> {
        match r.read_u8()? {
            0 => Ok(UpdateStatus::Committed(DatabaseUpdate::decode(r)?)),
            1 => Ok(UpdateStatus::Failed(r.read_string()?)),
            2 => Ok(UpdateStatus::OutOfEnergy),
            tag => Err(BsatnError::unsupported_tag("UpdateStatus", tag)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReducerCallInfo {
    pub reducer_name: String,
    pub reducer_id: u32,
    pub args: Vec<u8>,
    pub request_id: u32,
}

bsatn_product!(ReducerCallInfo {
    reducer_name,
    reducer_id,
    args,
    request_id,
});
