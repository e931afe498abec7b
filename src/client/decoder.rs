use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use bsatn_core::{AlgebraicValue, BsatnReader, BsatnResult, ProductSchema, RowList};
use tracing::warn;

use super::delegate::TableRow;

/// Turns the fields of one row into an application type.
pub trait RowDecoder: Send + Sync {
    fn schema(&self) -> &ProductSchema;

    fn decode(&self, fields: Vec<AlgebraicValue>) -> BsatnResult<Arc<dyn Any + Send + Sync>>;
}

/// A [`RowDecoder`] backed by a closure.
pub struct FnRowDecoder<T, F> {
    schema: ProductSchema,
    decode: F,
    _row: PhantomData<fn() -> T>,
}

impl<T, F> FnRowDecoder<T, F>
where
    T: Any + Send + Sync,
    F: Fn(Vec<AlgebraicValue>) -> BsatnResult<T> + Send + Sync,
{
    pub fn new(schema: ProductSchema, decode: F) -> Self {
        Self {
            schema,
            decode,
            _row: PhantomData,
        }
    }
}

impl<T, F> RowDecoder for FnRowDecoder<T, F>
where
    T: Any + Send + Sync,
    F: Fn(Vec<AlgebraicValue>) -> BsatnResult<T> + Send + Sync,
{
    fn schema(&self) -> &ProductSchema {
        &self.schema
    }

    fn decode(&self, fields: Vec<AlgebraicValue>) -> BsatnResult<Arc<dyn Any + Send + Sync>> {
        let row = (self.decode)(fields)?;
        Ok(Arc::new(row))
    }
}

fn decode_one(decoder: &dyn RowDecoder, bytes: &[u8]) -> BsatnResult<Arc<dyn Any + Send + Sync>> {
    let mut r = BsatnReader::new(bytes);
    let fields = r.read_product(decoder.schema())?;
    r.expect_end()?;
    decoder.decode(fields)
}

/// Decode every row of `rows`; rows that fail keep their raw bytes.
pub(crate) fn decode_rows(
    decoder: Option<&dyn RowDecoder>,
    table: &str,
    rows: RowList,
) -> Vec<TableRow> {
    let Some(decoder) = decoder else {
        return rows.into_rows().into_iter().map(TableRow::Raw).collect();
    };

    rows.into_rows()
        .into_iter()
        .map(|bytes| match decode_one(decoder, &bytes) {
            Ok(row) => TableRow::Decoded(row),
            Err(e) => {
                warn!("Failed to decode row of table '{}': {}", table, e);
                TableRow::Raw(bytes)
            }
        })
        .collect()
}
