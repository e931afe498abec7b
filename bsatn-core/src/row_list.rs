//! Offset-table row lists.
//!
//! Layout: `count: u32`, `count × u64` start offsets into the blob,
//! `blob_len: u32`, blob bytes. Row `i` runs from `offsets[i]` to
//! `offsets[i + 1]`, the last row to the end of the blob.

use tracing::warn;

use crate::codec::{Decode, Encode};
use crate::error::BsatnResult;
use crate::reader::BsatnReader;
use crate::schema::ProductSchema;
use crate::value::AlgebraicValue;
use crate::writer::BsatnWriter;

/// An ordered list of opaque row buffers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowList {
    rows: Vec<Vec<u8>>,
}

impl RowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn into_rows(self) -> Vec<Vec<u8>> {
        self.rows
    }

    /// Decode every row against `schema`; each row must be consumed exactly.
    pub fn decode_rows<'a>(
        &'a self,
        schema: &'a ProductSchema,
    ) -> impl Iterator<Item = BsatnResult<Vec<AlgebraicValue>>> + 'a {
        self.iter().map(move |row| {
            let mut r = BsatnReader::new(row);
            let fields = r.read_product(schema)?;
            r.expect_end()?;
            Ok(fields)
        })
    }
}

impl From<Vec<Vec<u8>>> for RowList {
    fn from(rows: Vec<Vec<u8>>) -> Self {
        Self { rows }
    }
}

impl FromIterator<Vec<u8>> for RowList {
    fn from_iter<I: IntoIterator<Item = Vec<u8>>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

impl Encode for RowList {
    fn encode(&self, w: &mut BsatnWriter) {
        w.write_len(self.rows.len());
        let mut offset = 0u64;
        for row in &self.rows {
            w.write_u64(offset);
            offset += row.len() as u64;
        }
        w.write_len(offset as usize);
        for row in &self.rows {
            w.write_raw(row);
        }
    }
}

impl Decode for RowList {
    /// Parse the offset-table format. Rows whose bounds are inconsistent are
    /// skipped with a warning; the rest of the list survives.
    fn decode(r: &mut BsatnReader<'_>) -> BsatnResult<Self> {
        let count = r.read_len()?;
        let mut offsets = Vec::with_capacity(count.min(r.remaining() / 8));
        for _ in 0..count {
            offsets.push(r.read_u64()?);
        }
        let blob = r.read_bytes()?;

        let mut rows = Vec::with_capacity(offsets.len());
        for (i, &start) in offsets.iter().enumerate() {
            let end = offsets
                .get(i + 1)
                .copied()
                .unwrap_or(blob.len() as u64);
            if start > end || end > blob.len() as u64 {
                warn!(
                    "Skipping corrupt row {} of {}: offsets {}..{} outside blob of {} bytes",
                    i,
                    offsets.len(),
                    start,
                    end,
                    blob.len()
                );
                continue;
            }
            rows.push(blob[start as usize..end as usize].to_vec());
        }
        Ok(Self { rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{from_bytes, to_bytes};
    use crate::schema::AlgebraicType;

    fn raw_list(offsets: &[u64], blob: &[u8]) -> Vec<u8> {
        let mut w = BsatnWriter::new();
        w.write_u32(offsets.len() as u32);
        for o in offsets {
            w.write_u64(*o);
        }
        w.write_bytes(blob);
        w.into_bytes()
    }

    #[test]
    fn test_layout() {
        let list = RowList::from(vec![vec![1, 2], vec![], vec![3]]);
        let bytes = to_bytes(&list);
        assert_eq!(bytes, raw_list(&[0, 2, 2], &[1, 2, 3]));
        assert_eq!(from_bytes::<RowList>(&bytes).unwrap(), list);
    }

    #[test]
    fn test_empty_list_ignores_blob() {
        let bytes = raw_list(&[], &[9, 9, 9]);
        let list = from_bytes::<RowList>(&bytes).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_non_monotonic_offsets_skip_row() {
        let bytes = raw_list(&[5, 3], &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let list = from_bytes::<RowList>(&bytes).unwrap();
        assert!(list.len() <= 1);
        assert_eq!(list.get(0), Some(&[3, 4, 5, 6, 7, 8, 9][..]));
    }

    #[test]
    fn test_offset_past_blob_skips_row() {
        let bytes = raw_list(&[0, 20], &[1, 2, 3]);
        let list = from_bytes::<RowList>(&bytes).unwrap();
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn test_truncated_offsets() {
        let mut bytes = raw_list(&[0, 4], &[1, 2, 3, 4]);
        bytes.truncate(10);
        assert!(from_bytes::<RowList>(&bytes).is_err());
    }

    #[test]
    fn test_decode_rows() {
        let schema = ProductSchema::new(vec![AlgebraicType::U8, AlgebraicType::String]);
        let list = RowList::from(vec![vec![7, 1, 0, 0, 0, b'x'], vec![8]]);
        let decoded: Vec<_> = list.decode_rows(&schema).collect();
        assert_eq!(
            decoded[0].as_ref().unwrap(),
            &vec![AlgebraicValue::U8(7), AlgebraicValue::from("x")]
        );
        assert!(decoded[1].is_err());
    }
}
