//! Positional, forward-only BSATN reader.

use crate::error::{BsatnError, BsatnResult};
use crate::int256::{I256, U256};
use crate::schema::{AlgebraicType, ProductSchema, SumSchema};
use crate::value::{AlgebraicValue, SumValue};

/// Upper bound on elements reserved up front by [`BsatnReader::read_array`].
const MAX_PREALLOCATED_ELEMENTS: usize = 1024;

/// Cursor over a borrowed byte buffer.
///
/// `take` is the single bounds check every read goes through.
#[derive(Debug, Clone)]
pub struct BsatnReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

macro_rules! read_le {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            pub fn $name(&mut self) -> BsatnResult<$ty> {
                Ok(<$ty>::from_le_bytes(self.take_array()?))
            }
        )*
    };
}

impl<'a> BsatnReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Everything not yet consumed.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Fail unless every byte has been consumed.
    pub fn expect_end(&self) -> BsatnResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(BsatnError::invalid_structure(format!(
                "{} trailing bytes after position {}",
                self.remaining(),
                self.pos
            )))
        }
    }

    pub fn take(&mut self, n: usize) -> BsatnResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(BsatnError::InsufficientData {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> BsatnResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    read_le! {
        read_u8 => u8,
        read_u16 => u16,
        read_u32 => u32,
        read_u64 => u64,
        read_u128 => u128,
        read_i8 => i8,
        read_i16 => i16,
        read_i32 => i32,
        read_i64 => i64,
        read_i128 => i128,
        read_f32 => f32,
        read_f64 => f64,
    }

    pub fn read_u256(&mut self) -> BsatnResult<U256> {
        Ok(U256::from_le_bytes(self.take_array()?))
    }

    pub fn read_i256(&mut self) -> BsatnResult<I256> {
        Ok(I256::from_le_bytes(self.take_array()?))
    }

    pub fn read_bool(&mut self) -> BsatnResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(BsatnError::InvalidBool(other)),
        }
    }

    /// `u32` length, then that many UTF-8 bytes.
    pub fn read_str(&mut self) -> BsatnResult<&'a str> {
        let len = self.read_len()?;
        let bytes = self.take(len)?;
        Ok(std::str::from_utf8(bytes)?)
    }

    pub fn read_string(&mut self) -> BsatnResult<String> {
        self.read_str().map(str::to_owned)
    }

    /// `u32` length, then that many raw bytes.
    pub fn read_bytes(&mut self) -> BsatnResult<&'a [u8]> {
        let len = self.read_len()?;
        self.take(len)
    }

    pub fn read_len(&mut self) -> BsatnResult<usize> {
        Ok(self.read_u32()? as usize)
    }

    /// `u32` count, then `count` elements read by `f`.
    pub fn read_array<T>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> BsatnResult<T>,
    ) -> BsatnResult<Vec<T>> {
        let count = self.read_len()?;
        // A hostile count must not drive the allocation.
        let fits = self.remaining() / std::mem::size_of::<T>().max(1);
        let mut items = Vec::with_capacity(count.min(fits).min(MAX_PREALLOCATED_ELEMENTS));
        for _ in 0..count {
            items.push(f(self)?);
        }
        Ok(items)
    }

    /// Tag 0 is `Some`, tag 1 is `None`.
    pub fn read_option<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> BsatnResult<T>,
    ) -> BsatnResult<Option<T>> {
        match self.read_u8()? {
            SumSchema::OPTION_SOME_TAG => f(self).map(Some),
            SumSchema::OPTION_NONE_TAG => Ok(None),
            tag => Err(BsatnError::unsupported_tag("option", tag)),
        }
    }

    /// Decode exactly one value of the declared shape.
    pub fn read_value(&mut self, ty: &AlgebraicType) -> BsatnResult<AlgebraicValue> {
        Ok(match ty {
            AlgebraicType::Bool => AlgebraicValue::Bool(self.read_bool()?),
            AlgebraicType::U8 => AlgebraicValue::U8(self.read_u8()?),
            AlgebraicType::U16 => AlgebraicValue::U16(self.read_u16()?),
            AlgebraicType::U32 => AlgebraicValue::U32(self.read_u32()?),
            AlgebraicType::U64 => AlgebraicValue::U64(self.read_u64()?),
            AlgebraicType::U128 => AlgebraicValue::U128(self.read_u128()?),
            AlgebraicType::U256 => AlgebraicValue::U256(self.read_u256()?),
            AlgebraicType::I8 => AlgebraicValue::I8(self.read_i8()?),
            AlgebraicType::I16 => AlgebraicValue::I16(self.read_i16()?),
            AlgebraicType::I32 => AlgebraicValue::I32(self.read_i32()?),
            AlgebraicType::I64 => AlgebraicValue::I64(self.read_i64()?),
            AlgebraicType::I128 => AlgebraicValue::I128(self.read_i128()?),
            AlgebraicType::I256 => AlgebraicValue::I256(self.read_i256()?),
            AlgebraicType::F32 => AlgebraicValue::F32(self.read_f32()?),
            AlgebraicType::F64 => AlgebraicValue::F64(self.read_f64()?),
            AlgebraicType::String => AlgebraicValue::String(self.read_string()?),
            AlgebraicType::Array(schema) => {
                AlgebraicValue::Array(self.read_array(|r| r.read_value(&schema.elem))?)
            }
            AlgebraicType::Product(schema) => AlgebraicValue::Product(self.read_product(schema)?),
            AlgebraicType::Sum(schema) => {
                let tag = self.read_u8()?;
                if !schema.has_tag(tag) {
                    return Err(BsatnError::unsupported_tag("sum", tag));
                }
                let value = match schema.payload(tag) {
                    Some(payload) => Some(Box::new(self.read_value(payload)?)),
                    None => None,
                };
                AlgebraicValue::Sum(SumValue { tag, value })
            }
        })
    }

    pub fn read_product(&mut self, schema: &ProductSchema) -> BsatnResult<Vec<AlgebraicValue>> {
        schema.fields.iter().map(|f| self.read_value(f)).collect()
    }
}
