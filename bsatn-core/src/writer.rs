//! Append-only BSATN writer.

use crate::int256::{I256, U256};
use crate::schema::SumSchema;
use crate::value::AlgebraicValue;

/// Growable output buffer.
#[derive(Debug, Clone, Default)]
pub struct BsatnWriter {
    buf: Vec<u8>,
}

macro_rules! write_le {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            pub fn $name(&mut self, v: $ty) {
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
        )*
    };
}

impl BsatnWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    write_le! {
        write_u8 => u8,
        write_u16 => u16,
        write_u32 => u32,
        write_u64 => u64,
        write_u128 => u128,
        write_i8 => i8,
        write_i16 => i16,
        write_i32 => i32,
        write_i64 => i64,
        write_i128 => i128,
        write_f32 => f32,
        write_f64 => f64,
    }

    pub fn write_u256(&mut self, v: U256) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i256(&mut self, v: I256) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    /// Lengths are `u32` on the wire.
    ///
    /// # Panics
    ///
    /// Panics if `len` does not fit in a `u32`; no message this crate builds
    /// gets near 4 GiB.
    pub fn write_len(&mut self, len: usize) {
        let len = u32::try_from(len).expect("BSATN length exceeds u32::MAX");
        self.write_u32(len);
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_len(s.len());
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_len(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    /// Raw bytes with no prefix.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_array<T>(&mut self, items: &[T], mut f: impl FnMut(&mut Self, &T)) {
        self.write_len(items.len());
        for item in items {
            f(self, item);
        }
    }

    /// Fields in declared order, no separators and no count.
    pub fn write_product<T>(&mut self, fields: &[T], mut f: impl FnMut(&mut Self, &T)) {
        for field in fields {
            f(self, field);
        }
    }

    /// Tag byte, then the payload only when both value and writer exist.
    pub fn write_sum<T>(
        &mut self,
        tag: u8,
        value: Option<&T>,
        f: Option<impl FnOnce(&mut Self, &T)>,
    ) {
        self.write_u8(tag);
        if let (Some(value), Some(f)) = (value, f) {
            f(self, value);
        }
    }

    pub fn write_option<T>(&mut self, value: Option<&T>, f: impl FnOnce(&mut Self, &T)) {
        match value {
            Some(v) => self.write_sum(SumSchema::OPTION_SOME_TAG, Some(v), Some(f)),
            None => self.write_u8(SumSchema::OPTION_NONE_TAG),
        }
    }

    /// Self-describing: switches on the value's own variant.
    pub fn write_value(&mut self, value: &AlgebraicValue) {
        match value {
            AlgebraicValue::Bool(v) => self.write_bool(*v),
            AlgebraicValue::U8(v) => self.write_u8(*v),
            AlgebraicValue::U16(v) => self.write_u16(*v),
            AlgebraicValue::U32(v) => self.write_u32(*v),
            AlgebraicValue::U64(v) => self.write_u64(*v),
            AlgebraicValue::U128(v) => self.write_u128(*v),
            AlgebraicValue::U256(v) => self.write_u256(*v),
            AlgebraicValue::I8(v) => self.write_i8(*v),
            AlgebraicValue::I16(v) => self.write_i16(*v),
            AlgebraicValue::I32(v) => self.write_i32(*v),
            AlgebraicValue::I64(v) => self.write_i64(*v),
            AlgebraicValue::I128(v) => self.write_i128(*v),
            AlgebraicValue::I256(v) => self.write_i256(*v),
            AlgebraicValue::F32(v) => self.write_f32(*v),
            AlgebraicValue::F64(v) => self.write_f64(*v),
            AlgebraicValue::String(s) => self.write_str(s),
            AlgebraicValue::Array(items) => self.write_array(items, Self::write_value),
            AlgebraicValue::Product(fields) => self.write_product(fields, Self::write_value),
            AlgebraicValue::Sum(sum) => self.write_sum(
                sum.tag,
                sum.value.as_deref(),
                Some(Self::write_value),
            ),
        }
    }
}
