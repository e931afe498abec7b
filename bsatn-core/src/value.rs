//! The algebraic value model.

use std::fmt;

use crate::int256::{I256, U256};
use crate::schema::SumSchema;

/// A tagged sum value. Unit variants carry `value: None`.
#[derive(Debug, Clone, PartialEq)]
pub struct SumValue {
    pub tag: u8,
    pub value: Option<Box<AlgebraicValue>>,
}

/// Any BSATN-encodable value.
#[derive(Debug, Clone, PartialEq)]
pub enum AlgebraicValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    U256(U256),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    I256(I256),
    F32(f32),
    F64(f64),
    String(String),
    Array(Vec<AlgebraicValue>),
    Product(Vec<AlgebraicValue>),
    Sum(SumValue),
}

impl AlgebraicValue {
    pub fn sum(tag: u8, value: Option<AlgebraicValue>) -> Self {
        AlgebraicValue::Sum(SumValue {
            tag,
            value: value.map(Box::new),
        })
    }

    pub fn some(value: AlgebraicValue) -> Self {
        Self::sum(SumSchema::OPTION_SOME_TAG, Some(value))
    }

    pub fn none() -> Self {
        Self::sum(SumSchema::OPTION_NONE_TAG, None)
    }

    pub fn bytes(data: &[u8]) -> Self {
        AlgebraicValue::Array(data.iter().copied().map(AlgebraicValue::U8).collect())
    }

    /// Name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AlgebraicValue::Bool(_) => "bool",
            AlgebraicValue::U8(_) => "u8",
            AlgebraicValue::U16(_) => "u16",
            AlgebraicValue::U32(_) => "u32",
            AlgebraicValue::U64(_) => "u64",
            AlgebraicValue::U128(_) => "u128",
            AlgebraicValue::U256(_) => "u256",
            AlgebraicValue::I8(_) => "i8",
            AlgebraicValue::I16(_) => "i16",
            AlgebraicValue::I32(_) => "i32",
            AlgebraicValue::I64(_) => "i64",
            AlgebraicValue::I128(_) => "i128",
            AlgebraicValue::I256(_) => "i256",
            AlgebraicValue::F32(_) => "f32",
            AlgebraicValue::F64(_) => "f64",
            AlgebraicValue::String(_) => "string",
            AlgebraicValue::Array(_) => "array",
            AlgebraicValue::Product(_) => "product",
            AlgebraicValue::Sum(_) => "sum",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AlgebraicValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            AlgebraicValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AlgebraicValue::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u128(&self) -> Option<u128> {
        match self {
            AlgebraicValue::U128(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u256(&self) -> Option<U256> {
        match self {
            AlgebraicValue::U256(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AlgebraicValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AlgebraicValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            AlgebraicValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[AlgebraicValue]> {
        match self {
            AlgebraicValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_product(&self) -> Option<&[AlgebraicValue]> {
        match self {
            AlgebraicValue::Product(fields) => Some(fields),
            _ => None,
        }
    }

    /// Interpret as an option: `Some(Some(v))` for tag 0, `Some(None)` for
    /// tag 1, `None` when this is not option-shaped.
    pub fn as_option(&self) -> Option<Option<&AlgebraicValue>> {
        match self {
            AlgebraicValue::Sum(SumValue { tag: 0, value }) => {
                value.as_deref().map(Some)
            }
            AlgebraicValue::Sum(SumValue { tag: 1, value: None }) => Some(None),
            _ => None,
        }
    }

    /// Collect an `array<u8>` back into bytes.
    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        self.as_array()?
            .iter()
            .map(|v| match v {
                AlgebraicValue::U8(b) => Some(*b),
                _ => None,
            })
            .collect()
    }
}

impl From<bool> for AlgebraicValue {
    fn from(v: bool) -> Self {
        AlgebraicValue::Bool(v)
    }
}

impl From<u32> for AlgebraicValue {
    fn from(v: u32) -> Self {
        AlgebraicValue::U32(v)
    }
}

impl From<u64> for AlgebraicValue {
    fn from(v: u64) -> Self {
        AlgebraicValue::U64(v)
    }
}

impl From<i64> for AlgebraicValue {
    fn from(v: i64) -> Self {
        AlgebraicValue::I64(v)
    }
}

impl From<String> for AlgebraicValue {
    fn from(v: String) -> Self {
        AlgebraicValue::String(v)
    }
}

impl From<&str> for AlgebraicValue {
    fn from(v: &str) -> Self {
        AlgebraicValue::String(v.to_string())
    }
}

impl From<U256> for AlgebraicValue {
    fn from(v: U256) -> Self {
        AlgebraicValue::U256(v)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[AlgebraicValue]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for AlgebraicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgebraicValue::Bool(v) => write!(f, "{}", v),
            AlgebraicValue::U8(v) => write!(f, "{}", v),
            AlgebraicValue::U16(v) => write!(f, "{}", v),
            AlgebraicValue::U32(v) => write!(f, "{}", v),
            AlgebraicValue::U64(v) => write!(f, "{}", v),
            AlgebraicValue::U128(v) => write!(f, "{}", v),
            AlgebraicValue::U256(v) => write!(f, "{}", v),
            AlgebraicValue::I8(v) => write!(f, "{}", v),
            AlgebraicValue::I16(v) => write!(f, "{}", v),
            AlgebraicValue::I32(v) => write!(f, "{}", v),
            AlgebraicValue::I64(v) => write!(f, "{}", v),
            AlgebraicValue::I128(v) => write!(f, "{}", v),
            AlgebraicValue::I256(v) => write!(f, "{}", v),
            AlgebraicValue::F32(v) => write!(f, "{}", v),
            AlgebraicValue::F64(v) => write!(f, "{}", v),
            AlgebraicValue::String(s) => write!(f, "{:?}", s),
            AlgebraicValue::Array(items) => {
                f.write_str("[")?;
                write_list(f, items)?;
                f.write_str("]")
            }
            AlgebraicValue::Product(fields) => {
                f.write_str("(")?;
                write_list(f, fields)?;
                f.write_str(")")
            }
            AlgebraicValue::Sum(sum) => match self.as_option() {
                Some(Some(inner)) => write!(f, "some({})", inner),
                Some(None) => f.write_str("none"),
                None => match &sum.value {
                    Some(inner) => write!(f, "#{}({})", sum.tag, inner),
                    None => write!(f, "#{}", sum.tag),
                },
            },
        }
    }
}
