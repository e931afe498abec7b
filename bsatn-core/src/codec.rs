//! `Encode`/`Decode` traits for concretely-typed BSATN structures.
//!
//! Protocol messages implement these by hand, field by field, in wire order.

use crate::error::BsatnResult;
use crate::int256::{I256, U256};
use crate::reader::BsatnReader;
use crate::writer::BsatnWriter;

pub trait Encode {
    fn encode(&self, w: &mut BsatnWriter);
}

pub trait Decode: Sized {
    fn decode(r: &mut BsatnReader<'_>) -> BsatnResult<Self>;
}

/// Encode a value into a fresh buffer.
pub fn to_bytes<T: Encode + ?Sized>(value: &T) -> Vec<u8> {
    let mut w = BsatnWriter::new();
    value.encode(&mut w);
    w.into_bytes()
}

/// Decode a value that must span the whole buffer.
pub fn from_bytes<T: Decode>(bytes: &[u8]) -> BsatnResult<T> {
    let mut r = BsatnReader::new(bytes);
    let value = T::decode(&mut r)?;
    r.expect_end()?;
    Ok(value)
}

macro_rules! primitive_codec {
    ($($ty:ty => $write:ident, $read:ident;)*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, w: &mut BsatnWriter) {
                    w.$write(*self);
                }
            }

            impl Decode for $ty {
                fn decode(r: &mut BsatnReader<'_>) -> BsatnResult<Self> {
                    r.$read()
                }
            }
        )*
    };
}

primitive_codec! {
    bool => write_bool, read_bool;
    u8 => write_u8, read_u8;
    u16 => write_u16, read_u16;
    u32 => write_u32, read_u32;
    u64 => write_u64, read_u64;
    u128 => write_u128, read_u128;
    U256 => write_u256, read_u256;
    i8 => write_i8, read_i8;
    i16 => write_i16, read_i16;
    i32 => write_i32, read_i32;
    i64 => write_i64, read_i64;
    i128 => write_i128, read_i128;
    I256 => write_i256, read_i256;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
}

impl Encode for str {
    fn encode(&self, w: &mut BsatnWriter) {
        w.write_str(self);
    }
}

impl Encode for String {
    fn encode(&self, w: &mut BsatnWriter) {
        w.write_str(self);
    }
}

impl Decode for String {
    fn decode(r: &mut BsatnReader<'_>) -> BsatnResult<Self> {
        r.read_string()
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, w: &mut BsatnWriter) {
        w.write_array(self, |w, item| item.encode(w));
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(r: &mut BsatnReader<'_>) -> BsatnResult<Self> {
        r.read_array(T::decode)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, w: &mut BsatnWriter) {
        w.write_option(self.as_ref(), |w, v| v.encode(w));
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(r: &mut BsatnReader<'_>) -> BsatnResult<Self> {
        r.read_option(T::decode)
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, w: &mut BsatnWriter) {
        (**self).encode(w);
    }
}
