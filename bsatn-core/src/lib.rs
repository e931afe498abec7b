//! BSATN Core - transport-independent codec for the BSATN binary format.
//!
//! BSATN is little-endian and carries no type markers: strings, byte
//! buffers and arrays are `u32`-length-prefixed, products are the plain
//! concatenation of their fields, and sums are a `u8` tag followed by the
//! variant payload. Decoding therefore always needs a schema, while encoding
//! an [`AlgebraicValue`] is self-describing.
//!
//! # Main Components
//!
//! - **Value model**: [`AlgebraicValue`], [`U256`]/[`I256`]
//! - **Schemas**: [`AlgebraicType`], [`ProductSchema`], [`ArraySchema`], [`SumSchema`]
//! - **Cursor codec**: [`BsatnReader`], [`BsatnWriter`], [`Encode`]/[`Decode`]
//! - **Row lists**: [`RowList`], the offset-table encoding for many rows in one blob
//!
//! # Example
//!
//! ```rust
//! use bsatn_core::{AlgebraicType, AlgebraicValue, BsatnReader, BsatnWriter, ProductSchema};
//!
//! let row = AlgebraicValue::Product(vec![
//!     AlgebraicValue::U32(7),
//!     AlgebraicValue::from("hello"),
//! ]);
//! let mut w = BsatnWriter::new();
//! w.write_value(&row);
//! let bytes = w.into_bytes();
//!
//! let schema = ProductSchema::new(vec![AlgebraicType::U32, AlgebraicType::String]);
//! let mut r = BsatnReader::new(&bytes);
//! let fields = r.read_product(&schema).unwrap();
//! assert_eq!(AlgebraicValue::Product(fields), row);
//! ```

pub mod codec;
pub mod error;
pub mod int256;
pub mod reader;
pub mod row_list;
pub mod schema;
pub mod value;
pub mod writer;

pub use codec::{from_bytes, to_bytes, Decode, Encode};
pub use error::{BsatnError, BsatnResult};
pub use int256::{I256, U256};
pub use reader::BsatnReader;
pub use row_list::RowList;
pub use schema::{AlgebraicType, ArraySchema, ProductSchema, SumSchema};
pub use value::{AlgebraicValue, SumValue};
pub use writer::BsatnWriter;
