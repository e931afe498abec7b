//! Schema descriptors for decoding values.
//!
//! Encoding never needs a schema (values carry their own tag); decoding
//! always does, because the wire format has no type markers.

/// Descriptor for one BSATN value shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlgebraicType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    U128,
    U256,
    I8,
    I16,
    I32,
    I64,
    I128,
    I256,
    F32,
    F64,
    String,
    Array(ArraySchema),
    Product(ProductSchema),
    Sum(SumSchema),
}

impl AlgebraicType {
    pub fn array(elem: AlgebraicType) -> Self {
        AlgebraicType::Array(ArraySchema::new(elem))
    }

    pub fn product(fields: Vec<AlgebraicType>) -> Self {
        AlgebraicType::Product(ProductSchema::new(fields))
    }

    pub fn option(inner: AlgebraicType) -> Self {
        AlgebraicType::Sum(SumSchema::option(inner))
    }

    /// `u32`-length-prefixed bytes share the encoding of `array<u8>`.
    pub fn bytes() -> Self {
        AlgebraicType::array(AlgebraicType::U8)
    }

    /// Encoded size when it does not depend on the value.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            AlgebraicType::Bool | AlgebraicType::U8 | AlgebraicType::I8 => Some(1),
            AlgebraicType::U16 | AlgebraicType::I16 => Some(2),
            AlgebraicType::U32 | AlgebraicType::I32 | AlgebraicType::F32 => Some(4),
            AlgebraicType::U64 | AlgebraicType::I64 | AlgebraicType::F64 => Some(8),
            AlgebraicType::U128 | AlgebraicType::I128 => Some(16),
            AlgebraicType::U256 | AlgebraicType::I256 => Some(32),
            AlgebraicType::Product(p) => p
                .fields
                .iter()
                .map(AlgebraicType::fixed_size)
                .sum::<Option<usize>>(),
            AlgebraicType::String | AlgebraicType::Array(_) | AlgebraicType::Sum(_) => None,
        }
    }
}

/// Ordered, positional field list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductSchema {
    pub fields: Vec<AlgebraicType>,
}

impl ProductSchema {
    pub fn new(fields: Vec<AlgebraicType>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArraySchema {
    pub elem: Box<AlgebraicType>,
}

impl ArraySchema {
    pub fn new(elem: AlgebraicType) -> Self {
        Self {
            elem: Box::new(elem),
        }
    }
}

/// Sum shape. The variant count bounds the tag; each variant may declare
/// the payload it carries, `None` meaning a unit variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SumSchema {
    pub variants: Vec<Option<AlgebraicType>>,
}

impl SumSchema {
    pub const OPTION_SOME_TAG: u8 = 0;
    pub const OPTION_NONE_TAG: u8 = 1;

    pub fn new(variants: Vec<Option<AlgebraicType>>) -> Self {
        Self { variants }
    }

    /// Simple enum with `count` payload-less variants.
    pub fn unit_variants(count: usize) -> Self {
        Self {
            variants: vec![None; count],
        }
    }

    /// `some(inner)` is tag 0, `none` is tag 1.
    pub fn option(inner: AlgebraicType) -> Self {
        Self {
            variants: vec![Some(inner), None],
        }
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    pub fn has_tag(&self, tag: u8) -> bool {
        usize::from(tag) < self.variants.len()
    }

    pub fn payload(&self, tag: u8) -> Option<&AlgebraicType> {
        self.variants.get(usize::from(tag)).and_then(Option::as_ref)
    }
}
