//! The column model: a tagged variant over the element storages admitted by
//! the dictionary codec (integers and integer-backed kinds, strings, fixed
//! strings, plus a nullable wrapper).
//!
//! Every storage exposes its elements as byte slices, which is the single
//! representation the unique column and the element codecs operate on.

use lowcard_common::{Result, error::Error};

use crate::field::Field;
use crate::offsets::Offsets;
use crate::values::Values;

/// Width of an integer element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntegerWidth {
    #[inline]
    pub fn byte_size(&self) -> usize {
        match self {
            IntegerWidth::W8 => 1,
            IntegerWidth::W16 => 2,
            IntegerWidth::W32 => 4,
            IntegerWidth::W64 => 8,
        }
    }
}

/// Integer element descriptor: width plus signedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntegerType {
    pub width: IntegerWidth,
    pub signed: bool,
}

impl IntegerType {
    pub const UINT8: IntegerType = IntegerType {
        width: IntegerWidth::W8,
        signed: false,
    };
    pub const UINT16: IntegerType = IntegerType {
        width: IntegerWidth::W16,
        signed: false,
    };
    pub const UINT32: IntegerType = IntegerType {
        width: IntegerWidth::W32,
        signed: false,
    };
    pub const UINT64: IntegerType = IntegerType {
        width: IntegerWidth::W64,
        signed: false,
    };
    pub const INT8: IntegerType = IntegerType {
        width: IntegerWidth::W8,
        signed: true,
    };
    pub const INT16: IntegerType = IntegerType {
        width: IntegerWidth::W16,
        signed: true,
    };
    pub const INT32: IntegerType = IntegerType {
        width: IntegerWidth::W32,
        signed: true,
    };
    pub const INT64: IntegerType = IntegerType {
        width: IntegerWidth::W64,
        signed: true,
    };

    #[inline]
    pub fn byte_size(&self) -> usize {
        self.width.byte_size()
    }

    /// Returns the narrowest unsigned type that can represent `max_value`.
    pub fn smallest_unsigned(max_value: u64) -> IntegerType {
        if max_value <= u8::MAX as u64 {
            IntegerType::UINT8
        } else if max_value <= u16::MAX as u64 {
            IntegerType::UINT16
        } else if max_value <= u32::MAX as u64 {
            IntegerType::UINT32
        } else {
            IntegerType::UINT64
        }
    }

    pub fn name(&self) -> &'static str {
        match (self.signed, self.width) {
            (false, IntegerWidth::W8) => "UInt8",
            (false, IntegerWidth::W16) => "UInt16",
            (false, IntegerWidth::W32) => "UInt32",
            (false, IntegerWidth::W64) => "UInt64",
            (true, IntegerWidth::W8) => "Int8",
            (true, IntegerWidth::W16) => "Int16",
            (true, IntegerWidth::W32) => "Int32",
            (true, IntegerWidth::W64) => "Int64",
        }
    }
}

/// Physical layout of a value storage, ignoring nullability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueLayout {
    Numeric(IntegerType),
    String,
    FixedString(usize),
}

/// Packed fixed-width integer storage (little-endian, native order in
/// memory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericColumn {
    int_type: IntegerType,
    values: Values,
}

impl NumericColumn {
    pub fn new(int_type: IntegerType) -> NumericColumn {
        NumericColumn {
            int_type,
            values: Values::new(),
        }
    }

    /// Builds a packed column of the given type from plain `u64` values.
    ///
    /// Values are truncated to the target width; the caller picks a type
    /// wide enough for all of them.
    pub fn packed_from_u64s(int_type: IntegerType, values: &[u64]) -> NumericColumn {
        let mut column = NumericColumn {
            int_type,
            values: Values::with_byte_capacity(values.len() * int_type.byte_size()),
        };
        for &value in values {
            column.push_u64(value);
        }
        column
    }

    #[inline]
    pub fn int_type(&self) -> IntegerType {
        self.int_type
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len() / self.int_type.byte_size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn values(&self) -> &Values {
        &self.values
    }

    #[inline]
    pub fn element_bytes(&self, index: usize) -> &[u8] {
        let size = self.int_type.byte_size();
        &self.values.as_bytes()[index * size..(index + 1) * size]
    }

    /// Returns the raw bytes of `count` elements starting at `offset`.
    pub fn element_bytes_range(&self, offset: usize, count: usize) -> &[u8] {
        let size = self.int_type.byte_size();
        &self.values.as_bytes()[offset * size..(offset + count) * size]
    }

    /// Reads the element at `index`, zero-extended to `u64`.
    ///
    /// Meaningful for unsigned columns; signed values come back as their raw
    /// width-sized bit pattern.
    #[inline]
    pub fn get_u64(&self, index: usize) -> u64 {
        let bytes = self.element_bytes(index);
        let mut buf = [0u8; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        u64::from_le_bytes(buf)
    }

    /// Appends `value` truncated to the column width.
    #[inline]
    pub fn push_u64(&mut self, value: u64) {
        let size = self.int_type.byte_size();
        debug_assert!(size == 8 || value < 1u64 << (size * 8));
        self.values
            .extend_from_byte_slice(&value.to_le_bytes()[..size]);
    }

    /// Overwrites the element at `index` with `value` truncated to the
    /// column width.
    #[inline]
    pub fn set_u64(&mut self, index: usize, value: u64) {
        let size = self.int_type.byte_size();
        debug_assert!(size == 8 || value < 1u64 << (size * 8));
        self.values.as_bytes_mut()[index * size..(index + 1) * size]
            .copy_from_slice(&value.to_le_bytes()[..size]);
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        debug_assert_eq!(bytes.len(), self.int_type.byte_size());
        self.values.extend_from_byte_slice(bytes);
    }

    /// Appends raw element bytes; the length must be a multiple of the
    /// element size.
    pub fn extend_from_byte_slice(&mut self, bytes: &[u8]) {
        debug_assert_eq!(bytes.len() % self.int_type.byte_size(), 0);
        self.values.extend_from_byte_slice(bytes);
    }

    pub fn field_at(&self, index: usize) -> Field {
        let raw = self.get_u64(index);
        if self.int_type.signed {
            let shift = 64 - self.int_type.byte_size() as u32 * 8;
            Field::Int64(((raw << shift) as i64) >> shift)
        } else {
            Field::UInt64(raw)
        }
    }
}

/// Variable-length byte strings: a contiguous byte body plus offsets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringColumn {
    offsets: Offsets,
    bytes: Values,
}

impl StringColumn {
    pub fn new() -> StringColumn {
        StringColumn {
            offsets: Offsets::new(),
            bytes: Values::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.item_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    #[inline]
    pub fn element_bytes(&self, index: usize) -> &[u8] {
        &self.bytes.as_bytes()[self.offsets.range_at(index)]
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_byte_slice(bytes);
        self.offsets.push_length(bytes.len());
    }

    pub fn reserve(&mut self, additional_items: usize, additional_bytes: usize) {
        self.offsets.reserve(additional_items);
        self.bytes.reserve_bytes(additional_bytes);
    }
}

/// Fixed-length byte strings packed back to back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedStringColumn {
    size: usize,
    bytes: Values,
}

impl FixedStringColumn {
    pub fn new(size: usize) -> FixedStringColumn {
        assert!(size > 0);
        FixedStringColumn {
            size,
            bytes: Values::new(),
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len() / self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn element_bytes(&self, index: usize) -> &[u8] {
        &self.bytes.as_bytes()[index * self.size..(index + 1) * self.size]
    }

    pub fn element_bytes_range(&self, offset: usize, count: usize) -> &[u8] {
        &self.bytes.as_bytes()[offset * self.size..(offset + count) * self.size]
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        debug_assert_eq!(bytes.len(), self.size);
        self.bytes.extend_from_byte_slice(bytes);
    }

    pub fn extend_from_byte_slice(&mut self, bytes: &[u8]) {
        debug_assert_eq!(bytes.len() % self.size, 0);
        self.bytes.extend_from_byte_slice(bytes);
    }
}

/// A nullable wrapper around a plain storage.
///
/// The nested column holds one element per row, with a default-valued
/// placeholder standing in for each null; `presence` holds one byte per row,
/// non-zero when the value is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullableColumn {
    nested: Box<Column>,
    presence: Values,
}

impl NullableColumn {
    pub fn new(nested: Column) -> NullableColumn {
        assert!(!nested.is_nullable());
        NullableColumn {
            nested: Box::new(nested),
            presence: Values::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.presence.count::<u8>()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.presence.is_empty()
    }

    #[inline]
    pub fn nested(&self) -> &Column {
        &self.nested
    }

    pub fn into_nested(self) -> Column {
        *self.nested
    }

    #[inline]
    pub fn is_null_at(&self, index: usize) -> bool {
        self.presence.typed::<u8>()[index] == 0
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.nested.push_bytes(bytes);
        self.presence.push(1u8);
    }

    pub fn push_null(&mut self) {
        self.nested.push_default();
        self.presence.push(0u8);
    }
}

/// A column of values of one element kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    Numeric(NumericColumn),
    String(StringColumn),
    FixedString(FixedStringColumn),
    Nullable(NullableColumn),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(c) => c.len(),
            Column::String(c) => c.len(),
            Column::FixedString(c) => c.len(),
            Column::Nullable(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        matches!(self, Column::Nullable(_))
    }

    /// Returns `true` when the value at `index` is null. Always `false` for
    /// non-nullable storages.
    pub fn is_null_at(&self, index: usize) -> bool {
        match self {
            Column::Nullable(c) => c.is_null_at(index),
            _ => false,
        }
    }

    /// Returns the byte representation of the value at `index`.
    ///
    /// For a nullable column this is the nested placeholder when the row is
    /// null; callers interested in nullability check [`is_null_at`] first.
    ///
    /// [`is_null_at`]: Column::is_null_at
    pub fn bytes_at(&self, index: usize) -> &[u8] {
        match self {
            Column::Numeric(c) => c.element_bytes(index),
            Column::String(c) => c.element_bytes(index),
            Column::FixedString(c) => c.element_bytes(index),
            Column::Nullable(c) => c.nested().bytes_at(index),
        }
    }

    /// Appends a present value given by its byte representation.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        match self {
            Column::Numeric(c) => c.push_bytes(bytes),
            Column::String(c) => c.push_bytes(bytes),
            Column::FixedString(c) => c.push_bytes(bytes),
            Column::Nullable(c) => c.push_bytes(bytes),
        }
    }

    /// Appends a null. The column must be nullable.
    pub fn push_null(&mut self) {
        match self {
            Column::Nullable(c) => c.push_null(),
            _ => panic!("push_null on a non-nullable column"),
        }
    }

    /// Appends the default value of the element kind (zeros, the empty
    /// string, or null for a nullable column).
    pub fn push_default(&mut self) {
        match self {
            Column::Numeric(c) => {
                let zeros = [0u8; 8];
                let size = c.int_type().byte_size();
                c.push_bytes(&zeros[..size]);
            }
            Column::String(c) => c.push_bytes(b""),
            Column::FixedString(c) => {
                let zeros = vec![0u8; c.size()];
                c.push_bytes(&zeros);
            }
            Column::Nullable(c) => c.push_null(),
        }
    }

    /// Creates an empty column of the same layout.
    pub fn new_empty_like(&self) -> Column {
        match self {
            Column::Numeric(c) => Column::Numeric(NumericColumn::new(c.int_type())),
            Column::String(_) => Column::String(StringColumn::new()),
            Column::FixedString(c) => Column::FixedString(FixedStringColumn::new(c.size())),
            Column::Nullable(c) => Column::Nullable(NullableColumn::new(c.nested().new_empty_like())),
        }
    }

    /// Returns the physical layout of the value storage, looking through a
    /// nullable wrapper.
    pub fn value_layout(&self) -> ValueLayout {
        match self {
            Column::Numeric(c) => ValueLayout::Numeric(c.int_type()),
            Column::String(_) => ValueLayout::String,
            Column::FixedString(c) => ValueLayout::FixedString(c.size()),
            Column::Nullable(c) => c.nested().value_layout(),
        }
    }

    /// Appends `count` values of `other` starting at `offset`.
    ///
    /// The storages must share one value layout. A non-nullable receiver
    /// accepts a nullable source only while the copied range holds no nulls;
    /// a nullable receiver accepts plain values from a non-nullable source.
    pub fn insert_range_from(&mut self, other: &Column, offset: usize, count: usize) -> Result<()> {
        lowcard_common::verify_that!(offset + count <= other.len());
        if self.value_layout() != other.value_layout() {
            return Err(Error::logical(
                "insert_range_from between columns of different layouts",
            ));
        }
        for index in offset..offset + count {
            if other.is_null_at(index) {
                if !self.is_nullable() {
                    return Err(Error::logical(
                        "cannot insert a null into a non-nullable column",
                    ));
                }
                self.push_null();
            } else {
                self.push_bytes(other.bytes_at(index));
            }
        }
        Ok(())
    }

    pub fn field_at(&self, index: usize) -> Field {
        match self {
            Column::Numeric(c) => c.field_at(index),
            Column::String(c) => Field::Bytes(c.element_bytes(index).to_vec()),
            Column::FixedString(c) => Field::Bytes(c.element_bytes(index).to_vec()),
            Column::Nullable(c) => {
                if c.is_null_at(index) {
                    Field::Null
                } else {
                    c.nested().field_at(index)
                }
            }
        }
    }

    /// Appends a single value given as a [`Field`], validating that it fits
    /// the column kind.
    pub fn push_field(&mut self, field: &Field) -> Result<()> {
        match (&mut *self, field) {
            (Column::Nullable(c), Field::Null) => {
                c.push_null();
                Ok(())
            }
            (Column::Nullable(c), _) => {
                c.nested.push_field(field)?;
                c.presence.push(1u8);
                Ok(())
            }
            (_, Field::Null) => Err(Error::logical(
                "cannot insert a null into a non-nullable column",
            )),
            (Column::Numeric(c), Field::UInt64(value)) => {
                let int_type = c.int_type();
                if int_type.signed {
                    return Err(Error::logical(format!(
                        "unsigned field inserted into {} column",
                        int_type.name()
                    )));
                }
                let size = int_type.byte_size();
                if size < 8 && *value >= 1u64 << (size * 8) {
                    return Err(Error::logical(format!(
                        "value {value} does not fit {}",
                        int_type.name()
                    )));
                }
                c.push_u64(*value);
                Ok(())
            }
            (Column::Numeric(c), Field::Int64(value)) => {
                let int_type = c.int_type();
                if !int_type.signed {
                    return Err(Error::logical(format!(
                        "signed field inserted into {} column",
                        int_type.name()
                    )));
                }
                let bits = int_type.byte_size() as u32 * 8;
                if bits < 64 {
                    let min = -(1i64 << (bits - 1));
                    let max = (1i64 << (bits - 1)) - 1;
                    if *value < min || *value > max {
                        return Err(Error::logical(format!(
                            "value {value} does not fit {}",
                            int_type.name()
                        )));
                    }
                }
                c.push_bytes(&value.to_le_bytes()[..int_type.byte_size()]);
                Ok(())
            }
            (Column::String(c), Field::Bytes(bytes)) => {
                c.push_bytes(bytes);
                Ok(())
            }
            (Column::FixedString(c), Field::Bytes(bytes)) => {
                if bytes.len() != c.size() {
                    return Err(Error::logical(format!(
                        "value of length {} inserted into FixedString({})",
                        bytes.len(),
                        c.size()
                    )));
                }
                c.push_bytes(bytes);
                Ok(())
            }
            _ => Err(Error::logical("field kind does not match the column kind")),
        }
    }
}
