//! Element type descriptors and the dictionary-encoded data type.
//!
//! `DataType` describes the element types the host engine works with;
//! `DictionaryDataType` wraps one of them into a `WithDictionary(T)` type,
//! validating that `T` is dictionary-compatible and dispatching creation of
//! the matching column storages.

use std::io::Write;
use std::sync::Arc;

use lowcard_common::{Result, error::Error};
use lowcard_column::{
    Column, DictionaryColumn, Field, FixedStringColumn, IntegerType, NullableColumn,
    NumericColumn, StringColumn, UniqueColumn, ValueLayout,
};

use crate::stream::{ReadStream, Substream, SubstreamPath};

/// An element type descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Integer(IntegerType),
    /// Days since the epoch, 16 bits.
    Date,
    /// Seconds since the epoch, 32 bits.
    DateTime,
    Float32,
    Float64,
    String,
    FixedString(usize),
    Nullable(Box<DataType>),
}

impl DataType {
    pub fn name(&self) -> String {
        match self {
            DataType::Integer(t) => t.name().to_string(),
            DataType::Date => "Date".to_string(),
            DataType::DateTime => "DateTime".to_string(),
            DataType::Float32 => "Float32".to_string(),
            DataType::Float64 => "Float64".to_string(),
            DataType::String => "String".to_string(),
            DataType::FixedString(size) => format!("FixedString({size})"),
            DataType::Nullable(nested) => format!("Nullable({})", nested.name()),
        }
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        matches!(self, DataType::Nullable(_))
    }

    /// Strips one nullable wrapper, if any.
    pub fn remove_nullable(&self) -> &DataType {
        match self {
            DataType::Nullable(nested) => nested,
            other => other,
        }
    }

    /// Physical layout of this type's value storage; `None` for a nullable
    /// wrapper, which has no flat bulk form of its own.
    pub fn value_layout(&self) -> Option<ValueLayout> {
        match self {
            DataType::Integer(t) => Some(ValueLayout::Numeric(*t)),
            DataType::Date => Some(ValueLayout::Numeric(IntegerType::UINT16)),
            DataType::DateTime => Some(ValueLayout::Numeric(IntegerType::UINT32)),
            DataType::Float32 => Some(ValueLayout::Numeric(IntegerType::UINT32)),
            DataType::Float64 => Some(ValueLayout::Numeric(IntegerType::UINT64)),
            DataType::String => Some(ValueLayout::String),
            DataType::FixedString(size) => Some(ValueLayout::FixedString(*size)),
            DataType::Nullable(_) => None,
        }
    }

    /// Creates an empty column with this type's storage.
    pub fn create_column(&self) -> Column {
        match self {
            DataType::Integer(t) => Column::Numeric(NumericColumn::new(*t)),
            DataType::Date => Column::Numeric(NumericColumn::new(IntegerType::UINT16)),
            DataType::DateTime => Column::Numeric(NumericColumn::new(IntegerType::UINT32)),
            DataType::Float32 => Column::Numeric(NumericColumn::new(IntegerType::UINT32)),
            DataType::Float64 => Column::Numeric(NumericColumn::new(IntegerType::UINT64)),
            DataType::String => Column::String(StringColumn::new()),
            DataType::FixedString(size) => Column::FixedString(FixedStringColumn::new(*size)),
            DataType::Nullable(nested) => {
                Column::Nullable(NullableColumn::new(nested.create_column()))
            }
        }
    }

    /// Visits the substreams this element type serializes into. Scalar
    /// element types occupy exactly the stream at `path`.
    pub fn enumerate_streams(
        &self,
        callback: &mut dyn FnMut(&SubstreamPath),
        path: &mut SubstreamPath,
    ) {
        callback(path);
    }
}

/// The `WithDictionary(T)` data type: values of `T` stored as a dictionary
/// plus per-row indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryDataType {
    element: DataType,
}

impl DictionaryDataType {
    /// Wraps an element type, validating that it is dictionary-compatible:
    /// after stripping one nullable wrapper, the inner type must be an
    /// integer, date, datetime, string or fixed string.
    pub fn new(element: DataType) -> Result<DictionaryDataType> {
        match element.remove_nullable() {
            DataType::Integer(_)
            | DataType::Date
            | DataType::DateTime
            | DataType::String
            | DataType::FixedString(_) => Ok(DictionaryDataType { element }),
            DataType::Float32 | DataType::Float64 | DataType::Nullable(_) => {
                Err(Error::illegal_type(element.name()))
            }
        }
    }

    /// Type-registry entry point: `WithDictionary(T)` takes exactly one
    /// inner type argument.
    pub fn from_type_arguments(arguments: Vec<DataType>) -> Result<DictionaryDataType> {
        let count = arguments.len();
        let Ok([element]) = <[DataType; 1]>::try_from(arguments) else {
            return Err(Error::arguments_mismatch(1, count));
        };
        Self::new(element)
    }

    #[inline]
    pub fn element_type(&self) -> &DataType {
        &self.element
    }

    pub fn name(&self) -> String {
        format!("WithDictionary({})", self.element.name())
    }

    /// Creates an empty unique column for the element type, with the
    /// storage dispatched by kind (dates as u16, datetimes as u32, integers
    /// at their own width) and nullability carried separately.
    pub fn create_unique_column(&self) -> UniqueColumn {
        let storage = self.element.remove_nullable().create_column();
        UniqueColumn::new(storage, self.element.is_nullable())
    }

    /// Creates an empty dictionary-encoded column with byte-wide indexes.
    pub fn create_column(&self) -> DictionaryColumn {
        DictionaryColumn::new(Arc::new(self.create_unique_column()))
    }

    /// Visits the two substreams of this type: the keys sub-path through
    /// the element type (letting element codecs advertise their own
    /// substreams), then the indexes sub-path as a leaf.
    pub fn enumerate_streams(
        &self,
        callback: &mut dyn FnMut(&SubstreamPath),
        path: &mut SubstreamPath,
    ) {
        path.push(Substream::DictionaryKeys);
        self.element.enumerate_streams(callback, path);
        path.replace_last(Substream::DictionaryIndexes);
        callback(path);
        path.pop();
    }

    /// Writes one value in the element type's single-value form.
    pub fn serialize_binary(&self, field: &Field, writer: &mut dyn Write) -> Result<()> {
        self.element.serialize_binary(field, writer)
    }

    /// Reads one value in the element type's single-value form.
    pub fn deserialize_binary(&self, reader: &mut dyn ReadStream) -> Result<Field> {
        self.element.deserialize_binary(reader)
    }

    /// Writes row `row` of a dictionary-encoded column by fetching its
    /// dictionary entry through the element codec.
    pub fn serialize_binary_at(
        &self,
        column: &DictionaryColumn,
        row: usize,
        writer: &mut dyn Write,
    ) -> Result<()> {
        self.element.serialize_binary(&column.field_at(row), writer)
    }

    /// Reads one value and appends it to `column` through its dictionary.
    pub fn deserialize_binary_into(
        &self,
        column: &mut DictionaryColumn,
        reader: &mut dyn ReadStream,
    ) -> Result<()> {
        let field = self.element.deserialize_binary(reader)?;
        let mut scratch = self.element.create_column();
        scratch.push_field(&field)?;
        column.insert_from_full(&scratch, 0)
    }
}
