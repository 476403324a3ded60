//! In-memory stream sets and session drivers shared by the codec tests.

use std::cell::RefCell;
use std::io::{Cursor, Write};

use lowcard_column::DictionaryColumn;

use crate::data_type::DictionaryDataType;
use crate::stream::{
    DeserializeSettings, ReadStream, ReadStreamSource, SerializeSettings, Substream,
    SubstreamPath, WriteStreamSource,
};

/// The two output streams of one serialized column, held in memory.
#[derive(Default)]
pub struct MemoryWriteSet {
    keys: RefCell<Vec<u8>>,
    indexes: RefCell<Vec<u8>>,
}

impl MemoryWriteSet {
    pub fn new() -> MemoryWriteSet {
        MemoryWriteSet::default()
    }

    pub fn into_streams(self) -> (Vec<u8>, Vec<u8>) {
        (self.keys.into_inner(), self.indexes.into_inner())
    }
}

impl WriteStreamSource for MemoryWriteSet {
    fn stream<'a>(&'a self, path: &SubstreamPath) -> Option<&'a RefCell<dyn Write + 'a>> {
        match path.as_slice().last()? {
            Substream::DictionaryKeys => Some(&self.keys as &RefCell<dyn Write>),
            Substream::DictionaryIndexes => Some(&self.indexes as &RefCell<dyn Write>),
        }
    }
}

/// A write set that materializes only one of the two substreams.
pub struct PartialWriteSet {
    pub keys: Option<RefCell<Vec<u8>>>,
    pub indexes: Option<RefCell<Vec<u8>>>,
}

impl WriteStreamSource for PartialWriteSet {
    fn stream<'a>(&'a self, path: &SubstreamPath) -> Option<&'a RefCell<dyn Write + 'a>> {
        match path.as_slice().last()? {
            Substream::DictionaryKeys => self.keys.as_ref().map(|s| s as &RefCell<dyn Write>),
            Substream::DictionaryIndexes => {
                self.indexes.as_ref().map(|s| s as &RefCell<dyn Write>)
            }
        }
    }
}

/// The two input streams of one serialized column.
pub struct MemoryReadSet {
    keys: RefCell<Cursor<Vec<u8>>>,
    indexes: RefCell<Cursor<Vec<u8>>>,
}

impl MemoryReadSet {
    pub fn new(keys: Vec<u8>, indexes: Vec<u8>) -> MemoryReadSet {
        MemoryReadSet {
            keys: RefCell::new(Cursor::new(keys)),
            indexes: RefCell::new(Cursor::new(indexes)),
        }
    }
}

impl ReadStreamSource for MemoryReadSet {
    fn stream<'a>(&'a self, path: &SubstreamPath) -> Option<&'a RefCell<dyn ReadStream + 'a>> {
        match path.as_slice().last()? {
            Substream::DictionaryKeys => Some(&self.keys as &RefCell<dyn ReadStream>),
            Substream::DictionaryIndexes => Some(&self.indexes as &RefCell<dyn ReadStream>),
        }
    }
}

/// Runs a whole serialization session over the given block ranges and
/// returns the raw keys and indexes streams.
pub fn encode_blocks(
    dtype: &DictionaryDataType,
    column: &DictionaryColumn,
    blocks: &[(usize, usize)],
    max_dictionary_size: u64,
    use_new_dictionary_on_overflow: bool,
) -> (Vec<u8>, Vec<u8>) {
    let sink = MemoryWriteSet::new();
    let mut settings = SerializeSettings::new(&sink);
    settings.max_dictionary_size = max_dictionary_size;
    settings.use_new_dictionary_on_overflow = use_new_dictionary_on_overflow;

    let mut state = dtype.serialize_prefix(&mut settings).unwrap();
    for &(offset, limit) in blocks {
        dtype
            .serialize(column, offset, limit, &mut settings, &mut state)
            .unwrap();
    }
    dtype.serialize_suffix(&mut settings, &mut state).unwrap();
    drop(settings);
    sink.into_streams()
}

/// Runs a whole deserialization session, consuming rows with the given
/// per-call limits.
pub fn decode_with_limits(
    dtype: &DictionaryDataType,
    keys: Vec<u8>,
    indexes: Vec<u8>,
    limits: &[usize],
) -> DictionaryColumn {
    let source = MemoryReadSet::new(keys, indexes);
    let mut settings = DeserializeSettings::new(&source);
    let mut state = dtype.deserialize_prefix(&mut settings).unwrap();
    let mut column = dtype.create_column();
    for &limit in limits {
        dtype
            .deserialize(&mut column, limit, &mut settings, &mut state)
            .unwrap();
    }
    column
}

/// Encodes the whole column as one block and decodes it back in one call.
pub fn round_trip(
    dtype: &DictionaryDataType,
    column: &DictionaryColumn,
    max_dictionary_size: u64,
    use_new_dictionary_on_overflow: bool,
) -> DictionaryColumn {
    let (keys, indexes) = encode_blocks(
        dtype,
        column,
        &[(0, 0)],
        max_dictionary_size,
        use_new_dictionary_on_overflow,
    );
    decode_with_limits(dtype, keys, indexes, &[column.len()])
}

/// Element-wise comparison of a decoded column against the expected one.
pub fn assert_columns_equal(expected: &DictionaryColumn, actual: &DictionaryColumn) {
    assert_eq!(expected.len(), actual.len(), "row counts differ");
    for row in 0..expected.len() {
        assert_eq!(
            expected.value_at(row),
            actual.value_at(row),
            "values differ at row {row}"
        );
        assert_eq!(
            expected.field_at(row),
            actual.field_at(row),
            "fields differ at row {row}"
        );
    }
}

/// Builds a dictionary-encoded column of the given type from optional byte
/// values.
pub fn column_from_values(
    dtype: &DictionaryDataType,
    values: &[Option<Vec<u8>>],
) -> DictionaryColumn {
    let mut column = dtype.create_column();
    for value in values {
        column.insert_value(value.as_deref()).unwrap();
    }
    column
}
