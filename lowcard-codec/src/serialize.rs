//! Serialization of a dictionary-encoded column into the keys and indexes
//! streams.
//!
//! A session brackets any number of per-block calls between a prefix (which
//! writes the keys-stream version and creates the state) and a suffix (which
//! flushes the remaining global dictionary). Each block cuts and compacts
//! the requested row range, merges its distinct values into the global
//! dictionary under the configured budget, and writes an index-type header,
//! optional dictionary payloads and the packed indexes.

use std::cell::RefCell;
use std::io::Write;

use lowcard_common::{Result, error::Error};
use lowcard_column::{Column, DictionaryColumn, IntegerType, NumericColumn, UniqueColumn};

use crate::binary::write_u64;
use crate::data_type::DictionaryDataType;
use crate::index_type::{IndexType, KeysVersion};
use crate::stream::{SerializeSettings, Substream};

/// Mutable state of one serialization session.
#[derive(Debug)]
pub struct SerializeState {
    key_version: KeysVersion,
    global_dictionary: UniqueColumn,
}

impl SerializeState {
    /// Current number of entries in the global dictionary, counting the
    /// reserved null entry of a nullable element type.
    pub fn global_dictionary_size(&self) -> usize {
        self.global_dictionary.size()
    }
}

impl DictionaryDataType {
    /// Starts a serialization session: writes the keys-stream version and
    /// returns the fresh state.
    pub fn serialize_prefix(&self, settings: &mut SerializeSettings) -> Result<SerializeState> {
        let streams = settings.streams;
        settings.path.push(Substream::DictionaryKeys);
        let keys_stream = streams.stream(&settings.path);
        settings.path.pop();

        let Some(keys_stream) = keys_stream else {
            return Err(Error::logical(
                "got empty stream for dictionary keys in serialize_prefix",
            ));
        };

        let key_version = KeysVersion::new(KeysVersion::SINGLE_DICTIONARY_WITH_ADDITIONAL_KEYS)?;
        write_u64(&mut *keys_stream.borrow_mut(), key_version.value())?;

        Ok(SerializeState {
            key_version,
            global_dictionary: self.create_unique_column(),
        })
    }

    /// Serializes one block covering `column[offset .. offset + limit)`.
    /// A zero `limit` means the rest of the column.
    pub fn serialize(
        &self,
        column: &DictionaryColumn,
        offset: usize,
        limit: usize,
        settings: &mut SerializeSettings,
        state: &mut SerializeState,
    ) -> Result<()> {
        let streams = settings.streams;
        settings.path.push(Substream::DictionaryKeys);
        let keys_stream = streams.stream(&settings.path);
        settings.path.replace_last(Substream::DictionaryIndexes);
        let indexes_stream = streams.stream(&settings.path);
        settings.path.pop();

        let (keys_stream, indexes_stream) = match (keys_stream, indexes_stream) {
            (None, None) => return Ok(()),
            (None, Some(_)) => {
                return Err(Error::logical("got empty stream for dictionary keys"));
            }
            (Some(_), None) => {
                return Err(Error::logical("got empty stream for dictionary indexes"));
            }
            (Some(keys), Some(indexes)) => (keys, indexes),
        };

        KeysVersion::check(state.key_version.value())?;

        if offset > column.len() {
            return Err(Error::logical(format!(
                "serialization offset {offset} beyond column size {}",
                column.len()
            )));
        }
        let max_limit = column.len() - offset;
        let limit = if limit == 0 { max_limit } else { limit.min(max_limit) };

        let sub_column = column.cut_and_compact(offset, limit)?;
        let mut keys = sub_column.dictionary().nested_column()?;

        let positions = if settings.max_dictionary_size > 0 {
            // Merge this block's keys into the global dictionary and rebase
            // the block's positions onto the merged numbering; whatever did
            // not fit becomes the block's additional keys.
            let inserted = state.global_dictionary.insert_range_with_overflow(
                &keys,
                0,
                keys.len(),
                settings.max_dictionary_size,
            )?;
            let sub_indexes = sub_column.indexes();
            let mut gathered = Vec::with_capacity(sub_indexes.len());
            for row in 0..sub_indexes.len() {
                let position = sub_indexes.get_u64(row) as usize;
                let mapped = inserted.indexes.get(position).ok_or_else(|| {
                    Error::logical(format!(
                        "position {position} beyond the compacted dictionary size {}",
                        inserted.indexes.len()
                    ))
                })?;
                gathered.push(*mapped);
            }
            keys = inserted.overflowed_keys;
            let max_id = gathered.iter().copied().max().unwrap_or(0);
            NumericColumn::packed_from_u64s(IntegerType::smallest_unsigned(max_id), &gathered)
        } else {
            sub_column.indexes().clone()
        };

        let keys = match keys {
            Column::Nullable(nullable) => nullable.into_nested(),
            other => other,
        };

        let need_additional_keys = !keys.is_empty();
        let need_dictionary = settings.max_dictionary_size != 0;
        let need_write_dictionary = settings.use_new_dictionary_on_overflow
            && state.global_dictionary.size() as u64 >= settings.max_dictionary_size;

        let index_type = IndexType::classify(&positions, need_additional_keys, need_dictionary)?;
        index_type.serialize(&mut *indexes_stream.borrow_mut())?;

        if need_write_dictionary {
            self.write_dictionary(&state.global_dictionary, keys_stream)?;
            state.global_dictionary = self.create_unique_column();
        }

        if need_additional_keys {
            let mut out = indexes_stream.borrow_mut();
            write_u64(&mut *out, keys.len() as u64)?;
            self.element_type()
                .remove_nullable()
                .serialize_binary_bulk(&keys, &mut *out, 0, keys.len())?;
        }

        let num_rows = positions.len();
        let mut out = indexes_stream.borrow_mut();
        write_u64(&mut *out, num_rows as u64)?;
        index_type.data_type().serialize_binary_bulk(
            &Column::Numeric(positions),
            &mut *out,
            0,
            num_rows,
        )?;
        Ok(())
    }

    /// Finishes a serialization session, flushing the global dictionary into
    /// the keys stream when one is in use.
    pub fn serialize_suffix(
        &self,
        settings: &mut SerializeSettings,
        state: &mut SerializeState,
    ) -> Result<()> {
        KeysVersion::check(state.key_version.value())?;
        if state.global_dictionary.is_empty() || settings.max_dictionary_size == 0 {
            return Ok(());
        }

        let streams = settings.streams;
        settings.path.push(Substream::DictionaryKeys);
        let keys_stream = streams.stream(&settings.path);
        settings.path.pop();

        let Some(keys_stream) = keys_stream else {
            return Err(Error::logical(
                "got empty stream for dictionary keys in serialize_suffix",
            ));
        };
        self.write_dictionary(&state.global_dictionary, keys_stream)
    }

    /// Writes one global-dictionary payload: the non-null entry count
    /// followed by the bulk form of the non-null entries.
    fn write_dictionary(
        &self,
        dictionary: &UniqueColumn,
        keys_stream: &RefCell<dyn Write + '_>,
    ) -> Result<()> {
        let nested = dictionary.nested_not_nullable_column();
        let mut out = keys_stream.borrow_mut();
        write_u64(&mut *out, nested.len() as u64)?;
        self.element_type()
            .remove_nullable()
            .serialize_binary_bulk(nested, &mut *out, 0, nested.len())
    }
}
