//! Deserialization of a dictionary-encoded column from the keys and indexes
//! streams.
//!
//! The decoder state survives across calls, so a caller may consume a block
//! in several `deserialize` invocations; an unfinished block is carried in
//! `num_pending_rows`. Blocks are self-delimiting through their row count,
//! and the session ends when the indexes stream is exhausted between blocks.

use std::cell::RefCell;
use std::sync::Arc;

use ahash::AHashMap;
use lowcard_common::{Result, error::Error};
use lowcard_column::{Column, DictionaryColumn, NullableColumn, NumericColumn, UniqueColumn};

use crate::binary::read_u64;
use crate::data_type::DictionaryDataType;
use crate::index_type::{IndexType, KeysVersion};
use crate::stream::{DeserializeSettings, ReadStream, Substream};

/// Mutable state of one deserialization session.
#[derive(Debug)]
pub struct DeserializeState {
    key_version: KeysVersion,
    global_dictionary: Option<Arc<UniqueColumn>>,
    index_type: Option<IndexType>,
    additional_keys: Option<Column>,
    num_pending_rows: u64,
}

impl DeserializeState {
    /// Number of rows of the current block not yet handed to the caller.
    pub fn num_pending_rows(&self) -> u64 {
        self.num_pending_rows
    }
}

impl DictionaryDataType {
    /// Starts a deserialization session: reads and validates the keys-stream
    /// version and returns the fresh state.
    pub fn deserialize_prefix(
        &self,
        settings: &mut DeserializeSettings,
    ) -> Result<DeserializeState> {
        let streams = settings.streams;
        settings.path.push(Substream::DictionaryKeys);
        let keys_stream = streams.stream(&settings.path);
        settings.path.pop();

        let Some(keys_stream) = keys_stream else {
            return Err(Error::logical(
                "got empty stream for dictionary keys in deserialize_prefix",
            ));
        };

        let version = read_u64(&mut *keys_stream.borrow_mut())?;
        Ok(DeserializeState {
            key_version: KeysVersion::new(version)?,
            global_dictionary: None,
            index_type: None,
            additional_keys: None,
            num_pending_rows: 0,
        })
    }

    /// Appends up to `limit` rows to `column`, reading as many blocks as
    /// needed. Stops early when the indexes stream ends between blocks.
    pub fn deserialize(
        &self,
        column: &mut DictionaryColumn,
        limit: usize,
        settings: &mut DeserializeSettings,
        state: &mut DeserializeState,
    ) -> Result<()> {
        KeysVersion::check(state.key_version.value())?;

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

        let mut limit = limit;
        while limit > 0 {
            if state.num_pending_rows == 0 {
                let index_type = {
                    let mut stream = indexes_stream.borrow_mut();
                    if stream.is_eof()? {
                        break;
                    }
                    IndexType::deserialize(&mut *stream)?
                };
                state.index_type = Some(index_type);

                if index_type.need_global_dictionary && state.global_dictionary.is_none() {
                    let dictionary =
                        self.read_dictionary(keys_stream, settings.avg_value_size_hint)?;
                    state.global_dictionary = Some(Arc::new(dictionary));
                }

                if index_type.has_additional_keys {
                    state.additional_keys = Some(
                        self.read_additional_keys(indexes_stream, settings.avg_value_size_hint)?,
                    );
                } else {
                    state.additional_keys = None;
                }

                state.num_pending_rows = read_u64(&mut *indexes_stream.borrow_mut())?;
            }

            let num_rows_to_read = (limit as u64).min(state.num_pending_rows) as usize;
            self.read_indexes(column, num_rows_to_read, indexes_stream, state)?;
            limit -= num_rows_to_read;
            state.num_pending_rows -= num_rows_to_read as u64;
        }
        Ok(())
    }

    /// Reads one global-dictionary payload from the keys stream and builds
    /// the unique column for it.
    fn read_dictionary(
        &self,
        keys_stream: &RefCell<dyn ReadStream + '_>,
        avg_value_size_hint: usize,
    ) -> Result<UniqueColumn> {
        let mut stream = keys_stream.borrow_mut();
        let num_keys = read_u64(&mut *stream)? as usize;
        let keys_type = self.element_type().remove_nullable();
        let mut keys = keys_type.create_column();
        keys_type.deserialize_binary_bulk(&mut keys, &mut *stream, num_keys, avg_value_size_hint)?;
        UniqueColumn::from_keys(keys, self.element_type().is_nullable())
    }

    /// Reads one additional-keys payload from the indexes stream.
    fn read_additional_keys(
        &self,
        indexes_stream: &RefCell<dyn ReadStream + '_>,
        avg_value_size_hint: usize,
    ) -> Result<Column> {
        let mut stream = indexes_stream.borrow_mut();
        let num_keys = read_u64(&mut *stream)? as usize;
        let keys_type = self.element_type().remove_nullable();
        let mut keys = keys_type.create_column();
        keys_type.deserialize_binary_bulk(&mut keys, &mut *stream, num_keys, avg_value_size_hint)?;
        Ok(keys)
    }

    /// Reads `num_rows` packed indexes of the current block and appends the
    /// decoded rows to `column`.
    fn read_indexes(
        &self,
        column: &mut DictionaryColumn,
        num_rows: usize,
        indexes_stream: &RefCell<dyn ReadStream + '_>,
        state: &mut DeserializeState,
    ) -> Result<()> {
        let Some(index_type) = state.index_type else {
            return Err(Error::logical("reading indexes before any block header"));
        };
        let indexes_type = index_type.data_type();
        let mut indexes_column = indexes_type.create_column();
        indexes_type.deserialize_binary_bulk(
            &mut indexes_column,
            &mut *indexes_stream.borrow_mut(),
            num_rows,
            0,
        )?;
        let Column::Numeric(mut indexes) = indexes_column else {
            return Err(Error::logical("indexes column must be numeric"));
        };

        let column_is_empty = column.is_empty();
        let column_with_global_dictionary = state
            .global_dictionary
            .as_ref()
            .is_some_and(|global| column.shares_dictionary_with(global));

        if !index_type.has_additional_keys && (column_is_empty || column_with_global_dictionary) {
            // The whole block lives in the global dictionary: share it and
            // append the ids as they are.
            let Some(global) = &state.global_dictionary else {
                return Err(Error::logical(
                    "deserializing a dictionary block without a global dictionary",
                ));
            };
            if column_is_empty {
                column.set_shared_dictionary(global.clone())?;
            }
            column.append_indexes(&indexes)
        } else if !index_type.need_global_dictionary {
            let Some(additional_keys) = &state.additional_keys else {
                return Err(Error::logical(
                    "deserializing a dictionary block without additional keys",
                ));
            };
            column.insert_range_from_dictionary_encoded(additional_keys, &indexes)
        } else {
            // Mixed block: ids below the global dictionary size refer to the
            // global dictionary, the rest to the additional keys. Renumber
            // the referenced global subset densely, build the combined keys
            // column and decode against it.
            let Some(global) = &state.global_dictionary else {
                return Err(Error::logical(
                    "deserializing a dictionary block without a global dictionary",
                ));
            };
            let index_map = map_index_with_overflow(&mut indexes, global.size() as u64);
            let mut keys = if global.is_nullable() {
                Column::Nullable(NullableColumn::new(
                    global.nested_not_nullable_column().new_empty_like(),
                ))
            } else {
                global.nested_not_nullable_column().new_empty_like()
            };
            for &old_id in &index_map {
                match global.value_bytes_for_id(old_id) {
                    None => keys.push_null(),
                    Some(bytes) => keys.push_bytes(bytes),
                }
            }
            if let Some(additional_keys) = &state.additional_keys {
                keys.insert_range_from(additional_keys, 0, additional_keys.len())?;
            }
            column.insert_range_from_dictionary_encoded(&keys, &indexes)
        }
    }
}

/// Renumbers ids below `max_size` densely in first-occurrence order and
/// shifts ids at or above `max_size` down next to them, in place.
///
/// For an input id `v`: when `v < max_size`, the new id is the rank of `v`
/// among the distinct below-`max_size` ids in first-occurrence order;
/// otherwise it is `v - max_size + n`, where `n` is the number of those
/// distinct ids. Returns the old below-`max_size` ids in new-id order.
fn map_index_with_overflow(indexes: &mut NumericColumn, max_size: u64) -> Vec<u64> {
    let mut ranks: AHashMap<u64, u64> = AHashMap::new();
    let mut index_map = Vec::new();
    for row in 0..indexes.len() {
        let id = indexes.get_u64(row);
        if id < max_size && !ranks.contains_key(&id) {
            ranks.insert(id, index_map.len() as u64);
            index_map.push(id);
        }
    }
    let rank_count = index_map.len() as u64;
    for row in 0..indexes.len() {
        let id = indexes.get_u64(row);
        let new_id = match ranks.get(&id) {
            Some(&rank) if id < max_size => rank,
            _ => id - max_size + rank_count,
        };
        indexes.set_u64(row, new_id);
    }
    index_map
}
