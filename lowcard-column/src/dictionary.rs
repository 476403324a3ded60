//! The dictionary-encoded column: a shared unique column plus a packed
//! indexes column.

use std::sync::Arc;

use ahash::AHashMap;
use lowcard_common::{Result, error::Error};

use crate::column::{Column, IntegerType, NumericColumn};
use crate::field::Field;
use crate::unique::UniqueColumn;

/// A logical column represented as `(dictionary, indexes)`.
///
/// The dictionary is shared by handle: two columns are dictionary-compatible
/// exactly when their `Arc`s are identical. Mutation goes through
/// `Arc::make_mut`, so a dictionary still referenced elsewhere is snapshotted
/// before the first insert.
#[derive(Debug, Clone)]
pub struct DictionaryColumn {
    dictionary: Arc<UniqueColumn>,
    indexes: NumericColumn,
}

impl DictionaryColumn {
    /// Creates an empty column over `dictionary`, with byte-wide indexes.
    pub fn new(dictionary: Arc<UniqueColumn>) -> DictionaryColumn {
        DictionaryColumn {
            dictionary,
            indexes: NumericColumn::new(IntegerType::UINT8),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    #[inline]
    pub fn dictionary(&self) -> &Arc<UniqueColumn> {
        &self.dictionary
    }

    #[inline]
    pub fn indexes(&self) -> &NumericColumn {
        &self.indexes
    }

    /// Returns `true` when this column's dictionary is the same handle as
    /// `dictionary`.
    #[inline]
    pub fn shares_dictionary_with(&self, dictionary: &Arc<UniqueColumn>) -> bool {
        Arc::ptr_eq(&self.dictionary, dictionary)
    }

    /// Replaces the dictionary of an empty column with a shared handle.
    pub fn set_shared_dictionary(&mut self, dictionary: Arc<UniqueColumn>) -> Result<()> {
        if !self.is_empty() {
            return Err(Error::logical(
                "set_shared_dictionary on a non-empty column",
            ));
        }
        self.dictionary = dictionary;
        Ok(())
    }

    /// Returns the value at `row`, or `None` for null.
    pub fn value_at(&self, row: usize) -> Option<&[u8]> {
        self.dictionary.value_bytes_for_id(self.indexes.get_u64(row))
    }

    pub fn field_at(&self, row: usize) -> Field {
        self.dictionary.field_for_id(self.indexes.get_u64(row))
    }

    /// Appends a single value, inserting it into the dictionary as needed.
    pub fn insert_value(&mut self, value: Option<&[u8]>) -> Result<()> {
        let id = match value {
            None => {
                if !self.dictionary.is_nullable() {
                    return Err(Error::logical(
                        "null value inserted into a non-nullable dictionary column",
                    ));
                }
                0
            }
            Some(bytes) => Arc::make_mut(&mut self.dictionary).insert_bytes(bytes),
        };
        self.push_id(id);
        Ok(())
    }

    /// Appends one row of `column` through the dictionary.
    pub fn insert_from_full(&mut self, column: &Column, row: usize) -> Result<()> {
        if column.is_null_at(row) {
            self.insert_value(None)
        } else {
            self.insert_value(Some(column.bytes_at(row)))
        }
    }

    /// Appends an id that is already valid in this column's dictionary,
    /// widening the indexes storage when needed.
    fn push_id(&mut self, id: u64) {
        let int_type = self.indexes.int_type();
        let size = int_type.byte_size();
        if size < 8 && id >= 1u64 << (size * 8) {
            let wider = IntegerType::smallest_unsigned(id);
            let mut widened = NumericColumn::new(wider);
            for row in 0..self.indexes.len() {
                widened.push_u64(self.indexes.get_u64(row));
            }
            self.indexes = widened;
        }
        self.indexes.push_u64(id);
    }

    /// Appends the ids of an unsigned indexes column, validating them
    /// against the dictionary.
    pub fn append_indexes(&mut self, indexes: &NumericColumn) -> Result<()> {
        if indexes.int_type().signed {
            return Err(Error::logical(format!(
                "indexes column must be unsigned, got {}",
                indexes.int_type().name()
            )));
        }
        let dictionary_size = self.dictionary.size() as u64;
        for row in 0..indexes.len() {
            let id = indexes.get_u64(row);
            if id >= dictionary_size {
                return Err(Error::logical(format!(
                    "index {id} out of dictionary bounds {dictionary_size}"
                )));
            }
            self.push_id(id);
        }
        Ok(())
    }

    /// Returns a compact sub-column over `indexes[offset .. offset + limit)`.
    ///
    /// The result's dictionary holds exactly the referenced values with ids
    /// renumbered densely in first-occurrence order (a nullable dictionary
    /// keeps the reserved null at id 0), and its indexes use the narrowest
    /// width that fits.
    pub fn cut_and_compact(&self, offset: usize, limit: usize) -> Result<DictionaryColumn> {
        lowcard_common::verify_that!(offset + limit <= self.len());
        let mut sub_dictionary = self.dictionary.empty_like();
        let mut remap: AHashMap<u64, u64> = AHashMap::new();
        let mut new_ids = Vec::with_capacity(limit);
        for row in offset..offset + limit {
            let old_id = self.indexes.get_u64(row);
            let new_id = match remap.get(&old_id) {
                Some(&id) => id,
                None => {
                    let id = match self.dictionary.value_bytes_for_id(old_id) {
                        None => 0,
                        Some(bytes) => sub_dictionary.insert_bytes(bytes),
                    };
                    remap.insert(old_id, id);
                    id
                }
            };
            new_ids.push(new_id);
        }
        let max_id = new_ids.iter().copied().max().unwrap_or(0);
        let indexes =
            NumericColumn::packed_from_u64s(IntegerType::smallest_unsigned(max_id), &new_ids);
        Ok(DictionaryColumn {
            dictionary: Arc::new(sub_dictionary),
            indexes,
        })
    }

    /// Appends `count` rows of `other` starting at `offset`.
    ///
    /// When the dictionaries are the same handle the ids are appended
    /// directly; otherwise the values are inserted one by one.
    pub fn insert_range_from(
        &mut self,
        other: &DictionaryColumn,
        offset: usize,
        count: usize,
    ) -> Result<()> {
        lowcard_common::verify_that!(offset + count <= other.len());
        if self.shares_dictionary_with(&other.dictionary) {
            for row in offset..offset + count {
                self.push_id(other.indexes.get_u64(row));
            }
            return Ok(());
        }
        for row in offset..offset + count {
            self.insert_value(other.value_at(row))?;
        }
        Ok(())
    }

    /// Appends `indexes.len()` rows whose values are `keys[indexes[i]]`,
    /// deduplicating through the receiver's dictionary.
    pub fn insert_range_from_dictionary_encoded(
        &mut self,
        keys: &Column,
        indexes: &NumericColumn,
    ) -> Result<()> {
        if indexes.int_type().signed {
            return Err(Error::logical(format!(
                "indexes column must be unsigned, got {}",
                indexes.int_type().name()
            )));
        }
        let num_keys = keys.len() as u64;
        for row in 0..indexes.len() {
            let id = indexes.get_u64(row);
            if id >= num_keys {
                return Err(Error::logical(format!(
                    "index {id} out of keys column bounds {num_keys}"
                )));
            }
            if keys.is_null_at(id as usize) {
                self.insert_value(None)?;
            } else {
                self.insert_value(Some(keys.bytes_at(id as usize)))?;
            }
        }
        Ok(())
    }
}
