//! The unique column: an append-only set of distinct values with dense,
//! stable ids.

use std::collections::hash_map::Entry;

use ahash::AHashMap;
use lowcard_common::{Result, error::Error};

use crate::column::Column;
use crate::field::Field;

/// Result of [`UniqueColumn::insert_range_with_overflow`].
pub struct IndexesWithOverflow {
    /// One id per input value, in input order. Ids below the dictionary size
    /// refer to the (post-insertion) dictionary; ids at or above it refer to
    /// `overflowed_keys`, numbered contiguously after the dictionary.
    pub indexes: Vec<u64>,
    /// Distinct values that did not fit the dictionary budget, in
    /// first-occurrence order.
    pub overflowed_keys: Column,
}

/// An ordered, append-only set of values with dense zero-based ids.
///
/// The id of an inserted value never changes. For a nullable element type,
/// id 0 is reserved for null and the backing storage holds only the non-null
/// values, at `id - 1`.
#[derive(Debug, Clone)]
pub struct UniqueColumn {
    /// Distinct non-null values in insertion order; always a non-nullable
    /// storage.
    column: Column,
    is_nullable: bool,
    positions: AHashMap<Vec<u8>, u64>,
}

impl UniqueColumn {
    /// Creates an empty unique column over the given (empty, non-nullable)
    /// backing storage.
    pub fn new(storage: Column, is_nullable: bool) -> UniqueColumn {
        assert!(!storage.is_nullable());
        assert!(storage.is_empty());
        UniqueColumn {
            column: storage,
            is_nullable,
            positions: AHashMap::new(),
        }
    }

    /// Builds a unique column from a plain column of already-distinct
    /// non-null values, as read back from a serialized dictionary.
    pub fn from_keys(keys: Column, is_nullable: bool) -> Result<UniqueColumn> {
        if keys.is_nullable() {
            return Err(Error::logical(
                "dictionary keys must be a non-nullable column",
            ));
        }
        let mut positions = AHashMap::with_capacity(keys.len());
        let base = if is_nullable { 1u64 } else { 0u64 };
        for index in 0..keys.len() {
            let id = base + index as u64;
            if positions.insert(keys.bytes_at(index).to_vec(), id).is_some() {
                return Err(Error::logical("duplicate value in dictionary keys"));
            }
        }
        Ok(UniqueColumn {
            column: keys,
            is_nullable,
            positions,
        })
    }

    /// Creates a fresh empty unique column of the same element kind.
    pub fn empty_like(&self) -> UniqueColumn {
        UniqueColumn {
            column: self.column.new_empty_like(),
            is_nullable: self.is_nullable,
            positions: AHashMap::new(),
        }
    }

    /// Total number of ids, counting the reserved null entry of a nullable
    /// column.
    #[inline]
    pub fn size(&self) -> usize {
        self.column.len() + usize::from(self.is_nullable)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    /// The non-null portion of the dictionary: the whole dictionary for a
    /// non-nullable element type, the dictionary minus the reserved null
    /// entry otherwise.
    #[inline]
    pub fn nested_not_nullable_column(&self) -> &Column {
        &self.column
    }

    /// Materializes the dictionary as a full column: the backing values for
    /// a non-nullable element type, or a nullable column whose id-0 entry is
    /// null.
    pub fn nested_column(&self) -> Result<Column> {
        if !self.is_nullable {
            return Ok(self.column.clone());
        }
        let mut nested = Column::Nullable(crate::column::NullableColumn::new(
            self.column.new_empty_like(),
        ));
        nested.push_null();
        nested.insert_range_from(&self.column, 0, self.column.len())?;
        Ok(nested)
    }

    /// Returns the value bytes for `id`, or `None` for the reserved null id
    /// of a nullable column.
    ///
    /// # Panics
    ///
    /// Panics when `id` is out of range.
    pub fn value_bytes_for_id(&self, id: u64) -> Option<&[u8]> {
        if self.is_nullable {
            if id == 0 {
                return None;
            }
            Some(self.column.bytes_at(id as usize - 1))
        } else {
            Some(self.column.bytes_at(id as usize))
        }
    }

    pub fn field_for_id(&self, id: u64) -> Field {
        if self.is_nullable {
            if id == 0 {
                return Field::Null;
            }
            self.column.field_at(id as usize - 1)
        } else {
            self.column.field_at(id as usize)
        }
    }

    /// Looks up the id of a value without inserting it.
    pub fn find(&self, bytes: &[u8]) -> Option<u64> {
        self.positions.get(bytes).copied()
    }

    /// Inserts a non-null value, returning its (possibly preexisting) id.
    pub fn insert_bytes(&mut self, bytes: &[u8]) -> u64 {
        match self.positions.entry(bytes.to_vec()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let id = self.column.len() as u64 + u64::from(self.is_nullable);
                self.column.push_bytes(bytes);
                *entry.insert(id)
            }
        }
    }

    /// Inserts `count` values of `keys` starting at `offset`, holding the
    /// dictionary to at most `max_dictionary_size` entries.
    ///
    /// Values already present map to their global id; new values are
    /// admitted while `size() < max_dictionary_size` and spill into
    /// `overflowed_keys` afterwards. Nulls map to the reserved id 0 and
    /// never overflow. Repeated inputs dedup to a single id in either part.
    pub fn insert_range_with_overflow(
        &mut self,
        keys: &Column,
        offset: usize,
        count: usize,
        max_dictionary_size: u64,
    ) -> Result<IndexesWithOverflow> {
        lowcard_common::verify_that!(offset + count <= keys.len());
        let mut indexes = Vec::with_capacity(count);
        let mut overflowed_keys = self.column.new_empty_like();
        let mut overflow_positions: AHashMap<Vec<u8>, u64> = AHashMap::new();
        for index in offset..offset + count {
            if keys.is_null_at(index) {
                if !self.is_nullable {
                    return Err(Error::logical(
                        "null key inserted into a non-nullable dictionary",
                    ));
                }
                indexes.push(0);
                continue;
            }
            let bytes = keys.bytes_at(index);
            if let Some(id) = self.positions.get(bytes) {
                indexes.push(*id);
            } else if (self.size() as u64) < max_dictionary_size {
                indexes.push(self.insert_bytes(bytes));
            } else {
                let next = overflow_positions.len() as u64;
                let position = match overflow_positions.entry(bytes.to_vec()) {
                    Entry::Occupied(entry) => *entry.get(),
                    Entry::Vacant(entry) => {
                        overflowed_keys.push_bytes(bytes);
                        *entry.insert(next)
                    }
                };
                indexes.push(self.size() as u64 + position);
            }
        }
        Ok(IndexesWithOverflow {
            indexes,
            overflowed_keys,
        })
    }
}
