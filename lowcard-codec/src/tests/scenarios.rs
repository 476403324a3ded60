//! Wire-level scenarios: exact stream bytes, overflow handling, partial
//! reads and malformed input.

use std::cell::RefCell;

use lowcard_common::error::ErrorKind;
use lowcard_column::IntegerType;

use super::harness::*;
use crate::data_type::{DataType, DictionaryDataType};
use crate::stream::{DeserializeSettings, SerializeSettings};

fn string_type() -> DictionaryDataType {
    DictionaryDataType::new(DataType::String).unwrap()
}

fn u32_type() -> DictionaryDataType {
    DictionaryDataType::new(DataType::Integer(IntegerType::UINT32)).unwrap()
}

fn u32_values(values: &[u32]) -> Vec<Option<Vec<u8>>> {
    values
        .iter()
        .map(|v| Some(v.to_le_bytes().to_vec()))
        .collect()
}

fn string_values(values: &[&str]) -> Vec<Option<Vec<u8>>> {
    values
        .iter()
        .map(|v| Some(v.as_bytes().to_vec()))
        .collect()
}

#[test]
fn strings_within_budget_exact_bytes() {
    let dtype = string_type();
    let column = column_from_values(&dtype, &string_values(&["a", "b", "a", "c", "b", "a"]));
    let (keys, indexes) = encode_blocks(&dtype, &column, &[(0, 0)], 16, false);

    let mut expected_keys = Vec::new();
    expected_keys.extend_from_slice(&1u64.to_le_bytes());
    expected_keys.extend_from_slice(&3u64.to_le_bytes());
    expected_keys.extend_from_slice(&[1, b'a', 1, b'b', 1, b'c']);
    assert_eq!(keys, expected_keys);

    let mut expected_indexes = Vec::new();
    expected_indexes.extend_from_slice(&0x100u64.to_le_bytes());
    expected_indexes.extend_from_slice(&6u64.to_le_bytes());
    expected_indexes.extend_from_slice(&[0, 1, 0, 2, 1, 0]);
    assert_eq!(indexes, expected_indexes);

    let decoded = decode_with_limits(&dtype, keys, indexes, &[6]);
    assert_columns_equal(&column, &decoded);
}

#[test]
fn overflow_into_additional_keys_exact_bytes() {
    let dtype = u32_type();
    let column = column_from_values(&dtype, &u32_values(&[1, 2, 3, 4, 5]));
    let (keys, indexes) = encode_blocks(&dtype, &column, &[(0, 0)], 2, false);

    let mut expected_keys = Vec::new();
    expected_keys.extend_from_slice(&1u64.to_le_bytes());
    expected_keys.extend_from_slice(&2u64.to_le_bytes());
    expected_keys.extend_from_slice(&1u32.to_le_bytes());
    expected_keys.extend_from_slice(&2u32.to_le_bytes());
    assert_eq!(keys, expected_keys);

    let mut expected_indexes = Vec::new();
    expected_indexes.extend_from_slice(&0x300u64.to_le_bytes());
    expected_indexes.extend_from_slice(&3u64.to_le_bytes());
    expected_indexes.extend_from_slice(&3u32.to_le_bytes());
    expected_indexes.extend_from_slice(&4u32.to_le_bytes());
    expected_indexes.extend_from_slice(&5u32.to_le_bytes());
    expected_indexes.extend_from_slice(&5u64.to_le_bytes());
    expected_indexes.extend_from_slice(&[0, 1, 2, 3, 4]);
    assert_eq!(indexes, expected_indexes);

    let decoded = decode_with_limits(&dtype, keys, indexes, &[5]);
    assert_columns_equal(&column, &decoded);
}

#[test]
fn new_dictionary_on_overflow_flushes_mid_stream() {
    let dtype = u32_type();
    let column = column_from_values(&dtype, &u32_values(&[1, 2, 3, 4, 5]));
    let (keys, indexes) = encode_blocks(&dtype, &column, &[(0, 0)], 2, true);

    // The dictionary payload moves from the suffix into the block itself;
    // the indexes stream is unchanged.
    let mut expected_keys = Vec::new();
    expected_keys.extend_from_slice(&1u64.to_le_bytes());
    expected_keys.extend_from_slice(&2u64.to_le_bytes());
    expected_keys.extend_from_slice(&1u32.to_le_bytes());
    expected_keys.extend_from_slice(&2u32.to_le_bytes());
    assert_eq!(keys, expected_keys);

    let (_, indexes_without_flush) = encode_blocks(&dtype, &column, &[(0, 0)], 2, false);
    assert_eq!(indexes, indexes_without_flush);

    let decoded = decode_with_limits(&dtype, keys, indexes, &[5]);
    assert_columns_equal(&column, &decoded);
}

#[test]
fn nullable_strings_round_trip() {
    let dtype = DictionaryDataType::new(DataType::Nullable(Box::new(DataType::String))).unwrap();
    let values = vec![
        Some(b"x".to_vec()),
        None,
        Some(b"x".to_vec()),
        Some(b"y".to_vec()),
        None,
    ];
    let column = column_from_values(&dtype, &values);
    let decoded = round_trip(&dtype, &column, 16, false);
    assert_columns_equal(&column, &decoded);
    assert!(decoded.value_at(1).is_none());
    assert_eq!(decoded.value_at(3), Some(&b"y"[..]));
}

#[test]
fn nullable_keys_stay_out_of_the_wire_dictionary() {
    let dtype = DictionaryDataType::new(DataType::Nullable(Box::new(DataType::String))).unwrap();
    let column = column_from_values(
        &dtype,
        &[None, Some(b"x".to_vec()), Some(b"y".to_vec()), None],
    );
    let (keys, _) = encode_blocks(&dtype, &column, &[(0, 0)], 16, false);

    // Version, then two non-null keys; the reserved null id is implicit.
    let mut expected_keys = Vec::new();
    expected_keys.extend_from_slice(&1u64.to_le_bytes());
    expected_keys.extend_from_slice(&2u64.to_le_bytes());
    expected_keys.extend_from_slice(&[1, b'x', 1, b'y']);
    assert_eq!(keys, expected_keys);
}

#[test]
fn multi_block_append_recovers_concatenation() {
    let dtype = string_type();
    let column = column_from_values(
        &dtype,
        &string_values(&["a", "b", "c", "a", "d", "b", "e", "a"]),
    );
    let (keys, indexes) = encode_blocks(&dtype, &column, &[(0, 3), (3, 0)], 16, false);
    let decoded = decode_with_limits(&dtype, keys, indexes, &[column.len()]);
    assert_columns_equal(&column, &decoded);
}

#[test]
fn partial_reads_split_anywhere() {
    let dtype = string_type();
    let values = string_values(&["a", "b", "a", "c", "b", "a"]);
    let column = column_from_values(&dtype, &values);
    let (keys, indexes) = encode_blocks(&dtype, &column, &[(0, 0)], 16, false);
    for split in 0..=column.len() {
        let decoded = decode_with_limits(
            &dtype,
            keys.clone(),
            indexes.clone(),
            &[split, column.len() - split],
        );
        assert_columns_equal(&column, &decoded);
    }
}

#[test]
fn decode_limit_may_exceed_the_stream() {
    let dtype = u32_type();
    let column = column_from_values(&dtype, &u32_values(&[9, 9, 8]));
    let (keys, indexes) = encode_blocks(&dtype, &column, &[(0, 0)], 4, false);
    let decoded = decode_with_limits(&dtype, keys, indexes, &[100]);
    assert_columns_equal(&column, &decoded);
}

#[test]
fn malformed_header_is_a_logical_error() {
    let dtype = u32_type();
    let keys = 1u64.to_le_bytes().to_vec();
    let indexes = 0x400u64.to_le_bytes().to_vec();

    let source = MemoryReadSet::new(keys, indexes);
    let mut settings = DeserializeSettings::new(&source);
    let mut state = dtype.deserialize_prefix(&mut settings).unwrap();
    let mut column = dtype.create_column();
    let err = dtype
        .deserialize(&mut column, 10, &mut settings, &mut state)
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::LogicalError { .. }));
}

#[test]
fn unknown_version_is_a_logical_error() {
    let dtype = u32_type();
    let keys = 2u64.to_le_bytes().to_vec();
    let source = MemoryReadSet::new(keys, Vec::new());
    let mut settings = DeserializeSettings::new(&source);
    let err = dtype.deserialize_prefix(&mut settings).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::LogicalError { .. }));
}

#[test]
fn serialize_requires_both_streams_or_neither() {
    let dtype = string_type();
    let column = column_from_values(&dtype, &string_values(&["a"]));

    // Neither stream materialized: the block is silently skipped.
    let both_absent = PartialWriteSet {
        keys: None,
        indexes: None,
    };
    let mut settings = SerializeSettings::new(&both_absent);
    let mut state = make_serialize_state(&dtype);
    dtype
        .serialize(&column, 0, 0, &mut settings, &mut state)
        .unwrap();

    // Only one stream materialized: logical error.
    let keys_only = PartialWriteSet {
        keys: Some(RefCell::new(Vec::new())),
        indexes: None,
    };
    let mut settings = SerializeSettings::new(&keys_only);
    let err = dtype
        .serialize(&column, 0, 0, &mut settings, &mut state)
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::LogicalError { .. }));
}

/// Builds a serialize state through a throwaway prefix call.
fn make_serialize_state(dtype: &DictionaryDataType) -> crate::serialize::SerializeState {
    let sink = MemoryWriteSet::new();
    let mut settings = SerializeSettings::new(&sink);
    dtype.serialize_prefix(&mut settings).unwrap()
}

#[test]
fn prefix_requires_the_keys_stream() {
    let dtype = string_type();
    let indexes_only = PartialWriteSet {
        keys: None,
        indexes: Some(RefCell::new(Vec::new())),
    };
    let mut settings = SerializeSettings::new(&indexes_only);
    let err = dtype.serialize_prefix(&mut settings).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::LogicalError { .. }));
}

#[test]
fn budget_discipline_at_block_boundaries() {
    let dtype = u32_type();
    let values: Vec<u32> = (0..40).collect();
    let column = column_from_values(&dtype, &u32_values(&values));
    let blocks: Vec<(usize, usize)> = (0..4).map(|i| (i * 10, 10)).collect();

    for use_new_dictionary_on_overflow in [false, true] {
        let sink = MemoryWriteSet::new();
        let mut settings = SerializeSettings::new(&sink);
        settings.max_dictionary_size = 4;
        settings.use_new_dictionary_on_overflow = use_new_dictionary_on_overflow;
        let mut state = dtype.serialize_prefix(&mut settings).unwrap();
        let mut previous_size = 0;
        for &(offset, limit) in &blocks {
            dtype
                .serialize(&column, offset, limit, &mut settings, &mut state)
                .unwrap();
            assert!(state.global_dictionary_size() <= 4);
            if !use_new_dictionary_on_overflow {
                assert!(state.global_dictionary_size() >= previous_size);
                previous_size = state.global_dictionary_size();
            }
        }
        dtype.serialize_suffix(&mut settings, &mut state).unwrap();
    }
}

#[test]
fn no_dictionary_mode_carries_keys_per_block() {
    let dtype = string_type();
    let column = column_from_values(&dtype, &string_values(&["a", "b", "a", "b", "c"]));
    let (keys, indexes) = encode_blocks(&dtype, &column, &[(0, 3), (3, 0)], 0, false);

    // Only the version ever reaches the keys stream.
    assert_eq!(keys, 1u64.to_le_bytes().to_vec());

    let decoded = decode_with_limits(&dtype, keys, indexes, &[column.len()]);
    assert_columns_equal(&column, &decoded);
}

#[test]
fn shared_dictionary_is_installed_by_identity() {
    let dtype = string_type();
    let column = column_from_values(&dtype, &string_values(&["a", "b", "a"]));
    let (keys, indexes) = encode_blocks(&dtype, &column, &[(0, 0)], 16, false);

    let source = MemoryReadSet::new(keys, indexes);
    let mut settings = DeserializeSettings::new(&source);
    let mut state = dtype.deserialize_prefix(&mut settings).unwrap();
    let mut decoded = dtype.create_column();
    dtype
        .deserialize(&mut decoded, 2, &mut settings, &mut state)
        .unwrap();
    let after_first = decoded.dictionary().clone();
    dtype
        .deserialize(&mut decoded, 1, &mut settings, &mut state)
        .unwrap();
    // Appending rows of the same block must not have replaced the handle.
    assert!(decoded.shares_dictionary_with(&after_first));
    assert_columns_equal(&column, &decoded);
}
