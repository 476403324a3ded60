//! Column model for dictionary-encoded data: byte-buffer-backed value
//! storages, the append-only unique column and the dictionary-encoded
//! column pair.

pub mod column;
pub mod dictionary;
pub mod field;
pub mod offsets;
pub mod unique;
pub mod values;

pub use column::{
    Column, FixedStringColumn, IntegerType, IntegerWidth, NullableColumn, NumericColumn,
    StringColumn, ValueLayout,
};
pub use dictionary::DictionaryColumn;
pub use field::Field;
pub use unique::{IndexesWithOverflow, UniqueColumn};
pub use values::Values;
