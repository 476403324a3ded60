//! A single value extracted from, or inserted into, a column.

/// One column element in its owned scalar form.
///
/// Integer-backed kinds (including dates and times) use the widest integer of
/// the matching signedness; string kinds carry their bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Null,
    UInt64(u64),
    Int64(i64),
    Bytes(Vec<u8>),
}

impl Field {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }
}
