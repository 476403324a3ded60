//! Per-block index header and the keys-stream version word.

use std::io::Write;

use lowcard_common::{Result, error::Error};
use lowcard_column::{IntegerType, IntegerWidth, NumericColumn};

use crate::binary::{read_u64, write_u64};
use crate::data_type::DataType;
use crate::stream::ReadStream;

/// Version tag at the head of the keys stream.
///
/// The only version of this format writes one shared dictionary per session,
/// with per-block additional keys spilled into the indexes stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeysVersion(u64);

impl KeysVersion {
    pub const SINGLE_DICTIONARY_WITH_ADDITIONAL_KEYS: u64 = 1;

    pub fn new(version: u64) -> Result<KeysVersion> {
        Self::check(version)?;
        Ok(KeysVersion(version))
    }

    pub fn check(version: u64) -> Result<()> {
        if version != Self::SINGLE_DICTIONARY_WITH_ADDITIONAL_KEYS {
            return Err(Error::logical(format!(
                "invalid version {version} for dictionary key column"
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

const NEED_GLOBAL_DICTIONARY_BIT: u64 = 1 << 8;
const HAS_ADDITIONAL_KEYS_BIT: u64 = 1 << 9;
const FLAG_BITS: u64 = NEED_GLOBAL_DICTIONARY_BIT | HAS_ADDITIONAL_KEYS_BIT;

/// Decoded form of the per-block header on the indexes stream.
///
/// One little-endian `u64`: the low byte is the index width code, bit 8 says
/// whether the block's indexes refer to the global dictionary, bit 9 whether
/// the block carries additional keys. All other bits must be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexType {
    pub width: IntegerWidth,
    pub has_additional_keys: bool,
    pub need_global_dictionary: bool,
}

impl IndexType {
    /// Builds a header for an indexes column, taking the width from the
    /// column itself. The column must be unsigned.
    pub fn classify(
        indexes: &NumericColumn,
        has_additional_keys: bool,
        need_global_dictionary: bool,
    ) -> Result<IndexType> {
        let int_type = indexes.int_type();
        if int_type.signed {
            return Err(Error::logical(format!(
                "invalid indexes column for index type: expected unsigned, got {}",
                int_type.name()
            )));
        }
        Ok(IndexType {
            width: int_type.width,
            has_additional_keys,
            need_global_dictionary,
        })
    }

    fn width_code(&self) -> u64 {
        match self.width {
            IntegerWidth::W8 => 0,
            IntegerWidth::W16 => 1,
            IntegerWidth::W32 => 2,
            IntegerWidth::W64 => 3,
        }
    }

    fn width_from_code(code: u64) -> Result<IntegerWidth> {
        match code {
            0 => Ok(IntegerWidth::W8),
            1 => Ok(IntegerWidth::W16),
            2 => Ok(IntegerWidth::W32),
            3 => Ok(IntegerWidth::W64),
            _ => Err(Error::logical(format!(
                "invalid type {code:#x} for dictionary index column"
            ))),
        }
    }

    /// The element type of this block's packed indexes.
    pub fn data_type(&self) -> DataType {
        DataType::Integer(IntegerType {
            width: self.width,
            signed: false,
        })
    }

    pub fn serialize(&self, writer: &mut dyn Write) -> Result<()> {
        let mut value = self.width_code();
        if self.has_additional_keys {
            value |= HAS_ADDITIONAL_KEYS_BIT;
        }
        if self.need_global_dictionary {
            value |= NEED_GLOBAL_DICTIONARY_BIT;
        }
        write_u64(writer, value)
    }

    pub fn deserialize(reader: &mut dyn ReadStream) -> Result<IndexType> {
        let value = read_u64(reader)?;
        let width = Self::width_from_code(value & !FLAG_BITS)?;
        Ok(IndexType {
            width,
            has_additional_keys: value & HAS_ADDITIONAL_KEYS_BIT != 0,
            need_global_dictionary: value & NEED_GLOBAL_DICTIONARY_BIT != 0,
        })
    }
}
