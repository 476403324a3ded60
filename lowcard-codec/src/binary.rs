//! Binary element codecs: bulk and single-value wire forms for every
//! admitted element type, plus the integer and varint primitives the codec
//! frames its streams with.
//!
//! All integers are little-endian. Variable-length strings are framed with a
//! LEB128 length prefix per value; every fixed-size kind is written as raw
//! packed elements.

use std::io::Write;

use lowcard_common::{Result, error::Error};
use lowcard_column::{Column, Field, ValueLayout};

use crate::data_type::DataType;
use crate::stream::ReadStream;

pub fn write_u64(writer: &mut dyn Write, value: u64) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub fn read_u64(reader: &mut dyn ReadStream) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Writes `value` as LEB128.
pub fn write_var_u64(writer: &mut dyn Write, mut value: u64) -> Result<()> {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        writer.write_all(&[byte])?;
        if value == 0 {
            return Ok(());
        }
    }
}

/// Reads a LEB128-encoded `u64`.
pub fn read_var_u64(reader: &mut dyn ReadStream) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte)?;
        if shift == 63 && byte[0] > 1 {
            return Err(Error::logical("malformed varint: value overflows u64"));
        }
        value |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

impl DataType {
    fn check_bulk_column(&self, column: &Column) -> Result<ValueLayout> {
        let Some(layout) = self.value_layout() else {
            return Err(Error::logical(format!(
                "no bulk binary form for {}",
                self.name()
            )));
        };
        if column.is_nullable() || column.value_layout() != layout {
            return Err(Error::logical(format!(
                "column does not match the {} bulk codec",
                self.name()
            )));
        }
        Ok(layout)
    }

    /// Writes `limit` values of `column` starting at `offset`. The limit is
    /// clamped to the column length.
    pub fn serialize_binary_bulk(
        &self,
        column: &Column,
        writer: &mut dyn Write,
        offset: usize,
        limit: usize,
    ) -> Result<()> {
        let layout = self.check_bulk_column(column)?;
        if offset > column.len() {
            return Err(Error::logical(format!(
                "bulk serialization offset {offset} beyond column size {}",
                column.len()
            )));
        }
        let limit = limit.min(column.len() - offset);
        match (layout, column) {
            (ValueLayout::Numeric(_), Column::Numeric(c)) => {
                writer.write_all(c.element_bytes_range(offset, limit))?;
            }
            (ValueLayout::FixedString(_), Column::FixedString(c)) => {
                writer.write_all(c.element_bytes_range(offset, limit))?;
            }
            (ValueLayout::String, Column::String(c)) => {
                for index in offset..offset + limit {
                    let bytes = c.element_bytes(index);
                    write_var_u64(writer, bytes.len() as u64)?;
                    writer.write_all(bytes)?;
                }
            }
            _ => {
                return Err(Error::logical(format!(
                    "column does not match the {} bulk codec",
                    self.name()
                )));
            }
        }
        Ok(())
    }

    /// Reads exactly `limit` values, appending them to `column`.
    ///
    /// `avg_value_size_hint` pre-sizes variable-length storage; zero means
    /// no hint.
    pub fn deserialize_binary_bulk(
        &self,
        column: &mut Column,
        reader: &mut dyn ReadStream,
        limit: usize,
        avg_value_size_hint: usize,
    ) -> Result<()> {
        let layout = self.check_bulk_column(column)?;
        match (layout, column) {
            (ValueLayout::Numeric(int_type), Column::Numeric(c)) => {
                let mut buf = vec![0u8; limit * int_type.byte_size()];
                reader.read_exact(&mut buf)?;
                c.extend_from_byte_slice(&buf);
            }
            (ValueLayout::FixedString(size), Column::FixedString(c)) => {
                let mut buf = vec![0u8; limit * size];
                reader.read_exact(&mut buf)?;
                c.extend_from_byte_slice(&buf);
            }
            (ValueLayout::String, Column::String(c)) => {
                if avg_value_size_hint > 0 {
                    c.reserve(limit, limit * avg_value_size_hint);
                }
                let mut buf = Vec::new();
                for _ in 0..limit {
                    let len = read_var_u64(reader)? as usize;
                    buf.resize(len, 0);
                    reader.read_exact(&mut buf)?;
                    c.push_bytes(&buf);
                }
            }
            _ => {
                return Err(Error::logical(format!(
                    "column does not match the {} bulk codec",
                    self.name()
                )));
            }
        }
        Ok(())
    }

    /// Writes one value in its single-value wire form.
    pub fn serialize_binary(&self, field: &Field, writer: &mut dyn Write) -> Result<()> {
        match self {
            DataType::Nullable(nested) => {
                if field.is_null() {
                    writer.write_all(&[1u8])?;
                    Ok(())
                } else {
                    writer.write_all(&[0u8])?;
                    nested.serialize_binary(field, writer)
                }
            }
            _ => {
                let mut scratch = self.create_column();
                scratch.push_field(field)?;
                match &scratch {
                    Column::String(c) => {
                        let bytes = c.element_bytes(0);
                        write_var_u64(writer, bytes.len() as u64)?;
                        writer.write_all(bytes)?;
                    }
                    _ => writer.write_all(scratch.bytes_at(0))?,
                }
                Ok(())
            }
        }
    }

    /// Reads one value in its single-value wire form.
    pub fn deserialize_binary(&self, reader: &mut dyn ReadStream) -> Result<Field> {
        match self {
            DataType::Nullable(nested) => {
                let mut flag = [0u8; 1];
                reader.read_exact(&mut flag)?;
                if flag[0] != 0 {
                    Ok(Field::Null)
                } else {
                    nested.deserialize_binary(reader)
                }
            }
            DataType::String => {
                let len = read_var_u64(reader)? as usize;
                let mut bytes = vec![0u8; len];
                reader.read_exact(&mut bytes)?;
                Ok(Field::Bytes(bytes))
            }
            _ => {
                let mut column = self.create_column();
                self.deserialize_binary_bulk(&mut column, reader, 1, 0)?;
                Ok(column.field_at(0))
            }
        }
    }
}
