//! GGUF metadata KV parsing
//!
//! Scalar values are kept as typed [`MetadataValue`]s. Arrays (token
//! vocabularies, merges, per-layer tables) are skipped: the planner only
//! needs scalar hyperparameters.
//!
//! GGUF value types (ggml/gguf.h):
//! 0=UINT8, 1=INT8, 2=UINT16, 3=INT16, 4=UINT32, 5=INT32,
//! 6=FLOAT32, 7=BOOL, 8=STRING, 9=ARRAY, 10=UINT64, 11=INT64, 12=FLOAT64

use super::header::{read_string, read_u16, read_u32, read_u64, read_u8};
use crate::model::MetadataValue;
use anyhow::{anyhow, bail, Context, Result};
use std::collections::BTreeMap;
use std::io::{self, Read};

const TYPE_UINT8: u32 = 0;
const TYPE_INT8: u32 = 1;
const TYPE_UINT16: u32 = 2;
const TYPE_INT16: u32 = 3;
const TYPE_UINT32: u32 = 4;
const TYPE_INT32: u32 = 5;
const TYPE_FLOAT32: u32 = 6;
const TYPE_BOOL: u32 = 7;
const TYPE_STRING: u32 = 8;
const TYPE_ARRAY: u32 = 9;
const TYPE_UINT64: u32 = 10;
const TYPE_INT64: u32 = 11;
const TYPE_FLOAT64: u32 = 12;

/// Fixed element size for scalar types, `None` for strings and arrays
fn fixed_size(value_type: u32) -> Option<u64> {
    match value_type {
        TYPE_UINT8 | TYPE_INT8 | TYPE_BOOL => Some(1),
        TYPE_UINT16 | TYPE_INT16 => Some(2),
        TYPE_UINT32 | TYPE_INT32 | TYPE_FLOAT32 => Some(4),
        TYPE_UINT64 | TYPE_INT64 | TYPE_FLOAT64 => Some(8),
        _ => None,
    }
}

/// Read `kv_count` key/value pairs
///
/// Keys whose value is an array are left out of the result.
pub fn parse_kv_pairs<R: Read>(
    reader: &mut R,
    kv_count: u64,
) -> Result<BTreeMap<String, MetadataValue>> {
    let mut metadata = BTreeMap::new();
    for i in 0..kv_count {
        let key = read_string(reader).with_context(|| format!("reading key {}", i))?;
        let value_type = read_u32(reader)?;
        if let Some(value) =
            read_value(reader, value_type).with_context(|| format!("reading value of '{}'", key))?
        {
            metadata.insert(key, value);
        }
    }
    Ok(metadata)
}

/// Read one value; arrays are consumed and yield `None`
fn read_value<R: Read>(reader: &mut R, value_type: u32) -> Result<Option<MetadataValue>> {
    let value = match value_type {
        TYPE_UINT8 => MetadataValue::UInt(read_u8(reader)? as u64),
        TYPE_INT8 => MetadataValue::Int(read_u8(reader)? as i8 as i64),
        TYPE_UINT16 => MetadataValue::UInt(read_u16(reader)? as u64),
        TYPE_INT16 => MetadataValue::Int(read_u16(reader)? as i16 as i64),
        TYPE_UINT32 => MetadataValue::UInt(read_u32(reader)? as u64),
        TYPE_INT32 => MetadataValue::Int(read_u32(reader)? as i32 as i64),
        TYPE_FLOAT32 => MetadataValue::Float(f32::from_bits(read_u32(reader)?) as f64),
        TYPE_BOOL => MetadataValue::Bool(read_u8(reader)? != 0),
        TYPE_STRING => MetadataValue::Str(read_string(reader)?),
        TYPE_UINT64 => MetadataValue::UInt(read_u64(reader)?),
        TYPE_INT64 => MetadataValue::Int(read_u64(reader)? as i64),
        TYPE_FLOAT64 => MetadataValue::Float(f64::from_bits(read_u64(reader)?)),
        TYPE_ARRAY => {
            skip_array(reader)?;
            return Ok(None);
        }
        other => bail!("unknown GGUF value type {}", other),
    };
    Ok(Some(value))
}

/// Skip an array body: element type (u32), count (u64), elements
fn skip_array<R: Read>(reader: &mut R) -> Result<()> {
    let element_type = read_u32(reader)?;
    let count = read_u64(reader)?;

    if let Some(size) = fixed_size(element_type) {
        let bytes = count
            .checked_mul(size)
            .ok_or_else(|| anyhow!("array of {} elements overflows", count))?;
        return skip_bytes(reader, bytes);
    }

    match element_type {
        TYPE_STRING => {
            for _ in 0..count {
                let len = read_u64(reader)?;
                skip_bytes(reader, len)?;
            }
        }
        TYPE_ARRAY => {
            for _ in 0..count {
                skip_array(reader)?;
            }
        }
        other => bail!("unknown GGUF array element type {}", other),
    }
    Ok(())
}

fn skip_bytes<R: Read>(reader: &mut R, bytes: u64) -> Result<()> {
    let skipped = io::copy(&mut reader.take(bytes), &mut io::sink())?;
    if skipped != bytes {
        bail!("unexpected end of file while skipping {} bytes", bytes);
    }
    Ok(())
}
