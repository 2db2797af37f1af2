//! GGUF header parsing and primitive readers
//!
//! Layout (little endian):
//! - magic `GGUF` (4 bytes)
//! - version (u32)
//! - tensor count (u64)
//! - metadata KV count (u64)

use anyhow::{bail, Result};
use std::io::Read;

/// GGUF file magic number
pub const GGUF_MAGIC: &[u8; 4] = b"GGUF";

/// Versions sharing the 64-bit count layout
pub const SUPPORTED_VERSIONS: [u32; 2] = [2, 3];

/// Upper bound for a single key or string, guards against corrupt lengths
pub(super) const MAX_STRING_LEN: u64 = 100_000_000;

/// GGUF header information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GgufHeader {
    pub version: u32,
    pub tensor_count: u64,
    pub kv_count: u64,
}

pub(super) fn read_u8<R: Read>(reader: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub(super) fn read_u16<R: Read>(reader: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub(super) fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(super) fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Length-prefixed (u64) UTF-8 string
pub(super) fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = read_u64(reader)?;
    if len > MAX_STRING_LEN {
        bail!("string length {} exceeds limit", len);
    }
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Validate GGUF magic number
pub fn validate_gguf_magic<R: Read>(reader: &mut R) -> Result<()> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != GGUF_MAGIC {
        bail!(
            "Invalid GGUF magic number: expected {:?}, got {:?}",
            GGUF_MAGIC,
            magic
        );
    }
    Ok(())
}

/// Read and validate GGUF version
pub fn read_gguf_version<R: Read>(reader: &mut R) -> Result<u32> {
    let version = read_u32(reader)?;
    if !SUPPORTED_VERSIONS.contains(&version) {
        bail!(
            "Unsupported GGUF version: {} (supported: {:?})",
            version,
            SUPPORTED_VERSIONS
        );
    }
    Ok(version)
}

/// Parse complete GGUF header
pub fn parse_gguf_header<R: Read>(reader: &mut R) -> Result<GgufHeader> {
    validate_gguf_magic(reader)?;
    let version = read_gguf_version(reader)?;
    let tensor_count = read_u64(reader)?;
    let kv_count = read_u64(reader)?;

    Ok(GgufHeader {
        version,
        tensor_count,
        kv_count,
    })
}
