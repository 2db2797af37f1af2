//! GGUF tensor info parsing
//!
//! Each entry: name (string), n_dims (u32), dims (u64 each), ggml type
//! (u32), data offset (u64). Offsets are read and discarded; only the
//! descriptors are needed for placement.

use super::header::{read_string, read_u32, read_u64};
use crate::model::{QuantType, Tensor};
use anyhow::{bail, Context, Result};
use std::io::Read;

/// ggml supports at most 4 dimensions
const MAX_DIMS: u32 = 4;

/// Quantization tag for a ggml type id
///
/// Unknown ids keep a readable tag so sizing can report them by name.
pub fn quant_tag(ggml_id: u32) -> String {
    match QuantType::from_ggml_id(ggml_id) {
        Some(qt) => qt.name().to_string(),
        None => format!("GGML_TYPE_{}", ggml_id),
    }
}

/// Parse `tensor_count` tensor infos in file order
pub fn parse_tensor_infos<R: Read>(reader: &mut R, tensor_count: u64) -> Result<Vec<Tensor>> {
    let mut tensors = Vec::new();
    for i in 0..tensor_count {
        let name = read_string(reader).with_context(|| format!("reading tensor {} name", i))?;
        let n_dims = read_u32(reader)?;
        if n_dims > MAX_DIMS {
            bail!("tensor '{}' has {} dimensions", name, n_dims);
        }
        let mut shape = Vec::with_capacity(n_dims as usize);
        for _ in 0..n_dims {
            shape.push(read_u64(reader)?);
        }
        let ggml_type = read_u32(reader)?;
        let _offset = read_u64(reader)?;

        tensors.push(Tensor::new(name, quant_tag(ggml_type), shape));
    }
    Ok(tensors)
}
