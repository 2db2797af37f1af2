//! Memory requirements calculator
//!
//! Pure size functions used by both the feasibility precheck and the
//! planner:
//! - per-tensor byte size from shape and quantization table
//! - whole-model tensor bytes
//! - key/value cache bytes for a context length and cache precision

use crate::error::{PlanError, PlanResult};
use crate::model::{Geometry, Model, QuantType, Tensor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Precision of the key/value cache elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContextQuant {
    Q4,
    Q8,
    #[default]
    F16,
}

impl ContextQuant {
    /// Parse from a bit width (4, 8 or 16)
    pub fn from_bits(bits: u32) -> PlanResult<Self> {
        match bits {
            4 => Ok(ContextQuant::Q4),
            8 => Ok(ContextQuant::Q8),
            16 => Ok(ContextQuant::F16),
            other => Err(crate::config_error!(
                "context quantization size must be one of 4, 8 or 16, got {}",
                other
            )),
        }
    }

    pub fn bits(&self) -> u64 {
        match self {
            ContextQuant::Q4 => 4,
            ContextQuant::Q8 => 8,
            ContextQuant::F16 => 16,
        }
    }
}

/// Byte size of one tensor
///
/// Element count is the product of all dimensions; the size is that count
/// times the table's bytes-per-element, rounded up to a whole byte.
pub fn tensor_size_bytes(tensor: &Tensor) -> PlanResult<u64> {
    let quant = QuantType::from_tag(&tensor.quant_type).ok_or_else(|| {
        PlanError::UnsupportedQuantType {
            quant_type: tensor.quant_type.clone(),
            tensor: tensor.name.clone(),
        }
    })?;
    let elements = tensor
        .element_count()
        .ok_or_else(|| PlanError::TensorTooLarge {
            tensor: tensor.name.clone(),
            shape: format!("{:?}", tensor.shape),
        })?;
    Ok(quant.size_bytes(elements))
}

/// Sum of all tensor sizes
pub fn total_tensors_size_bytes(model: &Model) -> PlanResult<u64> {
    model
        .tensors
        .iter()
        .try_fold(0u64, |acc, t| Ok(acc.saturating_add(tensor_size_bytes(t)?)))
}

/// Key/value cache size for the whole model
///
/// `2 * (bits / 8) * layers * context * kv_heads * head_size`, evaluated in
/// integer arithmetic with `head_size = hidden / heads` folded into the
/// division so fractional head sizes do not lose precision early.
pub fn kv_cache_size_bytes(geometry: &Geometry, context_length: u64, quant: ContextQuant) -> u64 {
    let numerator = 2u128
        * quant.bits() as u128
        * geometry.num_layers as u128
        * context_length as u128
        * geometry.num_key_value_heads as u128
        * geometry.hidden_size as u128;
    let denominator = 8u128 * geometry.num_attention_heads as u128;
    u64::try_from(numerator / denominator).unwrap_or(u64::MAX)
}

/// Per-block share of the key/value cache
///
/// Relies on `num_layers > 0`, which [`Geometry::new`] guarantees.
pub fn kv_cache_per_layer_bytes(
    geometry: &Geometry,
    context_length: u64,
    quant: ContextQuant,
) -> u64 {
    kv_cache_size_bytes(geometry, context_length, quant) / geometry.num_layers
}

/// Tracks the size of every tensor of a model
///
/// Sizes are computed once up front; an unsupported quantization tag fails
/// here, naming the offending tensor.
///
/// # Example
/// ```ignore
/// let calc = MemoryCalculator::from_model(&model)?;
/// println!("Need {} MiB", calc.total_bytes() / 1024 / 1024);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryCalculator {
    tensor_sizes: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl MemoryCalculator {
    /// Create an empty calculator
    pub fn new() -> Self {
        Self::default()
    }

    /// Size every tensor of `model`
    pub fn from_model(model: &Model) -> PlanResult<Self> {
        let mut calc = Self::new();
        for tensor in &model.tensors {
            calc.add_tensor(tensor)?;
        }
        Ok(calc)
    }

    /// Add a tensor and return its size in bytes
    pub fn add_tensor(&mut self, tensor: &Tensor) -> PlanResult<u64> {
        let bytes = tensor_size_bytes(tensor)?;
        self.index.insert(tensor.name.clone(), self.tensor_sizes.len());
        self.tensor_sizes.push((tensor.name.clone(), bytes));
        Ok(bytes)
    }

    /// Size of a previously added tensor
    pub fn size_of(&self, name: &str) -> Option<u64> {
        self.index.get(name).map(|&i| self.tensor_sizes[i].1)
    }

    /// Total bytes of all tracked tensors
    pub fn total_bytes(&self) -> u64 {
        self.tensor_sizes
            .iter()
            .fold(0u64, |acc, (_, size)| acc.saturating_add(*size))
    }

    /// Number of tensors tracked
    pub fn tensor_count(&self) -> usize {
        self.tensor_sizes.len()
    }

    /// Individual tensor sizes in insertion order
    pub fn tensor_sizes(&self) -> &[(String, u64)] {
        &self.tensor_sizes
    }
}
