//! Model description consumed by the planner
//!
//! A [`Model`] is the fully materialized view of a checkpoint: its
//! architecture tag, the open-ended metadata mapping and the ordered list
//! of tensor descriptors. Nothing here holds tensor data.

pub mod architecture;
pub mod tensor_type;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use architecture::{extract_geometry, ArchitectureProfile, Geometry, ARCHITECTURES};
pub use tensor_type::QuantType;

/// Metadata key holding the architecture tag in GGUF files
pub const ARCHITECTURE_KEY: &str = "general.architecture";

/// A single metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    UInt(u64),
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl MetadataValue {
    /// Interpret the value as a non-negative count.
    ///
    /// Floats are accepted when they hold an integral value, since JSON
    /// dumps do not distinguish the two.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            MetadataValue::UInt(v) => Some(*v),
            MetadataValue::Int(v) => u64::try_from(*v).ok(),
            MetadataValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Some(*v as u64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::UInt(v) => write!(f, "{}", v),
            MetadataValue::Int(v) => write!(f, "{}", v),
            MetadataValue::Float(v) => write!(f, "{}", v),
            MetadataValue::Bool(v) => write!(f, "{}", v),
            MetadataValue::Str(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<u64> for MetadataValue {
    fn from(v: u64) -> Self {
        MetadataValue::UInt(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::Str(v.to_string())
    }
}

/// Tensor descriptor: name, element type tag and shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tensor {
    /// Dotted name, e.g. `blk.3.attn_q.weight`
    pub name: String,
    /// Quantization tag, e.g. `Q4_K`
    pub quant_type: String,
    pub shape: Vec<u64>,
}

impl Tensor {
    pub fn new(name: impl Into<String>, quant_type: impl Into<String>, shape: Vec<u64>) -> Self {
        Self {
            name: name.into(),
            quant_type: quant_type.into(),
            shape,
        }
    }

    /// Product of all dimensions (1 for a scalar)
    ///
    /// `None` when the product does not fit in a `u64`.
    pub fn element_count(&self) -> Option<u64> {
        self.shape.iter().try_fold(1u64, |acc, &dim| acc.checked_mul(dim))
    }

    /// Block index encoded in the second dotted segment (`blk.<i>.…`)
    ///
    /// Returns `None` for special tensors such as `token_embd.weight`.
    pub fn block_index(&self) -> Option<u64> {
        self.name.split('.').nth(1)?.parse().ok()
    }
}

/// Parsed model: architecture, metadata and tensors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, MetadataValue>,
    #[serde(default)]
    pub tensors: Vec<Tensor>,
}

impl Model {
    pub fn new(architecture: impl Into<String>) -> Self {
        Self {
            architecture: architecture.into(),
            ..Default::default()
        }
    }

    /// Set a metadata value (builder style)
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Append a tensor (builder style)
    pub fn with_tensor(mut self, tensor: Tensor) -> Self {
        self.tensors.push(tensor);
        self
    }

    /// Fill the architecture tag from `general.architecture` when absent
    pub fn resolve_architecture(&mut self) {
        if self.architecture.is_empty() {
            if let Some(tag) = self.metadata.get(ARCHITECTURE_KEY).and_then(|v| v.as_str()) {
                self.architecture = tag.to_string();
            }
        }
    }

    pub fn tensor(&self, name: &str) -> Option<&Tensor> {
        self.tensors.iter().find(|t| t.name == name)
    }
}
