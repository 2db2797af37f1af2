//! Architecture metadata adapter
//!
//! Maps a model-family tag to the normalized attention geometry the size
//! calculators need. Each family is one row of [`ARCHITECTURES`]: the tag
//! found in `general.architecture` and the prefix its GGUF metadata keys
//! use. Supporting a new family means adding a row.

use super::Model;
use crate::error::{PlanError, PlanResult};
use serde::Serialize;

/// One supported model family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchitectureProfile {
    /// Value of `general.architecture`
    pub tag: &'static str,
    /// Prefix of the family's metadata keys
    pub key_prefix: &'static str,
}

impl ArchitectureProfile {
    const fn new(tag: &'static str) -> Self {
        Self {
            tag,
            key_prefix: tag,
        }
    }

    pub fn key(&self, suffix: &str) -> String {
        format!("{}.{}", self.key_prefix, suffix)
    }
}

/// Registry of supported families
pub const ARCHITECTURES: &[ArchitectureProfile] = &[
    // Dense transformer and its mixture-of-experts variant
    ArchitectureProfile::new("qwen3"),
    ArchitectureProfile::new("qwen3moe"),
    // Vision-language / long-context variant
    ArchitectureProfile::new("qwen3vl"),
    // Second mixture-of-experts family
    ArchitectureProfile::new("hunyuan-moe"),
    ArchitectureProfile::new("qwen2"),
    ArchitectureProfile::new("llama"),
    ArchitectureProfile::new("phi3"),
];

const EMBEDDING_LENGTH: &str = "embedding_length";
const HEAD_COUNT: &str = "attention.head_count";
const BLOCK_COUNT: &str = "block_count";
const HEAD_COUNT_KV: &str = "attention.head_count_kv";

/// Normalized attention geometry of a model
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geometry {
    pub hidden_size: u64,
    pub num_attention_heads: u64,
    pub num_layers: u64,
    pub num_key_value_heads: u64,
    /// `hidden_size / num_attention_heads`, possibly fractional
    pub head_size: f64,
}

impl Geometry {
    /// Build geometry from raw counts, enforcing the positivity invariants
    pub fn new(
        hidden_size: u64,
        num_attention_heads: u64,
        num_layers: u64,
        num_key_value_heads: u64,
    ) -> PlanResult<Self> {
        if hidden_size == 0 {
            return Err(PlanError::InvalidGeometry(
                "embedding length must be positive".to_string(),
            ));
        }
        if num_attention_heads == 0 {
            return Err(PlanError::InvalidGeometry(
                "attention head count must be positive".to_string(),
            ));
        }
        if num_layers == 0 {
            return Err(PlanError::InvalidGeometry(
                "block count must be positive".to_string(),
            ));
        }
        // A zero key/value head count would plan an empty cache
        if num_key_value_heads == 0 {
            return Err(PlanError::InvalidGeometry(
                "key/value head count must be positive".to_string(),
            ));
        }
        Ok(Self {
            hidden_size,
            num_attention_heads,
            num_layers,
            num_key_value_heads,
            head_size: hidden_size as f64 / num_attention_heads as f64,
        })
    }
}

/// Look up a family by tag
pub fn lookup(tag: &str) -> Option<&'static ArchitectureProfile> {
    ARCHITECTURES.iter().find(|profile| profile.tag == tag)
}

/// Extract normalized geometry from a model's metadata
pub fn extract_geometry(model: &Model) -> PlanResult<Geometry> {
    let profile = lookup(&model.architecture)
        .ok_or_else(|| PlanError::UnsupportedArchitecture(model.architecture.clone()))?;

    let read = |suffix: &str| -> PlanResult<u64> {
        let key = profile.key(suffix);
        let value = model
            .metadata
            .get(&key)
            .ok_or_else(|| PlanError::MissingMetadata(key.clone()))?;
        value.as_u64().ok_or_else(|| PlanError::InvalidMetadata {
            key,
            value: value.to_string(),
        })
    };

    Geometry::new(
        read(EMBEDDING_LENGTH)?,
        read(HEAD_COUNT)?,
        read(BLOCK_COUNT)?,
        read(HEAD_COUNT_KV)?,
    )
}
