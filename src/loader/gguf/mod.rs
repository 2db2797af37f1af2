//! GGUF (GPT-Generated Unified Format) reader
//!
//! Reads only the front matter of a GGUF file: header, metadata KV pairs
//! and tensor infos. Tensor data is never touched, so planning a 200 GiB
//! checkpoint reads a few megabytes at most.
//!
//! # Module Structure
//!
//! - `header`: magic/version validation and primitive readers
//! - `metadata`: typed KV pairs, arrays skipped
//! - `tensor_info`: tensor descriptors

mod header;
mod metadata;
mod tensor_info;

pub use header::{parse_gguf_header, GgufHeader, GGUF_MAGIC, SUPPORTED_VERSIONS};
pub use metadata::parse_kv_pairs;
pub use tensor_info::{parse_tensor_infos, quant_tag};

use crate::model::{MetadataValue, Model, Tensor};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Front matter of one GGUF file
#[derive(Debug, Clone)]
pub struct GgufFile {
    pub header: GgufHeader,
    pub metadata: BTreeMap<String, MetadataValue>,
    pub tensors: Vec<Tensor>,
}

impl GgufFile {
    /// Parse from any reader positioned at the magic
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let header = parse_gguf_header(reader)?;
        let metadata = parse_kv_pairs(reader, header.kv_count)?;
        let tensors = parse_tensor_infos(reader, header.tensor_count)?;
        Ok(Self {
            header,
            metadata,
            tensors,
        })
    }

    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open GGUF file: {}", path.display()))?;
        let mut reader = BufReader::new(file);
        Self::read(&mut reader).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Convert into a [`Model`], resolving the architecture tag
    pub fn into_model(self) -> Model {
        let mut model = Model {
            architecture: String::new(),
            metadata: self.metadata,
            tensors: self.tensors,
        };
        model.resolve_architecture();
        model
    }
}
