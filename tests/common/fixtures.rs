//! Model and GGUF fixtures shared by the integration tests

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tensorplace::model::{MetadataValue, Model, Tensor};

// ============================================================================
// Synthetic models
// ============================================================================

/// Shape of a synthetic transformer
#[derive(Debug, Clone, Copy)]
pub struct Dims {
    pub hidden: u64,
    pub heads: u64,
    pub kv_heads: u64,
    pub layers: u64,
    pub ffn: u64,
    pub vocab: u64,
}

impl Dims {
    /// Qwen3-8B-like proportions
    pub const QWEN3_8B: Dims = Dims {
        hidden: 4096,
        heads: 32,
        kv_heads: 8,
        layers: 36,
        ffn: 12288,
        vocab: 151936,
    };
}

fn with_geometry(arch: &str, dims: Dims) -> Model {
    Model::new(arch)
        .with_metadata("general.architecture", arch)
        .with_metadata(format!("{}.embedding_length", arch), dims.hidden)
        .with_metadata(format!("{}.attention.head_count", arch), dims.heads)
        .with_metadata(format!("{}.attention.head_count_kv", arch), dims.kv_heads)
        .with_metadata(format!("{}.block_count", arch), dims.layers)
}

fn blk(i: u64, name: &str) -> String {
    format!("blk.{}.{}.weight", i, name)
}

fn attention_tensors(model: Model, i: u64, dims: Dims, quant: &str) -> Model {
    let head = dims.hidden / dims.heads;
    let kv = head * dims.kv_heads;
    let h = dims.hidden;
    model
        .with_tensor(Tensor::new(blk(i, "attn_norm"), "F32", vec![h]))
        .with_tensor(Tensor::new(blk(i, "attn_q"), quant, vec![h, h]))
        .with_tensor(Tensor::new(blk(i, "attn_k"), quant, vec![h, kv]))
        .with_tensor(Tensor::new(blk(i, "attn_v"), "Q6_K", vec![h, kv]))
        .with_tensor(Tensor::new(blk(i, "attn_output"), quant, vec![h, h]))
        .with_tensor(Tensor::new(blk(i, "attn_q_norm"), "F32", vec![head]))
        .with_tensor(Tensor::new(blk(i, "attn_k_norm"), "F32", vec![head]))
}

fn framing_tensors(model: Model, dims: Dims, quant: &str) -> Model {
    let (h, vocab) = (dims.hidden, dims.vocab);
    model
        .with_tensor(Tensor::new("output_norm.weight", "F32", vec![h]))
        .with_tensor(Tensor::new("output.weight", "Q6_K", vec![h, vocab]))
        .with_tensor(Tensor::new("token_embd.weight", quant, vec![h, vocab]))
}

/// Dense model: attention plus plain feed-forward per block
pub fn dense_model(arch: &str, dims: Dims, quant: &str) -> Model {
    let (h, ffn) = (dims.hidden, dims.ffn);
    let mut model = framing_tensors(with_geometry(arch, dims), dims, quant);
    for i in 0..dims.layers {
        model = attention_tensors(model, i, dims, quant)
            .with_tensor(Tensor::new(blk(i, "ffn_norm"), "F32", vec![h]))
            .with_tensor(Tensor::new(blk(i, "ffn_gate"), quant, vec![h, ffn]))
            .with_tensor(Tensor::new(blk(i, "ffn_up"), quant, vec![h, ffn]))
            .with_tensor(Tensor::new(blk(i, "ffn_down"), "Q6_K", vec![ffn, h]));
    }
    model
}

/// Mixture-of-experts model with a router gate and optional shared expert
pub fn moe_model(arch: &str, dims: Dims, experts: u64, shared: bool, quant: &str) -> Model {
    let (h, ffn) = (dims.hidden, dims.ffn);
    let mut model = framing_tensors(with_geometry(arch, dims), dims, quant)
        .with_metadata(format!("{}.expert_count", arch), experts);
    for i in 0..dims.layers {
        model = attention_tensors(model, i, dims, quant)
            .with_tensor(Tensor::new(blk(i, "ffn_norm"), "F32", vec![h]))
            .with_tensor(Tensor::new(blk(i, "ffn_gate_inp"), "F32", vec![h, experts]))
            .with_tensor(Tensor::new(blk(i, "ffn_gate_exps"), quant, vec![h, ffn, experts]))
            .with_tensor(Tensor::new(blk(i, "ffn_up_exps"), quant, vec![h, ffn, experts]))
            .with_tensor(Tensor::new(blk(i, "ffn_down_exps"), "Q6_K", vec![ffn, h, experts]));
        if shared {
            model = model
                .with_tensor(Tensor::new(blk(i, "ffn_gate_shexp"), quant, vec![h, ffn]))
                .with_tensor(Tensor::new(blk(i, "ffn_up_shexp"), quant, vec![h, ffn]))
                .with_tensor(Tensor::new(blk(i, "ffn_down_shexp"), "Q6_K", vec![ffn, h]));
        }
    }
    model
}

// ============================================================================
// GGUF file creation
// ============================================================================

const TYPE_UINT32: u32 = 4;
const TYPE_FLOAT32: u32 = 6;
const TYPE_STRING: u32 = 8;
const TYPE_ARRAY: u32 = 9;
const TYPE_UINT64: u32 = 10;

fn write_str<W: Write>(w: &mut W, s: &str) -> anyhow::Result<()> {
    w.write_all(&(s.len() as u64).to_le_bytes())?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn ggml_id(tag: &str) -> anyhow::Result<u32> {
    tensorplace::model::QuantType::from_tag(tag)
        .map(|q| q.ggml_id())
        .ok_or_else(|| anyhow::anyhow!("no ggml id for {}", tag))
}

/// Write GGUF front matter (no tensor data) for `metadata` and `tensors`
///
/// A string array under `tokenizer.ggml.tokens` is always added so readers
/// have to skip an array.
pub fn write_gguf(
    path: &Path,
    metadata: &[(&str, MetadataValue)],
    tensors: &[Tensor],
) -> anyhow::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);

    w.write_all(b"GGUF")?;
    w.write_all(&3u32.to_le_bytes())?;
    w.write_all(&(tensors.len() as u64).to_le_bytes())?;
    w.write_all(&(metadata.len() as u64 + 1).to_le_bytes())?;

    write_str(&mut w, "tokenizer.ggml.tokens")?;
    w.write_all(&TYPE_ARRAY.to_le_bytes())?;
    w.write_all(&TYPE_STRING.to_le_bytes())?;
    w.write_all(&3u64.to_le_bytes())?;
    for token in ["<|im_start|>", "<|im_end|>", "hello"] {
        write_str(&mut w, token)?;
    }

    for (key, value) in metadata {
        write_str(&mut w, key)?;
        match value {
            MetadataValue::UInt(v) if *v <= u32::MAX as u64 => {
                w.write_all(&TYPE_UINT32.to_le_bytes())?;
                w.write_all(&(*v as u32).to_le_bytes())?;
            }
            MetadataValue::UInt(v) => {
                w.write_all(&TYPE_UINT64.to_le_bytes())?;
                w.write_all(&v.to_le_bytes())?;
            }
            MetadataValue::Float(v) => {
                w.write_all(&TYPE_FLOAT32.to_le_bytes())?;
                w.write_all(&(*v as f32).to_le_bytes())?;
            }
            MetadataValue::Str(s) => {
                w.write_all(&TYPE_STRING.to_le_bytes())?;
                write_str(&mut w, s)?;
            }
            other => anyhow::bail!("fixture cannot encode {:?}", other),
        }
    }

    let mut offset = 0u64;
    for tensor in tensors {
        write_str(&mut w, &tensor.name)?;
        w.write_all(&(tensor.shape.len() as u32).to_le_bytes())?;
        for dim in &tensor.shape {
            w.write_all(&dim.to_le_bytes())?;
        }
        w.write_all(&ggml_id(&tensor.quant_type)?.to_le_bytes())?;
        w.write_all(&offset.to_le_bytes())?;
        offset += 32;
    }

    w.flush()?;
    Ok(())
}

/// Write `model` as a single GGUF file
pub fn write_model_gguf(path: &Path, model: &Model) -> anyhow::Result<()> {
    let metadata: Vec<(&str, MetadataValue)> = model
        .metadata
        .iter()
        .map(|(k, v)| (k.as_str(), v.clone()))
        .collect();
    write_gguf(path, &metadata, &model.tensors)
}
