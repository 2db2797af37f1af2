//! JSON model dumps
//!
//! Same shape as [`Model`]'s serde form:
//!
//! ```json
//! {
//!   "architecture": "qwen3",
//!   "metadata": { "qwen3.block_count": 36 },
//!   "tensors": [{ "name": "blk.0.attn_q.weight", "quant_type": "Q4_K", "shape": [4096, 4096] }]
//! }
//! ```
//!
//! `architecture` may be omitted when `general.architecture` is present.

use crate::model::Model;
use anyhow::{Context, Result};
use std::path::Path;

pub fn parse_model_json(text: &str) -> Result<Model> {
    let mut model: Model = serde_json::from_str(text).context("Invalid model JSON")?;
    model.resolve_architecture();
    Ok(model)
}

pub fn read_model_json(path: &Path) -> Result<Model> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_model_json(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_from_metadata() {
        let model = parse_model_json(
            r#"{"metadata": {"general.architecture": "qwen3moe"}, "tensors": []}"#,
        )
        .unwrap();
        assert_eq!(model.architecture, "qwen3moe");
    }

    #[test]
    fn test_explicit_architecture_wins() {
        let model = parse_model_json(
            r#"{"architecture": "llama", "metadata": {"general.architecture": "qwen3"}}"#,
        )
        .unwrap();
        assert_eq!(model.architecture, "llama");
    }

    #[test]
    fn test_malformed_json() {
        assert!(parse_model_json("{ not json").is_err());
    }
}
