//! Model loaders
//!
//! - [`gguf`]: GGUF front matter (header, metadata, tensor infos)
//! - [`split`]: multi-shard GGUF checkpoints
//! - [`json`]: JSON model dumps
//! - [`remote`]: GGUF front matter over HTTP(S)
//!
//! [`load_model`] picks the right one from the path; [`load_model_from`]
//! also accepts URLs.

pub mod gguf;
pub mod json;
pub mod remote;
pub mod split;

use crate::model::Model;
use anyhow::Result;
use std::path::Path;

pub use gguf::GgufFile;
pub use json::{parse_model_json, read_model_json};
pub use remote::{is_url, RemoteLoader};
pub use split::SplitName;

/// On-disk model formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Gguf,
    SplitGguf,
    Json,
}

impl ModelFormat {
    pub fn detect(path: &Path) -> Self {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            ModelFormat::Json
        } else if SplitName::parse(path).is_some() {
            ModelFormat::SplitGguf
        } else {
            ModelFormat::Gguf
        }
    }
}

/// Load a model description from `path`
pub fn load_model(path: &Path) -> Result<Model> {
    let format = ModelFormat::detect(path);
    tracing::debug!(?format, path = %path.display(), "loading model");
    let model = match format {
        ModelFormat::Json => read_model_json(path)?,
        ModelFormat::Gguf => GgufFile::open(path)?.into_model(),
        ModelFormat::SplitGguf => match SplitName::parse(path) {
            Some(name) => split::read_split(&name)?.into_model(),
            None => GgufFile::open(path)?.into_model(),
        },
    };
    tracing::info!(
        architecture = %model.architecture,
        tensors = model.tensors.len(),
        "Loaded model from {}",
        path.display()
    );
    Ok(model)
}

/// Load a model from a local path or an `http(s)://` URL
pub fn load_model_from(location: &str) -> Result<Model> {
    if !is_url(location) {
        return load_model(Path::new(location));
    }
    let model = RemoteLoader::new()?.load_model(location)?;
    tracing::info!(
        architecture = %model.architecture,
        tensors = model.tensors.len(),
        "Loaded model from {}",
        location
    );
    Ok(model)
}
