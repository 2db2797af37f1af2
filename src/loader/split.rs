//! Split GGUF checkpoints
//!
//! Large models ship as `<base>-00001-of-00003.gguf`, `<base>-00002-of-00003.gguf`,
//! ... Metadata lives in the first shard; every shard carries its own tensor
//! infos. Any shard path (or URL) selects the whole set.

use super::gguf::GgufFile;
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

/// A recognised shard name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitName {
    /// Path or URL prefix before `-NNNNN-of-NNNNN.gguf`
    pub base: String,
    pub index: u32,
    pub total: u32,
}

impl SplitName {
    /// Recognise `<base>-<index>-of-<total>.gguf`
    pub fn parse(path: &Path) -> Option<Self> {
        Self::parse_str(path.to_str()?)
    }

    /// Same as [`SplitName::parse`] for a path or URL given as text
    pub fn parse_str(text: &str) -> Option<Self> {
        let stem = text.strip_suffix(".gguf")?;
        let (rest, total) = stem.rsplit_once("-of-")?;
        let (base, index) = rest.rsplit_once('-')?;
        if base.is_empty() || !is_digits(index) || !is_digits(total) {
            return None;
        }
        Some(Self {
            base: base.to_string(),
            index: index.parse().ok()?,
            total: total.parse().ok()?,
        })
    }

    /// Name of shard `index` (1-based), zero padded to five digits
    pub fn shard_name(&self, index: u32) -> String {
        format!("{}-{:05}-of-{:05}.gguf", self.base, index, self.total)
    }

    pub fn shard_path(&self, index: u32) -> PathBuf {
        PathBuf::from(self.shard_name(index))
    }

    pub fn shard_paths(&self) -> Vec<PathBuf> {
        (1..=self.total).map(|i| self.shard_path(i)).collect()
    }

    pub fn shard_names(&self) -> Vec<String> {
        (1..=self.total).map(|i| self.shard_name(i)).collect()
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Read every shard and append their tensors to the first shard's
pub fn read_split(name: &SplitName) -> Result<GgufFile> {
    if name.total == 0 {
        bail!("split GGUF '{}' declares zero shards", name.base);
    }
    merge_shards(&name.shard_names(), |shard| {
        tracing::info!("Reading shard {}", shard);
        GgufFile::open(Path::new(shard))
    })
}

/// Fetch every shard with `fetch`, in order, and merge them
///
/// Metadata comes from the first shard only.
pub fn merge_shards<F>(shards: &[String], mut fetch: F) -> Result<GgufFile>
where
    F: FnMut(&str) -> Result<GgufFile>,
{
    let mut merged: Option<GgufFile> = None;
    for shard_name in shards {
        let shard = fetch(shard_name)?;
        match merged.as_mut() {
            None => merged = Some(shard),
            Some(first) => first.tensors.extend(shard.tensors),
        }
    }
    match merged {
        Some(file) => Ok(file),
        None => bail!("no shards to read"),
    }
}
