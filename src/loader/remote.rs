//! GGUF front matter over HTTP(S)
//!
//! Each shard is fetched with a plain streamed GET. The reader consumes
//! the header, metadata and tensor infos and then drops the response, so
//! tensor data is never downloaded. Split checkpoints are recognised from
//! the URL exactly like local shards; a query string (`?download=true`)
//! is carried over to every shard URL.

use super::gguf::GgufFile;
use super::split::{merge_shards, SplitName};
use crate::model::Model;
use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use std::io::BufReader;
use std::time::Duration;

const USER_AGENT: &str = concat!("tensorplace/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// `true` for `http://` and `https://` locations
pub fn is_url(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Split a URL into its path part and `?query` suffix (possibly empty)
fn split_query(url: &str) -> (&str, &str) {
    match url.find(['?', '#']) {
        Some(at) => url.split_at(at),
        None => (url, ""),
    }
}

/// Every shard URL for `url`; a single URL when it is not a split name
pub fn shard_urls(url: &str) -> Vec<String> {
    let (path, query) = split_query(url);
    match SplitName::parse_str(path) {
        Some(name) => name
            .shard_names()
            .into_iter()
            .map(|shard| format!("{}{}", shard, query))
            .collect(),
        None => vec![url.to_string()],
    }
}

/// Blocking HTTP client for remote GGUF checkpoints
pub struct RemoteLoader {
    client: Client,
}

impl RemoteLoader {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Fetch the front matter of one GGUF file
    pub fn fetch_gguf(&self, url: &str) -> Result<GgufFile> {
        tracing::info!("Fetching GGUF front matter from {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Failed to request {}", url))?;
        if !response.status().is_success() {
            bail!("Failed to fetch {}: HTTP {}", url, response.status());
        }
        let mut reader = BufReader::new(response);
        GgufFile::read(&mut reader).with_context(|| format!("Failed to parse {}", url))
    }

    /// Fetch a whole checkpoint; any shard URL selects the full set
    pub fn fetch(&self, url: &str) -> Result<GgufFile> {
        let shards = shard_urls(url);
        if shards.is_empty() {
            bail!("split GGUF '{}' declares zero shards", url);
        }
        merge_shards(&shards, |shard| self.fetch_gguf(shard))
    }

    pub fn load_model(&self, url: &str) -> Result<Model> {
        Ok(self.fetch(url)?.into_model())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/m.gguf"));
        assert!(is_url("HTTP://example.com/m.gguf"));
        assert!(!is_url("/models/m.gguf"));
        assert!(!is_url("httpfs/m.gguf"));
    }

    #[test]
    fn test_shard_urls_keep_query() {
        let urls = shard_urls("https://host/r/m-00002-of-00002.gguf?download=true");
        assert_eq!(
            urls,
            vec![
                "https://host/r/m-00001-of-00002.gguf?download=true",
                "https://host/r/m-00002-of-00002.gguf?download=true",
            ]
        );
    }

    #[test]
    fn test_single_url_is_one_shard() {
        let url = "https://host/r/Qwen3-8B-Q4_K_M.gguf";
        assert_eq!(shard_urls(url), vec![url.to_string()]);
    }
}
