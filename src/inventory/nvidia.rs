//! NVIDIA accelerator discovery through `nvidia-smi`

use super::{mib_to_bytes, Accelerator};
use anyhow::{anyhow, bail, Context, Result};
use std::process::Command;

/// Arguments producing `index, name, memory.total` rows without a header
pub const NVIDIA_SMI_ARGS: &[&str] = &[
    "--query-gpu=index,name,memory.total",
    "--format=csv,noheader",
];

/// Run `nvidia-smi` and parse its output
pub fn query_nvidia_gpus() -> Result<Vec<Accelerator>> {
    let output = Command::new("nvidia-smi")
        .args(NVIDIA_SMI_ARGS)
        .output()
        .context("failed to run nvidia-smi")?;
    if !output.status.success() {
        bail!(
            "nvidia-smi exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let gpus = parse_nvidia_smi_csv(&stdout)?;
    tracing::debug!(count = gpus.len(), "discovered NVIDIA accelerators");
    Ok(gpus)
}

/// Parse `index, name, memory.total` CSV rows
///
/// Each accelerator is named `CUDA<index>` (the llama.cpp device name) and
/// keeps the marketing name as its description. Memory is reported in MiB.
pub fn parse_nvidia_smi_csv(output: &str) -> Result<Vec<Accelerator>> {
    let mut gpus = Vec::new();
    for (line_no, line) in output.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [index, name, memory] = fields[..] else {
            bail!("line {}: expected 3 fields, got '{}'", line_no + 1, line);
        };
        let index: u32 = index
            .parse()
            .with_context(|| format!("line {}: invalid GPU index '{}'", line_no + 1, index))?;
        let mib: u64 = memory
            .trim_end_matches("MiB")
            .trim()
            .parse()
            .map_err(|_| anyhow!("line {}: invalid memory '{}'", line_no + 1, memory))?;
        let bytes = mib_to_bytes(mib).with_context(|| format!("line {}", line_no + 1))?;
        gpus.push(Accelerator::new(format!("CUDA{}", index), bytes).with_description(name));
    }
    Ok(gpus)
}
