//! Device inventory
//!
//! The planner consumes an [`Inventory`]: the accelerators with their
//! memory sizes plus the total host memory. This module also holds the
//! probes that fill it on a real machine:
//! - [`nvidia`]: `nvidia-smi` query and CSV parsing
//! - [`host`]: total host memory through `sysinfo`
//!
//! Probes do I/O and return `anyhow` errors; the planning core never calls
//! them.

pub mod host;
pub mod nvidia;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

pub use host::host_memory_bytes;
pub use nvidia::{parse_nvidia_smi_csv, query_nvidia_gpus};

const MIB: u64 = 1024 * 1024;

/// One accelerator as reported by the inventory source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accelerator {
    /// Runtime device name used in overrides, e.g. `CUDA0`
    pub name: String,
    /// Human-readable model, e.g. `NVIDIA GeForce RTX 3090`
    pub description: String,
    pub capacity_bytes: u64,
}

impl Accelerator {
    pub fn new(name: impl Into<String>, capacity_bytes: u64) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            capacity_bytes,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Parse a manual `NAME=MiB` override, e.g. `CUDA0=24576`
    pub fn parse_override(arg: &str) -> Result<Self> {
        let (name, mib) = arg
            .split_once('=')
            .ok_or_else(|| anyhow!("device override '{}' must look like NAME=MiB", arg))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("device override '{}' has an empty name", arg));
        }
        let mib: u64 = mib
            .trim()
            .parse()
            .with_context(|| format!("device override '{}' has an invalid MiB value", arg))?;
        Ok(Accelerator::new(name, mib_to_bytes(mib)?))
    }
}

/// Convert a MiB count from the command line to bytes
pub fn mib_to_bytes(mib: u64) -> Result<u64> {
    mib.checked_mul(MIB)
        .ok_or_else(|| anyhow!("{} MiB does not fit in a 64-bit byte count", mib))
}

/// Memory devices available to one planning run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Inventory {
    pub accelerators: Vec<Accelerator>,
    pub host_bytes: u64,
}

impl Inventory {
    pub fn new(accelerators: Vec<Accelerator>, host_bytes: u64) -> Self {
        Self {
            accelerators,
            host_bytes,
        }
    }

    /// Sum of accelerator capacities
    pub fn total_accelerator_bytes(&self) -> u64 {
        self.accelerators
            .iter()
            .fold(0u64, |acc, a| acc.saturating_add(a.capacity_bytes))
    }
}
