//! Progress reporting for the planner
//!
//! The planner never logs on its own; it reports each finished pass to the
//! [`PlanObserver`] it was handed. [`TracingObserver`] forwards to
//! `tracing`, `()` discards everything.

use super::device::Device;
use serde::Serialize;
use std::fmt;

const MIB: f64 = 1024.0 * 1024.0;

/// Ordered allocation passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    /// Pin the token embedding to host memory
    Embedding,
    /// Per-block key/value cache charge plus attention tensors
    Attention,
    /// Dense feed-forward weights
    FeedForward,
    /// Mixture-of-experts gates
    Gate,
    /// Normalization weights
    Normalization,
    /// Everything not placed yet
    Residual,
}

impl Pass {
    pub const ORDER: [Pass; 6] = [
        Pass::Embedding,
        Pass::Attention,
        Pass::FeedForward,
        Pass::Gate,
        Pass::Normalization,
        Pass::Residual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Pass::Embedding => "embedding",
            Pass::Attention => "attention",
            Pass::FeedForward => "ffn",
            Pass::Gate => "gate",
            Pass::Normalization => "norm",
            Pass::Residual => "rest",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one pass placed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub pass: Pass,
    pub tensors: usize,
    pub tensor_bytes: u64,
    /// Anonymous key/value cache bytes charged in this pass
    pub kv_cache_bytes: u64,
}

impl PassSummary {
    pub fn new(pass: Pass) -> Self {
        Self {
            pass,
            tensors: 0,
            tensor_bytes: 0,
            kv_cache_bytes: 0,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.tensor_bytes.saturating_add(self.kv_cache_bytes)
    }
}

/// Sink for planner progress
pub trait PlanObserver {
    /// A tensor was placed on `device`
    fn tensor_placed(&mut self, _pass: Pass, _tensor: &str, _bytes: u64, _device: &str) {}

    /// A pass finished; `devices` is the pool state after it
    fn pass_completed(&mut self, _summary: &PassSummary, _devices: &[Device]) {}
}

impl PlanObserver for () {}

/// Reports progress through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PlanObserver for TracingObserver {
    fn tensor_placed(&mut self, pass: Pass, tensor: &str, bytes: u64, device: &str) {
        tracing::debug!(%pass, tensor, bytes, device, "tensor placed");
    }

    fn pass_completed(&mut self, summary: &PassSummary, devices: &[Device]) {
        tracing::info!(
            pass = %summary.pass,
            tensors = summary.tensors,
            "Total {} bytes allocated: {:.2} MiB",
            summary.pass,
            summary.total_bytes() as f64 / MIB
        );
        for device in devices {
            tracing::info!(
                device = %device.name,
                "Device {}: {:.2} MiB allocated",
                device.name,
                device.allocated_bytes() as f64 / MIB
            );
        }
    }
}
