//! Common test utilities
//!
//! - baseline device inventory (two 24 GiB cards, one 12 GiB card,
//!   128 GiB of host memory)
//! - synthetic dense and mixture-of-experts models
//! - a GGUF front-matter writer for loader tests

#![allow(dead_code)]

mod fixtures;

pub use fixtures::*;

use tensorplace::inventory::{Accelerator, Inventory};

pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * MIB;

/// 2x RTX 3090, 1x RTX 3060, 128 GiB RAM
pub fn baseline_inventory() -> Inventory {
    Inventory::new(
        vec![
            Accelerator::new("CUDA0", 24 * GIB).with_description("NVIDIA GeForce RTX 3090"),
            Accelerator::new("CUDA1", 24 * GIB).with_description("NVIDIA GeForce RTX 3090"),
            Accelerator::new("CUDA2", 12 * GIB).with_description("NVIDIA GeForce RTX 3060"),
        ],
        128 * GIB,
    )
}
