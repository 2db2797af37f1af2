//! Feasibility precheck
//!
//! Compares what the model needs (tensors plus key/value cache) against
//! everything the pool offers (host memory plus each accelerator scaled by
//! its utilization fraction). The check is advisory: the planner only runs
//! it when `PlanConfig::check` is set.

use super::calculator::{kv_cache_size_bytes, MemoryCalculator};
use crate::config::PlanConfig;
use crate::error::PlanResult;
use crate::inventory::Inventory;
use crate::model::{extract_geometry, Geometry, Model};
use serde::Serialize;

/// Outcome of the precheck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeasibilityReport {
    pub tensor_bytes: u64,
    pub kv_cache_bytes: u64,
    pub required_bytes: u64,
    pub available_bytes: u64,
}

impl FeasibilityReport {
    pub fn fits(&self) -> bool {
        self.required_bytes <= self.available_bytes
    }
}

/// Usable bytes of an accelerator at the given utilization
pub(crate) fn scaled_bytes(capacity_bytes: u64, utilization: f64) -> u64 {
    (capacity_bytes as f64 * utilization).floor() as u64
}

/// Compute required and available bytes for one run
pub fn check_feasibility(
    calculator: &MemoryCalculator,
    geometry: &Geometry,
    inventory: &Inventory,
    config: &PlanConfig,
) -> PlanResult<FeasibilityReport> {
    let utilizations = config
        .gpu_utilization
        .resolve(inventory.accelerators.len())?;

    let tensor_bytes = calculator.total_bytes();
    let kv_cache_bytes = kv_cache_size_bytes(geometry, config.context_length, config.context_quant);
    let accelerator_bytes: u64 = inventory
        .accelerators
        .iter()
        .zip(&utilizations)
        .map(|(acc, util)| scaled_bytes(acc.capacity_bytes, *util))
        .fold(0u64, u64::saturating_add);

    Ok(FeasibilityReport {
        tensor_bytes,
        kv_cache_bytes,
        required_bytes: tensor_bytes.saturating_add(kv_cache_bytes),
        available_bytes: inventory.host_bytes.saturating_add(accelerator_bytes),
    })
}

/// Whether `model` fits the pool at all
pub fn fits(model: &Model, inventory: &Inventory, config: &PlanConfig) -> PlanResult<bool> {
    let geometry = extract_geometry(model)?;
    let calculator = MemoryCalculator::from_model(model)?;
    Ok(check_feasibility(&calculator, &geometry, inventory, config)?.fits())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GpuUtilization;
    use crate::inventory::Accelerator;
    use crate::model::Tensor;

    fn model(tensor_elems: u64) -> Model {
        Model::new("qwen3")
            .with_metadata("qwen3.embedding_length", 64u64)
            .with_metadata("qwen3.attention.head_count", 4u64)
            .with_metadata("qwen3.block_count", 1u64)
            .with_metadata("qwen3.attention.head_count_kv", 1u64)
            .with_tensor(Tensor::new("blk.0.attn_q.weight", "F32", vec![tensor_elems]))
    }

    #[test]
    fn test_report_sums() {
        // kv = 2 * 2 bytes * 1 layer * 16 ctx * 1 kv head * 16 head size = 1024
        let config = PlanConfig::new(16).with_gpu_utilization(GpuUtilization::Uniform(0.5));
        let inventory = Inventory::new(vec![Accelerator::new("CUDA0", 1000)], 200);
        let model = model(100);
        let report = check_feasibility(
            &MemoryCalculator::from_model(&model).unwrap(),
            &extract_geometry(&model).unwrap(),
            &inventory,
            &config,
        )
        .unwrap();
        assert_eq!(report.tensor_bytes, 400);
        assert_eq!(report.kv_cache_bytes, 1024);
        assert_eq!(report.required_bytes, 1424);
        assert_eq!(report.available_bytes, 200 + 500);
        assert!(!report.fits());
    }

    #[test]
    fn test_fits_boundary_is_inclusive() {
        // required = 400 + 1024 = 1424
        let config = PlanConfig::new(16).with_gpu_utilization(GpuUtilization::Uniform(1.0));
        let inventory = Inventory::new(vec![Accelerator::new("CUDA0", 1000)], 424);
        assert!(fits(&model(100), &inventory, &config).unwrap());

        let inventory = Inventory::new(vec![Accelerator::new("CUDA0", 1000)], 423);
        assert!(!fits(&model(100), &inventory, &config).unwrap());
    }

    #[test]
    fn test_per_device_fractions() {
        let config = PlanConfig::new(16)
            .with_gpu_utilization(GpuUtilization::PerDevice(vec![1.0, 0.5]));
        let inventory = Inventory::new(
            vec![Accelerator::new("CUDA0", 1000), Accelerator::new("CUDA1", 1000)],
            0,
        );
        let model = model(1);
        let report = check_feasibility(
            &MemoryCalculator::from_model(&model).unwrap(),
            &extract_geometry(&model).unwrap(),
            &inventory,
            &config,
        )
        .unwrap();
        assert_eq!(report.available_bytes, 1500);
    }
}
