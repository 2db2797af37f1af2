//! Multi-pass allocation planner
//!
//! Walks the model's tensors in a fixed sequence of passes and places each
//! one with the [`DeviceAllocator`]:
//!
//! 1. pin `token_embd.weight` to host memory
//! 2. per block: charge the block's key/value cache share, then place the
//!    block's attention tensors
//! 3. dense feed-forward tensors (no expert, gate or norm weights)
//! 4. mixture-of-experts gate tensors
//! 5. normalization tensors
//! 6. everything left
//!
//! A tensor is placed at most once; later passes skip anything already
//! seen. Any allocation failure aborts the whole plan.

use super::allocator::{DeviceAllocator, TensorDeviceMap};
use super::device::{Device, DeviceLimit};
use super::observer::{Pass, PassSummary, PlanObserver};
use super::render::{
    is_renderable_device_name, is_renderable_tensor_name, render_command, PlanReport,
};
use crate::config::PlanConfig;
use crate::error::{PlanError, PlanResult};
use crate::inventory::Inventory;
use crate::memory::{
    check_feasibility, kv_cache_per_layer_bytes, FeasibilityReport, MemoryCalculator,
};
use crate::model::{extract_geometry, Geometry, Model, Tensor};
use std::collections::{BTreeMap, HashSet};

/// Tensor pinned to host memory
pub const EMBEDDING_TENSOR: &str = "token_embd.weight";

const ATTENTION_KEYWORDS: &[&str] = &["attention", "attn"];
const FFN_KEYWORDS: &[&str] = &["ffn", "feed_forward"];
const FFN_EXCLUDED_KEYWORDS: &[&str] = &["exp", "expert", "gate", "norm"];
const GATE_KEYWORDS: &[&str] = &["gate"];
const NORM_KEYWORDS: &[&str] = &["norm"];

fn name_contains_any(name: &str, keywords: &[&str]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// Group tensors by block index, ascending
///
/// Tensors without a numeric second name segment are left out.
pub fn tensors_blockwise(model: &Model) -> BTreeMap<u64, Vec<&Tensor>> {
    let mut blocks: BTreeMap<u64, Vec<&Tensor>> = BTreeMap::new();
    for tensor in &model.tensors {
        if let Some(index) = tensor.block_index() {
            blocks.entry(index).or_default().push(tensor);
        }
    }
    blocks
}

/// Result of a successful planning run
#[derive(Debug, Clone)]
pub struct Plan {
    pub geometry: Geometry,
    /// `None` when the precheck was disabled
    pub feasibility: Option<FeasibilityReport>,
    pub devices: Vec<Device>,
    pub tensor_map: TensorDeviceMap,
    pub passes: Vec<PassSummary>,
    /// Key/value cache bytes charged per detected block
    pub kv_cache_per_block: u64,
    /// Number of blocks the cache was charged for
    pub blocks_charged: u64,
}

impl Plan {
    /// Total key/value cache bytes actually charged
    pub fn kv_cache_charged(&self) -> u64 {
        self.kv_cache_per_block.saturating_mul(self.blocks_charged)
    }

    /// Sum of allocated bytes over all devices
    pub fn total_allocated(&self) -> u64 {
        self.devices
            .iter()
            .map(|d| d.allocated_bytes())
            .fold(0u64, u64::saturating_add)
    }

    pub fn command_fragment(&self) -> String {
        render_command(&self.tensor_map)
    }

    pub fn report(&self) -> PlanReport {
        PlanReport::from_plan(self)
    }
}

/// Build the device pool: host first, then accelerators in inventory order
fn build_devices(inventory: &Inventory, config: &PlanConfig) -> PlanResult<Vec<Device>> {
    let utilizations = config
        .gpu_utilization
        .resolve(inventory.accelerators.len())?;

    let host_limit = if config.check {
        DeviceLimit::Bounded {
            utilization: config.host_utilization,
        }
    } else {
        DeviceLimit::Unbounded
    };

    let names = std::iter::once(&config.host_device_name)
        .chain(inventory.accelerators.iter().map(|acc| &acc.name));
    for name in names {
        if !is_renderable_device_name(name) {
            return Err(crate::config_error!(
                "device name {:?} cannot be written to a command fragment",
                name
            ));
        }
    }

    let mut devices = Vec::with_capacity(inventory.accelerators.len() + 1);
    devices.push(Device::host(
        config.host_device_name.clone(),
        inventory.host_bytes,
        host_limit,
    ));
    for (acc, util) in inventory.accelerators.iter().zip(utilizations) {
        if acc.name == config.host_device_name
            || devices.iter().any(|d: &Device| d.name == acc.name)
        {
            return Err(crate::config_error!("duplicate device name: {}", acc.name));
        }
        devices.push(Device::accelerator(acc.name.clone(), acc.capacity_bytes, util));
    }
    Ok(devices)
}

struct PassRunner<'a, O: PlanObserver> {
    allocator: DeviceAllocator,
    sizes: MemoryCalculator,
    seen: HashSet<&'a str>,
    observer: &'a mut O,
    passes: Vec<PassSummary>,
}

impl<'a, O: PlanObserver> PassRunner<'a, O> {
    fn size_of(&self, tensor: &Tensor) -> PlanResult<u64> {
        self.sizes.size_of(&tensor.name).ok_or_else(|| {
            PlanError::InternalError(format!("tensor {} was not sized", tensor.name))
        })
    }

    /// Place `tensor` unless it was already placed
    fn place(
        &mut self,
        summary: &mut PassSummary,
        tensor: &'a Tensor,
        device: Option<&str>,
    ) -> PlanResult<()> {
        if self.seen.contains(tensor.name.as_str()) {
            return Ok(());
        }
        let bytes = self.size_of(tensor)?;
        let placed_on = match device {
            Some(name) => self.allocator.allocate_on(name, bytes, Some(tensor.name.as_str()))?,
            None => self.allocator.allocate_any(bytes, Some(tensor.name.as_str()))?,
        };
        self.seen.insert(tensor.name.as_str());
        summary.tensors += 1;
        summary.tensor_bytes = summary.tensor_bytes.saturating_add(bytes);
        self.observer
            .tensor_placed(summary.pass, &tensor.name, bytes, &placed_on);
        Ok(())
    }

    fn finish(&mut self, summary: PassSummary) {
        self.observer
            .pass_completed(&summary, self.allocator.devices());
        self.passes.push(summary);
    }

    /// Place every unseen tensor matching `select`, in model order
    fn flat_pass(
        &mut self,
        pass: Pass,
        model: &'a Model,
        select: impl Fn(&Tensor) -> bool,
    ) -> PlanResult<()> {
        let mut summary = PassSummary::new(pass);
        for tensor in model.tensors.iter().filter(|t| select(t)) {
            self.place(&mut summary, tensor, None)?;
        }
        self.finish(summary);
        Ok(())
    }
}

/// Compute a placement plan
///
/// Geometry is extracted before anything else, so an unsupported
/// architecture fails before any device is touched. With `config.check` on,
/// an infeasible model fails the precheck; with it off, host memory is
/// unbounded.
pub fn plan<O: PlanObserver>(
    model: &Model,
    inventory: &Inventory,
    config: &PlanConfig,
    observer: &mut O,
) -> PlanResult<Plan> {
    config.validate()?;
    let geometry = extract_geometry(model)?;
    let sizes = MemoryCalculator::from_model(model)?;
    if let Some(tensor) = model
        .tensors
        .iter()
        .find(|t| !is_renderable_tensor_name(&t.name))
    {
        return Err(PlanError::UnrenderableTensorName(tensor.name.clone()));
    }

    let feasibility = if config.check {
        let report = check_feasibility(&sizes, &geometry, inventory, config)?;
        if !report.fits() {
            return Err(PlanError::InfeasiblePlan {
                required: report.required_bytes,
                available: report.available_bytes,
            });
        }
        Some(report)
    } else {
        None
    };

    let devices = build_devices(inventory, config)?;
    let host_name = config.host_device_name.clone();
    let mut runner = PassRunner {
        allocator: DeviceAllocator::new(devices),
        sizes,
        seen: HashSet::new(),
        observer,
        passes: Vec::with_capacity(Pass::ORDER.len()),
    };

    // Pass 1: some runtimes cannot run quantized embedding lookups on an
    // accelerator, so the embedding always lives in host memory.
    let mut summary = PassSummary::new(Pass::Embedding);
    if let Some(embedding) = model.tensor(EMBEDDING_TENSOR) {
        runner.place(&mut summary, embedding, Some(host_name.as_str()))?;
    }
    runner.finish(summary);

    // Pass 2: the cache is laid out per block, so it is charged blockwise
    // alongside the attention weights of that block.
    let kv_cache_per_block =
        kv_cache_per_layer_bytes(&geometry, config.context_length, config.context_quant);
    let mut blocks_charged = 0u64;
    let mut summary = PassSummary::new(Pass::Attention);
    for block in tensors_blockwise(model).values() {
        runner.allocator.allocate_any(kv_cache_per_block, None)?;
        summary.kv_cache_bytes = summary.kv_cache_bytes.saturating_add(kv_cache_per_block);
        blocks_charged += 1;
        for &tensor in block {
            if name_contains_any(&tensor.name, ATTENTION_KEYWORDS) {
                runner.place(&mut summary, tensor, None)?;
            }
        }
    }
    runner.finish(summary);

    // Passes 3-6 walk the flat list so tensors outside any block are still
    // reachable.
    runner.flat_pass(Pass::FeedForward, model, |t| {
        name_contains_any(&t.name, FFN_KEYWORDS)
            && !name_contains_any(&t.name, FFN_EXCLUDED_KEYWORDS)
    })?;
    runner.flat_pass(Pass::Gate, model, |t| name_contains_any(&t.name, GATE_KEYWORDS))?;
    runner.flat_pass(Pass::Normalization, model, |t| {
        name_contains_any(&t.name, NORM_KEYWORDS)
    })?;
    runner.flat_pass(Pass::Residual, model, |_| true)?;

    let passes = runner.passes;
    let (devices, tensor_map) = runner.allocator.into_parts();
    Ok(Plan {
        geometry,
        feasibility,
        devices,
        tensor_map,
        passes,
        kv_cache_per_block,
        blocks_charged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GpuUtilization;
    use crate::inventory::Accelerator;

    fn tiny_model() -> Model {
        Model::new("qwen3")
            .with_metadata("qwen3.embedding_length", 64u64)
            .with_metadata("qwen3.attention.head_count", 4u64)
            .with_metadata("qwen3.block_count", 2u64)
            .with_metadata("qwen3.attention.head_count_kv", 2u64)
            .with_tensor(Tensor::new("token_embd.weight", "F32", vec![64, 10]))
            .with_tensor(Tensor::new("blk.0.attn_q.weight", "F16", vec![64, 64]))
            .with_tensor(Tensor::new("blk.0.attn_norm.weight", "F32", vec![64]))
            .with_tensor(Tensor::new("blk.0.ffn_up.weight", "F16", vec![64, 128]))
            .with_tensor(Tensor::new("blk.0.ffn_gate.weight", "F16", vec![64, 128]))
            .with_tensor(Tensor::new("blk.0.ffn_norm.weight", "F32", vec![64]))
            .with_tensor(Tensor::new("blk.1.attn_q.weight", "F16", vec![64, 64]))
            .with_tensor(Tensor::new("blk.1.ffn_up.weight", "F16", vec![64, 128]))
            .with_tensor(Tensor::new("output_norm.weight", "F32", vec![64]))
            .with_tensor(Tensor::new("output.weight", "F16", vec![64, 10]))
    }

    fn roomy() -> Inventory {
        Inventory::new(vec![Accelerator::new("CUDA0", 1 << 20)], 1 << 20)
    }

    struct PassLog(Vec<(Pass, String)>);

    impl PlanObserver for PassLog {
        fn tensor_placed(&mut self, pass: Pass, tensor: &str, _bytes: u64, _device: &str) {
            self.0.push((pass, tensor.to_string()));
        }
    }

    #[test]
    fn test_pass_classification() {
        let mut log = PassLog(Vec::new());
        plan(&tiny_model(), &roomy(), &PlanConfig::new(16), &mut log).unwrap();
        let pass_of = |name: &str| log.0.iter().find(|(_, t)| t == name).map(|(p, _)| *p);

        assert_eq!(pass_of("token_embd.weight"), Some(Pass::Embedding));
        assert_eq!(pass_of("blk.0.attn_q.weight"), Some(Pass::Attention));
        // attention keyword wins over norm in the earlier pass
        assert_eq!(pass_of("blk.0.attn_norm.weight"), Some(Pass::Attention));
        assert_eq!(pass_of("blk.0.ffn_up.weight"), Some(Pass::FeedForward));
        assert_eq!(pass_of("blk.0.ffn_gate.weight"), Some(Pass::Gate));
        assert_eq!(pass_of("blk.0.ffn_norm.weight"), Some(Pass::Normalization));
        assert_eq!(pass_of("output_norm.weight"), Some(Pass::Normalization));
        assert_eq!(pass_of("output.weight"), Some(Pass::Residual));
        assert_eq!(log.0.len(), tiny_model().tensors.len());
    }

    #[test]
    fn test_embedding_pinned_to_host() {
        let plan = plan(&tiny_model(), &roomy(), &PlanConfig::new(16), &mut ()).unwrap();
        assert_eq!(plan.tensor_map.get("token_embd.weight"), Some("CPU"));
        assert_eq!(plan.tensor_map.get("blk.0.attn_q.weight"), Some("CUDA0"));
    }

    #[test]
    fn test_kv_cache_charged_per_block() {
        let plan = plan(&tiny_model(), &roomy(), &PlanConfig::new(16), &mut ()).unwrap();
        assert_eq!(plan.blocks_charged, 2);
        // 2 * 2 bytes * 2 layers * 16 ctx * 2 kv heads * 16 head size / 2 layers
        assert_eq!(plan.kv_cache_per_block, 2048);
        let tensor_bytes: u64 = plan.passes.iter().map(|p| p.tensor_bytes).sum();
        assert_eq!(plan.total_allocated(), tensor_bytes + plan.kv_cache_charged());
    }

    #[test]
    fn test_unknown_architecture_touches_nothing() {
        let mut model = tiny_model();
        model.architecture = "rwkv".to_string();
        let mut log = PassLog(Vec::new());
        let err = plan(&model, &roomy(), &PlanConfig::new(16), &mut log).unwrap_err();
        assert!(matches!(err, PlanError::UnsupportedArchitecture(_)));
        assert!(log.0.is_empty());
    }

    #[test]
    fn test_infeasible_with_check() {
        let inventory = Inventory::new(vec![Accelerator::new("CUDA0", 1000)], 1000);
        let err = plan(&tiny_model(), &inventory, &PlanConfig::new(16), &mut ()).unwrap_err();
        assert!(matches!(err, PlanError::InfeasiblePlan { .. }));
    }

    #[test]
    fn test_unchecked_host_absorbs_overflow() {
        let inventory = Inventory::new(vec![Accelerator::new("CUDA0", 1000)], 1000);
        let config = PlanConfig::new(16).with_check(false);
        let plan = plan(&tiny_model(), &inventory, &config, &mut ()).unwrap();
        assert_eq!(plan.tensor_map.len(), tiny_model().tensors.len());
        assert!(plan.feasibility.is_none());
        let host = &plan.devices[0];
        assert!(host.is_unbounded());
        assert!(host.allocated_bytes() > host.capacity_bytes);
    }

    #[test]
    fn test_duplicate_device_names_rejected() {
        let inventory = Inventory::new(
            vec![Accelerator::new("CUDA0", 1 << 20), Accelerator::new("CUDA0", 1 << 20)],
            1 << 20,
        );
        let err = plan(&tiny_model(), &inventory, &PlanConfig::new(16), &mut ()).unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn test_per_device_length_mismatch() {
        let config = PlanConfig::new(16)
            .with_gpu_utilization(GpuUtilization::PerDevice(vec![0.9, 0.9]));
        let err = plan(&tiny_model(), &roomy(), &config, &mut ()).unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn test_blockwise_grouping_skips_specials() {
        let model = tiny_model();
        let blocks = tensors_blockwise(&model);
        assert_eq!(blocks.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(blocks[&0].len(), 5);
        assert_eq!(blocks[&1].len(), 2);
    }
}
