//! Tensor placement across the device pool
//!
//! - [`device`]: a device with capacity, priority and a monotonic counter
//! - [`allocator`]: priority-ordered first-fit allocation and the tensor map
//! - [`planner`]: the ordered multi-pass walk over a model's tensors
//! - [`observer`]: progress sink for the passes
//! - [`render`]: command fragment and usage report

pub mod allocator;
pub mod device;
pub mod observer;
pub mod planner;
pub mod render;

pub use allocator::{DeviceAllocator, TensorDeviceMap};
pub use device::{Device, DeviceLimit};
pub use observer::{Pass, PassSummary, PlanObserver, TracingObserver};
pub use planner::{plan, tensors_blockwise, Plan, EMBEDDING_TENSOR};
pub use render::{
    is_renderable_device_name, is_renderable_tensor_name, parse_command, render_command,
    DeviceReport, PlanReport,
};
