//! tensorplace - tensor placement planner for GGUF models
//!
//! Decides, tensor by tensor, which device (host memory or a GPU) should
//! hold each weight of a model, charges the key/value cache for the
//! requested context length, and renders the result as llama.cpp tensor
//! override flags (`-ngl 0 -ot "<tensor>=<device>" ...`).
//!
//! The planning core ([`model`], [`memory`], [`placement`]) is pure and
//! deterministic: the same model, inventory and config always produce the
//! same plan. File and process I/O live at the edges ([`loader`],
//! [`inventory`]) and in the command-line binary.

#![allow(clippy::collapsible_else_if)] // Sometimes clearer for control flow
#![allow(clippy::collapsible_if)] // Sometimes clearer for control flow

pub mod config;
pub mod error;
pub mod inventory;
pub mod loader;
pub mod logging;
pub mod memory;
pub mod model;
pub mod placement;

pub use config::{GpuUtilization, PlanConfig};
pub use error::{ErrorCategory, PlanError, PlanResult};
pub use inventory::{Accelerator, Inventory};
pub use memory::{fits, ContextQuant, FeasibilityReport, MemoryCalculator};
pub use model::{Geometry, Model, QuantType, Tensor};
pub use placement::{plan, Plan, PlanObserver, PlanReport, TensorDeviceMap, TracingObserver};
