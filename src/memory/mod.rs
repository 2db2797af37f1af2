//! Memory sizing for placement planning
//!
//! - [`calculator`]: tensor and key/value cache byte sizes
//! - [`feasibility`]: advisory precheck comparing the model's total
//!   footprint against the whole device pool before any allocation

pub mod calculator;
pub mod feasibility;

pub use calculator::{
    kv_cache_per_layer_bytes, kv_cache_size_bytes, tensor_size_bytes, total_tensors_size_bytes,
    ContextQuant, MemoryCalculator,
};
pub use feasibility::{check_feasibility, fits, FeasibilityReport};
