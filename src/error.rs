//! Unified error handling for tensorplace
//!
//! Every planning failure is fatal: there is no partial plan and no retry,
//! because the inputs are static and a retry would reproduce the failure.
//! Errors are grouped into categories so the CLI can decide how to present
//! them:
//! - User errors (bad configuration or command fragments)
//! - Model errors (unsupported architecture, quantization, metadata)
//! - Capacity errors (the model does not fit the device pool)
//! - Internal errors (bugs)

use std::fmt;

/// Unified error type for the placement core
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    // ========== Model Errors ==========
    /// Architecture tag absent from the adapter registry
    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    /// Tensor element type absent from the size table
    #[error("Unsupported quantization type: {quant_type} in tensor {tensor}")]
    UnsupportedQuantType { quant_type: String, tensor: String },

    /// Required metadata key missing from the model
    #[error("Missing metadata key: {0}")]
    MissingMetadata(String),

    /// Metadata key present but not usable as a count
    #[error("Invalid metadata value for {key}: {value}")]
    InvalidMetadata { key: String, value: String },

    /// Tensor name that cannot be quoted inside an `-ot` override
    #[error("Tensor name cannot be written to a command fragment: {0:?}")]
    UnrenderableTensorName(String),

    /// Tensor element count does not fit in 64 bits
    #[error("Tensor {tensor} is too large: shape {shape}")]
    TensorTooLarge { tensor: String, shape: String },

    /// Derived geometry violates an invariant (zero hidden size, heads or layers)
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    // ========== Capacity Errors ==========
    /// Precheck found that the model cannot fit the pool
    #[error(
        "Model does not fit in combined accelerator and host memory: requires {required} bytes, {available} bytes available. Try reducing context length or quantization size."
    )]
    InfeasiblePlan { required: u64, available: u64 },

    /// No device in priority order accepted the allocation
    #[error("Cannot allocate {} on any device{}", format_mib(.bytes), tensor_suffix(.tensor))]
    NoDeviceCapacity { bytes: u64, tensor: Option<String> },

    /// Named-device allocation did not fit
    #[error("Cannot allocate {} on device {device}", format_mib(.bytes))]
    CapacityExceeded { device: String, bytes: u64 },

    /// Named-device allocation targeted a device that does not exist
    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    // ========== User Errors ==========
    /// Run configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Command fragment could not be parsed back into a tensor map
    #[error("Invalid command fragment: {0}")]
    InvalidCommandFragment(String),

    // ========== Internal Errors ==========
    /// Internal error (indicates a bug)
    #[error("Internal error: {0}")]
    InternalError(String),
}

fn format_mib(bytes: &u64) -> String {
    format!("{:.2} MiB", *bytes as f64 / (1024.0 * 1024.0))
}

fn tensor_suffix(tensor: &Option<String>) -> String {
    match tensor {
        Some(name) => format!(" (tensor {})", name),
        None => String::new(),
    }
}

impl PlanError {
    /// Categorize the error for handling decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            PlanError::InvalidConfiguration(_) | PlanError::InvalidCommandFragment(_) => {
                ErrorCategory::User
            }

            PlanError::UnsupportedArchitecture(_)
            | PlanError::UnsupportedQuantType { .. }
            | PlanError::MissingMetadata(_)
            | PlanError::InvalidMetadata { .. }
            | PlanError::TensorTooLarge { .. }
            | PlanError::UnrenderableTensorName(_)
            | PlanError::InvalidGeometry(_) => ErrorCategory::Model,

            PlanError::InfeasiblePlan { .. }
            | PlanError::NoDeviceCapacity { .. }
            | PlanError::CapacityExceeded { .. }
            | PlanError::UnknownDevice(_) => ErrorCategory::Capacity,

            PlanError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// Check if this is a user-facing error (actionable by users)
    pub fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::User)
    }

    /// Check if the model or device pool is too small for the request
    pub fn is_capacity_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Capacity)
    }
}

/// Error category for handling decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid input or configuration
    User,
    /// Model file or metadata problem
    Model,
    /// Device pool too small
    Capacity,
    /// Indicates a bug
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::User => write!(f, "User"),
            ErrorCategory::Model => write!(f, "Model"),
            ErrorCategory::Capacity => write!(f, "Capacity"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

// Helper type alias for Results using PlanError
pub type PlanResult<T> = std::result::Result<T, PlanError>;

/// Create a configuration error with context
///
/// # Examples
/// ```ignore
/// return Err(config_error!("context length must be positive, got {}", len));
/// ```
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::PlanError::InvalidConfiguration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::PlanError::InvalidConfiguration(format!($fmt, $($arg)*))
    };
}
