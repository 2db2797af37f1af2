//! Run configuration for the planner
//!
//! [`PlanConfig`] carries the validated tuning knobs of one planning run:
//! context length and cache precision, whether the feasibility precheck is
//! enforced, and how much of each accelerator may be used.

use crate::config_error;
use crate::error::PlanResult;
use crate::memory::ContextQuant;

/// Default usable fraction of every accelerator
pub const DEFAULT_GPU_UTILIZATION: f64 = 0.9;

/// Default name of the host memory device, as llama.cpp spells it
pub const DEFAULT_HOST_DEVICE: &str = "CPU";

/// Usable fraction of accelerator memory
///
/// A single fraction for all accelerators, or one per accelerator aligned to
/// the inventory order. The two forms are mutually exclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuUtilization {
    Uniform(f64),
    PerDevice(Vec<f64>),
}

impl Default for GpuUtilization {
    fn default() -> Self {
        GpuUtilization::Uniform(DEFAULT_GPU_UTILIZATION)
    }
}

impl GpuUtilization {
    /// Parse a comma-separated list such as `0.9,0.8,0.7`
    pub fn parse_per_device(list: &str) -> PlanResult<Self> {
        let fractions = list
            .split(',')
            .map(|p| {
                let p = p.trim();
                p.parse::<f64>().map_err(|_| {
                    config_error!(
                        "invalid GPU percentage: {}. It should be a number between 0 and 1",
                        p
                    )
                })
            })
            .collect::<PlanResult<Vec<f64>>>()?;
        Ok(GpuUtilization::PerDevice(fractions))
    }

    /// Fractions for `device_count` accelerators, in inventory order
    pub fn resolve(&self, device_count: usize) -> PlanResult<Vec<f64>> {
        match self {
            GpuUtilization::Uniform(f) => Ok(vec![*f; device_count]),
            GpuUtilization::PerDevice(fractions) => {
                if fractions.len() != device_count {
                    return Err(config_error!(
                        "{} per-device GPU percentages given for {} accelerators",
                        fractions.len(),
                        device_count
                    ));
                }
                Ok(fractions.clone())
            }
        }
    }

    fn validate(&self) -> PlanResult<()> {
        let fractions: &[f64] = match self {
            GpuUtilization::Uniform(f) => std::slice::from_ref(f),
            GpuUtilization::PerDevice(v) => v,
        };
        for f in fractions {
            validate_fraction("GPU percentage", *f)?;
        }
        Ok(())
    }
}

fn validate_fraction(what: &str, value: f64) -> PlanResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(config_error!(
            "invalid {}: {}. It should be a number between 0 and 1",
            what,
            value
        ));
    }
    Ok(())
}

/// Configuration of one planning run
#[derive(Debug, Clone)]
pub struct PlanConfig {
    /// Context length in tokens (must be positive)
    pub context_length: u64,

    /// Key/value cache element precision
    pub context_quant: ContextQuant,

    /// Enforce the feasibility precheck and bound the host device
    pub check: bool,

    /// Usable fraction of accelerator memory
    pub gpu_utilization: GpuUtilization,

    /// Device name used for host memory in the command fragment
    pub host_device_name: String,

    /// Usable fraction of host memory while `check` is on
    pub host_utilization: f64,
}

impl Default for PlanConfig {
    fn default() -> Self {
        PlanConfig {
            context_length: 4096,
            context_quant: ContextQuant::default(),
            check: true,
            gpu_utilization: GpuUtilization::default(),
            host_device_name: DEFAULT_HOST_DEVICE.to_string(),
            host_utilization: 1.0,
        }
    }
}

impl PlanConfig {
    /// Create a config for the given context length with default values
    pub fn new(context_length: u64) -> Self {
        Self {
            context_length,
            ..Self::default()
        }
    }

    /// Set key/value cache precision
    pub fn with_context_quant(mut self, context_quant: ContextQuant) -> Self {
        self.context_quant = context_quant;
        self
    }

    /// Enable or disable the feasibility precheck
    pub fn with_check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    /// Set accelerator utilization
    pub fn with_gpu_utilization(mut self, gpu_utilization: GpuUtilization) -> Self {
        self.gpu_utilization = gpu_utilization;
        self
    }

    /// Set the host device name
    pub fn with_host_device_name(mut self, name: impl Into<String>) -> Self {
        self.host_device_name = name.into();
        self
    }

    /// Set host utilization
    pub fn with_host_utilization(mut self, fraction: f64) -> Self {
        self.host_utilization = fraction;
        self
    }

    /// Validate ranges
    pub fn validate(&self) -> PlanResult<()> {
        if self.context_length == 0 {
            return Err(config_error!("context length must be a positive integer"));
        }
        if self.host_device_name.trim().is_empty() {
            return Err(config_error!("host device name must not be empty"));
        }
        self.gpu_utilization.validate()?;
        validate_fraction("host percentage", self.host_utilization)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlanConfig::new(32768);
        assert_eq!(config.context_length, 32768);
        assert_eq!(config.context_quant, ContextQuant::F16);
        assert!(config.check);
        assert_eq!(config.gpu_utilization, GpuUtilization::Uniform(0.9));
        assert_eq!(config.host_device_name, "CPU");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_context_rejected() {
        assert!(PlanConfig::new(0).validate().unwrap_err().is_user_error());
    }

    #[test]
    fn test_fraction_range() {
        let config = PlanConfig::new(1).with_gpu_utilization(GpuUtilization::Uniform(1.5));
        assert!(config.validate().is_err());

        let config =
            PlanConfig::new(1).with_gpu_utilization(GpuUtilization::PerDevice(vec![0.5, -0.1]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_per_device() {
        let util = GpuUtilization::parse_per_device("0.9, 0.8,0.7").unwrap();
        assert_eq!(util, GpuUtilization::PerDevice(vec![0.9, 0.8, 0.7]));
        assert!(GpuUtilization::parse_per_device("0.9,abc").is_err());
    }

    #[test]
    fn test_resolve() {
        assert_eq!(GpuUtilization::Uniform(0.5).resolve(3).unwrap(), vec![0.5; 3]);
        let per = GpuUtilization::PerDevice(vec![0.9, 0.8]);
        assert_eq!(per.resolve(2).unwrap(), vec![0.9, 0.8]);
        assert!(per.resolve(3).is_err());
    }
}
