//! Plan rendering
//!
//! Turns a finished plan into the llama.cpp command fragment and a
//! per-device usage report. The fragment format is consumed by external
//! tooling and must stay bit-exact:
//!
//! ```text
//! -ngl 0 -ot "<tensor>=<device>" -ot "<tensor>=<device>" ...
//! ```

use super::allocator::TensorDeviceMap;
use super::planner::Plan;
use crate::error::{PlanError, PlanResult};
use crate::memory::FeasibilityReport;
use serde::Serialize;
use std::fmt;

/// Leading token: no implicit layer offload
pub const NO_IMPLICIT_OFFLOAD: &str = "-ngl 0";

const OVERRIDE_FLAG: &str = "-ot";
const MIB: f64 = 1024.0 * 1024.0;

/// Tensor names go inside double quotes unescaped
pub fn is_renderable_tensor_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('"') && !name.chars().any(char::is_control)
}

/// Device names additionally must not contain the `=` separator
pub fn is_renderable_device_name(name: &str) -> bool {
    is_renderable_tensor_name(name) && !name.contains('=')
}

/// Render the command fragment for `map`, in insertion order
pub fn render_command(map: &TensorDeviceMap) -> String {
    let mut command = String::from(NO_IMPLICIT_OFFLOAD);
    for (tensor, device) in map.iter() {
        command.push_str(&format!(" {} \"{}={}\"", OVERRIDE_FLAG, tensor, device));
    }
    command
}

/// Split a fragment into shell-like words, honouring double quotes
fn split_words(fragment: &str) -> PlanResult<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut in_quotes = false;
    for c in fragment.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                in_word = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_quotes {
        return Err(PlanError::InvalidCommandFragment(
            "unterminated quote".to_string(),
        ));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Parse `-ot` overrides of a fragment back into a tensor map
///
/// `-ngl <n>` is accepted and ignored; anything else is rejected.
pub fn parse_command(fragment: &str) -> PlanResult<TensorDeviceMap> {
    let words = split_words(fragment)?;
    let mut map = TensorDeviceMap::new();
    let mut iter = words.iter();
    while let Some(word) = iter.next() {
        let value = iter.next().ok_or_else(|| {
            PlanError::InvalidCommandFragment(format!("{} is missing its value", word))
        })?;
        match word.as_str() {
            "-ngl" => {}
            OVERRIDE_FLAG => {
                let (tensor, device) = value.rsplit_once('=').ok_or_else(|| {
                    PlanError::InvalidCommandFragment(format!(
                        "override '{}' is not <tensor>=<device>",
                        value
                    ))
                })?;
                map.insert(tensor, device);
            }
            other => {
                return Err(PlanError::InvalidCommandFragment(format!(
                    "unexpected token '{}'",
                    other
                )))
            }
        }
    }
    Ok(map)
}

/// Usage of one device at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceReport {
    pub name: String,
    pub bytes_allocated: u64,
    pub capacity_bytes: u64,
    pub utilization_fraction: f64,
    pub unbounded: bool,
    pub percent_used: f64,
}

/// Serializable outcome of a planning run
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub command_fragment: String,
    pub tensor_device_map: TensorDeviceMap,
    pub devices: Vec<DeviceReport>,
    pub kv_cache_bytes: u64,
    pub tensor_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feasibility: Option<FeasibilityReport>,
}

impl PlanReport {
    pub fn from_plan(plan: &Plan) -> Self {
        let devices = plan
            .devices
            .iter()
            .map(|d| DeviceReport {
                name: d.name.clone(),
                bytes_allocated: d.allocated_bytes(),
                capacity_bytes: d.capacity_bytes,
                utilization_fraction: d.utilization(),
                unbounded: d.is_unbounded(),
                percent_used: d.percent_used(),
            })
            .collect();
        Self {
            command_fragment: render_command(&plan.tensor_map),
            tensor_device_map: plan.tensor_map.clone(),
            devices,
            kv_cache_bytes: plan.kv_cache_charged(),
            tensor_bytes: plan
                .passes
                .iter()
                .map(|p| p.tensor_bytes)
                .fold(0u64, u64::saturating_add),
            feasibility: plan.feasibility,
        }
    }
}

impl fmt::Display for PlanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Tensors: {:.2} MiB, KV cache: {:.2} MiB",
            self.tensor_bytes as f64 / MIB,
            self.kv_cache_bytes as f64 / MIB
        )?;
        for device in &self.devices {
            write!(
                f,
                "Device {}: {:.2} / {:.2} MiB ({:.1}%)",
                device.name,
                device.bytes_allocated as f64 / MIB,
                device.capacity_bytes as f64 / MIB,
                device.percent_used
            )?;
            if device.unbounded {
                write!(f, " [unbounded]")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
