//! Memory devices with monotonic allocation tracking

use crate::error::{PlanError, PlanResult};
use crate::memory::feasibility::scaled_bytes;
use serde::Serialize;

/// Capacity rule of a device
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceLimit {
    /// At most `capacity * utilization` bytes may be allocated
    Bounded { utilization: f64 },
    /// Capacity check disabled (e.g. host memory backed by swap)
    Unbounded,
}

/// A memory device in the pool
///
/// Allocated bytes only grow during a run; there is no free operation.
#[derive(Debug, Clone, Serialize)]
pub struct Device {
    pub name: String,
    pub capacity_bytes: u64,
    /// Higher is preferred
    pub priority: u64,
    pub limit: DeviceLimit,
    allocated_bytes: u64,
}

impl Device {
    pub fn new(
        name: impl Into<String>,
        capacity_bytes: u64,
        priority: u64,
        limit: DeviceLimit,
    ) -> Self {
        Self {
            name: name.into(),
            capacity_bytes,
            priority,
            limit,
            allocated_bytes: 0,
        }
    }

    /// Accelerator whose priority is its own capacity
    pub fn accelerator(name: impl Into<String>, capacity_bytes: u64, utilization: f64) -> Self {
        Self::new(
            name,
            capacity_bytes,
            capacity_bytes,
            DeviceLimit::Bounded { utilization },
        )
    }

    /// Host memory device with the lowest priority
    pub fn host(name: impl Into<String>, capacity_bytes: u64, limit: DeviceLimit) -> Self {
        Self::new(name, capacity_bytes, 0, limit)
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self.limit, DeviceLimit::Unbounded)
    }

    /// Usable fraction of capacity (1.0 when unbounded)
    pub fn utilization(&self) -> f64 {
        match self.limit {
            DeviceLimit::Bounded { utilization } => utilization,
            DeviceLimit::Unbounded => 1.0,
        }
    }

    /// Bytes that may be allocated in total, `None` when unbounded
    pub fn usable_bytes(&self) -> Option<u64> {
        match self.limit {
            DeviceLimit::Bounded { utilization } => {
                Some(scaled_bytes(self.capacity_bytes, utilization))
            }
            DeviceLimit::Unbounded => None,
        }
    }

    pub fn can_allocate(&self, bytes: u64) -> bool {
        match self.usable_bytes() {
            None => true,
            Some(usable) => self
                .allocated_bytes
                .checked_add(bytes)
                .is_some_and(|total| total <= usable),
        }
    }

    /// Charge `bytes` to this device
    pub fn allocate(&mut self, bytes: u64) -> PlanResult<()> {
        if !self.can_allocate(bytes) {
            return Err(PlanError::CapacityExceeded {
                device: self.name.clone(),
                bytes,
            });
        }
        self.allocated_bytes = self.allocated_bytes.saturating_add(bytes);
        Ok(())
    }

    /// Allocated bytes as a percentage of capacity
    pub fn percent_used(&self) -> f64 {
        if self.capacity_bytes == 0 {
            return 0.0;
        }
        self.allocated_bytes as f64 / self.capacity_bytes as f64 * 100.0
    }
}
