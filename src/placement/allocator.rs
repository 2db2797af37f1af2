//! Priority-ordered first-fit allocator over a device pool
//!
//! Devices are tried in descending priority (stable on ties, so input order
//! breaks them). The first device that can take the request gets it. There
//! is no backtracking: a request no device accepts fails the whole run.

use super::device::Device;
use crate::error::{PlanError, PlanResult};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// Insertion-ordered mapping of tensor name to device name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TensorDeviceMap {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl TensorDeviceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `tensor` to `device`
    ///
    /// Rebinding an existing tensor keeps its original position.
    pub fn insert(&mut self, tensor: impl Into<String>, device: impl Into<String>) {
        let tensor = tensor.into();
        let device = device.into();
        match self.index.get(&tensor) {
            Some(&i) => self.entries[i].1 = device,
            None => {
                self.index.insert(tensor.clone(), self.entries.len());
                self.entries.push((tensor, device));
            }
        }
    }

    pub fn get(&self, tensor: &str) -> Option<&str> {
        self.index.get(tensor).map(|&i| self.entries[i].1.as_str())
    }

    pub fn contains(&self, tensor: &str) -> bool {
        self.index.contains_key(tensor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(tensor, device)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, d)| (t.as_str(), d.as_str()))
    }
}

impl Serialize for TensorDeviceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (tensor, device) in &self.entries {
            map.serialize_entry(tensor, device)?;
        }
        map.end()
    }
}

/// Owns the device pool and the tensor map of one planning run
#[derive(Debug, Clone)]
pub struct DeviceAllocator {
    devices: Vec<Device>,
    tensor_map: TensorDeviceMap,
}

impl DeviceAllocator {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices,
            tensor_map: TensorDeviceMap::new(),
        }
    }

    /// Devices in their input order
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn tensor_map(&self) -> &TensorDeviceMap {
        &self.tensor_map
    }

    pub fn into_parts(self) -> (Vec<Device>, TensorDeviceMap) {
        (self.devices, self.tensor_map)
    }

    /// Device indices in descending priority, ties in input order
    fn priority_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.devices.len()).collect();
        order.sort_by(|&a, &b| self.devices[b].priority.cmp(&self.devices[a].priority));
        order
    }

    /// Allocate on the highest-priority device with room
    ///
    /// When `tensor` is given the placement is recorded in the tensor map;
    /// anonymous allocations (the key/value cache) only consume capacity.
    pub fn allocate_any(&mut self, bytes: u64, tensor: Option<&str>) -> PlanResult<String> {
        let chosen = self
            .priority_order()
            .into_iter()
            .find(|&i| self.devices[i].can_allocate(bytes))
            .ok_or_else(|| PlanError::NoDeviceCapacity {
                bytes,
                tensor: tensor.map(str::to_string),
            })?;
        self.commit(chosen, bytes, tensor)
    }

    /// Allocate on the device called `device`
    pub fn allocate_on(
        &mut self,
        device: &str,
        bytes: u64,
        tensor: Option<&str>,
    ) -> PlanResult<String> {
        let index = self
            .devices
            .iter()
            .position(|d| d.name == device)
            .ok_or_else(|| PlanError::UnknownDevice(device.to_string()))?;
        self.commit(index, bytes, tensor)
    }

    fn commit(&mut self, index: usize, bytes: u64, tensor: Option<&str>) -> PlanResult<String> {
        let device = &mut self.devices[index];
        device.allocate(bytes)?;
        if let Some(name) = tensor {
            self.tensor_map.insert(name, device.name.clone());
        }
        Ok(device.name.clone())
    }
}
