//! On-disk registry document.

use serde::{Deserialize, Serialize};

use crate::device::SavedDevice;

/// Schema version for registry files.
pub const REGISTRY_SCHEMA_VERSION: u32 = 1;

/// Durable device registry: the saved devices plus the active pointer.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistryFile {
	#[serde(default)]
	pub schema: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub active_device_id: Option<String>,
	#[serde(default)]
	pub devices: Vec<SavedDevice>,
}

impl RegistryFile {
	/// Creates an empty registry with current [`REGISTRY_SCHEMA_VERSION`].
	pub fn new() -> Self {
		Self {
			schema: REGISTRY_SCHEMA_VERSION,
			..Default::default()
		}
	}

	pub fn find(&self, id: &str) -> Option<&SavedDevice> {
		self.devices.iter().find(|d| d.id == id)
	}

	pub fn find_mut(&mut self, id: &str) -> Option<&mut SavedDevice> {
		self.devices.iter_mut().find(|d| d.id == id)
	}

	/// Returns the active device, ignoring a dangling pointer.
	pub fn active(&self) -> Option<&SavedDevice> {
		self.active_device_id.as_deref().and_then(|id| self.find(id))
	}

	/// Removes a device. Clears the active pointer if it pointed at it.
	/// Returns true if a device was removed.
	pub fn remove(&mut self, id: &str) -> bool {
		let before = self.devices.len();
		self.devices.retain(|d| d.id != id);
		if self.active_device_id.as_deref() == Some(id) {
			self.active_device_id = None;
		}
		self.devices.len() < before
	}
}
