use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use preke_protocol::{RegistryFile, SavedDevice};

use super::DeviceRegistry;
use crate::error::RegistryError;

/// In-memory [`DeviceRegistry`].
#[derive(Debug, Default)]
pub struct MemoryRegistry {
	state: Mutex<RegistryFile>,
}

impl MemoryRegistry {
	pub fn new() -> Self {
		Self {
			state: Mutex::new(RegistryFile::new()),
		}
	}

	/// Creates a registry pre-populated with `devices`.
	pub fn with_devices(devices: Vec<SavedDevice>) -> Self {
		Self {
			state: Mutex::new(RegistryFile {
				devices,
				..RegistryFile::new()
			}),
		}
	}
}

#[async_trait]
impl DeviceRegistry for MemoryRegistry {
	async fn list(&self) -> Result<Vec<SavedDevice>, RegistryError> {
		Ok(self.state.lock().devices.clone())
	}

	async fn add(&self, name: &str, url: &str) -> Result<SavedDevice, RegistryError> {
		let device = SavedDevice::new(name, url);
		self.state.lock().devices.push(device.clone());
		Ok(device)
	}

	async fn remove(&self, id: &str) -> Result<(), RegistryError> {
		if self.state.lock().remove(id) {
			Ok(())
		} else {
			Err(RegistryError::NotFound { id: id.to_string() })
		}
	}

	async fn rename(&self, id: &str, name: &str) -> Result<SavedDevice, RegistryError> {
		let mut state = self.state.lock();
		let device = state
			.find_mut(id)
			.ok_or_else(|| RegistryError::NotFound { id: id.to_string() })?;
		device.name = name.to_string();
		Ok(device.clone())
	}

	async fn get_active(&self) -> Result<Option<SavedDevice>, RegistryError> {
		Ok(self.state.lock().active().cloned())
	}

	async fn set_active(&self, id: &str) -> Result<(), RegistryError> {
		let mut state = self.state.lock();
		let device = state
			.find_mut(id)
			.ok_or_else(|| RegistryError::NotFound { id: id.to_string() })?;
		device.last_connected_at = Some(Utc::now());
		state.active_device_id = Some(id.to_string());
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn set_active_refreshes_last_connected() {
		let registry = MemoryRegistry::new();
		let device = registry.add("Booth", "http://10.0.0.5:8000").await.unwrap();
		assert!(device.last_connected_at.is_none());

		registry.set_active(&device.id).await.unwrap();

		let active = registry.get_active().await.unwrap().unwrap();
		assert_eq!(active.id, device.id);
		assert!(active.last_connected_at.is_some());
	}

	#[tokio::test]
	async fn unknown_ids_are_not_found() {
		let registry = MemoryRegistry::new();
		assert!(matches!(
			registry.set_active("missing").await,
			Err(RegistryError::NotFound { .. })
		));
		assert!(matches!(
			registry.remove("missing").await,
			Err(RegistryError::NotFound { .. })
		));
	}
}
