//! File storage for the device registry.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use preke_protocol::{REGISTRY_SCHEMA_VERSION, RegistryFile, SavedDevice};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::DeviceRegistry;
use crate::error::RegistryError;

/// [`DeviceRegistry`] persisted as one JSON document.
///
/// Every operation re-reads the file so edits made by another process are
/// picked up. Writes go to a sibling temp file first and are renamed into
/// place. A missing file is an empty registry; an unparsable one is an error
/// and is never overwritten.
#[derive(Debug)]
pub struct JsonFileRegistry {
	path: PathBuf,
	lock: Mutex<()>,
}

impl JsonFileRegistry {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			lock: Mutex::new(()),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn load(&self) -> Result<RegistryFile, RegistryError> {
		let content = match fs::read_to_string(&self.path).await {
			Ok(content) => content,
			Err(e) if e.kind() == ErrorKind::NotFound => {
				debug!(target = "preke.registry", path = %self.path.display(), "no registry file yet");
				return Ok(RegistryFile::new());
			}
			Err(e) => return Err(e.into()),
		};

		serde_json::from_str(&content).map_err(|source| RegistryError::Corrupt {
			path: self.path.clone(),
			source,
		})
	}

	async fn save(&self, registry: &mut RegistryFile) -> Result<(), RegistryError> {
		registry.schema = REGISTRY_SCHEMA_VERSION;
		if let Some(parent) = self.path.parent() {
			if !parent.as_os_str().is_empty() {
				fs::create_dir_all(parent).await?;
			}
		}

		let payload = serde_json::to_string_pretty(registry).map_err(|source| RegistryError::Corrupt {
			path: self.path.clone(),
			source,
		})?;

		replace_file(&self.path, payload.as_bytes()).await?;
		Ok(())
	}

	/// Loads, applies `f`, and saves if `f` succeeded.
	async fn modify<T>(
		&self,
		f: impl FnOnce(&mut RegistryFile) -> Result<T, RegistryError>,
	) -> Result<T, RegistryError> {
		let _guard = self.lock.lock().await;
		let mut registry = self.load().await?;
		let out = f(&mut registry)?;
		self.save(&mut registry).await?;
		Ok(out)
	}
}

#[async_trait]
impl DeviceRegistry for JsonFileRegistry {
	async fn list(&self) -> Result<Vec<SavedDevice>, RegistryError> {
		let _guard = self.lock.lock().await;
		Ok(self.load().await?.devices)
	}

	async fn add(&self, name: &str, url: &str) -> Result<SavedDevice, RegistryError> {
		let device = SavedDevice::new(name, url);
		let stored = device.clone();
		self.modify(move |registry| {
			registry.devices.push(stored);
			Ok(())
		})
		.await?;
		info!(target = "preke.registry", id = %device.id, url = %device.url, "device saved");
		Ok(device)
	}

	async fn remove(&self, id: &str) -> Result<(), RegistryError> {
		self.modify(|registry| {
			if registry.remove(id) {
				Ok(())
			} else {
				Err(RegistryError::NotFound { id: id.to_string() })
			}
		})
		.await?;
		info!(target = "preke.registry", %id, "device removed");
		Ok(())
	}

	async fn rename(&self, id: &str, name: &str) -> Result<SavedDevice, RegistryError> {
		self.modify(|registry| {
			let device = registry
				.find_mut(id)
				.ok_or_else(|| RegistryError::NotFound { id: id.to_string() })?;
			device.name = name.to_string();
			Ok(device.clone())
		})
		.await
	}

	async fn get_active(&self) -> Result<Option<SavedDevice>, RegistryError> {
		let _guard = self.lock.lock().await;
		Ok(self.load().await?.active().cloned())
	}

	async fn set_active(&self, id: &str) -> Result<(), RegistryError> {
		self.modify(|registry| {
			let device = registry
				.find_mut(id)
				.ok_or_else(|| RegistryError::NotFound { id: id.to_string() })?;
			device.last_connected_at = Some(Utc::now());
			registry.active_device_id = Some(id.to_string());
			Ok(())
		})
		.await
	}
}

/// Writes `contents` to a sibling temp file and renames it over `path`.
/// The temp file is removed if the rename fails.
async fn replace_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
	let tmp = path.with_extension("json.tmp");
	fs::write(&tmp, contents).await?;
	if let Err(e) = fs::rename(&tmp, path).await {
		if let Err(cleanup) = fs::remove_file(&tmp).await {
			warn!(target = "preke.registry", path = %tmp.display(), error = %cleanup, "failed to remove temp file");
		}
		return Err(e);
	}
	Ok(())
}
