//! Active device selection and the API base URL it drives.

use std::sync::Arc;

use chrono::Utc;
use preke_protocol::SavedDevice;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{Result, SessionError};
use crate::registry::DeviceRegistry;
use crate::session::SharedState;

/// Receiver of the active connection endpoint.
///
/// The rest of the application issues its API calls against whatever URL
/// was last published here. `None` means no device is active.
pub trait ApiBaseUrl: Send + Sync {
	fn set_base_url(&self, url: Option<&str>);
}

/// [`ApiBaseUrl`] backed by a watch channel.
#[derive(Debug)]
pub struct ApiEndpoint {
	tx: watch::Sender<Option<String>>,
}

impl Default for ApiEndpoint {
	fn default() -> Self {
		Self::new()
	}
}

impl ApiEndpoint {
	pub fn new() -> Self {
		let (tx, _rx) = watch::channel(None);
		Self { tx }
	}

	pub fn current(&self) -> Option<String> {
		self.tx.borrow().clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
		self.tx.subscribe()
	}
}

impl ApiBaseUrl for ApiEndpoint {
	fn set_base_url(&self, url: Option<&str>) {
		self.tx.send_if_modified(|current| {
			if current.as_deref() == url {
				return false;
			}
			*current = url.map(str::to_string);
			true
		});
	}
}

/// Commits a device choice to the registry and publishes its endpoint.
pub struct ConnectionSelector {
	registry: Arc<dyn DeviceRegistry>,
	state: Arc<SharedState>,
	api: Arc<dyn ApiBaseUrl>,
}

impl ConnectionSelector {
	pub(crate) fn new(registry: Arc<dyn DeviceRegistry>, state: Arc<SharedState>, api: Arc<dyn ApiBaseUrl>) -> Self {
		Self { registry, state, api }
	}

	/// Makes `id` the active device.
	///
	/// The registry is written first. If that fails the error is returned and
	/// the in-memory active device and published URL stay as they were.
	pub async fn select(&self, id: &str) -> Result<SavedDevice> {
		let device = self.lookup(id).await?;

		if let Err(e) = self.registry.set_active(id).await {
			warn!(target = "preke.selector", %id, error = %e, "failed to persist active device");
			return Err(e.into());
		}

		let now = Utc::now();
		let device = SavedDevice {
			last_connected_at: Some(now),
			..device
		};
		self.state.update(|s| {
			s.active_device_id = Some(device.id.clone());
			match s.saved.iter_mut().find(|d| d.id == device.id) {
				Some(saved) => saved.last_connected_at = Some(now),
				None => s.saved.push(device.clone()),
			}
		});
		self.api.set_base_url(Some(&device.url));

		info!(target = "preke.selector", id = %device.id, url = %device.url, "active device selected");
		Ok(device)
	}

	/// Publishes `url` without touching the registry.
	pub(crate) fn publish(&self, url: Option<&str>) {
		self.api.set_base_url(url);
	}

	async fn lookup(&self, id: &str) -> Result<SavedDevice> {
		let cached = self.state.read(|s| s.saved.iter().find(|d| d.id == id).cloned());
		if let Some(device) = cached {
			return Ok(device);
		}

		self.registry
			.list()
			.await?
			.into_iter()
			.find(|d| d.id == id)
			.ok_or_else(|| SessionError::UnknownDevice { id: id.to_string() })
	}
}

impl std::fmt::Debug for ConnectionSelector {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConnectionSelector").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::FlakyRegistry;

	fn selector(registry: Arc<FlakyRegistry>) -> (ConnectionSelector, Arc<SharedState>, Arc<ApiEndpoint>) {
		let state = Arc::new(SharedState::new());
		let api = Arc::new(ApiEndpoint::new());
		let selector = ConnectionSelector::new(registry, Arc::clone(&state), api.clone());
		(selector, state, api)
	}

	#[tokio::test]
	async fn select_persists_and_publishes() {
		let booth = SavedDevice::new("Booth", "http://10.0.0.5:8000");
		let registry = FlakyRegistry::with_devices(vec![booth.clone()]);
		let (selector, state, api) = selector(Arc::clone(&registry));
		let mut urls = api.subscribe();

		let selected = selector.select(&booth.id).await.unwrap();

		assert!(selected.last_connected_at.is_some());
		assert_eq!(state.read(|s| s.active_device_id.clone()), Some(booth.id.clone()));
		assert!(urls.has_changed().unwrap());
		assert_eq!(urls.borrow_and_update().as_deref(), Some("http://10.0.0.5:8000"));
		assert_eq!(registry.get_active().await.unwrap().unwrap().id, booth.id);
	}

	#[tokio::test]
	async fn failed_set_active_leaves_selection_unchanged() {
		let booth = SavedDevice::new("Booth", "http://10.0.0.5:8000");
		let stage = SavedDevice::new("Stage", "http://10.0.0.6:8000");
		let registry = FlakyRegistry::with_devices(vec![booth.clone(), stage.clone()]);
		let (selector, state, api) = selector(Arc::clone(&registry));
		selector.select(&booth.id).await.unwrap();

		registry.set_failing(true);
		let err = selector.select(&stage.id).await.unwrap_err();

		assert!(matches!(err, SessionError::Registry(_)));
		assert_eq!(state.read(|s| s.active_device_id.clone()), Some(booth.id));
		assert_eq!(api.current().as_deref(), Some("http://10.0.0.5:8000"));
	}

	#[tokio::test]
	async fn unknown_device_is_rejected() {
		let registry = FlakyRegistry::with_devices(Vec::new());
		let (selector, state, api) = selector(registry);

		let err = selector.select("missing").await.unwrap_err();

		assert!(matches!(err, SessionError::UnknownDevice { .. }));
		assert!(state.read(|s| s.active_device_id.is_none()));
		assert!(api.current().is_none());
	}
}
