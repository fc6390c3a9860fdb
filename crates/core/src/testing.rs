//! Test doubles shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use preke_protocol::{DeviceSource, DiscoveredDevice, SavedDevice};

use crate::backend::DiscoveryBackend;
use crate::error::{DiscoveryError, RegistryError};
use crate::events::{DiscoveryEvent, DiscoveryEvents};
use crate::registry::{DeviceRegistry, MemoryRegistry};

pub(crate) fn discovered(id: &str, host: &str) -> DiscoveredDevice {
	DiscoveredDevice::new(id, format!("Preke {id}"), host, 8000, DeviceSource::Mdns)
}

/// Scripted backend: counts calls and lets tests emit events by hand.
#[derive(Debug, Default)]
pub(crate) struct FakeBackend {
	events: DiscoveryEvents,
	starts: AtomicUsize,
	stops: AtomicUsize,
	probes: AtomicUsize,
	fail_start: AtomicBool,
	fail_stop: AtomicBool,
	probe_result: Mutex<Option<DiscoveredDevice>>,
}

impl FakeBackend {
	pub(crate) fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub(crate) fn starts(&self) -> usize {
		self.starts.load(Ordering::SeqCst)
	}

	pub(crate) fn stops(&self) -> usize {
		self.stops.load(Ordering::SeqCst)
	}

	pub(crate) fn probes(&self) -> usize {
		self.probes.load(Ordering::SeqCst)
	}

	pub(crate) fn set_fail_start(&self, fail: bool) {
		self.fail_start.store(fail, Ordering::SeqCst);
	}

	pub(crate) fn set_fail_stop(&self, fail: bool) {
		self.fail_stop.store(fail, Ordering::SeqCst);
	}

	pub(crate) fn set_probe_result(&self, device: Option<DiscoveredDevice>) {
		*self.probe_result.lock() = device;
	}

	pub(crate) fn emit(&self, event: DiscoveryEvent) {
		self.events.emit(event);
	}
}

#[async_trait]
impl DiscoveryBackend for FakeBackend {
	fn events(&self) -> &DiscoveryEvents {
		&self.events
	}

	async fn start_discovery(&self) -> Result<(), DiscoveryError> {
		if self.fail_start.load(Ordering::SeqCst) {
			return Err(DiscoveryError::StartFailed("scripted failure".into()));
		}
		self.starts.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	async fn stop_discovery(&self) -> Result<(), DiscoveryError> {
		self.stops.fetch_add(1, Ordering::SeqCst);
		if self.fail_stop.load(Ordering::SeqCst) {
			return Err(DiscoveryError::StopFailed("scripted failure".into()));
		}
		Ok(())
	}

	async fn probe(&self, _url: &str) -> Result<Option<DiscoveredDevice>, DiscoveryError> {
		self.probes.fetch_add(1, Ordering::SeqCst);
		Ok(self.probe_result.lock().clone())
	}
}

/// Memory registry whose every call fails while `failing` is set.
#[derive(Debug, Default)]
pub(crate) struct FlakyRegistry {
	inner: MemoryRegistry,
	failing: AtomicBool,
}

impl FlakyRegistry {
	pub(crate) fn with_devices(devices: Vec<SavedDevice>) -> Arc<Self> {
		Arc::new(Self {
			inner: MemoryRegistry::with_devices(devices),
			failing: AtomicBool::new(false),
		})
	}

	pub(crate) fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}

	fn check(&self) -> Result<(), RegistryError> {
		if self.failing.load(Ordering::SeqCst) {
			Err(RegistryError::Unavailable("scripted failure".into()))
		} else {
			Ok(())
		}
	}
}

#[async_trait]
impl DeviceRegistry for FlakyRegistry {
	async fn list(&self) -> Result<Vec<SavedDevice>, RegistryError> {
		self.check()?;
		self.inner.list().await
	}

	async fn add(&self, name: &str, url: &str) -> Result<SavedDevice, RegistryError> {
		self.check()?;
		self.inner.add(name, url).await
	}

	async fn remove(&self, id: &str) -> Result<(), RegistryError> {
		self.check()?;
		self.inner.remove(id).await
	}

	async fn rename(&self, id: &str, name: &str) -> Result<SavedDevice, RegistryError> {
		self.check()?;
		self.inner.rename(id, name).await
	}

	async fn get_active(&self) -> Result<Option<SavedDevice>, RegistryError> {
		self.check()?;
		self.inner.get_active().await
	}

	async fn set_active(&self, id: &str) -> Result<(), RegistryError> {
		self.check()?;
		self.inner.set_active(id).await
	}
}
