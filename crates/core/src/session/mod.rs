//! The discovery session: one reconciled view over saved and discovered devices.

mod state;
mod view;

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use preke_protocol::{DiscoveredDevice, FALLBACK_DEVICE_NAME, SavedDevice, parse_address};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub(crate) use state::SharedState;
pub use state::{ScanPhase, SessionSnapshot};
pub use view::{DeviceView, compute_view};

use crate::backend::DiscoveryBackend;
use crate::error::{DiscoveryError, Result, SessionError};
use crate::handlers::SubscriptionSet;
use crate::registry::DeviceRegistry;
use crate::scheduler::{BackgroundState, ScanScheduler, ScanTiming};
use crate::selector::{ApiBaseUrl, ConnectionSelector};

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
	pub timing: ScanTiming,
	/// Name given to manually added devices when none is supplied.
	pub fallback_name: String,
}

impl Default for SessionOptions {
	fn default() -> Self {
		Self {
			timing: ScanTiming::default(),
			fallback_name: FALLBACK_DEVICE_NAME.to_string(),
		}
	}
}

/// Result of [`DiscoverySession::add_manual`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualOutcome {
	/// The probe identified a device; it joined the discovered list.
	Discovered(DiscoveredDevice),
	/// The probe was inconclusive; the address was saved as-is.
	Saved(SavedDevice),
}

/// State and scheduler shared with the event handlers.
struct SessionCore {
	state: Arc<SharedState>,
	scheduler: ScanScheduler,
}

impl SessionCore {
	fn on_started(&self) {
		let promoted = self.state.update(|s| {
			if s.phase == ScanPhase::Idle {
				s.phase = ScanPhase::BackgroundScanning;
				true
			} else {
				false
			}
		});
		debug!(target = "preke.session", background = ?promoted, "discovery started");
	}

	fn on_device_found(&self, device: &DiscoveredDevice) {
		let Some(added) = self.state.update(|s| {
			let added = s.merge_discovered(device);
			if added && s.phase == ScanPhase::BackgroundScanning {
				s.phase = ScanPhase::ForegroundScanning;
			}
			added
		}) else {
			return;
		};

		if added {
			debug!(
				target = "preke.session",
				id = %device.id,
				url = %device.url,
				source = %device.source,
				"device discovered"
			);
			self.scheduler.disarm_background();
		}
	}

	fn on_scanning_subnet(&self, subnet: &str) {
		self.state.update(|s| {
			if s.phase == ScanPhase::ForegroundScanning {
				s.scanning_subnet = Some(subnet.to_string());
			}
		});
	}

	fn on_complete(&self, devices: &[DiscoveredDevice]) {
		let Some((merged, known)) = self.state.update(|s| {
			s.phase = ScanPhase::Idle;
			s.scanning_subnet = None;
			let merged = devices.iter().filter(|d| s.merge_discovered(d)).count();
			(merged, s.known_devices())
		}) else {
			return;
		};

		info!(
			target = "preke.session",
			reported = devices.len(),
			merged,
			known,
			"discovery complete"
		);
		if known > 0 {
			self.scheduler.disarm_background();
		}
	}
}

/// Single owner of discovery state for one consumer.
///
/// Subscribes to the backend's events, merges them with the device registry,
/// drives the [`ScanScheduler`], and publishes every change as a
/// [`SessionSnapshot`]. Event handlers never fail: backend and registry errors
/// are logged and leave the previous state in place.
pub struct DiscoverySession {
	core: Arc<SessionCore>,
	backend: Arc<dyn DiscoveryBackend>,
	registry: Arc<dyn DeviceRegistry>,
	selector: ConnectionSelector,
	options: SessionOptions,
	subscriptions: Mutex<SubscriptionSet>,
}

impl DiscoverySession {
	pub fn new(
		backend: Arc<dyn DiscoveryBackend>,
		registry: Arc<dyn DeviceRegistry>,
		api: Arc<dyn ApiBaseUrl>,
		options: SessionOptions,
	) -> Self {
		let state = Arc::new(SharedState::new());
		let scheduler = ScanScheduler::new(Arc::clone(&backend), Arc::clone(&state), options.timing);
		let selector = ConnectionSelector::new(Arc::clone(&registry), Arc::clone(&state), api);

		Self {
			core: Arc::new(SessionCore { state, scheduler }),
			backend,
			registry,
			selector,
			options,
			subscriptions: Mutex::new(SubscriptionSet::new()),
		}
	}

	/// Subscribes to the four discovery events. No-op when already attached.
	pub fn attach(&self) {
		let mut subscriptions = self.subscriptions.lock();
		if !subscriptions.is_empty() || self.core.state.is_closed() {
			return;
		}

		let events = self.backend.events();

		let core = Arc::downgrade(&self.core);
		subscriptions.push(events.on_discovery_started(move || {
			with_core(&core, |c| c.on_started());
		}));

		let core = Arc::downgrade(&self.core);
		subscriptions.push(events.on_device_discovered(move |device| {
			with_core(&core, |c| c.on_device_found(device));
		}));

		let core = Arc::downgrade(&self.core);
		subscriptions.push(events.on_scanning_subnet(move |subnet| {
			with_core(&core, |c| c.on_scanning_subnet(subnet));
		}));

		let core = Arc::downgrade(&self.core);
		subscriptions.push(events.on_discovery_complete(move |devices| {
			with_core(&core, |c| c.on_complete(devices));
		}));

		debug!(target = "preke.session", "listeners attached");
	}

	/// Attaches listeners, loads the registry, starts a foreground scan and
	/// arms background scanning.
	///
	/// A registry failure is logged and does not stop the scan.
	pub async fn mount(&self) -> Result<()> {
		self.ensure_open()?;
		self.attach();
		if let Err(e) = self.reload_saved().await {
			warn!(target = "preke.session", error = %e, "continuing without saved devices");
		}
		self.start_foreground().await;
		self.arm_background();
		Ok(())
	}

	/// Reloads saved devices and the active pointer from the registry and
	/// publishes the active device's URL. On failure the previous state is kept.
	pub async fn reload_saved(&self) -> Result<()> {
		let saved = self.registry.list().await.inspect_err(|e| {
			warn!(target = "preke.session", error = %e, "failed to list saved devices");
		})?;
		let active = self.registry.get_active().await.inspect_err(|e| {
			warn!(target = "preke.session", error = %e, "failed to read active device");
		})?;

		let active_id = active.as_ref().map(|d| d.id.clone());
		let Some(has_saved) = self.core.state.update(|s| {
			s.saved = saved;
			s.active_device_id = active_id;
			!s.saved.is_empty()
		}) else {
			return Err(SessionError::Closed);
		};

		self.selector.publish(active.as_ref().map(|d| d.url.as_str()));
		if has_saved {
			self.core.scheduler.disarm_background();
		}
		Ok(())
	}

	/// See [`ScanScheduler::start_foreground`].
	pub async fn start_foreground(&self) -> bool {
		self.core.scheduler.start_foreground().await
	}

	/// See [`ScanScheduler::stop_foreground`].
	pub async fn stop_foreground(&self) -> std::result::Result<(), DiscoveryError> {
		self.core.scheduler.stop_foreground().await
	}

	pub fn arm_background(&self) {
		if self.core.state.is_closed() {
			return;
		}
		self.core.scheduler.arm_background();
	}

	pub fn disarm_background(&self) {
		self.core.scheduler.disarm_background();
	}

	/// Adds a device from a typed address.
	///
	/// Invalid input fails before any network call. A successful probe routes
	/// the device through the discovered path; an inconclusive probe saves the
	/// address under `name` or the fallback name. Only registry failures on
	/// that save are returned.
	pub async fn add_manual(&self, raw: &str, name: Option<&str>) -> Result<ManualOutcome> {
		let url = parse_address(raw)?;
		self.ensure_open()?;

		match self.backend.probe(&url).await {
			Ok(Some(device)) => {
				info!(target = "preke.session", id = %device.id, %url, "manual address answered probe");
				self.core.on_device_found(&device);
				return Ok(ManualOutcome::Discovered(device));
			}
			Ok(None) => {
				debug!(target = "preke.session", %url, "probe inconclusive; saving address");
			}
			Err(e) => {
				warn!(target = "preke.session", %url, error = %e, "probe failed; saving address");
			}
		}

		let name = name
			.map(str::trim)
			.filter(|n| !n.is_empty())
			.unwrap_or(self.options.fallback_name.as_str());
		let device = self.save(name, &url).await?;
		Ok(ManualOutcome::Saved(device))
	}

	/// Persists a discovered device under its own name or `name`.
	pub async fn save_discovered(&self, id: &str, name: Option<&str>) -> Result<SavedDevice> {
		self.ensure_open()?;
		let device = self
			.core
			.state
			.read(|s| s.discovered.iter().find(|d| d.id == id).cloned())
			.ok_or_else(|| SessionError::UnknownDevice { id: id.to_string() })?;

		self.save(name.unwrap_or(device.name.as_str()), &device.url).await
	}

	/// Deletes a saved device. Callers confirm with the user first.
	pub async fn remove_saved(&self, id: &str) -> Result<()> {
		self.ensure_open()?;
		self.registry.remove(id).await.inspect_err(|e| {
			warn!(target = "preke.session", %id, error = %e, "failed to remove device");
		})?;

		let was_active = self
			.core
			.state
			.update(|s| {
				s.saved.retain(|d| d.id != id);
				let was_active = s.active_device_id.as_deref() == Some(id);
				if was_active {
					s.active_device_id = None;
				}
				was_active
			})
			.unwrap_or(false);

		if was_active {
			self.selector.publish(None);
		}
		info!(target = "preke.session", %id, "saved device removed");
		Ok(())
	}

	/// Renames a saved device. The name is trimmed and must not be empty.
	pub async fn rename_saved(&self, id: &str, name: &str) -> Result<SavedDevice> {
		self.ensure_open()?;
		let name = name.trim();
		if name.is_empty() {
			return Err(SessionError::EmptyName);
		}
		let renamed = self.registry.rename(id, name).await.inspect_err(|e| {
			warn!(target = "preke.session", %id, error = %e, "failed to rename device");
		})?;

		self.core.state.update(|s| {
			if let Some(device) = s.saved.iter_mut().find(|d| d.id == id) {
				device.name = renamed.name.clone();
			}
		});
		Ok(renamed)
	}

	/// See [`ConnectionSelector::select`].
	pub async fn select(&self, id: &str) -> Result<SavedDevice> {
		self.ensure_open()?;
		self.selector.select(id).await
	}

	pub fn selector(&self) -> &ConnectionSelector {
		&self.selector
	}

	pub fn snapshot(&self) -> SessionSnapshot {
		self.core.state.snapshot()
	}

	pub fn view(&self) -> DeviceView {
		self.core.state.read(SessionSnapshot::view)
	}

	/// Receiver notified on every state change.
	pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
		self.core.state.subscribe()
	}

	pub fn phase(&self) -> ScanPhase {
		self.core.state.read(|s| s.phase)
	}

	pub fn active_device_id(&self) -> Option<String> {
		self.core.state.read(|s| s.active_device_id.clone())
	}

	pub fn scanning_subnet(&self) -> Option<String> {
		self.core.state.read(|s| s.scanning_subnet.clone())
	}

	pub fn background_state(&self) -> BackgroundState {
		self.core.scheduler.background_state()
	}

	pub fn is_closed(&self) -> bool {
		self.core.state.is_closed()
	}

	/// Tears the session down.
	///
	/// Unsubscribes every listener, disarms background scanning and stops an
	/// in-flight foreground scan. Each step runs even if an earlier one fails.
	/// Afterwards no event or timer changes the state. Idempotent.
	pub async fn shutdown(&self) {
		let was_foreground = self.phase() == ScanPhase::ForegroundScanning;
		if self.core.state.is_closed() {
			return;
		}
		self.core.state.close();

		let released = self.subscriptions.lock().dispose_all();
		self.core.scheduler.disarm_background();
		self.core.scheduler.cancel_watchdog();

		if was_foreground {
			if let Err(e) = self.backend.stop_discovery().await {
				warn!(target = "preke.session", error = %e, "failed to stop scan during shutdown");
			}
		}

		info!(target = "preke.session", listeners = released, "session shut down");
	}

	fn ensure_open(&self) -> Result<()> {
		if self.core.state.is_closed() {
			Err(SessionError::Closed)
		} else {
			Ok(())
		}
	}

	async fn save(&self, name: &str, url: &str) -> Result<SavedDevice> {
		let device = self.registry.add(name, url).await.inspect_err(|e| {
			warn!(target = "preke.session", %url, error = %e, "failed to save device");
		})?;

		self.core.state.update(|s| s.saved.push(device.clone()));
		self.core.scheduler.disarm_background();
		info!(target = "preke.session", id = %device.id, %url, "device saved");
		Ok(device)
	}
}

impl std::fmt::Debug for DiscoverySession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DiscoverySession")
			.field("phase", &self.phase())
			.field("background", &self.background_state())
			.field("closed", &self.is_closed())
			.finish_non_exhaustive()
	}
}

fn with_core(core: &Weak<SessionCore>, f: impl FnOnce(&SessionCore)) {
	if let Some(core) = core.upgrade() {
		f(&core);
	}
}
