//! Session state and its single serialized owner.

use std::sync::atomic::{AtomicBool, Ordering};

use preke_protocol::{DiscoveredDevice, SavedDevice};
use serde::Serialize;
use tokio::sync::watch;

use super::view::{DeviceView, compute_view};

/// Scan phase. Foreground and background scanning are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
	#[default]
	Idle,
	/// User-initiated scan with visible progress.
	ForegroundScanning,
	/// Passive scan without progress reporting.
	BackgroundScanning,
}

/// Published session state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
	pub phase: ScanPhase,
	pub saved: Vec<SavedDevice>,
	pub discovered: Vec<DiscoveredDevice>,
	pub active_device_id: Option<String>,
	pub scanning_subnet: Option<String>,
}

impl SessionSnapshot {
	/// Reconciled view of this snapshot.
	pub fn view(&self) -> DeviceView {
		compute_view(&self.saved, &self.discovered)
	}

	/// Number of devices the user could connect to right now.
	pub fn known_devices(&self) -> usize {
		self.saved.len() + self.discovered.len()
	}

	pub fn is_discovered(&self, id: &str) -> bool {
		self.discovered.iter().any(|d| d.id == id)
	}

	/// Appends `device` unless its id is already present. Returns true if added.
	pub(crate) fn merge_discovered(&mut self, device: &DiscoveredDevice) -> bool {
		if self.is_discovered(&device.id) {
			return false;
		}
		self.discovered.push(device.clone());
		true
	}
}

/// Owner of the session state.
///
/// All mutation goes through [`update`](Self::update), which runs under the
/// watch channel's write lock, so updates from event handlers, timers and
/// callers are serialized. Observers are only woken when an update actually
/// changes the snapshot. After [`close`](Self::close) every update is dropped.
#[derive(Debug)]
pub(crate) struct SharedState {
	tx: watch::Sender<SessionSnapshot>,
	closed: AtomicBool,
}

impl SharedState {
	pub(crate) fn new() -> Self {
		let (tx, _rx) = watch::channel(SessionSnapshot::default());
		Self {
			tx,
			closed: AtomicBool::new(false),
		}
	}

	/// Applies `f` and notifies observers if the snapshot changed. Returns
	/// `None` once closed.
	pub(crate) fn update<R>(&self, f: impl FnOnce(&mut SessionSnapshot) -> R) -> Option<R> {
		let mut out = None;
		self.tx.send_if_modified(|state| {
			if self.closed.load(Ordering::Acquire) {
				return false;
			}
			let before = state.clone();
			out = Some(f(state));
			*state != before
		});
		out
	}

	pub(crate) fn read<R>(&self, f: impl FnOnce(&SessionSnapshot) -> R) -> R {
		f(&self.tx.borrow())
	}

	pub(crate) fn snapshot(&self) -> SessionSnapshot {
		self.tx.borrow().clone()
	}

	pub(crate) fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
		self.tx.subscribe()
	}

	/// Stops accepting updates. Waits for an in-progress update to finish.
	pub(crate) fn close(&self) {
		self.tx.send_if_modified(|_| {
			self.closed.store(true, Ordering::Release);
			false
		});
	}

	pub(crate) fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn updates_are_published() {
		let state = SharedState::new();
		let rx = state.subscribe();

		state.update(|s| s.scanning_subnet = Some("10.0.0.0/24".into()));

		assert!(rx.has_changed().unwrap());
		assert_eq!(rx.borrow().scanning_subnet.as_deref(), Some("10.0.0.0/24"));
	}

	#[test]
	fn no_op_updates_do_not_wake_observers() {
		let state = SharedState::new();
		let mut rx = state.subscribe();
		state.update(|s| s.phase = ScanPhase::BackgroundScanning);
		rx.borrow_and_update();

		assert_eq!(state.update(|s| s.phase = ScanPhase::BackgroundScanning), Some(()));
		assert!(!rx.has_changed().unwrap());
	}

	#[test]
	fn closed_state_ignores_updates() {
		let state = SharedState::new();
		state.close();

		assert!(state.update(|s| s.phase = ScanPhase::ForegroundScanning).is_none());
		assert_eq!(state.read(|s| s.phase), ScanPhase::Idle);
		assert!(state.is_closed());
	}
}
