//! Discovery event bus.
//!
//! A discovery backend owns one [`DiscoveryEvents`] and reports scan progress
//! through [`emit`](DiscoveryEvents::emit). Consumers register listeners per
//! event kind and keep the returned [`Subscription`]s until teardown.

use std::sync::Arc;

use preke_protocol::DiscoveredDevice;

use crate::handlers::{HandlerMap, Subscription, dispatch, handler_map, register};

/// Scan lifecycle event emitted by a discovery backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
	/// A scan (foreground or background) began.
	Started,
	/// A device answered. May fire any number of times per scan, in any order.
	DeviceFound(DiscoveredDevice),
	/// Advisory progress: the subnet currently being probed.
	ScanningSubnet(String),
	/// Fired once per scan with the backend's authoritative device list.
	Complete(Vec<DiscoveredDevice>),
}

/// Typed listener registry for the four discovery events.
pub struct DiscoveryEvents {
	started: HandlerMap<()>,
	device_found: HandlerMap<DiscoveredDevice>,
	scanning_subnet: HandlerMap<str>,
	complete: HandlerMap<[DiscoveredDevice]>,
}

impl Default for DiscoveryEvents {
	fn default() -> Self {
		Self::new()
	}
}

impl DiscoveryEvents {
	pub fn new() -> Self {
		Self {
			started: handler_map(),
			device_found: handler_map(),
			scanning_subnet: handler_map(),
			complete: handler_map(),
		}
	}

	pub fn on_discovery_started<F>(&self, handler: F) -> Subscription
	where
		F: Fn() + Send + Sync + 'static,
	{
		register(&self.started, Arc::new(move |_: &()| handler()))
	}

	pub fn on_device_discovered<F>(&self, handler: F) -> Subscription
	where
		F: Fn(&DiscoveredDevice) + Send + Sync + 'static,
	{
		register(&self.device_found, Arc::new(handler))
	}

	pub fn on_scanning_subnet<F>(&self, handler: F) -> Subscription
	where
		F: Fn(&str) + Send + Sync + 'static,
	{
		register(&self.scanning_subnet, Arc::new(handler))
	}

	pub fn on_discovery_complete<F>(&self, handler: F) -> Subscription
	where
		F: Fn(&[DiscoveredDevice]) + Send + Sync + 'static,
	{
		register(&self.complete, Arc::new(handler))
	}

	/// Delivers `event` to every listener of its kind.
	pub fn emit(&self, event: DiscoveryEvent) {
		match event {
			DiscoveryEvent::Started => dispatch(&self.started, &()),
			DiscoveryEvent::DeviceFound(device) => dispatch(&self.device_found, &device),
			DiscoveryEvent::ScanningSubnet(subnet) => dispatch(&self.scanning_subnet, subnet.as_str()),
			DiscoveryEvent::Complete(devices) => dispatch(&self.complete, devices.as_slice()),
		}
	}

	/// Total number of registered listeners across all event kinds.
	pub fn listener_count(&self) -> usize {
		self.started.lock().len()
			+ self.device_found.lock().len()
			+ self.scanning_subnet.lock().len()
			+ self.complete.lock().len()
	}
}

impl std::fmt::Debug for DiscoveryEvents {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DiscoveryEvents")
			.field("listeners", &self.listener_count())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use parking_lot::Mutex;
	use preke_protocol::DeviceSource;

	use super::*;

	fn device(id: &str) -> DiscoveredDevice {
		DiscoveredDevice::new(id, "Studio", "10.0.0.9", 8000, DeviceSource::Probe)
	}

	#[test]
	fn events_reach_matching_listeners_only() {
		let bus = DiscoveryEvents::new();
		let log = Arc::new(Mutex::new(Vec::<String>::new()));

		let l = Arc::clone(&log);
		let _a = bus.on_discovery_started(move || l.lock().push("started".into()));
		let l = Arc::clone(&log);
		let _b = bus.on_device_discovered(move |d| l.lock().push(format!("found:{}", d.id)));
		let l = Arc::clone(&log);
		let _c = bus.on_scanning_subnet(move |s| l.lock().push(format!("subnet:{s}")));
		let l = Arc::clone(&log);
		let _d = bus.on_discovery_complete(move |ds| l.lock().push(format!("complete:{}", ds.len())));

		bus.emit(DiscoveryEvent::Started);
		bus.emit(DiscoveryEvent::ScanningSubnet("10.0.0.0/24".into()));
		bus.emit(DiscoveryEvent::DeviceFound(device("d1")));
		bus.emit(DiscoveryEvent::Complete(vec![device("d1"), device("d2")]));

		assert_eq!(
			*log.lock(),
			vec!["started", "subnet:10.0.0.0/24", "found:d1", "complete:2"]
		);
	}

	#[test]
	fn unsubscribed_listeners_are_not_called() {
		let bus = DiscoveryEvents::new();
		let hits = Arc::new(Mutex::new(0));

		let h = Arc::clone(&hits);
		let mut sub = bus.on_device_discovered(move |_| *h.lock() += 1);
		assert_eq!(bus.listener_count(), 1);

		bus.emit(DiscoveryEvent::DeviceFound(device("d1")));
		sub.unsubscribe();
		bus.emit(DiscoveryEvent::DeviceFound(device("d2")));

		assert_eq!(*hits.lock(), 1);
		assert_eq!(bus.listener_count(), 0);
	}
}
