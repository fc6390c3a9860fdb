//! HTTP sweep discovery.
//!
//! Probes configured hostnames and every host of the configured IPv4 subnets
//! with `GET {statusPath}`. Anything answering with a JSON status document is
//! reported as a device.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use ipnetwork::Ipv4Network;
use parking_lot::Mutex;
use preke_protocol::{DeviceSource, DiscoveredDevice, FALLBACK_DEVICE_NAME, normalize_url};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::DiscoveryBackend;
use crate::error::DiscoveryError;
use crate::events::{DiscoveryEvent, DiscoveryEvents};

/// Port Preke appliances serve their API on.
pub const DEFAULT_DEVICE_PORT: u16 = 8000;

/// Status endpoint every appliance answers.
pub const DEFAULT_STATUS_PATH: &str = "/api/status";

/// Sweep settings.
#[derive(Debug, Clone)]
pub struct SweepConfig {
	/// Port probed on every swept host.
	pub port: u16,
	/// Subnets to sweep (`10.0.0` or `10.0.0.0/24`). Empty means the host's own /24.
	pub subnets: Vec<String>,
	/// Hostnames probed before the subnet sweep.
	pub hostnames: Vec<String>,
	pub status_path: String,
	pub probe_timeout: Duration,
	/// Maximum probes in flight per subnet.
	pub concurrency: usize,
}

impl Default for SweepConfig {
	fn default() -> Self {
		Self {
			port: DEFAULT_DEVICE_PORT,
			subnets: Vec::new(),
			hostnames: vec!["preke.local".to_string()],
			status_path: DEFAULT_STATUS_PATH.to_string(),
			probe_timeout: Duration::from_millis(800),
			concurrency: 64,
		}
	}
}

/// Status document served by an appliance.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusInfo {
	#[serde(alias = "deviceId")]
	id: Option<String>,
	name: Option<String>,
	version: Option<String>,
	status: Option<String>,
}

struct ActiveSweep {
	generation: u64,
	cancel: watch::Sender<bool>,
}

/// [`DiscoveryBackend`] that sweeps LAN subnets over HTTP.
pub struct SweepBackend {
	config: Arc<SweepConfig>,
	client: reqwest::Client,
	events: Arc<DiscoveryEvents>,
	active: Arc<Mutex<Option<ActiveSweep>>>,
	next_generation: AtomicU64,
}

impl SweepBackend {
	pub fn new(config: SweepConfig) -> Result<Self, DiscoveryError> {
		let client = reqwest::Client::builder()
			.timeout(config.probe_timeout)
			.no_proxy()
			.build()?;
		Ok(Self {
			config: Arc::new(config),
			client,
			events: Arc::new(DiscoveryEvents::new()),
			active: Arc::new(Mutex::new(None)),
			next_generation: AtomicU64::new(1),
		})
	}

	pub fn config(&self) -> &SweepConfig {
		&self.config
	}

	fn target_subnets(&self) -> Vec<String> {
		if !self.config.subnets.is_empty() {
			return self.config.subnets.clone();
		}
		match local_subnet() {
			Some(subnet) => vec![subnet],
			None => {
				warn!(target = "preke.sweep", "no subnets configured and no local IPv4 address found");
				Vec::new()
			}
		}
	}
}

#[async_trait]
impl DiscoveryBackend for SweepBackend {
	fn events(&self) -> &DiscoveryEvents {
		&self.events
	}

	async fn start_discovery(&self) -> Result<(), DiscoveryError> {
		let (cancel_tx, cancel_rx) = watch::channel(false);
		let generation = {
			let mut active = self.active.lock();
			if active.is_some() {
				debug!(target = "preke.sweep", "sweep already running");
				return Ok(());
			}
			let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
			*active = Some(ActiveSweep {
				generation,
				cancel: cancel_tx,
			});
			generation
		};

		let subnets = self.target_subnets();
		info!(target = "preke.sweep", generation, subnets = ?subnets, "sweep started");
		self.events.emit(DiscoveryEvent::Started);

		let sweep = Sweep {
			config: Arc::clone(&self.config),
			client: self.client.clone(),
			events: Arc::clone(&self.events),
		};
		let active = Arc::clone(&self.active);
		tokio::spawn(async move {
			let found = sweep.run(&subnets, cancel_rx).await;
			{
				let mut active = active.lock();
				if active.as_ref().is_some_and(|a| a.generation == generation) {
					*active = None;
				}
			}
			info!(target = "preke.sweep", generation, found = found.len(), "sweep complete");
			sweep.events.emit(DiscoveryEvent::Complete(found));
		});

		Ok(())
	}

	async fn stop_discovery(&self) -> Result<(), DiscoveryError> {
		match self.active.lock().as_ref() {
			Some(active) => {
				// Receiver is gone once the sweep has finished on its own.
				let _ = active.cancel.send(true);
				debug!(target = "preke.sweep", generation = active.generation, "sweep cancelled");
			}
			None => debug!(target = "preke.sweep", "stop requested with no sweep running"),
		}
		Ok(())
	}

	async fn probe(&self, url: &str) -> Result<Option<DiscoveredDevice>, DiscoveryError> {
		let parsed = Url::parse(url).map_err(|e| DiscoveryError::ProbeFailed {
			url: url.to_string(),
			reason: e.to_string(),
		})?;
		let host = parsed.host_str().ok_or_else(|| DiscoveryError::ProbeFailed {
			url: url.to_string(),
			reason: "missing host".to_string(),
		})?;
		let port = parsed.port_or_known_default().unwrap_or(self.config.port);

		let Some(info) = fetch_status(&self.client, url, &self.config.status_path).await else {
			debug!(target = "preke.sweep", %url, "probe inconclusive");
			return Ok(None);
		};

		let device = device_from_status(info, host, port, DeviceSource::Probe).with_url(normalize_url(url));
		debug!(target = "preke.sweep", %url, id = %device.id, "probe answered");
		Ok(Some(device))
	}
}

struct Sweep {
	config: Arc<SweepConfig>,
	client: reqwest::Client,
	events: Arc<DiscoveryEvents>,
}

impl Sweep {
	async fn run(&self, subnets: &[String], mut cancel: watch::Receiver<bool>) -> Vec<DiscoveredDevice> {
		let mut found = Vec::new();

		for hostname in &self.config.hostnames {
			if *cancel.borrow() {
				return found;
			}
			if let Some(device) = self.probe_host(hostname.clone(), DeviceSource::Hostname).await {
				self.report(&mut found, device);
			}
		}

		for subnet in subnets {
			if *cancel.borrow() {
				break;
			}
			let Some(hosts) = subnet_hosts(subnet) else {
				warn!(target = "preke.sweep", %subnet, "unsupported subnet, skipping");
				continue;
			};

			self.events.emit(DiscoveryEvent::ScanningSubnet(subnet.clone()));
			debug!(target = "preke.sweep", %subnet, hosts = hosts.len(), "sweeping subnet");

			let mut probes = stream::iter(hosts)
				.map(|ip| self.probe_host(ip.to_string(), DeviceSource::Probe))
				.buffer_unordered(self.config.concurrency.max(1));

			loop {
				tokio::select! {
					changed = cancel.changed() => {
						if changed.is_err() || *cancel.borrow() {
							return found;
						}
					}
					next = probes.next() => match next {
						Some(Some(device)) => self.report(&mut found, device),
						Some(None) => {}
						None => break,
					},
				}
			}
		}

		found
	}

	async fn probe_host(&self, host: String, source: DeviceSource) -> Option<DiscoveredDevice> {
		let base = DiscoveredDevice::new("", "", host.as_str(), self.config.port, source);
		let info = fetch_status(&self.client, &base.url, &self.config.status_path).await?;
		Some(device_from_status(info, &host, self.config.port, source))
	}

	fn report(&self, found: &mut Vec<DiscoveredDevice>, device: DiscoveredDevice) {
		if found.iter().any(|d| d.id == device.id) {
			return;
		}
		debug!(target = "preke.sweep", id = %device.id, url = %device.url, "device answered");
		self.events.emit(DiscoveryEvent::DeviceFound(device.clone()));
		found.push(device);
	}
}

async fn fetch_status(client: &reqwest::Client, base_url: &str, status_path: &str) -> Option<StatusInfo> {
	let url = format!("{}{}", normalize_url(base_url), status_path);
	let response = match client.get(&url).send().await {
		Ok(r) => r,
		Err(e) => {
			trace!(target = "preke.sweep", %url, error = %e, "no answer");
			return None;
		}
	};

	if !response.status().is_success() {
		trace!(target = "preke.sweep", %url, status = %response.status(), "unexpected status");
		return None;
	}

	match response.json::<StatusInfo>().await {
		Ok(info) => Some(info),
		Err(e) => {
			debug!(target = "preke.sweep", %url, error = %e, "answer is not a status document");
			None
		}
	}
}

fn device_from_status(info: StatusInfo, host: &str, port: u16, source: DeviceSource) -> DiscoveredDevice {
	let id = info.id.unwrap_or_else(|| format!("{source}:{host}:{port}"));
	let name = info
		.name
		.filter(|n| !n.trim().is_empty())
		.unwrap_or_else(|| FALLBACK_DEVICE_NAME.to_string());

	let mut device = DiscoveredDevice::new(id, name, host, port, source);
	device.status = info.status;
	device.version = info.version;
	device
}

/// Smallest and largest prefix a sweep accepts.
const SWEEP_PREFIXES: std::ops::RangeInclusive<u8> = 22..=30;

/// Expands `a.b.c` or `a.b.c.d` (a /24) or `a.b.c.d/N` (N in 22..=30) into its host
/// addresses, excluding the network and broadcast addresses.
pub fn subnet_hosts(subnet: &str) -> Option<Vec<Ipv4Addr>> {
	let subnet = subnet.trim();
	let cidr = match subnet.split_once('/') {
		Some(_) => subnet.to_string(),
		None => match subnet.split('.').count() {
			3 => format!("{subnet}.0/24"),
			4 => format!("{subnet}/24"),
			_ => return None,
		},
	};

	let network: Ipv4Network = cidr.parse().ok()?;
	if !SWEEP_PREFIXES.contains(&network.prefix()) {
		return None;
	}

	let (first, last) = (network.network(), network.broadcast());
	Some(network.iter().filter(|ip| *ip != first && *ip != last).collect())
}

/// Returns the /24 of the host's primary IPv4 address.
///
/// Connecting a UDP socket only selects a route; nothing is sent.
pub fn local_subnet() -> Option<String> {
	let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
	socket.connect((Ipv4Addr::new(192, 0, 2, 1), 80)).ok()?;
	match socket.local_addr().ok()?.ip() {
		IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => {
			let [a, b, c, _] = ip.octets();
			Some(format!("{a}.{b}.{c}.0/24"))
		}
		_ => None,
	}
}
