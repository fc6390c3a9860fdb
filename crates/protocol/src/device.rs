//! Device records: [`SavedDevice`] and [`DiscoveredDevice`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display name used when neither the user nor the device supplied one.
pub const FALLBACK_DEVICE_NAME: &str = "Preke Device";

/// How a device was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSource {
	/// Multicast DNS service announcement.
	Mdns,
	/// Active HTTP probe of an address.
	Probe,
	/// Well-known hostname resolution.
	Hostname,
}

impl DeviceSource {
	pub fn as_str(self) -> &'static str {
		match self {
			DeviceSource::Mdns => "mdns",
			DeviceSource::Probe => "probe",
			DeviceSource::Hostname => "hostname",
		}
	}
}

impl std::fmt::Display for DeviceSource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A device produced by a scan.
///
/// `id` is only unique within a scan; use [`url`](Self::url) to correlate
/// with persisted devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredDevice {
	pub id: String,
	pub name: String,
	pub host: String,
	pub port: u16,
	pub url: String,
	pub source: DeviceSource,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
}

impl DiscoveredDevice {
	/// Creates a device whose URL is derived as `http://host:port`.
	pub fn new(
		id: impl Into<String>,
		name: impl Into<String>,
		host: impl Into<String>,
		port: u16,
		source: DeviceSource,
	) -> Self {
		let host = host.into();
		let url = http_url(&host, port);
		Self {
			id: id.into(),
			name: name.into(),
			host,
			port,
			url,
			source,
			status: None,
			version: None,
		}
	}

	/// Overrides the derived URL (e.g. for devices reached over https).
	pub fn with_url(mut self, url: impl Into<String>) -> Self {
		self.url = url.into();
		self
	}

	pub fn with_status(mut self, status: impl Into<String>) -> Self {
		self.status = Some(status.into());
		self
	}

	pub fn with_version(mut self, version: impl Into<String>) -> Self {
		self.version = Some(version.into());
		self
	}
}

fn http_url(host: &str, port: u16) -> String {
	if host.contains(':') && !host.starts_with('[') {
		format!("http://[{host}]:{port}")
	} else {
		format!("http://{host}:{port}")
	}
}

/// A user-confirmed device stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDevice {
	pub id: String,
	pub name: String,
	pub url: String,
	pub created_at: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_connected_at: Option<DateTime<Utc>>,
}

impl SavedDevice {
	/// Creates a new record with a fresh id and `created_at = now`.
	pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			name: name.into(),
			url: url.into(),
			created_at: Utc::now(),
			last_connected_at: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn discovered_url_is_derived_from_host_and_port() {
		let device = DiscoveredDevice::new("d1", "Studio", "10.0.0.9", 8000, DeviceSource::Probe);
		assert_eq!(device.url, "http://10.0.0.9:8000");

		let v6 = DiscoveredDevice::new("d2", "Studio", "fe80::1", 8000, DeviceSource::Mdns);
		assert_eq!(v6.url, "http://[fe80::1]:8000");
	}

	#[test]
	fn source_serializes_lowercase() {
		let json = serde_json::to_string(&DeviceSource::Hostname).unwrap();
		assert_eq!(json, "\"hostname\"");
		let parsed: DeviceSource = serde_json::from_str("\"mdns\"").unwrap();
		assert_eq!(parsed, DeviceSource::Mdns);
	}

	#[test]
	fn saved_device_uses_registry_schema_field_names() {
		let device = SavedDevice::new("Booth A", "http://10.0.0.5:8000");
		let value = serde_json::to_value(&device).unwrap();
		assert!(value.get("createdAt").is_some());
		assert!(value.get("lastConnectedAt").is_none());
		assert_eq!(value["url"], "http://10.0.0.5:8000");
	}

	#[test]
	fn saved_device_ids_are_unique() {
		let a = SavedDevice::new("a", "http://a");
		let b = SavedDevice::new("b", "http://b");
		assert_ne!(a.id, b.id);
	}
}
