//! Device address normalization and validation.
//!
//! Two rules are shared by every layer:
//!
//! * [`normalize_url`] is the comparison form: a device URL with and without a
//!   trailing slash is the same device.
//! * [`parse_address`] turns free-form manual input (`192.168.1.50`,
//!   `preke.local:8000`, `https://studio.example`) into a connection endpoint
//!   made of scheme, host and port.

use thiserror::Error;
use url::Url;

/// Manual address input that cannot be used as a device endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid device address '{input}': {reason}")]
pub struct InvalidAddress {
	pub input: String,
	pub reason: String,
}

impl InvalidAddress {
	fn new(input: &str, reason: impl Into<String>) -> Self {
		Self {
			input: input.to_string(),
			reason: reason.into(),
		}
	}
}

/// Returns the comparison form of a device URL.
pub fn normalize_url(url: &str) -> &str {
	url.trim().trim_end_matches('/')
}

/// Parses manual address input into a normalized `scheme://host[:port]` endpoint.
///
/// Input without a scheme defaults to `http://`. Paths, queries and fragments
/// are dropped; only `http` and `https` are accepted.
pub fn parse_address(raw: &str) -> Result<String, InvalidAddress> {
	let trimmed = raw.trim();
	if trimmed.is_empty() {
		return Err(InvalidAddress::new(raw, "address is empty"));
	}

	let candidate = if trimmed.contains("://") {
		trimmed.to_string()
	} else {
		format!("http://{trimmed}")
	};

	let url = Url::parse(&candidate).map_err(|e| InvalidAddress::new(raw, e.to_string()))?;

	match url.scheme() {
		"http" | "https" => {}
		other => return Err(InvalidAddress::new(raw, format!("unsupported scheme '{other}'"))),
	}

	let host = url
		.host_str()
		.filter(|h| !h.is_empty())
		.ok_or_else(|| InvalidAddress::new(raw, "missing host"))?;

	let mut endpoint = format!("{}://{}", url.scheme(), host);
	if let Some(port) = url.port() {
		endpoint.push_str(&format!(":{port}"));
	}
	Ok(endpoint)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalize_strips_trailing_slash() {
		assert_eq!(normalize_url("http://10.0.0.5:8000/"), "http://10.0.0.5:8000");
		assert_eq!(normalize_url("http://10.0.0.5:8000"), "http://10.0.0.5:8000");
		assert_ne!(normalize_url("http://10.0.0.5:8000"), normalize_url("http://10.0.0.5:8001"));
	}

	#[test]
	fn bare_ip_defaults_to_http() {
		assert_eq!(parse_address("192.168.1.50").unwrap(), "http://192.168.1.50");
	}

	#[test]
	fn port_is_retained_and_path_dropped() {
		assert_eq!(
			parse_address(" preke.local:8000/api/status ").unwrap(),
			"http://preke.local:8000"
		);
		assert_eq!(parse_address("https://studio.example/").unwrap(), "https://studio.example");
	}

	#[test]
	fn default_port_is_not_repeated() {
		assert_eq!(parse_address("http://10.0.0.9:80").unwrap(), "http://10.0.0.9");
	}

	#[test]
	fn rejects_empty_and_garbage() {
		assert!(parse_address("").is_err());
		assert!(parse_address("   ").is_err());
		assert!(parse_address("http://").is_err());
		assert!(parse_address("not a host").is_err());
	}

	#[test]
	fn rejects_unsupported_scheme() {
		let err = parse_address("ftp://10.0.0.5").unwrap_err();
		assert!(err.reason.contains("ftp"), "reason was {}", err.reason);
	}
}
