//! Error types for discovery, registry and session operations.

use std::path::PathBuf;

use preke_protocol::InvalidAddress;
use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Failures reported by a discovery backend.
#[derive(Debug, Error)]
pub enum DiscoveryError {
	/// The backend refused or failed to start a scan.
	#[error("Failed to start discovery: {0}")]
	StartFailed(String),

	/// The backend failed to stop a running scan.
	#[error("Failed to stop discovery: {0}")]
	StopFailed(String),

	/// A probe could not be issued at all (as opposed to an unreachable device).
	#[error("Probe of {url} failed: {reason}")]
	ProbeFailed { url: String, reason: String },

	/// HTTP client setup or transport failure.
	#[error("Discovery transport error: {0}")]
	Transport(#[from] reqwest::Error),
}

/// Failures reported by a device registry.
#[derive(Debug, Error)]
pub enum RegistryError {
	/// I/O error reading or writing registry storage.
	#[error("Registry I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// Registry storage exists but cannot be parsed.
	#[error("Registry file {} is corrupt: {source}", path.display())]
	Corrupt {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	/// No saved device with this id.
	#[error("No saved device with id '{id}'")]
	NotFound { id: String },

	/// Registry backend cannot be reached.
	#[error("Registry unavailable: {0}")]
	Unavailable(String),
}

/// Errors surfaced to callers of [`DiscoverySession`](crate::DiscoverySession)
/// and [`ConnectionSelector`](crate::ConnectionSelector).
#[derive(Debug, Error)]
pub enum SessionError {
	/// Manual address input failed validation; no network call was made.
	#[error(transparent)]
	InvalidAddress(#[from] InvalidAddress),

	#[error(transparent)]
	Registry(#[from] RegistryError),

	#[error(transparent)]
	Discovery(#[from] DiscoveryError),

	/// A device name was empty or only whitespace.
	#[error("Device name must not be empty")]
	EmptyName,

	/// Referenced device is neither saved nor discovered.
	#[error("Unknown device '{id}'")]
	UnknownDevice { id: String },

	/// The session has been shut down.
	#[error("Discovery session is closed")]
	Closed,
}
