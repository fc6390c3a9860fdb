//! preke: device discovery and connection session manager.
//!
//! Locates Preke capture appliances on the local network, reconciles what a
//! scan finds with the devices the user has saved, and tracks which device
//! the rest of the application talks to.
//!
//! ```ignore
//! use std::sync::Arc;
//! use preke::{ApiEndpoint, DiscoverySession, JsonFileRegistry, SessionOptions, SweepBackend, SweepConfig};
//!
//! let backend = Arc::new(SweepBackend::new(SweepConfig::default())?);
//! let registry = Arc::new(JsonFileRegistry::new("devices.json"));
//! let api = Arc::new(ApiEndpoint::new());
//!
//! let session = DiscoverySession::new(backend, registry, api.clone(), SessionOptions::default());
//! session.mount().await?;
//! let mut changes = session.watch();
//! while changes.changed().await.is_ok() {
//!     println!("{:?}", changes.borrow().view());
//! }
//! session.shutdown().await;
//! ```

pub mod backend;
pub mod error;
pub mod events;
pub mod handlers;
pub mod registry;
pub mod scheduler;
pub mod selector;
pub mod session;

#[cfg(test)]
mod testing;

pub use backend::{DiscoveryBackend, SweepBackend, SweepConfig};
pub use error::{DiscoveryError, RegistryError, Result, SessionError};
pub use events::{DiscoveryEvent, DiscoveryEvents};
pub use handlers::{Subscription, SubscriptionSet};
pub use preke_protocol::{
	DeviceSource, DiscoveredDevice, FALLBACK_DEVICE_NAME, InvalidAddress, SavedDevice, normalize_url, parse_address,
};
pub use registry::{DeviceRegistry, JsonFileRegistry, MemoryRegistry};
pub use scheduler::{BackgroundState, ScanScheduler, ScanTiming};
pub use selector::{ApiBaseUrl, ApiEndpoint, ConnectionSelector};
pub use session::{DeviceView, DiscoverySession, ManualOutcome, ScanPhase, SessionOptions, SessionSnapshot, compute_view};
