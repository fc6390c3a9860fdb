//! Discovery backend contract and the built-in HTTP sweep backend.

mod sweep;

use async_trait::async_trait;
use preke_protocol::DiscoveredDevice;

pub use sweep::{SweepBackend, SweepConfig, local_subnet, subnet_hosts};

use crate::error::DiscoveryError;
use crate::events::DiscoveryEvents;

/// Platform discovery service.
///
/// Scan results are never returned from [`start_discovery`](Self::start_discovery);
/// they arrive through [`events`](Self::events). Every started scan must end
/// with exactly one `Complete` event, including scans cut short by
/// [`stop_discovery`](Self::stop_discovery).
#[async_trait]
pub trait DiscoveryBackend: Send + Sync {
	/// Event bus this backend reports on.
	fn events(&self) -> &DiscoveryEvents;

	/// Begins a scan. Returning does not mean the scan finished.
	async fn start_discovery(&self) -> Result<(), DiscoveryError>;

	/// Requests the running scan to end early.
	async fn stop_discovery(&self) -> Result<(), DiscoveryError>;

	/// Checks a single endpoint. `Ok(None)` means nothing identifiable answered.
	async fn probe(&self, url: &str) -> Result<Option<DiscoveredDevice>, DiscoveryError>;
}
