//! Device registry contract and implementations.
//!
//! * [`JsonFileRegistry`]: durable registry stored as a single JSON document
//! * [`MemoryRegistry`]: process-local registry for embedding and tests

mod file;
mod memory;

use async_trait::async_trait;
use preke_protocol::SavedDevice;

pub use file::JsonFileRegistry;
pub use memory::MemoryRegistry;

use crate::error::RegistryError;

/// Persisted collection of user-confirmed devices.
///
/// Ids are unique; URLs are not enforced unique here (the session
/// de-duplicates by URL when building its view). Any call may fail.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
	async fn list(&self) -> Result<Vec<SavedDevice>, RegistryError>;

	/// Stores a new device with a fresh id and `createdAt = now`.
	async fn add(&self, name: &str, url: &str) -> Result<SavedDevice, RegistryError>;

	/// Deletes a device. Callers must have confirmed with the user first.
	async fn remove(&self, id: &str) -> Result<(), RegistryError>;

	async fn rename(&self, id: &str, name: &str) -> Result<SavedDevice, RegistryError>;

	async fn get_active(&self) -> Result<Option<SavedDevice>, RegistryError>;

	/// Marks a device active and refreshes its `lastConnectedAt`.
	async fn set_active(&self, id: &str) -> Result<(), RegistryError>;
}
