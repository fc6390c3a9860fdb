//! Shared device records for preke.
//!
//! This crate contains the serde-serializable types exchanged between the
//! discovery session, the device registry and the CLI:
//!
//! - [`SavedDevice`]: a user-confirmed device persisted in the registry
//! - [`DiscoveredDevice`]: an ephemeral scan result
//! - [`RegistryFile`]: the on-disk registry document
//!
//! Address handling ([`parse_address`], [`normalize_url`]) also lives here so
//! every layer agrees on what "the same device URL" means.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No I/O, no async
//! - **Stable**: The registry schema only changes with [`REGISTRY_SCHEMA_VERSION`]

pub mod address;
pub mod device;
pub mod registry_file;

pub use address::{InvalidAddress, normalize_url, parse_address};
pub use device::{DeviceSource, DiscoveredDevice, FALLBACK_DEVICE_NAME, SavedDevice};
pub use registry_file::{REGISTRY_SCHEMA_VERSION, RegistryFile};
