//! Reconciled device view.

use std::collections::HashSet;

use preke_protocol::{DiscoveredDevice, SavedDevice, normalize_url};
use serde::Serialize;

/// Saved devices plus the discovered devices that are not saved yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceView {
	pub saved: Vec<SavedDevice>,
	pub discovered: Vec<DiscoveredDevice>,
}

impl DeviceView {
	pub fn is_empty(&self) -> bool {
		self.saved.is_empty() && self.discovered.is_empty()
	}

	pub fn len(&self) -> usize {
		self.saved.len() + self.discovered.len()
	}
}

/// Builds the view: drops discovered devices whose normalized URL matches a
/// saved device. Pure; equal inputs give equal output and inputs are untouched.
pub fn compute_view(saved: &[SavedDevice], discovered: &[DiscoveredDevice]) -> DeviceView {
	let saved_urls: HashSet<&str> = saved.iter().map(|d| normalize_url(&d.url)).collect();

	DeviceView {
		saved: saved.to_vec(),
		discovered: discovered
			.iter()
			.filter(|d| !saved_urls.contains(normalize_url(&d.url)))
			.cloned()
			.collect(),
	}
}
