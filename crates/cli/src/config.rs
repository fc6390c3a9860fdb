//! CLI configuration file and state paths.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use preke::{ScanTiming, SweepConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CliError, Result};

/// File locations for CLI state.
///
/// Both default to `$XDG_CONFIG_HOME/preke/` (falling back to `~/.config`).
#[derive(Debug, Clone)]
pub struct StatePaths {
	pub config: PathBuf,
	pub registry: PathBuf,
}

impl StatePaths {
	pub fn new(config: Option<PathBuf>, registry: Option<PathBuf>) -> Self {
		let dir = config_home().join("preke");
		Self {
			config: config.unwrap_or_else(|| dir.join("config.json")),
			registry: registry.unwrap_or_else(|| dir.join("devices.json")),
		}
	}
}

fn config_home() -> PathBuf {
	std::env::var_os("XDG_CONFIG_HOME")
		.map(PathBuf::from)
		.or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
		.unwrap_or_else(|| PathBuf::from("."))
}

/// Contents of `config.json`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CliConfig {
	pub warmup_secs: u64,
	pub interval_secs: u64,
	/// Foreground scan watchdog; 0 disables it.
	pub scan_timeout_secs: u64,
	pub port: u16,
	pub subnets: Vec<String>,
	pub hostnames: Vec<String>,
	pub status_path: String,
	pub probe_timeout_ms: u64,
	pub concurrency: usize,
}

impl Default for CliConfig {
	fn default() -> Self {
		let timing = ScanTiming::default();
		let sweep = SweepConfig::default();
		Self {
			warmup_secs: timing.warmup.as_secs(),
			interval_secs: timing.interval.as_secs(),
			scan_timeout_secs: 20,
			port: sweep.port,
			subnets: sweep.subnets,
			hostnames: sweep.hostnames,
			status_path: sweep.status_path,
			probe_timeout_ms: sweep.probe_timeout.as_millis() as u64,
			concurrency: sweep.concurrency,
		}
	}
}

impl CliConfig {
	/// Loads the config file. A missing file yields the defaults.
	pub fn load(path: &Path) -> Result<Self> {
		let content = match fs::read_to_string(path) {
			Ok(content) => content,
			Err(e) if e.kind() == ErrorKind::NotFound => {
				debug!(target = "preke.config", path = %path.display(), "no config file, using defaults");
				return Ok(Self::default());
			}
			Err(e) => return Err(e.into()),
		};

		serde_json::from_str(&content).map_err(|source| CliError::Config {
			path: path.to_path_buf(),
			source,
		})
	}

	pub fn scan_timeout(&self) -> Option<Duration> {
		(self.scan_timeout_secs > 0).then(|| Duration::from_secs(self.scan_timeout_secs))
	}

	pub fn timing(&self) -> ScanTiming {
		ScanTiming {
			warmup: Duration::from_secs(self.warmup_secs),
			interval: Duration::from_secs(self.interval_secs),
			foreground_timeout: self.scan_timeout(),
		}
	}

	pub fn sweep(&self) -> SweepConfig {
		SweepConfig {
			port: self.port,
			subnets: self.subnets.clone(),
			hostnames: self.hostnames.clone(),
			status_path: self.status_path.clone(),
			probe_timeout: Duration::from_millis(self.probe_timeout_ms),
			concurrency: self.concurrency,
		}
	}
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn missing_file_gives_defaults() {
		let tmp = TempDir::new().unwrap();
		let config = CliConfig::load(&tmp.path().join("config.json")).unwrap();

		assert_eq!(config, CliConfig::default());
		assert_eq!(config.port, 8000);
		assert_eq!(config.status_path, "/api/status");
		assert_eq!(config.timing().warmup, Duration::from_secs(30));
		assert_eq!(config.timing().interval, Duration::from_secs(45));
		assert_eq!(config.scan_timeout(), Some(Duration::from_secs(20)));
	}

	#[test]
	fn partial_file_keeps_other_defaults() {
		let tmp = TempDir::new().unwrap();
		let path = tmp.path().join("config.json");
		fs::write(
			&path,
			r#"{ "port": 8080, "subnets": ["10.1.2"], "scanTimeoutSecs": 0, "probeTimeoutMs": 250 }"#,
		)
		.unwrap();

		let config = CliConfig::load(&path).unwrap();

		assert_eq!(config.port, 8080);
		assert_eq!(config.subnets, vec!["10.1.2"]);
		assert_eq!(config.scan_timeout(), None);
		assert_eq!(config.warmup_secs, 30);

		let sweep = config.sweep();
		assert_eq!(sweep.port, 8080);
		assert_eq!(sweep.probe_timeout, Duration::from_millis(250));
		assert_eq!(sweep.hostnames, vec!["preke.local"]);
	}

	#[test]
	fn invalid_file_is_reported() {
		let tmp = TempDir::new().unwrap();
		let path = tmp.path().join("config.json");
		fs::write(&path, r#"{ "port": "eighty" }"#).unwrap();

		assert!(matches!(CliConfig::load(&path), Err(CliError::Config { .. })));
	}

	#[test]
	fn overrides_win_over_default_paths() {
		let paths = StatePaths::new(Some("/tmp/c.json".into()), Some("/tmp/d.json".into()));
		assert_eq!(paths.config, PathBuf::from("/tmp/c.json"));
		assert_eq!(paths.registry, PathBuf::from("/tmp/d.json"));

		let defaults = StatePaths::new(None, None);
		assert!(defaults.config.ends_with("preke/config.json"));
		assert!(defaults.registry.ends_with("preke/devices.json"));
	}
}
