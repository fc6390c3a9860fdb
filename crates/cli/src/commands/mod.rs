//! Command implementations and dispatch.

mod devices;
mod scan;
mod watch;

use std::sync::Arc;
use std::time::Duration;

use preke::{ApiEndpoint, DiscoverySession, JsonFileRegistry, SessionOptions, SweepBackend, SweepConfig};
use serde::Serialize;

use crate::cli::{Cli, Commands};
use crate::config::{CliConfig, StatePaths};
use crate::error::Result;
use crate::output::{CommandInputs, Diagnostic, OutputFormat, ResultBuilder, print_result};

/// Resolved paths and configuration shared by every command.
#[derive(Debug, Clone)]
pub struct AppContext {
	pub paths: StatePaths,
	pub config: CliConfig,
}

impl AppContext {
	pub fn load(cli: &Cli) -> Result<Self> {
		let paths = StatePaths::new(cli.config.clone(), cli.registry.clone());
		let config = CliConfig::load(&paths.config)?;
		Ok(Self { paths, config })
	}

	pub fn registry(&self) -> Arc<JsonFileRegistry> {
		Arc::new(JsonFileRegistry::new(&self.paths.registry))
	}

	/// Builds a session over the HTTP sweep backend and the registry file.
	pub fn session(&self, sweep: SweepConfig, scan_timeout: Option<Duration>) -> Result<Session> {
		let backend = Arc::new(SweepBackend::new(sweep)?);
		let api = Arc::new(ApiEndpoint::new());

		let mut options = SessionOptions {
			timing: self.config.timing(),
			..SessionOptions::default()
		};
		options.timing.foreground_timeout = scan_timeout;

		let session = DiscoverySession::new(backend, self.registry(), api.clone(), options);
		Ok(Session { session, api })
	}

	/// Session with the configured sweep and scan timeout.
	pub fn default_session(&self) -> Result<Session> {
		self.session(self.config.sweep(), self.config.scan_timeout())
	}
}

/// A session plus the endpoint it publishes the active device URL to.
pub struct Session {
	pub session: DiscoverySession,
	pub api: Arc<ApiEndpoint>,
}

pub async fn dispatch(cli: Cli, format: OutputFormat) -> Result<()> {
	let ctx = AppContext::load(&cli)?;

	match cli.command {
		Commands::Scan(args) => scan::execute(&ctx, args, format).await,
		Commands::Watch(args) => watch::execute(&ctx, args, format).await,
		Commands::List => devices::list(&ctx, format).await,
		Commands::Active => devices::active(&ctx, format).await,
		Commands::Add(args) => devices::add(&ctx, args, format).await,
		Commands::Remove(args) => devices::remove(&ctx, args, format).await,
		Commands::Rename(args) => devices::rename(&ctx, args, format).await,
		Commands::Select(args) => devices::select(&ctx, args, format).await,
	}
}

pub(crate) fn emit_success<T: Serialize>(
	command: &'static str,
	inputs: Option<CommandInputs>,
	data: T,
	diagnostics: Vec<Diagnostic>,
	format: OutputFormat,
) {
	let mut builder = ResultBuilder::new(command).data(data).diagnostics(diagnostics);
	if let Some(inputs) = inputs {
		builder = builder.inputs(inputs);
	}
	print_result(&builder.build(), format);
}
