//! `preke scan`: one foreground sweep, reconciled against the registry.

use std::time::Duration;

use preke::{DiscoveredDevice, DiscoveryError, SavedDevice, ScanPhase, SessionSnapshot};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{AppContext, Session, emit_success};
use crate::cli::ScanArgs;
use crate::error::{CliError, Result};
use crate::output::{CommandInputs, Diagnostic, DiagnosticLevel, OutputFormat};

/// Extra time allowed past the scan timeout for the completion event.
const COMPLETION_GRACE: Duration = Duration::from_secs(5);

/// Upper bound on a scan when the watchdog is disabled.
const UNBOUNDED_SCAN_LIMIT: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanData {
	saved: Vec<SavedDevice>,
	discovered: Vec<DiscoveredDevice>,
	active_device_id: Option<String>,
	newly_saved: Vec<SavedDevice>,
	/// False when the backend never reported completion.
	complete: bool,
}

pub async fn execute(ctx: &AppContext, args: ScanArgs, format: OutputFormat) -> Result<()> {
	let mut sweep = ctx.config.sweep();
	if !args.subnets.is_empty() {
		sweep.subnets = args.subnets.clone();
	}
	if let Some(port) = args.port {
		sweep.port = port;
	}
	let scan_timeout = match args.timeout {
		Some(0) => None,
		Some(secs) => Some(Duration::from_secs(secs)),
		None => ctx.config.scan_timeout(),
	};

	let Session { session, .. } = ctx.session(sweep, scan_timeout)?;
	let mut diagnostics = Vec::new();

	session.attach();
	if let Err(e) = session.reload_saved().await {
		diagnostics.push(Diagnostic {
			level: DiagnosticLevel::Warning,
			message: format!("saved devices unavailable: {e}"),
		});
	}

	let changes = session.watch();
	if !session.start_foreground().await {
		session.shutdown().await;
		return Err(CliError::Discovery(DiscoveryError::StartFailed(
			"backend refused to start a scan".into(),
		)));
	}

	let limit = scan_timeout.unwrap_or(UNBOUNDED_SCAN_LIMIT) + COMPLETION_GRACE;
	let mut complete = wait_for_idle(changes.clone(), limit).await;
	if !complete {
		warn!(target = "preke.cli", limit_secs = limit.as_secs(), "scan did not complete, stopping");
		if let Err(e) = session.stop_foreground().await {
			diagnostics.push(Diagnostic {
				level: DiagnosticLevel::Warning,
				message: format!("failed to stop scan: {e}"),
			});
		}
		complete = wait_for_idle(changes, COMPLETION_GRACE).await;
		if !complete {
			diagnostics.push(Diagnostic {
				level: DiagnosticLevel::Warning,
				message: "scan did not report completion; results may be partial".into(),
			});
		}
	}

	let mut newly_saved = Vec::new();
	if args.save {
		for device in session.view().discovered {
			match session.save_discovered(&device.id, None).await {
				Ok(saved) => newly_saved.push(saved),
				Err(e) => diagnostics.push(Diagnostic {
					level: DiagnosticLevel::Warning,
					message: format!("could not save {}: {e}", device.id),
				}),
			}
		}
	}

	let snapshot = session.snapshot();
	session.shutdown().await;

	let view = snapshot.view();
	info!(
		target = "preke.cli",
		saved = view.saved.len(),
		discovered = view.discovered.len(),
		newly_saved = newly_saved.len(),
		"scan finished"
	);

	emit_success(
		"scan",
		Some(CommandInputs {
			extra: scan_inputs(&args),
			..Default::default()
		}),
		ScanData {
			saved: view.saved,
			discovered: view.discovered,
			active_device_id: snapshot.active_device_id,
			newly_saved,
			complete,
		},
		diagnostics,
		format,
	);
	Ok(())
}

/// Waits until the session leaves the foreground phase. Returns false on
/// timeout or if the session closed first.
async fn wait_for_idle(mut rx: watch::Receiver<SessionSnapshot>, limit: Duration) -> bool {
	match timeout(limit, rx.wait_for(|s| s.phase == ScanPhase::Idle)).await {
		Ok(Ok(_)) => true,
		Ok(Err(_)) => {
			debug!(target = "preke.cli", "session closed while waiting for scan");
			false
		}
		Err(_) => false,
	}
}

fn scan_inputs(args: &ScanArgs) -> Option<serde_json::Value> {
	let mut extra = serde_json::Map::new();
	if !args.subnets.is_empty() {
		extra.insert("subnets".into(), serde_json::json!(args.subnets));
	}
	if let Some(port) = args.port {
		extra.insert("port".into(), port.into());
	}
	if let Some(timeout) = args.timeout {
		extra.insert("timeout".into(), timeout.into());
	}
	if args.save {
		extra.insert("save".into(), true.into());
	}
	(!extra.is_empty()).then_some(serde_json::Value::Object(extra))
}
