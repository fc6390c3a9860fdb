//! `preke watch`: mount a long-lived session and stream its state.

use std::time::Duration;

use colored::Colorize;
use preke::{BackgroundState, DeviceView, ScanPhase, SessionSnapshot};
use serde::Serialize;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

use super::{AppContext, Session, emit_success};
use crate::cli::WatchArgs;
use crate::error::Result;
use crate::output::{CommandInputs, OutputFormat, print_ndjson};

/// One line of `watch` output per state change.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WatchLine {
	phase: ScanPhase,
	background: BackgroundState,
	saved: usize,
	discovered: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	scanning_subnet: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WatchSummary {
	updates: u64,
	devices: DeviceView,
	active_device_id: Option<String>,
	api_base_url: Option<String>,
}

pub async fn execute(ctx: &AppContext, args: WatchArgs, format: OutputFormat) -> Result<()> {
	let Session { session, api } = ctx.default_session()?;
	let mut changes = session.watch();
	session.mount().await?;
	print_line(&line(&changes.borrow_and_update(), session.background_state()), format);

	let deadline = args.duration.map(|secs| Instant::now() + Duration::from_secs(secs));
	let mut updates = 0u64;

	loop {
		tokio::select! {
			changed = changes.changed() => {
				if changed.is_err() {
					debug!(target = "preke.cli", "session state channel closed");
					break;
				}
				updates += 1;
				let current = line(&changes.borrow_and_update(), session.background_state());
				print_line(&current, format);
			}
			_ = wait_deadline(deadline) => {
				debug!(target = "preke.cli", "watch duration elapsed");
				break;
			}
			_ = tokio::signal::ctrl_c() => {
				info!(target = "preke.cli", "interrupted, shutting down");
				break;
			}
		}
	}

	let snapshot = session.snapshot();
	session.shutdown().await;

	emit_success(
		"watch",
		args.duration.map(|secs| CommandInputs {
			extra: Some(serde_json::json!({ "duration": secs })),
			..Default::default()
		}),
		WatchSummary {
			updates,
			devices: snapshot.view(),
			active_device_id: snapshot.active_device_id,
			api_base_url: api.current(),
		},
		Vec::new(),
		format,
	);
	Ok(())
}

async fn wait_deadline(deadline: Option<Instant>) {
	match deadline {
		Some(at) => sleep_until(at).await,
		None => std::future::pending().await,
	}
}

fn line(snapshot: &SessionSnapshot, background: BackgroundState) -> WatchLine {
	let view = snapshot.view();
	WatchLine {
		phase: snapshot.phase,
		background,
		saved: view.saved.len(),
		discovered: view.discovered.len(),
		scanning_subnet: snapshot.scanning_subnet.clone(),
	}
}

fn print_line(line: &WatchLine, format: OutputFormat) {
	match format {
		OutputFormat::Text => {
			let phase = match line.phase {
				ScanPhase::Idle => "idle".normal(),
				ScanPhase::ForegroundScanning => "scanning".green(),
				ScanPhase::BackgroundScanning => "background".cyan(),
			};
			let subnet = line
				.scanning_subnet
				.as_deref()
				.map(|s| format!(" subnet={s}"))
				.unwrap_or_default();
			println!(
				"[{phase}] saved={} discovered={} timer={:?}{subnet}",
				line.saved, line.discovered, line.background
			);
		}
		// Structured formats get the summary envelope at exit; stream lines as NDJSON.
		_ => print_ndjson(line),
	}
}
