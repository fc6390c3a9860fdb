//! Registry commands: list, active, add, remove, rename, select.

use preke::{DeviceRegistry, ManualOutcome, SavedDevice};
use serde::Serialize;
use tracing::info;

use super::{AppContext, Session, emit_success};
use crate::cli::{AddArgs, RemoveArgs, RenameArgs, SelectArgs};
use crate::error::{CliError, Result};
use crate::output::{CommandInputs, OutputFormat};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceList {
	devices: Vec<SavedDevice>,
	active_device_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActiveDevice {
	device: Option<SavedDevice>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddedDevice {
	/// True when the address answered the status probe.
	probed: bool,
	device: SavedDevice,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemovedDevice {
	removed: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SelectedDevice {
	device: SavedDevice,
	api_base_url: Option<String>,
}

pub async fn list(ctx: &AppContext, format: OutputFormat) -> Result<()> {
	let registry = ctx.registry();
	let devices = registry.list().await?;
	let active_device_id = registry.get_active().await?.map(|d| d.id);

	emit_success(
		"list",
		None,
		DeviceList {
			devices,
			active_device_id,
		},
		Vec::new(),
		format,
	);
	Ok(())
}

pub async fn active(ctx: &AppContext, format: OutputFormat) -> Result<()> {
	let device = ctx.registry().get_active().await?;
	emit_success("active", None, ActiveDevice { device }, Vec::new(), format);
	Ok(())
}

pub async fn add(ctx: &AppContext, args: AddArgs, format: OutputFormat) -> Result<()> {
	let Session { session, .. } = ctx.default_session()?;

	let result = async {
		session.reload_saved().await?;
		match session.add_manual(&args.address, args.name.as_deref()).await? {
			ManualOutcome::Discovered(found) => {
				let device = session.save_discovered(&found.id, args.name.as_deref()).await?;
				Ok::<_, CliError>(AddedDevice { probed: true, device })
			}
			ManualOutcome::Saved(device) => Ok(AddedDevice {
				probed: false,
				device,
			}),
		}
	}
	.await;
	session.shutdown().await;
	let added = result?;

	info!(target = "preke.cli", id = %added.device.id, probed = added.probed, "device added");
	emit_success(
		"add",
		Some(CommandInputs {
			address: Some(args.address),
			name: args.name,
			..Default::default()
		}),
		added,
		Vec::new(),
		format,
	);
	Ok(())
}

pub async fn remove(ctx: &AppContext, args: RemoveArgs, format: OutputFormat) -> Result<()> {
	if !args.yes {
		return Err(CliError::InvalidInput(format!(
			"refusing to remove device '{}' without --yes; removal cannot be undone",
			args.id
		)));
	}

	let Session { session, .. } = ctx.default_session()?;
	let result = async {
		session.reload_saved().await?;
		session.remove_saved(&args.id).await
	}
	.await;
	session.shutdown().await;
	result?;

	emit_success(
		"remove",
		Some(CommandInputs {
			id: Some(args.id.clone()),
			..Default::default()
		}),
		RemovedDevice { removed: args.id },
		Vec::new(),
		format,
	);
	Ok(())
}

pub async fn rename(ctx: &AppContext, args: RenameArgs, format: OutputFormat) -> Result<()> {
	let Session { session, .. } = ctx.default_session()?;
	let result = session.rename_saved(&args.id, &args.name).await;
	session.shutdown().await;
	let device = result?;

	emit_success(
		"rename",
		Some(CommandInputs {
			id: Some(args.id.clone()),
			name: Some(args.name),
			..Default::default()
		}),
		device,
		Vec::new(),
		format,
	);
	Ok(())
}

pub async fn select(ctx: &AppContext, args: SelectArgs, format: OutputFormat) -> Result<()> {
	let Session { session, api } = ctx.default_session()?;
	let result = async {
		session.reload_saved().await?;
		session.select(&args.id).await
	}
	.await;
	session.shutdown().await;
	let device = result?;

	emit_success(
		"select",
		Some(CommandInputs {
			id: Some(args.id),
			..Default::default()
		}),
		SelectedDevice {
			device,
			api_base_url: api.current(),
		},
		Vec::new(),
		format,
	);
	Ok(())
}
