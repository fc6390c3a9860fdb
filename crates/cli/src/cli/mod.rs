#[cfg(test)]
mod tests;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;
use crate::styles::cli_styles;

/// Root CLI for preke.
#[derive(Parser, Debug)]
#[command(name = "preke")]
#[command(about = "Find, save and select Preke capture devices on the local network")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: text (default), json, ndjson, or toon
	#[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
	pub format: OutputFormat,

	/// Config file (default: $XDG_CONFIG_HOME/preke/config.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Device registry file (default: $XDG_CONFIG_HOME/preke/devices.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub registry: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run one foreground scan and print the reconciled device list.
	Scan(ScanArgs),
	/// Keep scanning in the foreground and background and print every change.
	Watch(WatchArgs),
	/// List saved devices.
	List,
	/// Show the active device.
	Active,
	/// Add a device by address, probing it first.
	Add(AddArgs),
	/// Remove a saved device.
	Remove(RemoveArgs),
	/// Rename a saved device.
	Rename(RenameArgs),
	/// Make a saved device the active one.
	Select(SelectArgs),
}

impl Commands {
	/// Command name used in result envelopes.
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Scan(_) => "scan",
			Commands::Watch(_) => "watch",
			Commands::List => "list",
			Commands::Active => "active",
			Commands::Add(_) => "add",
			Commands::Remove(_) => "remove",
			Commands::Rename(_) => "rename",
			Commands::Select(_) => "select",
		}
	}
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScanArgs {
	/// Give up on the scan after this many seconds.
	#[arg(long, value_name = "SECS")]
	pub timeout: Option<u64>,

	/// Subnet to sweep (repeatable), e.g. 192.168.1 or 10.0.0.0/24.
	#[arg(long = "subnet", value_name = "SUBNET")]
	pub subnets: Vec<String>,

	/// Device API port to probe.
	#[arg(long, value_name = "PORT")]
	pub port: Option<u16>,

	/// Save every newly discovered device.
	#[arg(long)]
	pub save: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct WatchArgs {
	/// Stop after this many seconds instead of waiting for Ctrl+C.
	#[arg(long, value_name = "SECS")]
	pub duration: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
	/// Host, host:port or URL of the device.
	#[arg(value_name = "ADDRESS")]
	pub address: String,

	/// Name to save the device under if the probe does not identify it.
	#[arg(long, value_name = "NAME")]
	pub name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RemoveArgs {
	#[arg(value_name = "ID")]
	pub id: String,

	/// Confirm the removal. Removing a device cannot be undone.
	#[arg(long)]
	pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RenameArgs {
	#[arg(value_name = "ID")]
	pub id: String,

	#[arg(value_name = "NAME")]
	pub name: String,
}

#[derive(Args, Debug, Clone)]
pub struct SelectArgs {
	#[arg(value_name = "ID")]
	pub id: String,
}
