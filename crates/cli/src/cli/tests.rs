use std::path::PathBuf;

use clap::Parser;

use super::*;

#[test]
fn parse_scan_command() {
	let args = vec![
		"preke",
		"scan",
		"--timeout",
		"5",
		"--subnet",
		"192.168.1",
		"--subnet",
		"10.0.0.0/24",
		"--port",
		"8080",
		"--save",
	];
	let cli = Cli::try_parse_from(args).unwrap();

	match cli.command {
		Commands::Scan(args) => {
			assert_eq!(args.timeout, Some(5));
			assert_eq!(args.subnets, vec!["192.168.1", "10.0.0.0/24"]);
			assert_eq!(args.port, Some(8080));
			assert!(args.save);
		}
		_ => panic!("Expected Scan command"),
	}
}

#[test]
fn parse_scan_defaults() {
	let cli = Cli::try_parse_from(["preke", "scan"]).unwrap();

	match cli.command {
		Commands::Scan(args) => {
			assert_eq!(args.timeout, None);
			assert!(args.subnets.is_empty());
			assert_eq!(args.port, None);
			assert!(!args.save);
		}
		_ => panic!("Expected Scan command"),
	}
	assert_eq!(cli.format, OutputFormat::Text);
}

#[test]
fn parse_add_with_name() {
	let cli = Cli::try_parse_from(["preke", "add", "192.168.1.50", "--name", "Booth A"]).unwrap();

	match cli.command {
		Commands::Add(args) => {
			assert_eq!(args.address, "192.168.1.50");
			assert_eq!(args.name.as_deref(), Some("Booth A"));
		}
		_ => panic!("Expected Add command"),
	}
}

#[test]
fn parse_remove_requires_id() {
	assert!(Cli::try_parse_from(["preke", "remove"]).is_err());

	let cli = Cli::try_parse_from(["preke", "remove", "abc", "--yes"]).unwrap();
	match cli.command {
		Commands::Remove(args) => {
			assert_eq!(args.id, "abc");
			assert!(args.yes);
		}
		_ => panic!("Expected Remove command"),
	}
}

#[test]
fn parse_rename_and_select() {
	let cli = Cli::try_parse_from(["preke", "rename", "abc", "Stage Left"]).unwrap();
	assert!(matches!(
		cli.command,
		Commands::Rename(RenameArgs { ref id, ref name }) if id == "abc" && name == "Stage Left"
	));

	let cli = Cli::try_parse_from(["preke", "select", "abc"]).unwrap();
	assert!(matches!(cli.command, Commands::Select(SelectArgs { ref id }) if id == "abc"));
}

#[test]
fn verbose_flag_short_and_long() {
	let short_cli = Cli::try_parse_from(["preke", "-v", "list"]).unwrap();
	assert_eq!(short_cli.verbose, 1);

	let long_cli = Cli::try_parse_from(["preke", "--verbose", "list"]).unwrap();
	assert_eq!(long_cli.verbose, 1);

	let double_cli = Cli::try_parse_from(["preke", "-vv", "list"]).unwrap();
	assert_eq!(double_cli.verbose, 2);
}

#[test]
fn global_flags_after_subcommand() {
	let cli = Cli::try_parse_from([
		"preke",
		"list",
		"-f",
		"json",
		"--registry",
		"/tmp/devices.json",
		"--config",
		"/tmp/config.json",
	])
	.unwrap();

	assert_eq!(cli.format, OutputFormat::Json);
	assert_eq!(cli.registry, Some(PathBuf::from("/tmp/devices.json")));
	assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.json")));
	assert!(matches!(cli.command, Commands::List));
}

#[test]
fn watch_duration() {
	let cli = Cli::try_parse_from(["preke", "watch", "--duration", "90"]).unwrap();
	assert!(matches!(cli.command, Commands::Watch(WatchArgs { duration: Some(90) })));
}

#[test]
fn unknown_format_is_rejected() {
	assert!(Cli::try_parse_from(["preke", "-f", "yaml", "list"]).is_err());
}
