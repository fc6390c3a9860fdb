use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

pub fn init_logging(verbosity: u8) {
	// 0 = errors only; scan-time warnings would otherwise interleave with output
	// 1 (-v) = info for preke targets
	// 2+ (-vv) = debug everywhere, including sweep probes at trace via RUST_LOG
	let filter = match verbosity {
		0 => "error",
		1 => "warn,preke=info",
		_ => "debug,hyper=info,reqwest=info",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
