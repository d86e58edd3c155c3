use std::{
	io,
	path::{Path, PathBuf},
	sync::Once,
};

use tagemu_utils::error::FileIOError;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOGS_DIR_NAME: &str = "logs";
pub const LOG_FILE_NAME: &str = "tagemu.log";

#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("failed to install the global tracing subscriber: {0}")]
	Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs stderr and daily-rotated file logging to `{data_dir}/logs/tagemu.log`.
/// Stdout stays free for command output.
///
/// `RUST_LOG` takes precedence over `default_filter`. Only the first call does anything.
pub fn init(data_dir: impl AsRef<Path>, default_filter: &str) -> Result<(), LoggingError> {
	static INIT: Once = Once::new();
	let mut result = Ok(());

	INIT.call_once(|| {
		result = install(data_dir.as_ref().join(LOGS_DIR_NAME), default_filter);
	});

	result
}

fn install(logs_dir: PathBuf, default_filter: &str) -> Result<(), LoggingError> {
	std::fs::create_dir_all(&logs_dir).map_err(|e| {
		FileIOError::from((logs_dir.as_path(), e, "Failed to create logs directory"))
	})?;

	let file_appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, LOG_FILE_NAME);

	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
		.with(
			fmt::layer()
				.with_target(true)
				.with_thread_ids(true)
				.with_writer(io::stderr),
		)
		.with(
			fmt::layer()
				.with_target(true)
				.with_thread_ids(true)
				.with_ansi(false) // No ANSI colors in log files
				.with_writer(file_appender),
		)
		.try_init()?;

	Ok(())
}
