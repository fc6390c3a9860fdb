use std::path::PathBuf;

use preke::{DiscoveryError, RegistryError, SessionError};
use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("{0}")]
	InvalidInput(String),

	#[error("config file {} is invalid: {source}", path.display())]
	Config {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error(transparent)]
	Session(#[from] SessionError),

	#[error(transparent)]
	Discovery(#[from] DiscoveryError),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl From<RegistryError> for CliError {
	fn from(err: RegistryError) -> Self {
		CliError::Session(err.into())
	}
}

impl CliError {
	/// Converts this error into the structured envelope error.
	pub fn to_command_error(&self) -> CommandError {
		let (code, details) = match self {
			CliError::InvalidInput(_) => (ErrorCode::InvalidInput, None),
			CliError::Config { path, .. } => (
				ErrorCode::InvalidInput,
				Some(serde_json::json!({ "path": path })),
			),
			CliError::Session(err) => classify_session_error(err),
			CliError::Discovery(_) => (ErrorCode::DiscoveryError, None),
			CliError::Io(_) => (ErrorCode::IoError, None),
		};

		CommandError {
			code,
			message: self.to_string(),
			details,
		}
	}
}

fn classify_session_error(err: &SessionError) -> (ErrorCode, Option<serde_json::Value>) {
	match err {
		SessionError::InvalidAddress(invalid) => (
			ErrorCode::InvalidInput,
			Some(serde_json::json!({ "input": invalid.input })),
		),
		SessionError::Registry(RegistryError::NotFound { id }) | SessionError::UnknownDevice { id } => {
			(ErrorCode::NotFound, Some(serde_json::json!({ "id": id })))
		}
		SessionError::Registry(RegistryError::Corrupt { path, .. }) => (
			ErrorCode::RegistryError,
			Some(serde_json::json!({ "path": path })),
		),
		SessionError::Registry(_) => (ErrorCode::RegistryError, None),
		SessionError::EmptyName => (ErrorCode::InvalidInput, None),
		SessionError::Discovery(_) => (ErrorCode::DiscoveryError, None),
		SessionError::Closed => (ErrorCode::InternalError, None),
	}
}
