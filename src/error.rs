//! Error type shared by the backend collaborators and the store.

use thiserror::Error;

/// Everything that can go wrong talking to storage or the backend. None of
/// these are fatal: the store logs them and keeps its prior state.
#[derive(Debug, Error)]
pub enum TapestryError {
	/// The HTTP request never produced a response.
	#[error("request failed: {0}")]
	Transport(#[from] reqwest::Error),

	/// Non-2xx answer.
	#[error("backend returned {status} for {url}")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Request URL.
		url: String,
	},

	/// A body or stored blob did not decode.
	#[error("malformed payload: {0}")]
	Payload(#[from] serde_json::Error),

	/// `localStorage` missing, disabled or full.
	#[error("browser storage unavailable: {0}")]
	Storage(String),

	/// No project with this id.
	#[error("project not found: {0}")]
	ProjectNotFound(String),

	/// The backend cannot perform this operation.
	#[error("{0} is not supported by this backend")]
	Unsupported(&'static str),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TapestryError>;
