//! Client-level error types shared across requests, refresh episodes, and stores.

// crates.io
use http::StatusCode;
// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const MESSAGE_PREVIEW_LEN: usize = 200;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration or request-construction problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The token refresh backing this request failed; the session has been signed out.
	#[error(transparent)]
	Refresh(#[from] RefreshError),
	/// Backend answered with a non-success status.
	#[error(transparent)]
	Api(#[from] ApiError),

	/// Response body could not be decoded into the expected shape.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the decoded response.
		status: u16,
	},
	/// Request was rejected with 401 again after its single replay.
	#[error("Request `{method} {path}` is still unauthorized after refreshing credentials.")]
	Unauthorized {
		/// HTTP method of the rejected request.
		method: String,
		/// Path of the rejected request.
		path: String,
	},
	/// Caller-supplied input failed local validation before any request was sent.
	#[error("Invalid input: {reason}.")]
	InvalidInput {
		/// Human-readable validation failure.
		reason: String,
	},
}
impl Error {
	/// Returns `true` if the error ended the session (refresh failure).
	pub fn is_session_ended(&self) -> bool {
		matches!(self, Self::Refresh(e) if *e != RefreshError::Abandoned)
	}

	pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
		Self::InvalidInput { reason: reason.into() }
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] http::Error),
	/// Request body could not be serialized to JSON.
	#[error("Request body could not be encoded as JSON.")]
	RequestEncode {
		/// Underlying serializer failure.
		#[source]
		source: serde_json::Error,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL uses a scheme other than `http` or `https`.
	#[error("Base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Offending URL.
		url: String,
	},
	/// Base URL cannot carry relative paths (e.g. `mailto:`).
	#[error("Base URL cannot be used as a base: {url}.")]
	CannotBeABase {
		/// Offending URL.
		url: String,
	},
	/// Request path could not be joined onto the base URL.
	#[error("Request path `{path}` cannot be joined onto the base URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request timeout must be positive.
	#[error("Request timeout must be greater than zero.")]
	ZeroTimeout,
	/// Environment name is not recognized.
	#[error("Unknown environment `{value}`; expected development or production.")]
	UnknownEnvironment {
		/// Raw environment value.
		value: String,
	},
	/// Environment variable holds an unparsable value.
	#[error("Environment variable {name} holds an invalid value `{value}`.")]
	InvalidEnvValue {
		/// Variable name.
		name: &'static str,
		/// Raw value.
		value: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Terminal failure of a refresh episode.
///
/// The value is cloned to every request waiting on the episode, so it carries rendered
/// messages instead of boxed sources.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshError {
	/// No refresh token is stored, so the access token cannot be renewed.
	#[error("No refresh token is stored; sign in again.")]
	MissingRefreshToken,
	/// Refresh endpoint rejected the refresh token (expired, revoked, malformed).
	#[error("Refresh endpoint rejected the refresh token with status {status}: {message}.")]
	Rejected {
		/// HTTP status code returned by the refresh endpoint.
		status: u16,
		/// Backend-supplied message.
		message: String,
	},
	/// Refresh request could not be built.
	#[error("Refresh request could not be encoded: {message}.")]
	Encoding {
		/// Rendered encoding failure.
		message: String,
	},
	/// Refresh endpoint could not be reached.
	#[error("Refresh endpoint could not be reached: {message}.")]
	Network {
		/// Rendered transport failure.
		message: String,
	},
	/// Refresh endpoint answered with an unexpected body.
	#[error("Refresh endpoint returned a malformed response: {message}.")]
	MalformedResponse {
		/// Rendered decoding failure.
		message: String,
	},
	/// Credentials could not be read or written while refreshing.
	#[error("Credential store failed during refresh: {message}.")]
	Storage {
		/// Rendered store failure.
		message: String,
	},
	/// The refreshing task was dropped, or the session was cleared, before the episode completed.
	#[error("Refresh was abandoned before completing.")]
	Abandoned,
}
impl RefreshError {
	pub(crate) fn encoding(err: impl Display) -> Self {
		Self::Encoding { message: err.to_string() }
	}

	pub(crate) fn network(err: impl Display) -> Self {
		Self::Network { message: err.to_string() }
	}

	pub(crate) fn storage(err: impl Display) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

/// Non-success response surfaced by typed helpers.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("API request failed with status {status}: {message}.")]
pub struct ApiError {
	/// HTTP status code.
	pub status: u16,
	/// Message extracted from the body (`error`, `message`, `detail`) or a preview of it.
	pub message: String,
}
impl ApiError {
	/// Builds an error from a status code and raw response body.
	pub fn from_body(status: StatusCode, body: &[u8]) -> Self {
		Self { status: status.as_u16(), message: extract_message(status, body) }
	}
}

fn extract_message(status: StatusCode, body: &[u8]) -> String {
	if let Ok(serde_json::Value::Object(map)) = serde_json::from_slice::<serde_json::Value>(body) {
		let structured = ["error", "message", "detail"]
			.into_iter()
			.find_map(|key| map.get(key).and_then(serde_json::Value::as_str))
			.or_else(|| {
				map.get("non_field_errors")
					.and_then(serde_json::Value::as_array)
					.and_then(|items| items.first())
					.and_then(serde_json::Value::as_str)
			});

		if let Some(message) = structured {
			return message.to_owned();
		}
	}

	let text = String::from_utf8_lossy(body);
	let text = text.trim();

	if text.is_empty() {
		return status.canonical_reason().unwrap_or("Unknown status").to_owned();
	}

	text.chars().take(MESSAGE_PREVIEW_LEN).collect()
}
