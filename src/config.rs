//! Client configuration: backend selection, timeouts, and session-watch cadence.
//!
//! [`ClientConfig`] values are assembled through [`ClientConfigBuilder`], which validates the
//! base URL and timeout before anything touches the network. [`ClientConfig::from_env`] reads
//! the same settings from `AFRINET_*` environment variables.

// std
use std::{env, time::Duration as StdDuration};
// self
use crate::{_prelude::*, error::ConfigError};

/// Environment variable selecting [`Environment`].
pub const ENV_ENVIRONMENT: &str = "AFRINET_ENV";
/// Environment variable overriding the base URL.
pub const ENV_BASE_URL: &str = "AFRINET_API_URL";
/// Environment variable overriding the request timeout in whole seconds.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "AFRINET_REQUEST_TIMEOUT_SECS";

const DEVELOPMENT_BASE_URL: &str = "http://127.0.0.1:8000/";
const PRODUCTION_BASE_URL: &str = "https://afrinet-project.onrender.com/";
const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);
const DEFAULT_SESSION_CHECK_INTERVAL: StdDuration = StdDuration::from_secs(5 * 60);

/// Deployment target that picks the default backend host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
	/// Local backend on the loopback interface.
	Development,
	#[default]
	/// Hosted backend.
	Production,
}
impl Environment {
	/// Returns the backend base URL for this environment.
	pub fn default_base_url(self) -> Result<Url, ConfigError> {
		let raw = match self {
			Self::Development => DEVELOPMENT_BASE_URL,
			Self::Production => PRODUCTION_BASE_URL,
		};

		Url::parse(raw).map_err(|source| ConfigError::InvalidBaseUrl { source })
	}

	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Development => "development",
			Self::Production => "production",
		}
	}
}
impl Display for Environment {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Environment {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"development" | "dev" | "local" => Ok(Self::Development),
			"production" | "prod" => Ok(Self::Production),
			_ => Err(ConfigError::UnknownEnvironment { value: s.to_owned() }),
		}
	}
}

/// Validated client configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	/// Environment the client was configured for.
	pub environment: Environment,
	/// Base URL every request path is joined onto; always ends with `/`.
	pub base_url: Url,
	/// Timeout applied to original and replayed requests alike.
	pub request_timeout: StdDuration,
	/// `User-Agent` header sent by the default transport.
	pub user_agent: String,
	/// Cadence of [`watch_session`](crate::client::ApiClient::watch_session).
	pub session_check_interval: StdDuration,
	/// Access tokens expiring within this window count as expired when restoring a session.
	pub expiry_leeway: Duration,
}
impl ClientConfig {
	/// Creates a new builder seeded with production defaults.
	pub fn builder() -> ClientConfigBuilder {
		ClientConfigBuilder::default()
	}

	/// Shortcut for a configuration targeting `environment` with default settings.
	pub fn for_environment(environment: Environment) -> Result<Self, ConfigError> {
		Self::builder().environment(environment).build()
	}

	/// Builds a configuration from `AFRINET_*` environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| env::var(name).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let mut builder = Self::builder();

		if let Some(value) = lookup(ENV_ENVIRONMENT) {
			builder = builder.environment(value.parse()?);
		}
		if let Some(value) = lookup(ENV_BASE_URL) {
			builder = builder.base_url_str(&value)?;
		}
		if let Some(value) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
			let secs = value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvValue {
				name: ENV_REQUEST_TIMEOUT_SECS,
				value: value.clone(),
			})?;

			builder = builder.request_timeout(StdDuration::from_secs(secs));
		}

		builder.build()
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// Environment selecting the default base URL.
	pub environment: Environment,
	/// Explicit base URL overriding the environment default.
	pub base_url: Option<Url>,
	/// Request timeout.
	pub request_timeout: StdDuration,
	/// `User-Agent` header value.
	pub user_agent: String,
	/// Session watch cadence.
	pub session_check_interval: StdDuration,
	/// Expiry leeway used when restoring sessions.
	pub expiry_leeway: Duration,
}
impl Default for ClientConfigBuilder {
	fn default() -> Self {
		Self {
			environment: Environment::default(),
			base_url: None,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into(),
			session_check_interval: DEFAULT_SESSION_CHECK_INTERVAL,
			expiry_leeway: Duration::ZERO,
		}
	}
}
impl ClientConfigBuilder {
	/// Sets the environment.
	pub fn environment(mut self, environment: Environment) -> Self {
		self.environment = environment;

		self
	}

	/// Overrides the base URL.
	pub fn base_url(mut self, url: Url) -> Self {
		self.base_url = Some(url);

		self
	}

	/// Parses and overrides the base URL.
	pub fn base_url_str(self, url: &str) -> Result<Self, ConfigError> {
		let url = Url::parse(url.trim()).map_err(|source| ConfigError::InvalidBaseUrl { source })?;

		Ok(self.base_url(url))
	}

	/// Sets the request timeout.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Sets the `User-Agent` header value.
	pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = user_agent.into();

		self
	}

	/// Sets the session watch cadence.
	pub fn session_check_interval(mut self, interval: StdDuration) -> Self {
		self.session_check_interval = interval;

		self
	}

	/// Sets the expiry leeway; negative values clamp to zero.
	pub fn expiry_leeway(mut self, leeway: Duration) -> Self {
		self.expiry_leeway = if leeway.is_negative() { Duration::ZERO } else { leeway };

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let base_url = match self.base_url {
			Some(url) => url,
			None => self.environment.default_base_url()?,
		};
		let base_url = normalize_base_url(base_url)?;

		if self.request_timeout.is_zero() {
			return Err(ConfigError::ZeroTimeout);
		}

		Ok(ClientConfig {
			environment: self.environment,
			base_url,
			request_timeout: self.request_timeout,
			user_agent: self.user_agent,
			session_check_interval: self.session_check_interval,
			expiry_leeway: self.expiry_leeway,
		})
	}
}

fn normalize_base_url(mut url: Url) -> Result<Url, ConfigError> {
	if !matches!(url.scheme(), "http" | "https") {
		return Err(ConfigError::UnsupportedScheme { url: url.to_string() });
	}
	if url.cannot_be_a_base() {
		return Err(ConfigError::CannotBeABase { url: url.to_string() });
	}
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	url.set_query(None);
	url.set_fragment(None);

	Ok(url)
}
