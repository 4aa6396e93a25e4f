//! Buffered API request descriptor that can be replayed after a token refresh.

// crates.io
use http::{
	Method,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError, http::HttpRequest};

const JSON: &str = "application/json";

/// A request to the backend, relative to the configured base URL.
///
/// The body is kept in memory so the same request can be sent again with a new bearer token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiRequest {
	method: Method,
	path: String,
	query: Vec<(String, String)>,
	body: Option<Vec<u8>>,
	retry: bool,
}
impl ApiRequest {
	/// Creates a request for `path` using `method`.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), query: Vec::new(), body: None, retry: false }
	}

	/// `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// `PATCH` request.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::PATCH, path)
	}

	/// `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Appends a query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Serializes `body` as the JSON payload.
	pub fn json<T>(mut self, body: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let bytes =
			serde_json::to_vec(body).map_err(|source| ConfigError::RequestEncode { source })?;

		self.body = Some(bytes);

		Ok(self)
	}

	/// HTTP method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Path relative to the base URL.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Buffered JSON body, if any.
	pub fn body(&self) -> Option<&[u8]> {
		self.body.as_deref()
	}

	/// Whether this request is already the replay of a 401.
	pub fn is_retry(&self) -> bool {
		self.retry
	}

	pub(crate) fn mark_retry(&mut self) {
		self.retry = true;
	}

	/// Builds the outbound HTTP request against `base`, attaching `token` as a bearer credential.
	pub(crate) fn to_http(
		&self,
		base: &Url,
		token: Option<&TokenSecret>,
	) -> Result<HttpRequest, ConfigError> {
		let mut url = base
			.join(self.path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidPath { path: self.path.clone(), source })?;

		if !self.query.is_empty() {
			url.query_pairs_mut().extend_pairs(&self.query);
		}

		let mut builder = http::Request::builder()
			.method(self.method.clone())
			.uri(url.as_str())
			.header(ACCEPT, JSON);

		if self.body.is_some() {
			builder = builder.header(CONTENT_TYPE, JSON);
		}
		if let Some(token) = token {
			builder = builder.header(AUTHORIZATION, token.bearer());
		}

		Ok(builder.body(self.body.clone().unwrap_or_default())?)
	}
}
