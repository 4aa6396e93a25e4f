#![allow(dead_code)]

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use http::{StatusCode, header::AUTHORIZATION};
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};
use tokio::sync::Notify;
// self
use afrinet_client::{
	auth::{StoredSession, TokenSecret},
	client::ApiClient,
	config::ClientConfig,
	endpoints,
	error::TransportError,
	http::{ApiHttpClient, HttpFuture, HttpRequest, HttpResponse},
	store::{CredentialStore, MemoryStore, RotateOutcome, StoreFuture},
};

/// Unsigned JWT whose `exp` lies `expires_in` from now.
pub fn jwt(expires_in: Duration) -> String {
	let exp = (OffsetDateTime::now_utc() + expires_in).unix_timestamp();

	format!(
		"{}.{}.signature",
		URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
		URL_SAFE_NO_PAD.encode(format!(r#"{{"token_type":"access","exp":{exp}}}"#)),
	)
}

pub fn config(base_url: &str) -> ClientConfig {
	ClientConfig::builder()
		.base_url_str(base_url)
		.expect("Test base URL should parse.")
		.build()
		.expect("Test config should validate.")
}

pub fn json_response(status: StatusCode, body: &str) -> HttpResponse {
	let mut response = HttpResponse::new(body.as_bytes().to_vec());

	*response.status_mut() = status;
	response
		.headers_mut()
		.insert(http::header::CONTENT_TYPE, http::HeaderValue::from_static("application/json"));

	response
}

pub type Responder =
	Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync>;

/// Request observed by [`FakeHttpClient`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Seen {
	pub path: String,
	pub authorization: Option<String>,
}

/// Scripted transport; refresh calls can be held until a gate opens.
pub struct FakeHttpClient {
	responder: Responder,
	refresh_gate: Option<Arc<Notify>>,
	seen: Mutex<Vec<Seen>>,
}
impl FakeHttpClient {
	pub fn new(
		responder: impl Fn(&HttpRequest) -> Result<HttpResponse, TransportError>
		+ 'static
		+ Send
		+ Sync,
	) -> Self {
		Self { responder: Box::new(responder), refresh_gate: None, seen: Mutex::new(Vec::new()) }
	}

	pub fn with_refresh_gate(mut self, gate: Arc<Notify>) -> Self {
		self.refresh_gate = Some(gate);

		self
	}

	pub fn seen(&self) -> Vec<Seen> {
		self.seen.lock().clone()
	}

	pub fn calls_to(&self, path: &str) -> usize {
		self.seen.lock().iter().filter(|seen| seen.path == path).count()
	}
}
impl ApiHttpClient for FakeHttpClient {
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
		Box::pin(async move {
			let path = request.uri().path().to_owned();
			let authorization = request
				.headers()
				.get(AUTHORIZATION)
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned);

			self.seen.lock().push(Seen { path: path.clone(), authorization });

			if let Some(gate) = self.refresh_gate.as_ref().filter(|_| path == endpoints::TOKEN_REFRESH)
			{
				gate.notified().await;
			}

			(self.responder)(&request)
		})
	}
}

/// Memory store that counts how often credentials are rotated and cleared.
#[derive(Clone, Debug, Default)]
pub struct CountingStore {
	pub inner: MemoryStore,
	rotations: Arc<AtomicUsize>,
	clears: Arc<AtomicUsize>,
}
impl CountingStore {
	pub fn with_session(session: StoredSession) -> Self {
		Self { inner: MemoryStore::with_session(session), ..Default::default() }
	}

	pub fn rotations(&self) -> usize {
		self.rotations.load(Ordering::SeqCst)
	}

	pub fn clears(&self) -> usize {
		self.clears.load(Ordering::SeqCst)
	}
}
impl CredentialStore for CountingStore {
	fn load(&self) -> StoreFuture<'_, Option<StoredSession>> {
		self.inner.load()
	}

	fn save(&self, session: StoredSession) -> StoreFuture<'_, ()> {
		self.inner.save(session)
	}

	fn rotate<'a>(
		&'a self,
		expected_refresh: &'a TokenSecret,
		access_token: TokenSecret,
		refresh_token: Option<TokenSecret>,
	) -> StoreFuture<'a, RotateOutcome> {
		self.rotations.fetch_add(1, Ordering::SeqCst);

		self.inner.rotate(expected_refresh, access_token, refresh_token)
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		self.clears.fetch_add(1, Ordering::SeqCst);

		self.inner.clear()
	}
}

/// Client over a [`FakeHttpClient`] and a [`CountingStore`], sharing handles with the test.
pub fn fake_client(
	http_client: FakeHttpClient,
	store: CountingStore,
) -> (ApiClient<FakeHttpClient>, Arc<FakeHttpClient>) {
	let http_client = Arc::new(http_client);
	let client = ApiClient::with_http_client(
		config("http://afrinet.test/"),
		Arc::new(store) as Arc<dyn CredentialStore>,
		http_client.clone(),
	);

	(client, http_client)
}
