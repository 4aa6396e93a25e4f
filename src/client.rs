//! Authenticated request client with single-flight refresh and request replay.
//!
//! [`ApiClient::send`] attaches the stored access token to every request. When the backend
//! answers `401`, the request is marked as a retry and handed to the [`RefreshCoordinator`]:
//! the first such request refreshes the access token, later ones queue behind it, and all of
//! them are replayed once with the new token. A failed refresh fails the whole cohort with the
//! same [`RefreshError`], clears the stored credentials, and publishes
//! [`SessionStatus::SignedOut`] with [`SignOutReason::RefreshFailed`].
//!
//! The refreshed token is written back with a compare-and-swap on the exchanged refresh token.
//! A login or logout that lands mid-episode wins: the cohort is replayed with the newer access
//! token, or fails with [`RefreshError::Abandoned`] when the session was cleared.

pub mod refresh;
pub mod request;
pub mod response;
pub mod session;

pub use refresh::*;
pub use request::*;
pub use response::*;
pub use session::*;

// crates.io
use serde::de::DeserializeOwned;
use tokio::sync::watch;
// self
use crate::{
	_prelude::*,
	auth::{SessionStatus, SignOutReason, StoredSession, TokenSecret},
	config::ClientConfig,
	endpoints,
	error::{ApiError, RefreshError},
	http::ApiHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::{CredentialStore, RotateOutcome},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = ApiClient<ReqwestHttpClient>;

/// Authenticated client for the console backend.
///
/// Clones share the transport, credential store, refresh state, and session status, so a
/// refresh started through one clone is joined by requests issued through any other.
pub struct ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Shared counters for refresh episodes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	http_client: Arc<C>,
	store: Arc<dyn CredentialStore>,
	config: Arc<ClientConfig>,
	coordinator: Arc<RefreshCoordinator>,
	session: Arc<watch::Sender<SessionStatus>>,
	session_guard: Arc<AsyncMutex<()>>,
}
impl<C> ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates a client that reuses the caller-provided transport.
	pub fn with_http_client(
		config: ClientConfig,
		store: Arc<dyn CredentialStore>,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		let (session, _) = watch::channel(SessionStatus::default());

		Self {
			refresh_metrics: Default::default(),
			http_client: http_client.into(),
			store,
			config: Arc::new(config),
			coordinator: Default::default(),
			session: Arc::new(session),
			session_guard: Arc::new(AsyncMutex::new(())),
		}
	}

	/// Configuration this client was built with.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Credential store backing this client.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Latest published session status.
	pub fn session_status(&self) -> SessionStatus {
		*self.session.borrow()
	}

	/// Subscribes to session status changes, including the hard-logout signal.
	pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
		self.session.subscribe()
	}

	/// Returns `true` while a refresh episode is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.coordinator.is_refreshing()
	}

	/// Number of requests waiting on the in-flight refresh episode.
	pub fn pending_requests(&self) -> usize {
		self.coordinator.pending_requests()
	}

	/// Sends `request` with the stored bearer token, recovering from one expired-token `401`.
	///
	/// Every other status, including 4xx and 5xx, is returned unmodified.
	pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
		let generation = self.coordinator.generation();
		let token = self.access_token().await?;
		let response = self.dispatch(&request, token.as_ref()).await?;

		if !response.is_unauthorized() {
			return Ok(response);
		}
		if request.is_retry() {
			return Err(unauthorized(&request));
		}

		request.mark_retry();

		let label = format!("{} {}", request.method(), request.path());
		let token = match self.coordinator.admit(generation, label) {
			Admission::Refresh(episode) => self.run_refresh_episode(episode).await?,
			Admission::Wait(pending) => {
				self.refresh_metrics.record_queued();
				tracing::debug!(
					method = %request.method(),
					path = request.path(),
					"Request queued behind refresh."
				);

				pending.wait().await?
			},
			Admission::Replay => {
				self.refresh_metrics.record_replay();
				tracing::debug!(
					method = %request.method(),
					path = request.path(),
					"Replaying request sent with a superseded token."
				);

				self.access_token().await?.ok_or_else(|| unauthorized(&request))?
			},
		};
		let response = self.dispatch(&request, Some(&token)).await?;

		if response.is_unauthorized() {
			return Err(unauthorized(&request));
		}

		Ok(response)
	}

	/// Sends `request`, rejects non-success statuses, and decodes the JSON body.
	pub async fn send_json<T>(&self, request: ApiRequest) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.send(request).await?.error_for_status()?.json()
	}

	/// Sends `request` once with `token`, without 401 recovery.
	pub(crate) async fn dispatch(
		&self,
		request: &ApiRequest,
		token: Option<&TokenSecret>,
	) -> Result<ApiResponse> {
		let http_request = request.to_http(&self.config.base_url, token)?;
		let response = self.http_client.execute(http_request).await?;

		Ok(response.into())
	}

	/// Refreshes through the coordinator outside of a 401, joining an in-flight episode if any.
	pub(crate) async fn refresh_now(&self) -> Result<TokenSecret> {
		let generation = self.coordinator.generation();

		match self.coordinator.admit(generation, "session refresh") {
			Admission::Refresh(episode) => Ok(self.run_refresh_episode(episode).await?),
			Admission::Wait(pending) => Ok(pending.wait().await?),
			Admission::Replay => self
				.access_token()
				.await?
				.ok_or_else(|| RefreshError::MissingRefreshToken.into()),
		}
	}

	async fn run_refresh_episode(
		&self,
		episode: RefreshEpisode<'_>,
	) -> Result<TokenSecret, RefreshError> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_episode");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let outcome = span
			.instrument(async {
				tracing::info!("Refresh episode started.");
				self.refresh_metrics.record_attempt();

				let outcome = self.refresh_stored_session().await;

				match &outcome {
					Ok(token) => {
						self.refresh_metrics.record_success();
						tracing::info!(access = %token.fingerprint(), "Refresh succeeded.");
					},
					Err(e) => {
						self.refresh_metrics.record_failure();
						tracing::warn!(error = %e, "Refresh failed.");
					},
				}

				outcome
			})
			.await;
		let released = episode.finish(outcome.clone());

		tracing::debug!(released = released.len(), "Refresh episode finished.");

		match &outcome {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		outcome
	}

	/// Exchanges the stored refresh token and writes the result back to the same session.
	///
	/// Credentials are cleared only while the store still holds the exchanged refresh token; a
	/// session replaced or cleared mid-episode by login or logout is left alone.
	async fn refresh_stored_session(&self) -> Result<TokenSecret, RefreshError> {
		let refresh_token = match self.stored_refresh_token().await {
			Ok(refresh_token) => refresh_token,
			Err(e) => {
				self.sign_out_locally(SignOutReason::RefreshFailed).await;

				return Err(e);
			},
		};

		match self.exchange_refresh_token(&refresh_token).await {
			Ok(WriteBack::Rotated(access)) => Ok(access),
			Ok(WriteBack::Superseded(access)) => {
				tracing::info!(
					access = %access.fingerprint(),
					"Session was replaced while refreshing; keeping the newer credentials."
				);

				Ok(access)
			},
			Ok(WriteBack::Cleared) => {
				tracing::info!("Session was cleared while refreshing; discarding the refreshed token.");

				Err(RefreshError::Abandoned)
			},
			Err(e) => {
				if self.still_holds(&refresh_token).await {
					self.sign_out_locally(SignOutReason::RefreshFailed).await;
				}

				Err(e)
			},
		}
	}

	async fn stored_refresh_token(&self) -> Result<TokenSecret, RefreshError> {
		self.store
			.load()
			.await
			.map_err(RefreshError::storage)?
			.and_then(|session| session.refresh_token)
			.ok_or(RefreshError::MissingRefreshToken)
	}

	async fn exchange_refresh_token(
		&self,
		refresh_token: &TokenSecret,
	) -> Result<WriteBack, RefreshError> {
		tracing::debug!(refresh = %refresh_token.fingerprint(), "Exchanging refresh token.");

		let request = ApiRequest::post(endpoints::TOKEN_REFRESH)
			.json(&RefreshBody { refresh: refresh_token.expose() })
			.map_err(RefreshError::encoding)?;
		let response = self.dispatch(&request, None).await.map_err(RefreshError::network)?;

		if !response.is_success() {
			let ApiError { status, message } = ApiError::from_body(response.status, &response.body);

			return Err(RefreshError::Rejected { status, message });
		}

		let issued: RefreshedTokens = serde_json::from_slice(&response.body)
			.map_err(|e| RefreshError::MalformedResponse { message: e.to_string() })?;
		let outcome = self
			.store
			.rotate(refresh_token, issued.access.clone(), issued.refresh)
			.await
			.map_err(RefreshError::storage)?;

		match outcome {
			RotateOutcome::Updated => Ok(WriteBack::Rotated(issued.access)),
			RotateOutcome::RefreshMismatch => Ok(self
				.access_token()
				.await
				.map_err(RefreshError::storage)?
				.map_or(WriteBack::Cleared, WriteBack::Superseded)),
			RotateOutcome::Missing => Ok(WriteBack::Cleared),
		}
	}

	async fn still_holds(&self, refresh_token: &TokenSecret) -> bool {
		match self.store.load().await {
			Ok(session) => session
				.and_then(|session| session.refresh_token)
				.is_some_and(|stored| &stored == refresh_token),
			Err(_) => true,
		}
	}

	async fn access_token(&self) -> Result<Option<TokenSecret>> {
		Ok(self.store.load().await?.map(|session| session.access_token))
	}

	/// Persists a freshly issued session and publishes [`SessionStatus::Authenticated`].
	pub(crate) async fn establish(&self, session: StoredSession) -> Result<()> {
		self.store.save(session).await?;
		self.coordinator.advance();
		self.publish(SessionStatus::Authenticated);

		Ok(())
	}

	/// Clears stored credentials and publishes [`SessionStatus::SignedOut`] with `reason`.
	///
	/// Store failures are logged; the session is considered ended regardless.
	pub(crate) async fn sign_out_locally(&self, reason: SignOutReason) {
		if let Err(e) = self.store.clear().await {
			tracing::warn!(error = %e, reason = reason.as_str(), "Failed to clear stored credentials.");
		}

		self.coordinator.advance();
		self.publish(SessionStatus::SignedOut(reason));
	}

	pub(crate) fn publish(&self, status: SessionStatus) {
		let previous = self.session.send_replace(status);

		if previous != status {
			tracing::info!(?previous, current = ?status, "Session status changed.");
		}
	}

	pub(crate) fn session_guard(&self) -> &AsyncMutex<()> {
		&self.session_guard
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestHttpClient> {
	/// Creates a client with a reqwest transport honoring the configured timeout and user agent.
	pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
		let http_client = ReqwestHttpClient::from_config(&config)?;

		Ok(Self::with_http_client(config, store, http_client))
	}
}
impl<C> Clone for ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			refresh_metrics: self.refresh_metrics.clone(),
			http_client: self.http_client.clone(),
			store: self.store.clone(),
			config: self.config.clone(),
			coordinator: self.coordinator.clone(),
			session: self.session.clone(),
			session_guard: self.session_guard.clone(),
		}
	}
}
impl<C> Debug for ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("session", &self.session_status())
			.field("refreshing", &self.is_refreshing())
			.finish()
	}
}

#[derive(Serialize)]
struct RefreshBody<'a> {
	refresh: &'a str,
}

/// Where a refreshed access token ended up.
enum WriteBack {
	/// Written into the session whose refresh token was exchanged.
	Rotated(TokenSecret),
	/// Discarded; a newer session was stored meanwhile and its access token is returned instead.
	Superseded(TokenSecret),
	/// Discarded; the session was cleared meanwhile.
	Cleared,
}

#[derive(Deserialize)]
struct RefreshedTokens {
	access: TokenSecret,
	#[serde(default)]
	refresh: Option<TokenSecret>,
}

fn unauthorized(request: &ApiRequest) -> Error {
	Error::Unauthorized { method: request.method().to_string(), path: request.path().to_owned() }
}
