//! Session flows: login, registration, logout, restoration, expiry watch, and password reset.
//!
//! Auth endpoints are called without 401 recovery; a rejected login is an ordinary
//! [`Error::Api`], never a refresh trigger. Flows that replace or remove the stored session run
//! one at a time behind the client's session guard.

// std
use std::time::Duration as StdDuration;
// crates.io
use rand::Rng;
// self
use super::RefreshBody;
use crate::{
	_prelude::*,
	auth::{self, SessionStatus, SignOutReason, StoredSession, TokenSecret, UserProfile},
	client::{ApiClient, ApiRequest, ApiResponse},
	endpoints,
	http::ApiHttpClient,
	obs::{self, FlowKind},
};

const MIN_PASSWORD_LEN: usize = 8;
const WATCH_JITTER_MAX_MS: u64 = 5_000;

/// Account registration form.
#[derive(Clone)]
pub struct RegisterRequest {
	/// Display name.
	pub name: String,
	/// Login email.
	pub email: String,
	/// Account password; at least eight characters.
	pub password: String,
	/// Contact phone number.
	pub phone: String,
}
impl RegisterRequest {
	/// Creates a registration form.
	pub fn new(
		name: impl Into<String>,
		email: impl Into<String>,
		password: impl Into<String>,
		phone: impl Into<String>,
	) -> Self {
		Self { name: name.into(), email: email.into(), password: password.into(), phone: phone.into() }
	}

	/// Checks the form locally before anything is sent.
	pub fn validate(&self) -> Result<()> {
		if self.name.trim().is_empty() {
			return Err(Error::invalid_input("name is required"));
		}
		if self.email.trim().is_empty() {
			return Err(Error::invalid_input("email is required"));
		}
		if self.password.chars().count() < MIN_PASSWORD_LEN {
			return Err(Error::invalid_input(format!(
				"password must be at least {MIN_PASSWORD_LEN} characters"
			)));
		}

		Ok(())
	}

	fn body(&self) -> RegisterBody<'_> {
		RegisterBody {
			name: self.name.trim(),
			email: self.email.trim(),
			password: &self.password,
			confirm_password: &self.password,
			phone: self.phone.trim(),
		}
	}
}
impl Debug for RegisterRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RegisterRequest")
			.field("name", &self.name)
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.field("phone", &self.phone)
			.finish()
	}
}

#[derive(Serialize)]
struct RegisterBody<'a> {
	name: &'a str,
	email: &'a str,
	password: &'a str,
	#[serde(rename = "confirmPassword")]
	confirm_password: &'a str,
	phone: &'a str,
}

#[derive(Serialize)]
struct LoginBody<'a> {
	email: &'a str,
	password: &'a str,
}

#[derive(Serialize)]
struct EmailBody<'a> {
	email: &'a str,
}

#[derive(Serialize)]
struct VerifyCodeBody<'a> {
	email: &'a str,
	code: &'a str,
}

#[derive(Serialize)]
struct ResetPasswordBody<'a> {
	token: &'a str,
	password: &'a str,
	password2: &'a str,
}

#[derive(Deserialize)]
struct ResetToken {
	token: TokenSecret,
}

#[derive(Deserialize)]
struct IssuedSession {
	access: TokenSecret,
	refresh: TokenSecret,
	user: UserProfile,
}
impl IssuedSession {
	fn into_parts(self) -> (StoredSession, UserProfile) {
		let session = StoredSession::new(self.access, self.refresh).with_user(self.user.clone());

		(session, self.user)
	}
}

impl<C> ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Signs in with email and password, persisting the issued session.
	pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
		obs::observe(FlowKind::Login, "login", async {
			let email = email.trim();

			if email.is_empty() || password.is_empty() {
				return Err(Error::invalid_input("email and password are required"));
			}

			let _guard = self.session_guard().lock().await;
			let issued: IssuedSession =
				self.post_auth(endpoints::LOGIN, &LoginBody { email, password }).await?.json()?;
			let (session, user) = issued.into_parts();

			self.establish(session).await?;

			Ok(user)
		})
		.await
	}

	/// Registers a new account and signs it in.
	pub async fn register(&self, request: RegisterRequest) -> Result<UserProfile> {
		obs::observe(FlowKind::Register, "register", async {
			request.validate()?;

			let _guard = self.session_guard().lock().await;
			let issued: IssuedSession =
				self.post_auth(endpoints::REGISTER, &request.body()).await?.json()?;
			let (session, user) = issued.into_parts();

			self.establish(session).await?;

			Ok(user)
		})
		.await
	}

	/// Logs out on the server (best-effort) and clears the stored session.
	pub async fn logout(&self) -> Result<()> {
		obs::observe(FlowKind::Logout, "logout", async {
			let _guard = self.session_guard().lock().await;

			self.logout_locked(SignOutReason::UserRequested).await;

			Ok(())
		})
		.await
	}

	/// Restores the stored session at start-up.
	///
	/// A live access token is accepted without a network call. Otherwise a live refresh token is
	/// exchanged through the refresh coordinator. When both have expired the session is logged
	/// out with [`SignOutReason::SessionExpired`].
	pub async fn restore_session(&self) -> Result<SessionStatus> {
		obs::observe(FlowKind::Restore, "restore_session", async {
			let _guard = self.session_guard().lock().await;

			self.restore_locked().await
		})
		.await
	}

	/// Runs [`ApiClient::restore_session`] if the stored access token has expired.
	///
	/// Returns the current status unchanged when no session is stored or the token is live.
	pub async fn check_session(&self) -> Result<SessionStatus> {
		let expired = self
			.store()
			.load()
			.await?
			.is_some_and(|session| !self.is_live(&session.access_token));

		if expired { self.restore_session().await } else { Ok(self.session_status()) }
	}

	/// Periodically checks the session until it is signed out.
	///
	/// Ticks every [`ClientConfig::session_check_interval`](crate::config::ClientConfig) plus a
	/// small random jitter. Transient check failures are logged and retried on the next tick.
	pub async fn watch_session(&self) -> Result<()> {
		loop {
			if self.session_status().is_signed_out() {
				return Ok(());
			}

			let jitter = rand::rng().random_range(0..=WATCH_JITTER_MAX_MS);

			tokio::time::sleep(
				self.config().session_check_interval + StdDuration::from_millis(jitter),
			)
			.await;

			match self.check_session().await {
				Ok(status) if status.is_signed_out() => return Ok(()),
				Ok(_) => {},
				Err(_) if self.session_status().is_signed_out() => return Ok(()),
				Err(e) => tracing::warn!(error = %e, "Session check failed."),
			}
		}
	}

	/// Emails a password reset link to `email`.
	pub async fn request_password_reset_link(&self, email: &str) -> Result<()> {
		obs::observe(FlowKind::PasswordReset, "request_password_reset_link", async {
			let email = non_empty_email(email)?;

			self.post_auth(endpoints::PASSWORD_RESET_LINK, &EmailBody { email }).await?;

			Ok(())
		})
		.await
	}

	/// Emails a password reset code to `email`.
	pub async fn request_reset_code(&self, email: &str) -> Result<()> {
		obs::observe(FlowKind::PasswordReset, "request_reset_code", async {
			let email = non_empty_email(email)?;

			self.post_auth(endpoints::PASSWORD_RESET_CODE, &EmailBody { email }).await?;

			Ok(())
		})
		.await
	}

	/// Exchanges an emailed reset code for a reset token.
	pub async fn verify_reset_code(&self, email: &str, code: &str) -> Result<TokenSecret> {
		obs::observe(FlowKind::PasswordReset, "verify_reset_code", async {
			let email = non_empty_email(email)?;
			let code = code.trim();

			if code.is_empty() {
				return Err(Error::invalid_input("reset code is required"));
			}

			let issued: ResetToken = self
				.post_auth(endpoints::PASSWORD_RESET_VERIFY, &VerifyCodeBody { email, code })
				.await?
				.json()?;

			Ok(issued.token)
		})
		.await
	}

	/// Sets a new password using a token from [`ApiClient::verify_reset_code`].
	pub async fn reset_password(
		&self,
		token: &TokenSecret,
		password: &str,
		confirmation: &str,
	) -> Result<()> {
		obs::observe(FlowKind::PasswordReset, "reset_password", async {
			if password.is_empty() {
				return Err(Error::invalid_input("password is required"));
			}
			if password != confirmation {
				return Err(Error::invalid_input("passwords don't match"));
			}

			let body =
				ResetPasswordBody { token: token.expose(), password, password2: confirmation };

			self.post_auth(endpoints::PASSWORD_RESET_CONFIRM, &body).await?;

			Ok(())
		})
		.await
	}

	async fn restore_locked(&self) -> Result<SessionStatus> {
		let Some(session) = self.store().load().await? else {
			if self.session_status().is_authenticated() {
				self.sign_out_locally(SignOutReason::SessionExpired).await;
			}

			return Ok(self.session_status());
		};

		if self.is_live(&session.access_token) {
			tracing::debug!(access = %session.access_token.fingerprint(), "Stored access token is live.");
			self.publish(SessionStatus::Authenticated);

			return Ok(SessionStatus::Authenticated);
		}
		if session.refresh_token.as_ref().is_some_and(|refresh| self.is_live(refresh)) {
			self.refresh_now().await?;
			self.publish(SessionStatus::Authenticated);

			return Ok(SessionStatus::Authenticated);
		}

		self.logout_locked(SignOutReason::SessionExpired).await;

		Ok(self.session_status())
	}

	async fn logout_locked(&self, reason: SignOutReason) {
		match self.store().load().await {
			Ok(Some(session)) =>
				if let Some(refresh) = &session.refresh_token {
					self.revoke_on_server(&session.access_token, refresh).await;
				},
			Ok(None) => {},
			Err(e) => tracing::warn!(error = %e, "Failed to load credentials for logout."),
		}

		self.sign_out_locally(reason).await;
	}

	async fn revoke_on_server(&self, access: &TokenSecret, refresh: &TokenSecret) {
		let request = match ApiRequest::post(endpoints::LOGOUT)
			.json(&RefreshBody { refresh: refresh.expose() })
		{
			Ok(request) => request,
			Err(e) => {
				tracing::warn!(error = %e, "Failed to encode logout request.");

				return;
			},
		};

		match self.dispatch(&request, Some(access)).await.and_then(ApiResponse::error_for_status) {
			Ok(_) => tracing::debug!(refresh = %refresh.fingerprint(), "Server logout succeeded."),
			Err(e) => tracing::warn!(error = %e, "Server logout failed; clearing local credentials."),
		}
	}

	async fn post_auth<B>(&self, path: &str, body: &B) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		let request = ApiRequest::post(path).json(body)?;

		self.dispatch(&request, None).await?.error_for_status()
	}

	fn is_live(&self, token: &TokenSecret) -> bool {
		auth::is_token_live(token.expose(), OffsetDateTime::now_utc(), self.config().expiry_leeway)
	}
}

fn non_empty_email(email: &str) -> Result<&str> {
	let email = email.trim();

	if email.is_empty() { Err(Error::invalid_input("email is required")) } else { Ok(email) }
}
