//! Persisted session state and the session status published to observers.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Console user profile returned by login and registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
	/// Backend primary key, when included.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<u64>,
	/// Login email.
	pub email: String,
	/// Display name.
	#[serde(default)]
	pub name: String,
	/// Contact phone number.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub phone: Option<String>,
	/// Whether the user may access staff-only screens.
	#[serde(default)]
	pub is_staff: bool,
}

/// The credential pair plus user profile persisted across restarts.
///
/// These three items are the only state the client persists; they are written and cleared
/// together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
	/// Short-lived bearer credential.
	pub access_token: TokenSecret,
	/// Longer-lived credential exchanged for new access tokens.
	pub refresh_token: Option<TokenSecret>,
	/// Profile of the signed-in user.
	#[serde(default)]
	pub user: Option<UserProfile>,
}
impl StoredSession {
	/// Creates a session from a freshly issued credential pair.
	pub fn new(access_token: impl Into<TokenSecret>, refresh_token: impl Into<TokenSecret>) -> Self {
		Self {
			access_token: access_token.into(),
			refresh_token: Some(refresh_token.into()),
			user: None,
		}
	}

	/// Attaches the signed-in user's profile.
	pub fn with_user(mut self, user: UserProfile) -> Self {
		self.user = Some(user);

		self
	}

	/// Replaces the access token, and the refresh token when the backend rotated it.
	pub fn rotate(&mut self, access_token: TokenSecret, refresh_token: Option<TokenSecret>) {
		self.access_token = access_token;

		if let Some(refresh) = refresh_token {
			self.refresh_token = Some(refresh);
		}
	}
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignOutReason {
	/// The user logged out.
	UserRequested,
	/// A refresh episode failed; the user must sign in again.
	RefreshFailed,
	/// Both stored tokens had expired when the session was restored.
	SessionExpired,
}
impl SignOutReason {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::UserRequested => "user_requested",
			Self::RefreshFailed => "refresh_failed",
			Self::SessionExpired => "session_expired",
		}
	}
}

/// Session state published by the client.
///
/// `SignedOut(RefreshFailed)` is the hard-logout signal: front ends should route the user back
/// to the login screen when they observe it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionStatus {
	/// No session has been established or restored yet.
	#[default]
	Anonymous,
	/// Credentials are stored and believed valid.
	Authenticated,
	/// Credentials were cleared.
	SignedOut(SignOutReason),
}
impl SessionStatus {
	/// Returns `true` for [`SessionStatus::Authenticated`].
	pub fn is_authenticated(self) -> bool {
		matches!(self, Self::Authenticated)
	}

	/// Returns `true` for any [`SessionStatus::SignedOut`] state.
	pub fn is_signed_out(self) -> bool {
		matches!(self, Self::SignedOut(_))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn rotate_keeps_refresh_token_unless_replaced() {
		let mut session = StoredSession::new("access-1", "refresh-1");

		session.rotate(TokenSecret::new("access-2"), None);

		assert_eq!(session.access_token.expose(), "access-2");
		assert_eq!(session.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-1"));

		session.rotate(TokenSecret::new("access-3"), Some(TokenSecret::new("refresh-2")));

		assert_eq!(session.access_token.expose(), "access-3");
		assert_eq!(session.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-2"));
	}

	#[test]
	fn user_profile_tolerates_sparse_payloads() {
		let user: UserProfile = serde_json::from_str(r#"{"email":"ops@afrinet.test"}"#)
			.expect("Minimal profile should deserialize.");

		assert_eq!(user.email, "ops@afrinet.test");
		assert!(user.name.is_empty());
		assert!(!user.is_staff);
		assert_eq!(
			serde_json::to_string(&user).expect("Profile should serialize."),
			r#"{"email":"ops@afrinet.test","name":"","is_staff":false}"#
		);
	}

	#[test]
	fn debug_output_redacts_tokens() {
		let session = StoredSession::new("access-secret", "refresh-secret");
		let rendered = format!("{session:?}");

		assert!(!rendered.contains("access-secret"));
		assert!(!rendered.contains("refresh-secret"));
	}
}
