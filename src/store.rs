//! Storage contracts and built-in store implementations for the persisted session.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{StoredSession, TokenSecret},
};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by credential stores.
///
/// A store holds at most one [`StoredSession`]. Every mutation replaces the session
/// atomically: readers observe either the previous or the next credential pair, never a mix.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the stored session, if any.
	fn load(&self) -> StoreFuture<'_, Option<StoredSession>>;

	/// Persists or replaces the stored session.
	fn save(&self, session: StoredSession) -> StoreFuture<'_, ()>;

	/// Atomically replaces the access token (and the refresh token when rotated) if the stored
	/// session still carries `expected_refresh`.
	fn rotate<'a>(
		&'a self,
		expected_refresh: &'a TokenSecret,
		access_token: TokenSecret,
		refresh_token: Option<TokenSecret>,
	) -> StoreFuture<'a, RotateOutcome>;

	/// Removes the access token, refresh token, and user together.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Result of a token rotation attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotateOutcome {
	/// The stored session now carries the new tokens.
	Updated,
	/// A different session was stored in the meantime (e.g. a newer login); nothing was written.
	RefreshMismatch,
	/// No session was stored (e.g. cleared by a concurrent logout); nothing was written.
	Missing,
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

pub(crate) fn rotate_in_place(
	slot: &mut Option<StoredSession>,
	expected_refresh: &TokenSecret,
	access_token: TokenSecret,
	refresh_token: Option<TokenSecret>,
) -> RotateOutcome {
	match slot.as_mut() {
		Some(session) if session.refresh_token.as_ref() == Some(expected_refresh) => {
			session.rotate(access_token, refresh_token);

			RotateOutcome::Updated
		},
		Some(_) => RotateOutcome::RefreshMismatch,
		None => RotateOutcome::Missing,
	}
}
