//! Thread-safe in-memory [`CredentialStore`] implementation for short-lived processes and tests.

// self
use crate::{
	_prelude::*,
	auth::{StoredSession, TokenSecret},
	store::{self, CredentialStore, RotateOutcome, StoreFuture},
};

type SessionSlot = Arc<RwLock<Option<StoredSession>>>;

/// Thread-safe storage backend that keeps the session in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(SessionSlot);
impl MemoryStore {
	/// Creates a store pre-seeded with `session`.
	pub fn with_session(session: StoredSession) -> Self {
		Self(Arc::new(RwLock::new(Some(session))))
	}

	/// Synchronous snapshot of the stored session.
	pub fn snapshot(&self) -> Option<StoredSession> {
		self.0.read().clone()
	}
}
impl CredentialStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, Option<StoredSession>> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(slot.read().clone()) })
	}

	fn save(&self, session: StoredSession) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			*slot.write() = Some(session);

			Ok(())
		})
	}

	fn rotate<'a>(
		&'a self,
		expected_refresh: &'a TokenSecret,
		access_token: TokenSecret,
		refresh_token: Option<TokenSecret>,
	) -> StoreFuture<'a, RotateOutcome> {
		let slot = self.0.clone();

		Box::pin(async move {
			Ok(store::rotate_in_place(
				&mut slot.write(),
				expected_refresh,
				access_token,
				refresh_token,
			))
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			slot.write().take();

			Ok(())
		})
	}
}
