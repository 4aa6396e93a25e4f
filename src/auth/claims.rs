//! Unverified JWT claim decoding for local expiry checks.
//!
//! The backend signs its tokens; the client never validates signatures. It only peeks at the
//! payload's `exp` claim to decide whether a stored token is still worth presenting, the same
//! way the console decided whether to restore a session or refresh first.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::_prelude::*;

/// Errors raised while decoding a token payload.
#[derive(Debug, ThisError)]
pub enum ClaimsError {
	/// Token does not have the `header.payload.signature` shape.
	#[error("Token is not a three-segment JWT.")]
	Malformed,
	/// Payload segment is not valid base64url.
	#[error("Token payload is not valid base64url.")]
	Encoding(#[from] base64::DecodeError),
	/// Payload is not the expected JSON object.
	#[error("Token payload is not valid claims JSON.")]
	Json(#[from] serde_json::Error),
}

/// Subset of registered and backend-specific claims the client reads.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
	/// Expiry instant (`exp`).
	#[serde(default, with = "time::serde::timestamp::option")]
	pub exp: Option<OffsetDateTime>,
	/// Issued-at instant (`iat`).
	#[serde(default, with = "time::serde::timestamp::option")]
	pub iat: Option<OffsetDateTime>,
	/// Token kind marker (`access` or `refresh`).
	#[serde(default)]
	pub token_type: Option<String>,
}
impl TokenClaims {
	/// Decodes the payload segment of `token` without verifying its signature.
	pub fn decode(token: &str) -> Result<Self, ClaimsError> {
		let mut segments = token.split('.');
		let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
			(Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
			_ => return Err(ClaimsError::Malformed),
		};
		let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;

		Ok(serde_json::from_slice(&bytes)?)
	}

	/// Returns `true` if the token is expired at `now`, treating tokens within `leeway` of
	/// their expiry as already expired. Tokens without `exp`, or whose deadline falls outside
	/// the representable range, are treated as expired.
	pub fn is_expired_at(&self, now: OffsetDateTime, leeway: Duration) -> bool {
		match self.exp {
			Some(exp) => exp.checked_sub(leeway).is_none_or(|deadline| deadline <= now),
			None => true,
		}
	}
}

/// Returns `true` if `token` decodes and is not expired at `now` (minus `leeway`).
///
/// Undecodable tokens count as expired.
pub fn is_token_live(token: &str, now: OffsetDateTime, leeway: Duration) -> bool {
	TokenClaims::decode(token).map(|claims| !claims.is_expired_at(now, leeway)).unwrap_or(false)
}
