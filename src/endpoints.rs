//! Backend paths used by the client, relative to [`ClientConfig::base_url`](crate::config::ClientConfig::base_url).

/// Exchanges a refresh token for a new access token.
pub const TOKEN_REFRESH: &str = "/api/auth/token/refresh/";
/// Password login returning the credential pair and user profile.
pub const LOGIN: &str = "/api/auth/login/";
/// Account registration returning the credential pair and user profile.
pub const REGISTER: &str = "/api/auth/register/";
/// Server-side logout (refresh-token blacklisting).
pub const LOGOUT: &str = "/api/auth/logout/";
/// Emails a password reset link.
pub const PASSWORD_RESET_LINK: &str = "/api/auth/password-reset/";
/// Emails a password reset code.
pub const PASSWORD_RESET_CODE: &str = "/api/auth/request-reset/";
/// Verifies a password reset code and returns a reset token.
pub const PASSWORD_RESET_VERIFY: &str = "/api/auth/verify-code/";
/// Sets a new password using a reset token.
pub const PASSWORD_RESET_CONFIRM: &str = "/api/auth/reset-password/";

/// Hotspot users currently online.
pub const ACTIVE_USERS: &str = "/api/active-users/";
/// Aggregated statistics for online users.
pub const ACTIVE_USER_STATS: &str = "/api/active-users/stats/";
/// Internet packages on sale.
pub const PACKAGES: &str = "/api/packages/";
/// Hotspot sessions.
pub const SESSIONS: &str = "/api/sessions/";

/// Path that disconnects the hotspot session `session_id`.
pub fn disconnect_active_user(session_id: &str) -> String {
	format!("{ACTIVE_USERS}{session_id}/disconnect/")
}
