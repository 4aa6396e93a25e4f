//! Typed helpers for the console's admin endpoints.
//!
//! Every helper goes through [`ApiClient::send`], so an expired access token is refreshed and the
//! call replayed transparently. Non-success statuses surface as [`Error::Api`].

// crates.io
use serde::Deserializer;
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	client::{ApiClient, ApiRequest},
	endpoints,
	http::ApiHttpClient,
};

/// Hotspot user currently online.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveUser {
	/// Session identifier accepted by [`ApiClient::disconnect_user`].
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<u64>,
	/// Hotspot login name.
	pub username: String,
	/// Phone number used for payment, or `-` for trial users.
	pub phone: String,
	/// Leased IP address.
	pub ip: String,
	/// Package label.
	pub package: String,
	/// Human-readable time until the session ends.
	pub expiry: String,
	/// Uploaded volume.
	pub upload: String,
	/// Downloaded volume.
	pub download: String,
}

/// Internet package on sale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
	/// Backend primary key.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<u64>,
	/// Short package code.
	pub package_id: String,
	/// Display name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub package_name: Option<String>,
	/// Decimal price in shillings, kept as text to avoid rounding.
	#[serde(deserialize_with = "decimal_text")]
	pub price: String,
	/// Duration label (e.g. `1 Hour`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub duration: Option<String>,
	/// Numeric duration, paired with `duration_unit`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub duration_value: Option<u32>,
	/// Unit of `duration_value`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub duration_unit: Option<String>,
	/// Speed label (e.g. `10 Mbps`).
	#[serde(default)]
	pub speed: String,
	/// Whether the package is highlighted.
	#[serde(default)]
	pub popular: bool,
}

impl<C> ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Lists hotspot users currently online.
	pub async fn active_users(&self) -> Result<Vec<ActiveUser>> {
		self.send_json(ApiRequest::get(endpoints::ACTIVE_USERS)).await
	}

	/// Disconnects the hotspot session `session_id`.
	pub async fn disconnect_user(&self, session_id: &str) -> Result<()> {
		let session_id = session_id.trim();

		if session_id.is_empty() || session_id.contains(['/', '?', '#']) {
			return Err(Error::invalid_input(format!("`{session_id}` is not a session identifier")));
		}

		self.send(ApiRequest::patch(endpoints::disconnect_active_user(session_id)))
			.await?
			.error_for_status()?;

		Ok(())
	}

	/// Aggregated statistics for online users, as returned by the backend.
	pub async fn active_user_stats(&self) -> Result<Map<String, Value>> {
		self.send_json(ApiRequest::get(endpoints::ACTIVE_USER_STATS)).await
	}

	/// Lists packages on sale.
	pub async fn packages(&self) -> Result<Vec<Package>> {
		self.send_json(ApiRequest::get(endpoints::PACKAGES)).await
	}

	/// Lists hotspot sessions as raw JSON records.
	pub async fn sessions(&self) -> Result<Vec<Value>> {
		self.send_json(ApiRequest::get(endpoints::SESSIONS)).await
	}
}

fn decimal_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Decimal {
		Text(String),
		Number(serde_json::Number),
	}

	Ok(match Decimal::deserialize(deserializer)? {
		Decimal::Text(text) => text,
		Decimal::Number(number) => number.to_string(),
	})
}
