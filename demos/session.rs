//! Demonstrates a login followed by an admin call whose access token has expired: the client
//! refreshes once against a mock backend and replays the call with the new token.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use afrinet_client::{
	client::ReqwestApiClient,
	config::ClientConfig,
	store::{CredentialStore, MemoryStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let login_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/login/");
			then.status(200).header("content-type", "application/json").body(
				r#"{"access":"stale-access","refresh":"demo-refresh","user":{"email":"ops@afrinet.test","name":"Ops","is_staff":true}}"#,
			);
		})
		.await;
	let expired_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/packages/")
				.header("authorization", "Bearer stale-access");
			then.status(401).body(r#"{"detail":"Given token not valid for any token type"}"#);
		})
		.await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/auth/token/refresh/")
				.json_body(serde_json::json!({ "refresh": "demo-refresh" }));
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access":"fresh-access"}"#);
		})
		.await;
	let packages_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/packages/")
				.header("authorization", "Bearer fresh-access");
			then.status(200).header("content-type", "application/json").body(
				r#"[{"package_id":"P1","price":"50.00","duration":"1 Day","speed":"5 Mbps","popular":true}]"#,
			);
		})
		.await;
	let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::default());
	let config = ClientConfig::builder().base_url_str(&server.base_url())?.build()?;
	let client = ReqwestApiClient::new(config, store)?;
	let user = client.login("ops@afrinet.test", "correct-horse").await?;

	println!("Signed in as {} ({:?}).", user.name, client.session_status());

	let packages = client.packages().await?;

	println!("Fetched {} package(s) after one refresh:", packages.len());

	for package in &packages {
		println!("- {} at {} for Ksh {}", package.package_id, package.speed, package.price);
	}

	login_mock.assert_async().await;
	expired_mock.assert_async().await;
	refresh_mock.assert_async().await;
	packages_mock.assert_async().await;

	println!(
		"Refresh attempts: {}, successes: {}.",
		client.refresh_metrics.attempts(),
		client.refresh_metrics.successes()
	);

	client.logout().await?;

	println!("Session after logout: {:?}.", client.session_status());

	Ok(())
}
