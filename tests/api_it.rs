#![cfg(feature = "reqwest")]

mod common;

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use afrinet_client::{
	auth::StoredSession,
	client::ReqwestApiClient,
	endpoints,
	error::{ApiError, Error},
	store::MemoryStore,
};
use common::*;

fn build_client(server: &MockServer) -> ReqwestApiClient {
	let store = MemoryStore::with_session(StoredSession::new("A1", "R1"));

	ReqwestApiClient::new(config(&server.base_url()), Arc::new(store))
		.expect("Reqwest client should build for the mock backend.")
}

#[tokio::test]
async fn active_users_and_stats_decode_with_bearer() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let users = server
		.mock_async(|when, then| {
			when.method(GET)
				.path(endpoints::ACTIVE_USERS)
				.header("authorization", "Bearer A1")
				.header("accept", "application/json");
			then.status(200).header("content-type", "application/json").body(
				r#"[{"id":9,"username":"A271","phone":"0719235952","ip":"192.168.1.10","package":"6 hours unlimited","expiry":"4 hours from now","upload":"1.2 MB","download":"2.3 MB"}]"#,
			);
		})
		.await;
	let stats = server
		.mock_async(|when, then| {
			when.method(GET).path(endpoints::ACTIVE_USER_STATS);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"total_active":1,"total_upload":"1.2 MB"}"#);
		})
		.await;
	let active = client.active_users().await.expect("Active users should decode.");

	assert_eq!(active.len(), 1);
	assert_eq!(active[0].id, Some(9));
	assert_eq!(active[0].username, "A271");
	assert_eq!(active[0].package, "6 hours unlimited");

	let summary = client.active_user_stats().await.expect("Stats should decode.");

	assert_eq!(summary["total_active"], 1);

	users.assert_async().await;
	stats.assert_async().await;
}

#[tokio::test]
async fn disconnect_user_patches_session_path() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let disconnect = server
		.mock_async(|when, then| {
			when.method(PATCH).path("/api/active-users/42/disconnect/");
			then.status(200).body(r#"{"status":"disconnected"}"#);
		})
		.await;

	client.disconnect_user("42").await.expect("Disconnect should succeed.");

	disconnect.assert_async().await;

	let err = client
		.disconnect_user("42/../../packages")
		.await
		.expect_err("Path-like identifiers should be rejected.");

	assert!(matches!(err, Error::InvalidInput { .. }));
}

#[tokio::test]
async fn packages_surface_status_and_decode_errors() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let mut failing = server
		.mock_async(|when, then| {
			when.method(GET).path(endpoints::PACKAGES);
			then.status(503)
				.header("content-type", "application/json")
				.body(r#"{"message":"Maintenance window"}"#);
		})
		.await;
	let err = client.packages().await.expect_err("A 503 should surface as an API error.");

	assert!(matches!(
		err,
		Error::Api(ApiError { status: 503, ref message }) if message == "Maintenance window"
	));

	failing.delete_async().await;

	let malformed = server
		.mock_async(|when, then| {
			when.method(GET).path(endpoints::PACKAGES);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"[{"package_id":"P1","price":"50.00","popular":"yes"}]"#);
		})
		.await;
	let err = client.packages().await.expect_err("A malformed package should fail to decode.");

	match err {
		Error::Decode { source, status } => {
			assert_eq!(status, 200);
			assert_eq!(source.path().to_string(), "[0].popular");
		},
		other => panic!("Expected a decode error, got {other:?}."),
	}

	malformed.assert_async().await;
}
