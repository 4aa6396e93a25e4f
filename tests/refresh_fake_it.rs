//! Refresh coordination driven by a scripted transport for deterministic failure injection.

mod common;

// std
use std::{io, sync::Arc};
// crates.io
use http::{StatusCode, header::AUTHORIZATION};
use tokio::sync::Notify;
// self
use afrinet_client::{
	auth::{SessionStatus, SignOutReason, StoredSession, TokenSecret},
	client::ApiRequest,
	endpoints,
	error::{Error, RefreshError, TransportError},
};
use common::*;

const EXPIRED_BODY: &str = r#"{"detail":"Given token not valid for any token type","code":"token_not_valid"}"#;
const LOGIN_BODY: &str = r#"{"access":"NEW-A","refresh":"NEW-R","user":{"id":9,"email":"ops@afrinet.test","name":"Ops","is_staff":true}}"#;

fn expect_refresh_error(result: Result<afrinet_client::client::ApiResponse, Error>) -> RefreshError {
	match result {
		Err(Error::Refresh(e)) => e,
		other => panic!("Expected a refresh failure, got {other:?}."),
	}
}

#[tokio::test]
async fn refresh_rejection_fails_whole_cohort_and_clears_once() {
	let gate = Arc::new(Notify::new());
	let http_client = FakeHttpClient::new(|request| {
		if request.uri().path() == endpoints::TOKEN_REFRESH {
			Ok(json_response(
				StatusCode::UNAUTHORIZED,
				r#"{"detail":"Token is blacklisted","code":"token_not_valid"}"#,
			))
		} else {
			Ok(json_response(StatusCode::UNAUTHORIZED, EXPIRED_BODY))
		}
	})
	.with_refresh_gate(gate.clone());
	let store = CountingStore::with_session(StoredSession::new("T1", "R1"));
	let (client, http_client) = fake_client(http_client, store.clone());
	let mut status = client.subscribe();
	let release = async {
		while client.pending_requests() < 2 {
			tokio::task::yield_now().await;
		}

		gate.notify_one();
	};
	let (a, b, c, ()) = tokio::join!(
		client.send(ApiRequest::get(endpoints::PACKAGES)),
		client.send(ApiRequest::get(endpoints::SESSIONS)),
		client.send(ApiRequest::get(endpoints::ACTIVE_USERS)),
		release,
	);
	let errors = [a, b, c].into_iter().map(expect_refresh_error).collect::<Vec<_>>();

	assert!(errors.iter().all(|e| e == &errors[0]), "Cohort should share one failure: {errors:?}.");
	assert!(matches!(
		&errors[0],
		RefreshError::Rejected { status: 401, message } if message == "Token is blacklisted"
	));
	assert_eq!(http_client.calls_to(endpoints::TOKEN_REFRESH), 1);
	assert_eq!(store.clears(), 1);
	assert!(store.inner.snapshot().is_none());
	assert_eq!(
		*status.borrow_and_update(),
		SessionStatus::SignedOut(SignOutReason::RefreshFailed)
	);
	assert_eq!(client.refresh_metrics.attempts(), 1);
	assert_eq!(client.refresh_metrics.failures(), 1);
	assert_eq!(client.refresh_metrics.queued(), 2);
	assert!(!client.is_refreshing());
}

#[tokio::test]
async fn refresh_network_error_fails_request_and_signs_out() {
	let http_client = FakeHttpClient::new(|request| {
		if request.uri().path() == endpoints::TOKEN_REFRESH {
			Err(TransportError::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")))
		} else {
			Ok(json_response(StatusCode::UNAUTHORIZED, EXPIRED_BODY))
		}
	});
	let store = CountingStore::with_session(StoredSession::new("T1", "R1"));
	let (client, http_client) = fake_client(http_client, store.clone());
	let err = expect_refresh_error(client.send(ApiRequest::get(endpoints::PACKAGES)).await);

	assert!(matches!(err, RefreshError::Network { .. }));
	assert_eq!(http_client.calls_to(endpoints::TOKEN_REFRESH), 1);
	assert_eq!(http_client.calls_to(endpoints::PACKAGES), 1);
	assert_eq!(store.clears(), 1);
	assert!(store.inner.snapshot().is_none());
	assert_eq!(client.session_status(), SessionStatus::SignedOut(SignOutReason::RefreshFailed));
}

#[tokio::test]
async fn missing_refresh_token_is_terminal_without_network() {
	let http_client =
		FakeHttpClient::new(|_| Ok(json_response(StatusCode::UNAUTHORIZED, EXPIRED_BODY)));
	let store = CountingStore::with_session(StoredSession {
		access_token: TokenSecret::new("T1"),
		refresh_token: None,
		user: None,
	});
	let (client, http_client) = fake_client(http_client, store.clone());
	let err = expect_refresh_error(client.send(ApiRequest::get(endpoints::SESSIONS)).await);

	assert_eq!(err, RefreshError::MissingRefreshToken);
	assert_eq!(http_client.calls_to(endpoints::TOKEN_REFRESH), 0);
	assert_eq!(store.clears(), 1);
}

#[tokio::test]
async fn replayed_request_is_not_refreshed_twice() {
	let http_client = FakeHttpClient::new(|request| {
		if request.uri().path() == endpoints::TOKEN_REFRESH {
			Ok(json_response(StatusCode::OK, r#"{"access":"T2"}"#))
		} else {
			Ok(json_response(StatusCode::UNAUTHORIZED, r#"{"detail":"Staff only"}"#))
		}
	});
	let store = CountingStore::with_session(StoredSession::new("T1", "R1"));
	let (client, http_client) = fake_client(http_client, store.clone());
	let err = client
		.send(ApiRequest::get(endpoints::ACTIVE_USER_STATS))
		.await
		.expect_err("A second 401 should be terminal.");

	assert!(matches!(
		err,
		Error::Unauthorized { ref method, ref path }
			if method == "GET" && path == endpoints::ACTIVE_USER_STATS
	));
	assert_eq!(http_client.calls_to(endpoints::TOKEN_REFRESH), 1);

	let authorizations = http_client
		.seen()
		.into_iter()
		.filter(|seen| seen.path == endpoints::ACTIVE_USER_STATS)
		.map(|seen| seen.authorization)
		.collect::<Vec<_>>();

	assert_eq!(authorizations, vec![Some("Bearer T1".to_owned()), Some("Bearer T2".to_owned())]);
	assert_eq!(
		store.inner.snapshot().map(|session| session.access_token),
		Some(TokenSecret::new("T2"))
	);
	assert_eq!(store.clears(), 0);
}

#[tokio::test]
async fn non_unauthorized_statuses_pass_through() {
	let http_client = FakeHttpClient::new(|request| match request.uri().path() {
		endpoints::PACKAGES => Ok(json_response(StatusCode::INTERNAL_SERVER_ERROR, "{}")),
		_ => Ok(json_response(StatusCode::FORBIDDEN, r#"{"detail":"Forbidden"}"#)),
	});
	let store = CountingStore::with_session(StoredSession::new("T1", "R1"));
	let (client, http_client) = fake_client(http_client, store);
	let server_error = client
		.send(ApiRequest::get(endpoints::PACKAGES))
		.await
		.expect("A 500 should be returned, not converted.");
	let forbidden = client
		.send(ApiRequest::get(endpoints::SESSIONS))
		.await
		.expect("A 403 should be returned, not converted.");

	assert_eq!(server_error.status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
	assert_eq!(http_client.calls_to(endpoints::TOKEN_REFRESH), 0);
	assert!(http_client.seen().iter().all(|seen| seen.authorization.as_deref() == Some("Bearer T1")));
}

#[tokio::test]
async fn dropped_refresher_releases_waiters_as_abandoned() {
	let gate = Arc::new(Notify::new());
	let http_client =
		FakeHttpClient::new(|_| Ok(json_response(StatusCode::UNAUTHORIZED, EXPIRED_BODY)))
			.with_refresh_gate(gate);
	let store = CountingStore::with_session(StoredSession::new("T1", "R1"));
	let (client, _) = fake_client(http_client, store.clone());
	let refresher = tokio::spawn({
		let client = client.clone();

		async move { client.send(ApiRequest::get(endpoints::PACKAGES)).await }
	});

	while !client.is_refreshing() {
		tokio::task::yield_now().await;
	}

	let waiter = tokio::spawn({
		let client = client.clone();

		async move { client.send(ApiRequest::get(endpoints::SESSIONS)).await }
	});

	while client.pending_requests() < 1 {
		tokio::task::yield_now().await;
	}

	refresher.abort();

	let result = waiter.await.expect("Waiter task should not panic.");

	assert_eq!(expect_refresh_error(result), RefreshError::Abandoned);
	assert!(!client.is_refreshing());
	assert_eq!(store.clears(), 0);
}

#[tokio::test]
async fn login_during_refresh_keeps_the_newer_session() {
	let gate = Arc::new(Notify::new());
	let http_client = FakeHttpClient::new(|request| {
		let bearer = request.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok());

		match request.uri().path() {
			endpoints::TOKEN_REFRESH => Ok(json_response(StatusCode::OK, r#"{"access":"OLD-T2"}"#)),
			endpoints::LOGIN => Ok(json_response(StatusCode::OK, LOGIN_BODY)),
			_ if bearer == Some("Bearer NEW-A") => Ok(json_response(StatusCode::OK, "[]")),
			_ => Ok(json_response(StatusCode::UNAUTHORIZED, EXPIRED_BODY)),
		}
	})
	.with_refresh_gate(gate.clone());
	let store = CountingStore::with_session(StoredSession::new("T1", "R1"));
	let (client, http_client) = fake_client(http_client, store.clone());
	let relogin = async {
		while !client.is_refreshing() {
			tokio::task::yield_now().await;
		}

		client
			.login("ops@afrinet.test", "pa55word")
			.await
			.expect("Login should succeed while a refresh is in flight.");
		gate.notify_one();
	};
	let (response, ()) = tokio::join!(client.send(ApiRequest::get(endpoints::PACKAGES)), relogin);
	let response = response.expect("Request should be replayed under the newer session.");

	assert!(response.is_success());

	let stored = store.inner.snapshot().expect("Newer session should stay stored.");

	assert_eq!(stored.access_token.expose(), "NEW-A");
	assert_eq!(stored.refresh_token.as_ref().map(TokenSecret::expose), Some("NEW-R"));
	assert!(stored.user.is_some());
	assert_eq!(store.rotations(), 1);
	assert_eq!(store.clears(), 0);
	assert_eq!(client.session_status(), SessionStatus::Authenticated);
	assert_eq!(
		http_client
			.seen()
			.into_iter()
			.filter(|seen| seen.path == endpoints::PACKAGES)
			.map(|seen| seen.authorization)
			.collect::<Vec<_>>(),
		vec![Some("Bearer T1".to_owned()), Some("Bearer NEW-A".to_owned())]
	);
}

#[tokio::test]
async fn logout_during_refresh_keeps_the_user_sign_out() {
	let gate = Arc::new(Notify::new());
	let http_client = FakeHttpClient::new(|request| match request.uri().path() {
		endpoints::TOKEN_REFRESH => Ok(json_response(StatusCode::OK, r#"{"access":"T2"}"#)),
		endpoints::LOGOUT => Ok(json_response(StatusCode::OK, "{}")),
		_ => Ok(json_response(StatusCode::UNAUTHORIZED, EXPIRED_BODY)),
	})
	.with_refresh_gate(gate.clone());
	let store = CountingStore::with_session(StoredSession::new("T1", "R1"));
	let (client, http_client) = fake_client(http_client, store.clone());
	let logout = async {
		while !client.is_refreshing() {
			tokio::task::yield_now().await;
		}

		client.logout().await.expect("Logout should succeed while a refresh is in flight.");
		gate.notify_one();
	};
	let (result, ()) = tokio::join!(client.send(ApiRequest::get(endpoints::SESSIONS)), logout);

	assert_eq!(expect_refresh_error(result), RefreshError::Abandoned);
	assert_eq!(http_client.calls_to(endpoints::LOGOUT), 1);
	assert_eq!(store.clears(), 1);
	assert!(store.inner.snapshot().is_none());
	assert_eq!(client.session_status(), SessionStatus::SignedOut(SignOutReason::UserRequested));
	assert!(!client.is_refreshing());
}
