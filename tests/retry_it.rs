// crates.io
use serde_json::json;
use tokio::time::Instant;
// self
use ra_client::{
	_preludet::*,
	auth::CredentialPair,
	config::ClientProfile,
	error::FailureKind,
};

fn ok_body() -> Value {
	json!({ "success": true, "data": { "status": "open" } })
}

#[tokio::test(start_paused = true)]
async fn mobile_retries_timeouts_with_linear_backoff() {
	let (client, transport, _) = build_scripted_client(
		ClientProfile::Mobile,
		[Scripted::Timeout, Scripted::Timeout, Scripted::Respond(200, ok_body())],
	);
	let started = Instant::now();
	let body = client.get("/road-status").await.expect("Third attempt should succeed.");

	assert_eq!(body, ok_body());
	assert_eq!(transport.calls(), 3);
	assert_eq!(started.elapsed(), Duration::from_millis(3_000));
}

#[tokio::test(start_paused = true)]
async fn persistent_network_failures_exhaust_retries() {
	let (client, transport, _) = build_scripted_client(
		ClientProfile::Mobile,
		[Scripted::Network, Scripted::Network, Scripted::Network],
	);
	let started = Instant::now();
	let err = client.get("/news").await.expect_err("Every attempt fails.");

	assert!(matches!(err, Error::RetriesExhausted { retries: 2, kind: FailureKind::Network, .. }));
	assert_eq!(transport.calls(), 3);
	assert_eq!(started.elapsed(), Duration::from_millis(3_000));
}

#[tokio::test(start_paused = true)]
async fn hung_requests_are_cut_by_the_profile_timeout_and_retried() {
	let (client, transport, _) = build_scripted_client(
		ClientProfile::Mobile,
		[Scripted::Hang, Scripted::Respond(200, ok_body())],
	);
	let started = Instant::now();

	client.get("/road-status").await.expect("Second attempt should succeed.");

	assert_eq!(transport.calls(), 2);
	assert_eq!(started.elapsed(), Duration::from_millis(16_000));
}

#[tokio::test(start_paused = true)]
async fn admin_profile_never_retries() {
	let (client, transport, _) =
		build_scripted_client(ClientProfile::Admin, [Scripted::Hang]);
	let started = Instant::now();
	let err = client.get("/dashboard").await.expect_err("The request should time out.");

	assert!(matches!(err, Error::Timeout { timeout, .. } if timeout == Duration::from_secs(30)));
	assert_eq!(transport.calls(), 1);
	assert_eq!(started.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn http_errors_are_not_retried() {
	let (client, transport, _) = build_scripted_client(
		ClientProfile::Mobile,
		[Scripted::Respond(503, json!({ "success": false, "message": "maintenance" }))],
	);
	let err = client.get("/news").await.expect_err("A 503 should surface.");

	assert_eq!(err.status(), Some(503));
	assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_call_is_retried_on_network_failure() {
	let (client, transport, _) = build_scripted_client(
		ClientProfile::Mobile,
		[
			Scripted::Respond(401, json!({ "success": false })),
			Scripted::Network,
			Scripted::Respond(200, json!({ "success": true, "data": { "accessToken": "fresh" } })),
			Scripted::Respond(200, ok_body()),
		],
	);

	client
		.store()
		.set_tokens(&CredentialPair::new("stale", "refresh-1"))
		.await
		.expect("Seeding tokens should succeed.");

	let started = Instant::now();

	client.get("/news").await.expect("Request should succeed after a retried refresh.");

	let requests = transport.requests();

	assert_eq!(requests.len(), 4);
	assert_eq!(requests[1].url.path(), "/api/app-users/refresh");
	assert_eq!(requests[2].url.path(), "/api/app-users/refresh");
	assert_eq!(requests[3].header("authorization"), Some("Bearer fresh"));
	assert_eq!(started.elapsed(), Duration::from_millis(1_000));
}

#[tokio::test(start_paused = true)]
async fn replay_after_refresh_gets_a_fresh_retry_budget() {
	let (client, transport, _) = build_scripted_client(
		ClientProfile::Mobile,
		[
			Scripted::Timeout,
			Scripted::Respond(401, json!({ "success": false })),
			Scripted::Respond(200, json!({ "success": true, "data": { "accessToken": "fresh" } })),
			Scripted::Timeout,
			Scripted::Timeout,
			Scripted::Respond(200, ok_body()),
		],
	);

	client
		.store()
		.set_tokens(&CredentialPair::new("stale", "refresh-1"))
		.await
		.expect("Seeding tokens should succeed.");

	let started = Instant::now();

	client.get("/news").await.expect("The replay should succeed on its last retry.");

	assert_eq!(transport.calls(), 6);
	assert_eq!(started.elapsed(), Duration::from_millis(4_000));
}
