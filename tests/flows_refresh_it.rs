#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use duke_energy_auth::{
	_preludet::*,
	auth::TokenBundle,
	error::{ConfigError, TransientError},
};

fn seeded_bundle(id_exp: i64) -> TokenBundle {
	TokenBundle::new("access-old")
		.with_refresh_token("refresh-old")
		.with_id_token(fake_id_token(serde_json::json!({ "exp": id_exp })))
}

#[tokio::test]
async fn refresh_keeps_refresh_token_and_reconciles() {
	let server = MockServer::start_async().await;
	let implementation = build_reqwest_test_implementation(&mock_settings(&server.base_url()));
	let exp = unix_now() + 1_800;
	let new_id_token = fake_id_token(serde_json::json!({ "exp": exp }));
	let body = serde_json::json!({
		"access_token": "access-new",
		"id_token": new_id_token,
		"token_type": "Bearer",
		"expires_in": 86_400,
	})
	.to_string();
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-old");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await;
	let refreshed = implementation
		.refresh(&seeded_bundle(unix_now() - 60))
		.await
		.expect("Refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(refreshed.access_token.expose(), "access-new");
	assert_eq!(refreshed.refresh_token.as_ref().map(|secret| secret.expose()), Some("refresh-old"));
	assert_eq!(refreshed.identity_token(), Some(new_id_token.as_str()));
	assert_eq!(refreshed.expires_at, exp as f64);
	assert!((1_790..=1_800).contains(&refreshed.expires_in));
}

#[tokio::test]
async fn refresh_without_new_id_token_reconciles_previous_one() {
	let server = MockServer::start_async().await;
	let implementation = build_reqwest_test_implementation(&mock_settings(&server.base_url()));
	let previous_exp = unix_now() + 600;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(
					"{\"access_token\":\"access-new\",\"refresh_token\":\"refresh-new\",\"token_type\":\"bearer\",\"expires_in\":86400}",
				);
		})
		.await;
	let refreshed = implementation
		.refresh(&seeded_bundle(previous_exp))
		.await
		.expect("Refresh should succeed with a carried-over id_token.");

	mock.assert_async().await;

	assert_eq!(refreshed.refresh_token.as_ref().map(|secret| secret.expose()), Some("refresh-new"));
	assert_eq!(refreshed.expires_at, previous_exp as f64);
}

#[tokio::test]
async fn refresh_reconciles_despite_unexpected_identity_claims() {
	let server = MockServer::start_async().await;
	let implementation = build_reqwest_test_implementation(&mock_settings(&server.base_url()));
	let exp = unix_now() + 1_800;
	let body = serde_json::json!({
		"access_token": "access-new",
		"id_token": fake_id_token(serde_json::json!({
			"exp": exp,
			"internal_identifier": 12_345,
			"email": ["jane@example.com"],
		})),
		"token_type": "Bearer",
		"expires_in": 86_400,
	})
	.to_string();
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await;
	let refreshed = implementation
		.refresh(&seeded_bundle(unix_now() - 60))
		.await
		.expect("Only the exp claim should matter for a refresh.");

	mock.assert_async().await;

	assert_eq!(refreshed.expires_at, exp as f64);
}

#[tokio::test]
async fn refresh_requires_a_refresh_token() {
	let server = MockServer::start_async().await;
	let implementation = build_reqwest_test_implementation(&mock_settings(&server.base_url()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(500);
		})
		.await;
	let bundle = TokenBundle::new("access-only")
		.with_id_token(fake_id_token(serde_json::json!({ "exp": unix_now() })));
	let err = implementation
		.refresh(&bundle)
		.await
		.expect_err("Refreshing without a refresh token must fail.");

	assert!(matches!(err, Error::Config(ConfigError::MissingRefreshToken)));

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn refresh_invalid_grant_surfaces_to_caller() {
	let server = MockServer::start_async().await;
	let implementation = build_reqwest_test_implementation(&mock_settings(&server.base_url()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(403)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"Unknown or invalid refresh token.\"}");
		})
		.await;
	let err = implementation
		.refresh(&seeded_bundle(unix_now()))
		.await
		.expect_err("Invalid grant errors should surface to the caller.");

	mock.assert_async().await;

	assert!(matches!(err, Error::InvalidGrant { .. }));
}

#[tokio::test]
async fn refresh_server_errors_are_transient() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let implementation = build_reqwest_test_implementation(&mock_settings(&server.base_url()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(503)
				.header("content-type", "application/json")
				.header("retry-after", "30")
				.body("{\"error\":\"temporarily_unavailable\"}");
		})
		.await;
	let err = implementation.refresh(&seeded_bundle(unix_now())).await.err();

	mock.assert_async().await;

	match err {
		Some(Error::Transient(TransientError::TokenEndpoint {
			status,
			retry_after,
			..
		})) => {
			assert_eq!(status, Some(503));
			assert_eq!(retry_after, Some(Duration::seconds(30)));
		},
		other => color_eyre::eyre::bail!("Unexpected refresh outcome: {other:?}"),
	}

	Ok(())
}
