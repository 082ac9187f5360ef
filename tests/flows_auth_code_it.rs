#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use duke_energy_auth::{
	_preludet::*,
	error::IdentityTokenError,
	flows::{ExternalData, PkceCodeChallengeMethod},
	provider::DukeEnergySettings,
};

fn token_body(id_token: Option<&str>) -> String {
	let mut body = serde_json::json!({
		"access_token": "access-success",
		"refresh_token": "refresh-success",
		"token_type": "Bearer",
		"expires_in": 86_400,
		"scope": "openid profile email offline_access",
	});

	if let Some(id_token) = id_token {
		body["id_token"] = id_token.into();
	}

	body.to_string()
}

#[tokio::test]
async fn exchange_reconciles_expiry_to_id_token() {
	let server = MockServer::start_async().await;
	let settings = mock_settings(&server.base_url());
	let implementation = build_reqwest_test_implementation(&settings);
	let session = implementation.start_authorization();

	assert_eq!(session.code_challenge_method(), PkceCodeChallengeMethod::S256);
	assert_eq!(session.redirect_uri.as_str(), DukeEnergySettings::default().redirect_uri);

	let authorize_pairs: HashMap<_, _> = session.authorize_url.query_pairs().into_owned().collect();

	assert_eq!(authorize_pairs.get("scope"), Some(&"openid profile email offline_access".into()));
	assert_eq!(authorize_pairs.get("auth0Client"), Some(&settings.auth0_client));
	assert_eq!(authorize_pairs.get("state"), Some(&session.state));
	assert!(authorize_pairs.contains_key("nonce"));

	let exp = unix_now() + 1_800;
	let id_token = fake_id_token(serde_json::json!({
		"exp": exp,
		"internal_identifier": "ABC123",
		"email": "Jane@Example.com",
	}));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "valid-code")
				.form_urlencoded_tuple("client_id", settings.client_id.as_str())
				.form_urlencoded_tuple("redirect_uri", settings.redirect_uri.as_str());
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body(Some(&id_token)));
		})
		.await;
	let state = session.state.clone();
	let bundle = implementation
		.exchange_authorization_result(ExternalData::new(session, "valid-code", state))
		.await
		.expect("Authorization code exchange should succeed.");

	mock.assert_async().await;

	assert_eq!(bundle.access_token.expose(), "access-success");
	assert_eq!(bundle.identity_token(), Some(id_token.as_str()));
	assert_eq!(bundle.expires_at, exp as f64);
	assert!((1_790..=1_800).contains(&bundle.expires_in), "expires_in must follow the id_token.");
}

#[tokio::test]
async fn missing_id_token_fails_the_exchange() {
	let server = MockServer::start_async().await;
	let implementation = build_reqwest_test_implementation(&mock_settings(&server.base_url()));
	let session = implementation.start_authorization();
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(token_body(None));
		})
		.await;
	let state = session.state.clone();
	let err = implementation
		.exchange_authorization_result(ExternalData::new(session, "code", state))
		.await
		.expect_err("A response without id_token must not produce a bundle.");

	mock.assert_async().await;

	assert!(matches!(err, Error::IdentityToken(IdentityTokenError::MissingIdentityToken)));
}

#[tokio::test]
async fn exchange_classifies_invalid_grant_errors() {
	let server = MockServer::start_async().await;
	let implementation = build_reqwest_test_implementation(&mock_settings(&server.base_url()));
	let session = implementation.start_authorization();
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(403)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"Invalid authorization code\"}");
		})
		.await;
	let state = session.state.clone();
	let err = implementation
		.exchange_authorization_result(ExternalData::new(session, "stale-code", state))
		.await
		.expect_err("Invalid grant errors should be classified correctly.");

	mock.assert_async().await;

	assert!(matches!(err, Error::InvalidGrant { .. }));
}

#[tokio::test]
async fn state_mismatch_never_reaches_token_endpoint() {
	let server = MockServer::start_async().await;
	let implementation = build_reqwest_test_implementation(&mock_settings(&server.base_url()));
	let session = implementation.start_authorization();
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(token_body(None));
		})
		.await;
	let err = implementation
		.exchange_authorization_result(ExternalData::new(session, "code", "forged-state"))
		.await
		.expect_err("Mismatched state must be rejected.");

	assert!(matches!(err, Error::InvalidGrant { .. }));

	mock.assert_calls_async(0).await;
}

#[test]
fn every_authorization_gets_a_fresh_nonce_and_state() {
	let implementation = build_reqwest_test_implementation(&DukeEnergySettings::default());
	let first = implementation.start_authorization();
	let second = implementation.start_authorization();
	let nonce = |url: &Url| {
		url.query_pairs()
			.find(|(key, _)| key == "nonce")
			.map(|(_, value)| value.into_owned())
			.expect("Authorize URL should carry a nonce.")
	};

	assert_ne!(nonce(&first.authorize_url), nonce(&second.authorize_url));
	assert_ne!(first.state, second.state);
	assert_ne!(first.code_challenge(), second.code_challenge());
}
