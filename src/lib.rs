//! Duke Energy OAuth 2.0 + PKCE adapter for home-automation hosts.
//!
//! The crate drives the provider's Auth0-backed PKCE login on behalf of a host platform,
//! reconciles token expiry against the short-lived `id_token` the energy API actually
//! consumes, and bridges the host's OAuth session to an identity-token accessor for the
//! downstream energy-usage client.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod entry;
pub mod error;
pub mod flows;
pub mod http;
pub mod implementation;
pub mod integration;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod session;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests.

	pub use crate::_prelude::*;

	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use crate::{
		http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper,
		provider::{DukeEnergyImplementation, DukeEnergySettings},
	};

	/// Implementation type alias used by reqwest-backed integration tests.
	pub type ReqwestTestImplementation =
		DukeEnergyImplementation<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Settings whose endpoints point at a mock server rooted at `base`.
	pub fn mock_settings(base: &str) -> DukeEnergySettings {
		let base = base.trim_end_matches('/');

		DukeEnergySettings {
			authorize_url: format!("{base}/authorize"),
			token_url: format!("{base}/oauth/token"),
			..DukeEnergySettings::default()
		}
	}

	/// Constructs a [`DukeEnergyImplementation`] against the provided settings using the
	/// insecure test transport.
	pub fn build_reqwest_test_implementation(
		settings: &DukeEnergySettings,
	) -> ReqwestTestImplementation {
		DukeEnergyImplementation::with_http_client(
			settings,
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.expect("Mock settings should produce a valid implementation.")
	}

	/// Encodes an unsigned JWT (`alg: none`) carrying the provided claims.
	pub fn fake_id_token(claims: serde_json::Value) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
		let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

		format!("{header}.{payload}.c2lnbmF0dXJl")
	}

	/// Current UNIX time in whole seconds.
	pub fn unix_now() -> i64 {
		OffsetDateTime::now_utc().unix_timestamp()
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, duke_energy_auth as _, httpmock as _};
