//! Unverified `id_token` claim decoding.
//!
//! The token is obtained directly from the provider's token endpoint over TLS, so the
//! adapter only extracts claims and never checks the JWT signature.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Map, Number, Value};
// self
use crate::{_prelude::*, error::IdentityTokenError};

/// Claims read from the provider-issued `id_token`.
///
/// Decoding fails when `internal_identifier` or `email` is present with a non-string value;
/// expiry reconciliation reads `exp` alone through [`decode_expiry_unverified`].
///
/// Decoded on demand and never persisted separately from the token bundle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityClaims {
	/// Absolute expiry (seconds since the UNIX epoch).
	#[serde(default)]
	pub exp: Option<Number>,
	/// Stable per-user identifier assigned by the provider.
	#[serde(default)]
	pub internal_identifier: Option<String>,
	/// Account email, used only as a display label.
	#[serde(default)]
	pub email: Option<String>,
}
impl IdentityClaims {
	/// Decodes the payload segment of `token` without verifying its signature.
	pub fn decode_unverified(token: &str) -> Result<Self, IdentityTokenError> {
		decode_payload(token)
	}

	/// Returns the `exp` claim as an absolute timestamp.
	///
	/// A missing, `null`, or zero `exp` is reported as [`IdentityTokenError::MissingExpiryClaim`].
	pub fn expiry(&self) -> Result<f64, IdentityTokenError> {
		expiry_of(self.exp.as_ref())
	}

	/// Derives the account identity surfaced to the host, if the identifier claim is present.
	pub fn account_identity(&self) -> Option<AccountIdentity> {
		AccountIdentity::from_claims(self)
	}
}

/// Account identity recorded on a config entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountIdentity {
	/// Lower-cased `internal_identifier`; the entry's unique id.
	pub unique_id: String,
	/// Lower-cased email when present, otherwise the unique id.
	pub title: String,
}
impl AccountIdentity {
	/// Builds the identity from decoded claims. Returns `None` when the identifier is absent
	/// or empty.
	pub fn from_claims(claims: &IdentityClaims) -> Option<Self> {
		let unique_id = claims.internal_identifier.as_deref()?.to_lowercase();

		if unique_id.is_empty() {
			return None;
		}

		let title = claims
			.email
			.as_deref()
			.map(str::to_lowercase)
			.filter(|email| !email.is_empty())
			.unwrap_or_else(|| unique_id.clone());

		Some(Self { unique_id, title })
	}
}

#[derive(Deserialize)]
struct ExpiryClaim {
	#[serde(default)]
	exp: Option<Number>,
}

/// Reads only the `exp` claim of `token`, ignoring every other claim.
///
/// Fails on a structural decode error, a non-numeric `exp`, or a missing one.
pub fn decode_expiry_unverified(token: &str) -> Result<f64, IdentityTokenError> {
	let ExpiryClaim { exp } = decode_payload(token)?;

	expiry_of(exp.as_ref())
}

fn expiry_of(exp: Option<&Number>) -> Result<f64, IdentityTokenError> {
	exp.and_then(Number::as_f64)
		.filter(|exp| *exp != 0.0)
		.ok_or(IdentityTokenError::MissingExpiryClaim)
}

fn decode_payload<T>(token: &str) -> Result<T, IdentityTokenError>
where
	T: serde::de::DeserializeOwned,
{
	let mut segments = token.split('.');
	let (Some(header), Some(payload), Some(_signature), None) =
		(segments.next(), segments.next(), segments.next(), segments.next())
	else {
		return Err(IdentityTokenError::malformed("expected three dot-separated segments"));
	};

	decode_segment::<Map<String, Value>>("header", header)?;

	decode_segment("payload", payload)
}

fn decode_segment<T>(name: &str, segment: &str) -> Result<T, IdentityTokenError>
where
	T: serde::de::DeserializeOwned,
{
	let bytes = URL_SAFE_NO_PAD
		.decode(segment.trim_end_matches('='))
		.map_err(|e| IdentityTokenError::malformed(format!("invalid base64 in {name}: {e}")))?;

	serde_json::from_slice(&bytes)
		.map_err(|e| IdentityTokenError::malformed(format!("invalid JSON in {name}: {e}")))
}
