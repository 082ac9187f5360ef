//! Token bundle as issued by the token endpoint and persisted by the host.

// self
use crate::{
	_prelude::*,
	auth::{IdentityClaims, decode_expiry_unverified, token::secret::TokenSecret},
	error::IdentityTokenError,
};

/// Token set stored in a config entry's `token` field.
///
/// `expires_at` tracks the `id_token`'s `exp` claim once the bundle has passed through
/// [`reconcile`](crate::auth::reconcile), never the access token's lifetime.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBundle {
	/// Access token secret.
	pub access_token: TokenSecret,
	/// JWT identity token consumed by the energy API.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<TokenSecret>,
	/// Refresh token secret, if the provider issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Token type reported by the provider (normally `bearer`).
	pub token_type: String,
	/// Seconds until expiry at the time of the last reconciliation; may be negative.
	#[serde(default)]
	pub expires_in: i64,
	/// Absolute expiry as UNIX seconds.
	#[serde(default)]
	pub expires_at: f64,
	/// Space-delimited scope echoed by the provider, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
}
impl TokenBundle {
	/// Creates a bearer bundle with no expiry bookkeeping.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			id_token: None,
			refresh_token: None,
			token_type: "bearer".into(),
			expires_in: 0,
			expires_at: 0.,
			scope: None,
		}
	}

	/// Sets the identity token.
	pub fn with_id_token(mut self, token: impl Into<String>) -> Self {
		self.id_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the refresh token.
	pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Applies the generic access-token bookkeeping: `expires_at = now + expires_in`.
	pub fn with_expires_in(mut self, expires_in: i64, now: OffsetDateTime) -> Self {
		self.expires_in = expires_in;
		self.expires_at = unix_seconds(now) + expires_in as f64;

		self
	}

	/// Returns the identity token when present and non-empty.
	pub fn identity_token(&self) -> Option<&str> {
		self.id_token.as_ref().map(TokenSecret::expose).filter(|token| !token.is_empty())
	}

	/// Decodes the identity token's claims without verifying the signature.
	pub fn identity_claims(&self) -> Result<IdentityClaims, IdentityTokenError> {
		let token = self.identity_token().ok_or(IdentityTokenError::MissingIdentityToken)?;

		IdentityClaims::decode_unverified(token)
	}

	/// Reads the identity token's `exp` claim without decoding the other claims.
	pub fn identity_expiry(&self) -> Result<f64, IdentityTokenError> {
		let token = self.identity_token().ok_or(IdentityTokenError::MissingIdentityToken)?;

		decode_expiry_unverified(token)
	}

	/// Returns `true` if the bundle stays valid for more than `skew` past `now`.
	pub fn is_valid_at(&self, now: OffsetDateTime, skew: Duration) -> bool {
		self.expires_at > unix_seconds(now) + skew.as_seconds_f64()
	}

	/// Fills secrets a refresh response omitted from the bundle it replaces.
	///
	/// Providers may skip rotating the refresh token or re-issuing the `id_token`; the
	/// previous values stay in effect in that case.
	pub fn carry_over_from(mut self, previous: &TokenBundle) -> Self {
		if self.refresh_token.is_none() {
			self.refresh_token.clone_from(&previous.refresh_token);
		}
		if self.id_token.is_none() {
			self.id_token.clone_from(&previous.id_token);
		}

		self
	}
}
impl Debug for TokenBundle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenBundle")
			.field("access_token", &"<redacted>")
			.field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.field("expires_at", &self.expires_at)
			.field("scope", &self.scope)
			.finish()
	}
}

/// Converts an instant into fractional UNIX seconds.
pub fn unix_seconds(instant: OffsetDateTime) -> f64 {
	instant.unix_timestamp_nanos() as f64 / 1_000_000_000.
}
