//! Token-endpoint error classification.
//!
//! Strategies map provider error payloads into the crate's error taxonomy without tying
//! flows to any particular HTTP client.

// self
use crate::{_prelude::*, provider::descriptor::GrantType};

/// Strategy hook that classifies token endpoint failures.
pub trait ProviderStrategy: Send + Sync {
	/// Maps OAuth error fields and HTTP metadata into a canonical category.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;
}

/// Canonical provider error categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// Provider rejected the authorization grant (bad code/refresh token).
	InvalidGrant,
	/// Client authentication failed.
	InvalidClient,
	/// Requested scopes exceed what the client may obtain.
	InsufficientScope,
	/// Failure is temporary and should be retried.
	Transient,
}

/// Context passed to provider strategies when classifying token errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant type associated with the failing request.
	pub grant_type: GrantType,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
}
impl ProviderErrorContext {
	/// Creates a new context scoped to the provided grant type.
	pub fn new(grant_type: GrantType) -> Self {
		Self { grant_type, http_status: None, oauth_error: None, error_description: None }
	}

	/// Adds an HTTP status code (e.g., 400, 401, 500).
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}
}

/// Auth0-flavored classification.
///
/// Auth0 answers a revoked or rotated refresh token with `invalid_grant` (sometimes
/// `access_denied`); both mean the stored credentials are dead. Unknown codes fall back to
/// the HTTP status.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		ctx.oauth_error
			.as_deref()
			.and_then(classify_code)
			.unwrap_or_else(|| classify_status(ctx.http_status))
	}
}

fn classify_code(code: &str) -> Option<ProviderErrorKind> {
	match code.to_ascii_lowercase().as_str() {
		"invalid_grant" | "access_denied" => Some(ProviderErrorKind::InvalidGrant),
		"invalid_client" | "unauthorized_client" => Some(ProviderErrorKind::InvalidClient),
		"invalid_scope" | "insufficient_scope" => Some(ProviderErrorKind::InsufficientScope),
		"temporarily_unavailable" | "server_error" | "too_many_attempts" =>
			Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 403) => ProviderErrorKind::InvalidGrant,
		Some(401) => ProviderErrorKind::InvalidClient,
		_ => ProviderErrorKind::Transient,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn oauth_codes_take_precedence_over_status() {
		let strategy = DefaultProviderStrategy;
		let ctx = ProviderErrorContext::new(GrantType::RefreshToken)
			.with_http_status(500)
			.with_oauth_error("invalid_grant")
			.with_error_description("Unknown or invalid refresh token.");

		assert_eq!(strategy.classify_token_error(&ctx), ProviderErrorKind::InvalidGrant);

		let ctx = ProviderErrorContext::new(GrantType::AuthorizationCode)
			.with_http_status(400)
			.with_oauth_error("unauthorized_client");

		assert_eq!(strategy.classify_token_error(&ctx), ProviderErrorKind::InvalidClient);
	}

	#[test]
	fn unknown_codes_fall_back_to_status() {
		let strategy = DefaultProviderStrategy;
		let ctx = ProviderErrorContext::new(GrantType::RefreshToken)
			.with_http_status(401)
			.with_oauth_error("mfa_required");

		assert_eq!(strategy.classify_token_error(&ctx), ProviderErrorKind::InvalidClient);

		let ctx = ProviderErrorContext::new(GrantType::AuthorizationCode)
			.with_http_status(503)
			.with_oauth_error("invalid_request");

		assert_eq!(strategy.classify_token_error(&ctx), ProviderErrorKind::Transient);
		assert_eq!(
			strategy
				.classify_token_error(&ProviderErrorContext::new(GrantType::RefreshToken)
					.with_http_status(503)),
			ProviderErrorKind::Transient
		);
	}
}
