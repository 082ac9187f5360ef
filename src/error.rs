//! Crate-level error types shared across flows, sessions, and the integration lifecycle.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Config-entry storage failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::entry::StoreError,
	),
	/// The `id_token` could not be used to reconcile or identify the account.
	#[error(transparent)]
	IdentityToken(#[from] IdentityTokenError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Provider rejected the grant (e.g., bad code or refresh token).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or adapter-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or the client identifier is not accepted.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or adapter-supplied reason string.
		reason: String,
	},
	/// Requested scopes exceed what the provider grants.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Provider- or adapter-supplied reason string.
		reason: String,
	},
	/// The stored credentials cannot be used; the host must start a re-authentication flow.
	///
	/// Never retried automatically.
	#[error("Authentication required: {reason}.")]
	AuthenticationRequired {
		/// Human-readable reason surfaced to the host.
		reason: String,
		/// Failure that triggered the classification, when one exists.
		#[source]
		source: Option<Box<Error>>,
	},
	/// No config entry exists for the identifier.
	#[error("Config entry `{entry_id}` does not exist.")]
	UnknownEntry {
		/// Identifier that failed to resolve.
		entry_id: String,
	},
}
impl Error {
	/// Builds an [`Error::AuthenticationRequired`] without an underlying cause.
	pub fn authentication_required(reason: impl Into<String>) -> Self {
		Self::AuthenticationRequired { reason: reason.into(), source: None }
	}

	/// Reclassifies any failure as [`Error::AuthenticationRequired`], keeping it as the source.
	pub fn reauth_from(reason: impl Into<String>, source: Error) -> Self {
		Self::AuthenticationRequired { reason: reason.into(), source: Some(Box::new(source)) }
	}

	/// Returns `true` when the host should prompt the user to re-authenticate.
	pub fn requires_reauth(&self) -> bool {
		matches!(self, Self::AuthenticationRequired { .. })
	}
}

/// Failures raised while reading the `id_token` carried by a token bundle.
///
/// All variants are fatal to the enclosing token acquisition; no partially reconciled
/// bundle is ever returned.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentityTokenError {
	/// The bundle has no (or an empty) `id_token`.
	#[error("Token response does not contain an id_token.")]
	MissingIdentityToken,
	/// The `id_token` is not a structurally valid JWT.
	#[error("Failed to decode id_token: {reason}.")]
	MalformedIdentityToken {
		/// Decoder-supplied reason string.
		reason: String,
	},
	/// The decoded claims carry no `exp`.
	#[error("The id_token has no exp claim.")]
	MissingExpiryClaim,
}
impl IdentityTokenError {
	pub(crate) fn malformed(reason: impl Display) -> Self {
		Self::MalformedIdentityToken { reason: reason.to_string() }
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ProviderDescriptorError),
	/// An identifier failed validation.
	#[error(transparent)]
	Identifier(#[from] crate::auth::IdentifierError),
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Stored token bundle is missing a refresh secret.
	#[error("Stored token bundle is missing a refresh token.")]
	MissingRefreshToken,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// The config entry references an OAuth2 implementation that is not registered.
	#[error("OAuth2 implementation `{name}` is not registered.")]
	ImplementationUnavailable {
		/// Implementation name recorded in the entry.
		name: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
