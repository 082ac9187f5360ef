//! Expiry reconciliation against the `id_token`'s `exp` claim.
//!
//! The provider issues an access token valid for about a day but an `id_token` valid for
//! about thirty minutes. Only the `id_token` works against the energy API, so every bundle
//! leaving the token endpoint has its expiry fields rewritten to the `id_token`'s `exp`.

// self
use crate::{
	_prelude::*,
	auth::token::bundle::{TokenBundle, unix_seconds},
	error::IdentityTokenError,
};

/// Rewrites `expires_at`/`expires_in` to follow the `id_token` using the current clock.
pub fn reconcile(mut bundle: TokenBundle) -> Result<TokenBundle, IdentityTokenError> {
	reconcile_at(&mut bundle, OffsetDateTime::now_utc())?;

	Ok(bundle)
}

/// Rewrites `expires_at`/`expires_in` in place relative to `now`.
///
/// `expires_at` becomes the `exp` claim verbatim and `expires_in` becomes `exp - now`
/// truncated toward zero. A negative `expires_in` is kept as-is so the host's validity
/// check triggers an immediate refresh. Only `exp` is read from the token; no other field
/// is touched, and the bundle is left unmodified on error.
pub fn reconcile_at(bundle: &mut TokenBundle, now: OffsetDateTime) -> Result<(), IdentityTokenError> {
	let exp = bundle.identity_expiry()?;
	let expires_in = (exp - unix_seconds(now)) as i64;

	bundle.expires_at = exp;
	bundle.expires_in = expires_in;

	tracing::debug!(expires_in, "Adjusted token expiry to id_token exp.");

	Ok(())
}
