//! Identity-token accessor for the downstream energy API client.

// self
use crate::{
	_prelude::*,
	auth::{AccountIdentity, IdentityClaims},
	error::IdentityTokenError,
	session::{OAuth2Session, SessionFuture},
};

/// Source of a currently valid `id_token`, as consumed by the energy API client.
pub trait IdentityTokenSource
where
	Self: Send + Sync,
{
	/// Returns an `id_token` that is valid right now.
	fn identity_token(&self) -> SessionFuture<'_, String>;
}

/// Binds a host [`OAuth2Session`] to [`IdentityTokenSource`].
///
/// `H` is the HTTP handle the energy API client shares with the host.
pub struct IdentityTokenAuth<S, H>
where
	S: ?Sized + OAuth2Session,
{
	http_client: H,
	session: Arc<S>,
	account: Option<AccountIdentity>,
}
impl<S, H> IdentityTokenAuth<S, H>
where
	S: ?Sized + OAuth2Session,
{
	/// Wraps `session`.
	///
	/// The account identity is decoded from the current `id_token` when one is present. A
	/// decode failure is only logged; the token is validated again before any real use.
	pub fn new(http_client: H, session: Arc<S>) -> Self {
		let account = session.current_token().identity_token().and_then(|raw| {
			match IdentityClaims::decode_unverified(raw) {
				Ok(claims) => claims.account_identity(),
				Err(e) => {
					tracing::warn!(error = %e, "Failed to decode id_token for account details.");

					None
				},
			}
		});

		Self { http_client, session, account }
	}

	/// Account decoded at construction, if any.
	pub fn account(&self) -> Option<&AccountIdentity> {
		self.account.as_ref()
	}

	/// HTTP handle shared with the energy API client.
	pub fn http_client(&self) -> &H {
		&self.http_client
	}

	/// Underlying host session.
	pub fn session(&self) -> &Arc<S> {
		&self.session
	}

	/// Ensures the session token is valid, then returns its `id_token`.
	///
	/// Errors from the validity check are propagated unchanged.
	pub async fn get_identity_token(&self) -> Result<String> {
		self.session.ensure_valid().await?;
		self.session
			.current_token()
			.identity_token()
			.map(str::to_owned)
			.ok_or_else(|| IdentityTokenError::MissingIdentityToken.into())
	}
}
impl<S, H> IdentityTokenSource for IdentityTokenAuth<S, H>
where
	S: ?Sized + OAuth2Session,
	H: Send + Sync,
{
	fn identity_token(&self) -> SessionFuture<'_, String> {
		Box::pin(self.get_identity_token())
	}
}
impl<S, H> Debug for IdentityTokenAuth<S, H>
where
	S: ?Sized + OAuth2Session,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityTokenAuth").field("account", &self.account).finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use super::*;
	use crate::auth::TokenBundle;

	struct StaticSession {
		token: TokenBundle,
		checks: AtomicUsize,
		fail: bool,
	}
	impl StaticSession {
		fn new(token: TokenBundle) -> Self {
			Self { token, checks: AtomicUsize::new(0), fail: false }
		}
	}
	impl OAuth2Session for StaticSession {
		fn ensure_valid(&self) -> SessionFuture<'_, ()> {
			self.checks.fetch_add(1, Ordering::SeqCst);

			let fail = self.fail;

			Box::pin(async move {
				if fail {
					Err(Error::InvalidGrant { reason: "refresh token revoked".into() })
				} else {
					Ok(())
				}
			})
		}

		fn current_token(&self) -> TokenBundle {
			self.token.clone()
		}
	}

	fn id_token(payload: &str) -> String {
		format!(
			"{}.{}.sig",
			URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#),
			URL_SAFE_NO_PAD.encode(payload)
		)
	}

	#[tokio::test]
	async fn validates_before_returning_identity_token() {
		let token = TokenBundle::new("access").with_id_token(id_token(
			r#"{"exp":1,"internal_identifier":"ABC123","email":"Jane@Example.com"}"#,
		));
		let session = Arc::new(StaticSession::new(token.clone()));
		let auth = IdentityTokenAuth::new((), session.clone());

		assert_eq!(
			auth.account().map(|account| account.unique_id.as_str()),
			Some("abc123")
		);

		let id = auth.get_identity_token().await.expect("Valid session yields the id_token.");

		assert_eq!(Some(id.as_str()), token.identity_token());
		assert_eq!(session.checks.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn undecodable_token_is_not_fatal_at_construction() {
		let session =
			Arc::new(StaticSession::new(TokenBundle::new("access").with_id_token("garbage")));
		let auth = IdentityTokenAuth::new((), session);

		assert!(auth.account().is_none());
		assert_eq!(
			auth.get_identity_token().await.expect("The raw id_token is still returned."),
			"garbage"
		);
	}

	#[tokio::test]
	async fn validity_errors_propagate_unchanged() {
		let mut session = StaticSession::new(TokenBundle::new("access").with_id_token("a.b.c"));

		session.fail = true;

		let auth = IdentityTokenAuth::new((), Arc::new(session));
		let err = auth.identity_token().await.expect_err("Session failure must surface.");

		assert!(matches!(err, Error::InvalidGrant { .. }));
	}

	#[tokio::test]
	async fn missing_identity_token_fails_after_validation() {
		let auth = IdentityTokenAuth::new((), Arc::new(StaticSession::new(TokenBundle::new("a"))));
		let err = auth.get_identity_token().await.expect_err("Missing id_token must fail.");

		assert!(matches!(err, Error::IdentityToken(IdentityTokenError::MissingIdentityToken)));
	}
}
