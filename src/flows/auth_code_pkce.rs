//! Authorization Code + PKCE: authorize URL construction and code exchange.

mod session;

pub use session::*;

// self
use crate::{
	_prelude::*,
	auth::TokenBundle,
	flows::PkceFlow,
	http::TokenHttpClient,
	oauth::{OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Result of the external authorization step, handed back by the host's redirect handler.
#[derive(Clone, Debug)]
pub struct ExternalData {
	/// Authorization code returned by the provider.
	pub code: String,
	/// `state` value returned alongside the code.
	pub state: String,
	/// Session created when the authorize URL was generated.
	pub session: AuthorizationSession,
}
impl ExternalData {
	/// Bundles the redirect result with its originating session.
	pub fn new(
		session: AuthorizationSession,
		code: impl Into<String>,
		state: impl Into<String>,
	) -> Self {
		Self { code: code.into(), state: state.into(), session }
	}
}

impl<C, M> PkceFlow<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Starts an authorization round-trip.
	///
	/// `extend` receives the PKCE parameters (`code_challenge`, `code_challenge_method`) and
	/// returns the full set of extra query parameters to append after the standard ones.
	pub fn start_authorization<F>(&self, extend: F) -> AuthorizationSession
	where
		F: FnOnce(BTreeMap<String, String>) -> BTreeMap<String, String>,
	{
		let _span = FlowSpan::new(FlowKind::AuthorizationCode, "start_authorization").entered();

		session::build_session(&self.descriptor, &self.client_id, extend)
	}

	/// Validates the returned state and exchanges the code for a token bundle.
	///
	/// The bundle carries the generic `expires_at = now + expires_in` bookkeeping.
	pub async fn exchange_code(&self, external: ExternalData) -> Result<TokenBundle> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let span = FlowSpan::new(KIND, "exchange_code");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let ExternalData { code, state, session } = external;

				session.validate_state(&state)?;

				let facade = self.facade()?;

				facade
					.exchange_authorization_code(
						self.strategy.as_ref(),
						&code,
						session.code_verifier(),
						&session.redirect_uri,
					)
					.await
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
