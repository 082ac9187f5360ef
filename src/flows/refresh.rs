//! Refresh token grant.
//!
//! The refreshed bundle is merged over the one it replaces: secrets the provider did not
//! re-issue keep their previous values.

// self
use crate::{
	_prelude::*,
	auth::TokenBundle,
	error::ConfigError,
	flows::PkceFlow,
	http::TokenHttpClient,
	oauth::{OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C, M> PkceFlow<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Performs `grant_type=refresh_token` with the bundle's refresh secret.
	///
	/// Fails with [`ConfigError::MissingRefreshToken`] before any network call when the bundle
	/// holds no refresh token.
	pub async fn refresh_token(&self, current: &TokenBundle) -> Result<TokenBundle> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let refresh = current
					.refresh_token
					.as_ref()
					.map(|secret| secret.expose())
					.filter(|secret| !secret.is_empty())
					.ok_or(ConfigError::MissingRefreshToken)?;
				let facade = self.facade()?;
				let refreshed = facade.refresh_token(self.strategy.as_ref(), refresh).await?;

				Ok(refreshed.carry_over_from(current))
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
