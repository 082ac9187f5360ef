//! Generic PKCE implementation and the host config flow driven by it.

pub mod auth_code_pkce;
pub mod config_flow;
pub mod refresh;

pub use auth_code_pkce::*;
pub use config_flow::*;

// self
use crate::{
	_prelude::*,
	http::TokenHttpClient,
	oauth::{BasicFacade, TransportErrorMapper},
	provider::{ProviderDescriptor, ProviderStrategy},
};

/// Local-redirect Authorization Code + PKCE implementation against one provider descriptor.
///
/// The flow owns the transport, the error mapper, and the classification strategy. It knows
/// nothing about the provider's extra authorize parameters or its expiry quirks; callers
/// layer those on top (see [`DukeEnergyImplementation`](crate::provider::DukeEnergyImplementation)).
#[derive(Clone)]
pub struct PkceFlow<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every token request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Provider descriptor with endpoints and the registered redirect URI.
	pub descriptor: ProviderDescriptor,
	/// Strategy classifying token endpoint failures.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// OAuth 2.0 client identifier used in every grant.
	pub client_id: String,
}
impl<C, M> PkceFlow<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a flow that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		client_id: impl Into<String>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			descriptor,
			strategy,
			client_id: client_id.into(),
		}
	}

	pub(crate) fn facade(&self) -> Result<BasicFacade<C, M>> {
		BasicFacade::from_descriptor(
			&self.descriptor,
			&self.client_id,
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)
	}
}
impl<C, M> Debug for PkceFlow<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkceFlow")
			.field("descriptor", &self.descriptor)
			.field("client_id", &self.client_id)
			.finish()
	}
}
