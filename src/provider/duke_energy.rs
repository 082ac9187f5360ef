//! Duke Energy's Auth0 tenant: fixed client registration, authorize extras, and expiry
//! reconciliation on every token that leaves the implementation.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
// self
use crate::{
	_prelude::*,
	auth::{ProviderId, TokenBundle, reconcile},
	error::ConfigError,
	flows::{AuthorizationSession, ExternalData, PkceFlow},
	http::TokenHttpClient,
	implementation::{ImplementationFuture, OAuth2Implementation},
	oauth::TransportErrorMapper,
	provider::{DefaultProviderStrategy, ProviderDescriptor},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Integration domain, also the implementation identifier stored on entries.
pub const DOMAIN: &str = "duke_energy";
/// Display name of the implementation.
pub const IMPLEMENTATION_NAME: &str = "Duke Energy";

const NONCE_BYTES: usize = 32;

#[cfg(feature = "reqwest")]
/// Implementation specialized for the crate's default reqwest transport stack.
pub type ReqwestDukeEnergyImplementation =
	DukeEnergyImplementation<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Provider constants, overridable from host configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DukeEnergySettings {
	/// Authorization endpoint.
	pub authorize_url: String,
	/// Token endpoint.
	pub token_url: String,
	/// Public client identifier of the provider's mobile app.
	pub client_id: String,
	/// Custom-scheme redirect registered for the mobile app.
	pub redirect_uri: String,
	/// Requested scopes, sent space-joined in this order.
	pub scopes: Vec<String>,
	/// Base64 JSON blob identifying the calling Auth0 SDK.
	pub auth0_client: String,
}
impl DukeEnergySettings {
	/// Space-joined scope string.
	pub fn scope(&self) -> String {
		self.scopes.join(" ")
	}

	/// Builds the validated descriptor for these settings.
	pub fn descriptor(&self) -> Result<ProviderDescriptor> {
		let parse = |value: &str| {
			Url::parse(value).map_err(|source| ConfigError::InvalidDescriptor { source })
		};
		let redirect_uri =
			Url::parse(&self.redirect_uri).map_err(|source| ConfigError::InvalidRedirect { source })?;
		let provider_id = ProviderId::new(DOMAIN).map_err(ConfigError::from)?;
		let descriptor = ProviderDescriptor::builder(provider_id)
			.authorization_endpoint(parse(&self.authorize_url)?)
			.token_endpoint(parse(&self.token_url)?)
			.redirect_uri(redirect_uri)
			.build()
			.map_err(ConfigError::from)?;

		Ok(descriptor)
	}
}
impl Default for DukeEnergySettings {
	fn default() -> Self {
		Self {
			authorize_url: "https://login.duke-energy.com/authorize".into(),
			token_url: "https://login.duke-energy.com/oauth/token".into(),
			client_id: "uB67shrSSodJrNKTvZ0cWyAE9VRqkFwI".into(),
			redirect_uri: "cma-prod://login.duke-energy.com/android/com.dukeenergy.customerapp.release/callback".into(),
			scopes: ["openid", "profile", "email", "offline_access"].map(String::from).into(),
			auth0_client: "eyJuYW1lIjoiQXV0aDAuQW5kcm9pZCIsImVudiI6eyJhbmRyb2lkIjoiMzUifSwidmVyc2lvbiI6IjMuOC4wIn0=".into(),
		}
	}
}

/// Duke Energy OAuth2 implementation layered over the generic [`PkceFlow`].
///
/// Every bundle returned by [`exchange_authorization_result`](Self::exchange_authorization_result)
/// or [`refresh`](Self::refresh) has already been passed through [`reconcile`].
#[derive(Clone)]
pub struct DukeEnergyImplementation<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	flow: PkceFlow<C, M>,
	scope: String,
	auth0_client: String,
}
impl<C, M> DukeEnergyImplementation<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates the implementation over a caller-provided transport + mapper pair.
	pub fn with_http_client(
		settings: &DukeEnergySettings,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let flow = PkceFlow::with_http_client(
			settings.descriptor()?,
			Arc::new(DefaultProviderStrategy),
			settings.client_id.clone(),
			http_client,
			mapper,
		);

		Ok(Self { flow, scope: settings.scope(), auth0_client: settings.auth0_client.clone() })
	}

	/// Underlying generic flow.
	pub fn flow(&self) -> &PkceFlow<C, M> {
		&self.flow
	}

	/// Adds `scope`, `auth0Client`, and a fresh `nonce` to the PKCE `base` parameters.
	///
	/// Keys already present in `base` win.
	pub fn build_authorize_parameters(
		&self,
		base: BTreeMap<String, String>,
	) -> BTreeMap<String, String> {
		let mut params = BTreeMap::from([
			("scope".to_owned(), self.scope.clone()),
			("auth0Client".to_owned(), self.auth0_client.clone()),
			("nonce".to_owned(), generate_nonce()),
		]);

		params.extend(base);

		params
	}

	/// Starts an authorization round-trip with the provider extras applied.
	pub fn start_authorization(&self) -> AuthorizationSession {
		self.flow.start_authorization(|base| self.build_authorize_parameters(base))
	}

	/// Exchanges the redirect result and reconciles expiry against the `id_token`.
	pub async fn exchange_authorization_result(&self, external: ExternalData) -> Result<TokenBundle> {
		let token = self.flow.exchange_code(external).await?;

		Ok(reconcile(token)?)
	}

	/// Refreshes `token` and reconciles expiry against the (possibly carried over) `id_token`.
	pub async fn refresh(&self, token: &TokenBundle) -> Result<TokenBundle> {
		let refreshed = self.flow.refresh_token(token).await?;

		Ok(reconcile(refreshed)?)
	}
}
#[cfg(feature = "reqwest")]
impl DukeEnergyImplementation<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates the implementation with its own reqwest-backed transport.
	pub fn new(settings: &DukeEnergySettings) -> Result<Self> {
		Self::with_http_client(
			settings,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Debug for DukeEnergyImplementation<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DukeEnergyImplementation")
			.field("flow", &self.flow)
			.field("scope", &self.scope)
			.finish()
	}
}
impl<C, M> OAuth2Implementation for DukeEnergyImplementation<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn name(&self) -> &str {
		IMPLEMENTATION_NAME
	}

	fn domain(&self) -> &str {
		DOMAIN
	}

	fn generate_authorize_url(&self) -> AuthorizationSession {
		self.start_authorization()
	}

	fn resolve_external_data(&self, external: ExternalData) -> ImplementationFuture<'_, TokenBundle> {
		Box::pin(self.exchange_authorization_result(external))
	}

	fn refresh_token<'a>(&'a self, token: &'a TokenBundle) -> ImplementationFuture<'a, TokenBundle> {
		Box::pin(self.refresh(token))
	}
}

fn generate_nonce() -> String {
	let mut bytes = [0_u8; NONCE_BYTES];

	rand::rng().fill_bytes(&mut bytes);

	URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;

	fn implementation() -> ReqwestDukeEnergyImplementation {
		DukeEnergyImplementation::new(&DukeEnergySettings::default())
			.expect("Default settings should produce an implementation.")
	}

	#[test]
	fn default_settings_match_registered_app() {
		let settings = DukeEnergySettings::default();
		let descriptor = settings.descriptor().expect("Default descriptor should validate.");

		assert_eq!(settings.scope(), "openid profile email offline_access");
		assert_eq!(descriptor.redirect_uri.scheme(), "cma-prod");
		assert_eq!(descriptor.endpoints.token.path(), "/oauth/token");
	}

	#[test]
	fn settings_override_from_partial_json() {
		let settings: DukeEnergySettings =
			serde_json::from_str(r#"{"token_url":"http://127.0.0.1:8080/oauth/token"}"#)
				.expect("Partial settings should deserialize.");

		assert_eq!(settings.token_url, "http://127.0.0.1:8080/oauth/token");
		assert_eq!(settings.client_id, DukeEnergySettings::default().client_id);
	}

	#[test]
	fn authorize_parameters_carry_provider_extras() {
		let implementation = implementation();
		let base = BTreeMap::from([("code_challenge_method".to_owned(), "S256".to_owned())]);
		let params = implementation.build_authorize_parameters(base);

		assert_eq!(params["scope"], "openid profile email offline_access");
		assert_eq!(params["auth0Client"], DukeEnergySettings::default().auth0_client);
		assert_eq!(params["code_challenge_method"], "S256");
		// 32 bytes of entropy, unpadded base64url.
		assert_eq!(params["nonce"].len(), 43);
		assert!(!params["nonce"].contains(['+', '/', '=']));
	}

	#[test]
	fn nonce_is_fresh_per_call() {
		let implementation = implementation();
		let first = implementation.build_authorize_parameters(BTreeMap::new());
		let second = implementation.build_authorize_parameters(BTreeMap::new());

		assert_ne!(first["nonce"], second["nonce"]);
	}

	#[test]
	fn authorize_url_targets_mobile_redirect() {
		let session = implementation().generate_authorize_url();
		let params: BTreeMap<String, String> =
			session.authorize_url.query_pairs().into_owned().collect();

		assert_eq!(params["client_id"], "uB67shrSSodJrNKTvZ0cWyAE9VRqkFwI");
		assert_eq!(params["redirect_uri"], DukeEnergySettings::default().redirect_uri);
		assert_eq!(params["code_challenge"], session.code_challenge());
		assert!(params.contains_key("nonce"));
	}
}
