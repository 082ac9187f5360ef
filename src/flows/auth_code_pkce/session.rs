// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, provider::ProviderDescriptor};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;
// Parameters the flow always sets itself; extras never override them.
const RESERVED_PARAMETERS: [&str; 4] = ["response_type", "client_id", "redirect_uri", "state"];

/// Supported PKCE challenge methods surfaced via [`AuthorizationSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// One authorization round-trip: state, PKCE pair, and the authorize URL to open.
///
/// Must be kept by the host until the redirect returns; the code exchange consumes it.
#[derive(Clone)]
pub struct AuthorizationSession {
	/// Opaque state value that must round-trip via the redirect handler.
	pub state: String,
	/// Redirect URI supplied when constructing the authorize URL.
	pub redirect_uri: Url,
	/// Fully-formed authorize URL that callers should send end-users to.
	pub authorize_url: Url,
	pkce: PkcePair,
}
impl AuthorizationSession {
	fn new(state: String, redirect_uri: Url, authorize_url: Url, pkce: PkcePair) -> Self {
		Self { state, redirect_uri, authorize_url, pkce }
	}

	/// PKCE code challenge derived from the secret verifier.
	pub fn code_challenge(&self) -> &str {
		&self.pkce.challenge
	}

	/// PKCE challenge method (currently always `S256`).
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		self.pkce.method
	}

	/// Validates the returned `state` parameter after the authorization redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state {
			Ok(())
		} else {
			Err(Error::InvalidGrant { reason: "Authorization state mismatch.".into() })
		}
	}

	pub(super) fn code_verifier(&self) -> &str {
		&self.pkce.verifier
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri)
			.field("authorize_url", &self.authorize_url)
			.field("code_challenge", &self.pkce.challenge)
			.field("code_challenge_method", &self.pkce.method)
			.finish()
	}
}

#[derive(Clone)]
struct PkcePair {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}

	fn authorize_parameters(&self) -> BTreeMap<String, String> {
		BTreeMap::from([
			("code_challenge".to_owned(), self.challenge.clone()),
			("code_challenge_method".to_owned(), self.method.as_str().to_owned()),
		])
	}
}

pub(super) fn build_session<F>(
	descriptor: &ProviderDescriptor,
	client_id: &str,
	extend: F,
) -> AuthorizationSession
where
	F: FnOnce(BTreeMap<String, String>) -> BTreeMap<String, String>,
{
	let state = random_string(STATE_LEN);
	let pkce = PkcePair::generate();
	let extra = extend(pkce.authorize_parameters());
	let redirect_uri = descriptor.redirect_uri.clone();
	let authorize_url = build_authorize_url(descriptor, client_id, &state, &extra);

	AuthorizationSession::new(state, redirect_uri, authorize_url, pkce)
}

fn build_authorize_url(
	descriptor: &ProviderDescriptor,
	client_id: &str,
	state: &str,
	extra: &BTreeMap<String, String>,
) -> Url {
	let mut url = descriptor.endpoints.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", client_id);
	pairs.append_pair("redirect_uri", descriptor.redirect_uri.as_str());
	pairs.append_pair("state", state);

	for (key, value) in extra {
		if !RESERVED_PARAMETERS.contains(&key.as_str()) {
			pairs.append_pair(key, value);
		}
	}

	drop(pairs);

	url
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(verifier.as_bytes());
	let digest = hasher.finalize();
	URL_SAFE_NO_PAD.encode(digest)
}
