//! OAuth2 implementation seam and the host-side registry of implementations.
//!
//! A config entry records the name of the implementation that issued its token
//! (`data.auth_implementation`); setup resolves it through [`ImplementationRegistry`].

// self
use crate::{
	_prelude::*,
	auth::TokenBundle,
	entry::ConfigEntry,
	error::ConfigError,
	flows::{AuthorizationSession, ExternalData},
};

/// Future returned by [`OAuth2Implementation`] token operations.
pub type ImplementationFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// OAuth2 implementation registered with the host for one integration domain.
pub trait OAuth2Implementation
where
	Self: Send + Sync,
{
	/// Human-readable implementation name.
	fn name(&self) -> &str;

	/// Identifier recorded in `data.auth_implementation`.
	fn domain(&self) -> &str;

	/// Starts an authorization round-trip.
	fn generate_authorize_url(&self) -> AuthorizationSession;

	/// Turns the redirect result into a token bundle ready for storage.
	fn resolve_external_data(&self, external: ExternalData) -> ImplementationFuture<'_, TokenBundle>;

	/// Refreshes `token`, returning the bundle that replaces it.
	fn refresh_token<'a>(&'a self, token: &'a TokenBundle) -> ImplementationFuture<'a, TokenBundle>;
}

/// Registry mapping integration domains to their implementations.
#[derive(Clone, Default)]
pub struct ImplementationRegistry(Arc<RwLock<HashMap<String, Arc<dyn OAuth2Implementation>>>>);
impl ImplementationRegistry {
	/// Registers (or replaces) the implementation serving `domain`.
	pub fn register(&self, domain: impl Into<String>, implementation: Arc<dyn OAuth2Implementation>) {
		let domain = domain.into();

		tracing::debug!(domain, name = implementation.name(), "Registered OAuth2 implementation.");

		self.0.write().insert(domain, implementation);
	}

	/// Returns the implementation registered under `name`, if any.
	pub fn get(&self, name: &str) -> Option<Arc<dyn OAuth2Implementation>> {
		self.0.read().get(name).cloned()
	}

	/// Resolves the implementation that issued `entry`'s token.
	///
	/// Falls back to the entry's domain when `data.auth_implementation` is unset.
	pub fn get_for_entry(&self, entry: &ConfigEntry) -> Result<Arc<dyn OAuth2Implementation>> {
		let name = entry.data.auth_implementation.as_deref().unwrap_or(&entry.domain);

		self.get(name)
			.ok_or_else(|| ConfigError::ImplementationUnavailable { name: name.to_owned() }.into())
	}
}
impl Debug for ImplementationRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ImplementationRegistry")
			.field(&self.0.read().keys().collect::<Vec<_>>())
			.finish()
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::{
		entry::EntryData,
		provider::{DOMAIN, DukeEnergyImplementation, DukeEnergySettings},
	};

	fn registry() -> ImplementationRegistry {
		let registry = ImplementationRegistry::default();
		let implementation = DukeEnergyImplementation::new(&DukeEnergySettings::default())
			.expect("Default settings should produce an implementation.");

		registry.register(DOMAIN, Arc::new(implementation));

		registry
	}

	#[test]
	fn entries_resolve_by_recorded_implementation_or_domain() {
		let registry = registry();
		let recorded = ConfigEntry::new(
			"other_domain",
			2,
			1,
			"a",
			EntryData { auth_implementation: Some(DOMAIN.into()), ..Default::default() },
		);
		let fallback = ConfigEntry::new(DOMAIN, 2, 1, "b", EntryData::default());

		for entry in [recorded, fallback] {
			let implementation =
				registry.get_for_entry(&entry).expect("Implementation should resolve.");

			assert_eq!(implementation.domain(), DOMAIN);
		}
	}

	#[test]
	fn unknown_implementation_is_a_config_error() {
		let entry = ConfigEntry::new(
			DOMAIN,
			2,
			1,
			"a",
			EntryData { auth_implementation: Some("cloud_link".into()), ..Default::default() },
		);
		let err = registry().get_for_entry(&entry).err().expect("Lookup must fail.");

		assert!(matches!(
			err,
			Error::Config(ConfigError::ImplementationUnavailable { ref name }) if name == "cloud_link"
		));
	}
}
