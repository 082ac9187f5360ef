//! Integration lifecycle over config entries: setup, unload, and schema migration.
//!
//! Per-entry state follows
//! `Unconfigured -> (AwaitingReauth | Active | Failed)` on setup and `Active -> Unconfigured` on
//! unload. Entries written before the OAuth login existed carry no token; setup refuses them
//! with [`Error::AuthenticationRequired`] so the host starts a re-authentication.

// self
use crate::{
	_prelude::*,
	auth::EntryId,
	entry::{ConfigEntry, ConfigEntryStore, EntryData, EntryUpdate},
	flows::{MINOR_VERSION, VERSION},
	implementation::{ImplementationRegistry, OAuth2Implementation},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::{
		self, ConfigEntrySession, IdentityTokenAuth, IdentityTokenSource, OAuth2Session,
		SessionFuture,
	},
};

/// Schema version of entries written before the OAuth login.
pub const LEGACY_VERSION: u32 = 1;

/// Adapter handed to the downstream client for one entry.
pub type EntryAuth<H> = IdentityTokenAuth<ConfigEntrySession, H>;
/// Builds the downstream data coordinator for a freshly set up entry.
pub type CoordinatorFactory =
	Arc<dyn Fn(&ConfigEntry, Arc<dyn IdentityTokenSource>) -> Arc<dyn DataCoordinator> + Send + Sync>;

/// Lifecycle state of one config entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EntryState {
	/// Not set up (initial state, or after unload).
	#[default]
	Unconfigured,
	/// Setup refused the stored credentials; the host must re-authenticate.
	AwaitingReauth,
	/// Set up and serving data.
	Active,
	/// Setup failed for a reason other than authentication.
	Failed,
}

/// Downstream refresh coordinator fed by the identity token.
pub trait DataCoordinator
where
	Self: Send + Sync,
{
	/// Performs the initial data fetch during setup.
	fn first_refresh(&self) -> SessionFuture<'_, ()>;
}

/// Objects kept alive for an active entry.
pub struct RuntimeData<H> {
	/// Identity-token adapter bound to the entry's session.
	pub auth: Arc<EntryAuth<H>>,
	/// Downstream coordinator.
	pub coordinator: Arc<dyn DataCoordinator>,
}
impl<H> Clone for RuntimeData<H> {
	fn clone(&self) -> Self {
		Self { auth: self.auth.clone(), coordinator: self.coordinator.clone() }
	}
}
impl<H> Debug for RuntimeData<H> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RuntimeData").field("auth", &self.auth).finish_non_exhaustive()
	}
}

/// Lifecycle driver for every entry of the integration domain.
pub struct Integration<H> {
	store: Arc<dyn ConfigEntryStore>,
	registry: ImplementationRegistry,
	implementation: Arc<dyn OAuth2Implementation>,
	http_client: H,
	coordinator_factory: CoordinatorFactory,
	clock_skew: Duration,
	states: RwLock<HashMap<EntryId, EntryState>>,
	runtime: RwLock<HashMap<EntryId, RuntimeData<H>>>,
}
impl<H> Integration<H>
where
	H: 'static + Clone + Send + Sync,
{
	/// Creates the lifecycle driver.
	///
	/// `implementation` is registered with `registry` on every setup; `http_client` is shared
	/// with the downstream client through the identity-token adapter.
	pub fn new(
		store: Arc<dyn ConfigEntryStore>,
		registry: ImplementationRegistry,
		implementation: Arc<dyn OAuth2Implementation>,
		http_client: H,
		coordinator_factory: CoordinatorFactory,
	) -> Self {
		Self {
			store,
			registry,
			implementation,
			http_client,
			coordinator_factory,
			clock_skew: ConfigEntrySession::DEFAULT_CLOCK_SKEW,
			states: Default::default(),
			runtime: Default::default(),
		}
	}

	/// Overrides the session validity margin used for new sessions; negative values clamp
	/// to zero.
	pub fn with_clock_skew(mut self, skew: Duration) -> Self {
		self.clock_skew = session::clamp_clock_skew(skew);

		self
	}

	/// Current lifecycle state of `entry_id`.
	pub fn state(&self, entry_id: &EntryId) -> EntryState {
		self.states.read().get(entry_id).copied().unwrap_or_default()
	}

	/// Runtime objects of an active entry.
	pub fn runtime_data(&self, entry_id: &EntryId) -> Option<RuntimeData<H>> {
		self.runtime.read().get(entry_id).cloned()
	}

	/// Sets up `entry_id`.
	///
	/// Missing tokens and failed validity checks surface as
	/// [`Error::AuthenticationRequired`] and leave the entry [`EntryState::AwaitingReauth`];
	/// any other failure leaves it [`EntryState::Failed`].
	pub async fn setup_entry(&self, entry_id: &EntryId) -> Result<()> {
		const KIND: FlowKind = FlowKind::Setup;

		let span = FlowSpan::new(KIND, "setup_entry");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.setup_entry_inner(entry_id)).await;
		let state = match &result {
			Ok(()) => EntryState::Active,
			Err(e) if e.requires_reauth() => EntryState::AwaitingReauth,
			Err(_) => EntryState::Failed,
		};

		self.set_state(entry_id, state);

		match &result {
			Ok(()) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				tracing::info!(%entry_id, "Config entry set up.");
			},
			Err(e) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				tracing::info!(%entry_id, ?state, error = %e, "Config entry setup failed.");
			},
		}

		result
	}

	/// Unloads `entry_id`, dropping its runtime objects. Always succeeds.
	pub fn unload_entry(&self, entry_id: &EntryId) -> bool {
		self.runtime.write().remove(entry_id);
		self.set_state(entry_id, EntryState::Unconfigured);

		tracing::info!(%entry_id, "Config entry unloaded.");

		true
	}

	/// Migrates legacy entries.
	///
	/// A schema-version-1 entry cannot be converted: its data is cleared and its version set to
	/// the current one, so the next setup requests re-authentication. Other versions are left
	/// untouched.
	pub async fn migrate_entry(&self, entry_id: &EntryId) -> Result<bool> {
		let entry = self
			.store
			.get(entry_id)
			.await?
			.ok_or_else(|| Error::UnknownEntry { entry_id: entry_id.to_string() })?;

		if entry.version == LEGACY_VERSION {
			self.store
				.update(
					entry_id,
					EntryUpdate::data(EntryData::default()).with_schema(VERSION, MINOR_VERSION),
				)
				.await?
				.ok_or_else(|| Error::UnknownEntry { entry_id: entry_id.to_string() })?;

			tracing::info!(%entry_id, "Migrated legacy config entry; re-authentication required.");
		}

		Ok(true)
	}

	async fn setup_entry_inner(&self, entry_id: &EntryId) -> Result<()> {
		self.registry.register(self.implementation.domain(), self.implementation.clone());

		let entry = self
			.store
			.get(entry_id)
			.await?
			.ok_or_else(|| Error::UnknownEntry { entry_id: entry_id.to_string() })?;

		if entry.data.token.is_none() {
			return Err(Error::authentication_required(
				"Authentication method has changed. Please reauthenticate",
			));
		}

		let implementation = self.registry.get_for_entry(&entry)?;
		let session = Arc::new(
			ConfigEntrySession::new(self.store.clone(), &entry, implementation)?
				.with_clock_skew(self.clock_skew),
		);

		session
			.ensure_valid()
			.await
			.map_err(|e| Error::reauth_from("Token validation failed", e))?;

		let auth = Arc::new(IdentityTokenAuth::new(self.http_client.clone(), session));
		let coordinator = (self.coordinator_factory)(&entry, auth.clone());

		coordinator.first_refresh().await?;

		self.runtime.write().insert(entry_id.clone(), RuntimeData { auth, coordinator });

		Ok(())
	}

	fn set_state(&self, entry_id: &EntryId, state: EntryState) {
		self.states.write().insert(entry_id.clone(), state);
	}
}
impl<H> Debug for Integration<H> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Integration")
			.field("implementation", &self.implementation.name())
			.field("registry", &self.registry)
			.field("states", &*self.states.read())
			.finish_non_exhaustive()
	}
}
