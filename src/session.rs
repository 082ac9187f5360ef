//! Host session seam, the reference config-entry session, and the identity-token adapter.
//!
//! [`OAuth2Session`] is the capability the host hands to integrations: make sure the stored
//! token is usable, then read it. [`ConfigEntrySession`] implements it over a
//! [`ConfigEntryStore`] the way hosts do (refresh when close to expiry, persist the result),
//! serializing refreshes so at most one is in flight per session.

pub mod adapter;

mod metrics;

pub use adapter::*;
pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{EntryId, TokenBundle},
	entry::{ConfigEntry, ConfigEntryStore, EntryData, EntryUpdate},
	implementation::OAuth2Implementation,
};

/// Future returned by [`OAuth2Session`] and [`IdentityTokenSource`] methods.
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Host-managed OAuth2 session bound to one config entry.
pub trait OAuth2Session
where
	Self: Send + Sync,
{
	/// Refreshes the stored token if it is expired or about to expire.
	fn ensure_valid(&self) -> SessionFuture<'_, ()>;

	/// Returns the current token bundle.
	fn current_token(&self) -> TokenBundle;
}

/// [`OAuth2Session`] reading and writing `data.token` of a config entry.
pub struct ConfigEntrySession {
	store: Arc<dyn ConfigEntryStore>,
	entry_id: EntryId,
	implementation: Arc<dyn OAuth2Implementation>,
	token: RwLock<TokenBundle>,
	refresh_lock: AsyncMutex<()>,
	clock_skew: Duration,
	metrics: RefreshMetrics,
}
impl ConfigEntrySession {
	/// Tokens must stay valid this long past "now" to be used without a refresh.
	pub const DEFAULT_CLOCK_SKEW: Duration = Duration::seconds(20);

	/// Binds a session to `entry`.
	///
	/// Fails with [`Error::AuthenticationRequired`] when the entry holds no token.
	pub fn new(
		store: Arc<dyn ConfigEntryStore>,
		entry: &ConfigEntry,
		implementation: Arc<dyn OAuth2Implementation>,
	) -> Result<Self> {
		let token = entry.data.token.clone().ok_or_else(|| {
			Error::authentication_required("Config entry does not contain a token")
		})?;

		Ok(Self {
			store,
			entry_id: entry.entry_id.clone(),
			implementation,
			token: RwLock::new(token),
			refresh_lock: AsyncMutex::new(()),
			clock_skew: Self::DEFAULT_CLOCK_SKEW,
			metrics: RefreshMetrics::default(),
		})
	}

	/// Overrides the validity margin (defaults to 20 seconds); negative values clamp to zero.
	pub fn with_clock_skew(mut self, skew: Duration) -> Self {
		self.clock_skew = clamp_clock_skew(skew);

		self
	}

	/// Entry this session is bound to.
	pub fn entry_id(&self) -> &EntryId {
		&self.entry_id
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns `true` if the current token is usable at `now`.
	pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
		self.token.read().is_valid_at(now, self.clock_skew)
	}

	async fn refresh_if_needed(&self) -> Result<()> {
		let _guard = self.refresh_lock.lock().await;

		// A concurrent caller may have refreshed while this one waited.
		if self.is_valid_at(OffsetDateTime::now_utc()) {
			return Ok(());
		}

		self.metrics.record_attempt();

		match self.refresh_and_persist().await {
			Ok(()) => {
				self.metrics.record_success();

				Ok(())
			},
			Err(e) => {
				self.metrics.record_failure();

				Err(e)
			},
		}
	}

	async fn refresh_and_persist(&self) -> Result<()> {
		let current = self.current_token();
		let refreshed = self.implementation.refresh_token(&current).await?;
		let entry = self
			.store
			.get(&self.entry_id)
			.await?
			.ok_or_else(|| Error::UnknownEntry { entry_id: self.entry_id.to_string() })?;
		let data = entry
			.data
			.merged(EntryData { token: Some(refreshed.clone()), ..Default::default() });

		self.store
			.update(&self.entry_id, EntryUpdate::data(data))
			.await?
			.ok_or_else(|| Error::UnknownEntry { entry_id: self.entry_id.to_string() })?;

		tracing::debug!(
			entry_id = %self.entry_id,
			expires_in = refreshed.expires_in,
			"Stored refreshed token."
		);

		*self.token.write() = refreshed;

		Ok(())
	}
}
impl OAuth2Session for ConfigEntrySession {
	fn ensure_valid(&self) -> SessionFuture<'_, ()> {
		Box::pin(self.refresh_if_needed())
	}

	fn current_token(&self) -> TokenBundle {
		self.token.read().clone()
	}
}
impl Debug for ConfigEntrySession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConfigEntrySession")
			.field("entry_id", &self.entry_id)
			.field("implementation", &self.implementation.name())
			.field("clock_skew", &self.clock_skew)
			.field("metrics", &self.metrics)
			.finish()
	}
}

pub(crate) fn clamp_clock_skew(skew: Duration) -> Duration {
	if skew.is_negative() { Duration::ZERO } else { skew }
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{
		entry::MemoryEntryStore,
		flows::{AuthorizationSession, ExternalData},
		implementation::ImplementationFuture,
	};

	#[derive(Default)]
	struct CountingImplementation {
		refreshes: AtomicUsize,
	}
	impl OAuth2Implementation for CountingImplementation {
		fn name(&self) -> &str {
			"counting"
		}

		fn domain(&self) -> &str {
			"counting"
		}

		fn generate_authorize_url(&self) -> AuthorizationSession {
			unreachable!("Sessions never start an authorization.")
		}

		fn resolve_external_data(&self, _: ExternalData) -> ImplementationFuture<'_, TokenBundle> {
			unreachable!("Sessions never resolve a redirect.")
		}

		fn refresh_token<'a>(
			&'a self,
			token: &'a TokenBundle,
		) -> ImplementationFuture<'a, TokenBundle> {
			Box::pin(async move {
				let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;

				tokio::time::sleep(std::time::Duration::from_millis(50)).await;

				Ok(TokenBundle::new(format!("access-{n}"))
					.with_expires_in(3_600, OffsetDateTime::now_utc())
					.carry_over_from(token))
			})
		}
	}

	fn expired_entry() -> ConfigEntry {
		let token = TokenBundle::new("access-0")
			.with_refresh_token("refresh")
			.with_expires_in(-60, OffsetDateTime::now_utc());

		ConfigEntry::new("counting", 2, 1, "a", EntryData::with_token("counting", token))
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_refresh() {
		let entry = expired_entry();
		let store = MemoryEntryStore::with_entries([entry.clone()]);
		let implementation = Arc::new(CountingImplementation::default());
		let session = ConfigEntrySession::new(Arc::new(store.clone()), &entry, implementation.clone())
			.expect("Entry holds a token.");
		let (a, b) = tokio::join!(session.ensure_valid(), session.ensure_valid());

		a.expect("First caller should succeed.");
		b.expect("Second caller should succeed.");

		assert_eq!(implementation.refreshes.load(Ordering::SeqCst), 1);
		assert_eq!(session.current_token().access_token.expose(), "access-1");
		assert_eq!((session.metrics().attempts(), session.metrics().successes()), (1, 1));

		let stored = store
			.get(&entry.entry_id)
			.await
			.expect("Store lookup should succeed.")
			.and_then(|entry| entry.data.token)
			.expect("Refreshed token should be persisted.");

		assert_eq!(stored.access_token.expose(), "access-1");
		assert_eq!(stored.refresh_token.as_ref().map(|secret| secret.expose()), Some("refresh"));
	}

	#[test]
	fn entry_without_token_is_rejected() {
		let entry = ConfigEntry::new("counting", 2, 1, "a", EntryData::default());
		let err = ConfigEntrySession::new(
			Arc::new(MemoryEntryStore::default()),
			&entry,
			Arc::new(CountingImplementation::default()),
		)
		.expect_err("Sessions need a token.");

		assert!(err.requires_reauth());
	}

	#[test]
	fn negative_clock_skew_clamps_to_zero() {
		let entry = expired_entry();
		let session = ConfigEntrySession::new(
			Arc::new(MemoryEntryStore::default()),
			&entry,
			Arc::new(CountingImplementation::default()),
		)
		.expect("Entry holds a token.")
		.with_clock_skew(Duration::seconds(-30));

		assert_eq!(session.clock_skew, Duration::ZERO);
	}
}
