//! Thread-safe in-memory [`ConfigEntryStore`] for tests and hosts without persistence.

// self
use crate::{
	_prelude::*,
	auth::EntryId,
	entry::{ConfigEntry, ConfigEntryStore, EntryUpdate, StoreError, StoreFuture},
};

type EntryMap = Arc<RwLock<BTreeMap<EntryId, ConfigEntry>>>;

/// In-process entry store keyed by entry identifier.
#[derive(Clone, Debug, Default)]
pub struct MemoryEntryStore(EntryMap);
impl MemoryEntryStore {
	/// Creates a store pre-populated with `entries`.
	pub fn with_entries(entries: impl IntoIterator<Item = ConfigEntry>) -> Self {
		let map = entries.into_iter().map(|entry| (entry.entry_id.clone(), entry)).collect();

		Self(Arc::new(RwLock::new(map)))
	}

	fn add_now(map: EntryMap, entry: ConfigEntry) -> Result<(), StoreError> {
		let mut guard = map.write();

		if guard.contains_key(&entry.entry_id) {
			return Err(StoreError::Conflict { entry_id: entry.entry_id.to_string() });
		}

		guard.insert(entry.entry_id.clone(), entry);

		Ok(())
	}

	fn update_now(map: EntryMap, entry_id: &EntryId, update: EntryUpdate) -> Option<ConfigEntry> {
		let mut guard = map.write();
		let entry = guard.get_mut(entry_id)?;

		entry.apply(update);

		Some(entry.clone())
	}
}
impl ConfigEntryStore for MemoryEntryStore {
	fn get<'a>(&'a self, entry_id: &'a EntryId) -> StoreFuture<'a, Option<ConfigEntry>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(entry_id).cloned()) })
	}

	fn entries<'a>(&'a self, domain: &'a str) -> StoreFuture<'a, Vec<ConfigEntry>> {
		let map = self.0.clone();

		Box::pin(async move {
			Ok(map.read().values().filter(|entry| entry.domain == domain).cloned().collect())
		})
	}

	fn add(&self, entry: ConfigEntry) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::add_now(map, entry) })
	}

	fn update<'a>(
		&'a self,
		entry_id: &'a EntryId,
		update: EntryUpdate,
	) -> StoreFuture<'a, Option<ConfigEntry>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::update_now(map, entry_id, update)) })
	}
}
