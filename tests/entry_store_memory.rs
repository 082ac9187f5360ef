#![cfg(feature = "reqwest")]

// self
use duke_energy_auth::{
	auth::{EntryId, TokenBundle},
	entry::{ConfigEntry, ConfigEntryStore, EntryData, EntryUpdate, MemoryEntryStore, StoreError},
};

fn entry(unique_id: &str) -> ConfigEntry {
	ConfigEntry::new(
		"duke_energy",
		2,
		1,
		unique_id,
		EntryData::with_token("duke_energy", TokenBundle::new("access")),
	)
	.with_unique_id(unique_id)
}

#[tokio::test]
async fn add_and_get_round_trip() {
	let store = MemoryEntryStore::default();
	let entry = entry("abc123");

	store.add(entry.clone()).await.expect("Adding an entry should succeed.");

	let fetched = store
		.get(&entry.entry_id)
		.await
		.expect("Fetching an entry should succeed.")
		.expect("Stored entry should remain present.");

	assert_eq!(fetched, entry);
	assert!(
		store
			.get(&EntryId::generate())
			.await
			.expect("Fetching an unknown entry should succeed.")
			.is_none()
	);
}

#[tokio::test]
async fn duplicate_ids_conflict() {
	let store = MemoryEntryStore::default();
	let entry = entry("abc123");

	store.add(entry.clone()).await.expect("First insert should succeed.");

	let err = store.add(entry.clone()).await.expect_err("Second insert must conflict.");

	assert_eq!(err, StoreError::Conflict { entry_id: entry.entry_id.to_string() });
}

#[tokio::test]
async fn entries_are_filtered_by_domain() {
	let mut other = entry("elsewhere");

	other.domain = "other_domain".into();

	let store = MemoryEntryStore::with_entries([entry("abc123"), entry("xyz999"), other]);
	let mut ids: Vec<_> = store
		.entries("duke_energy")
		.await
		.expect("Listing entries should succeed.")
		.into_iter()
		.filter_map(|entry| entry.unique_id)
		.collect();

	ids.sort();

	assert_eq!(ids, ["abc123", "xyz999"]);
}

#[tokio::test]
async fn update_applies_partial_changes() {
	let entry = entry("abc123");
	let store = MemoryEntryStore::with_entries([entry.clone()]);
	let updated = store
		.update(&entry.entry_id, EntryUpdate::data(EntryData::default()).with_schema(3, 0))
		.await
		.expect("Update should succeed.")
		.expect("Entry should exist.");

	assert_eq!(updated.data, EntryData::default());
	assert_eq!((updated.version, updated.minor_version), (3, 0));
	assert_eq!(updated.title, entry.title);
	assert!(
		store
			.update(&EntryId::generate(), EntryUpdate::default())
			.await
			.expect("Updating an unknown entry should not error.")
			.is_none()
	);
}
