//! Config-entry model and the host storage seam.
//!
//! A config entry is the host's persisted record of one configured account. The adapter reads
//! `data.token` during setup, writes refreshed bundles back through [`ConfigEntryStore`], and
//! rewrites legacy entries during migration.

pub mod memory;

pub use memory::MemoryEntryStore;

// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::{EntryId, TokenBundle},
};

/// Future returned by [`ConfigEntryStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for config entries, implemented by the host.
pub trait ConfigEntryStore
where
	Self: Send + Sync,
{
	/// Fetches one entry, if present.
	fn get<'a>(&'a self, entry_id: &'a EntryId) -> StoreFuture<'a, Option<ConfigEntry>>;

	/// Lists every entry registered for `domain`.
	fn entries<'a>(&'a self, domain: &'a str) -> StoreFuture<'a, Vec<ConfigEntry>>;

	/// Persists a new entry; fails with [`StoreError::Conflict`] if the identifier is taken.
	fn add(&self, entry: ConfigEntry) -> StoreFuture<'_, ()>;

	/// Applies `update` and returns the resulting entry, or `None` if the entry is gone.
	fn update<'a>(
		&'a self,
		entry_id: &'a EntryId,
		update: EntryUpdate,
	) -> StoreFuture<'a, Option<ConfigEntry>>;
}

/// Error type produced by [`ConfigEntryStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// An entry with the same identifier already exists.
	#[error("Config entry `{entry_id}` already exists.")]
	Conflict {
		/// Identifier that collided.
		entry_id: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Persisted record of one configured integration instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
	/// Host-assigned identifier.
	pub entry_id: EntryId,
	/// Integration domain owning the entry.
	pub domain: String,
	/// Schema major version.
	pub version: u32,
	/// Schema minor version.
	pub minor_version: u32,
	/// Account-level unique id (lower-cased `internal_identifier`).
	#[serde(default)]
	pub unique_id: Option<String>,
	/// Display title.
	pub title: String,
	/// Entry payload.
	#[serde(default)]
	pub data: EntryData,
}
impl ConfigEntry {
	/// Creates an entry with a freshly generated identifier.
	pub fn new(
		domain: impl Into<String>,
		version: u32,
		minor_version: u32,
		title: impl Into<String>,
		data: EntryData,
	) -> Self {
		Self {
			entry_id: EntryId::generate(),
			domain: domain.into(),
			version,
			minor_version,
			unique_id: None,
			title: title.into(),
			data,
		}
	}

	/// Sets the account-level unique id.
	pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
		self.unique_id = Some(unique_id.into());

		self
	}

	/// Applies `update` in place.
	pub fn apply(&mut self, update: EntryUpdate) {
		let EntryUpdate { title, unique_id, data, schema } = update;

		if let Some(title) = title {
			self.title = title;
		}
		if let Some(unique_id) = unique_id {
			self.unique_id = Some(unique_id);
		}
		if let Some(data) = data {
			self.data = data;
		}
		if let Some((version, minor_version)) = schema {
			self.version = version;
			self.minor_version = minor_version;
		}
	}
}

/// Entry payload.
///
/// Unknown keys (such as the credentials stored by schema version 1) are kept in `extra` so a
/// round-trip through the store never drops them silently.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryData {
	/// Name of the OAuth2 implementation that issued the token.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub auth_implementation: Option<String>,
	/// Stored token bundle; absent on legacy entries.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub token: Option<TokenBundle>,
	/// Any other keys.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl EntryData {
	/// Payload written by the config flow.
	pub fn with_token(auth_implementation: impl Into<String>, token: TokenBundle) -> Self {
		Self {
			auth_implementation: Some(auth_implementation.into()),
			token: Some(token),
			extra: Map::new(),
		}
	}

	/// Overlays `updates` on top of `self`; keys present in `updates` win.
	pub fn merged(mut self, updates: EntryData) -> Self {
		let EntryData { auth_implementation, token, extra } = updates;

		if auth_implementation.is_some() {
			self.auth_implementation = auth_implementation;
		}
		if token.is_some() {
			self.token = token;
		}

		self.extra.extend(extra);

		self
	}
}

/// Partial update applied through [`ConfigEntryStore::update`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntryUpdate {
	/// Replacement title.
	pub title: Option<String>,
	/// Replacement unique id.
	pub unique_id: Option<String>,
	/// Replacement payload (not merged).
	pub data: Option<EntryData>,
	/// Replacement `(version, minor_version)`.
	pub schema: Option<(u32, u32)>,
}
impl EntryUpdate {
	/// Replaces the payload.
	pub fn data(data: EntryData) -> Self {
		Self { data: Some(data), ..Default::default() }
	}

	/// Also replaces the schema version pair.
	pub fn with_schema(mut self, version: u32, minor_version: u32) -> Self {
		self.schema = Some((version, minor_version));

		self
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_crate_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("database unreachable"));

		let source = StdError::source(&error)
			.expect("Crate error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn legacy_payload_deserializes_without_token() {
		let data: EntryData =
			serde_json::from_str(r#"{"username":"jane@example.com","password":"hunter2"}"#)
				.expect("Legacy payload should deserialize.");

		assert!(data.token.is_none());
		assert_eq!(data.extra["username"], "jane@example.com");
		assert_eq!(
			serde_json::to_value(EntryData::default()).expect("Empty data serializes."),
			serde_json::json!({})
		);
	}

	#[test]
	fn merge_prefers_updates_and_keeps_other_keys() {
		let mut base = EntryData::with_token("duke_energy", TokenBundle::new("old"));

		base.extra.insert("keep".into(), Value::Bool(true));

		let merged = base.merged(EntryData {
			token: Some(TokenBundle::new("new")),
			..Default::default()
		});

		assert_eq!(merged.auth_implementation.as_deref(), Some("duke_energy"));
		assert_eq!(
			merged.token.as_ref().map(|token| token.access_token.expose()),
			Some("new")
		);
		assert_eq!(merged.extra["keep"], Value::Bool(true));
	}

	#[test]
	fn new_entries_get_distinct_ids() {
		let a = ConfigEntry::new("duke_energy", 2, 1, "a", EntryData::default());
		let b = ConfigEntry::new("duke_energy", 2, 1, "b", EntryData::default());

		assert_ne!(a.entry_id, b.entry_id);
	}
}
