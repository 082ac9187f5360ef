//! Host config flow: user login, re-authentication, and entry creation from a token.

// self
use crate::{
	_prelude::*,
	auth::{AccountIdentity, EntryId, TokenBundle},
	entry::{ConfigEntry, ConfigEntryStore, EntryData, EntryUpdate},
	flows::{AuthorizationSession, ExternalData},
	implementation::OAuth2Implementation,
};

/// Schema major version written by this flow.
pub const VERSION: u32 = 2;
/// Schema minor version written by this flow.
pub const MINOR_VERSION: u32 = 1;

/// Form shown before a re-authentication starts.
pub const STEP_REAUTH_CONFIRM: &str = "reauth_confirm";

/// What started the flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowSource {
	/// User-initiated setup.
	User,
	/// Host-initiated re-authentication of an existing entry.
	Reauth {
		/// Entry being re-authenticated.
		entry_id: EntryId,
	},
}

/// User-visible reasons a flow ends without creating an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AbortReason {
	/// The `id_token` could not be decoded or lacks `internal_identifier`.
	OAuthError,
	/// Re-authentication resolved to a different account.
	WrongAccount,
	/// The account already has an entry.
	AlreadyConfigured,
	/// Re-authentication stored fresh credentials on the existing entry.
	ReauthSuccessful,
}
impl AbortReason {
	/// Reason string reported to the host.
	pub const fn as_str(self) -> &'static str {
		match self {
			AbortReason::OAuthError => "oauth_error",
			AbortReason::WrongAccount => "wrong_account",
			AbortReason::AlreadyConfigured => "already_configured",
			AbortReason::ReauthSuccessful => "reauth_successful",
		}
	}
}
impl Display for AbortReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Next action the host must take.
#[derive(Clone, Debug)]
pub enum FlowResult {
	/// Render a form.
	ShowForm {
		/// Form identifier.
		step_id: &'static str,
	},
	/// Send the user to the provider; resume with [`ConfigFlow::step_external_done`].
	ExternalStep {
		/// Authorize URL to open.
		authorize_url: Url,
	},
	/// A new entry was stored.
	CreateEntry {
		/// Stored entry.
		entry: ConfigEntry,
	},
	/// The flow ended.
	Abort {
		/// Why the flow ended.
		reason: AbortReason,
	},
}
impl FlowResult {
	/// Abort reason, when the flow aborted.
	pub fn abort_reason(&self) -> Option<AbortReason> {
		match self {
			FlowResult::Abort { reason } => Some(*reason),
			_ => None,
		}
	}
}

/// One run of the config flow.
pub struct ConfigFlow {
	implementation: Arc<dyn OAuth2Implementation>,
	store: Arc<dyn ConfigEntryStore>,
	source: FlowSource,
	pending: Option<AuthorizationSession>,
}
impl ConfigFlow {
	/// Creates a user-initiated flow using `implementation` directly.
	pub fn new(
		implementation: Arc<dyn OAuth2Implementation>,
		store: Arc<dyn ConfigEntryStore>,
	) -> Self {
		Self { implementation, store, source: FlowSource::User, pending: None }
	}

	/// What started the flow.
	pub fn source(&self) -> &FlowSource {
		&self.source
	}

	/// Starts the login: generates the authorize URL and waits for the redirect.
	pub fn step_user(&mut self) -> FlowResult {
		let session = self.implementation.generate_authorize_url();
		let authorize_url = session.authorize_url.clone();

		self.pending = Some(session);

		FlowResult::ExternalStep { authorize_url }
	}

	/// Switches the flow to re-authenticate `entry_id` and asks the user to confirm.
	pub async fn step_reauth(&mut self, entry_id: EntryId) -> Result<FlowResult> {
		if self.store.get(&entry_id).await?.is_none() {
			return Err(Error::UnknownEntry { entry_id: entry_id.to_string() });
		}

		self.source = FlowSource::Reauth { entry_id };

		Ok(self.step_reauth_confirm(false))
	}

	/// Shows the confirmation form until `confirmed`, then continues with [`step_user`](Self::step_user).
	pub fn step_reauth_confirm(&mut self, confirmed: bool) -> FlowResult {
		if confirmed {
			self.step_user()
		} else {
			FlowResult::ShowForm { step_id: STEP_REAUTH_CONFIRM }
		}
	}

	/// Resumes after the redirect: exchanges the code and creates (or updates) the entry.
	pub async fn step_external_done(
		&mut self,
		code: impl Into<String>,
		state: impl Into<String>,
	) -> Result<FlowResult> {
		let session = self.pending.take().ok_or_else(|| Error::InvalidGrant {
			reason: "No authorization is in progress for this flow.".into(),
		})?;
		let token = self
			.implementation
			.resolve_external_data(ExternalData::new(session, code, state))
			.await?;
		let data = EntryData::with_token(self.implementation.domain(), token);

		self.oauth_create_entry(data).await
	}

	/// Creates the entry for `data`, or finishes a re-authentication with it.
	pub async fn oauth_create_entry(&self, data: EntryData) -> Result<FlowResult> {
		let Some(identity) = identify(&data) else {
			return Ok(FlowResult::Abort { reason: AbortReason::OAuthError });
		};

		if let FlowSource::Reauth { entry_id } = &self.source {
			return self.finish_reauth(entry_id, &identity, data).await;
		}

		let domain = self.implementation.domain();
		let configured = self
			.store
			.entries(domain)
			.await?
			.into_iter()
			.any(|entry| entry.unique_id.as_deref() == Some(identity.unique_id.as_str()));

		if configured {
			return Ok(FlowResult::Abort { reason: AbortReason::AlreadyConfigured });
		}

		let entry = ConfigEntry::new(domain, VERSION, MINOR_VERSION, identity.title, data)
			.with_unique_id(identity.unique_id);

		self.store.add(entry.clone()).await?;

		tracing::info!(entry_id = %entry.entry_id, "Created config entry.");

		Ok(FlowResult::CreateEntry { entry })
	}

	async fn finish_reauth(
		&self,
		entry_id: &EntryId,
		identity: &AccountIdentity,
		data: EntryData,
	) -> Result<FlowResult> {
		let entry = self
			.store
			.get(entry_id)
			.await?
			.ok_or_else(|| Error::UnknownEntry { entry_id: entry_id.to_string() })?;

		if entry.unique_id.as_deref() != Some(identity.unique_id.as_str()) {
			tracing::error!(%entry_id, "Re-authentication resolved to a different account.");

			return Ok(FlowResult::Abort { reason: AbortReason::WrongAccount });
		}

		self.store
			.update(entry_id, EntryUpdate::data(entry.data.merged(data)))
			.await?
			.ok_or_else(|| Error::UnknownEntry { entry_id: entry_id.to_string() })?;

		tracing::info!(%entry_id, "Stored re-authenticated token.");

		Ok(FlowResult::Abort { reason: AbortReason::ReauthSuccessful })
	}
}
impl Debug for ConfigFlow {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConfigFlow")
			.field("implementation", &self.implementation.name())
			.field("source", &self.source)
			.field("pending", &self.pending.is_some())
			.finish()
	}
}

fn identify(data: &EntryData) -> Option<AccountIdentity> {
	let claims = match data.token.as_ref().map(TokenBundle::identity_claims) {
		Some(Ok(claims)) => claims,
		Some(Err(e)) => {
			tracing::error!(error = %e, "Failed to decode ID token.");

			return None;
		},
		None => {
			tracing::error!("Flow data does not contain a token.");

			return None;
		},
	};
	let identity = claims.account_identity();

	if identity.is_none() {
		tracing::error!("No internal_identifier in ID token claims.");
	}

	identity
}
