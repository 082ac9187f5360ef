//! Token bundle model, secret redaction, and id_token expiry reconciliation.

pub mod bundle;
pub mod expiry;
pub mod secret;
