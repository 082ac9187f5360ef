//! Provider-facing descriptors (data), strategies (behavior), and the Duke Energy
//! implementation built from them.
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`): HTTPS endpoints and
//! the registered redirect URI of a public PKCE client. `strategy` maps token endpoint
//! failures into the crate's error taxonomy. `duke_energy` pins the provider's
//! constants and layers its authorize extras and expiry reconciliation over the generic
//! PKCE flow.

pub mod descriptor;
pub mod duke_energy;
pub mod strategy;

pub use descriptor::*;
pub use duke_energy::*;
pub use strategy::*;
