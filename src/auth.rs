//! Auth-domain identifiers, identity claims, and token models.

pub mod claims;
pub mod id;
pub mod token;

pub use claims::*;
pub use id::*;
pub use token::{bundle::*, expiry::*, secret::*};
