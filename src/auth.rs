//! Auth-domain identifiers, the cached token model, and unverified claim decoding.

pub mod claims;
pub mod id;
pub mod secret;
pub mod token;

pub use claims::*;
pub use id::*;
pub use secret::*;
pub use token::*;
