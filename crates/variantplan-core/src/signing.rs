//! Signing identities.
//!
//! The resolver only ever handles identity names. Key material stays with
//! the orchestrator's keystore.

use derive_more::Display;
use serde::Serialize;

/// Name of the signing identity every orchestrator provides out of the box.
pub const DEBUG_SIGNING_IDENTITY: &str = "debug";

/// A named reference to a set of signing credentials.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display)]
#[display("{_0}")]
#[serde(transparent)]
pub struct SigningIdentity(String);

impl SigningIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn debug() -> Self {
        Self::new(DEBUG_SIGNING_IDENTITY)
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_debug(&self) -> bool {
        self.0 == DEBUG_SIGNING_IDENTITY
    }
}

impl From<&str> for SigningIdentity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
