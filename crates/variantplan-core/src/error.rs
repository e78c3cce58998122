//! Error types for variantplan core values.

use thiserror::Error;

use crate::toolchain::JavaVersion;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid identifier for {field}: {value:?}")]
    InvalidIdentifier { field: String, value: String },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("invalid sdk ordering: expected min ({0}) <= target ({1}) <= compile ({2})")]
    InvalidSdkOrdering(u32, u32, u32),

    #[error(
        "incompatible toolchain: source {source_compatibility}, target {target_compatibility}, jvm target {jvm_target}"
    )]
    IncompatibleToolchain {
        source_compatibility: JavaVersion,
        target_compatibility: JavaVersion,
        jvm_target: JavaVersion,
    },

    #[error("invalid java version: {0:?}")]
    InvalidJavaVersion(String),
}

pub type Result<T> = std::result::Result<T, Error>;
