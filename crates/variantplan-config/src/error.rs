//! Configuration parsing and resolution errors.

use thiserror::Error;
use variantplan_core::JavaVersion;

/// Errors raised while reading a declaration or a values file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("KDL parse error: {0}")]
    Parse(#[from] kdl::KdlError),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("duplicate definition: {0}")]
    Duplicate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors raised while turning a raw configuration into a build plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("no build variants declared")]
    NoVariants,

    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),

    #[error("unresolved references: {}", .0.join(", "))]
    UnresolvedReferences(Vec<String>),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("invalid identifier for {field}: {value:?}")]
    InvalidIdentifier { field: String, value: String },

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

    #[error("duplicate variant name: {0}")]
    DuplicateVariantName(String),

    #[error("variant '{variant}' uses undeclared signing identity '{identity}'")]
    UnknownSigningIdentity { variant: String, identity: String },

    #[error("variant '{0}' has no signing identity")]
    MissingSigningIdentity(String),

    #[error("variant '{variant}' inherits signing from unknown variant '{target}'")]
    UnknownSigningInheritance { variant: String, target: String },

    #[error("cyclic signing inheritance: {}", .0.join(" -> "))]
    CyclicSigningInheritance(Vec<String>),
}

pub type ResolutionResult<T> = std::result::Result<T, ResolutionError>;

impl From<variantplan_core::Error> for ResolutionError {
    fn from(err: variantplan_core::Error) -> Self {
        use variantplan_core::Error;

        match err {
            Error::InvalidIdentifier { field, value } => {
                ResolutionError::InvalidIdentifier { field, value }
            }
            Error::InvalidValue { field, message } => ResolutionError::InvalidValue { field, message },
            Error::InvalidSdkOrdering(min, target, compile) => {
                ResolutionError::InvalidSdkOrdering(min, target, compile)
            }
            Error::IncompatibleToolchain {
                source_compatibility,
                target_compatibility,
                jvm_target,
            } => ResolutionError::IncompatibleToolchain {
                source_compatibility,
                target_compatibility,
                jvm_target,
            },
            Error::InvalidJavaVersion(value) => ResolutionError::InvalidValue {
                field: "toolchain".to_string(),
                message: format!("invalid java version: {:?}", value),
            },
        }
    }
}
