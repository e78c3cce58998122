//! KDL build configuration for variantplan.
//!
//! This crate handles:
//! - Parsing build declarations (variantplan.kdl) into a `RawConfig`
//! - External value providers and `${key}` references
//! - Resolving a `RawConfig` into a `BuildPlan`

pub mod error;
pub mod raw;
pub mod resolver;
pub mod values;

pub use error::{ConfigError, ConfigResult, ResolutionError, ResolutionResult};
pub use raw::{Declared, RawConfig, RawSdk, RawToolchain, RawVariant, SigningRef, load_config, parse_config};
pub use resolver::resolve;
pub use values::{ExternalValue, ExternalValues, ExternalValuesBuilder, ValueProvider};
