//! Core domain types for variantplan.
//!
//! This crate contains the concrete, validated values a resolved build plan
//! is made of:
//! - Application identity (namespace and application id)
//! - SDK levels and toolchain compatibility
//! - Compiler diagnostics policy
//! - Signing identities and resolved variants
//! - The `BuildPlan` aggregate

pub mod error;
pub mod identity;
pub mod plan;
pub mod sdk;
pub mod signing;
pub mod toolchain;

pub use error::{Error, Result};
pub use identity::ApplicationIdentity;
pub use plan::{BuildPlan, BuildPlanBuilder, Dependency, ResolvedVariant, VersioningInfo};
pub use sdk::SdkVersions;
pub use signing::SigningIdentity;
pub use toolchain::{CompilerDiagnosticsPolicy, JavaVersion, ToolchainOptions};
