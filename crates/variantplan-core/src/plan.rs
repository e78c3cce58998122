//! The resolved build plan.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    ApplicationIdentity, CompilerDiagnosticsPolicy, Error, Result, SdkVersions, SigningIdentity,
    ToolchainOptions,
};

/// Largest version code accepted by the Play store.
pub const MAX_VERSION_CODE: u32 = 2_100_000_000;

/// Version metadata supplied by the framework's build tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VersioningInfo {
    version_code: u32,
    version_name: String,
}

impl VersioningInfo {
    pub fn new(version_code: u32, version_name: impl Into<String>) -> Result<Self> {
        let version_name = version_name.into();

        if version_code == 0 || version_code > MAX_VERSION_CODE {
            return Err(Error::InvalidValue {
                field: "versionCode".to_string(),
                message: format!("{} is outside 1..={}", version_code, MAX_VERSION_CODE),
            });
        }

        if version_name.trim().is_empty() {
            return Err(Error::InvalidValue {
                field: "versionName".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        Ok(Self {
            version_code,
            version_name,
        })
    }

    pub fn version_code(&self) -> u32 {
        self.version_code
    }

    pub fn version_name(&self) -> &str {
        &self.version_name
    }
}

/// A library dependency declared for the application module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Dependency {
    /// Dependency configuration (e.g., "implementation").
    pub configuration: String,
    /// Maven coordinate (e.g., "androidx.appcompat:appcompat:1.6.1").
    pub coordinate: String,
}

/// A build variant with every reference resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedVariant {
    /// Variant name (e.g., "release").
    name: String,
    /// Whether code shrinking is enabled.
    minify: bool,
    /// Signing identity, after following inheritance.
    signing_identity: SigningIdentity,
}

impl ResolvedVariant {
    pub fn new(name: impl Into<String>, minify: bool, signing_identity: SigningIdentity) -> Self {
        Self {
            name: name.into(),
            minify,
            signing_identity,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn minify(&self) -> bool {
        self.minify
    }

    pub fn signing_identity(&self) -> &SigningIdentity {
        &self.signing_identity
    }
}

/// A fully resolved build plan.
///
/// Every field is concrete. Settings other than `variants` are shared by all
/// variants. Plans are assembled through [`BuildPlan::builder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    identity: ApplicationIdentity,
    sdk: SdkVersions,
    toolchain: ToolchainOptions,
    diagnostics: CompilerDiagnosticsPolicy,
    versioning: VersioningInfo,
    /// NDK version, if the configuration pins one.
    ndk_version: Option<String>,
    /// Gradle plugin ids in declaration order.
    plugins: Vec<String>,
    /// Declared dependencies in declaration order.
    dependencies: Vec<Dependency>,
    /// Path to the framework project root, relative to the module.
    framework_source: Option<String>,
    /// Variants keyed by name.
    variants: BTreeMap<String, ResolvedVariant>,
}

impl BuildPlan {
    /// Start a plan from the settings every plan must have.
    pub fn builder(
        identity: ApplicationIdentity,
        sdk: SdkVersions,
        toolchain: ToolchainOptions,
        diagnostics: CompilerDiagnosticsPolicy,
        versioning: VersioningInfo,
    ) -> BuildPlanBuilder {
        BuildPlanBuilder {
            identity,
            sdk,
            toolchain,
            diagnostics,
            versioning,
            ndk_version: None,
            plugins: Vec::new(),
            dependencies: Vec::new(),
            framework_source: None,
            variants: Vec::new(),
        }
    }

    pub fn identity(&self) -> &ApplicationIdentity {
        &self.identity
    }

    pub fn sdk(&self) -> &SdkVersions {
        &self.sdk
    }

    pub fn toolchain(&self) -> &ToolchainOptions {
        &self.toolchain
    }

    pub fn diagnostics(&self) -> &CompilerDiagnosticsPolicy {
        &self.diagnostics
    }

    pub fn versioning(&self) -> &VersioningInfo {
        &self.versioning
    }

    pub fn ndk_version(&self) -> Option<&str> {
        self.ndk_version.as_deref()
    }

    pub fn plugins(&self) -> &[String] {
        &self.plugins
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn framework_source(&self) -> Option<&str> {
        self.framework_source.as_deref()
    }

    pub fn variant(&self, name: &str) -> Option<&ResolvedVariant> {
        self.variants.get(name)
    }

    /// Variants ordered by name.
    pub fn variants(&self) -> impl Iterator<Item = &ResolvedVariant> {
        self.variants.values()
    }

    pub fn variant_names(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(|k| k.as_str())
    }

    /// Signing identities actually used by some variant, without duplicates.
    pub fn signing_identities(&self) -> Vec<&SigningIdentity> {
        let mut identities: Vec<&SigningIdentity> =
            self.variants.values().map(|v| &v.signing_identity).collect();
        identities.sort();
        identities.dedup();
        identities
    }
}

/// Builder for [`BuildPlan`].
#[derive(Debug)]
pub struct BuildPlanBuilder {
    identity: ApplicationIdentity,
    sdk: SdkVersions,
    toolchain: ToolchainOptions,
    diagnostics: CompilerDiagnosticsPolicy,
    versioning: VersioningInfo,
    ndk_version: Option<String>,
    plugins: Vec<String>,
    dependencies: Vec<Dependency>,
    framework_source: Option<String>,
    variants: Vec<ResolvedVariant>,
}

impl BuildPlanBuilder {
    pub fn with_ndk_version(mut self, ndk_version: Option<String>) -> Self {
        self.ndk_version = ndk_version;
        self
    }

    pub fn with_plugins(mut self, plugins: impl IntoIterator<Item = String>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = Dependency>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    pub fn with_framework_source(mut self, framework_source: Option<String>) -> Self {
        self.framework_source = framework_source;
        self
    }

    pub fn with_variant(mut self, variant: ResolvedVariant) -> Self {
        self.variants.push(variant);
        self
    }

    /// Finish the plan. A plan needs at least one variant and variant names
    /// must be unique.
    pub fn build(self) -> Result<BuildPlan> {
        if self.variants.is_empty() {
            return Err(Error::InvalidValue {
                field: "variants".to_string(),
                message: "a plan needs at least one variant".to_string(),
            });
        }

        let mut variants = BTreeMap::new();
        for variant in self.variants {
            if variants.contains_key(&variant.name) {
                return Err(Error::InvalidValue {
                    field: "variants".to_string(),
                    message: format!("duplicate variant {:?}", variant.name),
                });
            }
            variants.insert(variant.name.clone(), variant);
        }

        Ok(BuildPlan {
            identity: self.identity,
            sdk: self.sdk,
            toolchain: self.toolchain,
            diagnostics: self.diagnostics,
            versioning: self.versioning,
            ndk_version: self.ndk_version,
            plugins: self.plugins,
            dependencies: self.dependencies,
            framework_source: self.framework_source,
            variants,
        })
    }
}
