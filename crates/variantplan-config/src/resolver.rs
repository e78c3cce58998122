//! Variant resolution: turns a raw declaration plus external values into a
//! `BuildPlan`.
//!
//! Resolution runs in a fixed order:
//! 1. variant names must be present and unique
//! 2. every `${key}` reference is looked up, collecting all missing keys
//! 3. signing inheritance is followed per variant with cycle detection
//! 4. identity, SDK ordering, toolchain and versioning invariants are checked
//! 5. the plan is assembled
//!
//! It is all-or-nothing and depends only on its inputs.

use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info};
use variantplan_core::signing::DEBUG_SIGNING_IDENTITY;
use variantplan_core::{
    ApplicationIdentity, BuildPlan, CompilerDiagnosticsPolicy, ResolvedVariant, SdkVersions,
    SigningIdentity, ToolchainOptions, VersioningInfo,
};

use crate::raw::{Declared, RawConfig, RawVariant, SigningRef};
use crate::values::{ValueProvider, interpolate};
use crate::{ResolutionError, ResolutionResult};

/// Resolve `raw` against `values` into a fully concrete build plan.
pub fn resolve<P: ValueProvider + ?Sized>(
    raw: &RawConfig,
    values: &P,
) -> ResolutionResult<BuildPlan> {
    debug!(
        application_id = %raw.application_id,
        variants = raw.variants.len(),
        "resolving build configuration"
    );

    if raw.variants.is_empty() {
        return Err(ResolutionError::NoVariants);
    }
    check_unique_names(&raw.variants)?;

    let mut lookup = Lookup::new(values);
    let min_sdk = lookup.integer("minSdk", &raw.sdk.min);
    let target_sdk = lookup.integer("targetSdk", &raw.sdk.target);
    let compile_sdk = lookup.integer("compileSdk", &raw.sdk.compile);
    let version_code = lookup.integer("versionCode", &raw.version_code);
    let version_name = lookup.text("versionName", &raw.version_name);
    let ndk_version = raw
        .ndk_version
        .as_deref()
        .map(|ndk| lookup.text("ndkVersion", ndk));
    lookup.finish()?;

    let signing = resolve_signing(raw)?;

    let identity = ApplicationIdentity::new(raw.namespace.as_str(), raw.application_id.as_str())?;
    let sdk = SdkVersions::new(min_sdk, target_sdk, compile_sdk)?;
    let toolchain = ToolchainOptions::new(
        raw.toolchain.source,
        raw.toolchain.target,
        raw.toolchain.jvm_target,
    )?;
    let diagnostics = CompilerDiagnosticsPolicy::new(raw.suppressed_diagnostics.iter().cloned())?;
    let versioning = VersioningInfo::new(version_code, version_name)?;

    let mut builder = BuildPlan::builder(identity, sdk, toolchain, diagnostics, versioning)
        .with_ndk_version(ndk_version)
        .with_plugins(raw.plugins.iter().cloned())
        .with_dependencies(raw.dependencies.iter().cloned())
        .with_framework_source(raw.framework_source.clone());
    for variant in &raw.variants {
        builder = builder.with_variant(ResolvedVariant::new(
            variant.name.as_str(),
            variant.minify,
            signing[variant.name.as_str()].clone(),
        ));
    }
    let plan = builder.build()?;

    info!(
        application_id = %plan.identity().application_id(),
        variants = plan.variant_names().count(),
        "build plan resolved"
    );

    Ok(plan)
}

fn check_unique_names(variants: &[RawVariant]) -> ResolutionResult<()> {
    let mut seen = HashSet::new();
    for variant in variants {
        if !seen.insert(variant.name.as_str()) {
            return Err(ResolutionError::DuplicateVariantName(variant.name.clone()));
        }
    }
    Ok(())
}

/// Looks up references, remembering every missing key and the first
/// malformed value instead of stopping at the first problem.
struct Lookup<'a, P: ?Sized> {
    values: &'a P,
    missing: BTreeSet<String>,
    invalid: Option<ResolutionError>,
}

impl<'a, P: ValueProvider + ?Sized> Lookup<'a, P> {
    fn new(values: &'a P) -> Self {
        Self {
            values,
            missing: BTreeSet::new(),
            invalid: None,
        }
    }

    /// Returns 0 when the value is unavailable; `finish` then fails, so the
    /// placeholder never reaches a plan.
    fn integer(&mut self, field: &str, declared: &Declared<u32>) -> u32 {
        let key = match declared {
            Declared::Literal(value) => return *value,
            Declared::Reference(key) => key,
        };

        let Some(value) = self.values.get(key) else {
            self.missing.insert(key.clone());
            return 0;
        };

        match value.as_integer().map(u32::try_from) {
            Some(Ok(n)) => n,
            _ => {
                self.invalid.get_or_insert_with(|| ResolutionError::InvalidValue {
                    field: field.to_string(),
                    message: format!("${{{}}} resolved to {:?}, expected an integer", key, value.to_string()),
                });
                0
            }
        }
    }

    /// Interpolates `template`. Text still holding `${` afterwards, from a
    /// malformed reference or from an external value, is invalid.
    fn text(&mut self, field: &str, template: &str) -> String {
        let text = match interpolate(template, self.values) {
            Ok(text) => text,
            Err(missing) => {
                self.missing.extend(missing);
                return String::new();
            }
        };

        if text.contains("${") {
            self.invalid.get_or_insert_with(|| ResolutionError::InvalidValue {
                field: field.to_string(),
                message: format!("unresolved placeholder left in {:?}", text),
            });
        }
        text
    }

    fn finish(self) -> ResolutionResult<()> {
        if !self.missing.is_empty() {
            let mut missing: Vec<String> = self.missing.into_iter().collect();
            return Err(if missing.len() == 1 {
                ResolutionError::UnresolvedReference(missing.remove(0))
            } else {
                ResolutionError::UnresolvedReferences(missing)
            });
        }

        match self.invalid {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Resolve the signing identity of every variant.
///
/// Each inheritance chain is walked once; identities found along the way are
/// memoised for every variant on the chain.
fn resolve_signing(raw: &RawConfig) -> ResolutionResult<HashMap<&str, SigningIdentity>> {
    let by_name: HashMap<&str, &RawVariant> =
        raw.variants.iter().map(|v| (v.name.as_str(), v)).collect();

    let declared: HashSet<&str> = raw
        .signing_identities
        .iter()
        .map(|s| s.as_str())
        .chain(std::iter::once(DEBUG_SIGNING_IDENTITY))
        .collect();

    let mut resolved: HashMap<&str, SigningIdentity> = HashMap::new();

    for variant in &raw.variants {
        if resolved.contains_key(variant.name.as_str()) {
            continue;
        }

        let mut chain: Vec<&str> = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current: &RawVariant = variant;

        let identity = loop {
            chain.push(current.name.as_str());
            visited.insert(current.name.as_str());

            match &current.signing {
                None => {
                    return Err(ResolutionError::MissingSigningIdentity(current.name.clone()));
                }
                Some(SigningRef::Identity(identity)) => {
                    if !declared.contains(identity.as_str()) {
                        return Err(ResolutionError::UnknownSigningIdentity {
                            variant: current.name.clone(),
                            identity: identity.clone(),
                        });
                    }
                    break SigningIdentity::new(identity.as_str());
                }
                Some(SigningRef::Inherit(target)) => {
                    if visited.contains(target.as_str()) {
                        let mut cycle: Vec<String> = chain.iter().map(|s| s.to_string()).collect();
                        cycle.push(target.clone());
                        return Err(ResolutionError::CyclicSigningInheritance(cycle));
                    }
                    if let Some(identity) = resolved.get(target.as_str()) {
                        break identity.clone();
                    }
                    current = by_name.get(target.as_str()).copied().ok_or_else(|| {
                        ResolutionError::UnknownSigningInheritance {
                            variant: current.name.clone(),
                            target: target.clone(),
                        }
                    })?;
                }
            }
        };

        for name in chain {
            debug!(variant = name, identity = %identity, "resolved signing identity");
            resolved.insert(name, identity.clone());
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_config;
    use crate::values::{ExternalValues, ExternalValuesBuilder};

    const HEADER: &str = r#"
        application namespace="com.example.app" application-id="com.example.app"
        plugins {
            plugin "com.android.application"
            plugin "kotlin-android"
        }
        sdk min=23 target="${targetSdk}" compile="${compileSdk}"
        ndk "${ndkVersion}"
        toolchain source="11" target="11" jvm-target="11"
        diagnostics {
            suppress "options" "deprecation"
        }
        version code="${versionCode}" name="${versionName}"
    "#;

    fn config(variants: &str) -> RawConfig {
        parse_config(&format!("{}\n{}", HEADER, variants)).unwrap()
    }

    fn external() -> ExternalValues {
        ExternalValuesBuilder::new()
            .with_target_sdk(34)
            .with_compile_sdk(34)
            .with_version_code(7)
            .with_version_name("1.2.0")
            .with_ndk_version("27.0.12077973")
            .build()
    }

    const DEBUG_RELEASE: &str = r#"
        variant "debug" minify=#false signing="debug"
        variant "release" minify=#true inherit-signing="debug"
    "#;

    #[test]
    fn test_debug_release_scenario() {
        let plan = resolve(&config(DEBUG_RELEASE), &external()).unwrap();

        assert_eq!(plan.variant_names().count(), 2);
        let release = plan.variant("release").unwrap();
        assert!(release.minify());
        assert_eq!(release.signing_identity(), &SigningIdentity::debug());
        assert!(!plan.variant("debug").unwrap().minify());

        assert_eq!(plan.sdk().min_sdk(), 23);
        assert_eq!(plan.sdk().target_sdk(), 34);
        assert_eq!(plan.sdk().compile_sdk(), 34);
        assert_eq!(plan.versioning().version_code(), 7);
        assert_eq!(plan.versioning().version_name(), "1.2.0");
        assert_eq!(plan.ndk_version(), Some("27.0.12077973"));
        assert_eq!(plan.identity().namespace(), "com.example.app");
        assert_eq!(
            plan.diagnostics().compiler_args(),
            vec!["-Xlint:-deprecation", "-Xlint:-options"]
        );
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let raw = config(DEBUG_RELEASE);
        let values = external();
        assert_eq!(resolve(&raw, &values), resolve(&raw, &values));
    }

    #[test]
    fn test_no_placeholder_remains() {
        let plan = resolve(&config(DEBUG_RELEASE), &external()).unwrap();
        let json = serde_json::to_string(&plan).unwrap();
        assert!(!json.contains("${"));
    }

    #[test]
    fn test_malformed_template_rejected() {
        let mut raw = config(DEBUG_RELEASE);
        raw.version_name = "${version-name}".to_string();

        assert!(matches!(
            resolve(&raw, &external()),
            Err(ResolutionError::InvalidValue { ref field, .. }) if field == "versionName"
        ));

        let mut raw = config(DEBUG_RELEASE);
        raw.ndk_version = Some("${}".to_string());

        assert!(matches!(
            resolve(&raw, &external()),
            Err(ResolutionError::InvalidValue { ref field, .. }) if field == "ndkVersion"
        ));
    }

    #[test]
    fn test_placeholder_in_external_value_rejected() {
        let mut values = external();
        values.set("ndkVersion", "${ndkVersion}");

        assert!(matches!(
            resolve(&config(DEBUG_RELEASE), &values),
            Err(ResolutionError::InvalidValue { ref field, .. }) if field == "ndkVersion"
        ));
    }

    #[test]
    fn test_missing_target_sdk() {
        let values = ExternalValuesBuilder::new()
            .with_compile_sdk(34)
            .with_version_code(7)
            .with_version_name("1.2.0")
            .with_ndk_version("27.0.12077973")
            .build();

        assert_eq!(
            resolve(&config(DEBUG_RELEASE), &values),
            Err(ResolutionError::UnresolvedReference("targetSdk".to_string()))
        );
    }

    #[test]
    fn test_all_missing_keys_reported() {
        assert_eq!(
            resolve(&config(DEBUG_RELEASE), &ExternalValues::new()),
            Err(ResolutionError::UnresolvedReferences(vec![
                "compileSdk".to_string(),
                "ndkVersion".to_string(),
                "targetSdk".to_string(),
                "versionCode".to_string(),
                "versionName".to_string(),
            ]))
        );
    }

    #[test]
    fn test_non_integer_external_value() {
        let mut values = external();
        values.set("targetSdk", "latest");

        assert!(matches!(
            resolve(&config(DEBUG_RELEASE), &values),
            Err(ResolutionError::InvalidValue { ref field, .. }) if field == "targetSdk"
        ));
    }

    #[test]
    fn test_integer_text_accepted() {
        let mut values = external();
        values.set("compileSdk", "35");

        let plan = resolve(&config(DEBUG_RELEASE), &values).unwrap();
        assert_eq!(plan.sdk().compile_sdk(), 35);
    }

    #[test]
    fn test_version_name_template() {
        let raw = parse_config(&format!(
            "{}\n{}",
            HEADER.replace(r#"name="${versionName}""#, r#"name="${versionName}-beta""#),
            DEBUG_RELEASE
        ))
        .unwrap();

        let plan = resolve(&raw, &external()).unwrap();
        assert_eq!(plan.versioning().version_name(), "1.2.0-beta");
    }

    #[test]
    fn test_invalid_sdk_ordering() {
        let mut values = external();
        values.set("targetSdk", 35u32);

        assert_eq!(
            resolve(&config(DEBUG_RELEASE), &values),
            Err(ResolutionError::InvalidSdkOrdering(23, 35, 34))
        );
    }

    #[test]
    fn test_duplicate_variant_name() {
        let variants = r#"
            variant "release" signing="debug"
            variant "debug" signing="debug"
            variant "release" minify=#true signing="debug"
        "#;

        assert_eq!(
            resolve(&config(variants), &external()),
            Err(ResolutionError::DuplicateVariantName("release".to_string()))
        );
    }

    #[test]
    fn test_no_variants() {
        assert_eq!(
            resolve(&config(""), &external()),
            Err(ResolutionError::NoVariants)
        );
    }

    #[test]
    fn test_cyclic_inheritance() {
        let variants = r#"
            variant "a" inherit-signing="b"
            variant "b" inherit-signing="a"
        "#;

        assert_eq!(
            resolve(&config(variants), &external()),
            Err(ResolutionError::CyclicSigningInheritance(vec![
                "a".to_string(),
                "b".to_string(),
                "a".to_string(),
            ]))
        );
    }

    #[test]
    fn test_self_inheritance_is_a_cycle() {
        let variants = r#"variant "a" inherit-signing="a""#;

        assert_eq!(
            resolve(&config(variants), &external()),
            Err(ResolutionError::CyclicSigningInheritance(vec![
                "a".to_string(),
                "a".to_string(),
            ]))
        );
    }

    #[test]
    fn test_unknown_inheritance_target() {
        let variants = r#"variant "release" inherit-signing="staging""#;

        assert_eq!(
            resolve(&config(variants), &external()),
            Err(ResolutionError::UnknownSigningInheritance {
                variant: "release".to_string(),
                target: "staging".to_string(),
            })
        );
    }

    #[test]
    fn test_transitive_inheritance() {
        let variants = r#"
            signing "upload"
            variant "profile" inherit-signing="release"
            variant "release" inherit-signing="staging"
            variant "staging" signing="upload"
        "#;

        let plan = resolve(&config(variants), &external()).unwrap();
        for name in ["profile", "release", "staging"] {
            assert_eq!(
                plan.variant(name).unwrap().signing_identity(),
                &SigningIdentity::new("upload")
            );
        }
    }

    #[test]
    fn test_undeclared_signing_identity() {
        let variants = r#"variant "release" signing="upload""#;

        assert_eq!(
            resolve(&config(variants), &external()),
            Err(ResolutionError::UnknownSigningIdentity {
                variant: "release".to_string(),
                identity: "upload".to_string(),
            })
        );
    }

    #[test]
    fn test_missing_signing_identity() {
        let variants = r#"
            variant "debug"
            variant "release" inherit-signing="debug"
        "#;

        assert_eq!(
            resolve(&config(variants), &external()),
            Err(ResolutionError::MissingSigningIdentity("debug".to_string()))
        );
    }

    #[test]
    fn test_incompatible_toolchain() {
        let raw = parse_config(&format!(
            "{}\n{}",
            HEADER.replace(r#"jvm-target="11""#, r#"jvm-target="1.8""#),
            DEBUG_RELEASE
        ))
        .unwrap();

        assert!(matches!(
            resolve(&raw, &external()),
            Err(ResolutionError::IncompatibleToolchain { .. })
        ));
    }

    #[test]
    fn test_invalid_application_id() {
        let raw = parse_config(&format!(
            "{}\n{}",
            HEADER.replace(r#"application-id="com.example.app""#, r#"application-id="example""#),
            DEBUG_RELEASE
        ))
        .unwrap();

        assert_eq!(
            resolve(&raw, &external()),
            Err(ResolutionError::InvalidIdentifier {
                field: "applicationId".to_string(),
                value: "example".to_string(),
            })
        );
    }

    #[test]
    fn test_resolution_from_borrowed_trait_object() {
        let values = external();
        let provider: &dyn ValueProvider = &values;
        assert!(resolve(&config(DEBUG_RELEASE), provider).is_ok());
    }
}
