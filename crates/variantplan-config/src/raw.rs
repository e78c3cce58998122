//! Build declaration parsing.
//!
//! A declaration is a KDL document:
//!
//! ```kdl
//! application namespace="com.example.app" application-id="com.example.app"
//! plugins {
//!     plugin "com.android.application"
//! }
//! sdk min=23 target="${targetSdk}" compile="${compileSdk}"
//! ndk "${ndkVersion}"
//! toolchain source="11"
//! diagnostics {
//!     suppress "options" "deprecation"
//! }
//! version code="${versionCode}" name="${versionName}"
//! variant "debug" signing="debug"
//! variant "release" minify=#true inherit-signing="debug"
//! ```

use kdl::{KdlDocument, KdlNode, KdlValue};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;
use variantplan_core::{Dependency, JavaVersion};

use crate::values::{references_in, validate_template, whole_reference};
use crate::{ConfigError, ConfigResult};

/// A value that is either written out or taken from an external provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declared<T> {
    Literal(T),
    Reference(String),
}

impl<T> Declared<T> {
    pub fn reference(&self) -> Option<&str> {
        match self {
            Declared::Literal(_) => None,
            Declared::Reference(key) => Some(key),
        }
    }
}

/// SDK levels as declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSdk {
    pub min: Declared<u32>,
    pub target: Declared<u32>,
    pub compile: Declared<u32>,
}

/// Toolchain levels as declared. `target` and `jvm_target` default to
/// `source` when the declaration omits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawToolchain {
    pub source: JavaVersion,
    pub target: JavaVersion,
    pub jvm_target: JavaVersion,
}

/// Where a variant gets its signing identity from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningRef {
    /// Named signing identity.
    Identity(String),
    /// Whatever the named variant resolves to.
    Inherit(String),
}

/// A variant as declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawVariant {
    pub name: String,
    pub minify: bool,
    pub signing: Option<SigningRef>,
}

/// An unresolved build declaration.
///
/// String fields that may contain `${key}` references (`version_name`,
/// `ndk_version`) are kept as templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawConfig {
    pub namespace: String,
    pub application_id: String,
    pub plugins: Vec<String>,
    pub sdk: RawSdk,
    pub ndk_version: Option<String>,
    pub toolchain: RawToolchain,
    pub suppressed_diagnostics: Vec<String>,
    pub version_code: Declared<u32>,
    pub version_name: String,
    /// Signing identities declared besides the built-in `debug` one.
    pub signing_identities: Vec<String>,
    pub variants: Vec<RawVariant>,
    pub dependencies: Vec<Dependency>,
    pub framework_source: Option<String>,
}

impl RawConfig {
    /// Every external key this declaration refers to.
    pub fn references(&self) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();

        for declared in [
            &self.sdk.min,
            &self.sdk.target,
            &self.sdk.compile,
            &self.version_code,
        ] {
            if let Some(key) = declared.reference() {
                keys.insert(key.to_string());
            }
        }

        keys.extend(references_in(&self.version_name));
        if let Some(ndk) = &self.ndk_version {
            keys.extend(references_in(ndk));
        }

        keys
    }

    pub fn variant(&self, name: &str) -> Option<&RawVariant> {
        self.variants.iter().find(|v| v.name == name)
    }
}

/// Load and parse a declaration file.
pub fn load_config(path: &Path) -> ConfigResult<RawConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse a build declaration from KDL text.
pub fn parse_config(kdl: &str) -> ConfigResult<RawConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let mut application: Option<(String, String)> = None;
    let mut plugins = Vec::new();
    let mut sdk = None;
    let mut ndk_version = None;
    let mut toolchain = None;
    let mut suppressed_diagnostics = Vec::new();
    let mut version = None;
    let mut signing_identities = Vec::new();
    let mut variants = Vec::new();
    let mut dependencies = Vec::new();
    let mut framework_source = None;

    for node in doc.nodes() {
        let node_name = node.name().value();
        match node_name {
            "application" => {
                ensure_single(&application, node_name)?;
                let namespace = get_string_prop(node, "namespace")
                    .ok_or_else(|| ConfigError::MissingField("application namespace".to_string()))?;
                let application_id = get_string_prop(node, "application-id").ok_or_else(|| {
                    ConfigError::MissingField("application application-id".to_string())
                })?;
                application = Some((namespace, application_id));
            }
            "plugins" => {
                for child in child_nodes(node, "plugin") {
                    let id = get_first_string_arg(child)
                        .ok_or_else(|| ConfigError::MissingField("plugin id".to_string()))?;
                    plugins.push(id);
                }
            }
            "sdk" => {
                ensure_single(&sdk, node_name)?;
                sdk = Some(parse_sdk(node)?);
            }
            "ndk" => {
                ensure_single(&ndk_version, node_name)?;
                let ndk = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("ndk version".to_string()))?;
                check_template("ndk version", &ndk)?;
                ndk_version = Some(ndk);
            }
            "toolchain" => {
                ensure_single(&toolchain, node_name)?;
                toolchain = Some(parse_toolchain(node)?);
            }
            "diagnostics" => {
                for child in child_nodes(node, "suppress") {
                    suppressed_diagnostics.extend(get_all_string_args(child));
                }
            }
            "version" => {
                ensure_single(&version, node_name)?;
                let code = get_declared_int_prop(node, "code", "version code")?
                    .ok_or_else(|| ConfigError::MissingField("version code".to_string()))?;
                let name = get_text_prop(node, "name", "version name")?
                    .ok_or_else(|| ConfigError::MissingField("version name".to_string()))?;
                check_template("version name", &name)?;
                version = Some((code, name));
            }
            "signing" => {
                let names = get_all_string_args(node);
                if names.is_empty() {
                    return Err(ConfigError::MissingField("signing identity name".to_string()));
                }
                signing_identities.extend(names);
            }
            "variant" => {
                variants.push(parse_variant(node)?);
            }
            "dependencies" => {
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        let configuration = child.name().value().to_string();
                        let coordinate = get_first_string_arg(child).ok_or_else(|| {
                            ConfigError::MissingField(format!("{} coordinate", configuration))
                        })?;
                        dependencies.push(Dependency {
                            configuration,
                            coordinate,
                        });
                    }
                }
            }
            "framework" => {
                ensure_single(&framework_source, node_name)?;
                framework_source = Some(
                    get_string_prop(node, "source")
                        .ok_or_else(|| ConfigError::MissingField("framework source".to_string()))?,
                );
            }
            other => {
                debug!(node = other, "ignoring unknown configuration node");
            }
        }
    }

    let (namespace, application_id) =
        application.ok_or_else(|| ConfigError::MissingField("application".to_string()))?;
    let sdk = sdk.ok_or_else(|| ConfigError::MissingField("sdk".to_string()))?;
    let toolchain = toolchain.ok_or_else(|| ConfigError::MissingField("toolchain".to_string()))?;
    let (version_code, version_name) =
        version.ok_or_else(|| ConfigError::MissingField("version".to_string()))?;

    Ok(RawConfig {
        namespace,
        application_id,
        plugins,
        sdk,
        ndk_version,
        toolchain,
        suppressed_diagnostics,
        version_code,
        version_name,
        signing_identities,
        variants,
        dependencies,
        framework_source,
    })
}

fn parse_sdk(node: &KdlNode) -> ConfigResult<RawSdk> {
    let level = |name: &str| -> ConfigResult<Declared<u32>> {
        let field = format!("sdk {}", name);
        get_declared_int_prop(node, name, &field)?.ok_or(ConfigError::MissingField(field))
    };

    Ok(RawSdk {
        min: level("min")?,
        target: level("target")?,
        compile: level("compile")?,
    })
}

fn parse_toolchain(node: &KdlNode) -> ConfigResult<RawToolchain> {
    let version = |name: &str| -> ConfigResult<Option<JavaVersion>> {
        let field = format!("toolchain {}", name);
        match get_text_prop(node, name, &field)? {
            Some(text) => text
                .parse::<JavaVersion>()
                .map(Some)
                .map_err(|e: variantplan_core::Error| ConfigError::InvalidValue {
                    field,
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    };

    let source = version("source")?
        .ok_or_else(|| ConfigError::MissingField("toolchain source".to_string()))?;
    let target = version("target")?.unwrap_or(source);
    let jvm_target = version("jvm-target")?.unwrap_or(source);

    Ok(RawToolchain {
        source,
        target,
        jvm_target,
    })
}

fn parse_variant(node: &KdlNode) -> ConfigResult<RawVariant> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("variant name".to_string()))?;

    let minify = match node.get("minify") {
        None => false,
        Some(value) => value.as_bool().ok_or_else(|| ConfigError::InvalidValue {
            field: format!("variant '{}' minify", name),
            message: format!("expected #true or #false, found {}", value),
        })?,
    };

    let signing = match (
        get_string_prop(node, "signing"),
        get_string_prop(node, "inherit-signing"),
    ) {
        (Some(_), Some(_)) => {
            return Err(ConfigError::InvalidValue {
                field: format!("variant '{}' signing", name),
                message: "signing and inherit-signing are mutually exclusive".to_string(),
            });
        }
        (Some(identity), None) => Some(SigningRef::Identity(identity)),
        (None, Some(target)) => Some(SigningRef::Inherit(target)),
        (None, None) => None,
    };

    Ok(RawVariant {
        name,
        minify,
        signing,
    })
}

fn check_template(field: &str, text: &str) -> ConfigResult<()> {
    validate_template(text).map_err(|message| ConfigError::InvalidValue {
        field: field.to_string(),
        message,
    })
}

fn ensure_single<T>(slot: &Option<T>, node_name: &str) -> ConfigResult<()> {
    if slot.is_some() {
        return Err(ConfigError::Duplicate(format!("{} node", node_name)));
    }
    Ok(())
}

// Helper functions for extracting values from KDL nodes

fn child_nodes<'a>(node: &'a KdlNode, name: &'a str) -> impl Iterator<Item = &'a KdlNode> + 'a {
    node.children()
        .into_iter()
        .flat_map(|children| children.nodes())
        .filter(move |child| child.name().value() == name)
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

/// String property, also accepting a bare integer (`source=11`).
fn get_text_prop(node: &KdlNode, name: &str, field: &str) -> ConfigResult<Option<String>> {
    match node.get(name) {
        None => Ok(None),
        Some(KdlValue::String(s)) => Ok(Some(s.clone())),
        Some(KdlValue::Integer(i)) => Ok(Some(i.to_string())),
        Some(other) => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("expected a string, found {}", other),
        }),
    }
}

/// Integer property that may instead be a `${key}` reference.
fn get_declared_int_prop(
    node: &KdlNode,
    name: &str,
    field: &str,
) -> ConfigResult<Option<Declared<u32>>> {
    let invalid = |message: String| ConfigError::InvalidValue {
        field: field.to_string(),
        message,
    };

    match node.get(name) {
        None => Ok(None),
        Some(KdlValue::Integer(i)) => u32::try_from(*i)
            .map(|n| Some(Declared::Literal(n)))
            .map_err(|_| invalid(format!("{} is out of range", i))),
        Some(KdlValue::String(s)) => {
            if let Some(key) = whole_reference(s) {
                return Ok(Some(Declared::Reference(key)));
            }
            s.trim()
                .parse::<u32>()
                .map(|n| Some(Declared::Literal(n)))
                .map_err(|_| invalid(format!("expected an integer or ${{key}}, found {:?}", s)))
        }
        Some(other) => Err(invalid(format!("expected an integer, found {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        application namespace="com.example.quakereadynep" application-id="com.example.quakereadynep"

        plugins {
            plugin "com.android.application"
            plugin "kotlin-android"
            plugin "dev.flutter.flutter-gradle-plugin"
        }

        sdk min=23 target="${flutter.targetSdkVersion}" compile="${flutter.compileSdkVersion}"
        ndk "27.0.12077973"
        toolchain source="VERSION_11" target="VERSION_11" jvm-target="11"

        diagnostics {
            suppress "options" "deprecation"
        }

        version code="${flutter.versionCode}" name="${flutter.versionName}"

        variant "debug" minify=#false signing="debug"
        variant "release" inherit-signing="debug"

        dependencies {
            implementation "androidx.appcompat:appcompat:1.6.1"
        }

        framework source="../.."
    "#;

    #[test]
    fn test_parse_full_declaration() {
        let raw = parse_config(FULL).unwrap();

        assert_eq!(raw.namespace, "com.example.quakereadynep");
        assert_eq!(raw.plugins.len(), 3);
        assert_eq!(raw.sdk.min, Declared::Literal(23));
        assert_eq!(
            raw.sdk.target,
            Declared::Reference("flutter.targetSdkVersion".to_string())
        );
        assert_eq!(raw.ndk_version.as_deref(), Some("27.0.12077973"));
        assert_eq!(raw.toolchain.source, JavaVersion::new(11));
        assert_eq!(raw.suppressed_diagnostics, vec!["options", "deprecation"]);
        assert_eq!(raw.variants.len(), 2);
        assert_eq!(
            raw.variant("release").unwrap().signing,
            Some(SigningRef::Inherit("debug".to_string()))
        );
        assert!(!raw.variant("release").unwrap().minify);
        assert_eq!(raw.dependencies[0].configuration, "implementation");
        assert_eq!(raw.dependencies[0].coordinate, "androidx.appcompat:appcompat:1.6.1");
        assert_eq!(raw.framework_source.as_deref(), Some("../.."));
    }

    #[test]
    fn test_references() {
        let raw = parse_config(FULL).unwrap();
        let keys: Vec<String> = raw.references().into_iter().collect();
        assert_eq!(
            keys,
            vec![
                "flutter.compileSdkVersion",
                "flutter.targetSdkVersion",
                "flutter.versionCode",
                "flutter.versionName",
            ]
        );
    }

    #[test]
    fn test_toolchain_defaults_to_source() {
        let kdl = r#"
            application namespace="com.example.app" application-id="com.example.app"
            sdk min=21 target=34 compile=34
            toolchain source=17
            version code=1 name="1.0"
        "#;

        let raw = parse_config(kdl).unwrap();
        assert_eq!(raw.toolchain.target, JavaVersion::new(17));
        assert_eq!(raw.toolchain.jvm_target, JavaVersion::new(17));
        assert!(raw.variants.is_empty());
    }

    #[test]
    fn test_missing_application() {
        let kdl = r#"
            sdk min=21 target=34 compile=34
            toolchain source="11"
            version code=1 name="1.0"
        "#;

        assert!(matches!(
            parse_config(kdl).unwrap_err(),
            ConfigError::MissingField(field) if field == "application"
        ));
    }

    #[test]
    fn test_missing_sdk_level() {
        let kdl = r#"
            application namespace="com.example.app" application-id="com.example.app"
            sdk min=21 target=34
            toolchain source="11"
            version code=1 name="1.0"
        "#;

        assert!(matches!(
            parse_config(kdl).unwrap_err(),
            ConfigError::MissingField(field) if field == "sdk compile"
        ));
    }

    #[test]
    fn test_non_integer_sdk_level() {
        let kdl = r#"
            application namespace="com.example.app" application-id="com.example.app"
            sdk min="twenty" target=34 compile=34
            toolchain source="11"
            version code=1 name="1.0"
        "#;

        assert!(matches!(
            parse_config(kdl).unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_duplicate_singleton_node() {
        let kdl = r#"
            application namespace="com.example.app" application-id="com.example.app"
            sdk min=21 target=34 compile=34
            sdk min=23 target=34 compile=34
            toolchain source="11"
            version code=1 name="1.0"
        "#;

        assert!(matches!(
            parse_config(kdl).unwrap_err(),
            ConfigError::Duplicate(_)
        ));
    }

    #[test]
    fn test_conflicting_signing_props() {
        let kdl = r#"
            application namespace="com.example.app" application-id="com.example.app"
            sdk min=21 target=34 compile=34
            toolchain source="11"
            version code=1 name="1.0"
            variant "release" signing="upload" inherit-signing="debug"
        "#;

        assert!(matches!(
            parse_config(kdl).unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_duplicate_variants_kept_for_resolver() {
        let kdl = r#"
            application namespace="com.example.app" application-id="com.example.app"
            sdk min=21 target=34 compile=34
            toolchain source="11"
            version code=1 name="1.0"
            variant "release" signing="debug"
            variant "release" signing="debug"
        "#;

        assert_eq!(parse_config(kdl).unwrap().variants.len(), 2);
    }

    #[test]
    fn test_malformed_version_name_reference() {
        let kdl = r#"
            application namespace="com.example.app" application-id="com.example.app"
            sdk min=21 target=34 compile=34
            toolchain source="11"
            version code=7 name="${version-name}"
        "#;

        assert!(matches!(
            parse_config(kdl).unwrap_err(),
            ConfigError::InvalidValue { field, .. } if field == "version name"
        ));
    }

    #[test]
    fn test_malformed_ndk_reference() {
        for ndk in ["${ndk-version}", "${}", "27.0.${build"] {
            let kdl = format!(
                r#"
                application namespace="com.example.app" application-id="com.example.app"
                sdk min=21 target=34 compile=34
                ndk "{}"
                toolchain source="11"
                version code=7 name="1.0"
                "#,
                ndk
            );

            assert!(
                matches!(
                    parse_config(&kdl).unwrap_err(),
                    ConfigError::InvalidValue { ref field, .. } if field == "ndk version"
                ),
                "{ndk} should be rejected"
            );
        }
    }

    #[test]
    fn test_invalid_kdl() {
        assert!(matches!(
            parse_config("application {").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variantplan.kdl");
        std::fs::write(&path, FULL).unwrap();

        let raw = load_config(&path).unwrap();
        assert_eq!(raw.application_id, "com.example.quakereadynep");
    }
}
