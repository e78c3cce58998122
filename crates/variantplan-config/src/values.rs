//! External values and `${key}` references.
//!
//! Declarations refer to values owned by the framework's build tool:
//! - `${compileSdk}` - SDK level to compile against
//! - `${targetSdk}` - SDK level to target
//! - `${versionCode}` - Integer version code
//! - `${versionName}` - Human readable version name
//! - `${ndkVersion}` - NDK version to pin
//!
//! Any dotted key works (`${flutter.versionCode}`). Values are supplied by a
//! [`ValueProvider`]; [`ExternalValues`] is the stock in-memory provider and
//! can be loaded from `.properties` or JSON files.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use crate::{ConfigError, ConfigResult};

/// Well-known external value keys.
pub mod keys {
    pub const COMPILE_SDK: &str = "compileSdk";
    pub const TARGET_SDK: &str = "targetSdk";
    pub const VERSION_CODE: &str = "versionCode";
    pub const VERSION_NAME: &str = "versionName";
    pub const NDK_VERSION: &str = "ndkVersion";
}

// Regex for matching ${...} references anywhere in a string
static REFERENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\}").unwrap()
});

// Regex for a string that is exactly one reference
static WHOLE_REFERENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\}$").unwrap()
});

/// A value supplied from outside the declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalValue {
    Integer(i64),
    Text(String),
}

impl ExternalValue {
    /// Integer view of the value. Text is accepted when it parses as one,
    /// since properties files carry everything as text.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ExternalValue::Integer(i) => Some(*i),
            ExternalValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for ExternalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalValue::Integer(i) => write!(f, "{}", i),
            ExternalValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ExternalValue {
    fn from(value: i64) -> Self {
        ExternalValue::Integer(value)
    }
}

impl From<u32> for ExternalValue {
    fn from(value: u32) -> Self {
        ExternalValue::Integer(value.into())
    }
}

impl From<&str> for ExternalValue {
    fn from(value: &str) -> Self {
        ExternalValue::Text(value.to_string())
    }
}

impl From<String> for ExternalValue {
    fn from(value: String) -> Self {
        ExternalValue::Text(value)
    }
}

/// Supplies concrete values for `${key}` references at resolution time.
pub trait ValueProvider {
    fn get(&self, key: &str) -> Option<ExternalValue>;
}

impl<P: ValueProvider + ?Sized> ValueProvider for &P {
    fn get(&self, key: &str) -> Option<ExternalValue> {
        (**self).get(key)
    }
}

/// In-memory external values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalValues {
    values: BTreeMap<String, ExternalValue>,
}

impl ExternalValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ExternalValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    /// Overlay `other` on top of `self`; keys in `other` win.
    pub fn merge(&mut self, other: ExternalValues) {
        self.values.extend(other.values);
    }

    /// Parse a Java `.properties` document.
    ///
    /// Keys end at the first unescaped `=`, `:` or whitespace; a bare key has
    /// an empty value. A line ending in an odd number of backslashes
    /// continues on the next line. Unicode `\uXXXX` escapes are not decoded.
    /// Every value is kept as text.
    pub fn from_properties(input: &str) -> ConfigResult<Self> {
        let mut values = Self::new();

        for (line_number, line) in logical_lines(input) {
            let (key, value) = split_property(&line);

            if key.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("properties line {}", line_number),
                    message: format!("empty key in {:?}", line),
                });
            }

            values.set(key, ExternalValue::Text(value));
        }

        Ok(values)
    }

    /// Parse a JSON object. Nested objects are flattened into dotted keys
    /// (`{"flutter": {"versionCode": 7}}` yields `flutter.versionCode`).
    pub fn from_json(input: &str) -> ConfigResult<Self> {
        let root: serde_json::Value = serde_json::from_str(input)?;
        let serde_json::Value::Object(map) = root else {
            return Err(ConfigError::InvalidValue {
                field: "values".to_string(),
                message: "expected a JSON object".to_string(),
            });
        };

        let mut values = Self::new();
        flatten_json("", &map, &mut values)?;
        Ok(values)
    }

    /// Load a values file, choosing the format by extension: `.json` is JSON,
    /// anything else is read as properties.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_properties(&content),
        }
    }
}

impl ValueProvider for ExternalValues {
    fn get(&self, key: &str) -> Option<ExternalValue> {
        self.values.get(key).cloned()
    }
}

const PROPERTY_WHITESPACE: [char; 3] = [' ', '\t', '\x0c'];

/// Join continued lines, dropping blanks and comments. Yields the 1-based
/// number of the line each logical line starts on.
fn logical_lines(input: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (index, raw_line) in input.lines().enumerate() {
        let line = raw_line.trim_start_matches(PROPERTY_WHITESPACE);

        let (start, mut text) = match pending.take() {
            Some((start, text)) => (start, text),
            None => {
                if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                    continue;
                }
                (index + 1, String::new())
            }
        };

        let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            text.push_str(&line[..line.len() - 1]);
            pending = Some((start, text));
        } else {
            text.push_str(line);
            lines.push((start, text));
        }
    }

    if let Some(last) = pending {
        lines.push(last);
    }

    lines
}

fn split_property(line: &str) -> (String, String) {
    let mut escaped = false;
    let mut key_end = line.len();

    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\x0c' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let rest = line[key_end..].trim_start_matches(PROPERTY_WHITESPACE);
    let rest = rest.strip_prefix(['=', ':']).unwrap_or(rest);
    let value = rest.trim_start_matches(PROPERTY_WHITESPACE);

    (unescape(&line[..key_end]), unescape(value))
}

fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn flatten_json(
    prefix: &str,
    map: &serde_json::Map<String, serde_json::Value>,
    values: &mut ExternalValues,
) -> ConfigResult<()> {
    for (key, value) in map {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            serde_json::Value::String(s) => values.set(full_key, s.as_str()),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => values.set(full_key, i),
                None => {
                    return Err(ConfigError::InvalidValue {
                        field: full_key,
                        message: format!("expected an integer, found {}", n),
                    });
                }
            },
            serde_json::Value::Object(nested) => flatten_json(&full_key, nested, values)?,
            other => {
                return Err(ConfigError::InvalidValue {
                    field: full_key,
                    message: format!("unsupported value {}", other),
                });
            }
        }
    }
    Ok(())
}

/// Builder for creating ExternalValues.
pub struct ExternalValuesBuilder {
    values: ExternalValues,
}

impl ExternalValuesBuilder {
    pub fn new() -> Self {
        Self {
            values: ExternalValues::new(),
        }
    }

    pub fn with_compile_sdk(self, level: u32) -> Self {
        self.with_value(keys::COMPILE_SDK, level)
    }

    pub fn with_target_sdk(self, level: u32) -> Self {
        self.with_value(keys::TARGET_SDK, level)
    }

    pub fn with_version_code(self, code: u32) -> Self {
        self.with_value(keys::VERSION_CODE, code)
    }

    pub fn with_version_name(self, name: impl Into<String>) -> Self {
        let name: String = name.into();
        self.with_value(keys::VERSION_NAME, name)
    }

    pub fn with_ndk_version(self, version: impl Into<String>) -> Self {
        let version: String = version.into();
        self.with_value(keys::NDK_VERSION, version)
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<ExternalValue>) -> Self {
        self.values.set(key, value);
        self
    }

    pub fn build(self) -> ExternalValues {
        self.values
    }
}

impl Default for ExternalValuesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Keys referenced anywhere in `input`, in order of appearance.
pub fn references_in(input: &str) -> Vec<String> {
    REFERENCE_REGEX
        .captures_iter(input)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// The key if `input` is exactly one `${key}` reference.
pub fn whole_reference(input: &str) -> Option<String> {
    WHOLE_REFERENCE_REGEX
        .captures(input)
        .map(|caps| caps[1].to_string())
}

/// Check that every `${` in `input` opens a well-formed `${key}` reference.
pub fn validate_template(input: &str) -> Result<(), String> {
    let stripped = REFERENCE_REGEX.replace_all(input, "");
    match stripped.find("${") {
        None => Ok(()),
        Some(at) => {
            let fragment: String = stripped[at..].chars().take(24).collect();
            Err(format!("malformed reference starting at {:?}", fragment))
        }
    }
}

/// Substitute every reference in `input`.
///
/// On failure returns all keys the provider could not supply.
pub fn interpolate<P: ValueProvider + ?Sized>(
    input: &str,
    provider: &P,
) -> Result<String, BTreeSet<String>> {
    let mut missing = BTreeSet::new();

    let output = REFERENCE_REGEX
        .replace_all(input, |caps: &regex::Captures| match provider.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => {
                missing.insert(caps[1].to_string());
                String::new()
            }
        })
        .to_string();

    if missing.is_empty() {
        Ok(output)
    } else {
        Err(missing)
    }
}
