//! Application identity.

use serde::Serialize;

use crate::{Error, Result};

/// The namespace and packaging identity of an application.
///
/// Both values are reverse-domain identifiers (`com.example.app`). The fields
/// are private so a constructed identity can never be changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ApplicationIdentity {
    namespace: String,
    application_id: String,
}

impl ApplicationIdentity {
    /// Create an identity, validating both identifiers.
    pub fn new(namespace: impl Into<String>, application_id: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let application_id = application_id.into();

        validate_reverse_domain("namespace", &namespace)?;
        validate_reverse_domain("applicationId", &application_id)?;

        Ok(Self {
            namespace,
            application_id,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }
}

/// Check that `value` is a dotted identifier with at least two segments,
/// each starting with an ASCII letter followed by letters, digits or `_`.
pub fn validate_reverse_domain(field: &str, value: &str) -> Result<()> {
    let segments: Vec<&str> = value.split('.').collect();

    let well_formed = segments.len() >= 2 && segments.iter().all(|s| is_segment(s));

    if well_formed {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

fn is_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identity() {
        let identity = ApplicationIdentity::new("com.example.app", "com.example.app").unwrap();
        assert_eq!(identity.namespace(), "com.example.app");
        assert_eq!(identity.application_id(), "com.example.app");
    }

    #[test]
    fn test_underscores_and_digits_allowed() {
        assert!(validate_reverse_domain("namespace", "com.example_2.app3").is_ok());
    }

    #[test]
    fn test_single_segment_rejected() {
        let err = ApplicationIdentity::new("app", "com.example.app").unwrap_err();
        assert_eq!(
            err,
            Error::InvalidIdentifier {
                field: "namespace".to_string(),
                value: "app".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_segments_rejected() {
        for bad in ["com..app", "com.1example", "com.example-app", ".com.app", "com.app."] {
            assert!(
                validate_reverse_domain("applicationId", bad).is_err(),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_application_id_field_named_in_error() {
        let err = ApplicationIdentity::new("com.example.app", "not valid").unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier { ref field, .. } if field == "applicationId"));
    }
}
