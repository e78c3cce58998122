//! Android SDK levels.

use serde::Serialize;

use crate::{Error, Result};

/// Resolved SDK levels for a build.
///
/// Always satisfies `min_sdk <= target_sdk <= compile_sdk`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SdkVersions {
    compile_sdk: u32,
    target_sdk: u32,
    min_sdk: u32,
}

impl SdkVersions {
    pub fn new(min_sdk: u32, target_sdk: u32, compile_sdk: u32) -> Result<Self> {
        for (field, level) in [
            ("minSdk", min_sdk),
            ("targetSdk", target_sdk),
            ("compileSdk", compile_sdk),
        ] {
            if level == 0 {
                return Err(Error::InvalidValue {
                    field: field.to_string(),
                    message: "sdk level must be positive".to_string(),
                });
            }
        }

        if min_sdk > target_sdk || target_sdk > compile_sdk {
            return Err(Error::InvalidSdkOrdering(min_sdk, target_sdk, compile_sdk));
        }

        Ok(Self {
            compile_sdk,
            target_sdk,
            min_sdk,
        })
    }

    pub fn compile_sdk(&self) -> u32 {
        self.compile_sdk
    }

    pub fn target_sdk(&self) -> u32 {
        self.target_sdk
    }

    pub fn min_sdk(&self) -> u32 {
        self.min_sdk
    }
}
