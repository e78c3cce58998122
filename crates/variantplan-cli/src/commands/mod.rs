//! CLI command implementations.
//!
//! Each command builds its output as a string and prints it, so the output
//! can be checked without capturing stdout.

pub mod resolve;

use anyhow::{Context, Result};
use std::path::Path;
use variantplan_config::load_config;

pub fn validate(path: &Path) -> Result<()> {
    println!("{}", validate_summary(path)?);
    Ok(())
}

/// One-line summary of a declaration that parsed.
pub fn validate_summary(path: &Path) -> Result<String> {
    let raw = load_config(path)
        .with_context(|| format!("Configuration error in {}", path.display()))?;

    Ok(format!(
        "Configuration is valid ({} variants, {} external values)",
        raw.variants.len(),
        raw.references().len()
    ))
}

pub fn values(path: &Path) -> Result<()> {
    for key in value_keys(path)? {
        println!("{}", key);
    }
    Ok(())
}

/// External value keys a declaration refers to, sorted.
pub fn value_keys(path: &Path) -> Result<Vec<String>> {
    let raw = load_config(path)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(raw.references().into_iter().collect())
}
