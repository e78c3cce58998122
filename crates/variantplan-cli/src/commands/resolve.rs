//! Build plan resolution command.

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use variantplan_config::{ExternalValues, load_config, resolve};
use variantplan_core::BuildPlan;

use crate::OutputFormat;

/// Options for `variantplan resolve`.
pub struct ResolveOptions {
    pub values: Vec<PathBuf>,
    pub overrides: Vec<(String, String)>,
    pub variant: Option<String>,
    pub format: OutputFormat,
}

/// Resolve a declaration and print the plan to stdout.
pub fn run(config_path: &Path, options: &ResolveOptions) -> Result<()> {
    let output = render(config_path, options)?;
    println!("{}", output.trim_end());
    Ok(())
}

/// Resolve a declaration and render the plan, or one variant of it, in the
/// requested format.
pub fn render(config_path: &Path, options: &ResolveOptions) -> Result<String> {
    let raw = load_config(config_path)
        .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

    let values = collect_values(&options.values, &options.overrides)?;
    debug!(keys = values.len(), "external values loaded");

    let plan = resolve(&raw, &values)
        .with_context(|| format!("Failed to resolve {}", config_path.display()))?;

    let output = match &options.variant {
        Some(name) => {
            let variant = plan
                .variant(name)
                .with_context(|| format!("Unknown variant: {}", name))?;
            info!(variant = %name, "rendering single variant");
            match options.format {
                OutputFormat::Json => serde_json::to_string_pretty(variant)?,
                OutputFormat::Text => format!(
                    "{} (minify: {}, signing: {})\n",
                    variant.name(),
                    variant.minify(),
                    variant.signing_identity()
                ),
            }
        }
        None => match options.format {
            OutputFormat::Json => serde_json::to_string_pretty(&plan)?,
            OutputFormat::Text => PlanSummary(&plan).to_string(),
        },
    };

    Ok(output)
}

/// Load values files in order, then apply `--set` overrides on top.
pub fn collect_values(files: &[PathBuf], overrides: &[(String, String)]) -> Result<ExternalValues> {
    let mut values = ExternalValues::new();

    for file in files {
        let loaded = ExternalValues::load(file)
            .with_context(|| format!("Failed to read values file: {}", file.display()))?;
        debug!(file = %file.display(), keys = loaded.len(), "loaded values file");
        values.merge(loaded);
    }

    for (key, value) in overrides {
        values.set(key.as_str(), value.as_str());
    }

    Ok(values)
}

/// Parse a `KEY=VALUE` argument.
pub fn parse_key_value(arg: &str) -> std::result::Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, found {:?}", arg)),
    }
}

/// Human readable plan summary.
pub struct PlanSummary<'a>(pub &'a BuildPlan);

impl fmt::Display for PlanSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plan = self.0;
        let identity = plan.identity();
        let versioning = plan.versioning();
        let sdk = plan.sdk();
        let toolchain = plan.toolchain();

        writeln!(f, "Application: {}", identity.application_id())?;
        writeln!(f, "Namespace:   {}", identity.namespace())?;
        writeln!(
            f,
            "Version:     {} ({})",
            versioning.version_name(),
            versioning.version_code()
        )?;
        writeln!(
            f,
            "SDK:         min {} / target {} / compile {}",
            sdk.min_sdk(),
            sdk.target_sdk(),
            sdk.compile_sdk()
        )?;
        if let Some(ndk) = plan.ndk_version() {
            writeln!(f, "NDK:         {}", ndk)?;
        }
        writeln!(
            f,
            "Toolchain:   source {} / target {} / jvm {}",
            toolchain.source_compatibility(),
            toolchain.target_compatibility(),
            toolchain.jvm_target()
        )?;

        let args = plan.diagnostics().compiler_args();
        if !args.is_empty() {
            writeln!(f, "Compiler:    {}", args.join(" "))?;
        }

        if !plan.plugins().is_empty() {
            writeln!(f, "\nPlugins:")?;
            for plugin in plan.plugins() {
                writeln!(f, "  {}", plugin)?;
            }
        }

        if !plan.dependencies().is_empty() {
            writeln!(f, "\nDependencies:")?;
            for dep in plan.dependencies() {
                writeln!(f, "  {} {}", dep.configuration, dep.coordinate)?;
            }
        }

        writeln!(f, "\nVariants:")?;
        for variant in plan.variants() {
            writeln!(
                f,
                "  {:<12} minify: {:<5} signing: {}",
                variant.name(),
                variant.minify(),
                variant.signing_identity()
            )?;
        }

        Ok(())
    }
}
