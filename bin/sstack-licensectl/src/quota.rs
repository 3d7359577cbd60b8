//! ---
//! ss_section: "05-external-interfaces"
//! ss_subsection: "binary"
//! ss_type: "source"
//! ss_scope: "code"
//! ss_description: "Operator CLI for license keys and quota decisions."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use sstack_licensing::quota::free_quota;
use sstack_licensing::{FeatureSet, LicenseConfig, QuotaType};
use sstack_logging::{log_license_event, LicenseEventOutcome, LogContext};

use crate::license::VerifierOptions;

#[derive(Debug, Args)]
pub struct QuotaCommand {
    /// Feature name, e.g. `Text`, `Redis`, `OrmLite`.
    #[arg(value_name = "FEATURE")]
    feature: FeatureSet,
    /// Quota dimension, e.g. `Types`, `Tables`.
    #[arg(value_name = "QUOTA")]
    quota: QuotaType,
    /// Observed usage count.
    #[arg(value_name = "COUNT")]
    count: u32,
    /// License key file to register before checking.
    #[arg(long, value_name = "FILE", conflicts_with = "config")]
    file: Option<PathBuf>,
    /// TOML config whose `[license]` table names the license.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(flatten)]
    verifier: VerifierOptions,
}

impl QuotaCommand {
    pub fn execute(&self) -> Result<()> {
        let registry = self.verifier.registry()?;
        if let Some(path) = &self.file {
            registry
                .register_license_from_file(path)
                .context("unable to register license file")?;
        }
        if let Some(path) = &self.config {
            let config = LicenseConfig::from_path(path)
                .with_context(|| format!("unable to load config {}", path.display()))?;
            registry
                .register_license_from_config(&config)
                .context("unable to register configured license")?;
        }

        match free_quota(self.feature, self.quota) {
            Some(entry) => println!("Free-tier limit: {}", entry.limit),
            None => println!("Free-tier limit: none"),
        }
        println!("Licensed features: {}", registry.activated_features());

        let feature = self.feature.to_string();
        let quota = self.quota.to_string();
        let ctx = LogContext::new().with_feature(&feature).with_quota(&quota);
        match registry.assert_valid_usage(self.feature, self.quota, self.count) {
            Ok(()) => {
                log_license_event(
                    Some(&ctx),
                    "license.quota",
                    "usage allowed",
                    LicenseEventOutcome::Allowed,
                );
                println!("Allowed: {} {} x{}", feature, quota, self.count);
                Ok(())
            }
            Err(err) => {
                log_license_event(
                    Some(&ctx),
                    "license.quota",
                    &err.to_string(),
                    LicenseEventOutcome::Denied,
                );
                Err(anyhow!(err).context(format!("usage of {feature} {quota} x{} denied", self.count)))
            }
        }
    }
}
