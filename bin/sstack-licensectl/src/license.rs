//! ---
//! ss_section: "05-external-interfaces"
//! ss_subsection: "binary"
//! ss_type: "source"
//! ss_scope: "code"
//! ss_description: "Operator CLI for license keys and quota decisions."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use sstack_licensing::{
    decode_license_key, FixedReleaseDate, LicenseConfig, LicenseKey, LicenseRegistry,
    RsaLicenseVerifier, RsaPublicKey,
};
use sstack_logging::{log_license_event, LicenseEventOutcome, LogContext};

/// Where the license key text comes from.
#[derive(Debug, Args)]
pub struct KeySource {
    /// License key text.
    #[arg(value_name = "KEY", conflicts_with_all = ["file", "config"])]
    pub key: Option<String>,
    /// Read the license key from a file.
    #[arg(long, value_name = "FILE", conflicts_with = "config")]
    pub file: Option<PathBuf>,
    /// Resolve the license from the `[license]` table of a TOML config.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl KeySource {
    /// Key text, or `None` when the config resolves to nothing.
    pub fn load(&self) -> Result<Option<String>> {
        if let Some(key) = &self.key {
            return Ok(Some(key.clone()));
        }
        if let Some(path) = &self.file {
            let text = fs::read_to_string(path)
                .with_context(|| format!("unable to read license file {}", path.display()))?;
            return Ok(Some(text));
        }
        if let Some(path) = &self.config {
            let config = LicenseConfig::from_path(path)
                .with_context(|| format!("unable to load config {}", path.display()))?;
            return config
                .load_material()
                .context("unable to resolve configured license");
        }
        Ok(None)
    }

    fn require(&self) -> Result<String> {
        self.load()?
            .ok_or_else(|| anyhow!("no license key given; pass KEY, --file, or --config"))
    }
}

/// Options selecting the verifier and release date.
#[derive(Debug, Args)]
pub struct VerifierOptions {
    /// RSA public key in `<RSAKeyValue>` XML form; defaults to the embedded key.
    #[arg(long, value_name = "XML_FILE")]
    pub public_key: Option<PathBuf>,
    /// Release date to check expiry against; defaults to this build's date.
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub release_date: Option<NaiveDate>,
}

impl VerifierOptions {
    /// Build an isolated registry honouring the overrides.
    pub fn registry(&self) -> Result<LicenseRegistry> {
        let mut registry = LicenseRegistry::new();
        if let Some(path) = &self.public_key {
            let xml = fs::read_to_string(path)
                .with_context(|| format!("unable to read public key {}", path.display()))?;
            let public_key = RsaPublicKey::from_xml(&xml)
                .with_context(|| format!("invalid public key {}", path.display()))?;
            registry = registry.with_verifier(RsaLicenseVerifier::with_public_key(public_key));
        }
        if let Some(date) = self.release_date {
            registry = registry.with_release_date(FixedReleaseDate(date));
        }
        Ok(registry)
    }
}

#[derive(Debug, Args)]
pub struct InspectCommand {
    #[command(flatten)]
    source: KeySource,
    /// Print the decoded record as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct KeyReport<'a> {
    customer_id: &'a str,
    name: &'a str,
    tier: String,
    expiry: String,
    features: Vec<&'static str>,
    signing_payload: String,
}

impl<'a> KeyReport<'a> {
    fn new(key: &'a LicenseKey) -> Self {
        Self {
            customer_id: &key.reference,
            name: &key.name,
            tier: key.tier.to_string(),
            expiry: key.expiry.format("%Y-%m-%d").to_string(),
            features: key.features().names().collect(),
            signing_payload: key.signing_payload(),
        }
    }
}

impl InspectCommand {
    pub fn execute(&self) -> Result<()> {
        let text = self.source.require()?;
        let key = decode_license_key(&text).context("unable to decode license key")?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&KeyReport::new(&key))?);
            return Ok(());
        }
        render_key(&key);
        println!("Signing payload: {}", key.signing_payload());
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct VerifyCommand {
    #[command(flatten)]
    source: KeySource,
    #[command(flatten)]
    verifier: VerifierOptions,
}

impl VerifyCommand {
    pub fn execute(&self) -> Result<()> {
        let text = self.source.require()?;
        let registry = self.verifier.registry()?;
        match registry.register_license(&text) {
            Ok(key) => {
                let ctx = LogContext::new().with_customer(&key.reference);
                log_license_event(
                    Some(&ctx),
                    "license.verify",
                    "license verified",
                    LicenseEventOutcome::Allowed,
                );
                println!("License is valid");
                render_key(&key);
                Ok(())
            }
            Err(err) => {
                log_license_event(
                    None,
                    "license.verify",
                    &err.to_string(),
                    LicenseEventOutcome::Denied,
                );
                Err(anyhow!(err).context("license verification failed"))
            }
        }
    }
}

fn render_key(key: &LicenseKey) {
    println!("Customer id: {}", key.reference);
    println!("Name:        {}", key.name);
    println!("Tier:        {}", key.tier);
    println!("Expiry:      {}", key.expiry);
    println!("Features:    {}", key.features());
}
