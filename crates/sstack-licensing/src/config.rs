//! ---
//! ss_section: "14-licensing-system"
//! ss_subsection: "module"
//! ss_type: "source"
//! ss_scope: "code"
//! ss_description: "Where license material is configured and how it is loaded."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LicenseError, Result};

fn default_env_license_var() -> String {
    "SSTACK_LICENSE".to_owned()
}

/// Sources of license material, read in order: inline key, file, env var.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LicenseConfig {
    /// License key text embedded directly in configuration.
    #[serde(default)]
    pub key: Option<String>,
    /// File containing the license key text.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Environment variable holding the license key text.
    #[serde(default = "default_env_license_var")]
    pub env_var: String,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            key: None,
            path: None,
            env_var: default_env_license_var(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    license: LicenseConfig,
}

impl LicenseConfig {
    /// Parse the `[license]` table of a TOML document. A missing table yields defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let document: ConfigDocument = toml::from_str(content)
            .map_err(|err| LicenseError::Config(format!("failed to parse configuration: {err}")))?;
        Ok(document.license)
    }

    /// Load the `[license]` table from a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(config_path = %path.display(), "loading license configuration");
        let content = fs::read_to_string(path).map_err(|source| LicenseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Resolve the configured license text, if any source provides one.
    pub fn load_material(&self) -> Result<Option<String>> {
        if let Some(key) = self.key.as_deref().map(str::trim).filter(|key| !key.is_empty()) {
            debug!("using license material from configuration");
            return Ok(Some(key.to_owned()));
        }

        if let Some(path) = &self.path {
            if path.exists() {
                debug!(license_path = %path.display(), "loading license file");
                let raw = fs::read_to_string(path).map_err(|source| LicenseError::Io {
                    path: path.clone(),
                    source,
                })?;
                return Ok(Some(raw.trim().to_owned()));
            }
            debug!(license_path = %path.display(), "configured license file not found");
        }

        match std::env::var(&self.env_var) {
            Ok(value) if !value.trim().is_empty() => {
                debug!(env = %self.env_var, "loaded license material from environment");
                Ok(Some(value.trim().to_owned()))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_table_yields_defaults() {
        let config = LicenseConfig::from_toml_str("[other]\nvalue = 1\n").unwrap();
        assert_eq!(config, LicenseConfig::default());
        assert_eq!(config.env_var, "SSTACK_LICENSE");
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            LicenseConfig::from_toml_str("[license"),
            Err(LicenseError::Config(_))
        ));
    }

    #[test]
    fn inline_key_wins_over_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("license.txt");
        fs::write(&file, "from-file\n").unwrap();
        let config = LicenseConfig {
            key: Some("  inline-key ".into()),
            path: Some(file.clone()),
            env_var: "SSTACK_TEST_UNUSED_LICENSE_VAR".into(),
        };
        assert_eq!(config.load_material().unwrap().as_deref(), Some("inline-key"));

        let config = LicenseConfig { key: None, ..config };
        assert_eq!(config.load_material().unwrap().as_deref(), Some("from-file"));
    }

    #[test]
    fn env_var_is_the_last_resort() {
        let var = "SSTACK_TEST_CONFIG_LICENSE_VAR";
        let config = LicenseConfig {
            key: None,
            path: Some(PathBuf::from("/definitely/not/here.lic")),
            env_var: var.into(),
        };
        std::env::remove_var(var);
        assert_eq!(config.load_material().unwrap(), None);
        std::env::set_var(var, " 1001-abc ");
        assert_eq!(config.load_material().unwrap().as_deref(), Some("1001-abc"));
        std::env::remove_var(var);
    }

    #[test]
    fn reads_license_table_from_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("sstack.toml");
        fs::write(&file, "[license]\npath = \"/etc/sstack/license.txt\"\nenv_var = \"MY_LICENSE\"\n")
            .unwrap();
        let config = LicenseConfig::from_path(&file).unwrap();
        assert_eq!(config.path, Some(PathBuf::from("/etc/sstack/license.txt")));
        assert_eq!(config.env_var, "MY_LICENSE");
        assert_eq!(config.key, None);
    }
}
