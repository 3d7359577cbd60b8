//! ---
//! ss_section: "14-licensing-system"
//! ss_subsection: "module"
//! ss_type: "source"
//! ss_scope: "code"
//! ss_description: "License verification and free-tier quota enforcement."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! sstack licensing crate: decodes and verifies commercial license keys,
//! tracks the activated license, and enforces free-tier usage quotas for
//! unlicensed callers.

pub mod certificates;
pub mod config;
pub mod core;
pub mod error;
pub mod features;
mod jsv;
pub mod key;
pub mod logging;
pub mod quota;
pub mod release;
pub mod scope;

pub use crate::certificates::{EmbeddedKey, LicenseVerifier, RsaLicenseVerifier, RsaPublicKey};
pub use crate::config::LicenseConfig;
pub use crate::core::{
    activated_features, assert_valid_usage, global, has_licensed_feature, register_license,
    register_license_from_config, register_license_from_file, remove_license, LicenseRegistry,
};
pub use crate::error::{LicenseError, Result};
pub use crate::features::{FeatureSet, QuotaType};
pub use crate::key::{decode_license_key, encode_license_key, LicenseKey, LicenseTier};
pub use crate::release::{BuildReleaseDate, FixedReleaseDate, ReleaseDateProvider};
pub use crate::scope::{current_grant, request_access, AccessGrant, ClientAccessToken};
