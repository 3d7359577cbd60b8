//! ---
//! ss_section: "14-licensing-system"
//! ss_subsection: "module"
//! ss_type: "source"
//! ss_scope: "code"
//! ss_description: "Error taxonomy for license registration and quota checks."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::features::{FeatureSet, QuotaType};

/// Appended to every registration failure shown to customers.
pub const CONTACT_DETAILS: &str =
    " Please see sstack.dev or contact licensing@sstack.dev for more details.";

/// Appended to every quota failure.
pub const UPGRADE_INSTRUCTIONS: &str =
    " Please see https://sstack.dev/pricing to upgrade to a commercial license.";

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LicenseError>;

/// Failures raised while registering licenses or checking usage.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The key text could not be parsed.
    #[error("invalid license key format: {0}")]
    InvalidFormat(String),
    /// The record inside the key belongs to another customer.
    #[error("The license '{key}' is not assigned to CustomerId '{customer_id}'.")]
    MismatchedCustomer {
        /// Encoded payload portion of the key.
        key: String,
        /// Customer id prefix supplied with the key.
        customer_id: String,
    },
    /// Verification failed. The message never carries the underlying cause.
    #[error("This license is invalid.{}{}", CONTACT_DETAILS, customer_suffix(.customer_id))]
    LicenseInvalid {
        /// Customer id prefix, when one could be read from the key text.
        customer_id: Option<String>,
    },
    /// The build postdates the license expiry.
    #[error(
        "This license has expired on {} and is not valid for use with this release.{}",
        .expiry.format("%Y-%m-%d"),
        CONTACT_DETAILS
    )]
    LicenseExpired {
        /// Expiry date carried by the license.
        expiry: NaiveDate,
    },
    /// Free-tier usage limit exceeded.
    #[error("{message}")]
    QuotaExceeded {
        /// Feature being used.
        feature: FeatureSet,
        /// Dimension the usage was measured against.
        quota: QuotaType,
        /// Free-tier limit for the pair.
        limit: u32,
        /// Customer facing message, limit already interpolated.
        message: String,
    },
    /// No free quota exists for the requested pair.
    #[error("Unknown Quota Usage: {feature}, {quota}")]
    UnknownQuota {
        /// Feature being used.
        feature: FeatureSet,
        /// Dimension the usage was measured against.
        quota: QuotaType,
    },
    /// The tier name is not one this build understands.
    #[error("Unknown License Type: {0}")]
    UnknownTier(String),
    /// A temporary grant was requested by an unrecognised caller.
    #[error("Unauthorized access request of a licensed feature.{}", UPGRADE_INSTRUCTIONS)]
    UnauthorizedAccessRequest,
    /// `register_license_from_file` was pointed at a missing file.
    #[error("License file does not exist: {}", .0.display())]
    LicenseFileMissing(PathBuf),
    /// Reading license material failed.
    #[error("failed to read license material from {}", .path.display())]
    Io {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// License configuration could not be loaded.
    #[error("invalid license configuration: {0}")]
    Config(String),
}

impl LicenseError {
    /// True for failures caused by license material or usage, false for
    /// caller mistakes such as unknown quota pairs and for IO problems.
    #[must_use]
    pub fn is_licensing_failure(&self) -> bool {
        matches!(
            self,
            LicenseError::InvalidFormat(_)
                | LicenseError::MismatchedCustomer { .. }
                | LicenseError::LicenseInvalid { .. }
                | LicenseError::LicenseExpired { .. }
                | LicenseError::QuotaExceeded { .. }
                | LicenseError::UnauthorizedAccessRequest
                | LicenseError::LicenseFileMissing(_)
        )
    }

    /// Short label used for telemetry.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            LicenseError::InvalidFormat(_) => "malformed",
            LicenseError::MismatchedCustomer { .. } => "mismatched_customer",
            LicenseError::LicenseInvalid { .. } => "invalid_signature",
            LicenseError::LicenseExpired { .. } => "expired",
            LicenseError::QuotaExceeded { .. } => "quota_exceeded",
            LicenseError::UnknownQuota { .. } => "unknown_quota",
            LicenseError::UnknownTier(_) => "unknown_tier",
            LicenseError::UnauthorizedAccessRequest => "unauthorized_access",
            LicenseError::LicenseFileMissing(_) => "missing",
            LicenseError::Io { .. } => "io",
            LicenseError::Config(_) => "config",
        }
    }
}

fn customer_suffix(customer_id: &Option<String>) -> String {
    match customer_id {
        Some(id) if !id.is_empty() => format!(" The id for this license is '{id}'"),
        _ => String::new(),
    }
}
