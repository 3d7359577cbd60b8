//! ---
//! ss_section: "14-licensing-system"
//! ss_subsection: "module"
//! ss_type: "source"
//! ss_scope: "code"
//! ss_description: "Activated license state and the registration pipeline."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::certificates::{LicenseVerifier, RsaLicenseVerifier};
use crate::config::LicenseConfig;
use crate::error::{LicenseError, Result};
use crate::features::{FeatureSet, QuotaType};
use crate::key::{customer_id_of, decode_license_key, LicenseKey};
use crate::logging::{record_invalid_license, record_license_load};
use crate::quota::assert_usage_allowed;
use crate::release::{BuildReleaseDate, ReleaseDateProvider};
use crate::scope::AccessGrant;

static GLOBAL_REGISTRY: Lazy<LicenseRegistry> = Lazy::new(LicenseRegistry::new);

/// Process-wide registry backing the free-function API.
#[must_use]
pub fn global() -> &'static LicenseRegistry {
    &GLOBAL_REGISTRY
}

/// Holds the activated license and the collaborators needed to accept one.
///
/// Registration swaps the whole key in one write, so readers observe either
/// the previous license or the new one.
pub struct LicenseRegistry {
    activated: RwLock<Option<Arc<LicenseKey>>>,
    verifier: Box<dyn LicenseVerifier>,
    release: Box<dyn ReleaseDateProvider>,
}

impl Default for LicenseRegistry {
    fn default() -> Self {
        Self {
            activated: RwLock::new(None),
            verifier: Box::new(RsaLicenseVerifier::new()),
            release: Box::new(BuildReleaseDate),
        }
    }
}

impl fmt::Debug for LicenseRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LicenseRegistry")
            .field("activated", &self.active_license())
            .field("release_date", &self.release.release_date())
            .finish_non_exhaustive()
    }
}

impl LicenseRegistry {
    /// Registry verifying against the embedded license key and build date.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the signature verifier.
    #[must_use]
    pub fn with_verifier(mut self, verifier: impl LicenseVerifier + 'static) -> Self {
        self.verifier = Box::new(verifier);
        self
    }

    /// Replace the release date provider.
    #[must_use]
    pub fn with_release_date(mut self, release: impl ReleaseDateProvider + 'static) -> Self {
        self.release = Box::new(release);
        self
    }

    /// Decode, verify, and activate a license key.
    ///
    /// On failure the previously activated license stays in place.
    pub fn register_license(&self, text: &str) -> Result<Arc<LicenseKey>> {
        let customer_id = customer_id_of(text);
        let key = match self.verify_license_key_text(text) {
            Ok(key) => key,
            Err(err) => {
                let err = match err {
                    LicenseError::MismatchedCustomer { .. } | LicenseError::LicenseInvalid { .. } => err,
                    other => {
                        debug!(reason = other.reason(), "license verification failed");
                        LicenseError::LicenseInvalid {
                            customer_id: customer_id.clone(),
                        }
                    }
                };
                record_invalid_license(err.reason(), customer_id.as_deref());
                return Err(err);
            }
        };

        let release_date = self.release.release_date();
        if release_date > key.expiry {
            record_invalid_license("expired", Some(&key.reference));
            return Err(LicenseError::LicenseExpired { expiry: key.expiry });
        }

        let key = Arc::new(key);
        *self.activated.write() = Some(Arc::clone(&key));
        record_license_load(&key);
        Ok(key)
    }

    /// Read a key from `path` and register it.
    pub fn register_license_from_file(&self, path: impl AsRef<Path>) -> Result<Arc<LicenseKey>> {
        let path = path.as_ref();
        if !path.is_file() {
            record_invalid_license("missing", None);
            return Err(LicenseError::LicenseFileMissing(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| LicenseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.register_license(&text)
    }

    /// Register whatever license `config` points at. `Ok(None)` when nothing is configured.
    pub fn register_license_from_config(
        &self,
        config: &LicenseConfig,
    ) -> Result<Option<Arc<LicenseKey>>> {
        match config.load_material()? {
            Some(text) => self.register_license(&text).map(Some),
            None => {
                debug!("no license configured; running on free quotas");
                Ok(None)
            }
        }
    }

    /// Forget the activated license. Safe to call when none is active.
    pub fn remove_license(&self) {
        if self.activated.write().take().is_some() {
            debug!("license removed");
        }
    }

    /// Currently activated license, if any.
    #[must_use]
    pub fn active_license(&self) -> Option<Arc<LicenseKey>> {
        self.activated.read().clone()
    }

    /// Features granted by the activated license; empty without one.
    #[must_use]
    pub fn activated_features(&self) -> FeatureSet {
        self.activated
            .read()
            .as_deref()
            .map_or(FeatureSet::empty(), LicenseKey::features)
    }

    /// True when the activated license covers every bit of `feature`.
    #[must_use]
    pub fn has_licensed_feature(&self, feature: FeatureSet) -> bool {
        self.activated_features().contains(feature)
    }

    /// Fail unless `count` units of `feature` are allowed right now.
    pub fn assert_valid_usage(&self, feature: FeatureSet, quota: QuotaType, count: u32) -> Result<()> {
        assert_usage_allowed(self.activated_features(), feature, quota, count)
    }

    fn verify_license_key_text(&self, text: &str) -> Result<LicenseKey> {
        let _grant = AccessGrant::acquire(FeatureSet::TEXT);
        // Reading the record is a Text serializer use like any other.
        self.assert_valid_usage(FeatureSet::TEXT, QuotaType::Types, 1)?;
        let key = decode_license_key(text)?;
        if !self.verifier.verify(&key) {
            return Err(LicenseError::LicenseInvalid {
                customer_id: Some(key.reference),
            });
        }
        Ok(key)
    }
}

/// Register a license with the process-wide registry.
pub fn register_license(text: &str) -> Result<Arc<LicenseKey>> {
    global().register_license(text)
}

/// Register a license file with the process-wide registry.
pub fn register_license_from_file(path: impl AsRef<Path>) -> Result<Arc<LicenseKey>> {
    global().register_license_from_file(path)
}

/// Register configured license material with the process-wide registry.
pub fn register_license_from_config(config: &LicenseConfig) -> Result<Option<Arc<LicenseKey>>> {
    global().register_license_from_config(config)
}

/// Clear the process-wide license.
pub fn remove_license() {
    global().remove_license();
}

/// Features granted by the process-wide license.
#[must_use]
pub fn activated_features() -> FeatureSet {
    global().activated_features()
}

/// Whether the process-wide license covers `feature`.
#[must_use]
pub fn has_licensed_feature(feature: FeatureSet) -> bool {
    global().has_licensed_feature(feature)
}

/// Quota check against the process-wide license.
pub fn assert_valid_usage(feature: FeatureSet, quota: QuotaType, count: u32) -> Result<()> {
    global().assert_valid_usage(feature, quota, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{encode_license_key, LicenseTier};
    use crate::release::FixedReleaseDate;
    use crate::scope::current_grant;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct AcceptAll;

    impl LicenseVerifier for AcceptAll {
        fn verify(&self, _key: &LicenseKey) -> bool {
            true
        }
    }

    struct RejectAll;

    impl LicenseVerifier for RejectAll {
        fn verify(&self, _key: &LicenseKey) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct GrantRecorder {
        saw_text_grant: Arc<AtomicBool>,
    }

    impl LicenseVerifier for GrantRecorder {
        fn verify(&self, _key: &LicenseKey) -> bool {
            let granted = current_grant() == Some(FeatureSet::TEXT);
            self.saw_text_grant.store(granted, Ordering::SeqCst);
            true
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn key_text(reference: &str, tier: LicenseTier, expiry: NaiveDate) -> String {
        encode_license_key(&LicenseKey {
            reference: reference.into(),
            name: "Unit Test".into(),
            tier,
            hash: "unused".into(),
            expiry,
        })
        .unwrap()
    }

    fn registry(verifier: impl LicenseVerifier + 'static) -> LicenseRegistry {
        LicenseRegistry::new()
            .with_verifier(verifier)
            .with_release_date(FixedReleaseDate(date(2024, 6, 1)))
    }

    #[test]
    fn registration_activates_features() {
        let registry = registry(AcceptAll);
        assert!(registry.activated_features().is_empty());
        let key = registry
            .register_license(&key_text("42", LicenseTier::Business, date(2030, 1, 1)))
            .unwrap();
        assert_eq!(key.reference, "42");
        assert_eq!(registry.activated_features(), FeatureSet::ALL);
        assert!(registry.has_licensed_feature(FeatureSet::REDIS_SKU));
    }

    #[test]
    fn expiry_on_release_day_is_still_valid() {
        let registry = registry(AcceptAll);
        assert!(registry
            .register_license(&key_text("1", LicenseTier::Text, date(2024, 6, 1)))
            .is_ok());
        let err = registry
            .register_license(&key_text("2", LicenseTier::Redis, date(2024, 5, 31)))
            .unwrap_err();
        assert!(matches!(err, LicenseError::LicenseExpired { expiry } if expiry == date(2024, 5, 31)));
        assert_eq!(registry.active_license().unwrap().reference, "1");
    }

    #[test]
    fn rejected_signature_keeps_previous_license() {
        let registry = registry(AcceptAll);
        registry
            .register_license(&key_text("7", LicenseTier::OrmLite, date(2030, 1, 1)))
            .unwrap();
        let registry = LicenseRegistry {
            verifier: Box::new(RejectAll),
            ..registry
        };
        let err = registry
            .register_license(&key_text("8", LicenseTier::Enterprise, date(2030, 1, 1)))
            .unwrap_err();
        assert!(matches!(err, LicenseError::LicenseInvalid { customer_id: Some(ref id) } if id == "8"));
        assert_eq!(registry.activated_features(), FeatureSet::ORMLITE);
    }

    #[test]
    fn malformed_text_is_reported_as_invalid_license() {
        let registry = registry(AcceptAll);
        let err = registry.register_license("1001-%%%").unwrap_err();
        assert!(matches!(err, LicenseError::LicenseInvalid { customer_id: Some(ref id) } if id == "1001"));
        assert!(!err.to_string().contains("base64"));

        let err = registry.register_license("no separator").unwrap_err();
        assert!(matches!(err, LicenseError::LicenseInvalid { customer_id: None }));
    }

    #[test]
    fn verification_runs_under_text_grant() {
        let recorder = GrantRecorder::default();
        let saw = Arc::clone(&recorder.saw_text_grant);
        let registry = registry(recorder);
        registry
            .register_license(&key_text("9", LicenseTier::Free, date(2030, 1, 1)))
            .unwrap();
        assert!(saw.load(Ordering::SeqCst));
        assert_eq!(current_grant(), None);
        assert!(registry.activated_features().is_empty());
    }

    #[test]
    fn failed_registration_releases_text_grant() {
        let mismatched =
            key_text("OTHER", LicenseTier::Business, date(2030, 1, 1)).replacen("OTHER", "ACME", 1);
        let expired = key_text("5", LicenseTier::Business, date(2020, 1, 1));
        let signed = key_text("6", LicenseTier::Business, date(2030, 1, 1));

        let accepting = registry(AcceptAll);
        let rejecting = registry(RejectAll);
        let attempts: [(&LicenseRegistry, &str); 5] = [
            (&rejecting, &signed),
            (&accepting, "1001-%%%"),
            (&accepting, "no separator"),
            (&accepting, &mismatched),
            (&accepting, &expired),
        ];
        for (registry, text) in attempts {
            assert!(registry.register_license(text).is_err(), "{text} should fail");
            assert_eq!(current_grant(), None, "grant leaked after {text}");
        }
        assert!(matches!(
            accepting.register_license(&mismatched),
            Err(LicenseError::MismatchedCustomer { .. })
        ));

        let _outer = AccessGrant::acquire(FeatureSet::REDIS);
        assert!(rejecting.register_license(&signed).is_err());
        assert_eq!(current_grant(), Some(FeatureSet::REDIS));
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = registry(AcceptAll);
        registry.remove_license();
        registry
            .register_license(&key_text("3", LicenseTier::Indie, date(2030, 1, 1)))
            .unwrap();
        registry.remove_license();
        registry.remove_license();
        assert!(registry.active_license().is_none());
        assert!(registry
            .assert_valid_usage(FeatureSet::TEXT, QuotaType::Types, 21)
            .is_err());
    }
}
