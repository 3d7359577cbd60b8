//! ---
//! ss_section: "14-licensing-system"
//! ss_subsection: "module"
//! ss_type: "source"
//! ss_scope: "code"
//! ss_description: "Licensing telemetry counters and log events."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};
use tracing::{info, warn};

use crate::features::{FeatureSet, QuotaType};
use crate::key::LicenseKey;

static LICENSE_LOADS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "license_loads_total",
        "Total number of license registrations that succeeded"
    )
    .expect("metric registration to succeed")
});

static LICENSE_INVALID_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "license_invalid_total",
        "Total number of rejected license registrations",
        &["reason"]
    )
    .expect("metric registration to succeed")
});

static QUOTA_REJECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "license_quota_rejections_total",
        "Total number of usages rejected by free-tier quotas",
        &["feature", "quota"]
    )
    .expect("metric registration to succeed")
});

/// Record a successful license registration.
pub fn record_license_load(key: &LicenseKey) {
    LICENSE_LOADS_TOTAL.inc();
    info!(
        customer_id = %key.reference,
        name = %key.name,
        tier = %key.tier,
        expiry = %key.expiry,
        "license accepted"
    );
}

/// Record a rejected registration.
pub fn record_invalid_license(reason: &str, customer_id: Option<&str>) {
    LICENSE_INVALID_TOTAL.with_label_values(&[reason]).inc();
    warn!(reason, customer_id = customer_id.unwrap_or(""), "license rejected");
}

/// Record a usage rejected by a free-tier limit.
pub fn record_quota_rejection(feature: FeatureSet, quota: QuotaType, limit: u32, count: u32) {
    let feature_label = feature.to_string();
    QUOTA_REJECTIONS_TOTAL
        .with_label_values(&[feature_label.as_str(), quota.as_str()])
        .inc();
    warn!(feature = %feature, quota = %quota, limit, count, "free-tier quota exceeded");
}

/// Number of successful registrations recorded so far.
#[must_use]
pub fn license_loads() -> u64 {
    LICENSE_LOADS_TOTAL.get()
}

/// Number of rejected registrations recorded for `reason`.
#[must_use]
pub fn invalid_licenses(reason: &str) -> u64 {
    LICENSE_INVALID_TOTAL.with_label_values(&[reason]).get()
}
