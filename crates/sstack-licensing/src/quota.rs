//! ---
//! ss_section: "14-licensing-system"
//! ss_subsection: "module"
//! ss_type: "source"
//! ss_scope: "code"
//! ss_description: "Free-tier quota table and usage decisions."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
use crate::error::{LicenseError, Result, UPGRADE_INSTRUCTIONS};
use crate::features::{FeatureSet, QuotaType};
use crate::logging::record_quota_rejection;
use crate::scope::current_grant;

/// Limit applied to unlicensed usage of one (feature, quota) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeQuota {
    /// Feature the limit applies to.
    pub feature: FeatureSet,
    /// Dimension the limit is measured in.
    pub quota: QuotaType,
    /// Highest allowed count.
    pub limit: u32,
    template: &'static str,
}

impl FreeQuota {
    /// Customer facing rejection message.
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "{}{}",
            self.template.replace("{limit}", &self.limit.to_string()),
            UPGRADE_INSTRUCTIONS
        )
    }
}

/// Free-tier limits. Changing a number changes licensing behaviour.
pub const FREE_QUOTAS: [FreeQuota; 7] = [
    FreeQuota {
        feature: FeatureSet::TEXT,
        quota: QuotaType::Types,
        limit: 20,
        template: "The free-quota limit on '{limit} Text Types' has been reached.",
    },
    FreeQuota {
        feature: FeatureSet::REDIS,
        quota: QuotaType::Types,
        limit: 20,
        template: "The free-quota limit on '{limit} Redis Types' has been reached.",
    },
    FreeQuota {
        feature: FeatureSet::REDIS,
        quota: QuotaType::RequestsPerHour,
        limit: 6000,
        template: "The free-quota limit on '{limit} Redis requests per hour' has been reached.",
    },
    FreeQuota {
        feature: FeatureSet::ORMLITE,
        quota: QuotaType::Tables,
        limit: 10,
        template: "The free-quota limit on '{limit} OrmLite Tables' has been reached.",
    },
    FreeQuota {
        feature: FeatureSet::CORE_SERVICE,
        quota: QuotaType::Operations,
        limit: 10,
        template: "The free-quota limit on '{limit} Service Operations' has been reached.",
    },
    FreeQuota {
        feature: FeatureSet::ADMIN,
        quota: QuotaType::PremiumFeature,
        limit: 0,
        template: "The Admin UI is a commercial-only premium feature.",
    },
    FreeQuota {
        feature: FeatureSet::PREMIUM,
        quota: QuotaType::PremiumFeature,
        limit: 0,
        template: "Unauthorized use of a commercial-only premium feature.",
    },
];

/// Free-tier limit for a pair, if one is defined.
#[must_use]
pub fn free_quota(feature: FeatureSet, quota: QuotaType) -> Option<&'static FreeQuota> {
    FREE_QUOTAS
        .iter()
        .find(|entry| entry.feature == feature && entry.quota == quota)
}

/// Decide whether `count` units of `feature` may be used under `licensed`.
///
/// Full licenses pass outright, then the calling thread's temporary grant is
/// consulted, then the free-tier table.
pub fn assert_usage_allowed(
    licensed: FeatureSet,
    feature: FeatureSet,
    quota: QuotaType,
    count: u32,
) -> Result<()> {
    if licensed.contains(FeatureSet::ALL) {
        return Ok(());
    }
    if current_grant().is_some_and(|granted| granted.contains(feature)) {
        return Ok(());
    }

    let entry = free_quota(feature, quota).ok_or(LicenseError::UnknownQuota { feature, quota })?;
    if licensed.contains(feature) || count <= entry.limit {
        return Ok(());
    }

    record_quota_rejection(feature, quota, entry.limit, count);
    Err(LicenseError::QuotaExceeded {
        feature,
        quota,
        limit: entry.limit,
        message: entry.message(),
    })
}
