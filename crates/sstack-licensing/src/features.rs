//! ---
//! ss_section: "14-licensing-system"
//! ss_subsection: "module"
//! ss_type: "source"
//! ss_scope: "code"
//! ss_description: "Licensed feature bitset and the tier entitlement table."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::error::LicenseError;
use crate::key::LicenseTier;

bitflags! {
    /// Set of license-controlled capabilities.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FeatureSet: u32 {
        /// Commercial-only premium APIs.
        const PREMIUM = 1 << 0;
        /// Text serializers.
        const TEXT = 1 << 1;
        /// Service clients.
        const CLIENT = 1 << 2;
        /// Shared runtime helpers.
        const COMMON = 1 << 3;
        /// Redis client.
        const REDIS = 1 << 4;
        /// OrmLite data access.
        const ORMLITE = 1 << 5;
        /// Service host operations.
        const CORE_SERVICE = 1 << 6;
        /// Server hosting.
        const SERVER = 1 << 7;
        /// Razor views.
        const RAZOR = 1 << 8;
        /// Admin UI.
        const ADMIN = 1 << 9;

        /// Every named capability.
        const ALL = Self::PREMIUM.bits()
            | Self::TEXT.bits()
            | Self::CLIENT.bits()
            | Self::COMMON.bits()
            | Self::REDIS.bits()
            | Self::ORMLITE.bits()
            | Self::CORE_SERVICE.bits()
            | Self::SERVER.bits()
            | Self::RAZOR.bits()
            | Self::ADMIN.bits();
        /// What a Redis SKU ships with.
        const REDIS_SKU = Self::REDIS.bits() | Self::TEXT.bits();
        /// What an OrmLite SKU ships with.
        const ORMLITE_SKU = Self::ORMLITE.bits() | Self::TEXT.bits();
    }
}

const NAMED_FEATURES: [(FeatureSet, &str); 10] = [
    (FeatureSet::PREMIUM, "Premium"),
    (FeatureSet::TEXT, "Text"),
    (FeatureSet::CLIENT, "Client"),
    (FeatureSet::COMMON, "Common"),
    (FeatureSet::REDIS, "Redis"),
    (FeatureSet::ORMLITE, "OrmLite"),
    (FeatureSet::CORE_SERVICE, "CoreService"),
    (FeatureSet::SERVER, "Server"),
    (FeatureSet::RAZOR, "Razor"),
    (FeatureSet::ADMIN, "Admin"),
];

impl FeatureSet {
    /// Entitlements granted by a license tier.
    #[must_use]
    pub fn for_tier(tier: LicenseTier) -> Self {
        match tier {
            LicenseTier::Free => FeatureSet::empty(),
            LicenseTier::Indie | LicenseTier::Business | LicenseTier::Enterprise => FeatureSet::ALL,
            LicenseTier::Text => FeatureSet::TEXT,
            LicenseTier::OrmLite => FeatureSet::ORMLITE,
            LicenseTier::Redis => FeatureSet::REDIS,
        }
    }

    /// Names of the individual capabilities in this set.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        NAMED_FEATURES
            .iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "None");
        }
        if *self == FeatureSet::ALL {
            return write!(f, "All");
        }
        let names: Vec<&str> = self.names().collect();
        write!(f, "{}", names.join(", "))
    }
}

impl FromStr for FeatureSet {
    type Err = LicenseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("all") {
            return Ok(FeatureSet::ALL);
        }
        if value.eq_ignore_ascii_case("none") {
            return Ok(FeatureSet::empty());
        }
        NAMED_FEATURES
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(value))
            .map(|(flag, _)| *flag)
            .ok_or_else(|| LicenseError::InvalidFormat(format!("unknown feature '{value}'")))
    }
}

/// Axis a usage count is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaType {
    /// Service operations.
    Operations,
    /// Distinct types handled by a serializer or client.
    Types,
    /// Fields per type.
    Fields,
    /// Requests per hour.
    RequestsPerHour,
    /// Mapped tables.
    Tables,
    /// Any use of a premium-only capability.
    PremiumFeature,
}

impl QuotaType {
    /// Every quota dimension.
    pub const ALL: [QuotaType; 6] = [
        QuotaType::Operations,
        QuotaType::Types,
        QuotaType::Fields,
        QuotaType::RequestsPerHour,
        QuotaType::Tables,
        QuotaType::PremiumFeature,
    ];

    /// Stable identifier string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaType::Operations => "Operations",
            QuotaType::Types => "Types",
            QuotaType::Fields => "Fields",
            QuotaType::RequestsPerHour => "RequestsPerHour",
            QuotaType::Tables => "Tables",
            QuotaType::PremiumFeature => "PremiumFeature",
        }
    }
}

impl fmt::Display for QuotaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuotaType {
    type Err = LicenseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        QuotaType::ALL
            .into_iter()
            .find(|quota| quota.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| LicenseError::InvalidFormat(format!("unknown quota type '{value}'")))
    }
}
