//! ---
//! ss_section: "14-licensing-system"
//! ss_subsection: "module"
//! ss_type: "source"
//! ss_scope: "code"
//! ss_description: "Release date of the running build."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use tracing::warn;

/// Supplies the date this build was released, compared against license expiry.
pub trait ReleaseDateProvider: Send + Sync {
    /// Release date of the running build.
    fn release_date(&self) -> NaiveDate;
}

static BUILD_RELEASE_DATE: Lazy<NaiveDate> = Lazy::new(|| {
    let raw = option_env!("SSTACK_RELEASE_DATE").unwrap_or(env!("VERGEN_BUILD_DATE"));
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").unwrap_or_else(|err| {
        warn!(raw, error = %err, "unparsable build release date; using today");
        Utc::now().date_naive()
    })
});

/// Release date stamped at build time.
///
/// `SSTACK_RELEASE_DATE` (`YYYY-MM-DD`) set while compiling overrides the
/// build date emitted by `build.rs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildReleaseDate;

impl ReleaseDateProvider for BuildReleaseDate {
    fn release_date(&self) -> NaiveDate {
        *BUILD_RELEASE_DATE
    }
}

/// Fixed release date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedReleaseDate(pub NaiveDate);

impl ReleaseDateProvider for FixedReleaseDate {
    fn release_date(&self) -> NaiveDate {
        self.0
    }
}
