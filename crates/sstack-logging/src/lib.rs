//! ---
//! ss_section: "03-logging"
//! ss_subsection: "module"
//! ss_type: "source"
//! ss_scope: "code"
//! ss_description: "Structured logging bootstrap and license event helpers."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Tracing bootstrap shared by sstack binaries.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

/// Filter directive read before `RUST_LOG`.
pub const LOG_ENV: &str = "SSTACK_LOG";

/// Output format for [`init_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Initialize a baseline tracing subscriber writing to stderr.
pub fn init() {
    init_with(LogFormat::Pretty);
}

/// Initialize tracing with the given format.
///
/// `SSTACK_LOG` wins over `RUST_LOG`; without either only warnings and
/// errors are shown. Repeated calls are ignored.
pub fn init_with(format: LogFormat) {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::default().add_directive(Level::WARN.into()));

    let layer = match format {
        LogFormat::Pretty => subscriber_fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        LogFormat::Json => subscriber_fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
    };
    let _ = Registry::default().with(filter).with(layer).try_init();
}

/// Structured context attached to license events.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Customer id of the license involved.
    pub customer_id: Option<&'a str>,
    /// Feature being checked.
    pub feature: Option<&'a str>,
    /// Quota dimension being checked.
    pub quota: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a customer id.
    pub fn with_customer(mut self, customer_id: &'a str) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    /// Attach a feature name.
    pub fn with_feature(mut self, feature: &'a str) -> Self {
        self.feature = Some(feature);
        self
    }

    /// Attach a quota dimension.
    pub fn with_quota(mut self, quota: &'a str) -> Self {
        self.quota = Some(quota);
        self
    }
}

/// Outcome of a license operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseEventOutcome {
    /// The operation was allowed.
    Allowed,
    /// The operation was refused.
    Denied,
}

impl LicenseEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            LicenseEventOutcome::Allowed => "allowed",
            LicenseEventOutcome::Denied => "denied",
        }
    }
}

/// Emit a standardized license event.
pub fn log_license_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: LicenseEventOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    let customer_id = ctx.customer_id.unwrap_or("");
    let feature = ctx.feature.unwrap_or("");
    let quota = ctx.quota.unwrap_or("");
    match outcome {
        LicenseEventOutcome::Allowed => tracing::info!(
            event,
            outcome = outcome.as_str(),
            customer_id,
            feature,
            quota,
            message = %message
        ),
        LicenseEventOutcome::Denied => tracing::warn!(
            event,
            outcome = outcome.as_str(),
            customer_id,
            feature,
            quota,
            message = %message
        ),
    }
}
