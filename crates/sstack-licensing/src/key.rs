//! ---
//! ss_section: "14-licensing-system"
//! ss_subsection: "module"
//! ss_type: "source"
//! ss_scope: "code"
//! ss_description: "License key text codec and canonical signing payload."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose, Engine as _};
use chrono::NaiveDate;

use crate::error::{LicenseError, Result};
use crate::features::FeatureSet;
use crate::jsv;

/// Separates the customer id from the encoded record.
pub const CUSTOMER_ID_SEPARATOR: char = '-';

const EXPIRY_FORMAT: &str = "%Y-%m-%d";

/// Tier assigned to a license record.
///
/// The textual names are part of every issued signature and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LicenseTier {
    /// No commercial entitlements.
    Free,
    /// Single developer, every feature.
    Indie,
    /// Company-wide, every feature.
    Business,
    /// Company-wide with support, every feature.
    Enterprise,
    /// Text serializers only.
    Text,
    /// OrmLite only.
    OrmLite,
    /// Redis client only.
    Redis,
}

impl LicenseTier {
    /// Every tier, in declaration order.
    pub const ALL: [LicenseTier; 7] = [
        LicenseTier::Free,
        LicenseTier::Indie,
        LicenseTier::Business,
        LicenseTier::Enterprise,
        LicenseTier::Text,
        LicenseTier::OrmLite,
        LicenseTier::Redis,
    ];

    /// Name used in records and signing payloads.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseTier::Free => "Free",
            LicenseTier::Indie => "Indie",
            LicenseTier::Business => "Business",
            LicenseTier::Enterprise => "Enterprise",
            LicenseTier::Text => "Text",
            LicenseTier::OrmLite => "OrmLite",
            LicenseTier::Redis => "Redis",
        }
    }
}

impl fmt::Display for LicenseTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseTier {
    type Err = LicenseError;

    fn from_str(value: &str) -> Result<Self> {
        LicenseTier::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| LicenseError::UnknownTier(value.to_owned()))
    }
}

/// Decoded license record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseKey {
    /// Customer id the license was issued to.
    pub reference: String,
    /// Licensee display name.
    pub name: String,
    /// Purchased tier.
    pub tier: LicenseTier,
    /// Base64 RSA signature over [`LicenseKey::signing_payload`].
    pub hash: String,
    /// Last day the license covers.
    pub expiry: NaiveDate,
}

impl LicenseKey {
    /// The exact text the vendor signed: `ref:name:YYYY-MM-DD:Tier`.
    #[must_use]
    pub fn signing_payload(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.reference,
            self.name,
            self.expiry.format(EXPIRY_FORMAT),
            self.tier
        )
    }

    /// Entitlements this key grants.
    #[must_use]
    pub fn features(&self) -> FeatureSet {
        FeatureSet::for_tier(self.tier)
    }
}

/// Customer id prefix of a key, if the text has one.
#[must_use]
pub fn customer_id_of(text: &str) -> Option<String> {
    let compact = strip_whitespace(text);
    compact
        .split_once(CUSTOMER_ID_SEPARATOR)
        .map(|(customer_id, _)| customer_id.to_owned())
        .filter(|customer_id| !customer_id.is_empty())
}

/// Decode `{customerId}-{base64(jsv record)}` into a [`LicenseKey`].
///
/// Whitespace anywhere in the text is ignored so keys wrapped across lines
/// in config files still decode.
pub fn decode_license_key(text: &str) -> Result<LicenseKey> {
    let compact = strip_whitespace(text);
    let (customer_id, encoded) = compact
        .split_once(CUSTOMER_ID_SEPARATOR)
        .ok_or_else(|| LicenseError::InvalidFormat("missing customer id separator".into()))?;
    if encoded.is_empty() {
        return Err(LicenseError::InvalidFormat("missing license payload".into()));
    }

    let bytes = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|err| LicenseError::InvalidFormat(format!("payload is not base64: {err}")))?;
    let record = String::from_utf8(bytes)
        .map_err(|_| LicenseError::InvalidFormat("payload is not valid UTF-8".into()))?;
    let key = key_from_record(&record)?;

    if key.reference != customer_id {
        return Err(LicenseError::MismatchedCustomer {
            key: encoded.to_owned(),
            customer_id: customer_id.to_owned(),
        });
    }
    Ok(key)
}

/// Encode a key into its textual form; the inverse of [`decode_license_key`].
///
/// The reference doubles as the key text prefix, so it must be non-empty and
/// free of whitespace and the `-` separator.
pub fn encode_license_key(key: &LicenseKey) -> Result<String> {
    if key.reference.is_empty() {
        return Err(LicenseError::InvalidFormat("customer id must not be empty".into()));
    }
    if key
        .reference
        .chars()
        .any(|ch| ch == CUSTOMER_ID_SEPARATOR || ch.is_whitespace())
    {
        return Err(LicenseError::InvalidFormat(format!(
            "customer id '{}' must not contain whitespace or '{CUSTOMER_ID_SEPARATOR}'",
            key.reference
        )));
    }

    let expiry = key.expiry.format(EXPIRY_FORMAT).to_string();
    let record = jsv::write_object(&[
        ("Ref", &key.reference),
        ("Name", &key.name),
        ("Type", key.tier.as_str()),
        ("Hash", &key.hash),
        ("Expiry", &expiry),
    ]);
    Ok(format!(
        "{}{}{}",
        key.reference,
        CUSTOMER_ID_SEPARATOR,
        general_purpose::STANDARD.encode(record.as_bytes())
    ))
}

fn key_from_record(record: &str) -> Result<LicenseKey> {
    let mut reference = None;
    let mut name = None;
    let mut tier = None;
    let mut hash = None;
    let mut expiry = None;

    for (field, value) in jsv::read_object(record)? {
        match field.to_ascii_lowercase().as_str() {
            "ref" => reference = Some(value),
            "name" => name = Some(value),
            "type" => tier = Some(value.parse::<LicenseTier>()?),
            "hash" => hash = Some(value),
            "expiry" => expiry = Some(parse_expiry(&value)?),
            _ => tracing::debug!(field = %field, "ignoring unknown license record field"),
        }
    }

    Ok(LicenseKey {
        reference: reference.ok_or_else(|| missing_field("Ref"))?,
        name: name.unwrap_or_default(),
        tier: tier.ok_or_else(|| missing_field("Type"))?,
        hash: hash.unwrap_or_default(),
        expiry: expiry.ok_or_else(|| missing_field("Expiry"))?,
    })
}

/// Accepts `YYYY-MM-DD` or an xsd date-time, keeping only the date.
fn parse_expiry(raw: &str) -> Result<NaiveDate> {
    let date_part = raw
        .get(..10)
        .filter(|_| raw.len() == 10 || matches!(raw.as_bytes()[10], b'T' | b' '));
    date_part
        .and_then(|date| NaiveDate::parse_from_str(date, EXPIRY_FORMAT).ok())
        .ok_or_else(|| LicenseError::InvalidFormat(format!("invalid expiry date '{raw}'")))
}

fn missing_field(field: &str) -> LicenseError {
    LicenseError::InvalidFormat(format!("license record is missing '{field}'"))
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|ch| !ch.is_whitespace()).collect()
}
