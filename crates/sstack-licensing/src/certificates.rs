//! ---
//! ss_section: "14-licensing-system"
//! ss_subsection: "module"
//! ss_type: "source"
//! ss_scope: "code"
//! ss_description: "Embedded RSA keys and license signature verification."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
use base64::{engine::general_purpose, Engine as _};
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use ring::signature::{RsaPublicKeyComponents, RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY};
use tracing::debug;

use crate::error::{LicenseError, Result};
use crate::key::LicenseKey;

/// Verifies the integrity of the library itself. Not used for license keys.
pub const RUNTIME_PUBLIC_KEY: &str = "<RSAKeyValue><Modulus>nkqwkUAcuIlVzzOPENcQ+g5ALCe4LyzzWv59E4a7LuOM1Nb+hlNlnx2oBinIkvh09EyaxIX2PmaY0KtyDRIh+PoItkKeJe/TydIbK/bLa0+0Axuwa0MFShE6HdJo/dynpODm64+Sg1XfhICyfsBBSxuJMiVKjlMDIxu9kDg7vEs=</Modulus><Exponent>AQAB</Exponent></RSAKeyValue>";

/// Verifies customer license keys.
pub const LICENSE_PUBLIC_KEY: &str = "<RSAKeyValue><Modulus>w2fTTfr2SrGCclwLUkrbH0XsIUpZDJ1Kei2YUwYGmIn5AUyCPLTUv3obDBUBFJKLQ61Khs7dDkXlzuJr5tkGQ0zS0PYsmBPAtszuTum+FAYRH4Wdhmlfqu1Z03gkCIo1i11TmamN5432uswwFCVH60JU3CpaN97Ehru39LA1X9E=</Modulus><Exponent>AQAB</Exponent></RSAKeyValue>";

static RUNTIME_KEY: Lazy<RsaPublicKey> = Lazy::new(|| {
    RsaPublicKey::from_xml(RUNTIME_PUBLIC_KEY).expect("embedded runtime key to be well formed")
});

static LICENSE_KEY: Lazy<RsaPublicKey> = Lazy::new(|| {
    RsaPublicKey::from_xml(LICENSE_PUBLIC_KEY).expect("embedded license key to be well formed")
});

/// Selects one of the keys baked into the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddedKey {
    /// Library integrity key.
    Runtime,
    /// Customer license key.
    License,
}

impl EmbeddedKey {
    /// Parsed public key.
    #[must_use]
    pub fn public_key(&self) -> &'static RsaPublicKey {
        match self {
            EmbeddedKey::Runtime => &RUNTIME_KEY,
            EmbeddedKey::License => &LICENSE_KEY,
        }
    }
}

/// RSA public key components in big-endian form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    modulus: Vec<u8>,
    exponent: Vec<u8>,
}

impl RsaPublicKey {
    /// Parse the `<RSAKeyValue>` XML form used for the embedded keys.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let (modulus, exponent) = read_key_value(xml)?;
        let modulus = trim_leading_zeros(decode_component("Modulus", modulus)?);
        let exponent = trim_leading_zeros(decode_component("Exponent", exponent)?);
        if modulus.is_empty() || exponent.is_empty() {
            return Err(LicenseError::InvalidFormat(
                "RSA key has an empty modulus or exponent".into(),
            ));
        }
        Ok(Self { modulus, exponent })
    }

    /// Modulus size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        let leading = self.modulus.first().map_or(0, |byte| byte.leading_zeros() as usize);
        self.modulus.len() * 8 - leading
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Component {
    Modulus,
    Exponent,
}

/// Collects the text of the `Modulus` and `Exponent` children of the root element.
fn read_key_value(xml: &str) -> Result<(String, String)> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut current = None;
    let mut modulus: Option<String> = None;
    let mut exponent: Option<String> = None;
    loop {
        let event = reader
            .read_event()
            .map_err(|err| xml_error(&reader, &err.to_string()))?;
        match event {
            Event::Start(start) => {
                depth += 1;
                current = if depth == 2 { component(start.local_name().as_ref()) } else { None };
                if let Some(found) = current {
                    open_slot(&reader, found, &mut modulus, &mut exponent)?;
                }
            }
            Event::Empty(empty) if depth == 1 => {
                if let Some(found) = component(empty.local_name().as_ref()) {
                    open_slot(&reader, found, &mut modulus, &mut exponent)?;
                }
            }
            Event::Text(text) => {
                let target = match current {
                    Some(Component::Modulus) => modulus.as_mut(),
                    Some(Component::Exponent) => exponent.as_mut(),
                    None => None,
                };
                if let Some(target) = target {
                    let text = text
                        .unescape()
                        .map_err(|err| xml_error(&reader, &err.to_string()))?;
                    target.push_str(&text);
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                current = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let modulus =
        modulus.ok_or_else(|| LicenseError::InvalidFormat("RSA key is missing <Modulus>".into()))?;
    let exponent = exponent
        .ok_or_else(|| LicenseError::InvalidFormat("RSA key is missing <Exponent>".into()))?;
    Ok((modulus, exponent))
}

fn open_slot(
    reader: &Reader<&[u8]>,
    found: Component,
    modulus: &mut Option<String>,
    exponent: &mut Option<String>,
) -> Result<()> {
    let (slot, tag) = match found {
        Component::Modulus => (modulus, "Modulus"),
        Component::Exponent => (exponent, "Exponent"),
    };
    if slot.is_some() {
        return Err(xml_error(reader, &format!("duplicate <{tag}>")));
    }
    *slot = Some(String::new());
    Ok(())
}

fn component(name: &[u8]) -> Option<Component> {
    match name {
        b"Modulus" => Some(Component::Modulus),
        b"Exponent" => Some(Component::Exponent),
        _ => None,
    }
}

fn xml_error(reader: &Reader<&[u8]>, detail: &str) -> LicenseError {
    LicenseError::InvalidFormat(format!(
        "RSA key XML is malformed at byte {}: {detail}",
        reader.buffer_position()
    ))
}

fn decode_component(tag: &str, text: String) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|ch| !ch.is_whitespace()).collect();
    general_purpose::STANDARD
        .decode(compact)
        .map_err(|err| LicenseError::InvalidFormat(format!("RSA key <{tag}> is not base64: {err}")))
}

fn trim_leading_zeros(mut bytes: Vec<u8>) -> Vec<u8> {
    let zeros = bytes.iter().take_while(|byte| **byte == 0).count();
    bytes.drain(..zeros);
    bytes
}

/// Check an RSA PKCS#1 v1.5 / SHA-1 signature over `payload`.
///
/// Malformed signatures simply fail verification.
#[must_use]
pub fn verify_signature(payload: &str, signature: &str, public_key: &RsaPublicKey) -> bool {
    let signature = match general_purpose::STANDARD.decode(signature.trim()) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(error = %err, "license signature is not base64");
            return false;
        }
    };
    let components = RsaPublicKeyComponents {
        n: public_key.modulus.as_slice(),
        e: public_key.exponent.as_slice(),
    };
    components
        .verify(
            &RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY,
            payload.as_bytes(),
            &signature,
        )
        .is_ok()
}

/// Decides whether a decoded key carries an authentic signature.
pub trait LicenseVerifier: Send + Sync {
    /// True when the key's signature is valid.
    fn verify(&self, key: &LicenseKey) -> bool;
}

/// RSA verifier bound to a single public key.
#[derive(Debug, Clone)]
pub struct RsaLicenseVerifier {
    public_key: RsaPublicKey,
}

impl Default for RsaLicenseVerifier {
    fn default() -> Self {
        Self {
            public_key: EmbeddedKey::License.public_key().clone(),
        }
    }
}

impl RsaLicenseVerifier {
    /// Verifier using the embedded license key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the public key used for verification (useful in tests).
    #[must_use]
    pub fn with_public_key(public_key: RsaPublicKey) -> Self {
        Self { public_key }
    }
}

impl LicenseVerifier for RsaLicenseVerifier {
    fn verify(&self, key: &LicenseKey) -> bool {
        verify_signature(&key.signing_payload(), &key.hash, &self.public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_keys_parse_and_differ() {
        let runtime = EmbeddedKey::Runtime.public_key();
        let license = EmbeddedKey::License.public_key();
        assert_eq!(runtime.bits(), 1024);
        assert_eq!(license.bits(), 1024);
        assert_ne!(runtime, license);
    }

    #[test]
    fn garbage_signatures_fail_closed() {
        let key = EmbeddedKey::License.public_key();
        assert!(!verify_signature("1:a:2030-01-01:Business", "not base64!", key));
        assert!(!verify_signature("1:a:2030-01-01:Business", "", key));
        assert!(!verify_signature("1:a:2030-01-01:Business", "AAAA", key));
    }

    #[test]
    fn malformed_xml_is_invalid_format() {
        for xml in [
            "<RSAKeyValue></RSAKeyValue>",
            "<RSAKeyValue><Modulus>AQAB</Modulus></RSAKeyValue>",
            "<RSAKeyValue><Modulus>@@</Modulus><Exponent>AQAB</Exponent></RSAKeyValue>",
            "<RSAKeyValue><Modulus>AAAA</Modulus><Exponent>AQAB</Exponent></RSAKeyValue>",
            "<RSAKeyValue><Modulus>AQAB</Modulus><Modulus>AQAB</Modulus><Exponent>AQAB</Exponent></RSAKeyValue>",
            "<RSAKeyValue><Modulus>AQAB</Exponent></RSAKeyValue>",
            "<RSAKeyValue><Modulus/><Exponent>AQAB</Exponent></RSAKeyValue>",
        ] {
            assert!(matches!(
                RsaPublicKey::from_xml(xml),
                Err(LicenseError::InvalidFormat(_))
            ));
        }
    }

    fn license_modulus() -> &'static str {
        let start = LICENSE_PUBLIC_KEY.find("<Modulus>").unwrap() + "<Modulus>".len();
        let end = LICENSE_PUBLIC_KEY.find("</Modulus>").unwrap();
        &LICENSE_PUBLIC_KEY[start..end]
    }

    #[test]
    fn tolerates_whitespace_inside_tags_and_text() {
        let xml = format!(
            "<?xml version=\"1.0\"?>\n<RSAKeyValue >\n  <Modulus >\n    {}\n  </Modulus>\n  <Exponent\n>AQAB</Exponent >\n</RSAKeyValue>",
            license_modulus()
        );
        let key = RsaPublicKey::from_xml(&xml).unwrap();
        assert_eq!(&key, EmbeddedKey::License.public_key());
    }

    #[test]
    fn ignores_components_inside_comments() {
        let xml = format!(
            "<!-- <Modulus>AAAA</Modulus> --><RSAKeyValue><!-- <Exponent>AAAA</Exponent> --><Modulus>{}</Modulus><Exponent>AQAB</Exponent></RSAKeyValue>",
            license_modulus()
        );
        let key = RsaPublicKey::from_xml(&xml).unwrap();
        assert_eq!(&key, EmbeddedKey::License.public_key());
    }

    #[test]
    fn ignores_nested_lookalike_elements() {
        let xml = format!(
            "<RSAKeyValue><Extra><Modulus>AAAA</Modulus></Extra><Modulus>{}</Modulus><Exponent>AQAB</Exponent></RSAKeyValue>",
            license_modulus()
        );
        assert_eq!(
            &RsaPublicKey::from_xml(&xml).unwrap(),
            EmbeddedKey::License.public_key()
        );
    }
}
