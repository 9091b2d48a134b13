//! Key usage and extended key usage names

use const_oid::ObjectIdentifier;
use serde_json::Value;

use crate::{
    decode::{FromJson, MultiString},
    error::{Result, X509Error},
};

/// Lowercase and drop underscores, so `digital_signature` and
/// `DigitalSignature` name the same usage.
pub(crate) fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace('_', "")
}

/// Key usage bitmask, bit positions as in RFC 5280 4.2.1.3
/// (`digitalSignature` is bit 0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyUsage(u16);

impl KeyUsage {
    pub const DIGITAL_SIGNATURE: KeyUsage = KeyUsage(1 << 0);
    pub const CONTENT_COMMITMENT: KeyUsage = KeyUsage(1 << 1);
    pub const KEY_ENCIPHERMENT: KeyUsage = KeyUsage(1 << 2);
    pub const DATA_ENCIPHERMENT: KeyUsage = KeyUsage(1 << 3);
    pub const KEY_AGREEMENT: KeyUsage = KeyUsage(1 << 4);
    pub const CERT_SIGN: KeyUsage = KeyUsage(1 << 5);
    pub const CRL_SIGN: KeyUsage = KeyUsage(1 << 6);
    pub const ENCIPHER_ONLY: KeyUsage = KeyUsage(1 << 7);
    pub const DECIPHER_ONLY: KeyUsage = KeyUsage(1 << 8);

    const NAMES: [(&'static str, KeyUsage); 9] = [
        ("digitalsignature", Self::DIGITAL_SIGNATURE),
        ("contentcommitment", Self::CONTENT_COMMITMENT),
        ("keyencipherment", Self::KEY_ENCIPHERMENT),
        ("dataencipherment", Self::DATA_ENCIPHERMENT),
        ("keyagreement", Self::KEY_AGREEMENT),
        ("certsign", Self::CERT_SIGN),
        ("crlsign", Self::CRL_SIGN),
        ("encipheronly", Self::ENCIPHER_ONLY),
        ("decipheronly", Self::DECIPHER_ONLY),
    ];

    pub const fn empty() -> Self {
        KeyUsage(0)
    }

    pub const fn bits(&self) -> u16 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(&self, other: KeyUsage) -> bool {
        self.0 & other.0 == other.0
    }

    /// Look up a single usage by name.
    pub fn from_name(name: &str) -> Result<Self> {
        let normalized = normalize_name(name);
        Self::NAMES
            .iter()
            .find(|(n, _)| *n == normalized)
            .map(|(_, usage)| *usage)
            .ok_or_else(|| X509Error::UnsupportedValue {
                kind: "keyUsage",
                value: name.to_string(),
            })
    }

    /// DER contents of the KeyUsage BIT STRING: bit 0 is the most significant
    /// bit of the first octet and trailing zero bits are not encoded.
    pub(crate) fn to_bit_string(self) -> Option<(u8, Vec<u8>)> {
        if self.is_empty() {
            return None;
        }
        let highest = 15 - self.0.leading_zeros() as u8;
        let len = usize::from(highest / 8) + 1;
        let bytes = [
            (self.0 as u8).reverse_bits(),
            ((self.0 >> 8) as u8).reverse_bits(),
        ];
        let unused = 7 - highest % 8;
        Some((unused, bytes[..len].to_vec()))
    }
}

impl std::ops::BitOr for KeyUsage {
    type Output = KeyUsage;

    fn bitor(self, rhs: Self) -> Self {
        KeyUsage(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for KeyUsage {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl FromJson for KeyUsage {
    fn from_json(value: &Value) -> Result<Self> {
        MultiString::from_json(value)?
            .0
            .iter()
            .try_fold(KeyUsage::empty(), |acc, name| Ok(acc | KeyUsage::from_name(name)?))
    }
}

/// Extended key usages with well-known identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtKeyUsage {
    Any,
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    IpsecEndSystem,
    IpsecTunnel,
    IpsecUser,
    TimeStamping,
    OcspSigning,
    MicrosoftServerGatedCrypto,
    NetscapeServerGatedCrypto,
    MicrosoftCommercialCodeSigning,
    MicrosoftKernelCodeSigning,
}

impl ExtKeyUsage {
    const TABLE: [(&'static str, ExtKeyUsage, ObjectIdentifier); 14] = [
        ("any", Self::Any, ObjectIdentifier::new_unwrap("2.5.29.37.0")),
        ("serverauth", Self::ServerAuth, ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.1")),
        ("clientauth", Self::ClientAuth, ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.2")),
        ("codesigning", Self::CodeSigning, ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.3")),
        (
            "emailprotection",
            Self::EmailProtection,
            ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.4"),
        ),
        (
            "ipsecendsystem",
            Self::IpsecEndSystem,
            ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.5"),
        ),
        ("ipsectunnel", Self::IpsecTunnel, ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.6")),
        ("ipsecuser", Self::IpsecUser, ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.7")),
        ("timestamping", Self::TimeStamping, ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.8")),
        ("ocspsigning", Self::OcspSigning, ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.9")),
        (
            "microsoftservergatedcrypto",
            Self::MicrosoftServerGatedCrypto,
            ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.10.3.3"),
        ),
        (
            "netscapeservergatedcrypto",
            Self::NetscapeServerGatedCrypto,
            ObjectIdentifier::new_unwrap("2.16.840.1.113730.4.1"),
        ),
        (
            "microsoftcommercialcodesigning",
            Self::MicrosoftCommercialCodeSigning,
            ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.22"),
        ),
        (
            "microsoftkernelcodesigning",
            Self::MicrosoftKernelCodeSigning,
            ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.61.1.1"),
        ),
    ];

    pub fn from_name(name: &str) -> Result<Self> {
        let normalized = normalize_name(name);
        Self::TABLE
            .iter()
            .find(|(n, _, _)| *n == normalized)
            .map(|(_, usage, _)| *usage)
            .ok_or_else(|| X509Error::UnsupportedValue {
                kind: "extKeyUsage",
                value: name.to_string(),
            })
    }

    pub fn oid(&self) -> ObjectIdentifier {
        Self::TABLE
            .iter()
            .find(|(_, usage, _)| usage == self)
            .map(|(_, _, oid)| *oid)
            .unwrap_or(Self::TABLE[0].2)
    }
}

/// Ordered list of extended key usages; duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtKeyUsages(pub Vec<ExtKeyUsage>);

impl FromJson for ExtKeyUsages {
    fn from_json(value: &Value) -> Result<Self> {
        MultiString::from_json(value)?
            .0
            .iter()
            .map(|name| ExtKeyUsage::from_name(name))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_key_usage_name_normalization() {
        let snake = KeyUsage::from_json(&json!("digital_signature")).unwrap();
        let camel = KeyUsage::from_json(&json!("DigitalSignature")).unwrap();
        assert_eq!(snake, camel);
        assert_eq!(snake, KeyUsage::DIGITAL_SIGNATURE);
        assert_eq!(KeyUsage::from_name("CRL_SIGN").unwrap(), KeyUsage::CRL_SIGN);
    }

    #[test]
    fn test_key_usage_combines_bits() {
        let usage = KeyUsage::from_json(&json!(["certSign", "crlSign", "digitalSignature"])).unwrap();
        assert_eq!(usage.bits(), 0b110_0001);
        assert!(usage.contains(KeyUsage::CERT_SIGN));
        assert!(!usage.contains(KeyUsage::KEY_AGREEMENT));

        let none = KeyUsage::from_json(&json!([])).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_key_usage_unknown_name() {
        let err = KeyUsage::from_json(&json!(["digitalSignature", "teleport"])).unwrap_err();
        assert!(matches!(err, X509Error::UnsupportedValue { kind: "keyUsage", .. }));
        assert!(matches!(
            KeyUsage::from_json(&json!(5)),
            Err(X509Error::Decode(_))
        ));
    }

    #[test]
    fn test_key_usage_bit_string() {
        assert_eq!(KeyUsage::empty().to_bit_string(), None);
        // digitalSignature only: 0b1000_0000 with 7 unused bits
        assert_eq!(
            KeyUsage::DIGITAL_SIGNATURE.to_bit_string(),
            Some((7, vec![0x80]))
        );
        // keyCertSign | cRLSign: bits 5 and 6
        assert_eq!(
            (KeyUsage::CERT_SIGN | KeyUsage::CRL_SIGN).to_bit_string(),
            Some((1, vec![0x06]))
        );
        // decipherOnly lives in the second octet
        assert_eq!(
            (KeyUsage::DIGITAL_SIGNATURE | KeyUsage::DECIPHER_ONLY).to_bit_string(),
            Some((7, vec![0x80, 0x80]))
        );
    }

    #[test]
    fn test_ext_key_usage_order_and_duplicates() {
        let usages =
            ExtKeyUsages::from_json(&json!(["serverAuth", "client_auth", "ServerAuth", "OCSPSigning"]))
                .unwrap();
        assert_eq!(
            usages.0,
            vec![
                ExtKeyUsage::ServerAuth,
                ExtKeyUsage::ClientAuth,
                ExtKeyUsage::ServerAuth,
                ExtKeyUsage::OcspSigning
            ]
        );
        assert_eq!(usages.0[3].oid().to_string(), "1.3.6.1.5.5.7.3.9");

        assert!(matches!(
            ExtKeyUsages::from_json(&json!("warpDrive")),
            Err(X509Error::UnsupportedValue { kind: "extKeyUsage", .. })
        ));
    }
}
