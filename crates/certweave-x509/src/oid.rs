//! Dotted-decimal object identifiers
//!
//! Templates may name OIDs that DER cannot carry (a single arc, or a first arc
//! above 2), so the textual value type is kept apart from `const_oid`'s and is
//! only converted when something is actually encoded.

use std::{fmt, str::FromStr};

use const_oid::ObjectIdentifier as DerOid;

use crate::error::{Result, X509Error};

/// Validated object identifier: a non-empty sequence of non-negative arcs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectIdentifier(Vec<u64>);

impl ObjectIdentifier {
    /// Parse a dotted-decimal string such as `2.5.29.17`.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(X509Error::Parse("empty object identifier".to_string()));
        }

        let arcs = s
            .split('.')
            .map(|arc| {
                // u64::from_str accepts '+' and leading zeros, arcs are canonical digits only
                if arc.is_empty()
                    || !arc.bytes().all(|b| b.is_ascii_digit())
                    || (arc.len() > 1 && arc.starts_with('0'))
                {
                    return Err(X509Error::Parse(format!(
                        "invalid object identifier {s}: bad arc {arc:?}"
                    )));
                }
                arc.parse::<u64>().map_err(|e| {
                    X509Error::Parse(format!("invalid object identifier {s}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self(arcs))
    }

    /// The arcs of this identifier.
    pub fn arcs(&self) -> &[u64] {
        &self.0
    }

    /// Convert into a DER-encodable OID.
    pub fn to_der_oid(&self) -> Result<DerOid> {
        DerOid::new(&self.to_string())
            .map_err(|e| X509Error::Encoding(format!("object identifier {self}: {e}")))
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arc) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{arc}")?;
        }
        Ok(())
    }
}

impl FromStr for ObjectIdentifier {
    type Err = X509Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<DerOid> for ObjectIdentifier {
    fn from(oid: DerOid) -> Self {
        Self(oid.arcs().map(u64::from).collect())
    }
}

/// Well-known identifiers used by the encoders.
pub mod known {
    use const_oid::ObjectIdentifier;

    // X.520 / RFC 4519 attribute types
    pub const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
    pub const SURNAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.4");
    pub const SERIAL_NUMBER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.5");
    pub const COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
    pub const LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
    pub const PROVINCE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
    pub const STREET_ADDRESS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.9");
    pub const ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
    pub const ORGANIZATIONAL_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
    pub const TITLE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.12");
    pub const POSTAL_CODE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.17");
    pub const GIVEN_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.42");
    pub const USER_ID: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("0.9.2342.19200300.100.1.1");
    pub const DOMAIN_COMPONENT: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("0.9.2342.19200300.100.1.25");

    // Certificate extensions
    pub const SUBJECT_KEY_IDENTIFIER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.14");
    pub const KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.15");
    pub const SUBJECT_ALT_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.17");
    pub const BASIC_CONSTRAINTS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.19");
    pub const NAME_CONSTRAINTS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.30");
    pub const CRL_DISTRIBUTION_POINTS: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.5.29.31");
    pub const CERTIFICATE_POLICIES: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.32");
    pub const AUTHORITY_KEY_IDENTIFIER: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.5.29.35");
    pub const EXT_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37");
    pub const AUTHORITY_INFO_ACCESS: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.1.1");
    pub const AD_OCSP: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.48.1");
    pub const AD_CA_ISSUERS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.48.2");

    // PKCS#9 extensionRequest attribute in certificate requests
    pub const EXTENSION_REQUEST: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.14");

    // Signature algorithms
    pub const ECDSA_WITH_SHA256: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
    pub const ECDSA_WITH_SHA384: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
    pub const ECDSA_WITH_SHA512: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");
    pub const SHA256_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
    pub const SHA384_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
    pub const SHA512_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_parse_and_format() {
        let oid = ObjectIdentifier::parse("2.5.29.17").unwrap();
        assert_eq!(oid.arcs(), &[2, 5, 29, 17]);
        assert_eq!(oid.to_string(), "2.5.29.17");

        // a single arc is a valid template OID even though DER cannot carry it
        let single = ObjectIdentifier::parse("7").unwrap();
        assert_eq!(single.arcs(), &[7]);
        assert!(single.to_der_oid().is_err());

        // a lone zero arc is canonical
        assert_eq!(ObjectIdentifier::parse("0.0").unwrap().to_string(), "0.0");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", ".", "1..2", "1.2.", "1.-2", "1.a", "+1.2", "1.2 ", "01.2", "1.00", "2.5.029"] {
            assert!(
                matches!(ObjectIdentifier::parse(bad), Err(X509Error::Parse(_))),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn test_der_conversion() {
        let oid = ObjectIdentifier::parse("1.2.840.113549.1.9.14").unwrap();
        assert_eq!(oid.to_der_oid().unwrap(), known::EXTENSION_REQUEST);
        assert_eq!(ObjectIdentifier::from(known::SUBJECT_ALT_NAME), ObjectIdentifier::parse("2.5.29.17").unwrap());
    }

    proptest! {
        #[test]
        fn prop_format_parse_roundtrip(arcs in prop::collection::vec(any::<u64>(), 1..12)) {
            let text = arcs.iter().map(u64::to_string).collect::<Vec<_>>().join(".");
            let oid = ObjectIdentifier::parse(&text).unwrap();
            prop_assert_eq!(oid.to_string(), text);
            prop_assert_eq!(oid.arcs(), arcs.as_slice());
        }
    }
}
