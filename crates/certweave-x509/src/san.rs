//! Subject alternative names
//!
//! The SAN extension is built by hand so it can carry `otherName` and
//! `registeredID` entries next to the usual DNS, email, URI and IP names.

use std::net::IpAddr;

use der::{
    asn1::{Any, Ia5StringRef, Utf8StringRef},
    Decode, Encode, Tag, TagNumber,
};
use serde_json::Value;
use tracing::debug;
use x509_cert::ext::pkix::name::{GeneralName, OtherName};

use crate::{
    decode::{expect_object, optional, FromJson},
    error::{Result, X509Error},
    extensions::{ip_octets, Extension},
    oid::{known, ObjectIdentifier},
};

/// One typed entry of a template's `sans` list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectAlternativeName {
    pub san_type: String,
    pub value: String,
}

impl SubjectAlternativeName {
    pub fn new(san_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            san_type: san_type.into(),
            value: value.into(),
        }
    }
}

impl FromJson for SubjectAlternativeName {
    fn from_json(value: &Value) -> Result<Self> {
        let object = expect_object(value)?;
        Ok(Self {
            san_type: optional(object, "type")?.unwrap_or_default(),
            value: optional(object, "value")?.unwrap_or_default(),
        })
    }
}

/// GeneralName kinds a SAN type tag can name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanType {
    /// Empty tag.
    Empty,
    /// Guess the kind from the value.
    Auto,
    Dns,
    Email,
    Uri,
    Ip,
    RegisteredId,
    X400Address,
    DirectoryName,
    EdiPartyName,
    /// A dotted OID tag: an `otherName` with that type id.
    OtherName(ObjectIdentifier),
    Unknown(String),
}

impl SanType {
    /// Exact lookup, as the encoder dispatches.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "" => Self::Empty,
            "auto" => Self::Auto,
            "dns" => Self::Dns,
            "email" => Self::Email,
            "uri" => Self::Uri,
            "ip" => Self::Ip,
            "registeredID" => Self::RegisteredId,
            "x400Address" => Self::X400Address,
            "dn" | "directoryName" => Self::DirectoryName,
            "ediPartyName" => Self::EdiPartyName,
            other => match ObjectIdentifier::parse(other) {
                Ok(oid) => Self::OtherName(oid),
                Err(_) => Self::Unknown(other.to_string()),
            },
        }
    }

    /// Case-insensitive lookup for the keyword tags.
    pub fn parse_ignore_case(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "auto" => Self::Auto,
            "dns" => Self::Dns,
            "email" => Self::Email,
            "uri" => Self::Uri,
            "ip" => Self::Ip,
            "registeredid" => Self::RegisteredId,
            "x400address" => Self::X400Address,
            "dn" | "directoryname" => Self::DirectoryName,
            "edipartyname" => Self::EdiPartyName,
            _ => Self::parse(tag),
        }
    }

    /// Classify a value: IP literal, then URI with a scheme, then anything
    /// holding `@` as an email address, otherwise a DNS name.
    pub fn guess(value: &str) -> Self {
        if value.parse::<IpAddr>().is_ok() {
            Self::Ip
        } else if url::Url::parse(value).is_ok() {
            Self::Uri
        } else if value.contains('@') {
            Self::Email
        } else {
            Self::Dns
        }
    }

    /// Canonical tag text.
    pub fn tag(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Auto => "auto".into(),
            Self::Dns => "dns".into(),
            Self::Email => "email".into(),
            Self::Uri => "uri".into(),
            Self::Ip => "ip".into(),
            Self::RegisteredId => "registeredID".into(),
            Self::X400Address => "x400Address".into(),
            Self::DirectoryName => "dn".into(),
            Self::EdiPartyName => "ediPartyName".into(),
            Self::OtherName(oid) => oid.to_string(),
            Self::Unknown(tag) => tag.clone(),
        }
    }
}

/// Build the SAN extension (`2.5.29.17`, never critical).
///
/// Entries are encoded in order: the explicit list, then the DNS, email, URI
/// and IP shorthand lists. Unparsable `ip` and `registeredID` values and
/// entries with an empty type are skipped.
pub fn encode_subject_alt_names(
    sans: &[SubjectAlternativeName],
    dns_names: &[String],
    email_addresses: &[String],
    uris: &[String],
    ip_addresses: &[IpAddr],
) -> Result<Extension> {
    let names = encode_general_names(sans, dns_names, email_addresses, uris, ip_addresses)?;
    subject_alt_name_extension(&names)
}

/// Encoded GeneralName entries in SAN order, before they are wrapped.
pub(crate) fn encode_general_names(
    sans: &[SubjectAlternativeName],
    dns_names: &[String],
    email_addresses: &[String],
    uris: &[String],
    ip_addresses: &[IpAddr],
) -> Result<Vec<Any>> {
    let shorthand = dns_names
        .iter()
        .map(|v| SubjectAlternativeName::new("dns", v.as_str()))
        .chain(email_addresses.iter().map(|v| SubjectAlternativeName::new("email", v.as_str())))
        .chain(uris.iter().map(|v| SubjectAlternativeName::new("uri", v.as_str())))
        .chain(ip_addresses.iter().map(|v| SubjectAlternativeName::new("ip", v.to_string())));

    let mut names: Vec<Any> = Vec::new();
    for san in sans.iter().cloned().chain(shorthand) {
        if let Some(name) = encode_general_name(&san)? {
            names.push(name);
        }
    }
    Ok(names)
}

pub(crate) fn subject_alt_name_extension(names: &[Any]) -> Result<Extension> {
    Ok(Extension {
        id: known::SUBJECT_ALT_NAME.into(),
        critical: false,
        value: names.to_vec().to_der()?,
    })
}

fn encode_general_name(san: &SubjectAlternativeName) -> Result<Option<Any>> {
    let value = san.value.as_str();
    match SanType::parse(&san.san_type) {
        SanType::Email => context_string(1, value).map(Some),
        SanType::Dns => context_string(2, value).map(Some),
        SanType::Uri => context_string(6, value).map(Some),
        SanType::Ip => match value.parse::<IpAddr>() {
            Ok(ip) => context_primitive(7, ip_octets(&ip)).map(Some),
            Err(_) => {
                debug!(value, "dropping unparsable ip subject alternative name");
                Ok(None)
            }
        },
        SanType::RegisteredId => {
            let oid = ObjectIdentifier::parse(value).and_then(|oid| oid.to_der_oid());
            match oid {
                Ok(oid) => general_name(&GeneralName::RegisteredId(oid)).map(Some),
                Err(_) => {
                    if !value.is_empty() {
                        debug!(value, "dropping unparsable registeredID subject alternative name");
                    }
                    Ok(None)
                }
            }
        }
        SanType::Empty => {
            debug!(value, "dropping subject alternative name without type");
            Ok(None)
        }
        SanType::OtherName(oid) => {
            let type_id = oid
                .to_der_oid()
                .map_err(|_| X509Error::UnsupportedSanType(san.san_type.clone()))?;
            let inner = other_name_value(&oid, value)?;
            let other = GeneralName::OtherName(OtherName {
                type_id,
                value: Any::from_der(&inner)?,
            });
            general_name(&other).map(Some)
        }
        SanType::Auto
        | SanType::X400Address
        | SanType::DirectoryName
        | SanType::EdiPartyName
        | SanType::Unknown(_) => Err(X509Error::UnsupportedSanType(san.san_type.clone())),
    }
}

/// DER of an otherName payload from `"<kind>;<payload>"`; without a known
/// kind the whole value is a PrintableString.
fn other_name_value(oid: &ObjectIdentifier, value: &str) -> Result<Vec<u8>> {
    let invalid = |reason: String| X509Error::InvalidOtherNameValue {
        oid: oid.to_string(),
        reason,
    };

    let (kind, payload) = value.split_once(';').unwrap_or(("", value));
    match kind {
        "int" => {
            let n: i64 = payload
                .parse()
                .map_err(|_| invalid(format!("{payload:?} is not an integer")))?;
            Ok(n.to_der()?)
        }
        "oid" => {
            let oid = ObjectIdentifier::parse(payload)
                .and_then(|o| o.to_der_oid())
                .map_err(|_| invalid(format!("{payload:?} is not an object identifier")))?;
            Ok(oid.to_der()?)
        }
        "utf8" => Ok(Utf8StringRef::new(payload)?.to_der()?),
        "ia5" => Ia5StringRef::new(payload)
            .map_err(|_| invalid(format!("{payload:?} is not an IA5String")))?
            .to_der()
            .map_err(Into::into),
        "numeric" => {
            if !payload.bytes().all(|b| b.is_ascii_digit() || b == b' ') {
                return Err(invalid(format!("{payload:?} is not a NumericString")));
            }
            Ok(Any::new(Tag::NumericString, payload.as_bytes())?.to_der()?)
        }
        "printable" => printable(payload)
            .ok_or_else(|| invalid(format!("{payload:?} is not a PrintableString")))?,
        _ => printable(value)
            .ok_or_else(|| invalid(format!("{value:?} is not a PrintableString")))?,
    }
}

fn printable(s: &str) -> Option<Result<Vec<u8>>> {
    let valid = s.bytes().all(|b| {
        b.is_ascii_alphanumeric()
            || matches!(
                b,
                b' ' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b'-' | b'.' | b'/' | b':' | b'='
                    | b'?'
            )
    });
    valid.then(|| {
        Any::new(Tag::PrintableString, s.as_bytes())
            .and_then(|any| any.to_der())
            .map_err(Into::into)
    })
}

fn context_primitive(number: u8, bytes: Vec<u8>) -> Result<Any> {
    let tag = Tag::ContextSpecific {
        constructed: false,
        number: TagNumber::new(number),
    };
    Ok(Any::new(tag, bytes)?)
}

/// rfc822Name, dNSName and uniformResourceIdentifier carry the value bytes
/// as given.
fn context_string(number: u8, value: &str) -> Result<Any> {
    context_primitive(number, value.as_bytes().to_vec())
}

fn general_name(name: &GeneralName) -> Result<Any> {
    Ok(Any::from_der(&name.to_der()?)?)
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use serde_json::json;

    use super::*;

    fn encode(sans: &[SubjectAlternativeName]) -> Result<Vec<u8>> {
        encode_subject_alt_names(sans, &[], &[], &[], &[]).map(|ext| ext.value)
    }

    #[test]
    fn test_other_name_int() {
        let der = encode(&[SubjectAlternativeName::new("1.2.3.4", "int;42")]).unwrap();
        assert_eq!(der, hex!("300C A00A 0603 2A0304 A003 02012A").to_vec());
    }

    #[test]
    fn test_other_name_kinds() {
        let utf8 = encode(&[SubjectAlternativeName::new("1.2.3.4", "utf8;é")]).unwrap();
        assert_eq!(&utf8[utf8.len() - 4..], &hex!("0C02C3A9"));

        let oid = encode(&[SubjectAlternativeName::new("1.2.3.4", "oid;1.2.5")]).unwrap();
        assert_eq!(&oid[oid.len() - 4..], &hex!("06022A05"));

        let numeric = encode(&[SubjectAlternativeName::new("1.2.3.4", "numeric;12 3")]).unwrap();
        assert_eq!(&numeric[numeric.len() - 6..], &hex!("120431322033"));

        let ia5 = encode(&[SubjectAlternativeName::new("1.2.3.4", "ia5;a@b")]).unwrap();
        assert_eq!(&ia5[ia5.len() - 5..], &hex!("1603614062"));

        // no kind prefix: the whole value is printable
        let plain = encode(&[SubjectAlternativeName::new("1.2.3.4", "abc")]).unwrap();
        assert_eq!(plain, hex!("300E A00C 0603 2A0304 A005 1303616263").to_vec());
    }

    #[test]
    fn test_other_name_invalid_values() {
        for value in ["int;4x2", "oid;1..2", "numeric;12a", "ia5;é", "printable;a@b", "weird;kind"] {
            let err = encode(&[SubjectAlternativeName::new("1.2.3.4", value)]).unwrap_err();
            assert!(
                matches!(err, X509Error::InvalidOtherNameValue { ref oid, .. } if oid == "1.2.3.4"),
                "{value}: {err}"
            );
        }
    }

    #[test]
    fn test_shorthand_entries() {
        let ext = encode_subject_alt_names(&[], &["example.com".to_string()], &[], &[], &[]).unwrap();
        assert_eq!(ext.id.to_string(), "2.5.29.17");
        assert!(!ext.critical);
        assert_eq!(ext.value, hex!("300D 820B 6578616D706C652E636F6D").to_vec());

        let ips: Vec<IpAddr> = vec!["10.0.0.1".parse().unwrap()];
        let ext = encode_subject_alt_names(&[], &[], &[], &[], &ips).unwrap();
        assert_eq!(ext.value, hex!("3006 8704 0A000001").to_vec());
    }

    #[test]
    fn test_registered_id() {
        let der = encode(&[SubjectAlternativeName::new("registeredID", "1.2.3.4")]).unwrap();
        assert_eq!(der, hex!("3005 8803 2A0304").to_vec());

        // unparsable or not DER-encodable identifiers are skipped
        let der = encode(&[
            SubjectAlternativeName::new("registeredID", "nope"),
            SubjectAlternativeName::new("registeredID", "7"),
            SubjectAlternativeName::new("registeredID", ""),
        ])
        .unwrap();
        assert_eq!(der, hex!("3000").to_vec());
    }

    #[test]
    fn test_dropped_and_rejected() {
        let der = encode(&[
            SubjectAlternativeName::new("ip", "not-an-ip"),
            SubjectAlternativeName::new("", "whatever"),
        ])
        .unwrap();
        assert_eq!(der, hex!("3000").to_vec());

        for tag in ["x400Address", "dn", "ediPartyName", "bogus", "DNS", "7", "auto"] {
            assert!(
                matches!(
                    encode(&[SubjectAlternativeName::new(tag, "v")]),
                    Err(X509Error::UnsupportedSanType(ref t)) if t == tag
                ),
                "{tag}"
            );
        }
    }

    #[test]
    fn test_ip_forms() {
        let der = encode(&[
            SubjectAlternativeName::new("ip", "::ffff:10.0.0.1"),
            SubjectAlternativeName::new("ip", "::1"),
        ])
        .unwrap();
        assert_eq!(&der[2..8], &hex!("8704 0A000001"));
        assert_eq!(der[8], 0x87);
        assert_eq!(der[9], 16);
    }

    #[test]
    fn test_entry_order() {
        let ext = encode_subject_alt_names(
            &[SubjectAlternativeName::new("email", "a@b")],
            &["d".to_string()],
            &["e@f".to_string()],
            &["u:x".to_string()],
            &["1.2.3.4".parse().unwrap()],
        )
        .unwrap();
        let names = Vec::<GeneralName>::from_der(&ext.value).unwrap();
        let tags: Vec<_> = names
            .iter()
            .map(|n| match n {
                GeneralName::Rfc822Name(_) => "email",
                GeneralName::DnsName(_) => "dns",
                GeneralName::UniformResourceIdentifier(_) => "uri",
                GeneralName::IpAddress(_) => "ip",
                _ => "other",
            })
            .collect();
        assert_eq!(tags, vec!["email", "dns", "email", "uri", "ip"]);
    }

    #[test]
    fn test_type_lookup() {
        assert_eq!(SanType::parse("DNS"), SanType::Unknown("DNS".into()));
        assert_eq!(SanType::parse_ignore_case("DNS"), SanType::Dns);
        assert_eq!(SanType::parse_ignore_case("RegisteredId"), SanType::RegisteredId);
        assert_eq!(
            SanType::parse_ignore_case("1.2.3"),
            SanType::OtherName(ObjectIdentifier::parse("1.2.3").unwrap())
        );
        assert_eq!(SanType::RegisteredId.tag(), "registeredID");
    }

    #[test]
    fn test_guess() {
        assert_eq!(SanType::guess("10.1.2.3"), SanType::Ip);
        assert_eq!(SanType::guess("::1"), SanType::Ip);
        assert_eq!(SanType::guess("https://example.com/x"), SanType::Uri);
        assert_eq!(SanType::guess("jane@example.com"), SanType::Email);
        assert_eq!(SanType::guess("example.com"), SanType::Dns);
    }

    #[test]
    fn test_from_json() {
        let san = SubjectAlternativeName::from_json(&json!({"type": "dns", "value": "a"})).unwrap();
        assert_eq!(san, SubjectAlternativeName::new("dns", "a"));
        let san = SubjectAlternativeName::from_json(&json!({"value": "a"})).unwrap();
        assert_eq!(san.san_type, "");
        assert!(SubjectAlternativeName::from_json(&json!({"type": 1})).is_err());
    }
}
