//! Template extension values and algorithm names

use std::net::IpAddr;

use const_oid::{
    db::{rfc5912, rfc8410},
    ObjectIdentifier as DerOid,
};
use der::{
    asn1::{Any, Ia5String, OctetString},
    Encode, Tag,
};
use serde_json::Value;
use x509_cert::{
    ext::pkix::{
        constraints::name::{GeneralSubtree, GeneralSubtrees},
        name::GeneralName,
    },
    spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned},
};

use crate::{
    decode::{expect_object, optional, or_default, Base64Bytes, FromJson, IpNet, MultiIpNet, MultiString},
    error::{Result, X509Error},
    oid::{known, ObjectIdentifier},
    usage::normalize_name,
};

/// A raw extension carried verbatim into the certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub id: ObjectIdentifier,
    pub critical: bool,
    pub value: Vec<u8>,
}

impl Extension {
    pub fn to_x509(&self) -> Result<x509_cert::ext::Extension> {
        Ok(x509_cert::ext::Extension {
            extn_id: self.id.to_der_oid()?,
            critical: self.critical,
            extn_value: OctetString::new(self.value.clone())?,
        })
    }

    pub(crate) fn from_x509(ext: &x509_cert::ext::Extension) -> Self {
        Self {
            id: ObjectIdentifier::from(ext.extn_id),
            critical: ext.critical,
            value: ext.extn_value.as_bytes().to_vec(),
        }
    }
}

impl FromJson for Extension {
    fn from_json(value: &Value) -> Result<Self> {
        let object = expect_object(value)?;
        let id = optional::<ObjectIdentifier>(object, "id")?
            .ok_or_else(|| X509Error::Decode("extension without id".to_string()))?;
        Ok(Self {
            id,
            critical: optional(object, "critical")?.unwrap_or(false),
            value: or_default::<Base64Bytes>(object, "value")?.0,
        })
    }
}

/// Declared CA constraints, before the path length policy is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_len: i64,
}

/// Basic constraints as stored on the certificate representation.
///
/// `max_path_len_zero` tells an explicit zero apart from "no limit given";
/// a negative length means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaConstraints {
    pub is_ca: bool,
    pub max_path_len: i64,
    pub max_path_len_zero: bool,
}

impl BasicConstraints {
    pub fn apply(&self) -> CaConstraints {
        if !self.is_ca {
            return CaConstraints::default();
        }
        match self.max_path_len {
            0 => CaConstraints {
                is_ca: true,
                max_path_len: 0,
                max_path_len_zero: true,
            },
            n if n < 0 => CaConstraints {
                is_ca: true,
                max_path_len: -1,
                max_path_len_zero: false,
            },
            n => CaConstraints {
                is_ca: true,
                max_path_len: n,
                max_path_len_zero: false,
            },
        }
    }
}

impl CaConstraints {
    /// The pathLenConstraint to encode, if any.
    pub fn path_len_constraint(&self) -> Result<Option<u8>> {
        if !self.is_ca || self.max_path_len < 0 || (self.max_path_len == 0 && !self.max_path_len_zero)
        {
            return Ok(None);
        }
        u8::try_from(self.max_path_len).map(Some).map_err(|_| {
            X509Error::CertificateCreation(format!(
                "maxPathLen {} does not fit a path length constraint",
                self.max_path_len
            ))
        })
    }
}

impl FromJson for BasicConstraints {
    fn from_json(value: &Value) -> Result<Self> {
        let object = expect_object(value)?;
        Ok(Self {
            is_ca: optional(object, "isCA")?.unwrap_or(false),
            max_path_len: optional(object, "maxPathLen")?.unwrap_or(0),
        })
    }
}

/// Name constraints for CA certificates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameConstraints {
    pub critical: bool,
    pub permitted_dns_domains: Vec<String>,
    pub excluded_dns_domains: Vec<String>,
    pub permitted_ip_ranges: Vec<IpNet>,
    pub excluded_ip_ranges: Vec<IpNet>,
    pub permitted_email_addresses: Vec<String>,
    pub excluded_email_addresses: Vec<String>,
    pub permitted_uri_domains: Vec<String>,
    pub excluded_uri_domains: Vec<String>,
}

impl NameConstraints {
    pub fn is_empty(&self) -> bool {
        self.permitted_dns_domains.is_empty()
            && self.excluded_dns_domains.is_empty()
            && self.permitted_ip_ranges.is_empty()
            && self.excluded_ip_ranges.is_empty()
            && self.permitted_email_addresses.is_empty()
            && self.excluded_email_addresses.is_empty()
            && self.permitted_uri_domains.is_empty()
            && self.excluded_uri_domains.is_empty()
    }

    /// Encode as the x509 extension value; `None` when every list is empty.
    pub(crate) fn to_x509(&self) -> Result<Option<x509_cert::ext::pkix::NameConstraints>> {
        if self.is_empty() {
            return Ok(None);
        }
        let permitted = subtrees(
            &self.permitted_dns_domains,
            &self.permitted_ip_ranges,
            &self.permitted_email_addresses,
            &self.permitted_uri_domains,
        )?;
        let excluded = subtrees(
            &self.excluded_dns_domains,
            &self.excluded_ip_ranges,
            &self.excluded_email_addresses,
            &self.excluded_uri_domains,
        )?;
        Ok(Some(x509_cert::ext::pkix::NameConstraints {
            permitted_subtrees: (!permitted.is_empty()).then_some(permitted),
            excluded_subtrees: (!excluded.is_empty()).then_some(excluded),
        }))
    }
}

fn subtrees(
    dns: &[String],
    ips: &[IpNet],
    emails: &[String],
    uri_domains: &[String],
) -> Result<GeneralSubtrees> {
    let mut names = Vec::new();
    for domain in dns {
        names.push(GeneralName::DnsName(Ia5String::new(domain)?));
    }
    for net in ips {
        names.push(GeneralName::IpAddress(OctetString::new(net.to_constraint_bytes())?));
    }
    for email in emails {
        names.push(GeneralName::Rfc822Name(Ia5String::new(email)?));
    }
    for domain in uri_domains {
        names.push(GeneralName::UniformResourceIdentifier(Ia5String::new(domain)?));
    }
    Ok(names
        .into_iter()
        .map(|base| GeneralSubtree {
            base,
            minimum: 0,
            maximum: None,
        })
        .collect())
}

impl FromJson for NameConstraints {
    fn from_json(value: &Value) -> Result<Self> {
        let object = expect_object(value)?;
        let strings = |key: &str| -> Result<Vec<String>> { Ok(or_default::<MultiString>(object, key)?.0) };
        let nets = |key: &str| -> Result<Vec<IpNet>> { Ok(or_default::<MultiIpNet>(object, key)?.0) };
        Ok(Self {
            critical: optional(object, "critical")?.unwrap_or(false),
            permitted_dns_domains: strings("permittedDNSDomains")?,
            excluded_dns_domains: strings("excludedDNSDomains")?,
            permitted_ip_ranges: nets("permittedIPRanges")?,
            excluded_ip_ranges: nets("excludedIPRanges")?,
            permitted_email_addresses: strings("permittedEmailAddresses")?,
            excluded_email_addresses: strings("excludedEmailAddresses")?,
            permitted_uri_domains: strings("permittedURIDomains")?,
            excluded_uri_domains: strings("excludedURIDomains")?,
        })
    }
}

/// Certificate signature algorithms a template may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    Ed25519,
    EcdsaSha256,
    EcdsaSha384,
    EcdsaSha512,
    Sha256Rsa,
    Sha384Rsa,
    Sha512Rsa,
}

impl SignatureAlgorithm {
    const NAMES: [(&'static str, SignatureAlgorithm); 7] = [
        ("ed25519", Self::Ed25519),
        ("ecdsasha256", Self::EcdsaSha256),
        ("ecdsasha384", Self::EcdsaSha384),
        ("ecdsasha512", Self::EcdsaSha512),
        ("sha256rsa", Self::Sha256Rsa),
        ("sha384rsa", Self::Sha384Rsa),
        ("sha512rsa", Self::Sha512Rsa),
    ];

    pub fn from_name(name: &str) -> Result<Self> {
        let normalized = normalize_name(name).replace('-', "");
        Self::NAMES
            .iter()
            .find(|(n, _)| *n == normalized)
            .map(|(_, alg)| *alg)
            .ok_or_else(|| X509Error::UnsupportedValue {
                kind: "signatureAlgorithm",
                value: name.to_string(),
            })
    }

    pub fn oid(&self) -> DerOid {
        match self {
            Self::Ed25519 => rfc8410::ID_ED_25519,
            Self::EcdsaSha256 => known::ECDSA_WITH_SHA256,
            Self::EcdsaSha384 => known::ECDSA_WITH_SHA384,
            Self::EcdsaSha512 => known::ECDSA_WITH_SHA512,
            Self::Sha256Rsa => known::SHA256_WITH_RSA,
            Self::Sha384Rsa => known::SHA384_WITH_RSA,
            Self::Sha512Rsa => known::SHA512_WITH_RSA,
        }
    }

    pub fn algorithm_identifier(&self) -> Result<AlgorithmIdentifierOwned> {
        let parameters = match self {
            // RFC 4055: NULL parameters for the RSA PKCS#1 v1.5 family
            Self::Sha256Rsa | Self::Sha384Rsa | Self::Sha512Rsa => {
                Some(Any::new(Tag::Null, Vec::new())?)
            }
            _ => None,
        };
        Ok(AlgorithmIdentifierOwned {
            oid: self.oid(),
            parameters,
        })
    }
}

impl FromJson for SignatureAlgorithm {
    fn from_json(value: &Value) -> Result<Self> {
        Self::from_name(&String::from_json(value)?)
    }
}

/// Family of a subject public key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PublicKeyAlgorithm {
    Rsa,
    Ecdsa,
    Ed25519,
    #[default]
    Unknown,
}

impl PublicKeyAlgorithm {
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Self {
        match spki.algorithm.oid {
            rfc5912::RSA_ENCRYPTION => Self::Rsa,
            rfc5912::ID_EC_PUBLIC_KEY => Self::Ecdsa,
            rfc8410::ID_ED_25519 => Self::Ed25519,
            _ => Self::Unknown,
        }
    }
}

/// Octets of an iPAddress GeneralName; IPv4 and IPv4-mapped addresses take
/// four bytes.
pub(crate) fn ip_octets(ip: &IpAddr) -> Vec<u8> {
    match ip {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.octets().to_vec(),
            None => v6.octets().to_vec(),
        },
    }
}

/// Encode a value and wrap it as an x509 extension.
pub(crate) fn wrap_extension<T: Encode>(
    oid: DerOid,
    critical: bool,
    value: &T,
) -> Result<x509_cert::ext::Extension> {
    Ok(x509_cert::ext::Extension {
        extn_id: oid,
        critical,
        extn_value: OctetString::new(value.to_der()?)?,
    })
}
