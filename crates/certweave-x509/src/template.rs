//! Certificate templates and the extension assembler
//!
//! A [`Template`] is the decoded JSON document. [`Template::certificate`]
//! applies its fields onto a fresh [`UnsignedCertificate`] in a fixed order,
//! producing the representation handed to the finalizer.

use std::net::IpAddr;

use num_bigint::BigUint;
use serde_json::Value;
use tracing::debug;
use x509_cert::{name::RdnSequence, spki::SubjectPublicKeyInfoOwned};

use crate::{
    decode::{
        expect_object, optional, or_default, Base64Bytes, FromJson, MultiIp, MultiObjectIdentifier,
        MultiString, MultiUri, SerialNumber,
    },
    error::{Result, X509Error},
    extensions::{
        BasicConstraints, CaConstraints, Extension, NameConstraints, PublicKeyAlgorithm,
        SignatureAlgorithm,
    },
    name::{attribute_values, DistinguishedName, Name},
    oid::{known, ObjectIdentifier},
    san::{encode_general_names, subject_alt_name_extension, SanType, SubjectAlternativeName},
    usage::{ExtKeyUsage, ExtKeyUsages, KeyUsage},
};

/// Decoded certificate template.
#[derive(Debug, Clone, Default)]
pub struct Template {
    pub subject: Name,
    pub issuer: Name,
    pub serial_number: Option<SerialNumber>,
    pub dns_names: Vec<String>,
    pub email_addresses: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub uris: Vec<String>,
    pub sans: Vec<SubjectAlternativeName>,
    pub extensions: Vec<Extension>,
    /// `Some(empty)` declares no key usages, `None` leaves the field alone.
    pub key_usage: Option<KeyUsage>,
    pub ext_key_usage: Vec<ExtKeyUsage>,
    pub unknown_ext_key_usage: Vec<ObjectIdentifier>,
    pub subject_key_id: Vec<u8>,
    pub authority_key_id: Vec<u8>,
    pub ocsp_server: Vec<String>,
    pub issuing_certificate_url: Vec<String>,
    pub crl_distribution_points: Vec<String>,
    pub policy_identifiers: Vec<ObjectIdentifier>,
    pub basic_constraints: Option<BasicConstraints>,
    pub name_constraints: Option<NameConstraints>,
    pub signature_algorithm: Option<SignatureAlgorithm>,
    /// Filled from the certificate request, never from JSON.
    pub public_key: Option<SubjectPublicKeyInfoOwned>,
    pub public_key_algorithm: PublicKeyAlgorithm,
}

impl Template {
    /// Decode a JSON template document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| X509Error::Decode(format!("invalid template json: {e}")))?;
        Self::from_json(&value)
    }

    /// Apply every template field onto a fresh certificate representation.
    pub fn certificate(&self) -> Result<UnsignedCertificate> {
        let mut cert = UnsignedCertificate {
            public_key: self.public_key.clone(),
            public_key_algorithm: self.public_key_algorithm,
            ..UnsignedCertificate::default()
        };

        // SAN shorthand lists are copied as they are
        cert.dns_names = self.dns_names.clone();
        cert.email_addresses = self.email_addresses.clone();
        cert.ip_addresses = self.ip_addresses.clone();
        cert.uris = self.uris.clone();

        let explicit = self.apply_sans(&mut cert)?;
        let names = encode_general_names(
            &explicit,
            &self.dns_names,
            &self.email_addresses,
            &self.uris,
            &self.ip_addresses,
        )?;
        if !names.is_empty() {
            cert.subject_alt_name = Some(subject_alt_name_extension(&names)?);
        }

        cert.subject = self.subject.to_subject()?;
        cert.issuer = self.issuer.to_issuer();

        cert.key_usage = self.key_usage;
        cert.ext_key_usage = self.ext_key_usage.clone();
        cert.unknown_ext_key_usage = self.unknown_ext_key_usage.clone();
        cert.subject_key_id = self.subject_key_id.clone();
        cert.authority_key_id = self.authority_key_id.clone();
        cert.ocsp_server = self.ocsp_server.clone();
        cert.issuing_certificate_url = self.issuing_certificate_url.clone();
        cert.crl_distribution_points = self.crl_distribution_points.clone();
        cert.policy_identifiers = self.policy_identifiers.clone();

        if let Some(bc) = &self.basic_constraints {
            cert.basic_constraints = Some(bc.apply());
        }
        if let Some(nc) = &self.name_constraints {
            cert.name_constraints = Some(nc.clone());
        }

        cert.extra_extensions.extend(self.extensions.iter().cloned());

        cert.serial_number = self.serial_number.as_ref().map(|s| s.0.clone());
        cert.signature_algorithm = self.signature_algorithm;

        debug!(
            subject = cert.subject_common_name().unwrap_or_default(),
            sans = names.len(),
            extensions = cert.extra_extensions.len(),
            "assembled certificate"
        );
        Ok(cert)
    }

    /// Sort the explicit SAN list into the certificate's name lists and
    /// return the entries, with canonical types, for the SAN extension.
    fn apply_sans(&self, cert: &mut UnsignedCertificate) -> Result<Vec<SubjectAlternativeName>> {
        let mut normalized = Vec::with_capacity(self.sans.len());

        for san in &self.sans {
            let mut san_type = SanType::parse_ignore_case(&san.san_type);
            if matches!(san_type, SanType::Auto | SanType::Empty) {
                san_type = SanType::guess(&san.value);
            }

            match &san_type {
                SanType::Dns => cert.dns_names.push(san.value.clone()),
                SanType::Email => cert.email_addresses.push(san.value.clone()),
                SanType::Ip => match san.value.parse::<IpAddr>() {
                    Ok(ip) => cert.ip_addresses.push(ip),
                    Err(_) => {
                        debug!(value = %san.value, "dropping unparsable ip subject alternative name");
                        continue;
                    }
                },
                SanType::Uri => {
                    if url::Url::parse(&san.value).is_err() {
                        debug!(value = %san.value, "dropping unparsable uri subject alternative name");
                        continue;
                    }
                    cert.uris.push(san.value.clone());
                }
                // only carried by the SAN extension
                SanType::RegisteredId | SanType::OtherName(_) => {}
                _ => return Err(X509Error::UnsupportedSanType(san.san_type.clone())),
            }

            normalized.push(SubjectAlternativeName::new(san_type.tag(), san.value.clone()));
        }

        Ok(normalized)
    }
}

impl FromJson for Template {
    fn from_json(value: &Value) -> Result<Self> {
        let object = expect_object(value)?;

        let list = |key: &str| -> Result<Vec<String>> { Ok(or_default::<MultiString>(object, key)?.0) };
        let oids = |key: &str| -> Result<Vec<ObjectIdentifier>> {
            Ok(or_default::<MultiObjectIdentifier>(object, key)?.0)
        };
        let bytes = |key: &str| -> Result<Vec<u8>> { Ok(or_default::<Base64Bytes>(object, key)?.0) };

        let sans = match object.get("sans") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => json_array(value, "sans")?,
        };
        let extensions = match object.get("extensions") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => json_array(value, "extensions")?,
        };

        Ok(Self {
            subject: or_default(object, "subject")?,
            issuer: or_default(object, "issuer")?,
            serial_number: optional(object, "serialNumber")?,
            dns_names: list("dnsNames")?,
            email_addresses: list("emailAddresses")?,
            ip_addresses: or_default::<MultiIp>(object, "ipAddresses")?.0,
            uris: or_default::<MultiUri>(object, "uris")?.0,
            sans,
            extensions,
            key_usage: optional(object, "keyUsage")?,
            ext_key_usage: or_default::<ExtKeyUsages>(object, "extKeyUsage")?.0,
            unknown_ext_key_usage: oids("unknownExtKeyUsage")?,
            subject_key_id: bytes("subjectKeyId")?,
            authority_key_id: bytes("authorityKeyId")?,
            ocsp_server: list("ocspServer")?,
            issuing_certificate_url: list("issuingCertificateURL")?,
            crl_distribution_points: list("crlDistributionPoints")?,
            policy_identifiers: oids("policyIdentifiers")?,
            basic_constraints: optional(object, "basicConstraints")?,
            name_constraints: optional(object, "nameConstraints")?,
            signature_algorithm: optional(object, "signatureAlgorithm")?,
            public_key: None,
            public_key_algorithm: PublicKeyAlgorithm::Unknown,
        })
    }
}

fn json_array<T: FromJson>(value: &Value, field: &str) -> Result<Vec<T>> {
    value
        .as_array()
        .ok_or_else(|| {
            X509Error::Decode(format!("{field}: expected array, got {}", crate::decode::shape(value)))
        })?
        .iter()
        .map(|item| T::from_json(item).map_err(|e| e.in_field(field)))
        .collect()
}

/// Certificate representation built by the assembler and consumed by the
/// finalizer and signer.
#[derive(Debug, Clone, Default)]
pub struct UnsignedCertificate {
    pub public_key: Option<SubjectPublicKeyInfoOwned>,
    pub public_key_algorithm: PublicKeyAlgorithm,
    pub subject: RdnSequence,
    pub issuer: DistinguishedName,
    pub serial_number: Option<BigUint>,
    pub dns_names: Vec<String>,
    pub email_addresses: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub uris: Vec<String>,
    /// Precomputed SAN extension, present when any name was given.
    pub subject_alt_name: Option<Extension>,
    /// `Some(empty)` when the template declared no usages.
    pub key_usage: Option<KeyUsage>,
    pub ext_key_usage: Vec<ExtKeyUsage>,
    pub unknown_ext_key_usage: Vec<ObjectIdentifier>,
    pub subject_key_id: Vec<u8>,
    pub authority_key_id: Vec<u8>,
    pub ocsp_server: Vec<String>,
    pub issuing_certificate_url: Vec<String>,
    pub crl_distribution_points: Vec<String>,
    pub policy_identifiers: Vec<ObjectIdentifier>,
    pub basic_constraints: Option<CaConstraints>,
    pub name_constraints: Option<NameConstraints>,
    /// Raw extensions; these replace generated extensions with the same OID.
    pub extra_extensions: Vec<Extension>,
    pub signature_algorithm: Option<SignatureAlgorithm>,
}

impl UnsignedCertificate {
    /// First common name of the subject, if any.
    pub fn subject_common_name(&self) -> Option<String> {
        attribute_values(&self.subject, known::COMMON_NAME).into_iter().next()
    }
}
