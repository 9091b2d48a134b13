//! Certificate signing requests
//!
//! [`CertificateRequest`] is what the template merger needs from a request.
//! [`Csr`] implements it over a PKCS#10 `CertReq`, reading the requested
//! subject alternative names from the extensionRequest attribute.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use const_oid::db::{rfc5912, rfc8410};
use der::{
    asn1::{Any, BitString, OctetString, SetOfVec},
    Decode, Encode,
};
use signature::{Signer, Verifier};
use x509_cert::{
    attr::Attribute,
    ext::{
        pkix::{name::GeneralName, SubjectAltName},
        Extension as X509Extension,
    },
    name::RdnSequence,
    request::{CertReq, CertReqInfo, Version},
    spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned},
};

use crate::{
    error::{Result, X509Error},
    extensions::{wrap_extension, PublicKeyAlgorithm},
    oid::known,
};

/// A certificate request as seen by the template merger.
pub trait CertificateRequest {
    /// Verify the request's self-signature.
    fn check_signature(&self) -> Result<()>;

    fn public_key(&self) -> &SubjectPublicKeyInfoOwned;

    fn public_key_algorithm(&self) -> PublicKeyAlgorithm {
        PublicKeyAlgorithm::from_spki(self.public_key())
    }

    fn subject(&self) -> &RdnSequence;

    fn dns_names(&self) -> &[String];

    fn email_addresses(&self) -> &[String];

    fn ip_addresses(&self) -> &[IpAddr];

    fn uris(&self) -> &[String];
}

/// Subject alternative names requested through extensionRequest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RequestedNames {
    dns_names: Vec<String>,
    email_addresses: Vec<String>,
    ip_addresses: Vec<IpAddr>,
    uris: Vec<String>,
}

/// PKCS#10 certificate signing request
#[derive(Debug, Clone)]
pub struct Csr {
    inner: CertReq,
    names: RequestedNames,
}

/// Build the unsigned request body, carrying `sans` in an extensionRequest
/// attribute when there are any.
pub fn build_unsigned(
    subject: RdnSequence,
    public_key: SubjectPublicKeyInfoOwned,
    sans: Vec<GeneralName>,
) -> Result<CertReqInfo> {
    let mut attributes = SetOfVec::new();
    if !sans.is_empty() {
        let extensions = vec![wrap_extension(
            known::SUBJECT_ALT_NAME,
            false,
            &SubjectAltName(sans),
        )?];
        let value = Any::from_der(&extensions.to_der()?)?;
        attributes.insert(Attribute {
            oid: known::EXTENSION_REQUEST,
            values: SetOfVec::try_from(vec![value])?,
        })?;
    }

    Ok(CertReqInfo {
        version: Version::V1,
        subject,
        public_key,
        attributes,
    })
}

/// Create an Ed25519-signed request.
pub fn create_ed25519_csr(
    key: &ed25519_dalek::SigningKey,
    subject: RdnSequence,
    sans: Vec<GeneralName>,
) -> Result<Csr> {
    let public_key = SubjectPublicKeyInfoOwned {
        algorithm: AlgorithmIdentifierOwned {
            oid: rfc8410::ID_ED_25519,
            parameters: None,
        },
        subject_public_key: BitString::from_bytes(key.verifying_key().as_bytes())?,
    };
    let info = build_unsigned(subject, public_key, sans)?;
    let signature = key.sign(&info.to_der()?);
    Csr::assemble(
        info,
        AlgorithmIdentifierOwned {
            oid: rfc8410::ID_ED_25519,
            parameters: None,
        },
        &signature.to_bytes(),
    )
}

impl Csr {
    /// Combine a request body with its signature.
    pub fn assemble(
        info: CertReqInfo,
        algorithm: AlgorithmIdentifierOwned,
        signature: &[u8],
    ) -> Result<Self> {
        Self::from_cert_req(CertReq {
            info,
            algorithm,
            signature: BitString::from_bytes(signature)?,
        })
    }

    /// Parse from PEM, accepting both request labels in use.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let der = pem::parse(pem)
            .map_err(|e| X509Error::Parse(format!("Failed to parse PEM: {}", e)))?;

        if der.tag() != "CERTIFICATE REQUEST" && der.tag() != "NEW CERTIFICATE REQUEST" {
            return Err(X509Error::Parse(format!(
                "Invalid PEM tag {}, expected CERTIFICATE REQUEST or NEW CERTIFICATE REQUEST",
                der.tag()
            )));
        }

        Self::from_der(der.contents())
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertReq::from_der(der)
            .map_err(|e| X509Error::Parse(format!("Failed to parse certificate request: {}", e)))?;
        Self::from_cert_req(inner)
    }

    fn from_cert_req(inner: CertReq) -> Result<Self> {
        let names = requested_names(&inner.info)?;
        Ok(Self { inner, names })
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.inner.to_der()?)
    }

    pub fn to_pem(&self) -> Result<String> {
        Ok(pem::encode(&pem::Pem::new("CERTIFICATE REQUEST", self.to_der()?)))
    }

    pub fn inner(&self) -> &CertReq {
        &self.inner
    }

    fn verify_ed25519(&self, message: &[u8]) -> Result<()> {
        let failed = |reason: String| X509Error::SignatureVerificationFailed(reason);

        let key_bytes: [u8; 32] = self
            .public_key()
            .subject_public_key
            .raw_bytes()
            .try_into()
            .map_err(|_| failed("Invalid Ed25519 public key length".to_string()))?;
        let key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| failed(format!("Invalid Ed25519 public key: {e}")))?;
        let signature = ed25519_dalek::Signature::from_slice(self.inner.signature.raw_bytes())
            .map_err(|e| failed(format!("Invalid Ed25519 signature: {e}")))?;

        key.verify(message, &signature)
            .map_err(|_| failed("Ed25519 signature does not match".to_string()))
    }

    fn verify_p256(&self, message: &[u8]) -> Result<()> {
        use p256::ecdsa::{Signature, VerifyingKey};

        let failed = |reason: String| X509Error::SignatureVerificationFailed(reason);

        let spki = self.public_key();
        if spki.algorithm.oid != rfc5912::ID_EC_PUBLIC_KEY {
            return Err(failed("ECDSA signature over a non-EC public key".to_string()));
        }
        let curve = spki
            .algorithm
            .parameters
            .as_ref()
            .and_then(|params| params.to_der().ok())
            .and_then(|der| const_oid::ObjectIdentifier::from_der(&der).ok());
        if curve != Some(rfc5912::SECP_256_R_1) {
            return Err(failed("Only P-256 ECDSA keys are supported".to_string()));
        }

        let key = VerifyingKey::from_sec1_bytes(spki.subject_public_key.raw_bytes())
            .map_err(|e| failed(format!("Invalid P-256 public key: {e}")))?;
        let signature = Signature::from_der(self.inner.signature.raw_bytes())
            .map_err(|e| failed(format!("Invalid ECDSA signature: {e}")))?;

        key.verify(message, &signature)
            .map_err(|_| failed("ECDSA signature does not match".to_string()))
    }
}

impl CertificateRequest for Csr {
    fn check_signature(&self) -> Result<()> {
        let message = self.inner.info.to_der()?;
        let algorithm = self.inner.algorithm.oid;

        if algorithm == rfc8410::ID_ED_25519 {
            self.verify_ed25519(&message)
        } else if algorithm == known::ECDSA_WITH_SHA256 {
            self.verify_p256(&message)
        } else {
            Err(X509Error::SignatureVerificationFailed(format!(
                "Unsupported request signature algorithm {algorithm}"
            )))
        }
    }

    fn public_key(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.info.public_key
    }

    fn subject(&self) -> &RdnSequence {
        &self.inner.info.subject
    }

    fn dns_names(&self) -> &[String] {
        &self.names.dns_names
    }

    fn email_addresses(&self) -> &[String] {
        &self.names.email_addresses
    }

    fn ip_addresses(&self) -> &[IpAddr] {
        &self.names.ip_addresses
    }

    fn uris(&self) -> &[String] {
        &self.names.uris
    }
}

fn requested_names(info: &CertReqInfo) -> Result<RequestedNames> {
    let mut names = RequestedNames::default();

    let requested = info
        .attributes
        .iter()
        .filter(|attr| attr.oid == known::EXTENSION_REQUEST)
        .flat_map(|attr| attr.values.iter());

    for value in requested {
        let extensions = Vec::<X509Extension>::from_der(&value.to_der()?)
            .map_err(|e| X509Error::Parse(format!("Invalid extensionRequest: {e}")))?;

        for ext in extensions.iter().filter(|ext| ext.extn_id == known::SUBJECT_ALT_NAME) {
            let san = SubjectAltName::from_der(ext.extn_value.as_bytes())
                .map_err(|e| X509Error::Parse(format!("Invalid subjectAltName: {e}")))?;
            for name in san.0 {
                match name {
                    GeneralName::DnsName(dns) => names.dns_names.push(dns.to_string()),
                    GeneralName::Rfc822Name(email) => names.email_addresses.push(email.to_string()),
                    GeneralName::UniformResourceIdentifier(uri) => names.uris.push(uri.to_string()),
                    GeneralName::IpAddress(octets) => names.ip_addresses.push(ip_from_octets(&octets)?),
                    _ => {}
                }
            }
        }
    }

    Ok(names)
}

fn ip_from_octets(octets: &OctetString) -> Result<IpAddr> {
    let bytes = octets.as_bytes();
    if let Ok(v4) = <[u8; 4]>::try_from(bytes) {
        Ok(IpAddr::V4(Ipv4Addr::from(v4)))
    } else if let Ok(v6) = <[u8; 16]>::try_from(bytes) {
        Ok(IpAddr::V6(Ipv6Addr::from(v6)))
    } else {
        Err(X509Error::Parse(format!(
            "Invalid IP address length {} in subjectAltName",
            bytes.len()
        )))
    }
}
