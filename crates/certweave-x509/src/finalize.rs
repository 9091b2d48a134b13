//! Completing and signing an assembled certificate

use der::{Decode, Encode};
use num_bigint::BigUint;
use sha2::{Digest, Sha256};
use tracing::info;
use x509_cert::{spki::SubjectPublicKeyInfoOwned, Certificate};

use crate::{
    config::IssuanceConfig,
    error::{Result, X509Error},
    template::UnsignedCertificate,
};

/// Who signs the certificate.
#[derive(Debug, Clone, Copy)]
pub enum Parent<'a> {
    /// The certificate is its own issuer.
    SelfSigned,
    /// Issued under this CA certificate.
    Issuer(&'a Certificate),
}

/// Produces a DER certificate from an assembled representation.
pub trait CertificateSigner {
    fn sign(
        &self,
        certificate: &UnsignedCertificate,
        parent: &Parent<'_>,
        public_key: &SubjectPublicKeyInfoOwned,
    ) -> Result<Vec<u8>>;
}

/// A signed certificate with its encoding.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub der: Vec<u8>,
    pub certificate: Certificate,
}

impl IssuedCertificate {
    pub fn to_pem(&self) -> String {
        pem::encode(&pem::Pem::new("CERTIFICATE", self.der.clone()))
    }
}

/// Fill in a missing serial number and subject key id, sign, and parse the
/// result back.
pub fn create_certificate<S: CertificateSigner>(
    mut certificate: UnsignedCertificate,
    parent: Parent<'_>,
    public_key: &SubjectPublicKeyInfoOwned,
    signer: &S,
    config: &IssuanceConfig,
) -> Result<IssuedCertificate> {
    if certificate.serial_number.is_none() {
        certificate.serial_number = Some(generate_serial_number(config.serial_bits)?);
    }
    if certificate.subject_key_id.is_empty() {
        certificate.subject_key_id = subject_key_id(public_key)?;
    }

    let der = signer
        .sign(&certificate, &parent, public_key)
        .map_err(|e| match e {
            X509Error::CertificateCreation(_) => e,
            other => X509Error::CertificateCreation(other.to_string()),
        })?;

    let parsed = Certificate::from_der(&der)
        .map_err(|e| X509Error::CertificateParsing(e.to_string()))?;

    info!(
        subject = certificate.subject_common_name().unwrap_or_default(),
        serial = %hex::encode(parsed.tbs_certificate.serial_number.as_bytes()),
        self_signed = matches!(parent, Parent::SelfSigned),
        "certificate issued"
    );

    Ok(IssuedCertificate {
        der,
        certificate: parsed,
    })
}

/// Random positive serial of `bits` width. The top bit is cleared so the
/// INTEGER never needs a padding octet.
pub fn generate_serial_number(bits: u32) -> Result<BigUint> {
    let mut bytes = vec![0u8; (bits as usize / 8).max(1)];
    loop {
        getrandom::fill(&mut bytes).map_err(|e| {
            X509Error::CertificateCreation(format!("Failed to generate serial number: {e}"))
        })?;
        bytes[0] &= 0x7f;
        let serial = BigUint::from_bytes_be(&bytes);
        if serial != BigUint::default() {
            return Ok(serial);
        }
    }
}

/// Key identifier from the leftmost 160 bits of the SHA-256 hash of the
/// subjectPublicKey bits (RFC 7093, section 2, method 1).
pub fn subject_key_id(public_key: &SubjectPublicKeyInfoOwned) -> Result<Vec<u8>> {
    let bits = public_key.subject_public_key.as_bytes().ok_or_else(|| {
        X509Error::CertificateCreation("subject public key has unused bits".to_string())
    })?;
    let digest = Sha256::digest(bits);
    Ok(digest[..20].to_vec())
}

/// DER of the public key info, for comparing keys across certificates.
pub(crate) fn spki_der(public_key: &SubjectPublicKeyInfoOwned) -> Result<Vec<u8>> {
    Ok(public_key.to_der()?)
}
