//! Ed25519 certificate signer

use std::time::Duration;

use der::{
    asn1::{BitString, GeneralizedTime, UtcTime},
    DateTime, Decode, Encode,
};
use ed25519_dalek::{pkcs8::DecodePrivateKey, SigningKey};
use signature::Signer;
use time::OffsetDateTime;
use tracing::debug;
use x509_cert::{
    ext::pkix::SubjectKeyIdentifier,
    spki::SubjectPublicKeyInfoOwned,
    time::{Time, Validity},
    Certificate,
};

use crate::{
    config::IssuanceConfig,
    error::{Result, X509Error},
    extensions::SignatureAlgorithm,
    finalize::{spki_der, CertificateSigner, Parent},
    oid::known,
    template::UnsignedCertificate,
};

/// Signs certificates with an Ed25519 key.
#[derive(Debug, Clone)]
pub struct Ed25519Signer {
    key: SigningKey,
    config: IssuanceConfig,
}

impl Ed25519Signer {
    pub fn new(key: SigningKey, config: IssuanceConfig) -> Self {
        Self { key, config }
    }

    /// Load the signing key from a PKCS#8 PEM document.
    pub fn from_pkcs8_pem(pem: &str, config: IssuanceConfig) -> Result<Self> {
        let key = SigningKey::from_pkcs8_pem(pem)
            .map_err(|e| X509Error::Parse(format!("Invalid Ed25519 private key: {e}")))?;
        Ok(Self::new(key, config))
    }

    /// SubjectPublicKeyInfo of the signing key.
    pub fn public_key(&self) -> Result<SubjectPublicKeyInfoOwned> {
        use ed25519_dalek::pkcs8::EncodePublicKey;

        let der = self
            .key
            .verifying_key()
            .to_public_key_der()
            .map_err(|e| X509Error::Encoding(e.to_string()))?;
        Ok(SubjectPublicKeyInfoOwned::from_der(der.as_bytes())?)
    }

    /// notBefore is backdated by the configured skew allowance.
    fn validity(&self) -> Result<Validity> {
        let now = OffsetDateTime::now_utc();
        let not_before = now
            .checked_sub(time::Duration::minutes(i64::from(self.config.backdate_minutes)))
            .ok_or_else(|| {
                X509Error::CertificateCreation(format!(
                    "backdate of {} minutes is out of range",
                    self.config.backdate_minutes
                ))
            })?;
        let not_after = now
            .checked_add(time::Duration::days(i64::from(self.config.validity_days)))
            .ok_or_else(|| {
                X509Error::CertificateCreation(format!(
                    "validity of {} days is out of range",
                    self.config.validity_days
                ))
            })?;
        Ok(Validity {
            not_before: x509_time(not_before)?,
            not_after: x509_time(not_after)?,
        })
    }

    fn check_parent_key(&self, parent_key: &SubjectPublicKeyInfoOwned) -> Result<()> {
        if spki_der(parent_key)? != spki_der(&self.public_key()?)? {
            return Err(X509Error::CertificateCreation(
                "signing key does not match the parent public key".to_string(),
            ));
        }
        Ok(())
    }
}

/// UTCTime through 2049, GeneralizedTime afterwards.
fn x509_time(at: OffsetDateTime) -> Result<Time> {
    let secs = u64::try_from(at.unix_timestamp()).map_err(|_| {
        X509Error::CertificateCreation(format!("time {at} is before the unix epoch"))
    })?;
    let date_time = DateTime::from_unix_duration(Duration::from_secs(secs))?;
    if date_time.year() < 2050 {
        Ok(Time::UtcTime(UtcTime::from_date_time(date_time)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

/// The subject key identifier extension value of a certificate, if present.
fn certificate_key_id(certificate: &Certificate) -> Result<Option<Vec<u8>>> {
    let Some(extensions) = &certificate.tbs_certificate.extensions else {
        return Ok(None);
    };
    match extensions
        .iter()
        .find(|ext| ext.extn_id == known::SUBJECT_KEY_IDENTIFIER)
    {
        Some(ext) => {
            let ski = SubjectKeyIdentifier::from_der(ext.extn_value.as_bytes())?;
            Ok(Some(ski.0.as_bytes().to_vec()))
        }
        None => Ok(None),
    }
}

impl CertificateSigner for Ed25519Signer {
    fn sign(
        &self,
        certificate: &UnsignedCertificate,
        parent: &Parent<'_>,
        public_key: &SubjectPublicKeyInfoOwned,
    ) -> Result<Vec<u8>> {
        if let Some(algorithm) = certificate.signature_algorithm {
            if algorithm != SignatureAlgorithm::Ed25519 {
                return Err(X509Error::CertificateCreation(format!(
                    "signature algorithm {algorithm:?} does not match an Ed25519 signing key"
                )));
            }
        }

        let (issuer, authority_key_id) = match parent {
            Parent::SelfSigned => {
                self.check_parent_key(public_key)?;
                (certificate.subject.clone(), certificate.authority_key_id.clone())
            }
            Parent::Issuer(ca) => {
                self.check_parent_key(&ca.tbs_certificate.subject_public_key_info)?;
                let key_id = certificate_key_id(ca)?
                    .unwrap_or_else(|| certificate.authority_key_id.clone());
                (ca.tbs_certificate.subject.clone(), key_id)
            }
        };

        let signature_algorithm = SignatureAlgorithm::Ed25519.algorithm_identifier()?;
        let tbs_certificate = certificate.to_tbs_certificate(
            issuer,
            &authority_key_id,
            self.validity()?,
            signature_algorithm.clone(),
            public_key,
        )?;

        let signature = self.key.sign(&tbs_certificate.to_der()?);
        debug!(issuer = %tbs_certificate.issuer, "signed certificate");

        let signed = Certificate {
            tbs_certificate,
            signature_algorithm,
            signature: BitString::from_bytes(&signature.to_bytes())?,
        };
        Ok(signed.to_der()?)
    }
}

#[cfg(test)]
mod tests {
    use der::Decode;
    use ed25519_dalek::{Signature, Verifier};
    use num_bigint::BigUint;

    use super::*;
    use crate::{
        finalize::create_certificate,
        name::Name,
        request::{tests::sample_csr, CertificateRequest},
    };

    fn ca_key() -> SigningKey {
        SigningKey::from_bytes(&[3u8; 32])
    }

    fn unsigned(cn: &str) -> UnsignedCertificate {
        UnsignedCertificate {
            subject: Name::common_name(cn).to_subject().unwrap(),
            serial_number: Some(BigUint::from(1u32)),
            ..UnsignedCertificate::default()
        }
    }

    fn self_signed_ca() -> Certificate {
        let signer = Ed25519Signer::new(ca_key(), IssuanceConfig::default());
        let mut ca = unsigned("Root CA");
        ca.subject_key_id = vec![0xCA; 20];
        let der = signer
            .sign(&ca, &Parent::SelfSigned, &signer.public_key().unwrap())
            .unwrap();
        Certificate::from_der(&der).unwrap()
    }

    #[test]
    fn test_self_signed_signature_verifies() {
        let ca = self_signed_ca();
        assert_eq!(ca.tbs_certificate.issuer, ca.tbs_certificate.subject);

        let tbs = ca.tbs_certificate.to_der().unwrap();
        let signature = Signature::from_slice(ca.signature.raw_bytes()).unwrap();
        ca_key().verifying_key().verify(&tbs, &signature).unwrap();
    }

    #[test]
    fn test_validity_window() {
        let ca = self_signed_ca();
        let validity = ca.tbs_certificate.validity;
        let span = validity.not_after.to_unix_duration() - validity.not_before.to_unix_duration();
        // 365 days plus the one hour backdate
        assert_eq!(span.as_secs(), 365 * 86_400 + 3_600);
        assert!(matches!(validity.not_before, Time::UtcTime(_)));
    }

    #[test]
    fn test_validity_out_of_range() {
        // bypasses IssuanceConfig::validate
        let config = IssuanceConfig {
            validity_days: 4_000_000,
            ..IssuanceConfig::default()
        };
        let signer = Ed25519Signer::new(ca_key(), config);
        let err = signer
            .sign(&unsigned("Root CA"), &Parent::SelfSigned, &signer.public_key().unwrap())
            .unwrap_err();
        assert!(matches!(err, X509Error::CertificateCreation(_)));
    }

    #[test]
    fn test_far_future_uses_generalized_time() {
        let at = OffsetDateTime::from_unix_timestamp(2_600_000_000).unwrap();
        assert!(matches!(x509_time(at).unwrap(), Time::GeneralTime(_)));
    }

    #[test]
    fn test_issued_by_ca() {
        let ca = self_signed_ca();
        let csr = sample_csr("leaf.example.com", &[]);
        let signer = Ed25519Signer::new(ca_key(), IssuanceConfig::default());

        let mut leaf = unsigned("leaf.example.com");
        leaf.authority_key_id = vec![1, 2, 3];
        let issued = create_certificate(
            leaf,
            Parent::Issuer(&ca),
            csr.public_key(),
            &signer,
            &IssuanceConfig::default(),
        )
        .unwrap();

        let tbs = &issued.certificate.tbs_certificate;
        assert_eq!(tbs.issuer, ca.tbs_certificate.subject);
        assert_eq!(&tbs.subject_public_key_info, csr.public_key());

        let aki = tbs
            .extensions
            .iter()
            .flatten()
            .find(|e| e.extn_id == known::AUTHORITY_KEY_IDENTIFIER)
            .unwrap();
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(aki.extn_value.as_bytes())
            .unwrap();
        // the parent's key id wins over the template's
        assert_eq!(aki.key_identifier.unwrap().as_bytes(), &[0xCA; 20]);
        assert!(issued.to_pem().starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[test]
    fn test_key_mismatch() {
        let ca = self_signed_ca();
        let other = Ed25519Signer::new(SigningKey::from_bytes(&[4u8; 32]), IssuanceConfig::default());
        let csr = sample_csr("x", &[]);

        let err = other
            .sign(&unsigned("x"), &Parent::Issuer(&ca), csr.public_key())
            .unwrap_err();
        assert!(matches!(err, X509Error::CertificateCreation(_)));

        // self-signed: the subject key must be the signing key
        let err = other
            .sign(&unsigned("x"), &Parent::SelfSigned, csr.public_key())
            .unwrap_err();
        assert!(matches!(err, X509Error::CertificateCreation(_)));
    }

    #[test]
    fn test_rejects_other_signature_algorithms() {
        let signer = Ed25519Signer::new(ca_key(), IssuanceConfig::default());
        let mut cert = unsigned("ecdsa");
        cert.signature_algorithm = Some(SignatureAlgorithm::EcdsaSha256);
        let err = signer
            .sign(&cert, &Parent::SelfSigned, &signer.public_key().unwrap())
            .unwrap_err();
        assert!(matches!(err, X509Error::CertificateCreation(_)));
    }

    #[test]
    fn test_pkcs8_pem() {
        use ed25519_dalek::pkcs8::EncodePrivateKey;
        use der::pem::LineEnding;

        let pem = ca_key().to_pkcs8_pem(LineEnding::LF).unwrap();
        let signer = Ed25519Signer::from_pkcs8_pem(&pem, IssuanceConfig::default()).unwrap();
        assert_eq!(signer.key.to_bytes(), ca_key().to_bytes());

        assert!(matches!(
            Ed25519Signer::from_pkcs8_pem("nope", IssuanceConfig::default()),
            Err(X509Error::Parse(_))
        ));
    }
}
