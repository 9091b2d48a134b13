//! Rendering the certificate representation as a TBSCertificate

use const_oid::ObjectIdentifier as DerOid;
use der::{
    asn1::{BitString, Ia5String, OctetString},
    Encode,
};
use x509_cert::{
    certificate::Version,
    ext::{
        pkix::{
            certpolicy::PolicyInformation,
            crl::dp::DistributionPoint,
            name::{DistributionPointName, GeneralName},
            AccessDescription, AuthorityInfoAccessSyntax, AuthorityKeyIdentifier,
            BasicConstraints as X509BasicConstraints, CertificatePolicies, CrlDistributionPoints,
            ExtendedKeyUsage, SubjectKeyIdentifier,
        },
        Extension as X509Extension,
    },
    name::RdnSequence,
    serial_number::SerialNumber,
    spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned},
    time::Validity,
    TbsCertificate,
};

use crate::{
    error::{Result, X509Error},
    extensions::{wrap_extension, Extension},
    oid::{known, ObjectIdentifier},
    template::UnsignedCertificate,
};

/// Generated extensions, minus those a custom extension overrides.
struct ExtensionList<'a> {
    custom: &'a [Extension],
    extensions: Vec<X509Extension>,
}

impl<'a> ExtensionList<'a> {
    fn new(custom: &'a [Extension]) -> Result<Self> {
        for (i, ext) in custom.iter().enumerate() {
            if custom[..i].iter().any(|earlier| earlier.id == ext.id) {
                return Err(X509Error::CertificateCreation(format!(
                    "duplicate extension {}",
                    ext.id
                )));
            }
        }
        Ok(Self {
            custom,
            extensions: Vec::new(),
        })
    }

    fn overridden(&self, oid: DerOid) -> bool {
        let oid = ObjectIdentifier::from(oid);
        self.custom.iter().any(|ext| ext.id == oid)
    }

    fn push<T: Encode>(&mut self, oid: DerOid, critical: bool, value: &T) -> Result<()> {
        if !self.overridden(oid) {
            self.extensions.push(wrap_extension(oid, critical, value)?);
        }
        Ok(())
    }

    fn push_raw(&mut self, ext: &Extension) -> Result<()> {
        let x509 = ext.to_x509()?;
        if !self.overridden(x509.extn_id) {
            self.extensions.push(x509);
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Option<Vec<X509Extension>>> {
        for ext in self.custom {
            self.extensions.push(ext.to_x509()?);
        }
        Ok((!self.extensions.is_empty()).then_some(self.extensions))
    }
}

fn uri(value: &str) -> Result<GeneralName> {
    let uri = Ia5String::new(value).map_err(|e| {
        X509Error::CertificateCreation(format!("URL {value:?} is not an IA5String: {e}"))
    })?;
    Ok(GeneralName::UniformResourceIdentifier(uri))
}

impl UnsignedCertificate {
    /// Render the v3 TBSCertificate for this representation.
    pub fn to_tbs_certificate(
        &self,
        issuer: RdnSequence,
        authority_key_id: &[u8],
        validity: Validity,
        signature_algorithm: AlgorithmIdentifierOwned,
        public_key: &SubjectPublicKeyInfoOwned,
    ) -> Result<TbsCertificate> {
        let serial = self
            .serial_number
            .as_ref()
            .ok_or_else(|| X509Error::CertificateCreation("missing serial number".to_string()))?;
        let serial_number = SerialNumber::new(&serial.to_bytes_be())
            .map_err(|e| X509Error::CertificateCreation(format!("invalid serial number: {e}")))?;

        // an empty subject is only allowed when the SAN extension names the subject
        if self.subject.0.is_empty() && self.subject_alt_name.is_none() {
            return Err(X509Error::CertificateCreation(
                "certificate has neither a subject nor subject alternative names".to_string(),
            ));
        }

        Ok(TbsCertificate {
            version: Version::V3,
            serial_number,
            signature: signature_algorithm,
            issuer,
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: public_key.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: self.render_extensions(authority_key_id)?,
        })
    }

    fn render_extensions(&self, authority_key_id: &[u8]) -> Result<Option<Vec<X509Extension>>> {
        let mut list = ExtensionList::new(&self.extra_extensions)?;

        if !self.subject_key_id.is_empty() {
            let ski = SubjectKeyIdentifier(OctetString::new(self.subject_key_id.clone())?);
            list.push(known::SUBJECT_KEY_IDENTIFIER, false, &ski)?;
        }

        if let Some((unused, bytes)) = self.key_usage.and_then(|usage| usage.to_bit_string()) {
            list.push(known::KEY_USAGE, true, &BitString::new(unused, bytes)?)?;
        }

        if !self.ext_key_usage.is_empty() || !self.unknown_ext_key_usage.is_empty() {
            let mut oids: Vec<DerOid> = self.ext_key_usage.iter().map(|u| u.oid()).collect();
            for oid in &self.unknown_ext_key_usage {
                oids.push(oid.to_der_oid()?);
            }
            list.push(known::EXT_KEY_USAGE, false, &ExtendedKeyUsage(oids))?;
        }

        if let Some(constraints) = &self.basic_constraints {
            let bc = X509BasicConstraints {
                ca: constraints.is_ca,
                path_len_constraint: constraints.path_len_constraint()?,
            };
            list.push(known::BASIC_CONSTRAINTS, true, &bc)?;
        }

        if let Some(san) = &self.subject_alt_name {
            list.push_raw(san)?;
        }

        if !authority_key_id.is_empty() {
            let aki = AuthorityKeyIdentifier {
                key_identifier: Some(OctetString::new(authority_key_id)?),
                authority_cert_issuer: None,
                authority_cert_serial_number: None,
            };
            list.push(known::AUTHORITY_KEY_IDENTIFIER, false, &aki)?;
        }

        if !self.ocsp_server.is_empty() || !self.issuing_certificate_url.is_empty() {
            let ocsp = self.ocsp_server.iter().map(|url| (known::AD_OCSP, url));
            let issuers = self.issuing_certificate_url.iter().map(|url| (known::AD_CA_ISSUERS, url));
            let access = ocsp
                .chain(issuers)
                .map(|(method, url)| {
                    Ok(AccessDescription {
                        access_method: method,
                        access_location: uri(url)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            list.push(known::AUTHORITY_INFO_ACCESS, false, &AuthorityInfoAccessSyntax(access))?;
        }

        if !self.crl_distribution_points.is_empty() {
            let points = self
                .crl_distribution_points
                .iter()
                .map(|url| {
                    Ok(DistributionPoint {
                        distribution_point: Some(DistributionPointName::FullName(vec![uri(url)?])),
                        reasons: None,
                        crl_issuer: None,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            list.push(known::CRL_DISTRIBUTION_POINTS, false, &CrlDistributionPoints(points))?;
        }

        if !self.policy_identifiers.is_empty() {
            let policies = self
                .policy_identifiers
                .iter()
                .map(|oid| {
                    Ok(PolicyInformation {
                        policy_identifier: oid.to_der_oid()?,
                        policy_qualifiers: None,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            list.push(known::CERTIFICATE_POLICIES, false, &CertificatePolicies(policies))?;
        }

        if let Some(constraints) = &self.name_constraints {
            if let Some(nc) = constraints.to_x509()? {
                list.push(known::NAME_CONSTRAINTS, constraints.critical, &nc)?;
            }
        }

        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use der::Decode;
    use num_bigint::BigUint;
    use serde_json::json;
    use x509_cert::{
        ext::pkix::{KeyUsage, KeyUsages, SubjectAltName},
        time::Time,
    };

    use super::*;
    use crate::{
        decode::FromJson,
        extensions::SignatureAlgorithm,
        request::{tests::sample_csr, CertificateRequest},
        template::Template,
    };

    fn render(document: serde_json::Value) -> Result<TbsCertificate> {
        let csr = sample_csr("render", &[]);
        let mut template = Template::from_json(&document).unwrap();
        template.public_key = Some(csr.public_key().clone());
        let cert = template.certificate()?;

        let validity = Validity {
            not_before: Time::UtcTime(der::asn1::UtcTime::from_unix_duration(Duration::from_secs(1_700_000_000)).unwrap()),
            not_after: Time::UtcTime(der::asn1::UtcTime::from_unix_duration(Duration::from_secs(1_800_000_000)).unwrap()),
        };
        cert.to_tbs_certificate(
            RdnSequence::default(),
            &[0xAA; 4],
            validity,
            SignatureAlgorithm::Ed25519.algorithm_identifier().unwrap(),
            csr.public_key(),
        )
    }

    fn ids(tbs: &TbsCertificate) -> Vec<String> {
        tbs.extensions
            .iter()
            .flatten()
            .map(|ext| ext.extn_id.to_string())
            .collect()
    }

    #[test]
    fn test_extension_order() {
        let tbs = render(json!({
            "subject": "leaf",
            "serialNumber": 1,
            "dnsNames": "leaf.example.com",
            "keyUsage": "digitalSignature",
            "extKeyUsage": "serverAuth",
            "unknownExtKeyUsage": "1.3.6.1.4.1.99.1",
            "subjectKeyId": "AQID",
            "ocspServer": "http://ocsp.example.com",
            "issuingCertificateURL": "http://ca.example.com/ca.crt",
            "crlDistributionPoints": ["http://crl.example.com/1.crl", "http://crl.example.com/2.crl"],
            "policyIdentifiers": "2.23.140.1.2.1",
            "basicConstraints": {"isCA": false},
            "nameConstraints": {"critical": true, "permittedDNSDomains": "example.com"},
            "extensions": [{"id": "1.2.3.4", "value": "BQA="}]
        }))
        .unwrap();

        assert_eq!(tbs.version, Version::V3);
        assert_eq!(
            ids(&tbs),
            vec![
                "2.5.29.14", "2.5.29.15", "2.5.29.37", "2.5.29.19", "2.5.29.17", "2.5.29.35",
                "1.3.6.1.5.5.7.1.1", "2.5.29.31", "2.5.29.32", "2.5.29.30", "1.2.3.4",
            ]
        );

        let exts = tbs.extensions.unwrap();
        let critical: Vec<bool> = exts.iter().map(|e| e.critical).collect();
        assert_eq!(
            critical,
            vec![false, true, false, true, false, false, false, false, false, true, false]
        );

        let ku = KeyUsage::from_der(exts[1].extn_value.as_bytes()).unwrap();
        assert!(ku.0.contains(KeyUsages::DigitalSignature));

        let eku = ExtendedKeyUsage::from_der(exts[2].extn_value.as_bytes()).unwrap();
        assert_eq!(eku.0.len(), 2);
        assert_eq!(eku.0[1].to_string(), "1.3.6.1.4.1.99.1");

        let bc = X509BasicConstraints::from_der(exts[3].extn_value.as_bytes()).unwrap();
        assert!(!bc.ca);
        assert!(bc.path_len_constraint.is_none());

        let aki = AuthorityKeyIdentifier::from_der(exts[5].extn_value.as_bytes()).unwrap();
        assert_eq!(aki.key_identifier.unwrap().as_bytes(), &[0xAA; 4]);

        let aia = AuthorityInfoAccessSyntax::from_der(exts[6].extn_value.as_bytes()).unwrap();
        assert_eq!(aia.0[0].access_method, known::AD_OCSP);
        assert_eq!(aia.0[1].access_method, known::AD_CA_ISSUERS);

        let crl = CrlDistributionPoints::from_der(exts[7].extn_value.as_bytes()).unwrap();
        assert_eq!(crl.0.len(), 2);
    }

    #[test]
    fn test_ca_path_length() {
        let tbs = render(json!({
            "subject": "ca", "serialNumber": 1,
            "basicConstraints": {"isCA": true, "maxPathLen": 0}
        }))
        .unwrap();
        let ext = &tbs.extensions.unwrap()[0];
        let bc = X509BasicConstraints::from_der(ext.extn_value.as_bytes()).unwrap();
        assert!(bc.ca);
        assert_eq!(bc.path_len_constraint, Some(0));

        let tbs = render(json!({
            "subject": "ca", "serialNumber": 1,
            "basicConstraints": {"isCA": true, "maxPathLen": -1}
        }))
        .unwrap();
        let ext = &tbs.extensions.unwrap()[0];
        let bc = X509BasicConstraints::from_der(ext.extn_value.as_bytes()).unwrap();
        assert!(bc.path_len_constraint.is_none());

        assert!(matches!(
            render(json!({
                "subject": "ca", "serialNumber": 1,
                "basicConstraints": {"isCA": true, "maxPathLen": 300}
            })),
            Err(X509Error::CertificateCreation(_))
        ));
    }

    #[test]
    fn test_custom_extension_overrides_generated() {
        let tbs = render(json!({
            "subject": "leaf",
            "serialNumber": 1,
            "keyUsage": "digitalSignature",
            "dnsNames": "generated.example.com",
            "extensions": [
                {"id": "2.5.29.17", "value": "MAA="},
                {"id": "2.5.29.15", "critical": true, "value": "AwIHgA=="}
            ]
        }))
        .unwrap();
        let exts = tbs.extensions.unwrap();
        // AKI from the issuer context, then both custom extensions
        assert_eq!(exts.len(), 3);
        assert_eq!(exts[1].extn_id, known::SUBJECT_ALT_NAME);
        assert!(SubjectAltName::from_der(exts[1].extn_value.as_bytes()).unwrap().0.is_empty());
        assert_eq!(exts[2].extn_id, known::KEY_USAGE);
    }

    #[test]
    fn test_duplicate_custom_extensions() {
        let err = render(json!({
            "subject": "leaf",
            "serialNumber": 1,
            "extensions": [
                {"id": "1.2.3.4", "value": "BQA="},
                {"id": "1.2.3.4", "critical": true, "value": "BQA="}
            ]
        }))
        .unwrap_err();
        assert!(matches!(err, X509Error::CertificateCreation(_)));
    }

    #[test]
    fn test_declared_empty_key_usage() {
        let tbs = render(json!({"subject": "leaf", "serialNumber": 1, "keyUsage": []})).unwrap();
        assert!(!ids(&tbs).contains(&"2.5.29.15".to_string()));
    }

    #[test]
    fn test_missing_serial_or_subject() {
        assert!(matches!(
            render(json!({"subject": "leaf"})),
            Err(X509Error::CertificateCreation(_))
        ));
        assert!(matches!(
            render(json!({"serialNumber": 5})),
            Err(X509Error::CertificateCreation(_))
        ));
        // SANs stand in for an empty subject
        let tbs = render(json!({"serialNumber": 5, "dnsNames": "a.example.com"})).unwrap();
        assert!(tbs.subject.0.is_empty());
    }

    #[test]
    fn test_serial_encoding() {
        let tbs = render(json!({"subject": "s", "serialNumber": "0xff"})).unwrap();
        // positive INTEGER keeps a leading zero octet
        assert_eq!(tbs.serial_number.to_der().unwrap(), vec![0x02, 0x02, 0x00, 0xff]);
    }

    #[test]
    fn test_no_extensions() {
        let csr = sample_csr("bare", &[]);
        let cert = UnsignedCertificate {
            subject: crate::name::Name::common_name("bare").to_subject().unwrap(),
            serial_number: Some(BigUint::from(9u32)),
            ..UnsignedCertificate::default()
        };
        let validity = Validity::from_now(Duration::from_secs(60)).unwrap();
        let tbs = cert
            .to_tbs_certificate(
                RdnSequence::default(),
                &[],
                validity,
                SignatureAlgorithm::Ed25519.algorithm_identifier().unwrap(),
                csr.public_key(),
            )
            .unwrap();
        assert!(tbs.extensions.is_none());
    }
}
