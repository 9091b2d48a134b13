//! Combining certificate requests with templates

use tracing::{debug, warn};

use crate::{
    error::Result,
    extensions::PublicKeyAlgorithm,
    name::Name,
    request::CertificateRequest,
    template::Template,
    usage::{ExtKeyUsage, KeyUsage},
};

impl Template {
    /// Build a template for a verified request.
    ///
    /// The request signature is checked before anything else. Without
    /// template bytes the result is a plain leaf for the request's subject
    /// and names; otherwise the template is decoded and only the public key
    /// is taken from the request.
    pub fn from_request<R: CertificateRequest>(request: &R, template: Option<&[u8]>) -> Result<Self> {
        request.check_signature()?;

        // no template: the request's own signature algorithm is not carried over
        let Some(bytes) = template else {
            return Ok(Self::leaf(request));
        };

        let mut template = Self::from_slice(bytes)?;
        template.public_key = Some(request.public_key().clone());
        template.public_key_algorithm = request.public_key_algorithm();
        debug!(algorithm = ?template.public_key_algorithm, "merged request into template");
        Ok(template)
    }

    /// Leaf certificate template for a request, with the default leaf usages.
    pub fn leaf<R: CertificateRequest>(request: &R) -> Self {
        let public_key_algorithm = request.public_key_algorithm();

        let mut key_usage = KeyUsage::DIGITAL_SIGNATURE;
        if public_key_algorithm == PublicKeyAlgorithm::Rsa {
            key_usage |= KeyUsage::KEY_ENCIPHERMENT;
        }

        let template = Self {
            subject: Name::from_rdn_sequence(request.subject()),
            dns_names: request.dns_names().to_vec(),
            email_addresses: request.email_addresses().to_vec(),
            ip_addresses: request.ip_addresses().to_vec(),
            uris: request.uris().to_vec(),
            key_usage: Some(key_usage),
            ext_key_usage: vec![ExtKeyUsage::ServerAuth, ExtKeyUsage::ClientAuth],
            public_key: Some(request.public_key().clone()),
            public_key_algorithm,
            ..Self::default()
        };

        if template.dns_names.is_empty()
            && template.email_addresses.is_empty()
            && template.ip_addresses.is_empty()
            && template.uris.is_empty()
        {
            warn!(subject = %template.subject.common_name, "certificate request has no subject alternative names");
        }
        template
    }
}
