//! certweave-x509 - X.509 certificates from JSON templates
//!
//! Templates are decoded into a [`Template`], merged with a certificate
//! request, assembled into an [`UnsignedCertificate`] and finally signed.

pub mod config;
pub mod decode;
pub mod error;
pub mod extensions;
pub mod finalize;
mod merge;
pub mod name;
pub mod oid;
mod render;
pub mod request;
pub mod san;
pub mod signer;
pub mod template;
pub mod usage;

pub use config::IssuanceConfig;
pub use error::{Result, X509Error};
pub use extensions::{
    BasicConstraints, CaConstraints, Extension, NameConstraints, PublicKeyAlgorithm,
    SignatureAlgorithm,
};
pub use finalize::{create_certificate, CertificateSigner, IssuedCertificate, Parent};
pub use name::{DistinguishedName, Name};
pub use oid::ObjectIdentifier;
pub use request::{create_ed25519_csr, CertificateRequest, Csr};
pub use san::{encode_subject_alt_names, SanType, SubjectAlternativeName};
pub use signer::Ed25519Signer;
pub use template::{Template, UnsignedCertificate};
pub use usage::{ExtKeyUsage, KeyUsage};

/// Commonly used types and functions
pub mod prelude {
    pub use crate::{
        create_certificate, CertificateRequest, CertificateSigner, Csr, Ed25519Signer,
        IssuanceConfig, IssuedCertificate, Parent, Result, Template, UnsignedCertificate,
        X509Error,
    };
}
