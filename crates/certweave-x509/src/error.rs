use thiserror::Error;

/// Errors raised while decoding templates, assembling and issuing certificates
#[derive(Error, Debug)]
pub enum X509Error {
    /// A template field has the wrong JSON shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// A key usage, extended key usage or algorithm name is not recognised
    #[error("Unsupported {kind}: {value}")]
    UnsupportedValue { kind: &'static str, value: String },

    /// Bad OID, serial number, IP address or URI syntax
    #[error("Parse error: {0}")]
    Parse(String),

    /// Subject alternative name type that cannot be encoded
    #[error("Unsupported subject alternative name type: {0}")]
    UnsupportedSanType(String),

    /// The payload of an otherName SAN does not match its declared kind
    #[error("Invalid otherName value for {oid}: {reason}")]
    InvalidOtherNameValue { oid: String, reason: String },

    /// The certificate request signature did not verify
    #[error("Signature verification failed: {0}")]
    SignatureVerificationFailed(String),

    /// The signer could not produce a certificate
    #[error("Certificate creation error: {0}")]
    CertificateCreation(String),

    /// The signer output is not a valid certificate
    #[error("Certificate parsing error: {0}")]
    CertificateParsing(String),

    /// DER encoding failed
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl X509Error {
    /// Prefix a decode error with the template field it came from.
    pub(crate) fn in_field(self, field: &str) -> Self {
        match self {
            X509Error::Decode(msg) => X509Error::Decode(format!("{field}: {msg}")),
            other => other,
        }
    }
}

impl From<der::Error> for X509Error {
    fn from(e: der::Error) -> Self {
        X509Error::Encoding(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, X509Error>;
