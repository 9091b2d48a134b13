//! Issuance settings

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, X509Error};

/// Settings applied when a certificate is finalized and signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuanceConfig {
    /// Certificate lifetime in days
    pub validity_days: u32,
    /// notBefore is moved this far into the past to absorb clock skew
    pub backdate_minutes: u32,
    /// Width of generated serial numbers
    pub serial_bits: u32,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            validity_days: 365,
            backdate_minutes: 60,
            serial_bits: 128,
        }
    }
}

impl IssuanceConfig {
    pub const MIN_SERIAL_BITS: u32 = 128;
    pub const MAX_SERIAL_BITS: u32 = 160;
    pub const MAX_VALIDITY_DAYS: u32 = 36_500;
    pub const MAX_BACKDATE_MINUTES: u32 = 10_080;

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| X509Error::Config(format!("invalid issuance config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.validity_days == 0 || self.validity_days > Self::MAX_VALIDITY_DAYS {
            return Err(X509Error::Config(format!(
                "validity_days must be between 1 and {}, got {}",
                Self::MAX_VALIDITY_DAYS,
                self.validity_days
            )));
        }
        if self.backdate_minutes > Self::MAX_BACKDATE_MINUTES {
            return Err(X509Error::Config(format!(
                "backdate_minutes must be at most {}, got {}",
                Self::MAX_BACKDATE_MINUTES,
                self.backdate_minutes
            )));
        }
        if self.serial_bits < Self::MIN_SERIAL_BITS
            || self.serial_bits > Self::MAX_SERIAL_BITS
            || self.serial_bits % 8 != 0
        {
            return Err(X509Error::Config(format!(
                "serial_bits must be a multiple of 8 between {} and {}, got {}",
                Self::MIN_SERIAL_BITS,
                Self::MAX_SERIAL_BITS,
                self.serial_bits
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = IssuanceConfig::default();
        assert_eq!(config.validity_days, 365);
        assert_eq!(config.backdate_minutes, 60);
        assert_eq!(config.serial_bits, 128);
        config.validate().unwrap();

        // missing keys fall back to defaults
        let partial = IssuanceConfig::from_toml_str("validity_days = 30").unwrap();
        assert_eq!(partial.validity_days, 30);
        assert_eq!(partial.serial_bits, 128);
    }

    #[test]
    fn test_invalid_values() {
        for text in [
            "serial_bits = 64",
            "serial_bits = 130",
            "serial_bits = 168",
            "validity_days = 0",
            "validity_days = 4000000",
            "backdate_minutes = 20000",
        ] {
            assert!(
                matches!(IssuanceConfig::from_toml_str(text), Err(X509Error::Config(_))),
                "{text}"
            );
        }
        assert!(matches!(
            IssuanceConfig::from_toml_str("validity_days = \"long\""),
            Err(X509Error::Config(_))
        ));
    }

    #[test]
    fn test_load_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "validity_days = 90\nbackdate_minutes = 5\nserial_bits = 160").unwrap();
        let config = IssuanceConfig::load(file.path()).unwrap();
        assert_eq!(
            config,
            IssuanceConfig {
                validity_days: 90,
                backdate_minutes: 5,
                serial_bits: 160
            }
        );

        assert!(matches!(
            IssuanceConfig::load("/nonexistent/certweave.toml"),
            Err(X509Error::Io(_))
        ));
    }
}
