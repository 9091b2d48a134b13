//! Subject and issuer names
//!
//! A template name is a flat bag of attributes. The subject is projected into
//! an RDN sequence with one single-valued RDN per value, every value carried as
//! an IA5String so the encoded bytes are exactly the template text. The issuer
//! only fills a [`DistinguishedName`] container; the bundled signer takes the
//! issuer from the parent certificate.

use std::fmt;

use const_oid::ObjectIdentifier;
use der::{
    asn1::{Any, SetOfVec},
    Tag, Tagged,
};
use serde_json::Value;
use x509_cert::{
    attr::AttributeTypeAndValue,
    name::{RdnSequence, RelativeDistinguishedName},
};

use crate::{
    decode::{expect_object, optional, or_default, shape, FromJson, MultiString},
    error::{Result, X509Error},
    oid::known,
};

/// Structured name attributes as they appear in a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Name {
    pub country: Vec<String>,
    pub organization: Vec<String>,
    pub organizational_unit: Vec<String>,
    pub domain_controller: Vec<String>,
    pub locality: Vec<String>,
    pub province: Vec<String>,
    pub street_address: Vec<String>,
    pub postal_code: Vec<String>,
    pub serial_number: String,
    pub common_name: String,
    pub surname: String,
    pub given_name: String,
    pub title: String,
    pub user_id: String,
}

impl Name {
    /// A name holding only a common name.
    pub fn common_name(cn: impl Into<String>) -> Self {
        Self {
            common_name: cn.into(),
            ..Self::default()
        }
    }

    /// Decode a bare string. A comma separated list of `KEY=value` pairs using
    /// only known attribute keys fills those attributes, anything else is taken
    /// as the common name verbatim.
    pub fn from_string(s: &str) -> Self {
        parse_dn_string(s).unwrap_or_else(|| Self::common_name(s))
    }

    /// Read the attributes of an encoded name, accepting any string encoding.
    ///
    /// Only the base attributes are copied: country, organization, unit,
    /// locality, province, street, postal code, serial number and common name.
    pub fn from_rdn_sequence(name: &RdnSequence) -> Self {
        let mut out = Self::default();
        for atv in name.0.iter().flat_map(|rdn| rdn.0.iter()) {
            let Some(value) = directory_string(&atv.value) else {
                continue;
            };
            let oid = atv.oid;
            if oid == known::COUNTRY {
                out.country.push(value);
            } else if oid == known::ORGANIZATION {
                out.organization.push(value);
            } else if oid == known::ORGANIZATIONAL_UNIT {
                out.organizational_unit.push(value);
            } else if oid == known::LOCALITY {
                out.locality.push(value);
            } else if oid == known::PROVINCE {
                out.province.push(value);
            } else if oid == known::STREET_ADDRESS {
                out.street_address.push(value);
            } else if oid == known::POSTAL_CODE {
                out.postal_code.push(value);
            } else if oid == known::SERIAL_NUMBER {
                out.serial_number = value;
            } else if oid == known::COMMON_NAME {
                out.common_name = value;
            }
        }
        out
    }

    /// Project into the subject RDN sequence.
    ///
    /// Attribute order is fixed: country, locality, province, street address,
    /// postal code, organization, domain component, organizational unit,
    /// title, given name, surname, common name, serial number, user id.
    pub fn to_subject(&self) -> Result<RdnSequence> {
        let scalar = |s: &String| -> Vec<String> {
            if s.is_empty() {
                Vec::new()
            } else {
                vec![s.clone()]
            }
        };

        let attributes: [(ObjectIdentifier, Vec<String>); 14] = [
            (known::COUNTRY, self.country.clone()),
            (known::LOCALITY, self.locality.clone()),
            (known::PROVINCE, self.province.clone()),
            (known::STREET_ADDRESS, self.street_address.clone()),
            (known::POSTAL_CODE, self.postal_code.clone()),
            (known::ORGANIZATION, self.organization.clone()),
            (known::DOMAIN_COMPONENT, self.domain_controller.clone()),
            (known::ORGANIZATIONAL_UNIT, self.organizational_unit.clone()),
            (known::TITLE, scalar(&self.title)),
            (known::GIVEN_NAME, scalar(&self.given_name)),
            (known::SURNAME, scalar(&self.surname)),
            (known::COMMON_NAME, scalar(&self.common_name)),
            (known::SERIAL_NUMBER, scalar(&self.serial_number)),
            (known::USER_ID, scalar(&self.user_id)),
        ];

        let mut rdns = Vec::new();
        for (oid, values) in attributes {
            for value in values {
                let atv = AttributeTypeAndValue {
                    oid,
                    value: Any::new(Tag::Ia5String, value.into_bytes())?,
                };
                rdns.push(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?));
            }
        }
        Ok(RdnSequence(rdns))
    }

    /// Project into the issuer container. Domain component, title, given
    /// name, surname and user id have no place there and are dropped.
    pub fn to_issuer(&self) -> DistinguishedName {
        DistinguishedName {
            country: self.country.clone(),
            organization: self.organization.clone(),
            organizational_unit: self.organizational_unit.clone(),
            locality: self.locality.clone(),
            province: self.province.clone(),
            street_address: self.street_address.clone(),
            postal_code: self.postal_code.clone(),
            serial_number: self.serial_number.clone(),
            common_name: self.common_name.clone(),
        }
    }
}

impl FromJson for Name {
    fn from_json(value: &Value) -> Result<Self> {
        let object = match value {
            Value::String(s) => return Ok(Self::from_string(s)),
            Value::Object(_) => expect_object(value)?,
            other => {
                return Err(X509Error::Decode(format!(
                    "expected name string or object, got {}",
                    shape(other)
                )))
            }
        };
        let multi = |key: &str| -> Result<Vec<String>> {
            Ok(or_default::<MultiString>(object, key)?.0)
        };
        let scalar =
            |key: &str| -> Result<String> { Ok(optional::<String>(object, key)?.unwrap_or_default()) };

        Ok(Self {
            country: multi("country")?,
            organization: multi("organization")?,
            organizational_unit: multi("organizationalUnit")?,
            domain_controller: multi("domainController")?,
            locality: multi("locality")?,
            province: multi("province")?,
            street_address: multi("streetAddress")?,
            postal_code: multi("postalCode")?,
            serial_number: scalar("serialNumber")?,
            common_name: scalar("commonName")?,
            surname: scalar("surname")?,
            given_name: scalar("givenName")?,
            title: scalar("title")?,
            user_id: scalar("userID")?,
        })
    }
}

/// Plain issuer name with the base attribute set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub country: Vec<String>,
    pub organization: Vec<String>,
    pub organizational_unit: Vec<String>,
    pub locality: Vec<String>,
    pub province: Vec<String>,
    pub street_address: Vec<String>,
    pub postal_code: Vec<String>,
    pub serial_number: String,
    pub common_name: String,
}

impl DistinguishedName {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cn = [self.common_name.clone()];
        let serial = [self.serial_number.clone()];
        // most specific attribute first
        let attributes: [(&str, &[String]); 9] = [
            ("CN", &cn),
            ("SERIALNUMBER", &serial),
            ("POSTALCODE", &self.postal_code),
            ("STREET", &self.street_address),
            ("ST", &self.province),
            ("L", &self.locality),
            ("OU", &self.organizational_unit),
            ("O", &self.organization),
            ("C", &self.country),
        ];
        let parts: Vec<String> = attributes
            .iter()
            .flat_map(|(key, values)| {
                values
                    .iter()
                    .filter(|v| !v.is_empty())
                    .map(move |v| format!("{key}={v}"))
            })
            .collect();
        f.write_str(&parts.join(","))
    }
}

/// Text of a directory string value; `None` for non-string encodings.
pub(crate) fn directory_string(value: &Any) -> Option<String> {
    match value.tag() {
        Tag::Utf8String
        | Tag::PrintableString
        | Tag::Ia5String
        | Tag::TeletexString
        | Tag::VisibleString => String::from_utf8(value.value().to_vec()).ok(),
        _ => None,
    }
}

/// All string values of one attribute type in an encoded name, in order.
pub fn attribute_values(name: &RdnSequence, oid: ObjectIdentifier) -> Vec<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .filter(|atv| atv.oid == oid)
        .filter_map(|atv| directory_string(&atv.value))
        .collect()
}

fn parse_dn_string(s: &str) -> Option<Name> {
    let mut name = Name::default();
    let mut parsed_any = false;

    for component in split_unescaped(s) {
        let (key, value) = component.split_once('=')?;
        let key = key.trim().to_ascii_uppercase();
        let value = value.trim().to_string();
        if value.is_empty() {
            return None;
        }
        match key.as_str() {
            "CN" => name.common_name = value,
            "C" => name.country.push(value),
            "O" => name.organization.push(value),
            "OU" => name.organizational_unit.push(value),
            "DC" => name.domain_controller.push(value),
            "L" => name.locality.push(value),
            "ST" => name.province.push(value),
            "STREET" => name.street_address.push(value),
            "POSTALCODE" => name.postal_code.push(value),
            "SERIALNUMBER" => name.serial_number = value,
            "SN" => name.surname = value,
            "GN" | "GIVENNAME" => name.given_name = value,
            "TITLE" => name.title = value,
            "UID" => name.user_id = value,
            _ => return None,
        }
        parsed_any = true;
    }

    parsed_any.then_some(name)
}

/// Split on commas not preceded by a backslash, unescaping `\,`, `\=` and `\\`.
fn split_unescaped(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next @ (',' | '=' | '\\')) => current.push(next),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => current.push('\\'),
            },
            ',' => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}
