//! Scalar decoders for template fields
//!
//! Template fields accept several JSON shapes (a string or a list of strings, a
//! number or a prefixed string). Decoding goes through [`serde_json::Value`] so
//! each shape is checked explicitly and mismatches surface as typed errors
//! instead of being coerced.

use std::net::IpAddr;

use base64::{engine::general_purpose::STANDARD, Engine};
use num_bigint::BigUint;
use serde_json::{Map, Value};

use crate::{
    error::{Result, X509Error},
    oid::ObjectIdentifier,
};

/// Decoding from a JSON value with typed errors.
pub trait FromJson: Sized {
    fn from_json(value: &Value) -> Result<Self>;
}

/// Human readable name of a JSON value's shape, for error messages.
pub(crate) fn shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Read an optional field; a missing key and `null` both mean "omitted".
pub(crate) fn optional<T: FromJson>(object: &Map<String, Value>, key: &str) -> Result<Option<T>> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::from_json(value).map(Some).map_err(|e| e.in_field(key)),
    }
}

/// Read a field, falling back to the type's default when omitted.
pub(crate) fn or_default<T: FromJson + Default>(
    object: &Map<String, Value>,
    key: &str,
) -> Result<T> {
    Ok(optional(object, key)?.unwrap_or_default())
}

pub(crate) fn expect_object(value: &Value) -> Result<&Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| X509Error::Decode(format!("expected object, got {}", shape(value))))
}

impl FromJson for String {
    fn from_json(value: &Value) -> Result<Self> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| X509Error::Decode(format!("expected string, got {}", shape(value))))
    }
}

impl FromJson for bool {
    fn from_json(value: &Value) -> Result<Self> {
        value
            .as_bool()
            .ok_or_else(|| X509Error::Decode(format!("expected boolean, got {}", shape(value))))
    }
}

impl FromJson for i64 {
    fn from_json(value: &Value) -> Result<Self> {
        value
            .as_i64()
            .ok_or_else(|| X509Error::Decode(format!("expected integer, got {value}")))
    }
}

/// A string or a list of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiString(pub Vec<String>);

impl FromJson for MultiString {
    fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(Self(vec![s.clone()])),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        X509Error::Decode(format!(
                            "expected array of strings, found {} element",
                            shape(item)
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(Self),
            other => Err(X509Error::Decode(format!(
                "expected string or array of strings, got {}",
                shape(other)
            ))),
        }
    }
}

impl From<MultiString> for Vec<String> {
    fn from(value: MultiString) -> Self {
        value.0
    }
}

/// Certificate serial number; never negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialNumber(pub BigUint);

impl SerialNumber {
    /// Parse the textual form. `0b`/`0B`, `0o`/`0O` and `0x`/`0X` select
    /// base 2, 8 and 16, anything else is base 10.
    pub fn parse(s: &str) -> Result<Self> {
        let (digits, radix) = match s.get(..2) {
            Some("0b" | "0B") => (&s[2..], 2),
            Some("0o" | "0O") => (&s[2..], 8),
            Some("0x" | "0X") => (&s[2..], 16),
            _ => (s, 10),
        };

        // BigUint::parse_bytes tolerates '_' separators, serial numbers do not
        if digits.is_empty() || digits.contains('_') {
            return Err(X509Error::Parse(format!("serial number {s} is not valid")));
        }

        BigUint::parse_bytes(digits.as_bytes(), radix)
            .map(Self)
            .ok_or_else(|| X509Error::Parse(format!("serial number {s} is not valid")))
    }
}

impl FromJson for SerialNumber {
    fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Number(n) => n
                .as_u64()
                .map(|n| Self(BigUint::from(n)))
                .ok_or_else(|| {
                    X509Error::Decode(format!("serial number {n} is not a non-negative integer"))
                }),
            other => Err(X509Error::Decode(format!(
                "expected serial number string or integer, got {}",
                shape(other)
            ))),
        }
    }
}

impl FromJson for ObjectIdentifier {
    fn from_json(value: &Value) -> Result<Self> {
        ObjectIdentifier::parse(&String::from_json(value)?)
    }
}

/// A list of object identifiers, also accepted as a single string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiObjectIdentifier(pub Vec<ObjectIdentifier>);

impl FromJson for MultiObjectIdentifier {
    fn from_json(value: &Value) -> Result<Self> {
        MultiString::from_json(value)?
            .0
            .iter()
            .map(|s| ObjectIdentifier::parse(s))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

/// A list of IP address literals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiIp(pub Vec<IpAddr>);

impl FromJson for MultiIp {
    fn from_json(value: &Value) -> Result<Self> {
        MultiString::from_json(value)?
            .0
            .iter()
            .map(|s| {
                s.parse::<IpAddr>()
                    .map_err(|e| X509Error::Parse(format!("invalid IP address {s}: {e}")))
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

/// A list of absolute URIs; the original text is kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiUri(pub Vec<String>);

impl FromJson for MultiUri {
    fn from_json(value: &Value) -> Result<Self> {
        let uris = MultiString::from_json(value)?.0;
        for uri in &uris {
            url::Url::parse(uri)
                .map_err(|e| X509Error::Parse(format!("invalid URI {uri}: {e}")))?;
        }
        Ok(Self(uris))
    }
}

/// An IP network in CIDR notation, used by name constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpNet {
    pub addr: IpAddr,
    pub prefix_len: u8,
}

impl IpNet {
    pub fn parse(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| X509Error::Parse(format!("invalid IP range {s}: missing prefix")))?;
        let addr = addr
            .parse::<IpAddr>()
            .map_err(|e| X509Error::Parse(format!("invalid IP range {s}: {e}")))?;
        let prefix_len = prefix
            .parse::<u8>()
            .map_err(|e| X509Error::Parse(format!("invalid IP range {s}: {e}")))?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        if prefix_len > max {
            return Err(X509Error::Parse(format!(
                "invalid IP range {s}: prefix longer than {max}"
            )));
        }
        Ok(Self { addr, prefix_len })
    }

    /// Address followed by netmask, the GeneralName iPAddress form for
    /// name constraints (RFC 5280 4.2.1.10).
    pub fn to_constraint_bytes(&self) -> Vec<u8> {
        let (mut bytes, width) = match self.addr {
            IpAddr::V4(v4) => (v4.octets().to_vec(), 4),
            IpAddr::V6(v6) => (v6.octets().to_vec(), 16),
        };
        let mut remaining = usize::from(self.prefix_len);
        for _ in 0..width {
            let bits = remaining.min(8);
            remaining -= bits;
            bytes.push(if bits == 0 { 0 } else { 0xffu8 << (8 - bits) });
        }
        bytes
    }
}

/// A list of IP networks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiIpNet(pub Vec<IpNet>);

impl FromJson for MultiIpNet {
    fn from_json(value: &Value) -> Result<Self> {
        MultiString::from_json(value)?
            .0
            .iter()
            .map(|s| IpNet::parse(s))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

/// Raw bytes carried as standard base64 text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Base64Bytes(pub Vec<u8>);

impl FromJson for Base64Bytes {
    fn from_json(value: &Value) -> Result<Self> {
        let text = String::from_json(value)?;
        STANDARD
            .decode(text.as_bytes())
            .map(Self)
            .map_err(|e| X509Error::Decode(format!("invalid base64: {e}")))
    }
}
