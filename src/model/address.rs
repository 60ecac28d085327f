use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Longest address we accept, in bytes.
pub const MAX_ADDRESS_LEN: usize = 128;

/// The identity of a participant: whoever invokes a ledger operation.
///
/// Addresses are opaque, but `0x`-prefixed hex addresses are lowercased on
/// parse so that differently-cased spellings of the same account compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::bad_request("Address must not be empty"));
        }
        if trimmed.len() > MAX_ADDRESS_LEN {
            return Err(Error::bad_request(format!(
                "Address longer than {MAX_ADDRESS_LEN} bytes"
            )));
        }
        if let Some(illegal) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')))
        {
            return Err(Error::bad_request(format!(
                "Illegal character {illegal:?} in address"
            )));
        }

        let normalised = if is_hex_address(trimmed) {
            trimmed.to_ascii_lowercase()
        } else {
            trimmed.to_string()
        };
        Ok(Self(normalised))
    }
}

fn is_hex_address(s: &str) -> bool {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"));
    matches!(digits, Some(d) if !d.is_empty() && d.chars().all(|c| c.is_ascii_hexdigit()))
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl<'a> FromParam<'a> for Address {
    type Error = Error;

    fn from_param(param: &'a str) -> Result<Self> {
        param.parse()
    }
}

impl UriDisplay<Path> for Address {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(&self.0)
    }
}

impl_from_uri_param_identity!([Path] Address);
