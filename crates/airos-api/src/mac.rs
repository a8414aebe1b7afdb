use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Hardware address, normalized for comparison.
///
/// The device and its callers disagree on formatting (`AA:BB:CC:DD:EE:FF`,
/// `aa-bb-cc-dd-ee-ff`, `aabbccddeeff`, `aabb.ccdd.eeff`). The stored form
/// strips every separator and lowercases, so all of those compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MacAddress(String);

impl MacAddress {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let normalized = raw
            .as_ref()
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        Self(normalized)
    }

    /// Separator-free lowercase form (`aabbccddeeff`).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `raw` names the same address once normalized.
    pub fn matches(&self, raw: &str) -> bool {
        !self.is_empty() && *self == Self::new(raw)
    }

    /// Colon-separated lowercase form (`aa:bb:cc:dd:ee:ff`).
    ///
    /// Values that are not 12 hex digits are returned in normalized form.
    pub fn to_colon_form(&self) -> String {
        if self.0.len() != 12 || !self.0.chars().all(|c| c.is_ascii_hexdigit()) {
            return self.0.clone();
        }
        let pairs: Vec<&str> = (0..6).map(|i| &self.0[i * 2..i * 2 + 2]).collect();
        pairs.join(":")
    }

    /// The form the firmware expects in commands: colon-separated upper case.
    pub fn to_device_format(&self) -> String {
        self.to_colon_form().to_uppercase()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_colon_form())
    }
}

impl FromStr for MacAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for MacAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_colon_form())
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(raw))
    }
}
