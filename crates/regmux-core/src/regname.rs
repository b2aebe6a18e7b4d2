//! Register names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Characters accepted as register names besides ASCII alphanumerics.
const SPECIAL_REGISTERS: &str = "\"-*+_/:.%#=";

/// Name of a single register slot, always one character.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Regname(char);

impl Regname {
    /// The unnamed register.
    pub const UNNAMED: Self = Self('"');

    /// Parse a register name.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphanumeric() || SPECIAL_REGISTERS.contains(c) => {
                Ok(Self(c))
            }
            _ => Err(CoreError::InvalidRegname(raw.to_string())),
        }
    }

    /// The register's character.
    pub const fn as_char(&self) -> char {
        self.0
    }
}

impl fmt::Debug for Regname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Regname({})", self.0)
    }
}

impl fmt::Display for Regname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Regname {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Regname {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Regname> for String {
    fn from(name: Regname) -> Self {
        name.0.to_string()
    }
}
