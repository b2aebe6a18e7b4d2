//! Location references: compact `prefix:id` strings naming a host location.
//!
//! | prefix | scope   |
//! |--------|---------|
//! | `pid`  | process |
//! | `s`    | session |
//! | `t`    | tabpage |
//! | `w`    | window  |
//! | `b`    | buffer  |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InvalidLocation;

/// The kind of host location a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "pid")]
    Process,
    #[serde(rename = "b")]
    Buffer,
    #[serde(rename = "w")]
    Window,
    #[serde(rename = "t")]
    Tabpage,
    #[serde(rename = "s")]
    Session,
}

impl Scope {
    /// All scopes.
    pub const ALL: [Scope; 5] = [
        Scope::Process,
        Scope::Buffer,
        Scope::Window,
        Scope::Tabpage,
        Scope::Session,
    ];

    /// The reference prefix, also the scope name passed to the host.
    pub const fn prefix(&self) -> &'static str {
        match self {
            Scope::Process => "pid",
            Scope::Buffer => "b",
            Scope::Window => "w",
            Scope::Tabpage => "t",
            Scope::Session => "s",
        }
    }

    /// Look up a scope by its prefix.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scope| scope.prefix() == prefix)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A parsed location reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// The string the reference was parsed from.
    pub raw_value: String,
    /// The kind of location.
    pub scope: Scope,
    /// The host-side identifier within the scope.
    pub target_id: i64,
}

impl Reference {
    /// Build a reference from its parts.
    pub fn new(scope: Scope, target_id: i64) -> Self {
        Self {
            raw_value: format!("{}:{}", scope.prefix(), target_id),
            scope,
            target_id,
        }
    }

    /// The current session, `s:0`.
    pub fn current_session() -> Self {
        Self::new(Scope::Session, 0)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw_value)
    }
}

impl FromStr for Reference {
    type Err = InvalidLocation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_reference(s)
    }
}

/// Parse a `prefix:id` reference.
///
/// Fails with [`InvalidLocation`] when there is no colon, the prefix is not a
/// known scope, or the suffix is not an integer.
pub fn parse_reference(raw_value: &str) -> Result<Reference, InvalidLocation> {
    let invalid = || InvalidLocation {
        raw_value: raw_value.to_string(),
    };

    let (prefix, suffix) = raw_value.split_once(':').ok_or_else(invalid)?;
    let scope = Scope::from_prefix(prefix).ok_or_else(invalid)?;
    let target_id = suffix.parse::<i64>().map_err(|_| invalid())?;

    Ok(Reference {
        raw_value: raw_value.to_string(),
        scope,
        target_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_session() {
        let reference = parse_reference("s:0").unwrap();
        assert_eq!(reference.scope, Scope::Session);
        assert_eq!(reference.target_id, 0);
        assert_eq!(reference, Reference::current_session());
    }

    #[test]
    fn test_parse_window() {
        let reference = parse_reference("w:12").unwrap();
        assert_eq!(reference.scope, Scope::Window);
        assert_eq!(reference.target_id, 12);
        assert_eq!(reference.raw_value, "w:12");
    }

    #[test]
    fn test_parse_pid() {
        let reference: Reference = "pid:4242".parse().unwrap();
        assert_eq!(reference.scope, Scope::Process);
        assert_eq!(reference.target_id, 4242);
    }

    #[test]
    fn test_parse_invalid() {
        for raw in ["x:1", "s:abc", "s", "", ":1", "s:", "S:1", "b:1.5"] {
            let err = parse_reference(raw).unwrap_err();
            assert_eq!(err.raw_value, raw);
        }
    }

    #[test]
    fn test_scope_prefix_roundtrip() {
        for scope in Scope::ALL {
            assert_eq!(Scope::from_prefix(scope.prefix()), Some(scope));
        }
    }

    #[test]
    fn test_scope_serializes_as_prefix() {
        assert_eq!(serde_json::to_value(Scope::Tabpage).unwrap(), "t");
        assert_eq!(serde_json::to_value(Scope::Process).unwrap(), "pid");
    }

    proptest! {
        #[test]
        fn prop_new_reference_reparses(index in 0usize..5, target_id: i64) {
            let reference = Reference::new(Scope::ALL[index], target_id);
            prop_assert_eq!(parse_reference(&reference.raw_value).unwrap(), reference);
        }

        #[test]
        fn prop_unknown_prefix_rejected(prefix in "[a-z]{1,4}", target_id: i64) {
            prop_assume!(Scope::from_prefix(&prefix).is_none());
            let raw = format!("{}:{}", prefix, target_id);
            prop_assert!(parse_reference(&raw).is_err());
        }
    }
}
