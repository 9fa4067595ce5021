//! Identifier types for dbmesh.
//!
//! Control-plane resources are named by caller-chosen strings. These newtypes
//! keep cluster, instance, and snapshot names from being mixed up while
//! serializing exactly like the plain string the control plane expects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Return the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the identifier and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(IdError::Empty(stringify!($name)));
                }
                Ok(Self(trimmed.to_string()))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Identifier of a database cluster (the storage and coordination shell).
    ClusterId
}

string_id! {
    /// Identifier of a database instance, standalone or attached to a cluster.
    InstanceId
}

string_id! {
    /// Identifier of a cluster snapshot.
    SnapshotId
}

impl InstanceId {
    /// Derive the identifier of the `ordinal`-th member instance of a cluster.
    ///
    /// Member names are always `{cluster}-instance-{ordinal}`, with ordinals
    /// starting at 1, so a topology of N instances names them exactly
    /// `{cluster}-instance-1` through `{cluster}-instance-N`.
    #[must_use]
    pub fn member(cluster: &ClusterId, ordinal: u32) -> Self {
        Self(format!("{cluster}-instance-{ordinal}"))
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input string is empty or only whitespace.
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_naming() {
        let cluster = ClusterId::new("db1");
        let names: Vec<_> = (1..=3).map(|n| InstanceId::member(&cluster, n)).collect();
        assert_eq!(
            names.iter().map(InstanceId::as_str).collect::<Vec<_>>(),
            vec!["db1-instance-1", "db1-instance-2", "db1-instance-3"]
        );
    }

    #[test]
    fn parse_rejects_empty() {
        assert_eq!(
            "  ".parse::<ClusterId>(),
            Err(IdError::Empty("ClusterId"))
        );
        assert_eq!("snap1".parse::<SnapshotId>().unwrap().as_str(), "snap1");
    }

    #[test]
    fn serde_is_transparent() {
        let id = ClusterId::new("db1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"db1\"");
        let parsed: ClusterId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn debug_names_the_kind() {
        let id = SnapshotId::new("nightly");
        assert_eq!(format!("{id:?}"), "SnapshotId(nightly)");
        assert_eq!(id.to_string(), "nightly");
    }
}
