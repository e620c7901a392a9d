//! Package ids and `(id, version)` identities.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::version::{Version, VersionError};

/// A registry package id such as `Newtonsoft.Json`.
///
/// The original casing is kept for display, but equality, hashing and
/// ordering ignore ASCII case, matching how registries treat ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    /// Create a new package id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the id with its original casing.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the lowercased id, the form used as a lookup key in settings.
    pub fn to_lowercase(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl PartialEq for PackageId {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for PackageId {}

impl Hash for PackageId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl Ord for PackageId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .bytes()
            .map(|b| b.to_ascii_lowercase())
            .cmp(other.0.bytes().map(|b| b.to_ascii_lowercase()))
    }
}

impl PartialOrd for PackageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq<str> for PackageId {
    fn eq(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl PartialEq<&str> for PackageId {
    fn eq(&self, other: &&str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl AsRef<str> for PackageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PackageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Errors that can occur when parsing a `name@version` token.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The token did not have the `name@version` shape.
    #[error("expected NAME@VERSION, got '{0}'")]
    Format(String),

    /// The version part could not be parsed.
    #[error("invalid version in '{input}': {source}")]
    Version {
        /// The full input token.
        input: String,
        /// The underlying version error.
        #[source]
        source: VersionError,
    },
}

/// A concrete package: id plus exact version.
///
/// Two identities are equal when their ids match case-insensitively and their
/// versions are equal; distinct versions of one id are distinct identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageIdentity {
    /// The package id.
    pub id: PackageId,
    /// The exact version.
    pub version: Version,
}

impl PackageIdentity {
    /// Create a new identity.
    pub fn new(id: impl Into<PackageId>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

impl FromStr for PackageIdentity {
    type Err = IdentityError;

    /// Parse a `name@version` token as accepted on the command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, version) = s
            .split_once('@')
            .filter(|(name, version)| !name.trim().is_empty() && !version.trim().is_empty())
            .ok_or_else(|| IdentityError::Format(s.to_string()))?;
        let version = version.parse().map_err(|source| IdentityError::Version {
            input: s.to_string(),
            source,
        })?;
        Ok(Self::new(name.trim(), version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_id_equality_ignores_case() {
        assert_eq!(PackageId::new("Newtonsoft.Json"), PackageId::new("newtonsoft.json"));
        assert_eq!(PackageId::new("Acme.Widgets"), "ACME.WIDGETS");
        assert_eq!(PackageId::new("Acme.Widgets").as_str(), "Acme.Widgets");
    }

    #[test]
    fn test_identity_hash_is_case_insensitive() {
        let mut seen = HashSet::new();
        seen.insert(PackageIdentity::new("Acme.Core", "1.0.0".parse().unwrap()));
        assert!(seen.contains(&PackageIdentity::new("acme.core", "1.0".parse().unwrap())));
        assert!(!seen.contains(&PackageIdentity::new("acme.core", "1.0.1".parse().unwrap())));
    }

    #[test]
    fn test_parse_cli_token() {
        let ident: PackageIdentity = "Some.Example.Package@1.2.3".parse().unwrap();
        assert_eq!(ident.id, "Some.Example.Package");
        assert_eq!(ident.version.to_string(), "1.2.3");
        assert_eq!(ident.to_string(), "Some.Example.Package@1.2.3");

        assert!(matches!(
            "NoVersion".parse::<PackageIdentity>(),
            Err(IdentityError::Format(_))
        ));
        assert!(matches!(
            "Pkg@".parse::<PackageIdentity>(),
            Err(IdentityError::Format(_))
        ));
        assert!(matches!(
            "Pkg@abc".parse::<PackageIdentity>(),
            Err(IdentityError::Version { .. })
        ));
    }
}
