//! NuGet-flavoured package versions.
//!
//! Registry versions are "SemVer plus a revision": `1.2`, `1.2.3`, `4.0.0.1`,
//! `2.0.0-beta.1+sha.abc`. Missing numeric parts are zero, build metadata is
//! carried along for display but ignored for equality and ordering.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors that can occur when parsing a [`Version`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The input was empty or only whitespace.
    #[error("empty version string")]
    Empty,

    /// A numeric component could not be parsed.
    #[error("invalid version component '{component}' in '{input}'")]
    InvalidComponent {
        /// The offending component.
        component: String,
        /// The full input string.
        input: String,
    },

    /// More than four numeric components, or fewer than one.
    #[error("version '{0}' must have between one and four numeric parts")]
    PartCount(String),

    /// A prerelease label was present but contained an empty identifier.
    #[error("invalid prerelease label in '{0}'")]
    InvalidPrerelease(String),
}

/// A package version with NuGet comparison semantics.
///
/// # Example
///
/// ```
/// use unirepack_schema::Version;
///
/// let a: Version = "1.0".parse().unwrap();
/// let b: Version = "1.0.0-beta".parse().unwrap();
/// assert!(b < a);
/// assert_eq!(a.to_string(), "1.0.0");
/// ```
#[derive(Debug, Clone)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    revision: u64,
    prerelease: Vec<String>,
    metadata: Option<String>,
}

impl Version {
    /// Create a release version from its three leading components.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            revision: 0,
            prerelease: Vec::new(),
            metadata: None,
        }
    }

    /// Major component.
    pub fn major(&self) -> u64 {
        self.major
    }

    /// Minor component.
    pub fn minor(&self) -> u64 {
        self.minor
    }

    /// Patch component.
    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// Fourth (revision) component, zero when absent.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether this version carries a prerelease label.
    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    /// Dot-separated prerelease identifiers, empty for releases.
    pub fn prerelease(&self) -> &[String] {
        &self.prerelease
    }

    /// Returns a copy with the given prerelease label (`"beta.1"`).
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidPrerelease`] if any identifier is empty.
    pub fn with_prerelease(mut self, label: &str) -> Result<Self, VersionError> {
        self.prerelease = parse_prerelease(label, label)?;
        Ok(self)
    }

    fn cmp_prerelease(a: &[String], b: &[String]) -> Ordering {
        match (a.is_empty(), b.is_empty()) {
            (true, true) => return Ordering::Equal,
            // A release sorts above any of its prereleases.
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }
        for (x, y) in a.iter().zip(b) {
            let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                (Ok(nx), Ok(ny)) => nx.cmp(&ny),
                (Ok(_), Err(_)) => Ordering::Less,
                (Err(_), Ok(_)) => Ordering::Greater,
                (Err(_), Err(_)) => x.to_ascii_lowercase().cmp(&y.to_ascii_lowercase()),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.len().cmp(&b.len())
    }
}

fn parse_prerelease(label: &str, input: &str) -> Result<Vec<String>, VersionError> {
    let parts: Vec<String> = label.split('.').map(str::to_string).collect();
    if parts.iter().any(String::is_empty) {
        return Err(VersionError::InvalidPrerelease(input.to_string()));
    }
    Ok(parts)
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(VersionError::Empty);
        }

        let (rest, metadata) = match input.split_once('+') {
            Some((rest, meta)) => (rest, Some(meta.to_string())),
            None => (input, None),
        };
        let (numbers, prerelease) = match rest.split_once('-') {
            Some((numbers, label)) => (numbers, parse_prerelease(label, input)?),
            None => (rest, Vec::new()),
        };

        let parts: Vec<&str> = numbers.split('.').collect();
        if parts.is_empty() || parts.len() > 4 {
            return Err(VersionError::PartCount(input.to_string()));
        }

        let mut nums = [0u64; 4];
        for (slot, part) in nums.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| VersionError::InvalidComponent {
                    component: (*part).to_string(),
                    input: input.to_string(),
                })?;
        }

        Ok(Self {
            major: nums[0],
            minor: nums[1],
            patch: nums[2],
            revision: nums[3],
            prerelease,
            metadata,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.revision != 0 {
            write!(f, ".{}", self.revision)?;
        }
        if !self.prerelease.is_empty() {
            write!(f, "-{}", self.prerelease.join("."))?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.revision.hash(state);
        // Must agree with `cmp_prerelease`: `01` equals `1`, `RC` equals `rc`.
        for id in &self.prerelease {
            match id.parse::<u64>() {
                Ok(n) => (0u8, n).hash(state),
                Err(_) => (1u8, id.to_ascii_lowercase()).hash(state),
            }
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch, self.revision)
            .cmp(&(other.major, other.minor, other.patch, other.revision))
            .then_with(|| Self::cmp_prerelease(&self.prerelease, &other.prerelease))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_missing_parts_are_zero() {
        assert_eq!(v("1"), v("1.0.0"));
        assert_eq!(v("1.2"), v("1.2.0.0"));
        assert_eq!(v("1.2").to_string(), "1.2.0");
    }

    #[test]
    fn test_revision_is_displayed_when_set() {
        assert_eq!(v("4.0.0.1").to_string(), "4.0.0.1");
        assert!(v("4.0.0.1") > v("4.0.0"));
    }

    #[test]
    fn test_prerelease_ordering() {
        assert!(v("1.0.0-alpha") < v("1.0.0"));
        assert!(v("1.0.0-alpha") < v("1.0.0-beta"));
        assert!(v("1.0.0-beta.2") < v("1.0.0-beta.11"));
        assert!(v("1.0.0-1") < v("1.0.0-alpha"));
        assert!(v("1.0.0-beta") < v("1.0.0-beta.1"));
        assert_eq!(v("1.0.0-BETA"), v("1.0.0-beta"));
    }

    #[test]
    fn test_hash_agrees_with_equality() {
        use std::collections::HashSet;

        let mut seen = HashSet::new();
        seen.insert(v("1.0.0-rc.01"));
        assert_eq!(v("1.0.0-rc.01"), v("1.0.0-RC.1"));
        assert!(seen.contains(&v("1.0.0-RC.1")));
        assert!(!seen.contains(&v("1.0.0-rc.2")));
    }

    #[test]
    fn test_metadata_ignored_for_equality() {
        assert_eq!(v("1.0.0+abc"), v("1.0.0+def"));
        assert_eq!(v("1.0.0+abc").to_string(), "1.0.0");
    }

    #[test]
    fn test_invalid_versions() {
        assert_eq!("".parse::<Version>(), Err(VersionError::Empty));
        assert!("1.x".parse::<Version>().is_err());
        assert!("1.2.3.4.5".parse::<Version>().is_err());
        assert!("1.0.0-".parse::<Version>().is_err());
    }
}
