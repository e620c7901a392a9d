//! Target frameworks and nearest-group selection.
//!
//! Registries tag both dependency lists and content lists with the framework
//! they were built for. Conversion targets one framework and picks, for every
//! tagged list, the compatible group that is "nearest" to it:
//!
//! 1. an exact match,
//! 2. otherwise the highest compatible version of the same family,
//! 3. otherwise the highest compatible `netstandard`,
//! 4. otherwise a framework-agnostic (`any`) group.
//!
//! Compatibility follows the .NET Standard support table: `netcoreapp3.0+`
//! runs `netstandard2.1`, `net461+` runs `netstandard2.0`, and so on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors that can occur when parsing a [`TargetFramework`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameworkError {
    /// The moniker did not name a supported framework family.
    #[error("unknown target framework '{0}'")]
    Unknown(String),

    /// The family was recognized but the version part was not.
    #[error("invalid version in target framework '{0}'")]
    InvalidVersion(String),
}

/// A framework family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FrameworkFamily {
    /// Framework-agnostic content.
    Any,
    /// .NET Standard.
    NetStandard,
    /// .NET Core and .NET 5 or later.
    NetCoreApp,
    /// .NET Framework.
    NetFramework,
}

/// A specific framework: family plus a `major.minor.patch` version.
///
/// # Example
///
/// ```
/// use unirepack_schema::TargetFramework;
///
/// let fw: TargetFramework = ".NETStandard2.0".parse().unwrap();
/// assert_eq!(fw.to_string(), "netstandard2.0");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetFramework {
    family: FrameworkFamily,
    version: (u32, u32, u32),
}

impl TargetFramework {
    /// The framework-agnostic target.
    pub const ANY: Self = Self {
        family: FrameworkFamily::Any,
        version: (0, 0, 0),
    };

    /// Build a framework from its parts.
    pub fn new(family: FrameworkFamily, major: u32, minor: u32, patch: u32) -> Self {
        if family == FrameworkFamily::Any {
            return Self::ANY;
        }
        Self {
            family,
            version: (major, minor, patch),
        }
    }

    /// The framework family.
    pub fn family(&self) -> FrameworkFamily {
        self.family
    }

    /// Highest `netstandard` version this framework can consume, if any.
    fn netstandard_ceiling(&self) -> Option<(u32, u32, u32)> {
        let v = self.version;
        match self.family {
            FrameworkFamily::NetStandard => Some(v),
            FrameworkFamily::NetCoreApp if v >= (3, 0, 0) => Some((2, 1, 0)),
            FrameworkFamily::NetCoreApp if v >= (2, 0, 0) => Some((2, 0, 0)),
            FrameworkFamily::NetCoreApp if v >= (1, 0, 0) => Some((1, 6, 0)),
            FrameworkFamily::NetFramework if v >= (4, 6, 1) => Some((2, 0, 0)),
            FrameworkFamily::NetFramework if v >= (4, 6, 0) => Some((1, 3, 0)),
            FrameworkFamily::NetFramework if v >= (4, 5, 2) => Some((1, 2, 0)),
            FrameworkFamily::NetFramework if v >= (4, 5, 0) => Some((1, 1, 0)),
            _ => None,
        }
    }

    /// Returns `true` if content built for `candidate` can be used when
    /// targeting `self`.
    pub fn is_compatible_with(&self, candidate: &TargetFramework) -> bool {
        if candidate.family == FrameworkFamily::Any {
            return true;
        }
        if candidate.family == self.family {
            return candidate.version <= self.version;
        }
        candidate.family == FrameworkFamily::NetStandard
            && self
                .netstandard_ceiling()
                .is_some_and(|ceiling| candidate.version <= ceiling)
    }

    /// Sort key for compatible candidates; larger is nearer.
    fn nearness(&self, candidate: &TargetFramework) -> (u8, (u32, u32, u32)) {
        let tier = if candidate == self {
            3
        } else if candidate.family == self.family {
            2
        } else if candidate.family == FrameworkFamily::NetStandard {
            1
        } else {
            0
        };
        (tier, candidate.version)
    }

    /// Select the group nearest to this framework.
    ///
    /// `framework_of` extracts the tag of each group. Returns `None` when no
    /// group is compatible. Among equally near groups the first one wins.
    pub fn nearest<'a, T>(
        &self,
        groups: &'a [T],
        framework_of: impl Fn(&T) -> TargetFramework,
    ) -> Option<&'a T> {
        let mut best: Option<(&T, (u8, (u32, u32, u32)))> = None;
        for group in groups {
            let fw = framework_of(group);
            if !self.is_compatible_with(&fw) {
                continue;
            }
            let key = self.nearness(&fw);
            if best.as_ref().is_none_or(|(_, best_key)| key > *best_key) {
                best = Some((group, key));
            }
        }
        best.map(|(group, _)| group)
    }
}

impl Default for TargetFramework {
    fn default() -> Self {
        Self::new(FrameworkFamily::NetStandard, 2, 1, 0)
    }
}

fn parse_dotted(text: &str, input: &str) -> Result<(u32, u32, u32), FrameworkError> {
    let err = || FrameworkError::InvalidVersion(input.to_string());
    let mut parts = [0u32; 3];
    let pieces: Vec<&str> = text.split('.').collect();
    if pieces.is_empty() || pieces.len() > 4 {
        return Err(err());
    }
    for (slot, piece) in parts.iter_mut().zip(&pieces) {
        *slot = piece.parse().map_err(|_| err())?;
    }
    Ok((parts[0], parts[1], parts[2]))
}

/// `net472` style: one digit per component.
fn parse_compact(text: &str, input: &str) -> Result<(u32, u32, u32), FrameworkError> {
    let err = || FrameworkError::InvalidVersion(input.to_string());
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) || text.len() > 3 {
        return Err(err());
    }
    let mut parts = [0u32; 3];
    for (slot, c) in parts.iter_mut().zip(text.chars()) {
        *slot = c.to_digit(10).ok_or_else(err)?;
    }
    Ok((parts[0], parts[1], parts[2]))
}

impl FromStr for TargetFramework {
    type Err = FrameworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let lower = input.to_ascii_lowercase();
        // Nuspec long names carry a leading dot and an optional `v` before the version.
        let name = lower.trim_start_matches('.');
        let name = name.split(['-', '+']).next().unwrap_or_default();

        if name.is_empty() || name == "any" || name == "agnostic" {
            return Ok(Self::ANY);
        }

        let (family, rest) = if let Some(rest) = name.strip_prefix("netstandard") {
            (FrameworkFamily::NetStandard, rest)
        } else if let Some(rest) = name.strip_prefix("netcoreapp") {
            (FrameworkFamily::NetCoreApp, rest)
        } else if let Some(rest) = name.strip_prefix("netframework") {
            (FrameworkFamily::NetFramework, rest)
        } else if let Some(rest) = name.strip_prefix("net") {
            // `net5.0`+ is .NET Core, `net48` is .NET Framework.
            let rest = rest.trim_start_matches('v');
            if rest.contains('.') {
                let version = parse_dotted(rest, input)?;
                let family = if version.0 >= 5 {
                    FrameworkFamily::NetCoreApp
                } else {
                    FrameworkFamily::NetFramework
                };
                return Ok(Self { family, version });
            }
            return Ok(Self {
                family: FrameworkFamily::NetFramework,
                version: parse_compact(rest, input)?,
            });
        } else {
            return Err(FrameworkError::Unknown(input.to_string()));
        };

        let rest = rest.trim_start_matches('v');
        let version = if rest.contains('.') {
            parse_dotted(rest, input)?
        } else {
            parse_compact(rest, input)?
        };
        Ok(Self { family, version })
    }
}

impl fmt::Display for TargetFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (major, minor, patch) = self.version;
        match self.family {
            FrameworkFamily::Any => write!(f, "any"),
            FrameworkFamily::NetStandard => write!(f, "netstandard{major}.{minor}"),
            FrameworkFamily::NetCoreApp if major >= 5 => write!(f, "net{major}.{minor}"),
            FrameworkFamily::NetCoreApp => write!(f, "netcoreapp{major}.{minor}"),
            FrameworkFamily::NetFramework if patch == 0 => write!(f, "net{major}{minor}"),
            FrameworkFamily::NetFramework => write!(f, "net{major}{minor}{patch}"),
        }
    }
}

impl Serialize for TargetFramework {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TargetFramework {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fw(s: &str) -> TargetFramework {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_short_and_long_names() {
        assert_eq!(fw("netstandard2.0"), fw(".NETStandard2.0"));
        assert_eq!(fw("net472"), fw(".NETFramework4.7.2"));
        assert_eq!(fw("net6.0").family(), FrameworkFamily::NetCoreApp);
        assert_eq!(fw("netcoreapp3.1"), fw(".NETCoreApp3.1"));
        assert_eq!(fw("net48").to_string(), "net48");
        assert_eq!(fw("net462").to_string(), "net462");
        assert_eq!(fw(""), TargetFramework::ANY);
        assert!("uap10.0".parse::<TargetFramework>().is_err());
    }

    #[test]
    fn test_compatibility_table() {
        let target = fw("netstandard2.1");
        assert!(target.is_compatible_with(&fw("netstandard2.0")));
        assert!(target.is_compatible_with(&fw("netstandard1.3")));
        assert!(target.is_compatible_with(&TargetFramework::ANY));
        assert!(!target.is_compatible_with(&fw("net472")));
        assert!(!target.is_compatible_with(&fw("net6.0")));

        assert!(fw("net48").is_compatible_with(&fw("netstandard2.0")));
        assert!(!fw("net48").is_compatible_with(&fw("netstandard2.1")));
        assert!(fw("net6.0").is_compatible_with(&fw("netcoreapp3.1")));
        assert!(fw("net6.0").is_compatible_with(&fw("netstandard2.1")));
    }

    #[test]
    fn test_nearest_prefers_exact_then_family_then_netstandard() {
        let groups = vec![
            fw("netstandard1.3"),
            fw("net45"),
            fw("netstandard2.0"),
            TargetFramework::ANY,
        ];
        let target = fw("netstandard2.1");
        assert_eq!(target.nearest(&groups, |g| *g), Some(&fw("netstandard2.0")));

        let target = fw("net472");
        assert_eq!(target.nearest(&groups, |g| *g), Some(&fw("net45")));

        let groups = vec![TargetFramework::ANY, fw("netstandard2.1")];
        assert_eq!(
            fw("netstandard2.1").nearest(&groups, |g| *g),
            Some(&fw("netstandard2.1"))
        );
    }

    #[test]
    fn test_nearest_none_when_incompatible() {
        let groups = vec![fw("net6.0"), fw("net472")];
        assert_eq!(fw("netstandard2.1").nearest(&groups, |g| *g), None);
    }
}
