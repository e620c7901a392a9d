//! Version ranges in NuGet interval notation.
//!
//! | notation      | meaning            |
//! |---------------|--------------------|
//! | `1.0`         | `1.0 <= v`         |
//! | `[1.0]`       | `v == 1.0`         |
//! | `[1.0,2.0)`   | `1.0 <= v < 2.0`   |
//! | `(1.0,)`      | `1.0 < v`          |
//! | `(,2.0]`      | `v <= 2.0`         |
//! | `*` or empty  | any version        |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::version::{Version, VersionError};

/// Errors that can occur when parsing a [`VersionRange`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    /// Brackets are unbalanced or the interval has the wrong number of bounds.
    #[error("malformed version range '{0}'")]
    Malformed(String),

    /// One of the bounds is not a valid version.
    #[error("invalid bound in version range '{input}': {source}")]
    Bound {
        /// The full input string.
        input: String,
        /// The underlying version parse error.
        #[source]
        source: VersionError,
    },
}

/// An interval of acceptable versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VersionRange {
    min: Option<Version>,
    min_inclusive: bool,
    max: Option<Version>,
    max_inclusive: bool,
}

impl VersionRange {
    /// The unbounded range that accepts every version.
    pub fn any() -> Self {
        Self::default()
    }

    /// `min <= v`, the meaning of a bare version in a dependency declaration.
    pub fn at_least(min: Version) -> Self {
        Self {
            min: Some(min),
            min_inclusive: true,
            max: None,
            max_inclusive: false,
        }
    }

    /// `v == version`.
    pub fn exact(version: Version) -> Self {
        Self {
            min: Some(version.clone()),
            min_inclusive: true,
            max: Some(version),
            max_inclusive: true,
        }
    }

    /// `min <= v < max`.
    pub fn between(min: Version, max: Version) -> Self {
        Self {
            min: Some(min),
            min_inclusive: true,
            max: Some(max),
            max_inclusive: false,
        }
    }

    /// Lower bound, if any.
    pub fn min_version(&self) -> Option<&Version> {
        self.min.as_ref()
    }

    /// Whether the lower bound itself is accepted.
    pub fn is_min_inclusive(&self) -> bool {
        self.min_inclusive
    }

    /// Upper bound, if any.
    pub fn max_version(&self) -> Option<&Version> {
        self.max.as_ref()
    }

    /// Whether the upper bound itself is accepted.
    pub fn is_max_inclusive(&self) -> bool {
        self.max_inclusive
    }

    /// Returns `true` if `version` lies inside this range.
    pub fn satisfies(&self, version: &Version) -> bool {
        let above_min = match &self.min {
            Some(min) if self.min_inclusive => version >= min,
            Some(min) => version > min,
            None => true,
        };
        let below_max = match &self.max {
            Some(max) if self.max_inclusive => version <= max,
            Some(max) => version < max,
            None => true,
        };
        above_min && below_max
    }
}

impl FromStr for VersionRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() || input == "*" {
            return Ok(Self::any());
        }

        let bound = |text: &str| -> Result<Option<Version>, RangeError> {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse().map(Some).map_err(|source| RangeError::Bound {
                input: input.to_string(),
                source,
            })
        };

        let first = input.chars().next().unwrap_or_default();
        if first != '[' && first != '(' {
            let min = bound(input)?.ok_or_else(|| RangeError::Malformed(input.to_string()))?;
            return Ok(Self::at_least(min));
        }

        let last = input.chars().next_back().unwrap_or_default();
        if input.len() < 2 || (last != ']' && last != ')') {
            return Err(RangeError::Malformed(input.to_string()));
        }
        let min_inclusive = first == '[';
        let max_inclusive = last == ']';
        let inner = &input[1..input.len() - 1];

        match inner.split_once(',') {
            None => {
                // `[1.0]` is the only legal single-bound bracket form.
                if !(min_inclusive && max_inclusive) {
                    return Err(RangeError::Malformed(input.to_string()));
                }
                let exact = bound(inner)?.ok_or_else(|| RangeError::Malformed(input.to_string()))?;
                Ok(Self::exact(exact))
            }
            Some((lo, hi)) => {
                if hi.contains(',') {
                    return Err(RangeError::Malformed(input.to_string()));
                }
                let min = bound(lo)?;
                let max = bound(hi)?;
                if let (Some(min), Some(max)) = (&min, &max) {
                    if min > max {
                        return Err(RangeError::Malformed(input.to_string()));
                    }
                }
                Ok(Self {
                    min_inclusive: min_inclusive && min.is_some(),
                    max_inclusive: max_inclusive && max.is_some(),
                    min,
                    max,
                })
            }
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.min, &self.max) {
            (None, None) => write!(f, "*"),
            (Some(min), None) if self.min_inclusive => write!(f, "{min}"),
            (Some(min), Some(max)) if min == max && self.min_inclusive && self.max_inclusive => {
                write!(f, "[{min}]")
            }
            (min, max) => {
                write!(f, "{}", if self.min_inclusive { '[' } else { '(' })?;
                if let Some(min) = min {
                    write!(f, "{min}")?;
                }
                write!(f, ", ")?;
                if let Some(max) = max {
                    write!(f, "{max}")?;
                }
                write!(f, "{}", if self.max_inclusive { ']' } else { ')' })
            }
        }
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
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

    fn r(s: &str) -> VersionRange {
        s.parse().unwrap()
    }

    #[test]
    fn test_bare_version_is_minimum() {
        let range = r("1.0");
        assert!(range.satisfies(&v("1.0.0")));
        assert!(range.satisfies(&v("7.0.0")));
        assert!(!range.satisfies(&v("0.9.0")));
        assert_eq!(range.min_version(), Some(&v("1.0.0")));
        assert!(range.is_min_inclusive());
    }

    #[test]
    fn test_half_open_interval() {
        let range = r("[1.0.0, 2.0.0)");
        assert!(range.satisfies(&v("1.0.0")));
        assert!(range.satisfies(&v("1.5.0")));
        assert!(!range.satisfies(&v("2.0.0")));
        assert_eq!(range.to_string(), "[1.0.0, 2.0.0)");
    }

    #[test]
    fn test_exact_and_open_bounds() {
        let exact = r("[1.2.3]");
        assert!(exact.satisfies(&v("1.2.3")));
        assert!(!exact.satisfies(&v("1.2.4")));
        assert_eq!(exact.to_string(), "[1.2.3]");

        let upper = r("(,2.0]");
        assert!(upper.min_version().is_none());
        assert!(upper.satisfies(&v("0.0.1")));
        assert!(upper.satisfies(&v("2.0")));

        let lower_exclusive = r("(1.0,)");
        assert!(!lower_exclusive.satisfies(&v("1.0")));
        assert!(lower_exclusive.satisfies(&v("1.0.1")));
        assert!(!lower_exclusive.is_min_inclusive());
    }

    #[test]
    fn test_any() {
        assert_eq!(r("*"), VersionRange::any());
        assert_eq!(r(""), VersionRange::any());
        assert!(VersionRange::any().satisfies(&v("0.0.1-alpha")));
    }

    #[test]
    fn test_malformed_ranges() {
        assert!("[1.0".parse::<VersionRange>().is_err());
        assert!("(1.0)".parse::<VersionRange>().is_err());
        assert!("[2.0, 1.0]".parse::<VersionRange>().is_err());
        assert!("[1.0, 2.0, 3.0]".parse::<VersionRange>().is_err());
        assert!("[a, b]".parse::<VersionRange>().is_err());
    }
}
