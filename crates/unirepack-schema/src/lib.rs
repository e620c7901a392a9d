//! Shared types for unirepack.
//!
//! Everything in this crate is pure data: package identities, NuGet-style
//! versions and ranges, target frameworks, package metadata, the Unity
//! `package.json` manifest and the override settings document. Nothing here
//! touches the network or the filesystem.

pub mod framework;
pub mod identity;
pub mod manifest;
pub mod metadata;
pub mod overrides;
pub mod range;
pub mod version;

// Re-exports
pub use framework::{FrameworkError, FrameworkFamily, TargetFramework};
pub use identity::{IdentityError, PackageId, PackageIdentity};
pub use manifest::{ManifestAuthor, TargetManifest};
pub use metadata::PackageMetadata;
pub use overrides::{OverrideSettings, PackageSpecificOverrides, PathMappingEntry};
pub use range::{RangeError, VersionRange};
pub use version::{Version, VersionError};

/// Name of the manifest entry every converted package starts with.
pub const MANIFEST_FILE_NAME: &str = "package.json";

/// Suffix of the companion metadata entries required by the target format.
pub const META_SUFFIX: &str = ".meta";
