pub use unirepack_schema::{
    FrameworkFamily, MANIFEST_FILE_NAME, META_SUFFIX, ManifestAuthor, OverrideSettings, PackageId,
    PackageIdentity, PackageMetadata, PackageSpecificOverrides, PathMappingEntry, TargetFramework,
    TargetManifest, Version, VersionRange,
};
