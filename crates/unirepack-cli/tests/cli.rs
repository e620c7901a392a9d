//! Integration tests for the `unirepack` command-line binary.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};

use zip::write::SimpleFileOptions;

fn write_nupkg(feed: &Path, id: &str, version: &str, deps: &str, files: &[(&str, &[u8])]) {
    let nuspec = format!(
        r#"<?xml version="1.0"?>
<package><metadata>
  <id>{id}</id><version>{version}</version><authors>Acme Corp</authors>
  <dependencies><group targetFramework="netstandard2.0">{deps}</group></dependencies>
</metadata></package>"#
    );
    let path = feed.join(format!("{}.{version}.nupkg", id.to_lowercase()));
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    let opts = SimpleFileOptions::default();
    zip.start_file(format!("{id}.nuspec"), opts).unwrap();
    zip.write_all(nuspec.as_bytes()).unwrap();
    for (name, bytes) in files {
        zip.start_file(*name, opts).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let feed = dir.path().join("feed");
    std::fs::create_dir_all(&feed).unwrap();
    write_nupkg(
        &feed,
        "Acme.Widgets",
        "1.0.0",
        r#"<dependency id="Acme.Core" version="1.0.0" />"#,
        &[("lib/netstandard2.0/Acme.Widgets.dll", b"MZ")],
    );
    write_nupkg(&feed, "Acme.Core", "1.0.0", "", &[("lib/netstandard2.0/Acme.Core.dll", b"MZ")]);
    std::fs::write(
        dir.path().join("repackager.toml"),
        "unity = \"2022.3\"\n\n[[sources]]\nname = \"local\"\npath = \"feed\"\n",
    )
    .unwrap();
    dir
}

fn unirepack(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_unirepack"))
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn test_converts_closure() {
    let dir = workspace();
    let out = unirepack(dir.path(), &["Acme.Widgets@1.0.0", "-o", "dist"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    assert!(stdout.contains("acme.widgets@1.0.0 => acme.core@1.0.0"), "{stdout}");
    assert!(stdout.contains("Converted 2 packages"), "{stdout}");
    assert!(dir.path().join("dist/acme.widgets-1.0.0.tgz").exists());
    assert!(dir.path().join("dist/acme.core-1.0.0.tgz").exists());
}

#[test]
fn test_unknown_package_fails() {
    let dir = workspace();
    let out = unirepack(dir.path(), &["Acme.Gadgets@1.0.0"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Acme.Gadgets"));
    assert!(!dir.path().join("output").exists());
}

#[test]
fn test_malformed_overrides_fail_before_output() {
    let dir = workspace();
    std::fs::write(dir.path().join("overrides.toml"), "[name_prefix_mapping\n").unwrap();
    let out = unirepack(dir.path(), &["Acme.Widgets@1.0.0"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("configuration error"));
    assert!(!dir.path().join("output").exists());
}

#[test]
fn test_missing_version_is_usage_error() {
    let dir = workspace();
    let out = unirepack(dir.path(), &["Acme.Widgets"]);
    assert_eq!(out.status.code(), Some(2));
}
