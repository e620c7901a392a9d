//! Minimal `.nuspec` reader.
//!
//! Only the parts the pipeline needs are extracted: identity, descriptive
//! metadata and dependency groups. Everything else in the document is
//! skipped.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::{DependencyDemand, DependencyGroup};
use crate::types::{PackageIdentity, PackageMetadata, TargetFramework, Version, VersionRange};

#[derive(Debug, Clone)]
pub(crate) struct Nuspec {
    pub identity: PackageIdentity,
    pub metadata: PackageMetadata,
    pub dependency_groups: Vec<DependencyGroup>,
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, String> {
    for a in e.attributes() {
        let a = a.map_err(|e| e.to_string())?;
        if a.key.local_name().as_ref() == name {
            let value = a.unescape_value().map_err(|e| e.to_string())?;
            return Ok(Some(value.trim().to_string()));
        }
    }
    Ok(None)
}

/// Where a `<dependency>` element currently lands.
enum DepsState {
    Outside,
    Flat,
    Group(usize),
}

fn push_dependency(
    groups: &mut Vec<DependencyGroup>,
    state: &DepsState,
    e: &BytesStart<'_>,
) -> Result<(), String> {
    let idx = match state {
        DepsState::Outside => return Ok(()),
        DepsState::Group(idx) => *idx,
        DepsState::Flat => match groups.iter().position(|g| g.framework == TargetFramework::ANY) {
            Some(idx) => idx,
            None => {
                groups.push(DependencyGroup {
                    framework: TargetFramework::ANY,
                    dependencies: Vec::new(),
                });
                groups.len() - 1
            }
        },
    };
    let Some(id) = attr(e, b"id")? else {
        return Err("dependency without id".into());
    };
    let range = match attr(e, b"version")? {
        Some(text) => text
            .parse::<VersionRange>()
            .map_err(|err| format!("dependency {id}: {err}"))?,
        None => VersionRange::any(),
    };
    // Groups with an unknown framework are parked at usize::MAX.
    if let Some(group) = groups.get_mut(idx) {
        group.dependencies.push(DependencyDemand::new(id, range));
    }
    Ok(())
}

fn open_group(groups: &mut Vec<DependencyGroup>, e: &BytesStart<'_>) -> Result<DepsState, String> {
    let framework = match attr(e, b"targetFramework")? {
        None => TargetFramework::ANY,
        Some(text) => match text.parse::<TargetFramework>() {
            Ok(fw) => fw,
            Err(err) => {
                tracing::debug!("skipping dependency group: {err}");
                return Ok(DepsState::Group(usize::MAX));
            }
        },
    };
    groups.push(DependencyGroup {
        framework,
        dependencies: Vec::new(),
    });
    Ok(DepsState::Group(groups.len() - 1))
}

fn set_field(metadata: &mut PackageMetadata, field: &str, text: String) {
    let slot = match field {
        "title" => &mut metadata.title,
        "authors" => &mut metadata.authors,
        "owners" => &mut metadata.owners,
        "description" => &mut metadata.description,
        "summary" => &mut metadata.summary,
        "tags" => &mut metadata.tags,
        "license" => &mut metadata.license,
        "licenseUrl" => &mut metadata.license_url,
        "projectUrl" => &mut metadata.project_url,
        "readme" => &mut metadata.readme,
        "releaseNotes" => &mut metadata.release_notes,
        "copyright" => &mut metadata.copyright,
        "iconUrl" => &mut metadata.icon_url,
        _ => return,
    };
    let text = text.trim();
    if !text.is_empty() {
        *slot = Some(text.to_string());
    }
}

pub(crate) fn parse_nuspec(xml: &str) -> Result<Nuspec, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut id = None;
    let mut version = None;
    let mut metadata = PackageMetadata::default();
    let mut groups = Vec::new();
    let mut deps = DepsState::Outside;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {e}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "dependencies" if stack.len() == 2 => deps = DepsState::Flat,
                    "group" if !matches!(deps, DepsState::Outside) => {
                        deps = open_group(&mut groups, &e)?;
                    }
                    "dependency" => push_dependency(&mut groups, &deps, &e)?,
                    "repository" if stack.len() == 2 => {
                        metadata.repository_url = attr(&e, b"url")?;
                    }
                    _ => {}
                }
                stack.push(name);
            }
            Event::Empty(e) => match e.local_name().as_ref() {
                b"dependency" => push_dependency(&mut groups, &deps, &e)?,
                b"group" if !matches!(deps, DepsState::Outside) => {
                    open_group(&mut groups, &e)?;
                }
                b"repository" if stack.len() == 2 => {
                    metadata.repository_url = attr(&e, b"url")?;
                }
                _ => {}
            },
            Event::End(e) => {
                stack.pop();
                match e.local_name().as_ref() {
                    b"dependencies" if stack.len() == 2 => deps = DepsState::Outside,
                    b"group" if matches!(deps, DepsState::Group(_)) => deps = DepsState::Flat,
                    _ => {}
                }
            }
            Event::Text(t) if stack.len() == 3 && stack[1] == "metadata" => {
                let text = t.unescape().map_err(|e| e.to_string())?.into_owned();
                match stack[2].as_str() {
                    "id" => id = Some(text.trim().to_string()),
                    "version" => version = Some(text.trim().to_string()),
                    field => set_field(&mut metadata, field, text),
                }
            }
            Event::CData(c) if stack.len() == 3 && stack[1] == "metadata" => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                set_field(&mut metadata, &stack[2], text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let id = id.ok_or("missing <id>")?;
    let version = version
        .ok_or("missing <version>")?
        .parse::<Version>()
        .map_err(|e| format!("bad <version>: {e}"))?;
    Ok(Nuspec {
        identity: PackageIdentity::new(id, version),
        metadata,
        dependency_groups: groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUPED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd">
  <metadata>
    <id>Acme.Widgets</id>
    <version>1.2.0</version>
    <title>Acme Widgets</title>
    <authors>Acme &amp; Co</authors>
    <license type="expression">MIT</license>
    <projectUrl>https://acme.example/widgets</projectUrl>
    <repository type="git" url="https://github.com/acme/widgets" />
    <tags>widgets ui</tags>
    <releaseNotes><![CDATA[https://acme.example/changes]]></releaseNotes>
    <dependencies>
      <group targetFramework=".NETStandard2.0">
        <dependency id="Acme.Core" version="[1.0.0, 2.0.0)" exclude="Build" />
        <dependency id="Acme.Text" version="3.1" />
      </group>
      <group targetFramework=".NETFramework4.6.1" />
      <group targetFramework="Xamarin.iOS10">
        <dependency id="Acme.Mobile" version="1.0" />
      </group>
    </dependencies>
  </metadata>
</package>"#;

    #[test]
    fn test_grouped_dependencies() {
        let spec = parse_nuspec(GROUPED).unwrap();
        assert_eq!(spec.identity.to_string(), "Acme.Widgets@1.2.0");
        assert_eq!(spec.metadata.title.as_deref(), Some("Acme Widgets"));
        assert_eq!(spec.metadata.authors.as_deref(), Some("Acme & Co"));
        assert_eq!(spec.metadata.license.as_deref(), Some("MIT"));
        assert_eq!(
            spec.metadata.repository_url.as_deref(),
            Some("https://github.com/acme/widgets")
        );
        assert_eq!(
            spec.metadata.release_notes.as_deref(),
            Some("https://acme.example/changes")
        );

        assert_eq!(spec.dependency_groups.len(), 2);
        let ns20 = &spec.dependency_groups[0];
        assert_eq!(ns20.framework, "netstandard2.0".parse::<TargetFramework>().unwrap());
        assert_eq!(ns20.dependencies.len(), 2);
        assert_eq!(ns20.dependencies[0].id, "acme.core");
        assert_eq!(ns20.dependencies[0].range.to_string(), "[1.0.0, 2.0.0)");
        assert!(spec.dependency_groups[1].dependencies.is_empty());
    }

    #[test]
    fn test_flat_dependencies_form_any_group() {
        let xml = r#"<package><metadata>
            <id>Old.Style</id><version>0.9</version>
            <dependencies>
              <dependency id="Dep.One" version="1.0" />
              <dependency id="Dep.Two" />
            </dependencies>
        </metadata></package>"#;
        let spec = parse_nuspec(xml).unwrap();
        assert_eq!(spec.dependency_groups.len(), 1);
        assert_eq!(spec.dependency_groups[0].framework, TargetFramework::ANY);
        assert_eq!(spec.dependency_groups[0].dependencies[1].range, VersionRange::any());
    }

    #[test]
    fn test_missing_identity_is_error() {
        assert!(parse_nuspec("<package><metadata><id>X</id></metadata></package>").is_err());
        assert!(parse_nuspec("<package><metadata><version>1.0</version></metadata></package>").is_err());
    }
}
