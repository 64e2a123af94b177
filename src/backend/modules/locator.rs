//! Module locators.
//!
//! A locator maps a normalized module id to a readable resource inside one
//! repository: a plain directory tree or a zip/jar archive (optionally
//! rooted at an internal prefix). Locators only probe; they never create,
//! modify or delete anything.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use zip::ZipArchive;

use super::error::ModuleError;
use super::path::{normalize_module_id, ModuleId};

/// Default file extension of module sources.
pub const DEFAULT_EXTENSION: &str = ".sx";

/// Try `id` as given, then `id` + `extension` when it lacks the extension.
///
/// Returns the first candidate name accepted by `probe`.
pub fn probe_with_extension<F>(id: &ModuleId, extension: &str, mut probe: F) -> Option<String>
where
    F: FnMut(&str) -> bool,
{
    if probe(id.as_str()) {
        return Some(id.as_str().to_string());
    }
    if extension.is_empty() || id.has_extension(extension) {
        return None;
    }
    let candidate = id.with_extension(extension);
    probe(&candidate).then_some(candidate)
}

/// A resolved, readable module source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resource {
    /// A regular file on disk.
    File(PathBuf),
    /// A file entry inside a zip/jar archive.
    ArchiveEntry { archive: PathBuf, entry: String },
}

impl Resource {
    /// URI form: `file:<path>` or `jar:file:<archive>!/<entry>`.
    pub fn uri(&self) -> String {
        match self {
            Resource::File(path) => format!("file:{}", path.display()),
            Resource::ArchiveEntry { archive, entry } => {
                format!("jar:file:{}!/{}", archive.display(), entry)
            }
        }
    }

    /// Read the full text of the resource.
    pub fn read_to_string(&self) -> io::Result<String> {
        match self {
            Resource::File(path) => std::fs::read_to_string(path),
            Resource::ArchiveEntry { archive, entry } => {
                let mut zip = ZipArchive::new(File::open(archive)?).map_err(io::Error::other)?;
                let mut file = zip.by_name(entry).map_err(io::Error::other)?;
                let mut text = String::new();
                file.read_to_string(&mut text)?;
                Ok(text)
            }
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// A repository reference handed to `add_repository`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RepositorySource {
    /// A directory on disk.
    Directory(PathBuf),
    /// An archive, searched below `prefix` (empty for the archive root).
    Archive { archive: PathBuf, prefix: String },
    /// A textual descriptor: `file:<dir>`, `jar:file:<archive>!/<prefix>`
    /// or a bare directory path.
    Descriptor(String),
}

impl RepositorySource {
    pub fn directory(root: impl Into<PathBuf>) -> Self {
        RepositorySource::Directory(root.into())
    }

    pub fn archive(archive: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        RepositorySource::Archive {
            archive: archive.into(),
            prefix: prefix.into(),
        }
    }

    pub fn descriptor(text: impl Into<String>) -> Self {
        RepositorySource::Descriptor(text.into())
    }
}

impl From<&str> for RepositorySource {
    fn from(text: &str) -> Self {
        RepositorySource::Descriptor(text.to_string())
    }
}

impl From<String> for RepositorySource {
    fn from(text: String) -> Self {
        RepositorySource::Descriptor(text)
    }
}

impl From<PathBuf> for RepositorySource {
    fn from(path: PathBuf) -> Self {
        RepositorySource::Directory(path)
    }
}

impl From<&Path> for RepositorySource {
    fn from(path: &Path) -> Self {
        RepositorySource::Directory(path.to_path_buf())
    }
}

/// One repository in the resolution chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Locator {
    Directory { root: PathBuf },
    Archive { archive: PathBuf, prefix: String },
}

impl Locator {
    pub fn directory(root: impl Into<PathBuf>) -> Self {
        Locator::Directory { root: root.into() }
    }

    /// An archive locator; the prefix is normalized like a module id.
    pub fn archive(archive: impl Into<PathBuf>, prefix: &str) -> Self {
        let prefix = normalize_module_id(prefix);
        Locator::Archive {
            archive: archive.into(),
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Build a locator from a repository reference.
    ///
    /// Fails with [`ModuleError::UnsupportedLocatorKind`] for descriptors
    /// that name neither a directory nor a local archive.
    pub fn from_source(source: RepositorySource) -> Result<Locator, ModuleError> {
        match source {
            RepositorySource::Directory(root) => Ok(Locator::directory(root)),
            RepositorySource::Archive { archive, prefix } => Ok(Locator::archive(archive, &prefix)),
            RepositorySource::Descriptor(text) => parse_descriptor(&text),
        }
    }

    /// Map `id` to a resource in this repository, if it holds one.
    pub fn lookup(&self, id: &ModuleId, extension: &str) -> Option<Resource> {
        self.locate(id, extension).map(|(_, resource)| resource)
    }

    /// Like [`Locator::lookup`], also returning the id that matched: `id`
    /// itself or its extension-qualified form.
    pub fn locate(&self, id: &ModuleId, extension: &str) -> Option<(ModuleId, Resource)> {
        let (found, resource) = match self {
            Locator::Directory { root } => {
                let found = probe_with_extension(id, extension, |name| {
                    let candidate = root.join(name);
                    trace!(path = %candidate.display(), "probing directory");
                    candidate.is_file()
                })?;
                let resource = Resource::File(root.join(&found));
                (found, resource)
            }
            Locator::Archive { archive, prefix } => {
                let mut zip = match File::open(archive)
                    .map_err(|e| e.to_string())
                    .and_then(|f| ZipArchive::new(f).map_err(|e| e.to_string()))
                {
                    Ok(zip) => zip,
                    Err(e) => {
                        debug!(archive = %archive.display(), error = %e, "cannot open archive");
                        return None;
                    }
                };
                let entry_name = |name: &str| {
                    if prefix.is_empty() {
                        name.to_string()
                    } else {
                        format!("{}/{}", prefix, name)
                    }
                };
                let found = probe_with_extension(id, extension, |name| {
                    let entry = entry_name(name);
                    trace!(archive = %archive.display(), entry = %entry, "probing archive");
                    // Directory entries never count as modules.
                    matches!(zip.by_name(&entry), Ok(file) if !file.is_dir())
                })?;
                let resource = Resource::ArchiveEntry {
                    archive: archive.clone(),
                    entry: entry_name(&found),
                };
                (found, resource)
            }
        };
        let matched = if found == id.as_str() {
            id.clone()
        } else {
            id.qualified(extension)
        };
        Some((matched, resource))
    }

    /// URI of the repository root.
    pub fn uri(&self) -> String {
        match self {
            Locator::Directory { root } => format!("file:{}", root.display()),
            Locator::Archive { archive, prefix } => {
                format!("jar:file:{}!/{}", archive.display(), prefix)
            }
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

fn unsupported(text: &str) -> ModuleError {
    ModuleError::UnsupportedLocatorKind {
        source: text.to_string(),
    }
}

/// Strip the authority marker of a `file:` URI path (`file:///x` -> `/x`).
fn file_uri_path(rest: &str) -> &str {
    rest.strip_prefix("//").unwrap_or(rest)
}

/// Split a leading URI scheme of two or more ASCII letters.
///
/// Single letters are left alone so `C:\modules` stays a path.
fn split_scheme(text: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = text.split_once(':')?;
    let is_scheme = scheme.len() >= 2 && scheme.chars().all(|c| c.is_ascii_alphabetic());
    is_scheme.then_some((scheme, rest))
}

fn parse_descriptor(text: &str) -> Result<Locator, ModuleError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(unsupported(text));
    }
    let Some((scheme, rest)) = split_scheme(trimmed) else {
        return Ok(Locator::directory(trimmed));
    };
    match scheme.to_ascii_lowercase().as_str() {
        "file" => {
            let path = file_uri_path(rest);
            if path.is_empty() {
                return Err(unsupported(text));
            }
            Ok(Locator::directory(path))
        }
        "jar" | "zip" => {
            let inner = match split_scheme(rest) {
                Some((inner, path)) if inner.eq_ignore_ascii_case("file") => path,
                _ => return Err(unsupported(text)),
            };
            let (archive, prefix) = inner.split_once('!').unwrap_or((inner, "/"));
            let archive = file_uri_path(archive);
            if archive.is_empty() {
                return Err(unsupported(text));
            }
            Ok(Locator::archive(archive, prefix))
        }
        _ => Err(unsupported(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn id(raw: &str) -> ModuleId {
        ModuleId::normalize(raw).unwrap()
    }

    fn write_archive(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, contents) in entries {
            if name.ends_with('/') {
                writer
                    .add_directory(*name, SimpleFileOptions::default())
                    .unwrap();
            } else {
                writer
                    .start_file(*name, SimpleFileOptions::default())
                    .unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_probe_with_extension() {
        let found = probe_with_extension(&id("foo"), ".sx", |n| n == "foo.sx");
        assert_eq!(found.as_deref(), Some("foo.sx"));
        let found = probe_with_extension(&id("foo"), ".sx", |n| n == "foo");
        assert_eq!(found.as_deref(), Some("foo"));

        let mut probed = Vec::new();
        let found = probe_with_extension(&id("foo.sx"), ".sx", |n| {
            probed.push(n.to_string());
            false
        });
        assert_eq!(found, None);
        assert_eq!(probed, vec!["foo.sx"]);
    }

    #[test]
    fn test_directory_lookup() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("foo")).unwrap();
        std::fs::write(dir.path().join("foo/bar.sx"), "(put exports \"x\" 1)").unwrap();
        std::fs::create_dir_all(dir.path().join("pkg.sx")).unwrap();

        let locator = Locator::directory(dir.path());
        let expected = Resource::File(dir.path().join("foo/bar.sx"));
        assert_eq!(locator.lookup(&id("foo/bar"), ".sx"), Some(expected.clone()));
        assert_eq!(locator.lookup(&id("foo/bar.sx"), ".sx"), Some(expected));
        let (matched, _) = locator.locate(&id("foo/bar"), ".sx").unwrap();
        assert_eq!(matched, id("foo/bar.sx"));
        assert_eq!(locator.lookup(&id("foo/baz"), ".sx"), None);
        // Directories are not modules.
        assert_eq!(locator.lookup(&id("foo"), ".sx"), None);
        assert_eq!(locator.lookup(&id("pkg"), ".sx"), None);
    }

    #[test]
    fn test_archive_lookup_with_prefix() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("mods.jar");
        write_archive(
            &jar,
            &[
                ("js/", ""),
                ("js/util.sx", "(put exports \"u\" 1)"),
                ("js/sub/", ""),
                ("top.sx", ""),
            ],
        );

        let locator = Locator::archive(&jar, "/js/");
        let hit = locator.lookup(&id("util"), ".sx").unwrap();
        assert_eq!(
            hit,
            Resource::ArchiveEntry {
                archive: jar.clone(),
                entry: "js/util.sx".to_string(),
            }
        );
        assert_eq!(hit.uri(), format!("jar:file:{}!/js/util.sx", jar.display()));
        assert_eq!(hit.read_to_string().unwrap(), "(put exports \"u\" 1)");

        assert_eq!(locator.lookup(&id("top"), ".sx"), None);
        assert_eq!(locator.lookup(&id("sub"), ".sx"), None);

        let root = Locator::archive(&jar, "");
        assert!(root.lookup(&id("top"), ".sx").is_some());
        assert!(root.lookup(&id("js/util.sx"), ".sx").is_some());
    }

    #[test]
    fn test_unreadable_archive_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join("broken.jar");
        std::fs::write(&bogus, "not a zip file").unwrap();
        assert_eq!(Locator::archive(&bogus, "").lookup(&id("x"), ".sx"), None);
        let missing = dir.path().join("missing.jar");
        assert_eq!(Locator::archive(missing, "").lookup(&id("x"), ".sx"), None);
    }

    #[test]
    fn test_descriptor_parsing() {
        assert_eq!(
            Locator::from_source("file:/opt/mods".into()).unwrap(),
            Locator::directory("/opt/mods")
        );
        assert_eq!(
            Locator::from_source("file:///opt/mods".into()).unwrap(),
            Locator::directory("/opt/mods")
        );
        assert_eq!(
            Locator::from_source("jar:file:/opt/m.jar!/js".into()).unwrap(),
            Locator::archive("/opt/m.jar", "js")
        );
        assert_eq!(
            Locator::from_source("jar:file:/opt/m.jar".into()).unwrap(),
            Locator::archive("/opt/m.jar", "")
        );
        assert_eq!(
            Locator::from_source("relative/dir".into()).unwrap(),
            Locator::directory("relative/dir")
        );
        assert_eq!(
            Locator::from_source("C:\\modules".into()).unwrap(),
            Locator::directory("C:\\modules")
        );
    }

    #[test]
    fn test_unsupported_descriptors() {
        for text in ["http://example.org/mods", "jar:http://x/m.jar!/js", "ftp:x", "  "] {
            let err = Locator::from_source(text.into()).unwrap_err();
            assert!(
                matches!(err, ModuleError::UnsupportedLocatorKind { .. }),
                "descriptor {:?} gave {:?}",
                text,
                err
            );
        }
    }

    #[test]
    fn test_locator_uris() {
        assert_eq!(Locator::directory("/m").uri(), "file:/m");
        assert_eq!(Locator::archive("/a.jar", "js/lib").uri(), "jar:file:/a.jar!/js/lib");
        assert_eq!(Locator::archive("/a.jar", "/").uri(), "jar:file:/a.jar!/");
    }
}
