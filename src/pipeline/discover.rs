// src/pipeline/discover.rs
//! Candidate file discovery

use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Files selected for conversion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Candidates in sorted order
    pub files: Vec<PathBuf>,
    /// Files with a matching extension that the skip-list excluded
    pub skipped: Vec<PathBuf>,
}

/// Selection rules for a walk
pub struct DiscoverOptions<'a> {
    pub extensions: &'a [String],
    pub skip: &'a [Regex],
    /// Never descend here (mirror output inside the source tree)
    pub exclude_root: Option<&'a Path>,
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| extensions.iter().any(|ext| name.ends_with(ext.as_str())))
}

/// Walk `source` and collect candidate files
///
/// Symlinks are followed; a file reachable through several links is listed
/// once. Unreadable entries are logged and skipped.
pub fn discover(source: &Path, options: &DiscoverOptions<'_>) -> Discovery {
    let excluded = options
        .exclude_root
        .and_then(|root| root.canonicalize().ok());

    let mut seen = HashSet::new();
    let mut discovery = Discovery::default();

    let walker = WalkDir::new(source)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| match &excluded {
            Some(root) if entry.file_type().is_dir() => entry
                .path()
                .canonicalize()
                .map(|p| p != *root)
                .unwrap_or(true),
            _ => true,
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_extension(entry.path(), options.extensions) {
            continue;
        }

        let path = entry.path().to_path_buf();
        let display = path.to_string_lossy();
        if options.skip.iter().any(|re| re.is_match(&display)) {
            debug!("Skipping {} (matches skip pattern)", path.display());
            discovery.skipped.push(path);
            continue;
        }

        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
        if seen.insert(canonical) {
            discovery.files.push(path);
        }
    }

    discovery.files.sort();
    discovery.skipped.sort();
    discovery
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<odoo/>").unwrap();
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b/views.xml");
        touch(dir.path(), "a/views.xml");
        touch(dir.path(), "a/views.xml.bak");
        touch(dir.path(), "a/model.py");
        touch(dir.path(), "tests/test_views.xml");

        let extensions = vec![".xml".to_string()];
        let skip = vec![Regex::new("/tests/").unwrap()];
        let found = discover(
            dir.path(),
            &DiscoverOptions {
                extensions: &extensions,
                skip: &skip,
                exclude_root: None,
            },
        );

        assert_eq!(
            found.files,
            vec![dir.path().join("a/views.xml"), dir.path().join("b/views.xml")]
        );
        assert_eq!(found.skipped, vec![dir.path().join("tests/test_views.xml")]);
    }

    #[test]
    fn test_discover_skips_output_root() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "views.xml");
        touch(dir.path(), "out/views.xml");

        let extensions = vec![".xml".to_string()];
        let out = dir.path().join("out");
        let found = discover(
            dir.path(),
            &DiscoverOptions {
                extensions: &extensions,
                skip: &[],
                exclude_root: Some(&out),
            },
        );
        assert_eq!(found.files, vec![dir.path().join("views.xml")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_dedups_symlinked_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "real/views.xml");
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        let extensions = vec![".xml".to_string()];
        let found = discover(
            dir.path(),
            &DiscoverOptions {
                extensions: &extensions,
                skip: &[],
                exclude_root: None,
            },
        );
        assert_eq!(found.files.len(), 1);
    }
}
