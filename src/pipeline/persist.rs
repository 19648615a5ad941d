// src/pipeline/persist.rs
//! Writing converted files

use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Where and how converted files are written
#[derive(Debug, Clone)]
pub struct PersistPlan {
    pub source_root: PathBuf,
    /// Mirror root; `None` rewrites files in place
    pub output_root: Option<PathBuf>,
    pub backup: bool,
    pub dry_run: bool,
}

impl PersistPlan {
    /// Destination of a converted file
    pub fn destination(&self, path: &Path) -> PathBuf {
        match &self.output_root {
            Some(root) => {
                let relative = path.strip_prefix(&self.source_root).unwrap_or(path);
                let relative = relative.strip_prefix("/").unwrap_or(relative);
                root.join(relative)
            }
            None => path.to_path_buf(),
        }
    }

    /// Backups are only made when the original is about to be overwritten
    pub fn makes_backup(&self) -> bool {
        self.backup && !self.dry_run && self.output_root.is_none()
    }
}

/// Path of the backup copy for `path`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// Save the original bytes next to the file
pub fn backup(path: &Path) -> Result<PathBuf> {
    let target = backup_path(path);
    fs::copy(path, &target).map_err(|source| Error::Backup {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(target)
}

/// Replace `dest` with `content` through a temp file in the same directory
pub fn write_atomic(dest: &Path, content: &str) -> Result<()> {
    let write_err = |source: std::io::Error| Error::Write {
        path: dest.to_path_buf(),
        source,
    };

    let dir = dest.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    fs::create_dir_all(dir).map_err(write_err)?;

    let mut temp = NamedTempFile::new_in(dir).map_err(write_err)?;
    temp.write_all(content.as_bytes()).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;
    if let Ok(metadata) = fs::metadata(dest) {
        temp.as_file()
            .set_permissions(metadata.permissions())
            .map_err(write_err)?;
    }
    temp.persist(dest).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Store a converted file according to the plan
///
/// Returns the path written, or `None` in dry-run mode. The backup is
/// always taken before the original is replaced.
pub fn persist(plan: &PersistPlan, path: &Path, content: &str) -> Result<Option<PathBuf>> {
    if plan.dry_run {
        return Ok(None);
    }
    if plan.makes_backup() {
        let saved = backup(path)?;
        debug!("Backed up {} to {}", path.display(), saved.display());
    }
    let dest = plan.destination(path);
    write_atomic(&dest, content)?;
    Ok(Some(dest))
}
