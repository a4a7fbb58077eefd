//! File management inside a workspace root: upload, listing, deletion and
//! inspection with path containment checks.

use std::fs;
use std::io;
use std::path::{
    Component,
    Path,
    PathBuf,
};

use chrono::{
    DateTime,
    Local,
};
use log::{
    info,
    warn,
};
use serde::Serialize;
use thiserror::Error;

use crate::data::{
    Category,
    DataManager,
    FileType,
};

/// Largest file accepted by [`upload`].
pub const MAX_UPLOAD_SIZE: u64 = 500 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Access denied: {0} is outside the workspace")]
    AccessDenied(String),
    #[error("File too large: {size} bytes (maximum {max} bytes)")]
    TooLarge { size: u64, max: u64 },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    pub name:     String,
    pub path:     PathBuf,
    pub size:     u64,
    pub modified: DateTime<Local>,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub name:      String,
    pub path:      PathBuf,
    pub size:      u64,
    pub created:   Option<DateTime<Local>>,
    pub modified:  DateTime<Local>,
    pub file_type: Option<FileType>,
    pub is_dir:    bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadOutcome {
    pub path:        PathBuf,
    pub size:        u64,
    pub file_type:   Option<FileType>,
    pub data_loaded: bool,
}

/// Resolves `rel` against `root`, refusing anything that ends up outside
/// the root once symlinks and `..` are resolved.
pub fn resolve_within<P: AsRef<Path>>(
    root: &Path,
    rel: P,
) -> Result<PathBuf> {
    let rel = rel.as_ref();
    let display = rel.display().to_string();

    // Reject lexical escapes first so a missing target cannot mask them.
    let mut depth: i64 = 0;
    for component in rel.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::ParentDir => depth -= 1,
            Component::CurDir => {},
            Component::RootDir | Component::Prefix(_) => {
                if !rel.starts_with(root) {
                    return Err(WorkspaceError::AccessDenied(display));
                }
            },
        }
        if depth < 0 {
            return Err(WorkspaceError::AccessDenied(display));
        }
    }

    let root = root
        .canonicalize()
        .map_err(|_| WorkspaceError::NotFound(root.display().to_string()))?;
    let candidate = if rel.is_absolute() { rel.to_path_buf() } else { root.join(rel) };
    let resolved = candidate
        .canonicalize()
        .map_err(|_| WorkspaceError::NotFound(display.clone()))?;

    if !resolved.starts_with(&root) {
        return Err(WorkspaceError::AccessDenied(display));
    }
    Ok(resolved)
}

fn modified_time(meta: &fs::Metadata) -> DateTime<Local> {
    meta.modified().map(DateTime::from).unwrap_or_else(|_| Local::now())
}

/// Copying a file onto itself truncates it before it is read.
fn is_same_file(
    a: &Path,
    b: &Path,
) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Copies `src` into the workspace `data/` directory. Tabular files are
/// loaded into the data manager as well; a failed load keeps the copy.
pub fn upload(
    dm: &mut DataManager,
    src: &Path,
) -> Result<UploadOutcome> {
    let meta = fs::metadata(src)
        .map_err(|_| WorkspaceError::NotFound(src.display().to_string()))?;
    if !meta.is_file() {
        return Err(WorkspaceError::NotFound(src.display().to_string()));
    }
    if meta.len() > MAX_UPLOAD_SIZE {
        return Err(WorkspaceError::TooLarge {
            size: meta.len(),
            max:  MAX_UPLOAD_SIZE,
        });
    }

    let name = src
        .file_name()
        .ok_or_else(|| WorkspaceError::NotFound(src.display().to_string()))?;
    let file_type = FileType::detect(src);
    if file_type.is_none() {
        warn!("Unknown file type for {}, copying anyway", src.display());
    }

    let dest = dm.data_dir().join(name);
    if is_same_file(src, &dest) {
        info!("{} is already in the workspace", dest.display());
    }
    else {
        fs::copy(src, &dest)?;
        info!("Uploaded {} to {}", src.display(), dest.display());
    }

    let data_loaded = match file_type {
        Some(t) if t.is_loadable() => {
            match dm.load_file(&dest) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Uploaded file could not be loaded: {}", e);
                    false
                },
            }
        },
        _ => false,
    };

    Ok(UploadOutcome {
        path: dest,
        size: meta.len(),
        file_type,
        data_loaded,
    })
}

/// Files of one category, or of every category, sorted by name.
pub fn list(
    dm: &DataManager,
    category: Option<Category>,
) -> Result<Vec<FileEntry>> {
    let categories = match category {
        Some(c) => vec![c],
        None => Category::ALL.to_vec(),
    };

    let mut entries = Vec::new();
    for category in categories {
        let dir = dm.dir(category);
        if !dir.exists() {
            continue;
        }
        let mut found = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            found.push(FileEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                path: entry.path(),
                size: meta.len(),
                modified: modified_time(&meta),
                category,
            });
        }
        found.sort_by(|a, b| a.name.cmp(&b.name));
        entries.extend(found);
    }
    Ok(entries)
}

/// Deletes a file, or a directory with its contents.
pub fn delete<P: AsRef<Path>>(
    root: &Path,
    rel: P,
) -> Result<PathBuf> {
    let path = resolve_within(root, rel)?;
    if path == root.canonicalize()? {
        return Err(WorkspaceError::AccessDenied(path.display().to_string()));
    }
    if path.is_dir() {
        fs::remove_dir_all(&path)?;
    }
    else {
        fs::remove_file(&path)?;
    }
    info!("Deleted {}", path.display());
    Ok(path)
}

pub fn info<P: AsRef<Path>>(
    root: &Path,
    rel: P,
) -> Result<FileInfo> {
    let path = resolve_within(root, rel)?;
    let meta = fs::metadata(&path)?;
    Ok(FileInfo {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        size: meta.len(),
        created: meta.created().ok().map(DateTime::from),
        modified: modified_time(&meta),
        file_type: FileType::detect(&path),
        is_dir: meta.is_dir(),
        path,
    })
}

#[cfg(test)]
mod tests;
