//! Operation handlers: the mutating and reading surface of the library.
//!
//! Every handler follows the same order: authorise the caller, validate and
//! normalise inputs without touching disk, check for destination collisions,
//! then perform one filesystem action. Expected failures come back as
//! [`ErrorKind`] values; nothing here panics or returns raw I/O errors.
//!
//! Name collisions are never resolved silently. A handler that would create
//! something at an occupied path returns [`ErrorKind::Exists`] and leaves the
//! caller to pick another name.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::SnapshotCache;
use crate::config::LibraryConfig;
use crate::error::{CoreResult, ErrorKind};
use crate::model::{LibrarySnapshot, LoadedFile, OperationOk, OperationResult};
use crate::naming::{
    build_file_path, build_folder_path, is_document_name, normalize_file_name,
    normalize_folder_name,
};
use crate::path::{
    base_name, is_strict_descendant, join_relative, normalize_relative_path, parent_of,
    resolve_within_root,
};

/// Decides whether the current caller may use the library.
///
/// Authentication itself lives outside the core; handlers only ask this
/// question, and ask it before looking at any argument.
pub trait Authorizer {
    fn is_authorized(&self) -> bool;
}

impl<F: Fn() -> bool> Authorizer for F {
    fn is_authorized(&self) -> bool {
        self()
    }
}

/// Whether a transfer keeps the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Copy,
    Move,
}

impl TransferMode {
    fn verb(self) -> &'static str {
        match self {
            TransferMode::Copy => "copied",
            TransferMode::Move => "moved",
        }
    }
}

/// A document library rooted at one directory.
pub struct Library {
    root: PathBuf,
    cache: Arc<SnapshotCache>,
}

impl Library {
    /// Creates a library with its own snapshot cache.
    pub fn new(config: LibraryConfig) -> Self {
        Self::with_cache(config, Arc::new(SnapshotCache::new()))
    }

    /// Creates a library that shares `cache` with other owners.
    pub fn with_cache(config: LibraryConfig, cache: Arc<SnapshotCache>) -> Self {
        Self {
            root: config.root,
            cache,
        }
    }

    /// The configured root, as given.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Returns a consistent snapshot of the library.
    ///
    /// # Errors
    ///
    /// See [`SnapshotCache::snapshot`].
    pub async fn snapshot(&self) -> CoreResult<Arc<LibrarySnapshot>> {
        self.cache.snapshot(&self.root).await
    }

    /// Creates an empty folder named `name` under `parent_path`.
    pub fn create_folder(
        &self,
        auth: &dyn Authorizer,
        parent_path: &str,
        name: &str,
    ) -> OperationResult {
        authorize(auth)?;
        let relative = build_folder_path(parent_path, name)?;
        let target = self.resolve(&relative)?;
        ensure_absent(&target)?;

        std::fs::create_dir(&target).map_err(|e| write_error("create folder", &relative, e))?;

        let name = base_name(&relative).to_string();
        Ok(self.committed("created folder", OperationOk::new(relative, name)))
    }

    /// Creates an empty document named `name` under `parent_path`.
    pub fn create_file(
        &self,
        auth: &dyn Authorizer,
        parent_path: &str,
        name: &str,
    ) -> OperationResult {
        authorize(auth)?;
        let relative = build_file_path(parent_path, name)?;
        let target = self.resolve_document(&relative)?;

        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map_err(|e| write_error("create file", &relative, e))?;

        let ok = OperationOk::new(relative.as_str(), base_name(&relative))
            .with_metadata(metadata(&target).as_ref());
        Ok(self.committed("created file", ok))
    }

    /// Renames the folder at `path` within its parent.
    pub fn rename_folder(
        &self,
        auth: &dyn Authorizer,
        path: &str,
        new_name: &str,
    ) -> OperationResult {
        authorize(auth)?;
        let source = folder_path(path)?;
        let folder = normalize_folder_name(new_name)?;
        let destination = join_relative(parent_of(&source), &folder);

        let from = self.resolve(&source)?;
        let to = self.resolve(&destination)?;
        require_dir(&from)?;
        ensure_absent(&to)?;

        std::fs::rename(&from, &to).map_err(|e| write_error("rename folder", &source, e))?;

        Ok(self.committed("renamed folder", OperationOk::new(destination, folder)))
    }

    /// Renames the document at `path` within its parent.
    pub fn rename_file(&self, auth: &dyn Authorizer, path: &str, new_name: &str) -> OperationResult {
        authorize(auth)?;
        let source = document_path(path)?;
        let file = normalize_file_name(new_name)?;
        let destination = join_relative(parent_of(&source), &file);

        let from = self.resolve(&source)?;
        let to = self.resolve(&destination)?;
        require_file(&from)?;
        ensure_absent(&to)?;

        std::fs::rename(&from, &to).map_err(|e| write_error("rename file", &source, e))?;

        let ok = OperationOk::new(destination, file).with_metadata(metadata(&to).as_ref());
        Ok(self.committed("renamed file", ok))
    }

    /// Recursively deletes the folder at `path`. The root cannot be deleted.
    pub fn delete_folder(&self, auth: &dyn Authorizer, path: &str) -> OperationResult {
        authorize(auth)?;
        let source = folder_path(path)?;
        let target = self.resolve(&source)?;
        if std::fs::symlink_metadata(&target).is_ok_and(|m| !m.is_dir()) {
            return Err(ErrorKind::InvalidPath);
        }

        std::fs::remove_dir_all(&target).map_err(|e| write_error("delete folder", &source, e))?;

        let name = base_name(&source).to_string();
        Ok(self.committed("deleted folder", OperationOk::new(source, name)))
    }

    /// Deletes the document at `path`.
    pub fn delete_file(&self, auth: &dyn Authorizer, path: &str) -> OperationResult {
        authorize(auth)?;
        let source = document_path(path)?;
        let target = self.resolve(&source)?;

        std::fs::remove_file(&target).map_err(|e| write_error("delete file", &source, e))?;

        let name = base_name(&source).to_string();
        Ok(self.committed("deleted file", OperationOk::new(source, name)))
    }

    /// Copies the folder at `source_path` to `name` under `dest_parent_path`.
    ///
    /// The copy is not atomic: if it fails part-way, the partial destination
    /// is left in place and `write-failed` is returned.
    pub fn copy_folder(
        &self,
        auth: &dyn Authorizer,
        source_path: &str,
        dest_parent_path: &str,
        name: &str,
    ) -> OperationResult {
        self.transfer_folder(auth, TransferMode::Copy, source_path, dest_parent_path, name)
    }

    /// Moves the folder at `source_path` to `name` under `dest_parent_path`
    /// with a single rename.
    pub fn move_folder(
        &self,
        auth: &dyn Authorizer,
        source_path: &str,
        dest_parent_path: &str,
        name: &str,
    ) -> OperationResult {
        self.transfer_folder(auth, TransferMode::Move, source_path, dest_parent_path, name)
    }

    /// Copies the document at `source_path` to `name` under `dest_parent_path`.
    pub fn copy_file(
        &self,
        auth: &dyn Authorizer,
        source_path: &str,
        dest_parent_path: &str,
        name: &str,
    ) -> OperationResult {
        self.transfer_file(auth, TransferMode::Copy, source_path, dest_parent_path, name)
    }

    /// Moves the document at `source_path` to `name` under `dest_parent_path`.
    pub fn move_file(
        &self,
        auth: &dyn Authorizer,
        source_path: &str,
        dest_parent_path: &str,
        name: &str,
    ) -> OperationResult {
        self.transfer_file(auth, TransferMode::Move, source_path, dest_parent_path, name)
    }

    /// Reads a document as UTF-8 text.
    pub fn load_file_content(&self, auth: &dyn Authorizer, path: &str) -> OperationResult<LoadedFile> {
        authorize(auth)?;
        let source = document_path(path)?;
        let target = self.resolve_document(&source)?;

        let content = std::fs::read_to_string(&target).map_err(|e| {
            tracing::debug!("read of {source} failed: {e}");
            ErrorKind::ReadFailed
        })?;

        let name = base_name(&source).to_string();
        Ok(LoadedFile {
            meta: OperationOk::new(source, name).with_metadata(metadata(&target).as_ref()),
            content,
        })
    }

    /// Replaces a document's content, creating the document if needed.
    pub fn save_file_content(
        &self,
        auth: &dyn Authorizer,
        path: &str,
        content: &str,
    ) -> OperationResult {
        authorize(auth)?;
        let source = document_path(path)?;
        let target = self.resolve_document(&source)?;

        std::fs::write(&target, content).map_err(|e| write_error("save file", &source, e))?;

        let name = base_name(&source).to_string();
        let ok = OperationOk::new(source, name).with_metadata(metadata(&target).as_ref());
        Ok(self.committed("saved file", ok))
    }

    fn transfer_folder(
        &self,
        auth: &dyn Authorizer,
        mode: TransferMode,
        source_path: &str,
        dest_parent_path: &str,
        name: &str,
    ) -> OperationResult {
        authorize(auth)?;
        let source = folder_path(source_path)?;
        let destination = build_folder_path(dest_parent_path, name)?;
        if destination == source {
            return Err(ErrorKind::Exists);
        }
        if is_strict_descendant(&destination, &source) {
            return Err(ErrorKind::InvalidPath);
        }

        let from = self.resolve(&source)?;
        let to = self.resolve(&destination)?;
        require_dir(&from)?;
        ensure_absent(&to)?;

        let outcome = match mode {
            TransferMode::Copy => copy_dir_recursive(&from, &to, 0),
            TransferMode::Move => std::fs::rename(&from, &to),
        };
        outcome.map_err(|e| {
            if mode == TransferMode::Copy && to.exists() {
                tracing::warn!("folder copy {source} -> {destination} left partial output");
            }
            write_error("transfer folder", &source, e)
        })?;

        let name = base_name(&destination).to_string();
        Ok(self.committed(mode.verb(), OperationOk::new(destination, name)))
    }

    fn transfer_file(
        &self,
        auth: &dyn Authorizer,
        mode: TransferMode,
        source_path: &str,
        dest_parent_path: &str,
        name: &str,
    ) -> OperationResult {
        authorize(auth)?;
        let source = document_path(source_path)?;
        let destination = build_file_path(dest_parent_path, name)?;
        if destination == source {
            return Err(ErrorKind::Exists);
        }

        let from = self.resolve(&source)?;
        let to = self.resolve(&destination)?;
        require_file(&from)?;
        ensure_absent(&to)?;

        let outcome = match mode {
            TransferMode::Copy => copy_document(&from, &to),
            TransferMode::Move => std::fs::rename(&from, &to),
        };
        outcome.map_err(|e| write_error("transfer file", &source, e))?;

        let name = base_name(&destination).to_string();
        let ok = OperationOk::new(destination, name).with_metadata(metadata(&to).as_ref());
        Ok(self.committed(mode.verb(), ok))
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, ErrorKind> {
        resolve_within_root(&self.root, relative)
    }

    /// Resolves a document that will be opened for reading or writing.
    ///
    /// Opening follows links, so a link at the document's own path could
    /// read or overwrite a file outside the root.
    fn resolve_document(&self, relative: &str) -> Result<PathBuf, ErrorKind> {
        let target = self.resolve(relative)?;
        match std::fs::symlink_metadata(&target) {
            Ok(meta) if meta.file_type().is_symlink() => {
                tracing::warn!("refused to open linked document {relative}");
                Err(ErrorKind::InvalidPath)
            }
            _ => Ok(target),
        }
    }

    fn committed(&self, action: &str, ok: OperationOk) -> OperationOk {
        self.cache.invalidate();
        tracing::info!("{action} {}", ok.path);
        ok
    }
}

fn authorize(auth: &dyn Authorizer) -> Result<(), ErrorKind> {
    if auth.is_authorized() {
        Ok(())
    } else {
        Err(ErrorKind::Unauthorized)
    }
}

/// Normalises a path that must name a folder other than the root.
fn folder_path(input: &str) -> Result<String, ErrorKind> {
    let path = normalize_relative_path(input)?;
    if path.is_empty() {
        return Err(ErrorKind::InvalidPath);
    }
    Ok(path)
}

/// Normalises a path that must name a document.
fn document_path(input: &str) -> Result<String, ErrorKind> {
    let path = normalize_relative_path(input)?;
    if !is_document_name(base_name(&path)) {
        return Err(ErrorKind::InvalidPath);
    }
    Ok(path)
}

fn ensure_absent(target: &Path) -> Result<(), ErrorKind> {
    match std::fs::symlink_metadata(target) {
        Ok(_) => Err(ErrorKind::Exists),
        Err(_) => Ok(()),
    }
}

fn require_dir(target: &Path) -> Result<(), ErrorKind> {
    match std::fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => Ok(()),
        _ => Err(ErrorKind::InvalidPath),
    }
}

fn require_file(target: &Path) -> Result<(), ErrorKind> {
    match std::fs::symlink_metadata(target) {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(ErrorKind::InvalidPath),
    }
}

fn metadata(target: &Path) -> Option<std::fs::Metadata> {
    std::fs::metadata(target).ok()
}

fn write_error(action: &str, relative: &str, err: io::Error) -> ErrorKind {
    if err.kind() == io::ErrorKind::AlreadyExists {
        return ErrorKind::Exists;
    }
    tracing::warn!("{action} failed for {relative}: {err}");
    ErrorKind::WriteFailed
}

/// Copies one document without ever overwriting an existing destination.
fn copy_document(src: &Path, dest: &Path) -> io::Result<()> {
    let mut reader = std::fs::File::open(src)?;
    let mut writer = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)?;
    io::copy(&mut reader, &mut writer)?;
    Ok(())
}

/// Maximum folder depth followed by [`copy_dir_recursive`].
const MAX_COPY_DEPTH: usize = 64;

/// Copies a folder tree. Symbolic links are skipped, like in scans.
fn copy_dir_recursive(src: &Path, dest: &Path, depth: usize) -> io::Result<()> {
    if depth > MAX_COPY_DEPTH {
        return Err(io::Error::other(format!(
            "maximum folder depth ({MAX_COPY_DEPTH}) exceeded during copy"
        )));
    }

    std::fs::create_dir(dest)?;

    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        // file_type() does not follow symlinks
        let file_type = entry.file_type()?;

        if file_type.is_symlink() {
            continue;
        } else if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &target, depth + 1)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}
