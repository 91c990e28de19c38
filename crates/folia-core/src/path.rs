//! Path resolution and containment.
//!
//! Library paths travel as posix-style strings relative to the library root
//! (`""` is the root itself). Everything entering the core from a caller goes
//! through [`normalize_relative_path`] or [`normalize_segment`] before it is
//! joined onto the root with [`resolve_within_root`].

use std::path::{Component, Path, PathBuf};

use crate::error::ErrorKind;

/// Normalises a caller-supplied relative path.
///
/// Backslashes become forward slashes and leading slashes are stripped. An
/// empty result names the root. Any segment that is blank, `.` or `..`, or
/// that contains a NUL byte, rejects the whole path.
///
/// # Errors
///
/// [`ErrorKind::InvalidPath`] when any segment is rejected.
pub fn normalize_relative_path(input: &str) -> Result<String, ErrorKind> {
    let cleaned = input.trim().replace('\\', "/");
    let cleaned = cleaned.trim_start_matches('/');
    if cleaned.is_empty() {
        return Ok(String::new());
    }

    for segment in cleaned.split('/') {
        if segment.trim().is_empty() || segment == "." || segment == ".." || segment.contains('\0')
        {
            return Err(ErrorKind::InvalidPath);
        }
    }

    Ok(cleaned.to_string())
}

/// Validates a single path segment such as a folder or file name.
///
/// The input is trimmed; the result must be non-empty, must not be `.` or
/// `..`, and must not contain `/`, `\` or NUL.
///
/// # Errors
///
/// [`ErrorKind::InvalidName`] when the segment is rejected.
pub fn normalize_segment(input: &str) -> Result<String, ErrorKind> {
    let cleaned = input.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return Err(ErrorKind::InvalidName);
    }
    if cleaned.contains('/') || cleaned.contains('\\') || cleaned.contains('\0') {
        return Err(ErrorKind::InvalidName);
    }
    Ok(cleaned.to_string())
}

/// Joins two posix-style relative paths, treating `""` as the root.
pub fn join_relative(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}/{child}")
    }
}

/// Returns the parent of a relative path (`""` for top-level entries).
pub fn parent_of(relative: &str) -> &str {
    relative.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// Returns the final segment of a relative path.
pub fn base_name(relative: &str) -> &str {
    relative.rsplit_once('/').map(|(_, name)| name).unwrap_or(relative)
}

/// Returns `true` if `candidate` lies strictly inside the folder `ancestor`.
pub fn is_strict_descendant(candidate: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return !candidate.is_empty();
    }
    candidate.len() > ancestor.len()
        && candidate.starts_with(ancestor)
        && candidate.as_bytes()[ancestor.len()] == b'/'
}

/// Resolves the library root to an absolute path.
///
/// The canonical form is used when the root exists so that symlinked roots
/// compare correctly; otherwise the lexically absolute form is returned.
pub fn resolve_root(root: &Path) -> PathBuf {
    if let Ok(canonical) = root.canonicalize() {
        return canonical;
    }
    let absolute = if root.is_absolute() {
        root.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(root))
            .unwrap_or_else(|_| root.to_path_buf())
    };
    lexical_normalize(&absolute)
}

/// Joins `relative` onto `root` and verifies the result stays inside it.
///
/// The relative path is normalised first, so any `..` segment is rejected
/// outright. The joined path must equal the resolved root or sit below it.
/// When part of the target already exists, its deepest existing ancestor is
/// canonicalised and checked too, which catches symlinked folders pointing
/// outside the root.
///
/// # Errors
///
/// [`ErrorKind::InvalidPath`] when normalisation or containment fails.
pub fn resolve_within_root(root: &Path, relative: &str) -> Result<PathBuf, ErrorKind> {
    let relative = normalize_relative_path(relative)?;
    let root = resolve_root(root);

    let mut target = root.clone();
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        target.push(segment);
    }
    let target = lexical_normalize(&target);

    if !is_contained(&root, &target) {
        return Err(ErrorKind::InvalidPath);
    }

    if let Some(existing) = deepest_existing_ancestor(&root, &target) {
        if let Ok(real) = existing.canonicalize() {
            if !is_contained(&root, &real) {
                tracing::warn!(
                    "rejected path escaping library root via link: {}",
                    target.display()
                );
                return Err(ErrorKind::InvalidPath);
            }
        }
    }

    Ok(target)
}

fn is_contained(root: &Path, target: &Path) -> bool {
    target == root || target.starts_with(root)
}

/// Walks up from `target` to the first ancestor that exists on disk.
///
/// The final component itself is skipped so that a symlink sitting exactly
/// at the target (for example the file being deleted) is judged by its
/// parent folder rather than by where it points.
fn deepest_existing_ancestor<'a>(root: &Path, target: &'a Path) -> Option<&'a Path> {
    let mut current = target.parent();
    while let Some(dir) = current {
        if !dir.starts_with(root) {
            return None;
        }
        if std::fs::symlink_metadata(dir).is_ok() {
            return Some(dir);
        }
        current = dir.parent();
    }
    None
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn normalize_converts_backslashes_and_strips_leading_slashes() {
        assert_eq!(
            normalize_relative_path("\\notes\\daily\\today.md").unwrap(),
            "notes/daily/today.md"
        );
        assert_eq!(normalize_relative_path("///notes/a.md").unwrap(), "notes/a.md");
    }

    #[test]
    fn normalize_empty_is_root() {
        assert_eq!(normalize_relative_path("").unwrap(), "");
        assert_eq!(normalize_relative_path("  /  ").unwrap(), "");
    }

    #[test]
    fn normalize_rejects_dot_segments() {
        assert_eq!(normalize_relative_path("notes/../etc"), Err(ErrorKind::InvalidPath));
        assert_eq!(normalize_relative_path(".."), Err(ErrorKind::InvalidPath));
        assert_eq!(normalize_relative_path("./notes"), Err(ErrorKind::InvalidPath));
        assert_eq!(normalize_relative_path("a\\..\\b"), Err(ErrorKind::InvalidPath));
    }

    #[test]
    fn normalize_rejects_empty_inner_segments() {
        assert_eq!(normalize_relative_path("notes//a.md"), Err(ErrorKind::InvalidPath));
        assert_eq!(normalize_relative_path("notes/ /a.md"), Err(ErrorKind::InvalidPath));
        assert_eq!(normalize_relative_path("notes/"), Err(ErrorKind::InvalidPath));
    }

    #[test]
    fn segment_trims_and_validates() {
        assert_eq!(normalize_segment("  Ideas ").unwrap(), "Ideas");
        assert_eq!(normalize_segment(""), Err(ErrorKind::InvalidName));
        assert_eq!(normalize_segment("   "), Err(ErrorKind::InvalidName));
        assert_eq!(normalize_segment("a/b"), Err(ErrorKind::InvalidName));
        assert_eq!(normalize_segment("a\\b"), Err(ErrorKind::InvalidName));
        assert_eq!(normalize_segment(".."), Err(ErrorKind::InvalidName));
        assert_eq!(normalize_segment("."), Err(ErrorKind::InvalidName));
    }

    #[test]
    fn relative_helpers() {
        assert_eq!(join_relative("", "notes"), "notes");
        assert_eq!(join_relative("notes", "a.md"), "notes/a.md");
        assert_eq!(parent_of("notes/sub/a.md"), "notes/sub");
        assert_eq!(parent_of("notes"), "");
        assert_eq!(base_name("notes/sub/a.md"), "a.md");
        assert_eq!(base_name("notes"), "notes");
    }

    #[test]
    fn strict_descendant_requires_separator() {
        assert!(is_strict_descendant("archive/sub/x", "archive"));
        assert!(!is_strict_descendant("archive", "archive"));
        assert!(!is_strict_descendant("archive-old/x", "archive"));
        assert!(is_strict_descendant("anything", ""));
    }

    #[test]
    fn resolve_stays_inside_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();

        assert_eq!(resolve_within_root(&root, "").unwrap(), root);
        let inside = resolve_within_root(&root, "notes/todo.md").unwrap();
        assert!(inside.starts_with(&root));
        assert_eq!(inside, root.join("notes").join("todo.md"));
    }

    #[test]
    fn resolve_rejects_parent_segments() {
        let tmp = TempDir::new().unwrap();
        for input in ["..", "../outside", "notes/../../etc", "a/b/.."] {
            assert_eq!(
                resolve_within_root(tmp.path(), input),
                Err(ErrorKind::InvalidPath),
                "input {input:?} should be rejected"
            );
        }
    }

    #[test]
    fn resolve_never_escapes_for_valid_inputs() {
        let tmp = TempDir::new().unwrap();
        let root = resolve_root(tmp.path());
        for input in ["a", "a/b/c.md", "/abs/looking", "\\win\\style", "x y/z"] {
            let resolved = resolve_within_root(tmp.path(), input).unwrap();
            assert!(resolved.starts_with(&root), "{input:?} -> {resolved:?}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn resolve_rejects_symlinked_folder_escaping_root() {
        let outside = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("escape")).unwrap();

        assert_eq!(
            resolve_within_root(tmp.path(), "escape/secret.md"),
            Err(ErrorKind::InvalidPath)
        );
    }

    #[cfg(unix)]
    #[test]
    fn resolve_allows_link_itself_as_target() {
        let outside = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("notes")).unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("notes").join("link")).unwrap();

        assert!(resolve_within_root(tmp.path(), "notes/link").is_ok());
    }

    #[test]
    fn resolve_root_of_missing_directory_is_absolute() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("not-yet");
        let resolved = resolve_root(&missing);
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("not-yet"));
    }
}
