//! Canonical folder and document names.
//!
//! User-entered names are turned into lowercase hyphenated slugs so that
//! "My Notes" and "my-notes.md" land on the same file.

use unicode_normalization::UnicodeNormalization;

use crate::error::ErrorKind;
use crate::path::{join_relative, normalize_relative_path, normalize_segment};

/// Extension carried by every document in the library, without the dot.
pub const DOC_EXTENSION: &str = "md";

/// Slug used when a name has no characters left after slugging.
pub const PLACEHOLDER_SLUG: &str = "untitled";

/// Returns `true` if `name` ends with the document extension.
pub fn is_document_name(name: &str) -> bool {
    name.len() > DOC_EXTENSION.len() + 1
        && name.ends_with(DOC_EXTENSION)
        && name.as_bytes()[name.len() - DOC_EXTENSION.len() - 1] == b'.'
}

/// Converts arbitrary text into a slug of `[a-z0-9-]`.
///
/// Accented letters are decomposed first so that `"Café"` becomes `"cafe"`
/// rather than `"caf"`. Other characters outside `[a-z0-9]`, whitespace and
/// `-` are dropped; whitespace runs become a single `-` and repeated hyphens
/// collapse. An empty result yields [`PLACEHOLDER_SLUG`].
pub fn slugify(text: &str) -> String {
    let kept: String = text
        .nfd()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .collect();

    let mut slug = String::with_capacity(kept.len());
    for word in kept.split_whitespace() {
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(word);
    }

    let mut collapsed = String::with_capacity(slug.len());
    for c in slug.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }

    if collapsed.is_empty() {
        PLACEHOLDER_SLUG.to_string()
    } else {
        collapsed
    }
}

/// Normalises a folder name into its canonical slug.
///
/// # Errors
///
/// [`ErrorKind::InvalidName`] if the input is not a single valid segment.
pub fn normalize_folder_name(input: &str) -> Result<String, ErrorKind> {
    let segment = normalize_segment(input)?;
    Ok(slugify(&segment))
}

/// Normalises a document name into `<slug>.md`.
///
/// A trailing document extension (any case) is stripped before slugging and
/// re-appended afterwards, so the function is idempotent.
///
/// # Errors
///
/// [`ErrorKind::InvalidName`] if the input is not a single valid segment.
pub fn normalize_file_name(input: &str) -> Result<String, ErrorKind> {
    let segment = normalize_segment(input)?;
    let suffix_len = DOC_EXTENSION.len() + 1;
    let base = match segment.len().checked_sub(suffix_len) {
        Some(cut)
            if segment.is_char_boundary(cut)
                && segment[cut..].eq_ignore_ascii_case(&format!(".{DOC_EXTENSION}")) =>
        {
            &segment[..cut]
        }
        _ => segment.as_str(),
    };
    Ok(format!("{}.{DOC_EXTENSION}", slugify(base)))
}

/// Builds the relative path of a folder named `name` under `parent_path`.
///
/// # Errors
///
/// - [`ErrorKind::InvalidName`] if `name` is rejected.
/// - [`ErrorKind::InvalidPath`] if `parent_path` is rejected.
pub fn build_folder_path(parent_path: &str, name: &str) -> Result<String, ErrorKind> {
    let folder = normalize_folder_name(name)?;
    let parent = normalize_relative_path(parent_path)?;
    Ok(join_relative(&parent, &folder))
}

/// Builds the relative path of a document named `name` under `parent_path`.
///
/// # Errors
///
/// - [`ErrorKind::InvalidName`] if `name` is rejected.
/// - [`ErrorKind::InvalidPath`] if `parent_path` is rejected.
pub fn build_file_path(parent_path: &str, name: &str) -> Result<String, ErrorKind> {
    let file = normalize_file_name(name)?;
    let parent = normalize_relative_path(parent_path)?;
    Ok(join_relative(&parent, &file))
}
