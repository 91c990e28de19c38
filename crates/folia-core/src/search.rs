//! Content search across library documents.
//!
//! A fixed-string, case-sensitive, line-oriented match over every `.md`
//! file under the root. Each file stops at its first matching line and the
//! whole search stops once [`SEARCH_LIMIT`] files have matched. Files are
//! streamed through the searcher, never loaded whole.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use grep_regex::{RegexMatcher, RegexMatcherBuilder};
use grep_searcher::sinks::Lossy;
use grep_searcher::{BinaryDetection, Searcher, SearcherBuilder};

use crate::error::ErrorKind;
use crate::model::OperationResult;
use crate::naming::is_document_name;
use crate::ops::{Authorizer, Library};
use crate::path::{join_relative, resolve_root};

/// Maximum number of distinct documents a search reports.
pub const SEARCH_LIMIT: usize = 200;

impl Library {
    /// Returns the relative paths of documents containing `query`.
    ///
    /// The query is trimmed first; an empty query matches nothing. Queries
    /// spanning lines are rejected with [`ErrorKind::InvalidQuery`]. Files
    /// that cannot be read are skipped, as are binary files and symbolic
    /// links.
    pub fn search(&self, auth: &dyn Authorizer, query: &str) -> OperationResult<BTreeSet<String>> {
        if !auth.is_authorized() {
            return Err(ErrorKind::Unauthorized);
        }
        let query = query.trim();
        if query.is_empty() {
            return Ok(BTreeSet::new());
        }
        if query.contains(['\n', '\r']) {
            return Err(ErrorKind::InvalidQuery);
        }

        let matcher = RegexMatcherBuilder::new()
            .fixed_strings(true)
            .build(query)
            .map_err(|e| {
                tracing::debug!("search query rejected: {e}");
                ErrorKind::InvalidQuery
            })?;

        let matches = search_documents(&resolve_root(self.root()), &matcher, SEARCH_LIMIT)
            .map_err(|e| {
                tracing::warn!("search of {} failed: {e}", self.root().display());
                ErrorKind::ReadFailed
            })?;
        tracing::debug!("search for {query:?} matched {} documents", matches.len());
        Ok(matches)
    }
}

/// Walks `root` and collects up to `limit` documents with a matching line.
///
/// A missing root yields no matches; an unreadable root is an error.
/// Failures below the root only skip the affected entry.
fn search_documents(
    root: &Path,
    matcher: &RegexMatcher,
    limit: usize,
) -> io::Result<BTreeSet<String>> {
    let mut matches = BTreeSet::new();
    let mut searcher = SearcherBuilder::new()
        .binary_detection(BinaryDetection::quit(b'\x00'))
        .build();

    let top = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(matches),
        Err(e) => return Err(e),
    };

    let mut stack: Vec<(PathBuf, String)> = Vec::new();
    visit_dir(
        top,
        "",
        &mut stack,
        &mut matches,
        &mut searcher,
        matcher,
        limit,
    );

    while let Some((dir, relative)) = stack.pop() {
        if matches.len() >= limit {
            break;
        }
        match std::fs::read_dir(&dir) {
            Ok(entries) => visit_dir(
                entries,
                &relative,
                &mut stack,
                &mut matches,
                &mut searcher,
                matcher,
                limit,
            ),
            Err(e) => tracing::debug!("search skipped {}: {e}", dir.display()),
        }
    }

    Ok(matches)
}

/// Searches the documents of one directory and queues its subdirectories.
fn visit_dir(
    entries: std::fs::ReadDir,
    relative: &str,
    stack: &mut Vec<(PathBuf, String)>,
    matches: &mut BTreeSet<String>,
    searcher: &mut Searcher,
    matcher: &RegexMatcher,
    limit: usize,
) {
    let mut entries: Vec<std::fs::DirEntry> = entries.filter_map(Result::ok).collect();
    entries.sort_by_key(|e| e.file_name());

    let mut subdirs = Vec::new();
    for entry in entries {
        if matches.len() >= limit {
            return;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_symlink() {
            continue;
        }

        let child = join_relative(relative, &name);
        if file_type.is_dir() {
            subdirs.push((entry.path(), child));
        } else if file_type.is_file() && is_document_name(&name) {
            match first_match(searcher, matcher, &entry.path()) {
                Ok(true) => {
                    matches.insert(child);
                }
                Ok(false) => {}
                Err(e) => tracing::debug!("search skipped {child}: {e}"),
            }
        }
    }

    // Reversed so directories pop in name order.
    stack.extend(subdirs.into_iter().rev());
}

fn first_match(searcher: &mut Searcher, matcher: &RegexMatcher, path: &Path) -> io::Result<bool> {
    let mut found = false;
    searcher.search_path(
        matcher,
        path,
        Lossy(|_line_number, _line| {
            found = true;
            Ok(false)
        }),
    )?;
    Ok(found)
}
