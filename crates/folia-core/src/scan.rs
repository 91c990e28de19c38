//! One-pass library scanner.
//!
//! [`scan_library`] walks the root with an explicit stack, so deep trees never
//! grow the call stack, and produces the tree, the per-collection summaries
//! and the bounded recents set in the same pass.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::{CoreError, CoreResult};
use crate::model::{
    child_order, compare_names, to_timestamp, CollectionInfo, LibrarySnapshot, NodeKind,
    RecentPage, Timestamp, TreeNode,
};
use crate::naming::is_document_name;
use crate::path::join_relative;

/// Number of entries kept in [`LibrarySnapshot::recent_pages`].
pub const RECENT_LIMIT: usize = 6;

/// A fixed-capacity set keeping the most recently updated pages.
///
/// Once full, a new page replaces the current oldest entry only if it is
/// newer, so the scan never sorts the full document list.
#[derive(Debug, Clone)]
pub struct RecentSet {
    limit: usize,
    pages: Vec<RecentPage>,
}

impl RecentSet {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            pages: Vec::with_capacity(limit),
        }
    }

    pub fn offer(&mut self, page: RecentPage) {
        if self.limit == 0 {
            return;
        }
        if self.pages.len() < self.limit {
            self.pages.push(page);
            return;
        }
        let oldest = self
            .pages
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| p.updated_at)
            .map(|(i, _)| i);
        if let Some(i) = oldest {
            if page.updated_at > self.pages[i].updated_at {
                self.pages[i] = page;
            }
        }
    }

    /// Consumes the set, returning pages newest first.
    pub fn into_sorted(mut self) -> Vec<RecentPage> {
        self.pages
            .sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.path.cmp(&b.path)));
        self.pages
    }
}

/// A node under construction; children are arena indices.
struct PendingNode {
    name: String,
    path: String,
    kind: NodeKind,
    children: Vec<usize>,
}

struct PendingDir {
    abs: PathBuf,
    node: usize,
    collection: Option<usize>,
}

/// Scans the library rooted at `root`.
///
/// A missing root yields a snapshot with `root_missing: true`. Symbolic links
/// are skipped entirely. Only files carrying the document extension are
/// included. Unreadable subdirectories and failed `stat` calls are tolerated:
/// the former are left empty, the latter simply contribute no timestamp.
///
/// # Errors
///
/// - [`CoreError::PermissionDenied`] if reading the root is denied.
/// - [`CoreError::Io`] if the root exists but cannot be listed otherwise
///   (for example because it is a regular file).
pub fn scan_library(root: &Path) -> CoreResult<LibrarySnapshot> {
    let started = Instant::now();
    let root = root.to_path_buf();

    let root_listing = match std::fs::read_dir(&root) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("library root missing: {}", root.display());
            return Ok(LibrarySnapshot::missing(root));
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(CoreError::PermissionDenied(root));
        }
        Err(e) => return Err(CoreError::Io(e)),
    };

    let mut arena = vec![PendingNode {
        name: "root".to_string(),
        path: String::new(),
        kind: NodeKind::Folder,
        children: Vec::new(),
    }];
    let mut collections: Vec<CollectionInfo> = Vec::new();
    let mut collection_by_name: HashMap<String, usize> = HashMap::new();
    let mut recents = RecentSet::new(RECENT_LIMIT);
    let mut stack = vec![PendingDir {
        abs: root.clone(),
        node: 0,
        collection: None,
    }];
    let mut first_listing = Some(root_listing);
    let mut files_seen = 0usize;

    while let Some(dir) = stack.pop() {
        let listing = match first_listing.take() {
            Some(rd) => rd,
            None => match std::fs::read_dir(&dir.abs) {
                Ok(rd) => rd,
                Err(e) => {
                    tracing::warn!("skipping unreadable folder {}: {e}", dir.abs.display());
                    continue;
                }
            },
        };
        let parent_path = arena[dir.node].path.clone();
        let is_top_level = dir.node == 0;

        for dir_entry in listing {
            let dir_entry = match dir_entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            // file_type() does not follow symlinks
            let file_type = match dir_entry.file_type() {
                Ok(ft) => ft,
                Err(_) => continue,
            };
            if file_type.is_symlink() {
                continue;
            }
            let name = match dir_entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::debug!("skipping non UTF-8 entry name {:?}", raw);
                    continue;
                }
            };
            let rel = join_relative(&parent_path, &name);

            if file_type.is_dir() {
                let index = arena.len();
                arena.push(PendingNode {
                    name: name.clone(),
                    path: rel.clone(),
                    kind: NodeKind::Folder,
                    children: Vec::new(),
                });
                arena[dir.node].children.push(index);

                let collection = if is_top_level {
                    let slot = *collection_by_name.entry(name.clone()).or_insert_with(|| {
                        collections.push(CollectionInfo {
                            name: name.clone(),
                            path: rel.clone(),
                            page_count: 0,
                            updated_at: None,
                        });
                        collections.len() - 1
                    });
                    Some(slot)
                } else {
                    dir.collection
                };

                stack.push(PendingDir {
                    abs: dir_entry.path(),
                    node: index,
                    collection,
                });
                continue;
            }

            if !file_type.is_file() || !is_document_name(&name) {
                continue;
            }

            files_seen += 1;
            let index = arena.len();
            arena.push(PendingNode {
                name: name.clone(),
                path: rel.clone(),
                kind: NodeKind::File,
                children: Vec::new(),
            });
            arena[dir.node].children.push(index);

            let updated_at: Option<Timestamp> = match dir_entry.metadata() {
                Ok(meta) => meta.modified().ok().and_then(to_timestamp),
                Err(e) => {
                    tracing::debug!("no metadata for {rel}: {e}");
                    None
                }
            };

            if let Some(slot) = dir.collection {
                let collection = &mut collections[slot];
                collection.page_count += 1;
                if let Some(ts) = updated_at {
                    if collection.updated_at.map_or(true, |current| ts > current) {
                        collection.updated_at = Some(ts);
                    }
                }
            }

            if let Some(ts) = updated_at {
                recents.offer(RecentPage {
                    name,
                    path: rel,
                    updated_at: ts,
                });
            }
        }
    }

    let folders = arena.len() - files_seen;
    let tree = assemble_tree(arena);
    collections.sort_by(|a, b| compare_names(&a.name, &b.name));

    tracing::debug!(
        "scanned {} in {:?}: {} folders, {} documents",
        root.display(),
        started.elapsed(),
        folders - 1,
        files_seen
    );

    Ok(LibrarySnapshot {
        root,
        collections,
        recent_pages: recents.into_sorted(),
        tree,
        root_missing: false,
    })
}

/// Turns the arena into an owned tree without recursion.
///
/// Children always have a larger index than their parent, so walking the
/// arena backwards builds every subtree before the folder that owns it.
fn assemble_tree(arena: Vec<PendingNode>) -> TreeNode {
    let mut built: Vec<Option<TreeNode>> = Vec::with_capacity(arena.len());
    built.resize_with(arena.len(), || None);

    let mut pending: Vec<Option<PendingNode>> = arena.into_iter().map(Some).collect();
    for index in (0..pending.len()).rev() {
        let Some(node) = pending[index].take() else {
            continue;
        };
        let mut children: Vec<TreeNode> = node
            .children
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        children.sort_by(child_order);
        built[index] = Some(TreeNode {
            name: node.name,
            path: node.path,
            kind: node.kind,
            children,
        });
    }

    built
        .into_iter()
        .next()
        .flatten()
        .unwrap_or_else(TreeNode::root)
}
