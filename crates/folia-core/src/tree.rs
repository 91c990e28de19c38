//! Targeted edits to an in-memory library tree.
//!
//! These functions let a caller keep a local copy of the tree in step with
//! successful operations without rescanning. Each takes a tree by value and
//! returns the edited tree; untouched subtrees are moved, not copied. Every
//! function leaves folder children sorted and keeps each node's `path` equal
//! to its ancestors' names joined with its own.
//!
//! [`TreeReplica`] packages the edits the way a client applies them after
//! each kind of operation.

use std::collections::BTreeSet;

use crate::model::{NodeKind, OperationOk, TreeNode};
use crate::path::{is_strict_descendant, parent_of};

/// Returns the node at `path`, the root being matched by `""`.
pub fn find<'a>(tree: &'a TreeNode, path: &str) -> Option<&'a TreeNode> {
    let mut node = tree;
    loop {
        if node.path == path {
            return Some(node);
        }
        node = node
            .children
            .iter()
            .find(|c| c.path == path || is_strict_descendant(path, &c.path))?;
    }
}

fn find_mut<'a>(tree: &'a mut TreeNode, path: &str) -> Option<&'a mut TreeNode> {
    let mut node = tree;
    loop {
        if node.path == path {
            return Some(node);
        }
        node = node
            .children
            .iter_mut()
            .find(|c| c.path == path || is_strict_descendant(path, &c.path))?;
    }
}

/// Adds `node` to the folder at `parent_path`, keeping its children sorted.
///
/// The tree is returned unchanged if no folder lives at `parent_path`.
pub fn insert(mut tree: TreeNode, parent_path: &str, node: TreeNode) -> TreeNode {
    if let Some(parent) = find_mut(&mut tree, parent_path).filter(|p| p.is_folder()) {
        parent.children.push(node);
        parent.sort_children();
    }
    tree
}

/// Renames the node at `old_path` in place.
///
/// A folder takes `new_path` and `new_name`, and every descendant has its
/// `old_path` prefix replaced by `new_path`; descendant names are kept.
/// A file is renamed shallowly, as by [`rename_file`].
pub fn rename(mut tree: TreeNode, old_path: &str, new_path: &str, new_name: &str) -> TreeNode {
    if old_path.is_empty() {
        return tree;
    }
    if let Some(parent) = find_mut(&mut tree, parent_of(old_path)) {
        if let Some(node) = parent.children.iter_mut().find(|c| c.path == old_path) {
            node.name = new_name.to_string();
            rewrite_prefix(node, old_path, new_path);
            parent.sort_children();
        }
    }
    tree
}

/// Renames the file at `old_path`; folders at that path are left alone.
pub fn rename_file(mut tree: TreeNode, old_path: &str, new_path: &str, new_name: &str) -> TreeNode {
    if let Some(parent) = find_mut(&mut tree, parent_of(old_path)) {
        let target = parent
            .children
            .iter_mut()
            .find(|c| c.path == old_path && c.kind == NodeKind::File);
        if let Some(file) = target {
            file.name = new_name.to_string();
            file.path = new_path.to_string();
            parent.sort_children();
        }
    }
    tree
}

/// Drops the node at `target_path` together with its subtree.
pub fn remove(mut tree: TreeNode, target_path: &str) -> TreeNode {
    if target_path.is_empty() {
        return tree;
    }
    if let Some(parent) = find_mut(&mut tree, parent_of(target_path)) {
        parent.children.retain(|c| c.path != target_path);
    }
    tree
}

/// Returns a detached copy of `node` relocated from `old_path` to `new_path`.
pub fn clone_subtree(node: &TreeNode, old_path: &str, new_path: &str, new_name: &str) -> TreeNode {
    let mut copy = node.clone();
    copy.name = new_name.to_string();
    match copy.kind {
        NodeKind::Folder => rewrite_prefix(&mut copy, old_path, new_path),
        NodeKind::File => copy.path = new_path.to_string(),
    }
    copy
}

/// Prunes the tree to nodes matching `query`.
///
/// A file survives if its name contains `query` (case-insensitively) or its
/// path is in `content_matches`. A folder survives if its name matches or
/// any descendant survives. The root always survives and is never matched
/// by name. An empty `query` returns the tree as is.
pub fn filter(tree: TreeNode, query: &str, content_matches: &BTreeSet<String>) -> TreeNode {
    if query.is_empty() {
        return tree;
    }
    let needle = query.to_lowercase();
    let TreeNode {
        name,
        path,
        kind,
        children,
    } = tree;
    TreeNode {
        name,
        path,
        kind,
        children: children
            .into_iter()
            .filter_map(|c| prune(c, &needle, content_matches))
            .collect(),
    }
}

fn prune(node: TreeNode, needle: &str, content_matches: &BTreeSet<String>) -> Option<TreeNode> {
    let name_match = node.name.to_lowercase().contains(needle);
    match node.kind {
        NodeKind::File => {
            (name_match || content_matches.contains(&node.path)).then_some(node)
        }
        NodeKind::Folder => {
            let TreeNode {
                name,
                path,
                kind,
                children,
            } = node;
            let children: Vec<TreeNode> = children
                .into_iter()
                .filter_map(|c| prune(c, needle, content_matches))
                .collect();
            (name_match || !children.is_empty()).then_some(TreeNode {
                name,
                path,
                kind,
                children,
            })
        }
    }
}

/// Replaces the `old` prefix of every path in the subtree with `new`.
fn rewrite_prefix(node: &mut TreeNode, old: &str, new: &str) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if let Some(rest) = current.path.strip_prefix(old) {
            if rest.is_empty() || rest.starts_with('/') {
                current.path = format!("{new}{rest}");
            }
        }
        stack.extend(current.children.iter_mut());
    }
}

/// A successful operation, described so a replica can replay it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaEdit {
    Created {
        parent_path: String,
        kind: NodeKind,
    },
    Renamed {
        old_path: String,
        kind: NodeKind,
    },
    Removed {
        path: String,
    },
    Copied {
        source_path: String,
        dest_parent_path: String,
        kind: NodeKind,
    },
    Moved {
        source_path: String,
        dest_parent_path: String,
        kind: NodeKind,
    },
}

/// A caller-local copy of the library tree.
///
/// Edits keep it close to the filesystem, but other writers can change the
/// library at any time; [`TreeReplica::replace`] with a fresh snapshot tree
/// is the way back to the authoritative state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeReplica {
    tree: TreeNode,
}

impl TreeReplica {
    pub fn new(tree: TreeNode) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &TreeNode {
        &self.tree
    }

    /// Swaps in a freshly scanned tree.
    pub fn replace(&mut self, tree: TreeNode) {
        self.tree = tree;
    }

    /// Applies `edit`, whose handler returned `result`.
    pub fn apply(&mut self, edit: &ReplicaEdit, result: &OperationOk) {
        let tree = std::mem::replace(&mut self.tree, TreeNode::root());
        self.tree = match edit {
            ReplicaEdit::Created { parent_path, kind } => {
                let node = match kind {
                    NodeKind::Folder => TreeNode::folder(&result.name, &result.path),
                    NodeKind::File => TreeNode::file(&result.name, &result.path),
                };
                insert(tree, parent_path, node)
            }
            ReplicaEdit::Renamed { old_path, kind } => match kind {
                NodeKind::Folder => rename(tree, old_path, &result.path, &result.name),
                NodeKind::File => rename_file(tree, old_path, &result.path, &result.name),
            },
            ReplicaEdit::Removed { path } => remove(tree, path),
            ReplicaEdit::Copied {
                source_path,
                dest_parent_path,
                kind,
            } => {
                let node = relocated(&tree, source_path, *kind, result);
                insert(tree, dest_parent_path, node)
            }
            ReplicaEdit::Moved {
                source_path,
                dest_parent_path,
                kind,
            } => {
                let node = relocated(&tree, source_path, *kind, result);
                remove(insert(tree, dest_parent_path, node), source_path)
            }
        };
    }
}

/// Builds the node a copy or move produced at `result.path`.
fn relocated(tree: &TreeNode, source_path: &str, kind: NodeKind, result: &OperationOk) -> TreeNode {
    match kind {
        NodeKind::Folder => {
            let fallback;
            let source = match find(tree, source_path).filter(|n| n.is_folder()) {
                Some(node) => node,
                None => {
                    fallback = TreeNode::folder(crate::path::base_name(source_path), source_path);
                    &fallback
                }
            };
            clone_subtree(source, source_path, &result.path, &result.name)
        }
        NodeKind::File => TreeNode::file(&result.name, &result.path),
    }
}
