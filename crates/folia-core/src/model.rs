//! Library data model shared by the scanner, the handlers and tree replicas.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Converts a filesystem time into a [`Timestamp`], treating zero as unknown.
pub fn to_timestamp(time: SystemTime) -> Option<Timestamp> {
    let millis = time.duration_since(UNIX_EPOCH).ok()?.as_millis();
    u64::try_from(millis).ok().filter(|m| *m > 0)
}

/// Whether a tree node is a folder or a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    File,
}

/// A folder or document in the library tree.
///
/// `path` is the posix join of every ancestor's name plus this node's name
/// (`""` for the root). Folder children are kept sorted by [`child_order`].
/// Files never have children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// The root node of an empty library.
    pub fn root() -> Self {
        Self::folder("root", "")
    }

    /// An empty folder node.
    pub fn folder(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::Folder,
            children: Vec::new(),
        }
    }

    /// A document node.
    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::File,
            children: Vec::new(),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    /// Sorts this node's direct children per [`child_order`].
    pub fn sort_children(&mut self) {
        self.children.sort_by(child_order);
    }
}

/// Sibling order: folders before files, then names compared case-insensitively
/// on their NFC form, with the raw name as a tie-breaker.
pub fn child_order(a: &TreeNode, b: &TreeNode) -> Ordering {
    match (a.kind, b.kind) {
        (NodeKind::Folder, NodeKind::File) => return Ordering::Less,
        (NodeKind::File, NodeKind::Folder) => return Ordering::Greater,
        _ => {}
    }
    compare_names(&a.name, &b.name)
}

/// Compares display names the way the tree orders siblings.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let key_a: String = a.nfc().flat_map(char::to_lowercase).collect();
    let key_b: String = b.nfc().flat_map(char::to_lowercase).collect();
    key_a.cmp(&key_b).then_with(|| a.cmp(b))
}

/// Summary of one top-level folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    pub name: String,
    pub path: String,
    pub page_count: usize,
    pub updated_at: Option<Timestamp>,
}

/// A recently modified document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentPage {
    pub name: String,
    pub path: String,
    pub updated_at: Timestamp,
}

/// A point-in-time view of the whole library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySnapshot {
    pub root: PathBuf,
    /// Ordered by name.
    pub collections: Vec<CollectionInfo>,
    /// Newest first.
    pub recent_pages: Vec<RecentPage>,
    pub tree: TreeNode,
    pub root_missing: bool,
}

impl LibrarySnapshot {
    /// The snapshot reported when the root directory does not exist.
    pub fn missing(root: PathBuf) -> Self {
        Self {
            root,
            collections: Vec::new(),
            recent_pages: Vec::new(),
            tree: TreeNode::root(),
            root_missing: true,
        }
    }
}

/// Successful outcome of an operation handler.
///
/// `path` and `name` describe the node the operation produced or touched, so
/// a tree replica can be patched from this value alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOk {
    pub path: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl OperationOk {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Attaches best-effort timestamps from `metadata`.
    pub fn with_metadata(mut self, metadata: Option<&std::fs::Metadata>) -> Self {
        if let Some(meta) = metadata {
            self.created_at = meta.created().ok().and_then(to_timestamp);
            self.updated_at = meta.modified().ok().and_then(to_timestamp);
        }
        self
    }
}

/// Result type returned by every operation handler.
pub type OperationResult<T = OperationOk> = Result<T, crate::error::ErrorKind>;

/// A document's content together with its operation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedFile {
    #[serde(flatten)]
    pub meta: OperationOk,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folders_sort_before_files() {
        let mut node = TreeNode::root();
        node.children = vec![
            TreeNode::file("a.md", "a.md"),
            TreeNode::folder("zeta", "zeta"),
            TreeNode::folder("Alpha", "Alpha"),
            TreeNode::file("B.md", "B.md"),
        ];
        node.sort_children();
        let names: Vec<&str> = node.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "zeta", "a.md", "B.md"]);
    }

    #[test]
    fn compare_names_is_case_insensitive_with_stable_tiebreak() {
        assert_eq!(compare_names("apple", "Banana"), Ordering::Less);
        assert_eq!(compare_names("Apple", "apple"), Ordering::Less);
        assert_eq!(compare_names("same", "same"), Ordering::Equal);
    }

    #[test]
    fn compare_names_treats_nfd_and_nfc_alike() {
        let nfc = "caf\u{e9}";
        let nfd = "cafe\u{301}";
        assert_eq!(compare_names(nfc, "cafz"), compare_names(nfd, "cafz"));
    }

    #[test]
    fn tree_node_serialises_type_field() {
        let json = serde_json::to_value(TreeNode::file("a.md", "notes/a.md")).unwrap();
        assert_eq!(json["type"], "file");
        assert!(json.get("children").is_none());
    }

    #[test]
    fn snapshot_uses_camel_case() {
        let snapshot = LibrarySnapshot::missing(PathBuf::from("/lib"));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["rootMissing"], true);
        assert!(json["recentPages"].as_array().unwrap().is_empty());
    }

    #[test]
    fn operation_ok_omits_unknown_times() {
        let json = serde_json::to_value(OperationOk::new("ideas", "ideas")).unwrap();
        assert_eq!(json["path"], "ideas");
        assert!(json.get("createdAt").is_none());
    }

    #[test]
    fn zero_timestamp_is_unknown() {
        assert_eq!(to_timestamp(UNIX_EPOCH), None);
        assert!(to_timestamp(SystemTime::now()).is_some());
    }
}
