//! Folia core library: a personal knowledge base stored as plain files.
//!
//! `folia-core` owns everything between a directory of Markdown documents
//! and the callers that browse and edit it. It has no opinion on transport
//! or authentication; a web server, a CLI or a test harness drive the same
//! [`Library`] handlers.
//!
//! # Modules
//!
//! - [`path`]: Relative path normalisation and root containment checks.
//! - [`naming`]: Slug-based folder and document naming.
//! - [`scan`]: One-shot library walk producing a [`LibrarySnapshot`].
//! - [`cache`]: Single-flight, watch-invalidated [`SnapshotCache`].
//! - [`ops`]: The [`Library`] operation handlers and the [`Authorizer`] seam.
//! - [`search`]: Line-oriented content search over documents.
//! - [`tree`]: Pure edits on a tree value and the [`TreeReplica`] built on them.
//! - [`model`]: Shared data types.
//! - [`config`]: TOML configuration ([`LibraryConfig`]).
//! - [`error`]: Operation [`ErrorKind`]s and the internal [`CoreError`].

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod naming;
pub mod ops;
pub mod path;
pub mod scan;
pub mod search;
pub mod tree;

pub use cache::SnapshotCache;
pub use config::LibraryConfig;
pub use error::{CoreError, CoreResult, ErrorKind};
pub use model::{
    CollectionInfo, LibrarySnapshot, LoadedFile, NodeKind, OperationOk, OperationResult,
    RecentPage, Timestamp, TreeNode,
};
pub use naming::{DOC_EXTENSION, PLACEHOLDER_SLUG};
pub use ops::{Authorizer, Library, TransferMode};
pub use scan::{scan_library, RECENT_LIMIT};
pub use search::SEARCH_LIMIT;
pub use tree::{ReplicaEdit, TreeReplica};
