//! Node table mapping node ids to file nodes and their type representations.
//!
//! A node's identity is its remote URI (`ident`) and its `NodeId`; neither
//! changes across refreshes. Only the metadata and the attached type
//! representation are replaced. Folder representations own the child map,
//! filled lazily on the first listing.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use unicode_normalization::UnicodeNormalization;

use super::meta::NormalizedMetadata;
use crate::error::{DriveError, Result};

/// Normalize a child name to NFC so composed and decomposed spellings of
/// the same name map to one entry.
pub fn normalize_name(name: &str) -> String {
    name.nfc().collect()
}

/// Handle to a node in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The root node always has this id.
pub const ROOT_ID: NodeId = NodeId(1);

// ── Representations ───────────────────────────────────────────────────────────

/// Which type handler a representation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Folder,
    Document,
    File,
}

/// Result of pushing metadata into a representation.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// False when the modification time was unchanged and nothing happened.
    pub changed: bool,
    /// Children dropped from an invalidated folder listing.
    pub released: Vec<NodeId>,
}

/// Behaviour shared by every type representation.
pub trait TypeHandler {
    /// Mime type the representation was attached for.
    fn mime(&self) -> &str;

    /// Metadata last applied, if any.
    fn meta(&self) -> Option<&NormalizedMetadata>;

    /// Apply fresh metadata; a no-op when the modification time is unchanged.
    fn update(&mut self, meta: &NormalizedMetadata) -> UpdateOutcome;
}

fn same_mtime(current: Option<&NormalizedMetadata>, meta: &NormalizedMetadata) -> bool {
    current.is_some_and(|m| m.mtime == meta.mtime)
}

/// Folder representation: owns the cached child listing.
#[derive(Debug)]
pub struct FolderRep {
    mime: String,
    meta: Option<NormalizedMetadata>,
    /// Child name -> node.
    pub files: BTreeMap<String, NodeId>,
    /// True when `files` may be served without a remote fetch.
    pub populated: bool,
}

impl FolderRep {
    fn new(mime: &str) -> Self {
        Self {
            mime: mime.to_string(),
            meta: None,
            files: BTreeMap::new(),
            populated: false,
        }
    }

    /// Force the next listing to refetch; cached children are kept for reuse.
    pub fn invalidate(&mut self) {
        self.populated = false;
    }
}

impl TypeHandler for FolderRep {
    fn mime(&self) -> &str {
        &self.mime
    }

    fn meta(&self) -> Option<&NormalizedMetadata> {
        self.meta.as_ref()
    }

    fn update(&mut self, meta: &NormalizedMetadata) -> UpdateOutcome {
        if same_mtime(self.meta.as_ref(), meta) {
            return UpdateOutcome::default();
        }
        self.meta = Some(meta.clone());
        self.populated = false;
        let released = std::mem::take(&mut self.files).into_values().collect();
        UpdateOutcome {
            changed: true,
            released,
        }
    }
}

/// Rich-document representation (exportable native documents).
#[derive(Debug)]
pub struct DocumentRep {
    mime: String,
    meta: Option<NormalizedMetadata>,
}

impl TypeHandler for DocumentRep {
    fn mime(&self) -> &str {
        &self.mime
    }

    fn meta(&self) -> Option<&NormalizedMetadata> {
        self.meta.as_ref()
    }

    fn update(&mut self, meta: &NormalizedMetadata) -> UpdateOutcome {
        if same_mtime(self.meta.as_ref(), meta) {
            return UpdateOutcome::default();
        }
        self.meta = Some(meta.clone());
        UpdateOutcome {
            changed: true,
            released: Vec::new(),
        }
    }
}

/// Generic file representation, the fallback for unregistered mimes.
#[derive(Debug)]
pub struct FileRep {
    mime: String,
    meta: Option<NormalizedMetadata>,
}

impl TypeHandler for FileRep {
    fn mime(&self) -> &str {
        &self.mime
    }

    fn meta(&self) -> Option<&NormalizedMetadata> {
        self.meta.as_ref()
    }

    fn update(&mut self, meta: &NormalizedMetadata) -> UpdateOutcome {
        if same_mtime(self.meta.as_ref(), meta) {
            return UpdateOutcome::default();
        }
        self.meta = Some(meta.clone());
        UpdateOutcome {
            changed: true,
            released: Vec::new(),
        }
    }
}

/// The active type representation of a node.
#[derive(Debug)]
pub enum Representation {
    Folder(FolderRep),
    Document(DocumentRep),
    File(FileRep),
}

impl Representation {
    pub fn new(kind: HandlerKind, mime: &str) -> Self {
        match kind {
            HandlerKind::Folder => Representation::Folder(FolderRep::new(mime)),
            HandlerKind::Document => Representation::Document(DocumentRep {
                mime: mime.to_string(),
                meta: None,
            }),
            HandlerKind::File => Representation::File(FileRep {
                mime: mime.to_string(),
                meta: None,
            }),
        }
    }

    pub fn kind(&self) -> HandlerKind {
        match self {
            Representation::Folder(_) => HandlerKind::Folder,
            Representation::Document(_) => HandlerKind::Document,
            Representation::File(_) => HandlerKind::File,
        }
    }

    fn handler(&self) -> &dyn TypeHandler {
        match self {
            Representation::Folder(r) => r,
            Representation::Document(r) => r,
            Representation::File(r) => r,
        }
    }

    fn handler_mut(&mut self) -> &mut dyn TypeHandler {
        match self {
            Representation::Folder(r) => r,
            Representation::Document(r) => r,
            Representation::File(r) => r,
        }
    }

    pub fn mime(&self) -> &str {
        self.handler().mime()
    }

    pub fn meta(&self) -> Option<&NormalizedMetadata> {
        self.handler().meta()
    }

    pub fn update(&mut self, meta: &NormalizedMetadata) -> UpdateOutcome {
        self.handler_mut().update(meta)
    }

    /// Children owned by this representation (folders only).
    fn children(&self) -> Vec<NodeId> {
        match self {
            Representation::Folder(f) => f.files.values().copied().collect(),
            _ => Vec::new(),
        }
    }
}

// ── FileNode ──────────────────────────────────────────────────────────────────

/// Generic filesystem object.
#[derive(Debug)]
pub struct FileNode {
    /// Stable remote URI.
    pub ident: String,
    /// Name within the parent directory.
    pub name: String,
    pub parent: Option<NodeId>,
    /// Non-type metadata merged onto the node itself.
    pub(crate) meta: Option<NormalizedMetadata>,
    pub(crate) mime_valid: bool,
    pub(crate) top: Option<Representation>,
}

impl FileNode {
    pub fn new(ident: impl Into<String>, name: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            ident: ident.into(),
            name: name.into(),
            parent,
            meta: None,
            mime_valid: false,
            top: None,
        }
    }

    pub fn meta(&self) -> Option<&NormalizedMetadata> {
        self.meta.as_ref()
    }

    pub fn mtime(&self) -> Option<i64> {
        self.meta.as_ref().and_then(|m| m.mtime)
    }

    /// Mime of the active representation.
    pub fn mime(&self) -> Option<&str> {
        self.top.as_ref().map(|r| r.mime())
    }

    pub fn representation(&self) -> Option<&Representation> {
        self.top.as_ref()
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.top, Some(Representation::Folder(_)))
    }

    pub fn folder(&self) -> Option<&FolderRep> {
        match &self.top {
            Some(Representation::Folder(f)) => Some(f),
            _ => None,
        }
    }

    pub fn folder_mut(&mut self) -> Option<&mut FolderRep> {
        match &mut self.top {
            Some(Representation::Folder(f)) => Some(f),
            _ => None,
        }
    }

    /// Remote id of the underlying item, if it has one.
    pub fn remote_id(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.raw.id.as_deref())
    }
}

// ── NodeTable ─────────────────────────────────────────────────────────────────

/// Maps node ids to nodes.
///
/// Ids are allocated sequentially starting at 2 (1 is the root).
pub struct NodeTable {
    nodes: HashMap<NodeId, FileNode>,
    next_id: AtomicU64,
    /// Ids dropped since the last `take_removed`.
    removed: Vec<NodeId>,
}

impl NodeTable {
    /// Create a table holding only the root node.
    pub fn new(root_ident: &str) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_ID, FileNode::new(root_ident, "", None));
        Self {
            nodes,
            next_id: AtomicU64::new(2),
            removed: Vec::new(),
        }
    }

    pub fn allocate_id(&self) -> NodeId {
        NodeId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn insert(&mut self, id: NodeId, node: FileNode) {
        self.nodes.insert(id, node);
    }

    pub fn get(&self, id: NodeId) -> Option<&FileNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut FileNode> {
        self.nodes.get_mut(&id)
    }

    pub fn node(&self, id: NodeId) -> Result<&FileNode> {
        self.get(id).ok_or_else(|| DriveError::NotFound(id.to_string()))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut FileNode> {
        self.get_mut(id).ok_or_else(|| DriveError::NotFound(id.to_string()))
    }

    /// Folder representation of `id`, or `NotADirectory`.
    pub fn folder(&self, id: NodeId) -> Result<&FolderRep> {
        let node = self.node(id)?;
        node.folder()
            .ok_or_else(|| DriveError::NotADirectory(node.ident.clone()))
    }

    pub fn folder_mut(&mut self, id: NodeId) -> Result<&mut FolderRep> {
        let node = self.node_mut(id)?;
        let ident = node.ident.clone();
        node.folder_mut().ok_or(DriveError::NotADirectory(ident))
    }

    /// Cached child of a directory by name.
    pub fn find_child(&self, dir: NodeId, name: &str) -> Option<NodeId> {
        self.get(dir)?
            .folder()?
            .files
            .get(&normalize_name(name))
            .copied()
    }

    /// Mark a directory's listing stale. Non-folders are ignored.
    pub fn invalidate(&mut self, dir: NodeId) {
        if let Some(folder) = self.get_mut(dir).and_then(|n| n.folder_mut()) {
            log::debug!("Invalidating listing of {}", dir);
            folder.invalidate();
        }
    }

    /// Remove a node and everything below it.
    pub fn remove(&mut self, id: NodeId) {
        if id == ROOT_ID {
            return;
        }
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                self.removed.push(next);
                if let Some(top) = &node.top {
                    pending.extend(top.children());
                }
            }
        }
    }

    /// Drain the ids of nodes removed since the last call.
    pub fn take_removed(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.removed)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::RemoteItem;

    fn meta(mime: &str, mtime: i64) -> NormalizedMetadata {
        NormalizedMetadata {
            mime: mime.to_string(),
            mtime: Some(mtime),
            ctime: None,
            owner: String::new(),
            readable: true,
            writable: true,
            size: 0,
            raw: RemoteItem::default(),
        }
    }

    #[test]
    fn test_node_table_new_has_root() {
        let table = NodeTable::new("https://api.test/files/root");
        let root = table.get(ROOT_ID).unwrap();
        assert_eq!(root.ident, "https://api.test/files/root");
        assert!(root.parent.is_none());
        assert!(root.representation().is_none());
    }

    #[test]
    fn test_allocate_id_sequential() {
        let table = NodeTable::new("root");
        assert_eq!(table.allocate_id().as_u64(), 2);
        assert_eq!(table.allocate_id().as_u64(), 3);
    }

    #[test]
    fn test_folder_update_invalidates_only_on_mtime_change() {
        let mut rep = Representation::new(HandlerKind::Folder, "folder");
        assert!(rep.update(&meta("folder", 10)).changed);

        if let Representation::Folder(f) = &mut rep {
            f.files.insert("a".into(), NodeId(7));
            f.populated = true;
        }

        let outcome = rep.update(&meta("folder", 10));
        assert!(!outcome.changed);
        match &rep {
            Representation::Folder(f) => {
                assert!(f.populated);
                assert_eq!(f.files.len(), 1);
            }
            _ => panic!("Expected folder representation"),
        }

        let outcome = rep.update(&meta("folder", 11));
        assert!(outcome.changed);
        assert_eq!(outcome.released, vec![NodeId(7)]);
        match &rep {
            Representation::Folder(f) => {
                assert!(!f.populated);
                assert!(f.files.is_empty());
            }
            _ => panic!("Expected folder representation"),
        }
    }

    #[test]
    fn test_file_update_short_circuits() {
        let mut rep = Representation::new(HandlerKind::File, "text/plain");
        assert!(rep.update(&meta("text/plain", 1)).changed);
        assert!(!rep.update(&meta("text/plain", 1)).changed);
        assert!(rep.update(&meta("text/plain", 2)).changed);
        assert_eq!(rep.meta().unwrap().mtime, Some(2));
    }

    #[test]
    fn test_remove_drops_subtree() {
        let mut table = NodeTable::new("root");
        let dir = table.allocate_id();
        let child = table.allocate_id();

        let mut dir_node = FileNode::new("dir", "dir", Some(ROOT_ID));
        let mut rep = Representation::new(HandlerKind::Folder, "folder");
        if let Representation::Folder(f) = &mut rep {
            f.files.insert("child".into(), child);
        }
        dir_node.top = Some(rep);
        table.insert(dir, dir_node);
        table.insert(child, FileNode::new("child", "child", Some(dir)));

        table.remove(dir);
        assert!(table.get(dir).is_none());
        assert!(table.get(child).is_none());
        assert_eq!(table.len(), 1);

        let mut removed = table.take_removed();
        removed.sort();
        assert_eq!(removed, vec![dir, child]);
        assert!(table.take_removed().is_empty());
    }

    #[test]
    fn test_root_is_never_removed() {
        let mut table = NodeTable::new("root");
        table.remove(ROOT_ID);
        assert!(table.get(ROOT_ID).is_some());
        assert!(table.take_removed().is_empty());
    }

    #[test]
    fn test_normalize_name_nfc() {
        let decomposed = "e\u{0301}t\u{e9}";
        assert_eq!(normalize_name(decomposed), "\u{e9}t\u{e9}");
    }

    #[test]
    fn test_folder_lookup_on_file_is_not_a_directory() {
        let mut table = NodeTable::new("root");
        let id = table.allocate_id();
        let mut node = FileNode::new("f", "f", Some(ROOT_ID));
        node.top = Some(Representation::new(HandlerKind::File, "text/plain"));
        table.insert(id, node);
        assert!(matches!(table.folder(id), Err(DriveError::NotADirectory(_))));
        assert!(matches!(table.folder(NodeId(99)), Err(DriveError::NotFound(_))));
    }
}
