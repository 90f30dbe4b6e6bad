//! Filesystem engine projecting a remote drive into a node tree.
//!
//! `DriveFs` owns the node table, the cached root record and the content
//! cache for one (endpoint, identity) pair. Directory listings are
//! reconciled against the previous listing (see `reconcile`), mutations
//! invalidate the listings they affect (see `mutate`).
//!
//! Node state sits behind one async mutex that is never held across a
//! network call. Each directory additionally has its own list lock so a
//! second listing of the same directory waits for the first instead of
//! interleaving with it.

pub mod cache;
pub mod dispatch;
pub mod meta;
pub mod mutate;
pub mod node;
pub mod reconcile;
pub mod sniff;
pub mod synth;


use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::api::client::DriveClient;
use crate::api::transport::Transport;
use crate::api::types::RemoteItem;
use crate::config::{DriveConfig, ReadOptions};
use crate::error::{DriveError, Result};
use cache::ContentCache;
use dispatch::HandlerTable;
use meta::{translate, NormalizedMetadata};
use node::{normalize_name, HandlerKind, NodeId, NodeTable, ROOT_ID};
use sniff::{ContentSniffer, OfficeSniffer};
use synth::SyntheticDirs;

/// Snapshot of a node's state.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub id: NodeId,
    pub ident: String,
    pub name: String,
    pub parent: Option<NodeId>,
    /// Active representation, `None` until metadata has been attached.
    pub kind: Option<HandlerKind>,
    pub meta: Option<NormalizedMetadata>,
}

impl NodeInfo {
    pub fn is_folder(&self) -> bool {
        self.kind == Some(HandlerKind::Folder)
    }
}

/// One mounted drive.
pub struct DriveFs<T> {
    client: DriveClient<T>,
    config: DriveConfig,
    root_uri: String,
    synth: SyntheticDirs,
    handlers: HandlerTable,
    sniffer: Box<dyn ContentSniffer>,
    nodes: Mutex<NodeTable>,
    rootraw: Mutex<Option<RemoteItem>>,
    list_locks: Mutex<HashMap<NodeId, Arc<Mutex<()>>>>,
    content: Mutex<ContentCache>,
}

impl<T: Transport> DriveFs<T> {
    pub fn new(client: DriveClient<T>, config: DriveConfig) -> Self {
        let root_uri = config.root_uri();
        let synth = SyntheticDirs::new(client.api_url());
        log::info!("Creating drive filesystem for {} at {}", client.user(), root_uri);

        Self {
            nodes: Mutex::new(NodeTable::new(&root_uri)),
            content: Mutex::new(ContentCache::new(config.content_cache_bytes)),
            client,
            config,
            root_uri,
            synth,
            handlers: HandlerTable::default(),
            sniffer: Box::new(OfficeSniffer),
            rootraw: Mutex::new(None),
            list_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the content sniffer used for upload conversion decisions.
    pub fn with_sniffer(mut self, sniffer: impl ContentSniffer + 'static) -> Self {
        self.sniffer = Box::new(sniffer);
        self
    }

    pub fn with_handlers(mut self, handlers: HandlerTable) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn client(&self) -> &DriveClient<T> {
        &self.client
    }

    pub fn user(&self) -> &str {
        self.client.user()
    }

    pub fn root_uri(&self) -> &str {
        &self.root_uri
    }

    pub fn synthetic(&self) -> &SyntheticDirs {
        &self.synth
    }

    /// Cached root record, once fetched.
    pub async fn rootraw(&self) -> Option<RemoteItem> {
        self.rootraw.lock().await.clone()
    }

    /// Snapshot of a node.
    pub async fn info(&self, id: NodeId) -> Result<NodeInfo> {
        let nodes = self.nodes.lock().await;
        let node = nodes.node(id)?;
        Ok(NodeInfo {
            id,
            ident: node.ident.clone(),
            name: node.name.clone(),
            parent: node.parent,
            kind: node.representation().map(|r| r.kind()),
            meta: node.meta().cloned(),
        })
    }

    /// The root node, fetching root metadata on first use.
    pub async fn root(&self) -> Result<NodeId> {
        if self.rootraw.lock().await.is_none() {
            self.stat(ROOT_ID).await?;
        }
        Ok(ROOT_ID)
    }

    /// Refresh a node's metadata from the remote service and re-dispatch it.
    ///
    /// Synthetic directories are answered from the cached root record.
    pub async fn stat(&self, id: NodeId) -> Result<NodeInfo> {
        let ident = self.nodes.lock().await.node(id)?.ident.clone();

        let raw = if self.synth.is_synthetic(&ident) {
            let root = self.rootraw.lock().await.clone();
            self.synth
                .synthesize(root.as_ref(), &ident)
                .ok_or_else(|| DriveError::NotFound(ident.clone()))?
        } else {
            log::debug!("Fetching metadata for {}", ident);
            let raw = self.client.get_item(&ident).await?;
            if ident == self.root_uri {
                *self.rootraw.lock().await = Some(raw.clone());
            }
            raw
        };

        let meta = translate(&raw)?;
        let removed = {
            let mut nodes = self.nodes.lock().await;
            nodes.attach(id, &meta, &self.handlers)?;
            nodes.take_removed()
        };
        self.drop_list_locks(&removed).await;
        self.info(id).await
    }

    /// Child of `dir` named `name`, listing `dir` if needed.
    pub async fn lookup(&self, dir: NodeId, name: &str) -> Result<NodeId> {
        let files = self.list(dir).await?;
        files
            .get(&normalize_name(name))
            .copied()
            .ok_or_else(|| DriveError::NotFound(name.to_string()))
    }

    /// Walk a slash-separated path from the root.
    pub async fn resolve(&self, path: &str) -> Result<NodeId> {
        let mut current = self.root().await?;
        for component in path.split('/').filter(|c| !c.is_empty() && *c != ".") {
            current = self.lookup(current, component).await?;
        }
        Ok(current)
    }

    /// Read a node's content.
    ///
    /// Native documents are exported in the first available format from
    /// `opts.export_formats`; other files are downloaded directly.
    pub async fn read(&self, id: NodeId, opts: &ReadOptions) -> Result<Vec<u8>> {
        let (ident, mtime, link) = {
            let nodes = self.nodes.lock().await;
            let node = nodes.node(id)?;
            let rep = node
                .representation()
                .ok_or_else(|| DriveError::NotImplemented(node.ident.clone()))?;
            (
                node.ident.clone(),
                node.mtime(),
                rep.content_link(&opts.export_formats)?,
            )
        };

        if let Some(data) = self.content.lock().await.get(&link, mtime) {
            log::debug!("Content cache hit for {}", ident);
            return Ok(data.to_vec());
        }

        log::debug!("Downloading {} from {}", ident, link);
        let data = self.client.download(&link).await?;
        self.content.lock().await.set(&link, mtime, data.clone());
        Ok(data)
    }

    /// Per-directory list lock.
    async fn list_lock(&self, dir: NodeId) -> Arc<Mutex<()>> {
        let mut locks = self.list_locks.lock().await;
        locks
            .entry(dir)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Forget the list locks of nodes that left the table.
    async fn drop_list_locks(&self, removed: &[NodeId]) {
        if removed.is_empty() {
            return;
        }
        let mut locks = self.list_locks.lock().await;
        for id in removed {
            locks.remove(id);
        }
    }

    #[cfg(test)]
    pub(crate) async fn list_lock_count(&self) -> usize {
        self.list_locks.lock().await.len()
    }

    /// Force the next listing of `dir` to refetch.
    ///
    /// Waits for an in-flight listing of `dir` so it cannot mark the
    /// directory populated after this call.
    pub async fn invalidate(&self, dir: NodeId) {
        if self.nodes.lock().await.get(dir).is_none() {
            return;
        }
        let lock = self.list_lock(dir).await;
        let _guard = lock.lock().await;
        self.nodes.lock().await.invalidate(dir);
    }

    /// Whether `dir` currently serves listings from cache.
    pub async fn is_populated(&self, dir: NodeId) -> bool {
        let nodes = self.nodes.lock().await;
        nodes.folder(dir).map(|f| f.populated).unwrap_or(false)
    }

    /// Node URI for a listed item.
    fn ident_for(&self, raw: &RemoteItem) -> String {
        match (&raw.self_link, &raw.id) {
            (Some(link), _) => link.clone(),
            (None, Some(id)) => self.client.item_uri(id),
            (None, None) => format!("{}/{}", self.client.api_url(), raw.title),
        }
    }

    /// Make sure `id` has a representation, fetching its metadata if not.
    async fn ensure_attached(&self, id: NodeId) -> Result<()> {
        let attached = self.nodes.lock().await.node(id)?.representation().is_some();
        if !attached {
            self.stat(id).await?;
        }
        Ok(())
    }

    fn max_results(&self) -> u32 {
        self.config.max_results
    }
}
