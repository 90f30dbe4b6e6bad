//! Directory reconciliation: merge a fresh remote listing into the cached
//! children of a directory, keeping node identity where nothing changed.

use std::collections::{BTreeMap, HashSet};

use super::meta::{translate, NormalizedMetadata};
use super::node::{normalize_name, FileNode, NodeId, ROOT_ID};
use super::DriveFs;
use crate::api::transport::Transport;
use crate::error::{DriveError, Result};

/// Name given to items with an empty title.
const UNTITLED: &str = "Untitled";

impl<T: Transport> DriveFs<T> {
    /// Children of `dir` by name.
    ///
    /// Served from cache while the directory is populated. Otherwise the
    /// listing is fetched, deduplicated and merged: unchanged children keep
    /// their node, changed ones are updated in place, vanished ones are
    /// dropped. On failure the directory is left exactly as it was.
    pub async fn list(&self, dir: NodeId) -> Result<BTreeMap<String, NodeId>> {
        self.ensure_attached(dir).await?;

        let lock = self.list_lock(dir).await;
        let _guard = lock.lock().await;

        let (ident, remote_id) = {
            let nodes = self.nodes.lock().await;
            let folder = nodes.folder(dir)?;
            if folder.populated {
                log::debug!("Listing of {} served from cache", dir);
                return Ok(folder.files.clone());
            }
            let node = nodes.node(dir)?;
            (node.ident.clone(), node.remote_id().map(String::from))
        };

        let query = match self.synth.lookup(&ident) {
            Some(synthetic) => synthetic.query.to_string(),
            None => {
                let id = remote_id.ok_or_else(|| DriveError::NotFound(ident.clone()))?;
                format!("'{}' in parents and trashed != true", id)
            }
        };

        log::debug!("Listing {} with query {:?}", ident, query);
        let mut items = self.client.list(&query, self.max_results()).await?;

        if dir == ROOT_ID {
            let root = self.rootraw.lock().await.clone();
            for uri in self.synth.uris() {
                match self.synth.synthesize(root.as_ref(), &uri) {
                    Some(item) => items.push(item),
                    None => log::warn!("Root metadata unknown, omitting {}", uri),
                }
            }
        }

        // Translate everything before touching the cache.
        let metas = items.iter().map(translate).collect::<Result<Vec<_>>>()?;
        let names = unique_names(&metas);

        let mut nodes = self.nodes.lock().await;
        let previous = nodes.folder(dir)?.files.clone();
        let mut files = BTreeMap::new();

        for (meta, name) in metas.iter().zip(names) {
            let ident = self.ident_for(&meta.raw);
            let cached = previous
                .get(&name)
                .copied()
                .filter(|id| nodes.get(*id).is_some_and(|n| n.ident == ident));

            let id = match cached {
                Some(id) if nodes.get(id).is_some_and(|n| n.mtime() == meta.mtime) => id,
                Some(id) => {
                    log::debug!("{} changed, updating in place", ident);
                    nodes.attach(id, meta, &self.handlers)?;
                    id
                }
                None => {
                    let id = nodes.allocate_id();
                    nodes.insert(id, FileNode::new(ident, name.clone(), Some(dir)));
                    nodes.attach(id, meta, &self.handlers)?;
                    id
                }
            };
            files.insert(name, id);
        }

        let kept: HashSet<NodeId> = files.values().copied().collect();
        for id in previous.values().filter(|id| !kept.contains(id)) {
            nodes.remove(*id);
        }

        let folder = nodes.folder_mut(dir)?;
        folder.files = files.clone();
        folder.populated = true;
        let removed = nodes.take_removed();
        drop(nodes);

        self.drop_list_locks(&removed).await;
        log::debug!("Listed {} entries in {}", files.len(), dir);
        Ok(files)
    }
}

/// Unique, NFC-normalised child names for `metas`, in input order.
///
/// Items sharing a title are ordered by remote id (then self link); the
/// first keeps the title and the others get ` (n)` inserted before the
/// extension, with `n` counting up from 1 past any name already taken.
/// The result depends only on the set of items, not on their order.
pub fn unique_names(metas: &[NormalizedMetadata]) -> Vec<String> {
    let titles: Vec<String> = metas
        .iter()
        .map(|m| {
            let title = normalize_name(&m.raw.title);
            if title.is_empty() {
                UNTITLED.to_string()
            } else {
                title
            }
        })
        .collect();

    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, title) in titles.iter().enumerate() {
        groups.entry(title.as_str()).or_default().push(idx);
    }

    let mut taken: HashSet<String> = titles.iter().cloned().collect();
    let mut names = titles.clone();

    for (title, mut members) in groups.into_iter().filter(|(_, g)| g.len() > 1) {
        members.sort_by(|a, b| {
            let key = |i: &usize| (metas[*i].raw.id.clone(), metas[*i].raw.self_link.clone());
            key(a).cmp(&key(b))
        });

        let mut n = 1;
        for idx in members.into_iter().skip(1) {
            let mut candidate = with_suffix(title, n);
            while taken.contains(&candidate) {
                n += 1;
                candidate = with_suffix(title, n);
            }
            taken.insert(candidate.clone());
            names[idx] = candidate;
            n += 1;
        }
    }
    names
}

/// `report.pdf` -> `report (n).pdf`; names without an extension get the
/// suffix appended.
fn with_suffix(title: &str, n: usize) -> String {
    match title.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!("{} ({}).{}", stem, n, ext)
        }
        _ => format!("{} ({})", title, n),
    }
}
