//! Mutation operations: rename, mkdir, remove and write.
//!
//! Each one performs its remote call first and only then invalidates the
//! listings it affects. A failed remote call leaves every cache untouched.

use super::node::NodeId;
use super::sniff::{plan_upload, UploadPlan};
use super::DriveFs;
use crate::api::transport::Transport;
use crate::api::types::{ItemPatch, NewItem, ParentRef};
use crate::config::WriteOptions;
use crate::error::{DriveError, Result};

/// Multipart boundary for uploads.
pub const UPLOAD_BOUNDARY: &str = "-------314159265358979323846";

/// Remote-side facts about a node needed by mutations.
struct Target {
    ident: String,
    remote_id: Option<String>,
    is_folder: bool,
    parents: Vec<ParentRef>,
}

impl Target {
    /// Remote id, required by every mutation. Items listed without one
    /// cannot be changed remotely.
    fn remote_id(&self) -> Result<&str> {
        self.remote_id
            .as_deref()
            .ok_or_else(|| DriveError::NotSupported(self.ident.clone()))
    }
}

impl<T: Transport> DriveFs<T> {
    async fn target(&self, id: NodeId) -> Result<Target> {
        let nodes = self.nodes.lock().await;
        let node = nodes.node(id)?;
        Ok(Target {
            ident: node.ident.clone(),
            remote_id: node.remote_id().map(String::from),
            is_folder: node.is_folder(),
            parents: node
                .meta()
                .map(|m| m.raw.parents.clone())
                .unwrap_or_default(),
        })
    }

    /// A real (non-synthetic) folder that children can be created in.
    async fn writable_folder(&self, dir: NodeId) -> Result<Target> {
        self.ensure_attached(dir).await?;
        let target = self.target(dir).await?;
        if !target.is_folder || self.synth.is_synthetic(&target.ident) {
            return Err(DriveError::NotImplemented(target.ident));
        }
        Ok(target)
    }

    /// Rename `src_name` in `src_dir` to `dst_name` in `dst_dir`.
    ///
    /// Both directory listings are invalidated on success, even when they
    /// are the same directory.
    pub async fn rename(
        &self,
        src_dir: NodeId,
        src_name: &str,
        dst_dir: NodeId,
        dst_name: &str,
    ) -> Result<()> {
        let item_id = self.lookup(src_dir, src_name).await?;
        self.ensure_attached(dst_dir).await?;

        let src = self.target(src_dir).await?;
        let dst = self.target(dst_dir).await?;
        let item = self.target(item_id).await?;

        for t in [&src, &dst, &item] {
            if self.synth.is_synthetic(&t.ident) {
                return Err(DriveError::PermissionDenied(t.ident.clone()));
            }
        }
        if !dst.is_folder {
            return Err(DriveError::NotADirectory(dst.ident));
        }

        let parents = if src_dir != dst_dir {
            let src_id = src.remote_id()?;
            let mut parents: Vec<ParentRef> = item
                .parents
                .iter()
                .filter(|p| p.id != src_id)
                .cloned()
                .collect();
            parents.push(ParentRef {
                id: dst.remote_id()?.to_string(),
            });
            Some(parents)
        } else {
            None
        };

        let patch = ItemPatch {
            title: dst_name.to_string(),
            parents,
        };
        self.client.patch_item(item.remote_id()?, &patch).await?;
        log::info!("Renamed {} to {}", item.ident, dst_name);

        self.invalidate(src_dir).await;
        self.invalidate(dst_dir).await;
        Ok(())
    }

    /// Create folder `name` in `parent`.
    pub async fn mkdir(&self, parent: NodeId, name: &str) -> Result<()> {
        let folder = self.writable_folder(parent).await?;

        match self.lookup(parent, name).await {
            Ok(_) => return Err(DriveError::AlreadyExists(name.to_string())),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        self.client.create_folder(folder.remote_id()?, name).await?;
        log::info!("Created folder {} in {}", name, folder.ident);

        self.invalidate(parent).await;
        Ok(())
    }

    /// Move `name` in `parent` to the trash.
    ///
    /// Folders must be empty; synthetic directories can never be removed.
    pub async fn remove(&self, parent: NodeId, name: &str) -> Result<()> {
        let child_id = self.lookup(parent, name).await?;
        let child = self.target(child_id).await?;

        if self.synth.is_synthetic(&child.ident) {
            return Err(DriveError::PermissionDenied(child.ident));
        }
        if child.is_folder {
            let children = self.list(child_id).await?;
            if !children.is_empty() {
                log::debug!("Refusing to remove {} with {} children", child.ident, children.len());
                return Err(DriveError::NotEmpty(child.ident));
            }
        }

        self.client.trash(child.remote_id()?).await?;
        log::info!("Trashed {}", child.ident);

        self.invalidate(parent).await;
        Ok(())
    }

    /// Write `data` as `name` in `parent`, replacing any existing item.
    ///
    /// With `opts.convert`, office documents are uploaded for conversion to
    /// native documents (see [`plan_upload`]).
    pub async fn write(
        &self,
        parent: NodeId,
        name: &str,
        data: &[u8],
        opts: &WriteOptions,
    ) -> Result<()> {
        let folder = self.writable_folder(parent).await?;

        match self.lookup(parent, name).await {
            Ok(_) => self.remove(parent, name).await?,
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let plan = plan_upload(name, data, opts.convert, self.sniffer.as_ref());
        let body = multipart_body(name, folder.remote_id()?, &plan, data)?;
        self.client.upload(body, UPLOAD_BOUNDARY, plan.convert).await?;
        log::info!(
            "Uploaded {} ({} bytes, convert={}) to {}",
            name,
            data.len(),
            plan.convert,
            folder.ident
        );

        self.invalidate(parent).await;
        Ok(())
    }
}

/// Build a `multipart/related` upload body: a JSON metadata part followed
/// by the binary content part.
pub fn multipart_body(
    title: &str,
    parent_id: &str,
    plan: &UploadPlan,
    data: &[u8],
) -> Result<Vec<u8>> {
    let meta = NewItem {
        title: title.to_string(),
        parents: vec![ParentRef {
            id: parent_id.to_string(),
        }],
        mime_type: plan.mime_override.clone(),
    };
    let delimiter = format!("\r\n--{}\r\n", UPLOAD_BOUNDARY);
    let close = format!("\r\n--{}--", UPLOAD_BOUNDARY);

    let mut body = Vec::with_capacity(data.len() + 512);
    body.extend_from_slice(delimiter.as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(&serde_json::to_vec(&meta)?);
    body.extend_from_slice(delimiter.as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(close.as_bytes());
    Ok(body)
}
