//! Handler dispatch: choose, attach and replace a node's type representation
//! by mime type.

use std::collections::HashMap;

use super::meta::NormalizedMetadata;
use super::node::{HandlerKind, NodeId, NodeTable, Representation};
use crate::api::types::FOLDER_MIME;
use crate::error::{DriveError, Result};

pub const DOCUMENT_MIME: &str = "application/vnd.google-apps.document";
pub const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
pub const PRESENTATION_MIME: &str = "application/vnd.google-apps.presentation";
pub const FORM_MIME: &str = "application/vnd.google-apps.form";
pub const DRAWING_MIME: &str = "application/vnd.google-apps.drawing";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Native document mimes whose content is only reachable through export links.
pub const DOC_MIMES: [&str; 5] = [
    DOCUMENT_MIME,
    SPREADSHEET_MIME,
    PRESENTATION_MIME,
    FORM_MIME,
    DRAWING_MIME,
];

pub fn is_doc_mime(mime: &str) -> bool {
    DOC_MIMES.contains(&mime)
}

/// Mime -> handler registrations with numeric priorities.
#[derive(Debug, Clone)]
pub struct HandlerTable {
    entries: HashMap<String, (HandlerKind, u32)>,
    fallback: HandlerKind,
}

impl HandlerTable {
    /// A table with no registrations, falling back to `fallback`.
    pub fn empty(fallback: HandlerKind) -> Self {
        Self {
            entries: HashMap::new(),
            fallback,
        }
    }

    /// Register `kind` for `mime`. An existing registration with a higher
    /// priority wins.
    pub fn register(&mut self, mime: &str, kind: HandlerKind, priority: u32) {
        match self.entries.get(mime) {
            Some((_, existing)) if *existing > priority => {
                log::debug!("Keeping higher-priority handler for {}", mime);
            }
            _ => {
                self.entries.insert(mime.to_string(), (kind, priority));
            }
        }
    }

    /// Handler for `mime`, or the fallback for anything unregistered.
    pub fn select(&self, mime: &str) -> HandlerKind {
        self.entries
            .get(mime)
            .map(|(kind, _)| *kind)
            .unwrap_or(self.fallback)
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        let mut table = Self::empty(HandlerKind::File);
        table.register(FOLDER_MIME, HandlerKind::Folder, 100);
        table.register(DOCUMENT_MIME, HandlerKind::Document, 100);
        table.register(SPREADSHEET_MIME, HandlerKind::Document, 100);
        table.register(PRESENTATION_MIME, HandlerKind::Document, 100);
        table.register(OCTET_STREAM, HandlerKind::File, 0);
        table
    }
}

impl NodeTable {
    /// Attach the representation matching `meta.mime` to node `id` and push
    /// `meta` through it.
    ///
    /// Replaces the representation when the mime changed; otherwise only the
    /// metadata is updated. Applying the same metadata twice is a no-op the
    /// second time. Children dropped by a folder update or replacement are
    /// removed from the table.
    pub fn attach(
        &mut self,
        id: NodeId,
        meta: &NormalizedMetadata,
        handlers: &HandlerTable,
    ) -> Result<HandlerKind> {
        let node = self.node_mut(id)?;
        if meta.mime.is_empty() {
            return Err(DriveError::InvalidMime(node.ident.clone()));
        }

        let mut released = Vec::new();
        if let Some(top) = &node.top {
            if top.mime() != meta.mime {
                log::debug!(
                    "Mime of {} changed {} -> {}, detaching",
                    node.ident,
                    top.mime(),
                    meta.mime
                );
                if let Some(Representation::Folder(folder)) = node.top.take() {
                    released.extend(folder.files.into_values());
                }
                node.mime_valid = false;
            }
        }

        if node.top.is_none() || !node.mime_valid {
            let kind = handlers.select(&meta.mime);
            node.top = Some(Representation::new(kind, &meta.mime));
            node.mime_valid = true;
        }

        node.meta = Some(meta.clone());
        let (kind, outcome) = match node.top.as_mut() {
            Some(top) => (top.kind(), top.update(meta)),
            None => return Err(DriveError::InvalidMime(node.ident.clone())),
        };
        released.extend(outcome.released);

        for child in released {
            self.remove(child);
        }
        Ok(kind)
    }
}

impl Representation {
    /// Link the content of this item is read from.
    ///
    /// Native documents resolve to the first export link whose format is in
    /// `formats` (caller's order of preference); other files to their
    /// download URL. Folders have no content.
    pub fn content_link(&self, formats: &[String]) -> Result<String> {
        let meta = self
            .meta()
            .ok_or_else(|| DriveError::NoData(self.mime().to_string()))?;
        let raw = &meta.raw;
        let label = raw.self_link.clone().unwrap_or_else(|| raw.title.clone());

        match self {
            Representation::Folder(_) => Err(DriveError::NotImplemented(label)),
            _ if is_doc_mime(self.mime()) => formats
                .iter()
                .find_map(|format| {
                    raw.export_links
                        .values()
                        .find(|link| export_format(link) == Some(format.as_str()))
                })
                .cloned()
                .ok_or(DriveError::NoData(label)),
            _ => raw.download_url.clone().ok_or(DriveError::NoData(label)),
        }
    }
}

/// `exportFormat` query value of an export link.
fn export_format(link: &str) -> Option<&str> {
    let query = link.split_once('?')?.1;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("exportFormat="))
}
