//! Synthetic directories: virtual collections surfaced under the root that
//! the service does not expose as ordinary folders.

use crate::api::types::RemoteItem;

/// A virtual directory, identified by a well-known URI suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticDir {
    /// Path appended to the API base URL to form the directory's URI.
    pub suffix: &'static str,
    /// Listing query run instead of the parent-based query.
    pub query: &'static str,
    /// Display name in the root listing.
    pub name: &'static str,
}

/// Virtual directories surfaced under the root, in listing order.
pub const SYNTHETIC_DIRS: [SyntheticDir; 2] = [
    SyntheticDir {
        suffix: "sharedWithMe",
        query: "sharedWithMe",
        name: "Shared With Me",
    },
    SyntheticDir {
        suffix: "trash",
        query: "trashed=true",
        name: "Trash",
    },
];

/// Static table of synthetic directories for one API base URL.
#[derive(Debug, Clone)]
pub struct SyntheticDirs {
    api_url: String,
}

impl SyntheticDirs {
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn uri(&self, dir: &SyntheticDir) -> String {
        format!("{}/{}", self.api_url, dir.suffix)
    }

    /// Synthetic directory with the given URI, if any.
    pub fn lookup(&self, uri: &str) -> Option<&'static SyntheticDir> {
        let suffix = uri.strip_prefix(&self.api_url)?.strip_prefix('/')?;
        SYNTHETIC_DIRS.iter().find(|d| d.suffix == suffix)
    }

    pub fn is_synthetic(&self, uri: &str) -> bool {
        self.lookup(uri).is_some()
    }

    /// URIs of every synthetic directory, in listing order.
    pub fn uris(&self) -> Vec<String> {
        SYNTHETIC_DIRS.iter().map(|d| self.uri(d)).collect()
    }

    /// Fabricate a record for a synthetic directory from the root's record.
    ///
    /// Returns `None` for unknown URIs and while root metadata has not been
    /// fetched yet; the directory is then simply absent from the listing.
    pub fn synthesize(&self, root: Option<&RemoteItem>, uri: &str) -> Option<RemoteItem> {
        let dir = self.lookup(uri)?;
        let root = root?;

        Some(RemoteItem {
            title: dir.name.to_string(),
            editable: Some(false),
            owners: root.owners.clone(),
            mime_type: root.mime_type.clone(),
            modified_time: root.modified_date.clone().or_else(|| root.modified_time.clone()),
            created_date: root.created_date.clone(),
            self_link: Some(uri.to_string()),
            alternate_link: root.alternate_link.clone(),
            icon_link: root.icon_link.clone(),
            ..Default::default()
        })
    }
}
