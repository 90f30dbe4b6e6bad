//! Request and response types for the Drive v2 REST API.
//!
//! All structs use camelCase serialization to match the API's JSON format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Mime type the service uses for folders.
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// Owner entry of a remote item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    #[serde(default)]
    pub display_name: String,
}

/// Reference to a parent folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub id: String,
}

/// Raw record for one remote object (folder or file).
///
/// Fields the adapter does not interpret are kept in `extra` so the record
/// can be handed back verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_date: Option<String>,
    /// Newer schema spelling of the modification timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(default)]
    pub owners: Vec<Owner>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
    /// Sent as a decimal string by the service, occasionally as a number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_link: Option<String>,
    #[serde(default)]
    pub parents: Vec<ParentRef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub export_links: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RemoteItem {
    /// Numeric size, tolerating both string and number encodings.
    pub fn size(&self) -> u64 {
        match &self.file_size {
            Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME)
    }
}

/// Response from a listing query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemList {
    #[serde(default)]
    pub items: Option<Vec<RemoteItem>>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Metadata patch body for rename/move.
#[derive(Debug, Serialize)]
pub struct ItemPatch {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<ParentRef>>,
}

/// Body for creating an item (folders, and the metadata part of uploads).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub title: String,
    pub parents: Vec<ParentRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_item_deserialization() {
        let json = r#"{
            "id": "0B1",
            "title": "notes.txt",
            "mimeType": "text/plain",
            "modifiedDate": "2014-02-11T10:00:00.000Z",
            "createdDate": "2014-02-10T10:00:00.000Z",
            "owners": [{"displayName": "A"}],
            "editable": true,
            "fileSize": "1234",
            "selfLink": "https://www.googleapis.com/drive/v2/files/0B1",
            "parents": [{"id": "root0", "isRoot": true}],
            "md5Checksum": "abc"
        }"#;

        let item: RemoteItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.id.as_deref(), Some("0B1"));
        assert_eq!(item.size(), 1234);
        assert_eq!(item.owners[0].display_name, "A");
        assert_eq!(item.parents, vec![ParentRef { id: "root0".into() }]);
        assert_eq!(item.extra.get("md5Checksum"), Some(&serde_json::json!("abc")));
    }

    #[test]
    fn test_size_variants() {
        let mut item = RemoteItem::default();
        assert_eq!(item.size(), 0);
        item.file_size = Some(serde_json::json!(77));
        assert_eq!(item.size(), 77);
        item.file_size = Some(serde_json::json!("oops"));
        assert_eq!(item.size(), 0);
    }

    #[test]
    fn test_patch_omits_unchanged_parents() {
        let patch = ItemPatch {
            title: "b.txt".into(),
            parents: None,
        };
        assert_eq!(serde_json::to_string(&patch).unwrap(), r#"{"title":"b.txt"}"#);
    }

    #[test]
    fn test_new_folder_serialization() {
        let body = NewItem {
            title: "docs".into(),
            parents: vec![ParentRef { id: "p1".into() }],
            mime_type: Some(FOLDER_MIME.into()),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"mimeType\":\"application/vnd.google-apps.folder\""));
        assert!(json.contains("\"parents\":[{\"id\":\"p1\"}]"));
    }
}
