//! Translation of raw remote items into normalized metadata.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::DateTime;

use crate::api::types::RemoteItem;
use crate::error::{DriveError, Result};

/// Canonical per-object metadata derived from a [`RemoteItem`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMetadata {
    pub mime: String,
    /// Modification time, Unix ms.
    pub mtime: Option<i64>,
    /// Creation time, Unix ms.
    pub ctime: Option<i64>,
    pub owner: String,
    pub readable: bool,
    pub writable: bool,
    pub size: u64,
    /// The record this metadata was derived from.
    pub raw: RemoteItem,
}

impl NormalizedMetadata {
    pub fn modified(&self) -> Option<SystemTime> {
        self.mtime.map(to_system_time)
    }

    pub fn created(&self) -> Option<SystemTime> {
        self.ctime.map(to_system_time)
    }
}

/// Derive normalized metadata from a raw item. No network access.
///
/// Fails with `InvalidMime` when the item carries no mime type, since
/// handler dispatch depends on it.
pub fn translate(raw: &RemoteItem) -> Result<NormalizedMetadata> {
    let mime = match raw.mime_type.as_deref() {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => return Err(DriveError::InvalidMime(describe(raw))),
    };

    // Both timestamp spellings occur depending on the schema version.
    let modified = raw.modified_time.as_deref().or(raw.modified_date.as_deref());

    Ok(NormalizedMetadata {
        mime,
        mtime: parse_millis(modified),
        ctime: parse_millis(raw.created_date.as_deref()),
        owner: raw
            .owners
            .first()
            .map(|o| o.display_name.clone())
            .unwrap_or_default(),
        readable: true,
        writable: raw.editable.unwrap_or(false),
        size: raw.size(),
        raw: raw.clone(),
    })
}

fn parse_millis(value: Option<&str>) -> Option<i64> {
    let value = value?;
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => Some(dt.timestamp_millis()),
        Err(e) => {
            log::debug!("Unparseable timestamp {:?}: {}", value, e);
            None
        }
    }
}

fn to_system_time(ms: i64) -> SystemTime {
    if ms >= 0 {
        UNIX_EPOCH + Duration::from_millis(ms as u64)
    } else {
        UNIX_EPOCH - Duration::from_millis(ms.unsigned_abs())
    }
}

fn describe(raw: &RemoteItem) -> String {
    raw.self_link
        .clone()
        .or_else(|| raw.id.clone())
        .unwrap_or_else(|| raw.title.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::Owner;

    fn sample() -> RemoteItem {
        RemoteItem {
            id: Some("f1".into()),
            title: "report.pdf".into(),
            mime_type: Some("application/pdf".into()),
            modified_date: Some("2014-02-11T10:00:00.000Z".into()),
            created_date: Some("2014-02-10T10:00:00.000Z".into()),
            owners: vec![
                Owner { display_name: "A".into() },
                Owner { display_name: "B".into() },
            ],
            editable: Some(true),
            file_size: Some(serde_json::json!("2048")),
            ..Default::default()
        }
    }

    #[test]
    fn test_translate_fields() {
        let meta = translate(&sample()).unwrap();
        assert_eq!(meta.mime, "application/pdf");
        assert_eq!(meta.mtime, Some(1392112800000));
        assert_eq!(meta.ctime, Some(1392026400000));
        assert_eq!(meta.owner, "A");
        assert!(meta.readable);
        assert!(meta.writable);
        assert_eq!(meta.size, 2048);
        assert_eq!(meta.raw.id.as_deref(), Some("f1"));
    }

    #[test]
    fn test_translate_is_deterministic() {
        let raw = sample();
        assert_eq!(translate(&raw).unwrap(), translate(&raw).unwrap());
    }

    #[test]
    fn test_modified_time_preferred_over_modified_date() {
        let mut raw = sample();
        raw.modified_time = Some("2015-01-01T00:00:00Z".into());
        let meta = translate(&raw).unwrap();
        assert_eq!(meta.mtime, Some(1420070400000));

        raw.modified_date = None;
        assert_eq!(translate(&raw).unwrap().mtime, Some(1420070400000));
    }

    #[test]
    fn test_missing_optional_fields() {
        let raw = RemoteItem {
            mime_type: Some("text/plain".into()),
            ..Default::default()
        };
        let meta = translate(&raw).unwrap();
        assert_eq!(meta.size, 0);
        assert_eq!(meta.owner, "");
        assert!(!meta.writable);
        assert_eq!(meta.mtime, None);
    }

    #[test]
    fn test_missing_mime_is_error() {
        let mut raw = sample();
        raw.mime_type = None;
        assert!(matches!(translate(&raw), Err(DriveError::InvalidMime(_))));

        raw.mime_type = Some(String::new());
        assert!(matches!(translate(&raw), Err(DriveError::InvalidMime(_))));
    }

    #[test]
    fn test_bad_timestamp_is_absent() {
        let mut raw = sample();
        raw.modified_date = Some("yesterday".into());
        assert_eq!(translate(&raw).unwrap().mtime, None);
    }

    #[test]
    fn test_system_time_conversion() {
        let meta = translate(&sample()).unwrap();
        let modified = meta.modified().unwrap();
        assert_eq!(
            modified.duration_since(UNIX_EPOCH).unwrap().as_millis(),
            1392112800000
        );
    }
}
