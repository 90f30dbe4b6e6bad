//! Content sniffing for uploads.
//!
//! Only used to decide whether an upload without a recognised extension is
//! an office document the service can convert.

use std::io::Cursor;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PPTX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Office document mimes that trigger conversion when sniffed.
pub const OFFICE_MIMES: [&str; 3] = [XLSX_MIME, DOCX_MIME, PPTX_MIME];

/// File extensions converted without looking at the content.
pub const CONVERTIBLE_EXTENSIONS: [&str; 6] = ["docx", "xlsx", "pptx", "doc", "xls", "ppt"];

/// Detects the mime type of a byte buffer from its content.
pub trait ContentSniffer: Send + Sync {
    fn sniff(&self, data: &[u8]) -> Option<String>;
}

/// Recognises OOXML containers by their main part, plus a few common magic
/// numbers.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfficeSniffer;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Main part of each OOXML package type.
const OOXML_PARTS: [(&str, &str); 3] = [
    ("xl/workbook.xml", XLSX_MIME),
    ("word/document.xml", DOCX_MIME),
    ("ppt/presentation.xml", PPTX_MIME),
];

impl ContentSniffer for OfficeSniffer {
    fn sniff(&self, data: &[u8]) -> Option<String> {
        if data.starts_with(ZIP_MAGIC) {
            return Some(sniff_zip(data).unwrap_or("application/zip").to_string());
        }
        if data.starts_with(b"%PDF-") {
            return Some("application/pdf".to_string());
        }
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            return Some("image/png".to_string());
        }
        None
    }
}

fn sniff_zip(data: &[u8]) -> Option<&'static str> {
    let archive = match zip::ZipArchive::new(Cursor::new(data)) {
        Ok(archive) => archive,
        Err(e) => {
            log::debug!("Zip signature but unreadable archive: {}", e);
            return None;
        }
    };
    let names: Vec<&str> = archive.file_names().collect();
    OOXML_PARTS
        .iter()
        .find(|(part, _)| names.contains(part))
        .map(|(_, mime)| *mime)
}

/// How an upload should be presented to the service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadPlan {
    /// Ask the service to convert to a native document.
    pub convert: bool,
    /// Explicit mime for the metadata part.
    pub mime_override: Option<String>,
}

/// Lower-cased extension of `filename`, if it has one.
pub fn extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Decide conversion flag and mime override for an upload.
///
/// Sniffing only happens when conversion was requested and the extension
/// is not already a convertible one.
pub fn plan_upload(
    filename: &str,
    data: &[u8],
    convert: bool,
    sniffer: &dyn ContentSniffer,
) -> UploadPlan {
    if !convert {
        return UploadPlan::default();
    }

    if let Some(ext) = extension(filename) {
        if CONVERTIBLE_EXTENSIONS.contains(&ext.as_str()) {
            return UploadPlan {
                convert: true,
                mime_override: None,
            };
        }
    }

    match sniffer.sniff(data) {
        Some(mime) if OFFICE_MIMES.contains(&mime.as_str()) => {
            log::debug!("Sniffed {} as {}, converting", filename, mime);
            UploadPlan {
                convert: true,
                mime_override: Some(mime),
            }
        }
        _ => UploadPlan::default(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Sniffer that counts invocations and always answers the same thing.
    struct CountingSniffer {
        answer: Option<&'static str>,
        calls: AtomicU32,
    }

    impl CountingSniffer {
        fn new(answer: Option<&'static str>) -> Self {
            Self {
                answer,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl ContentSniffer for CountingSniffer {
        fn sniff(&self, _data: &[u8]) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.map(String::from)
        }
    }

    fn ooxml(part: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file("[Content_Types].xml", options).unwrap();
        writer.write_all(b"<Types/>").unwrap();
        writer.start_file(part, options).unwrap();
        writer.write_all(b"<root/>").unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_sniff_ooxml_parts() {
        let sniffer = OfficeSniffer;
        assert_eq!(sniffer.sniff(&ooxml("xl/workbook.xml")).as_deref(), Some(XLSX_MIME));
        assert_eq!(sniffer.sniff(&ooxml("word/document.xml")).as_deref(), Some(DOCX_MIME));
        assert_eq!(
            sniffer.sniff(&ooxml("ppt/presentation.xml")).as_deref(),
            Some(PPTX_MIME)
        );
        assert_eq!(
            sniffer.sniff(&ooxml("readme.txt")).as_deref(),
            Some("application/zip")
        );
    }

    #[test]
    fn test_sniff_other_content() {
        let sniffer = OfficeSniffer;
        assert_eq!(sniffer.sniff(b"%PDF-1.4 ...").as_deref(), Some("application/pdf"));
        assert_eq!(sniffer.sniff(b"hello"), None);
        assert_eq!(sniffer.sniff(b"PK\x03\x04garbage"), Some("application/zip".into()));
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("Budget.XLSX").as_deref(), Some("xlsx"));
        assert_eq!(extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension("README"), None);
        assert_eq!(extension("trailing."), None);
    }

    #[test]
    fn test_plan_without_conversion_never_sniffs() {
        let sniffer = CountingSniffer::new(Some(XLSX_MIME));
        let plan = plan_upload("sheet", b"data", false, &sniffer);
        assert_eq!(plan, UploadPlan::default());
        assert_eq!(sniffer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_plan_known_extension_skips_sniffing() {
        let sniffer = CountingSniffer::new(None);
        let plan = plan_upload("report.docx", b"data", true, &sniffer);
        assert!(plan.convert);
        assert!(plan.mime_override.is_none());
        assert_eq!(sniffer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_plan_sniffed_office_sets_override() {
        let plan = plan_upload("budget", &ooxml("xl/workbook.xml"), true, &OfficeSniffer);
        assert!(plan.convert);
        assert_eq!(plan.mime_override.as_deref(), Some(XLSX_MIME));
    }

    #[test]
    fn test_plan_unrecognised_content_uploads_unconverted() {
        let sniffer = CountingSniffer::new(Some("application/pdf"));
        let plan = plan_upload("scan.bin", b"%PDF-", true, &sniffer);
        assert_eq!(plan, UploadPlan::default());
        assert_eq!(sniffer.calls.load(Ordering::SeqCst), 1);
    }
}
