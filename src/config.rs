//! Configuration surface: endpoint/limit settings, mount options and
//! per-call options.

use std::time::Duration;

/// Base endpoint for listing, metadata, create, patch and trash calls.
pub const DEFAULT_API_URL: &str = "https://www.googleapis.com/drive/v2/files";

/// Endpoint accepting multipart content uploads.
pub const DEFAULT_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v2/files";

/// Page size cap for a single listing request. Directories holding more
/// items than this are listed incompletely.
pub const DEFAULT_MAX_RESULTS: u32 = 1000;

/// Default memory budget for downloaded content (256 MiB).
pub const DEFAULT_CONTENT_CACHE_BYTES: usize = 256 * 1024 * 1024;

/// Export formats tried for rich documents when the caller names none.
pub const DEFAULT_EXPORT_FORMATS: [&str; 4] = ["docx", "xlsx", "pptx", "svg"];

/// Endpoint and cache settings shared by every filesystem instance.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub api_url: String,
    pub upload_url: String,
    pub max_results: u32,
    pub request_timeout: Duration,
    pub content_cache_bytes: usize,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            request_timeout: Duration::from_secs(120),
            content_cache_bytes: DEFAULT_CONTENT_CACHE_BYTES,
        }
    }
}

impl DriveConfig {
    /// Build a config from the environment, loading `.env` first if present.
    ///
    /// Honours `DRIVEFS_API_URL`, `DRIVEFS_UPLOAD_URL` and `DRIVEFS_MAX_RESULTS`.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        if let Ok(url) = std::env::var("DRIVEFS_API_URL") {
            config.api_url = url;
        }
        if let Ok(url) = std::env::var("DRIVEFS_UPLOAD_URL") {
            config.upload_url = url;
        }
        if let Ok(raw) = std::env::var("DRIVEFS_MAX_RESULTS") {
            match raw.parse::<u32>() {
                Ok(n) if n > 0 => config.max_results = n,
                _ => log::warn!("Ignoring invalid DRIVEFS_MAX_RESULTS={:?}", raw),
            }
        }
        config.api_url = config.api_url.trim_end_matches('/').to_string();
        config.upload_url = config.upload_url.trim_end_matches('/').to_string();
        config
    }

    /// URI identifying the drive root item.
    pub fn root_uri(&self) -> String {
        format!("{}/root", self.api_url.trim_end_matches('/'))
    }
}

/// How requests reach the remote service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TransportMode {
    #[default]
    Direct,
    /// Route every request through the given HTTP(S) proxy.
    Proxy(String),
}

/// Options supplied when a filesystem is mounted.
#[derive(Debug, Clone, Default)]
pub struct MountOptions {
    /// Authenticated identity whose bearer token is used.
    pub user: String,
    pub tx: TransportMode,
}

impl MountOptions {
    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            tx: TransportMode::Direct,
        }
    }
}

/// Options for reading content.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Acceptable export formats for rich documents, most preferred first.
    pub export_formats: Vec<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            export_formats: DEFAULT_EXPORT_FORMATS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Options for writing content.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Ask the service to convert office documents into native documents.
    pub convert: bool,
}
