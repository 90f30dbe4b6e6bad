//! Filesystem-instance registry.
//!
//! Hands out one [`DriveFs`] per (endpoint URI, user) pair so repeated
//! lookups share node and content caches. Mounting always creates a fresh
//! instance, which then replaces the registered one for that pair.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::api::auth::CredentialProvider;
use crate::api::client::DriveClient;
use crate::api::transport::{HttpTransport, Transport};
use crate::config::{DriveConfig, MountOptions};
use crate::error::{DriveError, Result};
use crate::vfs::DriveFs;

/// Builds the transport for a new instance from its config and mount options.
pub type TransportFactory<T> =
    Box<dyn Fn(&DriveConfig, &MountOptions) -> Result<T> + Send + Sync>;

type Key = (String, String);

pub struct FsRegistry<T> {
    config: DriveConfig,
    credentials: Arc<dyn CredentialProvider>,
    make_transport: TransportFactory<T>,
    filesystems: Mutex<HashMap<Key, Arc<DriveFs<T>>>>,
}

impl FsRegistry<HttpTransport> {
    /// Registry whose instances talk HTTP via reqwest.
    pub fn http(config: DriveConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self::new(
            config,
            credentials,
            Box::new(|config: &DriveConfig, mount: &MountOptions| {
                HttpTransport::new(config, &mount.tx)
            }),
        )
    }
}

impl<T: Transport> FsRegistry<T> {
    pub fn new(
        config: DriveConfig,
        credentials: Arc<dyn CredentialProvider>,
        make_transport: TransportFactory<T>,
    ) -> Self {
        Self {
            config,
            credentials,
            make_transport,
            filesystems: Mutex::new(HashMap::new()),
        }
    }

    /// Instance for `uri` acting as `opts.user`.
    ///
    /// With `mount` a new instance is always created and registered;
    /// otherwise an existing instance is reused when there is one.
    /// Fails with `NotAuthenticated` when the user has no token.
    pub async fn lookup_fs(
        &self,
        uri: &str,
        opts: &MountOptions,
        mount: bool,
    ) -> Result<Arc<DriveFs<T>>> {
        let key = (uri.trim_end_matches('/').to_string(), opts.user.clone());
        let mut filesystems = self.filesystems.lock().await;

        if !mount {
            if let Some(fs) = filesystems.get(&key) {
                log::debug!("Reusing filesystem for {} at {}", key.1, key.0);
                return Ok(fs.clone());
            }
        }

        let fs = Arc::new(self.create_fs(&key.0, opts)?);
        filesystems.insert(key, fs.clone());
        Ok(fs)
    }

    fn create_fs(&self, uri: &str, opts: &MountOptions) -> Result<DriveFs<T>> {
        if self.credentials.access_token(&opts.user).is_none() {
            return Err(DriveError::NotAuthenticated(opts.user.clone()));
        }

        let mut config = self.config.clone();
        if !uri.is_empty() {
            config.api_url = uri.to_string();
        }
        let transport = (self.make_transport)(&config, opts)?;
        let client = DriveClient::new(transport, self.credentials.clone(), &opts.user, &config);
        Ok(DriveFs::new(client, config))
    }

    /// Drop the registered instance for (`uri`, `user`).
    pub async fn forget(&self, uri: &str, user: &str) -> Option<Arc<DriveFs<T>>> {
        let key = (uri.trim_end_matches('/').to_string(), user.to_string());
        self.filesystems.lock().await.remove(&key)
    }

    pub async fn len(&self) -> usize {
        self.filesystems.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.filesystems.lock().await.is_empty()
    }
}
