//! Remote protocol layer.
//!
//! Provides the HTTP transaction abstraction, bearer-token credentials, the
//! Drive REST client and the request/response types it exchanges.

pub mod auth;
pub mod client;
pub mod transport;
pub mod types;

pub use auth::{CredentialProvider, KeyringCredentials, StaticCredentials};
pub use client::DriveClient;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Transport};
pub use types::{RemoteItem, FOLDER_MIME};
