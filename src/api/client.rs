//! Drive REST client with bearer-token injection.
//!
//! Wraps a [`Transport`] together with the identity it acts for. Every
//! request carries `Authorization: Bearer <token>` obtained from the
//! injected [`CredentialProvider`].

use std::sync::Arc;

use reqwest::Method;

use super::auth::CredentialProvider;
use super::transport::{HttpRequest, Transport};
use super::types::{ItemList, ItemPatch, NewItem, ParentRef, RemoteItem, FOLDER_MIME};
use crate::config::DriveConfig;
use crate::error::{DriveError, Result};

/// HTTP client for one (endpoint, identity) pair.
pub struct DriveClient<T> {
    transport: T,
    credentials: Arc<dyn CredentialProvider>,
    user: String,
    api_url: String,
    upload_url: String,
}

impl<T: Transport> DriveClient<T> {
    pub fn new(
        transport: T,
        credentials: Arc<dyn CredentialProvider>,
        user: &str,
        config: &DriveConfig,
    ) -> Self {
        Self {
            transport,
            credentials,
            user: user.to_string(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            upload_url: config.upload_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Metadata URI of the item with the given id.
    pub fn item_uri(&self, id: &str) -> String {
        format!("{}/{}", self.api_url, urlencoding::encode(id))
    }

    fn authorize(&self, request: HttpRequest) -> Result<HttpRequest> {
        let token = self
            .credentials
            .access_token(&self.user)
            .ok_or_else(|| DriveError::NotAuthenticated(self.user.clone()))?;
        Ok(request.header("Authorization", format!("Bearer {}", token)))
    }

    /// GET the metadata record at `uri`.
    pub async fn get_item(&self, uri: &str) -> Result<RemoteItem> {
        let req = self.authorize(HttpRequest::new(Method::GET, uri))?;
        let resp = self.transport.get(req).await?.error_for_status()?;
        Ok(serde_json::from_slice(&resp.body)?)
    }

    /// Run a listing query, returning at most `max_results` items.
    ///
    /// Only the first page is fetched.
    pub async fn list(&self, query: &str, max_results: u32) -> Result<Vec<RemoteItem>> {
        let req = self.authorize(
            HttpRequest::new(Method::GET, self.api_url.as_str())
                .param("q", query)
                .param("maxResults", max_results.to_string()),
        )?;
        let resp = self.transport.get(req).await?.error_for_status()?;
        let list: ItemList = serde_json::from_slice(&resp.body)?;

        if list.next_page_token.is_some() {
            log::warn!(
                "Listing for {:?} exceeds {} items; remaining pages are not fetched",
                query,
                max_results
            );
        }
        Ok(list.items.unwrap_or_default())
    }

    /// PATCH an item's metadata (title and optionally parents).
    pub async fn patch_item(&self, id: &str, patch: &ItemPatch) -> Result<()> {
        let req = self.authorize(
            HttpRequest::new(Method::PATCH, self.item_uri(id))
                .header("Content-Type", "application/json; charset=UTF-8")
                .body(serde_json::to_vec(patch)?),
        )?;
        self.transport.patch(req).await?.error_for_status()?;
        Ok(())
    }

    /// Create a folder named `title` inside the folder `parent_id`.
    pub async fn create_folder(&self, parent_id: &str, title: &str) -> Result<()> {
        let body = NewItem {
            title: title.to_string(),
            parents: vec![ParentRef {
                id: parent_id.to_string(),
            }],
            mime_type: Some(FOLDER_MIME.to_string()),
        };
        let req = self.authorize(
            HttpRequest::new(Method::POST, self.api_url.as_str())
                .header("Content-Type", "application/json")
                .body(serde_json::to_vec(&body)?),
        )?;
        self.transport.post(req).await?.error_for_status()?;
        Ok(())
    }

    /// Move an item to the trash.
    pub async fn trash(&self, id: &str) -> Result<()> {
        let uri = format!("{}/trash", self.item_uri(id));
        let req = self.authorize(HttpRequest::new(Method::POST, uri))?;
        self.transport.post(req).await?.error_for_status()?;
        Ok(())
    }

    /// POST a prepared `multipart/related` body to the upload endpoint.
    pub async fn upload(&self, body: Vec<u8>, boundary: &str, convert: bool) -> Result<()> {
        let mut req = HttpRequest::new(Method::POST, self.upload_url.as_str())
            .param("uploadType", "multipart")
            .header(
                "Content-Type",
                format!("multipart/related; boundary=\"{}\"", boundary),
            )
            .body(body);
        if convert {
            req = req.param("convert", "true");
        }
        let req = self.authorize(req)?;
        self.transport.post(req).await?.error_for_status()?;
        Ok(())
    }

    /// Fetch raw content bytes from an export or download link.
    pub async fn download(&self, uri: &str) -> Result<Vec<u8>> {
        let req = self.authorize(HttpRequest::new(Method::GET, uri))?;
        let resp = self.transport.get(req).await?.error_for_status()?;
        Ok(resp.body)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::api::auth::StaticCredentials;
    use crate::api::transport::HttpResponse;

    /// Transport that records requests and replies with a fixed body.
    struct Recorder {
        reply: &'static str,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Transport for Recorder {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.seen.lock().unwrap().push(request);
            Ok(HttpResponse::ok(self.reply))
        }
    }

    fn client(reply: &'static str, creds: StaticCredentials) -> DriveClient<Recorder> {
        let transport = Recorder {
            reply,
            seen: Mutex::new(Vec::new()),
        };
        DriveClient::new(transport, Arc::new(creds), "alice", &DriveConfig::default())
    }

    #[test]
    fn test_item_uri_is_encoded() {
        let c = client("{}", StaticCredentials::new());
        assert_eq!(
            c.item_uri("a b/c"),
            "https://www.googleapis.com/drive/v2/files/a%20b%2Fc"
        );
    }

    #[tokio::test]
    async fn test_list_sends_query_and_token() {
        let c = client(
            r#"{"items":[{"id":"1","title":"a","mimeType":"text/plain"}]}"#,
            StaticCredentials::new().with_token("alice", "tok"),
        );
        let items = c.list("'p' in parents", 1000).await.unwrap();
        assert_eq!(items.len(), 1);

        let seen = c.transport().seen.lock().unwrap();
        assert_eq!(seen[0].method, Method::GET);
        assert_eq!(seen[0].param_value("q"), Some("'p' in parents"));
        assert_eq!(seen[0].param_value("maxResults"), Some("1000"));
        assert_eq!(seen[0].header_value("authorization"), Some("Bearer tok"));
    }

    #[tokio::test]
    async fn test_list_without_items_is_empty() {
        let c = client("{}", StaticCredentials::new().with_token("alice", "tok"));
        assert!(c.list("sharedWithMe", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_token_sends_nothing() {
        let c = client("{}", StaticCredentials::new());
        let err = c.trash("f1").await.unwrap_err();
        assert!(matches!(err, DriveError::NotAuthenticated(ref u) if u == "alice"));
        assert!(c.transport().seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_sets_convert_only_when_asked() {
        let c = client("{}", StaticCredentials::new().with_token("alice", "tok"));
        c.upload(b"x".to_vec(), "b", false).await.unwrap();
        c.upload(b"x".to_vec(), "b", true).await.unwrap();

        let seen = c.transport().seen.lock().unwrap();
        assert_eq!(seen[0].param_value("convert"), None);
        assert_eq!(seen[1].param_value("convert"), Some("true"));
        assert_eq!(seen[1].param_value("uploadType"), Some("multipart"));
        assert_eq!(
            seen[1].header_value("Content-Type"),
            Some("multipart/related; boundary=\"b\"")
        );
    }
}
