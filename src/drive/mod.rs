//! Google Drive v3: folder listing filtered by MIME type, and content
//! download.

pub mod error;
pub mod types;

use async_trait::async_trait;
use reqwest::Method;
use url::Url;

use self::error::DriveError;
pub use self::types::Asset;
use self::types::FileList;
use crate::auth::AuthorizedSession;

pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Drive caps `pageSize` at 1000.
const PAGE_SIZE: u32 = 1000;
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, size)";

/// Where assets come from. [`DriveClient`] is the production source; the
/// pipeline only depends on this trait.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Direct children of `folder_id` whose MIME type is in `mime_types`.
    async fn list_assets(
        &self,
        folder_id: &str,
        mime_types: &[String],
    ) -> Result<Vec<Asset>, DriveError>;

    /// Full content of one asset.
    async fn download(&self, asset: &Asset) -> Result<Vec<u8>, DriveError>;
}

pub struct DriveClient {
    session: AuthorizedSession,
    base_url: String,
}

impl DriveClient {
    pub fn new(session: AuthorizedSession) -> Self {
        Self::with_base_url(session, DRIVE_API_BASE)
    }

    pub fn with_base_url(session: AuthorizedSession, base_url: &str) -> Self {
        Self {
            session,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn files_url(&self, file_id: Option<&str>) -> Result<Url, DriveError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|_| DriveError::Endpoint(self.base_url.clone()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| DriveError::Endpoint(self.base_url.clone()))?;
            segments.pop_if_empty().push("files");
            if let Some(id) = file_id {
                segments.push(id);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl AssetSource for DriveClient {
    async fn list_assets(
        &self,
        folder_id: &str,
        mime_types: &[String],
    ) -> Result<Vec<Asset>, DriveError> {
        let query = build_query(folder_id, mime_types);
        let mut assets = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let mut url = self.files_url(None)?;
            {
                let mut q = url.query_pairs_mut();
                q.append_pair("q", &query)
                    .append_pair("pageSize", &PAGE_SIZE.to_string())
                    .append_pair("fields", LIST_FIELDS);
                if let Some(token) = &page_token {
                    q.append_pair("pageToken", token);
                }
            }

            let response = self
                .session
                .request(Method::GET, url.as_str())
                .await?
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(DriveError::ListStatus {
                    status: status.as_u16(),
                    folder: folder_id.to_string(),
                    message,
                });
            }

            let page: FileList = response.json().await?;
            pages += 1;
            assets.extend(
                page.files
                    .into_iter()
                    .map(Asset::from)
                    .filter(|a| mime_types.iter().any(|m| *m == a.mime_type)),
            );

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::info!(
            pages,
            "{} has {} files matching {}",
            folder_id,
            assets.len(),
            query
        );
        Ok(assets)
    }

    async fn download(&self, asset: &Asset) -> Result<Vec<u8>, DriveError> {
        let mut url = self.files_url(Some(&asset.id))?;
        url.query_pairs_mut().append_pair("alt", "media");

        let response = self
            .session
            .request(Method::GET, url.as_str())
            .await?
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DriveError::DownloadStatus {
                status: status.as_u16(),
                name: asset.name.clone(),
            });
        }

        let bytes = response.bytes().await.map_err(|source| DriveError::Body {
            name: asset.name.clone(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}

/// `'<folder>' in parents and (mimeType = 'a' or mimeType = 'b')`
fn build_query(folder_id: &str, mime_types: &[String]) -> String {
    let mime_query = mime_types
        .iter()
        .map(|m| format!("mimeType = '{}'", escape_query_value(m)))
        .collect::<Vec<_>>()
        .join(" or ");
    format!(
        "'{}' in parents and ({})",
        escape_query_value(folder_id),
        mime_query
    )
}

/// Drive query string literals escape `\` and `'` with a backslash.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> DriveClient {
        let session = AuthorizedSession::with_static_token(reqwest::Client::new(), "ya29.test");
        DriveClient::with_base_url(session, &format!("{}/drive/v3", server.uri()))
    }

    fn mimes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_query() {
        let q = build_query("FOLDER", &mimes(&["image/jpeg", "image/png"]));
        assert_eq!(
            q,
            "'FOLDER' in parents and (mimeType = 'image/jpeg' or mimeType = 'image/png')"
        );
    }

    #[test]
    fn test_build_query_escapes_quotes() {
        let q = build_query("it's", &mimes(&["a\\b"]));
        assert_eq!(q, "'it\\'s' in parents and (mimeType = 'a\\\\b')");
    }

    #[tokio::test]
    async fn test_list_filters_by_mime_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param("pageSize", "1000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [
                    {"id": "1", "name": "a.jpg", "mimeType": "image/jpeg"},
                    {"id": "2", "name": "b.gif", "mimeType": "image/gif"},
                    {"id": "3", "name": "c.png", "mimeType": "image/png"}
                ]
            })))
            .mount(&server)
            .await;

        let assets = client(&server)
            .list_assets("F", &mimes(&["image/jpeg", "image/png"]))
            .await
            .unwrap();
        let ids: Vec<&str> = assets.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_list_follows_page_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param_is_missing("pageToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nextPageToken": "page-2",
                "files": [{"id": "1", "name": "a.jpg", "mimeType": "image/jpeg"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [{"id": "2", "name": "b.jpg", "mimeType": "image/jpeg", "size": "10"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let assets = client(&server)
            .list_assets("F", &mimes(&["image/jpeg"]))
            .await
            .unwrap();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[1].size, Some(10));
    }

    #[tokio::test]
    async fn test_list_failure_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(403).set_body_string("insufficient scopes"))
            .mount(&server)
            .await;

        let err = client(&server)
            .list_assets("F", &mimes(&["image/jpeg"]))
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::ListStatus { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_download_returns_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/abc"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3, 4]))
            .mount(&server)
            .await;

        let asset = Asset {
            id: "abc".into(),
            name: "x.jpg".into(),
            mime_type: "image/jpeg".into(),
            size: None,
        };
        let bytes = client(&server).download(&asset).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_download_non_success_is_transfer_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let asset = Asset {
            id: "gone".into(),
            name: "gone.jpg".into(),
            mime_type: "image/jpeg".into(),
            size: None,
        };
        let err = client(&server).download(&asset).await.unwrap_err();
        assert!(matches!(err, DriveError::DownloadStatus { status: 404, .. }));
    }
}
