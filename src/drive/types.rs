use serde::Deserialize;

/// A file in the source folder, as reported by Drive.
///
/// Read-only projection of remote metadata. The byte length written to the
/// report comes from the downloaded content, not from `size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: Option<u64>,
}

/// One page of a `files.list` response.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// A `File` resource restricted to the fields we request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    /// int64 values arrive as JSON strings.
    #[serde(default)]
    pub size: Option<String>,
}

impl From<DriveFile> for Asset {
    fn from(f: DriveFile) -> Self {
        Asset {
            size: f.size.as_deref().and_then(|s| s.parse().ok()),
            id: f.id,
            name: f.name,
            mime_type: f.mime_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_list_deserialize() {
        let page: FileList = serde_json::from_str(
            r#"{"nextPageToken":"tok","files":[
                {"id":"1","name":"a.jpg","mimeType":"image/jpeg","size":"2048"},
                {"id":"2","name":"b.png","mimeType":"image/png"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("tok"));
        let assets: Vec<Asset> = page.files.into_iter().map(Asset::from).collect();
        assert_eq!(assets[0].size, Some(2048));
        assert_eq!(assets[1].size, None);
        assert_eq!(assets[1].mime_type, "image/png");
    }

    #[test]
    fn test_empty_page() {
        let page: FileList = serde_json::from_str("{}").unwrap();
        assert!(page.files.is_empty());
        assert!(page.next_page_token.is_none());
    }
}
