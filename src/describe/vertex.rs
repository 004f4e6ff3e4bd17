//! Vertex AI `generateContent` client.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::error::DescribeError;
use super::ContentGenerator;
use crate::auth::AuthorizedSession;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    InlineData {
        #[serde(rename = "mimeType")]
        mime_type: &'a str,
        data: String,
    },
    Text(&'a str),
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Regional endpoint for a location; `global` has no region prefix.
pub fn endpoint_for(location: &str) -> String {
    if location == "global" {
        "https://aiplatform.googleapis.com".to_string()
    } else {
        format!("https://{}-aiplatform.googleapis.com", location)
    }
}

pub struct VertexClient {
    session: AuthorizedSession,
    base_url: String,
    project_id: String,
    location: String,
    model: String,
}

impl VertexClient {
    pub fn new(session: AuthorizedSession, project_id: &str, location: &str, model: &str) -> Self {
        Self::with_base_url(session, &endpoint_for(location), project_id, location, model)
    }

    pub fn with_base_url(
        session: AuthorizedSession,
        base_url: &str,
        project_id: &str,
        location: &str,
        model: &str,
    ) -> Self {
        Self {
            session,
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            location: location.to_string(),
            model: model.to_string(),
        }
    }

    fn generate_url(&self) -> Result<url::Url, DescribeError> {
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|_| DescribeError::Endpoint(self.base_url.clone()))?;
        url.path_segments_mut()
            .map_err(|_| DescribeError::Endpoint(self.base_url.clone()))?
            .pop_if_empty()
            .extend([
                "v1",
                "projects",
                &self.project_id,
                "locations",
                &self.location,
                "publishers",
                "google",
                "models",
                &format!("{}:generateContent", self.model),
            ]);
        Ok(url)
    }
}

#[async_trait]
impl ContentGenerator for VertexClient {
    async fn generate(
        &self,
        bytes: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, DescribeError> {
        let request = GenerateRequest {
            contents: vec![
                Content {
                    role: "user",
                    parts: vec![Part::InlineData {
                        mime_type,
                        data: STANDARD.encode(bytes),
                    }],
                },
                Content {
                    role: "user",
                    parts: vec![Part::Text(prompt)],
                },
            ],
        };

        let url = self.generate_url()?;
        tracing::debug!(model = %self.model, bytes = bytes.len(), "Calling generateContent");
        let response = self
            .session
            .request(Method::POST, url.as_str())
            .await?
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DescribeError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| DescribeError::Decode(e.to_string()))?;
        Ok(body.text())
    }
}
