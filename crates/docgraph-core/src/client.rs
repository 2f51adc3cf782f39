//! HTTP client for the document graph API.

use std::collections::VecDeque;

use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::graph::GraphSnapshot;
use crate::stream::{FrameDecoder, StreamFrame};
use crate::upload::FileSelection;

#[derive(Serialize)]
struct QueryRequest<'a> {
    text: &'a str,
}

/// Short-circuit answer sent as plain JSON instead of an event stream.
#[derive(Deserialize)]
struct DirectAnswer {
    response: String,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub neo4j: Option<String>,
}

/// Server reply to a successful upload. Only used for logging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub doc_id: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn upload_document(&self, file: &FileSelection) -> Result<UploadReceipt, ApiError> {
        let bytes = match &file.path {
            Some(path) => tokio::fs::read(path).await.map_err(|source| ApiError::Io {
                path: path.clone(),
                source,
            })?,
            None => {
                return Err(ApiError::Io {
                    path: file.name.clone().into(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "file has no path"),
                })
            }
        };

        let part = Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(&file.media_type)?;
        let form = Form::new().part("file", part);

        debug!(name = %file.name, size = file.size, "uploading document");
        let response = self
            .client
            .post(self.url("/documents"))
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;

        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(UploadReceipt::default());
        }
        // The success body is informational; an odd shape is not a failure.
        Ok(serde_json::from_slice(&body).unwrap_or_default())
    }

    pub async fn query(&self, text: &str) -> Result<QueryStream, ApiError> {
        let response = self
            .client
            .post(self.url("/query"))
            .json(&QueryRequest { text })
            .send()
            .await?;
        let response = check_status(response).await?;
        QueryStream::open(response).await
    }

    pub async fn graph(&self) -> Result<GraphSnapshot, ApiError> {
        let response = self.client.get(self.url("/graph")).send().await?;
        let response = check_status(response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        let response = self.client.get(self.url("/health")).send().await?;
        let response = check_status(response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Turn a non-2xx response into `ApiError::Rejected`, keeping whatever the
/// body says about the failure.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let detail = body.detail.map(|value| match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    });

    Err(ApiError::Rejected {
        status,
        detail,
        code: body.code,
    })
}

/// Incremental reader over a `/query` answer.
pub struct QueryStream {
    response: Option<Response>,
    decoder: FrameDecoder,
    ready: VecDeque<StreamFrame>,
}

impl QueryStream {
    async fn open(response: Response) -> Result<Self, ApiError> {
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        if !is_json {
            return Ok(Self {
                response: Some(response),
                decoder: FrameDecoder::new(),
                ready: VecDeque::new(),
            });
        }

        let body = response.bytes().await?;
        let answer: DirectAnswer = serde_json::from_slice(&body)?;
        debug!("query answered without streaming");
        Ok(Self {
            response: None,
            decoder: FrameDecoder::new(),
            ready: VecDeque::from([StreamFrame::Chunk(answer.response)]),
        })
    }

    /// Next decoded frame, or `None` once the body has closed.
    pub async fn next_frame(&mut self) -> Result<Option<StreamFrame>, ApiError> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(Some(frame));
            }
            let Some(response) = self.response.as_mut() else {
                return Ok(None);
            };
            match response.chunk().await? {
                Some(bytes) => self.ready.extend(self.decoder.push(&bytes)),
                None => {
                    self.response = None;
                    self.ready.extend(self.decoder.finish());
                    if self.decoder.skipped() > 0 {
                        debug!(skipped = self.decoder.skipped(), "query stream closed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("http://localhost:8000/api/");
        assert_eq!(client.base_url(), "http://localhost:8000/api");
        assert_eq!(client.url("/graph"), "http://localhost:8000/api/graph");
    }

    #[test]
    fn test_error_body_shapes() {
        let body: ErrorBody = serde_json::from_str(r#"{"detail": "boom", "code": "x"}"#).unwrap();
        assert_eq!(body.code.as_deref(), Some("x"));
        assert_eq!(body.detail, Some(serde_json::Value::String("boom".into())));

        let body: ErrorBody = serde_json::from_str(r#"{"detail": [{"msg": "field required"}]}"#).unwrap();
        assert!(body.detail.unwrap().is_array());
    }

    #[test]
    fn test_health_shape() {
        let health: HealthStatus =
            serde_json::from_str(r#"{"status": "healthy", "neo4j": "connected"}"#).unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.neo4j.as_deref(), Some("connected"));
    }
}
