//! JSON-over-HTTP record store and rule source client.
//!
//! Wire contract:
//! - `GET  {base}/courses/{id}` returns the course document; `ETag` header
//!   is used when the body has no `_etag`.
//! - `PUT  {base}/courses/{id}` with `If-Match` when the document carries a
//!   token; `409`/`412` mean the token is stale.
//! - `GET  {base}/institutes/{tenant}/grade-rules` returns an array of raw
//!   rule definitions.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ETAG, IF_MATCH};
use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::instrument;

use coursegrade_core::error::StoreError;
use coursegrade_core::model::{CourseDocument, RawGradingRule};
use coursegrade_core::traits::{GradeRuleSource, RecordStore};

use crate::check_key;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client for a remote record store.
pub struct HttpStore {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| StoreError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }

    fn course_url(&self, course_id: &str) -> Result<String, StoreError> {
        check_key(course_id)?;
        Ok(format!("{}/courses/{course_id}", self.base_url))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        self.authorized(request).send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout(DEFAULT_TIMEOUT_SECS)
            } else {
                StoreError::Network(e.to_string())
            }
        })
    }
}

/// Map a non-success response onto the store error taxonomy.
async fn status_error(response: Response, key: &str) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(key.to_string()),
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => StoreError::Conflict {
            key: key.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized(body),
        _ => StoreError::Backend {
            status: status.as_u16(),
            message: body,
        },
    }
}

fn etag_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Decode a course body, falling back to the header token.
async fn course_body(
    response: Response,
    fallback: Option<&CourseDocument>,
) -> Result<CourseDocument, StoreError> {
    let header_etag = etag_header(&response);
    let body = response
        .text()
        .await
        .map_err(|e| StoreError::Network(e.to_string()))?;

    let mut course = match fallback {
        Some(sent) if body.trim().is_empty() => CourseDocument {
            etag: None,
            ..sent.clone()
        },
        _ => serde_json::from_str::<CourseDocument>(&body)?,
    };
    if course.etag.is_none() {
        course.etag = header_etag;
    }
    Ok(course)
}

#[async_trait]
impl RecordStore for HttpStore {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn read_course(&self, course_id: &str) -> Result<CourseDocument, StoreError> {
        let url = self.course_url(course_id)?;
        let response = self.send(self.client.get(url)).await?;
        if !response.status().is_success() {
            return Err(status_error(response, course_id).await);
        }
        course_body(response, None).await
    }

    #[instrument(skip(self, course), fields(base_url = %self.base_url, course_id = %course.id))]
    async fn write_course(&self, course: &CourseDocument) -> Result<CourseDocument, StoreError> {
        let url = self.course_url(&course.id)?;
        let mut request = self.client.put(url).json(course);
        if let Some(etag) = &course.etag {
            request = request.header(IF_MATCH, etag);
        }

        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(status_error(response, &course.id).await);
        }
        course_body(response, Some(course)).await
    }
}

#[async_trait]
impl GradeRuleSource for HttpStore {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn grade_rules(&self, tenant_id: &str) -> Result<Vec<RawGradingRule>, StoreError> {
        check_key(tenant_id)?;
        let url = format!("{}/institutes/{tenant_id}/grade-rules", self.base_url);
        let response = self.send(self.client.get(url)).await?;
        if !response.status().is_success() {
            return Err(status_error(response, tenant_id).await);
        }
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }
}
