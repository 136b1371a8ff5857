//! YouTube upload client
//!
//! Submits the draft metadata and media stream as one multipart request to
//! the videos endpoint. The upload URL is configurable so tests can point
//! the publisher at a local server.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::error::{PlatformError, Result};
use crate::media::MediaObject;
use crate::platforms::{Publisher, UploadMetadata};
use crate::types::{Credential, Platform};

const DEFAULT_UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: String,
}

pub struct YoutubePublisher {
    http: reqwest::Client,
    upload_url: String,
}

impl Default for YoutubePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl YoutubePublisher {
    pub fn new() -> Self {
        Self::with_upload_url(DEFAULT_UPLOAD_URL)
    }

    pub fn with_upload_url(upload_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            upload_url: upload_url.to_string(),
        }
    }

    fn metadata_body(metadata: &UploadMetadata) -> serde_json::Value {
        serde_json::json!({
            "snippet": {
                "title": metadata.title,
                "description": metadata.description,
                "tags": metadata.keywords,
                "categoryId": metadata.category,
            },
            "status": {
                "privacyStatus": metadata.privacy_status.as_str(),
            },
        })
    }

    /// Map a non-success platform response onto the error taxonomy.
    ///
    /// Quota exhaustion arrives as a 403 whose body names the reason, so the
    /// body text is consulted before a 403 is treated as a plain rejection.
    fn classify_response(status: reqwest::StatusCode, body: &str) -> PlatformError {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return PlatformError::Authentication(format!("{}: {}", status, body));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return PlatformError::Quota(format!("{}: {}", status, body));
        }
        if status == reqwest::StatusCode::FORBIDDEN {
            if body.contains("quotaExceeded") || body.contains("rateLimitExceeded") {
                return PlatformError::Quota(format!("{}: {}", status, body));
            }
            return PlatformError::Rejected(format!("{}: {}", status, body));
        }
        if status.is_client_error() {
            return PlatformError::Rejected(format!("{}: {}", status, body));
        }
        PlatformError::Network(format!("{}: {}", status, body))
    }
}

#[async_trait]
impl Publisher for YoutubePublisher {
    fn name(&self) -> &str {
        "youtube"
    }

    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn upload(
        &self,
        credential: &Credential,
        media: MediaObject,
        metadata: &UploadMetadata,
    ) -> Result<String> {
        let body = Self::metadata_body(metadata);

        let metadata_part = reqwest::multipart::Part::text(body.to_string())
            .mime_str("application/json")
            .map_err(|e| PlatformError::Validation(e.to_string()))?;

        let stream = ReaderStream::new(media.reader);
        let media_part =
            reqwest::multipart::Part::stream_with_length(reqwest::Body::wrap_stream(stream), media.len)
                .mime_str(&media.content_type)
                .map_err(|e| PlatformError::Validation(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("metadata", metadata_part)
            .part("media", media_part);

        let resp = self
            .http
            .post(&self.upload_url)
            .query(&[("uploadType", "multipart"), ("part", "snippet,status")])
            .bearer_auth(&credential.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::classify_response(status, &body).into());
        }

        let inserted: InsertResponse = resp
            .json()
            .await
            .map_err(|e| PlatformError::Network(format!("malformed insert response: {}", e)))?;

        Ok(inserted.id)
    }
}
