//! Mock publisher implementation for testing
//!
//! A configurable publisher that can script a sequence of upload outcomes
//! (success, quota, network failure, rejection) and records every call for
//! verification, so scheduler behavior can be tested without platform
//! credentials or network access.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncReadExt;

use crate::error::{PlatformError, Result};
use crate::media::MediaObject;
use crate::platforms::{Publisher, UploadMetadata};
use crate::types::{Credential, Platform};

/// One recorded upload attempt
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub owner_uid: String,
    pub access_token: String,
    pub title: String,
    pub media_len: u64,
}

/// Scripted outcome for one upload call
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Success(String),
    Quota,
    Network,
    Rejected,
}

#[derive(Clone, Default)]
pub struct MockPublisher {
    outcomes: Arc<Mutex<VecDeque<MockOutcome>>>,
    uploads: Arc<Mutex<Vec<RecordedUpload>>>,
    delay: std::time::Duration,
}

impl MockPublisher {
    /// A publisher that succeeds on every call with a generated id
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// A publisher that plays `outcomes` in order, then succeeds
    pub fn with_outcomes(outcomes: Vec<MockOutcome>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into())),
            ..Self::default()
        }
    }

    /// Delay each upload call (simulates a slow or hung platform)
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of upload calls made so far
    pub fn upload_call_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    /// All recorded upload attempts
    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn name(&self) -> &str {
        "mock"
    }

    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn upload(
        &self,
        credential: &Credential,
        mut media: MediaObject,
        metadata: &UploadMetadata,
    ) -> Result<String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        // Drain the stream so a test exercises the same media-resolution
        // path the real publisher does
        let mut contents = Vec::new();
        media
            .reader
            .read_to_end(&mut contents)
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        self.uploads.lock().unwrap().push(RecordedUpload {
            owner_uid: credential.owner_uid.clone(),
            access_token: credential.access_token.clone(),
            title: metadata.title.clone(),
            media_len: contents.len() as u64,
        });

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| MockOutcome::Success(format!("mock-{}", uuid::Uuid::new_v4())));

        match outcome {
            MockOutcome::Success(id) => Ok(id),
            MockOutcome::Quota => {
                Err(PlatformError::Quota("mock quota exceeded".to_string()).into())
            }
            MockOutcome::Network => {
                Err(PlatformError::Network("mock network failure".to_string()).into())
            }
            MockOutcome::Rejected => {
                Err(PlatformError::Rejected("mock permanent rejection".to_string()).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn credential() -> Credential {
        Credential {
            owner_uid: "user-1".to_string(),
            platform: Platform::Youtube,
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + chrono::Duration::hours(1),
            scopes: vec![],
            updated_at: Utc::now(),
        }
    }

    fn media(bytes: &'static [u8]) -> MediaObject {
        MediaObject {
            reader: Box::new(bytes),
            len: bytes.len() as u64,
            content_type: "video/mp4".to_string(),
        }
    }

    fn metadata() -> UploadMetadata {
        UploadMetadata {
            title: "Clip".to_string(),
            description: String::new(),
            keywords: vec![],
            category: "22".to_string(),
            privacy_status: crate::types::PrivacyStatus::Private,
        }
    }

    #[tokio::test]
    async fn test_succeeding_records_upload() {
        let publisher = MockPublisher::succeeding();

        let id = publisher
            .upload(&credential(), media(b"bytes"), &metadata())
            .await
            .unwrap();
        assert!(id.starts_with("mock-"));

        let uploads = publisher.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].owner_uid, "user-1");
        assert_eq!(uploads[0].media_len, 5);
        assert_eq!(uploads[0].title, "Clip");
    }

    #[tokio::test]
    async fn test_scripted_outcomes_play_in_order() {
        let publisher = MockPublisher::with_outcomes(vec![
            MockOutcome::Quota,
            MockOutcome::Success("vid-1".to_string()),
        ]);

        let first = publisher
            .upload(&credential(), media(b"x"), &metadata())
            .await;
        assert!(matches!(
            first,
            Err(crate::LatercastError::Platform(PlatformError::Quota(_)))
        ));

        let second = publisher
            .upload(&credential(), media(b"x"), &metadata())
            .await
            .unwrap();
        assert_eq!(second, "vid-1");
        assert_eq!(publisher.upload_call_count(), 2);
    }
}
