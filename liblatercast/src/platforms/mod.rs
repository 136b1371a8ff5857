//! Publishing-platform abstraction and implementations
//!
//! Each publisher turns a draft's metadata plus its media stream into one
//! upload call against a platform API, and classifies the platform's
//! responses into the `PlatformError` taxonomy so the scheduler can decide
//! between retry, quota re-auth, and terminal failure.

use async_trait::async_trait;

use crate::error::Result;
use crate::media::MediaObject;
use crate::types::{Credential, Draft, Platform, PrivacyStatus};

pub mod youtube;

// Mock publisher is available for all builds (not just tests) to support
// integration tests
pub mod mock;

/// Metadata submitted alongside the media stream
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub category: String,
    pub privacy_status: PrivacyStatus,
}

impl UploadMetadata {
    pub fn from_draft(draft: &Draft) -> Self {
        Self {
            title: draft.title.clone(),
            description: draft.description.clone(),
            keywords: draft.keywords.clone(),
            category: draft.category.clone(),
            privacy_status: draft.privacy_status,
        }
    }
}

/// Platform upload client.
///
/// `upload` is a single atomic request from this system's point of view:
/// either the platform accepts the whole submission and returns the created
/// object's id, or nothing was applied and no compensating action is needed.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Lowercase platform identifier (e.g., "youtube")
    fn name(&self) -> &str;

    /// The platform this publisher serves
    fn platform(&self) -> Platform;

    /// Upload the media stream with its metadata on behalf of the
    /// credential's owner, returning the platform-assigned object id.
    ///
    /// # Errors
    ///
    /// Returns a `PlatformError` classified at this boundary:
    /// - `Quota` for rate/quota exhaustion (caller may re-auth and retry once)
    /// - `Authentication` / `Network` for conditions worth retrying later
    /// - `Rejected` for content the platform will never accept as-is
    async fn upload(
        &self,
        credential: &Credential,
        media: MediaObject,
        metadata: &UploadMetadata,
    ) -> Result<String>;
}
