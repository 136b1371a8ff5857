//! Draft service for authoring and managing scheduled drafts
//!
//! CRUD operations for the owner-facing surface. Media and metadata must
//! not diverge: an orphaned media object is acceptable, a draft record
//! pointing at nothing is not, so deletes go media-first and creates store
//! the media object before the record.

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{Database, DraftUpdate};
use crate::error::{LatercastError, Result};
use crate::media::MediaStore;
use crate::types::{Draft, DraftStatus, NewDraft};

/// A media payload submitted by the owner
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub struct DraftService {
    db: Database,
    media: Arc<dyn MediaStore>,
}

impl DraftService {
    pub fn new(db: Database, media: Arc<dyn MediaStore>) -> Self {
        Self { db, media }
    }

    /// Create a draft: validate, store the media object, then the record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for missing or malformed fields before any
    /// state change; store and media errors propagate.
    pub async fn create(
        &self,
        owner_uid: &str,
        new: NewDraft,
        media: MediaUpload,
    ) -> Result<Draft> {
        validate_new(owner_uid, &new, &media)?;

        let key = self.media_key(owner_uid, &media.filename)?;
        let media_url = self
            .media
            .put(&key, &media.bytes, &media.content_type)
            .await?;

        let draft = Draft::new(owner_uid, new, media_url);
        self.db.create_draft(&draft).await?;

        info!(draft_id = %draft.draft_id, owner_uid, "draft created");
        Ok(draft)
    }

    /// List all drafts belonging to one owner
    pub async fn list(&self, owner_uid: &str) -> Result<Vec<Draft>> {
        self.db.list_drafts(owner_uid).await
    }

    /// Get a single draft by id
    pub async fn get(&self, owner_uid: &str, draft_id: &str) -> Result<Option<Draft>> {
        self.db.get_draft(owner_uid, draft_id).await
    }

    /// Update a draft's content, optionally replacing its media object.
    ///
    /// Only legal while the draft is still in `draft` status. On media
    /// replacement the new object is stored first, the record repointed,
    /// and only then the old object removed (not-found tolerated).
    pub async fn update(
        &self,
        owner_uid: &str,
        draft_id: &str,
        fields: NewDraft,
        media: Option<MediaUpload>,
    ) -> Result<Draft> {
        let existing = self
            .db
            .get_draft(owner_uid, draft_id)
            .await?
            .ok_or_else(|| LatercastError::InvalidInput(format!("Draft not found: {}", draft_id)))?;

        if existing.status != DraftStatus::Draft {
            return Err(LatercastError::InvalidInput(format!(
                "Draft {} is {} and can no longer be edited",
                draft_id, existing.status
            )));
        }

        let new_media_url = match &media {
            Some(upload) => {
                let key = self.media_key(owner_uid, &upload.filename)?;
                Some(self.media.put(&key, &upload.bytes, &upload.content_type).await?)
            }
            None => None,
        };

        let update = DraftUpdate {
            title: fields.title,
            description: fields.description,
            keywords: fields.keywords,
            category: fields.category,
            privacy_status: fields.privacy_status,
            platform: fields.platform,
            scheduled_time: fields.scheduled_time,
            media_url: new_media_url
                .clone()
                .unwrap_or_else(|| existing.media_url.clone()),
        };

        let applied = self
            .db
            .update_draft_content(owner_uid, draft_id, &update)
            .await?;
        if !applied {
            // Claimed between the read above and the write; the record is
            // no longer editable, drop the freshly stored object
            if let Some(url) = &new_media_url {
                self.remove_media_object(url).await;
            }
            return Err(LatercastError::InvalidInput(format!(
                "Draft {} was claimed for publishing and can no longer be edited",
                draft_id
            )));
        }

        // Record repointed; the replaced object is now unreferenced
        if new_media_url.is_some() {
            self.remove_media_object(&existing.media_url).await;
        }

        self.db
            .get_draft(owner_uid, draft_id)
            .await?
            .ok_or_else(|| LatercastError::InvalidInput(format!("Draft not found: {}", draft_id)))
    }

    /// Delete a draft, media object first.
    ///
    /// A media object that is already absent counts as satisfied; a real
    /// media-store failure aborts before the record is touched.
    pub async fn delete(&self, owner_uid: &str, draft_id: &str) -> Result<()> {
        let existing = self
            .db
            .get_draft(owner_uid, draft_id)
            .await?
            .ok_or_else(|| LatercastError::InvalidInput(format!("Draft not found: {}", draft_id)))?;

        match self.media.key_for_url(&existing.media_url) {
            Some(key) => {
                if !self.media.delete(&key).await? {
                    info!(draft_id, "media object already absent");
                }
            }
            None => {
                warn!(
                    draft_id,
                    media_url = %existing.media_url,
                    "media url not owned by this store, leaving object in place"
                );
            }
        }

        self.db.delete_draft(owner_uid, draft_id).await?;
        info!(draft_id, owner_uid, "draft deleted");
        Ok(())
    }

    fn media_key(&self, owner_uid: &str, filename: &str) -> Result<String> {
        let name = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                LatercastError::InvalidInput(format!("Invalid media filename: {}", filename))
            })?;

        Ok(format!("drafts/{}/{}-{}", owner_uid, Uuid::new_v4(), name))
    }

    async fn remove_media_object(&self, url: &str) {
        let Some(key) = self.media.key_for_url(url) else {
            return;
        };
        match self.media.delete(&key).await {
            Ok(_) => {}
            Err(e) => warn!(media_url = %url, "failed to remove media object: {}", e),
        }
    }
}

fn validate_new(owner_uid: &str, new: &NewDraft, media: &MediaUpload) -> Result<()> {
    if owner_uid.is_empty() {
        return Err(LatercastError::InvalidInput("Owner must be provided".to_string()));
    }
    if new.title.trim().is_empty() {
        return Err(LatercastError::InvalidInput("Title must be provided".to_string()));
    }
    if new.description.trim().is_empty() {
        return Err(LatercastError::InvalidInput(
            "Description must be provided".to_string(),
        ));
    }
    if new.keywords.is_empty() || new.keywords.iter().any(|k| k.trim().is_empty()) {
        return Err(LatercastError::InvalidInput(
            "Keywords must be provided".to_string(),
        ));
    }
    if new.category.trim().is_empty() {
        return Err(LatercastError::InvalidInput(
            "Category must be provided".to_string(),
        ));
    }
    if media.filename.trim().is_empty() || media.bytes.is_empty() {
        return Err(LatercastError::InvalidInput(
            "Media file must be provided".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FsMediaStore;
    use crate::types::{Platform, PrivacyStatus};
    use chrono::Utc;
    use tempfile::TempDir;

    async fn setup() -> (DraftService, Arc<FsMediaStore>, TempDir) {
        let temp = TempDir::new().unwrap();
        let db = Database::open_in_memory().await.unwrap();
        let media = Arc::new(FsMediaStore::new(
            temp.path().join("media").to_str().unwrap(),
            "https://media.example.com",
        ));
        let service = DraftService::new(db, media.clone());
        (service, media, temp)
    }

    fn new_draft() -> NewDraft {
        NewDraft {
            title: "Clip".to_string(),
            description: "A clip".to_string(),
            keywords: vec!["clip".to_string()],
            category: "22".to_string(),
            privacy_status: PrivacyStatus::Private,
            platform: Platform::Youtube,
            scheduled_time: Utc::now() + chrono::Duration::hours(1),
        }
    }

    fn upload() -> MediaUpload {
        MediaUpload {
            filename: "clip.mp4".to_string(),
            content_type: "video/mp4".to_string(),
            bytes: b"video bytes".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_create_stores_media_and_record() {
        let (service, media, _temp) = setup().await;

        let draft = service.create("user-1", new_draft(), upload()).await.unwrap();

        assert_eq!(draft.status, DraftStatus::Draft);
        assert!(draft.media_url.starts_with("https://media.example.com/drafts/user-1/"));
        assert!(draft.media_url.ends_with("clip.mp4"));

        // The object is readable through the recorded URL
        let key = media.key_for_url(&draft.media_url).unwrap();
        let object = media.open_read(&key).await.unwrap();
        assert_eq!(object.len, 11);

        let fetched = service.get("user-1", &draft.draft_id).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn test_create_rejects_missing_fields() {
        let (service, _media, _temp) = setup().await;

        let mut bad = new_draft();
        bad.title = "  ".to_string();
        let result = service.create("user-1", bad, upload()).await;
        assert!(matches!(result, Err(LatercastError::InvalidInput(_))));

        let mut bad = new_draft();
        bad.keywords = vec![];
        let result = service.create("user-1", bad, upload()).await;
        assert!(matches!(result, Err(LatercastError::InvalidInput(_))));

        let mut empty_media = upload();
        empty_media.bytes = vec![];
        let result = service.create("user-1", new_draft(), empty_media).await;
        assert!(matches!(result, Err(LatercastError::InvalidInput(_))));

        // Nothing was created
        assert!(service.list("user-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_is_owner_scoped() {
        let (service, _media, _temp) = setup().await;
        service.create("user-1", new_draft(), upload()).await.unwrap();
        service.create("user-2", new_draft(), upload()).await.unwrap();

        let drafts = service.list("user-1").await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].owner_uid, "user-1");
    }

    #[tokio::test]
    async fn test_update_fields_without_media() {
        let (service, _media, _temp) = setup().await;
        let draft = service.create("user-1", new_draft(), upload()).await.unwrap();

        let mut fields = new_draft();
        fields.title = "Renamed".to_string();
        let updated = service
            .update("user-1", &draft.draft_id, fields, None)
            .await
            .unwrap();

        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.media_url, draft.media_url);
    }

    #[tokio::test]
    async fn test_update_replaces_media_and_removes_old_object() {
        let (service, media, _temp) = setup().await;
        let draft = service.create("user-1", new_draft(), upload()).await.unwrap();
        let old_key = media.key_for_url(&draft.media_url).unwrap();

        let replacement = MediaUpload {
            filename: "replacement.webm".to_string(),
            content_type: "video/webm".to_string(),
            bytes: b"new bytes".to_vec(),
        };
        let updated = service
            .update("user-1", &draft.draft_id, new_draft(), Some(replacement))
            .await
            .unwrap();

        assert_ne!(updated.media_url, draft.media_url);
        assert!(updated.media_url.ends_with("replacement.webm"));

        // Old object gone, new one readable
        assert!(media.open_read(&old_key).await.is_err());
        let new_key = media.key_for_url(&updated.media_url).unwrap();
        assert!(media.open_read(&new_key).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_missing_draft() {
        let (service, _media, _temp) = setup().await;
        let result = service.update("user-1", "nope", new_draft(), None).await;
        assert!(matches!(result, Err(LatercastError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_media_before_record() {
        let (service, media, _temp) = setup().await;
        let draft = service.create("user-1", new_draft(), upload()).await.unwrap();
        let key = media.key_for_url(&draft.media_url).unwrap();

        service.delete("user-1", &draft.draft_id).await.unwrap();

        assert!(media.open_read(&key).await.is_err());
        assert!(service.get("user-1", &draft.draft_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_with_absent_media_still_succeeds() {
        let (service, media, _temp) = setup().await;
        let draft = service.create("user-1", new_draft(), upload()).await.unwrap();

        // Blob disappears out from under the record
        let key = media.key_for_url(&draft.media_url).unwrap();
        media.delete(&key).await.unwrap();

        service.delete("user-1", &draft.draft_id).await.unwrap();
        assert!(service.get("user-1", &draft.draft_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_draft() {
        let (service, _media, _temp) = setup().await;
        let result = service.delete("user-1", "nope").await;
        assert!(matches!(result, Err(LatercastError::InvalidInput(_))));
    }
}
