//! Core types for Latercast

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Target publishing platform.
///
/// Currently a single variant; the enum exists so credentials and publishers
/// stay scoped per platform as more are added.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Platform {
    Youtube,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "youtube" => Some(Platform::Youtube),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Visibility of the published object on the target platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PrivacyStatus {
    Public,
    Unlisted,
    Private,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Public => "public",
            PrivacyStatus::Unlisted => "unlisted",
            PrivacyStatus::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "public" => Some(PrivacyStatus::Public),
            "unlisted" => Some(PrivacyStatus::Unlisted),
            "private" => Some(PrivacyStatus::Private),
            _ => None,
        }
    }
}

impl std::fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Draft lifecycle state.
///
/// `Published` is transient: a successfully published draft is removed from
/// the store immediately after the status write, so the durable states are
/// `Draft`, `Pending`, and `Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DraftStatus {
    Draft,
    Pending,
    Published,
    Failed,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::Draft => "draft",
            DraftStatus::Pending => "pending",
            DraftStatus::Published => "published",
            DraftStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(DraftStatus::Draft),
            "pending" => Some(DraftStatus::Pending),
            "published" => Some(DraftStatus::Published),
            "failed" => Some(DraftStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fields an owner supplies when creating a draft. The media bytes travel
/// separately; the store assigns `media_url` once the object is persisted.
#[derive(Debug, Clone)]
pub struct NewDraft {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub category: String,
    pub privacy_status: PrivacyStatus,
    pub platform: Platform,
    pub scheduled_time: DateTime<Utc>,
}

/// A user-authored, not-yet-published content item with scheduling metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub draft_id: String,
    pub owner_uid: String,
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub category: String,
    pub privacy_status: PrivacyStatus,
    pub media_url: String,
    pub platform: Platform,
    pub scheduled_time: DateTime<Utc>,
    pub status: DraftStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Draft {
    pub fn new(owner_uid: &str, new: NewDraft, media_url: String) -> Self {
        let now = Utc::now();
        Self {
            draft_id: Uuid::new_v4().to_string(),
            owner_uid: owner_uid.to_string(),
            title: new.title,
            description: new.description,
            keywords: new.keywords,
            category: new.category,
            privacy_status: new.privacy_status,
            media_url,
            platform: new.platform,
            scheduled_time: new.scheduled_time,
            status: DraftStatus::Draft,
            created_at: now,
            updated_at: now,
            processed_at: None,
        }
    }

    /// Whether the scheduler should pick this draft up at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == DraftStatus::Draft && self.scheduled_time <= now
    }
}

/// OAuth2 token pair scoped to one user and one publishing platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub owner_uid: String,
    pub platform: Platform,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub scopes: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    pub fn is_expired(&self, now: DateTime<Utc>, skew: chrono::Duration) -> bool {
        now + skew >= self.expires_at
    }
}

// ============================================================================
// Media Types
// ============================================================================

/// Supported video MIME types for draft media
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VideoMimeType {
    Mp4,
    Quicktime,
    Webm,
    Matroska,
}

impl VideoMimeType {
    /// Parse MIME type from a MIME string (e.g., "video/mp4")
    pub fn from_mime_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "video/mp4" => Some(Self::Mp4),
            "video/quicktime" => Some(Self::Quicktime),
            "video/webm" => Some(Self::Webm),
            "video/x-matroska" => Some(Self::Matroska),
            _ => None,
        }
    }

    /// Detect MIME type from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp4" | "m4v" => Some(Self::Mp4),
            "mov" => Some(Self::Quicktime),
            "webm" => Some(Self::Webm),
            "mkv" => Some(Self::Matroska),
            _ => None,
        }
    }

    /// Get the MIME type string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::Quicktime => "video/quicktime",
            Self::Webm => "video/webm",
            Self::Matroska => "video/x-matroska",
        }
    }

    /// Get the typical file extension for this MIME type
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Quicktime => "mov",
            Self::Webm => "webm",
            Self::Matroska => "mkv",
        }
    }
}

impl std::fmt::Display for VideoMimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_new_draft() -> NewDraft {
        NewDraft {
            title: "Launch teaser".to_string(),
            description: "A short teaser".to_string(),
            keywords: vec!["launch".to_string(), "teaser".to_string()],
            category: "22".to_string(),
            privacy_status: PrivacyStatus::Public,
            platform: Platform::Youtube,
            scheduled_time: Utc::now(),
        }
    }

    #[test]
    fn test_draft_new_uuid_generation() {
        let draft = Draft::new("user-1", sample_new_draft(), "file:///m.mp4".to_string());

        let uuid = Uuid::parse_str(&draft.draft_id).expect("draft id should be a valid UUID");
        assert_eq!(uuid.get_version(), Some(uuid::Version::Random));
    }

    #[test]
    fn test_draft_new_unique_ids() {
        let a = Draft::new("user-1", sample_new_draft(), "u1".to_string());
        let b = Draft::new("user-1", sample_new_draft(), "u2".to_string());
        assert_ne!(a.draft_id, b.draft_id);
    }

    #[test]
    fn test_draft_new_default_values() {
        let draft = Draft::new("user-1", sample_new_draft(), "file:///m.mp4".to_string());

        assert_eq!(draft.owner_uid, "user-1");
        assert_eq!(draft.status, DraftStatus::Draft);
        assert_eq!(draft.processed_at, None);
        assert_eq!(draft.created_at, draft.updated_at);
    }

    #[test]
    fn test_draft_is_due() {
        let now = Utc::now();
        let mut draft = Draft::new("user-1", sample_new_draft(), "u".to_string());

        draft.scheduled_time = now - chrono::Duration::seconds(1);
        assert!(draft.is_due(now));

        draft.scheduled_time = now + chrono::Duration::hours(1);
        assert!(!draft.is_due(now));
    }

    #[test]
    fn test_draft_is_due_requires_draft_status() {
        let now = Utc::now();
        let mut draft = Draft::new("user-1", sample_new_draft(), "u".to_string());
        draft.scheduled_time = now - chrono::Duration::seconds(1);

        draft.status = DraftStatus::Pending;
        assert!(!draft.is_due(now));

        draft.status = DraftStatus::Failed;
        assert!(!draft.is_due(now));
    }

    #[test]
    fn test_draft_status_round_trip() {
        for status in [
            DraftStatus::Draft,
            DraftStatus::Pending,
            DraftStatus::Published,
            DraftStatus::Failed,
        ] {
            assert_eq!(DraftStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DraftStatus::parse("bogus"), None);
    }

    #[test]
    fn test_platform_round_trip() {
        assert_eq!(Platform::parse("youtube"), Some(Platform::Youtube));
        assert_eq!(Platform::parse("YouTube"), Some(Platform::Youtube));
        assert_eq!(Platform::parse("vimeo"), None);
        assert_eq!(Platform::Youtube.to_string(), "youtube");
    }

    #[test]
    fn test_privacy_status_parse() {
        assert_eq!(PrivacyStatus::parse("public"), Some(PrivacyStatus::Public));
        assert_eq!(PrivacyStatus::parse("UNLISTED"), Some(PrivacyStatus::Unlisted));
        assert_eq!(PrivacyStatus::parse("private"), Some(PrivacyStatus::Private));
        assert_eq!(PrivacyStatus::parse("secret"), None);
    }

    #[test]
    fn test_credential_expiry() {
        let now = Utc::now();
        let credential = Credential {
            owner_uid: "user-1".to_string(),
            platform: Platform::Youtube,
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: now + chrono::Duration::seconds(30),
            scopes: vec![],
            updated_at: now,
        };

        assert!(!credential.is_expired(now, chrono::Duration::zero()));
        // A 60s skew pushes the 30s-away expiry into "expired"
        assert!(credential.is_expired(now, chrono::Duration::seconds(60)));
        assert!(credential.is_expired(now + chrono::Duration::minutes(5), chrono::Duration::zero()));
    }

    #[test]
    fn test_video_mime_type_from_extension() {
        assert_eq!(VideoMimeType::from_extension("mp4"), Some(VideoMimeType::Mp4));
        assert_eq!(VideoMimeType::from_extension("M4V"), Some(VideoMimeType::Mp4));
        assert_eq!(VideoMimeType::from_extension("mov"), Some(VideoMimeType::Quicktime));
        assert_eq!(VideoMimeType::from_extension("webm"), Some(VideoMimeType::Webm));
        assert_eq!(VideoMimeType::from_extension("mkv"), Some(VideoMimeType::Matroska));
        assert_eq!(VideoMimeType::from_extension("gif"), None);
    }

    #[test]
    fn test_video_mime_type_from_mime_str() {
        assert_eq!(VideoMimeType::from_mime_str("video/mp4"), Some(VideoMimeType::Mp4));
        assert_eq!(VideoMimeType::from_mime_str("VIDEO/WEBM"), Some(VideoMimeType::Webm));
        assert_eq!(VideoMimeType::from_mime_str("image/png"), None);
    }

    #[test]
    fn test_video_mime_type_display() {
        assert_eq!(format!("{}", VideoMimeType::Mp4), "video/mp4");
        assert_eq!(VideoMimeType::Quicktime.extension(), "mov");
    }

    #[test]
    fn test_draft_serialization() {
        let draft = Draft::new("user-1", sample_new_draft(), "file:///m.mp4".to_string());

        let json = serde_json::to_string(&draft).unwrap();
        let deserialized: Draft = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.draft_id, draft.draft_id);
        assert_eq!(deserialized.keywords, draft.keywords);
        assert_eq!(deserialized.status, draft.status);
        assert_eq!(deserialized.scheduled_time, draft.scheduled_time);
    }
}
