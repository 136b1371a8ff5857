//! Scheduler loop
//!
//! Drives due drafts to completion at a fixed cadence, independent of
//! request traffic. Each tick scans a bounded page of candidates, claims
//! the due ones with a compare-and-swap status write, and runs the
//! per-draft publish protocol: resolve media, obtain a credential, upload,
//! then either finalize (delete the record) or roll back for the next tick.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::credentials::{Access, CredentialManager};
use crate::db::Database;
use crate::error::{LatercastError, PlatformError, Result};
use crate::media::MediaStore;
use crate::platforms::{Publisher, UploadMetadata};
use crate::types::{Draft, Platform};

/// Tuning knobs for the loop, derived from `[scheduler]` config
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub scan_limit: u32,
    pub max_concurrency: usize,
    pub per_draft_timeout: Duration,
    /// A pending claim untouched for this long is treated as crashed and
    /// rolled back at the start of a tick
    pub pending_reclaim_after: chrono::Duration,
}

impl SchedulerOptions {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            scan_limit: config.scan_limit,
            max_concurrency: config.max_concurrency.max(1),
            per_draft_timeout: Duration::from_secs(config.per_draft_timeout_secs),
            pending_reclaim_after: chrono::Duration::seconds(
                (config.poll_interval * config.pending_reclaim_ticks as u64) as i64,
            ),
        }
    }
}

/// What one tick did
#[derive(Debug, Default, Clone, Copy)]
pub struct TickSummary {
    /// Candidates fetched from the store
    pub scanned: usize,
    /// Candidates that were due this tick
    pub due: usize,
    /// Drafts published and removed
    pub published: usize,
    /// Drafts rolled back for a later tick
    pub deferred: usize,
    /// Drafts moved to the terminal failed state
    pub failed: usize,
    /// Stale pending claims returned to draft
    pub reclaimed: u64,
}

enum DraftOutcome {
    Published,
    Deferred,
    Failed,
    /// Lost the claim race or was already terminal; no side effect
    Skipped,
}

/// Why a publish protocol run did not finish
enum ProtocolFailure {
    /// Worth retrying on a later tick; the draft rolls back to `draft`
    Deferred(String),
    /// The platform will never accept this content as-is; terminal
    Permanent(String),
}

pub struct Scheduler {
    db: Database,
    media: Arc<dyn MediaStore>,
    credentials: CredentialManager,
    publishers: HashMap<Platform, Arc<dyn Publisher>>,
    options: SchedulerOptions,
}

impl Scheduler {
    pub fn new(
        db: Database,
        media: Arc<dyn MediaStore>,
        credentials: CredentialManager,
        publishers: Vec<Arc<dyn Publisher>>,
        options: SchedulerOptions,
    ) -> Self {
        let publishers = publishers
            .into_iter()
            .map(|p| (p.platform(), p))
            .collect();

        Self {
            db,
            media,
            credentials,
            publishers,
            options,
        }
    }

    /// Run one scan-and-process cycle.
    ///
    /// A failure to read the candidate page aborts the tick (the error
    /// propagates); every per-draft failure is absorbed into the summary so
    /// one bad draft never stops the rest of the page.
    pub async fn tick(&self) -> Result<TickSummary> {
        let now = Utc::now();
        let mut summary = TickSummary::default();

        summary.reclaimed = match self
            .db
            .reclaim_stale_pending(now - self.options.pending_reclaim_after)
            .await
        {
            Ok(0) => 0,
            Ok(n) => {
                warn!("reclaimed {} stale pending draft(s) from a previous run", n);
                n
            }
            Err(e) => {
                warn!("stale-claim reclaim failed: {}", e);
                0
            }
        };

        let page = self.db.scan_page(self.options.scan_limit).await?;
        summary.scanned = page.len();

        let due: Vec<Draft> = page.into_iter().filter(|d| d.is_due(now)).collect();
        summary.due = due.len();

        if due.is_empty() {
            debug!("no drafts due");
            return Ok(summary);
        }

        info!("{} draft(s) due for publishing", due.len());

        let outcomes: Vec<DraftOutcome> = stream::iter(due)
            .map(|draft| self.publish_one_bounded(draft, now))
            .buffer_unordered(self.options.max_concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                DraftOutcome::Published => summary.published += 1,
                DraftOutcome::Deferred => summary.deferred += 1,
                DraftOutcome::Failed => summary.failed += 1,
                DraftOutcome::Skipped => {}
            }
        }

        info!(
            "tick complete: {} published, {} deferred, {} failed",
            summary.published, summary.deferred, summary.failed
        );

        Ok(summary)
    }

    /// Per-draft protocol wrapped in the configured timeout.
    async fn publish_one_bounded(&self, draft: Draft, now: DateTime<Utc>) -> DraftOutcome {
        match tokio::time::timeout(self.options.per_draft_timeout, self.publish_one(&draft, now))
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    draft_id = %draft.draft_id,
                    "publish attempt timed out after {:?}; rolling back",
                    self.options.per_draft_timeout
                );
                self.rollback_best_effort(&draft.draft_id).await;
                DraftOutcome::Deferred
            }
        }
    }

    /// The per-draft publish protocol: claim, resolve media, obtain a
    /// credential, upload, finalize or roll back.
    async fn publish_one(&self, draft: &Draft, now: DateTime<Utc>) -> DraftOutcome {
        // Write-ahead claim. Losing the race means another pass owns the
        // record; skipping is the correct no-op.
        match self.db.claim_draft(&draft.draft_id, now).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(draft_id = %draft.draft_id, "claim lost, skipping");
                return DraftOutcome::Skipped;
            }
            Err(e) => {
                warn!(draft_id = %draft.draft_id, "claim write failed: {}", e);
                return DraftOutcome::Deferred;
            }
        }

        match self.run_publish_protocol(draft).await {
            Ok(external_id) => match self.db.finish_draft(&draft.draft_id, Utc::now()).await {
                Ok(finalized) => {
                    if !finalized {
                        warn!(
                            draft_id = %draft.draft_id,
                            "claim was gone at finalize time; record left as-is"
                        );
                    }
                    info!(
                        draft_id = %draft.draft_id,
                        external_id = %external_id,
                        "draft published and removed"
                    );
                    DraftOutcome::Published
                }
                Err(e) => {
                    // The upload went through but the record is stuck in
                    // pending; the staleness reclaim will surface it.
                    error!(
                        draft_id = %draft.draft_id,
                        external_id = %external_id,
                        "published but failed to finalize record: {}",
                        e
                    );
                    DraftOutcome::Deferred
                }
            },
            Err(ProtocolFailure::Permanent(reason)) => {
                error!(
                    draft_id = %draft.draft_id,
                    "publish rejected permanently, marking failed: {}",
                    reason
                );
                if let Err(e) = self.db.mark_draft_failed(&draft.draft_id).await {
                    error!(
                        draft_id = %draft.draft_id,
                        "failed to record terminal failure, draft remains pending: {}",
                        e
                    );
                }
                DraftOutcome::Failed
            }
            Err(ProtocolFailure::Deferred(reason)) => {
                warn!(
                    draft_id = %draft.draft_id,
                    "publish deferred to a later tick: {}",
                    reason
                );
                self.rollback_best_effort(&draft.draft_id).await;
                DraftOutcome::Deferred
            }
        }
    }

    async fn run_publish_protocol(
        &self,
        draft: &Draft,
    ) -> std::result::Result<String, ProtocolFailure> {
        let Some(publisher) = self.publishers.get(&draft.platform) else {
            return Err(ProtocolFailure::Deferred(format!(
                "no publisher configured for platform {}",
                draft.platform
            )));
        };

        let Some(media_key) = self.media.key_for_url(&draft.media_url) else {
            return Err(ProtocolFailure::Deferred(format!(
                "media url not owned by this store: {}",
                draft.media_url
            )));
        };

        let access = self
            .credentials
            .obtain(&draft.owner_uid, draft.platform)
            .await
            .map_err(|e| ProtocolFailure::Deferred(format!("credential lookup failed: {}", e)))?;

        let mut credential = match access {
            Access::Granted(credential) => credential,
            Access::ReauthRequired { consent_url } => {
                return Err(ProtocolFailure::Deferred(format!(
                    "owner must re-consent at {}",
                    consent_url
                )));
            }
        };

        let metadata = UploadMetadata::from_draft(draft);
        let mut quota_retried = false;

        loop {
            // The stream is consumed per attempt; reopen on the quota retry
            let media = self
                .media
                .open_read(&media_key)
                .await
                .map_err(|e| ProtocolFailure::Deferred(format!("media open failed: {}", e)))?;

            match publisher.upload(&credential, media, &metadata).await {
                Ok(external_id) => return Ok(external_id),
                Err(LatercastError::Platform(PlatformError::Quota(reason))) if !quota_retried => {
                    quota_retried = true;
                    warn!(
                        draft_id = %draft.draft_id,
                        "quota exceeded, re-authenticating for one retry: {}",
                        reason
                    );
                    match self
                        .credentials
                        .force_refresh(&draft.owner_uid, draft.platform)
                        .await
                    {
                        Ok(Access::Granted(fresh)) => {
                            credential = fresh;
                        }
                        Ok(Access::ReauthRequired { consent_url }) => {
                            return Err(ProtocolFailure::Deferred(format!(
                                "re-auth after quota failure needs consent at {}",
                                consent_url
                            )));
                        }
                        Err(e) => {
                            return Err(ProtocolFailure::Deferred(format!(
                                "re-auth after quota failure errored: {}",
                                e
                            )));
                        }
                    }
                }
                Err(LatercastError::Platform(platform_error)) => {
                    return if platform_error.is_retryable() {
                        Err(ProtocolFailure::Deferred(platform_error.to_string()))
                    } else {
                        Err(ProtocolFailure::Permanent(platform_error.to_string()))
                    };
                }
                Err(e) => return Err(ProtocolFailure::Deferred(e.to_string())),
            }
        }
    }

    /// The rollback write itself is best-effort: if it fails the record
    /// stays `pending` until the staleness reclaim picks it up.
    async fn rollback_best_effort(&self, draft_id: &str) {
        if let Err(e) = self.db.rollback_draft(draft_id).await {
            error!(
                draft_id,
                "rollback failed, draft remains pending until reclaimed: {}", e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;

    #[test]
    fn test_options_from_config() {
        let config = SchedulerConfig {
            poll_interval: 60,
            scan_limit: 500,
            max_concurrency: 4,
            per_draft_timeout_secs: 600,
            pending_reclaim_ticks: 10,
        };

        let options = SchedulerOptions::from_config(&config);
        assert_eq!(options.scan_limit, 500);
        assert_eq!(options.max_concurrency, 4);
        assert_eq!(options.per_draft_timeout, Duration::from_secs(600));
        assert_eq!(
            options.pending_reclaim_after,
            chrono::Duration::seconds(600)
        );
    }

    #[test]
    fn test_options_concurrency_floor() {
        let config = SchedulerConfig {
            max_concurrency: 0,
            ..SchedulerConfig::default()
        };

        let options = SchedulerOptions::from_config(&config);
        assert_eq!(options.max_concurrency, 1);
    }
}
