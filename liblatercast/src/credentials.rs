//! Credential manager
//!
//! Produces a usable, non-expired OAuth credential for an (owner, platform)
//! pair, refreshing in place when possible and signalling re-consent when
//! not. `ReauthRequired` is a deferred-precondition signal, not an error:
//! the caller defers the current publish attempt and the owning surface
//! prompts the user with the consent URL.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::Result;
use crate::oauth::{TokenExchange, TokenGrant};
use crate::types::{Credential, Platform};

/// Refresh this long before the recorded expiry so a token never dies
/// mid-upload.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Outcome of a credential lookup
#[derive(Debug, Clone)]
pub enum Access {
    Granted(Credential),
    ReauthRequired { consent_url: String },
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted(_))
    }
}

#[derive(Clone)]
pub struct CredentialManager {
    db: Database,
    exchange: Arc<dyn TokenExchange>,
}

impl CredentialManager {
    pub fn new(db: Database, exchange: Arc<dyn TokenExchange>) -> Self {
        Self { db, exchange }
    }

    /// Produce a usable credential for the pair, or signal that re-consent
    /// is required.
    pub async fn obtain(&self, owner_uid: &str, platform: Platform) -> Result<Access> {
        let Some(stored) = self.db.get_credential(owner_uid, platform).await? else {
            debug!(owner_uid, %platform, "no stored credential");
            return Ok(self.reauth_required());
        };

        if !stored.is_expired(Utc::now(), Duration::seconds(EXPIRY_SKEW_SECS)) {
            return Ok(Access::Granted(stored));
        }

        self.refresh_stored(stored).await
    }

    /// Unconditionally re-exchange the stored refresh token.
    ///
    /// Used by the quota-retry path, which needs a credential-manager-mediated
    /// re-authentication even when the current token has not yet expired.
    pub async fn force_refresh(&self, owner_uid: &str, platform: Platform) -> Result<Access> {
        let Some(stored) = self.db.get_credential(owner_uid, platform).await? else {
            return Ok(self.reauth_required());
        };

        self.refresh_stored(stored).await
    }

    /// Finish an owner's consent flow: exchange the authorization code and
    /// store the granted credential, replacing any prior one for the pair.
    pub async fn complete_consent(
        &self,
        owner_uid: &str,
        platform: Platform,
        code: &str,
        code_verifier: &str,
    ) -> Result<Credential> {
        let grant = self.exchange.exchange_code(code, code_verifier).await?;
        let credential = credential_from_grant(owner_uid, platform, grant, None);

        self.db.upsert_credential(&credential).await?;
        info!(owner_uid, %platform, "credential granted");
        Ok(credential)
    }

    async fn refresh_stored(&self, stored: Credential) -> Result<Access> {
        let Some(refresh_token) = stored.refresh_token.clone() else {
            warn!(
                owner_uid = %stored.owner_uid,
                platform = %stored.platform,
                "credential expired with no refresh token"
            );
            return Ok(self.reauth_required());
        };

        match self.exchange.refresh(&refresh_token).await {
            Ok(grant) => {
                // Providers may omit the refresh token on refresh; the
                // replacement row carries the prior one forward.
                let credential = credential_from_grant(
                    &stored.owner_uid,
                    stored.platform,
                    grant,
                    Some(refresh_token),
                );
                self.db.upsert_credential(&credential).await?;
                debug!(
                    owner_uid = %credential.owner_uid,
                    platform = %credential.platform,
                    "credential refreshed"
                );
                Ok(Access::Granted(credential))
            }
            Err(e) => {
                warn!(
                    owner_uid = %stored.owner_uid,
                    platform = %stored.platform,
                    "refresh exchange failed: {}",
                    e
                );
                Ok(self.reauth_required())
            }
        }
    }

    fn reauth_required(&self) -> Access {
        Access::ReauthRequired {
            consent_url: self.exchange.consent_url(),
        }
    }
}

fn credential_from_grant(
    owner_uid: &str,
    platform: Platform,
    grant: TokenGrant,
    prior_refresh: Option<String>,
) -> Credential {
    let now = Utc::now();
    let scopes = grant.scopes();
    Credential {
        owner_uid: owner_uid.to_string(),
        platform,
        access_token: grant.access_token,
        refresh_token: grant.refresh_token.or(prior_refresh),
        expires_at: now + Duration::seconds(grant.expires_in),
        scopes,
        updated_at: now,
    }
}
