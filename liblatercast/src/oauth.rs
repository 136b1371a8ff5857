//! OAuth2 identity-provider client
//!
//! Handles the two token-endpoint exchanges the credential lifecycle needs:
//! authorization-code exchange when an owner completes consent, and
//! refresh-token exchange when a stored credential expires. Endpoint URLs
//! come from configuration so tests can point the client at a local server.

use async_trait::async_trait;
use base64::Engine;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::OauthConfig;
use crate::error::{CredentialError, Result};

/// A token grant as returned by the identity provider's token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
}

impl TokenGrant {
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .split_whitespace()
            .map(|s| s.to_string())
            .collect()
    }
}

/// A freshly built consent URL plus the transient values the callback
/// needs to finish the flow
#[derive(Debug)]
pub struct AuthorizeRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
}

/// Seam between the credential manager and the identity provider.
///
/// `OauthClient` is the production implementation; tests substitute
/// `MockTokenExchange` to script grant outcomes without the network.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Consent URL for the owning surface to show when re-auth is required
    fn consent_url(&self) -> String;

    /// Exchange an authorization code (plus its PKCE verifier) for tokens
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenGrant>;

    /// Exchange a refresh token for a fresh access token
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant>;
}

pub struct OauthClient {
    config: OauthConfig,
    http: reqwest::Client,
}

impl OauthClient {
    pub fn new(config: OauthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Generate PKCE code verifier and S256 challenge
    fn generate_pkce() -> (String, String) {
        let verifier_bytes: [u8; 32] = rand::thread_rng().gen();
        let code_verifier = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut hasher = Sha256::new();
        hasher.update(code_verifier.as_bytes());
        let code_challenge =
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize());

        (code_verifier, code_challenge)
    }

    /// Generate random state for CSRF protection
    fn generate_state() -> String {
        let bytes: [u8; 16] = rand::thread_rng().gen();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Build the authorization URL the owner must visit to grant consent
    pub fn authorize_url(&self) -> AuthorizeRequest {
        let state = Self::generate_state();
        let (code_verifier, code_challenge) = Self::generate_pkce();

        let scope = self.config.scopes.join(" ");
        let url = format!(
            "{}?response_type=code&access_type=offline&client_id={}&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=S256",
            self.config.auth_url,
            percent_encode(&self.config.client_id),
            percent_encode(&self.config.redirect_uri),
            percent_encode(&scope),
            percent_encode(&state),
            percent_encode(&code_challenge),
        );

        AuthorizeRequest {
            url,
            state,
            code_verifier,
        }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenGrant> {
        let credentials = format!("{}:{}", self.config.client_id, self.config.client_secret);
        let auth_header = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        );

        let resp = self
            .http
            .post(&self.config.token_url)
            .header("Authorization", auth_header)
            .form(params)
            .send()
            .await
            .map_err(|e| CredentialError::Exchange(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(
                CredentialError::Exchange(format!("token endpoint returned {}: {}", status, body))
                    .into(),
            );
        }

        resp.json::<TokenGrant>()
            .await
            .map_err(|e| CredentialError::MalformedResponse(e.to_string()).into())
    }
}

#[async_trait]
impl TokenExchange for OauthClient {
    fn consent_url(&self) -> String {
        self.authorize_url().url
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenGrant> {
        self.token_request(&[
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", &self.config.redirect_uri),
            ("code_verifier", code_verifier),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant> {
        self.token_request(&[
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }
}

fn percent_encode(s: &str) -> String {
    // RFC 3986 unreserved characters pass through; everything else is encoded
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

// ============================================================================
// Mock exchange (available for all builds to support integration tests)
// ============================================================================

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Scripted token exchange for tests: queue up grant outcomes and inspect
/// how many refreshes were attempted.
#[derive(Clone, Default)]
pub struct MockTokenExchange {
    refresh_outcomes: Arc<Mutex<VecDeque<std::result::Result<TokenGrant, String>>>>,
    refresh_calls: Arc<Mutex<usize>>,
    exchange_calls: Arc<Mutex<usize>>,
}

impl MockTokenExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful refresh returning `grant`
    pub fn push_refresh_ok(&self, grant: TokenGrant) {
        self.refresh_outcomes.lock().unwrap().push_back(Ok(grant));
    }

    /// Queue a failing refresh
    pub fn push_refresh_err(&self, message: &str) {
        self.refresh_outcomes
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn refresh_call_count(&self) -> usize {
        *self.refresh_calls.lock().unwrap()
    }

    pub fn exchange_call_count(&self) -> usize {
        *self.exchange_calls.lock().unwrap()
    }

    /// A grant that expires an hour out, for test setup
    pub fn grant(access_token: &str, refresh_token: Option<&str>) -> TokenGrant {
        TokenGrant {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(|s| s.to_string()),
            expires_in: 3600,
            scope: "upload".to_string(),
        }
    }
}

#[async_trait]
impl TokenExchange for MockTokenExchange {
    fn consent_url(&self) -> String {
        "https://idp.example.com/consent".to_string()
    }

    async fn exchange_code(&self, _code: &str, _code_verifier: &str) -> Result<TokenGrant> {
        *self.exchange_calls.lock().unwrap() += 1;
        Ok(Self::grant("exchanged-access", Some("exchanged-refresh")))
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant> {
        *self.refresh_calls.lock().unwrap() += 1;
        match self.refresh_outcomes.lock().unwrap().pop_front() {
            Some(Ok(grant)) => Ok(grant),
            Some(Err(message)) => Err(CredentialError::Exchange(message).into()),
            None => Err(CredentialError::Exchange("no scripted outcome".to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OauthConfig;

    fn test_config() -> OauthConfig {
        OauthConfig {
            client_id: "client id".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:8080/cb".to_string(),
            auth_url: "https://idp.example.com/auth".to_string(),
            token_url: "https://idp.example.com/token".to_string(),
            scopes: vec!["upload".to_string()],
        }
    }

    #[test]
    fn test_authorize_url_contains_pkce_and_state() {
        let client = OauthClient::new(test_config());
        let request = client.authorize_url();

        assert!(request.url.starts_with("https://idp.example.com/auth?"));
        assert!(request.url.contains("code_challenge_method=S256"));
        assert!(request.url.contains(&format!("state={}", percent_encode(&request.state))));
        assert!(!request.code_verifier.is_empty());
        // Verifier never appears in the URL, only its hash
        assert!(!request.url.contains(&request.code_verifier));
    }

    #[test]
    fn test_authorize_urls_are_unique() {
        let client = OauthClient::new(test_config());
        let a = client.authorize_url();
        let b = client.authorize_url();

        assert_ne!(a.state, b.state);
        assert_ne!(a.code_verifier, b.code_verifier);
    }

    #[test]
    fn test_percent_encode() {
        assert_eq!(percent_encode("abc-._~123"), "abc-._~123");
        assert_eq!(percent_encode("a b/c"), "a%20b%2Fc");
    }

    #[test]
    fn test_token_grant_scopes() {
        let grant = TokenGrant {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_in: 3600,
            scope: "upload read".to_string(),
        };
        assert_eq!(grant.scopes(), vec!["upload", "read"]);
    }

    #[test]
    fn test_token_grant_deserializes_without_refresh_token() {
        let grant: TokenGrant = serde_json::from_str(
            r#"{"access_token":"tok","expires_in":3599,"token_type":"Bearer"}"#,
        )
        .unwrap();
        assert_eq!(grant.access_token, "tok");
        assert_eq!(grant.refresh_token, None);
        assert!(grant.scope.is_empty());
    }

    #[tokio::test]
    async fn test_mock_exchange_scripted_outcomes() {
        let mock = MockTokenExchange::new();
        mock.push_refresh_err("boom");
        mock.push_refresh_ok(MockTokenExchange::grant("fresh", None));

        assert!(mock.refresh("r").await.is_err());
        let grant = mock.refresh("r").await.unwrap();
        assert_eq!(grant.access_token, "fresh");
        assert_eq!(mock.refresh_call_count(), 2);
    }
}
