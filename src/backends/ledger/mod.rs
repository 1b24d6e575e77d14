//! Work-ledger session
//!
//! Password-grant login against the ledger's OpenID realm and a single
//! "all works" lookup per reference URL. Owns its own client and cookies;
//! nothing is shared with the dashboard session.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::WorkSource;
use crate::core::{AuthError, Credential, WorkLedgerEntry, WorksResponse};
use crate::settings::LedgerEndpoints;

#[derive(Debug, Deserialize)]
struct TokenGrant {
    #[serde(default)]
    access_token: Option<String>,
}

pub struct WorkLedgerSession {
    http: reqwest::Client,
    endpoints: LedgerEndpoints,
    token: Option<String>,
}

impl WorkLedgerSession {
    pub fn new(endpoints: LedgerEndpoints, timeout: Duration) -> Result<Self, AuthError> {
        if endpoints.accept_invalid_certs {
            tracing::warn!("Work ledger TLS certificate verification is disabled");
        }

        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .cookie_store(true)
            .danger_accept_invalid_certs(endpoints.accept_invalid_certs)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            endpoints,
            token: None,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Password grant; replaces any previous token
    pub async fn authorize(&mut self, credential: &Credential) -> Result<String, AuthError> {
        if !credential.is_complete() {
            return Err(AuthError::MissingCredentials("work ledger"));
        }

        tracing::debug!("Requesting work ledger token");
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("grant_type", "password"),
                ("client_id", self.endpoints.client_id.as_str()),
                ("username", credential.login()),
                ("password", credential.secret()),
                ("scope", "openid"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::GrantRejected {
                status: status.as_u16(),
            });
        }

        let grant: TokenGrant = response
            .json()
            .await
            .map_err(|e| AuthError::MalformedGrant(e.to_string()))?;
        let token = grant
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::MalformedGrant("access_token missing".to_string()))?;

        self.token = Some(token.clone());
        tracing::info!("Work ledger session authorized");
        Ok(token)
    }

    /// Endpoint listing every work behind a reference URL
    pub fn works_url(&self, reference_url: &str) -> Option<String> {
        let id = reference_id(reference_url)?;
        Some(format!(
            "{}/{}/all",
            self.endpoints.api_base.trim_end_matches('/'),
            id
        ))
    }

    /// Works for one object; empty on any failure
    pub async fn list_works(&self, reference_url: &str) -> Vec<WorkLedgerEntry> {
        let Some(url) = self.works_url(reference_url) else {
            tracing::warn!("Ledger reference '{}' has no identifier", reference_url);
            return Vec::new();
        };
        if !self.is_authenticated() {
            tracing::warn!("Listing ledger works without a token");
        }

        let mut request = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Work ledger request failed: {}", e);
                return Vec::new();
            }
        };

        let status = response.status();
        tracing::debug!("POST {} -> {}", url, status);
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                "Work ledger answered {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            );
            return Vec::new();
        }

        match response.json::<WorksResponse>().await {
            Ok(parsed) => parsed.works,
            Err(e) => {
                tracing::warn!("Work ledger response undecodable: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl WorkSource for WorkLedgerSession {
    async fn list_works(&self, reference_url: &str) -> Vec<WorkLedgerEntry> {
        WorkLedgerSession::list_works(self, reference_url).await
    }
}

/// Last non-empty path segment of the reference URL
fn reference_id(reference_url: &str) -> Option<String> {
    let trimmed = reference_url.trim();
    if let Ok(url) = Url::parse(trimmed) {
        return url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string);
    }
    trimmed
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockResponse, MockServer};
    use serde_json::json;

    fn session_for(base: &str) -> WorkLedgerSession {
        let endpoints = LedgerEndpoints {
            token_url: format!("{}/auth/token", base),
            client_id: "ExonReactApp".to_string(),
            api_base: format!("{}/api/isr-new-service/common/", base),
            accept_invalid_certs: false,
        };
        WorkLedgerSession::new(endpoints, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_reference_id() {
        assert_eq!(
            reference_id("https://suid.mos.ru/ksg/3f2a-99/").as_deref(),
            Some("3f2a-99")
        );
        assert_eq!(
            reference_id("https://suid.mos.ru/ksg/3f2a-99?tab=works").as_deref(),
            Some("3f2a-99")
        );
        assert_eq!(reference_id("plain/abc").as_deref(), Some("abc"));
        assert_eq!(reference_id("https://suid.mos.ru/"), None);
    }

    #[test]
    fn test_works_url_joins_base() {
        let session = session_for("https://suid.test");
        assert_eq!(
            session.works_url("https://suid.test/ksg/abc").as_deref(),
            Some("https://suid.test/api/isr-new-service/common/abc/all")
        );
    }

    #[tokio::test]
    async fn test_authorize_and_list_works() {
        let server = MockServer::bind();
        let mut session = session_for(server.url());
        let handle = server.serve(|req| match req.path() {
            "/auth/token" => MockResponse::json(200, json!({"access_token": "ledger-jwt"})),
            "/api/isr-new-service/common/uuid-1/all" => MockResponse::json(
                200,
                json!({"works": [
                    {"name": "Foundation pour", "start_date": "2025-01-10",
                     "end_date": "2025-02-01", "fact_end_date": null},
                    {"name": "Roofing", "end_date": "2025-05-01T00:00:00"}
                ]}),
            ),
            _ => MockResponse::text(404, "missing"),
        });

        let token = session
            .authorize(&Credential::new("planner", "pw"))
            .await
            .unwrap();
        assert_eq!(token, "ledger-jwt");
        assert!(session.is_authenticated());

        let grant = &handle.requests_to("/auth/token")[0];
        assert!(grant.body.contains("grant_type=password"));
        assert!(grant.body.contains("client_id=ExonReactApp"));
        assert!(grant.body.contains("scope=openid"));
        assert!(grant.body.contains("username=planner"));

        let works = session.list_works("https://suid.test/ksg/uuid-1").await;
        assert_eq!(works.len(), 2);
        assert_eq!(works[0].name.as_deref(), Some("Foundation pour"));
        assert_eq!(works[1].planned_end().map(|d| d.to_string()).as_deref(), Some("2025-05-01"));

        let call = &handle.requests_to("/api/isr-new-service/common/uuid-1/all")[0];
        assert_eq!(call.method, "POST");
        assert_eq!(call.header("Authorization"), Some("Bearer ledger-jwt"));
        assert_eq!(call.header("Content-Type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_authorize_rejected_carries_status() {
        let server = MockServer::bind();
        let mut session = session_for(server.url());
        let _handle = server.serve(|_| MockResponse::json(401, json!({"error": "invalid_grant"})));

        let err = session
            .authorize(&Credential::new("planner", "bad"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::GrantRejected { status: 401 }));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_authorize_without_access_token_is_malformed() {
        let server = MockServer::bind();
        let mut session = session_for(server.url());
        let _handle = server.serve(|_| MockResponse::json(200, json!({"token_type": "bearer"})));

        let err = session
            .authorize(&Credential::new("planner", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedGrant(_)));
    }

    #[tokio::test]
    async fn test_list_works_soft_failures() {
        let server = MockServer::bind();
        let session = session_for(server.url());
        let _handle = server.serve(|req| match req.path() {
            "/api/isr-new-service/common/broken/all" => MockResponse::text(200, "not json"),
            _ => MockResponse::text(500, "down"),
        });

        assert!(session.list_works("https://suid.test/ksg/broken").await.is_empty());
        assert!(session.list_works("https://suid.test/ksg/other").await.is_empty());
        assert!(session.list_works("https://suid.test/").await.is_empty());
    }
}
