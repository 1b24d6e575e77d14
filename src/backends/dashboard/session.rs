//! Dashboard SSO session
//!
//! Walks the identity provider's redirect-based OAuth flow, keeps the bearer
//! token and CSRF token it yields, and attaches them to every later request
//! through a single interceptor.

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::core::{AuthError, Credential, FetchError, FetchOutcome};
use crate::settings::DashboardEndpoints;

const TOKEN_PARAM: &str = "token";
const CSRF_COOKIE: &str = "XSRF-TOKEN";
const CSRF_HEADER: HeaderName = HeaderName::from_static("x-xsrf-token");
const AJAX_HEADER: HeaderName = HeaderName::from_static("x-requested-with");
const AJAX_VALUE: &str = "XMLHttpRequest";

const ACCEPT_ANY: &str = "application/json, text/html, */*";
const ACCEPT_JSON: &str = "application/json";

/// Tokens obtained by [`AuthSession::authorize`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTokens {
    pub bearer: Option<String>,
    pub csrf: Option<String>,
}

/// Outcome of a successful authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub token: String,
    pub csrf_present: bool,
}

/// One outbound dashboard request, before token attachment
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Caller-supplied header; overrides the session defaults
    #[cfg(test)]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Authenticated session against the dashboard backend
pub struct AuthSession {
    http: reqwest::Client,
    jar: Arc<Jar>,
    endpoints: DashboardEndpoints,
    origin: Url,
    tokens: SessionTokens,
}

impl AuthSession {
    /// Build an unauthenticated session with its own cookie jar
    pub fn new(endpoints: DashboardEndpoints, timeout: Duration) -> Result<Self, AuthError> {
        let origin = Url::parse(&endpoints.base_url).map_err(|e| AuthError::InvalidEndpoint {
            url: endpoints.base_url.clone(),
            reason: e.to_string(),
        })?;

        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .cookie_provider(Arc::clone(&jar))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            jar,
            endpoints,
            origin,
            tokens: SessionTokens::default(),
        })
    }

    #[cfg(test)]
    pub fn tokens(&self) -> &SessionTokens {
        &self.tokens
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.bearer.is_some()
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Run the SSO password flow and keep the resulting tokens
    pub async fn authorize(&mut self, credential: &Credential) -> Result<AuthResult, AuthError> {
        if !credential.is_complete() {
            return Err(AuthError::MissingCredentials("dashboard SSO"));
        }

        tracing::debug!("Opening SSO entry page");
        self.http.get(&self.endpoints.sso_entry_url).send().await?;

        tracing::debug!("Requesting SSO account chooser");
        self.http
            .post(&self.endpoints.sso_accounts_url)
            .header(AJAX_HEADER, AJAX_VALUE)
            .send()
            .await?;

        tracing::debug!("Submitting SSO password form");
        let response = self
            .http
            .post(&self.endpoints.sso_password_url)
            .form(&[
                ("isDelayed", "false"),
                ("login", credential.login()),
                ("password", credential.secret()),
            ])
            .send()
            .await?;

        let landed = response.url().clone();
        if !same_origin(&landed, &self.origin) {
            tracing::warn!("SSO flow ended on {} instead of the dashboard", landed);
            return Err(AuthError::AuthenticationFailed {
                landed: strip_query(&landed),
            });
        }

        let token = extract_token(&landed).ok_or(AuthError::TokenMissing)?;
        let csrf = self.csrf_cookie();
        if csrf.is_none() {
            tracing::debug!("No {} cookie after login; CSRF header will be omitted", CSRF_COOKIE);
        }

        let result = AuthResult {
            token: token.clone(),
            csrf_present: csrf.is_some(),
        };
        self.tokens = SessionTokens {
            bearer: Some(token),
            csrf,
        };
        tracing::info!("Dashboard session authorized");
        Ok(result)
    }

    /// Resolve a relative API path against the dashboard origin; absolute
    /// URLs pass through unchanged
    pub fn resolve(&self, path: &str) -> Result<Url, FetchError> {
        let resolved = if path.starts_with('/') {
            self.origin.join(path)
        } else {
            Url::parse(path)
        };
        resolved.map_err(|_| FetchError::InvalidPath(path.to_string()))
    }

    /// Outbound interceptor: tokens when present, default headers unless the
    /// caller already set them
    fn intercept(&self, headers: &mut HeaderMap, default_accept: &'static str) {
        if let Some(token) = &self.tokens.bearer {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        if let Some(csrf) = &self.tokens.csrf {
            if let Ok(value) = HeaderValue::from_str(csrf) {
                headers.insert(CSRF_HEADER, value);
            }
        }
        headers
            .entry(ACCEPT)
            .or_insert(HeaderValue::from_static(default_accept));
        headers
            .entry(AJAX_HEADER)
            .or_insert(HeaderValue::from_static(AJAX_VALUE));
    }

    /// Send one request. No retry happens here.
    pub async fn request(&self, request: ApiRequest) -> Result<reqwest::Response, FetchError> {
        let url = self.resolve(&request.path)?;
        let default_accept = if request.method == Method::GET {
            ACCEPT_ANY
        } else {
            ACCEPT_JSON
        };

        let mut headers = request.headers;
        self.intercept(&mut headers, default_accept);

        let mut builder = self.http.request(request.method, url.clone()).headers(headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder.send().await.map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })
    }

    /// Send a request and decode a 200 JSON body into `T`
    pub async fn fetch_json<T: DeserializeOwned>(&self, request: ApiRequest) -> FetchOutcome<T> {
        let path = request.path.clone();
        let response = match self.request(request).await {
            Ok(response) => response,
            Err(e) => return e.into(),
        };

        let status = response.status();
        let url = response.url().to_string();
        if status != StatusCode::OK {
            let snippet = response.text().await.unwrap_or_default();
            tracing::debug!(
                "{} answered {}: {}",
                path,
                status,
                snippet.chars().take(200).collect::<String>()
            );
            return FetchOutcome::from_status(status, &url);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(source) => return FetchOutcome::Transient(FetchError::Network { url, source }),
        };
        match serde_json::from_str(&body) {
            Ok(value) => FetchOutcome::Ok(value),
            Err(e) => {
                tracing::debug!(
                    "{} returned undecodable body: {}",
                    path,
                    body.chars().take(200).collect::<String>()
                );
                FetchOutcome::Transient(FetchError::decode(url, e))
            }
        }
    }

    /// Plain GET through the session's cookie jar, without API headers.
    /// Used for static assets such as camera photos.
    pub async fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::status(response.status(), url));
        }

        let bytes = response.bytes().await.map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }

    fn csrf_cookie(&self) -> Option<String> {
        let header = self.jar.cookies(&self.origin)?;
        let cookies = header.to_str().ok()?;
        cookie_value(cookies, CSRF_COOKIE).map(decode_plus)
    }
}

/// Host and port must both match
fn same_origin(landed: &Url, origin: &Url) -> bool {
    let hosts_match = match (landed.host_str(), origin.host_str()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    };
    hosts_match && landed.port_or_known_default() == origin.port_or_known_default()
}

fn strip_query(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.to_string()
}

/// `token` query parameter, decoded once by query parsing and once more to
/// undo the provider's double encoding
fn extract_token(url: &Url) -> Option<String> {
    let (_, raw) = url.query_pairs().find(|(key, _)| key == TOKEN_PARAM)?;
    if raw.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(&raw)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| raw.into_owned());
    Some(decoded)
}

fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header
        .split(';')
        .map(str::trim)
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Percent-decode treating `+` as a space
fn decode_plus(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|v| v.into_owned())
        .unwrap_or(spaced)
}
