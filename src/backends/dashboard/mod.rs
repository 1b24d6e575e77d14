//! Dashboard catalog client
//!
//! Typed access to the three per-object endpoints on top of an
//! [`AuthSession`]:
//! - `/api/catalog` for the object list
//! - `/api/dashboard/{id}` for the nested snapshot
//! - `/api/etapi/{id}` for control points, with bounded retry

pub mod session;

pub use session::{ApiRequest, AuthResult, AuthSession};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::PhotoSource;
use crate::core::{
    AuthError, CatalogObject, CatalogResponse, ControlPoints, Credential, DashboardSnapshot,
    EtapiResponse, FetchOutcome, Pause, RetryPolicy, TokioPause,
};

const CATALOG_PATH: &str = "/api/catalog";
const STATUS_FILTER_PARAM: &str = "oksStatusArrayName";

/// Browser links for one object, carried into report rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLinks {
    pub etapi_url: String,
    pub dashboard_url: String,
}

pub struct CatalogClient {
    session: AuthSession,
    retry: RetryPolicy,
    pause: Arc<dyn Pause>,
    photo_timeout: Duration,
}

impl CatalogClient {
    pub fn new(session: AuthSession, retry: RetryPolicy, photo_timeout: Duration) -> Self {
        Self {
            session,
            retry,
            pause: Arc::new(TokioPause),
            photo_timeout,
        }
    }

    /// Replace the backoff timer
    #[cfg(test)]
    pub fn with_pause(mut self, pause: Arc<dyn Pause>) -> Self {
        self.pause = pause;
        self
    }

    pub async fn authorize(&mut self, credential: &Credential) -> Result<AuthResult, AuthError> {
        self.session.authorize(credential).await
    }

    /// Catalog objects, optionally filtered by construction status.
    ///
    /// Any non-200 answer or undecodable body yields an empty list. Callers
    /// cannot tell that apart from a genuinely empty catalog without asking
    /// again; the behavior is kept as is and may hide upstream outages.
    pub async fn list_objects(&self, status_filter: Option<&str>) -> Vec<CatalogObject> {
        if !self.session.is_authenticated() {
            tracing::debug!("Catalog requested without a bearer token");
        }
        let mut request = ApiRequest::get(CATALOG_PATH);
        if let Some(status) = status_filter {
            request = request.query(STATUS_FILTER_PARAM, status);
        }

        let response: CatalogResponse = match self.session.fetch_json(request).await {
            FetchOutcome::Ok(response) => response,
            other => {
                tracing::warn!("Catalog unavailable ({}); treating as empty", other.label());
                return Vec::new();
            }
        };

        let objects: Vec<CatalogObject> = response
            .objects
            .data
            .into_iter()
            .filter_map(parse_catalog_item)
            .collect();
        tracing::info!("Catalog returned {} objects", objects.len());
        objects
    }

    /// Per-object dashboard snapshot
    pub async fn get_dashboard(&self, object_id: i64) -> FetchOutcome<DashboardSnapshot> {
        let outcome = self
            .session
            .fetch_json(ApiRequest::get(format!("/api/dashboard/{}", object_id)))
            .await;
        match &outcome {
            FetchOutcome::Ok(_) => {}
            FetchOutcome::NotFound => tracing::debug!("Dashboard for {} not found", object_id),
            FetchOutcome::Transient(e) | FetchOutcome::Fatal(e) => {
                tracing::warn!("Dashboard for {} unavailable: {}", object_id, e)
            }
        }
        outcome
    }

    /// Control points of one object, retried on transient failures.
    /// `None` means the object drops out of the control-point report; that
    /// includes an empty payload (`{}`, `[]` or `null`).
    pub async fn get_control_points(&self, object_id: i64) -> Option<ControlPoints> {
        let path = format!("/api/etapi/{}", object_id);
        let outcome = self
            .retry
            .run(self.pause.as_ref(), |attempt| {
                let request = ApiRequest::get(path.clone());
                async move {
                    tracing::debug!(object_id, attempt, "Fetching control points");
                    self.session.fetch_json::<Value>(request).await
                }
            })
            .await;

        let body = match outcome {
            FetchOutcome::Ok(body) => body,
            other => {
                tracing::warn!(
                    "Control points for {} unavailable ({}); skipping object",
                    object_id,
                    other.label()
                );
                return None;
            }
        };
        if is_blank(&body) {
            tracing::info!(
                "Control points for {} came back empty; skipping object",
                object_id
            );
            return None;
        }

        match serde_json::from_value::<EtapiResponse>(body) {
            Ok(response) => Some(ControlPoints::from(response)),
            Err(e) => {
                tracing::warn!("Control points for {} undecodable: {}", object_id, e);
                None
            }
        }
    }

    /// Project manager name; "no data" when the snapshot or the manager is
    /// missing
    pub async fn get_manager_name(&self, object_id: i64) -> String {
        match self.get_dashboard(object_id).await {
            FetchOutcome::Ok(snapshot) => snapshot.manager_name(),
            _ => crate::core::NO_DATA.to_string(),
        }
    }

    /// Work-ledger reference URL from the snapshot, if any
    pub async fn get_ledger_reference(&self, object_id: i64) -> Option<String> {
        let snapshot = self.get_dashboard(object_id).await.ok()?;
        snapshot.ledger_reference().map(str::to_string)
    }

    pub fn object_links(&self, object_id: i64) -> ObjectLinks {
        let base = self.session.origin().as_str().trim_end_matches('/');
        ObjectLinks {
            etapi_url: format!("{}/etapi/{}", base, object_id),
            dashboard_url: format!("{}/dashboard/{}", base, object_id),
        }
    }
}

#[async_trait]
impl PhotoSource for CatalogClient {
    async fn fetch_photo(&self, url: &str) -> Option<Vec<u8>> {
        match self.session.fetch_bytes(url, self.photo_timeout).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::debug!("Photo fetch failed: {}", e);
                None
            }
        }
    }
}

fn is_blank(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Catalog entries without a numeric id are unusable and skipped
fn parse_catalog_item(item: Value) -> Option<CatalogObject> {
    match serde_json::from_value::<CatalogObject>(item) {
        Ok(object) => Some(object),
        Err(e) => {
            tracing::warn!("Skipping malformed catalog entry: {}", e);
            None
        }
    }
}
