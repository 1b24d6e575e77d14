//! Dashboard pass of the control-point report
//!
//! Walks the catalog in order, one object at a time behind the object
//! throttle, and gathers everything the reconciler needs from the dashboard
//! backend. Objects whose control points cannot be fetched are dropped here.

use std::collections::HashMap;

use crate::backends::dashboard::{CatalogClient, ObjectLinks};
use crate::core::{CatalogObject, ControlPoints, Throttle};

/// Dashboard-side facts about one object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub object: CatalogObject,
    pub project_manager: String,
    /// Work-ledger reference; only kept for objects that have control points
    pub ledger_reference: Option<String>,
    pub links: ObjectLinks,
    pub control_points: ControlPoints,
}

/// Per-run cache of project-manager names keyed by object id
#[derive(Debug, Default)]
struct ManagerCache {
    names: HashMap<i64, String>,
}

impl ManagerCache {
    async fn name(&mut self, client: &CatalogClient, object_id: i64) -> String {
        if let Some(cached) = self.names.get(&object_id) {
            return cached.clone();
        }
        let name = client.get_manager_name(object_id).await;
        self.names.insert(object_id, name.clone());
        name
    }
}

/// Collect control points for every catalog object
pub async fn collect_control_points(
    client: &CatalogClient,
    objects: &[CatalogObject],
    throttle: &mut Throttle,
) -> Vec<ObjectRecord> {
    let mut managers = ManagerCache::default();
    let mut records = Vec::with_capacity(objects.len());
    let total = objects.len();

    for (idx, object) in objects.iter().enumerate() {
        throttle.ready().await;
        tracing::info!("[{}/{}] Processing object {}", idx + 1, total, object.id);

        let project_manager = managers.name(client, object.id).await;
        // A failed or blank etapi payload drops the object; an empty
        // `control_points` document becomes a no-control-points row
        let Some(control_points) = client.get_control_points(object.id).await else {
            continue;
        };

        let ledger_reference = if control_points.is_empty() {
            tracing::info!("  {} has no control points", object.id);
            None
        } else {
            let reference = client.get_ledger_reference(object.id).await;
            tracing::debug!("  ledger reference: {:?}", reference);
            reference
        };

        records.push(ObjectRecord {
            object: object.clone(),
            project_manager,
            ledger_reference,
            links: client.object_links(object.id),
            control_points,
        });
    }

    tracing::info!(
        "Collected control points for {} of {} objects",
        records.len(),
        total
    );
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::dashboard::AuthSession;
    use crate::core::retry::tests::RecordingPause;
    use crate::core::RetryPolicy;
    use crate::settings::DashboardEndpoints;
    use crate::test_support::{MockResponse, MockServer};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn object(id: i64, name: &str) -> CatalogObject {
        serde_json::from_value(json!({"id": id, "name": name})).unwrap()
    }

    #[tokio::test]
    async fn test_collect_skips_failed_and_keeps_empty() {
        let server = MockServer::bind();
        let endpoints = DashboardEndpoints {
            base_url: server.url().to_string(),
            ..DashboardEndpoints::default()
        };
        let session = AuthSession::new(endpoints, Duration::from_secs(5)).unwrap();
        let retry = RetryPolicy::new(1, Duration::from_secs(2));
        let client = CatalogClient::new(session, retry, Duration::from_secs(5))
            .with_pause(Arc::new(RecordingPause::default()));

        let handle = server.serve(|req| match req.path() {
            "/api/dashboard/1" | "/api/dashboard/2" => MockResponse::json(
                200,
                json!({"object": {"suid_ksg_url": "https://suid.test/ksg/u1",
                                  "project_manager": {"name": "Petrov"}}}),
            ),
            "/api/etapi/1" => MockResponse::json(
                200,
                json!({"control_points": {"in_progress": {"data": [{"name": "Frame"}]},
                                          "complete": {"data": []}}}),
            ),
            "/api/etapi/2" => MockResponse::json(200, json!({"control_points": {}})),
            "/api/etapi/3" => MockResponse::text(500, "down"),
            _ => MockResponse::text(404, "missing"),
        });

        let objects = vec![object(1, "A"), object(2, "B"), object(3, "C")];
        let mut throttle = Throttle::from_millis(0);
        let records = collect_control_points(&client, &objects, &mut throttle).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].object.id, 1);
        assert_eq!(records[0].project_manager, "Petrov");
        assert_eq!(
            records[0].ledger_reference.as_deref(),
            Some("https://suid.test/ksg/u1")
        );
        assert_eq!(records[0].control_points.iter().count(), 1);

        assert_eq!(records[1].object.id, 2);
        assert!(records[1].control_points.is_empty());
        assert!(records[1].ledger_reference.is_none());

        // manager read for every object, reference read only with points;
        // object 3 retried once
        assert_eq!(handle.requests_to("/api/dashboard/1").len(), 2);
        assert_eq!(handle.requests_to("/api/dashboard/2").len(), 1);
        assert_eq!(handle.requests_to("/api/dashboard/3").len(), 1);
        assert_eq!(handle.requests_to("/api/etapi/3").len(), 2);
        assert_eq!(records[0].links.dashboard_url, format!("{}/dashboard/1", handle.url));
    }
}
