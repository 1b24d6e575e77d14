//! Stage progress and video presence reports
//!
//! Both are flat projections of a single dashboard snapshot per object.

use serde::Serialize;

use crate::core::{CatalogObject, DashboardSnapshot};

/// One line of the plan-fact report: a stage, or a child of the stage
/// listed right above it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanFactRow {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub uin: Option<String>,
    pub view_name: Option<String>,
    pub fact: Option<f64>,
    pub plan: Option<f64>,
    pub fact_delta_week: Option<f64>,
    pub fact_delta_month: Option<f64>,
    pub plan_delta_week: Option<f64>,
    pub plan_delta_month: Option<f64>,
    pub link: String,
}

/// Flatten `constructionStagesData` of one snapshot
pub fn plan_fact_rows(snapshot: &DashboardSnapshot, dashboard_url: &str) -> Vec<PlanFactRow> {
    let object = &snapshot.object;
    let blank = || PlanFactRow {
        id: object.id,
        name: object.name.clone(),
        uin: object.uin.clone(),
        view_name: None,
        fact: None,
        plan: None,
        fact_delta_week: None,
        fact_delta_month: None,
        plan_delta_week: None,
        plan_delta_month: None,
        link: dashboard_url.to_string(),
    };

    let mut rows = Vec::new();
    for stage in &snapshot.construction_stages {
        let progress = stage.oiv.clone().unwrap_or_default();
        rows.push(PlanFactRow {
            view_name: stage.view_name.clone(),
            fact: progress.fact,
            plan: progress.plan,
            fact_delta_week: progress.delta_fact_week,
            fact_delta_month: progress.delta_fact_month,
            plan_delta_week: progress.delta_plan_week,
            plan_delta_month: progress.delta_plan_month,
            ..blank()
        });

        for child in stage.children() {
            rows.push(PlanFactRow {
                view_name: child.view_name,
                fact: child.fact,
                ..blank()
            });
        }
    }
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoReportRow {
    pub name: String,
    pub id: i64,
    pub uin: Option<String>,
    pub video: &'static str,
}

impl VideoReportRow {
    /// A missing snapshot counts as "no video"
    pub fn new(object: &CatalogObject, snapshot: Option<&DashboardSnapshot>) -> Self {
        let has_video = snapshot.is_some_and(DashboardSnapshot::has_video);
        Self {
            name: object.name.clone(),
            id: object.id,
            uin: object.uin.clone(),
            video: if has_video { "video present" } else { "no video" },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(value: serde_json::Value) -> DashboardSnapshot {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_plan_fact_rows_with_list_and_map_children() {
        let snap = snapshot(json!({
            "object": {"id": 5, "name": "School", "uin": "U-5"},
            "constructionStagesData": [
                {
                    "view_name": "Frame",
                    "oiv": {"fact": "42.5", "plan": 50, "delta_fact_week": 1.5,
                            "delta_fact_month": null, "delta_plan_week": 2, "delta_plan_month": 8},
                    "children": [
                        {"view_name": "Floors 1-5", "fact_oiv": 80},
                        {"view_name": "no fact"},
                        "garbage"
                    ]
                },
                {
                    "view_name": "Facade",
                    "children": {
                        "a": {"view_name": "North", "fact_oiv": "10"},
                        "b": {"fact_oiv": 3}
                    }
                }
            ]
        }));

        let rows = plan_fact_rows(&snap, "https://d.test/dashboard/5");
        let names: Vec<_> = rows.iter().map(|r| r.view_name.as_deref()).collect();
        assert_eq!(
            names,
            vec![Some("Frame"), Some("Floors 1-5"), Some("Facade"), Some("North")]
        );

        assert_eq!(rows[0].fact, Some(42.5));
        assert_eq!(rows[0].plan, Some(50.0));
        assert_eq!(rows[0].fact_delta_month, None);
        assert_eq!(rows[0].plan_delta_month, Some(8.0));
        assert_eq!(rows[1].fact, Some(80.0));
        assert_eq!(rows[1].plan, None);
        assert_eq!(rows[2].fact, None);
        assert_eq!(rows[3].fact, Some(10.0));
        assert!(rows.iter().all(|r| r.id == Some(5) && r.link == "https://d.test/dashboard/5"));
    }

    #[test]
    fn test_plan_fact_rows_empty_without_stages() {
        let snap = snapshot(json!({"object": {"id": 5}, "constructionStagesData": null}));
        assert!(plan_fact_rows(&snap, "x").is_empty());
    }

    #[test]
    fn test_video_rows() {
        let object: CatalogObject =
            serde_json::from_value(json!({"id": 9, "name": "Depot", "uin": "U-9"})).unwrap();

        let with_video = snapshot(json!({"object": {"video_links": [{"url": "rtsp://cam"}]}}));
        let empty_links = snapshot(json!({"object": {"video_links": []}}));

        assert_eq!(VideoReportRow::new(&object, Some(&with_video)).video, "video present");
        assert_eq!(VideoReportRow::new(&object, Some(&empty_links)).video, "no video");
        assert_eq!(VideoReportRow::new(&object, None).video, "no video");
        assert_eq!(VideoReportRow::new(&object, None).uin.as_deref(), Some("U-9"));
    }
}
