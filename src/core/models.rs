//! Wire models for the dashboard and work-ledger payloads
//!
//! Upstream JSON is loosely typed: numbers arrive as strings, lists arrive as
//! `null`, stage children arrive as either a list or a keyed map. The helpers
//! at the bottom of this file absorb those variations at decode time.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::dates::{parse_directive_date, parse_iso_date};

/// Shown wherever a project manager is unknown
pub const NO_DATA: &str = "no data";

/// Host fragment identifying ledger references served by the Exon system
pub const EXON_MARKER: &str = "exonproject";

// --- Catalog ---

/// One object from `/api/catalog`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogObject {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub uin: Option<String>,
    #[serde(default)]
    pub developer: Option<Developer>,
    #[serde(default)]
    pub planned_commissioning_directive_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: Option<String>,
    /// Fields this tool does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogObject {
    pub fn developer_name(&self) -> Option<&str> {
        self.developer.as_ref().and_then(|d| d.name.as_deref())
    }

    pub fn directive_date(&self) -> Option<NaiveDate> {
        self.planned_commissioning_directive_date
            .as_deref()
            .and_then(parse_directive_date)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Developer {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CatalogResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub objects: DataEnvelope<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct DataEnvelope<T> {
    #[serde(default = "Vec::new", deserialize_with = "null_as_default")]
    pub data: Vec<T>,
}

impl<T> Default for DataEnvelope<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

// --- Dashboard ---

/// Per-object document from `/api/dashboard/{id}`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DashboardSnapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub object: DashboardObject,
    #[serde(default, deserialize_with = "null_as_default")]
    pub photos: Vec<PhotoRecord>,
    #[serde(rename = "basePhotoUrl", default)]
    pub base_photo_url: Option<String>,
    #[serde(
        rename = "constructionStagesData",
        default,
        deserialize_with = "null_as_default"
    )]
    pub construction_stages: Vec<ConstructionStage>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DashboardObject {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub uin: Option<String>,
    #[serde(default)]
    pub video_links: Option<Vec<Value>>,
    /// Reference URL into the work ledger
    #[serde(default)]
    pub suid_ksg_url: Option<String>,
    #[serde(default)]
    pub project_manager: Option<ProjectManager>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProjectManager {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PhotoRecord {
    #[serde(default)]
    pub taken_at: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConstructionStage {
    #[serde(default)]
    pub view_name: Option<String>,
    #[serde(default)]
    pub oiv: Option<StageProgress>,
    /// Either a list or an object keyed by child id
    #[serde(default)]
    pub children: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StageProgress {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fact: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub plan: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub delta_fact_week: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub delta_fact_month: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub delta_plan_week: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub delta_plan_month: Option<f64>,
}

/// A child entry of a construction stage that carries its own fact value
#[derive(Debug, Clone, PartialEq)]
pub struct StageChild {
    pub view_name: Option<String>,
    pub fact: Option<f64>,
}

impl DashboardSnapshot {
    pub fn has_video(&self) -> bool {
        self.object
            .video_links
            .as_ref()
            .is_some_and(|links| !links.is_empty())
    }

    /// Reference URL into the work ledger, if the dashboard links one
    pub fn ledger_reference(&self) -> Option<&str> {
        self.object
            .suid_ksg_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Project manager name, or [`NO_DATA`] when the nested object is absent
    pub fn manager_name(&self) -> String {
        self.object
            .project_manager
            .as_ref()
            .and_then(|pm| pm.name.clone())
            .unwrap_or_else(|| NO_DATA.to_string())
    }
}

impl ConstructionStage {
    /// Children that have both `view_name` and `fact_oiv` keys
    pub fn children(&self) -> Vec<StageChild> {
        let entries: Vec<&Value> = match &self.children {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(Value::Object(map)) => map.values().collect(),
            _ => Vec::new(),
        };

        entries
            .into_iter()
            .filter_map(Value::as_object)
            .filter(|child| child.contains_key("view_name") && child.contains_key("fact_oiv"))
            .map(|child| StageChild {
                view_name: child
                    .get("view_name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                fact: child.get("fact_oiv").and_then(value_as_f64),
            })
            .collect()
    }
}

// --- Control points ---

/// Lifecycle bucket a control point was listed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlPointStatus {
    InProgress,
    Complete,
}

impl ControlPointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlPointStatus::InProgress => "in_progress",
            ControlPointStatus::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPoint {
    pub name: Option<String>,
    pub plan_start_date: Option<String>,
    pub fact_start_date: Option<String>,
    pub plan_finish_date: Option<String>,
    pub fact_finish_date: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub plan: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub fact: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub plan_progress: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub fact_progress: Option<f64>,
    #[serde(deserialize_with = "lenient_bool")]
    pub readiness: Option<bool>,
    pub color: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
}

impl ControlPoint {
    pub fn planned_finish(&self) -> Option<NaiveDate> {
        self.plan_finish_date.as_deref().and_then(parse_iso_date)
    }

    pub fn actual_finish(&self) -> Option<NaiveDate> {
        self.fact_finish_date.as_deref().and_then(parse_iso_date)
    }

    /// Name usable for ledger matching; blank names cannot be matched
    pub fn match_key(&self) -> Option<String> {
        self.name.as_deref().and_then(ledger_key)
    }
}

/// Control points of one object, split by status
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlPoints {
    pub in_progress: Vec<ControlPoint>,
    pub complete: Vec<ControlPoint>,
}

impl ControlPoints {
    pub fn is_empty(&self) -> bool {
        self.in_progress.is_empty() && self.complete.is_empty()
    }

    /// In-progress points first, then complete ones, each in upstream order
    pub fn iter(&self) -> impl Iterator<Item = (ControlPointStatus, &ControlPoint)> {
        self.in_progress
            .iter()
            .map(|p| (ControlPointStatus::InProgress, p))
            .chain(
                self.complete
                    .iter()
                    .map(|p| (ControlPointStatus::Complete, p)),
            )
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EtapiResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub control_points: EtapiControlPoints,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EtapiControlPoints {
    #[serde(default, deserialize_with = "null_as_default")]
    pub in_progress: DataEnvelope<ControlPoint>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub complete: DataEnvelope<ControlPoint>,
}

impl From<EtapiResponse> for ControlPoints {
    fn from(resp: EtapiResponse) -> Self {
        Self {
            in_progress: resp.control_points.in_progress.data,
            complete: resp.control_points.complete.data,
        }
    }
}

// --- Work ledger ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkLedgerEntry {
    pub name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub fact_end_date: Option<String>,
}

impl WorkLedgerEntry {
    pub fn planned_start(&self) -> Option<NaiveDate> {
        self.start_date.as_deref().and_then(parse_iso_date)
    }

    pub fn planned_end(&self) -> Option<NaiveDate> {
        self.end_date.as_deref().and_then(parse_iso_date)
    }

    pub fn actual_end(&self) -> Option<NaiveDate> {
        self.fact_end_date.as_deref().and_then(parse_iso_date)
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WorksResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub works: Vec<WorkLedgerEntry>,
}

/// Normalized key for name matching: trimmed, lowercased, exact otherwise
pub fn ledger_key(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

// --- Lenient decoding helpers ---

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalog_object_passthrough_fields() {
        let obj: CatalogObject = serde_json::from_value(json!({
            "id": 1257,
            "name": "School No. 5",
            "uin": 771,
            "developer": {"name": "Mosinzhproekt"},
            "planned_commissioning_directive_date": "31.12.2025",
            "district": "North"
        }))
        .unwrap();

        assert_eq!(obj.id, 1257);
        assert_eq!(obj.uin.as_deref(), Some("771"));
        assert_eq!(obj.developer_name(), Some("Mosinzhproekt"));
        assert_eq!(obj.directive_date(), NaiveDate::from_ymd_opt(2025, 12, 31));
        assert_eq!(obj.extra.get("district"), Some(&json!("North")));
    }

    #[test]
    fn test_control_point_lenient_fields() {
        let point: ControlPoint = serde_json::from_value(json!({
            "name": "Foundation Pour",
            "plan_finish_date": "2024-03-01",
            "fact_finish_date": null,
            "plan": "100",
            "fact": 42.5,
            "readiness": 1,
            "color": "red"
        }))
        .unwrap();

        assert_eq!(point.plan, Some(100.0));
        assert_eq!(point.fact, Some(42.5));
        assert_eq!(point.readiness, Some(true));
        assert_eq!(point.planned_finish(), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(point.actual_finish(), None);
        assert_eq!(point.match_key().as_deref(), Some("foundation pour"));
    }

    #[test]
    fn test_etapi_null_buckets() {
        let resp: EtapiResponse = serde_json::from_value(json!({
            "control_points": {"in_progress": {"data": null}, "complete": null}
        }))
        .unwrap();
        let points = ControlPoints::from(resp);
        assert!(points.is_empty());
    }

    #[test]
    fn test_control_points_iteration_order() {
        let points = ControlPoints {
            in_progress: vec![ControlPoint {
                name: Some("a".into()),
                ..Default::default()
            }],
            complete: vec![ControlPoint {
                name: Some("b".into()),
                ..Default::default()
            }],
        };
        let order: Vec<_> = points
            .iter()
            .map(|(status, p)| (status, p.name.clone().unwrap()))
            .collect();
        assert_eq!(
            order,
            vec![
                (ControlPointStatus::InProgress, "a".to_string()),
                (ControlPointStatus::Complete, "b".to_string())
            ]
        );
    }

    #[test]
    fn test_dashboard_manager_sentinel() {
        let snap: DashboardSnapshot = serde_json::from_value(json!({"object": {"id": 1}})).unwrap();
        assert_eq!(snap.manager_name(), NO_DATA);

        let snap: DashboardSnapshot = serde_json::from_value(json!({
            "object": {"project_manager": {"name": "I. Petrov"}}
        }))
        .unwrap();
        assert_eq!(snap.manager_name(), "I. Petrov");
    }

    #[test]
    fn test_dashboard_video_and_reference() {
        let snap: DashboardSnapshot = serde_json::from_value(json!({
            "object": {"video_links": [], "suid_ksg_url": "  "}
        }))
        .unwrap();
        assert!(!snap.has_video());
        assert_eq!(snap.ledger_reference(), None);

        let snap: DashboardSnapshot = serde_json::from_value(json!({
            "object": {
                "video_links": ["rtsp://cam"],
                "suid_ksg_url": "https://ledger.test/ksg/3f1c"
            },
            "photos": null
        }))
        .unwrap();
        assert!(snap.has_video());
        assert_eq!(snap.ledger_reference(), Some("https://ledger.test/ksg/3f1c"));
        assert!(snap.photos.is_empty());
    }

    #[test]
    fn test_stage_children_list_and_map() {
        let stage: ConstructionStage = serde_json::from_value(json!({
            "view_name": "Frame",
            "children": [
                {"view_name": "Floors 1-5", "fact_oiv": 40},
                {"view_name": "No fact"},
                "junk"
            ]
        }))
        .unwrap();
        assert_eq!(
            stage.children(),
            vec![StageChild {
                view_name: Some("Floors 1-5".into()),
                fact: Some(40.0)
            }]
        );

        let stage: ConstructionStage = serde_json::from_value(json!({
            "children": {"7": {"view_name": "Roof", "fact_oiv": "12.5"}}
        }))
        .unwrap();
        assert_eq!(stage.children()[0].fact, Some(12.5));

        let stage: ConstructionStage = serde_json::from_value(json!({"children": null})).unwrap();
        assert!(stage.children().is_empty());
    }

    #[test]
    fn test_ledger_key() {
        assert_eq!(ledger_key("  Foundation Pour "), Some("foundation pour".into()));
        assert_eq!(ledger_key("   "), None);
        assert_ne!(ledger_key("Foundation  Pour"), ledger_key("foundation pour"));
    }
}
