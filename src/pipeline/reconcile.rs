//! Control-point reconciliation
//!
//! Turns collected [`ObjectRecord`]s into report rows and cross-checks them
//! against the work ledger:
//! - overdue rows without a classification are looked up by name
//! - supplementary names from the allow-list are checked per object
//! - excluded object ids are flagged, never removed
//!
//! Ledger works are fetched at most once per object per run.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use super::collect::ObjectRecord;
use crate::backends::dashboard::ObjectLinks;
use crate::backends::WorkSource;
use crate::core::dates::dates_equal;
use crate::core::{
    ledger_key, ControlPoint, ControlPointStatus, Throttle, WorkLedgerEntry, EXON_MARKER,
};

pub const STATUS_NO_CONTROL_POINTS: &str = "no_control_points";
pub const STATUS_ADDITIONAL_CHECK: &str = "additional_check";

/// How a row was matched (or not) against the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResolution {
    /// Scheduled in the Exon system; the ledger is not consulted
    ExonObject,
    WorkNotFound,
    AdditionalPoint,
    NotFoundInLedger,
}

impl MatchResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchResolution::ExonObject => "exon object",
            MatchResolution::WorkNotFound => "work not found in ledger",
            MatchResolution::AdditionalPoint => "additional point",
            MatchResolution::NotFoundInLedger => "not found in ledger",
        }
    }
}

/// Ledger dates attached to a matched row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerDates {
    pub planned_start: Option<NaiveDate>,
    pub planned_end: Option<NaiveDate>,
    pub actual_end: Option<NaiveDate>,
}

impl From<&WorkLedgerEntry> for LedgerDates {
    fn from(entry: &WorkLedgerEntry) -> Self {
        Self {
            planned_start: entry.planned_start(),
            planned_end: entry.planned_end(),
            actual_end: entry.actual_end(),
        }
    }
}

/// Fields every row carries
#[derive(Debug, Clone, PartialEq)]
pub struct RowContext {
    pub object_id: i64,
    pub object_name: String,
    pub developer: Option<String>,
    pub project_manager: String,
    pub directive_raw: Option<String>,
    pub directive_date: Option<NaiveDate>,
    pub ledger_reference: Option<String>,
    pub links: ObjectLinks,
    pub today: NaiveDate,
    pub excluded: bool,
}

impl RowContext {
    fn is_exon(&self) -> bool {
        self.ledger_reference
            .as_deref()
            .is_some_and(|url| url.contains(EXON_MARKER))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointRow {
    pub status: ControlPointStatus,
    pub point: ControlPoint,
    pub ledger: Option<LedgerDates>,
    pub resolution: Option<MatchResolution>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupplementaryRow {
    /// Normalized name from the allow-list
    pub name: String,
    pub ledger: Option<LedgerDates>,
    pub resolution: MatchResolution,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowKind {
    NoControlPoints,
    ControlPoint(PointRow),
    Supplementary(SupplementaryRow),
}

/// One output unit of the control-point report
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRow {
    pub context: RowContext,
    pub kind: RowKind,
}

/// Overdue rule for a dated control point. `None` when no planned finish is
/// known.
pub fn overdue(
    planned: Option<NaiveDate>,
    actual: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<bool> {
    let planned = planned?;
    if actual == Some(planned) {
        return Some(false);
    }
    Some(planned <= today)
}

impl ReconciledRow {
    pub fn status(&self) -> &'static str {
        match &self.kind {
            RowKind::NoControlPoints => STATUS_NO_CONTROL_POINTS,
            RowKind::ControlPoint(row) => row.status.as_str(),
            RowKind::Supplementary(_) => STATUS_ADDITIONAL_CHECK,
        }
    }

    pub fn overdue(&self) -> Option<bool> {
        match &self.kind {
            RowKind::NoControlPoints => Some(true),
            RowKind::ControlPoint(row) => overdue(
                row.point.planned_finish(),
                row.point.actual_finish(),
                self.context.today,
            ),
            RowKind::Supplementary(_) => None,
        }
    }

    pub fn resolution(&self) -> Option<MatchResolution> {
        match &self.kind {
            RowKind::NoControlPoints => None,
            RowKind::ControlPoint(row) => row.resolution,
            RowKind::Supplementary(row) => Some(row.resolution),
        }
    }

    pub fn ledger(&self) -> Option<LedgerDates> {
        match &self.kind {
            RowKind::NoControlPoints => None,
            RowKind::ControlPoint(row) => row.ledger,
            RowKind::Supplementary(row) => row.ledger,
        }
    }

    fn planned_finish(&self) -> Option<NaiveDate> {
        match &self.kind {
            RowKind::ControlPoint(row) => row.point.planned_finish(),
            _ => None,
        }
    }

    /// Candidate for a ledger lookup: dated, overdue and not yet classified
    pub fn needs_ledger(&self) -> bool {
        matches!(&self.kind, RowKind::ControlPoint(row) if row.resolution.is_none())
            && self.overdue() == Some(true)
    }

    /// Flatten into the report's column layout
    pub fn to_flat(&self) -> FlatRow {
        let ctx = &self.context;
        let ledger = self.ledger().unwrap_or_default();
        let planned_finish = self.planned_finish();
        let point = match &self.kind {
            RowKind::ControlPoint(row) => Some(&row.point),
            _ => None,
        };
        let name = match &self.kind {
            RowKind::NoControlPoints => None,
            RowKind::ControlPoint(row) => row.point.name.clone(),
            RowKind::Supplementary(row) => Some(row.name.clone()),
        };
        let found_in_ledger = match &self.kind {
            RowKind::Supplementary(row) => Some(row.ledger.is_some()),
            _ => None,
        };

        FlatRow {
            object_id: ctx.object_id,
            object_name: ctx.object_name.clone(),
            status: self.status(),
            name,
            developer: ctx.developer.clone(),
            project_manager: ctx.project_manager.clone(),
            plan_start_date: point.and_then(|p| p.plan_start_date.clone()),
            fact_start_date: point.and_then(|p| p.fact_start_date.clone()),
            plan_finish_date: point.and_then(|p| p.plan_finish_date.clone()),
            fact_finish_date: point.and_then(|p| p.fact_finish_date.clone()),
            plan: point.and_then(|p| p.plan),
            fact: point.and_then(|p| p.fact),
            plan_progress: point.and_then(|p| p.plan_progress),
            fact_progress: point.and_then(|p| p.fact_progress),
            readiness: point.and_then(|p| p.readiness),
            color: point.and_then(|p| p.color.clone()),
            created_at: point.and_then(|p| p.created_at.clone()),
            updated_at: point.and_then(|p| p.updated_at.clone()),
            deleted_at: point.and_then(|p| p.deleted_at.clone()),
            planned_commissioning_directive_date: ctx.directive_raw.clone(),
            today: ctx.today,
            overdue: self.overdue(),
            ledger_url: ctx.ledger_reference.clone(),
            ledger_start: ledger.planned_start,
            ledger_end: ledger.planned_end,
            ledger_fact_end: ledger.actual_end,
            found_in_ledger,
            match_resolution: self.resolution().map(|r| r.as_str()),
            is_dates_equal: dates_equal(planned_finish, ledger.planned_end),
            is_fact_date_ledger_equal: dates_equal(planned_finish, ledger.actual_end),
            is_directive_equal: dates_equal(planned_finish, ctx.directive_date),
            exclude_from_check: ctx.excluded,
            etapi_url: ctx.links.etapi_url.clone(),
            dashboard_url: ctx.links.dashboard_url.clone(),
        }
    }
}

/// Column layout of the control-point report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatRow {
    pub object_id: i64,
    pub object_name: String,
    pub status: &'static str,
    pub name: Option<String>,
    pub developer: Option<String>,
    pub project_manager: String,
    pub plan_start_date: Option<String>,
    pub fact_start_date: Option<String>,
    pub plan_finish_date: Option<String>,
    pub fact_finish_date: Option<String>,
    pub plan: Option<f64>,
    pub fact: Option<f64>,
    pub plan_progress: Option<f64>,
    pub fact_progress: Option<f64>,
    pub readiness: Option<bool>,
    pub color: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
    pub planned_commissioning_directive_date: Option<String>,
    pub today: NaiveDate,
    pub overdue: Option<bool>,
    pub ledger_url: Option<String>,
    pub ledger_start: Option<NaiveDate>,
    pub ledger_end: Option<NaiveDate>,
    pub ledger_fact_end: Option<NaiveDate>,
    pub found_in_ledger: Option<bool>,
    pub match_resolution: Option<&'static str>,
    pub is_dates_equal: bool,
    pub is_fact_date_ledger_equal: bool,
    pub is_directive_equal: bool,
    pub exclude_from_check: bool,
    pub etapi_url: String,
    pub dashboard_url: String,
}

/// Ledger works of one object keyed by normalized name; later duplicates win
type LedgerIndex = HashMap<String, WorkLedgerEntry>;

fn index_works(works: Vec<WorkLedgerEntry>) -> LedgerIndex {
    works
        .into_iter()
        .filter_map(|work| {
            let key = work.name.as_deref().and_then(ledger_key)?;
            Some((key, work))
        })
        .collect()
}

/// Counters reported after a ledger pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerPassSummary {
    pub candidates: usize,
    pub matched: usize,
    pub not_found: usize,
}

pub struct Reconciler {
    today: NaiveDate,
    throttle: Throttle,
    cache: HashMap<i64, LedgerIndex>,
}

impl Reconciler {
    pub fn new(today: NaiveDate, throttle: Throttle) -> Self {
        Self {
            today,
            throttle,
            cache: HashMap::new(),
        }
    }

    /// One row per control point, or a single `no_control_points` row.
    /// Exon-hosted objects are classified immediately.
    pub fn build_rows(&self, records: Vec<ObjectRecord>) -> Vec<ReconciledRow> {
        let mut rows = Vec::new();
        for record in records {
            let context = RowContext {
                object_id: record.object.id,
                developer: record.object.developer_name().map(str::to_string),
                directive_raw: record.object.planned_commissioning_directive_date.clone(),
                directive_date: record.object.directive_date(),
                object_name: record.object.name,
                project_manager: record.project_manager,
                ledger_reference: record.ledger_reference,
                links: record.links,
                today: self.today,
                excluded: false,
            };

            if record.control_points.is_empty() {
                rows.push(ReconciledRow {
                    context,
                    kind: RowKind::NoControlPoints,
                });
                continue;
            }

            let resolution = context.is_exon().then_some(MatchResolution::ExonObject);
            for (status, point) in record.control_points.iter() {
                rows.push(ReconciledRow {
                    context: context.clone(),
                    kind: RowKind::ControlPoint(PointRow {
                        status,
                        point: point.clone(),
                        ledger: None,
                        resolution,
                    }),
                });
            }
        }
        rows
    }

    /// Works of one object, fetched on first use
    async fn works_for(
        &mut self,
        source: &dyn WorkSource,
        object_id: i64,
        reference: &str,
    ) -> &LedgerIndex {
        if !self.cache.contains_key(&object_id) {
            self.throttle.ready().await;
            let works = source.list_works(reference).await;
            tracing::info!("  {} works listed for object {}", works.len(), object_id);
            self.cache.insert(object_id, index_works(works));
        }
        &self.cache[&object_id]
    }

    /// Look up overdue, unclassified rows in the ledger by exact name
    pub async fn resolve_overdue(
        &mut self,
        rows: &mut [ReconciledRow],
        source: &dyn WorkSource,
    ) -> LedgerPassSummary {
        let mut summary = LedgerPassSummary::default();

        for row in rows.iter_mut() {
            if !row.needs_ledger() {
                continue;
            }
            summary.candidates += 1;

            let Some(reference) = row.context.ledger_reference.clone() else {
                tracing::debug!("Object {} has no ledger reference", row.context.object_id);
                continue;
            };
            let object_id = row.context.object_id;
            let RowKind::ControlPoint(point_row) = &mut row.kind else {
                continue;
            };
            let Some(key) = point_row.point.match_key() else {
                continue;
            };

            let index = self.works_for(source, object_id, &reference).await;
            match index.get(&key) {
                Some(work) => {
                    point_row.ledger = Some(LedgerDates::from(work));
                    summary.matched += 1;
                }
                None => {
                    point_row.resolution = Some(MatchResolution::WorkNotFound);
                    summary.not_found += 1;
                    tracing::debug!("Not in ledger: {} - {}", object_id, key);
                }
            }
        }

        tracing::info!(
            "Ledger matched {} of {} overdue rows",
            summary.matched,
            summary.candidates
        );
        summary
    }

    /// One row per (eligible object, supplementary name). Eligible objects
    /// have control points and a ledger reference outside the Exon system.
    pub async fn supplementary_rows(
        &mut self,
        rows: &[ReconciledRow],
        names: &[String],
        source: &dyn WorkSource,
    ) -> Vec<ReconciledRow> {
        let keys: Vec<String> = names.iter().filter_map(|n| ledger_key(n)).collect();
        if keys.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let eligible: Vec<&RowContext> = rows
            .iter()
            .filter(|row| matches!(row.kind, RowKind::ControlPoint(_)))
            .map(|row| &row.context)
            .filter(|ctx| ctx.ledger_reference.is_some() && !ctx.is_exon())
            .filter(|ctx| seen.insert(ctx.object_id))
            .collect();
        tracing::info!(
            "Checking {} supplementary points on {} objects",
            keys.len(),
            eligible.len()
        );

        let mut extra = Vec::with_capacity(eligible.len() * keys.len());
        for context in eligible {
            let Some(reference) = context.ledger_reference.as_deref() else {
                continue;
            };
            let index = self.works_for(source, context.object_id, reference).await;

            for key in &keys {
                let ledger = index.get(key).map(LedgerDates::from);
                let resolution = if ledger.is_some() {
                    MatchResolution::AdditionalPoint
                } else {
                    MatchResolution::NotFoundInLedger
                };
                extra.push(ReconciledRow {
                    context: context.clone(),
                    kind: RowKind::Supplementary(SupplementaryRow {
                        name: key.clone(),
                        ledger,
                        resolution,
                    }),
                });
            }
        }
        extra
    }
}

/// Flag rows of excluded objects; returns how many rows were flagged
pub fn mark_excluded(rows: &mut [ReconciledRow], excluded: &HashSet<i64>) -> usize {
    let mut flagged = 0;
    for row in rows.iter_mut() {
        if excluded.contains(&row.context.object_id) {
            row.context.excluded = true;
            flagged += 1;
        }
    }
    flagged
}
