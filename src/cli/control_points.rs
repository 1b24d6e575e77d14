//! Control-points command implementation
//!
//! Full reconciliation run:
//! 1. authorize both sessions (fails fast before any network-heavy work)
//! 2. collect control points per catalog object
//! 3. resolve overdue rows and supplementary points against the ledger,
//!    refreshing the ledger token before each pass
//! 4. flag excluded objects and write the report

use clap::Args;
use std::path::PathBuf;

use super::{open_catalog, today, LedgerArgs, OutputArgs, SsoArgs};
use crate::backends::WorkLedgerSession;
use crate::core::Credential;
use crate::pipeline::{collect_control_points, mark_excluded, FlatRow, Reconciler};
use crate::report;
use crate::settings::Settings;

const REPORT_NAME: &str = "control_points";

/// Arguments for the control-points command
#[derive(Args, Debug, Default)]
pub struct ControlPointsArgs {
    #[command(flatten)]
    pub sso: SsoArgs,

    #[command(flatten)]
    pub ledger: LedgerArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Catalog status filter (oksStatusArrayName)
    #[arg(long)]
    pub status: Option<String>,

    /// Allow-list of object ids to flag as excluded (column `id`)
    #[arg(long)]
    pub excluded: Option<PathBuf>,

    /// Allow-list of supplementary control-point names (column `points`)
    #[arg(long)]
    pub points: Option<PathBuf>,
}

/// Run the control-points command
pub async fn run(args: ControlPointsArgs, settings: Settings) -> anyhow::Result<()> {
    let ledger_credential = args.ledger.credential()?;
    let catalog = open_catalog(&settings, &args.sso).await?;

    let mut ledger =
        WorkLedgerSession::new(settings.ledger.clone(), settings.http.ledger_timeout())?;
    ledger.authorize(&ledger_credential).await?;
    println!("Work ledger credentials accepted");

    let status = args.status.as_deref().or(settings.reports.catalog_status.as_deref());
    let objects = catalog.list_objects(status).await;
    println!("Objects found: {}", objects.len());

    let mut throttle = settings.throttle.objects();
    let records = collect_control_points(&catalog, &objects, &mut throttle).await;

    let date = today();
    let mut reconciler = Reconciler::new(date, settings.throttle.ledger());
    let mut rows = reconciler.build_rows(records);

    if rows.iter().any(|row| row.needs_ledger()) {
        refresh_token(&mut ledger, &ledger_credential).await?;
        let summary = reconciler.resolve_overdue(&mut rows, &ledger).await;
        println!(
            "Ledger matched {} of {} overdue control points ({} not found)",
            summary.matched, summary.candidates, summary.not_found
        );
    }

    let points_path = args
        .points
        .unwrap_or_else(|| settings.reports.supplementary_points.clone());
    let names = report::read_name_list(&points_path).unwrap_or_else(|e| {
        tracing::warn!("Supplementary points unavailable: {}", e);
        Vec::new()
    });
    if !names.is_empty() {
        refresh_token(&mut ledger, &ledger_credential).await?;
        let extra = reconciler.supplementary_rows(&rows, &names, &ledger).await;
        println!("Supplementary rows added: {}", extra.len());
        rows.extend(extra);
    }

    let excluded_path = args
        .excluded
        .unwrap_or_else(|| settings.reports.excluded_objects.clone());
    let excluded = report::read_id_list(&excluded_path).unwrap_or_else(|e| {
        tracing::warn!("Exclusion list unavailable: {}", e);
        Default::default()
    });
    let flagged = mark_excluded(&mut rows, &excluded);
    tracing::info!("Rows flagged as excluded: {}", flagged);

    let flat: Vec<FlatRow> = rows.iter().map(|row| row.to_flat()).collect();
    let path = args.output.write(&settings, REPORT_NAME, date, &flat)?;
    println!("Report written: {}", path.display());
    Ok(())
}

async fn refresh_token(
    ledger: &mut WorkLedgerSession,
    credential: &Credential,
) -> anyhow::Result<()> {
    tracing::info!("Refreshing work ledger token");
    ledger.authorize(credential).await?;
    Ok(())
}
