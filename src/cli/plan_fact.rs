//! Plan-fact command implementation

use clap::Args;

use super::{open_catalog, today, OutputArgs, SsoArgs};
use crate::pipeline::plan_fact_rows;
use crate::settings::Settings;

const REPORT_NAME: &str = "plan_fact";

/// Arguments for the plan-fact command
#[derive(Args, Debug, Default)]
pub struct PlanFactArgs {
    #[command(flatten)]
    pub sso: SsoArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Catalog status filter (oksStatusArrayName)
    #[arg(long)]
    pub status: Option<String>,
}

/// Run the plan-fact command
pub async fn run(args: PlanFactArgs, settings: Settings) -> anyhow::Result<()> {
    let catalog = open_catalog(&settings, &args.sso).await?;

    let status = args.status.as_deref().or(settings.reports.catalog_status.as_deref());
    let objects = catalog.list_objects(status).await;
    let total = objects.len();

    let mut throttle = settings.throttle.snapshots();
    let mut rows = Vec::new();
    for (idx, object) in objects.iter().enumerate() {
        throttle.ready().await;
        let Some(snapshot) = catalog.get_dashboard(object.id).await.ok() else {
            continue;
        };
        let links = catalog.object_links(object.id);
        rows.extend(plan_fact_rows(&snapshot, &links.dashboard_url));
        tracing::info!("{} processed, {} objects left", object.id, total - idx - 1);
    }

    let path = args.output.write(&settings, REPORT_NAME, today(), &rows)?;
    println!("Report written: {} ({} rows)", path.display(), rows.len());
    Ok(())
}
