//! Videos command implementation

use clap::Args;

use super::{open_catalog, today, OutputArgs, SsoArgs};
use crate::pipeline::VideoReportRow;
use crate::settings::Settings;

const REPORT_NAME: &str = "videos";

/// Arguments for the videos command
#[derive(Args, Debug, Default)]
pub struct VideosArgs {
    #[command(flatten)]
    pub sso: SsoArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Catalog status filter (oksStatusArrayName)
    #[arg(long)]
    pub status: Option<String>,
}

/// Run the videos command
pub async fn run(args: VideosArgs, settings: Settings) -> anyhow::Result<()> {
    let catalog = open_catalog(&settings, &args.sso).await?;

    let status = args.status.as_deref().or(settings.reports.catalog_status.as_deref());
    let objects = catalog.list_objects(status).await;
    println!("Objects found: {}", objects.len());

    let mut throttle = settings.throttle.snapshots();
    let mut rows = Vec::with_capacity(objects.len());
    for object in &objects {
        throttle.ready().await;
        let snapshot = catalog.get_dashboard(object.id).await.ok();
        let row = VideoReportRow::new(object, snapshot.as_ref());
        tracing::info!("Object {}: {}", object.id, row.video);
        rows.push(row);
    }

    let path = args.output.write(&settings, REPORT_NAME, today(), &rows)?;
    println!("Report written: {}", path.display());
    Ok(())
}
