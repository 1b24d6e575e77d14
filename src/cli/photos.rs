//! Photos command implementation
//!
//! Runs the stalled-camera check on the objects named in the photo
//! allow-list.

use clap::Args;
use std::collections::HashSet;
use std::path::PathBuf;

use super::{open_catalog, today, OutputArgs, SsoArgs};
use crate::core::FetchOutcome;
use crate::pipeline::{PhotoDuplicateDetector, PhotoReportRow, PhotoStatus, PhotoVerdict};
use crate::report;
use crate::settings::Settings;

const REPORT_NAME: &str = "photos";

/// Arguments for the photos command
#[derive(Args, Debug, Default)]
pub struct PhotosArgs {
    #[command(flatten)]
    pub sso: SsoArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Allow-list of object ids to check (column `id`)
    #[arg(long)]
    pub objects: Option<PathBuf>,
}

/// Run the photos command
pub async fn run(args: PhotosArgs, settings: Settings) -> anyhow::Result<()> {
    let catalog = open_catalog(&settings, &args.sso).await?;

    let list_path = args
        .objects
        .unwrap_or_else(|| settings.reports.photo_objects.clone());
    let wanted = report::read_id_list(&list_path).unwrap_or_else(|e| {
        tracing::warn!("Photo allow-list unavailable: {}", e);
        HashSet::new()
    });

    let mut seen = HashSet::new();
    let objects: Vec<_> = catalog
        .list_objects(None)
        .await
        .into_iter()
        .filter(|object| wanted.contains(&object.id))
        .filter(|object| seen.insert(object.id))
        .collect();
    println!("Objects to check: {}", objects.len());

    let date = today();
    let detector = PhotoDuplicateDetector::new(&catalog);
    let mut throttle = settings.throttle.photos();
    let mut rows = Vec::with_capacity(objects.len());

    for object in &objects {
        throttle.ready().await;
        tracing::info!("Checking photos for object {}", object.id);

        let verdict = match catalog.get_dashboard(object.id).await {
            FetchOutcome::Ok(snapshot) => detector.classify(&snapshot, date).await,
            _ => PhotoVerdict::NO_PHOTOS,
        };
        tracing::info!("  status: {}", verdict.status.as_str());
        rows.push(PhotoReportRow::new(object, verdict));
    }

    for status in [PhotoStatus::PhotosOk, PhotoStatus::MatchPresent, PhotoStatus::NoPhotos] {
        let count = rows.iter().filter(|r| r.photo_status == status.as_str()).count();
        println!("  {:<14} {}", status.as_str(), count);
    }

    let path = args.output.write(&settings, REPORT_NAME, date, &rows)?;
    println!("Report written: {}", path.display());
    Ok(())
}
