//! Report pipelines built on top of the backends

pub mod collect;
pub mod photos;
pub mod reconcile;
pub mod stages;

pub use collect::collect_control_points;
pub use photos::{PhotoDuplicateDetector, PhotoReportRow, PhotoStatus, PhotoVerdict};
pub use reconcile::{mark_excluded, FlatRow, Reconciler};
pub use stages::{plan_fact_rows, VideoReportRow};
