//! Stalled-camera detection
//!
//! Compares the photos of the two most recent capture days of an object. A
//! camera that keeps re-uploading the same frame under a new date shows up
//! as a content hash shared between the two days.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashSet};

use crate::backends::PhotoSource;
use crate::core::dates::{capture_day, format_iso};
use crate::core::{CatalogObject, DashboardSnapshot, PhotoRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoStatus {
    NoPhotos,
    /// Identical content on both days, or not enough days to tell
    MatchPresent,
    PhotosOk,
}

impl PhotoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoStatus::NoPhotos => "no photos",
            PhotoStatus::MatchPresent => "match present",
            PhotoStatus::PhotosOk => "photos OK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoVerdict {
    pub status: PhotoStatus,
    /// Yesterday is among the compared capture days
    pub yesterday_photo: bool,
}

impl PhotoVerdict {
    pub const NO_PHOTOS: PhotoVerdict = PhotoVerdict {
        status: PhotoStatus::NoPhotos,
        yesterday_photo: false,
    };
}

/// Hex SHA-256 of the photo bytes
pub fn content_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub struct PhotoDuplicateDetector<'a> {
    source: &'a dyn PhotoSource,
}

impl<'a> PhotoDuplicateDetector<'a> {
    pub fn new(source: &'a dyn PhotoSource) -> Self {
        Self { source }
    }

    /// Classify the photo feed of one dashboard snapshot
    pub async fn classify(&self, snapshot: &DashboardSnapshot, today: NaiveDate) -> PhotoVerdict {
        if snapshot.photos.is_empty() {
            return PhotoVerdict::NO_PHOTOS;
        }

        let days: BTreeSet<&str> = snapshot
            .photos
            .iter()
            .filter_map(|p| p.taken_at.as_deref())
            .filter(|t| !t.is_empty())
            .map(capture_day)
            .collect();
        let recent: Vec<&str> = days.iter().rev().take(2).copied().collect();

        let yesterday = today
            .checked_sub_days(Days::new(1))
            .map(format_iso)
            .unwrap_or_default();
        let yesterday_photo = recent.iter().any(|day| *day == yesterday);

        let &[newer, older] = recent.as_slice() else {
            return PhotoVerdict {
                status: PhotoStatus::MatchPresent,
                yesterday_photo,
            };
        };

        let base = snapshot.base_photo_url.as_deref().unwrap_or_default();
        let uin = snapshot.object.uin.as_deref().unwrap_or_default();

        let newer_hashes = self.day_hashes(&snapshot.photos, base, uin, newer).await;
        let older_hashes = self.day_hashes(&snapshot.photos, base, uin, older).await;
        let status = if older_hashes.is_disjoint(&newer_hashes) {
            PhotoStatus::PhotosOk
        } else {
            PhotoStatus::MatchPresent
        };

        PhotoVerdict {
            status,
            yesterday_photo,
        }
    }

    async fn day_hashes(
        &self,
        photos: &[PhotoRecord],
        base: &str,
        uin: &str,
        day: &str,
    ) -> HashSet<String> {
        let mut hashes = HashSet::new();
        for photo in photos {
            let Some(taken_at) = photo.taken_at.as_deref() else {
                continue;
            };
            if capture_day(taken_at) != day {
                continue;
            }
            let Some(url) = photo_url(base, uin, day, photo.photo_url.as_deref()) else {
                continue;
            };
            if let Some(bytes) = self.source.fetch_photo(&url).await {
                hashes.insert(content_digest(&bytes));
            }
        }
        hashes
    }
}

/// `<base><uin>/<day>/<relative>`; any missing part means no URL
fn photo_url(base: &str, uin: &str, day: &str, relative: Option<&str>) -> Option<String> {
    let relative = relative.filter(|r| !r.is_empty())?;
    if base.is_empty() || uin.is_empty() || day.is_empty() {
        return None;
    }
    Some(format!("{}{}/{}/{}", base, uin, day, relative))
}

/// One line of the photo report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoReportRow {
    pub object_id: i64,
    pub uin: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub photo_status: &'static str,
    pub yesterday_photo: bool,
}

impl PhotoReportRow {
    pub fn new(object: &CatalogObject, verdict: PhotoVerdict) -> Self {
        Self {
            object_id: object.id,
            uin: object.uin.clone(),
            name: object.name.clone(),
            address: object.address.clone(),
            photo_status: verdict.status.as_str(),
            yesterday_photo: verdict.yesterday_photo,
        }
    }
}
