// Monthly aggregation
//
// Once a month, after a month has fully elapsed, each source's daily videos
// for that month get concatenated into one summary. Runs in a configured
// low-traffic window so it never competes with daylight capture.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use walkdir::WalkDir;

use crate::constants::{MP4_EXT, MONTH_FOLDER_FORMAT};
use crate::error::Result;
use crate::video::encoder::EncodeOptions;
use crate::video::{delete_media_files, encoder, probe};

static DAY_FOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// The month that just fully elapsed relative to `reference`: subtract the
/// summary-day offset plus one, take that date's year and month.
pub fn target_month(reference: NaiveDate, day_of_month: u32) -> (i32, u32) {
    let shifted = reference - Duration::days(i64::from(day_of_month) + 1);
    (shifted.year(), shifted.month())
}

/// `YYYY-MM`, the prefix shared by day folders and the summary artifacts.
pub fn month_prefix(year: i32, month: u32) -> String {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format(MONTH_FOLDER_FORMAT).to_string())
        .unwrap_or_else(|| format!("{year:04}-{month:02}"))
}

/// Daily videos for one source and month, sorted lexicographically (the
/// filenames embed the date, so this is chronological order). Only folders
/// named like a day and prefixed with the month are considered.
pub fn collect_daily_videos(source_root: &Path, prefix: &str) -> Vec<PathBuf> {
    if !source_root.is_dir() {
        return Vec::new();
    }

    let mut videos: Vec<PathBuf> = WalkDir::new(source_root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            if DAY_FOLDER_RE.is_match(&name) && name.starts_with(prefix) {
                let video = e.path().join(format!("{name}.{MP4_EXT}"));
                video.is_file().then_some(video)
            } else {
                None
            }
        })
        .collect();
    videos.sort();
    videos
}

#[derive(Debug, Clone)]
pub struct MonthlyOptions {
    pub encode: EncodeOptions,
    pub delete_daily_videos: bool,
}

/// Build one source's monthly summary. Returns the summary path, or None
/// when the source has no daily videos for the month (not an error - the
/// source simply sat this month out).
pub fn create_monthly_video(
    source_root: &Path,
    year: i32,
    month: u32,
    opts: &MonthlyOptions,
) -> Result<Option<PathBuf>> {
    let prefix = month_prefix(year, month);
    let output_folder = source_root.join(&prefix);
    let output_video = output_folder.join(format!("{prefix}.{MP4_EXT}"));

    if output_video.exists() {
        log::info!(
            "Monthly video already exists, skipping: {}",
            output_video.display()
        );
        return Ok(Some(output_video));
    }

    let all_videos = collect_daily_videos(source_root, &prefix);
    if all_videos.is_empty() {
        log::warn!(
            "No daily videos found for a monthly summary under {} ({prefix})",
            source_root.display()
        );
        return Ok(None);
    }

    // Unreadable inputs are skipped, not fatal.
    let videos: Vec<PathBuf> = all_videos
        .into_iter()
        .filter(|v| {
            if probe::can_open(v) {
                true
            } else {
                log::warn!("Cannot open video, skipping: {}", v.display());
                false
            }
        })
        .collect();

    if videos.is_empty() {
        log::warn!("Every daily video for {prefix} was unreadable, skipping");
        return Ok(None);
    }

    encoder::concat_videos(&videos, &output_video, &opts.encode)?;
    log::info!("Monthly video created: {}", output_video.display());

    if opts.delete_daily_videos {
        for video in &videos {
            if let Some(day_folder) = video.parent() {
                match delete_media_files(day_folder, MP4_EXT, true) {
                    Ok(_) => {}
                    Err(e) => log::warn!(
                        "Could not delete consumed daily video in {}: {e}",
                        day_folder.display()
                    ),
                }
            }
        }
    }

    Ok(Some(output_video))
}
