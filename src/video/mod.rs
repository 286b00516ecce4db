// Daily video compilation
//
// Once a day's window has ended, each source falls under exactly one policy:
// full-day (everything collected, frames are deleted after the encode),
// partial-day (encode what exists, keep the frames as the recovery path), or
// nothing to do. Creation is idempotent by output path: an existing video is
// never re-encoded.

pub mod encoder;
pub mod monthly;
pub mod probe;

use std::path::Path;

use crate::constants::{JPG_EXT, MP4_EXT};
use crate::error::Result;
use crate::registry::CaptureState;
use self::encoder::EncodeOptions;

/// The mutually exclusive daily outcomes, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyPolicy {
    /// Full collection completed without interruption: encode, then delete
    /// the source frames.
    Full,
    /// Interrupted day: encode whatever exists, preserve the frames.
    Partial,
    /// Nothing to compile (or already compiled).
    Skip,
}

pub fn daily_policy(state: &CaptureState) -> DailyPolicy {
    if state.daily_video_created {
        DailyPolicy::Skip
    } else if state.all_images_collected && !state.images_partially_collected {
        DailyPolicy::Full
    } else if state.images_partially_collected && !state.all_images_collected {
        DailyPolicy::Partial
    } else {
        DailyPolicy::Skip
    }
}

/// Compile the daily video for one source folder. Returns whether the video
/// exists afterwards (freshly encoded or already there). Encode failures are
/// logged and reported as `false` so the scheduler retries next cycle.
pub fn create_daily_video(
    base_path: &Path,
    location_name: &str,
    day_folder: &str,
    opts: &EncodeOptions,
    delete_source_frames: bool,
) -> Result<bool> {
    let input_folder = base_path.join(location_name).join(day_folder);
    let output_video = input_folder.join(format!("{day_folder}.{MP4_EXT}"));

    let created = if output_video.exists() {
        log::info!("Video already exists, skipping: {}", output_video.display());
        true
    } else {
        log::info!(
            "Creating video from images in {}",
            input_folder.display()
        );
        match encoder::encode_timelapse(&input_folder, &output_video, opts) {
            Ok(()) => {
                log::info!("Video created: {}", output_video.display());
                true
            }
            Err(e) => {
                log::error!("Daily encode failed for {location_name}/{day_folder}: {e}");
                false
            }
        }
    };

    if created && delete_source_frames {
        match delete_media_files(&input_folder, JPG_EXT, false) {
            Ok(count) => log::info!(
                "Deleted {count} source frames from {}",
                input_folder.display()
            ),
            Err(e) => log::warn!(
                "Could not delete source frames in {}: {e}",
                input_folder.display()
            ),
        }
    }

    Ok(created)
}

/// Delete every file with the given extension from a folder, optionally
/// removing the folder itself when that leaves it empty. Returns the number
/// of files removed.
pub fn delete_media_files(path: &Path, extension: &str, delete_folder: bool) -> Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(path)? {
        let entry_path = entry?.path();
        let matches = entry_path.is_file()
            && entry_path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case(extension))
                .unwrap_or(false);
        if matches {
            std::fs::remove_file(&entry_path)?;
            removed += 1;
        }
    }

    if delete_folder && std::fs::read_dir(path)?.next().is_none() {
        std::fs::remove_dir(path)?;
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn opts() -> EncodeOptions {
        EncodeOptions { fps: 30, width: 640, height: 360, date_stamp: None }
    }

    fn full_state() -> CaptureState {
        CaptureState {
            images_count: 42,
            all_images_collected: true,
            images_partially_collected: false,
            daily_video_created: false,
            monthly_video_created: false,
        }
    }

    fn partial_state() -> CaptureState {
        CaptureState {
            images_count: 7,
            all_images_collected: false,
            images_partially_collected: true,
            daily_video_created: false,
            monthly_video_created: false,
        }
    }

    #[test]
    fn test_policy_precedence() {
        assert_eq!(daily_policy(&full_state()), DailyPolicy::Full);
        assert_eq!(daily_policy(&partial_state()), DailyPolicy::Partial);
        assert_eq!(daily_policy(&CaptureState::default()), DailyPolicy::Skip);

        let mut compiled = full_state();
        compiled.daily_video_created = true;
        assert_eq!(daily_policy(&compiled), DailyPolicy::Skip);

        let mut compiled_partial = partial_state();
        compiled_partial.daily_video_created = true;
        assert_eq!(daily_policy(&compiled_partial), DailyPolicy::Skip);
    }

    fn seed_day(base: &Path, location: &str, day: &str, frames: usize) -> std::path::PathBuf {
        let folder = base.join(location).join(day);
        std::fs::create_dir_all(&folder).unwrap();
        for i in 0..frames {
            std::fs::write(folder.join(format!("08_{i:02}_00.jpg")), b"jpeg").unwrap();
        }
        folder
    }

    #[test]
    fn test_existing_video_short_circuits_and_deletes_frames() {
        // Idempotence: with the output already on disk no encode happens
        // (no ffmpeg in the test environment), and the full-day path still
        // deletes the 42 source frames.
        let tmp = TempDir::new().unwrap();
        let folder = seed_day(tmp.path(), "aleko", "2025-01-07", 42);
        std::fs::write(folder.join("2025-01-07.mp4"), b"video").unwrap();

        let created =
            create_daily_video(tmp.path(), "aleko", "2025-01-07", &opts(), true).unwrap();
        assert!(created);

        let jpgs = encoder::list_frames(&folder).unwrap();
        assert!(jpgs.is_empty());
        assert!(folder.join("2025-01-07.mp4").exists());
    }

    #[test]
    fn test_partial_day_preserves_frames() {
        let tmp = TempDir::new().unwrap();
        let folder = seed_day(tmp.path(), "aleko", "2025-01-07", 7);
        std::fs::write(folder.join("2025-01-07.mp4"), b"video").unwrap();

        let created =
            create_daily_video(tmp.path(), "aleko", "2025-01-07", &opts(), false).unwrap();
        assert!(created);
        assert_eq!(encoder::list_frames(&folder).unwrap().len(), 7);
    }

    #[test]
    fn test_create_twice_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let folder = seed_day(tmp.path(), "aleko", "2025-01-07", 3);
        std::fs::write(folder.join("2025-01-07.mp4"), b"video").unwrap();

        assert!(create_daily_video(tmp.path(), "aleko", "2025-01-07", &opts(), true).unwrap());
        let modified = std::fs::metadata(folder.join("2025-01-07.mp4"))
            .unwrap()
            .modified()
            .unwrap();

        assert!(create_daily_video(tmp.path(), "aleko", "2025-01-07", &opts(), true).unwrap());
        let modified_again = std::fs::metadata(folder.join("2025-01-07.mp4"))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(modified, modified_again);
    }

    #[test]
    fn test_delete_media_files_scoped_to_extension() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.jpg"), b"x").unwrap();
        std::fs::write(tmp.path().join("b.jpg"), b"x").unwrap();
        std::fs::write(tmp.path().join("keep.mp4"), b"x").unwrap();

        let removed = delete_media_files(tmp.path(), JPG_EXT, false).unwrap();
        assert_eq!(removed, 2);
        assert!(tmp.path().join("keep.mp4").exists());
    }

    #[test]
    fn test_delete_media_files_removes_emptied_folder() {
        let tmp = TempDir::new().unwrap();
        let folder = tmp.path().join("2025-01-07");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("2025-01-07.mp4"), b"x").unwrap();

        delete_media_files(&folder, MP4_EXT, true).unwrap();
        assert!(!folder.exists());
    }

    #[test]
    fn test_delete_media_files_keeps_nonempty_folder() {
        let tmp = TempDir::new().unwrap();
        let folder = tmp.path().join("2025-01-07");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("2025-01-07.mp4"), b"x").unwrap();
        std::fs::write(folder.join("leftover.jpg"), b"x").unwrap();

        delete_media_files(&folder, MP4_EXT, true).unwrap();
        assert!(folder.exists());
        assert!(folder.join("leftover.jpg").exists());
    }
}
