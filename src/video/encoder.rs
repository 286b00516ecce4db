// FFmpeg invocation for time-lapse outputs
//
// Frames and daily videos are fed through the concat demuxer with inputs
// sorted lexicographically; filenames embed capture time, so lexicographic
// order is chronological order no matter what the filesystem returns.
// Outputs are written to a temp path and renamed into place.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::constants::{JPG_EXT, VIDEO_CODEC, VIDEO_CRF, VIDEO_PRESET};
use crate::error::{Result, SkylapseError};
use crate::tools;

#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    /// Text burned into the lower-left corner, e.g. the day folder name.
    pub date_stamp: Option<String>,
}

/// The source frames of a day folder, sorted by filename.
pub fn list_frames(frames_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = std::fs::read_dir(frames_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case(JPG_EXT))
                    .unwrap_or(false)
        })
        .collect();
    frames.sort();
    Ok(frames)
}

/// Encode a day's frames into a single video.
pub fn encode_timelapse(frames_dir: &Path, output_path: &Path, opts: &EncodeOptions) -> Result<()> {
    let frames = list_frames(frames_dir)?;
    if frames.is_empty() {
        return Err(SkylapseError::Encode(format!(
            "no frames in {}",
            frames_dir.display()
        )));
    }

    let list_path = frames_dir.join("frames.txt");
    std::fs::write(&list_path, image_concat_list(&frames, opts.fps)?)?;

    let result = run_concat_encode(&list_path, output_path, opts);

    let _ = std::fs::remove_file(&list_path);
    result
}

/// Concatenate daily videos into one re-encoded output. Inputs must already
/// be sorted; every input is decoded fully and conformed to one geometry so
/// mixed-resolution days still merge.
pub fn concat_videos(video_paths: &[PathBuf], output_path: &Path, opts: &EncodeOptions) -> Result<()> {
    if video_paths.is_empty() {
        return Err(SkylapseError::Encode("no videos to concatenate".to_string()));
    }

    let list_path = output_path.with_extension("list.txt");
    if let Some(parent) = list_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&list_path, video_concat_list(video_paths)?)?;

    let result = run_concat_encode(&list_path, output_path, opts);

    let _ = std::fs::remove_file(&list_path);
    result
}

fn run_concat_encode(list_path: &Path, output_path: &Path, opts: &EncodeOptions) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = output_path.with_extension("tmp.mp4");

    let args = build_encode_args(list_path, &tmp_path, opts)?;
    let output = Command::new(tools::ffmpeg_path())
        .args(&args)
        .output()
        .map_err(|e| SkylapseError::FFmpeg(e.to_string()))?;

    if !output.status.success() {
        let _ = std::fs::remove_file(&tmp_path);
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SkylapseError::Encode(format!(
            "ffmpeg failed for {}: {}",
            output_path.display(),
            tail(&stderr)
        )));
    }

    if std::fs::metadata(&tmp_path).map(|m| m.len()).unwrap_or(0) == 0 {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(SkylapseError::Encode(format!(
            "empty output for {}",
            output_path.display()
        )));
    }

    std::fs::rename(&tmp_path, output_path)?;
    Ok(())
}

/// Full ffmpeg args for a concat-demuxer encode.
pub fn build_encode_args(list_path: &Path, output_path: &Path, opts: &EncodeOptions) -> Result<Vec<String>> {
    let mut vfilters = vec![conform_filter(opts.width, opts.height)];
    if let Some(ref text) = opts.date_stamp {
        vfilters.push(date_stamp_filter(text));
    }

    let mut args: Vec<String> = vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        path_str(list_path)?,
        "-vf".into(),
        vfilters.join(","),
        "-r".into(),
        opts.fps.to_string(),
        "-c:v".into(),
        VIDEO_CODEC.into(),
        "-preset".into(),
        VIDEO_PRESET.into(),
        "-crf".into(),
        VIDEO_CRF.to_string(),
        "-movflags".into(),
        "+faststart".into(),
        "-an".into(),
    ];
    args.push(path_str(output_path)?);
    Ok(args)
}

/// Concat list for an image sequence: each frame held for 1/fps seconds.
/// The final entry is repeated so its duration is honored.
fn image_concat_list(frames: &[PathBuf], fps: u32) -> Result<String> {
    let frame_duration = 1.0 / fps.max(1) as f64;
    let mut list = String::new();
    for frame in frames {
        list.push_str(&format!(
            "file '{}'\nduration {:.6}\n",
            path_str(frame)?,
            frame_duration
        ));
    }
    if let Some(last) = frames.last() {
        list.push_str(&format!("file '{}'\n", path_str(last)?));
    }
    Ok(list)
}

fn video_concat_list(videos: &[PathBuf]) -> Result<String> {
    let mut list = String::new();
    for video in videos {
        list.push_str(&format!("file '{}'\n", path_str(video)?));
    }
    Ok(list)
}

/// Normalize geometry: fit inside the target box, pad to exact size.
fn conform_filter(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
        w = width,
        h = height
    )
}

/// Lower-left date stamp via drawtext.
fn date_stamp_filter(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'");
    format!(
        "drawtext=text='{escaped}':fontsize=20:fontcolor=white:borderw=2:bordercolor=black:x=10:y=h-text_h-10"
    )
}

fn tail(stderr: &str) -> &str {
    stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("")
}

/// Convert a Path to a String, failing on non-UTF8
fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(|s| s.to_string())
        .ok_or_else(|| SkylapseError::InvalidPath("Path contains non-UTF8 characters".to_string()))
}
