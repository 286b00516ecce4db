// FFprobe wrapper
//
// Used by the monthly aggregator to weed out daily videos that can't be
// opened before handing the batch to the concat encode.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use crate::error::{Result, SkylapseError};
use crate::tools;

#[derive(Debug, Deserialize)]
struct FFprobeOutput {
    format: Option<FFprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FFprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VideoInfo {
    pub duration_seconds: Option<f64>,
}

/// Run ffprobe on a file and extract container-level info.
pub fn probe(path: &Path) -> Result<VideoInfo> {
    let output = Command::new(tools::ffprobe_path())
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .output()
        .map_err(|e| SkylapseError::FFmpeg(e.to_string()))?;

    if !output.status.success() {
        return Err(SkylapseError::FFmpeg(format!(
            "ffprobe failed for {}",
            path.display()
        )));
    }

    let parsed: FFprobeOutput = serde_json::from_slice(&output.stdout)?;
    Ok(VideoInfo {
        duration_seconds: parsed
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse::<f64>().ok()),
    })
}

/// Whether ffprobe can open the file at all.
pub fn can_open(path: &Path) -> bool {
    path.is_file() && probe(path).is_ok()
}
