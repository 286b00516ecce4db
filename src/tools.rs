// External tool resolver for ffmpeg/ffprobe
//
// Resolution order:
// 1) Environment variable override (SKYLAPSE_FFMPEG_PATH, SKYLAPSE_FFPROBE_PATH)
// 2) Sidecar next to the executable
// 3) ffmpeg-sidecar download directory (populated by `ensure_ffmpeg`)
// 4) PATH fallback

use std::env;
use std::path::PathBuf;

use crate::error::Result;

/// Get the directory containing the current executable
fn exe_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
}

/// Resolve a tool path following the order documented above.
fn resolve_tool(env_key: &str, default_name: &str) -> PathBuf {
    if let Ok(v) = env::var(env_key) {
        let p = PathBuf::from(&v);
        if p.exists() {
            return p;
        }
    }

    let mut filename = default_name.to_string();
    if cfg!(windows) && !filename.to_lowercase().ends_with(".exe") {
        filename.push_str(".exe");
    }

    if let Some(dir) = exe_dir() {
        let candidate = dir.join(&filename);
        if candidate.exists() {
            return candidate;
        }
    }

    // Downloaded by ffmpeg-sidecar on first run
    if let Ok(dir) = ffmpeg_sidecar::paths::sidecar_dir() {
        let candidate = dir.join(&filename);
        if candidate.exists() {
            return candidate;
        }
    }

    PathBuf::from(default_name)
}

/// Get path to ffmpeg binary
pub fn ffmpeg_path() -> PathBuf {
    resolve_tool("SKYLAPSE_FFMPEG_PATH", "ffmpeg")
}

/// Get path to ffprobe binary
pub fn ffprobe_path() -> PathBuf {
    resolve_tool("SKYLAPSE_FFPROBE_PATH", "ffprobe")
}

/// Make sure an ffmpeg binary is reachable, downloading one via
/// ffmpeg-sidecar when nothing is installed. Called once at daemon startup
/// so encodes later in the day never trip over a missing tool.
pub fn ensure_ffmpeg() -> Result<()> {
    if is_tool_available("ffmpeg") {
        return Ok(());
    }
    log::info!("ffmpeg not found, downloading a static build");
    ffmpeg_sidecar::download::auto_download()
        .map_err(|e| crate::error::SkylapseError::FFmpeg(e.to_string()))?;
    Ok(())
}

/// Check if a tool is available at the resolved path
pub fn is_tool_available(tool: &str) -> bool {
    let path = match tool {
        "ffmpeg" => ffmpeg_path(),
        "ffprobe" => ffprobe_path(),
        _ => return false,
    };

    if path.is_file() {
        return true;
    }

    // PATH fallback: try running it
    std::process::Command::new(&path)
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
