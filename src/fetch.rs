// Frame fetching
//
// Two kinds of capture targets: static webcams that serve a JPEG over HTTP,
// and live streams that ffmpeg grabs a single frame from. Both sit behind
// the FrameFetcher trait so the collector can be driven by a scripted
// fetcher in tests.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use crate::constants::{FETCH_RETRIES, FETCH_TIMEOUT_SECONDS};
use crate::error::{Result, SkylapseError};
use crate::registry::Source;
use crate::tools;

pub trait FrameFetcher {
    /// Fetch one frame for the source, as encoded image bytes.
    fn fetch(&self, source: &Source) -> Result<Vec<u8>>;
}

/// Fetch with one immediate retry. Errors past the retry budget are the
/// caller's to log and skip; they never abort the tick for other sources.
pub fn fetch_with_retry(fetcher: &dyn FrameFetcher, source: &Source) -> Result<Vec<u8>> {
    let mut attempt = 0;
    loop {
        match fetcher.fetch(source) {
            Ok(bytes) => return Ok(bytes),
            Err(err) if attempt < FETCH_RETRIES => {
                log::debug!("retrying {} after: {}", source.location_name, err);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Production fetcher: blocking HTTP GET for snapshots, ffmpeg frame grab
/// for streams. A bounded timeout keeps one hung camera from stalling the
/// tick forever.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| SkylapseError::Other(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    fn fetch_snapshot(&self, source: &Source) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(&source.url)
            .send()
            .map_err(|e| SkylapseError::Fetch {
                src: source.location_name.clone(),
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SkylapseError::Fetch {
                src: source.location_name.clone(),
                status: Some(status.as_u16()),
                message: format!("unexpected status {status}"),
            });
        }

        let bytes = response.bytes().map_err(|e| SkylapseError::Fetch {
            src: source.location_name.clone(),
            status: None,
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    /// Grab the latest frame from a video stream as JPEG bytes.
    fn fetch_stream_frame(&self, source: &Source) -> Result<Vec<u8>> {
        let grab_path = stream_grab_path(&source.location_name);

        let output = Command::new(tools::ffmpeg_path())
            .args([
                "-y",
                "-i",
                &source.url,
                "-frames:v",
                "1",
                "-q:v",
                "2",
            ])
            .arg(&grab_path)
            .output()
            .map_err(|e| SkylapseError::FFmpeg(e.to_string()))?;

        if !output.status.success() {
            let _ = std::fs::remove_file(&grab_path);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SkylapseError::Fetch {
                src: source.location_name.clone(),
                status: None,
                message: format!("stream grab failed: {}", last_line(&stderr)),
            });
        }

        let bytes = std::fs::read(&grab_path)?;
        let _ = std::fs::remove_file(&grab_path);

        if bytes.is_empty() {
            return Err(SkylapseError::Fetch {
                src: source.location_name.clone(),
                status: None,
                message: "stream grab produced an empty frame".to_string(),
            });
        }
        Ok(bytes)
    }
}

impl FrameFetcher for HttpFetcher {
    fn fetch(&self, source: &Source) -> Result<Vec<u8>> {
        if source.live_stream {
            self.fetch_stream_frame(source)
        } else {
            self.fetch_snapshot(source)
        }
    }
}

/// Scratch path for a stream grab, unique per source and process.
fn stream_grab_path(location_name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "skylapse_grab_{}_{}.jpg",
        location_name.replace(['/', '\\'], "_"),
        std::process::id()
    ))
}

fn last_line(stderr: &str) -> &str {
    stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Fails a configurable number of times before succeeding.
    struct FlakyFetcher {
        failures_left: Cell<u32>,
    }

    impl FrameFetcher for FlakyFetcher {
        fn fetch(&self, source: &Source) -> Result<Vec<u8>> {
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err(SkylapseError::Fetch {
                    src: source.location_name.clone(),
                    status: Some(503),
                    message: "unavailable".to_string(),
                });
            }
            Ok(vec![0xFF, 0xD8, 0xFF])
        }
    }

    #[test]
    fn test_retry_recovers_single_failure() {
        let fetcher = FlakyFetcher { failures_left: Cell::new(1) };
        let source = Source::new("aleko", "http://cam.example/1");
        let bytes = fetch_with_retry(&fetcher, &source).unwrap();
        assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_retry_budget_is_one() {
        let fetcher = FlakyFetcher { failures_left: Cell::new(2) };
        let source = Source::new("aleko", "http://cam.example/1");
        let err = fetch_with_retry(&fetcher, &source).unwrap_err();
        assert!(matches!(err, SkylapseError::Fetch { status: Some(503), .. }));
    }

    #[test]
    fn test_stream_grab_path_is_sanitized() {
        let path = stream_grab_path("alpine/cam");
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("skylapse_grab_alpine_cam_"));
    }
}
