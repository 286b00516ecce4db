// Configuration loading and validation
//
// All configuration mistakes are rejected here or at scheduler construction,
// before any capture starts: bad offsets, a keyed mapping where the source
// list belongs, an unknown city. The running loop never sees them.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_LOW_TRAFFIC_END_HOUR, DEFAULT_LOW_TRAFFIC_START_HOUR, DEFAULT_MONTHLY_SUMMARY_DAY,
    DEFAULT_NIGHT_RETRY_SECONDS, DEFAULT_OUTPUT_FOLDER, DEFAULT_SECONDS_BETWEEN_FRAMES,
    DEFAULT_SUNRISE_OFFSET_MINUTES, DEFAULT_SUNSET_OFFSET_MINUTES, DEFAULT_VIDEO_FPS,
    DEFAULT_VIDEO_HEIGHT, DEFAULT_VIDEO_WIDTH,
};
use crate::daylight;
use crate::error::{Result, SkylapseError};
use crate::registry::Source;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub live_stream: bool,
}

impl From<SourceConfig> for Source {
    fn from(cfg: SourceConfig) -> Self {
        if cfg.live_stream {
            Source::new_stream(cfg.name, cfg.url)
        } else {
            Source::new(cfg.name, cfg.url)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    /// Burn the day folder name into the output via drawtext.
    pub date_stamp: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_VIDEO_FPS,
            width: DEFAULT_VIDEO_WIDTH,
            height: DEFAULT_VIDEO_HEIGHT,
            date_stamp: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthlyConfig {
    pub enabled: bool,
    /// Day of month on which the previous month gets aggregated.
    pub day_of_month: u32,
    /// Low-traffic window, exclusive bounds: start_hour < hour < end_hour.
    pub start_hour: u32,
    pub end_hour: u32,
    pub delete_daily_videos: bool,
}

impl Default for MonthlyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            day_of_month: DEFAULT_MONTHLY_SUMMARY_DAY,
            start_hour: DEFAULT_LOW_TRAFFIC_START_HOUR,
            end_hour: DEFAULT_LOW_TRAFFIC_END_HOUR,
            delete_daily_videos: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub city: String,
    pub sources: Vec<SourceConfig>,
    /// Root folder for frames and videos. Defaults under the user's video
    /// directory when unset.
    pub base_path: Option<PathBuf>,
    pub seconds_between_frames: u64,
    pub night_retry_seconds: u64,
    pub sunrise_offset_minutes: i64,
    pub sunset_offset_minutes: i64,
    pub video: VideoConfig,
    pub monthly: MonthlyConfig,
    /// Suppress the per-tick "not daylight yet" chatter.
    pub quiet: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            city: "Sofia".to_string(),
            sources: Vec::new(),
            base_path: None,
            seconds_between_frames: DEFAULT_SECONDS_BETWEEN_FRAMES,
            night_retry_seconds: DEFAULT_NIGHT_RETRY_SECONDS,
            sunrise_offset_minutes: DEFAULT_SUNRISE_OFFSET_MINUTES,
            sunset_offset_minutes: DEFAULT_SUNSET_OFFSET_MINUTES,
            video: VideoConfig::default(),
            monthly: MonthlyConfig::default(),
            quiet: true,
        }
    }
}

impl Config {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parse and validate a JSON config document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)?;

        // A keyed mapping in place of the source list parses fine into
        // nothing useful, so the shape is checked before deserializing.
        if let Some(sources) = value.get("sources") {
            if !sources.is_array() {
                return Err(SkylapseError::InvalidSourceCollection);
            }
        }

        let config: Config = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration-time checks; none of these are recoverable at runtime.
    pub fn validate(&self) -> Result<()> {
        daylight::validate_offset(self.sunrise_offset_minutes)?;
        daylight::validate_offset(self.sunset_offset_minutes)?;

        if self.monthly.enabled && !(1..=28).contains(&self.monthly.day_of_month) {
            return Err(SkylapseError::Config(format!(
                "monthly day_of_month must be 1-28, got {}",
                self.monthly.day_of_month
            )));
        }
        if self.monthly.start_hour >= self.monthly.end_hour || self.monthly.end_hour > 24 {
            return Err(SkylapseError::Config(format!(
                "monthly window {}..{} is not a valid hour range",
                self.monthly.start_hour, self.monthly.end_hour
            )));
        }
        Ok(())
    }

    /// The effective output root. Falls back to `Videos/skylapse` (or the
    /// home directory when the platform has no video dir).
    pub fn resolve_base_path(&self) -> PathBuf {
        if let Some(ref base) = self.base_path {
            return base.clone();
        }
        directories::UserDirs::new()
            .and_then(|dirs| dirs.video_dir().map(|d| d.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_OUTPUT_FOLDER)
    }

    pub fn capture_sources(&self) -> Vec<Source> {
        self.sources.iter().cloned().map(Source::from).collect()
    }
}
