// Skylapse Constants
// Naming conventions here are load-bearing: frame filenames embed capture
// time so lexicographic order is chronological order.

// File types
pub const JPG_EXT: &str = "jpg";
pub const MP4_EXT: &str = "mp4";

// Folder layout
pub const CACHE_FOLDER: &str = "cache";
pub const STATE_FILE_PREFIX: &str = "state_";
pub const DEFAULT_OUTPUT_FOLDER: &str = "skylapse";

// Date and time formatting
pub const DAY_FOLDER_FORMAT: &str = "%Y-%m-%d";
pub const MONTH_FOLDER_FORMAT: &str = "%Y-%m";
pub const FRAME_TIME_FORMAT: &str = "%H_%M_%S";

// Capture defaults
pub const DEFAULT_SECONDS_BETWEEN_FRAMES: u64 = 60;
pub const DEFAULT_NIGHT_RETRY_SECONDS: u64 = 60;
pub const FETCH_TIMEOUT_SECONDS: u64 = 30;
pub const FETCH_RETRIES: u32 = 1; // one immediate retry, then skip for this tick

// Daylight window offsets (signed minutes applied to sunrise/sunset)
pub const DEFAULT_SUNRISE_OFFSET_MINUTES: i64 = 0;
pub const DEFAULT_SUNSET_OFFSET_MINUTES: i64 = 0;
pub const MAX_SUN_OFFSET_MINUTES: i64 = 180;

// Video defaults
pub const DEFAULT_VIDEO_FPS: u32 = 30;
pub const DEFAULT_VIDEO_WIDTH: u32 = 640;
pub const DEFAULT_VIDEO_HEIGHT: u32 = 360;

// Output encoding
pub const VIDEO_CODEC: &str = "libx264";
pub const VIDEO_PRESET: &str = "medium";
pub const VIDEO_CRF: u32 = 23;

// Monthly summary defaults
pub const DEFAULT_MONTHLY_SUMMARY_DAY: u32 = 3;
pub const DEFAULT_LOW_TRAFFIC_START_HOUR: u32 = 2; // exclusive bound
pub const DEFAULT_LOW_TRAFFIC_END_HOUR: u32 = 6; // exclusive bound
