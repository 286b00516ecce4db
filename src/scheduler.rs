// Top-level scheduler loop
//
// Day-by-day, retry-on-night cycle: one daylight pass per iteration, then
// either daily video compilation (the pass drained, or an interrupted day
// left partial work behind) or the quiet-night branch (monthly trigger
// check, then sleep). Runs until cancelled, or for a bounded number of
// iterations in test mode. This is the only mutator of registry state.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;

use crate::collector::FrameCollector;
use crate::config::Config;
use crate::constants::DAY_FOLDER_FORMAT;
use crate::daylight::{DaylightCalculator, DaylightWindow};
use crate::error::{Result, SkylapseError};
use crate::fetch::{FrameFetcher, HttpFetcher};
use crate::registry::SourceRegistry;
use crate::snapshot::{SchedulerSnapshot, SnapshotStore};
use crate::video::{self, daily_policy, DailyPolicy};
use crate::video::encoder::EncodeOptions;
use crate::video::monthly::{self, MonthlyOptions};

/// Loop bound: unbounded in production, explicit iteration count under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLimit {
    Unbounded,
    Iterations(u32),
}

#[derive(Debug)]
pub struct Scheduler {
    config: Config,
    calc: DaylightCalculator,
    registry: SourceRegistry,
    store: SnapshotStore,
    base_path: PathBuf,
    day_folder: String,
    window: DaylightWindow,
    last_month_processed: Option<String>,
}

impl Scheduler {
    /// Build a scheduler from validated configuration. Everything that can
    /// be wrong here - unknown city, region name, bad offsets, an empty
    /// source list - is fatal and reported before any capture starts.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let calc = DaylightCalculator::new(
            &config.city,
            config.sunrise_offset_minutes,
            config.sunset_offset_minutes,
        )?;

        let mut registry = SourceRegistry::new();
        registry.add_many(config.capture_sources());
        if registry.is_empty() {
            return Err(SkylapseError::NoSourcesConfigured);
        }

        let base_path = config.resolve_base_path();
        let store = SnapshotStore::new(&base_path, calc.city().name);
        let day_folder = calc.today().format(DAY_FOLDER_FORMAT).to_string();
        let window = calc.window_today()?;

        Ok(Self {
            config,
            calc,
            registry,
            store,
            base_path,
            day_folder,
            window,
            last_month_processed: None,
        })
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn day_folder(&self) -> &str {
        &self.day_folder
    }

    pub fn window(&self) -> &DaylightWindow {
        &self.window
    }

    /// Resume the current day's progress from disk. A snapshot for any
    /// other day is stale and ignored.
    pub fn restore(&mut self) {
        if let Some(snapshot) = self.store.load_for_day(&self.day_folder) {
            snapshot.apply_to(&mut self.registry);
            self.last_month_processed = snapshot.last_month_processed.clone();
            log::info!(
                "Resumed state for {} ({} sources)",
                self.day_folder,
                snapshot.sources.len()
            );
        }
    }

    /// Run the loop with the production fetcher.
    pub fn run(&mut self, limit: RunLimit, cancel: Arc<AtomicBool>) -> Result<()> {
        let fetcher = HttpFetcher::new()?;
        self.run_with_fetcher(&fetcher, limit, cancel)
    }

    pub fn run_with_fetcher(
        &mut self,
        fetcher: &dyn FrameFetcher,
        limit: RunLimit,
        cancel: Arc<AtomicBool>,
    ) -> Result<()> {
        log::info!("Program starts @{}", self.calc.city().name);

        let mut remaining = match limit {
            RunLimit::Unbounded => None,
            RunLimit::Iterations(n) => Some(n),
        };

        loop {
            if cancel.load(Ordering::Relaxed) {
                log::info!("Program execution cancelled...");
                break;
            }
            if remaining == Some(0) {
                break;
            }

            let collector = FrameCollector::new(
                &self.calc,
                fetcher,
                &self.store,
                &self.base_path,
                Duration::from_secs(self.config.seconds_between_frames),
                self.config.quiet,
            );
            let drained = collector.run_pass(
                &mut self.registry,
                &mut self.day_folder,
                &mut self.window,
                self.last_month_processed.as_deref(),
                &cancel,
            );

            let pending_partial = self
                .registry
                .iter()
                .any(|s| s.state.images_partially_collected && !s.state.daily_video_created);

            if drained || pending_partial {
                self.compile_daily_videos(Utc::now());
            } else {
                if self.config.monthly.enabled && self.monthly_due_at(self.calc.local_now()) {
                    self.process_monthly_summary();
                }
                std::thread::sleep(Duration::from_secs(self.config.night_retry_seconds));
            }

            if let Some(n) = remaining.as_mut() {
                *n -= 1;
            }
        }

        Ok(())
    }

    /// Apply the per-source daily policy once the window has ended.
    fn compile_daily_videos(&mut self, now: DateTime<Utc>) {
        if !self.window.has_ended(now) {
            return;
        }

        let opts = self.daily_encode_options();
        let names: Vec<String> = self.registry.iter().map(|s| s.location_name.clone()).collect();

        for name in names {
            let Some(source) = self.registry.get(&name) else { continue };

            let delete_source_frames = match daily_policy(&source.state) {
                DailyPolicy::Full => true,
                DailyPolicy::Partial => false,
                DailyPolicy::Skip => continue,
            };

            match video::create_daily_video(
                &self.base_path,
                &name,
                &self.day_folder,
                &opts,
                delete_source_frames,
            ) {
                Ok(true) => {
                    if let Some(source) = self.registry.get_mut(&name) {
                        source.state.daily_video_created = true;
                    }
                    self.persist();
                }
                // Encode failed; flag stays false so the next cycle retries.
                Ok(false) => {}
                Err(e) => log::error!("Video compile failed for {name}: {e}"),
            }
        }
    }

    /// Monthly trigger: the configured day of month, with the local hour
    /// strictly inside the low-traffic window, and the target month not
    /// already handled.
    fn monthly_due_at(&self, now_local: DateTime<Tz>) -> bool {
        if now_local.day() != self.config.monthly.day_of_month {
            if !self.config.quiet {
                log::info!("Not next month");
            }
            return false;
        }
        let hour = now_local.hour();
        if !(self.config.monthly.start_hour < hour && hour < self.config.monthly.end_hour) {
            return false;
        }

        let (year, month) =
            monthly::target_month(self.current_date(), self.config.monthly.day_of_month);
        self.last_month_processed.as_deref() != Some(monthly::month_prefix(year, month).as_str())
    }

    /// Aggregate the month that just elapsed, per source. Failures leave the
    /// per-source flag unset and the pass incomplete, so it reruns within
    /// the trigger window.
    pub fn process_monthly_summary(&mut self) {
        let (year, month) =
            monthly::target_month(self.current_date(), self.config.monthly.day_of_month);
        let prefix = monthly::month_prefix(year, month);
        log::info!("Running monthly aggregation for {prefix}");

        let opts = MonthlyOptions {
            encode: EncodeOptions {
                fps: self.config.video.fps,
                width: self.config.video.width,
                height: self.config.video.height,
                date_stamp: None,
            },
            delete_daily_videos: self.config.monthly.delete_daily_videos,
        };

        let names: Vec<String> = self.registry.iter().map(|s| s.location_name.clone()).collect();
        let mut complete = true;

        for name in names {
            let Some(source) = self.registry.get(&name) else { continue };
            if source.state.monthly_video_created {
                continue;
            }

            let source_root = self.base_path.join(&name);
            match monthly::create_monthly_video(&source_root, year, month, &opts) {
                Ok(Some(path)) => {
                    if let Some(source) = self.registry.get_mut(&name) {
                        source.state.monthly_video_created = true;
                    }
                    log::info!("Monthly summary created for {name}, {prefix}: {}", path.display());
                    self.persist();
                }
                // Zero matching daily videos: the source sat this month out.
                Ok(None) => {}
                Err(e) => {
                    complete = false;
                    log::error!("Monthly aggregation failed for {name}: {e}");
                }
            }
        }

        if complete {
            self.last_month_processed = Some(prefix);
            self.persist();
        }
    }

    /// One-shot daily compile for the CLI. Compiles any source whose video
    /// for the day is missing; frames are deleted only for a clean full-day
    /// state, never on a cold start.
    pub fn compile_day(&mut self, day: Option<NaiveDate>) -> usize {
        let day_folder = day
            .map(|d| d.format(DAY_FOLDER_FORMAT).to_string())
            .unwrap_or_else(|| self.day_folder.clone());
        let opts = EncodeOptions {
            fps: self.config.video.fps,
            width: self.config.video.width,
            height: self.config.video.height,
            date_stamp: self.config.video.date_stamp.then(|| day_folder.clone()),
        };

        let names: Vec<String> = self.registry.iter().map(|s| s.location_name.clone()).collect();
        let mut compiled = 0;

        for name in names {
            let Some(source) = self.registry.get(&name) else { continue };
            if source.state.daily_video_created {
                continue;
            }
            let delete_source_frames = daily_policy(&source.state) == DailyPolicy::Full;

            match video::create_daily_video(
                &self.base_path,
                &name,
                &day_folder,
                &opts,
                delete_source_frames,
            ) {
                Ok(true) => {
                    compiled += 1;
                    if day_folder == self.day_folder {
                        if let Some(source) = self.registry.get_mut(&name) {
                            source.state.daily_video_created = true;
                        }
                        self.persist();
                    }
                }
                Ok(false) => {}
                Err(e) => log::error!("Video compile failed for {name}: {e}"),
            }
        }
        compiled
    }

    fn daily_encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            fps: self.config.video.fps,
            width: self.config.video.width,
            height: self.config.video.height,
            date_stamp: self.config.video.date_stamp.then(|| self.day_folder.clone()),
        }
    }

    /// The scheduler's notion of "today", anchored to the day folder.
    fn current_date(&self) -> NaiveDate {
        NaiveDate::parse_from_str(&self.day_folder, DAY_FOLDER_FORMAT)
            .unwrap_or_else(|_| self.calc.today())
    }

    fn persist(&self) {
        self.store.persist(&SchedulerSnapshot::capture(
            &self.day_folder,
            &self.registry,
            self.last_month_processed.as_deref(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::registry::CaptureState;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use tempfile::TempDir;

    fn test_config(tmp: &TempDir, sources: Vec<SourceConfig>) -> Config {
        let mut config = Config::default();
        config.city = "Sofia".to_string();
        config.sources = sources;
        config.base_path = Some(tmp.path().to_path_buf());
        config.night_retry_seconds = 0;
        config.seconds_between_frames = 0;
        config
    }

    fn one_source(tmp: &TempDir) -> Config {
        test_config(
            tmp,
            vec![SourceConfig {
                name: "aleko".to_string(),
                url: "http://cam.example/1".to_string(),
                live_stream: false,
            }],
        )
    }

    #[test]
    fn test_empty_sources_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let err = Scheduler::from_config(test_config(&tmp, Vec::new())).unwrap_err();
        assert!(matches!(err, SkylapseError::NoSourcesConfigured));
    }

    #[test]
    fn test_unknown_city_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut config = one_source(&tmp);
        config.city = "Atlantis".to_string();
        let err = Scheduler::from_config(config).unwrap_err();
        assert!(matches!(err, SkylapseError::LocationNotFound(_)));
    }

    #[test]
    fn test_duplicate_config_sources_collapse() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(
            &tmp,
            vec![
                SourceConfig {
                    name: "aleko".to_string(),
                    url: "http://cam.example/1".to_string(),
                    live_stream: false,
                },
                SourceConfig {
                    name: "aleko".to_string(),
                    url: "http://cam.example/2".to_string(),
                    live_stream: false,
                },
            ],
        );
        let scheduler = Scheduler::from_config(config).unwrap();
        assert_eq!(scheduler.registry().len(), 1);
    }

    #[test]
    fn test_restore_applies_same_day_snapshot() {
        let tmp = TempDir::new().unwrap();
        let mut scheduler = Scheduler::from_config(one_source(&tmp)).unwrap();

        let mut state = CaptureState::default();
        state.images_count = 17;
        state.images_partially_collected = true;
        let mut snapshot = SchedulerSnapshot::default();
        snapshot.day_folder = scheduler.day_folder().to_string();
        snapshot.last_month_processed = Some("2024-12".to_string());
        snapshot.sources.insert("aleko".to_string(), state);
        scheduler.store.save(&snapshot).unwrap();

        scheduler.restore();
        let restored = &scheduler.registry().get("aleko").unwrap().state;
        assert_eq!(restored.images_count, 17);
        assert!(restored.images_partially_collected);
        assert_eq!(scheduler.last_month_processed.as_deref(), Some("2024-12"));
    }

    #[test]
    fn test_restore_ignores_stale_snapshot() {
        let tmp = TempDir::new().unwrap();
        let mut scheduler = Scheduler::from_config(one_source(&tmp)).unwrap();

        let mut state = CaptureState::default();
        state.images_count = 17;
        let mut snapshot = SchedulerSnapshot::default();
        snapshot.day_folder = "1999-01-01".to_string();
        snapshot.sources.insert("aleko".to_string(), state);
        scheduler.store.save(&snapshot).unwrap();

        scheduler.restore();
        assert_eq!(scheduler.registry().get("aleko").unwrap().state.images_count, 0);
    }

    #[test]
    fn test_monthly_due_requires_day_and_hour() {
        let tmp = TempDir::new().unwrap();
        let scheduler = Scheduler::from_config(one_source(&tmp)).unwrap();
        let tz = scheduler.calc.city().timezone;

        // Day 3, 04:00 local: due (default window is 2 < hour < 6).
        let due = tz.with_ymd_and_hms(2025, 6, 3, 4, 0, 0).unwrap();
        assert!(scheduler.monthly_due_at(due));

        // Right day, wrong hour.
        let midday = tz.with_ymd_and_hms(2025, 6, 3, 12, 0, 0).unwrap();
        assert!(!scheduler.monthly_due_at(midday));

        // Boundary hours are exclusive.
        let boundary = tz.with_ymd_and_hms(2025, 6, 3, 2, 59, 0).unwrap();
        assert!(!scheduler.monthly_due_at(boundary));

        // Wrong day.
        let wrong_day = tz.with_ymd_and_hms(2025, 6, 4, 4, 0, 0).unwrap();
        assert!(!scheduler.monthly_due_at(wrong_day));
    }

    #[test]
    fn test_monthly_due_skips_processed_month() {
        let tmp = TempDir::new().unwrap();
        let mut scheduler = Scheduler::from_config(one_source(&tmp)).unwrap();
        let tz = scheduler.calc.city().timezone;
        let due = tz.with_ymd_and_hms(2025, 6, 3, 4, 0, 0).unwrap();

        let (year, month) = monthly::target_month(scheduler.current_date(), 3);
        scheduler.last_month_processed = Some(monthly::month_prefix(year, month));
        assert!(!scheduler.monthly_due_at(due));
    }

    #[test]
    fn test_monthly_pass_with_no_videos_leaves_flag_unset() {
        let tmp = TempDir::new().unwrap();
        let mut scheduler = Scheduler::from_config(one_source(&tmp)).unwrap();

        scheduler.process_monthly_summary();

        assert!(!scheduler.registry().get("aleko").unwrap().state.monthly_video_created);
        // The pass itself still completes: an empty month is not an error.
        assert!(scheduler.last_month_processed.is_some());
    }

    #[test]
    fn test_compile_daily_videos_waits_for_window_end() {
        let tmp = TempDir::new().unwrap();
        let mut scheduler = Scheduler::from_config(one_source(&tmp)).unwrap();
        scheduler.registry.get_mut("aleko").unwrap().state.mark_all_collected();

        // Mid-window "now": policy must not fire yet.
        let mid = scheduler.window.end - ChronoDuration::hours(1);
        scheduler.compile_daily_videos(mid);
        assert!(!scheduler.registry.get("aleko").unwrap().state.daily_video_created);
    }

    #[test]
    fn test_compile_daily_videos_full_day_marks_and_persists() {
        let tmp = TempDir::new().unwrap();
        let mut scheduler = Scheduler::from_config(one_source(&tmp)).unwrap();
        scheduler.registry.get_mut("aleko").unwrap().state.mark_all_collected();

        // Frames plus a pre-existing output: the idempotent path compiles
        // without ffmpeg and the full-day policy clears the frames.
        let day = scheduler.day_folder().to_string();
        let folder = tmp.path().join("aleko").join(&day);
        std::fs::create_dir_all(&folder).unwrap();
        for i in 0..3 {
            std::fs::write(folder.join(format!("08_0{i}_00.jpg")), b"jpeg").unwrap();
        }
        std::fs::write(folder.join(format!("{day}.mp4")), b"video").unwrap();

        let after_end = scheduler.window.end + ChronoDuration::seconds(1);
        scheduler.compile_daily_videos(after_end);

        assert!(scheduler.registry.get("aleko").unwrap().state.daily_video_created);
        assert!(crate::video::encoder::list_frames(&folder).unwrap().is_empty());

        let snapshot = scheduler.store.load_for_day(&day).unwrap();
        assert!(snapshot.sources["aleko"].daily_video_created);
    }

    #[test]
    fn test_compile_daily_videos_partial_day_keeps_frames() {
        let tmp = TempDir::new().unwrap();
        let mut scheduler = Scheduler::from_config(one_source(&tmp)).unwrap();
        {
            let state = &mut scheduler.registry.get_mut("aleko").unwrap().state;
            state.record_frame();
            state.record_frame();
        }

        let day = scheduler.day_folder().to_string();
        let folder = tmp.path().join("aleko").join(&day);
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("08_00_00.jpg"), b"jpeg").unwrap();
        std::fs::write(folder.join("08_01_00.jpg"), b"jpeg").unwrap();
        std::fs::write(folder.join(format!("{day}.mp4")), b"video").unwrap();

        let after_end = scheduler.window.end + ChronoDuration::seconds(1);
        scheduler.compile_daily_videos(after_end);

        assert!(scheduler.registry.get("aleko").unwrap().state.daily_video_created);
        assert_eq!(crate::video::encoder::list_frames(&folder).unwrap().len(), 2);
    }

    #[test]
    fn test_run_idles_through_a_quiet_night() {
        let tmp = TempDir::new().unwrap();
        let mut config = one_source(&tmp);
        config.monthly.enabled = false;
        let mut scheduler = Scheduler::from_config(config).unwrap();

        // Force a closed window so the pass idles instead of collecting.
        let now = Utc::now();
        scheduler.window = DaylightWindow {
            start: now - ChronoDuration::hours(10),
            end: now - ChronoDuration::hours(9),
        };

        struct PanicFetcher;
        impl FrameFetcher for PanicFetcher {
            fn fetch(&self, _: &crate::registry::Source) -> crate::error::Result<Vec<u8>> {
                panic!("fetcher must not run at night");
            }
        }

        let cancel = Arc::new(AtomicBool::new(false));
        scheduler
            .run_with_fetcher(&PanicFetcher, RunLimit::Iterations(2), cancel)
            .unwrap();
    }

    #[test]
    fn test_run_respects_cancel_flag() {
        let tmp = TempDir::new().unwrap();
        let mut config = one_source(&tmp);
        config.monthly.enabled = false;
        let mut scheduler = Scheduler::from_config(config).unwrap();

        struct PanicFetcher;
        impl FrameFetcher for PanicFetcher {
            fn fetch(&self, _: &crate::registry::Source) -> crate::error::Result<Vec<u8>> {
                panic!("fetcher must not run after cancellation");
            }
        }

        let cancel = Arc::new(AtomicBool::new(true));
        scheduler
            .run_with_fetcher(&PanicFetcher, RunLimit::Unbounded, cancel)
            .unwrap();
    }
}
