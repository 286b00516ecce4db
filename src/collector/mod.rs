// Frame collector - one daylight pass per call
//
// State machine per pass: Idle (not daylight; roll the day folder forward if
// the calendar advanced, return false), Collecting (reset per-day state once,
// then tick every source until the window closes, snapshotting after every
// saved frame), Drained (window closed after being open; mark every source
// fully collected, return true). A cancelled pass returns false and leaves
// partial flags standing, which is exactly what the resume path needs.


use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::constants::{DAY_FOLDER_FORMAT, FRAME_TIME_FORMAT, JPG_EXT};
use crate::daylight::{DaylightCalculator, DaylightWindow};
use crate::error::Result;
use crate::fetch::{fetch_with_retry, FrameFetcher};
use crate::registry::SourceRegistry;
use crate::snapshot::{SchedulerSnapshot, SnapshotStore};

pub struct FrameCollector<'a> {
    calc: &'a DaylightCalculator,
    fetcher: &'a dyn FrameFetcher,
    store: &'a SnapshotStore,
    base_path: &'a Path,
    interval: Duration,
    quiet: bool,
}

impl<'a> FrameCollector<'a> {
    pub fn new(
        calc: &'a DaylightCalculator,
        fetcher: &'a dyn FrameFetcher,
        store: &'a SnapshotStore,
        base_path: &'a Path,
        interval: Duration,
        quiet: bool,
    ) -> Self {
        Self { calc, fetcher, store, base_path, interval, quiet }
    }

    /// Drive one daylight pass. Blocks for the whole window when daylight is
    /// up. Returns true only when the window was traversed to completion.
    ///
    /// Transient per-source failures are logged and skipped; nothing raised
    /// inside a poll iteration ever escapes this function.
    pub fn run_pass(
        &self,
        registry: &mut SourceRegistry,
        day_folder: &mut String,
        window: &mut DaylightWindow,
        last_month_processed: Option<&str>,
        cancel: &AtomicBool,
    ) -> bool {
        if !window.is_daylight(Utc::now()) {
            self.roll_day_if_needed(day_folder, window);
            if !self.quiet {
                log::info!("Not daylight yet @{}", self.calc.city().name);
            }
            return false;
        }

        // The only per-day reset point: a day's data never bleeds into the
        // next because nothing else touches these counters wholesale.
        registry.reset_all_capture_state();
        log::info!("Start collecting images @{}", self.calc.city().name);

        while window.is_daylight(Utc::now()) {
            if cancel.load(Ordering::Relaxed) {
                log::info!("Collection interrupted for {day_folder}");
                self.store.persist(&SchedulerSnapshot::capture(
                    day_folder,
                    registry,
                    last_month_processed,
                ));
                return false;
            }

            self.tick(registry, day_folder, last_month_processed);
            std::thread::sleep(self.interval);
        }

        registry.mark_all_collected();
        self.store.persist(&SchedulerSnapshot::capture(
            day_folder,
            registry,
            last_month_processed,
        ));
        log::info!("Finished collecting for {day_folder}");
        true
    }

    /// Poll every source once, sequentially. A failing source never aborts
    /// the tick for the others.
    fn tick(
        &self,
        registry: &mut SourceRegistry,
        day_folder: &str,
        last_month_processed: Option<&str>,
    ) {
        let names: Vec<String> = registry.iter().map(|s| s.location_name.clone()).collect();

        for name in &names {
            let Some(source) = registry.get(name) else { continue };

            let bytes = match fetch_with_retry(self.fetcher, source) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("{e}");
                    continue;
                }
            };

            match self.save_frame(name, day_folder, &bytes, self.calc.local_now()) {
                Ok(path) => {
                    if let Some(source) = registry.get_mut(name) {
                        source.state.record_frame();
                    }
                    // Snapshot after every frame so a mid-day interruption
                    // keeps its partial progress.
                    self.store.persist(&SchedulerSnapshot::capture(
                        day_folder,
                        registry,
                        last_month_processed,
                    ));
                    log::debug!("Saved frame {}", path.display());
                }
                Err(e) => log::warn!("Failed to save frame for {name}: {e}"),
            }
        }
    }

    /// Persist a frame under {base}/{location}/{day}/{HH_MM_SS}.jpg, written
    /// to a temp name first so a kill mid-write never leaves a truncated
    /// frame behind.
    fn save_frame(
        &self,
        location_name: &str,
        day_folder: &str,
        bytes: &[u8],
        local_now: DateTime<Tz>,
    ) -> Result<PathBuf> {
        let folder = self.base_path.join(location_name).join(day_folder);
        std::fs::create_dir_all(&folder)?;

        let file_name = format!("{}.{}", local_now.format(FRAME_TIME_FORMAT), JPG_EXT);
        let final_path = folder.join(&file_name);
        let tmp_path = folder.join(format!("{file_name}.tmp"));

        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(final_path)
    }

    /// Idle-side bookkeeping: when the calendar day (in the city's zone)
    /// has advanced past the cached folder, move the folder forward and
    /// recompute the window.
    fn roll_day_if_needed(&self, day_folder: &mut String, window: &mut DaylightWindow) {
        let today = self.calc.today();
        let advanced = match NaiveDate::parse_from_str(day_folder, DAY_FOLDER_FORMAT) {
            Ok(current) => today > current,
            Err(_) => true,
        };
        if !advanced {
            return;
        }

        *day_folder = today.format(DAY_FOLDER_FORMAT).to_string();
        match self.calc.window_for(today) {
            Ok(new_window) => {
                *window = new_window;
                log::info!(
                    "New day starts! Sunrise: {} UTC; Sunset: {} UTC",
                    new_window.start,
                    new_window.end
                );
            }
            Err(e) => log::error!("Could not recompute daylight window: {e}"),
        }
    }
}
