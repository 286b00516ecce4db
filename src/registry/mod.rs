// Source registry - deduplicated capture targets with per-day state
//
// Identity is the (location_name, url) pair; a clash on either field makes
// two sources the same target, so adds are rejected with a warning. All
// per-day progress lives in CaptureState, owned by the registry entry and
// mutated only by the scheduler path.

use serde::{Deserialize, Serialize};

/// Per-day capture progress for one source. Reset as a whole at the start
/// of each day's collection; `all_images_collected` and
/// `images_partially_collected` are mutually exclusive once a day is over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureState {
    pub images_count: u32,
    pub all_images_collected: bool,
    pub images_partially_collected: bool,
    pub daily_video_created: bool,
    pub monthly_video_created: bool,
}

impl CaptureState {
    /// Back to defaults: 0 images, every flag false.
    pub fn reset(&mut self) {
        *self = CaptureState::default();
    }

    /// One frame saved: bump the counter and flag partial progress.
    pub fn record_frame(&mut self) {
        self.images_count += 1;
        self.images_partially_collected = true;
    }

    /// The daylight window ran to completion without interruption.
    /// Clears the partial flag: the two never hold together.
    pub fn mark_all_collected(&mut self) {
        self.all_images_collected = true;
        self.images_partially_collected = false;
    }
}

/// A named capture target: a static webcam snapshot URL, or a live stream
/// that frames are grabbed from one at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub location_name: String,
    pub url: String,
    pub live_stream: bool,
    #[serde(default)]
    pub state: CaptureState,
}

impl Source {
    pub fn new(location_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            location_name: location_name.into(),
            url: url.into(),
            live_stream: false,
            state: CaptureState::default(),
        }
    }

    pub fn new_stream(location_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            live_stream: true,
            ..Self::new(location_name, url)
        }
    }

    /// True when this source clashes with `other` on name or url.
    pub fn conflicts_with(&self, other: &Source) -> bool {
        self.location_name == other.location_name || self.url == other.url
    }
}

/// The set of capture targets for one location. Iteration order is insertion
/// order, which keeps tick-by-tick polling and log output stable.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Source> {
        self.sources.iter_mut()
    }

    pub fn get(&self, location_name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.location_name == location_name)
    }

    pub fn get_mut(&mut self, location_name: &str) -> Option<&mut Source> {
        self.sources
            .iter_mut()
            .find(|s| s.location_name == location_name)
    }

    /// Whether any registered source clashes with `source` on name or url.
    pub fn contains(&self, source: &Source) -> bool {
        self.sources.iter().any(|s| s.conflicts_with(source))
    }

    /// Add a source. A duplicate (by name or url) is a no-op with a warning,
    /// not an error. Returns whether the source was added.
    pub fn add(&mut self, source: Source) -> bool {
        if self.contains(&source) {
            log::warn!(
                "Source with location: {} or url: {} already exists!",
                source.location_name,
                source.url
            );
            return false;
        }
        self.sources.push(source);
        true
    }

    /// Add every source in the collection, skipping duplicates one by one.
    pub fn add_many(&mut self, sources: impl IntoIterator<Item = Source>) {
        for source in sources {
            self.add(source);
        }
    }

    /// Remove the source matching `location_name` (or url). Removing a
    /// non-existent source warns and does nothing.
    pub fn remove(&mut self, name_or_url: &str) -> bool {
        let before = self.sources.len();
        self.sources
            .retain(|s| s.location_name != name_or_url && s.url != name_or_url);
        if self.sources.len() == before {
            log::warn!("Source with location or url: {} doesn't exist!", name_or_url);
            return false;
        }
        true
    }

    /// Reset every source's per-day state to defaults. Called once at the
    /// start of each day's collection - the only reset point per day.
    pub fn reset_all_capture_state(&mut self) {
        for source in &mut self.sources {
            source.state.reset();
        }
    }

    /// Mark every source fully collected for the day (clearing partial).
    pub fn mark_all_collected(&mut self) {
        for source in &mut self.sources {
            source.state.mark_all_collected();
        }
    }
}
