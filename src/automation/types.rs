// Types and enums for the automation runner
use crate::locator::Tier;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// One item of work: typed into the target window and saved as text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub body: String,
}

impl Post {
    /// Text typed into the editor and persisted
    pub fn content(&self) -> String {
        format!("Title: {}\n\n{}", self.title, self.body)
    }

    pub fn file_name(&self) -> String {
        format!("post_{}.txt", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Reference icon double-clicked to open the target application
    pub icon_path: PathBuf,
    /// Directory receiving the saved text files
    pub output_dir: PathBuf,
    pub max_posts: usize,
    /// Capture/locate/open attempts per post before escalating or skipping
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Title of the window that must appear after the double-click
    pub window_title: String,
    pub window_poll_attempts: u32,
    pub window_poll_interval_ms: u64,
    /// Pause after an input burst so the UI can catch up
    pub settle_delay_ms: u64,
    /// Key sequences that launch the application from the search menu,
    /// sent in order once all attempts failed. Empty disables escalation.
    pub search_fallback_keys: Vec<String>,
    /// Key sequence that closes the window after saving
    pub close_window_keys: String,
    /// Answer to the editor's unsaved-changes prompt after closing. The text
    /// is persisted through the `TextStore`, never through the editor, so
    /// the editor always considers the typed document unsaved. The default
    /// `%n` picks "Don't save" in Notepad. Empty sends nothing.
    pub discard_changes_keys: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            icon_path: PathBuf::from("notepad_icon.png"),
            output_dir: PathBuf::from("posts"),
            max_posts: 10,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            window_title: "Untitled - Notepad".to_string(),
            window_poll_attempts: 10,
            window_poll_interval_ms: 500,
            settle_delay_ms: 500,
            search_fallback_keys: Vec::new(),
            close_window_keys: "^w".to_string(),
            discard_changes_keys: "%n".to_string(),
        }
    }
}

impl RunnerConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn window_poll_interval(&self) -> Duration {
        Duration::from_millis(self.window_poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn escalation_enabled(&self) -> bool {
        !self.search_fallback_keys.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunnerState {
    Idle,
    FetchingPosts,
    Locating,
    Escalating,
    Saving,
    Finished,
}

#[derive(Debug, Clone)]
pub enum AutomationCommand {
    /// Finish the current post, then stop the batch
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AutomationEvent {
    StateChanged(RunnerState),
    PostsFetched(usize),
    AttemptStarted { post_id: u64, attempt: u32 },
    IconFound { post_id: u64, x: u32, y: u32, tier: Tier },
    IconNotFound { post_id: u64, attempt: u32 },
    WindowMissing { post_id: u64 },
    Escalated { post_id: u64 },
    Saved { post_id: u64, path: PathBuf },
    Skipped { post_id: u64, reason: String },
    Error(String),
}

/// Outcome of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub saved: Vec<PathBuf>,
    pub skipped: Vec<u64>,
    /// Set when a stop command ended the batch early
    pub stopped: bool,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        format!(
            "{} saved, {} skipped{}",
            self.saved.len(),
            self.skipped.len(),
            if self.stopped { " (stopped)" } else { "" }
        )
    }
}
