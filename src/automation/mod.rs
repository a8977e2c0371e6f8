// Automation runner
// Drives the localization engine in the outer retry loop: capture the screen,
// locate and double-click the application icon, type each post and save it.

pub mod channels;
pub mod error;
pub mod runner;
pub mod services;
pub mod types;

// Re-export the main types and functions for easy access
pub use channels::create_automation_channels;
pub use error::{RunnerError, RunnerResult, ServiceError};
pub use runner::AutomationRunner;
pub use services::{
    FallbackPostSource, FsTextStore, JsonFilePostSource, PostSource, ScreenCaptureService,
    TextStore, UiActionService, parse_posts_json,
};
pub use types::{AutomationCommand, AutomationEvent, BatchReport, Post, RunnerConfig, RunnerState};
