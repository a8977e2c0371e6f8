// Batch runner: for each post, open the target application by locating and
// double-clicking its icon, type the post and save it.
use super::error::{RunnerError, RunnerResult};
use super::services::{PostSource, ScreenCaptureService, TextStore, UiActionService};
use super::types::{AutomationCommand, AutomationEvent, BatchReport, Post, RunnerConfig, RunnerState};
use crate::locator::{IconLocator, LocalizationResult, ReferenceIcon};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::sleep;

pub struct AutomationRunner<C, U, S, T> {
    config: RunnerConfig,
    locator: IconLocator,
    reference: ReferenceIcon,
    capture: C,
    ui: U,
    posts: S,
    store: T,
    state: RunnerState,
    command_rx: mpsc::Receiver<AutomationCommand>,
    event_tx: mpsc::Sender<AutomationEvent>,
}

impl<C, U, S, T> AutomationRunner<C, U, S, T>
where
    C: ScreenCaptureService,
    U: UiActionService,
    S: PostSource,
    T: TextStore,
{
    /// Loads the reference icon once; it is reused for every attempt.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: RunnerConfig,
        locator: IconLocator,
        capture: C,
        ui: U,
        posts: S,
        store: T,
        command_rx: mpsc::Receiver<AutomationCommand>,
        event_tx: mpsc::Sender<AutomationEvent>,
    ) -> RunnerResult<Self> {
        let reference = ReferenceIcon::load(&config.icon_path)?;
        Ok(Self {
            config,
            locator,
            reference,
            capture,
            ui,
            posts,
            store,
            state: RunnerState::Idle,
            command_rx,
            event_tx,
        })
    }

    pub fn state(&self) -> &RunnerState {
        &self.state
    }

    async fn emit(&self, event: AutomationEvent) {
        let _ = self.event_tx.send(event).await;
    }

    async fn change_state(&mut self, new_state: RunnerState) {
        if self.state != new_state {
            log::debug!("🤖 Runner state: {:?} -> {:?}", self.state, new_state);
            self.state = new_state.clone();
            self.emit(AutomationEvent::StateChanged(new_state)).await;
        }
    }

    fn stop_requested(&mut self) -> bool {
        matches!(self.command_rx.try_recv(), Ok(AutomationCommand::Stop))
    }

    /// Process every fetched post. A post that cannot be handled is
    /// skipped; only a failure to obtain posts ends the batch with an error.
    pub async fn run(&mut self) -> RunnerResult<BatchReport> {
        self.change_state(RunnerState::FetchingPosts).await;
        let posts = match self.posts.fetch_posts(self.config.max_posts).await {
            Ok(posts) => posts,
            Err(e) => {
                log::error!("❌ Could not fetch posts: {e}");
                self.emit(AutomationEvent::Error(e.to_string())).await;
                self.change_state(RunnerState::Finished).await;
                return Err(RunnerError::Posts(e));
            }
        };
        log::info!("📬 {} posts to process", posts.len());
        self.emit(AutomationEvent::PostsFetched(posts.len())).await;

        let mut report = BatchReport::default();
        for post in &posts {
            if self.stop_requested() {
                log::info!("⏹️ Stop requested, ending batch early");
                report.stopped = true;
                break;
            }

            match self.process_post(post).await {
                Ok(path) => {
                    log::info!("✅ Post {} saved to {}", post.id, path.display());
                    self.emit(AutomationEvent::Saved {
                        post_id: post.id,
                        path: path.clone(),
                    })
                    .await;
                    report.saved.push(path);
                }
                Err(reason) => {
                    log::warn!("⏭️ Skipping post {}: {}", post.id, reason);
                    self.emit(AutomationEvent::Skipped {
                        post_id: post.id,
                        reason,
                    })
                    .await;
                    report.skipped.push(post.id);
                }
            }
        }

        self.change_state(RunnerState::Finished).await;
        log::info!("🏁 Batch finished: {}", report.summary());
        Ok(report)
    }

    /// Bounded attempts, then escalation, then give up with a reason
    async fn process_post(&mut self, post: &Post) -> Result<PathBuf, String> {
        self.change_state(RunnerState::Locating).await;

        for attempt in 1..=self.config.retry_attempts {
            self.emit(AutomationEvent::AttemptStarted {
                post_id: post.id,
                attempt,
            })
            .await;

            match self.open_via_icon(post, attempt).await {
                Ok(true) => return self.type_and_save(post).await,
                Ok(false) => {}
                Err(e) => log::warn!("⚠️ Attempt {attempt} for post {}: {e}", post.id),
            }
        }

        if self.config.escalation_enabled() {
            self.change_state(RunnerState::Escalating).await;
            log::info!("🔎 Icon route failed for post {}, launching via search", post.id);
            self.emit(AutomationEvent::Escalated { post_id: post.id }).await;

            for keys in &self.config.search_fallback_keys {
                self.ui.send_keys(keys).await.map_err(|e| e.to_string())?;
                sleep(self.config.settle_delay()).await;
            }
            if self.wait_for_window().await {
                return self.type_and_save(post).await;
            }
            self.emit(AutomationEvent::WindowMissing { post_id: post.id }).await;
            return Err("search launch did not open the window".to_string());
        }

        Err(format!(
            "icon route failed after {} attempts",
            self.config.retry_attempts
        ))
    }

    /// One capture/locate/double-click attempt. `Ok(true)` when the window is up.
    async fn open_via_icon(&mut self, post: &Post, attempt: u32) -> Result<bool, String> {
        let screen_path = self.capture.capture().await.map_err(|e| e.to_string())?;

        let report = self
            .locator
            .locate_detailed(&self.reference, &screen_path)
            .map_err(|e| e.to_string())?;

        match report.result {
            LocalizationResult::Found { x, y, tier } => {
                self.emit(AutomationEvent::IconFound {
                    post_id: post.id,
                    x,
                    y,
                    tier,
                })
                .await;
                self.ui
                    .move_and_double_click(x, y)
                    .await
                    .map_err(|e| e.to_string())?;

                if self.wait_for_window().await {
                    Ok(true)
                } else {
                    log::warn!("⚠️ '{}' did not open, retrying", self.config.window_title);
                    self.emit(AutomationEvent::WindowMissing { post_id: post.id }).await;
                    Ok(false)
                }
            }
            LocalizationResult::NotFound => {
                log::info!(
                    "👀 Attempt {attempt}: icon not found, retrying in {}ms",
                    self.config.retry_delay_ms
                );
                self.emit(AutomationEvent::IconNotFound {
                    post_id: post.id,
                    attempt,
                })
                .await;
                sleep(self.config.retry_delay()).await;
                Ok(false)
            }
        }
    }

    async fn wait_for_window(&self) -> bool {
        for _ in 0..self.config.window_poll_attempts {
            if self.ui.activate_window_by_title(&self.config.window_title).await {
                return true;
            }
            sleep(self.config.window_poll_interval()).await;
        }
        false
    }

    async fn type_and_save(&mut self, post: &Post) -> Result<PathBuf, String> {
        self.change_state(RunnerState::Saving).await;
        sleep(self.config.settle_delay()).await;

        let content = post.content();
        self.ui.send_keys(&content).await.map_err(|e| e.to_string())?;

        let target = self.config.output_dir.join(post.file_name());
        let saved = self
            .store
            .save_text(&target, &content)
            .await
            .map_err(|e| e.to_string())?;

        self.ui
            .send_keys(&self.config.close_window_keys)
            .await
            .map_err(|e| e.to_string())?;
        if !self.config.discard_changes_keys.is_empty() {
            sleep(self.config.settle_delay()).await;
            self.ui
                .send_keys(&self.config.discard_changes_keys)
                .await
                .map_err(|e| e.to_string())?;
        }
        Ok(saved)
    }
}
