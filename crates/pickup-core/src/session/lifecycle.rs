//! Host lifecycle events.
//!
//! The host pushes [`LifecycleEvent`]s into a channel; [`run_lifecycle`]
//! applies them one at a time so the session only ever has one writer.

use super::manager::SessionManager;
use super::reconciler::ResumeOutcome;
use super::refresh::RefreshCheck;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default period of [`LifecycleEvent::Tick`].
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Something the host observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// App moved to the foreground.
    Foreground,
    /// App moved to the background.
    Background,
    /// Periodic timer fired.
    Tick,
    /// The UI navigated. `seq` increases monotonically per navigation.
    ScreenChanged { seq: u64, page: String },
}

/// What handling an event did.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Resumed(ResumeOutcome),
    Saved,
    Ticked(RefreshCheck),
    /// `false` when the screen change was stale and ignored.
    ScreenRecorded(bool),
}

impl SessionManager {
    pub async fn on_foreground(&mut self) -> ResumeOutcome {
        self.on_app_resume().await
    }

    /// Persists the session before the host may suspend the process.
    pub async fn on_background(&mut self) {
        self.save().await;
    }

    /// Periodic maintenance: refresh if due.
    ///
    /// The stored record is only read when no token is held in memory, so a
    /// failed save never rolls back in-memory progress.
    pub async fn on_tick(&mut self) -> RefreshCheck {
        if !self.session.has_token() {
            self.load().await;
        }
        self.refresh_if_needed().await
    }

    /// Records the visible page unless a newer change was already applied.
    pub async fn on_screen_changed(&mut self, seq: u64, page: String) -> bool {
        if self.last_screen_seq.is_some_and(|last| seq <= last) {
            debug!("[Lifecycle] Ignoring stale screen change #{} ({})", seq, page);
            return false;
        }
        self.last_screen_seq = Some(seq);
        self.set_current_page(page).await;
        true
    }

    pub async fn handle_event(&mut self, event: LifecycleEvent) -> EventOutcome {
        debug!("[Lifecycle] Handling {:?}", event);
        match event {
            LifecycleEvent::Foreground => EventOutcome::Resumed(self.on_foreground().await),
            LifecycleEvent::Background => {
                self.on_background().await;
                EventOutcome::Saved
            }
            LifecycleEvent::Tick => EventOutcome::Ticked(self.on_tick().await),
            LifecycleEvent::ScreenChanged { seq, page } => {
                EventOutcome::ScreenRecorded(self.on_screen_changed(seq, page).await)
            }
        }
    }
}

/// Applies events in arrival order until the channel closes or `shutdown`
/// is cancelled.
pub async fn run_lifecycle(
    manager: Arc<Mutex<SessionManager>>,
    mut events: mpsc::Receiver<LifecycleEvent>,
    shutdown: CancellationToken,
) {
    info!("[Lifecycle] Event loop started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => {
                    let outcome = manager.lock().await.handle_event(event).await;
                    debug!("[Lifecycle] Outcome {:?}", outcome);
                }
                None => break,
            },
        }
    }
    info!("[Lifecycle] Event loop stopped");
}

/// Emits [`LifecycleEvent::Tick`] every `period`, first one after one period.
pub fn spawn_ticker(
    sender: mpsc::Sender<LifecycleEvent>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if sender.send(LifecycleEvent::Tick).await.is_err() {
                        break;
                    }
                }
            }
        }
    })
}
