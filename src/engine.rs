//! Lifecycle of the visualization: open, drive, close.
//!
//! At most one session is active. Every `initialize` bumps a generation
//! counter and tears the previous session down before fetching; a fetch that
//! completes after a newer `initialize` or `close` is discarded. Teardown
//! aborts the frame task and waits for it, so when `initialize` or `close`
//! returns no frame callback of an older session can still run.
//!
//! Lock order is always engine state first, then session.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use utoipa::ToSchema;

use crate::camera::Viewport;
use crate::client::{ContainerClient, FetchError};
use crate::config::ViewerConfig;
use crate::events::{EventSink, SessionEvent};
use crate::panel::PanelRow;
use crate::session::{RenderFrame, VisualizationSession};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("No visualization is open")]
    NoSession,
    #[error("Initialization was superseded by a newer request")]
    Superseded,
}

/// Summary returned when a visualization has been opened.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct SceneSummary {
    pub container_id: String,
    pub zone_name: Option<String>,
    pub item_count: usize,
    pub skipped_items: Vec<String>,
    pub selected: Option<String>,
}

struct ActiveSession {
    container_id: String,
    session: Arc<Mutex<VisualizationSession>>,
    frame_task: JoinHandle<()>,
}

#[derive(Default)]
struct EngineState {
    generation: u64,
    active: Option<ActiveSession>,
}

pub struct SceneEngine {
    client: ContainerClient,
    config: ViewerConfig,
    events: EventSink,
    state: Mutex<EngineState>,
    running_loops: Arc<AtomicUsize>,
}

impl SceneEngine {
    pub fn new(client: ContainerClient, config: ViewerConfig) -> Self {
        Self {
            client,
            config,
            events: EventSink::default(),
            state: Mutex::new(EngineState::default()),
            running_loops: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Number of frame loops that are currently alive.
    #[cfg(test)]
    pub fn running_frame_loops(&self) -> usize {
        self.running_loops.load(Ordering::SeqCst)
    }

    /// Opens the visualization for `container_id`, replacing any open one.
    ///
    /// On a fetch failure the previous session is already gone, an error
    /// notification is emitted and the scene stays empty.
    pub async fn initialize(
        &self,
        container_id: &str,
        highlight_item_id: Option<&str>,
        viewport: Option<Viewport>,
    ) -> Result<SceneSummary, EngineError> {
        let generation = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            if let Some(active) = state.active.take() {
                self.teardown(active).await;
            }
            state.generation
        };

        tracing::info!("📥 Loading container {}", container_id.trim());
        let fetched = self.client.fetch_container(container_id).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::debug!(container_id, "discarding superseded container fetch");
            return Err(EngineError::Superseded);
        }

        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!("⚠️ Could not load container {}: {}", container_id.trim(), err);
                self.events
                    .emit(SessionEvent::error(format!("Failed to load container: {err}")));
                return Err(err.into());
            }
        };

        let mut session = VisualizationSession::new(
            &snapshot,
            &self.config,
            viewport.unwrap_or(self.config.viewport),
            self.events.clone(),
        )
        .map_err(FetchError::from)?;

        if let Some(item_id) = highlight_item_id {
            session.highlight_item(item_id);
        }

        let summary = SceneSummary {
            container_id: snapshot.id.clone(),
            zone_name: snapshot.zone_name.clone(),
            item_count: session.scene().len(),
            skipped_items: session.scene().skipped().to_vec(),
            selected: session.selected().map(str::to_string),
        };

        let session = Arc::new(Mutex::new(session));
        let frame_task = spawn_frame_loop(
            session.clone(),
            self.config.frame_interval(),
            self.running_loops.clone(),
        );
        state.active = Some(ActiveSession {
            container_id: snapshot.id,
            session,
            frame_task,
        });

        tracing::info!(
            "📦 Visualization ready: {} placed item(s), {} skipped",
            summary.item_count,
            summary.skipped_items.len()
        );
        Ok(summary)
    }

    /// Closes the open visualization and discards any pending fetch.
    pub async fn close(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        state.generation += 1;
        let active = state.active.take().ok_or(EngineError::NoSession)?;
        self.teardown(active).await;
        Ok(())
    }

    /// Forces the selection onto `item_id`. Returns the selection afterwards;
    /// an unknown id leaves it unchanged.
    pub async fn highlight_item(&self, item_id: &str) -> Result<Option<String>, EngineError> {
        self.with_session(|session| {
            session.highlight_item(item_id);
            session.selected().map(str::to_string)
        })
        .await
    }

    pub async fn pointer_move(&self, x: f64, y: f64) -> Result<(), EngineError> {
        self.with_session(|session| session.pointer_move(x, y)).await
    }

    pub async fn pointer_leave(&self) -> Result<(), EngineError> {
        self.with_session(|session| session.pointer_leave()).await
    }

    pub async fn click(&self, x: f64, y: f64) -> Result<Option<String>, EngineError> {
        self.with_session(|session| session.click(x, y)).await
    }

    /// Returns `false` when the size was degenerate and ignored.
    pub async fn resize(&self, viewport: Viewport) -> Result<bool, EngineError> {
        self.with_session(|session| session.on_resize(viewport)).await
    }

    pub async fn set_panel_rows(&self, rows: Vec<PanelRow>) -> Result<(), EngineError> {
        self.with_session(|session| session.set_panel_rows(rows)).await
    }

    /// Current frame, or an empty frame while nothing is open.
    pub async fn frame(&self) -> RenderFrame {
        self.with_session(|session| session.frame())
            .await
            .unwrap_or_else(|_| RenderFrame::empty(self.config.viewport))
    }

    async fn with_session<R>(
        &self,
        f: impl FnOnce(&mut VisualizationSession) -> R,
    ) -> Result<R, EngineError> {
        let state = self.state.lock().await;
        let active = state.active.as_ref().ok_or(EngineError::NoSession)?;
        let mut session = active.session.lock().await;
        Ok(f(&mut *session))
    }

    async fn teardown(&self, active: ActiveSession) {
        active.frame_task.abort();
        if let Err(err) = active.frame_task.await {
            // cancellation is the expected outcome
            if !err.is_cancelled() {
                tracing::error!("❌ Frame loop of {} failed: {}", active.container_id, err);
            }
        }
        tracing::info!("🧹 Closed visualization of {}", active.container_id);
        self.events.emit(SessionEvent::SessionClosed {
            container_id: active.container_id,
        });
    }
}

/// Decrements the running-loop counter when the frame task is dropped.
struct LoopGuard(Arc<AtomicUsize>);

impl LoopGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn spawn_frame_loop(
    session: Arc<Mutex<VisualizationSession>>,
    interval: Duration,
    counter: Arc<AtomicUsize>,
) -> JoinHandle<()> {
    let guard = LoopGuard::new(counter);
    tokio::spawn(async move {
        let _guard = guard;
        let started = Instant::now();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let t = started.elapsed().as_secs_f64();
            session.lock().await.tick(t);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::spawn_backend;
    use crate::config::BackendConfig;
    use tokio::sync::broadcast::Receiver;

    async fn engine() -> SceneEngine {
        let base = spawn_backend().await;
        let client =
            ContainerClient::new(&BackendConfig::new(base, Duration::from_secs(5))).unwrap();
        SceneEngine::new(client, ViewerConfig::default())
    }

    fn drain(rx: &mut Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn active_session(engine: &SceneEngine) -> std::sync::Weak<Mutex<VisualizationSession>> {
        let state = engine.state.lock().await;
        Arc::downgrade(&state.active.as_ref().unwrap().session)
    }

    #[tokio::test]
    async fn initialize_builds_scene_and_starts_one_loop() {
        let engine = engine().await;
        let summary = engine.initialize("contA", None, None).await.unwrap();

        assert_eq!(summary.container_id, "contA");
        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.skipped_items, vec!["003".to_string()]);
        assert_eq!(engine.running_frame_loops(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(engine.frame().await.frame > 0);
    }

    #[tokio::test]
    async fn reopening_releases_the_previous_session() {
        let engine = engine().await;
        let mut rx = engine.subscribe();

        engine.initialize("contA", Some("001"), None).await.unwrap();
        let previous = active_session(&engine).await;

        engine.initialize("contB", None, None).await.unwrap();
        assert_eq!(engine.running_frame_loops(), 1);
        assert!(previous.upgrade().is_none());

        let frame = engine.frame().await;
        assert_eq!(frame.container.unwrap().id, "contB");
        assert!(frame.items.iter().all(|item| !item.highlighted));
        assert_eq!(frame.selected, None);

        let closed: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::SessionClosed { container_id } => Some(container_id),
                _ => None,
            })
            .collect();
        assert_eq!(closed, vec!["contA".to_string()]);
    }

    #[tokio::test]
    async fn fetch_failure_leaves_scene_empty_and_notifies() {
        let engine = engine().await;
        engine.initialize("contA", None, None).await.unwrap();
        let mut rx = engine.subscribe();

        let err = engine.initialize("missing", None, None).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Fetch(FetchError::Status { status: 404, .. })
        ));
        assert_eq!(engine.running_frame_loops(), 0);

        let frame = engine.frame().await;
        assert!(frame.container.is_none());
        assert!(frame.items.is_empty());

        let events = drain(&mut rx);
        assert!(events.iter().any(|event| matches!(
            event,
            SessionEvent::Notification { message, .. } if message.contains("not found")
        )));
        assert!(matches!(engine.click(1.0, 1.0).await, Err(EngineError::NoSession)));
    }

    #[tokio::test]
    async fn initial_highlight_is_applied() {
        let engine = engine().await;
        let summary = engine.initialize("contA", Some("002"), None).await.unwrap();
        assert_eq!(summary.selected.as_deref(), Some("002"));

        // stale id keeps the selection
        assert_eq!(
            engine.highlight_item("gone").await.unwrap().as_deref(),
            Some("002")
        );
        assert_eq!(
            engine.highlight_item("001").await.unwrap().as_deref(),
            Some("001")
        );
    }

    #[tokio::test]
    async fn late_fetch_is_discarded() {
        let engine = Arc::new(engine().await);

        let slow = tokio::spawn({
            let engine = engine.clone();
            async move { engine.initialize("slow", None, None).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.initialize("contA", None, None).await.unwrap();

        assert!(matches!(slow.await.unwrap(), Err(EngineError::Superseded)));
        assert_eq!(engine.running_frame_loops(), 1);
        assert_eq!(engine.frame().await.container.unwrap().id, "contA");
    }

    #[tokio::test]
    async fn close_stops_the_frame_loop() {
        let engine = engine().await;
        engine.initialize("contA", None, None).await.unwrap();

        engine.close().await.unwrap();
        assert_eq!(engine.running_frame_loops(), 0);
        assert!(engine.frame().await.container.is_none());
        assert!(matches!(engine.close().await, Err(EngineError::NoSession)));
    }

    #[tokio::test]
    async fn inputs_require_an_open_session() {
        let engine = engine().await;
        assert!(matches!(
            engine.pointer_move(1.0, 2.0).await,
            Err(EngineError::NoSession)
        ));
        assert!(matches!(
            engine.resize(Viewport::new(10.0, 10.0)).await,
            Err(EngineError::NoSession)
        ));
        assert!(matches!(
            engine.highlight_item("001").await,
            Err(EngineError::NoSession)
        ));
    }
}
