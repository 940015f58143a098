//! A single open visualization.
//!
//! The session owns the scene and every piece of interaction state. The
//! engine drives it from two sides: input handlers (pointer, click, highlight,
//! resize) and the recurring frame callback [`VisualizationSession::tick`].
//! Both run under the same lock, so a selection change is always complete
//! before the next frame reads the entries.

use serde::Serialize;
use utoipa::ToSchema;

use crate::camera::{PerspectiveCamera, Viewport};
use crate::color::{self, hex_string};
use crate::config::ViewerConfig;
use crate::events::{EventSink, NotificationLevel, SessionEvent};
use crate::highlight::HighlightAnimator;
use crate::model::{ContainerSnapshot, ValidationError};
use crate::panel::{InfoPanel, PanelRow};
use crate::picking::PickIndex;
use crate::retrieval::retrieval_hint;
use crate::scene::{ContainerFrame, GridHelper, Scene};
use crate::selection::{SelectionChange, SelectionMachine, SelectionState};
use crate::types::Vec3;

pub struct VisualizationSession {
    scene: Scene,
    camera: PerspectiveCamera,
    viewport: Viewport,
    /// Pointer in normalized device coordinates; `None` while outside the viewport.
    pointer: Option<(f64, f64)>,
    selection: SelectionMachine,
    animator: HighlightAnimator,
    index: PickIndex,
    panel: InfoPanel,
    hover_enabled: bool,
    events: EventSink,
    frames: u64,
    elapsed: f64,
}

impl VisualizationSession {
    /// Builds the scene for `snapshot` and announces it with `SceneReady`.
    pub fn new(
        snapshot: &ContainerSnapshot,
        config: &ViewerConfig,
        viewport: Viewport,
        events: EventSink,
    ) -> Result<Self, ValidationError> {
        let scene = Scene::build(snapshot)?;
        let viewport = if viewport.is_valid() {
            viewport
        } else {
            config.viewport
        };

        let mut camera = PerspectiveCamera::new(viewport);
        camera.look_at(scene.container_center());

        if scene.is_empty() {
            tracing::debug!(container_id = %snapshot.id, "container has no placed items");
        }
        let index = PickIndex::for_scene(&scene, config.bvh_threshold);
        tracing::debug!(
            container_id = %snapshot.id,
            entries = scene.len(),
            bvh = matches!(index, PickIndex::Bvh(_)),
            "scene built"
        );

        events.emit(SessionEvent::SceneReady {
            container_id: snapshot.id.clone(),
            zone_name: snapshot.zone_name.clone(),
            item_count: scene.len(),
            skipped_items: scene.skipped().to_vec(),
        });
        if !scene.skipped().is_empty() {
            events.emit(SessionEvent::Notification {
                level: NotificationLevel::Info,
                message: format!(
                    "{} item(s) without a valid placement are not shown",
                    scene.skipped().len()
                ),
            });
        }

        Ok(Self {
            panel: InfoPanel::from_snapshot(snapshot),
            scene,
            camera,
            viewport,
            pointer: None,
            selection: SelectionMachine::new(),
            animator: HighlightAnimator::new(config.pulse_rate),
            index,
            hover_enabled: config.hover_enabled,
            events,
            frames: 0,
            elapsed: 0.0,
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn selected(&self) -> Option<&str> {
        self.selection.selected()
    }

    /// Records the pointer position in pixels. Picking happens on the next frame.
    pub fn pointer_move(&mut self, x: f64, y: f64) {
        self.pointer = Some(self.viewport.to_ndc(x, y));
    }

    pub fn pointer_leave(&mut self) {
        self.pointer = None;
    }

    /// Click at a pixel position: selects the nearest hit or clears the
    /// selection on a miss. Returns the selection afterwards.
    pub fn click(&mut self, x: f64, y: f64) -> Option<String> {
        let (ndc_x, ndc_y) = self.viewport.to_ndc(x, y);
        let nearest = self.pick(ndc_x, ndc_y);
        if let Some(change) = self.selection.click(&mut self.scene, nearest.as_deref()) {
            self.publish(change);
        }
        self.selected().map(str::to_string)
    }

    /// Forces the selection onto `item_id`.
    ///
    /// Returns `false` when the id is not part of the scene; the current
    /// selection is then left untouched.
    pub fn highlight_item(&mut self, item_id: &str) -> bool {
        match self.selection.select(&mut self.scene, item_id) {
            Some(change) => {
                self.publish(change);
                true
            }
            None => {
                tracing::debug!(item_id, "ignoring highlight for unknown item");
                false
            }
        }
    }

    /// Applies a new output size. Degenerate sizes are ignored.
    pub fn on_resize(&mut self, viewport: Viewport) -> bool {
        if !viewport.is_valid() {
            tracing::debug!(?viewport, "ignoring degenerate viewport");
            return false;
        }
        self.viewport = viewport;
        self.camera.resize(viewport);
        true
    }

    /// Replaces the side-panel rows.
    pub fn set_panel_rows(&mut self, rows: Vec<PanelRow>) {
        self.panel.replace_rows(rows.into_iter().map(|row| row.label));
        if let Some(name) = self
            .selected()
            .and_then(|id| self.scene.entry(id))
            .map(|entry| entry.item.name.clone())
        {
            self.sync_panel(&name);
        }
    }

    /// Frame callback. `t` is the time in seconds since the session started.
    pub fn tick(&mut self, t: f64) {
        self.frames += 1;
        self.elapsed = t;

        if self.hover_enabled {
            let nearest = self
                .pointer
                .and_then(|(ndc_x, ndc_y)| self.pick(ndc_x, ndc_y));
            self.selection
                .update_hover(&mut self.scene, nearest.as_deref());
        }
        self.animator.step(&mut self.scene, &self.selection, t);
    }

    /// Snapshot of everything a renderer needs to draw the current frame.
    pub fn frame(&self) -> RenderFrame {
        let items = self
            .scene
            .entries()
            .map(|(id, entry)| ItemView {
                id: id.clone(),
                name: entry.item.name.clone(),
                center: entry.mesh.center,
                size: entry.mesh.size,
                color: hex_string(entry.mesh.color),
                opacity: entry.mesh.opacity,
                highlighted: entry.highlighted,
                edge_color: hex_string(color::ITEM_EDGES),
            })
            .collect();

        let (selected, hovered) = match self.selection.state() {
            SelectionState::Selected(id) => (Some(id.clone()), None),
            SelectionState::Hovering(id) => (None, Some(id.clone())),
            SelectionState::Idle => (None, None),
        };

        RenderFrame {
            frame: self.frames,
            elapsed: self.elapsed,
            background: hex_string(self.scene.background),
            viewport: self.viewport,
            camera: Some(self.camera),
            grid: self.scene.grid,
            container: Some(self.scene.container.clone()),
            items,
            selected,
            hovered,
            panel: self.panel.rows().to_vec(),
            scroll_target: self.panel.scroll_target(),
        }
    }

    fn pick(&self, ndc_x: f64, ndc_y: f64) -> Option<String> {
        let ray = self.camera.ray_from_ndc(ndc_x, ndc_y)?;
        self.index
            .nearest(&self.scene, &ray)
            .map(|hit| hit.item_id)
    }

    fn publish(&mut self, change: SelectionChange) {
        tracing::debug!(
            previous = ?change.previous,
            current = ?change.current,
            "selection changed"
        );
        self.events.emit(SessionEvent::SelectionChanged {
            item_id: change.current.clone(),
            previous: change.previous,
        });

        let Some(item_id) = change.current else {
            return;
        };
        let Some(item) = self.scene.entry(&item_id).map(|entry| entry.item.clone()) else {
            return;
        };
        if let Some(retrieval) = retrieval_hint(&self.scene, &self.index, &item_id) {
            self.events.emit(SessionEvent::ItemInfo {
                item: item.clone(),
                retrieval,
            });
        }
        self.sync_panel(&item.name);
    }

    fn sync_panel(&mut self, name: &str) {
        if let Some(row) = self.panel.sync(name) {
            self.events.emit(SessionEvent::PanelSync {
                row,
                label: name.to_string(),
            });
        }
    }
}

/// Render description of one item box.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ItemView {
    pub id: String,
    pub name: String,
    pub center: Vec3,
    pub size: Vec3,
    /// Current color as `#rrggbb`.
    pub color: String,
    pub opacity: f64,
    pub highlighted: bool,
    pub edge_color: String,
}

/// Render description of a whole frame.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct RenderFrame {
    /// Number of frame callbacks since the session started.
    pub frame: u64,
    /// Seconds since the session started.
    pub elapsed: f64,
    pub background: String,
    pub viewport: Viewport,
    pub camera: Option<PerspectiveCamera>,
    pub grid: GridHelper,
    pub container: Option<ContainerFrame>,
    pub items: Vec<ItemView>,
    pub selected: Option<String>,
    pub hovered: Option<String>,
    pub panel: Vec<PanelRow>,
    pub scroll_target: Option<usize>,
}

impl RenderFrame {
    /// Frame shown while no visualization is open.
    pub fn empty(viewport: Viewport) -> Self {
        Self {
            frame: 0,
            elapsed: 0.0,
            background: hex_string(color::BACKGROUND),
            viewport,
            camera: None,
            grid: GridHelper::default(),
            container: None,
            items: Vec::new(),
            selected: None,
            hovered: None,
            panel: Vec::new(),
            scroll_target: None,
        }
    }
}
