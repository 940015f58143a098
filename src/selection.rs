//! Hover and selection state machine.
//!
//! `Idle` and `Hovering` are recomputed every frame from the pointer ray.
//! `Selected` only changes through a click or an explicit highlight request.
//! At most one scene entry carries `highlighted = true`, and it is always the
//! entry named by `Selected`.

use crate::color;
use crate::scene::{HOVER_OPACITY, Scene};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SelectionState {
    #[default]
    Idle,
    Hovering(String),
    Selected(String),
}

/// Result of a selection transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionChange {
    pub previous: Option<String>,
    pub current: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SelectionMachine {
    state: SelectionState,
}

impl SelectionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn selected(&self) -> Option<&str> {
        match &self.state {
            SelectionState::Selected(id) => Some(id.as_str()),
            _ => None,
        }
    }

    /// Per-frame hover pass.
    ///
    /// `nearest` is the closest item under the pointer, if any. Without a
    /// selection it gets the hover tint; every other non-selected entry is
    /// restored to its resting color.
    pub fn update_hover(&mut self, scene: &mut Scene, nearest: Option<&str>) {
        let has_selection = self.selected().is_some();
        let target = if has_selection { None } else { nearest };

        for (id, entry) in scene.entries_mut() {
            if entry.highlighted {
                continue;
            }
            if target == Some(id.as_str()) {
                entry.mesh.color = color::HOVER;
                entry.mesh.opacity = HOVER_OPACITY;
            } else {
                entry.restore();
            }
        }

        if !has_selection {
            self.state = match target {
                Some(id) => SelectionState::Hovering(id.to_string()),
                None => SelectionState::Idle,
            };
        }
    }

    /// Forces `Selected(item_id)` from any state.
    ///
    /// Returns `None` without touching anything when the id is not in the
    /// scene.
    pub fn select(&mut self, scene: &mut Scene, item_id: &str) -> Option<SelectionChange> {
        if !scene.contains(item_id) {
            return None;
        }

        let previous = self.clear_highlights(scene);

        if let Some(entry) = scene.entry_mut(item_id) {
            entry.restore();
            entry.highlighted = true;
        }
        self.state = SelectionState::Selected(item_id.to_string());

        Some(SelectionChange {
            previous,
            current: Some(item_id.to_string()),
        })
    }

    /// Clears the selection. Returns a change only if something was selected.
    pub fn clear(&mut self, scene: &mut Scene) -> Option<SelectionChange> {
        let previous = self.clear_highlights(scene);
        self.state = SelectionState::Idle;
        previous.map(|previous| SelectionChange {
            previous: Some(previous),
            current: None,
        })
    }

    /// Click outcome: select the nearest hit, or clear on a miss.
    pub fn click(&mut self, scene: &mut Scene, nearest: Option<&str>) -> Option<SelectionChange> {
        match nearest {
            Some(item_id) => self.select(scene, item_id),
            None => self.clear(scene),
        }
    }

    fn clear_highlights(&mut self, scene: &mut Scene) -> Option<String> {
        for (_, entry) in scene.entries_mut() {
            if entry.highlighted {
                entry.restore();
                entry.highlighted = false;
            }
        }
        match std::mem::take(&mut self.state) {
            SelectionState::Selected(id) => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{container, item};

    fn scene() -> Scene {
        let mut high = item("a", Some((0.0, 0.0, 0.0)), (10.0, 10.0, 10.0));
        high.priority = 90;
        Scene::build(&container(vec![
            high,
            item("b", Some((20.0, 0.0, 0.0)), (10.0, 10.0, 10.0)),
            item("c", Some((40.0, 0.0, 0.0)), (10.0, 10.0, 10.0)),
        ]))
        .unwrap()
    }

    #[test]
    fn hover_tints_nearest_and_restores_others() {
        let mut scene = scene();
        let mut machine = SelectionMachine::new();

        machine.update_hover(&mut scene, Some("a"));
        assert_eq!(machine.state(), &SelectionState::Hovering("a".into()));
        assert_eq!(scene.entry("a").unwrap().mesh.color, color::HOVER);

        machine.update_hover(&mut scene, Some("b"));
        assert_eq!(scene.entry("a").unwrap().mesh.color, color::PRIORITY_HIGH);
        assert_eq!(scene.entry("b").unwrap().mesh.color, color::HOVER);

        machine.update_hover(&mut scene, None);
        assert_eq!(machine.state(), &SelectionState::Idle);
        assert_eq!(scene.entry("b").unwrap().mesh.color, color::PRIORITY_LOW);
    }

    #[test]
    fn hover_is_suppressed_while_selected() {
        let mut scene = scene();
        let mut machine = SelectionMachine::new();
        machine.select(&mut scene, "a").unwrap();

        machine.update_hover(&mut scene, Some("b"));
        assert_eq!(machine.state(), &SelectionState::Selected("a".into()));
        assert_eq!(scene.entry("b").unwrap().mesh.color, color::PRIORITY_LOW);
    }

    #[test]
    fn selecting_b_after_a_restores_a() {
        let mut scene = scene();
        let mut machine = SelectionMachine::new();

        machine.select(&mut scene, "a").unwrap();
        scene.entry_mut("a").unwrap().mesh.color = color::WHITE;

        let change = machine.select(&mut scene, "b").unwrap();
        assert_eq!(change.previous.as_deref(), Some("a"));
        assert_eq!(change.current.as_deref(), Some("b"));

        let a = scene.entry("a").unwrap();
        assert!(!a.highlighted);
        assert_eq!(a.mesh.color, a.original_color);
        assert!(scene.entry("b").unwrap().highlighted);
        assert_eq!(scene.highlighted_ids(), vec!["b"]);
    }

    #[test]
    fn click_on_empty_space_clears_selection() {
        let mut scene = scene();
        let mut machine = SelectionMachine::new();

        machine.click(&mut scene, Some("b")).unwrap();
        let change = machine.click(&mut scene, None).unwrap();

        assert_eq!(change.previous.as_deref(), Some("b"));
        assert_eq!(change.current, None);
        assert_eq!(machine.state(), &SelectionState::Idle);
        assert!(scene.highlighted_ids().is_empty());
    }

    #[test]
    fn click_miss_without_selection_reports_nothing() {
        let mut scene = scene();
        let mut machine = SelectionMachine::new();
        assert!(machine.click(&mut scene, None).is_none());
    }

    #[test]
    fn stale_id_is_a_no_op() {
        let mut scene = scene();
        let mut machine = SelectionMachine::new();
        machine.select(&mut scene, "a").unwrap();

        assert!(machine.select(&mut scene, "missing").is_none());
        assert_eq!(machine.selected(), Some("a"));
        assert_eq!(scene.highlighted_ids(), vec!["a"]);
    }

    #[test]
    fn selecting_hovered_item_drops_hover_tint() {
        let mut scene = scene();
        let mut machine = SelectionMachine::new();

        machine.update_hover(&mut scene, Some("c"));
        machine.select(&mut scene, "c").unwrap();

        let c = scene.entry("c").unwrap();
        assert_eq!(c.mesh.color, c.original_color);
        assert!(c.highlighted);
    }

    #[test]
    fn at_most_one_highlight_across_many_transitions() {
        let mut scene = scene();
        let mut machine = SelectionMachine::new();
        let script = [Some("a"), Some("b"), None, Some("c"), Some("c"), Some("a"), None];

        for step in script {
            machine.click(&mut scene, step);
            machine.update_hover(&mut scene, Some("b"));
            assert!(scene.highlighted_ids().len() <= 1);
        }
    }
}
