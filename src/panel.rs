//! Side-panel item list kept in step with the 3D selection.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::ContainerSnapshot;

/// One row of the externally rendered item list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PanelRow {
    /// Display text of the row (the item name).
    pub label: String,
    #[serde(default)]
    pub active: bool,
}

impl PanelRow {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            active: false,
        }
    }
}

/// Item list with at most one active row and a pending scroll request.
#[derive(Clone, Debug, Default)]
pub struct InfoPanel {
    rows: Vec<PanelRow>,
    scroll_target: Option<usize>,
}

impl InfoPanel {
    /// Rows in backend order, unplaced items included.
    pub fn from_snapshot(snapshot: &ContainerSnapshot) -> Self {
        Self {
            rows: snapshot
                .items
                .iter()
                .map(|item| PanelRow::new(item.name.clone()))
                .collect(),
            scroll_target: None,
        }
    }

    pub fn replace_rows(&mut self, labels: impl IntoIterator<Item = String>) {
        self.rows = labels.into_iter().map(PanelRow::new).collect();
        self.scroll_target = None;
    }

    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }

    /// Row that should be scrolled into view, if any.
    pub fn scroll_target(&self) -> Option<usize> {
        self.scroll_target
    }

    /// Marks the row showing `name` active and requests scrolling to it.
    ///
    /// All rows are deactivated and any pending scroll request is dropped
    /// first. Returns the row index, or `None` when no row or more than one
    /// row carries the name.
    pub fn sync(&mut self, name: &str) -> Option<usize> {
        for row in &mut self.rows {
            row.active = false;
        }
        self.scroll_target = None;

        let mut matches = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.label == name)
            .map(|(index, _)| index);
        let index = matches.next()?;
        if matches.next().is_some() {
            return None;
        }

        self.rows[index].active = true;
        self.scroll_target = Some(index);
        Some(index)
    }
}
