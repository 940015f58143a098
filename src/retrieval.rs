//! Retrieval hint for a selected item.
//!
//! The open face of a container is at logical depth 0 (render z = 0). An
//! item is blocked by every other box that overlaps the straight corridor
//! between the item's front face and the open face.

use serde::Serialize;
use utoipa::ToSchema;

use crate::picking::PickIndex;
use crate::scene::Scene;
use crate::types::{BoundingBox, EPSILON_GENERAL, Vec3};

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct RetrievalHint {
    pub item_id: String,
    /// Items that must be moved first, sorted by id.
    pub blocking_items: Vec<String>,
    /// Number of items to move before the item is free.
    pub steps: usize,
}

/// Computes the retrieval hint, or `None` if the item is not in the scene.
pub fn retrieval_hint(scene: &Scene, index: &PickIndex, item_id: &str) -> Option<RetrievalHint> {
    let bounds = scene.entry(item_id)?.mesh.bounds();

    let mut blocking_items = if bounds.min.z <= EPSILON_GENERAL {
        Vec::new()
    } else {
        let corridor = BoundingBox::new(
            Vec3::new(bounds.min.x, bounds.min.y, 0.0),
            Vec3::new(bounds.max.x, bounds.max.y, bounds.min.z),
        );
        index
            .overlapping(scene, &corridor)
            .into_iter()
            .filter(|id| id != item_id)
            .collect::<Vec<_>>()
    };
    blocking_items.sort();

    Some(RetrievalHint {
        item_id: item_id.to_string(),
        steps: blocking_items.len(),
        blocking_items,
    })
}
