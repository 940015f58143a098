//! Scene construction from a container snapshot.
//!
//! The scene uses render axes with Y up. Logical item coordinates are
//! remapped as follows:
//! - logical x (width)  -> render x
//! - logical z (height) -> render y
//! - logical y (depth)  -> render z
//!
//! Boxes are stored by their center: stored position plus half the placed
//! extents along each axis.

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::color::{self, item_color};
use crate::model::{ContainerSnapshot, PlacedItem, ValidationError};
use crate::types::{BoundingBox, Vec3};

/// Opacity of an item box at rest.
pub const ITEM_OPACITY: f64 = 0.8;
/// Opacity of an item box under the pointer.
pub const HOVER_OPACITY: f64 = 0.9;
/// Opacity of the translucent open face.
pub const OPEN_FACE_OPACITY: f64 = 0.1;

/// Maps a logical vector (width, depth, height) to render axes.
#[inline]
pub fn to_render_axes(logical: Vec3) -> Vec3 {
    Vec3::new(logical.x, logical.z, logical.y)
}

/// Render-space center of a box whose min corner sits at `position`.
#[inline]
pub fn render_center(position: Vec3, placed_dims: Vec3) -> Vec3 {
    to_render_axes(position + placed_dims.center())
}

/// A rendered item box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ItemMesh {
    /// Box center in render coordinates.
    pub center: Vec3,
    /// Box extents in render coordinates.
    pub size: Vec3,
    pub color: u32,
    pub opacity: f64,
}

impl ItemMesh {
    #[inline]
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_center_and_size(self.center, self.size)
    }
}

/// Runtime association between an item and its rendered box.
#[derive(Clone, Debug)]
pub struct SceneItemEntry {
    pub item: PlacedItem,
    pub mesh: ItemMesh,
    pub original_color: u32,
    pub highlighted: bool,
}

impl SceneItemEntry {
    /// Puts the box back to its resting appearance.
    pub fn restore(&mut self) {
        self.mesh.color = self.original_color;
        self.mesh.opacity = ITEM_OPACITY;
    }
}

/// The translucent plane marking the container's open face.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct OpenFace {
    pub center: Vec3,
    pub width: f64,
    pub height: f64,
    pub color: String,
    pub opacity: f64,
}

/// Wireframe box for the container itself.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ContainerFrame {
    pub id: String,
    pub zone_name: Option<String>,
    pub center: Vec3,
    pub size: Vec3,
    pub edge_color: String,
    pub open_face: OpenFace,
}

/// Ground grid helper.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct GridHelper {
    pub size: f64,
    pub divisions: u32,
}

impl Default for GridHelper {
    fn default() -> Self {
        Self {
            size: 500.0,
            divisions: 50,
        }
    }
}

/// One container and the items placed inside it.
#[derive(Clone, Debug)]
pub struct Scene {
    pub background: u32,
    pub grid: GridHelper,
    pub container: ContainerFrame,
    entries: BTreeMap<String, SceneItemEntry>,
    skipped: Vec<String>,
}

impl Scene {
    /// Builds the scene for a snapshot.
    ///
    /// Fails only when the container itself is invalid. Items without a
    /// complete position, with invalid dimensions or with a duplicate id are
    /// left out and reported by [`Scene::skipped`].
    pub fn build(snapshot: &ContainerSnapshot) -> Result<Self, ValidationError> {
        snapshot.validate()?;

        let dims = snapshot.dims();
        let size = to_render_axes(dims);
        let container = ContainerFrame {
            id: snapshot.id.clone(),
            zone_name: snapshot.zone_name.clone(),
            center: size.center(),
            size,
            edge_color: color::hex_string(color::CONTAINER_EDGES),
            open_face: OpenFace {
                center: Vec3::new(size.x / 2.0, size.y / 2.0, 0.0),
                width: snapshot.width,
                height: snapshot.height,
                color: color::hex_string(color::CONTAINER_EDGES),
                opacity: OPEN_FACE_OPACITY,
            },
        };

        let mut entries = BTreeMap::new();
        let mut skipped = Vec::new();

        for item in &snapshot.items {
            let Some(position) = item.position() else {
                skipped.push(item.id.clone());
                continue;
            };
            if item.validate().is_err() || entries.contains_key(&item.id) {
                tracing::debug!(item_id = %item.id, "skipping item that cannot be rendered");
                skipped.push(item.id.clone());
                continue;
            }

            let placed = item.placed_dims();
            let base = item_color(item);
            let mesh = ItemMesh {
                center: render_center(position, placed),
                size: to_render_axes(placed),
                color: base,
                opacity: ITEM_OPACITY,
            };

            entries.insert(
                item.id.clone(),
                SceneItemEntry {
                    item: item.clone(),
                    mesh,
                    original_color: base,
                    highlighted: false,
                },
            );
        }

        Ok(Self {
            background: color::BACKGROUND,
            grid: GridHelper::default(),
            container,
            entries,
            skipped,
        })
    }

    pub fn entry(&self, item_id: &str) -> Option<&SceneItemEntry> {
        self.entries.get(item_id)
    }

    pub fn entry_mut(&mut self, item_id: &str) -> Option<&mut SceneItemEntry> {
        self.entries.get_mut(item_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &SceneItemEntry)> {
        self.entries.iter()
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = (&String, &mut SceneItemEntry)> {
        self.entries.iter_mut()
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.entries.contains_key(item_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of items that were not added to the scene.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Ids of all entries currently flagged as highlighted.
    #[cfg(test)]
    pub fn highlighted_ids(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.highlighted)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Orbit target for the camera.
    pub fn container_center(&self) -> Vec3 {
        self.container.center
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{container, item};
    use crate::types::EPSILON_GENERAL;

    #[test]
    fn item_center_is_position_plus_half_extents() {
        let snapshot = container(vec![item("a", Some((10.0, 10.0, 10.0)), (20.0, 20.0, 20.0))]);
        let scene = Scene::build(&snapshot).unwrap();

        let entry = scene.entry("a").expect("item should be in the scene");
        assert_eq!(entry.mesh.center, Vec3::new(20.0, 20.0, 20.0));
        assert_eq!(entry.mesh.size, Vec3::new(20.0, 20.0, 20.0));
    }

    #[test]
    fn axis_remap_moves_height_to_render_y() {
        let snapshot = container(vec![item("a", Some((1.0, 2.0, 3.0)), (10.0, 20.0, 30.0))]);
        let scene = Scene::build(&snapshot).unwrap();
        let mesh = scene.entry("a").unwrap().mesh;

        // x + w/2, z + h/2, y + d/2
        assert_eq!(mesh.center, Vec3::new(6.0, 18.0, 12.0));
        assert_eq!(mesh.size, Vec3::new(10.0, 30.0, 20.0));
    }

    #[test]
    fn rotated_item_swaps_footprint() {
        let mut rotated = item("r", Some((0.0, 0.0, 0.0)), (10.0, 40.0, 4.0));
        rotated.rotated = true;
        let scene = Scene::build(&container(vec![rotated])).unwrap();
        let mesh = scene.entry("r").unwrap().mesh;

        assert_eq!(mesh.size, Vec3::new(40.0, 4.0, 10.0));
        assert_eq!(mesh.center, Vec3::new(20.0, 2.0, 5.0));
    }

    #[test]
    fn container_frame_is_centered_on_half_extents() {
        let scene = Scene::build(&container(Vec::new())).unwrap();
        assert_eq!(scene.container.center, Vec3::new(50.0, 30.0, 40.0));
        assert_eq!(scene.container.size, Vec3::new(100.0, 60.0, 80.0));
        assert_eq!(scene.container.open_face.center, Vec3::new(50.0, 30.0, 0.0));
    }

    #[test]
    fn unplaced_items_get_no_entry() {
        let snapshot = container(vec![
            item("placed", Some((0.0, 0.0, 0.0)), (5.0, 5.0, 5.0)),
            item("loose", None, (5.0, 5.0, 5.0)),
        ]);
        let scene = Scene::build(&snapshot).unwrap();

        assert_eq!(scene.len(), 1);
        assert!(scene.contains("placed"));
        assert!(!scene.contains("loose"));
        assert_eq!(scene.skipped(), ["loose".to_string()]);
    }

    #[test]
    fn every_positioned_item_has_exactly_one_box() {
        let items: Vec<_> = (0..12)
            .map(|i| {
                let pos = (i % 3 == 0).then_some((i as f64 * 5.0, 0.0, 0.0));
                item(&format!("i{i}"), pos, (5.0, 5.0, 5.0))
            })
            .collect();
        let snapshot = container(items.clone());
        let scene = Scene::build(&snapshot).unwrap();

        for it in &items {
            match it.position() {
                Some(pos) => {
                    let entry = scene.entry(&it.id).expect("positioned item missing");
                    let expected = render_center(pos, it.placed_dims());
                    assert!((entry.mesh.center - expected).length() < EPSILON_GENERAL);
                }
                None => assert!(scene.entry(&it.id).is_none()),
            }
        }
        assert_eq!(scene.len(), 4);
    }

    #[test]
    fn duplicate_ids_keep_the_first_item() {
        let snapshot = container(vec![
            item("dup", Some((0.0, 0.0, 0.0)), (5.0, 5.0, 5.0)),
            item("dup", Some((50.0, 0.0, 0.0)), (5.0, 5.0, 5.0)),
        ]);
        let scene = Scene::build(&snapshot).unwrap();
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.entry("dup").unwrap().mesh.center.x, 2.5);
    }

    #[test]
    fn invalid_container_builds_no_scene() {
        let mut snapshot = container(vec![item("a", Some((0.0, 0.0, 0.0)), (5.0, 5.0, 5.0))]);
        snapshot.width = -1.0;
        assert!(Scene::build(&snapshot).is_err());
    }

    #[test]
    fn entries_start_unhighlighted_with_base_color() {
        let mut waste = item("w", Some((0.0, 0.0, 0.0)), (5.0, 5.0, 5.0));
        waste.is_waste = true;
        waste.priority = 95;
        let scene = Scene::build(&container(vec![waste])).unwrap();
        let entry = scene.entry("w").unwrap();

        assert_eq!(entry.original_color, color::WASTE);
        assert_eq!(entry.mesh.color, color::WASTE);
        assert!((entry.mesh.opacity - ITEM_OPACITY).abs() < EPSILON_GENERAL);
        assert!(scene.highlighted_ids().is_empty());
    }
}
