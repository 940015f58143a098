//! Strahlbasierte Objektauswahl (Ray-Picking) für die Szene.
//!
//! Dieses Modul beantwortet die Frage, welche Objekt-Box ein Strahl von der
//! Kamera durch den Mauszeiger trifft. Für kleine Container genügt ein
//! linearer Durchlauf über alle Boxen; ab einer konfigurierbaren Anzahl wird
//! eine Bounding-Volume-Hierarchie (BVH) verwendet. Beide Varianten liefern
//! identische Ergebnisse.

use std::cmp::Ordering;

use crate::scene::Scene;
use crate::types::{BoundingBox, Ray, Vec3};

/// Treffer eines Strahls mit einer Objekt-Box.
#[derive(Clone, Debug, PartialEq)]
pub struct Intersection {
    pub item_id: String,
    /// Abstand vom Strahlursprung in Weltkoordinaten.
    pub distance: f64,
}

/// Sortiert Treffer nach Abstand; bei Gleichstand entscheidet die ID.
fn sort_by_distance(hits: &mut [Intersection]) {
    hits.sort_by(|a, b| match a.distance.total_cmp(&b.distance) {
        Ordering::Equal => a.item_id.cmp(&b.item_id),
        other => other,
    });
}

/// Linearer Durchlauf über alle Einträge der Szene.
pub fn intersect_linear(scene: &Scene, ray: &Ray) -> Vec<Intersection> {
    let mut hits: Vec<Intersection> = scene
        .entries()
        .filter_map(|(id, entry)| {
            entry
                .mesh
                .bounds()
                .ray_intersect(ray)
                .map(|distance| Intersection {
                    item_id: id.clone(),
                    distance,
                })
        })
        .collect();
    sort_by_distance(&mut hits);
    hits
}

#[derive(Clone, Debug)]
enum BvhNode {
    Leaf {
        bounds: BoundingBox,
        start: usize,
        count: usize,
    },
    Inner {
        bounds: BoundingBox,
        left: usize,
        right: usize,
    },
}

impl BvhNode {
    fn bounds(&self) -> &BoundingBox {
        match self {
            BvhNode::Leaf { bounds, .. } | BvhNode::Inner { bounds, .. } => bounds,
        }
    }
}

/// Bounding-Volume-Hierarchie über statische Objekt-Boxen.
///
/// Die Boxen bewegen sich während einer Sitzung nicht (nur ihre Farbe
/// ändert sich), daher wird der Baum einmalig aufgebaut.
#[derive(Clone, Debug, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    items: Vec<(String, BoundingBox)>,
}

impl Bvh {
    /// Maximale Anzahl Boxen pro Blatt.
    pub const MAX_LEAF_SIZE: usize = 4;

    pub fn build(mut items: Vec<(String, BoundingBox)>) -> Self {
        let mut nodes = Vec::new();
        if !items.is_empty() {
            build_recursive(&mut nodes, &mut items, 0);
        }
        Self { nodes, items }
    }

    /// Baut die Hierarchie über alle Einträge einer Szene.
    pub fn from_scene(scene: &Scene) -> Self {
        Self::build(
            scene
                .entries()
                .map(|(id, entry)| (id.clone(), entry.mesh.bounds()))
                .collect(),
        )
    }

    /// Alle Treffer des Strahls, nach Abstand sortiert.
    pub fn intersect_ray(&self, ray: &Ray) -> Vec<Intersection> {
        let mut hits = Vec::new();
        if self.nodes.is_empty() {
            return hits;
        }

        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if node.bounds().ray_intersect(ray).is_none() {
                continue;
            }
            match node {
                BvhNode::Leaf { start, count, .. } => {
                    for (id, bounds) in &self.items[*start..*start + *count] {
                        if let Some(distance) = bounds.ray_intersect(ray) {
                            hits.push(Intersection {
                                item_id: id.clone(),
                                distance,
                            });
                        }
                    }
                }
                BvhNode::Inner { left, right, .. } => {
                    stack.push(*left);
                    stack.push(*right);
                }
            }
        }

        sort_by_distance(&mut hits);
        hits
    }

    /// IDs aller Boxen, die sich mit `query` echt überschneiden.
    pub fn query_box(&self, query: &BoundingBox) -> Vec<&str> {
        let mut found = Vec::new();
        if self.nodes.is_empty() {
            return found;
        }

        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !touches(node.bounds(), query) {
                continue;
            }
            match node {
                BvhNode::Leaf { start, count, .. } => {
                    found.extend(
                        self.items[*start..*start + *count]
                            .iter()
                            .filter(|(_, bounds)| bounds.intersects(query))
                            .map(|(id, _)| id.as_str()),
                    );
                }
                BvhNode::Inner { left, right, .. } => {
                    stack.push(*left);
                    stack.push(*right);
                }
            }
        }

        found.sort_unstable();
        found
    }
}

/// Inklusiver Überlappungstest für Knotengrenzen.
fn touches(a: &BoundingBox, b: &BoundingBox) -> bool {
    a.min.x <= b.max.x
        && a.max.x >= b.min.x
        && a.min.y <= b.max.y
        && a.max.y >= b.min.y
        && a.min.z <= b.max.z
        && a.max.z >= b.min.z
}

fn enclosing(items: &[(String, BoundingBox)]) -> BoundingBox {
    items
        .iter()
        .map(|(_, bounds)| *bounds)
        .reduce(|acc, bounds| acc.union(&bounds))
        .unwrap_or_else(|| BoundingBox::new(Vec3::zero(), Vec3::zero()))
}

fn build_recursive(
    nodes: &mut Vec<BvhNode>,
    items: &mut [(String, BoundingBox)],
    start: usize,
) -> usize {
    let bounds = enclosing(items);

    if items.len() <= Bvh::MAX_LEAF_SIZE {
        nodes.push(BvhNode::Leaf {
            bounds,
            start,
            count: items.len(),
        });
        return nodes.len() - 1;
    }

    // Aufteilung entlang der längsten Achse der Box-Mittelpunkte (Median-Split)
    let centroid_bounds = items
        .iter()
        .map(|(_, b)| BoundingBox::new(b.center(), b.center()))
        .reduce(|acc, b| acc.union(&b))
        .unwrap_or(bounds);
    let axis = centroid_bounds.longest_axis();
    items.sort_by(|a, b| a.1.center()[axis].total_cmp(&b.1.center()[axis]));

    let index = nodes.len();
    nodes.push(BvhNode::Leaf {
        bounds,
        start,
        count: 0,
    });

    let mid = items.len() / 2;
    let (lower, upper) = items.split_at_mut(mid);
    let left = build_recursive(nodes, lower, start);
    let right = build_recursive(nodes, upper, start + mid);
    nodes[index] = BvhNode::Inner {
        bounds,
        left,
        right,
    };
    index
}

/// Strategie zur Trefferberechnung einer Sitzung.
#[derive(Clone, Debug)]
pub enum PickIndex {
    Linear,
    Bvh(Bvh),
}

impl PickIndex {
    /// Wählt die Strategie anhand der Anzahl der Einträge.
    pub fn for_scene(scene: &Scene, bvh_threshold: usize) -> Self {
        if scene.len() > bvh_threshold {
            PickIndex::Bvh(Bvh::from_scene(scene))
        } else {
            PickIndex::Linear
        }
    }

    /// Alle Treffer, nach Abstand sortiert.
    pub fn intersections(&self, scene: &Scene, ray: &Ray) -> Vec<Intersection> {
        match self {
            PickIndex::Linear => intersect_linear(scene, ray),
            PickIndex::Bvh(bvh) => bvh.intersect_ray(ray),
        }
    }

    /// Nächster Treffer oder `None`.
    pub fn nearest(&self, scene: &Scene, ray: &Ray) -> Option<Intersection> {
        self.intersections(scene, ray).into_iter().next()
    }

    /// IDs aller Einträge, die `query` (Render-Koordinaten) echt überschneiden.
    pub fn overlapping(&self, scene: &Scene, query: &BoundingBox) -> Vec<String> {
        match self {
            PickIndex::Linear => scene
                .entries()
                .filter(|(_, entry)| entry.mesh.bounds().intersects(query))
                .map(|(id, _)| id.clone())
                .collect(),
            PickIndex::Bvh(bvh) => bvh
                .query_box(query)
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{container, item};

    fn grid_scene(n: usize) -> Scene {
        let mut items = Vec::new();
        for i in 0..n {
            let x = (i % 10) as f64 * 10.0;
            let y = ((i / 10) % 8) as f64 * 10.0;
            let z = (i / 80) as f64 * 10.0;
            items.push(item(&format!("i{i:03}"), Some((x, y, z)), (8.0, 8.0, 8.0)));
        }
        Scene::build(&container(items)).unwrap()
    }

    fn ray(origin: (f64, f64, f64), dir: (f64, f64, f64)) -> Ray {
        Ray::new(origin.into(), dir.into()).unwrap()
    }

    #[test]
    fn nearest_hit_wins() {
        // two boxes stacked along render z (logical y)
        let scene = Scene::build(&container(vec![
            item("front", Some((0.0, 0.0, 0.0)), (10.0, 10.0, 10.0)),
            item("back", Some((0.0, 20.0, 0.0)), (10.0, 10.0, 10.0)),
        ]))
        .unwrap();

        let r = ray((5.0, 5.0, -50.0), (0.0, 0.0, 1.0));
        let hits = intersect_linear(&scene, &r);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].item_id, "front");
        assert!((hits[0].distance - 50.0).abs() < 1e-9);
        assert_eq!(hits[1].item_id, "back");
    }

    #[test]
    fn miss_returns_nothing() {
        let scene = grid_scene(5);
        let r = ray((500.0, 500.0, 500.0), (1.0, 0.0, 0.0));
        assert!(PickIndex::Linear.nearest(&scene, &r).is_none());
    }

    #[test]
    fn bvh_and_linear_agree() {
        let scene = grid_scene(200);
        let bvh = Bvh::from_scene(&scene);

        let rays = [
            ray((200.0, 200.0, 200.0), (-1.0, -1.2, -0.9)),
            ray((45.0, 5.0, -100.0), (0.0, 0.0, 1.0)),
            ray((-50.0, 4.0, 34.0), (1.0, 0.0, 0.0)),
            ray((15.0, 100.0, 15.0), (0.0, -1.0, 0.0)),
            ray((300.0, 300.0, 300.0), (1.0, 1.0, 1.0)),
        ];
        for r in &rays {
            assert_eq!(bvh.intersect_ray(r), intersect_linear(&scene, r));
        }
    }

    #[test]
    fn index_switches_to_bvh_above_threshold() {
        let scene = grid_scene(10);
        assert!(matches!(PickIndex::for_scene(&scene, 10), PickIndex::Linear));
        assert!(matches!(PickIndex::for_scene(&scene, 9), PickIndex::Bvh(_)));
    }

    #[test]
    fn box_query_ignores_touching_neighbours() {
        let scene = grid_scene(30);
        let query = BoundingBox::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 8.0, 8.0));

        let linear = PickIndex::Linear.overlapping(&scene, &query);
        let bvh = PickIndex::Bvh(Bvh::from_scene(&scene)).overlapping(&scene, &query);
        assert_eq!(linear, vec!["i000".to_string()]);
        assert_eq!(bvh, linear);
    }

    #[test]
    fn empty_bvh_has_no_hits() {
        let bvh = Bvh::build(Vec::new());
        assert!(bvh.intersect_ray(&ray((0.0, 0.0, 0.0), (1.0, 0.0, 0.0))).is_empty());
    }
}
