use eframe::egui::Pos2;
use kiddo::KdTree;
use kiddo::SquaredEuclidean;

/// Maximum distance, in points, between the cursor and a picked point.
pub const PICK_RADIUS: f32 = 8.0;

/// 2D KD-tree over the projected screen positions of one frame.
pub struct ScreenIndex {
    tree: KdTree<f64, 2>,
    positions: Vec<(usize, Pos2)>,
}

impl ScreenIndex {
    /// Index every projected point; the stored item is the point index.
    pub fn build(screen: &[Option<(Pos2, f32)>]) -> Self {
        let mut tree: KdTree<f64, 2> = KdTree::new();
        let mut positions = Vec::with_capacity(screen.len());
        for (i, projected) in screen.iter().enumerate() {
            if let Some((pos, _)) = projected {
                if pos.x.is_finite() && pos.y.is_finite() {
                    tree.add(&[pos.x as f64, pos.y as f64], i as u64);
                    positions.push((i, *pos));
                }
            }
        }
        Self { tree, positions }
    }

    /// Nearest point within `radius` of `pos`.
    pub fn pick(&self, pos: Pos2, radius: f32) -> Option<usize> {
        if self.positions.is_empty() {
            return None;
        }
        let nearest = self.tree.nearest_one::<SquaredEuclidean>(&[pos.x as f64, pos.y as f64]);
        let radius = radius as f64;
        (nearest.distance <= radius * radius).then_some(nearest.item as usize)
    }

    /// Every indexed point inside `polygon` (even-odd rule), in index order.
    pub fn within(&self, polygon: &[[f32; 2]]) -> Vec<usize> {
        if polygon.len() < 3 {
            return Vec::new();
        }
        self.positions
            .iter()
            .filter(|(_, p)| point_in_polygon([p.x, p.y], polygon))
            .map(|(i, _)| *i)
            .collect()
    }
}

/// Even-odd ray casting test; the polygon is implicitly closed.
pub fn point_in_polygon(point: [f32; 2], polygon: &[[f32; 2]]) -> bool {
    let [px, py] = point;
    let mut inside = false;
    let mut j = polygon.len().wrapping_sub(1);
    for i in 0..polygon.len() {
        let [xi, yi] = polygon[i];
        let [xj, yj] = polygon[j];
        if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}
