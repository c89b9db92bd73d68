use glam::Vec2;
use skillcity_common::Rect;

/// Union of areas no new placement may land in.
///
/// Rectangles cover roads, landmark footprints and the plaza; disks cover
/// round keep-out areas such as the space around the central fountain.
/// Containment is inclusive on the boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExclusionZones {
    rects: Vec<Rect>,
    disks: Vec<(Vec2, f32)>,
}

impl ExclusionZones {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rects(rects: impl IntoIterator<Item = Rect>) -> Self {
        Self {
            rects: rects.into_iter().collect(),
            disks: Vec::new(),
        }
    }

    pub fn add_rect(&mut self, rect: Rect) -> &mut Self {
        self.rects.push(rect);
        self
    }

    /// Exclude `rect` grown by `margin` on every side.
    pub fn add_band(&mut self, rect: Rect, margin: f32) -> &mut Self {
        self.rects.push(rect.inflate(margin));
        self
    }

    pub fn add_disk(&mut self, center: Vec2, radius: f32) -> &mut Self {
        self.disks.push((center, radius));
        self
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn disks(&self) -> &[(Vec2, f32)] {
        &self.disks
    }

    pub fn len(&self) -> usize {
        self.rects.len() + self.disks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, point: Vec2) -> bool {
        self.rects.iter().any(|r| r.contains(point))
            || self
                .disks
                .iter()
                .any(|(center, radius)| center.distance_squared(point) <= radius * radius)
    }
}
