use glam::{Affine3A, Vec3};

/// Axis-aligned bounding box in local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box enclosing all points, `None` for an empty slice.
    #[must_use]
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut min = *first;
        let mut max = *first;
        for p in rest {
            min = min.min(*p);
            max = max.max(*p);
        }
        Some(Self { min, max })
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[must_use]
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[must_use]
    pub fn transform(&self, matrix: &Affine3A) -> Self {
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];

        let mut new_min = Vec3::splat(f32::INFINITY);
        let mut new_max = Vec3::splat(f32::NEG_INFINITY);

        for point in corners {
            let transformed = matrix.transform_point3(point);
            new_min = new_min.min(transformed);
            new_max = new_max.max(transformed);
        }

        Self {
            min: new_min,
            max: new_max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    #[must_use]
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere centered on the AABB of `points`, radius reaching the farthest point.
    #[must_use]
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let aabb = BoundingBox::from_points(points)?;
        let center = aabb.center();
        let max_dist_sq = points
            .iter()
            .map(|p| p.distance_squared(center))
            .fold(0.0_f32, f32::max);
        Some(Self {
            center,
            radius: max_dist_sq.sqrt(),
        })
    }
}

/// Bounding volume attached to a renderable actor.
///
/// `Unknown` volumes are never culled.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BoundingVolume {
    #[default]
    Unknown,
    Aabb(BoundingBox),
    Sphere(BoundingSphere),
}

impl BoundingVolume {
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// AABB volume of a point cloud, `Unknown` when there are no points.
    #[must_use]
    pub fn aabb_from_points(points: &[Vec3]) -> Self {
        BoundingBox::from_points(points).map_or(Self::Unknown, Self::Aabb)
    }
}
