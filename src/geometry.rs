//! Bounding volumes and frustum tests used by visibility determination

use glam::{Mat4, Vec3, Vec4};

/// Radius at or below which a bound is treated as a point.
pub const DEGENERATE_RADIUS: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn is_degenerate(&self) -> bool {
        self.radius <= DEGENERATE_RADIUS
    }

    /// Smallest sphere enclosing both.
    pub fn merge(&self, other: &Sphere) -> Sphere {
        let offset = other.center - self.center;
        let distance = offset.length();
        if distance + other.radius <= self.radius {
            return *self;
        }
        if distance + self.radius <= other.radius {
            return *other;
        }
        let radius = (distance + self.radius + other.radius) * 0.5;
        let center = self.center + offset * ((radius - self.radius) / distance);
        Sphere { center, radius }
    }

    /// Sphere enclosing a cone with apex `position`, axis `direction`,
    /// half-angle `angle` (radians) and length `range`.
    pub fn from_cone(position: Vec3, direction: Vec3, angle: f32, range: f32) -> Sphere {
        let direction = direction.normalize_or_zero();
        if angle > std::f32::consts::FRAC_PI_4 {
            Sphere {
                center: position + direction * (range * angle.cos()),
                radius: range * angle.sin(),
            }
        } else {
            let radius = range / (2.0 * angle.cos());
            Sphere {
                center: position + direction * radius,
                radius,
            }
        }
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// `None` for an empty point set.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Aabb> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Aabb { min, max })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        // corners() is never empty
        let corners = self.corners().map(|c| matrix.transform_point3(c));
        let (min, max) = corners[1..]
            .iter()
            .fold((corners[0], corners[0]), |(min, max), &p| (min.min(p), max.max(p)));
        Aabb { min, max }
    }
}

/// Box and sphere describing the same volume
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub aabb: Aabb,
    pub sphere: Sphere,
}

impl Bounds {
    pub fn from_aabb(aabb: Aabb) -> Self {
        Self {
            aabb,
            sphere: Sphere::new(aabb.center(), aabb.half_extents().length()),
        }
    }

    /// Zero-size bound at `position`.
    pub fn point(position: Vec3) -> Self {
        Self::from_aabb(Aabb::new(position, position))
    }

    pub fn transformed(&self, matrix: &Mat4) -> Bounds {
        let scale = matrix
            .x_axis
            .truncate()
            .length()
            .max(matrix.y_axis.truncate().length())
            .max(matrix.z_axis.truncate().length());
        Bounds {
            aabb: self.aabb.transformed(matrix),
            sphere: Sphere::new(
                matrix.transform_point3(self.sphere.center),
                self.sphere.radius * scale,
            ),
        }
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            aabb: self.aabb.union(&other.aabb),
            sphere: self.sphere.merge(&other.sphere),
        }
    }
}

/// Plane stored as `normal.xyz . p + normal.w = 0`, normal pointing inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec4,
}

impl Plane {
    fn normalized(raw: Vec4) -> Plane {
        let length = raw.truncate().length();
        if length > 0.0 {
            Plane { normal: raw / length }
        } else {
            Plane { normal: raw }
        }
    }

    pub fn distance(&self, point: Vec3) -> f32 {
        self.normal.truncate().dot(point) + self.normal.w
    }
}

/// Six-plane view frustum
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract the frustum planes of a view-projection matrix with a
    /// `[0, 1]` clip depth range.
    pub fn from_view_projection(view_proj: &Mat4) -> Self {
        let r0 = view_proj.row(0);
        let r1 = view_proj.row(1);
        let r2 = view_proj.row(2);
        let r3 = view_proj.row(3);
        Self {
            planes: [
                Plane::normalized(r3 + r0),
                Plane::normalized(r3 - r0),
                Plane::normalized(r3 + r1),
                Plane::normalized(r3 - r1),
                Plane::normalized(r2),
                Plane::normalized(r3 - r2),
            ],
        }
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance(point) >= 0.0)
    }

    pub fn contains_sphere(&self, sphere: &Sphere) -> bool {
        let negative_radius = -sphere.radius;
        self.planes
            .iter()
            .all(|plane| plane.distance(sphere.center) > negative_radius)
    }

    /// Sphere test, falling back to the point test for degenerate bounds.
    pub fn intersects_bounds(&self, bounds: &Bounds) -> bool {
        if bounds.sphere.is_degenerate() {
            self.contains_point(bounds.sphere.center)
        } else {
            self.contains_sphere(&bounds.sphere)
        }
    }
}
