//! Rounded convex hulls
//!
//! Every primitive the solver knows (box, capsule, circle) is a convex point
//! set inflated by a radius. Pair queries reduce to a point query against the
//! Minkowski difference of two hulls, which is again a rounded convex hull:
//! - overlap / penetration: signed distance from the origin
//! - sweep: ray cast from the origin along the motion direction

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Tolerance for degenerate lengths
pub const EPSILON: f32 = 1.0e-6;

/// Slack on the edge parameter when a ray lands exactly on a corner
const EDGE_SLACK: f32 = 1.0e-4;

/// Convex point set (CCW) inflated by `radius`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hull {
    points: Vec<Vec2>,
    radius: f32,
}

/// Signed distance from a point to a hull
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proximity {
    /// Negative when the point is inside
    pub distance: f32,
    /// Unit direction moving the point away from (or out of) the hull
    pub normal: Vec2,
}

/// First entry of a ray into a hull
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    /// Outward surface normal at the entry point
    pub normal: Vec2,
}

impl Hull {
    /// Build from arbitrary points; they are reduced to their convex hull
    pub fn new(points: &[Vec2], radius: f32) -> Self {
        Self {
            points: convex_hull(points),
            radius: radius.max(0.0),
        }
    }

    #[inline]
    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Copy of this hull moved by `offset`
    pub fn translated(&self, offset: Vec2) -> Self {
        Self {
            points: self.points.iter().map(|&p| p + offset).collect(),
            radius: self.radius,
        }
    }

    /// Mean of the core vertices
    pub fn centroid(&self) -> Vec2 {
        if self.points.is_empty() {
            return Vec2::ZERO;
        }
        self.points.iter().copied().sum::<Vec2>() / self.points.len() as f32
    }

    /// Radius of a circle around [`Hull::centroid`] containing the whole hull
    pub fn bounding_radius(&self) -> f32 {
        let c = self.centroid();
        self.points
            .iter()
            .map(|&p| p.distance(c))
            .fold(0.0, f32::max)
            + self.radius
    }

    /// Farthest point of the inflated hull along `dir`
    pub fn support(&self, dir: Vec2) -> Vec2 {
        let dir = dir.normalize_or_zero();
        let core = self
            .points
            .iter()
            .copied()
            .max_by(|a, b| a.dot(dir).total_cmp(&b.dot(dir)))
            .unwrap_or(Vec2::ZERO);
        core + dir * self.radius
    }

    /// `self ⊖ other` = { a - b }; radii add up
    pub fn minkowski_difference(&self, other: &Hull) -> Hull {
        let mut points = Vec::with_capacity(self.points.len() * other.points.len());
        for &a in &self.points {
            for &b in &other.points {
                points.push(a - b);
            }
        }
        Hull::new(&points, self.radius + other.radius)
    }

    /// Edges with their outward normals. A segment yields both sides, a point none.
    fn edges(&self) -> impl Iterator<Item = (Vec2, Vec2, Vec2)> + '_ {
        let n = self.points.len();
        let count = if n < 2 { 0 } else { n };
        (0..count).filter_map(move |i| {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            let e = b - a;
            let len = e.length();
            if len < EPSILON {
                return None;
            }
            Some((a, b, Vec2::new(e.y, -e.x) / len))
        })
    }

    /// Signed distance from `q` to the inflated hull
    pub fn proximity(&self, q: Vec2) -> Proximity {
        match self.points.len() {
            0 => Proximity {
                distance: f32::MAX,
                normal: Vec2::Y,
            },
            1 => {
                let d = q - self.points[0];
                let len = d.length();
                Proximity {
                    distance: len - self.radius,
                    normal: if len > EPSILON { d / len } else { Vec2::Y },
                }
            }
            n => {
                if n >= 3 {
                    // Inside the core: exit through the nearest edge
                    let mut inside = true;
                    let mut best_depth = f32::MAX;
                    let mut best_normal = Vec2::Y;
                    for (a, _, normal) in self.edges() {
                        let d = (q - a).dot(normal);
                        if d > 0.0 {
                            inside = false;
                            break;
                        }
                        if -d < best_depth {
                            best_depth = -d;
                            best_normal = normal;
                        }
                    }
                    if inside {
                        return Proximity {
                            distance: -best_depth - self.radius,
                            normal: best_normal,
                        };
                    }
                }

                let mut best_dist = f32::MAX;
                let mut best_normal = Vec2::Y;
                for (a, b, normal) in self.edges() {
                    let e = b - a;
                    let t = ((q - a).dot(e) / e.length_squared()).clamp(0.0, 1.0);
                    let closest = a + e * t;
                    let dist = q.distance(closest);
                    if dist < best_dist - EPSILON {
                        best_dist = dist;
                        best_normal = if dist > EPSILON {
                            (q - closest) / dist
                        } else {
                            normal
                        };
                    }
                }
                Proximity {
                    distance: best_dist - self.radius,
                    normal: best_normal,
                }
            }
        }
    }

    /// Cast a ray from `origin` along unit `dir`; the origin must lie outside
    pub fn cast_ray(&self, origin: Vec2, dir: Vec2, max_distance: f32) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        let mut consider = |distance: f32, normal: Vec2| {
            if best.is_none_or(|b| distance < b.distance) {
                best = Some(RayHit { distance, normal });
            }
        };

        // Offset edges
        for (a, b, normal) in self.edges() {
            let denom = dir.dot(normal);
            if denom >= -EPSILON {
                continue;
            }
            let offset_a = a + normal * self.radius;
            let t = (offset_a - origin).dot(normal) / denom;
            if t < -EPSILON || t > max_distance {
                continue;
            }
            let hit = origin + dir * t;
            let e = b - a;
            let s = (hit - offset_a).dot(e) / e.length_squared();
            if !(-EDGE_SLACK..=1.0 + EDGE_SLACK).contains(&s) {
                continue;
            }
            consider(t.max(0.0), normal);
        }

        // Rounded corners
        if self.radius > EPSILON {
            for &p in &self.points {
                let m = origin - p;
                let b = m.dot(dir);
                let c = m.length_squared() - self.radius * self.radius;
                if c > 0.0 && b > 0.0 {
                    continue;
                }
                let disc = b * b - c;
                if disc < 0.0 {
                    continue;
                }
                let t = (-b - disc.sqrt()).max(0.0);
                if t > max_distance {
                    continue;
                }
                let normal = (origin + dir * t - p).normalize_or(-dir);
                consider(t, normal);
            }
        }

        best
    }
}

/// Monotone-chain convex hull, counter-clockwise, duplicates removed
pub fn convex_hull(points: &[Vec2]) -> Vec<Vec2> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup_by(|a, b| a.distance_squared(*b) < EPSILON * EPSILON);
    if pts.len() < 3 {
        return pts;
    }

    let cross = |o: Vec2, a: Vec2, b: Vec2| (a - o).perp_dot(b - o);

    let mut lower: Vec<Vec2> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Vec2> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}
