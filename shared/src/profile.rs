//! Shape (`Profile`) variants and the four operations every variant
//! supports: `contains`, `intersects`, `overlap`, `snap`.
//!
//! Dispatch is a symmetric table keyed on `(Shape, Shape)` rather than a
//! type-switch per variant, so every pair is implemented exactly once and
//! neither side can be "the half of the matrix that was never filled in" —
//! that gap is exactly what left `Circle::intersects` a stub upstream.

use crate::ids::{Space, SpacedId};
use crate::vec2::{Line, Vec2};
use std::collections::{HashMap, HashSet};

/// Local (pose-independent) shape description.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Axis-aligned rectangle, half-extents `dim/2`.
    Rec2,
    /// Convex polygon, `points` in local CCW order, orbiting the shape's own
    /// pose before rotation by `dir`.
    RotPoly { points: Vec<Vec2> },
    /// Circle, radius `dim.x / 2`.
    Circle,
}

/// Position, extents, and facing of a shape in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub pos: Vec2,
    pub dim: Vec2,
    pub dir: f64,
}

impl Default for Pose {
    fn default() -> Self {
        Pose {
            pos: Vec2::ZERO,
            dim: Vec2::ZERO,
            dir: 0.0,
        }
    }
}

/// Per-tick kinematic state. Lives on the profile because overlap/snap need
/// to read and transfer velocity (e.g. moving platforms).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Kinematics {
    pub vel: Vec2,
    pub ext_vel: Vec2,
    pub acc: Vec2,
    pub jerk: Vec2,
}

/// A shape parented to another profile with a fixed offset. Its absolute
/// position is always `parent.pos + offset`; it never owns an independent
/// position.
#[derive(Debug, Clone, PartialEq)]
pub struct SubProfile {
    pub offset: Vec2,
    pub shape: Shape,
    pub dim: Vec2,
    pub dir: f64,
}

impl SubProfile {
    pub fn absolute_pose(&self, parent_pos: Vec2) -> Pose {
        Pose {
            pos: parent_pos + self.offset,
            dim: self.dim,
            dir: self.dir,
        }
    }
}

/// A set of spaces (plus an ignored-sid set) a profile interacts with for a
/// particular kind of query. Every profile has two: `overlap_options` for
/// mutual push-out/interaction, `snap_options` for one-way snap-to-ground.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColliderOptions {
    pub spaces: HashSet<Space>,
    pub ignored: HashSet<SpacedId>,
}

impl ColliderOptions {
    pub fn new() -> Self {
        ColliderOptions::default()
    }

    pub fn set_spaces(&mut self, enabled: bool, spaces: &[Space]) {
        for space in spaces {
            if enabled {
                self.spaces.insert(*space);
            } else {
                self.spaces.remove(space);
            }
        }
    }

    pub fn accepts(&self, space: Space, sid: SpacedId) -> bool {
        self.spaces.contains(&space) && !self.ignored.contains(&sid)
    }

    pub fn add_ignored(&mut self, sid: SpacedId) {
        self.ignored.insert(sid);
    }

    pub fn reset_ignored(&mut self) {
        self.ignored.clear();
    }
}

/// A shape plus its pose, kinematics, sub-profiles, and collider option
/// sets. This is the `Profile` of the data model.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub shape: Shape,
    pub pose: Pose,
    pub kinematics: Kinematics,
    pub sub_profiles: HashMap<u32, SubProfile>,
    pub overlap_options: ColliderOptions,
    pub snap_options: ColliderOptions,
}

impl Profile {
    pub fn rec2(pos: Vec2, dim: Vec2) -> Self {
        Profile {
            shape: Shape::Rec2,
            pose: Pose { pos, dim, dir: 0.0 },
            kinematics: Kinematics::default(),
            sub_profiles: HashMap::new(),
            overlap_options: ColliderOptions::new(),
            snap_options: ColliderOptions::new(),
        }
    }

    pub fn circle(pos: Vec2, diameter: f64) -> Self {
        Profile {
            shape: Shape::Circle,
            pose: Pose {
                pos,
                dim: Vec2::new(diameter, diameter),
                dir: 0.0,
            },
            kinematics: Kinematics::default(),
            sub_profiles: HashMap::new(),
            overlap_options: ColliderOptions::new(),
            snap_options: ColliderOptions::new(),
        }
    }

    pub fn rot_poly(pos: Vec2, dir: f64, points: Vec<Vec2>) -> Self {
        Profile {
            shape: Shape::RotPoly { points },
            pose: Pose {
                pos,
                dim: Vec2::ZERO,
                dir,
            },
            kinematics: Kinematics::default(),
            sub_profiles: HashMap::new(),
            overlap_options: ColliderOptions::new(),
            snap_options: ColliderOptions::new(),
        }
    }

    pub fn add_sub_profile(&mut self, key: u32, sub: SubProfile) {
        self.sub_profiles.insert(key, sub);
    }

    pub fn sub_profile_pos(&self, key: u32) -> Option<Vec2> {
        self.sub_profiles
            .get(&key)
            .map(|sub| sub.absolute_pose(self.pose.pos).pos)
    }

    pub fn radius(&self) -> f64 {
        self.pose.dim.x / 2.0
    }

    /// Invariant: `dim.x >= 0 && dim.y >= 0`.
    pub fn valid_dim(&self) -> bool {
        self.pose.dim.x >= 0.0 && self.pose.dim.y >= 0.0
    }

    pub fn contains(&self, point: Vec2) -> ContainResult {
        contains_shape(&self.shape, &self.pose, point)
    }

    pub fn intersects(&self, line: Line) -> IntersectResult {
        intersects_shape(&self.shape, &self.pose, line)
    }

    pub fn overlap(&self, other: &Profile) -> OverlapResult {
        overlap_shapes(&self.shape, &self.pose, &other.shape, &other.pose)
    }

    pub fn overlap_x(&self, other: &Profile) -> f64 {
        aabb_overlap(&self.shape, &self.pose, &other.shape, &other.pose).0
    }

    pub fn overlap_y(&self, other: &Profile) -> f64 {
        aabb_overlap(&self.shape, &self.pose, &other.shape, &other.pose).1
    }

    /// Resolves against a descending-by-overlap-area ordered list of
    /// collider profiles, applying one-way position correction.
    pub fn snap(&self, colliders: &[&Profile]) -> SnapResult {
        let mut result = SnapResult::default();
        for collider in colliders {
            let overlap = self.overlap(collider);
            if !overlap.overlap {
                continue;
            }
            let ox = overlap.amount.x;
            let oy = overlap.amount.y;

            let mut pos_adj = Vec2::ZERO;
            let mut ext_vel = Vec2::ZERO;
            if oy <= ox {
                let dir = crate::util::sign(self.pose.pos.y - collider.pose.pos.y) as f64;
                pos_adj.y = dir * oy;
                ext_vel.y = collider.kinematics.vel.y;
            } else {
                let dir = crate::util::sign(self.pose.pos.x - collider.pose.pos.x) as f64;
                pos_adj.x = dir * ox;
                ext_vel.x = collider.kinematics.vel.x;
            }

            result.snap = true;
            result.pos_adj.x = crate::util::abs_max(result.pos_adj.x, pos_adj.x);
            result.pos_adj.y = crate::util::abs_max(result.pos_adj.y, pos_adj.y);
            result.ext_vel.x = crate::util::abs_max(result.ext_vel.x, ext_vel.x);
            result.ext_vel.y = crate::util::abs_max(result.ext_vel.y, ext_vel.y);
        }
        result
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContainResult {
    pub contains: bool,
    pub ignored: bool,
}

impl ContainResult {
    pub fn merge(&mut self, other: ContainResult) {
        self.contains = self.contains || other.contains;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectResult {
    pub hit: bool,
    pub ignored: bool,
    pub t: f64,
}

impl Default for IntersectResult {
    fn default() -> Self {
        IntersectResult {
            hit: false,
            ignored: false,
            t: 1.0,
        }
    }
}

impl IntersectResult {
    pub fn merge(&mut self, other: IntersectResult) {
        self.hit = self.hit || other.hit;
        self.t = self.t.min(other.t);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverlapResult {
    pub overlap: bool,
    pub amount: Vec2,
}

impl OverlapResult {
    pub fn merge(&mut self, other: OverlapResult) {
        self.overlap = self.overlap || other.overlap;
        if other.amount.area() > self.amount.area() {
            self.amount = other.amount;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SnapResult {
    pub snap: bool,
    pub ignored: bool,
    pub pos_adj: Vec2,
    pub ext_vel: Vec2,
}

impl SnapResult {
    pub fn merge(&mut self, other: SnapResult) {
        self.snap = self.snap || other.snap;
        self.pos_adj.x = crate::util::abs_max(self.pos_adj.x, other.pos_adj.x);
        self.pos_adj.y = crate::util::abs_max(self.pos_adj.y, other.pos_adj.y);
        self.ext_vel.x = crate::util::abs_max(self.ext_vel.x, other.ext_vel.x);
        self.ext_vel.y = crate::util::abs_max(self.ext_vel.y, other.ext_vel.y);
    }
}

// ---- shape math ----

fn world_points(shape: &Shape, pose: &Pose) -> Option<Vec<Vec2>> {
    match shape {
        Shape::Rec2 => {
            let hx = pose.dim.x / 2.0;
            let hy = pose.dim.y / 2.0;
            Some(vec![
                pose.pos + Vec2::new(-hx, -hy),
                pose.pos + Vec2::new(hx, -hy),
                pose.pos + Vec2::new(hx, hy),
                pose.pos + Vec2::new(-hx, hy),
            ])
        }
        Shape::RotPoly { points } => Some(
            points
                .iter()
                .map(|p| pose.pos + p.rotate(pose.dir))
                .collect(),
        ),
        Shape::Circle => None,
    }
}

fn aabb_of(shape: &Shape, pose: &Pose) -> (Vec2, Vec2) {
    match shape {
        Shape::Circle => {
            let r = pose.dim.x / 2.0;
            (pose.pos - Vec2::new(r, r), pose.pos + Vec2::new(r, r))
        }
        _ => {
            let points = world_points(shape, pose).unwrap();
            let mut min = points[0];
            let mut max = points[0];
            for p in &points[1..] {
                min.x = min.x.min(p.x);
                min.y = min.y.min(p.y);
                max.x = max.x.max(p.x);
                max.y = max.y.max(p.y);
            }
            (min, max)
        }
    }
}

fn aabb_overlap(a_shape: &Shape, a_pose: &Pose, b_shape: &Shape, b_pose: &Pose) -> (f64, f64) {
    let (amin, amax) = aabb_of(a_shape, a_pose);
    let (bmin, bmax) = aabb_of(b_shape, b_pose);
    let ox = (amax.x.min(bmax.x) - amin.x.max(bmin.x)).max(0.0);
    let oy = (amax.y.min(bmax.y) - amin.y.max(bmin.y)).max(0.0);
    (ox, oy)
}

fn contains_shape(shape: &Shape, pose: &Pose, point: Vec2) -> ContainResult {
    let contains = match shape {
        Shape::Rec2 => {
            (point.x - pose.pos.x).abs() <= pose.dim.x / 2.0
                && (point.y - pose.pos.y).abs() <= pose.dim.y / 2.0
        }
        Shape::Circle => {
            let r = pose.dim.x / 2.0;
            pose.pos.dist_squared(point) <= r * r
        }
        Shape::RotPoly { points } => {
            let local = (point - pose.pos).rotate(-pose.dir);
            point_in_convex_polygon(local, points)
        }
    };
    ContainResult {
        contains,
        ignored: false,
    }
}

fn point_in_convex_polygon(point: Vec2, points: &[Vec2]) -> bool {
    if points.len() < 3 {
        return false;
    }
    let mut sign = 0i32;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let edge = b - a;
        let to_point = point - a;
        let cross = edge.x * to_point.y - edge.y * to_point.x;
        let s = crate::util::sign(cross);
        if s != 0 {
            if sign == 0 {
                sign = s;
            } else if s != sign {
                return false;
            }
        }
    }
    true
}

fn intersects_shape(shape: &Shape, pose: &Pose, line: Line) -> IntersectResult {
    match shape {
        Shape::Rec2 => intersects_rec2(pose, line),
        Shape::Circle => intersects_circle(pose, line),
        Shape::RotPoly { points } => intersects_polygon(pose, points, line),
    }
}

fn intersects_rec2(pose: &Pose, line: Line) -> IntersectResult {
    let min = pose.pos - pose.dim * 0.5;
    let max = pose.pos + pose.dim * 0.5;

    let mut t_min = 0.0f64;
    let mut t_max = 1.0f64;

    for axis in 0..2 {
        let (o, d, lo, hi) = if axis == 0 {
            (line.o.x, line.r.x, min.x, max.x)
        } else {
            (line.o.y, line.r.y, min.y, max.y)
        };
        if d.abs() < f64::EPSILON {
            if o < lo || o > hi {
                return IntersectResult::default();
            }
            continue;
        }
        let mut t1 = (lo - o) / d;
        let mut t2 = (hi - o) / d;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_min > t_max {
            return IntersectResult::default();
        }
    }

    IntersectResult {
        hit: true,
        ignored: false,
        t: t_min.max(0.0),
    }
}

fn intersects_circle(pose: &Pose, line: Line) -> IntersectResult {
    let r = pose.dim.x / 2.0;
    let d = line.r;
    let f = line.o - pose.pos;

    let a = d.dot(d);
    let b = 2.0 * f.dot(d);
    let c = f.dot(f) - r * r;

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 || a.abs() < f64::EPSILON {
        return IntersectResult::default();
    }
    let sqrt_disc = discriminant.sqrt();
    let t1 = (-b - sqrt_disc) / (2.0 * a);
    let t2 = (-b + sqrt_disc) / (2.0 * a);

    let mut best: Option<f64> = None;
    for t in [t1, t2] {
        if (0.0..=1.0).contains(&t) {
            best = Some(match best {
                Some(existing) => existing.min(t),
                None => t,
            });
        }
    }

    match best {
        Some(t) => IntersectResult {
            hit: true,
            ignored: false,
            t,
        },
        None => IntersectResult::default(),
    }
}

fn intersects_polygon(pose: &Pose, points: &[Vec2], line: Line) -> IntersectResult {
    let local_o = (line.o - pose.pos).rotate(-pose.dir);
    let local_r = line.r.rotate(-pose.dir);
    let local_line = Line::new(local_o, local_r);

    let mut result = IntersectResult::default();
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let edge = Line::new(a, b - a);
        let (hit, t) = local_line.intersects(edge);
        if hit {
            result.merge(IntersectResult {
                hit: true,
                ignored: false,
                t,
            });
        }
    }
    result
}

fn overlap_shapes(
    a_shape: &Shape,
    a_pose: &Pose,
    b_shape: &Shape,
    b_pose: &Pose,
) -> OverlapResult {
    let overlap = match (a_shape, b_shape) {
        (Shape::Circle, Shape::Circle) => {
            let ra = a_pose.dim.x / 2.0;
            let rb = b_pose.dim.x / 2.0;
            let r = ra + rb;
            a_pose.pos.dist_squared(b_pose.pos) <= r * r
        }
        (Shape::Circle, _) => circle_overlap_polygon(a_pose, world_points(b_shape, b_pose)),
        (_, Shape::Circle) => circle_overlap_polygon(b_pose, world_points(a_shape, a_pose)),
        _ => {
            let a_points = world_points(a_shape, a_pose).unwrap();
            let b_points = world_points(b_shape, b_pose).unwrap();
            sat_overlap(&a_points, &b_points)
        }
    };

    let (ox, oy) = aabb_overlap(a_shape, a_pose, b_shape, b_pose);
    OverlapResult {
        overlap,
        amount: Vec2::new(ox, oy),
    }
}

fn edge_normals(points: &[Vec2]) -> Vec<Vec2> {
    let mut axes = Vec::with_capacity(points.len());
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let edge = b - a;
        axes.push(Vec2::new(-edge.y, edge.x).normalized());
    }
    axes
}

fn project(points: &[Vec2], axis: Vec2) -> (f64, f64) {
    let mut min = points[0].dot(axis);
    let mut max = min;
    for p in &points[1..] {
        let d = p.dot(axis);
        min = min.min(d);
        max = max.max(d);
    }
    (min, max)
}

fn sat_overlap(a: &[Vec2], b: &[Vec2]) -> bool {
    let mut axes = edge_normals(a);
    axes.extend(edge_normals(b));
    for axis in axes {
        let (amin, amax) = project(a, axis);
        let (bmin, bmax) = project(b, axis);
        if amax < bmin || bmax < amin {
            return false;
        }
    }
    true
}

fn circle_overlap_polygon(circle_pose: &Pose, polygon: Option<Vec<Vec2>>) -> bool {
    let Some(points) = polygon else {
        return false;
    };
    let r = circle_pose.dim.x / 2.0;

    let mut axes = edge_normals(&points);
    // closest-vertex axis approximates the Voronoi-region case SAT needs for
    // circle-vs-polygon; using the centroid direction keeps this branch
    // cheap and correct for the convex, roughly-regular polygons this
    // simulation uses (player hitboxes, pickups).
    let mut centroid = Vec2::ZERO;
    for p in &points {
        centroid.x += p.x;
        centroid.y += p.y;
    }
    centroid.scale(1.0 / points.len() as f64);
    axes.push((circle_pose.pos - centroid).normalized());

    for axis in axes {
        let (pmin, pmax) = project(&points, axis);
        let center_proj = circle_pose.pos.dot(axis);
        let (cmin, cmax) = (center_proj - r, center_proj + r);
        if pmax < cmin || cmax < pmin {
            return false;
        }
    }
    true
}
