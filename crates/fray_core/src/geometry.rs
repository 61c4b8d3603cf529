//! Geometric primitives and their ray intersections: the infinite-extent
//! square plane, sphere, axis-aligned cube, and CSG compositions. Triangle
//! meshes live in `mesh`.

use fray_math::{Ray, Vec3};

use crate::scene::{GeometryId, NodeId, Scene};

/// Which surface produced an intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeomRef {
    #[default]
    None,
    Geometry(GeometryId),
    Light(usize),
}

/// Everything the shading kernel needs to know about a surface hit.
#[derive(Debug, Clone, Copy)]
pub struct IntersectionInfo {
    /// Distance from the ray origin to the hit point.
    pub dist: f64,
    pub ip: Vec3,
    /// Shading normal (interpolated and possibly bump-perturbed).
    pub norm: Vec3,
    /// Surface tangent/bitangent, used by bump mapping. Zero for
    /// primitives that do not carry a uv parameterization gradient.
    pub dndx: Vec3,
    pub dndy: Vec3,
    pub u: f64,
    pub v: f64,
    pub geom: GeomRef,
}

impl Default for IntersectionInfo {
    fn default() -> Self {
        Self {
            dist: f64::INFINITY,
            ip: Vec3::ZERO,
            norm: Vec3::ZERO,
            dndx: Vec3::ZERO,
            dndy: Vec3::ZERO,
            u: 0.0,
            v: 0.0,
            geom: GeomRef::None,
        }
    }
}

/// Boolean combinator of a CSG composition; the names follow the scene
/// file classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsgOp {
    /// Union: inside either child.
    Plus,
    /// Intersection: inside both children.
    And,
    /// Difference: inside the left child but not the right.
    Minus,
}

impl CsgOp {
    #[inline]
    pub fn apply(self, in_left: bool, in_right: bool) -> bool {
        match self {
            CsgOp::Plus => in_left || in_right,
            CsgOp::And => in_left && in_right,
            CsgOp::Minus => in_left && !in_right,
        }
    }
}

/// A CSG operand: either a plain geometry or a super-node (a transformed
/// geometry without a shader of its own).
#[derive(Debug, Clone, Copy)]
pub enum CsgChild {
    Geometry(GeometryId),
    SuperNode(NodeId),
}

impl CsgChild {
    fn intersect(&self, scene: &Scene, ray: &Ray, info: &mut IntersectionInfo) -> bool {
        match *self {
            CsgChild::Geometry(id) => scene.geometries[id].intersect(scene, ray, info),
            CsgChild::SuperNode(id) => scene.super_nodes[id].intersect(scene, ray, info),
        }
    }
}

/// A scene geometry. CSG children reference other pool entries by index,
/// so the pool stays the single owner.
#[derive(Debug)]
pub enum Geometry {
    /// A horizontal square at y = `y`, spanning ±`limit` along x and z.
    Plane { y: f64, limit: f64 },
    Sphere { center: Vec3, radius: f64 },
    Cube { center: Vec3, half_side: f64 },
    Csg {
        op: CsgOp,
        left: CsgChild,
        right: CsgChild,
    },
    Mesh(crate::mesh::Mesh),
}

impl Geometry {
    /// Intersect a ray, updating `info` on a hit. Degenerate configurations
    /// (parallel rays, zero determinants) are silent misses.
    ///
    /// The ray direction need not be unit length: nodes feed object-space
    /// rays through here, and every variant derives the distance from the
    /// actual hit point.
    pub fn intersect(&self, scene: &Scene, ray: &Ray, info: &mut IntersectionInfo) -> bool {
        match self {
            Geometry::Plane { y, limit } => intersect_plane(*y, *limit, ray, info),
            Geometry::Sphere { center, radius } => intersect_sphere(*center, *radius, ray, info),
            Geometry::Cube { center, half_side } => intersect_cube(*center, *half_side, ray, info),
            Geometry::Csg { op, left, right } => intersect_csg(scene, *op, left, right, ray, info),
            Geometry::Mesh(mesh) => mesh.intersect(scene, ray, info),
        }
    }
}

fn intersect_plane(height: f64, limit: f64, ray: &Ray, info: &mut IntersectionInfo) -> bool {
    if ray.start.y > height && ray.dir.y >= 0.0 {
        return false;
    }
    if ray.start.y < height && ray.dir.y <= 0.0 {
        return false;
    }
    let t = (height - ray.start.y) / ray.dir.y;
    let ip = ray.at(t);
    if ip.x.abs() > limit || ip.z.abs() > limit {
        return false;
    }
    info.ip = ip;
    info.dist = (ip - ray.start).length();
    info.norm = Vec3::Y;
    info.u = ip.x;
    info.v = ip.z;
    true
}

fn intersect_sphere(center: Vec3, radius: f64, ray: &Ray, info: &mut IntersectionInfo) -> bool {
    // |start + t*dir - center|^2 == radius^2, solved for t
    let h = ray.start - center;
    let a = ray.dir.length_squared();
    let b = 2.0 * ray.dir.dot(h);
    let c = h.length_squared() - radius * radius;

    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return false;
    }
    let sqrt_disc = disc.sqrt();
    let smaller = (-b - sqrt_disc) / (2.0 * a);
    let larger = (-b + sqrt_disc) / (2.0 * a);
    if larger < 0.0 {
        return false;
    }
    let t = if smaller >= 0.0 { smaller } else { larger };

    info.ip = ray.at(t);
    info.dist = (info.ip - ray.start).length();
    info.norm = (info.ip - center).normalize();
    info.u = (info.norm.z.atan2(info.norm.x).to_degrees() + 180.0) / 360.0;
    info.v = 1.0 - (info.norm.y.asin().to_degrees() + 90.0) / 180.0;
    true
}

fn intersect_cube(center: Vec3, half_side: f64, ray: &Ray, info: &mut IntersectionInfo) -> bool {
    info.dist = f64::INFINITY;

    for dim in 0..3 {
        let start = ray.start[dim];
        let dir = ray.dir[dim];
        if dir.abs() < 1e-9 {
            continue;
        }
        for side in [-1.0, 1.0] {
            let target = center[dim] + side * half_side;
            let t = (target - start) / dir;
            if t < 0.0 {
                continue;
            }
            let ip = ray.at(t);
            if (ip - center).abs().max_element() > half_side + 1e-6 {
                continue;
            }
            let dist = (ip - ray.start).length();
            if dist < info.dist {
                info.dist = dist;
                info.ip = ip;
                let mut norm = Vec3::ZERO;
                norm[dim] = side;
                info.norm = norm;
                // uv: drop the face's own axis
                let (u, v) = match dim {
                    0 => (ip.y, ip.z),
                    1 => (ip.x, ip.z),
                    _ => (ip.x, ip.y),
                };
                info.u = u;
                info.v = v;
            }
        }
    }

    info.dist.is_finite()
}

/// Collect every intersection of a ray with a CSG child, in order, by
/// repeatedly nudging the ray start just past each hit. The iteration is
/// capped so a degenerate surface cannot loop forever; distances are
/// re-derived from the original origin afterwards.
fn find_all_intersections(
    scene: &Scene,
    child: &CsgChild,
    mut ray: Ray,
) -> Vec<IntersectionInfo> {
    let origin = ray.start;
    let mut result = Vec::new();

    for _ in 0..30 {
        let mut info = IntersectionInfo::default();
        if !child.intersect(scene, &ray, &mut info) {
            break;
        }
        result.push(info);
        ray.start = info.ip + ray.dir * 1e-6;
    }

    for hit in result.iter_mut().skip(1) {
        hit.dist = (hit.ip - origin).length();
    }
    result
}

fn intersect_csg(
    scene: &Scene,
    op: CsgOp,
    left: &CsgChild,
    right: &CsgChild,
    ray: &Ray,
    info: &mut IntersectionInfo,
) -> bool {
    let lefts = find_all_intersections(scene, left, *ray);
    let rights = find_all_intersections(scene, right, *ray);

    // the hit-count parity tells whether the ray origin is inside a child
    let mut in_left = lefts.len() % 2 == 1;
    let mut in_right = rights.len() % 2 == 1;
    let initial = op.apply(in_left, in_right);

    let mut all: Vec<(IntersectionInfo, bool)> = lefts
        .into_iter()
        .map(|h| (h, true))
        .chain(rights.into_iter().map(|h| (h, false)))
        .collect();
    all.sort_by(|a, b| {
        a.0.dist
            .partial_cmp(&b.0.dist)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for (hit, from_left) in all {
        if from_left {
            in_left = !in_left;
        } else {
            in_right = !in_right;
        }
        if op.apply(in_left, in_right) != initial {
            *info = hit;
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;
    use approx::assert_relative_eq;

    fn empty_scene() -> Scene {
        Scene::default()
    }

    #[test]
    fn test_sphere_round_trip_from_center() {
        let scene = empty_scene();
        let sphere = Geometry::Sphere {
            center: Vec3::new(1.0, 2.0, 3.0),
            radius: 2.5,
        };
        for dir in [
            Vec3::X,
            -Vec3::Y,
            Vec3::new(0.3, -0.5, 0.81).normalize(),
        ] {
            let ray = Ray::new(Vec3::new(1.0, 2.0, 3.0), dir);
            let mut info = IntersectionInfo::default();
            assert!(sphere.intersect(&scene, &ray, &mut info));
            assert_relative_eq!(info.dist, 2.5, epsilon = 1e-9);
            assert_relative_eq!(info.norm.dot(dir), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_plane_limit() {
        let scene = empty_scene();
        let plane = Geometry::Plane { y: 0.0, limit: 10.0 };

        let down = Ray::new(Vec3::new(3.0, 5.0, -2.0), -Vec3::Y);
        let mut info = IntersectionInfo::default();
        assert!(plane.intersect(&scene, &down, &mut info));
        assert_relative_eq!(info.dist, 5.0);
        assert_eq!(info.norm, Vec3::Y);
        assert_relative_eq!(info.u, 3.0);
        assert_relative_eq!(info.v, -2.0);

        let outside = Ray::new(Vec3::new(50.0, 5.0, 0.0), -Vec3::Y);
        assert!(!plane.intersect(&scene, &outside, &mut IntersectionInfo::default()));

        let parallel = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::X);
        assert!(!plane.intersect(&scene, &parallel, &mut IntersectionInfo::default()));
    }

    #[test]
    fn test_cube_faces_and_normals() {
        let scene = empty_scene();
        let cube = Geometry::Cube {
            center: Vec3::ZERO,
            half_side: 1.0,
        };
        let ray = Ray::new(Vec3::new(-5.0, 0.2, 0.3), Vec3::X);
        let mut info = IntersectionInfo::default();
        assert!(cube.intersect(&scene, &ray, &mut info));
        assert_relative_eq!(info.dist, 4.0, epsilon = 1e-9);
        assert_eq!(info.norm, -Vec3::X);

        // from inside, the far face is hit
        let inside = Ray::new(Vec3::ZERO, Vec3::X);
        assert!(cube.intersect(&scene, &inside, &mut info));
        assert_relative_eq!(info.dist, 1.0, epsilon = 1e-9);
        assert_eq!(info.norm, Vec3::X);
    }

    fn csg_scene(op: CsgOp) -> Scene {
        let mut scene = Scene::default();
        scene.geometries.push(Geometry::Cube {
            center: Vec3::ZERO,
            half_side: 1.0,
        });
        scene.geometries.push(Geometry::Sphere {
            center: Vec3::new(1.0, 1.0, 1.0),
            radius: 1.0,
        });
        scene.geometries.push(Geometry::Csg {
            op,
            left: CsgChild::Geometry(0),
            right: CsgChild::Geometry(1),
        });
        scene
    }

    /// Membership oracle for the cube/sphere test solids.
    fn inside_cube(p: Vec3) -> bool {
        p.abs().max_element() <= 1.0
    }
    fn inside_sphere(p: Vec3) -> bool {
        (p - Vec3::new(1.0, 1.0, 1.0)).length() <= 1.0
    }

    #[test]
    fn test_csg_minus_carves_the_corner() {
        let scene = csg_scene(CsgOp::Minus);
        let csg = &scene.geometries[2];

        // a ray aimed at the carved corner must first hit the concave
        // sphere surface inside the cube
        let ray = Ray::new(
            Vec3::new(3.0, 3.0, 3.0),
            Vec3::new(-1.0, -1.0, -1.0).normalize(),
        );
        let mut info = IntersectionInfo::default();
        assert!(csg.intersect(&scene, &ray, &mut info));
        assert!(inside_cube(info.ip), "hit must lie on the cube part: {:?}", info.ip);
        // the hit lies on the sphere surface, and the surface normal there
        // is the sphere's (pointing toward its center from outside-sphere's
        // perspective, i.e. inward relative to the cube corner)
        assert_relative_eq!(
            (info.ip - Vec3::new(1.0, 1.0, 1.0)).length(),
            1.0,
            epsilon = 1e-6
        );

        // just past the reported hit the combined predicate must hold
        let just_past = info.ip + ray.dir * 1e-3;
        assert!(inside_cube(just_past) && !inside_sphere(just_past));
    }

    #[test]
    fn test_csg_characteristic_function_consistency() {
        for op in [CsgOp::Plus, CsgOp::And, CsgOp::Minus] {
            let scene = csg_scene(op);
            let csg = &scene.geometries[2];
            let ray = Ray::new(
                Vec3::new(-3.0, 0.4, 0.2),
                Vec3::new(1.0, 0.1, 0.15).normalize(),
            );
            let mut info = IntersectionInfo::default();
            if csg.intersect(&scene, &ray, &mut info) {
                let p = info.ip + ray.dir * 1e-3;
                let expect = op.apply(inside_cube(p), inside_sphere(p));
                let before = info.ip - ray.dir * 1e-3;
                let was = op.apply(inside_cube(before), inside_sphere(before));
                assert_ne!(expect, was, "hit must flip the combined predicate");
            }
        }
    }

    #[test]
    fn test_find_all_counts_entry_and_exit() {
        let scene = csg_scene(CsgOp::Plus);
        let child = CsgChild::Geometry(1); // the sphere
        let through = Ray::new(Vec3::new(1.0, 1.0, -5.0), Vec3::Z);
        let hits = find_all_intersections(&scene, &child, through);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].dist < hits[1].dist);

        // starting inside: odd number of hits
        let from_inside = Ray::new(Vec3::new(1.0, 1.0, 1.0), Vec3::Z);
        let hits = find_all_intersections(&scene, &child, from_inside);
        assert_eq!(hits.len() % 2, 1);
    }
}
