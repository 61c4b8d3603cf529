//! KD-tree spatial index over mesh triangles.
//!
//! Axes alternate with depth and the split plane sits at the slab
//! midpoint. Triangles overlapping both halves are referenced from both
//! children; correctness of nearest-first traversal is guaranteed by the
//! leaf containment check, not by exclusive partitioning.

use fray_math::{intersect_triangle, Axis, BBox, SlabRay, Vec3};

use crate::mesh::MeshTriangle;

/// A leaf holds at most this many triangles, unless the depth cap forces
/// an oversized one.
pub const TRIANGLES_PER_LEAF: usize = 20;
pub const MAX_TREE_DEPTH: usize = 64;

#[derive(Debug)]
pub enum KdNode {
    Inner {
        axis: Axis,
        pos: f64,
        left: Box<KdNode>,
        right: Box<KdNode>,
    },
    Leaf(Vec<u32>),
}

/// The best triangle hit found so far during traversal; `dist` is the ray
/// parameter, tightened monotonically across leaves.
#[derive(Debug, Clone, Copy)]
pub struct TriangleHit {
    pub dist: f64,
    pub lambda2: f64,
    pub lambda3: f64,
    pub triangle: usize,
}

impl Default for TriangleHit {
    fn default() -> Self {
        Self {
            dist: f64::INFINITY,
            lambda2: 0.0,
            lambda3: 0.0,
            triangle: usize::MAX,
        }
    }
}

pub fn build(
    vertices: &[Vec3],
    triangles: &[MeshTriangle],
    list: Vec<u32>,
    bbox: &BBox,
    depth: usize,
) -> KdNode {
    if list.len() <= TRIANGLES_PER_LEAF || depth > MAX_TREE_DEPTH {
        return KdNode::Leaf(list);
    }

    let axis = Axis::from_depth(depth);
    let pos = (bbox.vmin[axis.index()] + bbox.vmax[axis.index()]) * 0.5;
    let (left_box, right_box) = bbox.split(axis, pos);

    let mut left_list = Vec::new();
    let mut right_list = Vec::new();
    for &idx in &list {
        let t = &triangles[idx as usize];
        let (a, b, c) = (
            vertices[t.v[0]],
            vertices[t.v[1]],
            vertices[t.v[2]],
        );
        if left_box.intersect_triangle(a, b, c) {
            left_list.push(idx);
        }
        if right_box.intersect_triangle(a, b, c) {
            right_list.push(idx);
        }
    }

    KdNode::Inner {
        axis,
        pos,
        left: Box::new(build(vertices, triangles, left_list, &left_box, depth + 1)),
        right: Box::new(build(vertices, triangles, right_list, &right_box, depth + 1)),
    }
}

/// Ordered traversal. Visits the child containing the ray start first and
/// accepts a leaf's result only when the hit point lies inside the leaf's
/// box, which keeps a duplicated triangle in a farther cell from stealing
/// the nearest hit.
pub fn traverse(
    node: &KdNode,
    vertices: &[Vec3],
    triangles: &[MeshTriangle],
    backface_culling: bool,
    slab: &SlabRay,
    bbox: &BBox,
    best: &mut TriangleHit,
) -> bool {
    match node {
        KdNode::Leaf(list) => {
            let ray = &slab.ray;
            let mut improved = false;
            for &idx in list {
                let t = &triangles[idx as usize];
                if backface_culling && ray.dir.dot(t.gnormal) > 0.0 {
                    continue;
                }
                let (a, b, c) = (
                    vertices[t.v[0]],
                    vertices[t.v[1]],
                    vertices[t.v[2]],
                );
                if let Some((l2, l3)) = intersect_triangle(ray, a, b, c, &mut best.dist) {
                    best.lambda2 = l2;
                    best.lambda3 = l3;
                    best.triangle = idx as usize;
                    improved = true;
                }
            }
            improved && bbox.inside(slab.ray.at(best.dist))
        }
        KdNode::Inner {
            axis,
            pos,
            left,
            right,
        } => {
            let boxes = bbox.split(*axis, *pos);
            let children = [(&**left, boxes.0), (&**right, boxes.1)];
            let order: [usize; 2] = if slab.ray.start[axis.index()] <= *pos {
                [0, 1]
            } else {
                [1, 0]
            };
            for i in order {
                let (child, child_box) = (children[i].0, children[i].1);
                if child_box.test_intersect(slab)
                    && traverse(
                        child,
                        vertices,
                        triangles,
                        backface_culling,
                        slab,
                        &child_box,
                        best,
                    )
                {
                    return true;
                }
            }
            false
        }
    }
}
