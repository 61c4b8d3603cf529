//! Triangle meshes: index pools, the OBJ loader, and the ray intersector
//! (linear or KD-accelerated).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use fray_math::{intersect_triangle, BBox, Ray, SlabRay, Vec2, Vec3};

use crate::error::{SceneError, SceneResult};
use crate::geometry::IntersectionInfo;
use crate::kdtree::{self, KdNode, TriangleHit};
use crate::scene::{Scene, TextureId};

/// One triangle of a mesh: indices into the vertex/normal/uv pools, the
/// precomputed geometric normal, and the uv-space tangents used for bump
/// mapping.
#[derive(Debug, Clone)]
pub struct MeshTriangle {
    pub v: [usize; 3],
    pub n: [usize; 3],
    pub t: [usize; 3],
    pub gnormal: Vec3,
    pub dndx: Vec3,
    pub dndy: Vec3,
}

impl MeshTriangle {
    fn new(v: [usize; 3], t: [usize; 3], n: [usize; 3]) -> Self {
        Self {
            v,
            n,
            t,
            gnormal: Vec3::ZERO,
            dndx: Vec3::ZERO,
            dndy: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub triangles: Vec<MeshTriangle>,

    /// Ignore vertex normals and shade flat.
    pub faceted: bool,
    pub backface_culling: bool,
    pub use_kd: bool,
    /// Optional bump texture, applied in object space.
    pub bump: Option<TextureId>,

    bbox: BBox,
    kdroot: Option<KdNode>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vec3>, uvs: Vec<Vec2>, normals: Vec<Vec3>) -> Self {
        Self {
            vertices,
            normals,
            uvs,
            backface_culling: true,
            use_kd: true,
            ..Default::default()
        }
    }

    pub fn add_triangle(&mut self, v: [usize; 3], t: [usize; 3], n: [usize; 3]) {
        self.triangles.push(MeshTriangle::new(v, t, n));
    }

    pub fn bbox(&self) -> &BBox {
        &self.bbox
    }

    pub fn has_kd_tree(&self) -> bool {
        self.kdroot.is_some()
    }

    /// Precompute per-triangle data, the enclosing box, and (when enabled)
    /// the KD-tree. Must run before the first intersection query.
    pub fn begin_render(&mut self) {
        self.prepare_triangles();

        self.bbox = BBox::empty();
        for v in &self.vertices {
            self.bbox.add(*v);
        }

        if self.use_kd && !self.triangles.is_empty() {
            let list: Vec<u32> = (0..self.triangles.len() as u32).collect();
            let root = kdtree::build(&self.vertices, &self.triangles, list, &self.bbox, 0);
            self.kdroot = Some(root);
            log::debug!(
                "mesh: {} triangles, {} vertices, kd-tree built",
                self.triangles.len(),
                self.vertices.len()
            );
        }
    }

    /// Geometric normals, and uv-gradient tangents when both uvs and
    /// normals are present.
    fn prepare_triangles(&mut self) {
        for t in &mut self.triangles {
            let a = self.vertices[t.v[0]];
            let b = self.vertices[t.v[1]];
            let c = self.vertices[t.v[2]];
            let ab = b - a;
            let ac = c - a;
            t.gnormal = ab.cross(ac).normalize_or_zero();

            if !self.uvs.is_empty() && !self.normals.is_empty() {
                let ta = self.uvs[t.t[0]];
                let tab = self.uvs[t.t[1]] - ta;
                let tac = self.uvs[t.t[2]] - ta;

                // express the uv-space unit axes in terms of the triangle
                // edges: px*tAB + qx*tAC = (1,0), py*tAB + qy*tAC = (0,1)
                if let (Some((px, qx)), Some((py, qy))) = (
                    solve_2d(tab, tac, Vec2::new(1.0, 0.0)),
                    solve_2d(tab, tac, Vec2::new(0.0, 1.0)),
                ) {
                    t.dndx = (ab * px + ac * qx).normalize_or_zero();
                    t.dndy = (ab * py + ac * qy).normalize_or_zero();
                } else {
                    t.dndx = Vec3::ZERO;
                    t.dndy = Vec3::ZERO;
                }
            }
        }
    }

    pub fn intersect(&self, scene: &Scene, ray: &Ray, info: &mut IntersectionInfo) -> bool {
        let slab = SlabRay::new(*ray);
        if !self.bbox.test_intersect(&slab) {
            return false;
        }

        let mut best = TriangleHit::default();
        let found = match &self.kdroot {
            Some(root) => kdtree::traverse(
                root,
                &self.vertices,
                &self.triangles,
                self.backface_culling,
                &slab,
                &self.bbox,
                &mut best,
            ),
            None => self.intersect_linear(ray, &mut best),
        };
        if !found {
            return false;
        }

        let t = &self.triangles[best.triangle];
        let (l2, l3) = (best.lambda2, best.lambda3);

        info.ip = ray.at(best.dist);
        info.dist = (info.ip - ray.start).length();

        info.norm = if self.faceted || self.normals.is_empty() {
            t.gnormal
        } else {
            let na = self.normals[t.n[0]];
            let nb = self.normals[t.n[1]];
            let nc = self.normals[t.n[2]];
            (na + (nb - na) * l2 + (nc - na) * l3).normalize()
        };

        if self.uvs.is_empty() {
            info.u = 0.0;
            info.v = 0.0;
        } else {
            let ta = self.uvs[t.t[0]];
            let uv = ta + (self.uvs[t.t[1]] - ta) * l2 + (self.uvs[t.t[2]] - ta) * l3;
            info.u = uv.x;
            info.v = uv.y;
        }
        info.dndx = t.dndx;
        info.dndy = t.dndy;

        if let Some(bump_id) = self.bump {
            let (dx, dy) = scene.textures[bump_id].deflection(info);
            if dx != 0.0 || dy != 0.0 {
                info.norm =
                    (info.norm + t.dndx * dx as f64 + t.dndy * dy as f64).normalize();
            }
        }

        true
    }

    fn intersect_linear(&self, ray: &Ray, best: &mut TriangleHit) -> bool {
        let mut found = false;
        for (idx, t) in self.triangles.iter().enumerate() {
            if self.backface_culling && ray.dir.dot(t.gnormal) > 0.0 {
                continue;
            }
            let a = self.vertices[t.v[0]];
            let b = self.vertices[t.v[1]];
            let c = self.vertices[t.v[2]];
            if let Some((l2, l3)) = intersect_triangle(ray, a, b, c, &mut best.dist) {
                best.lambda2 = l2;
                best.lambda3 = l3;
                best.triangle = idx;
                found = true;
            }
        }
        found
    }

    /// Load a mesh from a Wavefront OBJ file (`v`/`vn`/`vt`/`f` subset;
    /// polygons are fan-triangulated). Indices in the file are one-based,
    /// so each pool gets a dummy zeroth entry.
    pub fn load_obj(path: &Path) -> SceneResult<Mesh> {
        if !path.exists() {
            return Err(SceneError::AssetNotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;

        let mut mesh = Mesh::new(vec![Vec3::ZERO], vec![Vec2::ZERO], vec![Vec3::ZERO]);

        for line in BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            match tokens[0] {
                "v" => mesh.vertices.push(parse_vec3(&tokens)),
                "vn" => mesh.normals.push(parse_vec3(&tokens)),
                "vt" => mesh.uvs.push(Vec2::new(
                    parse_f64(tokens.get(1)),
                    parse_f64(tokens.get(2)),
                )),
                "f" => {
                    for i in 0..tokens.len().saturating_sub(3) {
                        let (v0, t0, n0) = parse_obj_trio(tokens[1]);
                        let (v1, t1, n1) = parse_obj_trio(tokens[2 + i]);
                        let (v2, t2, n2) = parse_obj_trio(tokens[3 + i]);
                        mesh.add_triangle([v0, v1, v2], [t0, t1, t2], [n0, n1, n2]);
                    }
                }
                _ => {}
            }
        }

        log::info!(
            "loaded {}: {} vertices, {} triangles",
            path.display(),
            mesh.vertices.len() - 1,
            mesh.triangles.len()
        );
        Ok(mesh)
    }
}

/// Solve x*a + y*b = c in 2D; None when the system is degenerate.
fn solve_2d(a: Vec2, b: Vec2, c: Vec2) -> Option<(f64, f64)> {
    let dcr = a.x * b.y - b.x * a.y;
    if dcr.abs() < 1e-12 {
        return None;
    }
    let x = (c.x * b.y - c.y * b.x) / dcr;
    let y = (a.x * c.y - a.y * c.x) / dcr;
    Some((x, y))
}

fn parse_f64(s: Option<&&str>) -> f64 {
    s.and_then(|s| s.parse().ok()).unwrap_or(0.0)
}

fn parse_vec3(tokens: &[&str]) -> Vec3 {
    Vec3::new(
        parse_f64(tokens.get(1)),
        parse_f64(tokens.get(2)),
        parse_f64(tokens.get(3)),
    )
}

/// Parse an OBJ face corner: "3", "3/4", "3//5" or "3/4/5" (v/vt/vn).
fn parse_obj_trio(s: &str) -> (usize, usize, usize) {
    let mut items = s.split('/');
    let v = items.next().and_then(|t| t.parse().ok()).unwrap_or(0);
    let t = items.next().and_then(|t| t.parse().ok()).unwrap_or(0);
    let n = items.next().and_then(|t| t.parse().ok()).unwrap_or(0);
    (v, t, n)
}
