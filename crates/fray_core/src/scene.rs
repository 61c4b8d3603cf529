//! The scene: exclusive pools of geometries, shaders, textures, nodes and
//! lights, plus the camera, environment and global settings. Everything
//! else refers into the pools by index, so there is exactly one owner per
//! element and no cycles.

use fray_math::{Color, Ray, Transform};

use crate::camera::Camera;
use crate::environment::CubemapEnvironment;
use crate::geometry::{GeomRef, Geometry, IntersectionInfo};
use crate::lights::Light;
use crate::shading::Shader;
use crate::texture::Texture;

pub type GeometryId = usize;
pub type ShaderId = usize;
pub type TextureId = usize;
pub type NodeId = usize;
pub type LightId = usize;

/// Frame-global rendering settings.
#[derive(Debug, Clone)]
pub struct GlobalSettings {
    pub frame_width: usize,
    pub frame_height: usize,
    pub ambient_light: Color,
    pub want_aa: bool,
    pub want_prepass: bool,
    /// Path tracing instead of Whitted-style recursion.
    pub gi: bool,
    pub num_paths: u32,
    /// 0 means autodetect.
    pub num_threads: usize,
    pub max_trace_depth: u32,
    pub saturation: f32,
    pub interactive: bool,
    pub fullscreen: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            frame_width: 640,
            frame_height: 480,
            ambient_light: Color::BLACK,
            want_aa: true,
            want_prepass: true,
            gi: false,
            num_paths: 40,
            num_threads: 0,
            max_trace_depth: 4,
            saturation: 1.0,
            interactive: false,
            fullscreen: false,
        }
    }
}

/// An instanced geometry in the scene: a transform, a geometry, a shader
/// and an optional bump texture. Nodes without a shader never render
/// directly; they are "super-nodes", usable only as CSG operands.
#[derive(Debug)]
pub struct Node {
    pub geometry: GeometryId,
    pub shader: Option<ShaderId>,
    pub transform: Transform,
    pub bump: Option<TextureId>,
}

impl Node {
    pub fn new(geometry: GeometryId, shader: ShaderId) -> Node {
        Node {
            geometry,
            shader: Some(shader),
            transform: Transform::identity(),
            bump: None,
        }
    }

    /// Intersect in object space and bring the result back to world
    /// space. The distance is recomputed from the world-space hit point,
    /// which keeps it correct under non-unit scale.
    pub fn intersect(&self, scene: &Scene, ray: &Ray, info: &mut IntersectionInfo) -> bool {
        let local = Ray {
            start: self.transform.untransform_point(ray.start),
            dir: self.transform.untransform_dir(ray.dir),
            ..*ray
        };

        if !scene.geometries[self.geometry].intersect(scene, &local, info) {
            return false;
        }

        info.ip = self.transform.transform_point(info.ip);
        info.norm = self.transform.transform_dir(info.norm).normalize();
        info.dndx = self.transform.transform_dir(info.dndx);
        info.dndy = self.transform.transform_dir(info.dndy);
        info.dist = (info.ip - ray.start).length();
        info.geom = GeomRef::Geometry(self.geometry);
        true
    }
}

#[derive(Debug, Default)]
pub struct Scene {
    pub geometries: Vec<Geometry>,
    pub textures: Vec<Texture>,
    pub shaders: Vec<Shader>,
    /// Renderable nodes (those with a shader).
    pub nodes: Vec<Node>,
    /// Shaderless nodes, referenced by CSG compositions only.
    pub super_nodes: Vec<Node>,
    pub lights: Vec<Light>,
    pub environment: Option<CubemapEnvironment>,
    pub camera: Camera,
    pub settings: GlobalSettings,
}

impl Scene {
    /// One-time preparation after the scene is assembled: differentiate
    /// bump rasters and build mesh acceleration structures.
    pub fn begin_render(&mut self) {
        for texture in &mut self.textures {
            texture.begin_render();
        }
        for geometry in &mut self.geometries {
            if let Geometry::Mesh(mesh) = geometry {
                mesh.begin_render();
            }
        }
        log::info!(
            "scene ready: {} nodes, {} geometries, {} lights",
            self.nodes.len(),
            self.geometries.len(),
            self.lights.len()
        );
    }

    /// Per-frame preparation: camera basis, light caches and per-frame
    /// shader state.
    pub fn begin_frame(&mut self) {
        for light in &mut self.lights {
            light.begin_frame();
        }
        for shader in &mut self.shaders {
            shader.begin_frame();
        }
        self.camera
            .begin_frame(self.settings.frame_width, self.settings.frame_height);
    }
}
