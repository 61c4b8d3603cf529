//! The scene description parser.
//!
//! A scene file is a sequence of blocks:
//!
//! ```text
//! Sphere ball {
//!     center (0, 2, 0)
//!     radius 1.5
//! }
//! ```
//!
//! Each block declares one scene element of a known class, optionally
//! named so later blocks can reference it. References must point at
//! already-declared elements; the grammar cannot express cycles.
//! `randfloat(a,b)` and `randint(a,b)` occurrences are substituted
//! textually before a line is interpreted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fray_math::{Color, Random, Transform, Vec3};

use crate::bitmap::Bitmap;
use crate::camera::Camera;
use crate::environment::CubemapEnvironment;
use crate::geometry::{CsgChild, CsgOp, Geometry};
use crate::lights::Light;
use crate::mesh::Mesh;
use crate::scene::{Node, Scene};
use crate::shading::{Layer, Shader, MAX_LAYERS};
use crate::texture::Texture;
use crate::error::{SceneError, SceneResult};

/// Parse a scene file; asset paths inside it resolve relative to the
/// file's directory.
pub fn parse_scene_file(path: &Path) -> SceneResult<Scene> {
    let text = std::fs::read_to_string(path)
        .map_err(|_| SceneError::AssetNotFound(path.to_path_buf()))?;
    let base_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
    let file = path.display().to_string();
    parse_scene_text(&text, &file, &base_dir)
}

/// Parse scene text directly (used by tests and embedded scenes).
pub fn parse_scene_text(text: &str, file: &str, base_dir: &Path) -> SceneResult<Scene> {
    Parser::new(file, base_dir).run(text)
}

struct Parser<'a> {
    file: String,
    base_dir: &'a Path,
    scene: Scene,
    rng: Random,
    geometry_names: HashMap<String, usize>,
    texture_names: HashMap<String, usize>,
    shader_names: HashMap<String, usize>,
    super_node_names: HashMap<String, usize>,
}

/// One block of the scene file, with per-property source lines kept for
/// error reporting.
struct Block {
    class: String,
    header_line: usize,
    /// (source line, property name, raw value)
    lines: Vec<(usize, String, String)>,
}

impl<'a> Parser<'a> {
    fn new(file: &str, base_dir: &'a Path) -> Self {
        Self {
            file: file.to_string(),
            base_dir,
            scene: Scene::default(),
            rng: Random::new(42),
            geometry_names: HashMap::new(),
            texture_names: HashMap::new(),
            shader_names: HashMap::new(),
            super_node_names: HashMap::new(),
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> SceneError {
        SceneError::Parse {
            file: self.file.clone(),
            line,
            message: message.into(),
        }
    }

    fn run(mut self, text: &str) -> SceneResult<Scene> {
        let mut lines = text.lines().enumerate().peekable();

        while let Some((idx, raw)) = lines.next() {
            let line_no = idx + 1;
            let line = strip_comment(raw).trim().to_string();
            if line.is_empty() {
                continue;
            }

            // block header: `Class [name] {`
            let mut tokens: Vec<&str> = line.split_whitespace().collect();
            let brace_here = tokens.last() == Some(&"{");
            if brace_here {
                tokens.pop();
            }
            if tokens.is_empty() || tokens.len() > 2 {
                return Err(self.error(line_no, format!("malformed block header: `{line}`")));
            }
            if !brace_here {
                // allow the brace on its own following line
                match lines.next() {
                    Some((_, l)) if strip_comment(l).trim() == "{" => {}
                    _ => {
                        return Err(
                            self.error(line_no, format!("expected `{{` after `{line}`"))
                        )
                    }
                }
            }

            let class = tokens[0].to_string();
            let name = tokens.get(1).map(|s| s.to_string());

            // collect the block body up to the closing brace
            let mut block = Block {
                class,
                header_line: line_no,
                lines: Vec::new(),
            };
            let mut closed = false;
            for (body_idx, body_raw) in lines.by_ref() {
                let body_no = body_idx + 1;
                let body = strip_comment(body_raw).trim().to_string();
                if body.is_empty() {
                    continue;
                }
                if body == "}" {
                    closed = true;
                    break;
                }
                let body = self.substitute_randoms(&body, body_no)?;
                let (head, tail) = match body.split_once(char::is_whitespace) {
                    Some((h, t)) => (h.to_string(), t.trim().to_string()),
                    None => (body.clone(), String::new()),
                };
                block.lines.push((body_no, head, tail));
            }
            if !closed {
                return Err(self.error(block.header_line, "unterminated block"));
            }

            self.process_block(&block, name)?;
        }

        Ok(self.scene)
    }

    fn process_block(&mut self, block: &Block, name: Option<String>) -> SceneResult<()> {
        self.warn_unknown(block);
        match block.class.as_str() {
            "GlobalSettings" => self.fill_settings(block)?,
            "Camera" => self.fill_camera(block)?,
            "CubemapEnvironment" => {
                let folder = self.require_filename(block, "folder")?;
                self.scene.environment = Some(CubemapEnvironment::load_maps(&folder)?);
            }
            "Plane" | "Sphere" | "Cube" | "CsgPlus" | "CsgAnd" | "CsgMinus" | "Mesh" => {
                let geom = self.build_geometry(block)?;
                let id = self.scene.geometries.len();
                self.scene.geometries.push(geom);
                if let Some(name) = name {
                    self.geometry_names.insert(name, id);
                }
            }
            "CheckerTexture" | "BitmapTexture" | "BumpTexture" | "Fresnel" => {
                let tex = self.build_texture(block)?;
                let id = self.scene.textures.len();
                self.scene.textures.push(tex);
                if let Some(name) = name {
                    self.texture_names.insert(name, id);
                }
            }
            "Const" | "Lambert" | "Phong" | "Refl" | "Refr" | "Layered" => {
                let shader = self.build_shader(block)?;
                let id = self.scene.shaders.len();
                self.scene.shaders.push(shader);
                if let Some(name) = name {
                    self.shader_names.insert(name, id);
                }
            }
            "Node" => self.fill_node(block, name)?,
            "PointLight" => {
                let pos = self.require(block, "pos", self.get_vector(block, "pos")?)?;
                let color = self.get_color(block, "color")?.unwrap_or(Color::WHITE);
                let power = self.get_double(block, "power")?.unwrap_or(1.0) as f32;
                self.scene.lights.push(Light::point(pos, color, power));
            }
            "RectLight" => {
                let color = self.get_color(block, "color")?.unwrap_or(Color::WHITE);
                let power = self.get_double(block, "power")?.unwrap_or(1.0) as f32;
                let xsubd = self.get_int(block, "xSubd")?.unwrap_or(2).max(1) as u32;
                let ysubd = self.get_int(block, "ySubd")?.unwrap_or(2).max(1) as u32;
                let mut transform = Transform::identity();
                self.get_transform(block, &mut transform)?;
                self.scene
                    .lights
                    .push(Light::rect(transform, xsubd, ysubd, color, power));
            }
            other => {
                return Err(self.error(
                    block.header_line,
                    format!("unknown block class `{other}`"),
                ))
            }
        }
        Ok(())
    }

    fn fill_settings(&mut self, block: &Block) -> SceneResult<()> {
        let s = &mut self.scene.settings;
        for (line_no, head, tail) in &block.lines {
            match head.as_str() {
                "frameWidth" => s.frame_width = parse_num::<usize>(&self.file, *line_no, tail)?,
                "frameHeight" => s.frame_height = parse_num::<usize>(&self.file, *line_no, tail)?,
                "ambientLight" => s.ambient_light = parse_color(&self.file, *line_no, tail)?,
                "wantAA" => s.want_aa = parse_bool(&self.file, *line_no, tail)?,
                "wantPrepass" => s.want_prepass = parse_bool(&self.file, *line_no, tail)?,
                "gi" => s.gi = parse_bool(&self.file, *line_no, tail)?,
                "numPaths" => s.num_paths = parse_num::<u32>(&self.file, *line_no, tail)?,
                "numThreads" => s.num_threads = parse_num::<usize>(&self.file, *line_no, tail)?,
                "maxTraceDepth" => s.max_trace_depth = parse_num::<u32>(&self.file, *line_no, tail)?,
                "saturation" => s.saturation = parse_num::<f32>(&self.file, *line_no, tail)?,
                "interactive" => s.interactive = parse_bool(&self.file, *line_no, tail)?,
                "fullscreen" => s.fullscreen = parse_bool(&self.file, *line_no, tail)?,
                other => log::warn!("{}:{}: unknown property `{}`", self.file, line_no, other),
            }
        }
        Ok(())
    }

    fn fill_camera(&mut self, block: &Block) -> SceneResult<()> {
        let cam: &mut Camera = &mut self.scene.camera;
        for (line_no, head, tail) in &block.lines {
            match head.as_str() {
                "pos" | "position" => cam.pos = parse_vector(&self.file, *line_no, tail)?,
                "yaw" => cam.yaw = parse_num(&self.file, *line_no, tail)?,
                "pitch" => cam.pitch = parse_num(&self.file, *line_no, tail)?,
                "roll" => cam.roll = parse_num(&self.file, *line_no, tail)?,
                "fov" => cam.fov = parse_num(&self.file, *line_no, tail)?,
                "aspectRatio" | "aspect" => cam.aspect_ratio = parse_num(&self.file, *line_no, tail)?,
                "dof" => cam.dof = parse_bool(&self.file, *line_no, tail)?,
                "numSamples" => cam.num_dof_samples = parse_num(&self.file, *line_no, tail)?,
                "fNumber" => cam.f_number = parse_num(&self.file, *line_no, tail)?,
                "focalPlaneDist" => cam.focal_plane_dist = parse_num(&self.file, *line_no, tail)?,
                "stereoSeparation" => {
                    cam.stereo_separation = parse_num(&self.file, *line_no, tail)?
                }
                "leftMask" => cam.left_mask = parse_color(&self.file, *line_no, tail)?,
                "rightMask" => cam.right_mask = parse_color(&self.file, *line_no, tail)?,
                other => log::warn!("{}:{}: unknown property `{}`", self.file, line_no, other),
            }
        }
        Ok(())
    }

    fn build_geometry(&mut self, block: &Block) -> SceneResult<Geometry> {
        match block.class.as_str() {
            "Plane" => Ok(Geometry::Plane {
                y: self.get_double(block, "y")?.unwrap_or(0.0),
                limit: self.get_double(block, "limit")?.unwrap_or(1e6),
            }),
            "Sphere" => Ok(Geometry::Sphere {
                center: self
                    .get_vector(block, "center")?
                    .or(self.get_vector(block, "O")?)
                    .unwrap_or(Vec3::ZERO),
                radius: self
                    .get_double(block, "radius")?
                    .or(self.get_double(block, "R")?)
                    .unwrap_or(1.0),
            }),
            "Cube" => Ok(Geometry::Cube {
                center: self
                    .get_vector(block, "center")?
                    .or(self.get_vector(block, "O")?)
                    .unwrap_or(Vec3::ZERO),
                half_side: self.get_double(block, "halfSide")?.unwrap_or(0.5),
            }),
            "CsgPlus" | "CsgAnd" | "CsgMinus" => {
                let op = match block.class.as_str() {
                    "CsgPlus" => CsgOp::Plus,
                    "CsgAnd" => CsgOp::And,
                    _ => CsgOp::Minus,
                };
                let left = self.resolve_csg_child(block, "left")?;
                let right = self.resolve_csg_child(block, "right")?;
                Ok(Geometry::Csg { op, left, right })
            }
            "Mesh" => {
                let path = self.require_filename(block, "file")?;
                let mut mesh = Mesh::load_obj(&path)?;
                if let Some(v) = self.get_bool(block, "faceted")? {
                    mesh.faceted = v;
                }
                if let Some(v) = self.get_bool(block, "backfaceCulling")? {
                    mesh.backface_culling = v;
                }
                if let Some(v) = self.get_bool(block, "useKDTree")? {
                    mesh.use_kd = v;
                }
                if let Some(name) = self.get_string(block, "bumpMap") {
                    mesh.bump = Some(self.resolve_texture(block, &name)?);
                }
                Ok(Geometry::Mesh(mesh))
            }
            _ => unreachable!(),
        }
    }

    fn build_texture(&mut self, block: &Block) -> SceneResult<Texture> {
        match block.class.as_str() {
            "CheckerTexture" => Ok(Texture::Checker {
                color1: self
                    .get_color(block, "color1")?
                    .unwrap_or(Color::splat(0.7)),
                color2: self
                    .get_color(block, "color2")?
                    .unwrap_or(Color::splat(0.2)),
                scaling: self.get_double(block, "scaling")?.unwrap_or(1.0),
            }),
            "BitmapTexture" => Ok(Texture::Bitmap {
                bitmap: Bitmap::load_image(&self.require_filename(block, "file")?)?,
                scaling: self.get_double(block, "scaling")?.unwrap_or(1.0),
            }),
            "BumpTexture" => Ok(Texture::Bump {
                bitmap: Bitmap::load_image(&self.require_filename(block, "file")?)?,
                scaling: self.get_double(block, "scaling")?.unwrap_or(1.0),
                strength: self.get_double(block, "strength")?.unwrap_or(1.0) as f32,
            }),
            "Fresnel" => Ok(Texture::Fresnel {
                ior: self.get_double(block, "ior")?.unwrap_or(1.33),
            }),
            _ => unreachable!(),
        }
    }

    fn build_shader(&mut self, block: &Block) -> SceneResult<Shader> {
        match block.class.as_str() {
            "Const" => Ok(Shader::Constant {
                color: self.get_color(block, "color")?.unwrap_or(Color::RED),
            }),
            "Lambert" => Ok(Shader::Lambert {
                color: self.get_color(block, "color")?.unwrap_or(Color::WHITE),
                texture: self.get_texture_ref(block, "texture")?,
            }),
            "Phong" => Ok(Shader::Phong {
                color: self.get_color(block, "color")?.unwrap_or(Color::WHITE),
                texture: self.get_texture_ref(block, "texture")?,
                exponent: self.get_double(block, "exponent")?.unwrap_or(10.0),
                specular: self
                    .get_color(block, "specularColor")?
                    .unwrap_or(Color::WHITE),
                specular_multiplier: self
                    .get_double(block, "specularMultiplier")?
                    .unwrap_or(1.0) as f32,
            }),
            "Refl" => Ok(Shader::Reflection {
                multiplier: self.get_double(block, "multiplier")?.unwrap_or(1.0) as f32,
                glossiness: self
                    .get_double(block, "glossiness")?
                    .unwrap_or(1.0)
                    .clamp(0.0, 1.0),
                num_samples: self.get_int(block, "numSamples")?.unwrap_or(32).max(1) as u32,
                deflection_scaling: 0.0,
            }),
            "Refr" => Ok(Shader::Refraction {
                ior: self.get_double(block, "ior")?.unwrap_or(1.33),
                multiplier: self.get_double(block, "multiplier")?.unwrap_or(1.0) as f32,
            }),
            "Layered" => {
                let mut layers = Vec::new();
                for (line_no, head, tail) in &block.lines {
                    if head != "layer" {
                        continue;
                    }
                    if layers.len() == MAX_LAYERS {
                        return Err(self.error(*line_no, "too many layers"));
                    }
                    layers.push(self.parse_layer(*line_no, tail)?);
                }
                Ok(Shader::Layered { layers })
            }
            _ => unreachable!(),
        }
    }

    /// A layer line reads `layer <shader>, (r, g, b)[, <texture>]`.
    fn parse_layer(&self, line_no: usize, tail: &str) -> SceneResult<Layer> {
        let tokens = clean_tokens(tail);
        if tokens.len() < 4 {
            return Err(self.error(
                line_no,
                "expected `layer <shader>, <color>[, <texture>]`",
            ));
        }
        let shader = *self
            .shader_names
            .get(tokens[0])
            .ok_or_else(|| self.error(line_no, format!("no shader named `{}`", tokens[0])))?;
        let opacity = Color::new(
            parse_num(&self.file, line_no, tokens[1])?,
            parse_num(&self.file, line_no, tokens[2])?,
            parse_num(&self.file, line_no, tokens[3])?,
        );
        let texture = match tokens.get(4) {
            Some(&name) if name != "NULL" => Some(self.resolve_texture_name(line_no, name)?),
            _ => None,
        };
        Ok(Layer {
            shader,
            opacity,
            texture,
        })
    }

    fn fill_node(&mut self, block: &Block, name: Option<String>) -> SceneResult<()> {
        let geometry_name = self
            .get_string(block, "geometry")
            .ok_or_else(|| self.error(block.header_line, "missing required property `geometry`"))?;
        let geometry = *self.geometry_names.get(&geometry_name).ok_or_else(|| {
            self.error(
                block.header_line,
                format!("no geometry named `{geometry_name}`"),
            )
        })?;

        let shader = match self.get_string(block, "shader") {
            Some(shader_name) => Some(*self.shader_names.get(&shader_name).ok_or_else(|| {
                self.error(
                    block.header_line,
                    format!("no shader named `{shader_name}`"),
                )
            })?),
            None => None,
        };

        let bump = self.get_texture_ref(block, "bump")?;

        let mut transform = Transform::identity();
        self.get_transform(block, &mut transform)?;

        let node = Node {
            geometry,
            shader,
            transform,
            bump,
        };
        if node.shader.is_some() {
            self.scene.nodes.push(node);
        } else {
            // a node without a shader is a super-node: only CSG uses it
            let id = self.scene.super_nodes.len();
            self.scene.super_nodes.push(node);
            if let Some(name) = name {
                self.super_node_names.insert(name, id);
            }
        }
        Ok(())
    }

    // ---- property access helpers -------------------------------------

    fn find_line<'b>(&self, block: &'b Block, name: &str) -> Option<&'b (usize, String, String)> {
        block.lines.iter().find(|(_, head, _)| head == name)
    }

    fn get_double(&self, block: &Block, name: &str) -> SceneResult<Option<f64>> {
        match self.find_line(block, name) {
            Some((line_no, _, tail)) => Ok(Some(parse_num(&self.file, *line_no, tail)?)),
            None => Ok(None),
        }
    }

    fn get_int(&self, block: &Block, name: &str) -> SceneResult<Option<i64>> {
        match self.find_line(block, name) {
            Some((line_no, _, tail)) => Ok(Some(parse_num(&self.file, *line_no, tail)?)),
            None => Ok(None),
        }
    }

    fn get_bool(&self, block: &Block, name: &str) -> SceneResult<Option<bool>> {
        match self.find_line(block, name) {
            Some((line_no, _, tail)) => Ok(Some(parse_bool(&self.file, *line_no, tail)?)),
            None => Ok(None),
        }
    }

    fn get_color(&self, block: &Block, name: &str) -> SceneResult<Option<Color>> {
        match self.find_line(block, name) {
            Some((line_no, _, tail)) => Ok(Some(parse_color(&self.file, *line_no, tail)?)),
            None => Ok(None),
        }
    }

    fn get_vector(&self, block: &Block, name: &str) -> SceneResult<Option<Vec3>> {
        match self.find_line(block, name) {
            Some((line_no, _, tail)) => Ok(Some(parse_vector(&self.file, *line_no, tail)?)),
            None => Ok(None),
        }
    }

    fn get_string(&self, block: &Block, name: &str) -> Option<String> {
        self.find_line(block, name).map(|(_, _, tail)| tail.clone())
    }

    fn require<T>(&self, block: &Block, name: &str, value: Option<T>) -> SceneResult<T> {
        value.ok_or_else(|| {
            self.error(
                block.header_line,
                format!("missing required property `{name}`"),
            )
        })
    }

    /// Resolve a filename property against the scene directory; the file
    /// must exist.
    fn require_filename(&self, block: &Block, name: &str) -> SceneResult<PathBuf> {
        let raw = self
            .get_string(block, name)
            .ok_or_else(|| {
                self.error(
                    block.header_line,
                    format!("missing required property `{name}`"),
                )
            })?;
        let path = self.base_dir.join(raw);
        if !path.exists() {
            return Err(SceneError::AssetNotFound(path));
        }
        Ok(path)
    }

    fn get_texture_ref(&self, block: &Block, name: &str) -> SceneResult<Option<usize>> {
        match self.find_line(block, name) {
            Some((line_no, _, tail)) => {
                Ok(Some(self.resolve_texture_name(*line_no, tail)?))
            }
            None => Ok(None),
        }
    }

    fn resolve_texture(&self, block: &Block, name: &str) -> SceneResult<usize> {
        self.resolve_texture_name(block.header_line, name)
    }

    fn resolve_texture_name(&self, line_no: usize, name: &str) -> SceneResult<usize> {
        self.texture_names
            .get(name)
            .copied()
            .ok_or_else(|| self.error(line_no, format!("no texture named `{name}`")))
    }

    /// A CSG operand name resolves to a geometry first, then to a
    /// super-node.
    fn resolve_csg_child(&self, block: &Block, name: &str) -> SceneResult<CsgChild> {
        let target = self.get_string(block, name).ok_or_else(|| {
            self.error(
                block.header_line,
                format!("missing required property `{name}`"),
            )
        })?;
        if let Some(&id) = self.geometry_names.get(&target) {
            return Ok(CsgChild::Geometry(id));
        }
        if let Some(&id) = self.super_node_names.get(&target) {
            return Ok(CsgChild::SuperNode(id));
        }
        Err(self.error(
            block.header_line,
            format!("no geometry or super-node named `{target}`"),
        ))
    }

    /// Apply all scale/rotate/translate lines to a transform, in the
    /// order they were declared.
    fn get_transform(&self, block: &Block, t: &mut Transform) -> SceneResult<()> {
        for (line_no, head, tail) in &block.lines {
            match head.as_str() {
                "scale" => {
                    let v = parse_vector(&self.file, *line_no, tail)?;
                    t.scale(v.x, v.y, v.z);
                }
                "rotate" => {
                    let v = parse_vector(&self.file, *line_no, tail)?;
                    t.rotate(v.x, v.y, v.z);
                }
                "translate" => {
                    let v = parse_vector(&self.file, *line_no, tail)?;
                    t.translate(v);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Warn about property names no consumer recognized. Transform and
    /// reference properties are shared across classes, so the check is a
    /// plain allowlist per class.
    fn warn_unknown(&self, block: &Block) {
        let known: &[&str] = match block.class.as_str() {
            "Plane" => &["y", "limit"],
            "Sphere" => &["center", "O", "radius", "R"],
            "Cube" => &["center", "O", "halfSide"],
            "CsgPlus" | "CsgAnd" | "CsgMinus" => &["left", "right"],
            "Mesh" => &["file", "faceted", "backfaceCulling", "useKDTree", "bumpMap"],
            "CheckerTexture" => &["color1", "color2", "scaling"],
            "BitmapTexture" => &["file", "scaling"],
            "BumpTexture" => &["file", "scaling", "strength"],
            "Fresnel" => &["ior"],
            "Const" => &["color"],
            "Lambert" => &["color", "texture"],
            "Phong" => &[
                "color",
                "texture",
                "exponent",
                "specularColor",
                "specularMultiplier",
            ],
            "Refl" => &["multiplier", "glossiness", "numSamples"],
            "Refr" => &["ior", "multiplier"],
            "Layered" => &["layer"],
            "Node" => &["geometry", "shader", "bump", "scale", "rotate", "translate"],
            "PointLight" => &["pos", "color", "power"],
            "RectLight" => &[
                "color",
                "power",
                "xSubd",
                "ySubd",
                "scale",
                "rotate",
                "translate",
            ],
            "CubemapEnvironment" => &["folder"],
            _ => return,
        };
        for (line_no, head, _) in &block.lines {
            if !known.contains(&head.as_str()) {
                log::warn!("{}:{}: unknown property `{}`", self.file, line_no, head);
            }
        }
    }

    /// Replace `randfloat(a,b)` and `randint(a,b)` with generated values.
    fn substitute_randoms(&mut self, line: &str, line_no: usize) -> SceneResult<String> {
        let mut out = line.to_string();
        loop {
            let (start, is_int) = match (out.find("randfloat("), out.find("randint(")) {
                (Some(f), Some(i)) if i < f => (i, true),
                (Some(f), _) => (f, false),
                (None, Some(i)) => (i, true),
                (None, None) => break,
            };
            let open = start + if is_int { "randint".len() } else { "randfloat".len() };
            let close = out[open..]
                .find(')')
                .map(|c| c + open)
                .ok_or_else(|| self.error(line_no, "unterminated random substitution"))?;
            let args: Vec<&str> = out[open + 1..close].split(',').map(str::trim).collect();
            if args.len() != 2 {
                return Err(self.error(line_no, "random substitution takes two arguments"));
            }
            let replacement = if is_int {
                let a: i64 = parse_num(&self.file, line_no, args[0])?;
                let b: i64 = parse_num(&self.file, line_no, args[1])?;
                self.rng.randint(a, b).to_string()
            } else {
                let a: f64 = parse_num(&self.file, line_no, args[0])?;
                let b: f64 = parse_num(&self.file, line_no, args[1])?;
                format!("{}", a + (b - a) * self.rng.randdouble())
            };
            out.replace_range(start..close + 1, &replacement);
        }
        Ok(out)
    }
}

// ---- low-level value parsing -----------------------------------------

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// Split a value, dropping the punctuation of vector/color literals.
fn clean_tokens(s: &str) -> Vec<&str> {
    s.split(|c: char| c.is_whitespace() || c == '(' || c == ')' || c == ',')
        .filter(|t| !t.is_empty())
        .collect()
}

fn parse_error(file: &str, line: usize, message: String) -> SceneError {
    SceneError::Parse {
        file: file.to_string(),
        line,
        message,
    }
}

fn parse_num<T: std::str::FromStr>(file: &str, line_no: usize, s: &str) -> SceneResult<T> {
    s.trim()
        .parse::<T>()
        .map_err(|_| parse_error(file, line_no, format!("cannot parse `{s}` as a number")))
}

fn parse_bool(file: &str, line_no: usize, s: &str) -> SceneResult<bool> {
    match s.trim() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => Err(parse_error(
            file,
            line_no,
            format!("cannot parse `{other}` as a boolean"),
        )),
    }
}

fn parse_triple(file: &str, line_no: usize, s: &str) -> SceneResult<(f64, f64, f64)> {
    let tokens = clean_tokens(s);
    if tokens.len() != 3 {
        return Err(parse_error(
            file,
            line_no,
            format!("expected three numbers, got `{s}`"),
        ));
    }
    Ok((
        parse_num(file, line_no, tokens[0])?,
        parse_num(file, line_no, tokens[1])?,
        parse_num(file, line_no, tokens[2])?,
    ))
}

fn parse_vector(file: &str, line_no: usize, s: &str) -> SceneResult<Vec3> {
    let (x, y, z) = parse_triple(file, line_no, s)?;
    Ok(Vec3::new(x, y, z))
}

fn parse_color(file: &str, line_no: usize, s: &str) -> SceneResult<Color> {
    let (r, g, b) = parse_triple(file, line_no, s)?;
    Ok(Color::new(r as f32, g as f32, b as f32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;

    fn parse(text: &str) -> SceneResult<Scene> {
        parse_scene_text(text, "test.fray", Path::new("."))
    }

    #[test]
    fn test_minimal_scene() {
        let scene = parse(
            r#"
            GlobalSettings {
                frameWidth 320
                frameHeight 240
                ambientLight (0.1, 0.1, 0.1)
                gi off
            }

            Camera cam {
                pos (0, 10, -20)
                yaw 5
                fov 90
            }

            Sphere ball {
                center (0, 2, 0)
                radius 1.5
            }

            Lambert gray {
                color (0.5, 0.5, 0.5)
            }

            Node ballNode {
                geometry ball
                shader gray
                translate (1, 0, 0)
            }

            PointLight sun {
                pos (0, 100, 0)
                color (1, 1, 1)
                power 2000
            }
            "#,
        )
        .unwrap();

        assert_eq!(scene.settings.frame_width, 320);
        assert_eq!(scene.settings.frame_height, 240);
        assert!(!scene.settings.gi);
        assert_eq!(scene.camera.pos, Vec3::new(0.0, 10.0, -20.0));
        assert_eq!(scene.geometries.len(), 1);
        assert!(matches!(scene.geometries[0], Geometry::Sphere { .. }));
        assert_eq!(scene.shaders.len(), 1);
        assert_eq!(scene.nodes.len(), 1);
        assert_eq!(scene.lights.len(), 1);
    }

    #[test]
    fn test_unresolved_reference_fails_with_line() {
        let err = parse(
            r#"
            Node broken {
                geometry nothing
            }
            "#,
        )
        .unwrap_err();
        match err {
            SceneError::Parse { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("geometry"), "{message}");
            }
            other => panic!("expected a parse error, got {other}"),
        }
    }

    #[test]
    fn test_missing_required_property() {
        let err = parse("PointLight l {\n color (1,1,1)\n}\n").unwrap_err();
        assert!(matches!(err, SceneError::Parse { .. }));
        assert!(err.to_string().contains("pos"));
    }

    #[test]
    fn test_unknown_class_fails() {
        let err = parse("Teapot t {\n}\n").unwrap_err();
        assert!(err.to_string().contains("Teapot"));
    }

    #[test]
    fn test_super_node_feeds_csg() {
        let scene = parse(
            r#"
            Cube box {
                halfSide 1
            }
            Sphere ball {
                radius 1.2
            }
            Node movedBall {
                geometry ball
                translate (1, 1, 1)
            }
            CsgMinus carved {
                left box
                right movedBall
            }
            Const red {
                color (1, 0, 0)
            }
            Node main {
                geometry carved
                shader red
            }
            "#,
        )
        .unwrap();
        assert_eq!(scene.super_nodes.len(), 1);
        assert_eq!(scene.nodes.len(), 1);
        match &scene.geometries[2] {
            Geometry::Csg { left, right, .. } => {
                assert!(matches!(left, CsgChild::Geometry(1.. )));
                assert!(matches!(right, CsgChild::SuperNode(0)));
            }
            other => panic!("expected csg, got {other:?}"),
        }
    }

    #[test]
    fn test_layered_shader_lines() {
        let scene = parse(
            r#"
            Const white {
                color (1, 1, 1)
            }
            Refl mirror {
                multiplier 0.9
            }
            Fresnel fr {
                ior 1.5
            }
            Layered glassy {
                layer white, (1, 1, 1)
                layer mirror, (0.5, 0.5, 0.5), fr
            }
            "#,
        )
        .unwrap();
        match &scene.shaders[2] {
            Shader::Layered { layers } => {
                assert_eq!(layers.len(), 2);
                assert_eq!(layers[0].shader, 0);
                assert!(layers[0].texture.is_none());
                assert_eq!(layers[1].shader, 1);
                assert_eq!(layers[1].texture, Some(0));
                assert_eq!(layers[1].opacity, Color::splat(0.5));
            }
            other => panic!("expected layered, got {other:?}"),
        }
    }

    #[test]
    fn test_random_substitution() {
        let scene = parse(
            r#"
            Sphere s {
                center (randfloat(-5, 5), randint(0, 10), 0)
                radius randfloat(1, 2)
            }
            "#,
        )
        .unwrap();
        match &scene.geometries[0] {
            Geometry::Sphere { center, radius } => {
                assert!((-5.0..=5.0).contains(&center.x));
                assert!((0.0..=10.0).contains(&center.y));
                assert_eq!(center.y.fract(), 0.0, "randint yields integers");
                assert!((1.0..=2.0).contains(radius));
            }
            other => panic!("expected sphere, got {other:?}"),
        }
    }

    #[test]
    fn test_comments_and_loose_braces() {
        let scene = parse(
            "// leading comment\nSphere ball // trailing\n{\n radius 2 // r\n}\n",
        )
        .unwrap();
        assert!(matches!(
            scene.geometries[0],
            Geometry::Sphere { radius, .. } if radius == 2.0
        ));
    }

    #[test]
    fn test_csg_operator_classes() {
        for (class, op) in [
            ("CsgPlus", CsgOp::Plus),
            ("CsgAnd", CsgOp::And),
            ("CsgMinus", CsgOp::Minus),
        ] {
            let scene = parse(&format!(
                "Sphere a {{\n radius 1\n}}\nSphere b {{\n radius 1\n}}\n{class} c {{\n left a\n right b\n}}\n"
            ))
            .unwrap();
            match &scene.geometries[2] {
                Geometry::Csg { op: parsed, .. } => assert_eq!(*parsed, op),
                other => panic!("expected csg, got {other:?}"),
            }
        }
    }
}
