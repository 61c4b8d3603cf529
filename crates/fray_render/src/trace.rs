//! The transport kernel: closest-hit dispatch over the scene, the
//! deterministic Whitted tracer, and the Monte-Carlo path tracer with
//! explicit light sampling.

use fray_core::{
    BrdfSample, GeomRef, IntersectionInfo, Node, Scene, ShaderId,
};
use fray_math::{Color, Random, Ray, Vec3, RF_DIFFUSE};

use crate::shade::shade;

/// Minimum path throughput; paths dimmer than this are cut off.
const PATH_INTENSITY_FLOOR: f32 = 0.01;

/// A read-only view of a prepared scene with the tracing entry points.
/// Cheap to copy around; workers share one per frame.
#[derive(Clone, Copy)]
pub struct Raytracer<'a> {
    pub scene: &'a Scene,
}

/// What the closest-hit scan found along a ray.
enum RayHit {
    Nothing,
    Light(usize),
    Surface {
        shader: ShaderId,
        info: IntersectionInfo,
    },
}

impl<'a> Raytracer<'a> {
    pub fn new(scene: &'a Scene) -> Self {
        Self { scene }
    }

    /// Is the segment between two points unobstructed by scene nodes?
    pub fn visible(&self, from: Vec3, to: Vec3) -> bool {
        let max_dist = (to - from).length();
        let ray = Ray::new(from, (to - from).normalize());
        for node in &self.scene.nodes {
            let mut info = IntersectionInfo::default();
            if node.intersect(self.scene, &ray, &mut info) && info.dist < max_dist {
                return false;
            }
        }
        true
    }

    /// Scan all nodes and lights for the nearest intersection.
    fn closest_hit(&self, ray: &Ray) -> RayHit {
        let mut best = IntersectionInfo::default();
        let mut best_node: Option<&Node> = None;

        for node in &self.scene.nodes {
            let mut info = IntersectionInfo::default();
            if node.intersect(self.scene, ray, &mut info) && info.dist < best.dist {
                best = info;
                best_node = Some(node);
            }
        }

        let mut best_light = None;
        for (idx, light) in self.scene.lights.iter().enumerate() {
            // Light::intersect only reports hits closer than info.dist
            if light.intersect(ray, &mut best) {
                best.geom = GeomRef::Light(idx);
                best_light = Some(idx);
            }
        }
        if let Some(idx) = best_light {
            return RayHit::Light(idx);
        }

        match best_node {
            Some(node) => {
                let mut info = best;
                if let Some(bump_id) = node.bump {
                    self.scene.textures[bump_id].modify_normal(&mut info);
                }
                match node.shader {
                    Some(shader) => RayHit::Surface { shader, info },
                    None => RayHit::Nothing,
                }
            }
            None => RayHit::Nothing,
        }
    }

    fn environment(&self, dir: Vec3) -> Color {
        match &self.scene.environment {
            Some(env) => env.get_environment(dir),
            None => Color::BLACK,
        }
    }

    /// Whitted-style recursive trace: deterministic except for area-light
    /// shadow jitter and glossy reflections.
    pub fn raytrace(&self, ray: &Ray, rng: &mut Random) -> Color {
        if ray.depth > self.scene.settings.max_trace_depth {
            return Color::BLACK;
        }

        match self.closest_hit(ray) {
            RayHit::Light(idx) => self.scene.lights[idx].color(),
            RayHit::Nothing => self.environment(ray.dir),
            RayHit::Surface { shader, info, .. } => shade(self, shader, ray, &info, rng),
        }
    }

    /// Monte-Carlo path trace with next-event estimation. At each diffuse
    /// vertex a light is sampled explicitly, and rays spawned by a diffuse
    /// bounce are flagged so a later direct light hit is not counted twice.
    pub fn pathtrace(&self, ray: &Ray, path_multiplier: Color, rng: &mut Random) -> Color {
        if ray.depth > self.scene.settings.max_trace_depth
            || path_multiplier.intensity() < PATH_INTENSITY_FLOOR
        {
            return Color::BLACK;
        }

        let (shader, info) = match self.closest_hit(ray) {
            RayHit::Light(idx) => {
                if ray.flags & RF_DIFFUSE != 0 {
                    // this light was already accounted for by explicit sampling
                    return Color::BLACK;
                }
                return self.scene.lights[idx].color() * path_multiplier;
            }
            RayHit::Nothing => return self.environment(ray.dir) * path_multiplier,
            RayHit::Surface { shader, info, .. } => (shader, info),
        };

        let contrib_light =
            self.explicit_light_sample(ray, &info, path_multiplier, shader, rng);

        match self.scene.shaders[shader].spawn_ray(self.scene, &info, ray, rng) {
            BrdfSample::NotImplemented => Color::RED,
            BrdfSample::Zero => contrib_light,
            BrdfSample::Sample {
                ray: new_ray,
                brdf,
                pdf,
            } => {
                let multiplier = path_multiplier * brdf * (1.0 / pdf as f32);
                contrib_light + self.pathtrace(&new_ray, multiplier, rng)
            }
        }
    }

    /// Next-event estimation: pick one light uniformly, one of its sample
    /// points, and weight the BRDF throughput by the light's solid angle
    /// and the light count.
    fn explicit_light_sample(
        &self,
        ray: &Ray,
        info: &IntersectionInfo,
        path_multiplier: Color,
        shader: ShaderId,
        rng: &mut Random,
    ) -> Color {
        let lights = &self.scene.lights;
        if lights.is_empty() {
            return Color::BLACK;
        }

        let light = &lights[rng.randint(0, lights.len() as i64 - 1) as usize];

        let solid_angle = light.solid_angle(info);
        if solid_angle == 0.0 {
            return Color::BLACK;
        }

        let sample_idx = rng.randint(0, light.num_samples() as i64 - 1) as u32;
        let (point_on_light, _) = light.nth_sample(sample_idx, info.ip, rng);

        if !self.visible(info.ip + info.norm * 1e-6, point_on_light) {
            return Color::BLACK;
        }

        let w_out = (point_on_light - info.ip).normalize();
        let brdf = self.scene.shaders[shader].eval(self.scene, info, ray.dir, w_out);
        if brdf.intensity() == 0.0 {
            return Color::BLACK;
        }

        let emitted = light.color();
        emitted * path_multiplier * brdf * (solid_angle * lights.len() as f64)
    }

    /// Trace one primary ray with whichever transport the settings ask
    /// for.
    pub fn trace(&self, ray: &Ray, rng: &mut Random) -> Color {
        if self.scene.settings.gi {
            self.pathtrace(ray, Color::WHITE, rng)
        } else {
            self.raytrace(ray, rng)
        }
    }

    /// Shade one fractional pixel position, handling depth of field and
    /// the stereoscopic left/right mask combination.
    pub fn trace_pixel(&self, x: f64, y: f64, rng: &mut Random) -> Color {
        let cam = &self.scene.camera;
        let saturation = self.scene.settings.saturation;

        if cam.stereo_separation > 0.0 {
            let left_ray = self.camera_ray(x, y, fray_core::Eye::Left, rng);
            let right_ray = self.camera_ray(x, y, fray_core::Eye::Right, rng);
            let mut left = self.trace(&left_ray, rng);
            let mut right = self.trace(&right_ray, rng);
            if saturation != 1.0 {
                left = left.adjust_saturation(saturation);
                right = right.adjust_saturation(saturation);
            }
            left * cam.left_mask + right * cam.right_mask
        } else {
            let ray = self.camera_ray(x, y, fray_core::Eye::Center, rng);
            self.trace(&ray, rng)
        }
    }

    fn camera_ray(&self, x: f64, y: f64, eye: fray_core::Eye, rng: &mut Random) -> Ray {
        let cam = &self.scene.camera;
        if cam.dof {
            cam.get_dof_ray(x, y, eye, rng)
        } else {
            cam.get_screen_ray(x, y, eye)
        }
    }
}
