//! Shader definitions and the direction-sampling side of their BRDFs.
//!
//! `eval` and `spawn_ray` are pure given a hit and an RNG; the full
//! `shade` operation recurses into the transport kernel and therefore
//! lives with the renderer.

use fray_math::{
    faceforward, orthonormal_system, refract, Color, Random, Ray, Vec3, RF_DIFFUSE,
};

use crate::geometry::IntersectionInfo;
use crate::scene::{Scene, ShaderId, TextureId};

/// Sample count used by glossy reflection once the ray has already
/// bounced, to bound the branching factor.
pub const LOW_GLOSSY_SAMPLES: u32 = 5;

/// One entry of a layered shader stack.
#[derive(Debug, Clone)]
pub struct Layer {
    pub shader: ShaderId,
    pub opacity: Color,
    pub texture: Option<TextureId>,
}

/// The maximum number of layers a Layered shader composites.
pub const MAX_LAYERS: usize = 32;

#[derive(Debug)]
pub enum Shader {
    /// Flat color, no lighting.
    Constant { color: Color },
    Lambert {
        color: Color,
        texture: Option<TextureId>,
    },
    Phong {
        color: Color,
        texture: Option<TextureId>,
        exponent: f64,
        specular: Color,
        specular_multiplier: f32,
    },
    Reflection {
        multiplier: f32,
        /// 1.0 is a perfect mirror; lower values widen the highlight.
        glossiness: f64,
        num_samples: u32,
        /// Radius of the normal-perturbation disc, derived from
        /// `glossiness` each frame.
        deflection_scaling: f64,
    },
    Refraction { ior: f64, multiplier: f32 },
    Layered { layers: Vec<Layer> },
}

/// Result of sampling a shader's BRDF at a hit point.
pub enum BrdfSample {
    /// The shader has no sampling implementation; the path tracer paints
    /// a red diagnostic pixel when it sees this.
    NotImplemented,
    /// The sampled lobe carries no energy (e.g. total internal
    /// reflection); the path ends quietly.
    Zero,
    /// A new ray with the BRDF value and the probability density of
    /// having chosen it.
    Sample {
        ray: Ray,
        brdf: Color,
        pdf: f64,
    },
}

impl Shader {
    /// Per-frame derived state: the glossy reflection disc radius.
    pub fn begin_frame(&mut self) {
        if let Shader::Reflection {
            glossiness,
            deflection_scaling,
            ..
        } = self
        {
            *deflection_scaling = 10f64.powf(2.0 - 4.0 * *glossiness);
        }
    }

    /// The shader's diffuse color at a hit (base color modulated by its
    /// texture, when one is attached).
    pub fn diffuse_color(&self, scene: &Scene, dir: Vec3, info: &IntersectionInfo) -> Color {
        match self {
            Shader::Lambert { color, texture } | Shader::Phong { color, texture, .. } => {
                match texture {
                    Some(id) => *color * scene.textures[*id].sample(dir, info),
                    None => *color,
                }
            }
            Shader::Constant { color } => *color,
            _ => Color::WHITE,
        }
    }

    /// The BRDF value for a given pair of directions, used by explicit
    /// light sampling. Delta lobes and unimplemented shaders evaluate to
    /// black (they cannot be hit by a light sample).
    pub fn eval(&self, scene: &Scene, info: &IntersectionInfo, w_in: Vec3, w_out: Vec3) -> Color {
        match self {
            Shader::Lambert { .. } => {
                let n = faceforward(w_in, info.norm);
                let cos_out = w_out.dot(n).max(0.0);
                self.diffuse_color(scene, w_in, info) * (cos_out / std::f64::consts::PI)
            }
            _ => Color::BLACK,
        }
    }

    /// Sample an outgoing direction at a hit.
    pub fn spawn_ray(
        &self,
        scene: &Scene,
        info: &IntersectionInfo,
        ray_in: &Ray,
        rng: &mut Random,
    ) -> BrdfSample {
        match self {
            Shader::Lambert { .. } => {
                let n = faceforward(ray_in.dir, info.norm);
                let (b, c) = orthonormal_system(n);

                // cosine-weighted hemisphere: uniform disc lifted to the
                // dome, pdf = cos(theta)/pi
                let r1 = rng.randdouble();
                let r2 = rng.randdouble();
                let radius = r1.sqrt();
                let angle = 2.0 * std::f64::consts::PI * r2;
                let cos_theta = (1.0 - r1).sqrt();
                let dir = b * (radius * angle.cos())
                    + c * (radius * angle.sin())
                    + n * cos_theta;

                let pdf = cos_theta / std::f64::consts::PI;
                if pdf == 0.0 {
                    return BrdfSample::Zero;
                }
                let brdf = self.diffuse_color(scene, ray_in.dir, info)
                    * (cos_theta / std::f64::consts::PI);

                let mut ray = Ray::new(info.ip + n * 1e-6, dir);
                ray.depth = ray_in.depth + 1;
                ray.flags = ray_in.flags | RF_DIFFUSE;
                BrdfSample::Sample { ray, brdf, pdf }
            }
            Shader::Reflection { multiplier, .. } => {
                let n = faceforward(ray_in.dir, info.norm);
                let mut ray = Ray::new(
                    info.ip + n * 1e-6,
                    fray_math::reflect(ray_in.dir, n),
                );
                ray.depth = ray_in.depth + 1;
                ray.flags = ray_in.flags;
                BrdfSample::Sample {
                    ray,
                    brdf: Color::splat(*multiplier),
                    pdf: 1.0,
                }
            }
            Shader::Refraction { ior, multiplier } => {
                let n = faceforward(ray_in.dir, info.norm);
                let eta = if n.dot(info.norm) > 0.0 {
                    1.0 / ior
                } else {
                    *ior
                };
                match refract(ray_in.dir, n, eta) {
                    Some(dir) => {
                        let mut ray = Ray::new(info.ip - n * 1e-6, dir);
                        ray.depth = ray_in.depth + 1;
                        ray.flags = ray_in.flags;
                        BrdfSample::Sample {
                            ray,
                            brdf: Color::splat(*multiplier),
                            pdf: 1.0,
                        }
                    }
                    None => BrdfSample::Zero,
                }
            }
            Shader::Constant { .. } | Shader::Phong { .. } | Shader::Layered { .. } => {
                BrdfSample::NotImplemented
            }
        }
    }
}
