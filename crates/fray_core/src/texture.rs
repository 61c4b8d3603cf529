//! Procedural and image-based textures. Texture lookups are pure; the
//! bump variant differentiates its raster once before rendering.

use fray_math::{Color, Vec3};

use crate::bitmap::Bitmap;
use crate::geometry::IntersectionInfo;

#[derive(Debug)]
pub enum Texture {
    /// Alternating squares of two colors over (u, v), `scaling` squares
    /// per unit.
    Checker {
        color1: Color,
        color2: Color,
        scaling: f64,
    },
    /// Nearest-pixel raster lookup with repeat wrapping.
    Bitmap { bitmap: Bitmap, scaling: f64 },
    /// View-dependent Schlick reflectance for the given index of
    /// refraction; grayscale, typically driving a Layered shader.
    Fresnel { ior: f64 },
    /// Normal perturbation map; `bitmap` holds intensity gradients after
    /// `begin_render`.
    Bump {
        bitmap: Bitmap,
        scaling: f64,
        strength: f32,
    },
}

impl Texture {
    /// One-time preprocessing before rendering starts.
    pub fn begin_render(&mut self) {
        if let Texture::Bump { bitmap, .. } = self {
            bitmap.differentiate();
        }
    }

    /// Sample the texture color for a hit produced by a ray traveling
    /// along `dir` (only the Fresnel variant looks at the direction).
    pub fn sample(&self, dir: Vec3, info: &IntersectionInfo) -> Color {
        match self {
            Texture::Checker {
                color1,
                color2,
                scaling,
            } => {
                let ix = (info.u * scaling).floor() as i64;
                let iy = (info.v * scaling).floor() as i64;
                if (ix + iy) % 2 == 0 {
                    *color1
                } else {
                    *color2
                }
            }
            Texture::Bitmap { bitmap, scaling } => {
                let (x, y) = wrap_raster_coords(bitmap, info.u * scaling, info.v * scaling);
                bitmap.get_pixel(x, y)
            }
            Texture::Fresnel { ior } => {
                let (n, eta) = if dir.dot(info.norm) < 0.0 {
                    (info.norm, *ior)
                } else {
                    (-info.norm, 1.0 / ior)
                };
                let f = schlick_fresnel(dir, n, eta);
                Color::splat(f)
            }
            Texture::Bump { .. } => Color::BLACK,
        }
    }

    /// Bump deflection (dx, dy) at the hit's uv, already scaled by the
    /// bump strength. Zero for every other variant.
    pub fn deflection(&self, info: &IntersectionInfo) -> (f32, f32) {
        match self {
            Texture::Bump {
                bitmap,
                scaling,
                strength,
            } => {
                let (x, y) = wrap_raster_coords(bitmap, info.u * scaling, info.v * scaling);
                let grad = bitmap.get_pixel(x, y);
                (grad.r * strength, grad.g * strength)
            }
            _ => (0.0, 0.0),
        }
    }

    /// Perturb a shading normal along the hit's tangent frame.
    pub fn modify_normal(&self, info: &mut IntersectionInfo) {
        let (dx, dy) = self.deflection(info);
        if dx != 0.0 || dy != 0.0 {
            info.norm =
                (info.norm + info.dndx * dx as f64 + info.dndy * dy as f64).normalize();
        }
    }
}

/// Map scaled uv coordinates onto raster pixels with modular wrapping
/// (negative coordinates wrap from the far edge).
fn wrap_raster_coords(bitmap: &Bitmap, u: f64, v: f64) -> (usize, usize) {
    let w = bitmap.width() as i64;
    let h = bitmap.height() as i64;
    let x = ((u * bitmap.width() as f64).floor() as i64).rem_euclid(w);
    let y = ((v * bitmap.height() as f64).floor() as i64).rem_euclid(h);
    (x as usize, y as usize)
}

/// Schlick's approximation of the Fresnel reflectance.
fn schlick_fresnel(i: Vec3, n: Vec3, ior: f64) -> f32 {
    let f0 = (((1.0 - ior) / (1.0 + ior)) as f32).powi(2);
    let ndoti = (-n.dot(i)) as f32;
    f0 + (1.0 - f0) * (1.0 - ndoti).powi(5)
}
