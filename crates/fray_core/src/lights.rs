//! Light sources: the point light (a Dirac source) and the rectangular
//! area light (a unit square in its own local space, shining down -y).

use fray_math::{Color, Random, Ray, Transform, Vec3};

use crate::geometry::IntersectionInfo;

#[derive(Debug)]
pub enum Light {
    Point {
        pos: Vec3,
        color: Color,
        power: f32,
    },
    Rect {
        transform: Transform,
        xsubd: u32,
        ysubd: u32,
        color: Color,
        power: f32,
        /// World-space center and area, cached per frame.
        center: Vec3,
        area: f64,
    },
}

impl Light {
    pub fn point(pos: Vec3, color: Color, power: f32) -> Light {
        Light::Point { pos, color, power }
    }

    pub fn rect(transform: Transform, xsubd: u32, ysubd: u32, color: Color, power: f32) -> Light {
        Light::Rect {
            transform,
            xsubd,
            ysubd,
            color,
            power,
            center: Vec3::ZERO,
            area: 0.0,
        }
    }

    /// Refresh the per-frame caches (the rect light's world center and
    /// area, which depend on its transform).
    pub fn begin_frame(&mut self) {
        if let Light::Rect {
            transform,
            center,
            area,
            ..
        } = self
        {
            *center = transform.transform_point(Vec3::ZERO);
            let w0 = transform.transform_point(Vec3::new(-0.5, 0.0, -0.5));
            let w1 = transform.transform_point(Vec3::new(0.5, 0.0, -0.5));
            let w2 = transform.transform_point(Vec3::new(-0.5, 0.0, 0.5));
            *area = (w1 - w0).cross(w2 - w0).length();
        }
    }

    /// The light's emitted energy when hit directly.
    pub fn color(&self) -> Color {
        match self {
            Light::Point { color, power, .. } => *color * *power,
            Light::Rect { color, power, .. } => *color * *power,
        }
    }

    /// How many shadow samples this light wants.
    pub fn num_samples(&self) -> u32 {
        match self {
            Light::Point { .. } => 1,
            Light::Rect { xsubd, ysubd, .. } => xsubd * ysubd,
        }
    }

    /// Generate the n-th sample: a point on the light and the energy it
    /// sends toward `shade_pos`. Stratified-jittered on the rect light; a
    /// shading point behind the lamp gets zero everything.
    pub fn nth_sample(
        &self,
        sample_idx: u32,
        shade_pos: Vec3,
        rng: &mut Random,
    ) -> (Vec3, Color) {
        match self {
            Light::Point { pos, color, power } => (*pos, *color * *power),
            Light::Rect {
                transform,
                xsubd,
                ysubd,
                color,
                power,
                area,
                ..
            } => {
                let local_shade = transform.untransform_point(shade_pos);
                if local_shade.y > 0.0 {
                    return (Vec3::ZERO, Color::BLACK);
                }

                let column = sample_idx % xsubd;
                let row = sample_idx / xsubd;
                let cell_x = 1.0 / *xsubd as f64;
                let cell_y = 1.0 / *ysubd as f64;
                let px = (column as f64 + rng.randdouble()) * cell_x;
                let py = (row as f64 + rng.randdouble()) * cell_y;

                let on_light = Vec3::new(px - 0.5, 0.0, py - 0.5);
                let sample_pos = transform.transform_point(on_light);

                // energy falls off with the angle to the lamp normal (0,-1,0)
                let to_shaded = (local_shade - on_light).normalize_or_zero();
                let cos_theta = (-to_shaded.y).max(0.0);
                (sample_pos, *color * *power * (*area * cos_theta))
            }
        }
    }

    /// The solid angle the light subtends from a shading point; zero for
    /// Dirac sources (they cannot be sampled by a random bounce) and for
    /// points behind an area light.
    pub fn solid_angle(&self, info: &IntersectionInfo) -> f64 {
        match self {
            Light::Point { .. } => 0.0,
            Light::Rect {
                transform,
                center,
                area,
                ..
            } => {
                let local = transform.untransform_point(info.ip);
                if local.y > 0.0 {
                    return 0.0;
                }
                area / (info.ip - *center).length_squared().max(1.0)
            }
        }
    }

    /// Direct ray/lamp intersection (area lights only). The lamp plane is
    /// local y = 0; rays starting behind it or moving away miss.
    pub fn intersect(&self, ray: &Ray, info: &mut IntersectionInfo) -> bool {
        match self {
            Light::Point { .. } => false,
            Light::Rect { transform, .. } => {
                let start = transform.untransform_point(ray.start);
                let dir = transform.untransform_dir(ray.dir);
                if start.y >= 0.0 || dir.y <= 0.0 {
                    return false;
                }
                let t = -start.y / dir.y;
                let p = start + dir * t;
                if p.x.abs() > 0.5 || p.z.abs() > 0.5 {
                    return false;
                }
                let ip = transform.transform_point(p);
                let dist = (ip - ray.start).length();
                if dist >= info.dist {
                    return false;
                }
                info.dist = dist;
                info.ip = ip;
                info.norm = transform.transform_dir(-Vec3::Y).normalize();
                info.u = p.x;
                info.v = p.z;
                true
            }
        }
    }
}
