use crate::{Mat3, Vec3};

/// A rigid + scale transform: a 3x3 matrix, its cached inverse, and a
/// translation offset. The inverse is refreshed by every mutator so the
/// two never drift apart.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    m: Mat3,
    inv: Mat3,
    offset: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            m: Mat3::IDENTITY,
            inv: Mat3::IDENTITY,
            offset: Vec3::ZERO,
        }
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self::default()
    }

    /// Compose a non-uniform scale onto the current transform.
    pub fn scale(&mut self, x: f64, y: f64, z: f64) {
        let s = Mat3::from_diagonal(Vec3::new(x, y, z));
        self.m = s * self.m;
        self.offset = s * self.offset;
        self.inv = self.m.inverse();
    }

    pub fn scale_uniform(&mut self, k: f64) {
        self.scale(k, k, k);
    }

    /// Compose a rotation given as yaw/pitch/roll in degrees. Roll is
    /// applied first, then pitch, then yaw.
    pub fn rotate(&mut self, yaw: f64, pitch: f64, roll: f64) {
        let r = Mat3::from_rotation_y(yaw.to_radians())
            * Mat3::from_rotation_x(pitch.to_radians())
            * Mat3::from_rotation_z(roll.to_radians());
        self.m = r * self.m;
        self.offset = r * self.offset;
        self.inv = self.m.inverse();
    }

    pub fn translate(&mut self, t: Vec3) {
        self.offset += t;
    }

    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.m * p + self.offset
    }

    #[inline]
    pub fn untransform_point(&self, p: Vec3) -> Vec3 {
        self.inv * (p - self.offset)
    }

    /// Transform a direction (no translation). Lengths are not preserved
    /// under scale; callers renormalize where it matters.
    #[inline]
    pub fn transform_dir(&self, d: Vec3) -> Vec3 {
        self.m * d
    }

    #[inline]
    pub fn untransform_dir(&self, d: Vec3) -> Vec3 {
        self.inv * d
    }
}
