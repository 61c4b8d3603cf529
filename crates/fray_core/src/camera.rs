//! The raytracing camera: primary-ray generation with optional thin-lens
//! depth of field and a stereoscopic eye offset.

use fray_math::{Color, Mat3, Random, Ray, Vec3};

/// Which eye a primary ray belongs to; `Center` is the plain monoscopic
/// camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    Center,
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub pos: Vec3,
    /// Orientation in degrees.
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    /// Horizontal field of view in degrees.
    pub fov: f64,
    pub aspect_ratio: f64,

    /// Thin-lens depth of field.
    pub dof: bool,
    pub num_dof_samples: u32,
    pub f_number: f64,
    pub focal_plane_dist: f64,

    /// Half the eye distance; zero disables stereo rendering.
    pub stereo_separation: f64,
    pub left_mask: Color,
    pub right_mask: Color,

    // screen basis, rebuilt by begin_frame
    top_left: Vec3,
    top_right: Vec3,
    bottom_left: Vec3,
    front_dir: Vec3,
    right_dir: Vec3,
    up_dir: Vec3,
    frame_width: f64,
    frame_height: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pos: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            fov: 90.0,
            aspect_ratio: 4.0 / 3.0,
            dof: false,
            num_dof_samples: 32,
            f_number: 2.0,
            focal_plane_dist: 10.0,
            stereo_separation: 0.0,
            left_mask: Color::new(1.0, 0.0, 0.0),
            right_mask: Color::new(0.0, 1.0, 1.0),
            top_left: Vec3::ZERO,
            top_right: Vec3::ZERO,
            bottom_left: Vec3::ZERO,
            front_dir: Vec3::Z,
            right_dir: Vec3::X,
            up_dir: Vec3::Y,
            frame_width: 0.0,
            frame_height: 0.0,
        }
    }
}

impl Camera {
    /// Rebuild the screen basis for a frame of the given pixel dimensions.
    /// The image plane sits one unit in front of the camera; its extents
    /// follow from the fov and the aspect ratio.
    pub fn begin_frame(&mut self, frame_width: usize, frame_height: usize) {
        self.frame_width = frame_width as f64;
        self.frame_height = frame_height as f64;

        let corner = Vec3::new(-self.aspect_ratio, 1.0, 1.0);
        let center_top = Vec3::new(0.0, 0.0, 1.0);
        let half_diag = (corner - center_top).length();
        let wanted = (self.fov.to_radians() / 2.0).tan();
        let m = wanted / half_diag;

        // negative pitch tilts the view downward
        let rotation = Mat3::from_rotation_y(self.yaw.to_radians())
            * Mat3::from_rotation_x(-self.pitch.to_radians())
            * Mat3::from_rotation_z(self.roll.to_radians());

        self.top_left = rotation * Vec3::new(-self.aspect_ratio * m, m, 1.0);
        self.top_right = rotation * Vec3::new(self.aspect_ratio * m, m, 1.0);
        self.bottom_left = rotation * Vec3::new(-self.aspect_ratio * m, -m, 1.0);
        self.front_dir = rotation * Vec3::Z;
        self.right_dir = rotation * Vec3::X;
        self.up_dir = rotation * Vec3::Y;
    }

    fn eye_position(&self, eye: Eye) -> Vec3 {
        match eye {
            Eye::Center => self.pos,
            Eye::Left => self.pos - self.right_dir * self.stereo_separation,
            Eye::Right => self.pos + self.right_dir * self.stereo_separation,
        }
    }

    /// The pinhole ray through fractional pixel coordinates (x, y).
    pub fn get_screen_ray(&self, x: f64, y: f64, eye: Eye) -> Ray {
        let dir = self.top_left
            + (self.top_right - self.top_left) * (x / self.frame_width)
            + (self.bottom_left - self.top_left) * (y / self.frame_height);
        Ray::new(self.eye_position(eye), dir.normalize())
    }

    /// A depth-of-field ray: jitter the origin across the aperture disc
    /// and aim at the pinhole ray's focal-plane crossing.
    pub fn get_dof_ray(&self, x: f64, y: f64, eye: Eye, rng: &mut Random) -> Ray {
        let pinhole = self.get_screen_ray(x, y, eye);
        let cos_theta = pinhole.dir.dot(self.front_dir);
        let target = pinhole.start + pinhole.dir * (self.focal_plane_dist / cos_theta);

        let (u, v) = rng.unit_disc_sample();
        let aperture = 10.0 / self.f_number;
        let start =
            pinhole.start + self.right_dir * (u * aperture) + self.up_dir * (v * aperture);
        Ray::new(start, (target - start).normalize())
    }
}
