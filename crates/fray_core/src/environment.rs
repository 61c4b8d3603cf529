//! Cubemap environment: six rasters indexed by the dominant axis of the
//! query direction.

use std::path::Path;

use fray_math::{Color, Vec3};

use crate::bitmap::Bitmap;
use crate::error::{SceneError, SceneResult};

const NEG_X: usize = 0;
const NEG_Y: usize = 1;
const NEG_Z: usize = 2;
const POS_X: usize = 3;
const POS_Y: usize = 4;
const POS_Z: usize = 5;

/// The face file names, in index order.
const FACE_NAMES: [&str; 6] = ["negx", "negy", "negz", "posx", "posy", "posz"];
const FACE_SUFFIXES: [&str; 3] = ["exr", "bmp", "png"];

#[derive(Debug, Default)]
pub struct CubemapEnvironment {
    maps: Option<Box<[Bitmap; 6]>>,
}

impl CubemapEnvironment {
    /// Load the six faces from a folder; each face tries the known image
    /// suffixes in order. All six must load for the environment to count
    /// as present.
    pub fn load_maps(folder: &Path) -> SceneResult<CubemapEnvironment> {
        let mut maps = Vec::with_capacity(6);
        for name in FACE_NAMES {
            let found = FACE_SUFFIXES
                .iter()
                .map(|ext| folder.join(format!("{name}.{ext}")))
                .find(|p| p.exists());
            match found {
                Some(path) => maps.push(Bitmap::load_image(&path)?),
                None => {
                    return Err(SceneError::AssetNotFound(
                        folder.join(format!("{name}.*")),
                    ))
                }
            }
        }
        let maps: Box<[Bitmap; 6]> = maps.try_into().expect("six faces collected");
        Ok(CubemapEnvironment { maps: Some(maps) })
    }

    /// Build from six in-memory faces, ordered -x, -y, -z, +x, +y, +z.
    pub fn from_faces(faces: [Bitmap; 6]) -> CubemapEnvironment {
        CubemapEnvironment {
            maps: Some(Box::new(faces)),
        }
    }

    /// The environment color along a direction; black when nothing is
    /// loaded.
    pub fn get_environment(&self, dir: Vec3) -> Color {
        let Some(maps) = &self.maps else {
            return Color::BLACK;
        };

        let abs = dir.abs();
        let dim = if abs.x >= abs.y && abs.x >= abs.z {
            0
        } else if abs.y >= abs.z {
            1
        } else {
            2
        };
        let on_side = dir / abs[dim];
        let face = if dir[dim] > 0.0 { 3 + dim } else { dim };

        match face {
            NEG_X => sample_side(&maps[face], on_side.z, -on_side.y),
            POS_X => sample_side(&maps[face], -on_side.z, -on_side.y),
            NEG_Y => sample_side(&maps[face], on_side.x, -on_side.z),
            POS_Y => sample_side(&maps[face], on_side.x, on_side.z),
            NEG_Z => sample_side(&maps[face], on_side.x, on_side.y),
            POS_Z => sample_side(&maps[face], on_side.x, -on_side.y),
            _ => unreachable!(),
        }
    }
}

/// Face-local lookup: both coordinates come in as [-1, 1].
fn sample_side(bmp: &Bitmap, x: f64, y: f64) -> Color {
    let ix = ((x + 1.0) / 2.0 * bmp.width() as f64) as usize;
    let iy = ((y + 1.0) / 2.0 * bmp.height() as f64) as usize;
    bmp.get_pixel(ix, iy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(color: Color) -> Bitmap {
        let mut bmp = Bitmap::new(2, 2);
        for y in 0..2 {
            for x in 0..2 {
                bmp.set_pixel(x, y, color);
            }
        }
        bmp
    }

    fn six_color_environment() -> CubemapEnvironment {
        CubemapEnvironment::from_faces([
            face(Color::new(1.0, 0.0, 0.0)), // -x
            face(Color::new(0.0, 1.0, 0.0)), // -y
            face(Color::new(0.0, 0.0, 1.0)), // -z
            face(Color::new(0.0, 1.0, 1.0)), // +x
            face(Color::new(1.0, 0.0, 1.0)), // +y
            face(Color::new(1.0, 1.0, 0.0)), // +z
        ])
    }

    #[test]
    fn test_dominant_axis_selects_face() {
        let env = six_color_environment();
        assert_eq!(env.get_environment(-Vec3::X), Color::new(1.0, 0.0, 0.0));
        assert_eq!(env.get_environment(-Vec3::Y), Color::new(0.0, 1.0, 0.0));
        assert_eq!(env.get_environment(-Vec3::Z), Color::new(0.0, 0.0, 1.0));
        assert_eq!(env.get_environment(Vec3::X), Color::new(0.0, 1.0, 1.0));
        assert_eq!(env.get_environment(Vec3::Y), Color::new(1.0, 0.0, 1.0));
        assert_eq!(env.get_environment(Vec3::Z), Color::new(1.0, 1.0, 0.0));

        // a slightly tilted direction still lands on the dominant face
        let tilted = Vec3::new(0.1, 0.2, 0.95).normalize();
        assert_eq!(env.get_environment(tilted), Color::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_unloaded_environment_is_black() {
        let env = CubemapEnvironment::default();
        assert_eq!(env.get_environment(Vec3::X), Color::BLACK);
    }
}
