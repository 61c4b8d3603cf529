// Re-export glam for convenience. Geometry runs in double precision;
// colors stay single precision (see `color`).
pub use glam::{DMat3 as Mat3, DVec2 as Vec2, DVec3 as Vec3};

mod bbox;
mod color;
mod random;
mod ray;
mod transform;
mod triangle;
mod util;

pub use bbox::{Axis, BBox};
pub use color::Color;
pub use random::Random;
pub use ray::{Ray, SlabRay, RF_DEBUG, RF_DIFFUSE};
pub use transform::Transform;
pub use triangle::intersect_triangle;
pub use util::{faceforward, orthonormal_system, reflect, refract};
