use crate::Vec3;

/// Flip `n` so it opposes the incident direction `i`.
#[inline]
pub fn faceforward(i: Vec3, n: Vec3) -> Vec3 {
    if i.dot(n) < 0.0 {
        n
    } else {
        -n
    }
}

/// Reflect an incident direction about a normal.
#[inline]
pub fn reflect(i: Vec3, n: Vec3) -> Vec3 {
    i - n * (2.0 * i.dot(n))
}

/// Refract an incident direction through a surface with the given index
/// ratio. Returns None on total internal reflection.
pub fn refract(i: Vec3, n: Vec3, ior: f64) -> Option<Vec3> {
    let ndoti = n.dot(i);
    let k = 1.0 - ior * ior * (1.0 - ndoti * ndoti);
    if k < 0.0 {
        return None;
    }
    Some((i * ior - n * (ior * ndoti + k.sqrt())).normalize())
}

/// Complete a unit vector into a right-handed orthonormal basis (b, c).
pub fn orthonormal_system(n: Vec3) -> (Vec3, Vec3) {
    let pick = if n.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
    let b = n.cross(pick).normalize();
    let c = n.cross(b);
    (b, c)
}
