//! Deterministic (Whitted-style) shader evaluation. These routines
//! recurse back into the tracer for reflected and refracted rays, which
//! is why they live here rather than with the shader definitions.

use fray_core::shading::LOW_GLOSSY_SAMPLES;
use fray_core::{IntersectionInfo, Shader, ShaderId};
use fray_math::{
    faceforward, orthonormal_system, reflect, refract, Color, Random, Ray, Vec3,
};

use crate::trace::Raytracer;

/// Evaluate the outgoing radiance toward the ray origin for a surface hit.
pub fn shade(
    rt: &Raytracer,
    shader_id: ShaderId,
    ray: &Ray,
    info: &IntersectionInfo,
    rng: &mut Random,
) -> Color {
    let scene = rt.scene;
    match &scene.shaders[shader_id] {
        Shader::Constant { color } => *color,

        Shader::Lambert { .. } => {
            direct_lighting(rt, shader_id, ray, info, rng, |_, _, _| Color::BLACK)
        }

        Shader::Phong {
            exponent,
            specular,
            specular_multiplier,
            ..
        } => direct_lighting(rt, shader_id, ray, info, rng, |to_light, n, light_color| {
            // mirror the light about the normal and measure how well it
            // lines up with the eye direction
            let r = reflect(-to_light, n);
            let cos_reflection = (-ray.dir).dot(r);
            if cos_reflection > 0.0 {
                light_color * *specular * (cos_reflection.powf(*exponent) as f32)
                    * *specular_multiplier
            } else {
                Color::BLACK
            }
        }),

        Shader::Reflection {
            multiplier,
            glossiness,
            num_samples,
            deflection_scaling,
        } => {
            let n = faceforward(ray.dir, info.norm);

            if *glossiness == 1.0 {
                let mut new_ray = Ray::new(info.ip + n * 1e-6, reflect(ray.dir, n));
                new_ray.depth = ray.depth + 1;
                new_ray.flags = ray.flags;
                return rt.raytrace(&new_ray, rng) * *multiplier;
            }

            let (b, c) = orthonormal_system(n);
            let samples = if ray.depth == 0 {
                *num_samples
            } else {
                LOW_GLOSSY_SAMPLES
            };
            let mut sum = Color::BLACK;
            for _ in 0..samples {
                // perturb the normal within a disc whose radius encodes the
                // glossiness, rejecting directions that dive under the surface
                let reflected = loop {
                    let (x, y) = rng.unit_disc_sample();
                    let perturbed =
                        (n + b * (x * deflection_scaling) + c * (y * deflection_scaling))
                            .normalize();
                    let reflected = reflect(ray.dir, perturbed);
                    if reflected.dot(n) > 0.0 {
                        break reflected;
                    }
                };
                let mut new_ray = Ray::new(info.ip + n * 1e-6, reflected);
                new_ray.depth = ray.depth + 1;
                new_ray.flags = ray.flags;
                sum += rt.raytrace(&new_ray, rng) * *multiplier;
            }
            sum / samples as f32
        }

        Shader::Refraction { ior, multiplier } => {
            let n = faceforward(ray.dir, info.norm);
            let eta = if n.dot(info.norm) > 0.0 {
                // entering the medium
                1.0 / ior
            } else {
                *ior
            };
            match refract(ray.dir, n, eta) {
                Some(refracted) => {
                    let mut new_ray = Ray::new(info.ip - n * 1e-6, refracted);
                    new_ray.depth = ray.depth + 1;
                    new_ray.flags = ray.flags;
                    rt.raytrace(&new_ray, rng) * *multiplier
                }
                // total internal reflection carries nothing through
                None => Color::BLACK,
            }
        }

        Shader::Layered { layers } => {
            let mut result = Color::BLACK;
            for layer in layers {
                let opacity = match layer.texture {
                    Some(id) => scene.textures[id].sample(ray.dir, info),
                    None => layer.opacity,
                };
                result = shade(rt, layer.shader, ray, info, rng) * opacity
                    + (Color::WHITE - opacity) * result;
            }
            result
        }
    }
}

/// The shared diffuse-lighting loop of Lambert and Phong: ambient plus a
/// shadow-tested sum over every light's samples. `specular` contributes
/// the extra per-sample term of glossy highlights.
fn direct_lighting(
    rt: &Raytracer,
    shader_id: ShaderId,
    ray: &Ray,
    info: &IntersectionInfo,
    rng: &mut Random,
    specular: impl Fn(Vec3, Vec3, Color) -> Color,
) -> Color {
    let scene = rt.scene;
    let shader = &scene.shaders[shader_id];
    let diffuse = shader.diffuse_color(scene, ray.dir, info);
    let mut result = diffuse * scene.settings.ambient_light;

    let n = faceforward(ray.dir, info.norm);

    for light in &scene.lights {
        let num_samples = light.num_samples();
        let mut sum = Color::BLACK;
        for sample_idx in 0..num_samples {
            let (light_pos, light_color) = light.nth_sample(sample_idx, info.ip, rng);
            if light_color.intensity() == 0.0 {
                continue;
            }
            let light_dist_sqr = (info.ip - light_pos).length_squared();
            let to_light = (light_pos - info.ip).normalize();

            let lambert = (to_light.dot(n) / light_dist_sqr).max(0.0);
            if !rt.visible(info.ip + n * 1e-6, light_pos) {
                continue;
            }
            sum += diffuse * light_color * lambert;
            sum += specular(to_light, n, light_color / light_dist_sqr as f32);
        }
        result += sum / num_samples as f32;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use fray_core::{Geometry, Layer, Light, Node, Scene};
    use fray_math::Vec3;

    fn hit() -> IntersectionInfo {
        IntersectionInfo {
            ip: Vec3::ZERO,
            norm: Vec3::Y,
            dist: 1.0,
            ..Default::default()
        }
    }

    fn eye_ray() -> Ray {
        Ray::new(Vec3::new(0.0, 2.0, 0.0), -Vec3::Y)
    }

    #[test]
    fn test_layered_with_one_opaque_layer_is_that_layer() {
        let mut scene = Scene::default();
        scene.shaders.push(Shader::Constant {
            color: Color::new(1.0, 0.2, 0.2),
        });
        scene.shaders.push(Shader::Constant {
            color: Color::new(0.1, 0.9, 0.3),
        });
        scene.shaders.push(Shader::Layered {
            layers: vec![
                Layer {
                    shader: 0,
                    opacity: Color::BLACK,
                    texture: None,
                },
                Layer {
                    shader: 1,
                    opacity: Color::WHITE,
                    texture: None,
                },
            ],
        });
        let rt = Raytracer::new(&scene);
        let mut rng = Random::new(1);
        let result = shade(&rt, 2, &eye_ray(), &hit(), &mut rng);
        assert_eq!(result, Color::new(0.1, 0.9, 0.3));
    }

    #[test]
    fn test_layered_blends_by_opacity() {
        let mut scene = Scene::default();
        scene.shaders.push(Shader::Constant {
            color: Color::new(1.0, 0.0, 0.0),
        });
        scene.shaders.push(Shader::Constant {
            color: Color::new(0.0, 1.0, 0.0),
        });
        scene.shaders.push(Shader::Layered {
            layers: vec![
                Layer {
                    shader: 0,
                    opacity: Color::WHITE,
                    texture: None,
                },
                Layer {
                    shader: 1,
                    opacity: Color::splat(0.25),
                    texture: None,
                },
            ],
        });
        let rt = Raytracer::new(&scene);
        let mut rng = Random::new(1);
        let result = shade(&rt, 2, &eye_ray(), &hit(), &mut rng);
        assert_eq!(result, Color::new(0.75, 0.25, 0.0));
    }

    #[test]
    fn test_lambert_shadowed_point_gets_only_ambient() {
        let mut scene = Scene::default();
        scene.settings.ambient_light = Color::splat(0.1);
        scene.shaders.push(Shader::Lambert {
            color: Color::WHITE,
            texture: None,
        });
        // a blocker between the shading point and the light
        scene.geometries.push(Geometry::Sphere {
            center: Vec3::new(0.0, 5.0, 0.0),
            radius: 1.0,
        });
        scene.nodes.push(Node::new(0, 0));
        scene
            .lights
            .push(Light::point(Vec3::new(0.0, 10.0, 0.0), Color::WHITE, 100.0));
        scene.begin_render();
        scene.begin_frame();

        let rt = Raytracer::new(&scene);
        let mut rng = Random::new(1);
        let result = shade(&rt, 0, &eye_ray(), &hit(), &mut rng);
        assert_eq!(result, Color::splat(0.1));
    }

    #[test]
    fn test_phong_highlight_beats_plain_lambert() {
        let build = |specular_multiplier: f32| {
            let mut scene = Scene::default();
            scene.shaders.push(Shader::Phong {
                color: Color::splat(0.5),
                texture: None,
                exponent: 16.0,
                specular: Color::WHITE,
                specular_multiplier,
            });
            scene
                .lights
                .push(Light::point(Vec3::new(0.0, 4.0, 0.0), Color::WHITE, 8.0));
            scene.begin_render();
            scene.begin_frame();
            scene
        };

        // the eye ray runs straight down the light's mirror direction
        let mut rng = Random::new(1);
        let shiny = build(1.0);
        let with_highlight = shade(&Raytracer::new(&shiny), 0, &eye_ray(), &hit(), &mut rng);
        let matte = build(0.0);
        let without = shade(&Raytracer::new(&matte), 0, &eye_ray(), &hit(), &mut rng);
        assert!(with_highlight.intensity() > without.intensity());
    }
}
