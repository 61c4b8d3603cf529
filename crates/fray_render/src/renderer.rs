//! The parallel render driver: an optional coarse pre-pass, then a pool
//! of workers pulling image buckets off a shared atomic cursor.
//!
//! Scene data is immutable during the frame; the framebuffer and display
//! are the only shared mutable state, touched once per bucket under a
//! lock. Each worker owns its RNG for the whole frame, so the hot path
//! never synchronizes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use fray_core::Scene;
use fray_math::{Color, Random};

use crate::buckets::bucket_list;
use crate::framebuffer::{Display, Framebuffer, Rect};
use crate::trace::Raytracer;

/// Root seed of the per-worker RNG schedule.
const RENDER_SEED: u64 = 42;

/// Fixed low-discrepancy sub-pixel offsets used for plain antialiasing
/// (when neither depth of field nor path tracing randomizes the samples).
const AA_OFFSETS: [(f64, f64); 5] = [(0.0, 0.0), (0.6, 0.0), (0.3, 0.3), (0.0, 0.6), (0.6, 0.6)];

/// Side of the squares painted by the progressive pre-pass.
const PREPASS_SQUARE: usize = 16;

/// Render a frame. Returns the finished framebuffer; on cancellation the
/// buffer holds whatever was completed.
pub fn render(scene: &mut Scene, display: &dyn Display) -> Framebuffer {
    scene.begin_frame();
    let scene: &Scene = scene;
    let settings = &scene.settings;

    let num_threads = if settings.num_threads == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        settings.num_threads
    };

    // one engine per worker plus one for the pre-pass, all from a single
    // reproducible schedule
    let mut engines = Random::pool(RENDER_SEED, num_threads + 1);
    let mut prepass_rng = engines.pop().expect("pool is non-empty");

    let started = Instant::now();
    let fb = Mutex::new(Framebuffer::new(settings.frame_width, settings.frame_height));
    let rt = Raytracer::new(scene);

    if settings.want_prepass && !settings.interactive {
        prepass(&rt, &fb, display, &mut prepass_rng);
    }

    let buckets = bucket_list(settings.frame_width, settings.frame_height);
    let samples_per_pixel = samples_per_pixel(scene);
    let cursor = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for mut rng in engines {
            let fb = &fb;
            let buckets = &buckets;
            let cursor = &cursor;
            s.spawn(move || {
                render_buckets(rt, buckets, cursor, samples_per_pixel, fb, display, &mut rng)
            });
        }
    });

    log::info!(
        "rendered {}x{} with {} threads, {} samples/pixel in {:.2}s",
        settings.frame_width,
        settings.frame_height,
        num_threads,
        samples_per_pixel,
        started.elapsed().as_secs_f64()
    );

    fb.into_inner().expect("no worker panicked holding the lock")
}

/// The effective per-pixel sample count: antialiasing, depth of field and
/// path tracing each demand their own minimum.
fn samples_per_pixel(scene: &Scene) -> usize {
    let settings = &scene.settings;
    let mut spp = if settings.want_aa {
        AA_OFFSETS.len()
    } else {
        1
    };
    if scene.camera.dof {
        spp = spp.max(scene.camera.num_dof_samples as usize);
    }
    if settings.gi {
        spp = spp.max(settings.num_paths as usize);
    }
    spp
}

/// Coarse progressive pre-pass: one ray through the center of each square
/// tile, painted flat, so something appears on screen immediately.
fn prepass(rt: &Raytracer<'_>, fb: &Mutex<Framebuffer>, display: &dyn Display, rng: &mut Random) {
    let settings = &rt.scene.settings;
    let mut y = 0;
    while y < settings.frame_height {
        let y1 = (y + PREPASS_SQUARE).min(settings.frame_height);
        let mut x = 0;
        while x < settings.frame_width {
            let x1 = (x + PREPASS_SQUARE).min(settings.frame_width);
            let color = rt.trace_pixel((x + x1) as f64 / 2.0, (y + y1) as f64 / 2.0, rng);
            let rect = Rect::new(x, y, x1, y1);
            fb.lock().expect("framebuffer lock").fill_rect(rect, color);
            if !display.paint_region(rect, color) {
                return;
            }
            x = x1;
        }
        y = y1;
    }
}

/// The worker loop: claim buckets off the shared cursor until none are
/// left or the display requests cancellation.
fn render_buckets(
    rt: Raytracer<'_>,
    buckets: &[Rect],
    cursor: &AtomicUsize,
    samples_per_pixel: usize,
    fb: &Mutex<Framebuffer>,
    display: &dyn Display,
    rng: &mut Random,
) {
    let settings = &rt.scene.settings;
    let randomized_samples = rt.scene.camera.dof || settings.gi;

    loop {
        let bucket_id = cursor.fetch_add(1, Ordering::SeqCst);
        let Some(rect) = buckets.get(bucket_id) else {
            return;
        };

        if !settings.interactive && !display.mark_region(*rect) {
            return;
        }

        let mut local = vec![Color::BLACK; rect.width() * rect.height()];
        for y in rect.y0..rect.y1 {
            for x in rect.x0..rect.x1 {
                let mut sum = Color::BLACK;
                for sample in 0..samples_per_pixel {
                    let (ox, oy) = if randomized_samples {
                        (rng.randdouble(), rng.randdouble())
                    } else {
                        AA_OFFSETS[sample]
                    };
                    sum += rt.trace_pixel(x as f64 + ox, y as f64 + oy, rng);
                }
                local[(y - rect.y0) * rect.width() + (x - rect.x0)] =
                    sum / samples_per_pixel as f32;
            }
        }

        {
            let mut fb = fb.lock().expect("framebuffer lock");
            for y in rect.y0..rect.y1 {
                for x in rect.x0..rect.x1 {
                    fb.set(x, y, local[(y - rect.y0) * rect.width() + (x - rect.x0)]);
                }
            }
            if !settings.interactive && !display.present_region(*rect, &fb) {
                return;
            }
        }
    }
}
