//! The rendering half of the raytracer: shader evaluation, the Whitted
//! and path-tracing transport kernels, and the multithreaded bucket
//! renderer that drives them.

mod buckets;
mod framebuffer;
mod renderer;
mod shade;
mod trace;

pub use buckets::{bucket_list, BUCKET_SIZE};
pub use framebuffer::{Display, Framebuffer, HeadlessDisplay, Rect};
pub use renderer::render;
pub use shade::shade;
pub use trace::Raytracer;
