//! Command-line renderer: load a scene description, render it, and save
//! the result as `fray_NNNN.bmp` + `fray_NNNN.exr` in the working
//! directory.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use fray_render::{render, Framebuffer, HeadlessDisplay};

const DEFAULT_SCENE: &str = "data/default.fray";

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let scene_file = match args.len() {
        1 => PathBuf::from(DEFAULT_SCENE),
        2 => PathBuf::from(&args[1]),
        _ => bail!("usage: fray [scene.fray]"),
    };

    let mut scene = fray_core::parse_scene_file(&scene_file)
        .with_context(|| format!("loading {}", scene_file.display()))?;

    if scene.settings.interactive {
        log::warn!("interactive mode is not supported headless; rendering one frame");
    }

    scene.begin_render();

    let display = HeadlessDisplay::new();
    let started = Instant::now();
    let fb = render(&mut scene, &display);
    println!("Render took {:.2}s", started.elapsed().as_secs_f64());

    save_screenshots(&fb).context("saving output images")?;
    Ok(())
}

/// Write the frame under the first unused `fray_NNNN` index.
fn save_screenshots(fb: &Framebuffer) -> Result<()> {
    let bmp = fb.to_bitmap();
    let index = (0..10000)
        .find(|i| {
            !Path::new(&format!("fray_{i:04}.bmp")).exists()
                && !Path::new(&format!("fray_{i:04}.exr")).exists()
        })
        .context("no free screenshot slot")?;

    let ldr = format!("fray_{index:04}.bmp");
    let hdr = format!("fray_{index:04}.exr");
    bmp.save_ldr(Path::new(&ldr))?;
    bmp.save_exr(Path::new(&hdr))?;
    println!("Saved {ldr} and {hdr}");
    Ok(())
}
