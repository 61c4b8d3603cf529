//! 2D rasters of HDR colors, plus the on-disk codecs the renderer needs:
//! LDR images (BMP/PNG, sRGB-decoded on load) and HDR OpenEXR.

use std::path::Path;

use fray_math::Color;

use crate::error::{SceneError, SceneResult};

/// A dense raster of linear HDR colors.
#[derive(Debug, Clone)]
pub struct Bitmap {
    width: usize,
    height: usize,
    data: Vec<Color>,
}

impl Bitmap {
    /// Create a black bitmap of the given dimensions.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![Color::BLACK; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get_pixel(&self, x: usize, y: usize) -> Color {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, color: Color) {
        self.data[y * self.width + x] = color;
    }

    /// Load an image file into a linear-space bitmap. LDR formats are
    /// decoded from sRGB; float formats (OpenEXR) are taken as-is.
    pub fn load_image(path: &Path) -> SceneResult<Bitmap> {
        if !path.exists() {
            return Err(SceneError::AssetNotFound(path.to_path_buf()));
        }
        let img = image::open(path)?;
        let bmp = match img {
            image::DynamicImage::ImageRgb32F(buf) => {
                let (w, h) = buf.dimensions();
                let mut bmp = Bitmap::new(w as usize, h as usize);
                for (x, y, p) in buf.enumerate_pixels() {
                    bmp.set_pixel(x as usize, y as usize, Color::new(p[0], p[1], p[2]));
                }
                bmp
            }
            image::DynamicImage::ImageRgba32F(buf) => {
                let (w, h) = buf.dimensions();
                let mut bmp = Bitmap::new(w as usize, h as usize);
                for (x, y, p) in buf.enumerate_pixels() {
                    bmp.set_pixel(x as usize, y as usize, Color::new(p[0], p[1], p[2]));
                }
                bmp
            }
            other => {
                let buf = other.to_rgb8();
                let (w, h) = buf.dimensions();
                let mut bmp = Bitmap::new(w as usize, h as usize);
                for (x, y, p) in buf.enumerate_pixels() {
                    bmp.set_pixel(
                        x as usize,
                        y as usize,
                        Color::new(
                            srgb_to_linear(p[0]),
                            srgb_to_linear(p[1]),
                            srgb_to_linear(p[2]),
                        ),
                    );
                }
                bmp
            }
        };
        log::debug!(
            "loaded image {} ({}x{})",
            path.display(),
            bmp.width,
            bmp.height
        );
        Ok(bmp)
    }

    /// Save as an 8-bit LDR image; the extension picks the format (BMP
    /// for screenshots). Colors are clamped and sRGB-encoded.
    pub fn save_ldr(&self, path: &Path) -> SceneResult<()> {
        let mut buf = image::RgbImage::new(self.width as u32, self.height as u32);
        for (x, y, p) in buf.enumerate_pixels_mut() {
            let c = self.get_pixel(x as usize, y as usize);
            *p = image::Rgb([
                linear_to_srgb(c.r),
                linear_to_srgb(c.g),
                linear_to_srgb(c.b),
            ]);
        }
        buf.save(path)?;
        Ok(())
    }

    /// Save the raw float data as OpenEXR.
    pub fn save_exr(&self, path: &Path) -> SceneResult<()> {
        let mut buf = image::Rgb32FImage::new(self.width as u32, self.height as u32);
        for (x, y, p) in buf.enumerate_pixels_mut() {
            let c = self.get_pixel(x as usize, y as usize);
            *p = image::Rgb([c.r, c.g, c.b]);
        }
        buf.save(path)?;
        Ok(())
    }

    /// Replace each pixel with the forward difference of its intensity:
    /// (I(x,y)−I(x+1,y), I(x,y)−I(x,y+1), 0), wrapping at the borders.
    /// Bump textures run this once before rendering.
    pub fn differentiate(&mut self) {
        let mut out = vec![Color::BLACK; self.data.len()];
        for y in 0..self.height {
            for x in 0..self.width {
                let me = self.get_pixel(x, y).intensity();
                let right = self.get_pixel((x + 1) % self.width, y).intensity();
                let below = self.get_pixel(x, (y + 1) % self.height).intensity();
                out[y * self.width + x] = Color::new(me - right, me - below, 0.0);
            }
        }
        self.data = out;
    }
}

/// Decode one sRGB byte to a linear float.
pub fn srgb_to_linear(value: u8) -> f32 {
    let v = value as f32 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// Encode a linear float as one sRGB byte, clamping out-of-range input.
pub fn linear_to_srgb(value: f32) -> u8 {
    let v = value.clamp(0.0, 1.0);
    let s = if v <= 0.0031308 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    };
    (s * 255.0 + 0.5) as u8
}
