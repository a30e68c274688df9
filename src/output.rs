//! # PNG Output Module
//!
//! This module writes rendered figures to PNG files. The image is stored as
//! 8-bit RGBA and carries a `pHYs` chunk so that image viewers and document
//! tools see the same resolution (dots per inch) the figure was rendered at.
//!
//! The `image` crate's own PNG encoder has no way to set `pHYs`, so the
//! buffer is handed to the `png` encoder directly. Existing files at the
//! output path are replaced.

use image::RgbaImage;
use log::debug;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::figure::RenderResult;

/// Metres per inch, for converting dpi to the pixels-per-metre PNG stores
const METRES_PER_INCH: f64 = 0.0254;

/// Converts dots per inch to pixels per metre, rounded as PNG readers expect.
pub fn dpi_to_ppm(dpi: u32) -> u32 {
    (dpi as f64 / METRES_PER_INCH).round() as u32
}

/// Converts pixels per metre back to dots per inch.
pub fn ppm_to_dpi(ppm: u32) -> u32 {
    (ppm as f64 * METRES_PER_INCH).round() as u32
}

/// Writes an image to a PNG file with its resolution recorded.
///
/// # Arguments
///
/// * `img` - The rasterized figure
/// * `output_path` - Destination file; any existing file is overwritten
/// * `dpi` - Resolution stored in the `pHYs` chunk
///
/// # Errors
///
/// Returns an error if the file cannot be created or the encoder fails.
pub fn write_png<P: AsRef<Path>>(img: &RgbaImage, output_path: P, dpi: u32) -> RenderResult<()> {
    let output_path = output_path.as_ref();
    debug!(
        "Writing {}x{} PNG at {} dpi to {}",
        img.width(),
        img.height(),
        dpi,
        output_path.display()
    );
    if output_path.exists() {
        debug!("Replacing existing file {}", output_path.display());
    }

    let file = File::create(output_path)?;
    let writer = BufWriter::new(file);

    let mut encoder = png::Encoder::new(writer, img.width(), img.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let ppm = dpi_to_ppm(dpi);
    encoder.set_pixel_dims(Some(png::PixelDimensions {
        xppu: ppm,
        yppu: ppm,
        unit: png::Unit::Meter,
    }));

    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(img.as_raw())?;
    png_writer.finish()?;

    debug!("Successfully wrote PNG file: {}", output_path.display());
    Ok(())
}
