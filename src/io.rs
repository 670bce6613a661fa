use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder, ImageError, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Decode an in-memory image (any format the `image` crate recognises) to RGBA.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Load an image file to RGBA.  Errors are flattened to a message for the CLI.
pub fn load_image(path: &Path) -> Result<RgbaImage, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    decode_image(&bytes).map_err(|e| format!("could not decode '{}': {}", path.display(), e))
}

/// Encode RGBA pixels as a lossless PNG stream.
pub fn write_png_to<W: Write>(image: &RgbaImage, writer: W) -> Result<(), ImageError> {
    let encoder = PngEncoder::new_with_quality(writer, CompressionType::Default, FilterType::Adaptive);
    encoder.write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgba8)
}

/// PNG bytes in memory (used for the suggestion request payload).
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ImageError> {
    let mut out = Vec::new();
    write_png_to(image, &mut out)?;
    Ok(out)
}

/// Encode and write a PNG file.
pub fn write_png(image: &RgbaImage, path: &Path) -> Result<(), ImageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_png_to(image, &mut writer)?;
    writer.flush()?;
    Ok(())
}
