//! Image dimension probing.

use std::io::Cursor;

/// Read the dimensions from an encoded image without decoding pixel data.
/// Returns None for formats the probe does not understand (e.g. PLY splats).
pub fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn probes_png_dimensions() {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(20, 30);
        let mut bytes = Vec::new();
        img.write_to(
            &mut Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();

        assert_eq!(probe_dimensions(&bytes), Some((20, 30)));
    }

    #[test]
    fn non_image_bytes_probe_to_none() {
        assert_eq!(probe_dimensions(b"ply\nformat ascii 1.0\n"), None);
    }
}
