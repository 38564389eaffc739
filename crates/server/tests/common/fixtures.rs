//! Test fixtures for generating source images.

use bytes::Bytes;
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;

/// A `width`x`height` JPEG filled with a horizontal gradient.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub fn jpeg_bytes(width: u32, height: u32) -> Bytes {
    let img = RgbImage::from_fn(width, height, |x, _| {
        let shade = (x * 255 / width.max(1)) as u8;
        Rgb([shade, 128, 255 - shade])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Jpeg)
        .expect("Failed to encode JPEG fixture");
    Bytes::from(out.into_inner())
}

/// A `width`x`height` PNG with an alpha channel.
#[allow(dead_code)]
pub fn png_bytes(width: u32, height: u32) -> Bytes {
    let img = RgbaImage::from_fn(width, height, |_, y| {
        let shade = (y * 255 / height.max(1)) as u8;
        Rgba([20, shade, 90, 200])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .expect("Failed to encode PNG fixture");
    Bytes::from(out.into_inner())
}

/// Decode a response body and return its dimensions and format.
#[allow(dead_code)]
pub fn decoded_dimensions(body: &[u8]) -> (u32, u32, ImageFormat) {
    let format = image::guess_format(body).expect("Body is not a known image format");
    let img = image::load_from_memory_with_format(body, format).expect("Body does not decode");
    (img.width(), img.height(), format)
}

/// Percent-encode a source reference into a single path segment.
///
/// Everything except unreserved characters is escaped, `/` included.
#[allow(dead_code)]
pub fn escape_source(source: &str) -> String {
    let mut out = String::with_capacity(source.len() * 3);
    for b in source.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Whether the sandbox allows binding a local port for mock origins.
#[allow(dead_code)]
pub fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}
