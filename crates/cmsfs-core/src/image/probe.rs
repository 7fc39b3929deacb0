//! Raster and vector dimension probes.

use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::{CoreError, CoreResult};

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `true` if either axis is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Result of probing an SVG root element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvgSize {
    /// `width` and `height` resolve to absolute lengths.
    Absolute(ImageSize),
    /// Only the viewBox is known; the rendered size depends on the container.
    Relative(ImageSize),
    /// Neither usable dimensions nor a viewBox.
    Undefined,
}

/// Extracts image dimensions without decoding pixel data.
pub trait ImageProbe: Send + Sync {
    /// Reads the header of a GIF, JPEG or PNG file.
    fn raster_size(&self, path: &Path) -> CoreResult<ImageSize>;

    /// Reads the root element of an SVG (or gzipped SVG) file.
    fn vector_size(&self, path: &Path) -> CoreResult<SvgSize>;
}

/// [`ImageProbe`] backed by the `image` crate and `roxmltree`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultImageProbe;

impl ImageProbe for DefaultImageProbe {
    fn raster_size(&self, path: &Path) -> CoreResult<ImageSize> {
        let (width, height) = image::image_dimensions(path)
            .map_err(|e| CoreError::Image(format!("{}: {e}", path.display())))?;
        Ok(ImageSize { width, height })
    }

    fn vector_size(&self, path: &Path) -> CoreResult<SvgSize> {
        let raw = std::fs::read(path).map_err(|e| CoreError::from_io(path, e))?;
        let markup = decode_svg(&raw)?;
        parse_svg_size(&markup)
    }
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Returns the SVG markup, inflating gzip-compressed input.
pub(crate) fn decode_svg(raw: &[u8]) -> CoreResult<String> {
    let bytes = if raw.starts_with(&GZIP_MAGIC) {
        gunzip(raw)?
    } else {
        raw.to_vec()
    };
    String::from_utf8(bytes).map_err(|e| CoreError::Image(format!("svg is not utf-8: {e}")))
}

/// Inflates a gzip stream.
pub(crate) fn gunzip(raw: &[u8]) -> CoreResult<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(raw)
        .read_to_end(&mut out)
        .map_err(|e| CoreError::Image(format!("gzip: {e}")))?;
    Ok(out)
}

/// Resolves the intrinsic size of an SVG document.
///
/// Absolute `width`/`height` win. With a viewBox, a single absolute axis is
/// completed from the viewBox ratio; no absolute axis yields
/// [`SvgSize::Relative`].
pub fn parse_svg_size(markup: &str) -> CoreResult<SvgSize> {
    let doc = roxmltree::Document::parse(markup)
        .map_err(|e| CoreError::Image(format!("svg: {e}")))?;
    let root = doc.root_element();
    if !root.tag_name().name().eq_ignore_ascii_case("svg") {
        return Err(CoreError::Image(format!(
            "root element is <{}>, not <svg>",
            root.tag_name().name()
        )));
    }

    let width = root.attribute("width").and_then(parse_length_px);
    let height = root.attribute("height").and_then(parse_length_px);
    let view_box = root.attribute("viewBox").and_then(parse_view_box);

    let size = match (width, height, view_box) {
        (Some(w), Some(h), _) => SvgSize::Absolute(to_size(w, h)),
        (Some(w), None, Some((vw, vh))) => SvgSize::Absolute(to_size(w, w * vh / vw)),
        (None, Some(h), Some((vw, vh))) => SvgSize::Absolute(to_size(h * vw / vh, h)),
        (None, None, Some((vw, vh))) => SvgSize::Relative(to_size(vw, vh)),
        _ => SvgSize::Undefined,
    };
    Ok(size)
}

fn to_size(width: f64, height: f64) -> ImageSize {
    ImageSize {
        width: width.round().max(0.0) as u32,
        height: height.round().max(0.0) as u32,
    }
}

/// Parses an absolute SVG length into CSS pixels. Percentages and unknown
/// units are not absolute and return `None`.
fn parse_length_px(value: &str) -> Option<f64> {
    let value = value.trim();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+' || c == 'e'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: f64 = number.parse().ok()?;
    let factor = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "px" => 1.0,
        "pt" => 4.0 / 3.0,
        "pc" => 16.0,
        "in" => 96.0,
        "cm" => 96.0 / 2.54,
        "mm" => 96.0 / 25.4,
        _ => return None,
    };
    let px = number * factor;
    (px.is_finite() && px > 0.0).then_some(px)
}

fn parse_view_box(value: &str) -> Option<(f64, f64)> {
    let parts: Vec<f64> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [_, _, w, h] if *w > 0.0 && *h > 0.0 => Some((*w, *h)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn absolute_width_and_height() {
        let size = parse_svg_size(r#"<svg xmlns="http://www.w3.org/2000/svg" width="120" height="80"/>"#)
            .unwrap();
        assert_eq!(size, SvgSize::Absolute(ImageSize::new(120, 80)));
    }

    #[test]
    fn units_are_converted_to_pixels() {
        let size = parse_svg_size(r#"<svg width="1in" height="72pt"/>"#).unwrap();
        assert_eq!(size, SvgSize::Absolute(ImageSize::new(96, 96)));
    }

    #[test]
    fn one_axis_completed_from_view_box() {
        let size = parse_svg_size(r#"<svg width="200" viewBox="0 0 100 50"/>"#).unwrap();
        assert_eq!(size, SvgSize::Absolute(ImageSize::new(200, 100)));

        let size = parse_svg_size(r#"<svg height="30" viewBox="0,0,60,20"/>"#).unwrap();
        assert_eq!(size, SvgSize::Absolute(ImageSize::new(90, 30)));
    }

    #[test]
    fn percentage_with_view_box_is_relative() {
        let size =
            parse_svg_size(r#"<svg width="100%" height="100%" viewBox="0 0 640 480"/>"#).unwrap();
        assert_eq!(size, SvgSize::Relative(ImageSize::new(640, 480)));
    }

    #[test]
    fn no_dimensions_is_undefined() {
        let size = parse_svg_size(r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#).unwrap();
        assert_eq!(size, SvgSize::Undefined);
    }

    #[test]
    fn degenerate_view_box_is_ignored() {
        let size = parse_svg_size(r#"<svg width="50%" viewBox="0 0 0 10"/>"#).unwrap();
        assert_eq!(size, SvgSize::Undefined);
    }

    #[test]
    fn non_svg_root_is_an_error() {
        let err = parse_svg_size("<html/>").unwrap_err();
        assert!(matches!(err, CoreError::Image(_)));
    }

    #[test]
    fn malformed_markup_is_an_error() {
        assert!(parse_svg_size("<svg width=").is_err());
    }

    #[test]
    fn vector_size_reads_gzipped_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logo.svgz");
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(br#"<svg width="16" height="24"/>"#)
            .unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();

        let size = DefaultImageProbe.vector_size(&path).unwrap();

        assert_eq!(size, SvgSize::Absolute(ImageSize::new(16, 24)));
    }

    #[test]
    fn raster_size_reads_png_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pixel.png");
        image::RgbImage::new(7, 3).save(&path).unwrap();

        let size = DefaultImageProbe.raster_size(&path).unwrap();

        assert_eq!(size, ImageSize::new(7, 3));
    }

    #[test]
    fn raster_size_of_garbage_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.png");
        fs::write(&path, "not a png").unwrap();

        assert!(DefaultImageProbe.raster_size(&path).is_err());
    }
}
