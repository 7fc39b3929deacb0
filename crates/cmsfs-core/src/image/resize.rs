//! In-place image resizing.

use std::path::Path;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// How the target box is applied to the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Fill the box exactly, cropping the overflow around the center.
    #[default]
    Crop,
    /// Scale the longer source side to its box dimension.
    Proportional,
    /// Scale to fit entirely inside the box.
    Box,
}

/// Resizes an image file and reports where the result can be fetched.
pub trait ImageResizer: Send + Sync {
    /// Resizes the image at `abs_path` in place.
    ///
    /// Returns the URL of the resized image (`rel_path` with forward
    /// slashes), or `None` if the format cannot be resized.
    fn resize(
        &self,
        abs_path: &Path,
        rel_path: &Path,
        width: u32,
        height: u32,
        mode: ResizeMode,
    ) -> CoreResult<Option<String>>;
}

/// [`ImageResizer`] backed by the `image` crate. Vector images are left
/// untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultImageResizer;

impl ImageResizer for DefaultImageResizer {
    fn resize(
        &self,
        abs_path: &Path,
        rel_path: &Path,
        width: u32,
        height: u32,
        mode: ResizeMode,
    ) -> CoreResult<Option<String>> {
        let ext = abs_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if matches!(ext.as_str(), "svg" | "svgz") {
            tracing::debug!("skipping resize of vector image {}", rel_path.display());
            return Ok(None);
        }

        let img = image::open(abs_path)
            .map_err(|e| CoreError::Image(format!("{}: {e}", rel_path.display())))?;
        let (target_w, target_h) = target_dimensions(img.width(), img.height(), width, height, mode);
        if target_w == 0 || target_h == 0 {
            return Err(CoreError::Image(format!(
                "cannot resize {} to {width}x{height}",
                rel_path.display()
            )));
        }

        let resized = match mode {
            ResizeMode::Crop if width > 0 && height > 0 => {
                img.resize_to_fill(target_w, target_h, FilterType::Lanczos3)
            }
            _ => img.resize_exact(target_w, target_h, FilterType::Lanczos3),
        };
        resized
            .save(abs_path)
            .map_err(|e| CoreError::Image(format!("{}: {e}", rel_path.display())))?;

        tracing::debug!(
            "resized {} from {}x{} to {target_w}x{target_h}",
            rel_path.display(),
            img.width(),
            img.height()
        );
        Ok(Some(url_for(rel_path)))
    }
}

/// Computes the output size for a source of `src_w`×`src_h`.
///
/// A requested dimension of `0` means "derive from the aspect ratio".
pub fn target_dimensions(
    src_w: u32,
    src_h: u32,
    width: u32,
    height: u32,
    mode: ResizeMode,
) -> (u32, u32) {
    if src_w == 0 || src_h == 0 {
        return (0, 0);
    }
    let ratio = src_w as f64 / src_h as f64;
    let scale_h = |w: u32| ((w as f64 / ratio).round() as u32).max(1);
    let scale_w = |h: u32| ((h as f64 * ratio).round() as u32).max(1);

    match (width, height) {
        (0, 0) => (src_w, src_h),
        (w, 0) => (w, scale_h(w)),
        (0, h) => (scale_w(h), h),
        (w, h) => match mode {
            ResizeMode::Crop => (w, h),
            ResizeMode::Proportional => {
                if src_w >= src_h {
                    (w, scale_h(w))
                } else {
                    (scale_w(h), h)
                }
            }
            ResizeMode::Box => {
                if scale_h(w) <= h {
                    (w, scale_h(w))
                } else {
                    (scale_w(h), h)
                }
            }
        },
    }
}

fn url_for(rel_path: &Path) -> String {
    rel_path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn crop_uses_exact_box() {
        assert_eq!(target_dimensions(400, 200, 100, 100, ResizeMode::Crop), (100, 100));
    }

    #[test]
    fn zero_axis_keeps_aspect_ratio() {
        assert_eq!(target_dimensions(400, 200, 100, 0, ResizeMode::Crop), (100, 50));
        assert_eq!(target_dimensions(400, 200, 0, 50, ResizeMode::Box), (100, 50));
    }

    #[test]
    fn proportional_follows_longer_side() {
        assert_eq!(target_dimensions(400, 200, 100, 100, ResizeMode::Proportional), (100, 50));
        assert_eq!(target_dimensions(200, 400, 100, 100, ResizeMode::Proportional), (50, 100));
    }

    #[test]
    fn box_fits_inside() {
        assert_eq!(target_dimensions(400, 200, 100, 20, ResizeMode::Box), (40, 20));
        assert_eq!(target_dimensions(400, 200, 100, 80, ResizeMode::Box), (100, 50));
    }

    #[test]
    fn no_target_keeps_source_size() {
        assert_eq!(target_dimensions(30, 20, 0, 0, ResizeMode::Box), (30, 20));
    }

    #[test]
    fn resize_png_in_place() {
        let tmp = TempDir::new().unwrap();
        let abs = tmp.path().join("photo.png");
        image::RgbImage::new(40, 20).save(&abs).unwrap();

        let url = DefaultImageResizer
            .resize(&abs, Path::new("files/photo.png"), 10, 10, ResizeMode::Crop)
            .unwrap();

        assert_eq!(url.as_deref(), Some("files/photo.png"));
        assert_eq!(image::image_dimensions(&abs).unwrap(), (10, 10));
    }

    #[test]
    fn svg_is_not_resized() {
        let tmp = TempDir::new().unwrap();
        let abs = tmp.path().join("logo.svg");
        std::fs::write(&abs, r#"<svg width="10" height="10"/>"#).unwrap();

        let url = DefaultImageResizer
            .resize(&abs, Path::new("files/logo.svg"), 5, 5, ResizeMode::Box)
            .unwrap();

        assert!(url.is_none());
    }
}
