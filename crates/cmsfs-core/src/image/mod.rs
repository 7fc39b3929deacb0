//! Image services consumed by [`crate::File`].
//!
//! - [`probe`]: raster and SVG dimension probes.
//! - [`cache`]: the shared image-size cache.
//! - [`resize`]: in-place resizing.

pub mod cache;
pub mod probe;
pub mod resize;

pub use cache::ImageSizeCache;
pub use probe::{DefaultImageProbe, ImageProbe, ImageSize, SvgSize};
pub use resize::{DefaultImageResizer, ImageResizer, ResizeMode};
