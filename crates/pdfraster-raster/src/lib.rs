//! Raster builders and native-container readers for pdfraster.
//!
//! This crate is the target raster engine of the decoding pipeline. The
//! [`RasterBuilder`] trait is the seam between the decode orchestrator and
//! the pixel store; two builders implement it with different mask policies:
//!
//! - [`PerPixelRaster`] bakes mask alpha into each written pixel and only
//!   accepts JPEG containers for spaces with at most 3 components.
//! - [`BatchRaster`] ignores masks while writing and composes alpha in one
//!   pass at finalize; it accepts JPEG, JPEG 2000 and CCITT containers for
//!   all device spaces.
//!
//! [`Renderer`] selects between them at call time.

pub mod batch;
pub mod builder;
pub mod mask;
pub mod per_pixel;

mod ccitt_blob;
mod jpeg;
mod jpx;

pub use batch::BatchRaster;
pub use builder::{NativeImage, RasterBuilder, Renderer};
pub use mask::MaskModel;
pub use per_pixel::PerPixelRaster;
