//! Extract and decode raster images embedded in PDF documents.
//!
//! The library walks a page's content stream to discover placed images
//! (Image XObjects and inline images), tracks the graphics state to
//! compute each image's user-space placement, and decodes the image data
//! through its filter chain, color space, decode array and masks into a
//! device-space pixel buffer.
//!
//! # Example
//!
//! ```no_run
//! use pdfraster::{Pdf, Renderer};
//!
//! # fn main() -> Result<(), pdfraster::DecodeError> {
//! let pdf = Pdf::open("document.pdf")?;
//! for record in pdf.images_by_page(0)? {
//!     let image = pdf.decode(&record, Renderer::Batch)?;
//!     println!(
//!         "{}x{} {} at {:.0} dpi",
//!         image.width,
//!         image.height,
//!         image.space.name(),
//!         image.placement.as_ref().map_or(0.0, |p| p.dpi_x),
//!     );
//! }
//! # Ok(())
//! # }
//! ```

pub use pdfraster_core::color::DeviceSpace;
pub use pdfraster_core::error::DecodeError;
pub use pdfraster_core::geometry::{Matrix, UserPoint};
pub use pdfraster_core::record::{DecodedImage, Placement};
pub use pdfraster_parse::walker::{ImageKind, ImageRecord, ImageSource, WalkOptions};
pub use pdfraster_raster::Renderer;

use pdfraster_parse::decoder::decode_image;
use pdfraster_parse::document::PdfDocument;
use pdfraster_parse::walker::walk_page_images;

/// A PDF document opened for image extraction.
pub struct Pdf {
    doc: PdfDocument,
    options: WalkOptions,
}

impl std::fmt::Debug for Pdf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pdf")
            .field("page_count", &self.page_count())
            .finish_non_exhaustive()
    }
}

impl Pdf {
    /// Open a document from a file path.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self, DecodeError> {
        Ok(Self {
            doc: PdfDocument::open(path).map_err(DecodeError::from)?,
            options: WalkOptions::default(),
        })
    }

    /// Open a document from in-memory bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            doc: PdfDocument::from_bytes(bytes).map_err(DecodeError::from)?,
            options: WalkOptions::default(),
        })
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.doc.page_count()
    }

    /// Discover the images placed on a page (0-based), in content-stream
    /// order. Images drawn by nested Form XObjects appear at the position
    /// of their `Do` operator.
    ///
    /// # Errors
    ///
    /// Fails for an out-of-range page or an untokenizable content stream.
    /// Individual unresolvable images are skipped, not errors.
    pub fn images_by_page(&self, page: usize) -> Result<Vec<ImageRecord>, DecodeError> {
        let rotation = self.doc.page_rotation(page).map_err(DecodeError::from)?;
        let switch_wh = (rotation / 90).rem_euclid(2) != 0;
        let content = self.doc.page_content(page).map_err(DecodeError::from)?;
        let resources = self.doc.page_resources(page).map_err(DecodeError::from)?;
        walk_page_images(
            self.doc.inner(),
            &content,
            &resources,
            switch_wh,
            &self.options,
        )
        .map_err(DecodeError::from)
    }

    /// Decode one discovered image to device-space pixels, with the
    /// record's placement attached to the result.
    pub fn decode(
        &self,
        record: &ImageRecord,
        renderer: Renderer,
    ) -> Result<DecodedImage, DecodeError> {
        let mut image = match &record.source {
            ImageSource::XObject(id) => {
                let stream = self
                    .doc
                    .inner()
                    .get_object(*id)
                    .and_then(|o| o.as_stream())
                    .map_err(|e| DecodeError::Parse(format!("image stream: {e}")))?;
                decode_image(
                    self.doc.inner(),
                    &stream.dict,
                    &stream.content,
                    None,
                    renderer,
                )?
            }
            ImageSource::Inline {
                dict,
                data,
                resources,
            } => decode_image(self.doc.inner(), dict, data, Some(resources), renderer)?,
        };
        image.placement = Some(record.placement.clone());
        Ok(image)
    }
}
