//! pdfraster-parse: PDF parsing backend and content-stream walker.
//!
//! This crate implements the PDF-facing half of the pdfraster pipeline:
//! document and page access via [lopdf](https://crates.io/crates/lopdf),
//! the content-stream tokenizer and walker that discover placed images,
//! the stream filter chain, and the decode orchestrator that turns an
//! image stream into a finished raster. It depends on `pdfraster-core` for
//! shared data types and on `pdfraster-raster` for the raster builders.

pub mod ccitt;
pub mod color_space;
pub mod decoder;
pub mod document;
pub mod error;
pub mod filters;
pub mod gstate;
pub mod tokenizer;
pub mod walker;

pub use ccitt::{CcittParams, wrap_ccitt_in_tiff};
pub use color_space::resolve_color_space_object;
pub use decoder::decode_image;
pub use document::PdfDocument;
pub use error::BackendError;
pub use filters::{Filter, FilterChainOutput, apply_filter_chain};
pub use gstate::GraphicState;
pub use tokenizer::{Content, InlineImage, Operand, Operator, tokenize};
pub use walker::{ImageKind, ImageRecord, ImageSource, WalkOptions, walk_page_images};
