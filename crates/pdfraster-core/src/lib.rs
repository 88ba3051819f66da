//! Backend-independent data types and algorithms for pdfraster.
//!
//! This crate provides the foundational types and pure algorithms used by
//! the pdfraster workspace: geometric primitives, the packed-sample reader,
//! decode-array remapping, color-space descriptors, and the decoded-image
//! output types. It has no required external dependencies — all
//! functionality is pure Rust.
//!
//! # Modules
//!
//! - [`geometry`] — Placement transforms: [`Matrix`], [`UserPoint`]
//! - [`bits`] — Packed-sample reading: [`SampleReader`]
//! - [`decode`] — Decode-array remapping: [`DecodeTable`]
//! - [`color`] — Color spaces: [`ColorSpace`], [`DeviceSpace`]
//! - [`record`] — Output types: [`Placement`], [`DecodedImage`]
//! - [`error`] — Errors: [`DecodeError`]

#![deny(missing_docs)]

/// Packed-sample reading at 1/2/4/8 bits per component.
pub mod bits;
/// Color-space descriptors and base-space reduction.
pub mod color;
/// Decode-array remapping of sample values.
pub mod decode;
/// Error types for image decoding.
pub mod error;
/// Affine transforms for image placement.
pub mod geometry;
/// Decoded-image output and placement metadata.
pub mod record;

pub use bits::SampleReader;
pub use color::{ColorSpace, DeviceSpace};
pub use decode::{DecodeTable, default_decode_array, is_pure_negation};
pub use error::DecodeError;
pub use geometry::{Matrix, UserPoint};
pub use record::{DecodedImage, Placement};
