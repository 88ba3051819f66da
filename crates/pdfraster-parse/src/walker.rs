//! Content-stream walker: discovers placed images.
//!
//! A small interpreter over a page's content stream that tracks the
//! graphics-state stack (`q`, `Q`, `cm`), resolves `Do` operators against
//! the resources `/XObject` dictionary, recurses into Form XObjects, and
//! captures inline images. Every discovered image is emitted as an
//! [`ImageRecord`] carrying its user-space [`Placement`].

use pdfraster_core::record::Placement;

use crate::color_space::resolve_ref;
use crate::error::BackendError;
use crate::gstate::GraphicState;
use crate::tokenizer::{Content, InlineImage, Operand, tokenize};

/// Where an image comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// An Image XObject referenced by a `Do` operator.
    External,
    /// An inline `BI … ID … EI` image.
    Inline,
}

/// The image's data source.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Reference to an image stream object in the document.
    XObject(lopdf::ObjectId),
    /// An owned dictionary and payload captured from the content stream,
    /// plus the resources in scope at the `BI` (for named color spaces).
    Inline {
        /// Expanded image dictionary (abbreviations already widened).
        dict: lopdf::Dictionary,
        /// Raw payload bytes.
        data: Vec<u8>,
        /// Resources dictionary in scope where the image appeared.
        resources: lopdf::Dictionary,
    },
}

/// One discovered image with its placement.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// External or inline.
    pub kind: ImageKind,
    /// Data source for decoding.
    pub source: ImageSource,
    /// User-space placement at the emitting operator.
    pub placement: Placement,
    /// The image is a stencil whose role is masking rather than content;
    /// callers may filter these out.
    pub is_mask: bool,
}

/// Walker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOptions {
    /// Maximum Form XObject nesting depth.
    pub max_recursion_depth: usize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_recursion_depth: 16,
        }
    }
}

/// Walk a page content stream and collect its images in stream order.
///
/// `switch_wh` swaps the derived user-space width and height of every
/// placement; it is set when the page rotation is an odd multiple of 90°.
///
/// # Errors
///
/// [`BackendError::ContentStream`] when the page stream cannot be
/// tokenized. Missing or malformed `Do` targets are skipped, not errors.
pub fn walk_page_images(
    doc: &lopdf::Document,
    content: &[u8],
    resources: &lopdf::Dictionary,
    switch_wh: bool,
    options: &WalkOptions,
) -> Result<Vec<ImageRecord>, BackendError> {
    let mut gstate = GraphicState::new();
    let mut records = Vec::new();
    walk(
        doc,
        content,
        resources,
        &mut gstate,
        switch_wh,
        0,
        options,
        &mut records,
    )?;
    Ok(records)
}

#[allow(clippy::too_many_arguments)]
fn walk(
    doc: &lopdf::Document,
    content: &[u8],
    resources: &lopdf::Dictionary,
    gstate: &mut GraphicState,
    switch_wh: bool,
    depth: usize,
    options: &WalkOptions,
    records: &mut Vec<ImageRecord>,
) -> Result<(), BackendError> {
    if depth > options.max_recursion_depth {
        return Err(BackendError::ContentStream(format!(
            "Form XObject recursion depth {depth} exceeds limit {}",
            options.max_recursion_depth
        )));
    }

    for item in tokenize(content)? {
        match item {
            Content::Op(op) => match op.name.as_str() {
                "q" => gstate.save(),
                "Q" => {
                    gstate.restore();
                }
                "cm" => {
                    if op.operands.len() >= 6 {
                        let v: Vec<f64> = op
                            .operands
                            .iter()
                            .map(|o| o.as_f64().unwrap_or(0.0))
                            .collect();
                        gstate.concat(v[0], v[1], v[2], v[3], v[4], v[5]);
                    }
                }
                "Do" => {
                    if let Some(Operand::Name(name)) = op.operands.first() {
                        handle_do(
                            doc, resources, name, gstate, switch_wh, depth, options, records,
                        )?;
                    }
                }
                _ => {} // unrecognized operators are ignored
            },
            Content::Inline(img) => {
                records.push(inline_record(img, resources, gstate, switch_wh));
            }
        }
    }

    Ok(())
}

/// Resolve a `Do` target and either recurse (Form) or emit (Image).
/// Unresolvable names are skipped; the walk continues.
#[allow(clippy::too_many_arguments)]
fn handle_do(
    doc: &lopdf::Document,
    resources: &lopdf::Dictionary,
    name: &str,
    gstate: &mut GraphicState,
    switch_wh: bool,
    depth: usize,
    options: &WalkOptions,
    records: &mut Vec<ImageRecord>,
) -> Result<(), BackendError> {
    let target = (|| -> Option<(lopdf::ObjectId, &lopdf::Stream)> {
        let xobjects = resources.get(b"XObject").ok()?;
        let xobjects = resolve_ref(doc, xobjects).as_dict().ok()?;
        let entry = xobjects.get(name.as_bytes()).ok()?;
        let id = entry.as_reference().ok()?;
        let stream = doc.get_object(id).ok()?.as_stream().ok()?;
        Some((id, stream))
    })();

    let (id, stream) = match target {
        Some(found) => found,
        None => {
            log::debug!("skipping unresolvable XObject /{name}");
            return Ok(());
        }
    };

    let subtype = stream
        .dict
        .get(b"Subtype")
        .ok()
        .and_then(|o| o.as_name_str().ok())
        .unwrap_or("");

    match subtype {
        "Form" => handle_form(
            doc, stream, resources, gstate, switch_wh, depth, options, records,
        ),
        "Image" => {
            let width = dict_u32(&stream.dict, b"Width").unwrap_or(0);
            let height = dict_u32(&stream.dict, b"Height").unwrap_or(0);
            let is_mask = stream
                .dict
                .get(b"ImageMask")
                .ok()
                .and_then(|o| o.as_bool().ok())
                .unwrap_or(false);
            records.push(ImageRecord {
                kind: ImageKind::External,
                source: ImageSource::XObject(id),
                placement: Placement::from_matrix(gstate.current(), width, height, switch_wh),
                is_mask,
            });
            Ok(())
        }
        other => {
            log::debug!("ignoring XObject /{name} of subtype {other:?}");
            Ok(())
        }
    }
}

/// Recurse into a Form XObject: save, concat its `/Matrix`, walk its
/// stream with its own resources (falling back to the parent's), restore.
/// The restore runs on the error path too.
#[allow(clippy::too_many_arguments)]
fn handle_form(
    doc: &lopdf::Document,
    stream: &lopdf::Stream,
    parent_resources: &lopdf::Dictionary,
    gstate: &mut GraphicState,
    switch_wh: bool,
    depth: usize,
    options: &WalkOptions,
    records: &mut Vec<ImageRecord>,
) -> Result<(), BackendError> {
    let form_resources = stream
        .dict
        .get(b"Resources")
        .ok()
        .map(|o| resolve_ref(doc, o))
        .and_then(|o| o.as_dict().ok())
        .unwrap_or(parent_resources);

    let content = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    gstate.save();
    if let Ok(matrix) = stream.dict.get(b"Matrix") {
        if let Ok(arr) = resolve_ref(doc, matrix).as_array() {
            if arr.len() == 6 {
                let v: Vec<f64> = arr
                    .iter()
                    .map(|o| match o {
                        lopdf::Object::Integer(i) => *i as f64,
                        lopdf::Object::Real(f) => f64::from(*f),
                        _ => 0.0,
                    })
                    .collect();
                gstate.concat(v[0], v[1], v[2], v[3], v[4], v[5]);
            }
        }
    }

    let result = walk(
        doc,
        &content,
        form_resources,
        gstate,
        switch_wh,
        depth + 1,
        options,
        records,
    );
    gstate.restore();
    result
}

/// Build a record from a captured inline image.
fn inline_record(
    img: InlineImage,
    resources: &lopdf::Dictionary,
    gstate: &GraphicState,
    switch_wh: bool,
) -> ImageRecord {
    let dict = expand_inline_dict(img.dict);
    let width = dict_u32(&dict, b"Width").unwrap_or(0);
    let height = dict_u32(&dict, b"Height").unwrap_or(0);
    let is_mask = dict
        .get(b"ImageMask")
        .ok()
        .and_then(|o| o.as_bool().ok())
        .unwrap_or(false);

    ImageRecord {
        kind: ImageKind::Inline,
        source: ImageSource::Inline {
            dict,
            data: img.data,
            resources: resources.clone(),
        },
        placement: Placement::from_matrix(gstate.current(), width, height, switch_wh),
        is_mask,
    }
}

/// Widen the inline-image key and value abbreviations to their full names.
fn expand_inline_dict(entries: Vec<(String, Operand)>) -> lopdf::Dictionary {
    let mut dict = lopdf::Dictionary::new();
    for (key, value) in entries {
        let key = match key.as_str() {
            "BPC" => "BitsPerComponent",
            "CS" => "ColorSpace",
            "D" => "Decode",
            "DP" => "DecodeParms",
            "F" => "Filter",
            "H" => "Height",
            "IM" => "ImageMask",
            "I" => "Interpolate",
            "W" => "Width",
            other => other,
        }
        .to_string();

        let value = match key.as_str() {
            "ColorSpace" => expand_name(value, expand_color_space_name),
            "Filter" => expand_name(value, expand_filter_name),
            _ => value,
        };
        dict.set(key.into_bytes(), operand_to_object(value));
    }
    dict
}

/// Map an abbreviation over a name operand, or over each name in an array.
fn expand_name(value: Operand, f: fn(&str) -> &str) -> Operand {
    match value {
        Operand::Name(n) => Operand::Name(f(&n).to_string()),
        Operand::Array(items) => {
            Operand::Array(items.into_iter().map(|v| expand_name(v, f)).collect())
        }
        other => other,
    }
}

fn expand_color_space_name(name: &str) -> &str {
    match name {
        "G" => "DeviceGray",
        "RGB" => "DeviceRGB",
        "CMYK" => "DeviceCMYK",
        "I" => "Indexed",
        other => other,
    }
}

fn expand_filter_name(name: &str) -> &str {
    match name {
        "AHx" => "ASCIIHexDecode",
        "A85" => "ASCII85Decode",
        "LZW" => "LZWDecode",
        "Fl" => "FlateDecode",
        "RL" => "RunLengthDecode",
        "CCF" => "CCITTFaxDecode",
        "DCT" => "DCTDecode",
        other => other,
    }
}

/// Convert a tokenizer operand to a lopdf object.
fn operand_to_object(operand: Operand) -> lopdf::Object {
    match operand {
        Operand::Integer(i) => lopdf::Object::Integer(i),
        Operand::Real(f) => lopdf::Object::Real(f as f32),
        Operand::Name(n) => lopdf::Object::Name(n.into_bytes()),
        Operand::LiteralString(s) => lopdf::Object::String(s, lopdf::StringFormat::Literal),
        Operand::HexString(s) => lopdf::Object::String(s, lopdf::StringFormat::Hexadecimal),
        Operand::Array(items) => {
            lopdf::Object::Array(items.into_iter().map(operand_to_object).collect())
        }
        Operand::Dictionary(entries) => {
            let mut dict = lopdf::Dictionary::new();
            for (key, value) in entries {
                dict.set(key.into_bytes(), operand_to_object(value));
            }
            lopdf::Object::Dictionary(dict)
        }
        Operand::Boolean(b) => lopdf::Object::Boolean(b),
        Operand::Null => lopdf::Object::Null,
    }
}

fn dict_u32(dict: &lopdf::Dictionary, key: &[u8]) -> Option<u32> {
    dict.get(key)
        .ok()
        .and_then(|o| o.as_i64().ok())
        .and_then(|v| u32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Object, Stream, dictionary};

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    /// A document holding one 4×2 gray image XObject named /Im1, plus an
    /// optional Form XObject named /F1 whose content is `content`.
    fn doc_with_image(form_content: Option<(&[u8], Option<Vec<Object>>)>) -> (lopdf::Document, lopdf::Dictionary) {
        let mut doc = lopdf::Document::with_version("1.5");
        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 4,
                "Height" => 2,
                "BitsPerComponent" => 8,
                "ColorSpace" => "DeviceGray",
            },
            vec![0u8; 8],
        );
        let image_id = doc.add_object(image);

        let mut xobjects = dictionary! { "Im1" => Object::Reference(image_id) };

        if let Some((content, matrix)) = form_content {
            let mut form_dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im1" => Object::Reference(image_id) },
                },
            };
            if let Some(matrix) = matrix {
                form_dict.set("Matrix", matrix);
            }
            let form_id = doc.add_object(Stream::new(form_dict, content.to_vec()));
            xobjects.set("F1", Object::Reference(form_id));
        }

        let resources = dictionary! { "XObject" => xobjects };
        (doc, resources)
    }

    fn walk_default(
        doc: &lopdf::Document,
        content: &[u8],
        resources: &lopdf::Dictionary,
    ) -> Vec<ImageRecord> {
        walk_page_images(doc, content, resources, false, &WalkOptions::default()).unwrap()
    }

    // --- Image XObjects ---

    #[test]
    fn emits_record_with_placement() {
        let (doc, resources) = doc_with_image(None);
        let records = walk_default(&doc, b"q 200 0 0 150 100 500 cm /Im1 Do Q", &resources);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.kind, ImageKind::External);
        assert!(!r.is_mask);
        assert_approx(r.placement.ll.x, 100.0);
        assert_approx(r.placement.ll.y, 500.0);
        assert_approx(r.placement.user_width, 200.0);
        assert_approx(r.placement.user_height, 150.0);
        assert_eq!(r.placement.px_width, 4);
        assert_eq!(r.placement.px_height, 2);
    }

    #[test]
    fn q_restores_placement_matrix() {
        let (doc, resources) = doc_with_image(None);
        // The scaled matrix is popped before the Do
        let records = walk_default(&doc, b"q 9 0 0 9 0 0 cm Q /Im1 Do", &resources);
        assert_approx(records[0].placement.user_width, 1.0);
        assert_approx(records[0].placement.user_height, 1.0);
    }

    #[test]
    fn unmatched_restore_is_ignored() {
        let (doc, resources) = doc_with_image(None);
        let records = walk_default(&doc, b"Q Q 2 0 0 2 0 0 cm /Im1 Do", &resources);
        assert_eq!(records.len(), 1);
        assert_approx(records[0].placement.user_width, 2.0);
    }

    #[test]
    fn unknown_do_name_is_skipped() {
        let (doc, resources) = doc_with_image(None);
        let records = walk_default(&doc, b"/Missing Do /Im1 Do", &resources);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn missing_xobject_resources_skip_all() {
        let doc = lopdf::Document::with_version("1.5");
        let resources = dictionary! {};
        let records = walk_default(&doc, b"/Im1 Do", &resources);
        assert!(records.is_empty());
    }

    #[test]
    fn records_keep_content_stream_order() {
        let (doc, resources) = doc_with_image(None);
        let records = walk_default(
            &doc,
            b"/Im1 Do BI /W 1 /H 1 /BPC 8 /CS /G ID \x01 EI /Im1 Do",
            &resources,
        );
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].kind, ImageKind::External);
        assert_eq!(records[1].kind, ImageKind::Inline);
        assert_eq!(records[2].kind, ImageKind::External);
    }

    #[test]
    fn switch_wh_swaps_user_dimensions() {
        let (doc, resources) = doc_with_image(None);
        let content = b"q 200 0 0 100 0 0 cm /Im1 Do Q";
        let normal = walk_page_images(&doc, content, &resources, false, &WalkOptions::default())
            .unwrap();
        let rotated = walk_page_images(&doc, content, &resources, true, &WalkOptions::default())
            .unwrap();
        assert_approx(normal[0].placement.user_width, 200.0);
        assert_approx(rotated[0].placement.user_width, 100.0);
        assert_approx(rotated[0].placement.user_height, 200.0);
    }

    #[test]
    fn stencil_xobject_sets_is_mask() {
        let mut doc = lopdf::Document::with_version("1.5");
        let stencil = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 8,
                "Height" => 8,
                "ImageMask" => true,
            },
            vec![0u8; 8],
        );
        let id = doc.add_object(stencil);
        let resources = dictionary! {
            "XObject" => dictionary! { "St1" => Object::Reference(id) },
        };
        let records = walk_default(&doc, b"/St1 Do", &resources);
        assert!(records[0].is_mask);
    }

    // --- Form XObjects ---

    #[test]
    fn form_xobject_images_inherit_the_outer_matrix() {
        // Outer: scale 2 + translate (10, 20); the form draws /Im1 at its
        // origin, so ll must land on the translation
        let (doc, resources) = doc_with_image(Some((b"/Im1 Do", None)));
        let records = walk_default(&doc, b"q 2 0 0 2 10 20 cm /F1 Do Q", &resources);
        assert_eq!(records.len(), 1);
        assert_approx(records[0].placement.ll.x, 10.0);
        assert_approx(records[0].placement.ll.y, 20.0);
        assert_approx(records[0].placement.user_width, 2.0);
    }

    #[test]
    fn form_matrix_concatenates_before_its_content() {
        let matrix = vec![
            Object::Integer(3),
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(3),
            Object::Integer(5),
            Object::Integer(0),
        ];
        let (doc, resources) = doc_with_image(Some((b"/Im1 Do", Some(matrix))));
        let records = walk_default(&doc, b"/F1 Do", &resources);
        assert_approx(records[0].placement.ll.x, 5.0);
        assert_approx(records[0].placement.user_width, 3.0);
    }

    #[test]
    fn gstate_is_restored_after_form_recursion() {
        let (doc, resources) = doc_with_image(Some((b"5 0 0 5 0 0 cm /Im1 Do", None)));
        // The form scales internally; the image after /F1 Do must not see it
        let records = walk_default(&doc, b"/F1 Do /Im1 Do", &resources);
        assert_eq!(records.len(), 2);
        assert_approx(records[0].placement.user_width, 5.0);
        assert_approx(records[1].placement.user_width, 1.0);
    }

    #[test]
    fn recursion_depth_is_limited() {
        // A form that invokes itself
        let mut doc = lopdf::Document::with_version("1.5");
        let form_id = doc.new_object_id();
        let form = Stream::new(
            dictionary! {
                "Subtype" => "Form",
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "F1" => Object::Reference(form_id) },
                },
            },
            b"/F1 Do".to_vec(),
        );
        doc.objects.insert(form_id, Object::Stream(form));
        let resources = dictionary! {
            "XObject" => dictionary! { "F1" => Object::Reference(form_id) },
        };
        let err = walk_page_images(&doc, b"/F1 Do", &resources, false, &WalkOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("recursion depth"));
    }

    // --- Inline images ---

    #[test]
    fn inline_dict_abbreviations_are_expanded() {
        let (doc, resources) = doc_with_image(None);
        let records = walk_default(
            &doc,
            b"BI /W 4 /H 1 /BPC 8 /CS /G /IM false ID \x01\x02\x03\x04 EI",
            &resources,
        );
        assert_eq!(records.len(), 1);
        let ImageSource::Inline { dict, data, .. } = &records[0].source else {
            panic!("expected inline source");
        };
        assert_eq!(dict.get(b"Width").unwrap().as_i64().unwrap(), 4);
        assert_eq!(dict.get(b"Height").unwrap().as_i64().unwrap(), 1);
        assert_eq!(dict.get(b"BitsPerComponent").unwrap().as_i64().unwrap(), 8);
        assert_eq!(
            dict.get(b"ColorSpace").unwrap().as_name_str().unwrap(),
            "DeviceGray"
        );
        assert_eq!(data, &[1, 2, 3, 4]);
    }

    #[test]
    fn inline_filter_abbreviations_are_expanded() {
        let (doc, resources) = doc_with_image(None);
        let records = walk_default(
            &doc,
            b"BI /W 2 /H 1 /BPC 8 /CS /G /F /AHx ID 0102> EI",
            &resources,
        );
        let ImageSource::Inline { dict, .. } = &records[0].source else {
            panic!("expected inline source");
        };
        assert_eq!(
            dict.get(b"Filter").unwrap().as_name_str().unwrap(),
            "ASCIIHexDecode"
        );
    }

    #[test]
    fn inline_placement_uses_current_matrix() {
        let (doc, resources) = doc_with_image(None);
        let records = walk_default(
            &doc,
            b"q 50 0 0 25 5 5 cm BI /W 2 /H 2 /BPC 8 /CS /G ID \x01\x02\x03\x04 EI Q",
            &resources,
        );
        assert_approx(records[0].placement.user_width, 50.0);
        assert_approx(records[0].placement.user_height, 25.0);
        assert_approx(records[0].placement.ll.x, 5.0);
    }

    #[test]
    fn malformed_stream_aborts_the_page() {
        let (doc, resources) = doc_with_image(None);
        let result = walk_page_images(
            &doc,
            b"(unterminated string",
            &resources,
            false,
            &WalkOptions::default(),
        );
        assert!(result.is_err());
    }

    // --- Resolution metadata ---

    #[test]
    fn dpi_follows_pixel_and_user_size() {
        let (doc, resources) = doc_with_image(None);
        // 4 px over 2 points → 144 dpi; 2 px over 1 point → 144 dpi
        let records = walk_default(&doc, b"q 2 0 0 1 0 0 cm /Im1 Do Q", &resources);
        assert_approx(records[0].placement.dpi_x, 144.0);
        assert_approx(records[0].placement.dpi_y, 144.0);
    }
}
