//! Color-space resolution from PDF objects.
//!
//! Maps lopdf color-space objects (names, arrays, references, `/ColorSpace`
//! resource lookups) to the [`ColorSpace`] descriptor that the decode
//! pipeline reduces to a terminal device space.

use pdfraster_core::color::ColorSpace;

/// Resolve a color-space name to a descriptor.
///
/// Handles the device spaces (with their inline-image abbreviations) and
/// named color spaces looked up in the resources `/ColorSpace` dictionary.
pub fn resolve_color_space_name(
    name: &str,
    doc: &lopdf::Document,
    resources: &lopdf::Dictionary,
) -> Option<ColorSpace> {
    match name {
        "DeviceGray" | "G" | "CalGray" => Some(ColorSpace::DeviceGray),
        "DeviceRGB" | "RGB" | "CalRGB" => Some(ColorSpace::DeviceRgb),
        "DeviceCMYK" | "CMYK" => Some(ColorSpace::DeviceCmyk),
        _ => {
            let cs_dict = resources.get(b"ColorSpace").ok()?;
            let cs_dict = resolve_ref(doc, cs_dict).as_dict().ok()?;
            let cs_obj = cs_dict.get(name.as_bytes()).ok()?;
            resolve_color_space_object(cs_obj, doc)
        }
    }
}

/// Resolve a color space from a lopdf object (name, array or reference).
pub fn resolve_color_space_object(
    obj: &lopdf::Object,
    doc: &lopdf::Document,
) -> Option<ColorSpace> {
    match obj {
        lopdf::Object::Name(name) => match String::from_utf8_lossy(name).as_ref() {
            "DeviceGray" | "G" | "CalGray" => Some(ColorSpace::DeviceGray),
            "DeviceRGB" | "RGB" | "CalRGB" => Some(ColorSpace::DeviceRgb),
            "DeviceCMYK" | "CMYK" => Some(ColorSpace::DeviceCmyk),
            _ => None,
        },
        lopdf::Object::Array(arr) => resolve_color_space_array(arr, doc),
        lopdf::Object::Reference(id) => {
            let resolved = doc.get_object(*id).ok()?;
            resolve_color_space_object(resolved, doc)
        }
        _ => None,
    }
}

/// Resolve an array form like `[/ICCBased ref]` or
/// `[/Indexed base hival lookup]`.
fn resolve_color_space_array(arr: &[lopdf::Object], doc: &lopdf::Document) -> Option<ColorSpace> {
    let family = match arr.first() {
        Some(lopdf::Object::Name(n)) => String::from_utf8_lossy(n).to_string(),
        _ => return None,
    };

    match family.as_str() {
        "ICCBased" => resolve_icc_based(arr, doc),
        "Indexed" | "I" => resolve_indexed(arr, doc),
        "CalGray" | "DeviceGray" | "G" => Some(ColorSpace::DeviceGray),
        "CalRGB" | "DeviceRGB" | "RGB" => Some(ColorSpace::DeviceRgb),
        "DeviceCMYK" | "CMYK" => Some(ColorSpace::DeviceCmyk),
        _ => {
            log::debug!("unresolvable color space family {family}");
            None
        }
    }
}

/// Resolve `[/ICCBased stream]`: `/N` components, optional `/Alternate`,
/// and the raw profile bytes.
fn resolve_icc_based(arr: &[lopdf::Object], doc: &lopdf::Document) -> Option<ColorSpace> {
    if arr.len() < 2 {
        return None;
    }
    let stream = resolve_ref(doc, &arr[1]).as_stream().ok()?;

    let n = stream
        .dict
        .get(b"N")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(3) as u32;

    let alternate = stream
        .dict
        .get(b"Alternate")
        .ok()
        .and_then(|o| resolve_color_space_object(o, doc))
        .map(Box::new);

    let profile = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    Some(ColorSpace::Icc {
        n,
        alternate,
        profile,
    })
}

/// Resolve `[/Indexed base hival lookup]`. The lookup table may be a
/// string, a stream, or a reference to either.
fn resolve_indexed(arr: &[lopdf::Object], doc: &lopdf::Document) -> Option<ColorSpace> {
    if arr.len() < 4 {
        return None;
    }

    let base = resolve_color_space_object(&arr[1], doc)?;
    let hival = resolve_ref(doc, &arr[2]).as_i64().ok()? as u32;

    let lookup = match resolve_ref(doc, &arr[3]) {
        lopdf::Object::String(bytes, _) => bytes.clone(),
        lopdf::Object::Stream(s) => s
            .decompressed_content()
            .unwrap_or_else(|_| s.content.clone()),
        _ => return None,
    };

    Some(ColorSpace::Indexed {
        base: Box::new(base),
        hival,
        lookup,
    })
}

/// Resolve an indirect reference, returning the referenced object.
/// Non-references come back as-is.
pub(crate) fn resolve_ref<'a>(
    doc: &'a lopdf::Document,
    obj: &'a lopdf::Object,
) -> &'a lopdf::Object {
    match obj {
        lopdf::Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}
