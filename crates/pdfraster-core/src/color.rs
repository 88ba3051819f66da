//! Color-space descriptors and base-space reduction.
//!
//! A PDF image color space can be a chain: an Indexed space over a base, an
//! ICCBased space with an Alternate, or a terminal device space.
//! [`ColorSpace`] describes the chain; [`ColorSpace::resolve_base`]
//! collapses it to one of the terminal [`DeviceSpace`]s.

use crate::error::DecodeError;

/// A terminal device color space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceSpace {
    /// DeviceGray (1 component).
    Gray,
    /// DeviceRGB (3 components).
    Rgb,
    /// DeviceCMYK (4 components).
    Cmyk,
}

impl DeviceSpace {
    /// Number of color components per pixel.
    pub fn components(&self) -> usize {
        match self {
            DeviceSpace::Gray => 1,
            DeviceSpace::Rgb => 3,
            DeviceSpace::Cmyk => 4,
        }
    }

    /// The PDF name of this space.
    pub fn name(&self) -> &'static str {
        match self {
            DeviceSpace::Gray => "DeviceGray",
            DeviceSpace::Rgb => "DeviceRGB",
            DeviceSpace::Cmyk => "DeviceCMYK",
        }
    }
}

/// A resolved PDF color-space descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    /// DeviceGray (1 component).
    DeviceGray,
    /// DeviceRGB (3 components).
    DeviceRgb,
    /// DeviceCMYK (4 components).
    DeviceCmyk,
    /// Indexed color space: samples are palette indices.
    Indexed {
        /// Base space the palette entries are expressed in.
        base: Box<ColorSpace>,
        /// Maximum valid index value.
        hival: u32,
        /// Palette: `(hival + 1) × components(base)` raw bytes.
        lookup: Vec<u8>,
    },
    /// ICCBased color space with component count, optional Alternate and
    /// the raw ICC profile bytes.
    Icc {
        /// Number of color components (`/N`).
        n: u32,
        /// Alternate color space, when present.
        alternate: Option<Box<ColorSpace>>,
        /// Raw ICC profile payload, carried into the decoded output.
        profile: Vec<u8>,
    },
}

impl ColorSpace {
    /// Number of components a raw sample of this space carries.
    ///
    /// Indexed samples are single palette indices regardless of the base.
    pub fn num_components(&self) -> usize {
        match self {
            ColorSpace::DeviceGray => 1,
            ColorSpace::DeviceRgb => 3,
            ColorSpace::DeviceCmyk => 4,
            ColorSpace::Indexed { .. } => 1,
            ColorSpace::Icc { n, .. } => *n as usize,
        }
    }

    /// True when the outermost layer is Indexed.
    pub fn is_indexed(&self) -> bool {
        matches!(self, ColorSpace::Indexed { .. })
    }

    /// Collapse the chain to a terminal device space.
    ///
    /// Indexed reduces to its base; ICC reduces to its Alternate, or, when
    /// none is present, to the device space inferred from the component
    /// count. The reduction re-applies until a terminal space is reached,
    /// so it runs in at most the nesting depth of the chain.
    ///
    /// # Errors
    ///
    /// [`DecodeError::UnsupportedColorSpace`] when ICC inference meets a
    /// component count outside {1, 3, 4}.
    pub fn resolve_base(&self) -> Result<DeviceSpace, DecodeError> {
        let mut current = self;
        loop {
            match current {
                ColorSpace::DeviceGray => return Ok(DeviceSpace::Gray),
                ColorSpace::DeviceRgb => return Ok(DeviceSpace::Rgb),
                ColorSpace::DeviceCmyk => return Ok(DeviceSpace::Cmyk),
                ColorSpace::Indexed { base, .. } => current = base,
                ColorSpace::Icc { n, alternate, .. } => match alternate {
                    Some(alt) => current = alt,
                    None => {
                        return match n {
                            1 => Ok(DeviceSpace::Gray),
                            3 => Ok(DeviceSpace::Rgb),
                            4 => Ok(DeviceSpace::Cmyk),
                            other => Err(DecodeError::UnsupportedColorSpace(format!(
                                "ICC profile with {other} components"
                            ))),
                        };
                    }
                },
            }
        }
    }

    /// Palette access for an outer Indexed layer: `(base, hival, lookup)`.
    pub fn palette(&self) -> Option<(&ColorSpace, u32, &[u8])> {
        match self {
            ColorSpace::Indexed {
                base,
                hival,
                lookup,
            } => Some((base, *hival, lookup)),
            _ => None,
        }
    }

    /// The ICC profile bytes carried anywhere in the chain, if any.
    pub fn icc_profile(&self) -> Option<&[u8]> {
        match self {
            ColorSpace::Icc { profile, .. } if !profile.is_empty() => Some(profile),
            ColorSpace::Indexed { base, .. } => base.icc_profile(),
            ColorSpace::Icc {
                alternate: Some(alt),
                ..
            } => alt.icc_profile(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- DeviceSpace ---

    #[test]
    fn device_space_components() {
        assert_eq!(DeviceSpace::Gray.components(), 1);
        assert_eq!(DeviceSpace::Rgb.components(), 3);
        assert_eq!(DeviceSpace::Cmyk.components(), 4);
    }

    #[test]
    fn device_space_names() {
        assert_eq!(DeviceSpace::Gray.name(), "DeviceGray");
        assert_eq!(DeviceSpace::Rgb.name(), "DeviceRGB");
        assert_eq!(DeviceSpace::Cmyk.name(), "DeviceCMYK");
    }

    // --- num_components ---

    #[test]
    fn num_components_per_family() {
        assert_eq!(ColorSpace::DeviceGray.num_components(), 1);
        assert_eq!(ColorSpace::DeviceRgb.num_components(), 3);
        assert_eq!(ColorSpace::DeviceCmyk.num_components(), 4);
        let indexed = ColorSpace::Indexed {
            base: Box::new(ColorSpace::DeviceRgb),
            hival: 1,
            lookup: vec![0; 6],
        };
        assert_eq!(indexed.num_components(), 1);
    }

    // --- resolve_base ---

    #[test]
    fn device_spaces_resolve_to_themselves() {
        assert_eq!(
            ColorSpace::DeviceGray.resolve_base().unwrap(),
            DeviceSpace::Gray
        );
        assert_eq!(
            ColorSpace::DeviceRgb.resolve_base().unwrap(),
            DeviceSpace::Rgb
        );
        assert_eq!(
            ColorSpace::DeviceCmyk.resolve_base().unwrap(),
            DeviceSpace::Cmyk
        );
    }

    #[test]
    fn indexed_resolves_to_base() {
        let cs = ColorSpace::Indexed {
            base: Box::new(ColorSpace::DeviceRgb),
            hival: 255,
            lookup: vec![0; 768],
        };
        assert_eq!(cs.resolve_base().unwrap(), DeviceSpace::Rgb);
    }

    #[test]
    fn icc_resolves_via_alternate() {
        let cs = ColorSpace::Icc {
            n: 4,
            alternate: Some(Box::new(ColorSpace::DeviceCmyk)),
            profile: Vec::new(),
        };
        assert_eq!(cs.resolve_base().unwrap(), DeviceSpace::Cmyk);
    }

    #[test]
    fn icc_without_alternate_infers_from_n() {
        for (n, expected) in [
            (1, DeviceSpace::Gray),
            (3, DeviceSpace::Rgb),
            (4, DeviceSpace::Cmyk),
        ] {
            let cs = ColorSpace::Icc {
                n,
                alternate: None,
                profile: Vec::new(),
            };
            assert_eq!(cs.resolve_base().unwrap(), expected);
        }
    }

    #[test]
    fn icc_with_bad_component_count_fails() {
        let cs = ColorSpace::Icc {
            n: 2,
            alternate: None,
            profile: Vec::new(),
        };
        assert!(matches!(
            cs.resolve_base(),
            Err(DecodeError::UnsupportedColorSpace(_))
        ));
    }

    #[test]
    fn nested_indexed_over_icc_resolves() {
        // Indexed → ICC(N=3, no alternate) → RGB
        let cs = ColorSpace::Indexed {
            base: Box::new(ColorSpace::Icc {
                n: 3,
                alternate: None,
                profile: Vec::new(),
            }),
            hival: 15,
            lookup: vec![0; 48],
        };
        assert_eq!(cs.resolve_base().unwrap(), DeviceSpace::Rgb);
    }

    #[test]
    fn icc_alternate_chain_resolves() {
        // ICC → Indexed → Gray
        let cs = ColorSpace::Icc {
            n: 1,
            alternate: Some(Box::new(ColorSpace::Indexed {
                base: Box::new(ColorSpace::DeviceGray),
                hival: 1,
                lookup: vec![0, 255],
            })),
            profile: Vec::new(),
        };
        assert_eq!(cs.resolve_base().unwrap(), DeviceSpace::Gray);
    }

    // --- palette / profile access ---

    #[test]
    fn palette_only_on_indexed() {
        let cs = ColorSpace::Indexed {
            base: Box::new(ColorSpace::DeviceRgb),
            hival: 1,
            lookup: vec![0, 0, 0, 255, 255, 255],
        };
        let (base, hival, lookup) = cs.palette().unwrap();
        assert_eq!(*base, ColorSpace::DeviceRgb);
        assert_eq!(hival, 1);
        assert_eq!(lookup.len(), 6);

        assert!(ColorSpace::DeviceGray.palette().is_none());
    }

    #[test]
    fn icc_profile_found_through_indexed_base() {
        let cs = ColorSpace::Indexed {
            base: Box::new(ColorSpace::Icc {
                n: 3,
                alternate: None,
                profile: vec![1, 2, 3],
            }),
            hival: 0,
            lookup: vec![0, 0, 0],
        };
        assert_eq!(cs.icc_profile(), Some(&[1u8, 2, 3][..]));
        assert!(ColorSpace::DeviceRgb.icc_profile().is_none());
    }
}
