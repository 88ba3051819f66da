//! Decode-array remapping of sample values.
//!
//! A PDF `/Decode` array linearly remaps raw samples per component before
//! color interpretation. [`DecodeTable`] holds one `(min, max, step)` entry
//! per component with `step = (max − min) / (2^bpc − 1)`. A decode array
//! that is a pure channel negation is not turned into a table at all — the
//! builder records a negation flag and flips color channels at finalize.

/// Per-component linear remap: `(min, max, step)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeEntry {
    /// Output value for a zero sample, in [0, 1] color scale.
    pub min: f64,
    /// Output value for a full-scale sample.
    pub max: f64,
    /// Increment per raw sample step: `(max − min) / (2^bpc − 1)`.
    pub step: f64,
}

/// A decode table with one entry per color component.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeTable {
    entries: Vec<DecodeEntry>,
}

impl DecodeTable {
    /// Build a table from the flat `[min_0, max_0, min_1, max_1, …]` array.
    ///
    /// Incomplete trailing pairs are ignored.
    pub fn from_pairs(values: &[f64], bpc: u8) -> Self {
        let denom = f64::from((1u16 << bpc) - 1);
        let entries = values
            .chunks_exact(2)
            .map(|pair| DecodeEntry {
                min: pair[0],
                max: pair[1],
                step: (pair[1] - pair[0]) / denom,
            })
            .collect();
        Self { entries }
    }

    /// Number of component entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remap one sample for component `component` to the byte range.
    ///
    /// `out = clamp(round(min + sample·step·255), 1, 255)`. The lower clamp
    /// bound is 1, not 0 — carried over from the original decode math.
    pub fn apply(&self, component: usize, sample: u8) -> u8 {
        let entry = match self.entries.get(component) {
            Some(e) => e,
            None => return sample,
        };
        let value = (entry.min + f64::from(sample) * entry.step) * 255.0;
        value.round().clamp(1.0, 255.0) as u8
    }

    /// Remap a palette index through the first entry.
    ///
    /// Indexed decode arrays are expressed in index units, so the result is
    /// `round(min + sample·step)` clamped to the byte range.
    pub fn apply_index(&self, sample: u8) -> u8 {
        let entry = match self.entries.first() {
            Some(e) => e,
            None => return sample,
        };
        let value = entry.min + f64::from(sample) * entry.step;
        value.round().clamp(0.0, 255.0) as u8
    }
}

/// The default decode array for a color space.
///
/// Device and ICC spaces default to `[0 1]` per component; Indexed spaces
/// default to `[0, 2^bpc − 1]`.
pub fn default_decode_array(num_components: usize, indexed: bool, bpc: u8) -> Vec<f64> {
    if indexed {
        vec![0.0, f64::from((1u16 << bpc) - 1)]
    } else {
        let mut values = Vec::with_capacity(num_components * 2);
        for _ in 0..num_components {
            values.push(0.0);
            values.push(1.0);
        }
        values
    }
}

/// True when `values` is a pure channel negation: every component pair is
/// `[1, 0]` and the arity is one of 1, 3 or 4 color components.
pub fn is_pure_negation(values: &[f64], num_components: usize) -> bool {
    if !matches!(num_components, 1 | 3 | 4) || values.len() != num_components * 2 {
        return false;
    }
    values
        .chunks_exact(2)
        .all(|pair| pair[0] == 1.0 && pair[1] == 0.0)
}
