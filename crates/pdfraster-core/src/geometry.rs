//! Affine transforms for image placement.
//!
//! Content streams position every image by mapping the unit square through
//! the current transformation matrix, built up from `cm` operator operands.
//! [`Matrix`] stores those six coefficients and knows the two operations
//! the placement math needs: composing with another transform and mapping
//! the unit-square corners into user space.

/// A location on the page, in user-space points.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserPoint {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

/// An affine transform in the six-coefficient operand order of the `cm`
/// operator: `[a b c d e f]`, where `(a, b, c, d)` scale/rotate/skew and
/// `(e, f)` translate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Matrix {
    m: [f64; 6],
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    /// The transform that maps every point to itself.
    pub const IDENTITY: Matrix = Matrix {
        m: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
    };

    /// Build a transform from `cm` operands.
    pub fn from_operands(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self {
            m: [a, b, c, d, e, f],
        }
    }

    /// The six coefficients, back in operand order.
    pub fn coefficients(&self) -> [f64; 6] {
        self.m
    }

    /// Map a point: `x' = a·x + c·y + e`, `y' = b·x + d·y + f`.
    pub fn map(&self, x: f64, y: f64) -> UserPoint {
        let [a, b, c, d, e, f] = self.m;
        UserPoint {
            x: a * x + c * y + e,
            y: b * x + d * y + f,
        }
    }

    /// Compose with a second transform applied after this one.
    ///
    /// `inner.then(&outer)` maps a point through `inner` first; this is the
    /// composition the `cm` operator performs with the standing matrix.
    pub fn then(&self, outer: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.m;
        let [oa, ob, oc, od, oe, of] = outer.m;
        Matrix {
            m: [
                a * oa + b * oc,
                a * ob + b * od,
                c * oa + d * oc,
                c * ob + d * od,
                e * oa + f * oc + oe,
                e * ob + f * od + of,
            ],
        }
    }

    /// The mapped corners of the unit square an image is drawn on,
    /// in the order lower-left, upper-left, upper-right, lower-right.
    pub fn unit_square_corners(&self) -> [UserPoint; 4] {
        [
            self.map(0.0, 0.0),
            self.map(0.0, 1.0),
            self.map(1.0, 1.0),
            self.map(1.0, 0.0),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_point(p: UserPoint, x: f64, y: f64) {
        assert!((p.x - x).abs() < 1e-10, "x: expected {x}, got {}", p.x);
        assert!((p.y - y).abs() < 1e-10, "y: expected {y}, got {}", p.y);
    }

    // --- Identity and coefficients ---

    #[test]
    fn identity_maps_points_to_themselves() {
        assert_point(Matrix::IDENTITY.map(3.5, -7.0), 3.5, -7.0);
        assert_eq!(Matrix::default(), Matrix::IDENTITY);
    }

    #[test]
    fn coefficients_round_trip_operand_order() {
        let m = Matrix::from_operands(2.0, 0.5, -0.5, 3.0, 10.0, 20.0);
        assert_eq!(m.coefficients(), [2.0, 0.5, -0.5, 3.0, 10.0, 20.0]);
    }

    // --- Mapping single points ---

    #[test]
    fn pure_translation_shifts_the_origin() {
        // cm operands "1 0 0 1 36 600": place at (36, 600)
        let m = Matrix::from_operands(1.0, 0.0, 0.0, 1.0, 36.0, 600.0);
        assert_point(m.map(0.0, 0.0), 36.0, 600.0);
        assert_point(m.map(1.0, 1.0), 37.0, 601.0);
    }

    #[test]
    fn scale_operands_stretch_the_unit_square() {
        // "144 0 0 72 0 0": a 2-inch by 1-inch image
        let m = Matrix::from_operands(144.0, 0.0, 0.0, 72.0, 0.0, 0.0);
        assert_point(m.map(1.0, 0.0), 144.0, 0.0);
        assert_point(m.map(0.0, 1.0), 0.0, 72.0);
    }

    #[test]
    fn skew_coefficients_mix_axes() {
        let m = Matrix::from_operands(1.0, 2.0, 3.0, 1.0, 0.0, 0.0);
        // x' = x + 3y, y' = 2x + y
        assert_point(m.map(1.0, 1.0), 4.0, 3.0);
    }

    // --- Composition ---

    #[test]
    fn then_applies_the_receiver_first() {
        // Draw at double size, inside a frame shifted by (10, 20):
        // "1 0 0 1 10 20 cm" then "2 0 0 2 0 0 cm" — the image matrix
        // composes onto the standing frame matrix
        let frame = Matrix::from_operands(1.0, 0.0, 0.0, 1.0, 10.0, 20.0);
        let image = Matrix::from_operands(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let placed = image.then(&frame);
        assert_point(placed.map(0.0, 0.0), 10.0, 20.0);
        assert_point(placed.map(1.0, 1.0), 12.0, 22.0);
    }

    #[test]
    fn then_with_identity_changes_nothing() {
        let m = Matrix::from_operands(5.0, 0.0, 0.0, 7.0, 1.0, 2.0);
        assert_eq!(m.then(&Matrix::IDENTITY), m);
        assert_eq!(Matrix::IDENTITY.then(&m), m);
    }

    #[test]
    fn nested_translations_accumulate() {
        let outer = Matrix::from_operands(1.0, 0.0, 0.0, 1.0, 100.0, 0.0);
        let middle = Matrix::from_operands(1.0, 0.0, 0.0, 1.0, 10.0, 0.0);
        let inner = Matrix::from_operands(1.0, 0.0, 0.0, 1.0, 1.0, 0.0);
        let placed = inner.then(&middle.then(&outer));
        assert_point(placed.map(0.0, 0.0), 111.0, 0.0);
    }

    #[test]
    fn translation_inside_a_scaled_frame_is_scaled() {
        // A frame scaled 3× first, then a translation expressed inside it
        let frame = Matrix::from_operands(3.0, 0.0, 0.0, 3.0, 0.0, 0.0);
        let shift = Matrix::from_operands(1.0, 0.0, 0.0, 1.0, 10.0, 20.0);
        let placed = shift.then(&frame);
        assert_point(placed.map(0.0, 0.0), 30.0, 60.0);
    }

    // --- Unit-square corners ---

    #[test]
    fn corners_come_back_in_placement_order() {
        let m = Matrix::from_operands(200.0, 0.0, 0.0, 150.0, 100.0, 500.0);
        let [ll, ul, ur, lr] = m.unit_square_corners();
        assert_point(ll, 100.0, 500.0);
        assert_point(ul, 100.0, 650.0);
        assert_point(ur, 300.0, 650.0);
        assert_point(lr, 300.0, 500.0);
    }

    #[test]
    fn quarter_turn_rotates_the_corners() {
        // "0 1 -1 0 0 0": a 90° counter-clockwise placement
        let m = Matrix::from_operands(0.0, 1.0, -1.0, 0.0, 0.0, 0.0);
        let [ll, ul, ur, lr] = m.unit_square_corners();
        assert_point(ll, 0.0, 0.0);
        assert_point(ul, -1.0, 0.0);
        assert_point(ur, -1.0, 1.0);
        assert_point(lr, 0.0, 1.0);
    }

    #[test]
    fn mirrored_placement_flips_corner_sides() {
        // Negative horizontal scale draws the image right-to-left
        let m = Matrix::from_operands(-50.0, 0.0, 0.0, 50.0, 200.0, 0.0);
        let [ll, _, ur, _] = m.unit_square_corners();
        assert_point(ll, 200.0, 0.0);
        assert_point(ur, 150.0, 50.0);
    }
}
