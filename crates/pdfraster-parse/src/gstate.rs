//! Graphics state stack for the content-stream walker.
//!
//! Implements the PDF graphics-state model the image walker needs: a stack
//! of transformation matrices managed by the `q` (save) and `Q` (restore)
//! operators, with matrix composition via `cm`. The stack always holds the
//! current matrix, so it is non-empty from construction on; an unmatched
//! `Q` at the bottom of the stack is ignored.

use pdfraster_core::geometry::{Matrix, UserPoint};

/// The walker's graphics state: a non-empty stack of matrices whose top is
/// the current transformation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicState {
    stack: Vec<Matrix>,
}

impl Default for GraphicState {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicState {
    /// Create a state with the identity matrix current.
    pub fn new() -> Self {
        Self::with_initial(Matrix::IDENTITY)
    }

    /// Create a state with `initial` as the current matrix.
    pub fn with_initial(initial: Matrix) -> Self {
        Self {
            stack: vec![initial],
        }
    }

    /// The current transformation matrix.
    pub fn current(&self) -> &Matrix {
        self.stack.last().expect("graphic state stack is non-empty")
    }

    /// Current stack depth, including the live matrix.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// `q` operator: push a copy of the current matrix.
    pub fn save(&mut self) {
        self.stack.push(*self.current());
    }

    /// `Q` operator: pop to the most recently saved matrix.
    ///
    /// Returns `false` (and changes nothing) when only the live matrix
    /// remains — an unmatched `Q`.
    pub fn restore(&mut self) -> bool {
        if self.stack.len() > 1 {
            self.stack.pop();
            true
        } else {
            false
        }
    }

    /// `cm` operator: compose the operand matrix onto the current one.
    pub fn concat(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) {
        let composed = Matrix::from_operands(a, b, c, d, e, f).then(self.current());
        *self.stack.last_mut().expect("non-empty stack") = composed;
    }

    /// Map a point through the current matrix into user space.
    pub fn to_user_space(&self, x: f64, y: f64) -> UserPoint {
        self.current().map(x, y)
    }
}
