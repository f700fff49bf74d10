//! Transform tracking for one page's drawing-instruction stream.
//!
//! A [`TransformTracker`] is created per page and dropped with it; no
//! transform state is ever shared between pages.

use crate::geometry::AffineMatrix;

/// Mirrors the save / restore / compose instructions of a drawing stream.
#[derive(Debug, Clone, Default)]
pub struct TransformTracker {
    current: AffineMatrix,
    stack: Vec<AffineMatrix>,
}

impl TransformTracker {
    /// A tracker rooted at the identity matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker rooted at an arbitrary base transform.
    pub fn with_base(base: AffineMatrix) -> Self {
        Self {
            current: base,
            stack: Vec::new(),
        }
    }

    pub fn current(&self) -> &AffineMatrix {
        &self.current
    }

    /// Number of saved frames.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Push the current matrix; the current matrix is unchanged.
    pub fn save(&mut self) {
        self.stack.push(self.current);
    }

    /// Pop the last saved matrix into the current one.
    ///
    /// An unbalanced restore leaves the current matrix untouched.
    pub fn restore(&mut self) {
        if let Some(previous) = self.stack.pop() {
            self.current = previous;
        }
    }

    /// Concatenate `delta`, expressed in the current frame, onto the
    /// current matrix.
    pub fn compose(&mut self, delta: &AffineMatrix) {
        self.current = delta.multiply(&self.current);
    }
}
