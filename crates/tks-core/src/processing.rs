//! Generic document processing interfaces.
//!
//! Highlighters and other analyzers produce [`ProcessingEdit`] values from the script text; the
//! editor applies them to its text view via
//! [`DualModeEditor::apply_processing_edits`](crate::DualModeEditor::apply_processing_edits).

use crate::intervals::{Interval, StyleLayerId};

/// A change to derived view state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingEdit {
    /// Replace an entire style layer with the given intervals (char offsets).
    ReplaceStyleLayer {
        /// The style layer being replaced.
        layer: StyleLayerId,
        /// The full set of style intervals for the layer (char offsets, half-open).
        intervals: Vec<Interval>,
    },
    /// Clear a style layer.
    ClearStyleLayer {
        /// The style layer being cleared.
        layer: StyleLayerId,
    },
}

/// A processor that derives [`ProcessingEdit`]s from script text.
pub trait DocumentProcessor {
    /// The error type returned by [`DocumentProcessor::process`].
    type Error;

    /// Compute derived state updates for `text`.
    ///
    /// Implementations return edits instead of touching the editor so callers decide when to
    /// apply them.
    fn process(&mut self, text: &str) -> Result<Vec<ProcessingEdit>, Self::Error>;
}
