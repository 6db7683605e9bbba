//! Style intervals and style layers.
//!
//! Highlighters produce [`Interval`]s over character offsets. Each source writes into its own
//! [`StyleLayerId`] so replacing the syntax layer never disturbs other overlays.

/// Style ID type
pub type StyleId = u32;

/// Style layer ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StyleLayerId(pub u32);

impl StyleLayerId {
    /// Token-based syntax highlighting layer.
    pub const SIMPLE_SYNTAX: Self = Self(2);
}

/// Interval structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    /// Start offset (characters)
    pub start: usize,
    /// End offset (exclusive)
    pub end: usize,
    /// Style ID
    pub style_id: StyleId,
}

impl Interval {
    /// Create a new interval with `[start, end)` offsets and a style id.
    pub fn new(start: usize, end: usize, style_id: StyleId) -> Self {
        Self {
            start,
            end,
            style_id,
        }
    }

    /// Check if two intervals overlap
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_overlap() {
        let a = Interval::new(0, 4, 1);
        let b = Interval::new(3, 6, 2);
        let c = Interval::new(4, 6, 2);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
