//! Logical line index over the current script text.
//!
//! Backed by a rope so text-mode views can map 1-based line numbers to character ranges in
//! O(log N) without rescanning the document on every highlight change.

use ropey::Rope;
use std::ops::Range;

/// Rope-backed line index.
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    rope: Rope,
}

impl LineIndex {
    /// Build an index from LF-normalized text.
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
        }
    }

    /// Character range of a zero-based line, excluding its newline.
    pub fn line_char_range(&self, line: usize) -> Option<Range<usize>> {
        if line >= self.rope.len_lines() {
            return None;
        }
        let start = self.rope.line_to_char(line);
        Some(start..start + self.line_len_chars(line))
    }

    /// Get complete text.
    pub fn get_text(&self) -> String {
        self.rope.to_string()
    }

    fn line_len_chars(&self, line: usize) -> usize {
        let start = self.rope.line_to_char(line);
        if line + 1 < self.rope.len_lines() {
            self.rope.line_to_char(line + 1) - start - 1 // -1 for newline
        } else {
            self.rope.len_chars() - start
        }
    }
}
