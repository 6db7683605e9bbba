//! Block view projector.
//!
//! The block list is a pure function of the buffer text. Every structural edit is a text
//! transformation: locate the command line with [`ScriptParser::command_lines`], splice the
//! serialized line, and hand the new text back to the caller for `update_content`.

use tks_lang::LanguageConfig;

use crate::command::Command;
use crate::error::EditError;
use crate::parser::{CommandLine, ScriptParser};

/// Stateless projector over a borrowed language table.
#[derive(Debug, Clone, Copy)]
pub struct Projector<'c> {
    parser: ScriptParser<'c>,
}

impl<'c> Projector<'c> {
    /// Create a projector for the given language table.
    pub fn new(config: &'c LanguageConfig) -> Self {
        Self {
            parser: ScriptParser::new(config),
        }
    }

    /// Ordered command list of `text`.
    pub fn project(&self, text: &str) -> Vec<Command> {
        self.parser.parse(text)
    }

    /// Number of command lines in `text`.
    pub fn count(&self, text: &str) -> usize {
        self.parser.command_lines(text).len()
    }

    /// Append `command` at the end of the steps section.
    ///
    /// A text without a steps marker gets one first, so the new command is projectable.
    pub fn append(&self, text: &str, command: &Command) -> String {
        let lines = self.parser.command_lines(text);
        let line = format!("{}{}", indent_of(&lines), command.to_line());

        let mut out = text.to_string();
        if !self.parser.has_steps_marker(text) {
            push_line(&mut out, &self.parser.config().steps_marker());
        }
        push_line(&mut out, &line);
        out
    }

    /// Insert `command` before the `index`-th command line. `index == count` appends.
    pub fn insert(&self, text: &str, command: &Command, index: usize) -> Result<String, EditError> {
        let lines = self.parser.command_lines(text);
        if index == lines.len() {
            return Ok(self.append(text, command));
        }
        let target = lines.get(index).ok_or(EditError::IndexOutOfRange {
            index,
            count: lines.len(),
        })?;

        let line = format!("{}{}", leading_whitespace(target.text), command.to_line());
        let mut all: Vec<&str> = text.split('\n').collect();
        all.insert(target.index, &line);
        Ok(all.join("\n"))
    }

    /// Delete the `index`-th command line.
    pub fn remove(&self, text: &str, index: usize) -> Result<String, EditError> {
        let lines = self.parser.command_lines(text);
        let target = lines.get(index).ok_or(EditError::IndexOutOfRange {
            index,
            count: lines.len(),
        })?;

        let mut all: Vec<&str> = text.split('\n').collect();
        all.remove(target.index);
        Ok(all.join("\n"))
    }

    /// Move the `from`-th command line so it lands before the command that was at `to`.
    ///
    /// Returns `None` (nothing to do) when `from == to` or either index is outside
    /// `[0, count)`. The moved line keeps its exact text.
    pub fn reorder(&self, text: &str, from: usize, to: usize) -> Option<String> {
        let lines = self.parser.command_lines(text);
        let count = lines.len();
        if from == to || from >= count || to >= count {
            return None;
        }

        let moved = lines[from];
        let target = if from < to { to - 1 } else { to };
        let remaining: Vec<CommandLine<'_>> = lines
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != from)
            .map(|(_, line)| *line)
            .collect();

        let mut all: Vec<&str> = text.split('\n').collect();
        all.remove(moved.index);
        // Line indices after the removed line shift up by one.
        let shifted = |line: &CommandLine<'_>| {
            if line.index > moved.index {
                line.index - 1
            } else {
                line.index
            }
        };
        let at = remaining.get(target).map_or(moved.index, shifted);
        all.insert(at, moved.text);
        Some(all.join("\n"))
    }

    /// Replace the parameter `name` of the `index`-th command and reserialize that line.
    pub fn update_param(
        &self,
        text: &str,
        index: usize,
        name: &str,
        value: &str,
    ) -> Result<String, EditError> {
        let lines = self.parser.command_lines(text);
        let target = lines.get(index).ok_or(EditError::IndexOutOfRange {
            index,
            count: lines.len(),
        })?;
        let command = self
            .parser
            .parse_line(target.text, target.line_number())
            .ok_or(EditError::IndexOutOfRange {
                index,
                count: lines.len(),
            })?;

        let updated = command.with_param(name, value)?;
        let line = format!("{}{}", leading_whitespace(target.text), updated.to_line());
        let mut all: Vec<&str> = text.split('\n').collect();
        all[target.index] = &line;
        Ok(all.join("\n"))
    }
}

/// Vertical extent of a rendered block, in any consistent unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockExtent {
    /// Top edge.
    pub top: f32,
    /// Bottom edge.
    pub bottom: f32,
}

impl BlockExtent {
    /// Create an extent.
    pub fn new(top: f32, bottom: f32) -> Self {
        Self { top, bottom }
    }
}

/// The insertion boundary closest to `pointer_y`, expressed as the index of the block the drop
/// lands before (`extents.len()` for "after the last block").
///
/// While dragging block `d`, the slot it already occupies is not a candidate. Returns `None` when
/// no candidate exists (the dragged block is the only one).
pub fn nearest_insertion_index(
    extents: &[BlockExtent],
    pointer_y: f32,
    dragging: Option<usize>,
) -> Option<usize> {
    let remaining: Vec<usize> = (0..extents.len())
        .filter(|i| Some(*i) != dragging)
        .collect();
    if remaining.is_empty() {
        return dragging.is_none().then_some(0);
    }

    let mut best: Option<(usize, f32)> = None;
    for k in 0..=remaining.len() {
        let (index, y) = match (k.checked_sub(1).map(|p| remaining[p]), remaining.get(k)) {
            (None, Some(&next)) => (next, extents[next].top),
            (Some(prev), Some(&next)) => (next, (extents[prev].bottom + extents[next].top) / 2.0),
            (Some(prev), None) => (extents.len(), extents[prev].bottom),
            (None, None) => continue,
        };
        if dragging.is_some_and(|d| index == d + 1) {
            continue;
        }
        let distance = (pointer_y - y).abs();
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((index, distance));
        }
    }
    best.map(|(index, _)| index)
}

fn push_line(out: &mut String, line: &str) {
    if out.is_empty() {
        out.push_str(line);
    } else if out.ends_with('\n') {
        out.push_str(line);
        out.push('\n');
    } else {
        out.push('\n');
        out.push_str(line);
    }
}

fn indent_of(lines: &[CommandLine<'_>]) -> &'static str {
    match lines.last() {
        Some(line) if line.text.starts_with('\t') => "\t",
        Some(line) if line.text.starts_with(' ') => "    ",
        _ => "",
    }
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}
