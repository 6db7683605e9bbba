//! Text and block views.
//!
//! Views hold only render output derived from the buffer text (a line index, style layers, the
//! block list) plus presentation flags. They never own script content: every render takes the
//! current text and rebuilds.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use tks_lang::{Category, LanguageConfig, ParamDef};

use crate::command::Command;
use crate::intervals::{Interval, StyleLayerId};
use crate::line_index::LineIndex;
use crate::parser::ScriptParser;
use crate::processing::ProcessingEdit;

/// Kind of a line highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkKind {
    /// The line is being dispatched.
    Executing,
    /// The line failed.
    Error,
}

/// A highlight on a source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineMark {
    /// 1-based source line.
    pub line_number: usize,
    /// Highlight kind.
    pub kind: MarkKind,
}

impl LineMark {
    /// Executing mark.
    pub fn executing(line_number: usize) -> Self {
        Self {
            line_number,
            kind: MarkKind::Executing,
        }
    }

    /// Error mark.
    pub fn error(line_number: usize) -> Self {
        Self {
            line_number,
            kind: MarkKind::Error,
        }
    }
}

/// Result of a highlight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The mark was applied and the view redrew.
    Applied,
    /// The same mark was already shown. No redraw.
    Unchanged,
    /// The line is not a command line (or an error mark protects it). Existing mark kept.
    Ignored,
}

/// Behaviour shared by both views.
pub trait ScriptView {
    /// Rebuild from the current buffer text. Clears the mark.
    fn render(&mut self, text: &str, config: &LanguageConfig);
    /// Enable or disable editing.
    fn set_locked(&mut self, locked: bool);
    /// Whether editing is disabled.
    fn is_locked(&self) -> bool;
    /// Highlight a command line.
    fn mark_line(&mut self, mark: LineMark) -> MarkOutcome;
    /// Remove the highlight.
    fn clear_mark(&mut self);
    /// Current highlight.
    fn mark(&self) -> Option<LineMark>;
    /// Number of redraws so far (renders and mark changes).
    fn redraw_count(&self) -> u64;
}

/// Decide whether `mark` should replace `current`.
fn mark_decision(current: Option<LineMark>, mark: LineMark) -> Option<MarkOutcome> {
    match current {
        Some(existing) if existing == mark => Some(MarkOutcome::Unchanged),
        Some(existing)
            if existing.line_number == mark.line_number
                && existing.kind == MarkKind::Error
                && mark.kind == MarkKind::Executing =>
        {
            Some(MarkOutcome::Ignored)
        }
        _ => None,
    }
}

/// Plain-text view. Highlights resolve to character ranges.
#[derive(Debug, Default)]
pub struct TextView {
    line_index: LineIndex,
    command_lines: BTreeSet<usize>,
    style_layers: BTreeMap<StyleLayerId, Vec<Interval>>,
    mark: Option<(LineMark, Range<usize>)>,
    locked: bool,
    redraws: u64,
}

impl TextView {
    /// Create an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered text.
    pub fn text(&self) -> String {
        self.line_index.get_text()
    }

    /// Character range of the highlighted line.
    pub fn mark_range(&self) -> Option<Range<usize>> {
        self.mark.as_ref().map(|(_, range)| range.clone())
    }

    /// Intervals of a style layer.
    pub fn style_layer(&self, layer: StyleLayerId) -> &[Interval] {
        self.style_layers.get(&layer).map_or(&[], Vec::as_slice)
    }

    /// All style intervals overlapping `range`, across layers (layer order, then start).
    pub fn styles_in(&self, range: Range<usize>) -> Vec<&Interval> {
        let window = Interval::new(range.start, range.end, 0);
        self.style_layers
            .values()
            .flatten()
            .filter(|i| i.overlaps(&window))
            .collect()
    }

    /// Apply derived-state edits. Returns `true` if anything changed.
    pub fn apply_processing_edits(&mut self, edits: Vec<ProcessingEdit>) -> bool {
        let mut changed = false;
        for edit in edits {
            match edit {
                ProcessingEdit::ReplaceStyleLayer { layer, mut intervals } => {
                    intervals.sort_by_key(|i| (i.start, i.end));
                    if self.style_layers.get(&layer) != Some(&intervals) {
                        self.style_layers.insert(layer, intervals);
                        changed = true;
                    }
                }
                ProcessingEdit::ClearStyleLayer { layer } => {
                    changed |= self.style_layers.remove(&layer).is_some();
                }
            }
        }
        if changed {
            self.redraws += 1;
        }
        changed
    }
}

impl ScriptView for TextView {
    fn render(&mut self, text: &str, config: &LanguageConfig) {
        self.line_index = LineIndex::from_text(text);
        self.command_lines = ScriptParser::new(config)
            .command_lines(text)
            .iter()
            .map(|line| line.line_number())
            .collect();
        // Offsets of the old text are meaningless now.
        self.style_layers.clear();
        self.mark = None;
        self.redraws += 1;
    }

    fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn mark_line(&mut self, mark: LineMark) -> MarkOutcome {
        if !self.command_lines.contains(&mark.line_number) {
            return MarkOutcome::Ignored;
        }
        if let Some(outcome) = mark_decision(self.mark(), mark) {
            return outcome;
        }
        let Some(range) = self.line_index.line_char_range(mark.line_number - 1) else {
            return MarkOutcome::Ignored;
        };
        self.mark = Some((mark, range));
        self.redraws += 1;
        MarkOutcome::Applied
    }

    fn clear_mark(&mut self) {
        if self.mark.take().is_some() {
            self.redraws += 1;
        }
    }

    fn mark(&self) -> Option<LineMark> {
        self.mark.as_ref().map(|(mark, _)| *mark)
    }

    fn redraw_count(&self) -> u64 {
        self.redraws
    }
}

/// One form field of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockField {
    /// Parameter definition from the keyword table.
    pub def: ParamDef,
    /// Raw value present in the source, if any.
    pub value: Option<String>,
}

impl BlockField {
    /// Value to show: the source value, else the default, else empty.
    pub fn display_value(&self) -> &str {
        self.value.as_deref().or(self.def.default).unwrap_or("")
    }
}

/// Visual rendering of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Position in the command list.
    pub index: usize,
    /// The command this block renders.
    pub command: Command,
    /// Palette category.
    pub category: Category,
    /// Form fields, one per parameter definition (plus any surplus parameters).
    pub fields: Vec<BlockField>,
}

impl Block {
    fn from_command(index: usize, command: Command) -> Self {
        let defs = command.keyword.params();
        let mut fields: Vec<BlockField> = defs
            .iter()
            .enumerate()
            .map(|(i, def)| BlockField {
                def: *def,
                value: command.params.get(i).map(|p| p.raw.clone()),
            })
            .collect();
        // Surplus parameters are still shown, typed as whatever they parsed as.
        for param in command.params.iter().skip(defs.len()) {
            fields.push(BlockField {
                def: ParamDef {
                    name: "",
                    kind: param.kind(),
                    required: false,
                    default: None,
                },
                value: Some(param.raw.clone()),
            });
        }
        Self {
            index,
            category: command.keyword.category(),
            command,
            fields,
        }
    }

    /// Display colour of the block's category.
    pub fn color(&self) -> &'static str {
        self.category.color()
    }
}

/// Block view. Highlights resolve to block indices.
#[derive(Debug, Default)]
pub struct BlockView {
    blocks: Vec<Block>,
    mark: Option<(LineMark, usize)>,
    locked: bool,
    redraws: u64,
}

impl BlockView {
    /// Create an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered blocks.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Index of the highlighted block.
    pub fn marked_block(&self) -> Option<usize> {
        self.mark.map(|(_, index)| index)
    }
}

impl ScriptView for BlockView {
    fn render(&mut self, text: &str, config: &LanguageConfig) {
        self.blocks = ScriptParser::new(config)
            .parse(text)
            .into_iter()
            .enumerate()
            .map(|(index, command)| Block::from_command(index, command))
            .collect();
        self.mark = None;
        self.redraws += 1;
    }

    fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn mark_line(&mut self, mark: LineMark) -> MarkOutcome {
        let Some(index) = self
            .blocks
            .iter()
            .position(|b| b.command.line_number == mark.line_number)
        else {
            return MarkOutcome::Ignored;
        };
        if let Some(outcome) = mark_decision(self.mark(), mark) {
            return outcome;
        }
        self.mark = Some((mark, index));
        self.redraws += 1;
        MarkOutcome::Applied
    }

    fn clear_mark(&mut self) {
        if self.mark.take().is_some() {
            self.redraws += 1;
        }
    }

    fn mark(&self) -> Option<LineMark> {
        self.mark.map(|(mark, _)| mark)
    }

    fn redraw_count(&self) -> u64 {
        self.redraws
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tks_lang::{Keyword, ParamKind};

    const SCRIPT: &str = "步骤:\n点击 [{a}]\n# c\n按压 [{b}]";

    #[test]
    fn test_text_view_marks_command_lines_only() {
        let cfg = LanguageConfig::tks();
        let mut view = TextView::new();
        view.render(SCRIPT, &cfg);

        assert_eq!(view.mark_line(LineMark::executing(2)), MarkOutcome::Applied);
        assert_eq!(view.mark_range(), Some(4..12));
        let redraws = view.redraw_count();
        assert_eq!(view.mark_line(LineMark::executing(2)), MarkOutcome::Unchanged);
        assert_eq!(view.mark_line(LineMark::executing(3)), MarkOutcome::Ignored);
        assert_eq!(view.redraw_count(), redraws);
        assert_eq!(view.mark(), Some(LineMark::executing(2)));
    }

    #[test]
    fn test_error_mark_is_not_downgraded() {
        let cfg = LanguageConfig::tks();
        let mut view = BlockView::new();
        view.render(SCRIPT, &cfg);

        assert_eq!(view.mark_line(LineMark::error(4)), MarkOutcome::Applied);
        assert_eq!(view.marked_block(), Some(1));
        assert_eq!(view.mark_line(LineMark::executing(4)), MarkOutcome::Ignored);
        assert_eq!(view.mark_line(LineMark::executing(2)), MarkOutcome::Applied);
        assert_eq!(view.marked_block(), Some(0));
    }

    #[test]
    fn test_block_fields_follow_keyword_table() {
        let cfg = LanguageConfig::tks();
        let mut view = BlockView::new();
        view.render(SCRIPT, &cfg);

        let press = &view.blocks()[1];
        assert_eq!(press.command.keyword, Keyword::Press);
        assert_eq!(press.category, Category::Action);
        assert_eq!(press.fields.len(), 2);
        assert_eq!(press.fields[0].value.as_deref(), Some("{b}"));
        assert_eq!(press.fields[1].value, None);
        assert_eq!(press.fields[1].display_value(), "1000");
        assert_eq!(press.fields[1].def.kind, ParamKind::Number);
    }

    #[test]
    fn test_style_layers() {
        let cfg = LanguageConfig::tks();
        let mut view = TextView::new();
        view.render(SCRIPT, &cfg);

        let edits = vec![ProcessingEdit::ReplaceStyleLayer {
            layer: StyleLayerId::SIMPLE_SYNTAX,
            intervals: vec![Interval::new(4, 6, 7), Interval::new(0, 2, 1)],
        }];
        assert!(view.apply_processing_edits(edits.clone()));
        assert!(!view.apply_processing_edits(edits));
        assert_eq!(view.style_layer(StyleLayerId::SIMPLE_SYNTAX)[0].start, 0);
        assert_eq!(view.styles_in(3..5).len(), 1);

        assert!(view.apply_processing_edits(vec![ProcessingEdit::ClearStyleLayer {
            layer: StyleLayerId::SIMPLE_SYNTAX,
        }]));
        assert!(view.style_layer(StyleLayerId::SIMPLE_SYNTAX).is_empty());
    }
}
