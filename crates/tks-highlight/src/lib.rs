//! `tks-highlight` - Syntax highlighting for TKS scripts.
//!
//! Highlighting re-tokenizes the buffer text with [`Tokenizer`] and maps token kinds to style ids.
//! It never consults the command parser: a line that fails to parse still gets coloured token by
//! token. Optional regex rules can overlay extra styles (e.g. `${var}` placeholders).

use std::convert::Infallible;
use std::sync::Arc;

use regex::Regex;
use tks_core::{
    DocumentProcessor, Interval, ProcessingEdit, StyleId, StyleLayerId, TokenKind, Tokenizer,
};
use tks_lang::LanguageConfig;

/// Default `StyleId` constants for TKS highlighting.
///
/// These are only identifiers. UI/theme layer is expected to map them to actual colors.
pub const TKS_STYLE_COMMENT: StyleId = 0x0500_0001;
/// Steps marker keyword.
pub const TKS_STYLE_SECTION: StyleId = 0x0500_0002;
/// Command keyword.
pub const TKS_STYLE_COMMAND: StyleId = 0x0500_0003;
/// `@{image}`
pub const TKS_STYLE_IMAGE_LOCATOR: StyleId = 0x0500_0004;
/// `{x,y}`
pub const TKS_STYLE_COORDINATE: StyleId = 0x0500_0005;
/// `{element}`
pub const TKS_STYLE_LOCATOR: StyleId = 0x0500_0006;
/// `&resourceId` etc.
pub const TKS_STYLE_STRATEGY: StyleId = 0x0500_0007;
/// `up` / `down` / `left` / `right`
pub const TKS_STYLE_DIRECTION: StyleId = 0x0500_0008;
/// Assertion states.
pub const TKS_STYLE_ASSERTION: StyleId = 0x0500_0009;
/// `==`
pub const TKS_STYLE_OPERATOR: StyleId = 0x0500_000a;
/// Integer literals.
pub const TKS_STYLE_NUMBER: StyleId = 0x0500_000b;
/// `[` / `]`
pub const TKS_STYLE_BRACKET: StyleId = 0x0500_000c;

/// Token kind → style id table. `None` leaves the token unstyled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TksStyles {
    pub comment: Option<StyleId>,
    pub section: Option<StyleId>,
    pub command: Option<StyleId>,
    pub image_locator: Option<StyleId>,
    pub coordinate: Option<StyleId>,
    pub locator: Option<StyleId>,
    pub strategy: Option<StyleId>,
    pub direction: Option<StyleId>,
    pub assertion_state: Option<StyleId>,
    pub operator: Option<StyleId>,
    pub number: Option<StyleId>,
    pub bracket: Option<StyleId>,
}

impl Default for TksStyles {
    fn default() -> Self {
        Self {
            comment: Some(TKS_STYLE_COMMENT),
            section: Some(TKS_STYLE_SECTION),
            command: Some(TKS_STYLE_COMMAND),
            image_locator: Some(TKS_STYLE_IMAGE_LOCATOR),
            coordinate: Some(TKS_STYLE_COORDINATE),
            locator: Some(TKS_STYLE_LOCATOR),
            strategy: Some(TKS_STYLE_STRATEGY),
            direction: Some(TKS_STYLE_DIRECTION),
            assertion_state: Some(TKS_STYLE_ASSERTION),
            operator: Some(TKS_STYLE_OPERATOR),
            number: Some(TKS_STYLE_NUMBER),
            bracket: Some(TKS_STYLE_BRACKET),
        }
    }
}

impl TksStyles {
    /// Style for a token kind.
    pub fn style_for(&self, kind: TokenKind) -> Option<StyleId> {
        match kind {
            TokenKind::Comment => self.comment,
            TokenKind::Section => self.section,
            TokenKind::Command => self.command,
            TokenKind::ImageLocator => self.image_locator,
            TokenKind::Coordinate => self.coordinate,
            TokenKind::Locator => self.locator,
            TokenKind::LocatorStrategy => self.strategy,
            TokenKind::Direction => self.direction,
            TokenKind::AssertionState => self.assertion_state,
            TokenKind::Operator => self.operator,
            TokenKind::Number => self.number,
            TokenKind::Bracket => self.bracket,
            TokenKind::Comma | TokenKind::Text | TokenKind::Newline => None,
        }
    }
}

/// A single regex highlighting rule, applied per line on top of token styles.
#[derive(Debug, Clone)]
pub struct RegexRule {
    regex: Regex,
    style_id: StyleId,
    capture_group: Option<usize>,
}

impl RegexRule {
    /// Compile a rule that styles every match of `pattern`.
    pub fn new(pattern: &str, style_id: StyleId) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            style_id,
            capture_group: None,
        })
    }

    /// Only style the given capture group instead of the whole match.
    pub fn with_capture_group(mut self, group: usize) -> Self {
        self.capture_group = Some(group);
        self
    }

    /// The style this rule applies.
    pub fn style_id(&self) -> StyleId {
        self.style_id
    }

    fn matches(&self, line: &str) -> Vec<(usize, usize)> {
        match self.capture_group {
            Some(group) => self
                .regex
                .captures_iter(line)
                .filter_map(|caps| caps.get(group))
                .map(|m| (m.start(), m.end()))
                .collect(),
            None => self
                .regex
                .find_iter(line)
                .map(|m| (m.start(), m.end()))
                .collect(),
        }
    }
}

/// Token-based TKS highlighter.
#[derive(Debug, Clone)]
pub struct TksHighlighter {
    config: Arc<LanguageConfig>,
    styles: TksStyles,
    rules: Vec<RegexRule>,
}

impl TksHighlighter {
    /// Create a highlighter for `config` using `styles`.
    ///
    /// Pass the same table the editor was opened with so both agree on keywords and comments.
    pub fn new(config: Arc<LanguageConfig>, styles: TksStyles) -> Self {
        Self {
            config,
            styles,
            rules: Vec::new(),
        }
    }

    /// Add an overlay rule.
    pub fn with_rule(mut self, rule: RegexRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Language table.
    pub fn config(&self) -> &LanguageConfig {
        &self.config
    }

    /// Style table.
    pub fn styles(&self) -> &TksStyles {
        &self.styles
    }

    /// Style intervals (char offsets, half-open) for the whole text.
    pub fn highlight(&self, text: &str) -> Vec<Interval> {
        let mut intervals = Vec::new();
        let mut char_offset = 0;
        for token in Tokenizer::new(&self.config).tokenize(text) {
            let len = token.text.chars().count();
            if let Some(style_id) = self.styles.style_for(token.kind) {
                intervals.push(Interval::new(char_offset, char_offset + len, style_id));
            }
            char_offset += len;
        }

        if !self.rules.is_empty() {
            let mut line_start = 0;
            for line in text.split('\n') {
                for rule in &self.rules {
                    for (start, end) in rule.matches(line) {
                        if let Some(interval) =
                            interval_from_match(line_start, line, start, end, rule.style_id)
                        {
                            intervals.push(interval);
                        }
                    }
                }
                line_start += line.chars().count() + 1;
            }
        }

        intervals
    }
}

impl Default for TksHighlighter {
    fn default() -> Self {
        Self::new(Arc::new(LanguageConfig::tks()), TksStyles::default())
    }
}

/// A processor that writes [`TksHighlighter`] output into a style layer.
#[derive(Debug, Clone)]
pub struct TksHighlightProcessor {
    layer: StyleLayerId,
    highlighter: TksHighlighter,
}

impl TksHighlightProcessor {
    /// Create a processor writing into `layer`.
    pub fn new(layer: StyleLayerId, highlighter: TksHighlighter) -> Self {
        Self { layer, highlighter }
    }

    /// Target layer.
    pub fn layer(&self) -> StyleLayerId {
        self.layer
    }

    /// Underlying highlighter.
    pub fn highlighter(&self) -> &TksHighlighter {
        &self.highlighter
    }
}

impl Default for TksHighlightProcessor {
    fn default() -> Self {
        Self::new(StyleLayerId::SIMPLE_SYNTAX, TksHighlighter::default())
    }
}

impl DocumentProcessor for TksHighlightProcessor {
    type Error = Infallible;

    fn process(&mut self, text: &str) -> Result<Vec<ProcessingEdit>, Self::Error> {
        Ok(vec![ProcessingEdit::ReplaceStyleLayer {
            layer: self.layer,
            intervals: self.highlighter.highlight(text),
        }])
    }
}

fn interval_from_match(
    line_start_offset: usize,
    line_text: &str,
    match_start_byte: usize,
    match_end_byte: usize,
    style_id: StyleId,
) -> Option<Interval> {
    if match_start_byte >= match_end_byte || match_end_byte > line_text.len() {
        return None;
    }

    let start_col = line_text[..match_start_byte].chars().count();
    let end_col = line_text[..match_end_byte].chars().count();
    Some(Interval::new(
        line_start_offset + start_col,
        line_start_offset + end_col,
        style_id,
    ))
}
