//! Line tokenizer for TKS source text.
//!
//! The tokenizer is total: every byte of the input is covered by exactly one token, unknown
//! characters fall back to single-character [`TokenKind::Text`] tokens, and concatenating the
//! token texts reproduces the input. It never fails and never consults the command parser, so
//! presentation (syntax highlighting) stays independent from command extraction.

use tks_lang::{AssertionState, Direction, LanguageConfig, LocatorStrategy};

/// Token categories produced by [`Tokenizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `# ...` up to end of line.
    Comment,
    /// The steps-section keyword on the marker line.
    Section,
    /// A keyword from the closed verb set.
    Command,
    /// `@{name}`
    ImageLocator,
    /// `{x,y}`
    Coordinate,
    /// `{name}`
    Locator,
    /// `&resourceId` (and friends) directly after a locator.
    LocatorStrategy,
    /// `up` / `down` / `left` / `right`
    Direction,
    /// `存在` / `不存在` / `可见` / `不可见`
    AssertionState,
    /// `==`
    Operator,
    /// Integer literal.
    Number,
    /// `[` or `]`
    Bracket,
    /// `,`
    Comma,
    /// Anything else.
    Text,
    /// Line separator, only emitted by [`Tokenizer::tokenize`].
    Newline,
}

/// A lexed slice of the input. Borrowed from the input, so it cannot outlive one lex pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// Token category.
    pub kind: TokenKind,
    /// Exact source text.
    pub text: &'a str,
    /// Byte offset of `text` within the tokenized input.
    pub start: usize,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind, text: &'a str, start: usize) -> Self {
        Self { kind, text, start }
    }

    /// Exclusive end byte offset.
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

/// Stateless TKS tokenizer over a borrowed language table.
#[derive(Debug, Clone, Copy)]
pub struct Tokenizer<'c> {
    config: &'c LanguageConfig,
}

impl<'c> Tokenizer<'c> {
    /// Create a tokenizer for the given language table.
    pub fn new(config: &'c LanguageConfig) -> Self {
        Self { config }
    }

    /// Tokenize a whole buffer, emitting [`TokenKind::Newline`] between lines.
    pub fn tokenize<'a>(&self, text: &'a str) -> Vec<Token<'a>> {
        let mut tokens = Vec::new();
        let mut offset = 0;
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                tokens.push(Token::new(TokenKind::Newline, &text[offset - 1..offset], offset - 1));
            }
            self.lex_line(line, offset, &mut tokens);
            offset += line.len() + 1;
        }
        tokens
    }

    /// Tokenize one source line (without its line terminator).
    pub fn tokenize_line<'a>(&self, line: &'a str) -> Vec<Token<'a>> {
        let mut tokens = Vec::new();
        self.lex_line(line, 0, &mut tokens);
        tokens
    }

    fn lex_line<'a>(&self, line: &'a str, base: usize, out: &mut Vec<Token<'a>>) {
        if let Some(at) = comment_start(line, &self.config.comment.line) {
            if at > 0 {
                self.lex_line(&line[..at], base, out);
            }
            out.push(Token::new(TokenKind::Comment, &line[at..], base + at));
            return;
        }

        if self.lex_section(line, base, out) {
            return;
        }

        let mut pos = 0;
        while pos < line.len() {
            let rest = &line[pos..];
            let (kind, len) = self.next_token(rest);
            out.push(Token::new(kind, &rest[..len], base + pos));
            pos += len;

            if matches!(kind, TokenKind::Coordinate | TokenKind::Locator) {
                let after = &line[pos..];
                if let Some(len) = strategy_suffix_len(after) {
                    out.push(Token::new(
                        TokenKind::LocatorStrategy,
                        &after[..len],
                        base + pos,
                    ));
                    pos += len;
                }
            }
        }
    }

    /// Marker lines (`  步骤 : trailing`) are split into whitespace, keyword and plain text.
    fn lex_section<'a>(&self, line: &'a str, base: usize, out: &mut Vec<Token<'a>>) -> bool {
        let body = line.trim_start();
        let lead = line.len() - body.len();
        let Some(after_kw) = body.strip_prefix(self.config.steps_keyword.as_str()) else {
            return false;
        };
        let colon_rel = after_kw.len() - after_kw.trim_start().len();
        if !after_kw[colon_rel..].starts_with(':') {
            return false;
        }

        let kw_start = lead;
        let kw_end = kw_start + self.config.steps_keyword.len();
        let colon = kw_end + colon_rel;

        if lead > 0 {
            out.push(Token::new(TokenKind::Text, &line[..lead], base));
        }
        out.push(Token::new(
            TokenKind::Section,
            &line[kw_start..kw_end],
            base + kw_start,
        ));
        if colon > kw_end {
            out.push(Token::new(TokenKind::Text, &line[kw_end..colon], base + kw_end));
        }
        out.push(Token::new(TokenKind::Text, &line[colon..colon + 1], base + colon));
        if colon + 1 < line.len() {
            out.push(Token::new(TokenKind::Text, &line[colon + 1..], base + colon + 1));
        }
        true
    }

    /// Classify the token at the start of `rest` (never empty) and return its byte length.
    fn next_token(&self, rest: &str) -> (TokenKind, usize) {
        if let Some(inner) = rest.strip_prefix("@{")
            && let Some(close) = inner.find('}')
        {
            return (TokenKind::ImageLocator, 2 + close + 1);
        }

        if let Some(inner) = rest.strip_prefix('{')
            && let Some(close) = inner.find('}')
        {
            let kind = if is_coordinate_body(&inner[..close]) {
                TokenKind::Coordinate
            } else {
                TokenKind::Locator
            };
            return (kind, 1 + close + 1);
        }

        if let Some((_, len)) = self.config.match_keyword(rest) {
            return (TokenKind::Command, len);
        }

        if let Some(len) = Direction::ALL
            .iter()
            .map(|d| d.as_str())
            .find_map(|word| constant_len(rest, word))
        {
            return (TokenKind::Direction, len);
        }

        if let Some(len) = AssertionState::ALL
            .iter()
            .map(|a| a.as_str())
            .find_map(|word| constant_len(rest, word))
        {
            return (TokenKind::AssertionState, len);
        }

        if rest.starts_with("==") {
            return (TokenKind::Operator, 2);
        }
        if rest.starts_with('[') || rest.starts_with(']') {
            return (TokenKind::Bracket, 1);
        }
        if rest.starts_with(',') {
            return (TokenKind::Comma, 1);
        }

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 {
            return (TokenKind::Number, digits);
        }

        let len = rest.chars().next().map_or(1, char::len_utf8);
        (TokenKind::Text, len)
    }
}

/// Byte offset of the comment token that starts a trailing comment, if any.
///
/// The token only counts outside braces and outside the `[...]` parameter list, so `#` is plain
/// data inside a locator (`{#submit}`) or a text parameter (`[{输入框}, C#]`).
pub(crate) fn comment_start(line: &str, token: &str) -> Option<usize> {
    if token.is_empty() {
        return None;
    }
    let mut depth = 0usize;
    let mut in_params = false;
    for (i, c) in line.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '[' if depth == 0 => in_params = true,
            ']' if depth == 0 => in_params = false,
            _ if depth == 0 && !in_params && line[i..].starts_with(token) => return Some(i),
            _ => {}
        }
    }
    None
}

/// `true` when `body` (the text between braces) is `int,int` with optional whitespace.
pub(crate) fn is_coordinate_body(body: &str) -> bool {
    let mut parts = body.split(',');
    let (Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    [x, y].iter().all(|part| {
        let part = part.trim();
        !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
    })
}

/// A constant word only counts when followed by whitespace, `,`, `]` or end of line.
fn constant_len(rest: &str, word: &str) -> Option<usize> {
    let after = rest.strip_prefix(word)?;
    ends_value(after).then_some(word.len())
}

fn ends_value(after: &str) -> bool {
    match after.chars().next() {
        None | Some(',') | Some(']') => true,
        Some(c) => c.is_whitespace(),
    }
}

/// Byte length of an `&strategy` suffix at the start of `after`, if present.
pub(crate) fn strategy_suffix_len(after: &str) -> Option<usize> {
    let name = after.strip_prefix(LocatorStrategy::PREFIX)?;
    LocatorStrategy::ALL.iter().find_map(|strategy| {
        let tail = name.strip_prefix(strategy.as_str())?;
        ends_value(tail).then_some(1 + strategy.as_str().len())
    })
}
