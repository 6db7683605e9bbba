//! Structured command records and their canonical text form.
//!
//! A [`Command`] is always derived from text and never edited in place: block edits build a new
//! command, serialize it with [`Command::to_line`] and splice the line back into the buffer.

use std::fmt;

use tks_lang::{AssertionState, Direction, Keyword, LocatorStrategy, ParamKind};

use crate::error::EditError;
use crate::token::is_coordinate_body;

/// A reference to a UI element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// Literal screen coordinate `{x,y}`.
    Coordinate {
        /// Horizontal pixel.
        x: u32,
        /// Vertical pixel.
        y: u32,
    },
    /// Named XML-element predicate `{name}` with an optional `&strategy` suffix.
    Element {
        /// Name in the locator library.
        name: String,
        /// Restrict matching to a single attribute. `None` matches every literal attribute.
        strategy: Option<LocatorStrategy>,
    },
    /// Named image template `@{name}`.
    Image {
        /// Name in the image library.
        name: String,
    },
}

/// Typed value of a [`Parameter`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamValue {
    /// Any locator form.
    Locator(Locator),
    /// A bare `&strategy` token.
    Strategy(LocatorStrategy),
    /// Non-negative integer.
    Number(u64),
    /// Swipe / drag direction.
    Direction(Direction),
    /// Assertion state.
    AssertionState(AssertionState),
    /// Dotted package or activity identifier.
    Package(String),
    /// Anything else.
    Text(String),
}

/// One positional parameter: its classified value plus the exact trimmed source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    /// Classified value.
    pub value: ParamValue,
    /// Raw source form, re-emitted verbatim on serialization.
    pub raw: String,
}

impl Parameter {
    /// Classify a raw parameter. Total: anything unrecognized becomes [`ParamValue::Text`].
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        Self {
            value: classify(raw),
            raw: raw.to_string(),
        }
    }

    /// Reported parameter type.
    pub fn kind(&self) -> ParamKind {
        match &self.value {
            ParamValue::Locator(Locator::Coordinate { .. }) => ParamKind::Coordinate,
            ParamValue::Locator(Locator::Image { .. }) => ParamKind::ImageLocator,
            ParamValue::Locator(Locator::Element { .. }) => ParamKind::Locator,
            ParamValue::Strategy(_) => ParamKind::LocatorStrategy,
            ParamValue::Number(_) => ParamKind::Number,
            ParamValue::Direction(_) => ParamKind::Direction,
            ParamValue::AssertionState(_) => ParamKind::AssertionState,
            ParamValue::Package(_) => ParamKind::Package,
            ParamValue::Text(_) => ParamKind::Text,
        }
    }

    /// The locator, if this parameter is one.
    pub fn as_locator(&self) -> Option<&Locator> {
        match &self.value {
            ParamValue::Locator(locator) => Some(locator),
            _ => None,
        }
    }
}

fn classify(raw: &str) -> ParamValue {
    if let Some(name) = raw.strip_prefix("@{").and_then(|r| r.strip_suffix('}')) {
        return ParamValue::Locator(Locator::Image {
            name: name.to_string(),
        });
    }

    if let Some(body) = raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        if is_coordinate_body(body)
            && let Some(locator) = parse_coordinate(body)
        {
            return ParamValue::Locator(locator);
        }
        return ParamValue::Locator(Locator::Element {
            name: body.to_string(),
            strategy: None,
        });
    }

    if raw.starts_with('{')
        && let Some(amp) = raw.rfind(LocatorStrategy::PREFIX)
        && let Some(strategy) = LocatorStrategy::parse(&raw[amp + 1..])
        && let Some(name) = raw[1..amp].strip_suffix('}')
    {
        return ParamValue::Locator(Locator::Element {
            name: name.to_string(),
            strategy: Some(strategy),
        });
    }

    if !raw.is_empty()
        && raw.bytes().all(|b| b.is_ascii_digit())
        && let Ok(n) = raw.parse()
    {
        return ParamValue::Number(n);
    }
    if let Some(direction) = Direction::parse(raw) {
        return ParamValue::Direction(direction);
    }
    if let Some(state) = AssertionState::parse(raw) {
        return ParamValue::AssertionState(state);
    }
    if let Some(strategy) = raw
        .strip_prefix(LocatorStrategy::PREFIX)
        .and_then(LocatorStrategy::parse)
    {
        return ParamValue::Strategy(strategy);
    }
    if is_package(raw) {
        return ParamValue::Package(raw.to_string());
    }
    ParamValue::Text(raw.to_string())
}

fn parse_coordinate(body: &str) -> Option<Locator> {
    let (x, y) = body.split_once(',')?;
    Some(Locator::Coordinate {
        x: x.trim().parse().ok()?,
        y: y.trim().parse().ok()?,
    })
}

/// `com.example.app` / `.MainActivity`
fn is_package(raw: &str) -> bool {
    let body = raw.strip_prefix('.').unwrap_or(raw);
    let mut chars = body.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Split the text between `[` and `]` on commas outside braces. Empty entries are dropped.
pub fn split_parameters(inner: &str) -> Vec<Parameter> {
    let mut params = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                push_param(&mut params, &inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_param(&mut params, &inner[start..]);
    params
}

fn push_param(params: &mut Vec<Parameter>, raw: &str) {
    if !raw.trim().is_empty() {
        params.push(Parameter::parse(raw));
    }
}

/// One parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// 1-based line in the source text. `0` for commands not yet placed in a buffer.
    pub line_number: usize,
    /// Verb.
    pub keyword: Keyword,
    /// Ordered parameters.
    pub params: Vec<Parameter>,
}

impl Command {
    /// A command that is not placed in any buffer yet.
    pub fn new(keyword: Keyword, params: Vec<Parameter>) -> Self {
        Self {
            line_number: 0,
            keyword,
            params,
        }
    }

    /// Build a command from raw parameter strings.
    pub fn from_raw<'a>(keyword: Keyword, raw: impl IntoIterator<Item = &'a str>) -> Self {
        let params = raw
            .into_iter()
            .filter(|r| !r.trim().is_empty())
            .map(Parameter::parse)
            .collect();
        Self::new(keyword, params)
    }

    /// A fresh command with every leading parameter that has a default filled in.
    ///
    /// Filling stops at the first parameter without a default so positions stay aligned with the
    /// keyword table.
    pub fn with_defaults(keyword: Keyword) -> Self {
        let raw = keyword.params().iter().map_while(|def| def.default);
        Self::from_raw(keyword, raw)
    }

    /// Parameter named `name` in the keyword table, if present on this command.
    pub fn param(&self, name: &str) -> Option<&Parameter> {
        self.params.get(self.keyword.param_index(name)?)
    }

    /// Same keyword and same ordered parameter values, ignoring the line number.
    pub fn same_content(&self, other: &Command) -> bool {
        self.keyword == other.keyword && self.params == other.params
    }

    /// Canonical text line: `keyword [raw, raw]`, or the bare keyword without parameters.
    pub fn to_line(&self) -> String {
        if self.params.is_empty() {
            return self.keyword.as_str().to_string();
        }
        let raw: Vec<&str> = self.params.iter().map(|p| p.raw.as_str()).collect();
        format!("{} [{}]", self.keyword.as_str(), raw.join(", "))
    }

    /// A copy with the named parameter set to `value`.
    ///
    /// Setting a parameter past the current end fills the gap from defaults. An empty `value`
    /// removes the trailing parameter. Values that would split or end the parameter list when
    /// serialized are rejected.
    pub fn with_param(&self, name: &str, value: &str) -> Result<Command, EditError> {
        let defs = self.keyword.params();
        let index = self
            .keyword
            .param_index(name)
            .ok_or_else(|| EditError::UnknownParam {
                command: self.keyword,
                param: name.to_string(),
            })?;
        let mut params = self.params.clone();
        let value = value.trim();

        if value.is_empty() {
            if index + 1 < params.len() {
                return Err(EditError::EmptyParam {
                    param: defs[index].name,
                });
            }
            params.truncate(index);
        } else {
            if !fits_parameter_list(value) {
                return Err(EditError::InvalidParamValue {
                    param: defs[index].name,
                    value: value.to_string(),
                });
            }
            for def in defs.iter().take(index).skip(params.len()) {
                let default = def
                    .default
                    .ok_or(EditError::MissingPrecedingParam { param: def.name })?;
                params.push(Parameter::parse(default));
            }
            let param = Parameter::parse(value);
            if index < params.len() {
                params[index] = param;
            } else {
                params.push(param);
            }
        }

        Ok(Command {
            line_number: self.line_number,
            keyword: self.keyword,
            params,
        })
    }
}

/// `true` when `value` re-parses as exactly one parameter once placed inside `[...]`.
fn fits_parameter_list(value: &str) -> bool {
    let mut depth = 0usize;
    for c in value.chars() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return false,
            '}' => depth -= 1,
            ']' => return false,
            ',' if depth == 0 => return false,
            _ => {}
        }
    }
    depth == 0
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// Free-function form of [`Command::to_line`].
pub fn command_to_line(command: &Command) -> String {
    command.to_line()
}
