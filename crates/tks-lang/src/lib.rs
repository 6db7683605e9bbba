#![warn(missing_docs)]
//! `tks-lang` - data-driven language tables for the TKS test-script language.
//!
//! This crate intentionally stays lightweight and does **not** depend on any parsing or
//! highlighting machinery. It only describes the language: the closed keyword set, the ordered
//! parameter definitions of every keyword, and the closed constant sets (directions, assertion
//! states, locator strategies). Tokenizer, parser and block projector receive a
//! [`LanguageConfig`] by reference instead of reaching for globals.

use std::fmt;

/// Comment tokens/config for the language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentConfig {
    /// Line comment token (`#` for TKS).
    pub line: String,
}

impl CommentConfig {
    /// Create a config with the given line comment token.
    pub fn line(token: impl Into<String>) -> Self {
        Self { line: token.into() }
    }

    /// Returns `true` if `trimmed` (already whitespace-trimmed) is a whole-line comment.
    pub fn is_comment_line(&self, trimmed: &str) -> bool {
        !self.line.is_empty() && trimmed.starts_with(self.line.as_str())
    }
}

impl Default for CommentConfig {
    fn default() -> Self {
        Self::line("#")
    }
}

/// Semantic type of a command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// `{x,y}` screen coordinate.
    Coordinate,
    /// `@{name}` image template locator.
    ImageLocator,
    /// `{name}` XML-element locator (optionally with a strategy suffix).
    Locator,
    /// A bare `&resourceId`-style strategy marker.
    LocatorStrategy,
    /// Non-negative integer literal.
    Number,
    /// `up`, `down`, `left` or `right`.
    Direction,
    /// One of the closed assertion states.
    AssertionState,
    /// Dotted package / activity identifier.
    Package,
    /// Unquoted free text.
    Text,
}

impl ParamKind {
    /// Stable lower-case name (`"image-locator"`, `"assertion-state"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coordinate => "coordinate",
            Self::ImageLocator => "image-locator",
            Self::Locator => "locator",
            Self::LocatorStrategy => "locator-strategy",
            Self::Number => "number",
            Self::Direction => "direction",
            Self::AssertionState => "assertion-state",
            Self::Package => "package",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Swipe / drag direction constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `up`
    Up,
    /// `down`
    Down,
    /// `left`
    Left,
    /// `right`
    Right,
}

impl Direction {
    /// All directions in canonical order.
    pub const ALL: [Direction; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// Source spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Parse an exact source spelling.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }
}

/// Element assertion states (source spellings are localized).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssertionState {
    /// `存在`
    Exists,
    /// `不存在`
    NotExists,
    /// `可见`
    Visible,
    /// `不可见`
    NotVisible,
}

impl AssertionState {
    /// All states. Longer spellings come first so prefix scanning picks `不存在` over `存在`.
    pub const ALL: [AssertionState; 4] = [
        Self::NotExists,
        Self::NotVisible,
        Self::Exists,
        Self::Visible,
    ];

    /// Source spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exists => "存在",
            Self::NotExists => "不存在",
            Self::Visible => "可见",
            Self::NotVisible => "不可见",
        }
    }

    /// Parse an exact source spelling.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

/// Attribute restriction suffix for XML-element locators (`{name}&resourceId`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocatorStrategy {
    /// Match on `resource-id` only.
    ResourceId,
    /// Match on `text` only.
    Text,
    /// Match on `class` only.
    ClassName,
    /// Match on `content-desc` only.
    ContentDesc,
    /// Match on the element's xpath only.
    Xpath,
}

impl LocatorStrategy {
    /// All strategies.
    pub const ALL: [LocatorStrategy; 5] = [
        Self::ResourceId,
        Self::Text,
        Self::ClassName,
        Self::ContentDesc,
        Self::Xpath,
    ];

    /// Suffix introducer.
    pub const PREFIX: char = '&';

    /// Strategy name without the `&`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResourceId => "resourceId",
            Self::Text => "text",
            Self::ClassName => "className",
            Self::ContentDesc => "contentDesc",
            Self::Xpath => "xpath",
        }
    }

    /// Parse a strategy name without the `&`.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s)
    }
}

/// Block palette category of a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Launch / close an application.
    Application,
    /// Pointer actions.
    Action,
    /// Keyboard / text input.
    Input,
    /// Flow control (wait, back).
    Control,
    /// Assertions.
    Assertion,
    /// Screen text reading.
    Text,
}

impl Category {
    /// Display colour of blocks in this category (`#rrggbb`).
    pub fn color(self) -> &'static str {
        match self {
            Self::Application => "#c586c0",
            Self::Action => "#569cd6",
            Self::Input => "#4ec9b0",
            Self::Control => "#ce9178",
            Self::Assertion => "#f48771",
            Self::Text => "#9cdcfe",
        }
    }
}

/// Definition of one positional parameter of a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDef {
    /// Display name (also the key used by `update_param`).
    pub name: &'static str,
    /// Expected kind. [`ParamKind::Locator`] accepts any element locator form.
    pub kind: ParamKind,
    /// Whether the parameter must be present for the command to be meaningful.
    pub required: bool,
    /// Raw default value used when a block is inserted.
    pub default: Option<&'static str>,
}

const fn param(
    name: &'static str,
    kind: ParamKind,
    required: bool,
    default: Option<&'static str>,
) -> ParamDef {
    ParamDef {
        name,
        kind,
        required,
        default,
    }
}

const LAUNCH_PARAMS: &[ParamDef] = &[
    param("包名", ParamKind::Package, true, Some("com.example.test_toolkit")),
    param("Activity", ParamKind::Package, true, Some(".MainActivity")),
];
const CLOSE_PARAMS: &[ParamDef] = &[
    param("包名", ParamKind::Package, true, Some("com.example.app")),
    param("Activity", ParamKind::Package, true, Some(".MainActivity")),
];
const CLICK_PARAMS: &[ParamDef] = &[param("元素", ParamKind::Locator, true, None)];
const PRESS_PARAMS: &[ParamDef] = &[
    param("元素", ParamKind::Locator, true, None),
    param("时长/ms", ParamKind::Number, false, Some("1000")),
];
const SWIPE_PARAMS: &[ParamDef] = &[
    param("起点", ParamKind::Coordinate, true, Some("{200,400}")),
    param("终点", ParamKind::Coordinate, true, Some("{300,600}")),
    param("时长/ms", ParamKind::Number, false, Some("1000")),
];
const DRAG_PARAMS: &[ParamDef] = &[
    param("元素", ParamKind::Locator, true, None),
    param("终点", ParamKind::Coordinate, true, Some("{500,800}")),
    param("时长/ms", ParamKind::Number, false, Some("1000")),
];
const DIRECTIONAL_DRAG_PARAMS: &[ParamDef] = &[
    param("元素", ParamKind::Locator, true, None),
    param("方向", ParamKind::Direction, true, Some("up")),
    param("距离", ParamKind::Number, true, Some("300")),
    param("时长/ms", ParamKind::Number, false, Some("1000")),
];
const INPUT_PARAMS: &[ParamDef] = &[
    param("输入框", ParamKind::Locator, true, None),
    param("文本", ParamKind::Text, true, None),
];
const CLEAR_PARAMS: &[ParamDef] = &[param("输入框", ParamKind::Locator, true, None)];
const WAIT_PARAMS: &[ParamDef] = &[param("时长/ms", ParamKind::Number, false, Some("1000"))];
const ASSERT_PARAMS: &[ParamDef] = &[
    param("元素", ParamKind::Locator, true, None),
    param("状态", ParamKind::AssertionState, true, Some("存在")),
];
const READ_PARAMS: &[ParamDef] = &[
    param("中心坐标或元素", ParamKind::Locator, true, None),
    param("宽度", ParamKind::Number, false, None),
    param("高度", ParamKind::Number, false, None),
];

/// The closed TKS verb set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Keyword {
    /// `启动 [package, activity]`
    Launch,
    /// `关闭 [package, activity]`
    Close,
    /// `点击 [locator]`
    Click,
    /// `按压 [locator, duration?]`
    Press,
    /// `滑动 [from, to, duration?]`
    Swipe,
    /// `拖动 [locator, to, duration?]`
    Drag,
    /// `定向拖动 [locator, direction, distance, duration?]`
    DirectionalDrag,
    /// `输入 [locator, text]`
    Input,
    /// `清理 [locator]`
    Clear,
    /// `隐藏键盘`
    HideKeyboard,
    /// `等待 [duration?]`
    Wait,
    /// `返回`
    Back,
    /// `断言 [locator, state]`
    Assert,
    /// `读取 [locator, width?, height?]`
    Read,
}

impl Keyword {
    /// Every keyword, in palette order.
    pub const ALL: [Keyword; 14] = [
        Self::Launch,
        Self::Close,
        Self::Click,
        Self::Press,
        Self::Swipe,
        Self::DirectionalDrag,
        Self::Drag,
        Self::Input,
        Self::Clear,
        Self::HideKeyboard,
        Self::Wait,
        Self::Back,
        Self::Assert,
        Self::Read,
    ];

    /// Source spelling of the keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Launch => "启动",
            Self::Close => "关闭",
            Self::Click => "点击",
            Self::Press => "按压",
            Self::Swipe => "滑动",
            Self::Drag => "拖动",
            Self::DirectionalDrag => "定向拖动",
            Self::Input => "输入",
            Self::Clear => "清理",
            Self::HideKeyboard => "隐藏键盘",
            Self::Wait => "等待",
            Self::Back => "返回",
            Self::Assert => "断言",
            Self::Read => "读取",
        }
    }

    /// Stable English identifier (`"click"`, `"directional_drag"`, ...).
    pub fn name(self) -> &'static str {
        match self {
            Self::Launch => "launch",
            Self::Close => "close",
            Self::Click => "click",
            Self::Press => "press",
            Self::Swipe => "swipe",
            Self::Drag => "drag",
            Self::DirectionalDrag => "directional_drag",
            Self::Input => "input",
            Self::Clear => "clear",
            Self::HideKeyboard => "hide_keyboard",
            Self::Wait => "wait",
            Self::Back => "back",
            Self::Assert => "assert",
            Self::Read => "read",
        }
    }

    /// Look up a keyword by its exact source spelling.
    pub fn from_source(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Block palette category.
    pub fn category(self) -> Category {
        match self {
            Self::Launch | Self::Close => Category::Application,
            Self::Click | Self::Press | Self::Swipe | Self::Drag | Self::DirectionalDrag => {
                Category::Action
            }
            Self::Input | Self::Clear | Self::HideKeyboard => Category::Input,
            Self::Wait | Self::Back => Category::Control,
            Self::Assert => Category::Assertion,
            Self::Read => Category::Text,
        }
    }

    /// Ordered parameter definitions.
    pub fn params(self) -> &'static [ParamDef] {
        match self {
            Self::Launch => LAUNCH_PARAMS,
            Self::Close => CLOSE_PARAMS,
            Self::Click => CLICK_PARAMS,
            Self::Press => PRESS_PARAMS,
            Self::Swipe => SWIPE_PARAMS,
            Self::Drag => DRAG_PARAMS,
            Self::DirectionalDrag => DIRECTIONAL_DRAG_PARAMS,
            Self::Input => INPUT_PARAMS,
            Self::Clear => CLEAR_PARAMS,
            Self::HideKeyboard | Self::Back => &[],
            Self::Wait => WAIT_PARAMS,
            Self::Assert => ASSERT_PARAMS,
            Self::Read => READ_PARAMS,
        }
    }

    /// Position of the parameter called `name`, if the keyword has one.
    pub fn param_index(self, name: &str) -> Option<usize> {
        self.params().iter().position(|p| p.name == name)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-mostly language table shared by the tokenizer, parser, projector and highlighter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageConfig {
    /// Steps-section keyword (the marker line is `<keyword>:`).
    pub steps_keyword: String,
    /// Header label for the test-case id (`用例`).
    pub case_label: String,
    /// Header label for the script name (`脚本名`).
    pub script_name_label: String,
    /// Header label opening the `key: value` details block (`详情`).
    pub details_label: String,
    /// Comment configuration.
    pub comment: CommentConfig,
}

impl LanguageConfig {
    /// The built-in TKS language.
    pub fn tks() -> Self {
        Self {
            steps_keyword: "步骤".to_string(),
            case_label: "用例".to_string(),
            script_name_label: "脚本名".to_string(),
            details_label: "详情".to_string(),
            comment: CommentConfig::default(),
        }
    }

    /// The canonical steps marker line (`步骤:`).
    pub fn steps_marker(&self) -> String {
        format!("{}:", self.steps_keyword)
    }

    /// Returns `true` if `trimmed` is the steps marker line.
    pub fn is_steps_marker(&self, trimmed: &str) -> bool {
        trimmed
            .strip_prefix(self.steps_keyword.as_str())
            .is_some_and(|rest| rest.trim_start() == ":")
    }

    /// Match a keyword at the start of `s` that is followed by whitespace, `[` or end of input.
    ///
    /// Returns the keyword and its byte length.
    pub fn match_keyword(&self, s: &str) -> Option<(Keyword, usize)> {
        Keyword::ALL.into_iter().find_map(|k| {
            let rest = s.strip_prefix(k.as_str())?;
            match rest.chars().next() {
                None | Some('[') => Some((k, k.as_str().len())),
                Some(c) if c.is_whitespace() => Some((k, k.as_str().len())),
                _ => None,
            }
        })
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self::tks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup_and_boundaries() {
        let cfg = LanguageConfig::tks();
        assert_eq!(Keyword::from_source("点击"), Some(Keyword::Click));
        assert_eq!(cfg.match_keyword("点击 [{1,2}]"), Some((Keyword::Click, 6)));
        assert_eq!(cfg.match_keyword("点击[{1,2}]"), Some((Keyword::Click, 6)));
        assert_eq!(cfg.match_keyword("点击"), Some((Keyword::Click, 6)));
        assert_eq!(cfg.match_keyword("点击按钮"), None);
        assert_eq!(
            cfg.match_keyword("定向拖动 [{1,2}, up, 300]").map(|(k, _)| k),
            Some(Keyword::DirectionalDrag)
        );
    }

    #[test]
    fn test_steps_marker() {
        let cfg = LanguageConfig::tks();
        assert!(cfg.is_steps_marker("步骤:"));
        assert!(cfg.is_steps_marker("步骤 :"));
        assert!(!cfg.is_steps_marker("步骤: 点击"));
        assert_eq!(cfg.steps_marker(), "步骤:");
    }

    #[test]
    fn test_param_tables() {
        assert_eq!(Keyword::Swipe.params().len(), 3);
        assert!(!Keyword::Swipe.params()[2].required);
        assert_eq!(Keyword::Assert.param_index("状态"), Some(1));
        assert!(Keyword::Back.params().is_empty());
        assert_eq!(Keyword::Wait.category(), Category::Control);
    }

    #[test]
    fn test_constant_sets() {
        assert_eq!(AssertionState::parse("不可见"), Some(AssertionState::NotVisible));
        assert_eq!(Direction::parse("left"), Some(Direction::Left));
        assert_eq!(LocatorStrategy::parse("xpath"), Some(LocatorStrategy::Xpath));
        assert_eq!(LocatorStrategy::parse("&xpath"), None);
    }
}
