//! Script parser.
//!
//! Every consumer that needs to address "the n-th command" (the block projector, the editor's
//! highlight translation and the execution engine) goes through [`ScriptParser::command_lines`],
//! so they all agree on which lines are commands.

use std::collections::BTreeMap;

use tks_lang::{Keyword, LanguageConfig};

use crate::command::{Command, split_parameters};
use crate::token::comment_start;

/// How a single source line is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// Before the steps marker.
    Header,
    /// The steps marker itself.
    Marker,
    /// Whitespace only, inside the steps section.
    Blank,
    /// `# ...`, inside the steps section.
    Comment,
    /// A recognized command line.
    Command(Keyword),
    /// Anything else inside the steps section. Silently skipped.
    Stray,
}

/// A command line located in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandLine<'a> {
    /// Zero-based line index.
    pub index: usize,
    /// Exact line text (without terminator).
    pub text: &'a str,
    /// Keyword the line starts with.
    pub keyword: Keyword,
}

impl CommandLine<'_> {
    /// 1-based line number.
    pub fn line_number(&self) -> usize {
        self.index + 1
    }
}

/// Metadata found before the steps marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptHeader {
    /// `用例: <id>`
    pub case_id: Option<String>,
    /// `脚本名: <name>`
    pub script_name: Option<String>,
    /// `key: value` pairs of the `详情:` block.
    pub details: BTreeMap<String, String>,
}

/// Parser over a borrowed language table.
#[derive(Debug, Clone, Copy)]
pub struct ScriptParser<'c> {
    config: &'c LanguageConfig,
}

impl<'c> ScriptParser<'c> {
    /// Create a parser for the given language table.
    pub fn new(config: &'c LanguageConfig) -> Self {
        Self { config }
    }

    /// The language table this parser uses.
    pub fn config(&self) -> &'c LanguageConfig {
        self.config
    }

    /// Classify every line of `text`, in order.
    pub fn classify<'a>(&self, text: &'a str) -> Vec<(&'a str, LineClass)> {
        let mut in_steps = false;
        text.split('\n')
            .map(|line| {
                let trimmed = line.trim();
                let class = if self.config.is_steps_marker(trimmed) {
                    in_steps = true;
                    LineClass::Marker
                } else if !in_steps {
                    LineClass::Header
                } else if trimmed.is_empty() {
                    LineClass::Blank
                } else if self.config.comment.is_comment_line(trimmed) {
                    LineClass::Comment
                } else if let Some((keyword, _)) = self.config.match_keyword(trimmed) {
                    LineClass::Command(keyword)
                } else {
                    LineClass::Stray
                };
                (line, class)
            })
            .collect()
    }

    /// Ordered command lines of `text`.
    pub fn command_lines<'a>(&self, text: &'a str) -> Vec<CommandLine<'a>> {
        self.classify(text)
            .into_iter()
            .enumerate()
            .filter_map(|(index, (text, class))| match class {
                LineClass::Command(keyword) => Some(CommandLine {
                    index,
                    text,
                    keyword,
                }),
                _ => None,
            })
            .collect()
    }

    /// Returns `true` if `text` contains a steps marker line.
    pub fn has_steps_marker(&self, text: &str) -> bool {
        text.split('\n')
            .any(|line| self.config.is_steps_marker(line.trim()))
    }

    /// Parse every command of the steps section. Never fails; unrecognized lines are omitted.
    pub fn parse(&self, text: &str) -> Vec<Command> {
        self.command_lines(text)
            .into_iter()
            .filter_map(|line| self.parse_line(line.text, line.line_number()))
            .collect()
    }

    /// Parse a single line as a command, independent of section context.
    pub fn parse_line(&self, line: &str, line_number: usize) -> Option<Command> {
        let body = self.strip_comment(line).trim();
        let (keyword, len) = self.config.match_keyword(body)?;
        let rest = body[len..].trim_start();

        let params = match (rest.find('['), rest.ends_with(']')) {
            (Some(open), true) if open < rest.len() - 1 => {
                split_parameters(&rest[open + 1..rest.len() - 1])
            }
            _ => Vec::new(),
        };

        Some(Command {
            line_number,
            keyword,
            params,
        })
    }

    /// Parse header metadata (everything before the steps marker).
    pub fn parse_header(&self, text: &str) -> ScriptHeader {
        let mut header = ScriptHeader::default();
        let mut in_details = false;

        for (line, class) in self.classify(text) {
            if class != LineClass::Header {
                break;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || self.config.comment.is_comment_line(trimmed) {
                continue;
            }

            if let Some(value) = label_value(trimmed, &self.config.case_label) {
                header.case_id = non_empty(value);
                in_details = false;
            } else if let Some(value) = label_value(trimmed, &self.config.script_name_label) {
                header.script_name = non_empty(value);
                in_details = false;
            } else if label_value(trimmed, &self.config.details_label).is_some() {
                in_details = true;
            } else if in_details && let Some((key, value)) = split_label(trimmed) {
                header
                    .details
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        header
    }

    /// Drop a trailing comment.
    fn strip_comment<'a>(&self, line: &'a str) -> &'a str {
        match comment_start(line, &self.config.comment.line) {
            Some(at) => &line[..at],
            None => line,
        }
    }
}

/// `label: value` / `label：value`
fn label_value<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(label)?.trim_start();
    rest.strip_prefix(':')
        .or_else(|| rest.strip_prefix('：'))
        .map(str::trim)
}

fn split_label(line: &str) -> Option<(&str, &str)> {
    line.split_once(':').or_else(|| line.split_once('：'))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Locator, ParamValue};
    use pretty_assertions::assert_eq;

    const SCRIPT: &str = "用例: TC-001\n脚本名: 登录\n详情:\n    appPackage: com.example.app\n    appActivity: .MainActivity\n步骤:\n    启动 [com.example.app, .MainActivity]\n\n    # log in\n    点击 [{登录按钮}&resourceId]\n    not a command\n    等待 [500] # settle\n    返回";

    #[test]
    fn test_classify() {
        let cfg = LanguageConfig::tks();
        let classes: Vec<LineClass> = ScriptParser::new(&cfg)
            .classify(SCRIPT)
            .into_iter()
            .map(|(_, class)| class)
            .collect();
        assert_eq!(
            classes,
            vec![
                LineClass::Header,
                LineClass::Header,
                LineClass::Header,
                LineClass::Header,
                LineClass::Header,
                LineClass::Marker,
                LineClass::Command(Keyword::Launch),
                LineClass::Blank,
                LineClass::Comment,
                LineClass::Command(Keyword::Click),
                LineClass::Stray,
                LineClass::Command(Keyword::Wait),
                LineClass::Command(Keyword::Back),
            ]
        );
    }

    #[test]
    fn test_parse_line_numbers_and_comment_strip() {
        let cfg = LanguageConfig::tks();
        let commands = ScriptParser::new(&cfg).parse(SCRIPT);
        let numbers: Vec<usize> = commands.iter().map(|c| c.line_number).collect();
        assert_eq!(numbers, vec![7, 10, 12, 13]);
        assert_eq!(commands[2].params[0].value, ParamValue::Number(500));
        assert_eq!(commands[2].params.len(), 1);
        assert!(commands[3].params.is_empty());
    }

    #[test]
    fn test_hash_inside_braces_is_not_a_comment() {
        let cfg = LanguageConfig::tks();
        let command = ScriptParser::new(&cfg)
            .parse_line("点击 [{#submit}]", 1)
            .unwrap();
        assert_eq!(
            command.params[0].as_locator(),
            Some(&Locator::Element {
                name: "#submit".to_string(),
                strategy: None,
            })
        );
    }

    #[test]
    fn test_hash_inside_parameter_list_is_data() {
        let cfg = LanguageConfig::tks();
        let parser = ScriptParser::new(&cfg);

        let command = parser.parse_line("输入 [{输入框}, C#] # 语言", 1).unwrap();
        let raw: Vec<&str> = command.params.iter().map(|p| p.raw.as_str()).collect();
        assert_eq!(raw, vec!["{输入框}", "C#"]);

        let command = parser.parse_line("    返回 # 回到首页", 1).unwrap();
        assert!(command.params.is_empty());
    }

    #[test]
    fn test_keyword_needs_boundary() {
        let cfg = LanguageConfig::tks();
        let parser = ScriptParser::new(&cfg);
        assert!(parser.parse_line("点击按钮", 1).is_none());
        assert!(parser.parse_line("点击[{a}]", 1).is_some());
        assert!(parser.parse_line("隐藏键盘", 1).is_some());
    }

    #[test]
    fn test_parse_header() {
        let cfg = LanguageConfig::tks();
        let header = ScriptParser::new(&cfg).parse_header(SCRIPT);
        assert_eq!(header.case_id.as_deref(), Some("TC-001"));
        assert_eq!(header.script_name.as_deref(), Some("登录"));
        assert_eq!(
            header.details.get("appActivity").map(String::as_str),
            Some(".MainActivity")
        );
        assert_eq!(header.details.len(), 2);
    }

    #[test]
    fn test_no_marker_means_no_commands() {
        let cfg = LanguageConfig::tks();
        let parser = ScriptParser::new(&cfg);
        assert!(parser.parse("点击 [{a}]\n返回").is_empty());
        assert!(!parser.has_steps_marker("点击 [{a}]"));
    }
}
