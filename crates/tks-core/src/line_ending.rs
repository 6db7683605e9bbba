//! Line ending helpers.
//!
//! Scripts are held LF-normalized in memory. The dominant newline sequence of the file on disk
//! is remembered so saving writes the file back the way it was found.

/// The preferred newline sequence used when saving a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    /// Unix-style LF (`'\n'`).
    #[default]
    Lf,
    /// Windows-style CRLF (`"\r\n"`).
    Crlf,
}

impl LineEnding {
    /// Detect the dominant line ending from a source text.
    ///
    /// Policy: if the input contains any CRLF (`"\r\n"`), returns [`LineEnding::Crlf`],
    /// otherwise [`LineEnding::Lf`].
    pub fn detect_in_text(text: &str) -> Self {
        if text.contains("\r\n") {
            Self::Crlf
        } else {
            Self::Lf
        }
    }

    /// Normalize CRLF and lone CR to LF.
    pub fn normalize(text: &str) -> String {
        if !text.contains('\r') {
            return text.to_string();
        }
        text.replace("\r\n", "\n").replace('\r', "\n")
    }

    /// Convert an LF-normalized text to this line ending for saving.
    pub fn apply_to_text(self, text: &str) -> String {
        match self {
            Self::Lf => text.to_string(),
            Self::Crlf => text.replace('\n', "\r\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_and_apply() {
        let raw = "步骤:\r\n返回\r\n";
        let ending = LineEnding::detect_in_text(raw);
        assert_eq!(ending, LineEnding::Crlf);
        let normalized = LineEnding::normalize(raw);
        assert_eq!(normalized, "步骤:\n返回\n");
        assert_eq!(ending.apply_to_text(&normalized), raw);
    }

    #[test]
    fn test_lone_carriage_return() {
        assert_eq!(LineEnding::normalize("a\rb"), "a\nb");
        assert_eq!(LineEnding::detect_in_text("a\rb"), LineEnding::Lf);
    }
}
