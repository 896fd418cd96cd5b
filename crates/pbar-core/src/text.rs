//! Styled text produced by formatters.
//!
//! Text is a list of fragments tagged with a style class (e.g. `"label"`,
//! `"bar-a"`). The renderer maps classes to terminal styles through its theme,
//! so formatters never depend on a particular terminal library.

use std::borrow::Cow;

use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub class: Cow<'static, str>,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyledText {
    fragments: Vec<Fragment>,
}

impl StyledText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single unclassed fragment.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::styled("", text)
    }

    /// Single fragment with `class`.
    pub fn styled(class: impl Into<Cow<'static, str>>, text: impl Into<String>) -> Self {
        let mut styled = Self::new();
        styled.push(class, text);
        styled
    }

    pub fn push(&mut self, class: impl Into<Cow<'static, str>>, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.fragments.push(Fragment {
            class: class.into(),
            text,
        });
    }

    /// Builder-style `push`.
    #[must_use]
    pub fn with(mut self, class: impl Into<Cow<'static, str>>, text: impl Into<String>) -> Self {
        self.push(class, text);
        self
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Display width in terminal columns.
    pub fn width(&self) -> usize {
        self.fragments.iter().map(|f| f.text.width()).sum()
    }

    /// Concatenated text without classes.
    pub fn to_plain(&self) -> String {
        self.fragments.iter().map(|f| f.text.as_str()).collect()
    }
}

impl From<&str> for StyledText {
    fn from(text: &str) -> Self {
        Self::plain(text)
    }
}

impl From<String> for StyledText {
    fn from(text: String) -> Self {
        Self::plain(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_counts_wide_chars() {
        let text = StyledText::plain("ab").with("label", "日本");
        assert_eq!(text.width(), 6);
        assert_eq!(text.to_plain(), "ab日本");
    }

    #[test]
    fn test_empty_fragments_are_skipped() {
        let text = StyledText::styled("x", "");
        assert!(text.is_empty());
    }
}
