//! Style classes to terminal styles.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use pbar_core::StyledText;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

/// Maps style classes (as used by formatters) to ratatui styles.
#[derive(Debug, Clone)]
pub struct Theme {
    styles: HashMap<String, Style>,
}

impl Default for Theme {
    fn default() -> Self {
        let mut styles = HashMap::new();
        let mut set = |class: &str, style: Style| {
            styles.insert(class.to_string(), style);
        };
        set("title", Style::new().add_modifier(Modifier::BOLD));
        set("label", Style::new());
        set("percentage", Style::new().fg(Color::Cyan));
        set("bar-a", Style::new().fg(Color::Green));
        set(
            "bar-b",
            Style::new().fg(Color::Green).add_modifier(Modifier::BOLD),
        );
        set("bar-c", Style::new().add_modifier(Modifier::DIM));
        set("current", Style::new().fg(Color::Yellow));
        set("total", Style::new().fg(Color::Yellow));
        set("time-elapsed", Style::new().fg(Color::Magenta));
        set("time-left", Style::new().fg(Color::Magenta));
        set("iterations-per-second", Style::new().fg(Color::Blue));
        set("spinning-wheel", Style::new().add_modifier(Modifier::BOLD));
        set(
            "bottom-toolbar",
            Style::new().add_modifier(Modifier::REVERSED),
        );
        set(
            "error",
            Style::new().fg(Color::Red).add_modifier(Modifier::BOLD),
        );
        Self { styles }
    }
}

impl Theme {
    /// Theme without any styling.
    pub fn plain() -> Self {
        Self {
            styles: HashMap::new(),
        }
    }

    /// Default theme with overrides from config.
    ///
    /// # Errors
    /// Returns an error naming the class whose style string is invalid.
    pub fn from_overrides(overrides: &BTreeMap<String, String>) -> Result<Self> {
        let mut theme = Self::default();
        for (class, spec) in overrides {
            let style = parse_style(spec)
                .map_err(|e| anyhow::anyhow!("Invalid style for class '{class}': {e}"))?;
            theme.set(class, style);
        }
        Ok(theme)
    }

    pub fn set(&mut self, class: &str, style: Style) {
        self.styles.insert(class.to_string(), style);
    }

    /// Style for a possibly comma-separated class list; later classes win.
    pub fn style_for(&self, classes: &str) -> Style {
        classes
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .filter_map(|c| self.styles.get(c))
            .fold(Style::new(), |acc, style| acc.patch(*style))
    }

    /// Converts formatter output into a styled line.
    pub fn line(&self, text: &StyledText) -> Line<'static> {
        Line::from(
            text.fragments()
                .iter()
                .map(|f| Span::styled(f.text.clone(), self.style_for(&f.class)))
                .collect::<Vec<_>>(),
        )
    }
}

/// Parses `"fg:green bg:#102030 bold"`.
///
/// # Errors
/// Returns an error for unknown words or colors.
pub fn parse_style(spec: &str) -> Result<Style> {
    let mut style = Style::new();
    for word in spec.split_whitespace() {
        style = match word {
            "bold" => style.add_modifier(Modifier::BOLD),
            "italic" => style.add_modifier(Modifier::ITALIC),
            "underline" => style.add_modifier(Modifier::UNDERLINED),
            "dim" => style.add_modifier(Modifier::DIM),
            "reverse" => style.add_modifier(Modifier::REVERSED),
            _ => {
                if let Some(color) = word.strip_prefix("fg:") {
                    style.fg(parse_color(color)?)
                } else if let Some(color) = word.strip_prefix("bg:") {
                    style.bg(parse_color(color)?)
                } else {
                    bail!("unknown style attribute '{word}'");
                }
            }
        };
    }
    Ok(style)
}

fn parse_color(value: &str) -> Result<Color> {
    Color::from_str(value).with_context(|| format!("unknown color '{value}'"))
}
