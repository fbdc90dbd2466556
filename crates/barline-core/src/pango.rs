//! Pango `<span>` assembly. Every renderer builds its full string through
//! these helpers before publishing, so a reading is never observed
//! half-styled.

use std::fmt::Write;

/// Static styling applied to one span of rendered text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanStyle {
    pub color: String,
    pub background: String,
    pub font: String,
    pub font_size: String,
}

impl SpanStyle {
    pub fn new(color: &str, background: &str, font: &str, font_size: &str) -> Self {
        SpanStyle {
            color: color.to_string(),
            background: background.to_string(),
            font: font.to_string(),
            font_size: font_size.to_string(),
        }
    }
}

/// Wraps `text` in a fully-attributed span. `text` is trusted markup and
/// passes through unescaped.
pub fn span(style: &SpanStyle, text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 64);
    let _ = write!(
        out,
        "<span color='{}' background='{}' font='{}' size='{}'>{}</span>",
        style.color, style.background, style.font, style.font_size, text
    );
    out
}

/// A span carrying only a foreground color, used by up/down state glyphs.
pub fn colored(color: &str, text: &str) -> String {
    if color.is_empty() {
        text.to_string()
    } else {
        format!("<span foreground=\"{color}\">{text}</span>")
    }
}
