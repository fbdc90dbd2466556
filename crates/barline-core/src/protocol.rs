//! i3bar wire types: the one-time header, outbound block objects and
//! inbound click events, per <https://i3wm.org/docs/i3bar-protocol.html>.

use serde::{Deserialize, Serialize};

/// One-time handshake line printed before the infinite block array.
#[derive(Debug, Clone, Serialize)]
pub struct Header {
    pub version: u32,
    pub stop_signal: i32,
    pub cont_signal: i32,
    pub click_events: bool,
}

/// One renderable unit of the composed status line.
///
/// `full_text` carries pango markup; the serializer must pass it through
/// unmodified (serde_json does not escape HTML entities).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct I3Block {
    pub full_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<String>,
    pub border_top: u32,
    pub border_right: u32,
    pub border_bottom: u32,
    pub border_left: u32,
    // Pixels or characters depending on the bar, so kept as a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub urgent: bool,
    pub separator: bool,
    pub separator_block_width: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup: Option<String>,
}

impl I3Block {
    /// A pango-markup block with the common defaults the composer uses.
    pub fn pango(full_text: String) -> Self {
        I3Block {
            full_text,
            markup: Some("pango".to_string()),
            separator: false,
            ..I3Block::default()
        }
    }
}

/// Pointer event forwarded by the bar host, one JSON object per line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClickEvent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub instance: String,
    pub button: u8,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub relative_x: i32,
    #[serde(default)]
    pub relative_y: i32,
    #[serde(default)]
    pub output_x: i32,
    #[serde(default)]
    pub output_y: i32,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// Strips the bar host's framing artifacts from an inbound event line.
///
/// The stream is JSON-per-line except that the host prefixes lines with an
/// array separator and opens the stream with a non-JSON line; everything
/// before the first `{` is dropped. Returns `None` when no object start is
/// present at all.
pub fn sanitize_click_line(line: &str) -> Option<&str> {
    line.find('{').map(|at| &line[at..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_leading_separator() {
        assert_eq!(sanitize_click_line(",{\"button\":1}"), Some("{\"button\":1}"));
        assert_eq!(sanitize_click_line("{\"button\":1}"), Some("{\"button\":1}"));
        assert_eq!(sanitize_click_line("["), None);
        assert_eq!(sanitize_click_line(""), None);
    }

    #[test]
    fn click_event_parses_with_partial_fields() {
        let e: ClickEvent =
            serde_json::from_str("{\"name\":\"wallclock\",\"button\":1,\"modifiers\":[]}")
                .expect("parse");
        assert_eq!(e.name, "wallclock");
        assert_eq!(e.button, 1);
        assert_eq!(e.instance, "");
    }

    #[test]
    fn block_serialization_keeps_pango_markup_raw() {
        let b = I3Block::pango("<span color='#ff0000'>CPU: 42°</span>".to_string());
        let json = serde_json::to_string(&b).expect("serialize");
        assert!(json.contains("<span color='#ff0000'>CPU: 42°</span>"));
        assert!(!json.contains("\\u003c"));
    }

    #[test]
    fn block_serialization_omits_empty_optionals() {
        let b = I3Block::pango("x".to_string());
        let json = serde_json::to_string(&b).expect("serialize");
        assert!(!json.contains("short_text"));
        assert!(!json.contains("urgent"));
        assert!(json.contains("\"separator\":false"));
        assert!(json.contains("\"border_top\":0"));
    }
}
