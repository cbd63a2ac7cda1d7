//! Formatting extracted from inline `style` attributes and editor classes.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::Alignment;

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid style regex"))
}

/// `text-align` from an inline style.
pub fn text_align(style: &str) -> Option<Alignment> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let caps = regex(&RE, r"(?i)text-align:\s*(left|center|right|justify)").captures(style)?;
    Alignment::from_css(&caps[1])
}

/// `line-height` multiplier from an inline style.
pub fn line_height(style: &str) -> Option<f32> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let caps = regex(&RE, r"(?i)line-height:\s*([\d.]+)").captures(style)?;
    caps[1].parse().ok().filter(|v: &f32| *v > 0.0)
}

/// `font-size` in points; other units are ignored.
pub fn font_size(style: &str) -> Option<f32> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let caps = regex(&RE, r"(?i)font-size:\s*([\d.]+)pt").captures(style)?;
    caps[1].parse().ok().filter(|v: &f32| *v > 0.0)
}

/// First family of a `font-family` list, unquoted.
pub fn font_family(style: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let caps = regex(&RE, r#"(?i)font-family:\s*['"]?([^'";)]+)['"]?"#).captures(style)?;
    let family = caps[1]
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .replace(['\'', '"'], "");
    (!family.is_empty()).then_some(family)
}

/// Six-digit hex `color` as uppercase `RRGGBB`.
///
/// `background-color` is not a text color and is not matched.
pub fn color(style: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let caps = regex(&RE, r"(?i)(?:^|[;\s])color:\s*#?([0-9a-f]{6})\b").captures(style)?;
    Some(caps[1].to_ascii_uppercase())
}

fn classes(class: &str) -> impl Iterator<Item = &str> {
    class.split_ascii_whitespace()
}

/// Heading level from a `ql-header-N` class.
pub fn class_heading(class: &str) -> Option<u8> {
    classes(class)
        .filter_map(|c| c.strip_prefix("ql-header-"))
        .find_map(|n| n.parse().ok())
}

/// Alignment from a `ql-align-*` class.
pub fn class_align(class: &str) -> Option<Alignment> {
    classes(class)
        .filter_map(|c| c.strip_prefix("ql-align-"))
        .find_map(Alignment::from_css)
}

/// Font family from a `ql-font-*` class. Unknown editor fonts map to Cambria.
pub fn class_font(class: &str) -> Option<String> {
    let name = classes(class).find_map(|c| c.strip_prefix("ql-font-"))?;
    let family = match name {
        "arial" => "Arial",
        "times" => "Times New Roman",
        "courier" => "Courier New",
        _ => "Cambria",
    };
    Some(family.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_style() {
        let style = "font-size: 14pt; font-family: 'Times New Roman', serif; color: #ff0000; text-align: center; line-height: 1.5";
        assert_eq!(font_size(style), Some(14.0));
        assert_eq!(font_family(style), Some("Times New Roman".to_string()));
        assert_eq!(color(style), Some("FF0000".to_string()));
        assert_eq!(text_align(style), Some(Alignment::Center));
        assert_eq!(line_height(style), Some(1.5));
    }

    #[test]
    fn test_unsupported_units_and_background() {
        assert_eq!(font_size("font-size: 12px"), None);
        assert_eq!(color("background-color: #00ff00"), None);
        assert_eq!(color("color:#0000FF"), Some("0000FF".to_string()));
        assert_eq!(color("color: red"), None);
    }

    #[test]
    fn test_editor_classes() {
        assert_eq!(class_heading("ql-header-2 other"), Some(2));
        assert_eq!(class_align("ql-align-justify"), Some(Alignment::Justify));
        assert_eq!(class_font("ql-font-courier"), Some("Courier New".to_string()));
        assert_eq!(class_font("ql-font-comic"), Some("Cambria".to_string()));
        assert_eq!(class_font("plain"), None);
    }
}
