//! Inline style declarations and the small slice of computed style the effects need.

use smallvec::SmallVec;

/// Background reported for elements without a declared background.
pub const TRANSPARENT: &str = "rgba(0, 0, 0, 0)";

/// Ordered `property: value` declarations from a `style` attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    declarations: SmallVec<[(String, String); 4]>,
}

impl InlineStyle {
    /// Parse `a: b; c: d`, silently skipping declarations without a colon.
    #[must_use]
    pub fn parse(css: &str) -> Self {
        let mut style = Self::default();
        for declaration in css.split(';') {
            if let Some((name, value)) = declaration.split_once(':') {
                let name = name.trim();
                let value = value.trim();
                if !name.is_empty() && !value.is_empty() {
                    style.set(name, value);
                }
            }
        }
        style
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.declarations
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set a property, replacing any previous declaration of the same name in place.
    pub fn set(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        if let Some(slot) = self
            .declarations
            .iter_mut()
            .find(|(existing, _)| *existing == name)
        {
            slot.1 = value.to_string();
        } else {
            self.declarations.push((name, value.to_string()));
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    #[must_use]
    pub fn to_css(&self) -> String {
        self.declarations
            .iter()
            .map(|(name, value)| format!("{name}: {value};"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// User-agent default `display` for a tag.
#[must_use]
pub fn default_display(tag: &str) -> &'static str {
    match tag {
        "html" | "body" | "div" | "p" | "ul" | "ol" | "li" | "section" | "article" | "header"
        | "footer" | "nav" | "main" | "aside" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
        | "form" | "blockquote" | "pre" | "dl" | "dt" | "dd" | "hr" | "address" | "fieldset"
        | "figure" | "figcaption" | "details" | "summary" => "block",
        "table" => "table",
        "tr" => "table-row",
        "td" | "th" => "table-cell",
        "head" | "style" | "script" | "title" | "meta" | "link" | "template" => "none",
        _ => "inline",
    }
}

/// Color layer of a `background` shorthand; `None` when it declares no color.
///
/// Images, `none` and positional keywords are skipped. When several tokens parse as
/// colors the last one wins, matching the final-layer rule.
#[must_use]
pub fn shorthand_color(value: &str) -> Option<&str> {
    top_level_tokens(value)
        .into_iter()
        .rev()
        .find(|token| crate::effects::parse_color(token).is_some())
}

/// Split on whitespace and commas outside parentheses.
fn top_level_tokens(value: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    for (index, ch) in value.char_indices() {
        if depth == 0 && (ch.is_whitespace() || ch == ',') {
            if let Some(from) = start.take() {
                tokens.push(&value[from..index]);
            }
            continue;
        }
        start.get_or_insert(index);
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    if let Some(from) = start {
        tokens.push(&value[from..]);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_without_duplicating() {
        let mut style = InlineStyle::parse("color: red; Display : block");
        assert_eq!(style.get("display"), Some("block"));
        style.set("display", "inline-block");
        style.set("--rt-bg-color", "rgba(0, 0, 0, 0.06)");
        style.set("--rt-bg-color", "rgba(0, 0, 0, 0.06)");
        assert_eq!(style.len(), 3);
        assert_eq!(
            style.to_css(),
            "color: red; display: inline-block; --rt-bg-color: rgba(0, 0, 0, 0.06);"
        );
    }

    #[test]
    fn malformed_declarations_are_skipped() {
        let style = InlineStyle::parse("garbage; : x; width:");
        assert!(style.is_empty());
    }

    #[test]
    fn shorthand_color_skips_images_and_keywords() {
        assert_eq!(shorthand_color("none"), None);
        assert_eq!(shorthand_color("url(a b.png) no-repeat"), None);
        assert_eq!(
            shorthand_color("url(bg.png) rgb(12, 12, 12) top left"),
            Some("rgb(12, 12, 12)")
        );
        assert_eq!(shorthand_color("#222 url(x.png)"), Some("#222"));
    }
}
