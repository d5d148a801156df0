//! Visual marking of read links and the stylesheet that drives it.

use crate::classify::Classifier;
use crate::constants::{DARK_LUMINANCE_THRESHOLD, MAGNET_CLASS, READ_CLASS, STYLE_ELEMENT_ID};
use crate::dom::{Document, ElementRef, NodeId};
use crate::types::ReadRecord;

/// Background assumed when no ancestor, including `<body>`, declares one.
const CANVAS_BACKGROUND: &str = "rgb(255, 255, 255)";

const STYLES: &str = r#"
.rt-read {
  display: inline !important;
  padding: 2px 8px 2px 16px !important;
  margin: 2px 0 !important;
  border-radius: 4px !important;
  background-color: var(--rt-bg-color, rgba(0, 0, 0, 0.08)) !important;
  color: var(--rt-font-color) !important;
  font-weight: var(--rt-font-weight, normal) !important;
  box-decoration-break: clone !important;
  -webkit-box-decoration-break: clone !important;
  vertical-align: text-top !important;
  text-decoration: none !important;
  line-height: 1.2 !important;
  position: relative !important;
  opacity: 0.85 !important;
}

.rt-read:not(.rt-magnet)::before {
  content: "" !important;
  position: absolute !important;
  left: 0 !important;
  top: 0 !important;
  bottom: 0 !important;
  width: 8px !important;
  background: var(--rt-accent-color) !important;
  border-top-left-radius: 4px !important;
  border-bottom-left-radius: 4px !important;
  opacity: 0.8 !important;
}

.rt-magnet {
  padding: 2px 8px !important;
}

.rt-read:hover {
  opacity: 1 !important;
  transition: all 0.2s ease !important;
}

.rt-read:hover:not(.rt-magnet)::before {
  opacity: 1 !important;
  transition: opacity 0.2s ease !important;
}

.rt-read[style*="display: block"],
.rt-read[style*="display:block"] {
  display: inline !important;
}
"#;

/// Overlay and accent values for one background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeColors {
    pub background: &'static str,
    pub accent: &'static str,
    pub font: &'static str,
    pub font_weight: &'static str,
}

const DARK_THEME: ThemeColors = ThemeColors {
    background: "rgba(255, 255, 255, 0.12)",
    accent: "rgba(128, 128, 128, 0.85)",
    font: "rgba(255, 255, 255, 0.2)",
    font_weight: "normal",
};

const LIGHT_THEME: ThemeColors = ThemeColors {
    background: "rgba(0, 0, 0, 0.06)",
    accent: "rgba(128, 128, 128, 0.85)",
    font: "rgba(0, 0, 0, 0.2)",
    font_weight: "normal",
};

#[must_use]
pub fn theme_for_luminance(luminance: f64) -> ThemeColors {
    if luminance <= DARK_LUMINANCE_THRESHOLD {
        DARK_THEME
    } else {
        LIGHT_THEME
    }
}

/// An sRGB color with alpha in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }
}

/// Parse `rgb()`/`rgba()`, `#rgb`/`#rrggbb`, `transparent`, `white` and `black`.
#[must_use]
pub fn parse_color(value: &str) -> Option<Rgba> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "transparent" => {
            return Some(Rgba {
                r: 0,
                g: 0,
                b: 0,
                a: 0.0,
            });
        }
        "white" => return Some(Rgba { r: 255, g: 255, b: 255, a: 1.0 }),
        "black" => return Some(Rgba { r: 0, g: 0, b: 0, a: 1.0 }),
        _ => {}
    }
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex.split_whitespace().next().unwrap_or_default());
    }
    let inner = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))?;
    let inner = inner.split(')').next()?;
    let parts: Vec<&str> = inner
        .split([',', ' ', '/'])
        .filter(|part| !part.is_empty())
        .collect();
    if parts.len() < 3 {
        return None;
    }
    let channel = |part: &str| -> Option<u8> {
        let number: f64 = part.parse().ok()?;
        Some(number.round().clamp(0.0, 255.0) as u8)
    };
    let alpha = match parts.get(3) {
        Some(part) => part.parse::<f64>().ok()?.clamp(0.0, 1.0),
        None => 1.0,
    };
    Some(Rgba {
        r: channel(parts[0])?,
        g: channel(parts[1])?,
        b: channel(parts[2])?,
        a: alpha,
    })
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let expand = |digit: u8| digit * 17;
    let nibble = |ch: char| ch.to_digit(16).map(|d| d as u8);
    let chars: Vec<char> = hex.chars().collect();
    match chars.len() {
        3 => Some(Rgba {
            r: expand(nibble(chars[0])?),
            g: expand(nibble(chars[1])?),
            b: expand(nibble(chars[2])?),
            a: 1.0,
        }),
        6 => Some(Rgba {
            r: nibble(chars[0])? * 16 + nibble(chars[1])?,
            g: nibble(chars[2])? * 16 + nibble(chars[3])?,
            b: nibble(chars[4])? * 16 + nibble(chars[5])?,
            a: 1.0,
        }),
        _ => None,
    }
}

/// WCAG relative luminance; unparseable colors count as white.
#[must_use]
pub fn relative_luminance(color: &str) -> f64 {
    let rgba = parse_color(color).unwrap_or(Rgba {
        r: 255,
        g: 255,
        b: 255,
        a: 1.0,
    });
    let linear = |channel: u8| {
        let c = f64::from(channel) / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    0.2126 * linear(rgba.r) + 0.7152 * linear(rgba.g) + 0.0722 * linear(rgba.b)
}

fn is_transparent(color: &str) -> bool {
    parse_color(color).is_some_and(|rgba| rgba.is_transparent())
}

/// First non-transparent background from `element` upward, else `<body>`, else the canvas.
#[must_use]
pub fn effective_background(element: ElementRef<'_>) -> String {
    let mut cursor = Some(element);
    while let Some(current) = cursor {
        let background = current.computed_background();
        if !is_transparent(&background) {
            return background;
        }
        cursor = current.parent_element();
    }
    let doc = element.document();
    doc.body()
        .and_then(|body| doc.element(body))
        .map(|body| body.computed_background())
        .filter(|background| !is_transparent(background))
        .unwrap_or_else(|| CANVAS_BACKGROUND.to_string())
}

/// Owns the injected stylesheet and applies marker state to anchors.
#[derive(Debug, Default)]
pub struct StyleManager {
    sheet: Option<NodeId>,
}

impl StyleManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.sheet.is_some()
    }

    /// Inject the stylesheet once; returns `true` only when it was inserted by this call.
    pub fn initialize(&mut self, doc: &mut Document) -> bool {
        if let Some(sheet) = self.sheet {
            if doc.is_connected(sheet) {
                return false;
            }
        }
        let Some(parent) = doc.head().or_else(|| doc.body()) else {
            tracing::warn!("document has neither head nor body; stylesheet not injected");
            return false;
        };
        let sheet = doc.create_element("style");
        doc.set_attribute(sheet, "id", STYLE_ELEMENT_ID);
        doc.set_text(sheet, STYLES);
        doc.append_child(parent, sheet);
        self.sheet = Some(sheet);
        true
    }

    /// Remove the stylesheet injected by `initialize`, if any.
    pub fn cleanup(&mut self, doc: &mut Document) {
        if let Some(sheet) = self.sheet.take() {
            doc.remove(sheet);
        }
    }

    /// Apply the read marker to `anchor`. Already-marked anchors are left untouched.
    ///
    /// Returns `true` when the anchor was newly marked.
    pub fn mark_link(&self, doc: &mut Document, anchor: NodeId, record: &ReadRecord) -> bool {
        let Some(element) = doc.element(anchor) else {
            return false;
        };
        if element.has_class(READ_CLASS) {
            return false;
        }

        let needs_inline_block = element.computed_display() == "block";
        let colors = theme_for_luminance(relative_luminance(&effective_background(element)));
        let magnet = Classifier::is_external_resource_link(element);
        let tooltip = (!element.has_attr("title")).then(|| record.tooltip());

        if needs_inline_block {
            doc.set_style_property(anchor, "display", "inline-block");
        }
        doc.set_style_property(anchor, "--rt-bg-color", colors.background);
        doc.set_style_property(anchor, "--rt-accent-color", colors.accent);
        doc.set_style_property(anchor, "--rt-font-color", colors.font);
        doc.set_style_property(anchor, "--rt-font-weight", colors.font_weight);
        doc.add_class(anchor, READ_CLASS);
        if magnet {
            doc.add_class(anchor, MAGNET_CLASS);
        }
        if let Some(tooltip) = tooltip {
            doc.set_attribute(anchor, "title", &tooltip);
        }
        tracing::debug!(effects.url = %record.url, effects.magnet = magnet, "link marked read");
        true
    }
}
