//! Text rendering utilities

use crate::color::Color;
use crate::Align;

/// Context for rendering text
pub struct TextRenderContext {
    /// PDF font resource name (e.g., "F1")
    pub font_name: String,
    /// Font size in points
    pub font_size: f32,
    /// Text width in points (for alignment)
    pub text_width: f64,
    /// Text color (RGB)
    pub color: Color,
}

/// Format a number for a content stream: three decimals, trailing zeros dropped
pub(crate) fn fmt_num(value: f64) -> String {
    let formatted = format!("{value:.3}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

fn fmt_color(color: Color) -> String {
    format!(
        "{} {} {}",
        fmt_num(color.r as f64),
        fmt_num(color.g as f64),
        fmt_num(color.b as f64)
    )
}

/// Generate PDF operators for one line of text
///
/// `x` is the alignment anchor: the left edge, the center or the right edge
/// of the line depending on `align`. `y` is the baseline.
pub fn generate_text_operators(
    text_hex: &str,
    x: f64,
    y: f64,
    align: Align,
    ctx: &TextRenderContext,
) -> Vec<u8> {
    let x_offset = match align {
        Align::Left => 0.0,
        Align::Center => -ctx.text_width / 2.0,
        Align::Right => -ctx.text_width,
    };

    let mut ops = String::new();
    ops.push_str("BT\n");
    ops.push_str(&format!("{} rg\n", fmt_color(ctx.color)));
    ops.push_str(&format!("/{} {} Tf\n", ctx.font_name, fmt_num(ctx.font_size as f64)));
    ops.push_str(&format!("{} {} Td\n", fmt_num(x + x_offset), fmt_num(y)));
    ops.push_str(&format!("{text_hex} Tj\n"));
    ops.push_str("ET\n");

    ops.into_bytes()
}

/// Stroke a rectangle given its lower-left corner, in points
pub fn rectangle_operators(x: f64, y: f64, width: f64, height: f64, line_width: f64) -> Vec<u8> {
    format!(
        "q\n0 0 0 RG\n{} w\n{} {} {} {} re\nS\nQ\n",
        fmt_num(line_width),
        fmt_num(x),
        fmt_num(y),
        fmt_num(width),
        fmt_num(height)
    )
    .into_bytes()
}

/// Stroke a horizontal line in the given color (underline, strike-through)
pub fn horizontal_line_operators(x: f64, y: f64, width: f64, thickness: f64, color: Color) -> Vec<u8> {
    format!(
        "q\n{} RG\n{} w\n{} {} m\n{} {} l\nS\nQ\n",
        fmt_color(color),
        fmt_num(thickness),
        fmt_num(x),
        fmt_num(y),
        fmt_num(x + width),
        fmt_num(y)
    )
    .into_bytes()
}

/// Break text into lines no wider than `max_width`
///
/// Explicit newlines always start a new line. Lines break between words;
/// a single word wider than `max_width` is broken between characters.
/// `measure` returns the width of a string in the same unit as `max_width`.
pub fn wrap_text<F>(text: &str, max_width: f64, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f64,
{
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        let mut current = String::new();

        for word in paragraph.split(' ').filter(|w| !w.is_empty()) {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };

            if measure(&candidate) <= max_width {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }

            if measure(word) <= max_width {
                current = word.to_string();
                continue;
            }

            for c in word.chars() {
                current.push(c);
                if measure(&current) > max_width && current.chars().count() > 1 {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(c);
                }
            }
        }

        lines.push(current);
    }

    lines
}
