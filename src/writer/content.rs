//! Content stream builder.
//!
//! Emits the small set of operators this pipeline draws with: graphics
//! state save/restore, CTM transforms, XObject placement, and simple
//! absolutely-positioned text.

use std::io::Write;

/// Builds a page content stream operator by operator.
#[derive(Debug, Default)]
pub struct ContentStreamBuilder {
    ops: Vec<u8>,
}

impl ContentStreamBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Save the graphics state (q).
    pub fn save_state(&mut self) -> &mut Self {
        self.ops.extend_from_slice(b"q\n");
        self
    }

    /// Restore the graphics state (Q).
    pub fn restore_state(&mut self) -> &mut Self {
        self.ops.extend_from_slice(b"Q\n");
        self
    }

    /// Concatenate a transformation matrix (cm).
    pub fn transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> &mut Self {
        writeln!(
            self.ops,
            "{} {} {} {} {} {} cm",
            fmt_num(a),
            fmt_num(b),
            fmt_num(c),
            fmt_num(d),
            fmt_num(e),
            fmt_num(f)
        )
        .unwrap();
        self
    }

    /// Paint a named XObject (Do).
    pub fn draw_xobject(&mut self, name: &str) -> &mut Self {
        writeln!(self.ops, "/{} Do", name).unwrap();
        self
    }

    /// Place an XObject scaled to `width` x `height` at (x, y).
    ///
    /// Image XObjects live in a unit square, so the CTM carries the full
    /// placement.
    pub fn place_xobject(&mut self, name: &str, x: f64, y: f64, width: f64, height: f64) -> &mut Self {
        self.save_state()
            .transform(width, 0.0, 0.0, height, x, y)
            .draw_xobject(name)
            .restore_state()
    }

    /// Show one line of text in the named font at (x, y).
    pub fn text_at(&mut self, font: &str, size: f64, x: f64, y: f64, text: &str) -> &mut Self {
        writeln!(self.ops, "BT").unwrap();
        writeln!(self.ops, "/{} {} Tf", font, fmt_num(size)).unwrap();
        writeln!(self.ops, "{} {} Td", fmt_num(x), fmt_num(y)).unwrap();
        self.ops.extend_from_slice(b"(");
        self.ops
            .extend_from_slice(escape_text_string(text).as_bytes());
        self.ops.extend_from_slice(b") Tj\n");
        writeln!(self.ops, "ET").unwrap();
        self
    }

    /// Whether any operators have been emitted.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Finish and take the operator bytes.
    pub fn build(self) -> Vec<u8> {
        self.ops
    }
}

/// Format a number the way content streams expect: integers bare, reals
/// with trailing zeros trimmed.
fn fmt_num(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        let formatted = format!("{:.4}", value);
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

/// Escape the characters that terminate a literal string.
fn escape_text_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' => result.push_str("\\("),
            ')' => result.push_str("\\)"),
            '\\' => result.push_str("\\\\"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_xobject_ops() {
        let mut builder = ContentStreamBuilder::new();
        builder.place_xobject("Im1", 5.0, 770.0, 75.0, 75.0);
        let ops = String::from_utf8(builder.build()).unwrap();

        assert_eq!(ops, "q\n75 0 0 75 5 770 cm\n/Im1 Do\nQ\n");
    }

    #[test]
    fn test_text_at_ops() {
        let mut builder = ContentStreamBuilder::new();
        builder.text_at("F1", 12.0, 72.0, 720.0, "Hello (World)");
        let ops = String::from_utf8(builder.build()).unwrap();

        assert!(ops.contains("BT"));
        assert!(ops.contains("/F1 12 Tf"));
        assert!(ops.contains("72 720 Td"));
        assert!(ops.contains("(Hello \\(World\\)) Tj"));
        assert!(ops.contains("ET"));
    }

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(75.0), "75");
        assert_eq!(fmt_num(595.28), "595.28");
        assert_eq!(fmt_num(0.5), "0.5");
    }

    #[test]
    fn test_empty_builder() {
        assert!(ContentStreamBuilder::new().is_empty());
    }
}
