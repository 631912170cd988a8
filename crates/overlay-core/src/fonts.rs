//! Mapping of arbitrary font family names onto the PDF standard 14 fonts
//!
//! Exported text never embeds font programs. Families coming from the editor
//! (CSS generics, system names, subset-prefixed names from a PDF) collapse to
//! Helvetica, Times or Courier, with the bold/italic flags picking the variant.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFamily {
    Helvetica,
    Times,
    Courier,
}

impl FontFamily {
    /// Classify a family name. Unknown names fall back to Helvetica.
    pub fn classify(name: &str) -> Self {
        let lower = name.to_lowercase();

        match lower.as_str() {
            "serif" => return FontFamily::Times,
            "sans-serif" | "cursive" | "fantasy" => return FontFamily::Helvetica,
            "monospace" => return FontFamily::Courier,
            _ => {}
        }

        if lower.contains("times") || lower.contains("georgia") || lower.contains("garamond") {
            return FontFamily::Times;
        }

        if lower.contains("courier")
            || lower.contains("mono")
            || lower.contains("consolas")
            || lower.contains("monaco")
        {
            return FontFamily::Courier;
        }

        FontFamily::Helvetica
    }

    /// Average advance width as a fraction of the font size
    fn average_advance(self) -> f64 {
        match self {
            FontFamily::Helvetica => 0.52,
            FontFamily::Times => 0.45,
            FontFamily::Courier => 0.6,
        }
    }
}

/// Standard 14 base font name for a family with style flags.
///
/// Style words already present in the name ("Arial-BoldMT") count as flags.
pub fn standard_font(family: &str, bold: bool, italic: bool) -> &'static str {
    let lower = family.to_lowercase();
    let bold = bold || lower.contains("bold");
    let italic = italic || lower.contains("italic") || lower.contains("oblique");

    match (FontFamily::classify(family), bold, italic) {
        (FontFamily::Times, true, true) => "Times-BoldItalic",
        (FontFamily::Times, true, false) => "Times-Bold",
        (FontFamily::Times, false, true) => "Times-Italic",
        (FontFamily::Times, false, false) => "Times-Roman",
        (FontFamily::Helvetica, true, true) => "Helvetica-BoldOblique",
        (FontFamily::Helvetica, true, false) => "Helvetica-Bold",
        (FontFamily::Helvetica, false, true) => "Helvetica-Oblique",
        (FontFamily::Helvetica, false, false) => "Helvetica",
        (FontFamily::Courier, true, true) => "Courier-BoldOblique",
        (FontFamily::Courier, true, false) => "Courier-Bold",
        (FontFamily::Courier, false, true) => "Courier-Oblique",
        (FontFamily::Courier, false, false) => "Courier",
    }
}

/// Estimated rendered width of a single line of text.
///
/// Used where no text measurement is available (PDF export). Exact for
/// Courier, close enough for underline placement in the proportional faces.
pub fn approx_text_width(text: &str, family: &str, font_size: f64) -> f64 {
    let chars = text.chars().count() as f64;
    chars * font_size * FontFamily::classify(family).average_advance()
}

/// CSS font shorthand for canvas rendering
pub fn css_font(family: &str, size_px: f64, bold: bool, italic: bool) -> String {
    let css_family = match FontFamily::classify(family) {
        FontFamily::Helvetica => "Helvetica, Arial, sans-serif",
        FontFamily::Times => "\"Times New Roman\", Times, serif",
        FontFamily::Courier => "\"Courier New\", Courier, monospace",
    };
    format!(
        "{}{}{}px {}",
        if italic { "italic " } else { "" },
        if bold { "bold " } else { "" },
        size_px,
        css_family
    )
}
