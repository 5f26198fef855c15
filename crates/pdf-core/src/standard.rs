//! Standard 14 PDF fonts (Helvetica, Times, Courier families)
//!
//! These fonts are referenced by name and never embedded. Text is written
//! with WinAnsiEncoding; widths come from the Adobe core font metrics.

/// A non-embedded standard PDF font
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

/// Widths for ASCII 32..=126, in 1/1000 em
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722, 722, 667,
    611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 278, 278, 278, 469, 556, 222, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500,
    222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, 975, 722, 722, 722, 722, 667,
    611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 333, 278, 333, 584, 556, 333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556,
    278, 889, 611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, 921, 722, 667, 667, 722, 611,
    556, 722, 722, 333, 389, 722, 611, 889, 722, 722, 556, 722, 667, 556, 611, 722, 722, 944, 722,
    722, 611, 333, 278, 333, 469, 500, 333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500,
    278, 778, 500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

const TIMES_BOLD_WIDTHS: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500, 930, 722, 667, 722, 722, 667,
    611, 778, 778, 389, 500, 778, 667, 944, 722, 778, 611, 778, 722, 556, 667, 722, 722, 1000, 722,
    722, 667, 333, 278, 333, 581, 500, 333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556,
    278, 833, 556, 500, 556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

const TIMES_ITALIC_WIDTHS: [u16; 95] = [
    250, 333, 420, 500, 500, 833, 778, 214, 333, 333, 500, 675, 250, 333, 250, 278, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 333, 333, 675, 675, 675, 500, 920, 611, 611, 667, 722, 611,
    611, 722, 722, 333, 444, 667, 556, 833, 667, 722, 611, 722, 611, 500, 556, 722, 611, 833, 611,
    556, 556, 389, 278, 389, 422, 500, 333, 500, 500, 444, 500, 444, 278, 500, 500, 278, 278, 444,
    278, 722, 500, 500, 500, 500, 389, 389, 278, 500, 444, 667, 444, 444, 389, 400, 275, 400, 541,
];

const TIMES_BOLD_ITALIC_WIDTHS: [u16; 95] = [
    250, 389, 555, 500, 500, 833, 778, 278, 333, 333, 500, 570, 250, 333, 250, 278, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500, 832, 667, 667, 667, 722, 667,
    667, 722, 778, 389, 500, 667, 611, 889, 722, 722, 611, 722, 667, 556, 611, 722, 667, 889, 667,
    611, 611, 333, 278, 333, 570, 500, 333, 500, 500, 444, 500, 444, 333, 500, 556, 278, 278, 500,
    278, 778, 556, 500, 500, 500, 389, 389, 278, 556, 444, 667, 500, 444, 389, 348, 220, 348, 570,
];

impl StandardFont {
    /// Resolve a family name (`helvetica`, `times`, `courier`, and common aliases)
    /// and weight/slant to a standard font
    pub fn from_family(family: &str, bold: bool, italic: bool) -> Option<Self> {
        let normalized: String = family
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        let font = match (normalized.as_str(), bold, italic) {
            ("helvetica" | "arial" | "sans" | "sansserif", false, false) => Self::Helvetica,
            ("helvetica" | "arial" | "sans" | "sansserif", true, false) => Self::HelveticaBold,
            ("helvetica" | "arial" | "sans" | "sansserif", false, true) => Self::HelveticaOblique,
            ("helvetica" | "arial" | "sans" | "sansserif", true, true) => {
                Self::HelveticaBoldOblique
            }
            ("times" | "timesroman" | "timesnewroman" | "serif", false, false) => Self::TimesRoman,
            ("times" | "timesroman" | "timesnewroman" | "serif", true, false) => Self::TimesBold,
            ("times" | "timesroman" | "timesnewroman" | "serif", false, true) => Self::TimesItalic,
            ("times" | "timesroman" | "timesnewroman" | "serif", true, true) => {
                Self::TimesBoldItalic
            }
            ("courier" | "couriernew" | "monospace", false, false) => Self::Courier,
            ("courier" | "couriernew" | "monospace", true, false) => Self::CourierBold,
            ("courier" | "couriernew" | "monospace", false, true) => Self::CourierOblique,
            ("courier" | "couriernew" | "monospace", true, true) => Self::CourierBoldOblique,
            _ => return None,
        };
        Some(font)
    }

    /// PostScript name used as the /BaseFont entry
    pub fn base_font(self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::HelveticaOblique => "Helvetica-Oblique",
            Self::HelveticaBoldOblique => "Helvetica-BoldOblique",
            Self::TimesRoman => "Times-Roman",
            Self::TimesBold => "Times-Bold",
            Self::TimesItalic => "Times-Italic",
            Self::TimesBoldItalic => "Times-BoldItalic",
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
            Self::CourierOblique => "Courier-Oblique",
            Self::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    fn widths(self) -> Option<&'static [u16; 95]> {
        match self {
            Self::Helvetica | Self::HelveticaOblique => Some(&HELVETICA_WIDTHS),
            Self::HelveticaBold | Self::HelveticaBoldOblique => Some(&HELVETICA_BOLD_WIDTHS),
            Self::TimesRoman => Some(&TIMES_ROMAN_WIDTHS),
            Self::TimesBold => Some(&TIMES_BOLD_WIDTHS),
            Self::TimesItalic => Some(&TIMES_ITALIC_WIDTHS),
            Self::TimesBoldItalic => Some(&TIMES_BOLD_ITALIC_WIDTHS),
            // Courier is monospaced
            _ => None,
        }
    }

    /// Advance width of a character in 1/1000 em
    pub fn char_width(self, c: char) -> u16 {
        let Some(widths) = self.widths() else {
            return 600;
        };
        let c = latin_base_letter(c);
        match c as u32 {
            code @ 32..=126 => widths[(code - 32) as usize],
            _ => widths[('n' as u32 - 32) as usize],
        }
    }

    /// Text width in points for a given font size
    pub fn text_width_points(self, text: &str, font_size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| self.char_width(c) as u32).sum();
        units as f32 / 1000.0 * font_size
    }

    /// Encode text as a hex string in WinAnsiEncoding for the Tj operator
    ///
    /// Characters outside the encoding are written as `?`.
    pub fn encode_text_hex(self, text: &str) -> String {
        let mut result = String::with_capacity(text.len() * 2 + 2);
        result.push('<');
        for c in text.chars() {
            result.push_str(&format!("{:02X}", win_ansi_code(c).unwrap_or(b'?')));
        }
        result.push('>');
        result
    }
}

/// Map a character to its WinAnsiEncoding byte
fn win_ansi_code(c: char) -> Option<u8> {
    match c as u32 {
        code @ (0x20..=0x7E | 0xA0..=0xFF) => Some(code as u8),
        _ => match c {
            '€' => Some(0x80),
            '‚' => Some(0x82),
            '„' => Some(0x84),
            '…' => Some(0x85),
            'Œ' => Some(0x8C),
            '‘' => Some(0x91),
            '’' => Some(0x92),
            '“' => Some(0x93),
            '”' => Some(0x94),
            '•' => Some(0x95),
            '–' => Some(0x96),
            '—' => Some(0x97),
            '™' => Some(0x99),
            'œ' => Some(0x9C),
            _ => None,
        },
    }
}

/// Unaccented letter used for width lookup of Latin-1 letters
fn latin_base_letter(c: char) -> char {
    match c {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ñ' => 'N',
        'Ò'..='Ö' | 'Ø' => 'O',
        'Ù'..='Ü' => 'U',
        'Ý' => 'Y',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' => 'i',
        'ñ' => 'n',
        'ò'..='ö' | 'ø' => 'o',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        '‘' | '’' => '\'',
        '“' | '”' => '"',
        '–' => '-',
        _ => c,
    }
}
