//! Locale conventions used by number and date conversion.
//!
//! Only the conventions the converter needs are modeled: decimal and grouping
//! separators plus SHORT/MEDIUM date and time patterns (as `chrono` format
//! strings).

/// Number and date conventions of one locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocaleInfo {
    pub tag: &'static str,
    pub decimal: char,
    pub group: char,
    pub short_date: &'static str,
    pub medium_date: &'static str,
    pub short_time: &'static str,
    pub medium_time: &'static str,
}

const NARROW_NBSP: char = '\u{202F}';

static LOCALES: &[LocaleInfo] = &[
    LocaleInfo {
        tag: "en-US",
        decimal: '.',
        group: ',',
        short_date: "%m/%d/%Y",
        medium_date: "%b %d, %Y",
        short_time: "%I:%M %p",
        medium_time: "%I:%M:%S %p",
    },
    LocaleInfo {
        tag: "en-GB",
        decimal: '.',
        group: ',',
        short_date: "%d/%m/%Y",
        medium_date: "%d %b %Y",
        short_time: "%H:%M",
        medium_time: "%H:%M:%S",
    },
    LocaleInfo {
        tag: "fr-FR",
        decimal: ',',
        group: NARROW_NBSP,
        short_date: "%d/%m/%Y",
        medium_date: "%d %b %Y",
        short_time: "%H:%M",
        medium_time: "%H:%M:%S",
    },
    LocaleInfo {
        tag: "de-DE",
        decimal: ',',
        group: '.',
        short_date: "%d.%m.%Y",
        medium_date: "%d.%m.%Y",
        short_time: "%H:%M",
        medium_time: "%H:%M:%S",
    },
    LocaleInfo {
        tag: "es-ES",
        decimal: ',',
        group: '.',
        short_date: "%d/%m/%Y",
        medium_date: "%d %b %Y",
        short_time: "%H:%M",
        medium_time: "%H:%M:%S",
    },
    LocaleInfo {
        tag: "it-IT",
        decimal: ',',
        group: '.',
        short_date: "%d/%m/%Y",
        medium_date: "%d %b %Y",
        short_time: "%H:%M",
        medium_time: "%H:%M:%S",
    },
    LocaleInfo {
        tag: "pt-BR",
        decimal: ',',
        group: '.',
        short_date: "%d/%m/%Y",
        medium_date: "%d de %b de %Y",
        short_time: "%H:%M",
        medium_time: "%H:%M:%S",
    },
    LocaleInfo {
        tag: "nl-NL",
        decimal: ',',
        group: '.',
        short_date: "%d-%m-%Y",
        medium_date: "%d %b %Y",
        short_time: "%H:%M",
        medium_time: "%H:%M:%S",
    },
    LocaleInfo {
        tag: "ja-JP",
        decimal: '.',
        group: ',',
        short_date: "%Y/%m/%d",
        medium_date: "%Y/%m/%d",
        short_time: "%H:%M",
        medium_time: "%H:%M:%S",
    },
];

/// Look up a locale by tag.
///
/// Accepts `fr_FR` and `fr-FR` spellings, falls back to the first entry of the
/// same language and finally to `en-US`.
pub fn lookup(tag: &str) -> &'static LocaleInfo {
    let normalized = tag.trim().replace('_', "-");

    if let Some(info) = LOCALES
        .iter()
        .find(|l| l.tag.eq_ignore_ascii_case(&normalized))
    {
        return info;
    }

    let language = normalized.split('-').next().unwrap_or_default();
    LOCALES
        .iter()
        .find(|l| {
            l.tag
                .split('-')
                .next()
                .is_some_and(|lang| lang.eq_ignore_ascii_case(language))
        })
        .unwrap_or(&LOCALES[0])
}

impl LocaleInfo {
    fn is_group_char(&self, c: char) -> bool {
        if c == self.group {
            return true;
        }
        // Space-grouped locales accept every kind of space the user may type.
        self.group.is_whitespace() && (c.is_whitespace() || c == '\u{00A0}' || c == NARROW_NBSP)
    }

    /// Normalize a localized numeric string to `str::parse` syntax.
    ///
    /// Returns `None` when the input contains characters that are neither
    /// digits, a sign, the decimal separator nor a grouping separator.
    fn normalize_number(&self, input: &str) -> Option<String> {
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            if c.is_ascii_digit() || ((c == '-' || c == '+') && out.is_empty()) {
                out.push(c);
            } else if c == self.decimal {
                out.push('.');
            } else if self.is_group_char(c) {
                continue;
            } else if (c == 'e' || c == 'E') && !out.is_empty() {
                out.push('e');
            } else {
                return None;
            }
        }
        Some(out)
    }

    /// Parse a localized decimal number.
    pub fn parse_number(&self, input: &str) -> Option<f64> {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Some(0.0);
        }
        self.normalize_number(trimmed)?.parse::<f64>().ok()
    }

    /// Parse a localized integer. Fractional input truncates toward zero.
    pub fn parse_integer(&self, input: &str) -> Option<i64> {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Some(0);
        }
        let normalized = self.normalize_number(trimmed)?;
        normalized
            .parse::<i64>()
            .ok()
            .or_else(|| normalized.parse::<f64>().ok().map(|f| f.trunc() as i64))
    }

    /// Format a number with grouping and at most three fraction digits.
    pub fn format_number(&self, number: f64) -> String {
        if !number.is_finite() {
            return number.to_string();
        }

        let rendered = format!("{:.3}", number.abs());
        let (int_part, frac_part) = rendered.split_once('.').unwrap_or((&rendered, ""));
        let frac_part = frac_part.trim_end_matches('0');

        let mut grouped = String::new();
        let digits: Vec<char> = int_part.chars().collect();
        for (i, c) in digits.iter().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(self.group);
            }
            grouped.push(*c);
        }

        let mut out = String::new();
        if number < 0.0 && (int_part != "0" || !frac_part.is_empty()) {
            out.push('-');
        }
        out.push_str(&grouped);
        if !frac_part.is_empty() {
            out.push(self.decimal);
            out.push_str(frac_part);
        }
        out
    }
}
