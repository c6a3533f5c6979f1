use serde::{Deserialize, Serialize};

/// Sizes at or below this render as this value instead of zero.
pub const MIN_SIZE_DISPLAYED: f64 = 0.01;
const DECIMALS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeFormat {
    pub decimal_separator: String,
    pub thousands_separator: String,
    /// Appended verbatim, including any leading space.
    pub unit: String,
    /// Rendered in place of a size that could not be computed.
    pub unknown: String,
}

impl Default for SizeFormat {
    fn default() -> Self {
        Self {
            decimal_separator: ".".to_string(),
            thousands_separator: " ".to_string(),
            unit: " MB".to_string(),
            unknown: "size unknown".to_string(),
        }
    }
}

impl SizeFormat {
    pub fn format_size(&self, size_mb: Option<f64>) -> String {
        match size_mb {
            None => self.unknown.clone(),
            Some(size) => {
                let shown = if size > MIN_SIZE_DISPLAYED {
                    size
                } else {
                    MIN_SIZE_DISPLAYED
                };
                format!("{}{}", self.format_number(shown), self.unit)
            }
        }
    }

    /// Fixed two decimals with grouped thousands.
    pub fn format_number(&self, value: f64) -> String {
        let fixed = format!("{:.*}", DECIMALS, value.abs());
        let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

        let mut out = String::with_capacity(fixed.len() + 4);
        if value < 0.0 && fixed.bytes().any(|b| matches!(b, b'1'..=b'9')) {
            out.push('-');
        }
        let len = int_part.len();
        for (i, digit) in int_part.chars().enumerate() {
            if i > 0 && (len - i) % 3 == 0 {
                out.push_str(&self.thousands_separator);
            }
            out.push(digit);
        }
        if !frac_part.is_empty() {
            out.push_str(&self.decimal_separator);
            out.push_str(frac_part);
        }
        out
    }
}
