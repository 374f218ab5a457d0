use chrono::{DateTime, Utc};
use serde_json::Value;

/// Placeholder shown for missing or null cells.
pub const MISSING: &str = "-";

/// Trait for formatting different types of data
pub trait Formatter<T> {
    fn format(&self, input: T) -> String;
}

/// Converts a raw backend number into the unit shown to the user.
pub type UnitConverter = fn(f64) -> f64;

/// How a single table cell is rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellFormat {
    /// The value as-is; strings without quotes.
    Plain,
    /// A number with a fixed count of decimals.
    Fixed(usize),
    /// The value followed by a unit suffix, e.g. `2x`.
    Suffix(&'static str),
    /// Unix seconds rendered as a UTC date and time.
    Timestamp,
}

/// Formats JSON cells according to a [`CellFormat`], after an optional unit conversion.
pub struct CellFormatter {
    pub format: CellFormat,
    pub convert: Option<UnitConverter>,
}

impl Formatter<Option<&Value>> for CellFormatter {
    fn format(&self, input: Option<&Value>) -> String {
        let value = match input {
            None | Some(Value::Null) => return MISSING.to_string(),
            Some(value) => value,
        };

        let converted = match (self.convert, value.as_f64()) {
            (Some(convert), Some(number)) => Some(convert(number)),
            (None, Some(number)) => Some(number),
            _ => None,
        };

        match (self.format, converted) {
            (CellFormat::Fixed(decimals), Some(number)) => format!("{:.*}", decimals, number),
            (CellFormat::Timestamp, Some(number)) => format_timestamp(number),
            (CellFormat::Suffix(suffix), _) => {
                format!("{}{}", plain(value, converted, self.convert.is_some()), suffix)
            }
            _ => plain(value, converted, self.convert.is_some()),
        }
    }
}

fn plain(value: &Value, converted: Option<f64>, was_converted: bool) -> String {
    match (value, converted) {
        (_, Some(number)) if was_converted => number.to_string(),
        (Value::String(s), _) => s.clone(),
        (other, _) => other.to_string(),
    }
}

fn format_timestamp(seconds: f64) -> String {
    DateTime::<Utc>::from_timestamp(seconds as i64, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| seconds.to_string())
}

/// MB -> GB
pub fn mb_to_gb(value: f64) -> f64 {
    value / 1000.0
}

/// 0..1 -> 0..100
pub fn fraction_to_percent(value: f64) -> f64 {
    value * 100.0
}

pub fn seconds_to_days(value: f64) -> f64 {
    value / (24.0 * 60.0 * 60.0)
}

// Convenience function
pub fn format_cell(value: Option<&Value>, format: CellFormat, convert: Option<UnitConverter>) -> String {
    CellFormatter { format, convert }.format(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_and_null() {
        assert_eq!(format_cell(None, CellFormat::Fixed(1), None), "-");
        assert_eq!(format_cell(Some(&Value::Null), CellFormat::Plain, None), "-");
    }

    #[test]
    fn test_fixed_decimals() {
        assert_eq!(format_cell(Some(&json!(0.123456)), CellFormat::Fixed(4), None), "0.1235");
        assert_eq!(format_cell(Some(&json!(512)), CellFormat::Fixed(0), None), "512");
        assert_eq!(format_cell(Some(&json!(12.0)), CellFormat::Fixed(1), None), "12.0");
    }

    #[test]
    fn test_plain_and_suffix() {
        assert_eq!(format_cell(Some(&json!("RTX 4090")), CellFormat::Plain, None), "RTX 4090");
        assert_eq!(format_cell(Some(&json!(4)), CellFormat::Suffix("x"), None), "4x");
        assert_eq!(format_cell(Some(&json!(true)), CellFormat::Plain, None), "true");
    }

    #[test]
    fn test_unit_converters() {
        assert_eq!(
            format_cell(Some(&json!(64000)), CellFormat::Fixed(1), Some(mb_to_gb)),
            "64.0"
        );
        assert_eq!(
            format_cell(Some(&json!(0.9931)), CellFormat::Fixed(1), Some(fraction_to_percent)),
            "99.3"
        );
        assert_eq!(
            format_cell(Some(&json!(172800)), CellFormat::Fixed(1), Some(seconds_to_days)),
            "2.0"
        );
    }

    #[test]
    fn test_converter_ignores_strings() {
        assert_eq!(
            format_cell(Some(&json!("n/a")), CellFormat::Fixed(1), Some(mb_to_gb)),
            "n/a"
        );
    }

    #[test]
    fn test_timestamp() {
        assert_eq!(
            format_cell(Some(&json!(1700000000.5)), CellFormat::Timestamp, None),
            "2023-11-14T22:13:20"
        );
    }
}
