//! Display helpers for counts, shares and week-over-week changes.

use crate::models::Delta;

/// Format `value` with `,` thousands separators and exactly `decimals`
/// fractional digits.
///
/// # Examples
///
/// ```
/// use pulse_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = group_thousands(int_part);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }

    // "-0.0" is not a useful thing to show.
    if value < 0.0 && out.bytes().any(|b| matches!(b, b'1'..=b'9')) {
        out.insert(0, '-');
    }
    out
}

/// Format an integer count with thousands separators, e.g. `1,234`.
pub fn format_count(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// Format a 0-100 share with one decimal and a `%` suffix, e.g. `66.7%`.
pub fn format_percentage(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Format a signed change with an explicit `+` for non-negative values.
pub fn format_signed(value: i64) -> String {
    if value >= 0 {
        format!("+{}", group_thousands(&value.to_string()))
    } else {
        format!("-{}", group_thousands(&value.unsigned_abs().to_string()))
    }
}

/// Render a [`Delta`] either as a percentage (`+12.50%`) or as a raw
/// difference (`+25`). Missing data renders as `N/A`.
pub fn format_delta(delta: &Delta, as_percentage: bool) -> String {
    match delta {
        Delta::Unavailable => "N/A".to_string(),
        Delta::Available {
            absolute,
            percentage,
            ..
        } => {
            if as_percentage {
                match percentage {
                    Some(p) if *p >= 0.0 => format!("+{:.2}%", p),
                    Some(p) => format!("{:.2}%", p),
                    None => "N/A".to_string(),
                }
            } else {
                format_signed(*absolute)
            }
        }
    }
}

/// `part / whole * 100`, or `0.0` when `whole` is zero.
pub fn share_of(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
