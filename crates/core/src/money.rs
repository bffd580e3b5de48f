//! Customer-facing money formatting
//!
//! Amounts are carried as `i64` minor currency units everywhere; only the
//! reply templates turn them into text.

/// Format minor currency units for a customer-facing message
///
/// Whole amounts drop the decimals ("₦1,500"); fractional amounts keep two
/// ("₦1,500.50"). Thousands are comma-grouped.
pub fn format_money(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    let major = abs / 100;
    let cents = abs % 100;

    let digits = major.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if cents == 0 {
        format!("{sign}\u{20a6}{grouped}")
    } else {
        format!("{sign}\u{20a6}{grouped}.{cents:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_amounts() {
        assert_eq!(format_money(0), "₦0");
        assert_eq!(format_money(500), "₦5");
        assert_eq!(format_money(5_000_000), "₦50,000");
        assert_eq!(format_money(150_000_00), "₦150,000");
    }

    #[test]
    fn test_fractional_amounts() {
        assert_eq!(format_money(150), "₦1.50");
        assert_eq!(format_money(123_456), "₦1,234.56");
    }

    #[test]
    fn test_negative() {
        assert_eq!(format_money(-5_000), "-₦50");
    }
}
