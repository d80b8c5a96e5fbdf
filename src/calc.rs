//! Subtotal, tax and total derivation for an invoice's line items.
//!
//! Nothing here fails: input that does not parse as a number counts as zero.

use regex::Regex;
use std::sync::LazyLock;

use crate::model::LineItem;

static DECIMAL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?(?:\d+\.?\d*(?:[eE][+-]?\d+)?|\.\d+(?:[eE][+-]?\d+)?))")
        .expect("decimal prefix pattern is valid")
});

static TAX_PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)%").expect("tax percent pattern is valid"));

/// Parses the longest decimal prefix of `input`, ignoring leading whitespace.
///
/// `"12abc"` gives 12, `"1."` gives 1, `".5"` gives 0.5 and anything without a
/// numeric prefix gives `None`.
pub fn parse_decimal(input: &str) -> Option<f64> {
    let caps = DECIMAL_PREFIX.captures(input)?;
    caps[1].parse::<f64>().ok().filter(|n| !n.is_nan())
}

/// Amount of one line: quantity times rate, or zero unless both are non-zero numbers.
pub fn line_amount(quantity: &str, rate: &str) -> f64 {
    match (parse_decimal(quantity), parse_decimal(rate)) {
        (Some(q), Some(r)) if q != 0.0 && r != 0.0 => q * r,
        _ => 0.0,
    }
}

pub fn sub_total(lines: &[LineItem]) -> f64 {
    lines
        .iter()
        .map(|line| line_amount(&line.quantity, &line.rate))
        .sum()
}

/// Percentage embedded in a tax label: the first integer directly followed by `%`.
pub fn tax_rate(label: &str) -> f64 {
    TAX_PERCENT
        .captures(label)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .unwrap_or(0.0)
}

pub fn sale_tax(sub_total: f64, rate: f64) -> f64 {
    if sub_total == 0.0 {
        return 0.0;
    }
    sub_total * rate / 100.0
}

/// Derived money values of an invoice. The grand total is never stored; it is
/// always the sum of the other two.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Totals {
    pub sub_total: f64,
    pub sale_tax: f64,
}

impl Totals {
    pub fn compute(lines: &[LineItem], tax_label: &str) -> Self {
        let sub_total = sub_total(lines);
        Self {
            sub_total,
            sale_tax: sale_tax(sub_total, tax_rate(tax_label)),
        }
    }

    pub fn total(&self) -> f64 {
        self.sub_total + self.sale_tax
    }
}

/// Two decimal places with a comma between every group of three integer digits.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    // -0.0 prints as "0.00"
    let value = if value == 0.0 { 0.0 } else { value };

    let fixed = to_fixed_2(value);
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}{grouped}.{frac_part}")
}

/// Edit policy for quantity and rate while the user is typing.
///
/// Input ending in `.`, or ending in `0` after a decimal point, is kept
/// verbatim so `"1."` and `"1.50"` survive keystroke by keystroke. Anything
/// else is replaced by its parsed value, and by `"0"` when it does not parse.
pub fn normalize_numeric_input(value: &str) -> String {
    if value.ends_with('.') || (value.ends_with('0') && value.contains('.')) {
        return value.to_string();
    }
    match parse_decimal(value) {
        Some(n) if n != 0.0 => number_to_string(n),
        _ => "0".to_string(),
    }
}

/// Two-decimal rendering where exact halves round away from zero.
///
/// `{:.2}` rounds exact ties to even, so `0.125` would print as `0.12`. The
/// only f64 values sitting exactly on a third-decimal 5 are odd multiples of
/// 1/8; those are rounded up by hand on integer cents.
fn to_fixed_2(value: f64) -> String {
    let eighths = value.abs() * 8.0;
    if eighths.fract() == 0.0 && eighths < 9.0e15 && (eighths as u64) % 2 == 1 {
        let cents = ((eighths as u128) * 25 + 1) / 2;
        let sign = if value < 0.0 { "-" } else { "" };
        return format!("{sign}{}.{:02}", cents / 100, cents % 100);
    }
    format!("{:.2}", value)
}

/// Shortest round-trip digits, switching to exponent notation below 1e-6
/// and from 1e21 up (`1e-7`, `1e+21`).
fn number_to_string(n: f64) -> String {
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let sci = format!("{:e}", n);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    match exp.parse::<i32>() {
        Ok(exp) if (-6..=20).contains(&exp) => n.to_string(),
        Ok(exp) if exp > 0 => format!("{mantissa}e+{exp}"),
        _ => sci,
    }
}
