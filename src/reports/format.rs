//! Display formatting for report cells.

use chrono::{NaiveDate, NaiveDateTime};

use super::window::ReportWindow;

pub fn display_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// `from dd/mm/yyyy to dd/mm/yyyy`
pub fn display_window(window: &ReportWindow) -> String {
    format!(
        "from {} to {}",
        display_date(window.from.date()),
        display_date(window.to.date())
    )
}

/// Normalizes a stored document date (`YYYY-MM-DD` with an optional time
/// part) to `dd/mm/yyyy`. Unparseable input is passed through unchanged.
pub fn display_stored_date(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return display_date(dt.date());
    }
    match raw.get(..10).and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()) {
        Some(date) => display_date(date),
        None => raw.to_string(),
    }
}

/// Thousands separators and two decimals, rounded half away from zero.
/// With `strip_zero_cents`, whole amounts drop the `.00`.
pub fn format_money(value: f64, strip_zero_cents: bool) -> String {
    if !value.is_finite() {
        return String::new();
    }

    let cents = (value * 100.0).round() as i64;
    let negative = cents < 0;
    let cents = cents.unsigned_abs();
    let whole = cents / 100;
    let fraction = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 4);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    if strip_zero_cents && fraction == 0 {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{fraction:02}")
    }
}

/// Transaction-currency amount: VND and USD drop `.00` on whole amounts.
pub fn format_transaction_amount(value: f64, currency_code: &str) -> String {
    let code = currency_code.trim();
    let strip = code.eq_ignore_ascii_case("VND") || code.eq_ignore_ascii_case("USD");
    format_money(value, strip)
}

/// Local-currency amount: whole amounts never show cents.
pub fn format_local_amount(value: f64) -> String {
    format_money(value, true)
}
