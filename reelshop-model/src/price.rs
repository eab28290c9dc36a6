//! Price and percentage helpers.

pub const DEFAULT_CURRENCY: &str = "USD";

/// Currency symbol for the currencies the feed is served in.
pub fn currency_symbol(currency: &str) -> &'static str {
    match currency.to_ascii_uppercase().as_str() {
        "EUR" => "€",
        "ILS" => "₪",
        _ => "$",
    }
}

/// Format an amount with its currency symbol and two decimals.
pub fn format_price(amount: f64, currency: &str) -> String {
    format!("{}{:.2}", currency_symbol(currency), amount)
}

/// Parse a loosely formatted amount such as `"12.50"`, `"$12.50"` or `"35%"`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
        .collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse a percentage string; anything unparsable counts as zero.
pub fn parse_percent(raw: &str) -> f64 {
    parse_amount(raw.trim().trim_end_matches('%')).unwrap_or(0.0)
}
