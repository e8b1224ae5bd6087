/// Convert a major-unit amount to the gateway's smallest currency unit,
/// rounding at 2 decimal places first.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Render a minor-unit amount back as a 2-decimal string, e.g. `200` -> `"2.00"`.
pub fn format_minor_units(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let minor = minor.abs();
    format!("{}{}.{:02}", sign, minor / 100, minor % 100)
}
