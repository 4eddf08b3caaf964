/// The value `secs` will have once stored with [`format_secs`].
pub fn round_tenths(secs: f64) -> f64 {
    parse_secs(&format_secs(secs)).unwrap_or(secs)
}

/// Formats seconds the way best scores are stored and displayed: one
/// fraction digit, rounded on the exact binary value (12.35 is really
/// 12.3499..., so it shows as "12.3").
pub fn format_secs(secs: f64) -> String {
    format!("{:.1}", secs)
}

/// Parses a stored time string. Rejects negative and non-finite values.
pub fn parse_secs(raw: &str) -> Option<f64> {
    match raw.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Some(secs),
        _ => None,
    }
}

pub fn is_valid_secs(secs: f64) -> bool {
    secs.is_finite() && secs >= 0.0
}
