/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Canonical column name: cleaned, lower-case, whitespace runs collapsed to `_`.
pub fn normalize_header(raw: &str) -> String {
    clean_str(raw)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// True when the cell holds a number equal to zero (`0`, `0.0`, `-0`, ...).
pub fn is_zero(raw: &str) -> bool {
    clean_str(raw).parse::<f64>().map_or(false, |v| v == 0.0)
}

/// Integer cell. Accepts float spellings with no fractional part, e.g. `12.0`,
/// which spreadsheet exports like to emit.
pub fn parse_integer(raw: &str) -> Option<i64> {
    let s = clean_str(raw);
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

pub fn parse_float(raw: &str) -> Option<f64> {
    clean_str(raw).parse::<f64>().ok()
}
