//! Data acquisition: statistical-agency API clients, CSV over HTTP, and
//! offline sample generators.
//!
//! Every lesson runs in one of two modes:
//! - online: fetch from the public source; network and format problems exit
//!   with code 4
//! - offline (`--offline`): seeded synthetic data shaped like the online
//!   source (same columns, same key structure), so a lesson reproduces
//!   without credentials or a connection

pub mod census;
pub mod elections;
pub mod fred;
pub mod sample;

/// Parse one numeric cell, treating placeholders and non-finite text as
/// missing.
pub(crate) fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed.eq_ignore_ascii_case("na")
    {
        return None;
    }
    let v = trimmed.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use super::parse_value;

    #[test]
    fn placeholders_parse_as_missing() {
        assert_eq!(parse_value("."), None);
        assert_eq!(parse_value(""), None);
        assert_eq!(parse_value("  NA "), None);
        assert_eq!(parse_value("null"), None);
        assert_eq!(parse_value("inf"), None);
        assert_eq!(parse_value(" 3.25 "), Some(3.25));
        assert_eq!(parse_value("-666666666"), Some(-666666666.0));
    }
}
