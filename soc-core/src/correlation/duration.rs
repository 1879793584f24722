use once_cell::sync::Lazy;
use regex::Regex;

static DURATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)([smhdw])$").unwrap());

/// Parses a duration string matching `^(\d+)[smhdw]$` (spec §4.3) into
/// seconds.
pub fn parse_secs(duration: &str) -> Option<i64> {
    let caps = DURATION_RE.captures(duration)?;
    let n: i64 = caps[1].parse().ok()?;
    let unit = match &caps[2] {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        "w" => 604_800,
        _ => return None,
    };
    Some(n * unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_secs("5m"), Some(300));
        assert_eq!(parse_secs("1h"), Some(3600));
        assert_eq!(parse_secs("2d"), Some(172_800));
        assert_eq!(parse_secs("1w"), Some(604_800));
        assert_eq!(parse_secs("30s"), Some(30));
    }

    #[test]
    fn rejects_malformed_strings() {
        assert_eq!(parse_secs("-5m"), None);
        assert_eq!(parse_secs("5"), None);
        assert_eq!(parse_secs("5min"), None);
        assert_eq!(parse_secs(""), None);
    }
}
