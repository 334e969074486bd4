/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Validates a Georgian mobile number. The accepted canonical format is `+9955XXXXXXXX`; whitespace is ignored so
/// formatted numbers like `+995 555 12 34 56` pass as well.
pub fn is_valid_georgian_mobile(phone: &str) -> bool {
    let normalized: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
    let Some(rest) = normalized.strip_prefix("+9955") else {
        return false;
    };
    rest.len() == 8 && rest.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn georgian_mobile_validation() {
        assert!(is_valid_georgian_mobile("+995555123456"));
        assert!(is_valid_georgian_mobile("+995 555 12 34 56"));
        assert!(!is_valid_georgian_mobile("555123456"));
        assert!(!is_valid_georgian_mobile("+995655123456"));
        assert!(!is_valid_georgian_mobile("+99555512345"));
        assert!(!is_valid_georgian_mobile("+9955551234567"));
        assert!(!is_valid_georgian_mobile("+99555512345a"));
    }

    #[test]
    fn boolean_flags() {
        assert!(parse_boolean_flag(Some("1".into()), false));
        assert!(parse_boolean_flag(Some("Yes".into()), false));
        assert!(!parse_boolean_flag(Some("off".into()), true));
        assert!(parse_boolean_flag(None, true));
        assert!(!parse_boolean_flag(Some("garbage".into()), false));
    }
}
