//! Form validators. Each returns `Some(message)` on failure.

/// 3-30 chars: letters, digits, underscore, dot and dash.
pub fn validate_username(username: &str) -> Option<String> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Some("Username is required".to_string());
    }
    if trimmed.len() < 3 || trimmed.len() > 30 {
        return Some("Username must be between 3 and 30 characters".to_string());
    }
    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
        return Some("Username may only contain letters, numbers, '.', '-' and '_'".to_string());
    }
    None
}

pub fn validate_email(email: &str) -> Option<String> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Some("Email is required".to_string());
    }
    if trimmed.len() > 254 {
        return Some("Email must be at most 254 characters".to_string());
    }
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.ends_with('.') => None,
        _ => Some("Enter a valid email address".to_string()),
    }
}

pub fn validate_password(password: &str, confirm: &str) -> Option<String> {
    if password.len() < 8 {
        return Some("Password must be at least 8 characters".to_string());
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Some("Password cannot be entirely numeric".to_string());
    }
    if password != confirm {
        return Some("Passwords do not match".to_string());
    }
    None
}

/// Digits with optional leading '+', spaces and dashes. Empty is fine.
pub fn validate_phone(phone: &str) -> Option<String> {
    let trimmed = phone.trim();
    if trimmed.is_empty() {
        return None;
    }
    let digits = trimmed.chars().filter(|c| c.is_ascii_digit()).count();
    let allowed = trimmed
        .char_indices()
        .all(|(i, c)| c.is_ascii_digit() || c == ' ' || c == '-' || (i == 0 && c == '+'));
    if !allowed || !(7..=15).contains(&digits) {
        return Some("Enter a valid phone number".to_string());
    }
    None
}

pub fn validate_required(value: &str, field_name: &str, max_len: usize) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Some(format!("{field_name} is required"));
    }
    if trimmed.chars().count() > max_len {
        return Some(format!("{field_name} must be at most {max_len} characters"));
    }
    None
}

pub fn validate_optional(value: &str, field_name: &str, max_len: usize) -> Option<String> {
    if value.trim().chars().count() > max_len {
        return Some(format!("{field_name} must be at most {max_len} characters"));
    }
    None
}

/// Absolute http(s) URL. Empty is fine.
pub fn validate_url(value: &str, field_name: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        None
    } else {
        Some(format!("{field_name} must start with http:// or https://"))
    }
}

/// Quiz answer letter.
pub fn is_valid_option(option: &str) -> bool {
    matches!(option, "a" | "b" | "c" | "d")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert!(validate_username("anna.k").is_none());
        assert!(validate_username("ab").is_some());
        assert!(validate_username("has space").is_some());
    }

    #[test]
    fn emails() {
        assert!(validate_email("a@b.co").is_none());
        assert!(validate_email("a@b").is_some());
        assert!(validate_email("@b.co").is_some());
        assert!(validate_email("").is_some());
    }

    #[test]
    fn passwords() {
        assert!(validate_password("s3cretpass", "s3cretpass").is_none());
        assert!(validate_password("short", "short").is_some());
        assert!(validate_password("12345678", "12345678").is_some());
        assert!(validate_password("s3cretpass", "s3cretpasz").is_some());
    }

    #[test]
    fn phones() {
        assert!(validate_phone("").is_none());
        assert!(validate_phone("+91 98765-43210").is_none());
        assert!(validate_phone("12ab").is_some());
        assert!(validate_phone("98+765").is_some());
    }

    #[test]
    fn required_and_optional() {
        assert!(validate_required("  ", "Title", 10).is_some());
        assert!(validate_required("Algebra", "Title", 10).is_none());
        assert!(validate_required("Trigonometry", "Title", 5).is_some());
        assert!(validate_optional("", "Bio", 5).is_none());
    }

    #[test]
    fn urls_and_options() {
        assert!(validate_url("https://example.com/a.pdf", "File URL").is_none());
        assert!(validate_url("ftp://x", "File URL").is_some());
        assert!(is_valid_option("c"));
        assert!(!is_valid_option("e"));
        assert!(!is_valid_option("A"));
    }
}
