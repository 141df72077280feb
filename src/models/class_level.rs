//! Class levels are stored as short codes: "1" through "12" and "eng_com".

pub const ENGLISH_COMMUNICATION: &str = "eng_com";

/// Every valid class level code in display order.
pub fn all_codes() -> Vec<String> {
    let mut codes: Vec<String> = (1..=12).map(|n| n.to_string()).collect();
    codes.push(ENGLISH_COMMUNICATION.to_string());
    codes
}

pub fn is_valid(code: &str) -> bool {
    code == ENGLISH_COMMUNICATION
        || code.parse::<u8>().is_ok_and(|n| (1..=12).contains(&n)) && !code.starts_with('0')
}

pub fn label(code: &str) -> String {
    if code == ENGLISH_COMMUNICATION {
        "English Communication".to_string()
    } else {
        format!("Class {code}")
    }
}

/// Senior classes get cloud recording on by default.
pub fn is_senior(code: &str) -> bool {
    code == "11" || code == "12"
}

/// (code, label) pair for select boxes.
#[derive(Debug, Clone)]
pub struct ClassLevelOption {
    pub code: String,
    pub label: String,
}

pub fn options() -> Vec<ClassLevelOption> {
    all_codes()
        .into_iter()
        .map(|code| ClassLevelOption { label: label(&code), code })
        .collect()
}

/// Normalise an optional form value: empty strings become None, invalid codes are rejected.
pub fn parse_optional(value: &str) -> Result<Option<String>, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if is_valid(trimmed) {
        Ok(Some(trimmed.to_string()))
    } else {
        Err(format!("'{trimmed}' is not a valid class level"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_codes() {
        assert!(is_valid("1"));
        assert!(is_valid("12"));
        assert!(is_valid("eng_com"));
        assert!(!is_valid("0"));
        assert!(!is_valid("13"));
        assert!(!is_valid("07"));
        assert!(!is_valid(""));
    }

    #[test]
    fn labels() {
        assert_eq!(label("5"), "Class 5");
        assert_eq!(label("eng_com"), "English Communication");
    }

    #[test]
    fn thirteen_levels_in_order() {
        let codes = all_codes();
        assert_eq!(codes.len(), 13);
        assert_eq!(codes.first().map(String::as_str), Some("1"));
        assert_eq!(codes.last().map(String::as_str), Some("eng_com"));
    }

    #[test]
    fn parse_optional_handles_blank_and_invalid() {
        assert_eq!(parse_optional("  "), Ok(None));
        assert_eq!(parse_optional("11"), Ok(Some("11".to_string())));
        assert!(parse_optional("class 3").is_err());
    }
}
