//! Email and phone extraction from raw page text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
});

/// Phone shapes, tried in priority order.
static PHONE_RES: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"\+?[0-9]{1,3}[-.\s]?\(?[0-9]{1,4}\)?[-.\s]?[0-9]{1,4}[-.\s]?[0-9]{1,9}")
            .expect("valid international phone regex"),
        Regex::new(r"\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}")
            .expect("valid national phone regex"),
    ]
});

/// Substrings that mark an email-shaped match as junk (placeholders, asset
/// names, tracking and CMS artifacts). Compared against the lowercased match.
pub const INVALID_EMAIL_PATTERNS: &[&str] = &[
    "example.com",
    "@example.",
    ".png",
    ".jpg",
    ".jpeg",
    ".gif",
    ".webp",
    ".svg",
    "sampleemail",
    "youremail",
    "noreply",
    "wixpress",
    "sentry",
    "qodeinteractive",
];

/// Accepted digit-count range for phone numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhoneRules {
    pub min_digits: usize,
    pub max_digits: usize,
}

impl Default for PhoneRules {
    fn default() -> Self {
        Self {
            min_digits: 10,
            max_digits: harvest_core::config::MAX_PHONE_DIGITS,
        }
    }
}

impl PhoneRules {
    pub fn from_config(config: &harvest_core::HarvestConfig) -> Self {
        Self {
            min_digits: config.phone_min_digits,
            max_digits: config.phone_max_digits,
        }
    }
}

/// Whether an email-shaped string is worth keeping.
pub fn is_valid_email(email: &str) -> bool {
    let lower = email.to_lowercase();
    !INVALID_EMAIL_PATTERNS.iter().any(|p| lower.contains(p))
}

/// All valid emails in `text`, in order of first appearance.
///
/// Repeats (in any letter case) are collapsed to the first-seen form.
pub fn extract_emails(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    EMAIL_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|email| is_valid_email(email))
        .filter(|email| seen.insert(email.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Whether a digit string is a plausible phone number under `rules`.
pub fn is_valid_phone_digits(digits: &str, rules: &PhoneRules) -> bool {
    if !(rules.min_digits..=rules.max_digits).contains(&digits.len()) {
        return false;
    }

    let mut chars = digits.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if chars.all(|c| c == first) {
        return false;
    }

    !(digits.len() == 8 && is_year_range(digits))
}

/// `19992005`-style pairs of years, usually a copyright line.
fn is_year_range(digits: &str) -> bool {
    let year = |s: &str| s.parse::<u32>().is_ok_and(|y| (1900..=2100).contains(&y));
    year(&digits[..4]) && year(&digits[4..])
}

/// First valid phone number in `text`, in display form.
pub fn extract_phone(text: &str, rules: &PhoneRules) -> Option<String> {
    PHONE_RES
        .iter()
        .flat_map(|re| re.find_iter(text))
        .map(|m| m.as_str().trim())
        .find(|candidate| is_valid_phone_digits(&digits_of(candidate), rules))
        .map(format_phone)
}

/// Display form: `(AAA) BBB-CCCC` for 10 digits, `+1 (AAA) BBB-CCCC` for
/// 11 digits with a leading 1, otherwise the text as matched.
pub fn format_phone(matched: &str) -> String {
    let digits = digits_of(matched);
    match digits.len() {
        10 => format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]),
        11 if digits.starts_with('1') => {
            format!("+1 ({}) {}-{}", &digits[1..4], &digits[4..7], &digits[7..])
        }
        _ => matched.trim().to_string(),
    }
}

fn digits_of(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}
