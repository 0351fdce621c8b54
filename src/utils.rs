use std::sync::LazyLock;

use regex::Regex;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern")
});
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{9,15}$").expect("phone pattern"));
static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.]{3,30}$").expect("username pattern"));

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn validate_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Spaces and dashes are ignored.
pub fn validate_phone(phone: &str) -> bool {
    PHONE.is_match(&compact_phone(phone))
}

pub fn validate_username(username: &str) -> bool {
    USERNAME.is_match(username)
}

pub fn validate_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

fn compact_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// E.164 form for the messaging API. Local numbers start with a single `0`.
pub fn normalize_phone(phone: &str, country_code: &str) -> String {
    let phone = compact_phone(phone);

    if phone.starts_with('+') {
        phone
    } else if phone.len() == 10 && phone.starts_with('0') {
        format!("+{}{}", country_code, &phone[1..])
    } else if phone.starts_with(country_code) {
        format!("+{}", phone)
    } else {
        phone
    }
}
