use regex::Regex;
use lazy_static::lazy_static;

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,4}").unwrap();
    static ref SECRET_REGEX: Regex = Regex::new(r"(?i)\b(password|private_key)\s*[=:]\s*\S+").unwrap();
}

pub fn mask_pii(input: &str) -> String {
    let masked = EMAIL_REGEX.replace_all(input, "***@***.***");
    SECRET_REGEX.replace_all(&masked, "$1=***").to_string()
}
