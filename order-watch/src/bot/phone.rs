//! 手机号规范化
//!
//! 远端平台按 `7XXXXXXXXXX`（11 位）查找用户。

pub use shared::util::mask_phone;

/// Normalize a phone number to `7XXXXXXXXXX`
///
/// 只保留数字；11 位且以 8 开头改为 7；10 位前补 7；其它长度视为无效。
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        10 => Some(format!("7{digits}")),
        11 if digits.starts_with('7') => Some(digits),
        11 if digits.starts_with('8') => Some(format!("7{}", &digits[1..])),
        _ => None,
    }
}

/// Find the first phone number in free text
///
/// 以数字、空格、`+()-` 组成的连续片段为候选，逐个尝试规范化。
pub fn extract_phone(text: &str) -> Option<String> {
    text.split(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '(' | ')' | '-' | ' ')))
        .filter(|candidate| candidate.chars().any(|c| c.is_ascii_digit()))
        .find_map(normalize_phone)
}
