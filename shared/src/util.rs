/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Mask a phone number for logs, keeping the last four characters
pub fn mask_phone(phone: &str) -> String {
    let count = phone.chars().count();
    let hidden = count.saturating_sub(4);
    phone
        .chars()
        .enumerate()
        .map(|(i, c)| if i < hidden { '*' } else { c })
        .collect()
}
