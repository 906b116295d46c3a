/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a locally-unique record id (uuid v4, hyphenated).
///
/// Draft orders and items are created offline, so ids never come from the
/// remote backend.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
